//! Header manipulation for forwarded traffic.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Add X-Forwarded-For for the upstream
//! - Replace client-supplied identity headers with the gateway's own
//!
//! # Design Decisions
//! - Headers listed in `Connection` are hop-by-hop too (RFC 9110 §7.6.1)
//! - Host is dropped; the outbound client sets it from the target URL

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Header carrying the authenticated identity id to the upstream.
pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Prepare client headers for the upstream request.
pub fn forward_headers(
    mut headers: HeaderMap,
    client: Option<SocketAddr>,
    identity_id: Option<&str>,
) -> HeaderMap {
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(X_USER_ID);

    if let Some(addr) = client {
        let ip = addr.ip().to_string();
        let chained = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{prior}, {ip}"),
            None => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&chained) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if let Some(value) = identity_id.and_then(|id| HeaderValue::from_str(id).ok()) {
        headers.insert(X_USER_ID, value);
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-trace-hop"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-trace-hop", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::ACCEPT));
    }

    #[test]
    fn test_forward_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("gateway.local"));
        headers.insert(X_USER_ID, HeaderValue::from_static("spoofed"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        headers.insert("x-request-id", HeaderValue::from_static("abc"));

        let client: SocketAddr = "192.168.1.7:5555".parse().unwrap();
        let out = forward_headers(headers, Some(client), Some("user-1"));

        assert!(!out.contains_key(header::HOST));
        assert_eq!(out.get(X_USER_ID).unwrap(), "user-1");
        assert_eq!(out.get("x-forwarded-for").unwrap(), "10.0.0.1, 192.168.1.7");
        assert_eq!(out.get("x-request-id").unwrap(), "abc");
    }
}
