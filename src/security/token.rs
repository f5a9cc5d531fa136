//! Session token extraction.
//!
//! # Precedence
//! ```text
//! Authorization header present → token = value minus one leading "Bearer "   (HeaderBearer)
//! else session cookie present  → token = cookie value                        (Cookie)
//! else                         → absent
//! ```
//!
//! The header wins whenever it is present, even when it carries nothing usable;
//! the cookie is only consulted when no Authorization header was sent at all.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum_extra::extract::cookie::CookieJar;

const BEARER_PREFIX: &str = "Bearer ";

/// Where a session token was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    HeaderBearer,
    Cookie,
}

/// Credential presented by the caller. Lives for one request.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    value: String,
    source: TokenSource,
}

impl SessionToken {
    pub fn new(value: impl Into<String>, source: TokenSource) -> Self {
        Self {
            value: value.into(),
            source,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> TokenSource {
        self.source
    }
}

// Keep raw credentials out of logs.
impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("source", &self.source)
            .field("len", &self.value.len())
            .finish()
    }
}

/// Pulls the session token out of request headers.
#[derive(Debug, Clone)]
pub struct TokenExtractor {
    cookie_name: String,
}

impl TokenExtractor {
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn extract(&self, headers: &HeaderMap) -> Option<SessionToken> {
        if let Some(value) = headers.get(AUTHORIZATION) {
            let raw = String::from_utf8_lossy(value.as_bytes());
            let token = raw.strip_prefix(BEARER_PREFIX).unwrap_or(&raw);
            if token.is_empty() {
                return None;
            }
            return Some(SessionToken::new(token, TokenSource::HeaderBearer));
        }

        CookieJar::from_headers(headers)
            .get(&self.cookie_name)
            .map(|cookie| cookie.value())
            .filter(|value| !value.is_empty())
            .map(|value| SessionToken::new(value, TokenSource::Cookie))
    }
}
