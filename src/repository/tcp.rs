//! Database reachability probe.
//!
//! The gateway never speaks the database protocol; it only needs to know whether
//! the server accepts connections. User operations are left to the trait
//! defaults and report `Unsupported`.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time;
use url::Url;

use crate::repository::{RepositoryError, UserRepository};

#[derive(Debug, Error)]
pub enum DsnError {
    #[error("invalid DSN: {0}")]
    Parse(#[from] url::ParseError),

    #[error("DSN has no host")]
    NoHost,

    #[error("DSN has no port and scheme {0:?} has no default")]
    NoPort(String),
}

#[derive(Debug, Clone)]
pub struct TcpRepository {
    host: String,
    port: u16,
    database: String,
    timeout: Duration,
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "sqlserver" | "mssql" => Some(1433),
        "postgres" | "postgresql" => Some(5432),
        "mysql" => Some(3306),
        _ => None,
    }
}

impl TcpRepository {
    pub fn from_dsn(dsn: &str, timeout: Duration) -> Result<Self, DsnError> {
        let url = Url::parse(dsn)?;
        let host = url.host_str().ok_or(DsnError::NoHost)?.to_string();
        let port = url
            .port()
            .or_else(|| default_port(url.scheme()))
            .ok_or_else(|| DsnError::NoPort(url.scheme().to_string()))?;
        let database = url.path().trim_start_matches('/').to_string();

        Ok(Self {
            host,
            port,
            database,
            timeout,
        })
    }
}

#[async_trait]
impl UserRepository for TcpRepository {
    fn destination(&self) -> String {
        if self.database.is_empty() {
            format!("{}:{}", self.host, self.port)
        } else {
            format!("{}:{}/{}", self.host, self.port, self.database)
        }
    }

    async fn health_check(&self) -> Result<(), RepositoryError> {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match time::timeout(self.timeout, connect).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(RepositoryError::Unreachable {
                destination: self.destination(),
                reason: e.to_string(),
            }),
            Err(_) => Err(RepositoryError::Timeout(self.timeout)),
        }
    }
}
