//! User persistence subsystem.
//!
//! # Variants
//! - `memory.rs`: process-local store (development and tests)
//! - `tcp.rs`: a database known only by its DSN; health is TCP reachability
//!
//! # Design Decisions
//! - The gateway itself only needs `health_check` and `destination`
//! - User operations a backend does not provide answer `RepositoryError::Unsupported`
//!   instead of panicking

pub mod memory;
pub mod tcp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::InMemoryRepository;
pub use tcp::TcpRepository;

/// A managed user record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_full_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub login: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub post: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phone: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub smtp: String,
    #[serde(default, skip_serializing)]
    pub email_password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub options: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("operation {0} is not supported by this repository")]
    Unsupported(&'static str),

    #[error("login or password didn't match")]
    InvalidCredentials,

    #[error("user {0} not found")]
    NotFound(i64),

    #[error("login {0:?} already exists")]
    Duplicate(String),

    #[error("repository unreachable at {destination}: {reason}")]
    Unreachable { destination: String, reason: String },

    #[error("repository health check timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Persistence contract. Only `destination` and `health_check` are mandatory.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Label identifying the backing store, used as the metric destination.
    fn destination(&self) -> String;

    async fn health_check(&self) -> Result<(), RepositoryError>;

    async fn add_user(&self, _user: User) -> Result<User, RepositoryError> {
        Err(RepositoryError::Unsupported("add_user"))
    }

    /// Page of users plus the total count.
    async fn get_users(&self, _offset: i64, _limit: i64) -> Result<(Vec<User>, i64), RepositoryError> {
        Err(RepositoryError::Unsupported("get_users"))
    }

    async fn get_user_by_id(&self, _id: i64) -> Result<Option<User>, RepositoryError> {
        Err(RepositoryError::Unsupported("get_user_by_id"))
    }

    async fn set_password(&self, _id: i64, _password: &str) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unsupported("set_password"))
    }

    async fn delete_user(&self, _id: i64) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unsupported("delete_user"))
    }

    async fn login(&self, _login: &str, _password: &str) -> Result<User, RepositoryError> {
        Err(RepositoryError::Unsupported("login"))
    }
}
