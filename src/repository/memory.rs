//! In-memory user store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::repository::{RepositoryError, User, UserRepository};

#[derive(Debug)]
pub struct InMemoryRepository {
    users: RwLock<BTreeMap<i64, User>>,
    next_id: AtomicI64,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn without_secrets(user: &User) -> User {
    User {
        password: String::new(),
        ..user.clone()
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    fn destination(&self) -> String {
        "memory".to_string()
    }

    async fn health_check(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn add_user(&self, mut user: User) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.login == user.login) {
            return Err(RepositoryError::Duplicate(user.login));
        }
        user.user_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        users.insert(user.user_id, user.clone());
        Ok(user)
    }

    async fn get_users(&self, offset: i64, limit: i64) -> Result<(Vec<User>, i64), RepositoryError> {
        let users = self.users.read().await;
        let page = users
            .values()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(without_secrets)
            .collect();
        Ok((page, users.len() as i64))
    }

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&id).map(without_secrets))
    }

    async fn set_password(&self, id: i64, password: &str) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        user.password = password.to_string();
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> Result<(), RepositoryError> {
        self.users
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn login(&self, login: &str, password: &str) -> Result<User, RepositoryError> {
        let users = self.users.read().await;
        users
            .values()
            .find(|u| u.login == login && u.password == password)
            .map(without_secrets)
            .ok_or(RepositoryError::InvalidCredentials)
    }
}
