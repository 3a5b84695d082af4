use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("User with this email already exists")]
    DuplicateEmail,
    #[error("User store lock poisoned")]
    Poisoned,
}

/// In-process user table keyed by lower-cased e-mail.
#[derive(Clone, Default)]
pub struct UserRepository {
    users: Arc<RwLock<HashMap<String, User>>>,
}

fn key(email: &str) -> String {
    email.trim().to_lowercase()
}

impl UserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_user(&self, user: User) -> Result<User, RepositoryError> {
        let mut users = self.users.write().map_err(|_| RepositoryError::Poisoned)?;
        let key = key(&user.email);
        if users.contains_key(&key) {
            return Err(RepositoryError::DuplicateEmail);
        }
        users.insert(key, user.clone());
        Ok(user)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(users.get(&key(email)).cloned())
    }

    pub fn count(&self) -> Result<usize, RepositoryError> {
        Ok(self.users.read().map_err(|_| RepositoryError::Poisoned)?.len())
    }
}
