use anyhow::Result;
use async_trait::async_trait;

use crate::auth::password;
use crate::config::AppConfig;

#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub name: String,
}

/// Credential lookup behind the login flow. Swapping in a real user store
/// is a matter of providing another implementation.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    async fn find_by_email(&self, email: &str) -> Option<CredentialRecord>;
}

pub struct StaticCredentialStore {
    users: Vec<CredentialRecord>,
}

impl StaticCredentialStore {
    pub fn new(users: Vec<CredentialRecord>) -> Self {
        Self { users }
    }

    /// The two well-known bootstrap accounts, hashed at startup from the
    /// configured seed password.
    pub fn seeded(config: &AppConfig) -> Result<Self> {
        let password_hash = password::hash_password(&config.seed_password)?;
        Ok(Self::new(vec![
            CredentialRecord {
                id: "1".to_string(),
                email: "admin@crm.local".to_string(),
                password_hash: password_hash.clone(),
                role: "ADMIN".to_string(),
                name: "Administrator".to_string(),
            },
            CredentialRecord {
                id: "2".to_string(),
                email: "user@crm.local".to_string(),
                password_hash,
                role: "USER".to_string(),
                name: "User".to_string(),
            },
        ]))
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn find_by_email(&self, email: &str) -> Option<CredentialRecord> {
        self.users
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned()
    }
}
