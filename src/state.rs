use std::sync::Arc;

use crate::{
    auth::credentials::CredentialStore,
    auth::jwt::JwtService,
    config::AppConfig,
    repository::{CompanyRepository, ContactRepository},
    store::DocumentStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<AppConfig>,
    pub credentials: Arc<dyn CredentialStore>,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        config: AppConfig,
        credentials: Arc<dyn CredentialStore>,
        jwt: JwtService,
    ) -> Self {
        Self {
            store,
            config: Arc::new(config),
            credentials,
            jwt,
        }
    }

    pub fn contacts(&self) -> ContactRepository {
        ContactRepository::new(self.store.clone())
    }

    pub fn companies(&self) -> CompanyRepository {
        CompanyRepository::new(self.store.clone())
    }
}
