pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::database::{pool::create_pool, schema::SchemaReport, Database};
use crate::error::Result;
use crate::services::{
    application_service::ApplicationService, candidate_service::CandidateService,
    credential_service::CredentialService, resume_service::ResumeService,
};
use std::path::PathBuf;

/// The persistence core handed to request handlers. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    pub db: Database,
    pub credential_service: CredentialService,
    pub resume_service: ResumeService,
    pub candidate_service: CandidateService,
    pub application_service: ApplicationService,
}

impl Store {
    /// Opens the database under the configured data directory, brings its
    /// schema up to date and provisions the configured administrator.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = create_pool(config).await?;
        let store = Self::with_credentials(
            Database::new(pool),
            config,
            CredentialService::new(config.hash_scheme),
        );

        store.db.ensure_schema().await?;
        if let Some((email, password)) = config.admin_credentials() {
            store
                .candidate_service
                .provision_administrator(email, password)
                .await?;
        }

        Ok(store)
    }

    pub fn with_credentials(
        db: Database,
        config: &Config,
        credential_service: CredentialService,
    ) -> Self {
        let resume_service = ResumeService::new(config.data_dir.clone());
        let candidate_service = CandidateService::new(
            db.clone(),
            credential_service.clone(),
            resume_service.clone(),
        );
        let application_service = ApplicationService::new(db.clone());

        Self {
            db,
            credential_service,
            resume_service,
            candidate_service,
            application_service,
        }
    }

    pub fn candidates(&self) -> &CandidateService {
        &self.candidate_service
    }

    pub fn applications(&self) -> &ApplicationService {
        &self.application_service
    }

    pub async fn schema_report(&self) -> Result<&SchemaReport> {
        self.db.ensure_schema().await
    }

    /// Absolute path of a stored resume reference, for the serving layer.
    pub fn resume_path(&self, reference: &str) -> Option<PathBuf> {
        self.resume_service.resolve(reference)
    }
}
