//! Wires the production components together from a [`Config`].

use std::sync::Arc;

use crate::broadcast::TaskProgressBroadcaster;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::db::Database;
use crate::delivery::OutboxMailer;
use crate::error::{ConfigError, Result};
use crate::issuance::Issuer;
use crate::render::CertificatePdf;
use crate::storage::CertificateStorage;
use crate::worker::IssuanceQueue;

#[derive(Clone)]
pub struct Folio {
    pub db: Database,
    pub catalog: Catalog,
    pub issuer: Issuer,
    worker_count: usize,
}

impl Folio {
    /// Opens the configured database (running migrations) and builds the
    /// lopdf renderer, outbox mailer and file storage.
    pub fn from_config(config: &Config) -> Result<Self> {
        let path = config
            .database_path()
            .ok_or_else(|| ConfigError::Validation {
                message: "database_path is not set and no home directory is known".to_string(),
            })?;
        let db = Database::open(&path)?;
        Ok(Self::with_database(db, config))
    }

    pub fn with_database(db: Database, config: &Config) -> Self {
        let issuer = Issuer::new(
            db.clone(),
            Arc::new(CertificatePdf::new()),
            Arc::new(OutboxMailer::new(
                config.outbox_directory(),
                config.sender.clone(),
            )),
            CertificateStorage::new(config.certificates_directory()),
            config.issuance_settings(),
        );

        Self {
            catalog: Catalog::new(db.clone()),
            db,
            issuer,
            worker_count: config.worker_count,
        }
    }

    /// Starts an issuance queue with the configured number of workers.
    pub fn start_queue(&self, progress: TaskProgressBroadcaster) -> IssuanceQueue {
        IssuanceQueue::new(self.issuer.clone(), self.worker_count, progress)
    }
}
