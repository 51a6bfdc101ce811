//! Certificate issuance.
//!
//! [`Issuer`] owns the single-certificate workflow (reserve row, render,
//! store, mark ready, deliver), the bulk orchestrator built on top of it,
//! public verification, re-delivery and revocation.

mod bulk;
mod issuer;
pub mod progress;
pub mod serial;
mod types;

pub use issuer::Issuer;
pub use progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use serial::{SerialGenerator, SerialSource};
pub use types::{
    BulkIssueRequest, BulkIssueResult, FailedItem, IssuedCertificate, IssuedItem,
    VerificationRecord,
};

/// Settings the issuance workflow is constructed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceSettings {
    /// Public origin of the verification page.
    pub base_url: String,
    pub serial_prefix: String,
    /// Insert attempts when a fresh serial or token collides.
    pub serial_retry_limit: u32,
}

impl IssuanceSettings {
    /// `{base_url}/verificar/{folio}`.
    pub fn verification_url(&self, folio: &str) -> String {
        format!("{}/verificar/{}", self.base_url.trim_end_matches('/'), folio)
    }
}

impl Default for IssuanceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            serial_prefix: "CERT".to_string(),
            serial_retry_limit: 3,
        }
    }
}
