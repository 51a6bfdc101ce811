use serde::{Deserialize, Serialize};

use crate::error::{FolioError, Result};
use crate::model::{CertificateKind, CertificateStatus, DeliveryStatus};

/// Request to issue certificates for the enrollments of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkIssueRequest {
    pub product_id: String,
    #[serde(default)]
    pub with_competencies: bool,
    /// Restricts the batch to these participants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<CertificateKind>,
}

impl BulkIssueRequest {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            with_competencies: false,
            participant_ids: None,
            kind: None,
        }
    }

    pub fn with_competencies(mut self) -> Self {
        self.with_competencies = true;
        self
    }

    pub fn kind(mut self, kind: CertificateKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn participants<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.participant_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// The certificate kind this request issues.
    pub fn resolve_kind(&self) -> Result<CertificateKind> {
        match (self.with_competencies, self.kind) {
            (true, None) | (true, Some(CertificateKind::Competencies)) => {
                Ok(CertificateKind::Competencies)
            }
            (true, Some(other)) => Err(FolioError::Validation(format!(
                "with_competencies conflicts with requested kind '{}'",
                other
            ))),
            (false, Some(kind)) => Ok(kind),
            (false, None) => Ok(CertificateKind::Approval),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedItem {
    pub name: String,
    pub serial: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub name: String,
    pub error: String,
}

/// Per-item outcome of a bulk operation. Item failures never abort the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkIssueResult {
    pub success: Vec<IssuedItem>,
    pub errors: Vec<FailedItem>,
}

impl BulkIssueResult {
    pub fn push_success(&mut self, name: impl Into<String>, serial: impl Into<String>) {
        self.success.push(IssuedItem {
            name: name.into(),
            serial: serial.into(),
        });
    }

    pub fn push_error(&mut self, name: impl Into<String>, error: impl Into<String>) {
        self.errors.push(FailedItem {
            name: name.into(),
            error: error.into(),
        });
    }

    pub fn total(&self) -> usize {
        self.success.len() + self.errors.len()
    }
}

/// A certificate produced by single issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCertificate {
    pub id: String,
    pub enrollment_id: String,
    pub participant_name: String,
    pub kind: CertificateKind,
    pub serial: String,
    pub verification_token: String,
    pub verification_url: String,
    pub pdf_path: String,
    pub emitted_at: String,
    pub delivery_status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_error: Option<String>,
}

/// Public view of a certificate returned by verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub folio: String,
    pub kind: CertificateKind,
    pub status: CertificateStatus,
    pub participant_name: String,
    pub product_name: String,
    pub hours: u32,
    pub teacher_names: Vec<String>,
    pub emitted_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<String>,
    pub verification_url: String,
}

impl VerificationRecord {
    pub fn is_valid(&self) -> bool {
        self.status == CertificateStatus::Ready
    }
}
