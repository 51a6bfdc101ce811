//! Certificate PDF rendering.
//!
//! Issuance only depends on the [`PdfRenderer`] trait; [`CertificatePdf`] is
//! the built-in implementation drawing a one-page certificate with `lopdf`.

mod certificate_pdf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::CertificateKind;

pub use certificate_pdf::CertificatePdf;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Missing certificate field: {0}")]
    MissingField(&'static str),

    #[error("PDF rendering failed: {0}")]
    Failed(String),
}

/// Structured data printed on a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDocument {
    pub kind: CertificateKind,
    pub participant_name: String,
    pub product_name: String,
    pub hours: u32,
    pub issue_date: NaiveDate,
    pub serial: String,
    pub verification_token: String,
    pub verification_url: String,
    pub teacher_names: Vec<String>,
    /// Only set for kinds that print competencies.
    pub competencies: Option<String>,
}

pub trait PdfRenderer: Send + Sync {
    fn render(&self, document: &CertificateDocument) -> Result<Vec<u8>, RenderError>;
}
