pub mod app;
pub mod broadcast;
pub mod catalog;
pub mod config;
pub mod db;
pub mod delivery;
pub mod error;
pub mod issuance;
pub mod model;
pub mod render;
pub mod storage;
pub mod telemetry;
pub mod worker;

pub use app::Folio;
pub use broadcast::{TaskProgressBroadcaster, TaskProgressEvent};
pub use catalog::{Catalog, NewProduct};
pub use config::{load_config, Config};
pub use delivery::{CertificateEmail, DeliveryError, EmailSender, OutboxMailer};
pub use error::{ConfigError, ErrorCategory, FolioError, Result, StorageError, WorkerError};
pub use issuance::{
    BulkIssueRequest, BulkIssueResult, IssuanceSettings, IssuedCertificate, Issuer,
    VerificationRecord,
};
pub use model::{CertificateKind, CertificateStatus, DeliveryStatus, TaskStatus};
pub use render::{CertificateDocument, CertificatePdf, PdfRenderer, RenderError};
pub use worker::IssuanceQueue;
