//! Certificate email delivery.
//!
//! Issuance hands a [`CertificateEmail`] to an [`EmailSender`]. Delivery
//! failures never abort issuance; they are recorded on the certificate row.

pub mod error;
pub mod outbox;

pub use error::DeliveryError;
pub use outbox::OutboxMailer;

/// A rendered certificate addressed to its participant.
#[derive(Debug, Clone)]
pub struct CertificateEmail {
    pub recipient_email: String,
    pub recipient_name: String,
    pub product_name: String,
    pub serial: String,
    pub verification_url: String,
    pub pdf: Vec<u8>,
}

pub trait EmailSender: Send + Sync {
    fn send(&self, email: &CertificateEmail) -> error::Result<()>;
}
