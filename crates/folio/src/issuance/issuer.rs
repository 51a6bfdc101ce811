use std::path::Path;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use tracing::{debug, info, info_span, warn};

use crate::db::certificate_repo::{
    self, CertificateRow, NewCertificate, VerificationKey, ENROLLMENT_KIND_COLUMN, SERIAL_COLUMN,
    TOKEN_COLUMN,
};
use crate::db::enrollment_repo::{self, EnrollmentDetail};
use crate::db::{now_timestamp, product_repo, Database};
use crate::delivery::{CertificateEmail, EmailSender};
use crate::error::{FolioError, Result};
use crate::issuance::serial::{SerialGenerator, SerialSource};
use crate::issuance::types::{BulkIssueResult, IssuedCertificate, VerificationRecord};
use crate::issuance::IssuanceSettings;
use crate::model::{CertificateKind, CertificateStatus, DeliveryStatus};
use crate::render::{CertificateDocument, PdfRenderer};
use crate::storage::CertificateStorage;

/// Issues, verifies, re-delivers and revokes certificates.
///
/// Cloning is cheap; clones share the database handle, renderer and mailer.
#[derive(Clone)]
pub struct Issuer {
    pub(super) db: Database,
    renderer: Arc<dyn PdfRenderer>,
    mailer: Arc<dyn EmailSender>,
    storage: CertificateStorage,
    serials: Arc<dyn SerialSource>,
    settings: IssuanceSettings,
}

impl Issuer {
    pub fn new(
        db: Database,
        renderer: Arc<dyn PdfRenderer>,
        mailer: Arc<dyn EmailSender>,
        storage: CertificateStorage,
        settings: IssuanceSettings,
    ) -> Self {
        let serials: Arc<dyn SerialSource> =
            Arc::new(SerialGenerator::new(settings.serial_prefix.clone()));
        Self {
            db,
            renderer,
            mailer,
            storage,
            serials,
            settings,
        }
    }

    /// Replaces the serial and token source.
    pub fn with_serials(mut self, serials: Arc<dyn SerialSource>) -> Self {
        self.serials = serials;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &IssuanceSettings {
        &self.settings
    }

    /// Issues one certificate of `kind` for an enrollment.
    ///
    /// Fails with NotFound for an unknown enrollment, Conflict when the
    /// enrollment already holds a certificate of this kind, and Validation
    /// when a competencies certificate is requested for a product without
    /// competencies. Email problems never fail issuance; they are recorded
    /// as the certificate's delivery status.
    pub fn issue(&self, enrollment_id: &str, kind: CertificateKind) -> Result<IssuedCertificate> {
        let detail = enrollment_repo::find_detail(&self.db, enrollment_id)?
            .ok_or_else(|| FolioError::not_found("Enrollment", enrollment_id))?;
        self.issue_for(&detail, kind)
    }

    pub(super) fn issue_for(
        &self,
        detail: &EnrollmentDetail,
        kind: CertificateKind,
    ) -> Result<IssuedCertificate> {
        let _span = info_span!("issue",
            enrollment_id = %detail.enrollment_id,
            kind = %kind,
        )
        .entered();

        if certificate_repo::find_for_enrollment(&self.db, &detail.enrollment_id, kind)?.is_some()
        {
            return Err(already_issued(detail, kind));
        }

        let competencies = if kind.requires_competencies() {
            let text = detail
                .competencies
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    FolioError::Validation(format!(
                        "product '{}' has no competencies defined",
                        detail.product_name
                    ))
                })?;
            Some(text.to_string())
        } else {
            None
        };
        let teacher_names = product_repo::teacher_names(&self.db, &detail.product_id)?;

        let now = Utc::now();
        let cert = {
            let _step = info_span!("reserve").entered();
            self.insert_with_retry(detail, kind, now.year())?
        };
        let verification_url = self.settings.verification_url(&cert.serial);

        let pdf = {
            let _step = info_span!("render").entered();
            let document = CertificateDocument {
                kind,
                participant_name: detail.participant_name.clone(),
                product_name: detail.product_name.clone(),
                hours: detail.hours,
                issue_date: now.date_naive(),
                serial: cert.serial.clone(),
                verification_token: cert.verification_token.clone(),
                verification_url: verification_url.clone(),
                teacher_names,
                competencies,
            };
            match self.renderer.render(&document) {
                Ok(pdf) => pdf,
                Err(e) => {
                    self.roll_back(&cert.id, None);
                    return Err(e.into());
                }
            }
        };

        let pdf_path = {
            let _step = info_span!("store").entered();
            match self.storage.store(&cert.serial, now.year(), &pdf) {
                Ok(path) => path,
                Err(e) => {
                    self.roll_back(&cert.id, None);
                    return Err(e.into());
                }
            }
        };

        let emitted_at = now.to_rfc3339();
        let pdf_path_str = pdf_path.to_string_lossy().to_string();
        match certificate_repo::mark_ready(&self.db, &cert.id, &pdf_path_str, &emitted_at) {
            Ok(true) => {}
            Ok(false) => {
                self.roll_back(&cert.id, Some(&pdf_path));
                return Err(FolioError::not_found("Certificate", cert.id));
            }
            Err(e) => {
                self.roll_back(&cert.id, Some(&pdf_path));
                return Err(e.into());
            }
        }
        info!(serial = %cert.serial, "Certificate ready for {}", detail.participant_name);

        let (delivery_status, delivery_error) = {
            let _step = info_span!("deliver").entered();
            match self.deliver(&cert.id, &cert.serial, detail, &verification_url, pdf) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(serial = %cert.serial, "Could not record delivery outcome: {}", e);
                    (DeliveryStatus::Pending, None)
                }
            }
        };

        Ok(IssuedCertificate {
            id: cert.id,
            enrollment_id: detail.enrollment_id.clone(),
            participant_name: detail.participant_name.clone(),
            kind,
            serial: cert.serial,
            verification_token: cert.verification_token,
            verification_url,
            pdf_path: pdf_path_str,
            emitted_at,
            delivery_status,
            delivery_error,
        })
    }

    /// Inserts the `in_process` row, drawing a fresh serial and token when
    /// either collides with an existing certificate.
    fn insert_with_retry(
        &self,
        detail: &EnrollmentDetail,
        kind: CertificateKind,
        year: i32,
    ) -> Result<NewCertificate> {
        let limit = self.settings.serial_retry_limit.max(1);
        let mut attempt = 1;
        loop {
            let cert = NewCertificate {
                id: uuid::Uuid::new_v4().to_string(),
                enrollment_id: detail.enrollment_id.clone(),
                kind,
                serial: self.serials.serial(year)?,
                verification_token: self.serials.token()?,
                created_at: now_timestamp(),
            };

            match certificate_repo::insert_in_process(&self.db, &cert) {
                Ok(()) => return Ok(cert),
                Err(e) if e.violates(ENROLLMENT_KIND_COLUMN) => {
                    return Err(already_issued(detail, kind));
                }
                Err(e)
                    if attempt < limit
                        && (e.violates(SERIAL_COLUMN) || e.violates(TOKEN_COLUMN)) =>
                {
                    warn!(attempt, "Serial or token collision, retrying: {}", e);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Compensating rollback for a failed issuance. Failures here are logged,
    /// the original error is what the caller sees.
    fn roll_back(&self, certificate_id: &str, pdf_path: Option<&Path>) {
        if let Some(path) = pdf_path {
            self.storage.remove(path);
        }
        match certificate_repo::delete(&self.db, certificate_id) {
            Ok(_) => debug!("Rolled back certificate {}", certificate_id),
            Err(e) => warn!("Failed to roll back certificate {}: {}", certificate_id, e),
        }
    }

    /// Sends the certificate email and records the outcome.
    fn deliver(
        &self,
        certificate_id: &str,
        serial: &str,
        detail: &EnrollmentDetail,
        verification_url: &str,
        pdf: Vec<u8>,
    ) -> Result<(DeliveryStatus, Option<String>)> {
        let email = CertificateEmail {
            recipient_email: detail.participant_email.clone(),
            recipient_name: detail.participant_name.clone(),
            product_name: detail.product_name.clone(),
            serial: serial.to_string(),
            verification_url: verification_url.to_string(),
            pdf,
        };

        let (status, error) = match self.mailer.send(&email) {
            Ok(()) => (DeliveryStatus::Sent, None),
            Err(e) => {
                warn!(
                    serial,
                    "Delivery to {} failed: {}", detail.participant_email, e
                );
                (DeliveryStatus::Failed, Some(e.to_string()))
            }
        };

        certificate_repo::record_delivery(
            &self.db,
            certificate_id,
            status,
            error.as_deref(),
            &now_timestamp(),
        )?;
        Ok((status, error))
    }

    /// Public lookup by folio. Only `ready` and `revoked` certificates are
    /// visible.
    pub fn verify(&self, folio: &str) -> Result<VerificationRecord> {
        self.verify_by(VerificationKey::Serial(folio.trim()), "Certificate", folio)
    }

    /// Public lookup by verification token.
    pub fn verify_token(&self, token: &str) -> Result<VerificationRecord> {
        self.verify_by(VerificationKey::Token(token.trim()), "Verification token", token)
    }

    fn verify_by(
        &self,
        key: VerificationKey<'_>,
        entity: &'static str,
        raw: &str,
    ) -> Result<VerificationRecord> {
        let row = certificate_repo::find_verification(&self.db, key)?
            .filter(|row| row.status.is_public())
            .ok_or_else(|| FolioError::not_found(entity, raw))?;
        let teacher_names = product_repo::teacher_names(&self.db, &row.product_id)?;

        Ok(VerificationRecord {
            verification_url: self.settings.verification_url(&row.serial),
            folio: row.serial,
            kind: row.kind,
            status: row.status,
            participant_name: row.participant_name,
            product_name: row.product_name,
            hours: row.hours,
            teacher_names,
            emitted_at: row.emitted_at,
            revoked_at: row.revoked_at,
        })
    }

    /// Re-sends a ready certificate from its stored PDF.
    pub fn redeliver(&self, certificate_id: &str) -> Result<CertificateRow> {
        let row = certificate_repo::find_by_id(&self.db, certificate_id)?
            .ok_or_else(|| FolioError::not_found("Certificate", certificate_id))?;
        let _span = info_span!("redeliver", serial = %row.serial).entered();

        if row.status != CertificateStatus::Ready {
            return Err(FolioError::Validation(format!(
                "certificate {} is {} and cannot be delivered",
                row.serial, row.status
            )));
        }
        let pdf_path = row.pdf_path.as_deref().ok_or_else(|| {
            FolioError::Validation(format!("certificate {} has no stored PDF", row.serial))
        })?;
        let detail = enrollment_repo::find_detail(&self.db, &row.enrollment_id)?
            .ok_or_else(|| FolioError::not_found("Enrollment", &row.enrollment_id))?;

        let pdf = self.storage.read(Path::new(pdf_path))?;
        let url = self.settings.verification_url(&row.serial);
        self.deliver(&row.id, &row.serial, &detail, &url, pdf)?;

        certificate_repo::find_by_id(&self.db, certificate_id)?
            .ok_or_else(|| FolioError::not_found("Certificate", certificate_id))
    }

    /// Retries every ready certificate whose last delivery attempt failed.
    /// Certificates still `pending` belong to an issuance in flight and are
    /// left alone. Per-certificate errors are collected, never raised.
    pub fn redeliver_failed(&self) -> Result<BulkIssueResult> {
        let failed = certificate_repo::list_failed_deliveries(&self.db)?;
        let _span = info_span!("redeliver_failed", count = failed.len()).entered();

        let mut result = BulkIssueResult::default();
        for row in failed {
            let name = match enrollment_repo::find_detail(&self.db, &row.enrollment_id) {
                Ok(detail) => detail
                    .map(|d| d.participant_name)
                    .unwrap_or_else(|| row.serial.clone()),
                Err(e) => {
                    warn!(serial = %row.serial, error = %e, "Enrollment lookup failed");
                    result.push_error(row.serial.clone(), e.to_string());
                    continue;
                }
            };

            match self.redeliver(&row.id) {
                Ok(updated) if updated.delivery_status == DeliveryStatus::Sent => {
                    result.push_success(name, updated.serial);
                }
                Ok(updated) => {
                    let error = updated
                        .delivery_error
                        .unwrap_or_else(|| "delivery failed".to_string());
                    result.push_error(name, error);
                }
                Err(e) => result.push_error(name, e.to_string()),
            }
        }

        info!(
            sent = result.success.len(),
            failed = result.errors.len(),
            "Redelivery finished"
        );
        Ok(result)
    }

    /// Revokes a ready certificate. It keeps its (enrollment, kind) slot and
    /// stays visible to verification as revoked.
    pub fn revoke(&self, certificate_id: &str, reason: Option<&str>) -> Result<CertificateRow> {
        let row = certificate_repo::find_by_id(&self.db, certificate_id)?
            .ok_or_else(|| FolioError::not_found("Certificate", certificate_id))?;

        match row.status {
            CertificateStatus::Revoked => {
                return Err(FolioError::Conflict(format!(
                    "certificate {} is already revoked",
                    row.serial
                )));
            }
            CertificateStatus::Ready => {}
            other => {
                return Err(FolioError::Validation(format!(
                    "certificate {} is {} and cannot be revoked",
                    row.serial, other
                )));
            }
        }

        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        if !certificate_repo::revoke(&self.db, certificate_id, reason, &now_timestamp())? {
            return Err(FolioError::Conflict(format!(
                "certificate {} changed status concurrently",
                row.serial
            )));
        }
        info!(serial = %row.serial, "Certificate revoked");

        certificate_repo::find_by_id(&self.db, certificate_id)?
            .ok_or_else(|| FolioError::not_found("Certificate", certificate_id))
    }
}

fn already_issued(detail: &EnrollmentDetail, kind: CertificateKind) -> FolioError {
    FolioError::Conflict(format!(
        "{} already has a {} certificate for '{}'",
        detail.participant_name, kind, detail.product_name
    ))
}
