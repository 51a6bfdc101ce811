//! Participants, teachers, products and enrollments.
//!
//! Thin validated layer over the entity repositories. Repository errors are
//! mapped to NotFound / Conflict / Validation where the caller can act on
//! them.

use std::sync::OnceLock;

use regex::Regex;
use tracing::info;

use crate::db::certificate_repo::{self, CertificateRow};
use crate::db::enrollment_repo::{self, EnrollmentDetail, EnrollmentRow};
use crate::db::participant_repo::{self, ParticipantRow};
use crate::db::product_repo::{self, ProductRow};
use crate::db::teacher_repo::{self, TeacherRow};
use crate::db::{now_timestamp, Database, DatabaseError};
use crate::error::{FolioError, Result};

const EMAIL_PATTERN: &str =
    r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$";

pub fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(EMAIL_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(email))
}

/// Input for a new product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub hours: u32,
    pub competencies: Option<String>,
    pub starts_on: Option<String>,
    pub ends_on: Option<String>,
}

#[derive(Clone)]
pub struct Catalog {
    db: Database,
}

impl Catalog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ─── Participants ───────────────────────────────────────────────────────

    pub fn create_participant(&self, full_name: &str, email: &str) -> Result<ParticipantRow> {
        let full_name = required("full name", full_name)?;
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(FolioError::Validation(format!(
                "invalid email address '{}'",
                email
            )));
        }
        if participant_repo::find_by_email(&self.db, email)?.is_some() {
            return Err(duplicate_email(email));
        }

        let row = ParticipantRow {
            id: uuid::Uuid::new_v4().to_string(),
            full_name,
            email: email.to_string(),
            created_at: now_timestamp(),
        };
        participant_repo::insert(&self.db, &row)
            .map_err(|e| unique_to_conflict(e, || duplicate_email(email)))?;
        info!(participant_id = %row.id, "Participant created");
        Ok(row)
    }

    pub fn participant(&self, id: &str) -> Result<ParticipantRow> {
        participant_repo::find_by_id(&self.db, id)?
            .ok_or_else(|| FolioError::not_found("Participant", id))
    }

    pub fn participant_by_email(&self, email: &str) -> Result<ParticipantRow> {
        participant_repo::find_by_email(&self.db, email.trim())?
            .ok_or_else(|| FolioError::not_found("Participant", email))
    }

    pub fn participants(&self) -> Result<Vec<ParticipantRow>> {
        Ok(participant_repo::list(&self.db)?)
    }

    /// Deletes a participant with their enrollments and certificates.
    pub fn delete_participant(&self, id: &str) -> Result<()> {
        if !participant_repo::delete(&self.db, id)? {
            return Err(FolioError::not_found("Participant", id));
        }
        Ok(())
    }

    // ─── Teachers ───────────────────────────────────────────────────────────

    pub fn create_teacher(&self, full_name: &str, email: &str) -> Result<TeacherRow> {
        let full_name = required("full name", full_name)?;
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(FolioError::Validation(format!(
                "invalid email address '{}'",
                email
            )));
        }

        let row = TeacherRow {
            id: uuid::Uuid::new_v4().to_string(),
            full_name,
            email: email.to_string(),
            created_at: now_timestamp(),
        };
        teacher_repo::insert(&self.db, &row)
            .map_err(|e| unique_to_conflict(e, || duplicate_email(email)))?;
        Ok(row)
    }

    pub fn teacher(&self, id: &str) -> Result<TeacherRow> {
        teacher_repo::find_by_id(&self.db, id)?.ok_or_else(|| FolioError::not_found("Teacher", id))
    }

    pub fn teachers(&self) -> Result<Vec<TeacherRow>> {
        Ok(teacher_repo::list(&self.db)?)
    }

    // ─── Products ───────────────────────────────────────────────────────────

    pub fn create_product(&self, product: NewProduct) -> Result<ProductRow> {
        let name = required("product name", &product.name)?;
        if product.hours == 0 {
            return Err(FolioError::Validation(
                "product hours must be greater than zero".to_string(),
            ));
        }

        let row = ProductRow {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            hours: product.hours,
            competencies: product.competencies,
            starts_on: product.starts_on,
            ends_on: product.ends_on,
            created_at: now_timestamp(),
        };
        product_repo::insert(&self.db, &row)?;
        info!(product_id = %row.id, "Product created");
        Ok(row)
    }

    pub fn product(&self, id: &str) -> Result<ProductRow> {
        product_repo::find_by_id(&self.db, id)?.ok_or_else(|| FolioError::not_found("Product", id))
    }

    pub fn products(&self) -> Result<Vec<ProductRow>> {
        Ok(product_repo::list(&self.db)?)
    }

    /// Replaces the competencies text; blank text clears it.
    pub fn set_competencies(&self, product_id: &str, competencies: Option<&str>) -> Result<()> {
        let competencies = competencies.map(str::trim).filter(|c| !c.is_empty());
        if !product_repo::update_competencies(&self.db, product_id, competencies)? {
            return Err(FolioError::not_found("Product", product_id));
        }
        Ok(())
    }

    /// Assigns a teacher to a product. Assigning twice is a no-op.
    pub fn assign_teacher(&self, product_id: &str, teacher_id: &str) -> Result<()> {
        self.product(product_id)?;
        self.teacher(teacher_id)?;
        product_repo::assign_teacher(&self.db, product_id, teacher_id)?;
        Ok(())
    }

    pub fn product_teachers(&self, product_id: &str) -> Result<Vec<TeacherRow>> {
        self.product(product_id)?;
        Ok(teacher_repo::list_for_product(&self.db, product_id)?)
    }

    // ─── Enrollments ────────────────────────────────────────────────────────

    pub fn enroll(&self, participant_id: &str, product_id: &str) -> Result<EnrollmentRow> {
        let participant = self.participant(participant_id)?;
        let product = self.product(product_id)?;

        let row = EnrollmentRow {
            id: uuid::Uuid::new_v4().to_string(),
            participant_id: participant.id,
            product_id: product.id,
            created_at: now_timestamp(),
        };
        enrollment_repo::insert(&self.db, &row).map_err(|e| {
            unique_to_conflict(e, || {
                FolioError::Conflict(format!(
                    "{} is already enrolled in '{}'",
                    participant.full_name, product.name
                ))
            })
        })?;
        Ok(row)
    }

    pub fn enrollment(&self, id: &str) -> Result<EnrollmentDetail> {
        enrollment_repo::find_detail(&self.db, id)?
            .ok_or_else(|| FolioError::not_found("Enrollment", id))
    }

    pub fn enrollments_for_product(&self, product_id: &str) -> Result<Vec<EnrollmentDetail>> {
        self.product(product_id)?;
        Ok(enrollment_repo::list_for_product(&self.db, product_id)?)
    }

    pub fn delete_enrollment(&self, id: &str) -> Result<()> {
        if !enrollment_repo::delete(&self.db, id)? {
            return Err(FolioError::not_found("Enrollment", id));
        }
        Ok(())
    }

    // ─── Certificates ───────────────────────────────────────────────────────

    pub fn certificate(&self, id: &str) -> Result<CertificateRow> {
        certificate_repo::find_by_id(&self.db, id)?
            .ok_or_else(|| FolioError::not_found("Certificate", id))
    }

    pub fn certificate_by_serial(&self, serial: &str) -> Result<CertificateRow> {
        certificate_repo::find_by_serial(&self.db, serial.trim())?
            .ok_or_else(|| FolioError::not_found("Certificate", serial))
    }

    pub fn certificate_by_token(&self, token: &str) -> Result<CertificateRow> {
        certificate_repo::find_by_token(&self.db, token.trim())?
            .ok_or_else(|| FolioError::not_found("Verification token", token))
    }

    pub fn certificates_for_product(&self, product_id: &str) -> Result<Vec<CertificateRow>> {
        self.product(product_id)?;
        Ok(certificate_repo::list_for_product(&self.db, product_id)?)
    }

    /// Ready certificates whose last delivery attempt failed.
    pub fn pending_deliveries(&self) -> Result<Vec<CertificateRow>> {
        Ok(certificate_repo::list_failed_deliveries(&self.db)?)
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FolioError::Validation(format!("{} must not be empty", field)));
    }
    if value.chars().any(char::is_control) {
        return Err(FolioError::Validation(format!(
            "{} must not contain control characters",
            field
        )));
    }
    Ok(value.to_string())
}

fn duplicate_email(email: &str) -> FolioError {
    FolioError::Conflict(format!("email '{}' is already registered", email))
}

fn unique_to_conflict(err: DatabaseError, conflict: impl FnOnce() -> FolioError) -> FolioError {
    if err.unique_violation().is_some() {
        conflict()
    } else {
        err.into()
    }
}
