//! Enrollment repository: links participants to products.

use rusqlite::{params, Row};

use super::{query_optional, Database, DatabaseError};
use crate::model::CertificateKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentRow {
    pub id: String,
    pub participant_id: String,
    pub product_id: String,
    pub created_at: String,
}

impl EnrollmentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            participant_id: row.get("participant_id")?,
            product_id: row.get("product_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// An enrollment joined with the participant and product data needed to
/// issue a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentDetail {
    pub enrollment_id: String,
    pub participant_id: String,
    pub participant_name: String,
    pub participant_email: String,
    pub product_id: String,
    pub product_name: String,
    pub hours: u32,
    pub competencies: Option<String>,
}

impl EnrollmentDetail {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            enrollment_id: row.get("enrollment_id")?,
            participant_id: row.get("participant_id")?,
            participant_name: row.get("participant_name")?,
            participant_email: row.get("participant_email")?,
            product_id: row.get("product_id")?,
            product_name: row.get("product_name")?,
            hours: row.get("hours")?,
            competencies: row.get("competencies")?,
        })
    }
}

const DETAIL_SELECT: &str = "SELECT e.id AS enrollment_id,
        p.id AS participant_id, p.full_name AS participant_name, p.email AS participant_email,
        c.id AS product_id, c.name AS product_name, c.hours AS hours, c.competencies AS competencies
     FROM enrollments e
     JOIN participants p ON p.id = e.participant_id
     JOIN products c ON c.id = e.product_id";

pub fn insert(db: &Database, enrollment: &EnrollmentRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO enrollments (id, participant_id, product_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                enrollment.id,
                enrollment.participant_id,
                enrollment.product_id,
                enrollment.created_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<EnrollmentRow>, DatabaseError> {
    db.with_conn(|conn| {
        query_optional(
            conn,
            "SELECT * FROM enrollments WHERE id = ?1",
            params![id],
            EnrollmentRow::from_row,
        )
    })
}

/// Finds the joined detail view of one enrollment.
pub fn find_detail(db: &Database, id: &str) -> Result<Option<EnrollmentDetail>, DatabaseError> {
    db.with_conn(|conn| {
        query_optional(
            conn,
            &format!("{} WHERE e.id = ?1", DETAIL_SELECT),
            params![id],
            EnrollmentDetail::from_row,
        )
    })
}

pub fn list_for_product(
    db: &Database,
    product_id: &str,
) -> Result<Vec<EnrollmentDetail>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE e.product_id = ?1 ORDER BY p.full_name, e.id",
            DETAIL_SELECT
        ))?;
        let rows = stmt
            .query_map(params![product_id], EnrollmentDetail::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Enrollments of a product that have no certificate of `kind` yet.
pub fn list_without_certificate(
    db: &Database,
    product_id: &str,
    kind: CertificateKind,
) -> Result<Vec<EnrollmentDetail>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE e.product_id = ?1
               AND NOT EXISTS (
                   SELECT 1 FROM certificates cert
                   WHERE cert.enrollment_id = e.id AND cert.kind = ?2
               )
             ORDER BY p.full_name, e.id",
            DETAIL_SELECT
        ))?;
        let rows = stmt
            .query_map(params![product_id, kind], EnrollmentDetail::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.execute("DELETE FROM enrollments WHERE id = ?1", params![id])?;
        Ok(count > 0)
    })
}
