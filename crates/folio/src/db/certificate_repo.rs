//! Certificate repository: persistence for issued certificates.
//!
//! The table carries a UNIQUE index on `(enrollment_id, kind)` plus UNIQUE
//! `serial` and `verification_token` columns. Callers rely on the resulting
//! constraint errors (see [`DatabaseError::violates`]) to settle races.

use rusqlite::{params, Row};

use super::{query_optional, Database, DatabaseError};
use crate::model::{CertificateKind, CertificateStatus, DeliveryStatus};

/// Qualified column names as reported in UNIQUE violations.
pub const ENROLLMENT_KIND_COLUMN: &str = "certificates.enrollment_id";
pub const SERIAL_COLUMN: &str = "certificates.serial";
pub const TOKEN_COLUMN: &str = "certificates.verification_token";

/// A certificate row from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRow {
    pub id: String,
    pub enrollment_id: String,
    pub kind: CertificateKind,
    pub serial: String,
    pub verification_token: String,
    pub status: CertificateStatus,
    pub pdf_path: Option<String>,
    pub emitted_at: Option<String>,
    pub delivery_status: DeliveryStatus,
    pub delivery_error: Option<String>,
    pub delivery_attempts: u32,
    pub delivered_at: Option<String>,
    pub revoked_at: Option<String>,
    pub revocation_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl CertificateRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            enrollment_id: row.get("enrollment_id")?,
            kind: row.get("kind")?,
            serial: row.get("serial")?,
            verification_token: row.get("verification_token")?,
            status: row.get("status")?,
            pdf_path: row.get("pdf_path")?,
            emitted_at: row.get("emitted_at")?,
            delivery_status: row.get("delivery_status")?,
            delivery_error: row.get("delivery_error")?,
            delivery_attempts: row.get("delivery_attempts")?,
            delivered_at: row.get("delivered_at")?,
            revoked_at: row.get("revoked_at")?,
            revocation_reason: row.get("revocation_reason")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Fields of a certificate row created when issuance starts.
#[derive(Debug, Clone)]
pub struct NewCertificate {
    pub id: String,
    pub enrollment_id: String,
    pub kind: CertificateKind,
    pub serial: String,
    pub verification_token: String,
    pub created_at: String,
}

/// Lookup key for public verification.
#[derive(Debug, Clone, Copy)]
pub enum VerificationKey<'a> {
    Serial(&'a str),
    Token(&'a str),
}

/// Public-safe view of a certificate joined with participant and product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRow {
    pub serial: String,
    pub kind: CertificateKind,
    pub status: CertificateStatus,
    pub emitted_at: Option<String>,
    pub revoked_at: Option<String>,
    pub participant_name: String,
    pub product_id: String,
    pub product_name: String,
    pub hours: u32,
}

/// Inserts a certificate in `in_process` status with pending delivery.
pub fn insert_in_process(db: &Database, cert: &NewCertificate) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO certificates (id, enrollment_id, kind, serial, verification_token,
             status, delivery_status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                cert.id,
                cert.enrollment_id,
                cert.kind,
                cert.serial,
                cert.verification_token,
                CertificateStatus::InProcess,
                DeliveryStatus::Pending,
                cert.created_at,
            ],
        )?;
        Ok(())
    })
}

/// Marks an in-process certificate as ready with its stored PDF.
pub fn mark_ready(
    db: &Database,
    id: &str,
    pdf_path: &str,
    emitted_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.execute(
            "UPDATE certificates SET status = ?2, pdf_path = ?3, emitted_at = ?4, updated_at = ?4
             WHERE id = ?1 AND status = ?5",
            params![
                id,
                CertificateStatus::Ready,
                pdf_path,
                emitted_at,
                CertificateStatus::InProcess,
            ],
        )?;
        Ok(count > 0)
    })
}

/// Deletes a certificate row. Used to roll back a failed issuance.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.execute("DELETE FROM certificates WHERE id = ?1", params![id])?;
        Ok(count > 0)
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<CertificateRow>, DatabaseError> {
    db.with_conn(|conn| {
        query_optional(
            conn,
            "SELECT * FROM certificates WHERE id = ?1",
            params![id],
            CertificateRow::from_row,
        )
    })
}

pub fn find_by_serial(db: &Database, serial: &str) -> Result<Option<CertificateRow>, DatabaseError> {
    db.with_conn(|conn| {
        query_optional(
            conn,
            "SELECT * FROM certificates WHERE serial = ?1",
            params![serial],
            CertificateRow::from_row,
        )
    })
}

pub fn find_by_token(db: &Database, token: &str) -> Result<Option<CertificateRow>, DatabaseError> {
    db.with_conn(|conn| {
        query_optional(
            conn,
            "SELECT * FROM certificates WHERE verification_token = ?1",
            params![token],
            CertificateRow::from_row,
        )
    })
}

/// Finds the certificate of `kind` for an enrollment, if any.
pub fn find_for_enrollment(
    db: &Database,
    enrollment_id: &str,
    kind: CertificateKind,
) -> Result<Option<CertificateRow>, DatabaseError> {
    db.with_conn(|conn| {
        query_optional(
            conn,
            "SELECT * FROM certificates WHERE enrollment_id = ?1 AND kind = ?2",
            params![enrollment_id, kind],
            CertificateRow::from_row,
        )
    })
}

/// Lists the certificates issued for a product's enrollments.
pub fn list_for_product(
    db: &Database,
    product_id: &str,
) -> Result<Vec<CertificateRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT cert.* FROM certificates cert
             JOIN enrollments e ON e.id = cert.enrollment_id
             WHERE e.product_id = ?1
             ORDER BY cert.created_at, cert.id",
        )?;
        let rows = stmt
            .query_map(params![product_id], CertificateRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Ready certificates whose last delivery attempt failed.
pub fn list_failed_deliveries(db: &Database) -> Result<Vec<CertificateRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM certificates
             WHERE status = ?1 AND delivery_status = ?2
             ORDER BY created_at, id",
        )?;
        let rows = stmt
            .query_map(
                params![CertificateStatus::Ready, DeliveryStatus::Failed],
                CertificateRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Records the outcome of one delivery attempt.
pub fn record_delivery(
    db: &Database,
    id: &str,
    status: DeliveryStatus,
    error: Option<&str>,
    at: &str,
) -> Result<(), DatabaseError> {
    let delivered_at = (status == DeliveryStatus::Sent).then_some(at);
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE certificates SET delivery_status = ?2, delivery_error = ?3,
             delivery_attempts = delivery_attempts + 1,
             delivered_at = COALESCE(?4, delivered_at), updated_at = ?5
             WHERE id = ?1",
            params![id, status, error, delivered_at, at],
        )?;
        Ok(())
    })
}

/// Revokes a ready certificate. Returns false if it was not `ready`.
pub fn revoke(
    db: &Database,
    id: &str,
    reason: Option<&str>,
    at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.execute(
            "UPDATE certificates SET status = ?2, revoked_at = ?3, revocation_reason = ?4,
             updated_at = ?3
             WHERE id = ?1 AND status = ?5",
            params![
                id,
                CertificateStatus::Revoked,
                at,
                reason,
                CertificateStatus::Ready,
            ],
        )?;
        Ok(count > 0)
    })
}

/// Joins a certificate with its participant and product for verification.
pub fn find_verification(
    db: &Database,
    key: VerificationKey<'_>,
) -> Result<Option<VerificationRow>, DatabaseError> {
    let (column, value) = match key {
        VerificationKey::Serial(s) => ("cert.serial", s),
        VerificationKey::Token(t) => ("cert.verification_token", t),
    };
    db.with_conn(|conn| {
        query_optional(
            conn,
            &format!(
                "SELECT cert.serial, cert.kind, cert.status, cert.emitted_at, cert.revoked_at,
                        p.full_name AS participant_name,
                        c.id AS product_id, c.name AS product_name, c.hours
                 FROM certificates cert
                 JOIN enrollments e ON e.id = cert.enrollment_id
                 JOIN participants p ON p.id = e.participant_id
                 JOIN products c ON c.id = e.product_id
                 WHERE {} = ?1",
                column
            ),
            params![value],
            |row| {
                Ok(VerificationRow {
                    serial: row.get("serial")?,
                    kind: row.get("kind")?,
                    status: row.get("status")?,
                    emitted_at: row.get("emitted_at")?,
                    revoked_at: row.get("revoked_at")?,
                    participant_name: row.get("participant_name")?,
                    product_id: row.get("product_id")?,
                    product_name: row.get("product_name")?,
                    hours: row.get("hours")?,
                })
            },
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO participants (id, full_name, email, created_at)
                    VALUES ('p1', 'Lucía Gómez', 'lucia@x.io', 'now');
                 INSERT INTO products (id, name, hours, created_at)
                    VALUES ('c1', 'Databases', 30, 'now');
                 INSERT INTO enrollments (id, participant_id, product_id, created_at)
                    VALUES ('e1', 'p1', 'c1', 'now');",
            )?;
            Ok(())
        })
        .unwrap();
        db
    }

    fn new_cert(id: &str, kind: CertificateKind, serial: &str, token: &str) -> NewCertificate {
        NewCertificate {
            id: id.to_string(),
            enrollment_id: "e1".to_string(),
            kind,
            serial: serial.to_string(),
            verification_token: token.to_string(),
            created_at: "2026-03-01T10:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_insert_starts_in_process_and_pending() {
        let db = seeded();
        insert_in_process(&db, &new_cert("x1", CertificateKind::Approval, "S1", "T1")).unwrap();

        let row = find_by_id(&db, "x1").unwrap().unwrap();
        assert_eq!(row.status, CertificateStatus::InProcess);
        assert_eq!(row.delivery_status, DeliveryStatus::Pending);
        assert_eq!(row.delivery_attempts, 0);
        assert!(row.pdf_path.is_none());
    }

    #[test]
    fn test_enrollment_kind_uniqueness() {
        let db = seeded();
        insert_in_process(&db, &new_cert("x1", CertificateKind::Approval, "S1", "T1")).unwrap();

        let err = insert_in_process(&db, &new_cert("x2", CertificateKind::Approval, "S2", "T2"))
            .unwrap_err();
        assert!(err.violates(ENROLLMENT_KIND_COLUMN));

        // Another kind for the same enrollment is fine.
        insert_in_process(&db, &new_cert("x3", CertificateKind::Attendance, "S3", "T3")).unwrap();
    }

    #[test]
    fn test_serial_and_token_uniqueness() {
        let db = seeded();
        insert_in_process(&db, &new_cert("x1", CertificateKind::Approval, "S1", "T1")).unwrap();

        let err = insert_in_process(&db, &new_cert("x2", CertificateKind::Attendance, "S1", "T2"))
            .unwrap_err();
        assert!(err.violates(SERIAL_COLUMN));

        let err = insert_in_process(&db, &new_cert("x3", CertificateKind::Attendance, "S3", "T1"))
            .unwrap_err();
        assert!(err.violates(TOKEN_COLUMN));
    }

    #[test]
    fn test_mark_ready_only_from_in_process() {
        let db = seeded();
        insert_in_process(&db, &new_cert("x1", CertificateKind::Approval, "S1", "T1")).unwrap();

        assert!(mark_ready(&db, "x1", "/certs/S1.pdf", "2026-03-01T10:00:01+00:00").unwrap());
        assert!(!mark_ready(&db, "x1", "/other.pdf", "2026-03-01T10:00:02+00:00").unwrap());

        let row = find_by_serial(&db, "S1").unwrap().unwrap();
        assert_eq!(row.status, CertificateStatus::Ready);
        assert_eq!(row.pdf_path.as_deref(), Some("/certs/S1.pdf"));
        assert!(row.emitted_at.is_some());
    }

    #[test]
    fn test_find_for_enrollment_and_token() {
        let db = seeded();
        insert_in_process(&db, &new_cert("x1", CertificateKind::Approval, "S1", "T1")).unwrap();

        assert!(find_for_enrollment(&db, "e1", CertificateKind::Approval)
            .unwrap()
            .is_some());
        assert!(find_for_enrollment(&db, "e1", CertificateKind::Participation)
            .unwrap()
            .is_none());
        assert_eq!(find_by_token(&db, "T1").unwrap().unwrap().id, "x1");
    }

    #[test]
    fn test_record_delivery_counts_attempts() {
        let db = seeded();
        insert_in_process(&db, &new_cert("x1", CertificateKind::Approval, "S1", "T1")).unwrap();
        mark_ready(&db, "x1", "/certs/S1.pdf", "2026-03-01T10:00:01+00:00").unwrap();
        assert!(list_failed_deliveries(&db).unwrap().is_empty());

        record_delivery(&db, "x1", DeliveryStatus::Failed, Some("smtp down"), "t1").unwrap();
        assert_eq!(list_failed_deliveries(&db).unwrap().len(), 1);

        record_delivery(&db, "x1", DeliveryStatus::Sent, None, "t2").unwrap();
        let row = find_by_id(&db, "x1").unwrap().unwrap();
        assert_eq!(row.delivery_status, DeliveryStatus::Sent);
        assert_eq!(row.delivery_attempts, 2);
        assert_eq!(row.delivered_at.as_deref(), Some("t2"));
        assert!(row.delivery_error.is_none());
        assert!(list_failed_deliveries(&db).unwrap().is_empty());
    }

    #[test]
    fn test_revoke_requires_ready() {
        let db = seeded();
        insert_in_process(&db, &new_cert("x1", CertificateKind::Approval, "S1", "T1")).unwrap();
        assert!(!revoke(&db, "x1", Some("typo"), "t").unwrap());

        mark_ready(&db, "x1", "/certs/S1.pdf", "t0").unwrap();
        assert!(revoke(&db, "x1", Some("typo in name"), "t1").unwrap());
        let row = find_by_id(&db, "x1").unwrap().unwrap();
        assert_eq!(row.status, CertificateStatus::Revoked);
        assert_eq!(row.revocation_reason.as_deref(), Some("typo in name"));
    }

    #[test]
    fn test_find_verification_joins_data() {
        let db = seeded();
        insert_in_process(&db, &new_cert("x1", CertificateKind::Approval, "S1", "T1")).unwrap();

        let by_serial = find_verification(&db, VerificationKey::Serial("S1"))
            .unwrap()
            .unwrap();
        assert_eq!(by_serial.participant_name, "Lucía Gómez");
        assert_eq!(by_serial.product_name, "Databases");
        assert_eq!(by_serial.hours, 30);

        let by_token = find_verification(&db, VerificationKey::Token("T1"))
            .unwrap()
            .unwrap();
        assert_eq!(by_token, by_serial);
        assert!(find_verification(&db, VerificationKey::Serial("nope"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_list_for_product_and_delete() {
        let db = seeded();
        insert_in_process(&db, &new_cert("x1", CertificateKind::Approval, "S1", "T1")).unwrap();
        assert_eq!(list_for_product(&db, "c1").unwrap().len(), 1);

        assert!(delete(&db, "x1").unwrap());
        assert!(list_for_product(&db, "c1").unwrap().is_empty());
    }
}
