//! Participant repository: CRUD operations for the `participants` table.

use rusqlite::{params, Row};

use super::{query_optional, Database, DatabaseError};

/// A raw participant row from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub created_at: String,
}

impl ParticipantRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            full_name: row.get("full_name")?,
            email: row.get("email")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts a new participant row.
pub fn insert(db: &Database, participant: &ParticipantRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO participants (id, full_name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                participant.id,
                participant.full_name,
                participant.email,
                participant.created_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a participant by ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<ParticipantRow>, DatabaseError> {
    db.with_conn(|conn| {
        query_optional(
            conn,
            "SELECT * FROM participants WHERE id = ?1",
            params![id],
            ParticipantRow::from_row,
        )
    })
}

/// Finds a participant by email (case-insensitive).
pub fn find_by_email(db: &Database, email: &str) -> Result<Option<ParticipantRow>, DatabaseError> {
    db.with_conn(|conn| {
        query_optional(
            conn,
            "SELECT * FROM participants WHERE lower(email) = lower(?1)",
            params![email],
            ParticipantRow::from_row,
        )
    })
}

/// Lists all participants ordered by name.
pub fn list(db: &Database) -> Result<Vec<ParticipantRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM participants ORDER BY full_name, id")?;
        let rows = stmt
            .query_map([], ParticipantRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Deletes a participant. Returns whether a row was removed.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.execute("DELETE FROM participants WHERE id = ?1", params![id])?;
        Ok(count > 0)
    })
}
