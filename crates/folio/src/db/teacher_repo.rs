//! Teacher repository: CRUD operations for the `teachers` table.

use rusqlite::{params, Row};

use super::{query_optional, Database, DatabaseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeacherRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub created_at: String,
}

impl TeacherRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            full_name: row.get("full_name")?,
            email: row.get("email")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn insert(db: &Database, teacher: &TeacherRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO teachers (id, full_name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                teacher.id,
                teacher.full_name,
                teacher.email,
                teacher.created_at
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<TeacherRow>, DatabaseError> {
    db.with_conn(|conn| {
        query_optional(
            conn,
            "SELECT * FROM teachers WHERE id = ?1",
            params![id],
            TeacherRow::from_row,
        )
    })
}

pub fn list(db: &Database) -> Result<Vec<TeacherRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM teachers ORDER BY full_name, id")?;
        let rows = stmt
            .query_map([], TeacherRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Lists the teachers assigned to a product, ordered by name.
pub fn list_for_product(db: &Database, product_id: &str) -> Result<Vec<TeacherRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT t.* FROM teachers t
             JOIN product_teachers pt ON pt.teacher_id = t.id
             WHERE pt.product_id = ?1
             ORDER BY t.full_name, t.id",
        )?;
        let rows = stmt
            .query_map(params![product_id], TeacherRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
