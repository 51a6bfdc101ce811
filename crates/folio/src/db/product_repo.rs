//! Product repository: educational products (courses) and their teachers.

use rusqlite::{params, Row};

use super::{query_optional, Database, DatabaseError};

/// A raw product row from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub hours: u32,
    /// Competencies text printed on `competencies` certificates.
    pub competencies: Option<String>,
    pub starts_on: Option<String>,
    pub ends_on: Option<String>,
    pub created_at: String,
}

impl ProductRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            hours: row.get("hours")?,
            competencies: row.get("competencies")?,
            starts_on: row.get("starts_on")?,
            ends_on: row.get("ends_on")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Returns the competencies text when it has visible content.
    pub fn competencies_text(&self) -> Option<&str> {
        self.competencies
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

pub fn insert(db: &Database, product: &ProductRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO products (id, name, hours, competencies, starts_on, ends_on, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                product.id,
                product.name,
                product.hours,
                product.competencies,
                product.starts_on,
                product.ends_on,
                product.created_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<ProductRow>, DatabaseError> {
    db.with_conn(|conn| {
        query_optional(
            conn,
            "SELECT * FROM products WHERE id = ?1",
            params![id],
            ProductRow::from_row,
        )
    })
}

pub fn list(db: &Database) -> Result<Vec<ProductRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM products ORDER BY name, id")?;
        let rows = stmt
            .query_map([], ProductRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Replaces the competencies text. Returns whether the product exists.
pub fn update_competencies(
    db: &Database,
    id: &str,
    competencies: Option<&str>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.execute(
            "UPDATE products SET competencies = ?2 WHERE id = ?1",
            params![id, competencies],
        )?;
        Ok(count > 0)
    })
}

/// Assigns a teacher to a product. Assigning twice is a no-op.
pub fn assign_teacher(
    db: &Database,
    product_id: &str,
    teacher_id: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO product_teachers (product_id, teacher_id) VALUES (?1, ?2)",
            params![product_id, teacher_id],
        )?;
        Ok(())
    })
}

/// Names of the teachers assigned to a product, sorted.
pub fn teacher_names(db: &Database, product_id: &str) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT t.full_name FROM teachers t
             JOIN product_teachers pt ON pt.teacher_id = t.id
             WHERE pt.product_id = ?1
             ORDER BY t.full_name",
        )?;
        let names = stmt
            .query_map(params![product_id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    })
}
