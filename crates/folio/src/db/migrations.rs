//! Schema migrations.
//!
//! Each migration is a SQL file embedded at build time. Applied versions are
//! recorded in `_migrations`; a pending migration runs in its own
//! transaction together with its bookkeeping row, so a failure leaves the
//! schema at the previous version.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_participants_and_teachers",
        sql: include_str!("sql/001_create_people.sql"),
    },
    Migration {
        version: 2,
        name: "create_products",
        sql: include_str!("sql/002_create_products.sql"),
    },
    Migration {
        version: 3,
        name: "create_enrollments",
        sql: include_str!("sql/003_create_enrollments.sql"),
    },
    Migration {
        version: 4,
        name: "create_certificates",
        sql: include_str!("sql/004_create_certificates.sql"),
    },
    Migration {
        version: 5,
        name: "create_issuance_tasks",
        sql: include_str!("sql/005_create_issuance_tasks.sql"),
    },
];

/// Brings the schema up to the latest version.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    apply(conn, MIGRATIONS)
}

fn apply(conn: &Connection, migrations: &[Migration]) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in migrations.iter().filter(|m| m.version > applied) {
        log::info!("Applying migration {:03}_{}", migration.version, migration.name);

        let failed = |e: rusqlite::Error| DatabaseError::Migration {
            version: migration.version,
            reason: e.to_string(),
        };
        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(migration.sql).map_err(failed)?;
        tx.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.name],
        )
        .map_err(failed)?;
        tx.commit().map_err(failed)?;
    }

    Ok(())
}
