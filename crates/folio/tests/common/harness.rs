//! Test harness for isolated issuance tests.
//!
//! The `TestHarness` struct owns a temporary certificates directory, an
//! in-memory database with migrations applied, a `Catalog`, and an `Issuer`
//! wired to [`StubRenderer`] and [`RecordingMailer`] so tests can inject
//! rendering and delivery failures.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use folio::db::enrollment_repo::EnrollmentDetail;
use folio::db::participant_repo::ParticipantRow;
use folio::db::product_repo::ProductRow;
use folio::db::Database;
use folio::storage::CertificateStorage;
use folio::{Catalog, IssuanceSettings, Issuer, NewProduct};

use super::fakes::{RecordingMailer, StubRenderer};

pub const BASE_URL: &str = "https://certs.example.edu";
pub const SERIAL_PREFIX: &str = "TEST";

/// Isolated environment for one integration test.
pub struct TestHarness {
    temp_dir: TempDir,
    /// Root of the stored certificate PDFs.
    pub certificates_dir: PathBuf,
    pub db: Database,
    pub catalog: Catalog,
    pub issuer: Issuer,
    pub renderer: Arc<StubRenderer>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let certificates_dir = temp_dir.path().join("certificates");
        let db = Database::open_in_memory().expect("Failed to open database");
        let renderer = Arc::new(StubRenderer::new());
        let mailer = Arc::new(RecordingMailer::new());

        let issuer = Issuer::new(
            db.clone(),
            renderer.clone(),
            mailer.clone(),
            CertificateStorage::new(&certificates_dir),
            Self::settings(),
        );

        Self {
            catalog: Catalog::new(db.clone()),
            temp_dir,
            certificates_dir,
            db,
            issuer,
            renderer,
            mailer,
        }
    }

    pub fn settings() -> IssuanceSettings {
        IssuanceSettings {
            base_url: BASE_URL.to_string(),
            serial_prefix: SERIAL_PREFIX.to_string(),
            serial_retry_limit: 3,
        }
    }

    pub fn temp_path(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    /// Creates a product with the given hours and optional competencies.
    pub fn product(&self, name: &str, hours: u32, competencies: Option<&str>) -> ProductRow {
        self.catalog
            .create_product(NewProduct {
                name: name.to_string(),
                hours,
                competencies: competencies.map(str::to_string),
                ..Default::default()
            })
            .expect("Failed to create product")
    }

    /// Creates a participant with an email derived from the name.
    pub fn participant(&self, name: &str) -> ParticipantRow {
        self.catalog
            .create_participant(name, &email_for(name))
            .expect("Failed to create participant")
    }

    /// Creates a teacher and assigns it to the product.
    pub fn teacher(&self, product: &ProductRow, name: &str) {
        let teacher = self
            .catalog
            .create_teacher(name, &email_for(name))
            .expect("Failed to create teacher");
        self.catalog
            .assign_teacher(&product.id, &teacher.id)
            .expect("Failed to assign teacher");
    }

    /// Enrolls a new participant called `name` and returns the enrollment id.
    pub fn enroll(&self, product: &ProductRow, name: &str) -> String {
        let participant = self.participant(name);
        self.catalog
            .enroll(&participant.id, &product.id)
            .expect("Failed to enroll")
            .id
    }

    /// Product with one enrollment per name.
    pub fn course_with(&self, product_name: &str, names: &[&str]) -> (ProductRow, Vec<String>) {
        let product = self.product(product_name, 20, None);
        let enrollments = names.iter().map(|n| self.enroll(&product, n)).collect();
        (product, enrollments)
    }

    pub fn enrollment(&self, id: &str) -> EnrollmentDetail {
        self.catalog.enrollment(id).expect("Failed to load enrollment")
    }

    /// Number of PDF files under the certificates directory.
    pub fn stored_pdf_count(&self) -> usize {
        if !self.certificates_dir.exists() {
            return 0;
        }
        walk(&self.certificates_dir)
            .into_iter()
            .filter(|p| p.extension().is_some_and(|e| e == "pdf"))
            .count()
    }
}

pub fn email_for(name: &str) -> String {
    let local: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(".")
        .to_lowercase();
    format!("{}@example.edu", local)
}

fn walk(dir: &std::path::Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).expect("Failed to read directory") {
        let path = entry.expect("Failed to read entry").path();
        if path.is_dir() {
            files.extend(walk(&path));
        } else {
            files.push(path);
        }
    }
    files
}
