use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Stores rendered certificate PDFs as `{root}/{year}/{serial}.pdf`.
#[derive(Debug, Clone)]
pub struct CertificateStorage {
    root: PathBuf,
}

impl CertificateStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the PDF for `serial`. Never overwrites: serials are unique, so
    /// an existing file means something else already claimed the name.
    pub fn store(&self, serial: &str, year: i32, content: &[u8]) -> Result<PathBuf, StorageError> {
        let dir_path = self.root.join(year.to_string());
        self.ensure_directory(&dir_path)?;

        let file_path = dir_path.join(format!("{}.pdf", sanitize_file_stem(serial)));

        // create_new is O_CREAT | O_EXCL
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&file_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::FileExists(file_path));
            }
            Err(e) => {
                return Err(StorageError::WriteFile {
                    path: file_path,
                    source: e,
                })
            }
        };

        if let Err(e) = file.write_all(content).and_then(|_| file.sync_all()) {
            let _ = std::fs::remove_file(&file_path);
            return Err(StorageError::WriteFile {
                path: file_path,
                source: e,
            });
        }

        Ok(file_path)
    }

    pub fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        std::fs::read(path).map_err(|e| StorageError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Best-effort removal used when issuance is rolled back.
    pub fn remove(&self, path: &Path) {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove '{}': {}", path.display(), e);
            }
        }
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}

/// Keeps only characters that are safe in a file name on every platform.
fn sanitize_file_stem(serial: &str) -> String {
    serial
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
