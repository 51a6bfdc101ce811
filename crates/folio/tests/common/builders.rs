//! Builders for configuration files used by loading and wiring tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

/// Builder for a `folio` JSON configuration.
pub struct ConfigBuilder {
    value: Value,
}

impl ConfigBuilder {
    /// Minimal valid configuration rooted at `base`.
    pub fn new(base: &Path) -> Self {
        Self {
            value: json!({
                "version": "1.0",
                "database_path": base.join("folio.db").to_string_lossy(),
                "certificates_directory": base.join("certificates").to_string_lossy(),
                "outbox_directory": base.join("outbox").to_string_lossy(),
                "base_url": "https://certs.example.edu",
                "worker_count": 2,
                "sender": {
                    "name": "Academic Office",
                    "email": "certificates@example.edu"
                }
            }),
        }
    }

    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.value[key] = value;
        self
    }

    pub fn remove(mut self, key: &str) -> Self {
        if let Some(map) = self.value.as_object_mut() {
            map.remove(key);
        }
        self
    }

    pub fn serial_prefix(self, prefix: &str) -> Self {
        self.set("serial_prefix", json!(prefix))
    }

    pub fn logging(self, level: &str, json_output: bool) -> Self {
        self.set("logging", json!({ "level": level, "json": json_output }))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.value).expect("Failed to serialize config")
    }

    /// Writes the configuration to `dir/folio.json`.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join("folio.json");
        std::fs::write(&path, self.to_json()).expect("Failed to write config");
        path
    }
}
