//! Certificate serial (folio) and verification token generation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Datelike;

const SERIAL_RANDOM_BYTES: usize = 4;
const TOKEN_BYTES: usize = 32;

/// Source of certificate serials and verification tokens.
pub trait SerialSource: Send + Sync {
    fn serial(&self, year: i32) -> Result<String, getrandom::Error>;
    fn token(&self) -> Result<String, getrandom::Error>;
}

/// Produces human-readable serials and opaque verification tokens.
#[derive(Debug, Clone)]
pub struct SerialGenerator {
    prefix: String,
}

impl SerialGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `{prefix}-{year}-{8 uppercase hex digits}`.
    pub fn serial(&self, year: i32) -> Result<String, getrandom::Error> {
        let mut bytes = [0u8; SERIAL_RANDOM_BYTES];
        getrandom::getrandom(&mut bytes)?;
        let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
        Ok(format!("{}-{}-{}", self.prefix, year, hex))
    }

    /// Serial for the current UTC year.
    pub fn serial_now(&self) -> Result<String, getrandom::Error> {
        self.serial(chrono::Utc::now().year())
    }

    /// 32 random bytes, URL-safe base64 without padding (43 characters).
    pub fn token(&self) -> Result<String, getrandom::Error> {
        let mut bytes = [0u8; TOKEN_BYTES];
        getrandom::getrandom(&mut bytes)?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}

impl SerialSource for SerialGenerator {
    fn serial(&self, year: i32) -> Result<String, getrandom::Error> {
        SerialGenerator::serial(self, year)
    }

    fn token(&self) -> Result<String, getrandom::Error> {
        SerialGenerator::token(self)
    }
}

impl Default for SerialGenerator {
    fn default() -> Self {
        Self::new("CERT")
    }
}
