//! Pickup-directory mail transport.
//!
//! Messages are written as complete RFC 5322 files (`multipart/mixed`, PDF
//! attached as base64) into an outbox directory that an MTA drains. Each
//! file is written under a temporary name and renamed into place, so the
//! MTA never picks up a partial message.

use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use super::error::{DeliveryError, Result};
use super::{CertificateEmail, EmailSender};
use crate::config::SenderConfig;

const LINE_WIDTH: usize = 76;

pub struct OutboxMailer {
    directory: PathBuf,
    sender: SenderConfig,
}

impl OutboxMailer {
    pub fn new<P: AsRef<Path>>(directory: P, sender: SenderConfig) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            sender,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Builds the full message text.
    pub fn compose(&self, email: &CertificateEmail) -> Result<String> {
        validate_address(&email.recipient_email)?;

        let boundary = format!("folio-{}", uuid::Uuid::new_v4().simple());
        let domain = self
            .sender
            .email
            .rsplit_once('@')
            .map(|(_, d)| d)
            .unwrap_or("localhost");
        let subject = format!("Your certificate for {}", email.product_name);

        let mut msg = String::new();
        // Writing to a String cannot fail.
        let _ = write!(
            msg,
            "From: {}\r\n\
             To: {}\r\n\
             Subject: {}\r\n\
             Date: {}\r\n\
             Message-ID: <{}@{}>\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: multipart/mixed; boundary=\"{}\"\r\n\
             \r\n",
            mailbox(&self.sender.name, &self.sender.email),
            mailbox(&email.recipient_name, &email.recipient_email),
            encode_header(&subject),
            chrono::Utc::now().to_rfc2822(),
            uuid::Uuid::new_v4(),
            domain,
            boundary,
        );

        let body = format!(
            "Hello {},\r\n\r\n\
             Your certificate for \"{}\" is attached.\r\n\r\n\
             Folio: {}\r\n\
             Anyone can verify it at {}\r\n",
            email.recipient_name, email.product_name, email.serial, email.verification_url,
        );
        let _ = write!(
            msg,
            "--{}\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             Content-Transfer-Encoding: base64\r\n\
             \r\n\
             {}\r\n",
            boundary,
            wrap_base64(body.as_bytes()),
        );

        let _ = write!(
            msg,
            "--{}\r\n\
             Content-Type: application/pdf; name=\"{}.pdf\"\r\n\
             Content-Disposition: attachment; filename=\"{}.pdf\"\r\n\
             Content-Transfer-Encoding: base64\r\n\
             \r\n\
             {}\r\n\
             --{}--\r\n",
            boundary,
            email.serial,
            email.serial,
            wrap_base64(&email.pdf),
            boundary,
        );

        Ok(msg)
    }
}

impl EmailSender for OutboxMailer {
    fn send(&self, email: &CertificateEmail) -> Result<()> {
        let message = self.compose(email)?;

        std::fs::create_dir_all(&self.directory)?;
        let stem = format!("{}-{}", email.serial, uuid::Uuid::new_v4().simple());
        let tmp_path = self.directory.join(format!(".{}.tmp", stem));
        let final_path = self.directory.join(format!("{}.eml", stem));

        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(message.as_bytes())?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp_path, &final_path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            DeliveryError::Transport(format!(
                "could not move message into outbox {}: {}",
                self.directory.display(),
                e
            ))
        })?;

        debug!(
            "Queued certificate {} for {} at {}",
            email.serial,
            email.recipient_email,
            final_path.display()
        );
        Ok(())
    }
}

fn validate_address(address: &str) -> Result<()> {
    let valid = address
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if !valid || address.chars().any(|c| c.is_whitespace() || c == '<' || c == '>') {
        return Err(DeliveryError::InvalidRecipient(address.to_string()));
    }
    Ok(())
}

fn mailbox(name: &str, address: &str) -> String {
    if name.trim().is_empty() {
        format!("<{}>", address)
    } else if is_plain_header_text(name) {
        format!("\"{}\" <{}>", name.replace('\\', "\\\\").replace('"', "\\\""), address)
    } else {
        format!("{} <{}>", encode_header(name), address)
    }
}

/// Header text verbatim when it is printable ASCII, otherwise an RFC 2047
/// encoded-word. Raw CR or LF never reach the header block.
fn encode_header(text: &str) -> String {
    if is_plain_header_text(text) {
        text.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(text.as_bytes()))
    }
}

fn is_plain_header_text(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii() && !c.is_ascii_control())
}

fn wrap_base64(bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    encoded
        .as_bytes()
        .chunks(LINE_WIDTH)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mail_parser::{MessageParser, MimeHeaders};
    use tempfile::TempDir;

    fn mailer(dir: &Path) -> OutboxMailer {
        OutboxMailer::new(
            dir,
            SenderConfig {
                name: "Registro Académico".to_string(),
                email: "certificados@example.edu".to_string(),
            },
        )
    }

    fn sample() -> CertificateEmail {
        CertificateEmail {
            recipient_email: "maria@example.com".to_string(),
            recipient_name: "María López".to_string(),
            product_name: "Data Engineering".to_string(),
            serial: "CERT-2026-DEADBEEF".to_string(),
            verification_url: "https://certs.example.edu/verificar/CERT-2026-DEADBEEF"
                .to_string(),
            pdf: b"%PDF-1.5 fake".to_vec(),
        }
    }

    #[test]
    fn test_send_writes_parseable_message() {
        let temp_dir = TempDir::new().unwrap();
        let mailer = mailer(temp_dir.path());
        mailer.send(&sample()).unwrap();

        let files: Vec<PathBuf> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].extension().unwrap(), "eml");

        let raw = std::fs::read(&files[0]).unwrap();
        let message = MessageParser::default().parse(&raw[..]).unwrap();
        assert_eq!(message.subject(), Some("Your certificate for Data Engineering"));
        assert_eq!(message.attachment_count(), 1);

        let attachment = message.attachment(0).unwrap();
        assert_eq!(attachment.attachment_name(), Some("CERT-2026-DEADBEEF.pdf"));
        assert_eq!(attachment.contents(), b"%PDF-1.5 fake");

        let text = message.body_text(0).unwrap();
        assert!(text.contains("verificar/CERT-2026-DEADBEEF"));
    }

    #[test]
    fn test_invalid_recipient_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut email = sample();
        email.recipient_email = "not-an-address".to_string();

        let err = mailer(temp_dir.path()).send(&email).unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidRecipient(_)));
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_mailbox_formatting() {
        assert_eq!(mailbox("", "a@b.io"), "<a@b.io>");
        assert_eq!(mailbox("Ann \"A\"", "a@b.io"), "\"Ann \\\"A\\\"\" <a@b.io>");
        assert!(mailbox("Zoë", "z@b.io").starts_with("=?UTF-8?B?"));
    }

    #[test]
    fn test_line_breaks_cannot_add_headers() {
        let temp_dir = TempDir::new().unwrap();
        let mut email = sample();
        email.product_name = "Rust\r\nBcc: attacker@evil.example".to_string();
        email.recipient_name = "Eve\r\nCc: other@evil.example".to_string();
        mailer(temp_dir.path()).send(&email).unwrap();

        let path = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let raw = std::fs::read(&path).unwrap();
        let message = MessageParser::default().parse(&raw[..]).unwrap();

        assert!(message.bcc().is_none());
        assert!(message.cc().is_none());
        let subject = message.subject().unwrap();
        assert!(subject.starts_with("Your certificate for Rust"));
        assert!(subject.contains("attacker@evil.example"));
        let headers = String::from_utf8_lossy(&raw);
        let header_block = headers.split("\r\n\r\n").next().unwrap();
        assert!(!header_block.contains("Bcc:"));
        assert!(!header_block.contains("Cc:"));
    }

    #[test]
    fn test_encode_header_escapes_control_characters() {
        assert_eq!(encode_header("Plain text"), "Plain text");
        assert!(encode_header("a\nb").starts_with("=?UTF-8?B?"));
        assert!(encode_header("tab\there").starts_with("=?UTF-8?B?"));
        assert!(mailbox("Eve\r\nX: y", "e@b.io").starts_with("=?UTF-8?B?"));
    }

    #[test]
    fn test_base64_lines_are_wrapped() {
        let wrapped = wrap_base64(&[7u8; 300]);
        assert!(wrapped.split("\r\n").all(|line| line.len() <= LINE_WIDTH));
    }
}
