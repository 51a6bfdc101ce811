//! Test doubles for the renderer and mailer seams.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use folio::delivery::error::Result as DeliveryResult;
use folio::issuance::{SerialGenerator, SerialSource};
use folio::render::{CertificateDocument, PdfRenderer, RenderError};
use folio::{CertificateEmail, DeliveryError, EmailSender};

/// Renders a small fake PDF. Fails for one configurable participant name.
#[derive(Default)]
pub struct StubRenderer {
    fail_for: Mutex<Option<String>>,
    rendered: AtomicUsize,
}

impl StubRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make rendering fail for `name` (or never, with `None`).
    pub fn fail_for(&self, name: Option<&str>) {
        *self.fail_for.lock().unwrap() = name.map(str::to_string);
    }

    pub fn rendered(&self) -> usize {
        self.rendered.load(Ordering::SeqCst)
    }

    /// Bytes produced for a given serial.
    pub fn bytes_for(serial: &str) -> Vec<u8> {
        format!("%PDF-1.5\n% certificate {}\n%%EOF\n", serial).into_bytes()
    }
}

impl PdfRenderer for StubRenderer {
    fn render(&self, document: &CertificateDocument) -> Result<Vec<u8>, RenderError> {
        if self.fail_for.lock().unwrap().as_deref() == Some(document.participant_name.as_str()) {
            return Err(RenderError::Failed(format!(
                "template error for {}",
                document.participant_name
            )));
        }
        self.rendered.fetch_add(1, Ordering::SeqCst);
        Ok(Self::bytes_for(&document.serial))
    }
}

/// Records every email instead of sending it. Can be switched to fail.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<CertificateEmail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<CertificateEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl EmailSender for RecordingMailer {
    fn send(&self, email: &CertificateEmail) -> DeliveryResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Transport("connection refused".to_string()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Hands out scripted serials first, then random ones.
pub struct ScriptedSerials {
    scripted: Mutex<VecDeque<String>>,
    fallback: SerialGenerator,
    drawn: AtomicUsize,
}

impl ScriptedSerials {
    pub fn new<I, S>(serials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scripted: Mutex::new(serials.into_iter().map(Into::into).collect()),
            fallback: SerialGenerator::new("TEST"),
            drawn: AtomicUsize::new(0),
        }
    }

    /// Serials drawn so far, scripted or not.
    pub fn drawn(&self) -> usize {
        self.drawn.load(Ordering::SeqCst)
    }
}

impl SerialSource for ScriptedSerials {
    fn serial(&self, year: i32) -> Result<String, getrandom::Error> {
        self.drawn.fetch_add(1, Ordering::SeqCst);
        match self.scripted.lock().unwrap().pop_front() {
            Some(serial) => Ok(serial),
            None => self.fallback.serial(year),
        }
    }

    fn token(&self) -> Result<String, getrandom::Error> {
        self.fallback.token()
    }
}
