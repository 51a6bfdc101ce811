//! Enumerations shared by the database layer and the issuance workflow.
//!
//! Each enum is stored as lowercase snake_case text and round-trips through
//! rusqlite via `ToSql`/`FromSql`.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

macro_rules! sql_text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Returns the stored text representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }

            /// Parses the stored text representation.
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some($ty::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                $ty::parse(text).ok_or_else(|| {
                    FromSqlError::Other(
                        format!("unknown {} value '{}'", stringify!($ty), text).into(),
                    )
                })
            }
        }
    };
}

/// Certificate category. Determines template wording and validation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateKind {
    Attendance,
    Approval,
    Participation,
    /// Approval certificate listing the product's competencies.
    Competencies,
}

sql_text_enum!(CertificateKind {
    Attendance => "attendance",
    Approval => "approval",
    Participation => "participation",
    Competencies => "competencies",
});

impl CertificateKind {
    /// Whether the product must define competencies text for this kind.
    pub fn requires_competencies(&self) -> bool {
        matches!(self, CertificateKind::Competencies)
    }

    /// Headline printed on the rendered certificate.
    pub fn title(&self) -> &'static str {
        match self {
            CertificateKind::Attendance => "Certificate of Attendance",
            CertificateKind::Approval => "Certificate of Approval",
            CertificateKind::Participation => "Certificate of Participation",
            CertificateKind::Competencies => "Certificate of Competencies",
        }
    }
}

/// Lifecycle status of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    InProcess,
    MissingRequirements,
    NotCompleted,
    Ready,
    Revoked,
}

sql_text_enum!(CertificateStatus {
    InProcess => "in_process",
    MissingRequirements => "missing_requirements",
    NotCompleted => "not_completed",
    Ready => "ready",
    Revoked => "revoked",
});

impl CertificateStatus {
    /// Whether the certificate can be looked up publicly.
    pub fn is_public(&self) -> bool {
        matches!(self, CertificateStatus::Ready | CertificateStatus::Revoked)
    }
}

/// Email delivery state of an issued certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

sql_text_enum!(DeliveryStatus {
    Pending => "pending",
    Sent => "sent",
    Failed => "failed",
});

/// State of a queued bulk issuance task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

sql_text_enum!(TaskStatus {
    Queued => "queued",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
});

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}
