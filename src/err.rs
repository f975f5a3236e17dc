use serde::Serialize;
use std::fmt;

/// Application error kinds, chosen so a transport can map them onto
/// meaningful 4xx/5xx codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrKind {
    /// Referenced section/student/column/row does not exist.
    NotFound,
    /// Entities exist but the operation is semantically invalid:
    /// unenrolled student, bad score, unknown aggregate function name.
    BadContent,
    /// Storage round trip failed; wraps the underlying message opaquely.
    Db,
}

impl ErrKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrKind::NotFound => "not_found",
            ErrKind::BadContent => "bad_content",
            ErrKind::Db => "db",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GradesErr {
    pub kind: ErrKind,
    pub message: String,
}

impl GradesErr {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: ErrKind::NotFound,
            message: message.into(),
        }
    }

    pub fn bad_content(message: impl Into<String>) -> Self {
        Self {
            kind: ErrKind::BadContent,
            message: message.into(),
        }
    }

    pub fn db(message: impl Into<String>) -> Self {
        Self {
            kind: ErrKind::Db,
            message: message.into(),
        }
    }
}

impl fmt::Display for GradesErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for GradesErr {}

impl From<rusqlite::Error> for GradesErr {
    fn from(e: rusqlite::Error) -> Self {
        GradesErr::db(e.to_string())
    }
}
