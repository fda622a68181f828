//! Redirection: structured control transfer raised during construction.
//!
//! A redirection is not a bug report. It diverts the output of the request
//! that is being constructed (to an error page, to another target, or to a
//! raw status) and travels up through nested evaluations as the `Err` side
//! of `Result<_, Redirection>` until a request-level handler consumes it.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum RedirectKind {
    /// Generic construction failure, reported with status 500.
    StandardError,
    /// Raw status-style redirect.
    Status(u16),
    /// Redirect to an alternate target (definition name or location).
    Location(String),
}

impl fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StandardError => write!(f, "standard error"),
            Self::Status(status) => write!(f, "status {status}"),
            Self::Location(location) => write!(f, "redirect to {location}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct Redirection {
    kind: RedirectKind,
    message: String,
}

impl Redirection {
    pub const STANDARD_ERROR: u16 = 500;

    pub fn new(kind: RedirectKind, message: impl Into<String>) -> Self {
        let redirection = Self {
            kind,
            message: message.into(),
        };
        tracing::debug!(kind = %redirection.kind, message = %redirection.message, "redirection raised");
        redirection
    }

    pub fn standard(message: impl Into<String>) -> Self {
        Self::new(RedirectKind::StandardError, message)
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::new(RedirectKind::Status(status), message)
    }

    pub fn location(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(RedirectKind::Location(location.into()), message)
    }

    pub fn undefined_name(name: &str) -> Self {
        Self::standard(format!("undefined name '{name}'"))
    }

    pub fn kind(&self) -> &RedirectKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_standard_error(&self) -> bool {
        self.kind == RedirectKind::StandardError
    }

    /// Status a request handler should answer with.
    pub fn status_code(&self) -> u16 {
        match self.kind {
            RedirectKind::StandardError => Self::STANDARD_ERROR,
            RedirectKind::Status(status) => status,
            RedirectKind::Location(_) => 302,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Redirection::standard("boom").status_code(), 500);
        assert_eq!(Redirection::status(404, "missing").status_code(), 404);
        assert_eq!(Redirection::location("login", "auth").status_code(), 302);
    }

    #[test]
    fn test_undefined_name_message() {
        let redirection = Redirection::undefined_name("nope");
        assert!(redirection.is_standard_error());
        assert_eq!(redirection.to_string(), "undefined name 'nope'");
    }
}
