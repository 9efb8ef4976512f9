//! Shared error taxonomy for zq.
//!
//! Every component returns a tagged [`Error`] rather than a grab-bag of
//! per-type errors. The tag determines how the HTTP layer maps the error
//! to a status code (spec §6): `Invalid -> 400`, `NotFound -> 404`,
//! `Exists -> 400`, `Conflict -> 409`, anything untagged -> `500`.

use std::fmt;
use thiserror::Error;

/// Result alias used throughout the zq crates.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of a tagged error, used for HTTP status mapping and for
/// callers that want to branch on category without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Malformed input, unsatisfiable request, or a caller contract
    /// violation (e.g. forward search on a reverse-sorted archive).
    Invalid,
    /// The referenced space, chunk, or file does not exist.
    NotFound,
    /// The caller tried to create something that already exists.
    Exists,
    /// The operation conflicts with another in-flight operation
    /// (space deletion vs. a running query, for example).
    Conflict,
    /// Unclassified failure; surfaced to callers as a 500.
    Internal,
}

impl Kind {
    /// The HTTP status code this error kind maps to, per spec §6.
    pub fn status_code(self) -> u16 {
        match self {
            Kind::Invalid => 400,
            Kind::NotFound => 404,
            Kind::Exists => 400,
            Kind::Conflict => 409,
            Kind::Internal => 500,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Kind::Invalid => "invalid",
            Kind::NotFound => "not_found",
            Kind::Exists => "exists",
            Kind::Conflict => "conflict",
            Kind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// A tagged error carrying a human message and an optional wrapped cause.
///
/// This is deliberately not an enum-per-call-site: spec §7 calls for a
/// small, stable taxonomy (`Invalid/NotFound/Exists/Conflict/untagged`)
/// rather than a type explosion, so that every layer from a processor
/// fault up through the HTTP response can agree on how to classify a
/// failure.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: Kind,
    message: String,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    /// Build a new tagged error with no wrapped cause.
    pub fn new(kind: Kind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Attach a wrapped cause to this error (for error chains).
    #[must_use]
    pub fn with_cause(
        mut self,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Shorthand for [`Kind::Invalid`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::new(Kind::Invalid, message)
    }

    /// Shorthand for [`Kind::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::new(Kind::NotFound, message)
    }

    /// Shorthand for [`Kind::Exists`].
    pub fn exists(message: impl Into<String>) -> Self {
        Error::new(Kind::Exists, message)
    }

    /// Shorthand for [`Kind::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Error::new(Kind::Conflict, message)
    }

    /// Shorthand for [`Kind::Internal`]; used for wrapping I/O and other
    /// unclassified failures.
    pub fn internal(message: impl Into<String>) -> Self {
        Error::new(Kind::Internal, message)
    }

    /// The error's classification.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The HTTP status code this error should be reported as.
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::new(Kind::Internal, e.to_string()).with_cause(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::new(Kind::Invalid, e.to_string()).with_cause(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_spec_table() {
        assert_eq!(Error::invalid("x").status_code(), 400);
        assert_eq!(Error::not_found("x").status_code(), 404);
        assert_eq!(Error::exists("x").status_code(), 400);
        assert_eq!(Error::conflict("x").status_code(), 409);
        assert_eq!(Error::internal("x").status_code(), 500);
    }

    #[test]
    fn display_includes_kind_and_message() {
        let e = Error::not_found("space sp_x");
        assert_eq!(e.to_string(), "not_found: space sp_x");
    }

    #[test]
    fn io_error_converts_to_internal() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let e: Error = io_err.into();
        assert_eq!(e.kind(), Kind::Internal);
        assert!(std::error::Error::source(&e).is_some());
    }
}
