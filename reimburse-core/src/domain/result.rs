//! Result and error types for the core library

use serde::Serialize;
use thiserror::Error;

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Form API error: {0}")]
    Api(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a form API error
    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a workbook error
    pub fn workbook(msg: impl Into<String>) -> Self {
        Self::Workbook(msg.into())
    }

    /// Whether this error must end the run.
    ///
    /// Credential failures abort. Storage failures abort too, because they
    /// are only surfaced while publishing outputs. Everything else is
    /// degraded by the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::Storage(_))
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// A value that may have been recovered from bad input.
///
/// Components that "fill missing and continue" return this instead of an
/// error so the caller decides where the anomaly gets reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Outcome<T> {
    Clean(T),
    Degraded { value: T, reason: String },
}

impl<T> Outcome<T> {
    pub fn clean(value: T) -> Self {
        Outcome::Clean(value)
    }

    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Outcome::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Clean(_) => None,
            Outcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Clean(value) | Outcome::Degraded { value, .. } => value,
        }
    }

    /// Drop the anomaly and keep the value
    pub fn into_value(self) -> T {
        match self {
            Outcome::Clean(value) | Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Clean(value) => Outcome::Clean(f(value)),
            Outcome::Degraded { value, reason } => Outcome::Degraded {
                value: f(value),
                reason,
            },
        }
    }

    /// Split into the value and the anomaly reason, if any
    pub fn into_parts(self) -> (T, Option<String>) {
        match self {
            Outcome::Clean(value) => (value, None),
            Outcome::Degraded { value, reason } => (value, Some(reason)),
        }
    }
}

impl<T: Default> Outcome<T> {
    /// Degrade to the type's empty value
    pub fn empty(reason: impl Into<String>) -> Self {
        Outcome::degraded(T::default(), reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_clean() {
        let outcome = Outcome::clean(42);
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.reason(), None);
        assert_eq!(outcome.into_value(), 42);
    }

    #[test]
    fn test_outcome_degraded_keeps_value() {
        let outcome: Outcome<Vec<i32>> = Outcome::degraded(vec![1, 2], "page 3 failed");
        assert!(outcome.is_degraded());
        assert_eq!(outcome.reason(), Some("page 3 failed"));

        let (value, reason) = outcome.map(|v| v.len()).into_parts();
        assert_eq!(value, 2);
        assert_eq!(reason.as_deref(), Some("page 3 failed"));
    }

    #[test]
    fn test_outcome_empty() {
        let outcome: Outcome<Vec<String>> = Outcome::empty("roster missing");
        assert!(outcome.value().is_empty());
        assert!(outcome.is_degraded());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::auth("401").is_fatal());
        assert!(Error::storage("upload failed").is_fatal());
        assert!(!Error::api("timeout").is_fatal());
        assert!(!Error::validation("bad row").is_fatal());
    }
}
