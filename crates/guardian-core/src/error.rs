//! Engine error types with session-scoped classification

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::contact::ContactId;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// The two independent session kinds the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Alert,
    Sharing,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Alert => write!(f, "alert"),
            SessionKind::Sharing => write!(f, "sharing"),
        }
    }
}

/// Engine error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Session Command Errors (surfaced synchronously)
    // ─────────────────────────────────────────────────────────────
    #[error("No trusted contacts selected")]
    NoContacts,

    #[error("The {kind} session is already active")]
    AlreadyActive { kind: SessionKind },

    // ─────────────────────────────────────────────────────────────
    // Degradations (recovered into session state)
    // ─────────────────────────────────────────────────────────────
    #[error("Location unavailable: {reason}")]
    LocationUnavailable { reason: String },

    #[error("Delivery to contact {contact_id} failed: {reason}")]
    DeliveryFailed { contact_id: ContactId, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Contact Store Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid contact: {message}")]
    InvalidContact { message: String },

    #[error("Contact not found: {id}")]
    ContactNotFound { id: ContactId },

    #[error("Contact store error at {path}: {message}")]
    ContactStore { path: PathBuf, message: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────
    // Channel/Communication Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn already_active(kind: SessionKind) -> Self {
        Self::AlreadyActive { kind }
    }

    pub fn location_unavailable(reason: impl Into<String>) -> Self {
        Self::LocationUnavailable {
            reason: reason.into(),
        }
    }

    pub fn delivery_failed(contact_id: ContactId, reason: impl Into<String>) -> Self {
        Self::DeliveryFailed {
            contact_id,
            reason: reason.into(),
        }
    }

    pub fn invalid_contact(message: impl Into<String>) -> Self {
        Self::InvalidContact {
            message: message.into(),
        }
    }

    pub fn contact_store(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ContactStore {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check if this error degrades a session rather than rejecting a command
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::LocationUnavailable { .. } | Error::DeliveryFailed { .. }
        )
    }

    /// Check if this error should terminate the process.
    ///
    /// Session errors never are; only a broken engine loop is.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ChannelClosed)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions (for use with color-eyre)
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        assert_eq!(Error::NoContacts.to_string(), "No trusted contacts selected");

        let err = Error::already_active(SessionKind::Sharing);
        assert_eq!(err.to_string(), "The sharing session is already active");

        let err = Error::location_unavailable("timeout");
        assert_eq!(err.to_string(), "Location unavailable: timeout");
    }

    #[test]
    fn test_delivery_failed_names_contact() {
        let err = Error::delivery_failed(ContactId::from("c-1"), "carrier rejected");
        let text = err.to_string();
        assert!(text.contains("c-1"));
        assert!(text.contains("carrier rejected"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_degradations_are_recoverable() {
        assert!(Error::location_unavailable("denied").is_recoverable());
        assert!(Error::delivery_failed(ContactId::from("a"), "x").is_recoverable());
        assert!(!Error::NoContacts.is_recoverable());
        assert!(!Error::already_active(SessionKind::Alert).is_recoverable());
    }

    #[test]
    fn test_session_errors_are_not_fatal() {
        assert!(!Error::NoContacts.is_fatal());
        assert!(!Error::already_active(SessionKind::Alert).is_fatal());
        assert!(!Error::location_unavailable("x").is_fatal());
        assert!(Error::ChannelClosed.is_fatal());
    }

    #[test]
    fn test_result_ext_preserves_error() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "nope",
        ));
        let err = res.context("reading contacts").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
