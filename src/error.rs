//! Unified error type for the rule store, the remote client, and operator commands.
//!
//! `AppError` serializes as `{ "kind": "...", "message": "..." }` so a front end
//! can programmatically distinguish error categories.

use serde::ser::SerializeStruct;

/// Application-level error returned by commands and remote calls.
///
/// A declined delete confirmation is not an error; see
/// [`DeleteOutcome`](crate::store::DeleteOutcome).
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Invalid operator input. Raised before any network call.
    #[error("{0}")]
    Validation(String),

    /// Network failure, non-success HTTP status, or an undecodable body.
    #[error("{0}")]
    RemoteUnavailable(String),

    /// Bad runtime configuration (environment overrides).
    #[error("{0}")]
    Config(String),

    /// I/O and OS-level errors.
    #[error("{0}")]
    Io(String),
}

impl AppError {
    /// Returns the error kind as a string matching the variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "Validation",
            AppError::RemoteUnavailable(_) => "RemoteUnavailable",
            AppError::Config(_) => "Config",
            AppError::Io(_) => "Io",
        }
    }

    /// Whether the rule store should degrade to its shadow store on this error.
    pub fn is_remote(&self) -> bool {
        matches!(self, AppError::RemoteUnavailable(_))
    }
}

/// Custom Serialize: produces `{ "kind": "Variant", "message": "..." }` for the front end.
impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut s = serializer.serialize_struct("AppError", 2)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

// ---- From implementations for ergonomic error conversion ----

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::RemoteUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::RemoteUnavailable(format!("malformed payload: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_returns_correct_variant_name() {
        assert_eq!(AppError::Validation("bad".into()).kind(), "Validation");
        assert_eq!(
            AppError::RemoteUnavailable("down".into()).kind(),
            "RemoteUnavailable"
        );
        assert_eq!(AppError::Config("cfg".into()).kind(), "Config");
        assert_eq!(AppError::Io("io fail".into()).kind(), "Io");
    }

    #[test]
    fn test_error_display_shows_message() {
        let err = AppError::Validation("Select a country".into());
        assert_eq!(err.to_string(), "Select a country");
    }

    #[test]
    fn test_error_serializes_as_kind_and_message() {
        let err = AppError::RemoteUnavailable("HTTP 502 Bad Gateway".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "RemoteUnavailable");
        assert_eq!(json["message"], "HTTP 502 Bad Gateway");
    }

    #[test]
    fn test_only_remote_errors_degrade() {
        assert!(AppError::RemoteUnavailable("x".into()).is_remote());
        assert!(!AppError::Validation("x".into()).is_remote());
        assert!(!AppError::Config("x".into()).is_remote());
    }

    #[test]
    fn test_from_serde_json_produces_remote_variant() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let app_err: AppError = json_err.into();
        assert_eq!(app_err.kind(), "RemoteUnavailable");
        assert!(app_err.to_string().starts_with("malformed payload"));
    }

    #[test]
    fn test_from_io_error_produces_io_variant() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let app_err: AppError = io_err.into();
        assert_eq!(app_err.kind(), "Io");
        assert!(app_err.to_string().contains("file missing"));
    }
}
