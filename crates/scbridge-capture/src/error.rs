//! Error types for the capture module.

use std::fmt;

use thiserror::Error;

use crate::completion::Operation;
use crate::stream::OutputId;

/// Text reported for errors that carry no usable description.
pub const UNKNOWN_NATIVE_ERROR: &str = "unknown native error";

/// An error object reported by the native capture layer.
///
/// The native object is converted into owned data when it crosses the
/// boundary, so the value stays inspectable after the native side is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    domain: Option<String>,
    code: i64,
    message: Option<String>,
}

impl NativeError {
    /// Create an error with a domain, code and message.
    pub fn new(domain: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            code,
            message: Some(message.into()),
        }
    }

    /// Create an error that only carries a message.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            domain: None,
            code: 0,
            message: Some(message.into()),
        }
    }

    /// Create an error from possibly missing native fields.
    pub fn from_parts(domain: Option<String>, code: i64, message: Option<String>) -> Self {
        Self {
            domain,
            code,
            message,
        }
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Human readable description. Never fails; missing parts are replaced
    /// with a placeholder.
    pub fn describe(&self) -> String {
        let message = self
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(UNKNOWN_NATIVE_ERROR);

        match (self.domain.as_deref().filter(|d| !d.is_empty()), self.code) {
            (Some(domain), code) => format!("{message} ({domain} {code})"),
            (None, 0) => message.to_string(),
            (None, code) => format!("{message} (code {code})"),
        }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl std::error::Error for NativeError {}

/// Describe an optional native error, falling back to the placeholder text.
pub fn describe_error(error: Option<&NativeError>) -> String {
    error.map_or_else(|| UNKNOWN_NATIVE_ERROR.to_string(), NativeError::describe)
}

/// Errors that can occur during capture operations.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// The native layer reported an error.
    #[error("Native capture error: {0}")]
    Native(#[from] NativeError),

    /// Operation is not valid in the stream's current state.
    #[error("Cannot {operation} while stream is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Outputs must be registered before the stream starts.
    #[error("Cannot add an output while stream is {state}")]
    OutputWhileActive { state: &'static str },

    /// No output with this id is registered.
    #[error("Output not found: {0}")]
    OutputNotFound(OutputId),

    /// The native layer dropped a completion without firing it.
    #[error("Native layer abandoned {operation} without completing it")]
    Abandoned { operation: Operation },

    /// The operation was superseded by a stop request.
    #[error("{operation} was cancelled by a stop request")]
    Cancelled { operation: Operation },

    /// Dispatcher channel disconnected.
    #[error("Output channel disconnected")]
    ChannelDisconnected,

    /// No display with this id in the content snapshot.
    #[error("Display not found: {0}")]
    UnknownDisplay(u32),

    /// No window with this id in the content snapshot.
    #[error("Window not found: {0}")]
    UnknownWindow(u32),
}

impl CaptureError {
    /// The native error behind this error, if any.
    pub fn native_error(&self) -> Option<&NativeError> {
        match self {
            Self::Native(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn invalid_state(operation: &'static str, state: &scbridge_types::StreamState) -> Self {
        Self::InvalidState {
            operation,
            state: state.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_full_error() {
        let err = NativeError::new("SCStreamErrorDomain", -3801, "The user declined");
        assert_eq!(
            err.describe(),
            "The user declined (SCStreamErrorDomain -3801)"
        );
        assert_eq!(err.to_string(), err.describe());
    }

    #[test]
    fn test_describe_malformed_error_uses_placeholder() {
        let err = NativeError::from_parts(None, 0, Some("   ".into()));
        assert_eq!(err.describe(), UNKNOWN_NATIVE_ERROR);

        let err = NativeError::from_parts(None, 7, None);
        assert_eq!(err.describe(), "unknown native error (code 7)");

        assert_eq!(describe_error(None), UNKNOWN_NATIVE_ERROR);
    }

    #[test]
    fn test_capture_error_exposes_native_error() {
        let native = NativeError::from_message("display disconnected");
        let err = CaptureError::from(native.clone());
        assert_eq!(err.native_error(), Some(&native));
        assert!(err.to_string().contains("display disconnected"));

        let err = CaptureError::InvalidState {
            operation: "update configuration",
            state: "Idle",
        };
        assert!(err.native_error().is_none());
        assert_eq!(
            err.to_string(),
            "Cannot update configuration while stream is Idle"
        );
    }
}
