// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for FrameKit.
//!
//! Errors are split by the phase in which they can occur. Configuration and
//! resource-creation errors abort graph construction or verification; everything
//! raised after verification is left to the caller to retry or abandon.

use thiserror::Error;

/// Main error type for FrameKit operations.
#[derive(Debug, Error)]
pub enum FrameKitError {
    /// Graph construction or validation error.
    ///
    /// Examples:
    /// - Linking pads whose exemplars disagree on kind, dimensions or channel count
    /// - Linking two source pads together
    /// - ObjArraySplit partitions that do not add up to the input channel count
    /// - A cycle in the node graph
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A buffer pool or kernel instance could not be created during verification.
    ///
    /// Any partially created graph state is torn down before this is returned.
    #[error("Resource creation error: {0}")]
    ResourceCreation(String),

    /// Status reported by an external collaborator (capture, display, codec device).
    ///
    /// The core never retries these; callers decide per frame.
    #[error("External device error ({code}): {message}")]
    ExternalDevice { code: i32, message: String },

    /// A kernel failed while processing a cycle.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// The operation is not valid in the graph's current lifecycle state.
    ///
    /// Examples:
    /// - Adding a node after the graph was verified
    /// - Scheduling a graph that was never verified
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The pool was closed by graph cleanup while the caller was waiting on it.
    #[error("Buffer pool closed: {0}")]
    PoolClosed(String),

    /// A bounded wait ran out before a buffer became available.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// I/O error (reference data files, device nodes).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameKitError {
    /// Whether this error was raised while building or verifying a graph.
    pub const fn is_fatal_setup(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::ResourceCreation(_))
    }
}

/// Convenience type alias for Results using `FrameKitError`.
pub type Result<T> = std::result::Result<T, FrameKitError>;

// Allow conversion from FrameKitError to String for log-friendly call sites
impl From<FrameKitError> for String {
    fn from(err: FrameKitError) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FrameKitError::Configuration("channel mismatch".to_string());
        assert_eq!(err.to_string(), "Configuration error: channel mismatch");

        let err = FrameKitError::ExternalDevice { code: -5, message: "capture stalled".into() };
        assert_eq!(err.to_string(), "External device error (-5): capture stalled");
    }

    #[test]
    fn test_setup_errors_are_fatal() {
        assert!(FrameKitError::Configuration(String::new()).is_fatal_setup());
        assert!(FrameKitError::ResourceCreation(String::new()).is_fatal_setup());
        assert!(!FrameKitError::Timeout(String::new()).is_fatal_setup());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: FrameKitError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
        assert!(err.to_string().contains("File not found"));
    }
}
