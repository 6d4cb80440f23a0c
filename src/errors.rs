// SPDX-License-Identifier: MPL-2.0

//! Error types for the scanner
//!
//! Camera acquisition problems surface once to the caller of
//! [`CameraSession::start`](crate::backends::camera::CameraSession::start).
//! Decode problems never leave the recognition pipeline: a malformed frame is
//! treated the same as a frame without a code.

use crate::backends::camera::types::BackendError;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Top-level error used by the command-line front end
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera session errors
    Session(SessionError),
    /// Submission errors
    Submit(SubmitError),
    /// Configuration errors
    Config(String),
    /// Generic error with message
    Other(String),
}

/// Device failure flavours that are retryable by an explicit new `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorKind {
    /// No usable device (none present, unplugged, unsupported format)
    Unavailable,
    /// Device exists but another process holds it
    Busy,
}

/// Acquisition failure reported by a camera session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The user or platform denied (or revoked) access to the camera
    Permission(String),
    /// Hardware unavailable or busy
    Device {
        kind: DeviceErrorKind,
        message: String,
    },
    /// Anything the backend could not classify
    Unknown(String),
}

impl SessionError {
    /// Stable name of the failure reason, as surfaced to consumers
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Permission(_) => "permission-denied",
            SessionError::Device {
                kind: DeviceErrorKind::Unavailable,
                ..
            } => "device-unavailable",
            SessionError::Device {
                kind: DeviceErrorKind::Busy,
                ..
            } => "device-busy",
            SessionError::Unknown(_) => "unknown",
        }
    }

    pub fn is_permission(&self) -> bool {
        matches!(self, SessionError::Permission(_))
    }

    pub fn is_device(&self) -> bool {
        matches!(self, SessionError::Device { .. })
    }
}

/// A frame that could not be turned into pixels
///
/// Recovered locally by the pipeline; only ever logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer is shorter than the frame geometry requires
    Truncated { expected: usize, actual: usize },
    /// Frame has a zero dimension or unusable stride
    InvalidGeometry(String),
    /// Compressed payload could not be decoded
    Corrupt(String),
}

/// Failure to hand a decoded code to the downstream collaborator
#[derive(Debug, Clone)]
pub enum SubmitError {
    /// Writing to the sink failed
    Io(String),
    /// The code could not be serialized
    Serialize(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Session(e) => write!(f, "Camera error: {}", e),
            AppError::Submit(e) => write!(f, "Submit error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Permission(msg) => write!(f, "Camera permission denied: {}", msg),
            SessionError::Device { kind, message } => match kind {
                DeviceErrorKind::Unavailable => write!(f, "Camera unavailable: {}", message),
                DeviceErrorKind::Busy => write!(f, "Camera is busy: {}", message),
            },
            SessionError::Unknown(msg) => write!(f, "Camera failed: {}", msg),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated { expected, actual } => write!(
                f,
                "Frame truncated: expected {} bytes, got {}",
                expected, actual
            ),
            DecodeError::InvalidGeometry(msg) => write!(f, "Invalid frame geometry: {}", msg),
            DecodeError::Corrupt(msg) => write!(f, "Corrupt frame: {}", msg),
        }
    }
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Io(msg) => write!(f, "I/O error: {}", msg),
            SubmitError::Serialize(msg) => write!(f, "Serialization failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for SessionError {}
impl std::error::Error for DecodeError {}
impl std::error::Error for SubmitError {}

impl From<BackendError> for SessionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::PermissionDenied(msg) => SessionError::Permission(msg),
            BackendError::DeviceNotFound(msg)
            | BackendError::FormatNotSupported(msg)
            | BackendError::Disconnected(msg) => SessionError::Device {
                kind: DeviceErrorKind::Unavailable,
                message: msg,
            },
            BackendError::DeviceBusy(msg) => SessionError::Device {
                kind: DeviceErrorKind::Busy,
                message: msg,
            },
            BackendError::Io(msg) | BackendError::Other(msg) => SessionError::Unknown(msg),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::Session(err)
    }
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        AppError::Submit(err)
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Session(err.into())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for SubmitError {
    fn from(err: std::io::Error) -> Self {
        SubmitError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SubmitError {
    fn from(err: serde_json::Error) -> Self {
        SubmitError::Serialize(err.to_string())
    }
}
