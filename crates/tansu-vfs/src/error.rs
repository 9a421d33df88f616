//! Filesystem error types.
//!
//! Every fallible operation in the crate reports exactly one [`FsError`],
//! which pairs a POSIX-style [`ErrorCode`] with the path it concerns.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// POSIX-style error codes.
///
/// The set is closed: composing code forwards or wraps these, it never
/// invents new kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Operation not permitted (`EPERM`).
    PermissionDenied,
    /// No such file or directory (`ENOENT`).
    NotFound,
    /// Input/output error (`EIO`).
    Io,
    /// Bad file descriptor (`EBADF`).
    BadDescriptor,
    /// File exists (`EEXIST`).
    AlreadyExists,
    /// Not a directory (`ENOTDIR`).
    NotADirectory,
    /// Is a directory (`EISDIR`).
    IsADirectory,
    /// Invalid argument (`EINVAL`).
    InvalidArgument,
    /// Directory not empty (`ENOTEMPTY`).
    NotEmpty,
    /// Operation not supported (`ENOTSUP`).
    NotSupported,
}

impl ErrorCode {
    /// Numeric errno value.
    pub fn errno(&self) -> i32 {
        match self {
            ErrorCode::PermissionDenied => 1,
            ErrorCode::NotFound => 2,
            ErrorCode::Io => 5,
            ErrorCode::BadDescriptor => 9,
            ErrorCode::AlreadyExists => 17,
            ErrorCode::NotADirectory => 20,
            ErrorCode::IsADirectory => 21,
            ErrorCode::InvalidArgument => 22,
            ErrorCode::NotEmpty => 39,
            ErrorCode::NotSupported => 95,
        }
    }

    /// Symbolic name, e.g. `"ENOENT"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::PermissionDenied => "EPERM",
            ErrorCode::NotFound => "ENOENT",
            ErrorCode::Io => "EIO",
            ErrorCode::BadDescriptor => "EBADF",
            ErrorCode::AlreadyExists => "EEXIST",
            ErrorCode::NotADirectory => "ENOTDIR",
            ErrorCode::IsADirectory => "EISDIR",
            ErrorCode::InvalidArgument => "EINVAL",
            ErrorCode::NotEmpty => "ENOTEMPTY",
            ErrorCode::NotSupported => "ENOTSUP",
        }
    }

    /// Default human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::PermissionDenied => "Operation not permitted.",
            ErrorCode::NotFound => "No such file or directory.",
            ErrorCode::Io => "Input/output error.",
            ErrorCode::BadDescriptor => "Bad file descriptor.",
            ErrorCode::AlreadyExists => "File exists.",
            ErrorCode::NotADirectory => "File is not a directory.",
            ErrorCode::IsADirectory => "File is a directory.",
            ErrorCode::InvalidArgument => "Invalid argument.",
            ErrorCode::NotEmpty => "Directory is not empty.",
            ErrorCode::NotSupported => "Operation is not supported.",
        }
    }

    /// Look up a code by errno value.
    pub fn from_errno(errno: i32) -> Option<Self> {
        Some(match errno {
            1 => ErrorCode::PermissionDenied,
            2 => ErrorCode::NotFound,
            5 => ErrorCode::Io,
            9 => ErrorCode::BadDescriptor,
            17 => ErrorCode::AlreadyExists,
            20 => ErrorCode::NotADirectory,
            21 => ErrorCode::IsADirectory,
            22 => ErrorCode::InvalidArgument,
            39 => ErrorCode::NotEmpty,
            95 => ErrorCode::NotSupported,
            _ => return None,
        })
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filesystem error: a code, the path it concerns, and a message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}, '{path}'")]
pub struct FsError {
    /// Error kind.
    pub code: ErrorCode,
    /// Offending path (may be empty when no path applies).
    pub path: String,
    /// Human-readable message.
    pub message: String,
}

impl FsError {
    /// Create an error with an explicit message.
    pub fn new(code: ErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an error carrying the code's default description.
    pub fn from_code(code: ErrorCode, path: impl Into<String>) -> Self {
        Self::new(code, path, code.description())
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::NotFound, path)
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::IsADirectory, path)
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::NotADirectory, path)
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::AlreadyExists, path)
    }

    /// Create a NotEmpty error.
    pub fn not_empty(path: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::NotEmpty, path)
    }

    /// Create a NotSupported error.
    pub fn not_supported(path: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::NotSupported, path)
    }

    /// Create a BadDescriptor error.
    pub fn bad_descriptor(path: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::BadDescriptor, path)
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, path, message)
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, path, message)
    }

    /// Create an Io error.
    pub fn io(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Io, path, message)
    }

    /// Wrap a `std::io::Error` raised while operating on `path`.
    pub fn from_io(path: impl Into<String>, err: io::Error) -> Self {
        let code = match err.kind() {
            io::ErrorKind::NotFound => ErrorCode::NotFound,
            io::ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
            io::ErrorKind::AlreadyExists => ErrorCode::AlreadyExists,
            io::ErrorKind::NotADirectory => ErrorCode::NotADirectory,
            io::ErrorKind::IsADirectory => ErrorCode::IsADirectory,
            io::ErrorKind::DirectoryNotEmpty => ErrorCode::NotEmpty,
            io::ErrorKind::InvalidInput => ErrorCode::InvalidArgument,
            io::ErrorKind::Unsupported => ErrorCode::NotSupported,
            _ => ErrorCode::Io,
        };
        Self::new(code, path, err.to_string())
    }

    /// Returns true if this is a NotFound error.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NotFound
    }
}

/// Convert FsError to std::io::Error for compatibility.
impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        let kind = match e.code {
            ErrorCode::NotFound => io::ErrorKind::NotFound,
            ErrorCode::PermissionDenied => io::ErrorKind::PermissionDenied,
            ErrorCode::AlreadyExists => io::ErrorKind::AlreadyExists,
            ErrorCode::NotADirectory => io::ErrorKind::NotADirectory,
            ErrorCode::IsADirectory => io::ErrorKind::IsADirectory,
            ErrorCode::NotEmpty => io::ErrorKind::DirectoryNotEmpty,
            ErrorCode::InvalidArgument => io::ErrorKind::InvalidInput,
            ErrorCode::NotSupported => io::ErrorKind::Unsupported,
            ErrorCode::BadDescriptor | ErrorCode::Io => io::ErrorKind::Other,
        };
        io::Error::new(kind, e)
    }
}

/// Filesystem result type.
pub type FsResult<T> = Result<T, FsError>;
