use std::fmt;

/// Errors returned by workbench runtime operations.
#[derive(Debug)]
pub enum WorkbenchError {
    /// Invalid input or configuration.
    Validation(String),
    /// Requested session workspace (or other resource) does not exist.
    NotFound(String),
    /// The toolchain executable could not be launched at all. Distinct
    /// from a successful launch that exits nonzero, which is a normal
    /// compile/deploy failure and not an error.
    Toolchain(String),
    /// Local filesystem failure.
    Io(String),
    /// HTTP request failed.
    Http(String),
    /// Explorer API rejected the request or returned an unusable payload.
    Explorer(String),
    /// Internal error caught at the request boundary.
    Internal(String),
}

impl fmt::Display for WorkbenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkbenchError::Validation(msg) => write!(f, "validation error: {msg}"),
            WorkbenchError::NotFound(msg) => write!(f, "not found: {msg}"),
            WorkbenchError::Toolchain(msg) => write!(f, "toolchain unavailable: {msg}"),
            WorkbenchError::Io(msg) => write!(f, "io error: {msg}"),
            WorkbenchError::Http(msg) => write!(f, "http error: {msg}"),
            WorkbenchError::Explorer(msg) => write!(f, "explorer error: {msg}"),
            WorkbenchError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for WorkbenchError {}

impl From<std::io::Error> for WorkbenchError {
    fn from(err: std::io::Error) -> Self {
        WorkbenchError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkbenchError>;
