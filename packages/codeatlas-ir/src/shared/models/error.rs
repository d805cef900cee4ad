//! Unified error type for the analysis engine
//!
//! The taxonomy mirrors how failures propagate:
//! - `Parse` / `Resolution` / `External` are recovered locally and degrade
//!   to partial IR, `Unresolved`, or neutral defaults.
//! - `IrCorruption` / `ResourceExceeded` abort the current unit of work
//!   (file or batch) and propagate to the trigger boundary.
//! - `Timeout` / `StoreFailure` surface to callers as structured partial
//!   results.

use thiserror::Error;

/// Error kind categorization (stable string form used in logs and the CLI)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    IrCorruption,
    ResourceExceeded,
    Resolution,
    Timeout,
    StoreFailure,
    External,
    Config,
    Io,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse",
            ErrorKind::IrCorruption => "ir_corruption",
            ErrorKind::ResourceExceeded => "resource_exceeded",
            ErrorKind::Resolution => "resolution",
            ErrorKind::Timeout => "timeout",
            ErrorKind::StoreFailure => "store_failure",
            ErrorKind::External => "external",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Unified error type
#[derive(Debug, Error)]
#[error("[{}] {message}{}", .kind.as_str(), format_context(.file_path, .line))]
pub struct AtlasError {
    pub kind: ErrorKind,
    pub message: String,
    pub file_path: Option<String>,
    pub line: Option<u32>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

fn format_context(file_path: &Option<String>, line: &Option<u32>) -> String {
    match (file_path, line) {
        (Some(f), Some(l)) => format!(" in {}:{}", f, l),
        (Some(f), None) => format!(" in {}", f),
        _ => String::new(),
    }
}

impl AtlasError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            file_path: None,
            line: None,
            source: None,
        }
    }

    pub fn with_file(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn ir_corruption(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IrCorruption, message)
    }

    pub fn resource_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceExceeded, message)
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resolution, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn store_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StoreFailure, message)
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::External, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// True if this error aborts the current unit of work instead of
    /// degrading locally.
    pub fn is_fatal_for_unit(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::IrCorruption | ErrorKind::ResourceExceeded
        )
    }
}

impl From<std::io::Error> for AtlasError {
    fn from(err: std::io::Error) -> Self {
        AtlasError::new(ErrorKind::Io, err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for AtlasError {
    fn from(err: serde_json::Error) -> Self {
        AtlasError::new(ErrorKind::Internal, format!("serialization: {}", err)).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AtlasError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AtlasError::parse("unexpected token")
            .with_file("test.py")
            .with_line(42);

        let msg = format!("{}", err);
        assert!(msg.contains("parse"));
        assert!(msg.contains("unexpected token"));
        assert!(msg.contains("test.py:42"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(AtlasError::ir_corruption("bfg/cfg mismatch").is_fatal_for_unit());
        assert!(AtlasError::resource_exceeded("ast too deep").is_fatal_for_unit());
        assert!(!AtlasError::resolution("unknown import").is_fatal_for_unit());
        assert!(!AtlasError::timeout("query deadline").is_fatal_for_unit());
    }
}
