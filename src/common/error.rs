//! Error handling primitives shared across the pipeline.

use std::path::PathBuf;

/// Stable error codes, used as the process exit status by the CLI.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorCode {
    /// Success code used as a sentinel.
    Ok = 0,
    /// Input failed validation.
    InvalidInput = 1,
    /// A dataset, run or experiment could not be found.
    NotFound = 2,
    /// Requested model artefact was not available.
    ModelMissing = 3,
    /// Filesystem or network failure.
    Io = 4,
    /// Malformed configuration file.
    Config = 5,
    /// Catch-all for bugs and unexpected states.
    Internal = 6,
}

/// Canonical error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("model missing: {0}")]
    ModelMissing(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error in {path}: {message}")]
    Config { path: PathBuf, message: String },
    #[error("download failed: {0}")]
    Download(String),
    #[error("archive error: {0}")]
    Archive(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used throughout the crate.
pub type PassResult<T> = Result<T, PassError>;

impl PassError {
    /// Validation helper.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn model_missing(msg: impl Into<String>) -> Self {
        Self::ModelMissing(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wrap an IO error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Machine parsable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidInput(_) | Self::Csv(_) | Self::Json(_) => ErrorCode::InvalidInput,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::ModelMissing(_) => ErrorCode::ModelMissing,
            Self::Io { .. } | Self::Download(_) | Self::Archive(_) => ErrorCode::Io,
            Self::Config { .. } => ErrorCode::Config,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorCode::Ok as u32, 0);
        assert_eq!(ErrorCode::InvalidInput as u32, 1);
        assert_eq!(ErrorCode::NotFound as u32, 2);
        assert_eq!(ErrorCode::ModelMissing as u32, 3);
        assert_eq!(ErrorCode::Io as u32, 4);
        assert_eq!(ErrorCode::Config as u32, 5);
        assert_eq!(ErrorCode::Internal as u32, 6);
    }

    #[test]
    fn variants_map_to_codes() {
        assert_eq!(PassError::invalid("x").code(), ErrorCode::InvalidInput);
        assert_eq!(PassError::not_found("run").code(), ErrorCode::NotFound);
        assert_eq!(
            PassError::io("a", std::io::Error::other("boom")).code(),
            ErrorCode::Io
        );
        assert_eq!(
            PassError::model_missing("m").to_string(),
            "model missing: m"
        );
    }
}
