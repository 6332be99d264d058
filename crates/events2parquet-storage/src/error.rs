//! Error types for the storage, ingestion and commit stages

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Configuration missing or invalid
    E001InvalidConfig,
    /// E002: Source object could not be decoded or parsed
    E002Ingestion,
    /// E003: Encoding, staging or promotion of output failed
    E003WriteFailure,
    /// E004: Bookmark unreadable, corrupt or changed by another run
    E004Bookmark,
    /// E005: Storage backend or object operation failed
    E005Storage,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001InvalidConfig => "E001",
            Self::E002Ingestion => "E002",
            Self::E003WriteFailure => "E003",
            Self::E004Bookmark => "E004",
            Self::E005Storage => "E005",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid configuration provided
    #[error("[{code}] Invalid configuration: {message}")]
    InvalidConfig { code: &'static str, message: String },

    /// A source file could not be decompressed or a line is not a JSON object
    #[error("[{code}] Failed to ingest '{path}'{}: {reason}", .line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Ingestion {
        code: &'static str,
        path: String,
        /// 1-based line number, when the failure is tied to one line
        line: Option<usize>,
        reason: String,
    },

    /// Encoding, staging or promotion failed
    #[error("[{code}] Write operation failed for '{path}': {reason}")]
    WriteFailure {
        code: &'static str,
        path: String,
        reason: String,
    },

    /// Stored bookmark cannot be read back
    #[error("[{code}] Bookmark '{path}' is unreadable: {reason}\n\nTroubleshooting:\n  • Inspect it with `events2parquet show-bookmark`\n  • Clear it with `events2parquet reset-bookmark` to reprocess every file")]
    BookmarkCorrupt {
        code: &'static str,
        path: String,
        reason: String,
    },

    /// Stored bookmark moved while this run was in progress
    #[error("[{code}] Bookmark for job '{job_name}' changed during the run (expected version {expected}, found {found}); another run may be active")]
    BookmarkConflict {
        code: &'static str,
        job_name: String,
        expected: u64,
        found: u64,
    },

    /// Backend operator construction or an object operation failed
    #[error("[{code}] Storage {operation} failed for '{path}': {reason}")]
    Storage {
        code: &'static str,
        operation: &'static str,
        path: String,
        reason: String,
    },
}

impl PipelineError {
    /// Create an invalid config error with error code
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            code: ErrorCode::E001InvalidConfig.as_str(),
            message: message.into(),
        }
    }

    /// Create an ingestion error for a whole file
    pub fn ingestion(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Ingestion {
            code: ErrorCode::E002Ingestion.as_str(),
            path: path.into(),
            line: None,
            reason: reason.to_string(),
        }
    }

    /// Create an ingestion error for one line of a file
    pub fn ingestion_at(path: impl Into<String>, line: usize, reason: impl ToString) -> Self {
        Self::Ingestion {
            code: ErrorCode::E002Ingestion.as_str(),
            path: path.into(),
            line: Some(line),
            reason: reason.to_string(),
        }
    }

    /// Create a write failure error with error code
    pub fn write_failure(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::WriteFailure {
            code: ErrorCode::E003WriteFailure.as_str(),
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn bookmark_corrupt(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::BookmarkCorrupt {
            code: ErrorCode::E004Bookmark.as_str(),
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn bookmark_conflict(job_name: impl Into<String>, expected: u64, found: u64) -> Self {
        Self::BookmarkConflict {
            code: ErrorCode::E004Bookmark.as_str(),
            job_name: job_name.into(),
            expected,
            found,
        }
    }

    /// Create a storage error with error code
    pub fn storage(operation: &'static str, path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Storage {
            code: ErrorCode::E005Storage.as_str(),
            operation,
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidConfig { .. } => ErrorCode::E001InvalidConfig,
            Self::Ingestion { .. } => ErrorCode::E002Ingestion,
            Self::WriteFailure { .. } => ErrorCode::E003WriteFailure,
            Self::BookmarkCorrupt { .. } | Self::BookmarkConflict { .. } => ErrorCode::E004Bookmark,
            Self::Storage { .. } => ErrorCode::E005Storage,
        }
    }
}

/// Result type alias for PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;
