//! # Command Error Type
//!
//! Unified error type for every command, with a stable code and a process
//! exit status.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  command fn ──► Result<T, AppError>                                     │
//! │                     ▲                                                   │
//! │    SyncError ───────┤  Validation  → VALIDATION_ERROR  (exit 2)         │
//! │    StoreError ──────┤  NotFound    → NOT_FOUND         (exit 3)         │
//! │    CoreError ───────┤  Unreachable → OFFLINE           (exit 4)         │
//! │    usage mistakes ──┘  Remote 4xx/5xx → REMOTE_ERROR   (exit 5)         │
//! │                                                                         │
//! │  main: prints "error [CODE]: message" (or JSON with --json) and exits   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;

use menu_core::{CoreError, ValidationReport};
use menu_store::StoreError;
use menu_sync::SyncError;

/// Result alias for command functions.
pub type AppResult<T> = Result<T, AppError>;

/// Error returned from a command.
///
/// With `--json` this is what gets printed:
/// ```json
/// { "code": "NOT_FOUND", "message": "Not found: Menu item not found" }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad command line.
    Usage,

    /// Input validation failed.
    ValidationError,

    /// Item or account does not exist.
    NotFound,

    /// Catalog or user-management service unreachable.
    Offline,

    /// Service rejected the request.
    RemoteError,

    /// Missing or rejected credentials.
    Unauthorized,

    /// Local persistence failed.
    StorageError,

    /// Another operation on the same item is running.
    Busy,

    /// Configuration could not be loaded or is invalid.
    ConfigError,

    /// Image could not be read or processed.
    ImageError,

    /// Cart operation failed.
    CartError,

    Internal,
}

impl ErrorCode {
    /// Process exit status for this code.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCode::Usage | ErrorCode::ValidationError | ErrorCode::ImageError => 2,
            ErrorCode::NotFound => 3,
            ErrorCode::Offline => 4,
            ErrorCode::RemoteError | ErrorCode::Unauthorized => 5,
            ErrorCode::StorageError => 6,
            ErrorCode::Busy => 7,
            ErrorCode::ConfigError => 78,
            ErrorCode::CartError => 8,
            ErrorCode::Internal => 1,
        }
    }
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        AppError::new(ErrorCode::Usage, message)
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        AppError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::new(ErrorCode::Internal, message)
    }

    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        let code = match &err {
            SyncError::Validation(_) => ErrorCode::ValidationError,
            SyncError::NotFound(_) => ErrorCode::NotFound,
            SyncError::Unauthorized(_) => ErrorCode::Unauthorized,
            SyncError::Remote { .. } => ErrorCode::RemoteError,
            SyncError::UnsupportedImage(_)
            | SyncError::ImageTooLarge { .. }
            | SyncError::ImageFailed(_) => ErrorCode::ImageError,
            SyncError::Storage(_) => ErrorCode::StorageError,
            SyncError::Busy(_) => ErrorCode::Busy,
            e if e.is_connectivity() => ErrorCode::Offline,
            e if e.is_config_error() => ErrorCode::ConfigError,
            _ => {
                tracing::error!(error = %err, "Unexpected sync error");
                ErrorCode::Internal
            }
        };
        AppError::new(code, err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => AppError::not_found(&entity, &id),
            StoreError::QuotaExceeded { .. } => AppError::new(ErrorCode::StorageError, err.to_string()),
            other => {
                tracing::error!(error = %other, "Local storage failed");
                AppError::new(ErrorCode::StorageError, other.to_string())
            }
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::ItemNotFound(_) => ErrorCode::NotFound,
            CoreError::Validation(_) | CoreError::InvalidDraft(_) => ErrorCode::ValidationError,
            CoreError::ItemNotOrderable(_)
            | CoreError::PriceUnavailable { .. }
            | CoreError::CartTooLarge { .. }
            | CoreError::QuantityTooLarge { .. }
            | CoreError::NotInCart(_) => ErrorCode::CartError,
        };
        AppError::new(code, err.to_string())
    }
}

impl From<ValidationReport> for AppError {
    fn from(report: ValidationReport) -> Self {
        AppError::new(ErrorCode::ValidationError, report.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
