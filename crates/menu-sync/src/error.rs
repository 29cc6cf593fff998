//! # Sync Error Types
//!
//! Error types for every network-facing operation.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │  Connectivity   │  │     Remote              │ │
//! │  │                 │  │  (→ queue it)   │  │                         │ │
//! │  │  InvalidConfig  │  │  ConnectionFail │  │  Remote { status, msg } │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  NotFound               │ │
//! │  │  ConfigLoad/Save│  │  InvalidResponse│  │  Unauthorized           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Validation    │  │     Image       │  │     Local               │ │
//! │  │  (terminal)     │  │                 │  │                         │ │
//! │  │  Validation     │  │  UnsupportedImg │  │  Storage                │ │
//! │  │  (field report) │  │  ImageTooLarge  │  │  Busy                   │ │
//! │  │                 │  │  ImageFailed    │  │  ShuttingDown           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A connectivity error never reaches the user for a create or edit: the
//! reconciler turns it into a queued pending item instead.

use thiserror::Error;

use menu_core::{ItemId, ValidationError, ValidationReport};
use menu_store::StoreError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all network-facing failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A base URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Connectivity Errors
    // =========================================================================
    /// Request could not be delivered.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request exceeded its time budget.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Response body could not be understood.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// Service answered with a non-success status.
    #[error("Server error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Item or resource does not exist on the server.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credentials missing, wrong or expired.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    /// Input failed validation. Nothing was written.
    #[error(transparent)]
    Validation(#[from] ValidationReport),

    // =========================================================================
    // Image Errors
    // =========================================================================
    /// Upload is not one of the accepted image types.
    #[error("Unsupported image type '{0}'. Supported: jpeg, png, gif, webp")]
    UnsupportedImage(String),

    /// Upload exceeds the size limit.
    #[error("Image too large: {size} bytes (max {max})")]
    ImageTooLarge { size: usize, max: usize },

    /// Decoding or re-encoding failed.
    #[error("Image processing failed: {0}")]
    ImageFailed(String),

    // =========================================================================
    // Local Errors
    // =========================================================================
    /// Local persistence failed.
    #[error("Local storage error: {0}")]
    Storage(#[from] StoreError),

    /// Another operation on the same item is still running.
    #[error("Another operation on item {0} is in progress")]
    Busy(ItemId),

    /// Background task is stopping.
    #[error("Connectivity monitor is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for SyncError {
    fn from(err: ValidationError) -> Self {
        SyncError::Validation(err.into())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(err.to_string())
        } else if err.is_decode() {
            SyncError::InvalidResponse(err.to_string())
        } else {
            SyncError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::InvalidResponse(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<image::ImageError> for SyncError {
    fn from(err: image::ImageError) -> Self {
        SyncError::ImageFailed(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if the service could not be reached or understood.
    ///
    /// These are the failures that send a create or edit to the pending
    /// queue and a delete to the tombstone list.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            SyncError::ConnectionFailed(_) | SyncError::Timeout(_) | SyncError::InvalidResponse(_)
        )
    }

    /// Returns true if trying again later might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote { status, .. } => *status >= 500,
            SyncError::Busy(_) => true,
            other => other.is_connectivity(),
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if the input was rejected before anything ran.
    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::Validation(_))
    }
}
