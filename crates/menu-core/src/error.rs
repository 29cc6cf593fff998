//! # Error Types
//!
//! Domain-specific error types for menu-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  menu-core errors (this file)                                          │
//! │  ├── CoreError         - General domain errors                         │
//! │  ├── ValidationError   - A single field failure                        │
//! │  └── ValidationReport  - Every field failure of one draft              │
//! │                                                                         │
//! │  menu-store errors                                                     │
//! │  └── StoreError        - Local persistence failures                    │
//! │                                                                         │
//! │  menu-sync errors                                                      │
//! │  └── SyncError         - Network, image and reconciliation failures    │
//! │                                                                         │
//! │  Flow: ValidationReport → SyncError → AppError → terminal              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Item cannot be found in the catalog or the pending queue.
    #[error("Menu item not found: {0}")]
    ItemNotFound(String),

    /// Items that only exist locally cannot be ordered.
    ///
    /// ## When This Occurs
    /// - The customer picks a pending item from a merged listing while the
    ///   restaurant's change has not reached the server yet
    #[error("Menu item {0} is not yet published and cannot be ordered")]
    ItemNotOrderable(String),

    /// The chosen size has no price.
    #[error("{food_name} is not offered in size {size}")]
    PriceUnavailable { food_name: String, size: String },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Line is not in the cart.
    #[error("{0} is not in the cart")]
    NotInCart(String),

    /// Single-field validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Draft validation error with every failing field.
    #[error(transparent)]
    InvalidDraft(#[from] ValidationReport),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Field names use the wire spelling (`restaurantId`, `prices.small`) so
/// callers can attach them to form fields directly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: String, max: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., not a number, not a hex id).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Returns the name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::NotAllowed { field, .. } => field,
        }
    }
}

// =============================================================================
// Validation Report
// =============================================================================

/// Every field failure found while validating one draft.
///
/// ## User Workflow
/// ```text
/// Submit form
///      │
///      ▼
/// validate_draft() ── collects ALL failures, not just the first
///      │
///      ▼
/// ValidationReport { restaurantId: "...", prices.small: "..." }
///      │
///      ▼
/// Form highlights each field at once
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    errors: Vec<ValidationError>,
}

impl ValidationReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure.
    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Records the failure of a single-field check, if any.
    pub fn check<T>(&mut self, result: Result<T, ValidationError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.push(e);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Returns true if the given field failed.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field() == field)
    }

    /// Field name to message, first failure per field wins.
    pub fn field_errors(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for e in &self.errors {
            map.entry(e.field().to_string())
                .or_insert_with(|| e.to_string());
        }
        map
    }

    /// Converts into `Ok(())` when nothing failed.
    pub fn into_result(self) -> Result<(), ValidationReport> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed")?;
        for (i, e) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{}", sep, e)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

impl From<ValidationError> for ValidationReport {
    fn from(err: ValidationError) -> Self {
        ValidationReport { errors: vec![err] }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "foodName".to_string(),
        };
        assert_eq!(err.to_string(), "foodName is required");
        assert_eq!(err.field(), "foodName");
    }

    #[test]
    fn test_report_collects_fields() {
        let mut report = ValidationReport::new();
        assert!(report.clone().into_result().is_ok());

        report.push(ValidationError::Required {
            field: "category".into(),
        });
        report.push(ValidationError::MustBePositive {
            field: "prices.small".into(),
        });

        assert_eq!(report.len(), 2);
        assert!(report.has_field("prices.small"));
        assert!(!report.has_field("foodName"));

        let fields = report.field_errors();
        assert_eq!(fields["category"], "category is required");
        assert_eq!(
            report.to_string(),
            "Validation failed: category is required; prices.small must be positive"
        );
    }

    #[test]
    fn test_report_converts_to_core_error() {
        let report = ValidationReport::from(ValidationError::Required {
            field: "foodName".into(),
        });
        let core_err: CoreError = report.into();
        assert!(matches!(core_err, CoreError::InvalidDraft(_)));
    }
}
