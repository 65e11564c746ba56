//! Pre-processing checks for located bundles.
//!
//! A bundle that fails here is flagged for review instead of being retried:
//! a missing, empty, or mislabeled source file does not fix itself.

mod bundle_validator;
mod error;

pub use bundle_validator::{BundleValidator, ValidationReport, ValidationResult};
pub use error::{ValidateError, ValidationError, ValidationErrorKind};
