//! Registration of delivered locations with the archival metadata system.
//!
//! Registration runs only after every derivative is delivered and is keyed
//! by the bundle id, so re-running it against already delivered artifacts
//! updates the same record.

mod archivesspace;
mod config;
mod dates;
mod error;
mod traits;
mod types;

pub use archivesspace::ArchivesSpaceRegistrar;
pub use config::ArchivesSpaceConfig;
pub use dates::DateRange;
pub use error::{RegistrationError, RegistrationErrorKind};
pub use traits::{describe_with_retry, register_with_retry, MetadataRegistrar};
pub use types::{ArchivalDescription, DeliveredLocations, RegistrationResult};
