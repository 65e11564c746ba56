//! Archival package of a bundle's source files.
//!
//! The package is a BagIt bag compressed to `<id>.tar.gz` and delivered
//! alongside the derivatives. Its bag-info.txt names the archival object,
//! its dates and the bundle format.

mod bag;
mod config;
mod error;

pub use bag::{ArchivalPackager, BagMetadata};
pub use config::PackagingConfig;
pub use error::PackageError;
