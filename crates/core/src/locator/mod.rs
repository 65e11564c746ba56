//! Discovery of source bundles and the durable markers that track them.
//!
//! A bundle is a directory directly under the source root whose name is the
//! bundle identifier:
//!
//! ```text
//! /mnt/av/source/
//!   b9086/
//!     b9086_ma.mov      video master
//!     b9086_ma.wav      audio master
//!     b9086_still.tif   still image
//!     notes.txt         carried along, no role
//!   .avpackager/        markers (default location)
//! ```
//!
//! [`AssetLocator::locate`] yields bundles that have every expected role and
//! no marker preventing processing. [`AssetLocator::claim`] then takes
//! exclusive ownership before a worker starts on a bundle.

mod config;
mod markers;
mod scanner;
mod types;

pub use config::{FailurePolicy, LocatorConfig};
pub use markers::{
    BundleClaim, ClaimState, CompletionRecord, FailureRecord, MarkerError, MarkerStore,
    ReviewRecord,
};
pub use scanner::{AssetLocator, BundleScan, LocatorError};
pub use types::{
    is_valid_bundle_id, Bundle, BundleFormat, MalformedBundle, MalformedReason, SourceRole,
};
