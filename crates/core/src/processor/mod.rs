//! Per-bundle orchestration of the packaging pipeline.
//!
//! [`PackagingOrchestrator`] scans for eligible bundles, claims each one and
//! runs it through validation, derivative generation, delivery, metadata
//! registration and completion notification. Each bundle's failure is scoped
//! to that bundle; the run always continues and reports a [`RunSummary`].
//!
//! # Example
//!
//! ```ignore
//! use avpackager_core::processor::{Collaborators, PackagingOrchestrator};
//!
//! let orchestrator = PackagingOrchestrator::new(&config, collaborators);
//! let summary = orchestrator.run().await?;
//! println!("{}", summary);
//! std::process::exit(summary.exit_code());
//! ```

mod config;
mod orchestrator;
mod types;

pub use config::ProcessorConfig;
pub use orchestrator::{Collaborators, PackagingOrchestrator, ProcessorError, ShutdownHandle};
pub use types::{
    BundleOutcome, BundleState, FailedBundle, FailureKind, FailureReason, ReplaySummary,
    RunSummary, Stage,
};
