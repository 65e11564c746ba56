pub mod checksum;
pub mod config;
pub mod delivery;
pub mod derivative;
pub mod locator;
pub mod media;
pub mod metrics;
pub mod notifier;
pub mod package;
pub mod processor;
pub mod registrar;
pub mod retry;
pub mod testing;
pub mod validator;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, SanitizedConfig,
};
pub use processor::{
    Collaborators, PackagingOrchestrator, ProcessorError, ReplaySummary, RunSummary,
    ShutdownHandle,
};
