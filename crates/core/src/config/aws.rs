use aws_config::{BehaviorVersion, Region, SdkConfig};

use super::types::AwsConfig;

/// Loads the shared SDK configuration: region from config, credentials from
/// the default provider chain.
pub async fn aws_sdk_config(config: &AwsConfig) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .load()
        .await
}
