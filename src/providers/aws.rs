use super::{Provider, ProviderConfig};
use anyhow::Result;

/// Amazon S3 reached through the SDK's default credential and region chain
///
/// A pinned region skips region discovery; `anonymous` reads public
/// buckets without signing requests.
#[derive(Debug, Clone, Default)]
pub struct AwsProvider {
    region: Option<String>,
    anonymous: bool,
}

impl AwsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }
}

#[async_trait::async_trait]
impl Provider for AwsProvider {
    fn name(&self) -> &str {
        "aws"
    }

    fn description(&self) -> &str {
        "Amazon S3 with the default credential chain"
    }

    async fn build_config(&self) -> Result<ProviderConfig> {
        Ok(ProviderConfig {
            anonymous: self.anonymous,
            default_region: self.region.clone(),
            ..ProviderConfig::default()
        })
    }
}
