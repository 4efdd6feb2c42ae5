use super::{Provider, ProviderConfig};
use anyhow::{Result, anyhow};

/// Environment variable naming the endpoint of an S3-compatible service
pub const ENDPOINT_ENV: &str = "AWS_ENDPOINT_URL";

/// S3-compatible service (MinIO, LocalStack, ...) at a custom endpoint
pub struct EndpointProvider {
    endpoint_url: Option<String>,
    region: Option<String>,
}

impl EndpointProvider {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: Some(endpoint_url.into()),
            region: None,
        }
    }

    /// Endpoint taken from `AWS_ENDPOINT_URL`, resolved when the config is built
    pub fn from_env() -> Self {
        Self {
            endpoint_url: None,
            region: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

#[async_trait::async_trait]
impl Provider for EndpointProvider {
    fn name(&self) -> &str {
        "endpoint"
    }

    fn description(&self) -> &str {
        "S3-compatible service at a custom endpoint"
    }

    async fn build_config(&self) -> Result<ProviderConfig> {
        let endpoint_url = match &self.endpoint_url {
            Some(url) => url.clone(),
            None => std::env::var(ENDPOINT_ENV)
                .map_err(|_| anyhow!("{} is not set", ENDPOINT_ENV))?,
        };

        Ok(ProviderConfig {
            endpoint_url: Some(endpoint_url),
            force_path_style: true,
            anonymous: false,
            default_region: Some(self.region.clone().unwrap_or_else(|| "us-east-1".to_string())),
        })
    }
}
