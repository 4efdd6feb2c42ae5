mod aws;
mod endpoint;

pub use aws::AwsProvider;
pub use endpoint::EndpointProvider;

use anyhow::{Context, Result};
use aws_sdk_s3::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::s3::{S3Backend, S3BackendConfig, S3Client};

/// Region used when neither the provider nor the environment names one
pub const FALLBACK_REGION: &str = "us-west-2";

/// How to reach the S3 service that holds the vaults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Custom endpoint for S3-compatible services
    pub endpoint_url: Option<String>,
    /// Path-style addressing, required by most S3-compatible services
    pub force_path_style: bool,
    /// Skip credentials for public buckets
    pub anonymous: bool,
    pub default_region: Option<String>,
}

/// Source of a [`ProviderConfig`]
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn build_config(&self) -> Result<ProviderConfig>;
}

/// Build an S3 client from provider configuration
pub async fn create_s3_client(config: ProviderConfig) -> S3Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

    if config.anonymous {
        loader = loader.no_credentials();
    }

    let base_config = loader.load().await;

    let region = config
        .default_region
        .or_else(|| base_config.region().map(|r| r.as_ref().to_string()))
        .unwrap_or_else(|| FALLBACK_REGION.to_string());

    let mut builder = aws_sdk_s3::config::Builder::from(&base_config)
        .region(aws_sdk_s3::config::Region::new(region.clone()));

    if let Some(endpoint) = config.endpoint_url {
        builder = builder.endpoint_url(endpoint);
    }

    if config.force_path_style {
        builder = builder.force_path_style(true);
    }

    S3Client::from_client(Client::from_conf(builder.build()), region)
}

/// Build a storage backend over one bucket using a provider's configuration
pub async fn connect(provider: &dyn Provider, backend: S3BackendConfig) -> Result<S3Backend> {
    let config = provider
        .build_config()
        .await
        .with_context(|| format!("failed to configure provider {}", provider.name()))?;
    let client = create_s3_client(config).await;
    info!(
        provider = provider.name(),
        bucket = %backend.bucket,
        prefix = %backend.prefix,
        region = client.region(),
        "connected to s3"
    );
    Ok(S3Backend::new(Arc::new(client), backend))
}

/// Registry of available providers
pub struct ProviderRegistry {
    providers: BTreeMap<String, Box<dyn Provider>>,
}

impl ProviderRegistry {
    /// Registry with the built-in providers
    pub fn new() -> Self {
        let mut registry = Self {
            providers: BTreeMap::new(),
        };

        registry.register(Box::new(AwsProvider::new()));
        registry.register(Box::new(EndpointProvider::from_env()));

        registry
    }

    pub fn register(&mut self, provider: Box<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Provider> {
        self.providers.get(name).map(|p| p.as_ref())
    }

    /// Provider names in sorted order
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
