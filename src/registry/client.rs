use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, ACCEPT, AUTHORIZATION, USER_AGENT},
    Client, ClientBuilder,
};

use super::{
    manifest::{self, DOCKER_MANIFEST_LIST, OCI_IMAGE_INDEX},
    ManifestSource, RegistryError,
};

const TIMEOUT: Duration = Duration::from_secs(10);

pub struct RegistryClient {
    client: Client,
    base_url: String,
}

impl RegistryClient {
    /// `registry` is a host name like `ghcr.io`, or a full base URL.
    pub fn new(token: impl AsRef<str>, registry: impl AsRef<str>) -> Result<Self> {
        let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            format!("{OCI_IMAGE_INDEX},{DOCKER_MANIFEST_LIST}").try_into()?,
        );
        headers.insert(
            AUTHORIZATION,
            format!("Bearer {}", token.as_ref()).try_into()?,
        );
        headers.insert(USER_AGENT, user_agent.try_into()?);

        let client = ClientBuilder::new()
            .default_headers(headers)
            .timeout(TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url(registry.as_ref()),
        })
    }
}

fn base_url(registry: &str) -> String {
    let registry = registry.trim_end_matches('/');
    match registry.contains("://") {
        true => registry.to_string(),
        false => format!("https://{registry}"),
    }
}

fn manifest_url(base_url: &str, repository: &str, reference: &str) -> String {
    format!("{base_url}/v2/{repository}/manifests/{reference}")
}

#[async_trait]
impl ManifestSource for RegistryClient {
    async fn manifest_children(
        &self,
        repository: &str,
        digest: &str,
    ) -> Result<Vec<String>, RegistryError> {
        let url = manifest_url(&self.base_url, repository, digest);
        log::debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Status { status, body });
        }

        let body = response.bytes().await?;
        manifest::parse_children(&body)
    }
}
