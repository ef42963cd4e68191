use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT},
    Client, ClientBuilder, Response, StatusCode,
};
use serde::de::DeserializeOwned;

use super::{
    pagination, ApiError, DeletionError, GithubClient, Package, PackageFilter, PackageOwner,
    PackageRecord, PackageVersion,
};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const PER_PAGE: u32 = 100;
const TIMEOUT: Duration = Duration::from_secs(10);

pub struct GithubClientImpl {
    client: Client,
    api_url: String,
}

impl GithubClientImpl {
    pub fn new(token: impl AsRef<str>, api_url: impl Into<String>) -> Result<Self> {
        let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        log::debug!("{}: {}", USER_AGENT.as_str(), user_agent);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, "application/vnd.github+json".try_into()?);
        headers.insert(
            AUTHORIZATION,
            format!("Bearer {}", token.as_ref()).try_into()?,
        );
        headers.insert(USER_AGENT, user_agent.try_into()?);
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        let client = ClientBuilder::new()
            .default_headers(headers)
            .timeout(TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetches `url` and every page linked from it via `rel="next"`.
    async fn get_all_pages<T: DeserializeOwned>(&self, url: String) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut next = Some(url);

        while let Some(url) = next {
            log::debug!("GET {}", url);
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|source| ApiError::Request {
                    url: url.clone(),
                    source,
                })?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(ApiError::Status { url, status, body });
            }

            next = pagination::next_page(response.headers());
            let page: Vec<T> = response
                .json()
                .await
                .map_err(|source| ApiError::Decode { url, source })?;
            items.extend(page);
        }

        Ok(items)
    }
}

#[async_trait]
impl GithubClient for GithubClientImpl {
    async fn list_packages(
        &self,
        owner: &PackageOwner,
        filter: &PackageFilter,
    ) -> Result<Vec<Package>, ApiError> {
        let url = format!(
            "{api}/{base}/packages?package_type=container&per_page={PER_PAGE}",
            api = self.api_url,
            base = owner.base_url(),
        );
        let records: Vec<PackageRecord> = self.get_all_pages(url).await?;

        let packages = records
            .into_iter()
            .filter(|record| filter.matches(record))
            .map(|record| Package {
                name: record.name,
                owner: owner.clone(),
                versions_url: format!("{}/versions", record.url),
            })
            .collect();
        Ok(packages)
    }

    async fn list_versions(&self, package: &Package) -> Result<Vec<PackageVersion>, ApiError> {
        let url = format!("{}?per_page={PER_PAGE}", package.versions_url);
        self.get_all_pages(url).await
    }

    async fn delete_version(&self, version: &PackageVersion) -> Result<(), DeletionError> {
        let response: Response = self.client.delete(&version.url).send().await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(DeletionError::Status { status, body })
    }
}
