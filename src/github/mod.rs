use std::fmt::Display;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::StatusCode;
use thiserror::Error;

pub use api::{ContainerVersionMetadata, PackageRecord, PackageVersion, PackageVersionMetadata};
pub use client::{GithubClientImpl, DEFAULT_API_URL};

mod api;
mod client;
mod pagination;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOwner {
    User(String),
    Organization(String),
}

impl PackageOwner {
    pub fn name(&self) -> &str {
        match self {
            Self::User(user) => user,
            Self::Organization(org) => org,
        }
    }

    fn base_url(&self) -> String {
        match self {
            Self::User(user) => format!("users/{user}"),
            Self::Organization(org) => format!("orgs/{org}"),
        }
    }
}

impl Display for PackageOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A container package of one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub owner: PackageOwner,
    pub versions_url: String,
}

impl Package {
    /// Repository path of the package inside the container registry.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner.name(), self.name)
    }
}

impl Display for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Client side filters applied to every listed package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageFilter {
    /// Name of the source repository, compared case-insensitively.
    pub repository: Option<String>,
    /// Exact package name.
    pub package_name: Option<String>,
}

impl PackageFilter {
    pub fn matches(&self, record: &PackageRecord) -> bool {
        if let Some(repository) = &self.repository {
            let linked = record
                .repository
                .as_ref()
                .map(|repo| repo.name.to_lowercase());
            if linked.as_deref() != Some(repository.to_lowercase().as_str()) {
                return false;
            }
        }

        match &self.package_name {
            Some(name) => &record.name == name,
            None => true,
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to send request to {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GitHub API returned status {status} for {url}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("Failed to parse reply from {url} as json")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Error, Debug)]
pub enum DeletionError {
    #[error("Failed to send delete request")]
    Request(#[from] reqwest::Error),

    #[error("Server returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait GithubClient: Send + Sync {
    /// Lists all container packages of `owner` that pass `filter`, following every page.
    async fn list_packages(
        &self,
        owner: &PackageOwner,
        filter: &PackageFilter,
    ) -> Result<Vec<Package>, ApiError>;

    /// Lists all versions of `package`, following every page.
    async fn list_versions(&self, package: &Package) -> Result<Vec<PackageVersion>, ApiError>;

    async fn delete_version(&self, version: &PackageVersion) -> Result<(), DeletionError>;
}
