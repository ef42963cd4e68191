//! Container registry access.
//!
//! Only the part of the distribution API needed to find which platform
//! manifests a multi-architecture tag still points to.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::StatusCode;
use thiserror::Error;

pub use client::RegistryClient;

mod client;
pub mod manifest;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to send request to the registry")]
    Request(#[from] reqwest::Error),

    #[error("Registry returned status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Failed to parse manifest")]
    Parse(#[from] serde_json::Error),
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Digests of the manifests referenced by the manifest list stored
    /// under `repository@digest`. Empty for single platform manifests.
    async fn manifest_children(
        &self,
        repository: &str,
        digest: &str,
    ) -> Result<Vec<String>, RegistryError>;
}
