use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PackageRecord {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub repository: Option<RepositoryRecord>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RepositoryRecord {
    pub name: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PackageVersion {
    pub id: u64,
    /// The manifest digest, e.g. `sha256:...`.
    pub name: String,
    /// Endpoint of this version, also used to delete it.
    pub url: String,
    pub updated_at: DateTime<Utc>,
    pub metadata: PackageVersionMetadata,
}

impl PackageVersion {
    pub fn tags(&self) -> &[String] {
        &self.metadata.container.tags
    }

    pub fn is_tagged(&self) -> bool {
        !self.tags().is_empty()
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PackageVersionMetadata {
    #[serde(default)]
    pub container: ContainerVersionMetadata,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ContainerVersionMetadata {
    #[serde(default)]
    pub tags: Vec<String>,
}
