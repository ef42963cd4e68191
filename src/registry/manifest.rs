use serde::Deserialize;

use super::RegistryError;

pub const OCI_IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";

/// A multi-architecture manifest list (Docker) or image index (OCI).
///
/// Single platform manifests have no `manifests` array and parse into an
/// empty index.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ManifestIndex {
    #[serde(default)]
    pub manifests: Vec<ManifestDescriptor>,
}

/// Entry of a manifest list. Only the digest matters here; the media type,
/// size and platform of each entry are left unparsed.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ManifestDescriptor {
    pub digest: String,
}

/// Digests of all manifests referenced by the given manifest document.
pub fn parse_children(body: &[u8]) -> Result<Vec<String>, RegistryError> {
    let index: ManifestIndex = serde_json::from_slice(body)?;
    Ok(index
        .manifests
        .into_iter()
        .map(|descriptor| descriptor.digest)
        .collect())
}
