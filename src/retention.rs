//! Decides which versions of a package are no longer wanted.
//!
//! Two independent rules apply. Tagged versions beyond the `keep_at_most`
//! most recent ones (among those selected by the tag filters) are unwanted.
//! Untagged versions are unwanted unless a retained tagged version still
//! references them from its manifest list, which is how multi-architecture
//! images store their per-platform manifests.

use std::collections::HashSet;
use std::fmt::Display;

use glob::Pattern;

use crate::github::{Package, PackageVersion};
use crate::registry::ManifestSource;

/// A set of shell style tag patterns (`*`, `?`, `[...]`).
///
/// Character classes are negated with either `[!...]` or `[^...]`.
///
/// Malformed patterns are kept as entries that never match, so a filter
/// made only of malformed patterns still counts as a non-empty filter.
#[derive(Debug, Clone, Default)]
pub struct TagPatterns {
    patterns: Vec<Option<Pattern>>,
}

impl TagPatterns {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Pattern::new(&normalize_negation(pattern))
                    .map_err(|error| {
                        log::warn!("Ignoring invalid tag pattern {:?}: {}", pattern, error)
                    })
                    .ok()
            })
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether any of `tags` matches any of the patterns.
    pub fn matches_any(&self, tags: &[String]) -> bool {
        self.patterns
            .iter()
            .flatten()
            .any(|pattern| tags.iter().any(|tag| pattern.matches(tag)))
    }
}

/// Rewrites `[^...]` classes into the `[!...]` form `glob` understands.
fn normalize_negation(pattern: &str) -> String {
    let mut normalized = String::with_capacity(pattern.len());
    // Characters seen inside the current class, `None` outside of one.
    let mut class_len: Option<usize> = None;
    let mut negated = false;

    for c in pattern.chars() {
        match (c, class_len) {
            ('[', None) => {
                normalized.push(c);
                class_len = Some(0);
                negated = false;
            }
            ('^' | '!', Some(0)) if !negated => {
                normalized.push('!');
                negated = true;
            }
            (']', Some(len)) if len > 0 => {
                normalized.push(c);
                class_len = None;
            }
            (_, Some(len)) => {
                normalized.push(c);
                class_len = Some(len + 1);
            }
            (_, None) => normalized.push(c),
        }
    }

    normalized
}

/// What to do when the manifest list of a retained version can't be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifestFailurePolicy {
    /// Log the failure and treat the version as having no dependencies.
    #[default]
    FailOpen,
    /// Keep every untagged version of the package.
    KeepUntagged,
}

#[derive(Debug, Clone, Default)]
pub struct RetentionPolicy {
    /// Number of tagged versions to keep. Zero disables the rule.
    pub keep_at_most: usize,
    pub filter_tags: TagPatterns,
    pub skip_tags: TagPatterns,
    pub delete_untagged: bool,
    pub manifest_failures: ManifestFailurePolicy,
}

impl RetentionPolicy {
    /// Whether `version` takes part in the keep-at-most ranking.
    fn is_candidate(&self, version: &PackageVersion) -> bool {
        if self.skip_tags.matches_any(version.tags()) {
            return false;
        }
        self.filter_tags.is_empty() || self.filter_tags.matches_any(version.tags())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Older than the most recent `keep_at_most` tagged versions.
    Recency,
    /// Untagged and not referenced by any retained tagged version.
    Untagged,
}

impl Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Recency => f.write_str("recency"),
            Self::Untagged => f.write_str("untagged"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unwanted {
    pub version: PackageVersion,
    pub reason: Reason,
}

/// Outcome for one package. `kept` and `unwanted` partition its versions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    pub kept: Vec<PackageVersion>,
    pub unwanted: Vec<Unwanted>,
    pub tagged: usize,
    pub untagged: usize,
}

impl Decision {
    pub fn total(&self) -> usize {
        self.tagged + self.untagged
    }
}

/// Splits tagged versions into retained and unwanted-by-recency ones.
///
/// Both outputs keep the input order.
pub fn select_by_recency(
    tagged: Vec<PackageVersion>,
    policy: &RetentionPolicy,
) -> (Vec<PackageVersion>, Vec<PackageVersion>) {
    if policy.keep_at_most == 0 {
        return (tagged, Vec::new());
    }

    let mut candidates: Vec<usize> = (0..tagged.len())
        .filter(|&index| policy.is_candidate(&tagged[index]))
        .collect();
    candidates.sort_by(|&a, &b| tagged[b].updated_at.cmp(&tagged[a].updated_at));
    let outdated: HashSet<usize> = candidates
        .into_iter()
        .skip(policy.keep_at_most)
        .collect();

    let (unwanted, retained): (Vec<_>, Vec<_>) = tagged
        .into_iter()
        .enumerate()
        .partition(|(index, _)| outdated.contains(index));
    (
        retained.into_iter().map(|(_, version)| version).collect(),
        unwanted.into_iter().map(|(_, version)| version).collect(),
    )
}

/// Splits untagged versions into referenced and unreferenced ones.
pub fn select_untagged(
    untagged: Vec<PackageVersion>,
    dependencies: &HashSet<String>,
) -> (Vec<PackageVersion>, Vec<PackageVersion>) {
    untagged
        .into_iter()
        .partition(|version| dependencies.contains(&version.name))
}

/// Collects the child manifests of every retained tagged version.
///
/// Returns `None` when a lookup failed and the policy asks to keep all
/// untagged versions in that case.
pub async fn collect_dependencies(
    package: &Package,
    retained: &[PackageVersion],
    policy: &RetentionPolicy,
    manifests: &impl ManifestSource,
) -> Option<HashSet<String>> {
    let repository = package.repository();
    let mut dependencies = HashSet::new();

    for version in retained.iter().filter(|version| version.is_tagged()) {
        match manifests
            .manifest_children(&repository, &version.name)
            .await
        {
            Ok(children) => dependencies.extend(children),
            Err(error) => {
                log::warn!(
                    "Failed to get dependencies of {}:{}: {:?}",
                    package,
                    version.name,
                    anyhow::Error::new(error),
                );
                if policy.manifest_failures == ManifestFailurePolicy::KeepUntagged {
                    return None;
                }
            }
        }
    }

    Some(dependencies)
}

/// Computes which versions of `package` to delete under `policy`.
pub async fn decide(
    package: &Package,
    versions: Vec<PackageVersion>,
    policy: &RetentionPolicy,
    manifests: &impl ManifestSource,
) -> Decision {
    let (tagged, untagged): (Vec<_>, Vec<_>) =
        versions.into_iter().partition(PackageVersion::is_tagged);
    let tagged_count = tagged.len();
    let untagged_count = untagged.len();

    let (retained, outdated) = select_by_recency(tagged, policy);

    let (referenced, unreferenced) = if policy.delete_untagged {
        match collect_dependencies(package, &retained, policy, manifests).await {
            Some(dependencies) => select_untagged(untagged, &dependencies),
            None => {
                log::warn!(
                    "Keeping all untagged versions of {} since not all dependencies are known",
                    package,
                );
                (untagged, Vec::new())
            }
        }
    } else {
        (untagged, Vec::new())
    };

    let unwanted = outdated
        .into_iter()
        .map(|version| Unwanted {
            version,
            reason: Reason::Recency,
        })
        .chain(unreferenced.into_iter().map(|version| Unwanted {
            version,
            reason: Reason::Untagged,
        }))
        .collect();

    Decision {
        kept: retained.into_iter().chain(referenced).collect(),
        unwanted,
        tagged: tagged_count,
        untagged: untagged_count,
    }
}
