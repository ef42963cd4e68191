use std::env;
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::github::{PackageFilter, PackageOwner};
use crate::retention::{ManifestFailurePolicy, RetentionPolicy, TagPatterns};

/// Delete old tagged and unreferenced untagged versions of GitHub container packages.
#[derive(Parser, Debug)]
#[clap(version)]
pub struct Args {
    /// User owning the packages (conflicts with --org)
    #[clap(long, conflicts_with = "org", required_unless_present = "org")]
    pub user: Option<String>,

    /// Organization owning the packages (conflicts with --user)
    #[clap(long, conflicts_with = "user")]
    pub org: Option<String>,

    /// GitHub token with delete:packages permission.
    /// You can also pass a token via the GITHUB_TOKEN env variable.
    #[clap(long)]
    pub token: Option<String>,

    /// Path to a file containing a GitHub token, used if --token is absent
    #[clap(long)]
    pub token_file: Option<PathBuf>,

    /// Only clean packages linked to this repository (NAME or OWNER/NAME)
    #[clap(long)]
    pub repo_name: Option<String>,

    /// Only clean the package with this name
    #[clap(long)]
    pub package_name: Option<String>,

    /// Keep at most this many tagged versions per package, 0 disables the limit
    #[clap(long, default_value_t = 5)]
    pub keep_at_most: usize,

    /// Delete untagged versions that no kept tagged version depends on
    #[clap(long, default_value_t = true, action = clap::ArgAction::Set, value_parser)]
    pub delete_untagged: bool,

    /// Comma or newline separated tag patterns limiting which versions --keep-at-most applies to.
    /// Accepts Unix shell-style wildcards.
    #[clap(long, default_value = "")]
    pub filter_tags: String,

    /// Comma or newline separated tag patterns of versions --keep-at-most never deletes.
    /// Accepts Unix shell-style wildcards.
    #[clap(long, default_value = "")]
    pub skip_tags: String,

    /// Keep all untagged versions of a package if any manifest lookup fails
    #[clap(long)]
    pub strict_manifests: bool,

    /// Container registry serving the packages
    #[clap(long, default_value = "ghcr.io")]
    pub registry: String,

    /// Don't persist but only print changes
    #[clap(long, short = 'n')]
    pub dry_run: bool,

    /// Make logging more verbose.
    /// You can also specify the log level via the RUST_LOG env variable.
    #[clap(long, short)]
    pub verbose: bool,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Neither --user nor --org was provided")]
    MissingOwner,

    #[error("No github token provided via --token, --token-file or GITHUB_TOKEN")]
    MissingToken,

    #[error("Failed to read the github token from {path}: {message}")]
    TokenFile { path: PathBuf, message: String },

    #[error("Repository {repository} does not belong to owner {owner}")]
    OwnerMismatch { repository: String, owner: String },
}

/// Validated settings of one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub owner: PackageOwner,
    pub token: String,
    pub api_url: String,
    pub registry: String,
    pub filter: PackageFilter,
    pub policy: RetentionPolicy,
    pub dry_run: bool,
}

impl Config {
    pub async fn from_args(args: Args) -> Result<Self, ConfigError> {
        let owner = match (args.user, args.org) {
            (Some(user), _) => PackageOwner::User(user),
            (None, Some(org)) => PackageOwner::Organization(org),
            (None, None) => return Err(ConfigError::MissingOwner),
        };

        let token = resolve_token(args.token, args.token_file).await?;

        let repository = args
            .repo_name
            .map(|repo_name| resolve_repository(&repo_name, &owner))
            .transpose()?
            .filter(|name| !name.is_empty());
        let package_name = args
            .package_name
            .map(|name| name.trim_matches('/').to_string())
            .filter(|name| !name.is_empty());

        let policy = RetentionPolicy {
            keep_at_most: args.keep_at_most,
            filter_tags: TagPatterns::new(&parse_tag_list(&args.filter_tags)),
            skip_tags: TagPatterns::new(&parse_tag_list(&args.skip_tags)),
            delete_untagged: args.delete_untagged,
            manifest_failures: match args.strict_manifests {
                true => ManifestFailurePolicy::KeepUntagged,
                false => ManifestFailurePolicy::FailOpen,
            },
        };

        Ok(Self {
            owner,
            token,
            api_url: env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| crate::github::DEFAULT_API_URL.to_string()),
            registry: args.registry,
            filter: PackageFilter {
                repository,
                package_name,
            },
            policy,
            dry_run: args.dry_run,
        })
    }
}

/// Splits a comma or newline separated list, dropping empty entries.
pub fn parse_tag_list(list: &str) -> Vec<String> {
    list.split(|c: char| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Strips an `owner/` prefix from `repo_name`, which must match `owner`.
pub fn resolve_repository(repo_name: &str, owner: &PackageOwner) -> Result<String, ConfigError> {
    match repo_name.split_once('/') {
        Some((repo_owner, name)) => {
            if !repo_owner.eq_ignore_ascii_case(owner.name()) {
                return Err(ConfigError::OwnerMismatch {
                    repository: repo_name.to_string(),
                    owner: owner.to_string(),
                });
            }
            Ok(name.to_string())
        }
        None => Ok(repo_name.to_string()),
    }
}

pub async fn resolve_token(
    token: Option<String>,
    token_file: Option<PathBuf>,
) -> Result<String, ConfigError> {
    let token = match (token, token_file) {
        (Some(token), _) => token,
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .map_err(|error| ConfigError::TokenFile {
                path: path.clone(),
                message: error.to_string(),
            })?,
        (None, None) => env::var("GITHUB_TOKEN").map_err(|_| ConfigError::MissingToken)?,
    };

    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(ConfigError::MissingToken);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tag_list() {
        assert!(parse_tag_list("").is_empty());
        assert_eq!(parse_tag_list("v1.*"), ["v1.*"]);
        assert_eq!(
            parse_tag_list(" latest, v1.*,\nstable ,,\n\n main-* "),
            ["latest", "v1.*", "stable", "main-*"],
        );
    }

    #[test]
    fn test_resolve_repository() {
        let owner = PackageOwner::Organization("Acme".to_string());
        assert_eq!(resolve_repository("app", &owner).unwrap(), "app");
        assert_eq!(resolve_repository("acme/app", &owner).unwrap(), "app");
        assert_eq!(
            resolve_repository("other/app", &owner),
            Err(ConfigError::OwnerMismatch {
                repository: "other/app".to_string(),
                owner: "Acme".to_string(),
            }),
        );
    }

    #[tokio::test]
    async fn test_resolve_token() {
        assert_eq!(
            resolve_token(Some(" secret\n".to_string()), None)
                .await
                .unwrap(),
            "secret",
        );
        assert_eq!(
            resolve_token(Some("  ".to_string()), None).await,
            Err(ConfigError::MissingToken),
        );
        assert!(matches!(
            resolve_token(None, Some(PathBuf::from("/nonexistent/token"))).await,
            Err(ConfigError::TokenFile { .. }),
        ));
    }

    #[tokio::test]
    async fn test_config_from_args() {
        let args = Args::parse_from([
            "ghcr-sweep",
            "--org",
            "acme",
            "--token",
            "secret",
            "--repo-name",
            "acme/app",
            "--package-name",
            "/app/",
            "--keep-at-most",
            "3",
            "--filter-tags",
            "v*",
            "--skip-tags",
            "stable,latest",
            "--delete-untagged",
            "false",
            "--strict-manifests",
            "-n",
        ]);
        let config = Config::from_args(args).await.unwrap();

        assert_eq!(config.owner, PackageOwner::Organization("acme".to_string()));
        assert_eq!(config.token, "secret");
        assert_eq!(config.filter.repository.as_deref(), Some("app"));
        assert_eq!(config.filter.package_name.as_deref(), Some("app"));
        assert_eq!(config.policy.keep_at_most, 3);
        assert!(!config.policy.filter_tags.is_empty());
        assert!(config.policy.skip_tags.matches_any(&["latest".to_string()]));
        assert!(!config.policy.delete_untagged);
        assert_eq!(
            config.policy.manifest_failures,
            ManifestFailurePolicy::KeepUntagged
        );
        assert!(config.dry_run);
        assert_eq!(config.registry, "ghcr.io");
    }

    #[tokio::test]
    async fn test_config_defaults() {
        let args = Args::parse_from(["ghcr-sweep", "--user", "jane", "--token", "secret"]);
        let config = Config::from_args(args).await.unwrap();

        assert_eq!(config.owner, PackageOwner::User("jane".to_string()));
        assert_eq!(config.filter, PackageFilter::default());
        assert_eq!(config.policy.keep_at_most, 5);
        assert!(config.policy.delete_untagged);
        assert!(config.policy.filter_tags.is_empty());
        assert!(config.policy.skip_tags.is_empty());
        assert_eq!(
            config.policy.manifest_failures,
            ManifestFailurePolicy::FailOpen
        );
        assert!(!config.dry_run);
    }

    #[test]
    fn test_owner_is_required() {
        assert!(Args::try_parse_from(["ghcr-sweep", "--token", "secret"]).is_err());
        assert!(Args::try_parse_from(["ghcr-sweep", "--user", "a", "--org", "b"]).is_err());
    }
}
