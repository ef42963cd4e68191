use crate::github::{GithubClient, Package};
use crate::retention::Unwanted;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl DeletionSummary {
    pub fn is_failure(&self) -> bool {
        self.failed > 0
    }
}

impl std::ops::AddAssign for DeletionSummary {
    fn add_assign(&mut self, other: Self) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

/// Deletes every unwanted version one after another.
///
/// Failures are logged and counted but never stop the remaining deletions.
/// In dry-run mode nothing is deleted and every version counts as deleted.
pub async fn apply_deletions(
    client: &impl GithubClient,
    package: &Package,
    unwanted: &[Unwanted],
    dry_run: bool,
) -> DeletionSummary {
    let mut summary = DeletionSummary::default();

    for Unwanted { version, reason } in unwanted {
        let dry_run_suffix = match dry_run {
            true => " (DRY RUN)",
            false => "",
        };
        log::info!(
            "Deleting {}:{} ({}){}",
            package,
            version.name,
            reason,
            dry_run_suffix,
        );

        if dry_run {
            summary.succeeded += 1;
            continue;
        }

        match client.delete_version(version).await {
            Ok(()) => summary.succeeded += 1,
            Err(error) => {
                log::warn!(
                    "Failed to delete {}:{}: {:?}",
                    package,
                    version.name,
                    anyhow::Error::new(error),
                );
                summary.failed += 1;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mockall::predicate::*;
    use reqwest::StatusCode;

    use super::*;
    use crate::github::{
        ContainerVersionMetadata, DeletionError, MockGithubClient, PackageOwner, PackageVersion,
        PackageVersionMetadata,
    };
    use crate::retention::Reason;

    fn unwanted(id: u64, reason: Reason) -> Unwanted {
        Unwanted {
            version: PackageVersion {
                id,
                name: format!("sha256:foobar{id}"),
                url: format!("https://api.github.com/users/user/packages/container/my-package/versions/{id}"),
                updated_at: Utc::now(),
                metadata: PackageVersionMetadata {
                    container: ContainerVersionMetadata::default(),
                },
            },
            reason,
        }
    }

    fn package() -> Package {
        Package {
            name: "my-package".to_string(),
            owner: PackageOwner::User("user".to_string()),
            versions_url: String::new(),
        }
    }

    #[tokio::test]
    async fn test_apply_deletions() {
        let mut client = MockGithubClient::new();
        let versions = vec![
            unwanted(1, Reason::Recency),
            unwanted(2, Reason::Untagged),
            unwanted(3, Reason::Untagged),
        ];

        // Nothing to delete
        let summary = apply_deletions(&client, &package(), &[], false).await;
        assert_eq!(summary, DeletionSummary::default());

        // Dry run never calls the api
        let summary = apply_deletions(&client, &package(), &versions, true).await;
        assert_eq!(
            summary,
            DeletionSummary {
                succeeded: 3,
                failed: 0
            }
        );
        assert!(!summary.is_failure());

        // A failure doesn't stop the remaining deletions
        client
            .expect_delete_version()
            .with(function(|version: &PackageVersion| version.id == 2))
            .times(1)
            .returning(|_| {
                Err(DeletionError::Status {
                    status: StatusCode::FORBIDDEN,
                    body: "Package not found".to_string(),
                })
            });
        client
            .expect_delete_version()
            .with(function(|version: &PackageVersion| version.id != 2))
            .times(2)
            .returning(|_| Ok(()));
        let summary = apply_deletions(&client, &package(), &versions, false).await;
        client.checkpoint();
        assert_eq!(
            summary,
            DeletionSummary {
                succeeded: 2,
                failed: 1
            }
        );
        assert!(summary.is_failure());
    }

    #[test]
    fn test_summary_accumulates() {
        let mut total = DeletionSummary::default();
        total += DeletionSummary {
            succeeded: 2,
            failed: 0,
        };
        total += DeletionSummary {
            succeeded: 1,
            failed: 3,
        };
        assert_eq!(
            total,
            DeletionSummary {
                succeeded: 3,
                failed: 3
            }
        );
    }
}
