use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Args, Config};
use executor::DeletionSummary;
use github::{GithubClient, GithubClientImpl, Package};
use registry::{ManifestSource, RegistryClient};

mod config;
mod executor;
mod github;
mod registry;
mod retention;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    if env::var("RUST_LOG").is_err() {
        let level = match args.verbose {
            true => "debug",
            false => "info",
        };
        env::set_var(
            "RUST_LOG",
            format!("{}={}", env!("CARGO_PKG_NAME").replace('-', "_"), level),
        );
    }
    env_logger::init();

    log::info!(
        "Starting {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    );
    log::debug!("With arguments {:?}", env::args().collect::<Vec<_>>());

    match run(args).await {
        Ok(summary) if !summary.is_failure() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(error) => {
            log::error!("{:?}", error);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<DeletionSummary> {
    let config = Config::from_args(args)
        .await
        .context("Invalid configuration")?;

    let client = GithubClientImpl::new(&config.token, config.api_url.as_str())
        .context("Failed to create github client")?;
    let registry = RegistryClient::new(&config.token, config.registry.as_str())
        .context("Failed to create registry client")?;

    clean_packages(&client, &registry, &config).await
}

async fn clean_packages(
    client: &impl GithubClient,
    manifests: &impl ManifestSource,
    config: &Config,
) -> Result<DeletionSummary> {
    let packages = client
        .list_packages(&config.owner, &config.filter)
        .await
        .context(format!("Failed to list packages of {}", config.owner))?;
    log::debug!("Found {} packages of {}", packages.len(), config.owner);

    let mut summary = DeletionSummary::default();
    for package in packages {
        match clean_package(client, manifests, &package, config).await {
            Ok(package_summary) => summary += package_summary,
            Err(error) => log::error!("{:?}", error),
        }
    }

    log::info!("{} deletions", summary.succeeded);
    log::info!("{} errors", summary.failed);

    Ok(summary)
}

async fn clean_package(
    client: &impl GithubClient,
    manifests: &impl ManifestSource,
    package: &Package,
    config: &Config,
) -> Result<DeletionSummary> {
    log::debug!("Cleaning package {}", package);

    let versions = client
        .list_versions(package)
        .await
        .context(format!("Failed to get versions of package {}", package))?;

    let decision = retention::decide(package, versions, &config.policy, manifests).await;
    log::info!(
        "Processed package {} (total={}, tagged={}, untagged={}, unwanted={})",
        package,
        decision.total(),
        decision.tagged,
        decision.untagged,
        decision.unwanted.len(),
    );
    for version in &decision.kept {
        log::debug!("Keeping {}:{} {:?}", package, version.name, version.tags());
    }

    Ok(executor::apply_deletions(client, package, &decision.unwanted, config.dry_run).await)
}
