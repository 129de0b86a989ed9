//! wpmirror CLI
//!
//! Local execution entry point.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use wpmirror::{
    error::Result,
    models::{Config, EntryKind, RunSummary},
    pipeline::{self, MirrorExecutor, SyncContext, SyncOptions},
    services::{
        Backoff, CatalogFetcher, CommitIdentity, GhCli, GitCli, HttpPackageSource, RemoteSpec,
        WordPressCatalog, WorkflowTemplate,
    },
    storage::{LocalSnapshotStore, SnapshotStore},
    utils::http,
};

/// Exit status when the run finished but some entries or catalogs failed.
const EXIT_DEGRADED: u8 = 2;

/// wpmirror - WordPress package mirror
#[derive(Parser, Debug)]
#[command(
    name = "wpmirror",
    version,
    about = "Mirror WordPress plugins and themes into per-package git repositories"
)]
struct Cli {
    /// Directory holding config.toml, the workflow template, and targets.json
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mirror new and updated entries, then save the snapshot
    Sync {
        /// Minimum active installs for an entry to be mirrored
        #[arg(long, env = "MIN_INSTALL_COUNT")]
        min_install_count: Option<u64>,

        /// Only sync this kind (plugins or themes)
        #[arg(long)]
        kind: Option<EntryKind>,

        /// Show what would be mirrored without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Fetch and diff the catalog without mirroring
    Plan {
        #[arg(long, env = "MIN_INSTALL_COUNT")]
        min_install_count: Option<u64>,

        #[arg(long)]
        kind: Option<EntryKind>,
    },

    /// Validate configuration and environment
    Validate,

    /// Show current snapshot info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn sync_options(
    config: &Config,
    min_install_count: Option<u64>,
    kind: Option<EntryKind>,
) -> SyncOptions {
    SyncOptions {
        min_active_installs: min_install_count.unwrap_or(config.filter.min_active_installs),
        kinds: kind.map_or_else(|| EntryKind::ALL.to_vec(), |k| vec![k]),
        max_concurrent: config.mirror.max_concurrent,
        jitter_seed: config.mirror.jitter_seed,
        dry_run: false,
    }
}

fn catalog_fetcher(config: &Config) -> Result<CatalogFetcher> {
    let client = http::create_client(&config.catalog)?;
    let source = Arc::new(WordPressCatalog::new(client, config.catalog.clone()));
    Ok(CatalogFetcher::new(source, Backoff::from_config(&config.catalog)))
}

/// Wire the real collaborators together.
fn build_context(config: &Config, storage_dir: &Path) -> Result<SyncContext> {
    let credentials = &config.credentials;
    let command_timeout = Duration::from_secs(config.mirror.command_timeout_secs);

    log::info!(
        "Committing as {} <{}>",
        credentials.git_user_name,
        credentials.git_user_email
    );
    let identity = CommitIdentity {
        name: credentials.git_user_name.clone(),
        email: credentials.git_user_email.clone(),
    };
    let remote = RemoteSpec::from_credentials(&config.mirror.git_host, credentials);
    let vcs = Arc::new(GitCli::new(identity, remote, command_timeout));
    let host = Arc::new(GhCli::new(credentials.token.clone(), command_timeout));

    let download_client =
        http::create_download_client(&config.catalog, config.mirror.download_timeout_secs)?;
    let packages = Arc::new(HttpPackageSource::new(download_client));

    let template_path = config.workflow_template_path(storage_dir);
    let template = WorkflowTemplate::load_optional(&template_path)?;
    if template.is_none() {
        log::warn!(
            "Workflow template {} not found; repositories will not get a workflow",
            template_path.display()
        );
    }

    let executor = MirrorExecutor::new(
        host,
        vcs.clone(),
        packages,
        credentials.org.clone(),
        config.work_dir(),
    )
    .with_template(template.map(Arc::new))
    .with_default_branch(config.mirror.default_branch.clone());

    Ok(SyncContext {
        fetcher: catalog_fetcher(config)?,
        store: Arc::new(LocalSnapshotStore::in_dir(storage_dir)),
        executor,
        vcs,
        snapshot_repo: config
            .mirror
            .publish_snapshot
            .then(|| storage_dir.to_path_buf()),
    })
}

fn report(summary: &RunSummary) {
    for (kind, counts) in &summary.kinds {
        match &counts.catalog_error {
            Some(error) => log::error!("{}: catalog unavailable ({})", kind, error),
            None => log::info!(
                "{}: {} fetched, {} in scope, {} created, {} updated, {} unchanged, {} failed",
                kind,
                counts.fetched,
                counts.in_scope,
                counts.created,
                counts.updated,
                counts.skipped,
                counts.failed
            ),
        }
        if let Some(reason) = &counts.partial_fetch {
            log::warn!("{}: catalog only partly fetched ({})", kind, reason);
        }
    }
    for failure in &summary.failures {
        log::error!(
            "✗ {}/{} @ {}: {}",
            failure.kind,
            failure.slug,
            failure.version,
            failure.reason
        );
    }
    if let Some(error) = &summary.snapshot_publish_error {
        log::error!("Snapshot publish failed: {}", error);
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path).with_env_credentials();
    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    match cli.command {
        Command::Sync {
            min_install_count,
            kind,
            dry_run,
        } => {
            config.validate()?;
            let mut options = sync_options(&config, min_install_count, kind);
            options.dry_run = dry_run;
            log::info!(
                "Syncing {:?} with at least {} active installs",
                options.kinds,
                options.min_active_installs
            );

            let ctx = build_context(&config, &cli.storage_dir)?;
            let summary = pipeline::run_sync(&ctx, &options).await?;
            report(&summary);

            if summary.is_degraded() {
                log::warn!(
                    "Finished with {} failed entries, {} unavailable and {} partial catalogs",
                    summary.failed_count(),
                    summary.catalog_error_count(),
                    summary.partial_fetch_count()
                );
                return Ok(ExitCode::from(EXIT_DEGRADED));
            }
            log::info!("Mirrored {} entries.", summary.mirrored_count());
        }

        Command::Plan {
            min_install_count,
            kind,
        } => {
            config.validate()?;
            let options = sync_options(&config, min_install_count, kind);
            let store = LocalSnapshotStore::in_dir(&cli.storage_dir);
            let snapshot = store.load().await?;

            let plan = pipeline::plan(&catalog_fetcher(&config)?, &snapshot, &options).await;
            for action in plan.pending() {
                println!("{}", action.describe());
            }
            log::info!("{} entries would be mirrored", plan.pending_count());

            let partial = plan.kinds.iter().any(|k| k.incomplete.is_some());
            if partial || !plan.unavailable.is_empty() {
                return Ok(ExitCode::from(EXIT_DEGRADED));
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            let template_path = config.workflow_template_path(&cli.storage_dir);
            match WorkflowTemplate::load_optional(&template_path) {
                Ok(Some(_)) => log::info!("✓ Workflow template {}", template_path.display()),
                Ok(None) => log::warn!("Workflow template {} not found", template_path.display()),
                Err(e) => {
                    log::error!("Workflow template is invalid: {}", e);
                    return Err(e);
                }
            }

            let missing = config.credentials.missing();
            if missing.is_empty() {
                log::info!("✓ Environment OK");
            } else {
                log::warn!("Missing environment variables: {}", missing.join(", "));
            }

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());

            let store = LocalSnapshotStore::in_dir(&cli.storage_dir);
            if store.path().exists() {
                let snapshot = store.load().await?;
                log::info!("Tracked plugins: {}", snapshot.plugins.len());
                log::info!("Tracked themes: {}", snapshot.themes.len());
            } else {
                log::info!("No snapshot found yet.");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is normal outside local development.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("wpmirror starting...");

    match run(cli).await {
        Ok(code) => {
            log::info!("Done!");
            code
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
