// src/pipeline/sync.rs

//! Sync orchestration.
//!
//! load snapshot → fetch + filter each kind → diff → mirror pending actions
//! → save the new snapshot → publish the snapshot file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::Result;
use crate::models::{ActionFailure, EntryKind, EntryMap, RunSummary, Snapshot};
use crate::pipeline::diff::{DiffResult, MirrorAction, diff_snapshot};
use crate::pipeline::filter::filter_catalog;
use crate::pipeline::mirror::{MirrorExecutor, MirrorOutcome};
use crate::services::{
    CatalogFetcher, CommitOutcome, CronSchedule, PopulateOutcome, VersionControl,
};
use crate::storage::{SNAPSHOT_FILE, SnapshotStore};

/// Knobs for a single run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub min_active_installs: u64,
    /// Kinds to fetch; others keep their previous snapshot
    pub kinds: Vec<EntryKind>,
    pub max_concurrent: usize,
    pub jitter_seed: Option<u64>,
    /// Plan only: no mirroring, no snapshot write
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            min_active_installs: 1000,
            kinds: EntryKind::ALL.to_vec(),
            max_concurrent: 1,
            jitter_seed: None,
            dry_run: false,
        }
    }
}

/// Collaborators the orchestrator drives.
pub struct SyncContext {
    pub fetcher: CatalogFetcher,
    pub store: Arc<dyn SnapshotStore>,
    pub executor: MirrorExecutor,
    pub vcs: Arc<dyn VersionControl>,
    /// Git checkout holding the snapshot file; `None` disables publishing
    pub snapshot_repo: Option<PathBuf>,
}

/// Diff for one kind whose catalog was fetched.
#[derive(Debug, Clone)]
pub struct KindPlan {
    pub kind: EntryKind,
    pub fetched: usize,
    pub diff: DiffResult,
    /// Why the catalog walk stopped early, if it did
    pub incomplete: Option<String>,
    /// Previous entries on pages that were never returned
    pub retained: EntryMap,
}

/// What a run would do.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub kinds: Vec<KindPlan>,
    /// Kinds whose catalog could not be fetched, with the reason
    pub unavailable: Vec<(EntryKind, String)>,
}

impl SyncPlan {
    pub fn pending(&self) -> impl Iterator<Item = &MirrorAction> {
        self.kinds.iter().flat_map(|k| k.diff.pending())
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    fn planned(&self, kind: EntryKind) -> Option<&KindPlan> {
        self.kinds.iter().find(|k| k.kind == kind)
    }

    /// Seed a summary with per-kind counts from this plan.
    fn summarize(&self, summary: &mut RunSummary) {
        for plan in &self.kinds {
            let counts = summary.kind_mut(plan.kind);
            counts.fetched = plan.fetched;
            counts.in_scope = plan.diff.actions.len();
            counts.skipped = plan.diff.skipped();
            counts.partial_fetch = plan.incomplete.clone();
        }
        for (kind, reason) in &self.unavailable {
            summary.kind_mut(*kind).catalog_error = Some(reason.clone());
        }
    }
}

/// Fetch, filter, and diff every requested kind against `snapshot`.
///
/// A kind whose fetch fails is reported in [`SyncPlan::unavailable`]
/// instead of aborting the other kinds.
pub async fn plan(
    fetcher: &CatalogFetcher,
    snapshot: &Snapshot,
    options: &SyncOptions,
) -> SyncPlan {
    let mut plan = SyncPlan::default();

    for kind in EntryKind::ALL {
        if !options.kinds.contains(&kind) {
            continue;
        }
        match fetcher.fetch_catalog(kind).await {
            Ok(fetch) => {
                let fetched = fetch.entries.len();
                let retained = match &fetch.incomplete {
                    Some(reason) => {
                        let seen: HashSet<&str> =
                            fetch.entries.iter().map(|e| e.slug.as_str()).collect();
                        let retained: EntryMap = snapshot
                            .entries(kind)
                            .iter()
                            .filter(|(slug, _)| !seen.contains(slug.as_str()))
                            .map(|(slug, entry)| (slug.clone(), entry.clone()))
                            .collect();
                        log::warn!(
                            "{} catalog is incomplete ({}); keeping {} unseen entries",
                            kind,
                            reason,
                            retained.len()
                        );
                        retained
                    }
                    None => EntryMap::new(),
                };
                let current = filter_catalog(fetch.entries, options.min_active_installs);
                let diff = diff_snapshot(snapshot, kind, &current);
                log::info!(
                    "{}: {} fetched, {} in scope, {} new, {} updated, {} unchanged, {} dropped",
                    kind,
                    fetched,
                    current.len(),
                    diff.created(),
                    diff.updated(),
                    diff.skipped(),
                    diff.dropped.len()
                );
                if !diff.has_changes() {
                    log::info!("{}: nothing to mirror", kind);
                }
                plan.kinds.push(KindPlan {
                    kind,
                    fetched,
                    diff,
                    incomplete: fetch.incomplete,
                    retained,
                });
            }
            Err(e) if e.is_rate_limited() => {
                log::error!("Gave up on the {} catalog: {}", kind, e);
                plan.unavailable.push((kind, e.to_string()));
            }
            Err(e) => {
                log::error!("Could not fetch {} catalog: {}", kind, e);
                plan.unavailable.push((kind, e.to_string()));
            }
        }
    }

    plan
}

/// Run a full sync and report what happened.
///
/// Only snapshot load/save failures are returned as errors; everything
/// else is isolated per entry or per kind and recorded in the summary.
pub async fn run_sync(ctx: &SyncContext, options: &SyncOptions) -> Result<RunSummary> {
    let mut summary = RunSummary::new();

    let previous = ctx.store.load().await?;
    let plan = plan(&ctx.fetcher, &previous, options).await;
    plan.summarize(&mut summary);

    if options.dry_run {
        for action in plan.pending() {
            log::info!("[dry-run] would {}", action.describe());
        }
        summary.finish();
        return Ok(summary);
    }

    let mut next = carry_forward(&previous, &plan);
    execute_pending(ctx, options, &plan, &previous, &mut next, &mut summary).await;

    ctx.store.save(&next).await?;

    if let Some(repo) = &ctx.snapshot_repo {
        if let Err(e) = publish_snapshot(ctx.vcs.as_ref(), repo).await {
            log::error!("Could not publish {}: {}", SNAPSHOT_FILE, e);
            summary.snapshot_publish_error = Some(e.to_string());
        }
    }

    summary.finish();
    Ok(summary)
}

/// Start the next snapshot: unchanged entries of planned kinds, previous
/// entries a partial fetch never saw, plus the previous state of every kind
/// that was not (or could not be) fetched.
fn carry_forward(previous: &Snapshot, plan: &SyncPlan) -> Snapshot {
    let mut next = Snapshot::default();
    for kind in EntryKind::ALL {
        match plan.planned(kind) {
            Some(kind_plan) => {
                for action in kind_plan.diff.actions.iter().filter(|a| a.is_skip()) {
                    next.insert(kind, action.entry().clone());
                }
                for entry in kind_plan.retained.values() {
                    next.insert(kind, entry.clone());
                }
            }
            None => next.set_entries(kind, previous.entries(kind).clone()),
        }
    }
    next
}

async fn execute_pending(
    ctx: &SyncContext,
    options: &SyncOptions,
    plan: &SyncPlan,
    previous: &Snapshot,
    next: &mut Snapshot,
    summary: &mut RunSummary,
) {
    let mut rng = match options.jitter_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let jobs: Vec<(MirrorAction, CronSchedule)> = plan
        .pending()
        .map(|action| (action.clone(), CronSchedule::random(&mut rng)))
        .collect();

    if jobs.is_empty() {
        log::info!("Nothing to mirror.");
        return;
    }
    log::info!("Mirroring {} entries...", jobs.len());

    let executor = &ctx.executor;
    let mut results = stream::iter(jobs)
        .map(|(action, schedule)| async move {
            let result = executor.execute(&action, schedule).await;
            (action, result)
        })
        .buffer_unordered(options.max_concurrent.max(1));

    while let Some((action, result)) = results.next().await {
        let kind = action.kind();
        let entry = action.entry();
        match result {
            Ok(outcome) => {
                if let MirrorOutcome::Mirrored(report) = &outcome {
                    if let PopulateOutcome::ExtractionFailed(reason) = &report.populate {
                        log::warn!(
                            "{} published without package contents: {}",
                            action.repo_name(),
                            reason
                        );
                    }
                }
                next.insert(kind, entry.clone());
                let counts = summary.kind_mut(kind);
                match &action {
                    MirrorAction::Create { .. } => counts.created += 1,
                    MirrorAction::Update { .. } => counts.updated += 1,
                    MirrorAction::Skip { .. } => {}
                }
            }
            Err(e) => {
                log::error!("Failed to {}: {}", action.describe(), e);
                // Keep the last good version so the entry is retried next run.
                if let Some(old) = previous.get(kind, &entry.slug) {
                    next.insert(kind, old.clone());
                }
                summary.record_failure(ActionFailure {
                    kind,
                    slug: entry.slug.clone(),
                    version: entry.version.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Commit and push the snapshot file in its checkout. No changes is success.
async fn publish_snapshot(vcs: &dyn VersionControl, repo: &Path) -> Result<()> {
    match vcs
        .commit(repo, &[SNAPSHOT_FILE], "Update targets.json")
        .await?
    {
        CommitOutcome::Committed => {
            vcs.push(repo, None).await?;
            log::info!("Published {}", SNAPSHOT_FILE);
        }
        CommitOutcome::NothingToCommit => log::info!("{} unchanged", SNAPSHOT_FILE),
    }
    Ok(())
}
