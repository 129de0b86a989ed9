// src/pipeline/mirror.rs

//! Mirror executor.
//!
//! Replicates one entry into its destination repository:
//! provision → stage → populate → annotate → publish → cleanup.
//! Each action works in its own temporary directory, which is removed
//! whether or not the action succeeded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use crate::error::Result;
use crate::pipeline::MirrorAction;
use crate::services::package::{self, PackageSource, PopulateOutcome};
use crate::services::{
    CommitOutcome, CronSchedule, Provisioned, RepoHost, VersionControl, WorkflowTemplate,
};

/// Details of a completed mirror action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorReport {
    /// Set for creates only
    pub provisioned: Option<Provisioned>,
    pub populate: PopulateOutcome,
    pub workflow_installed: bool,
    pub commit: CommitOutcome,
}

/// Result of [`MirrorExecutor::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    Skipped,
    Mirrored(MirrorReport),
}

/// Runs create/update actions against the hosting provider and git.
#[derive(Clone)]
pub struct MirrorExecutor {
    host: Arc<dyn RepoHost>,
    vcs: Arc<dyn VersionControl>,
    packages: Arc<dyn PackageSource>,
    template: Option<Arc<WorkflowTemplate>>,
    org: String,
    work_dir: PathBuf,
    default_branch: String,
}

impl MirrorExecutor {
    pub fn new(
        host: Arc<dyn RepoHost>,
        vcs: Arc<dyn VersionControl>,
        packages: Arc<dyn PackageSource>,
        org: impl Into<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host,
            vcs,
            packages,
            template: None,
            org: org.into(),
            work_dir: work_dir.into(),
            default_branch: "main".to_string(),
        }
    }

    pub fn with_template(mut self, template: Option<Arc<WorkflowTemplate>>) -> Self {
        self.template = template;
        self
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    /// Mirror the entry behind `action` using the given workflow schedule.
    ///
    /// Any error leaves the destination possibly half-updated but never
    /// leaks the working copy; re-running the same action is safe.
    pub async fn execute(
        &self,
        action: &MirrorAction,
        schedule: CronSchedule,
    ) -> Result<MirrorOutcome> {
        if action.is_skip() {
            return Ok(MirrorOutcome::Skipped);
        }

        let repo = action.repo_name();
        log::info!("Mirroring {}...", action.describe());

        // 1. Provision (creates only; updates assume the repository exists)
        let provisioned = match action {
            MirrorAction::Create { .. } => {
                let full_name = format!("{}/{}", self.org, repo);
                Some(self.host.ensure_repo(&full_name).await?)
            }
            _ => None,
        };

        // 2-5 run inside a scratch directory that is always removed.
        let scratch = self.scratch_dir(&repo)?;
        let result = self
            .publish_in(action, &repo, scratch.path(), schedule)
            .await;

        // 6. Cleanup
        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            log::warn!(
                "Could not remove working copy {}: {}",
                scratch_path.display(),
                e
            );
        }

        let (populate, workflow_installed, commit) = result?;
        Ok(MirrorOutcome::Mirrored(MirrorReport {
            provisioned,
            populate,
            workflow_installed,
            commit,
        }))
    }

    fn scratch_dir(&self, repo: &str) -> Result<TempDir> {
        std::fs::create_dir_all(&self.work_dir)?;
        Ok(tempfile::Builder::new()
            .prefix(&format!("{repo}-"))
            .tempdir_in(&self.work_dir)?)
    }

    async fn publish_in(
        &self,
        action: &MirrorAction,
        repo: &str,
        scratch: &Path,
        schedule: CronSchedule,
    ) -> Result<(PopulateOutcome, bool, CommitOutcome)> {
        let entry = action.entry();

        // 2. Stage
        let checkout = scratch.join(repo);
        self.vcs.clone_repo(repo, &checkout).await?;

        // 3. Populate
        let populate = package::populate(self.packages.as_ref(), entry, &checkout).await?;

        // 4. Annotate
        let workflow_installed = match &self.template {
            Some(template) => {
                template.install(&checkout, schedule).await?;
                log::debug!("Installed workflow for {} with schedule '{}'", repo, schedule);
                true
            }
            None => false,
        };

        // 5. Publish
        let commit = self.vcs.commit(&checkout, &[], &entry.version).await?;
        match commit {
            CommitOutcome::Committed => {
                self.vcs
                    .push(&checkout, Some(&self.default_branch))
                    .await?;
                log::info!("Pushed {} @ {}", repo, entry.version);
            }
            CommitOutcome::NothingToCommit => {
                log::info!("No changes to commit for {}", repo);
            }
        }

        Ok((populate, workflow_installed, commit))
    }
}
