//! Destination repository provisioning.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::utils::process;

/// How a provisioning request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    Created,
    /// The repository was already there; not an error.
    AlreadyExists,
}

/// A hosting provider that can create repositories on demand.
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// Create `name` (`org/repo`) unless it already exists.
    async fn ensure_repo(&self, name: &str) -> Result<Provisioned>;
}

/// Provisions GitHub repositories through the `gh` command-line tool.
pub struct GhCli {
    token: String,
    timeout: Duration,
}

impl GhCli {
    pub fn new(token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            token: token.into(),
            timeout,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("gh");
        if !self.token.is_empty() {
            cmd.env("GH_TOKEN", &self.token);
        }
        cmd
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let mut cmd = self.command();
        cmd.args(["repo", "view", name, "--json", "name"]);
        let output = process::run(cmd, &format!("gh repo view {name}"), None, self.timeout).await?;
        Ok(output.success)
    }
}

/// `gh repo create` reports a name clash on stderr.
fn is_already_exists(stderr: &str) -> bool {
    stderr.to_lowercase().contains("already exists")
}

#[async_trait]
impl RepoHost for GhCli {
    async fn ensure_repo(&self, name: &str) -> Result<Provisioned> {
        if self.exists(name).await? {
            log::info!("Repo {} already exists.", name);
            return Ok(Provisioned::AlreadyExists);
        }

        log::info!("Creating repo {}...", name);
        let mut cmd = self.command();
        cmd.args([
            "repo",
            "create",
            name,
            "--public",
            "--add-readme",
            "--disable-issues",
            "--disable-wiki",
        ]);
        let describe = format!("gh repo create {name}");
        let output = process::run(cmd, &describe, None, self.timeout).await?;

        if output.success {
            Ok(Provisioned::Created)
        } else if is_already_exists(&output.stderr) {
            // Lost a race with an earlier, interrupted run.
            log::info!("Repo {} appeared concurrently; treating as existing.", name);
            Ok(Provisioned::AlreadyExists)
        } else {
            Err(AppError::command(
                "gh",
                format!("{}: {}", describe, output.stderr.trim()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_exists_detection() {
        assert!(is_already_exists(
            "GraphQL: Name already exists on this account (createRepository)"
        ));
        assert!(is_already_exists("repository already exists"));
        assert!(!is_already_exists("HTTP 401: Bad credentials"));
    }
}
