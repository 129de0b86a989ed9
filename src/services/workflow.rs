//! CI workflow materialization with a jittered schedule.
//!
//! Every mirrored repository gets the same workflow, but with its own daily
//! run time so scheduled jobs across the organization do not all fire at once.

use std::fmt;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde_yaml::Value;

use crate::error::{AppError, Result};

/// Daily cron schedule at a fixed minute and hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronSchedule {
    pub minute: u8,
    pub hour: u8,
}

impl CronSchedule {
    pub fn new(minute: u8, hour: u8) -> Result<Self> {
        if minute > 59 || hour > 23 {
            return Err(AppError::validation(format!(
                "invalid schedule {minute} {hour}"
            )));
        }
        Ok(Self { minute, hour })
    }

    /// Pick a minute in 0..=59 and an hour in 0..=23.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            minute: rng.gen_range(0..=59),
            hour: rng.gen_range(0..=23),
        }
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} * * *", self.minute, self.hour)
    }
}

/// A parsed workflow document shared by all destination repositories.
#[derive(Debug, Clone)]
pub struct WorkflowTemplate {
    file_name: String,
    document: Value,
}

impl WorkflowTemplate {
    /// Parse a template; `file_name` is what the rendered file will be called.
    pub fn parse(file_name: impl Into<String>, yaml: &str) -> Result<Self> {
        Ok(Self {
            file_name: file_name.into(),
            document: serde_yaml::from_str(yaml)?,
        })
    }

    /// Load a template from disk, or `None` if the file does not exist.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Io(e)),
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::config(format!("bad template path {path:?}")))?;
        Self::parse(file_name, &content).map(Some)
    }

    /// Relative location of the rendered workflow inside a repository.
    pub fn relative_path(&self) -> PathBuf {
        Path::new(".github/workflows").join(&self.file_name)
    }

    /// Render the template with every `on.schedule[].cron` set to `schedule`.
    pub fn render(&self, schedule: CronSchedule) -> Result<String> {
        let mut document = self.document.clone();
        let cron = Value::String(schedule.to_string());

        if let Some(items) = document
            .get_mut("on")
            .and_then(|on| on.get_mut("schedule"))
            .and_then(Value::as_sequence_mut)
        {
            for item in items {
                if let Some(slot) = item.get_mut("cron") {
                    *slot = cron.clone();
                }
            }
        }

        Ok(serde_yaml::to_string(&document)?)
    }

    /// Write the rendered workflow into the repository rooted at `repo_dir`.
    pub async fn install(&self, repo_dir: &Path, schedule: CronSchedule) -> Result<PathBuf> {
        let rendered = self.render(schedule)?;
        let path = repo_dir.join(self.relative_path());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, rendered).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const TEMPLATE: &str = r#"
name: Semgrep
on:
  workflow_dispatch: {}
  schedule:
    - cron: "0 0 * * *"
jobs:
  semgrep:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
"#;

    #[test]
    fn test_schedule_display() {
        assert_eq!(CronSchedule::new(7, 13).unwrap().to_string(), "7 13 * * *");
        assert!(CronSchedule::new(60, 0).is_err());
        assert!(CronSchedule::new(0, 24).is_err());
    }

    #[test]
    fn test_random_schedule_in_range_and_seeded() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let s = CronSchedule::random(&mut a);
            assert!(s.minute <= 59 && s.hour <= 23);
            assert_eq!(s, CronSchedule::random(&mut b));
        }
    }

    #[test]
    fn test_render_rewrites_cron() {
        let template = WorkflowTemplate::parse("semgrep.yml", TEMPLATE).unwrap();
        let rendered = template.render(CronSchedule::new(17, 4).unwrap()).unwrap();

        let doc: Value = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(doc["on"]["schedule"][0]["cron"], "17 4 * * *");
        assert_eq!(doc["name"], "Semgrep");
        assert_eq!(doc["jobs"]["semgrep"]["runs-on"], "ubuntu-latest");
    }

    #[test]
    fn test_render_without_schedule_is_unchanged() {
        let template =
            WorkflowTemplate::parse("ci.yml", "name: CI\non:\n  push: {}\n").unwrap();
        let rendered = template.render(CronSchedule::new(1, 1).unwrap()).unwrap();
        assert!(!rendered.contains("cron"));
    }

    #[tokio::test]
    async fn test_install_writes_under_workflows_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let template = WorkflowTemplate::parse("semgrep.yml", TEMPLATE).unwrap();
        let path = template
            .install(tmp.path(), CronSchedule::new(0, 0).unwrap())
            .await
            .unwrap();
        assert_eq!(path, tmp.path().join(".github/workflows/semgrep.yml"));
        assert!(path.exists());
    }

    #[test]
    fn test_load_optional_missing() {
        let loaded = WorkflowTemplate::load_optional(Path::new("/no/such/semgrep.yml")).unwrap();
        assert!(loaded.is_none());
    }
}
