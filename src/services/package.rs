//! Package download and extraction.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use zip::ZipArchive;

use crate::error::{AppError, Result};
use crate::models::CatalogEntry;
use crate::utils::http::truncate_body;

/// Something that can hand over the bytes of a package archive.
#[async_trait]
pub trait PackageSource: Send + Sync {
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// Downloads archives over HTTP, following redirects.
pub struct HttpPackageSource {
    client: Client,
}

impl HttpPackageSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PackageSource for HttpPackageSource {
    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        log::info!("Downloading {}...", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::RemoteFetch {
                status: status.as_u16(),
                body: truncate_body(&body, 200),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// What happened when a package was placed into a working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulateOutcome {
    /// Number of files written
    Extracted(usize),
    /// The archive was unusable; the working copy was left as it was.
    ExtractionFailed(String),
}

/// Download `entry`'s archive into `dir`, unpack it there, and remove the archive.
///
/// Download failures are errors. Extraction failures are reported through
/// [`PopulateOutcome::ExtractionFailed`] so the caller can carry on.
pub async fn populate(
    source: &dyn PackageSource,
    entry: &CatalogEntry,
    dir: &Path,
) -> Result<PopulateOutcome> {
    let bytes = source.download(&entry.download_link).await?;
    let archive_path = dir.join(entry.archive_name());
    tokio::fs::write(&archive_path, &bytes).await?;

    let target = dir.to_path_buf();
    let path = archive_path.clone();
    let extracted = tokio::task::spawn_blocking(move || extract_archive(&path, &target))
        .await
        .map_err(|e| AppError::extraction(format!("extraction task panicked: {e}")))?;

    match extracted {
        Ok(count) => {
            tokio::fs::remove_file(&archive_path).await?;
            log::debug!("Extracted {} files for {}", count, entry.slug);
            Ok(PopulateOutcome::Extracted(count))
        }
        Err(e) => {
            log::warn!("Could not extract zip {}: {}", archive_path.display(), e);
            // Leaving the broken archive would get it committed.
            if let Err(rm) = tokio::fs::remove_file(&archive_path).await {
                log::warn!("Could not remove {}: {}", archive_path.display(), rm);
            }
            Ok(PopulateOutcome::ExtractionFailed(e.to_string()))
        }
    }
}

/// Unpack a zip archive under `dest`, returning how many files were written.
///
/// Entries whose paths would land outside `dest`, or inside its `.git`
/// directory, are skipped.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<usize> {
    let file = fs::File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let Some(relative) = file
            .enclosed_name()
            .map(PathBuf::from)
            .filter(|p| !is_git_metadata(p))
        else {
            log::warn!("Skipping unsafe archive path {:?}", file.name());
            continue;
        };
        let out_path = dest.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&out_path)?;
        io::copy(&mut file, &mut out).map_err(AppError::extraction)?;
        written += 1;
    }

    Ok(written)
}

/// Whether `path` points into the working copy's `.git` directory.
fn is_git_metadata(path: &Path) -> bool {
    path.components()
        .find(|c| !matches!(c, Component::CurDir))
        .and_then(|c| match c {
            Component::Normal(first) => first.to_str(),
            _ => None,
        })
        .is_some_and(|first| first.eq_ignore_ascii_case(".git"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{FakePackages, entry, make_zip};
    use tempfile::TempDir;

    #[test]
    fn test_extract_archive_writes_tree() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("foo.1.0.zip");
        fs::write(
            &archive,
            make_zip(&[("foo/foo.php", b"<?php"), ("foo/readme.txt", b"readme")]),
        )
        .unwrap();

        let count = extract_archive(&archive, tmp.path()).unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            fs::read_to_string(tmp.path().join("foo/readme.txt")).unwrap(),
            "readme"
        );
    }

    #[test]
    fn test_extract_skips_escaping_paths() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("work");
        fs::create_dir_all(&dest).unwrap();
        let archive = tmp.path().join("evil.zip");
        fs::write(
            &archive,
            make_zip(&[("../escape.txt", b"nope"), ("ok.txt", b"fine")]),
        )
        .unwrap();

        let count = extract_archive(&archive, &dest).unwrap();
        assert_eq!(count, 1);
        assert!(!tmp.path().join("escape.txt").exists());
        assert!(dest.join("ok.txt").exists());
    }

    #[test]
    fn test_extract_skips_git_metadata() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("work");
        fs::create_dir_all(dest.join(".git")).unwrap();
        fs::write(dest.join(".git/config"), "[core]\n").unwrap();
        let archive = tmp.path().join("evil.zip");
        fs::write(
            &archive,
            make_zip(&[
                (".git/config", b"[core]\n\tfsmonitor = touch /tmp/pwned\n"),
                ("./.GIT/hooks/post-checkout", b"#!/bin/sh"),
                ("foo/.gitignore", b"vendor/"),
            ]),
        )
        .unwrap();

        let count = extract_archive(&archive, &dest).unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            fs::read_to_string(dest.join(".git/config")).unwrap(),
            "[core]\n"
        );
        assert!(!dest.join(".GIT").exists());
        assert!(dest.join("foo/.gitignore").exists());
    }

    #[test]
    fn test_is_git_metadata() {
        assert!(is_git_metadata(Path::new(".git/config")));
        assert!(is_git_metadata(Path::new(".Git")));
        assert!(!is_git_metadata(Path::new("plugin/.git/config")));
        assert!(!is_git_metadata(Path::new(".github/workflows/scan.yml")));
    }

    #[tokio::test]
    async fn test_populate_removes_archive() {
        let tmp = TempDir::new().unwrap();
        let packages = FakePackages::new();
        let foo = entry("foo", "1.0", 5000);
        packages.serve(&foo.download_link, make_zip(&[("foo/foo.php", b"<?php")]));

        let outcome = populate(&packages, &foo, tmp.path()).await.unwrap();

        assert_eq!(outcome, PopulateOutcome::Extracted(1));
        assert!(tmp.path().join("foo/foo.php").exists());
        assert!(!tmp.path().join("foo.1.0.zip").exists());
    }

    #[tokio::test]
    async fn test_populate_with_separator_in_version() {
        let tmp = TempDir::new().unwrap();
        let packages = FakePackages::new();
        let foo = entry("foo", "2.0/rc1", 5000);
        packages.serve(&foo.download_link, make_zip(&[("foo/foo.php", b"<?php")]));

        let outcome = populate(&packages, &foo, tmp.path()).await.unwrap();

        assert_eq!(outcome, PopulateOutcome::Extracted(1));
        assert!(!tmp.path().join("foo.2.0_rc1.zip").exists());
    }

    #[tokio::test]
    async fn test_populate_swallows_bad_archive() {
        let tmp = TempDir::new().unwrap();
        let packages = FakePackages::new();
        let foo = entry("foo", "1.0", 5000);
        packages.serve(&foo.download_link, b"this is not a zip".to_vec());

        let outcome = populate(&packages, &foo, tmp.path()).await.unwrap();

        assert!(matches!(outcome, PopulateOutcome::ExtractionFailed(_)));
        assert!(!tmp.path().join("foo.1.0.zip").exists());
    }

    #[tokio::test]
    async fn test_populate_propagates_download_failure() {
        let tmp = TempDir::new().unwrap();
        let packages = FakePackages::new();
        let result = populate(&packages, &entry("missing", "1.0", 5000), tmp.path()).await;
        assert!(matches!(result, Err(AppError::RemoteFetch { status: 404, .. })));
    }
}
