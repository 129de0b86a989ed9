//! In-memory stand-ins for the network and git boundaries, used by tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::{CatalogEntry, EntryKind};
use crate::services::catalog::{CatalogSource, PageResponse};
use crate::services::git::{CommitOutcome, VersionControl};
use crate::services::hosting::{Provisioned, RepoHost};
use crate::services::package::PackageSource;

pub fn entry(slug: &str, version: &str, installs: u64) -> CatalogEntry {
    CatalogEntry {
        slug: slug.to_string(),
        version: version.to_string(),
        active_installs: installs,
        download_link: format!("https://downloads.example.org/{slug}.{version}.zip"),
    }
}

pub fn make_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (path, content) in files {
            zip.start_file(*path, options).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

/// Relative paths of every file below `dir`.
pub fn list_files(dir: &Path) -> Vec<String> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) {
        let Ok(read) = std::fs::read_dir(dir) else {
            return;
        };
        for item in read.flatten() {
            let path = item.path();
            if path.is_dir() {
                walk(root, &path, out);
            } else if let Ok(rel) = path.strip_prefix(root) {
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    let mut out = Vec::new();
    walk(dir, dir, &mut out);
    out.sort();
    out
}

// --- Catalog ---

#[derive(Default)]
pub struct FakeCatalog {
    responses: Mutex<HashMap<EntryKind, VecDeque<PageResponse>>>,
    requests: Mutex<Vec<(EntryKind, u32, Instant)>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, kind: EntryKind, response: PageResponse) {
        self.responses
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(response);
    }

    pub fn push_page(&self, kind: EntryKind, entries: Vec<CatalogEntry>, total_pages: u32) {
        self.push(
            kind,
            PageResponse::Page {
                entries,
                total_pages,
            },
        );
    }

    pub fn requested_pages(&self, kind: EntryKind) -> Vec<u32> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _, _)| *k == kind)
            .map(|(_, page, _)| *page)
            .collect()
    }

    pub fn request_times(&self) -> Vec<Instant> {
        self.requests.lock().unwrap().iter().map(|r| r.2).collect()
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn fetch_page(&self, kind: EntryKind, page: u32) -> Result<PageResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((kind, page, Instant::now()));
        let next = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&kind)
            .and_then(VecDeque::pop_front);
        Ok(next.unwrap_or(PageResponse::Page {
            entries: Vec::new(),
            total_pages: 0,
        }))
    }
}

// --- Packages ---

#[derive(Default)]
pub struct FakePackages {
    archives: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakePackages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, bytes: Vec<u8>) {
        self.archives
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes);
    }

    /// Serve a small valid archive for the entry.
    pub fn serve_entry(&self, entry: &CatalogEntry) {
        let path = format!("{}/{}.php", entry.slug, entry.slug);
        let body = format!("<?php // {} {}", entry.slug, entry.version);
        self.serve(
            &entry.download_link,
            make_zip(&[(path.as_str(), body.as_bytes())]),
        );
    }
}

#[async_trait]
impl PackageSource for FakePackages {
    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.archives
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or(AppError::RemoteFetch {
                status: 404,
                body: "not found".into(),
            })
    }
}

// --- Hosting ---

#[derive(Default)]
pub struct FakeHost {
    existing: Mutex<HashSet<String>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.existing.lock().unwrap().contains(name)
    }
}

#[async_trait]
impl RepoHost for FakeHost {
    async fn ensure_repo(&self, name: &str) -> Result<Provisioned> {
        self.calls.lock().unwrap().push(name.to_string());
        if self.failing.lock().unwrap().contains(name) {
            return Err(AppError::command("gh", "HTTP 502"));
        }
        if self.existing.lock().unwrap().insert(name.to_string()) {
            Ok(Provisioned::Created)
        } else {
            Ok(Provisioned::AlreadyExists)
        }
    }
}

// --- Git ---

/// A recorded commit: the directory, message, and files present at the time.
#[derive(Debug, Clone)]
pub struct RecordedCommit {
    pub dir: PathBuf,
    pub message: String,
    pub files: Vec<String>,
}

#[derive(Default)]
pub struct FakeGit {
    clones: Mutex<Vec<(String, PathBuf)>>,
    commits: Mutex<Vec<RecordedCommit>>,
    pushes: Mutex<Vec<(PathBuf, Option<String>)>>,
    fail_clone: Mutex<HashSet<String>>,
    fail_push: Mutex<bool>,
    nothing_to_commit: Mutex<bool>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_clone_of(&self, repo: &str) {
        self.fail_clone.lock().unwrap().insert(repo.to_string());
    }

    pub fn fail_pushes(&self) {
        *self.fail_push.lock().unwrap() = true;
    }

    pub fn report_nothing_to_commit(&self) {
        *self.nothing_to_commit.lock().unwrap() = true;
    }

    pub fn clones(&self) -> Vec<(String, PathBuf)> {
        self.clones.lock().unwrap().clone()
    }

    pub fn commits(&self) -> Vec<RecordedCommit> {
        self.commits.lock().unwrap().clone()
    }

    pub fn pushes(&self) -> Vec<(PathBuf, Option<String>)> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl VersionControl for FakeGit {
    async fn clone_repo(&self, repo: &str, dest: &Path) -> Result<()> {
        self.clones
            .lock()
            .unwrap()
            .push((repo.to_string(), dest.to_path_buf()));
        if self.fail_clone.lock().unwrap().contains(repo) {
            return Err(AppError::command("git", "repository not found"));
        }
        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join("README.md"), format!("# {repo}\n"))?;
        Ok(())
    }

    async fn commit(&self, dir: &Path, _paths: &[&str], message: &str) -> Result<CommitOutcome> {
        self.commits.lock().unwrap().push(RecordedCommit {
            dir: dir.to_path_buf(),
            message: message.to_string(),
            files: list_files(dir),
        });
        if *self.nothing_to_commit.lock().unwrap() {
            Ok(CommitOutcome::NothingToCommit)
        } else {
            Ok(CommitOutcome::Committed)
        }
    }

    async fn push(&self, dir: &Path, branch: Option<&str>) -> Result<()> {
        self.pushes
            .lock()
            .unwrap()
            .push((dir.to_path_buf(), branch.map(str::to_string)));
        if *self.fail_push.lock().unwrap() {
            return Err(AppError::command("git", "push rejected"));
        }
        Ok(())
    }
}
