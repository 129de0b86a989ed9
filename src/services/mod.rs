//! Service layer for the mirror application.
//!
//! This module contains the boundaries to the outside world:
//! - Catalog fetching with backoff (`CatalogFetcher`)
//! - Repository provisioning (`RepoHost`)
//! - Version control (`VersionControl`)
//! - Package download/extraction (`PackageSource`)
//! - CI workflow rendering (`WorkflowTemplate`)

pub mod catalog;
pub mod git;
pub mod hosting;
pub mod package;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{
    Backoff, CatalogFetch, CatalogFetcher, CatalogSource, PageResponse, WordPressCatalog,
};
pub use git::{CommitIdentity, CommitOutcome, GitCli, RemoteSpec, VersionControl};
pub use hosting::{GhCli, Provisioned, RepoHost};
pub use package::{HttpPackageSource, PackageSource, PopulateOutcome};
pub use workflow::{CronSchedule, WorkflowTemplate};
