// src/models/entry.rs

//! Catalog entry data structures.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;

/// Which part of the catalog an entry belongs to.
///
/// Slugs are only unique within a kind, so `(kind, slug)` is the natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryKind {
    #[serde(rename = "plugins")]
    Plugin,
    #[serde(rename = "themes")]
    Theme,
}

impl EntryKind {
    /// All kinds, in processing order.
    pub const ALL: [EntryKind; 2] = [EntryKind::Plugin, EntryKind::Theme];

    /// Plural name used in snapshot keys and repository names.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Plugin => "plugins",
            EntryKind::Theme => "themes",
        }
    }

    /// Name of the destination repository for a slug of this kind.
    pub fn repo_name(&self, slug: &str) -> String {
        format!("{}-{}", self.as_str(), slug)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plugin" | "plugins" => Ok(EntryKind::Plugin),
            "theme" | "themes" => Ok(EntryKind::Theme),
            other => Err(AppError::validation(format!("unknown entry kind '{other}'"))),
        }
    }
}

/// One plugin or theme as reported by the remote catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Unique identifier within its kind
    pub slug: String,

    /// Opaque version string, compared for equality only
    #[serde(deserialize_with = "string_or_number")]
    pub version: String,

    /// Popularity metric used for scoping
    #[serde(default)]
    pub active_installs: u64,

    /// Where the package archive can be downloaded
    #[serde(default)]
    pub download_link: String,
}

impl CatalogEntry {
    /// File name used for the downloaded archive inside a working copy.
    ///
    /// Path separators in the remote-supplied parts are replaced so the
    /// name always stays a single file component.
    pub fn archive_name(&self) -> String {
        format!(
            "{}.{}.zip",
            file_component(&self.slug),
            file_component(&self.version)
        )
    }
}

fn file_component(raw: &str) -> String {
    raw.replace(['/', '\\'], "_")
}

/// The catalog occasionally reports versions as bare numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}
