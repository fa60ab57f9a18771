//! Asset Journal Writer: the per-container `assets.json` record of assets
//! added from analysis code.
//!
//! The file is read, modified and rewritten without any lock. Two writers
//! racing on the same container can lose an update (last writer wins).

use crate::error::{Error, Result};
use chrono::Utc;
use resgraph_protocol::graph_path::normalize_path;
use resgraph_protocol::{assets_file_of, Metadata};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// `YYYY-MM-DDTHH:MM:SSZ`, always UTC.
pub const CREATED_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRef {
    Id(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Creator {
    User(UserRef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetProperties {
    pub created: String,
    pub creator: Creator,
    pub name: Option<String>,
    pub kind: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl AssetProperties {
    pub fn new(user: &str, asset: NewAsset) -> Self {
        Self {
            created: Utc::now().format(CREATED_FORMAT).to_string(),
            creator: Creator::User(UserRef::Id(user.to_string())),
            name: asset.name,
            kind: asset.kind,
            description: asset.description,
            tags: asset.tags,
            metadata: asset.metadata,
        }
    }

    /// Equal apart from the creation timestamp.
    pub fn same_content(&self, other: &AssetProperties) -> bool {
        self.creator == other.creator
            && self.name == other.name
            && self.kind == other.kind
            && self.description == other.description
            && self.tags == other.tags
            && self.metadata == other.metadata
    }
}

/// Caller supplied description of an asset being added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewAsset {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub metadata: Metadata,
}

impl NewAsset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub rid: String,
    pub properties: AssetProperties,
    /// Location relative to the container folder.
    pub path: String,
}

/// What an upsert did to the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalUpdate {
    Appended,
    Updated,
    Unchanged,
}

pub struct AssetJournal {
    path: PathBuf,
}

impl AssetJournal {
    pub fn for_container(container_path: &Path) -> Self {
        Self {
            path: assets_file_of(container_path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> Result<Vec<JournalRecord>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => parse_records(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Records `properties` for `path`, rewriting the file only when something changed.
    pub fn upsert(&self, path: &str, properties: AssetProperties) -> Result<JournalUpdate> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        let mut raw = String::new();
        file.read_to_string(&mut raw)?;
        let mut records = parse_records(&raw)?;

        let update = match records.iter().position(|record| record.path == path) {
            Some(i) if records[i].properties.same_content(&properties) => JournalUpdate::Unchanged,
            Some(i) => {
                records[i].properties = properties;
                JournalUpdate::Updated
            }
            None => {
                records.push(JournalRecord {
                    rid: Uuid::new_v4().to_string(),
                    properties,
                    path: path.to_string(),
                });
                JournalUpdate::Appended
            }
        };

        if update != JournalUpdate::Unchanged {
            let mut out = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
            records.serialize(&mut ser)?;

            file.seek(SeekFrom::Start(0))?;
            file.write_all(&out)?;
            file.set_len(out.len() as u64)?;
            file.flush()?;
        }
        log::debug!("asset journal {}: {path} {update:?}", self.path.display());
        Ok(update)
    }
}

fn parse_records(raw: &str) -> Result<Vec<JournalRecord>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(raw)?)
}

/// Normalizes a bucket-relative asset path. Absolute paths and paths
/// climbing out of the container folder are rejected.
pub fn bucket_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() || path.has_root() {
        return Err(Error::Validation(format!(
            "asset path `{}` must be relative to the root container",
            path.display()
        )));
    }
    let normalized = normalize_path(path);
    if normalized.as_os_str().is_empty()
        || matches!(normalized.components().next(), Some(Component::ParentDir))
    {
        return Err(Error::Validation(format!(
            "asset path `{}` leaves the root container",
            path.display()
        )));
    }
    Ok(normalized)
}
