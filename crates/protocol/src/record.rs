//! Records as the engine stores and returns them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

pub type Metadata = serde_json::Map<String, Value>;

/// Outcome of the engine parsing an on-disk properties file:
/// `{"Ok": properties}` or `{"Err": reason}`.
pub type Parsed<T> = Result<T, Value>;

/// Descriptive properties shared by containers and assets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceProperties {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub rid: String,
    pub properties: ResourceProperties,

    #[serde(default)]
    pub assets: Vec<AssetRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub rid: String,
    pub properties: ResourceProperties,

    /// Absolute file path as recorded by the engine.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectProperties {
    pub rid: String,

    /// Data root, relative to the project root.
    pub data_root: PathBuf,

    /// Analysis root, relative to the project root.
    #[serde(default)]
    pub analysis_root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectResource {
    pub properties: Parsed<ProjectProperties>,
}

/// Whether a resource folder is present on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FsResource<T> {
    Present(T),
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub path: PathBuf,
    pub fs_resource: FsResource<ProjectResource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStateProperties {
    pub rid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerState {
    pub properties: Parsed<ContainerStateProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default)]
    pub user: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn project_state_decodes_present_and_absent() {
        let present: ProjectState = serde_json::from_value(json!({
            "path": "/home/u/proj",
            "fs_resource": {"Present": {"properties": {"Ok": {
                "rid": "p1", "data_root": "data", "analysis_root": null
            }}}}
        }))
        .unwrap();
        let FsResource::Present(resource) = present.fs_resource else {
            panic!("expected present project");
        };
        let properties = resource.properties.unwrap();
        assert_eq!(properties.data_root, PathBuf::from("data"));
        assert!(properties.analysis_root.is_none());

        let absent: ProjectState = serde_json::from_value(json!({
            "path": "/home/u/proj",
            "fs_resource": "Absent"
        }))
        .unwrap();
        assert_eq!(absent.fs_resource, FsResource::Absent);
    }

    #[test]
    fn container_record_defaults_missing_collections() {
        let record: ContainerRecord = serde_json::from_value(json!({
            "rid": "c1",
            "properties": {"name": "expA"}
        }))
        .unwrap();
        assert_eq!(record.properties.name.as_deref(), Some("expA"));
        assert!(record.properties.tags.is_empty());
        assert!(record.assets.is_empty());
    }
}
