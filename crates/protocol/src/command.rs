use crate::record::Metadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Top level request envelope, keyed by command family.
///
/// Serializes externally tagged, e.g.
/// `{"Container": {"Search": {"project": .., "root": .., "query": ..}}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Config(ConfigCommand),
    State(StateCommand),
    Project(ProjectCommand),
    Container(ContainerCommand),
    Asset(AssetCommand),
    Graph(GraphCommand),
    Runner(RunnerCommand),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigCommand {
    /// Identity probe. Bare reply: the engine's identity string.
    Id,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateCommand {
    /// Root paths of every known project. Enveloped `Vec<PathBuf>`.
    ProjectManifest,

    /// Local configuration, including the active user. Enveloped [`crate::LocalConfig`].
    LocalConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProjectCommand {
    /// Project state by root path. Bare `Option<ProjectState>`.
    Get(PathBuf),

    /// Project by id. Bare `Option<(PathBuf, ProjectResource)>`.
    GetById(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContainerCommand {
    /// Container state by graph path. Enveloped `Option<ContainerState>`.
    Get { project: String, container: String },

    /// Analysis view of a container by graph path.
    /// Enveloped `Option<Parsed<ContainerRecord>>`.
    GetForAnalysis { project: String, container: String },

    /// Analysis view of a container by id.
    /// Enveloped `Option<Parsed<ContainerRecord>>`.
    GetByIdForAnalysis { project: String, container: String },

    /// Containers under `root` matching `query`. Enveloped `Vec<ContainerRecord>`.
    Search {
        project: String,
        root: String,
        query: SearchQuery,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssetCommand {
    /// Assets under `root` matching `query`. Enveloped `Vec<AssetRecord>`.
    Search {
        project: String,
        root: String,
        query: SearchQuery,
    },

    /// Id of the container owning `asset`. Enveloped `Option<String>`.
    Parent { project: String, asset: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphCommand {
    /// Ids of the children of `container`. Enveloped `Vec<String>`.
    Children { project: String, container: String },

    /// Id of the parent of `container`. Enveloped `Option<String>`.
    Parent { project: String, container: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunnerCommand {
    Flag { resource: String, message: String },
}

/// Remote search filter. Omitted criteria are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Key/value pairs, sent as `[[key, value], ..]`.
    #[serde(default)]
    pub metadata: Vec<(String, Value)>,
}

impl SearchQuery {
    pub fn with_metadata(mut self, metadata: &Metadata) -> Self {
        self.metadata = metadata
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        self
    }
}

macro_rules! impl_from_family {
    ($($family:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$family> for Command {
                fn from(cmd: $family) -> Self {
                    Command::$variant(cmd)
                }
            }
        )*
    };
}

impl_from_family!(
    ConfigCommand => Config,
    StateCommand => State,
    ProjectCommand => Project,
    ContainerCommand => Container,
    AssetCommand => Asset,
    GraphCommand => Graph,
    RunnerCommand => Runner,
);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn unit_commands_encode_as_strings() {
        let value = serde_json::to_value(Command::from(ConfigCommand::Id)).unwrap();
        assert_eq!(value, json!({"Config": "Id"}));

        let value = serde_json::to_value(Command::from(StateCommand::ProjectManifest)).unwrap();
        assert_eq!(value, json!({"State": "ProjectManifest"}));
    }

    #[test]
    fn search_query_omits_unset_criteria() {
        let mut metadata = Metadata::new();
        metadata.insert("temp".to_string(), json!(20));
        let query = SearchQuery {
            kind: Some("trial".to_string()),
            ..Default::default()
        }
        .with_metadata(&metadata);

        let cmd = Command::from(ContainerCommand::Search {
            project: "p1".to_string(),
            root: "/expA".to_string(),
            query,
        });
        assert_eq!(
            serde_json::to_value(cmd).unwrap(),
            json!({
                "Container": {
                    "Search": {
                        "project": "p1",
                        "root": "/expA",
                        "query": {"kind": "trial", "tags": [], "metadata": [["temp", 20]]}
                    }
                }
            })
        );
    }
}
