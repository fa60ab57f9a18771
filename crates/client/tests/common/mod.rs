#![allow(dead_code)]

use resgraph_client::channel::{Connector, Transport};
use resgraph_client::{Channel, ConnectivityError, Database, EnvSignals, InitOptions};
use resgraph_protocol::{
    AssetCommand, Command, ConfigCommand, ContainerCommand, GraphCommand, ProjectCommand,
    RunnerCommand, SearchQuery, StateCommand, DATABASE_ID,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const PROJECT_ID: &str = "p1";

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub graph_path: String,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub record: Value,
}

/// In-memory engine answering the wire protocol.
#[derive(Debug)]
pub struct FakeEngine {
    pub identity: String,
    pub project_path: PathBuf,
    pub project_properties: Value,
    pub user: Option<String>,
    pub containers: BTreeMap<String, FakeContainer>,
    pub requests: Vec<Value>,
    pub flags: Vec<(String, String)>,
    pub connections: usize,
}

impl FakeEngine {
    pub fn handle(&mut self, request: &Value) -> Value {
        self.requests.push(request.clone());
        let command: Command = match serde_json::from_value(request.clone()) {
            Ok(command) => command,
            Err(err) => return json!({"Err": err.to_string()}),
        };

        match command {
            Command::Config(ConfigCommand::Id) => json!(self.identity),
            Command::State(StateCommand::ProjectManifest) => json!({"Ok": [self.project_path]}),
            Command::State(StateCommand::LocalConfig) => json!({"Ok": {"user": self.user}}),
            Command::Project(ProjectCommand::Get(path)) => {
                if path == self.project_path {
                    json!({
                        "path": self.project_path,
                        "fs_resource": {"Present": {"properties": {"Ok": self.project_properties}}}
                    })
                } else {
                    Value::Null
                }
            }
            Command::Project(ProjectCommand::GetById(id)) => {
                if id == PROJECT_ID {
                    json!([self.project_path, {"properties": {"Ok": self.project_properties}}])
                } else {
                    Value::Null
                }
            }
            Command::Container(ContainerCommand::Get { container, .. }) => {
                match self.by_graph_path(&container) {
                    Some(c) => json!({"Ok": {"properties": {"Ok": {"rid": c.record["rid"]}}}}),
                    None => json!({"Ok": null}),
                }
            }
            Command::Container(ContainerCommand::GetForAnalysis { container, .. }) => {
                match self.by_graph_path(&container) {
                    Some(c) => json!({"Ok": {"Ok": c.record}}),
                    None => json!({"Ok": null}),
                }
            }
            Command::Container(ContainerCommand::GetByIdForAnalysis { container, .. }) => {
                match self.containers.get(&container) {
                    Some(c) => json!({"Ok": {"Ok": c.record}}),
                    None => json!({"Ok": null}),
                }
            }
            Command::Container(ContainerCommand::Search { root, query, .. }) => {
                let Some(scope) = self.descendants(&root) else {
                    return json!({"Err": format!("root `{root}` does not exist")});
                };
                let found: Vec<&Value> = scope
                    .into_iter()
                    .map(|c| &c.record)
                    .filter(|record| query_matches(&query, record))
                    .collect();
                json!({"Ok": found})
            }
            Command::Asset(AssetCommand::Search { root, query, .. }) => {
                let Some(scope) = self.descendants(&root) else {
                    return json!({"Err": format!("root `{root}` does not exist")});
                };
                let found: Vec<&Value> = scope
                    .into_iter()
                    .flat_map(|c| c.record["assets"].as_array().into_iter().flatten())
                    .filter(|record| query_matches(&query, record))
                    .collect();
                json!({"Ok": found})
            }
            Command::Asset(AssetCommand::Parent { asset, .. }) => {
                let owner = self.containers.iter().find(|(_, c)| {
                    c.record["assets"]
                        .as_array()
                        .is_some_and(|assets| assets.iter().any(|a| a["rid"] == json!(asset)))
                });
                json!({"Ok": owner.map(|(rid, _)| rid)})
            }
            Command::Graph(GraphCommand::Children { container, .. }) => match self.containers.get(&container) {
                Some(c) => json!({"Ok": c.children}),
                None => json!({"Err": format!("unknown container {container}")}),
            },
            Command::Graph(GraphCommand::Parent { container, .. }) => match self.containers.get(&container) {
                Some(c) => json!({"Ok": c.parent}),
                None => json!({"Err": format!("unknown container {container}")}),
            },
            Command::Runner(RunnerCommand::Flag { resource, message }) => {
                self.flags.push((resource, message));
                json!({"Ok": null})
            }
        }
    }

    fn by_graph_path(&self, graph_path: &str) -> Option<&FakeContainer> {
        self.containers.values().find(|c| c.graph_path == graph_path)
    }

    /// The container at `root` and everything below it; `None` for an unknown path.
    fn descendants(&self, root: &str) -> Option<Vec<&FakeContainer>> {
        self.by_graph_path(root)?;
        let prefix = format!("{}/", root.trim_end_matches('/'));
        Some(
            self.containers
                .values()
                .filter(|c| c.graph_path == root || c.graph_path.starts_with(&prefix))
                .collect(),
        )
    }

    pub fn count(&self, family: &str, command: &str) -> usize {
        self.requests
            .iter()
            .filter(|r| r.get(family).and_then(|inner| inner.get(command)).is_some())
            .count()
    }

    pub fn add_asset(&mut self, container: &str, asset: Value) {
        if let Some(c) = self.containers.get_mut(container) {
            if let Some(assets) = c.record["assets"].as_array_mut() {
                assets.push(asset);
            }
        }
    }
}

fn query_matches(query: &SearchQuery, record: &Value) -> bool {
    let properties = &record["properties"];
    let tags: Vec<&str> = properties["tags"]
        .as_array()
        .map(|tags| tags.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    query.name.as_deref().map_or(true, |name| properties["name"] == json!(name))
        && query.kind.as_deref().map_or(true, |kind| properties["kind"] == json!(kind))
        && query.tags.iter().all(|tag| tags.contains(&tag.as_str()))
        && query
            .metadata
            .iter()
            .all(|(key, value)| properties["metadata"].get(key) == Some(value))
}

struct FakeTransport {
    engine: Arc<Mutex<FakeEngine>>,
}

impl Transport for FakeTransport {
    fn round_trip(&mut self, request: &Value) -> Result<Value, ConnectivityError> {
        Ok(self.engine.lock().unwrap().handle(request))
    }
}

pub struct FakeConnector {
    pub engine: Arc<Mutex<FakeEngine>>,
}

impl Connector for FakeConnector {
    fn connect(&self) -> Result<Box<dyn Transport>, ConnectivityError> {
        self.engine.lock().unwrap().connections += 1;
        Ok(Box::new(FakeTransport {
            engine: Arc::clone(&self.engine),
        }))
    }

    fn endpoint(&self) -> String {
        "fake engine".to_string()
    }
}

/// Project tree on disk plus a matching in-memory engine:
///
/// ```text
/// proj/                 project root (id p1)
///   analysis/           analysis root
///   data/               data root, graph path `/`      c0
///     expA/             `/expA`                          c1  kind experiment
///       trial1/         `/expA/trial1`                   c2  kind trial, asset a1
///       trial2/         `/expA/trial2`                   c3  kind trial
/// ```
pub struct Fixture {
    pub dir: TempDir,
    pub engine: Arc<Mutex<FakeEngine>>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("proj");
        let data = project_path.join("data");
        for sub in ["expA/trial1", "expA/trial2"] {
            std::fs::create_dir_all(data.join(sub)).unwrap();
        }
        std::fs::create_dir_all(project_path.join("analysis")).unwrap();

        let raw_csv = data.join("expA/trial1/raw.csv");
        let mut containers = BTreeMap::new();
        let mut add = |rid: &str, graph_path: &str, parent: Option<&str>, children: &[&str], properties: Value, assets: Value| {
            containers.insert(
                rid.to_string(),
                FakeContainer {
                    graph_path: graph_path.to_string(),
                    parent: parent.map(str::to_string),
                    children: children.iter().map(|c| c.to_string()).collect(),
                    record: json!({"rid": rid, "properties": properties, "assets": assets}),
                },
            );
        };
        add("c0", "/", None, &["c1"], json!({"name": "data"}), json!([]));
        add(
            "c1",
            "/expA",
            Some("c0"),
            &["c2", "c3"],
            json!({"name": "expA", "kind": "experiment", "tags": ["2026"], "metadata": {"operator": "kim"}}),
            json!([]),
        );
        add(
            "c2",
            "/expA/trial1",
            Some("c1"),
            &[],
            json!({"name": "trial1", "kind": "trial", "tags": ["raw"], "metadata": {"temp": 20}}),
            json!([{"rid": "a1", "properties": {"name": "raw", "kind": "csv", "tags": ["raw"]}, "path": raw_csv}]),
        );
        add(
            "c3",
            "/expA/trial2",
            Some("c1"),
            &[],
            json!({"name": "trial2", "kind": "trial", "metadata": {"temp": 25}}),
            json!([]),
        );

        let engine = FakeEngine {
            identity: DATABASE_ID.to_string(),
            project_path,
            project_properties: json!({"rid": PROJECT_ID, "data_root": "data", "analysis_root": "analysis"}),
            user: Some("u1".to_string()),
            containers,
            requests: Vec::new(),
            flags: Vec::new(),
            connections: 0,
        };
        Self {
            dir,
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn project_path(&self) -> PathBuf {
        self.dir.path().join("proj")
    }

    pub fn data_path(&self, relative: &str) -> PathBuf {
        self.project_path().join("data").join(relative)
    }

    pub fn channel(&self) -> Channel {
        Channel::open(Arc::new(FakeConnector {
            engine: Arc::clone(&self.engine),
        }))
        .unwrap()
    }

    pub fn interactive(&self, root: &Path) -> Database {
        Database::from_channel(
            self.channel(),
            &EnvSignals::default(),
            &InitOptions::interactive(root).without_chdir(),
        )
        .unwrap()
    }

    pub fn managed(&self, token: &str) -> Database {
        Database::from_channel(
            self.channel(),
            &EnvSignals::managed(PROJECT_ID, token),
            &InitOptions::default().without_chdir(),
        )
        .unwrap()
    }

    pub fn engine(&self) -> std::sync::MutexGuard<'_, FakeEngine> {
        self.engine.lock().unwrap()
    }
}
