//! Session-scoped facade over the engine.

use crate::channel::{Channel, Connector};
use crate::config::{ClientConfig, EnvSignals, InitOptions};
use crate::context::{resolve_session, SessionContext};
use crate::discovery::connect_or_launch;
use crate::error::{Error, Result};
use crate::journal::{bucket_path, AssetJournal, AssetProperties, NewAsset};
use crate::resources::{Asset, Container, Resource};
use crate::search::ResourceFilter;
use resgraph_protocol::{
    remote_message, AssetCommand, AssetRecord, Command, ContainerCommand, ContainerRecord,
    LocalConfig, Parsed, RunnerCommand, StateCommand,
};
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

/// Session state shared by a [`Database`] and every resource it hands out.
pub(crate) struct Shared {
    pub(crate) session: SessionContext,
    channel: RefCell<Channel>,
}

impl Shared {
    pub(crate) fn request<T: DeserializeOwned>(
        &self,
        operation: &str,
        command: impl Into<Command>,
    ) -> Result<T> {
        self.channel.borrow_mut().request(operation, command)
    }

    fn fetch_record(&self, rid: &str, operation: &str) -> Result<ContainerRecord> {
        let reply: Option<Parsed<ContainerRecord>> = self.request(
            operation,
            ContainerCommand::GetByIdForAnalysis {
                project: self.session.project.clone(),
                container: rid.to_string(),
            },
        )?;
        match reply {
            Some(Ok(record)) => Ok(record),
            Some(Err(err)) => Err(Error::runtime(
                operation,
                format!("container {rid} has invalid properties: {err}"),
            )),
            None => Err(Error::runtime(operation, format!("container {rid} was not returned"))),
        }
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Fetches a container by id and attaches it to the session.
pub(crate) fn fetch_container(shared: &Rc<Shared>, rid: &str, operation: &str) -> Result<Container> {
    let record = shared.fetch_record(rid, operation)?;
    Container::from_record(record, Some(Rc::clone(shared)))
}

/// A client bound to one project and root container.
///
/// Not `Send`: use [`Database::try_clone`] or [`Database::detach`] to work
/// from another thread with an independent channel.
#[derive(Debug)]
pub struct Database {
    shared: Rc<Shared>,
}

impl Database {
    /// Discovers or launches the engine and resolves the session from the
    /// process environment.
    pub fn new(options: InitOptions) -> Result<Self> {
        Self::with_config(&ClientConfig::from_env(), &EnvSignals::from_env(), &options)
    }

    pub fn with_config(config: &ClientConfig, signals: &EnvSignals, options: &InitOptions) -> Result<Self> {
        let channel = connect_or_launch(config)?;
        Self::from_channel(channel, signals, options)
    }

    /// Resolves a session over an already connected channel.
    pub fn from_channel(mut channel: Channel, signals: &EnvSignals, options: &InitOptions) -> Result<Self> {
        let session = resolve_session(&mut channel, signals, options)?;
        Ok(Self::attach(session, channel))
    }

    fn attach(session: SessionContext, channel: Channel) -> Self {
        Self {
            shared: Rc::new(Shared {
                session,
                channel: RefCell::new(channel),
            }),
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.shared.session
    }

    /// Root container of the session, always fetched fresh.
    pub fn root(&self) -> Result<Container> {
        fetch_container(&self.shared, &self.shared.session.root_id, "root container")
    }

    pub fn find_containers(&self, filter: &ResourceFilter) -> Result<Vec<Container>> {
        let session = &self.shared.session;
        let records: Vec<ContainerRecord> = self.shared.request(
            "container search",
            ContainerCommand::Search {
                project: session.project.clone(),
                root: session.root_graph_path.clone(),
                query: filter.to_query(),
            },
        )?;
        records
            .into_iter()
            .map(|record| Container::from_record(record, Some(Rc::clone(&self.shared))))
            .collect()
    }

    /// First match in engine order. Only meaningful when at most one match is expected.
    pub fn find_container(&self, filter: &ResourceFilter) -> Result<Option<Container>> {
        Ok(self.find_containers(filter)?.into_iter().next())
    }

    pub fn find_assets(&self, filter: &ResourceFilter) -> Result<Vec<Asset>> {
        let session = &self.shared.session;
        let records: Vec<AssetRecord> = self.shared.request(
            "asset search",
            AssetCommand::Search {
                project: session.project.clone(),
                root: session.root_graph_path.clone(),
                query: filter.to_query(),
            },
        )?;
        records
            .into_iter()
            .map(|record| Asset::from_record(record, Some(Rc::clone(&self.shared)), None))
            .collect()
    }

    pub fn find_asset(&self, filter: &ResourceFilter) -> Result<Option<Asset>> {
        Ok(self.find_assets(filter)?.into_iter().next())
    }

    /// Id of the active user, from the engine's local configuration.
    pub fn active_user(&self) -> Result<Option<String>> {
        let config: LocalConfig = self.shared.request("active user", StateCommand::LocalConfig)?;
        Ok(config.user)
    }

    /// Journals a new asset under the root container and returns the path
    /// its file should be written to. Intermediate directories are created.
    pub fn add_asset(&self, path: impl AsRef<Path>, asset: NewAsset) -> Result<PathBuf> {
        let relative = bucket_path(path.as_ref())?;
        let user = self
            .active_user()?
            .ok_or_else(|| Error::runtime("add asset", "no active user is configured"))?;

        let root_path = &self.shared.session.root_path;
        let properties = AssetProperties::new(&user, asset);
        AssetJournal::for_container(root_path)
            .upsert(&relative.to_string_lossy(), properties)?;

        let destination = root_path.join(&relative);
        if let Some(bucket) = destination.parent() {
            std::fs::create_dir_all(bucket)?;
        }
        Ok(destination)
    }

    pub fn flag(&self, resource: &impl Resource, message: &str) -> Result<()> {
        self.flag_id(resource.rid(), message)
    }

    pub fn flag_id(&self, rid: &str, message: &str) -> Result<()> {
        let reply = self.shared.channel.borrow_mut().send(RunnerCommand::Flag {
            resource: rid.to_string(),
            message: message.to_string(),
        })?;
        if let Some(err) = reply.get("Err") {
            return Err(Error::runtime("flag", remote_message(err.clone())));
        }
        Ok(())
    }

    /// Replaces a channel broken by a timeout with a fresh connection.
    pub fn reconnect(&self) -> Result<()> {
        self.shared.channel.borrow_mut().reconnect()
    }

    /// Same session identity over an independent channel.
    pub fn try_clone(&self) -> Result<Self> {
        self.detach().connect()
    }

    /// Sendable handle for opening a client on another thread.
    pub fn detach(&self) -> SessionHandle {
        SessionHandle {
            session: self.shared.session.clone(),
            connector: self.shared.channel.borrow().connector(),
        }
    }
}

/// Session identity and endpoint, detached from any channel.
#[derive(Clone)]
pub struct SessionHandle {
    session: SessionContext,
    connector: Arc<dyn Connector>,
}

impl SessionHandle {
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Opens an independent channel and binds it to this session.
    pub fn connect(&self) -> Result<Database> {
        let channel = Channel::open(Arc::clone(&self.connector))?;
        Ok(Database::attach(self.session.clone(), channel))
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session", &self.session)
            .field("endpoint", &self.connector.endpoint())
            .finish()
    }
}
