//! Resource Graph Model: containers and assets with lazily resolved,
//! mode-aware relationships.

use crate::cache::Cached;
use crate::context::SessionMode;
use crate::database::{fetch_container, Shared};
use crate::error::{Error, Result};
use resgraph_filter::Filterable;
use resgraph_protocol::{
    AssetCommand, AssetRecord, ContainerRecord, GraphCommand, Metadata, ResourceProperties,
};
use serde_json::Value;
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Anything in the graph addressable by id.
pub trait Resource {
    fn rid(&self) -> &str;
}

#[derive(Clone)]
pub struct Container {
    rid: String,
    properties: ResourceProperties,
    db: Option<Rc<Shared>>,
    parent: RefCell<Cached<Option<Rc<Container>>>>,
    assets: RefCell<Cached<Vec<Asset>>>,
}

impl Container {
    pub(crate) fn from_record(record: ContainerRecord, db: Option<Rc<Shared>>) -> Result<Self> {
        let container = Container {
            rid: record.rid,
            properties: record.properties,
            db,
            parent: RefCell::default(),
            assets: RefCell::default(),
        };

        let owner = Rc::new(container.shallow());
        let assets = record
            .assets
            .into_iter()
            .map(|asset| Asset::from_record(asset, container.db.clone(), Some(Rc::clone(&owner))))
            .collect::<Result<Vec<_>>>()?;
        *container.assets.borrow_mut() = Cached::store(assets, container.mode());
        Ok(container)
    }

    /// A container with no live session. Relationship accessors only see
    /// what the record carried.
    pub fn detached(record: ContainerRecord) -> Result<Self> {
        Self::from_record(record, None)
    }

    fn shallow(&self) -> Container {
        Container {
            rid: self.rid.clone(),
            properties: self.properties.clone(),
            db: self.db.clone(),
            parent: RefCell::default(),
            assets: RefCell::default(),
        }
    }

    fn mode(&self) -> SessionMode {
        self.db
            .as_ref()
            .map_or(SessionMode::Managed, |db| db.session.mode)
    }

    pub fn id(&self) -> &str {
        &self.rid
    }

    pub fn name(&self) -> Option<&str> {
        self.properties.name.as_deref()
    }

    pub fn kind(&self) -> Option<&str> {
        self.properties.kind.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.properties.description.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.properties.tags
    }

    pub fn metadata(&self) -> &Metadata {
        &self.properties.metadata
    }

    pub fn properties(&self) -> &ResourceProperties {
        &self.properties
    }

    /// Assets owned directly by this container.
    ///
    /// Interactive sessions refetch the container on every call so edits made
    /// elsewhere are visible; managed sessions keep the first result.
    pub fn assets(&self) -> Result<Vec<Asset>> {
        if let Some(assets) = self.assets.borrow().trusted() {
            return Ok(assets.clone());
        }
        let Some(db) = &self.db else {
            return Ok(self.assets.borrow().value().cloned().unwrap_or_default());
        };

        log::debug!("refreshing assets of container {}", self.rid);
        let fresh = fetch_container(db, &self.rid, "container assets")?;
        let assets = fresh.assets.borrow().value().cloned().unwrap_or_default();
        *self.assets.borrow_mut() = Cached::store(assets.clone(), self.mode());
        Ok(assets)
    }

    /// Child containers. Each child's parent is pre-set to `self`.
    pub fn children(&self) -> Result<Vec<Container>> {
        let db = self.session_db("container children")?;
        let ids: Vec<String> = db.request(
            "container children",
            GraphCommand::Children {
                project: db.session.project.clone(),
                container: self.rid.clone(),
            },
        )?;

        let me = Rc::new(self.clone());
        ids.iter()
            .map(|id| -> Result<Container> {
                let child = fetch_container(db, id, "container children")?;
                child.set_parent(Some(Rc::clone(&me)));
                Ok(child)
            })
            .collect()
    }

    /// Parent container. `None` for the session root.
    pub fn parent(&self) -> Result<Option<Container>> {
        if let Some(parent) = self.parent.borrow().trusted() {
            return Ok(parent.as_deref().cloned());
        }
        let Some(db) = &self.db else {
            let cached = self.parent.borrow();
            return Ok(cached.value().and_then(|p| p.as_deref().cloned()));
        };
        if self.rid == db.session.root_id {
            *self.parent.borrow_mut() = Cached::Trusted(None);
            return Ok(None);
        }

        let parent_id: Option<String> = db.request(
            "container parent",
            GraphCommand::Parent {
                project: db.session.project.clone(),
                container: self.rid.clone(),
            },
        )?;
        let parent = match parent_id {
            Some(id) => Some(fetch_container(db, &id, "container parent")?),
            None => None,
        };
        self.set_parent(parent.clone().map(Rc::new));
        Ok(parent)
    }

    fn set_parent(&self, parent: Option<Rc<Container>>) {
        *self.parent.borrow_mut() = Cached::store(parent, self.mode());
    }

    fn session_db(&self, operation: &str) -> Result<&Rc<Shared>> {
        self.db
            .as_ref()
            .ok_or_else(|| Error::runtime(operation, "container is not attached to a database"))
    }
}

impl Resource for Container {
    fn rid(&self) -> &str {
        &self.rid
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("rid", &self.rid)
            .field("properties", &self.properties)
            .field("attached", &self.db.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct Asset {
    rid: String,
    path: PathBuf,
    properties: ResourceProperties,
    db: Option<Rc<Shared>>,
    parent: Option<Rc<Container>>,
}

impl Asset {
    pub(crate) fn from_record(
        record: AssetRecord,
        db: Option<Rc<Shared>>,
        parent: Option<Rc<Container>>,
    ) -> Result<Self> {
        let path = PathBuf::from(&record.path);
        if !path.is_absolute() {
            return Err(Error::Validation(format!(
                "asset {} has a relative file path `{}`",
                record.rid, record.path
            )));
        }
        Ok(Asset {
            rid: record.rid,
            path,
            properties: record.properties,
            db,
            parent,
        })
    }

    pub fn detached(record: AssetRecord) -> Result<Self> {
        Self::from_record(record, None, None)
    }

    pub fn id(&self) -> &str {
        &self.rid
    }

    /// Absolute path of the file this asset describes.
    pub fn file(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> Option<&str> {
        self.properties.name.as_deref()
    }

    pub fn kind(&self) -> Option<&str> {
        self.properties.kind.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.properties.description.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.properties.tags
    }

    pub fn metadata(&self) -> &Metadata {
        &self.properties.metadata
    }

    pub fn properties(&self) -> &ResourceProperties {
        &self.properties
    }

    /// Owning container. Uses the container this asset was fetched with, and
    /// otherwise looks it up remotely every time.
    pub fn parent(&self) -> Result<Container> {
        if let Some(parent) = &self.parent {
            return Ok(Container::clone(parent));
        }
        let db = self
            .db
            .as_ref()
            .ok_or_else(|| Error::runtime("asset parent", "asset is not attached to a database"))?;

        let parent_id: Option<String> = db.request(
            "asset parent",
            AssetCommand::Parent {
                project: db.session.project.clone(),
                asset: self.rid.clone(),
            },
        )?;
        let parent_id = parent_id
            .ok_or_else(|| Error::runtime("asset parent", format!("asset {} has no parent", self.rid)))?;
        fetch_container(db, &parent_id, "asset parent")
    }
}

impl Resource for Asset {
    fn rid(&self) -> &str {
        &self.rid
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asset")
            .field("rid", &self.rid)
            .field("path", &self.path)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

fn common_property<'a>(rid: &str, properties: &'a ResourceProperties, name: &str) -> Option<Cow<'a, Value>> {
    let value = match name {
        "rid" | "id" | "_id" => Value::from(rid),
        "name" => Value::from(properties.name.clone()?),
        "type" | "kind" => Value::from(properties.kind.clone()?),
        "description" => Value::from(properties.description.clone()?),
        "tags" => Value::from(properties.tags.clone()),
        "metadata" => Value::Object(properties.metadata.clone()),
        _ => return None,
    };
    Some(Cow::Owned(value))
}

impl Filterable for Container {
    fn property(&self, name: &str) -> Option<Cow<'_, Value>> {
        common_property(&self.rid, &self.properties, name)
    }
}

impl Filterable for Asset {
    fn property(&self, name: &str) -> Option<Cow<'_, Value>> {
        match name {
            "file" | "path" => Some(Cow::Owned(Value::from(self.path.to_string_lossy().into_owned()))),
            _ => common_property(&self.rid, &self.properties, name),
        }
    }
}
