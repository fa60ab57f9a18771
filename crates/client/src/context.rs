//! Context Resolver: maps the ambient environment onto a project and a root
//! container for the lifetime of one session.

use crate::channel::Channel;
use crate::config::{EnvSignals, InitOptions};
use crate::error::{Error, Result};
use resgraph_protocol::graph_path::{
    ensure_root_path, graph_path_from_relative, normalize_path, relative_from_graph_path,
};
use resgraph_protocol::{
    ContainerCommand, ContainerState, FsResource, ProjectCommand, ProjectProperties,
    ProjectResource, ProjectState, StateCommand,
};
use std::path::{Path, PathBuf};

/// How the session was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// A person exploring data. The graph may change underneath the session.
    Interactive,

    /// An automated run. The graph is frozen for the run's duration.
    Managed,
}

impl SessionMode {
    pub fn graph_is_frozen(self) -> bool {
        matches!(self, SessionMode::Managed)
    }
}

/// Identity established once at startup and shared by clones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub mode: SessionMode,
    pub project: String,
    pub root_id: String,
    /// Graph path of the root container.
    pub root_graph_path: String,
    /// Filesystem path of the root container.
    pub root_path: PathBuf,
    pub changed_dir: bool,
}

/// Picks the session mode from `signals` and resolves the session identity.
pub fn resolve_session(
    channel: &mut Channel,
    signals: &EnvSignals,
    options: &InitOptions,
) -> Result<SessionContext> {
    let context = match (&signals.project, &signals.root) {
        (None, None) => {
            let dev_root = options.dev_root.as_deref().ok_or_else(|| {
                Error::Configuration("interactive sessions require a root path".to_string())
            })?;
            resolve_interactive(channel, dev_root, options.chdir)?
        }
        (Some(project), Some(root)) => resolve_managed(channel, project, root, options.chdir)?,
        _ => {
            return Err(Error::Configuration(format!(
                "{} and {} must be set together",
                resgraph_protocol::PROJECT_ID_KEY,
                resgraph_protocol::CONTAINER_ID_KEY
            )))
        }
    };

    log::info!(
        "session established ({:?}): project {} root {} at {}",
        context.mode,
        context.project,
        context.root_graph_path,
        context.root_path.display()
    );
    Ok(context)
}

fn resolve_interactive(channel: &mut Channel, dev_root: &Path, chdir: bool) -> Result<SessionContext> {
    if !dev_root.is_absolute() {
        return Err(Error::Validation(format!(
            "root path `{}` must be absolute",
            dev_root.display()
        )));
    }
    let root_path = platform_normalize(dev_root);
    if !root_path.exists() {
        return Err(Error::NotFound(format!("root path `{}`", root_path.display())));
    }

    let manifest: Vec<PathBuf> = channel.request("project manifest", StateCommand::ProjectManifest)?;
    let project_path = manifest
        .into_iter()
        .map(|path| platform_normalize(&path))
        .find(|path| root_path.starts_with(path))
        .ok_or_else(|| {
            Error::NotFound(format!("no project contains `{}`", root_path.display()))
        })?;

    let state: Option<ProjectState> =
        channel.request_bare("project lookup", ProjectCommand::Get(project_path.clone()))?;
    let state = state.ok_or_else(|| {
        Error::NotFound(format!("project at `{}`", project_path.display()))
    })?;
    let FsResource::Present(resource) = state.fs_resource else {
        return Err(Error::NotFound(format!(
            "project folder `{}` is missing",
            project_path.display()
        )));
    };
    let properties = valid_project_properties(resource, "project lookup")?;

    let data_root = normalize_path(&project_path.join(&properties.data_root));
    let relative = root_path.strip_prefix(&data_root).map_err(|_| {
        Error::Validation(format!(
            "root path `{}` is outside the project data root `{}`",
            root_path.display(),
            data_root.display()
        ))
    })?;
    let root_graph_path = graph_path_from_relative(relative);
    let root_id = container_id(channel, &properties.rid, &root_graph_path)?;

    let changed_dir = change_to_analysis_root(&project_path, &properties, chdir)?;
    Ok(SessionContext {
        mode: SessionMode::Interactive,
        project: properties.rid,
        root_id,
        root_graph_path,
        root_path,
        changed_dir,
    })
}

fn resolve_managed(
    channel: &mut Channel,
    project: &str,
    root_token: &str,
    chdir: bool,
) -> Result<SessionContext> {
    let found: Option<(PathBuf, ProjectResource)> =
        channel.request_bare("project lookup", ProjectCommand::GetById(project.to_string()))?;
    let (project_path, resource) =
        found.ok_or_else(|| Error::NotFound(format!("project `{project}`")))?;
    let properties = valid_project_properties(resource, "project lookup")?;

    let relative = relative_from_graph_path(root_token)?;
    let root_token = ensure_root_path(root_token);
    let root_path = normalize_path(&project_path.join(&properties.data_root).join(relative));
    let root_id = container_id(channel, &properties.rid, &root_token)?;

    let changed_dir = change_to_analysis_root(&project_path, &properties, chdir)?;
    Ok(SessionContext {
        mode: SessionMode::Managed,
        project: properties.rid,
        root_id,
        root_graph_path: root_token,
        root_path,
        changed_dir,
    })
}

fn valid_project_properties(resource: ProjectResource, operation: &str) -> Result<ProjectProperties> {
    resource
        .properties
        .map_err(|err| Error::runtime(operation, format!("invalid project properties: {err}")))
}

fn container_id(channel: &mut Channel, project: &str, graph_path: &str) -> Result<String> {
    let state: Option<ContainerState> = channel.request(
        "root container lookup",
        ContainerCommand::Get {
            project: project.to_string(),
            container: graph_path.to_string(),
        },
    )?;
    let state = state.ok_or_else(|| Error::NotFound(format!("container `{graph_path}`")))?;
    let properties = state.properties.map_err(|err| {
        Error::runtime(
            "root container lookup",
            format!("invalid container properties: {err}"),
        )
    })?;
    Ok(properties.rid)
}

fn change_to_analysis_root(
    project_path: &Path,
    properties: &ProjectProperties,
    chdir: bool,
) -> Result<bool> {
    if !chdir {
        return Ok(false);
    }
    let analysis_root = properties.analysis_root.as_ref().ok_or_else(|| {
        Error::Configuration(format!(
            "project `{}` has no analysis root to change into",
            properties.rid
        ))
    })?;
    let target = project_path.join(analysis_root);
    std::env::set_current_dir(&target)?;
    log::debug!("working directory changed to {}", target.display());
    Ok(true)
}

#[cfg(windows)]
fn platform_normalize(path: &Path) -> PathBuf {
    use resgraph_protocol::graph_path::windows_ensure_unc_path;
    let normalized = normalize_path(path);
    PathBuf::from(windows_ensure_unc_path(&normalized.to_string_lossy()))
}

#[cfg(not(windows))]
fn platform_normalize(path: &Path) -> PathBuf {
    normalize_path(path)
}
