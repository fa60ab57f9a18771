use resgraph_protocol::{CONTAINER_ID_KEY, DATABASE_PORT, PROJECT_ID_KEY};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Send and receive timeout applied to every request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Base name of the bundled engine binaries, before the target suffix.
pub const ENGINE_BASE_NAME: &str = "resgraph-local-database";

const DEFAULT_STARTUP_WAIT_MS: u64 = 50;
const DEFAULT_STARTUP_RETRIES: usize = 60; // ~3s

/// Connection and launch settings for the database engine.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Loopback address the engine listens on
    pub host: IpAddr,

    /// Engine port
    pub port: u16,

    /// Send and receive timeout per request
    pub request_timeout: Duration,

    /// Connect attempts after launching an engine
    pub startup_retries: usize,

    /// Pause between connect attempts after a launch
    pub startup_wait: Duration,

    /// Directory holding the bundled engine binaries (defaults to `bin/` next to the current executable)
    pub bin_dir: Option<PathBuf>,

    /// Engine binary base name
    pub engine_base_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DATABASE_PORT,
            request_timeout: REQUEST_TIMEOUT,
            startup_retries: DEFAULT_STARTUP_RETRIES,
            startup_wait: Duration::from_millis(DEFAULT_STARTUP_WAIT_MS),
            bin_dir: None,
            engine_base_name: ENGINE_BASE_NAME.to_string(),
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `RESGRAPH_DB_PORT`, `RESGRAPH_DB_TIMEOUT_MS` and `RESGRAPH_BIN_DIR`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(port) = env_value("RESGRAPH_DB_PORT").and_then(|v| v.parse::<u16>().ok()) {
            config.port = port;
        }
        if let Some(timeout) = duration_from_env_ms("RESGRAPH_DB_TIMEOUT_MS") {
            config.request_timeout = timeout;
        }
        if let Some(dir) = env_value("RESGRAPH_BIN_DIR") {
            config.bin_dir = Some(PathBuf::from(dir));
        }
        config
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn engine_bin_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.bin_dir {
            return Some(dir.clone());
        }
        let exe = std::env::current_exe().ok()?;
        Some(exe.parent()?.join("bin"))
    }
}

/// Per-session inputs supplied by the caller.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Root container path for interactive sessions. Ignored in managed runs.
    pub dev_root: Option<PathBuf>,

    /// Change the working directory to the project's analysis root.
    pub chdir: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            dev_root: None,
            chdir: true,
        }
    }
}

impl InitOptions {
    pub fn interactive(dev_root: impl Into<PathBuf>) -> Self {
        Self {
            dev_root: Some(dev_root.into()),
            ..Self::default()
        }
    }

    pub fn without_chdir(mut self) -> Self {
        self.chdir = false;
        self
    }
}

/// Environment signals selecting the session mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSignals {
    pub project: Option<String>,
    pub root: Option<String>,
}

impl EnvSignals {
    pub fn from_env() -> Self {
        Self {
            project: env_value(PROJECT_ID_KEY),
            root: env_value(CONTAINER_ID_KEY),
        }
    }

    pub fn managed(project: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            project: Some(project.into()),
            root: Some(root.into()),
        }
    }
}

fn env_value(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn duration_from_env_ms(var: &str) -> Option<Duration> {
    env_value(var)
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}
