//! Instance Discovery: find the machine-wide engine or start one.
//!
//! A probe bind on the well-known port tells whether something already
//! listens there. Two clients starting together may both see the port free
//! and both launch an engine. The engine's own listen-bind then lets exactly
//! one instance win; the loser exits when its bind fails, and both clients
//! end up connected to the winner.

use crate::channel::{Channel, TcpConnector};
use crate::config::ClientConfig;
use crate::error::{ConnectivityError, Error, Result};
use resgraph_protocol::{ConfigCommand, DATABASE_ID};
use serde_json::Value;
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

#[cfg(unix)]
const ADDR_IN_USE: Option<i32> = Some(libc::EADDRINUSE);

#[cfg(windows)]
const ADDR_IN_USE: Option<i32> = Some(10048); // WSAEADDRINUSE

#[cfg(not(any(unix, windows)))]
const ADDR_IN_USE: Option<i32> = None;

/// Connects to a running engine, launching one first if the port is free.
pub fn connect_or_launch(config: &ClientConfig) -> Result<Channel> {
    let addr = config.socket_addr();
    let connector = Arc::new(TcpConnector::new(config));

    let mut channel = if engine_is_listening(addr)? {
        log::debug!("database already listening on {addr}");
        Channel::open(connector)?
    } else {
        let engine = engine_path(config)?;
        launch_detached(&engine)?;
        wait_for_engine(connector, config)?
    };

    probe_identity(&mut channel)?;
    Ok(channel)
}

/// Whether something holds `addr`, judged by a throwaway bind.
pub fn engine_is_listening(addr: SocketAddr) -> Result<bool> {
    match TcpListener::bind(addr) {
        Ok(probe) => {
            drop(probe);
            Ok(false)
        }
        Err(err) if is_addr_in_use(&err) => Ok(true),
        Err(source) => Err(ConnectivityError::Bind {
            addr: addr.to_string(),
            source,
        }
        .into()),
    }
}

/// Requires the peer to answer the identity probe with the engine's literal id.
pub fn probe_identity(channel: &mut Channel) -> Result<()> {
    let reply: Value = channel.request_bare("identity probe", ConfigCommand::Id)?;
    match reply.as_str() {
        Some(id) if id == DATABASE_ID => Ok(()),
        _ => Err(Error::Protocol(format!(
            "port {} is held by a foreign service (identity reply: {reply})",
            channel.connector().endpoint()
        ))),
    }
}

fn is_addr_in_use(err: &io::Error) -> bool {
    match (ADDR_IN_USE, err.raw_os_error()) {
        (Some(expected), Some(code)) => code == expected,
        _ => err.kind() == io::ErrorKind::AddrInUse,
    }
}

/// Target triple suffix of the bundled engine build for this platform.
pub fn target_suffix() -> Option<&'static str> {
    if cfg!(all(target_os = "linux", target_arch = "x86_64")) {
        Some("x86_64-unknown-linux-gnu")
    } else if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        Some("aarch64-apple-darwin")
    } else if cfg!(all(target_os = "macos", target_arch = "x86_64")) {
        Some("x86_64-apple-darwin")
    } else if cfg!(all(target_os = "windows", target_arch = "x86_64")) {
        Some("x86_64-pc-windows-msvc")
    } else {
        None
    }
}

/// `<base>-<target><exe suffix>`, e.g. `resgraph-local-database-x86_64-pc-windows-msvc.exe`.
pub fn engine_executable_name(base: &str) -> Result<String> {
    let suffix = target_suffix().ok_or_else(|| {
        Error::Configuration(format!(
            "no database engine build for {}/{}",
            std::env::consts::OS,
            std::env::consts::ARCH
        ))
    })?;
    Ok(format!("{base}-{suffix}{}", std::env::consts::EXE_SUFFIX))
}

fn engine_path(config: &ClientConfig) -> Result<PathBuf> {
    let dir = config
        .engine_bin_dir()
        .ok_or_else(|| Error::Configuration("cannot locate bundled binaries directory".to_string()))?;
    let path = dir.join(engine_executable_name(&config.engine_base_name)?);
    if !path.is_file() {
        return Err(Error::NotFound(format!(
            "database engine `{}`",
            path.display()
        )));
    }
    Ok(path)
}

fn launch_detached(engine: &Path) -> Result<()> {
    log::info!("launching database engine {}", engine.display());

    let mut cmd = Command::new(engine);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    // Own session, so the caller's process-group cleanup leaves the engine alive.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }

    let mut child = cmd.spawn().map_err(|source| ConnectivityError::Launch {
        path: engine.display().to_string(),
        source,
    })?;

    // Reap the engine if it exits while this process is alive (e.g. it lost the bind race).
    std::thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(())
}

fn wait_for_engine(connector: Arc<TcpConnector>, config: &ClientConfig) -> Result<Channel> {
    // Socket connects are lazy, so readiness is judged by the engine holding its port.
    let addr = config.socket_addr();
    for attempt in 0..config.startup_retries.max(1) {
        if engine_is_listening(addr)? {
            log::debug!("database listening after {} attempt(s)", attempt + 1);
            return Channel::open(connector);
        }
        log::trace!("database not listening on {addr} yet");
        std::thread::sleep(config.startup_wait);
    }
    Err(ConnectivityError::StartupTimeout(addr.to_string()).into())
}
