use resgraph_filter::FilterError;
use resgraph_protocol::graph_path::GraphPathError;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum ConnectivityError {
    #[error("could not probe {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("could not connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: zmq::Error,
    },

    #[error("could not launch database engine `{path}`: {source}")]
    Launch {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("database engine did not become reachable at {0}")]
    StartupTimeout(String),

    #[error("request timed out")]
    Timeout,

    #[error("channel is out of sync after an earlier failure; reconnect before reuse")]
    Poisoned,

    #[error("database closed the connection")]
    Closed,

    #[error("message exceeds {0} bytes")]
    MessageTooLarge(usize),

    #[error("channel socket error: {0}")]
    Socket(#[source] zmq::Error),

    #[error("channel I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Connectivity error: {0}")]
    Connectivity(#[from] ConnectivityError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{operation} failed: {message}")]
    Runtime { operation: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn runtime(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Runtime {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Connectivity(ConnectivityError::Timeout))
    }
}

impl From<FilterError> for Error {
    fn from(err: FilterError) -> Self {
        Error::Validation(err.to_string())
    }
}

impl From<GraphPathError> for Error {
    fn from(err: GraphPathError) -> Self {
        Error::Configuration(err.to_string())
    }
}
