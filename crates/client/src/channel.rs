//! Wire Channel: one synchronous request/reply connection to the engine.
//!
//! Requests and replies strictly alternate. A failed round trip (timeout,
//! closed socket, oversized reply) leaves the `REQ` socket waiting for a
//! reply that may never come, so the channel is poisoned and refuses further
//! requests until [`Channel::reconnect`] opens a fresh socket.

use crate::config::ClientConfig;
use crate::error::{ConnectivityError, Error, Result};
use resgraph_protocol::{decode_bare, decode_enveloped, Command, ReplyError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// One blocking request/reply exchange.
pub trait Transport {
    fn round_trip(&mut self, request: &Value) -> std::result::Result<Value, ConnectivityError>;
}

/// Opens fresh transports to the same endpoint.
pub trait Connector: Send + Sync {
    fn connect(&self) -> std::result::Result<Box<dyn Transport>, ConnectivityError>;

    fn endpoint(&self) -> String;
}

/// ZeroMQ `REQ` socket over loopback TCP. Each message is one JSON document.
pub struct TcpTransport {
    socket: zmq::Socket,
}

impl TcpTransport {
    pub fn connect(
        context: &zmq::Context,
        addr: SocketAddr,
        timeout: Duration,
    ) -> std::result::Result<Self, ConnectivityError> {
        let endpoint = format!("tcp://{addr}");
        let connect_err = |source: zmq::Error| ConnectivityError::Connect {
            endpoint: endpoint.clone(),
            source,
        };
        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);

        let socket = context.socket(zmq::REQ).map_err(connect_err)?;
        socket.set_sndtimeo(millis).map_err(connect_err)?;
        socket.set_rcvtimeo(millis).map_err(connect_err)?;
        // Dropping a poisoned socket must not wait on its unsent request.
        socket.set_linger(0).map_err(connect_err)?;
        socket.connect(&endpoint).map_err(connect_err)?;
        Ok(Self { socket })
    }
}

impl Transport for TcpTransport {
    fn round_trip(&mut self, request: &Value) -> std::result::Result<Value, ConnectivityError> {
        self.socket
            .send(request.to_string().as_bytes(), 0)
            .map_err(map_zmq)?;

        let reply = self.socket.recv_bytes(0).map_err(map_zmq)?;
        if reply.len() > MAX_MESSAGE_BYTES {
            return Err(ConnectivityError::MessageTooLarge(MAX_MESSAGE_BYTES));
        }
        serde_json::from_slice(&reply)
            .map_err(|err| ConnectivityError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))
    }
}

pub struct TcpConnector {
    context: zmq::Context,
    addr: SocketAddr,
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            context: zmq::Context::new(),
            addr: config.socket_addr(),
            timeout: config.request_timeout,
        }
    }
}

impl Connector for TcpConnector {
    fn connect(&self) -> std::result::Result<Box<dyn Transport>, ConnectivityError> {
        Ok(Box::new(TcpTransport::connect(
            &self.context,
            self.addr,
            self.timeout,
        )?))
    }

    fn endpoint(&self) -> String {
        self.addr.to_string()
    }
}

pub struct Channel {
    connector: Arc<dyn Connector>,
    transport: Box<dyn Transport>,
    poisoned: bool,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

impl Channel {
    pub fn open(connector: Arc<dyn Connector>) -> Result<Self> {
        let transport = connector.connect()?;
        Ok(Self {
            connector,
            transport,
            poisoned: false,
        })
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::clone(&self.connector)
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Replaces the transport with a fresh connection.
    pub fn reconnect(&mut self) -> Result<()> {
        self.transport = self.connector.connect()?;
        self.poisoned = false;
        log::debug!("reconnected to database at {}", self.connector.endpoint());
        Ok(())
    }

    /// Sends `command` and returns the undecoded reply.
    pub fn send(&mut self, command: impl Into<Command>) -> Result<Value> {
        if self.poisoned {
            return Err(ConnectivityError::Poisoned.into());
        }
        let request = serde_json::to_value(command.into())?;
        log::debug!("-> {request}");
        match self.transport.round_trip(&request) {
            Ok(reply) => {
                log::debug!("<- {reply}");
                Ok(reply)
            }
            Err(err) => {
                self.poisoned = true;
                log::warn!("database channel poisoned: {err}");
                Err(err.into())
            }
        }
    }

    /// Sends `command` and unwraps an `Ok`/`Err` reply envelope.
    pub fn request<T: DeserializeOwned>(
        &mut self,
        operation: &str,
        command: impl Into<Command>,
    ) -> Result<T> {
        let reply = self.send(command)?;
        decode_enveloped(reply).map_err(|err| reply_error(operation, err))
    }

    /// Sends `command` whose reply carries no envelope.
    pub fn request_bare<T: DeserializeOwned>(
        &mut self,
        operation: &str,
        command: impl Into<Command>,
    ) -> Result<T> {
        let reply = self.send(command)?;
        decode_bare(reply).map_err(|err| reply_error(operation, err))
    }
}

fn reply_error(operation: &str, err: ReplyError) -> Error {
    match err {
        ReplyError::Remote(message) => Error::runtime(operation, message),
        other => Error::Protocol(format!("{operation}: {other}")),
    }
}

fn map_zmq(err: zmq::Error) -> ConnectivityError {
    match err {
        zmq::Error::EAGAIN => ConnectivityError::Timeout,
        zmq::Error::ETERM => ConnectivityError::Closed,
        other => ConnectivityError::Socket(other),
    }
}
