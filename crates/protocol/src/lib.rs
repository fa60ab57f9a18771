//! # Resource Graph Protocol
//!
//! Message schema spoken between analysis clients and the machine-wide
//! resource graph database engine.
//!
//! Every round trip is one JSON request followed by one JSON reply. Requests
//! are tagged unions keyed by command family (see [`Command`]); replies are
//! either a bare payload or an `{"Ok": ..}` / `{"Err": ..}` envelope which the
//! caller must unwrap explicitly (see [`decode_enveloped`]).
//!
//! The engine owns this schema. The client encodes and decodes it but never
//! extends it.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod command;
pub mod graph_path;
pub mod record;

pub use command::{
    AssetCommand, Command, ConfigCommand, ContainerCommand, GraphCommand, ProjectCommand,
    RunnerCommand, SearchQuery, StateCommand,
};
pub use record::{
    AssetRecord, ContainerRecord, ContainerState, ContainerStateProperties, FsResource,
    LocalConfig, Metadata, Parsed, ProjectProperties, ProjectResource, ProjectState,
    ResourceProperties,
};

/// Well-known request/reply port of the engine.
pub const DATABASE_PORT: u16 = 7047;

/// Literal identity the engine answers to [`ConfigCommand::Id`].
pub const DATABASE_ID: &str = "resgraph local database";

/// Environment variable carrying the active project id in managed runs.
pub const PROJECT_ID_KEY: &str = "RESGRAPH_PROJECT_ID";

/// Environment variable carrying the root container graph path in managed runs.
pub const CONTAINER_ID_KEY: &str = "RESGRAPH_CONTAINER";

/// Hidden application directory inside every container folder.
pub const APP_DIR: &str = ".resgraph";

/// Asset journal file name inside [`APP_DIR`].
pub const ASSETS_FILE: &str = "assets.json";

/// `<container>/<APP_DIR>/<ASSETS_FILE>`
pub fn assets_file_of(container_path: &Path) -> PathBuf {
    container_path.join(APP_DIR).join(ASSETS_FILE)
}

const REPLY_SUMMARY_CHARS: usize = 200;

#[derive(Error, Debug)]
pub enum ReplyError {
    #[error("remote error: {0}")]
    Remote(String),

    #[error("reply is missing the Ok/Err envelope: {0}")]
    MissingEnvelope(String),

    #[error("reply does not match the expected shape: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Unwraps an `{"Ok": payload}` / `{"Err": error}` reply.
pub fn decode_enveloped<T: DeserializeOwned>(reply: Value) -> Result<T, ReplyError> {
    let summary = summarize(&reply);
    let Value::Object(mut map) = reply else {
        return Err(ReplyError::MissingEnvelope(summary));
    };
    if map.len() == 1 {
        if let Some(payload) = map.remove("Ok") {
            return Ok(serde_json::from_value(payload)?);
        }
        if let Some(err) = map.remove("Err") {
            return Err(ReplyError::Remote(remote_message(err)));
        }
    }
    Err(ReplyError::MissingEnvelope(summary))
}

/// Decodes a reply that carries its payload without an envelope.
pub fn decode_bare<T: DeserializeOwned>(reply: Value) -> Result<T, ReplyError> {
    serde_json::from_value(reply).map_err(Into::into)
}

/// Extracts a human readable message from a remote `Err` payload.
pub fn remote_message(err: Value) -> String {
    match err {
        Value::String(message) => message,
        other => other.to_string(),
    }
}

fn summarize(reply: &Value) -> String {
    let raw = reply.to_string();
    if raw.chars().count() <= REPLY_SUMMARY_CHARS {
        return raw;
    }
    let mut out: String = raw.chars().take(REPLY_SUMMARY_CHARS).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_envelope_yields_payload() {
        let paths: Vec<String> = decode_enveloped(json!({"Ok": ["/a", "/b"]})).unwrap();
        assert_eq!(paths, vec!["/a".to_string(), "/b".to_string()]);
    }

    #[test]
    fn err_envelope_carries_remote_message() {
        let err = decode_enveloped::<Value>(json!({"Err": "project not loaded"})).unwrap_err();
        assert!(matches!(err, ReplyError::Remote(msg) if msg == "project not loaded"));

        let err = decode_enveloped::<Value>(json!({"Err": {"code": 3}})).unwrap_err();
        assert!(matches!(err, ReplyError::Remote(msg) if msg.contains("\"code\"")));
    }

    #[test]
    fn bare_or_null_reply_is_not_an_envelope() {
        assert!(matches!(
            decode_enveloped::<Value>(Value::Null),
            Err(ReplyError::MissingEnvelope(_))
        ));
        assert!(matches!(
            decode_enveloped::<Value>(json!({"Ok": 1, "extra": 2})),
            Err(ReplyError::MissingEnvelope(_))
        ));
    }

    #[test]
    fn assets_file_lives_in_app_dir() {
        let path = assets_file_of(Path::new("/data/expA"));
        assert_eq!(path, Path::new("/data/expA").join(APP_DIR).join(ASSETS_FILE));
    }
}
