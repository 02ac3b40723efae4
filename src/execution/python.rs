//! NDJSON protocol spoken with the Python bootstrap.
//!
//! Requests carry an `id` and an `op`; every request gets exactly one reply
//! with the same `id`. Patch events may arrive at any time in between.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EnvError;

#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub id: u64,
    #[serde(flatten)]
    pub op: Op<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op<'a> {
    Ping,
    Install { spec: &'a str },
    Run { code: &'a str },
    Link { setter: &'a str },
    ApplyPatch { patch: &'a Value, setter: &'a str },
    LocationParams,
    UpdateLocation { changes: &'a Map<String, Value> },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Incoming {
    Event(Event),
    Reply(Reply),
}

#[derive(Debug, Deserialize)]
pub struct Event {
    pub event: String,
    #[serde(default)]
    pub patch: Value,
    #[serde(default)]
    pub buffers: Value,
    #[serde(default)]
    pub setter: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Reply {
    pub id: u64,
    pub ok: bool,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl Reply {
    pub fn into_result(self) -> Result<Value, EnvError> {
        if self.ok {
            Ok(self.value)
        } else {
            Err(EnvError::Raised(self.error.unwrap_or_default()))
        }
    }
}

pub fn encode(req: &Request<'_>) -> Result<String, EnvError> {
    serde_json::to_string(req).map_err(|e| EnvError::Protocol(e.to_string()))
}

pub fn decode_line(line: &str) -> Result<Incoming, EnvError> {
    serde_json::from_str(line).map_err(|e| EnvError::Protocol(format!("{}: {}", e, line)))
}
