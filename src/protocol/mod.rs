//! Host <-> worker wire messages (NDJSON), plus the outbound channel.

use std::pin::Pin;

use async_stream::stream;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{Result, WorkerError};

/// Messages the host posts to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundMessage {
    /// The host mounted the initial render.
    Rendered,
    Patch { patch: Value },
    /// `location` is normally a JSON-encoded mapping; a plain object is accepted too.
    Location { location: Value },
}

/// Messages the worker posts to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    Status {
        msg: String,
    },
    Patch {
        patch: Value,
        buffers: Value,
    },
    Render {
        docs_json: Value,
        render_items: Value,
        root_ids: Value,
    },
    Idle,
}

/// Sending half of the outbound channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, msg: OutboundMessage) {
        if self.tx.send(msg).is_err() {
            tracing::debug!("outbound channel closed, dropping message");
        }
    }

    pub fn status(&self, text: impl Into<String>) {
        let msg = text.into();
        tracing::info!(status = %msg, "status");
        self.send(OutboundMessage::Status { msg });
    }

    pub fn idle(&self) {
        self.send(OutboundMessage::Idle);
    }
}

/// Decode one inbound line. Blank lines yield `None`.
pub fn decode_line(line: &str) -> Result<Option<InboundMessage>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}

pub fn encode(msg: &OutboundMessage) -> Result<String> {
    Ok(serde_json::to_string(msg)?)
}

/// Turn the payload of a `location` message into a mapping.
pub fn parse_location(raw: &Value) -> Result<Map<String, Value>> {
    let parsed;
    let value = match raw {
        Value::String(text) => {
            parsed = serde_json::from_str::<Value>(text)?;
            &parsed
        }
        other => other,
    };
    match value {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        _ => Err(WorkerError::Decode(serde::de::Error::custom(
            "location payload is not a mapping",
        ))),
    }
}

/// Stream of inbound messages read line by line. Undecodable lines are
/// logged and skipped; the stream ends at EOF or on a read error.
pub fn inbound_stream<R>(reader: R) -> Pin<Box<dyn Stream<Item = InboundMessage> + Send>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    Box::pin(stream! {
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match decode_line(&line) {
                    Ok(Some(msg)) => yield msg,
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, line = %line, "skipping inbound line"),
                },
                Ok(None) => {
                    tracing::debug!("inbound stream reached EOF");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed reading inbound stream");
                    break;
                }
            }
        }
    })
}

/// Drain the outbound channel into `writer`, one JSON document per line.
pub async fn write_outbound<W>(
    mut rx: mpsc::UnboundedReceiver<OutboundMessage>,
    mut writer: W,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = rx.recv().await {
        let line = match encode(&msg) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode outbound message");
                continue;
            }
        };
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}
