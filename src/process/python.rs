//! Python interpreter process bootstrap and I/O glue.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, watch};

use super::{Environment, ProcessHandle};
use crate::bridge::{DocumentEvent, PatchSink};
use crate::error::EnvError;
use crate::execution::python::{decode_line, encode, Incoming, Op, Reply, Request};
use crate::execution::RenderOutput;
use crate::provision::DependencySpec;

/// Request loop run inside the interpreter.
pub const BOOTSTRAP: &str = include_str!("bootstrap.py");

pub async fn start_python(python: &str, bootstrap: &str) -> Result<ProcessHandle, EnvError> {
    let mut cmd = Command::new(python);
    cmd.arg("-u") // unbuffered
        .arg("-c")
        .arg(bootstrap)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::inherit())
        .kill_on_drop(true);

    let mut child: Child = cmd.spawn().map_err(EnvError::Spawn)?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| EnvError::Protocol("no stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| EnvError::Protocol("no stdout".into()))?;

    Ok(ProcessHandle {
        child,
        stdin,
        stdout,
    })
}

struct Running {
    _child: Child,
    stdin: ChildStdin,
    replies: mpsc::UnboundedReceiver<Reply>,
}

/// [`Environment`] backed by a CPython child process.
pub struct PythonEnvironment {
    python: String,
    process: Option<Running>,
    sink: watch::Sender<Option<PatchSink>>,
    next_id: u64,
}

impl PythonEnvironment {
    pub fn new(python: impl Into<String>) -> Self {
        let (sink, _) = watch::channel(None);
        Self {
            python: python.into(),
            process: None,
            sink,
            next_id: 0,
        }
    }

    async fn request(&mut self, op: Op<'_>) -> Result<Value, EnvError> {
        let process = self.process.as_mut().ok_or(EnvError::NotLoaded)?;

        self.next_id += 1;
        let id = self.next_id;
        let line = encode(&Request { id, op })?;
        process.stdin.write_all(line.as_bytes()).await?;
        process.stdin.write_all(b"\n").await?;
        process.stdin.flush().await?;

        let reply = process.replies.recv().await.ok_or(EnvError::Closed)?;
        if reply.id != id {
            return Err(EnvError::Protocol(format!(
                "expected reply {}, got {}",
                id, reply.id
            )));
        }
        reply.into_result()
    }
}

/// Split interpreter output into replies and document events.
async fn read_interpreter(
    stdout: ChildStdout,
    replies: mpsc::UnboundedSender<Reply>,
    sink: watch::Receiver<Option<PatchSink>>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "failed reading interpreter output");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match decode_line(&line) {
            Ok(Incoming::Reply(reply)) => {
                if replies.send(reply).is_err() {
                    break;
                }
            }
            Ok(Incoming::Event(ev)) if ev.event == "patch" => {
                let current = sink.borrow().clone();
                match current {
                    Some(sink) => {
                        sink.emit(DocumentEvent {
                            patch: ev.patch,
                            buffers: ev.buffers,
                            setter: ev.setter,
                        });
                    }
                    None => tracing::warn!("document change before a sink was installed"),
                }
            }
            Ok(Incoming::Event(ev)) => tracing::debug!(event = %ev.event, "ignoring interpreter event"),
            Err(e) => tracing::warn!(error = %e, "undecodable interpreter line"),
        }
    }
    tracing::info!("interpreter output closed");
}

#[async_trait]
impl Environment for PythonEnvironment {
    fn name(&self) -> &str {
        "python"
    }

    async fn load(&mut self) -> Result<(), EnvError> {
        let ProcessHandle { child, stdin, stdout } = start_python(&self.python, BOOTSTRAP).await?;
        let (tx, replies) = mpsc::unbounded_channel();
        tokio::spawn(read_interpreter(stdout, tx, self.sink.subscribe()));
        self.process = Some(Running {
            _child: child,
            stdin,
            replies,
        });

        let version = self.request(Op::Ping).await?;
        tracing::info!(python = %self.python, version = %version, "interpreter loaded");
        Ok(())
    }

    async fn install(&mut self, spec: &DependencySpec) -> Result<(), EnvError> {
        self.request(Op::Install { spec: spec.as_str() }).await.map(|_| ())
    }

    async fn run(&mut self, program: &str, sink: PatchSink) -> Result<RenderOutput, EnvError> {
        self.sink.send_replace(Some(sink));
        let value = self.request(Op::Run { code: program }).await?;
        RenderOutput::from_value(value)
    }

    async fn link(&mut self, sink: PatchSink, setter: &str) -> Result<(), EnvError> {
        self.sink.send_replace(Some(sink));
        self.request(Op::Link { setter }).await.map(|_| ())
    }

    async fn apply_patch(&mut self, patch: &Value, setter: &str) -> Result<(), EnvError> {
        self.request(Op::ApplyPatch { patch, setter }).await.map(|_| ())
    }

    async fn location_params(&mut self) -> Result<Option<Vec<String>>, EnvError> {
        match self.request(Op::LocationParams).await? {
            Value::Null => Ok(None),
            value => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| EnvError::Protocol(e.to_string())),
        }
    }

    async fn update_location(&mut self, changes: &Map<String, Value>) -> Result<(), EnvError> {
        self.request(Op::UpdateLocation { changes }).await.map(|_| ())
    }
}
