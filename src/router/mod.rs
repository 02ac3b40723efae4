//! The worker's single dispatcher: startup sequence plus steady-state
//! handling of host messages.

use std::collections::VecDeque;

use tokio::sync::mpsc;

use crate::bridge::DocumentBridge;
use crate::error::{Result, WorkerError};
use crate::execution::ProgramExecutor;
use crate::process::Environment;
use crate::protocol::{InboundMessage, Outbox};
use crate::provision::{provision, DependencySpec, InstallOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Provisioning,
    Executing,
    /// Rendered; waiting for the host to acknowledge with `rendered`.
    RenderedPending,
    Live,
    /// Startup failed. Nothing but logging happens from here on.
    Failed,
}

pub struct MessageRouter<E> {
    env: E,
    outbox: Outbox,
    dependencies: Vec<DependencySpec>,
    executor: ProgramExecutor,
    bridge: DocumentBridge,
    phase: Phase,
    skip_install: bool,
    /// `patch`/`location` messages that arrived before the document was linked.
    pending: VecDeque<InboundMessage>,
}

impl<E: Environment> MessageRouter<E> {
    pub fn new(env: E, outbox: Outbox, dependencies: Vec<DependencySpec>, executor: ProgramExecutor) -> Self {
        let bridge = DocumentBridge::new(outbox.clone());
        Self {
            env,
            outbox,
            dependencies,
            executor,
            bridge,
            phase: Phase::Start,
            skip_install: false,
            pending: VecDeque::new(),
        }
    }

    pub fn skip_install(mut self, skip: bool) -> Self {
        self.skip_install = skip;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn bridge(&self) -> &DocumentBridge {
        &self.bridge
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Load, provision, execute. Leaves the router waiting for `rendered`.
    pub async fn start(&mut self) -> Result<Vec<InstallOutcome>> {
        if self.phase != Phase::Start {
            tracing::warn!(phase = ?self.phase, "startup already ran");
            return Ok(Vec::new());
        }

        let name = self.env.name().to_string();
        self.outbox.status(format!("Loading {}", name));
        if let Err(e) = self.env.load().await {
            self.phase = Phase::Failed;
            let err = WorkerError::Load(e);
            tracing::error!(error = %err, "interpreter failed to load");
            self.outbox.status(format!("Error while loading {}: {}", name, err.summary()));
            return Err(err);
        }

        self.phase = Phase::Provisioning;
        let outcomes = if self.skip_install {
            tracing::info!("skipping dependency provisioning");
            Vec::new()
        } else {
            provision(&mut self.env, &self.dependencies, &self.outbox).await
        };

        self.phase = Phase::Executing;
        let sink = self.bridge.sink();
        if let Err(e) = self.executor.execute(&mut self.env, sink, &self.outbox).await {
            self.phase = Phase::Failed;
            return Err(e);
        }

        self.phase = Phase::RenderedPending;
        Ok(outcomes)
    }

    /// Handle one inbound message to completion.
    pub async fn dispatch(&mut self, msg: InboundMessage) {
        match (self.phase, msg) {
            (Phase::Failed, msg) => {
                tracing::warn!(?msg, "startup failed, dropping inbound message");
            }
            (Phase::Live, msg) => self.handle_live(msg).await,
            (Phase::RenderedPending, InboundMessage::Rendered) => {
                match self.bridge.on_rendered(&mut self.env).await {
                    Ok(()) => {
                        self.phase = Phase::Live;
                        self.drain_pending().await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to link document");
                        self.outbox.status(format!("Error while linking document: {}", e.summary()));
                    }
                }
            }
            (phase, InboundMessage::Rendered) => {
                tracing::warn!(?phase, "rendered before the document exists, ignoring");
            }
            (phase, msg) => {
                tracing::debug!(?phase, ?msg, "queueing until the document is linked");
                self.pending.push_back(msg);
            }
        }
    }

    async fn drain_pending(&mut self) {
        if !self.pending.is_empty() {
            tracing::info!(count = self.pending.len(), "replaying early messages");
        }
        while let Some(msg) = self.pending.pop_front() {
            self.handle_live(msg).await;
        }
    }

    async fn handle_live(&mut self, msg: InboundMessage) {
        let result = match &msg {
            InboundMessage::Rendered => self.bridge.on_rendered(&mut self.env).await,
            InboundMessage::Patch { patch } => self.bridge.on_patch(&mut self.env, patch).await,
            InboundMessage::Location { location } => self.bridge.on_location(&mut self.env, location).await,
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "inbound message failed");
        }
    }

    /// Run startup, then serve `inbound` until the host goes away.
    pub async fn run(mut self, mut inbound: mpsc::UnboundedReceiver<InboundMessage>) -> Result<()> {
        self.start().await?;
        while let Some(msg) = inbound.recv().await {
            self.dispatch(msg).await;
        }
        tracing::info!("inbound channel closed, worker exiting");
        Ok(())
    }
}
