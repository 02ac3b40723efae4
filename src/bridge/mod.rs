//! Live document link between the embedded environment and the host.

use serde_json::Value;

use crate::error::{Result, WorkerError};
use crate::process::Environment;
use crate::protocol::{parse_location, OutboundMessage, Outbox};

pub mod location;

pub use location::{EditGuard, Location};

/// Setter identity stamped on every mutation that originates from the host.
pub const HOST_SETTER: &str = "js";

/// A change reported by the document framework.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentEvent {
    pub patch: Value,
    pub buffers: Value,
    /// Origin of the mutation, if the framework knows it.
    pub setter: Option<String>,
}

impl DocumentEvent {
    pub fn new(patch: Value) -> Self {
        Self {
            patch,
            buffers: Value::Array(Vec::new()),
            setter: None,
        }
    }

    pub fn with_setter(mut self, setter: impl Into<String>) -> Self {
        self.setter = Some(setter.into());
        self
    }
}

/// Outbound patch emitter handed to the environment.
///
/// Changes tagged with [`HOST_SETTER`] came from the host in the first
/// place and are swallowed instead of being echoed back.
#[derive(Debug, Clone)]
pub struct PatchSink {
    outbox: Outbox,
}

impl PatchSink {
    pub fn new(outbox: Outbox) -> Self {
        Self { outbox }
    }

    /// Returns whether the change was forwarded to the host.
    pub fn emit(&self, event: DocumentEvent) -> bool {
        if event.setter.as_deref() == Some(HOST_SETTER) {
            tracing::trace!("suppressing echo of host patch");
            return false;
        }
        self.outbox.send(OutboundMessage::Patch {
            patch: event.patch,
            buffers: event.buffers,
        });
        true
    }
}

/// Owns the document side of the worker once the program has rendered.
#[derive(Debug)]
pub struct DocumentBridge {
    outbox: Outbox,
    /// The environment's change feed is attached to the outbox.
    feed_attached: bool,
    linked: bool,
    location: Option<Location>,
}

impl DocumentBridge {
    pub fn new(outbox: Outbox) -> Self {
        Self {
            outbox,
            feed_attached: false,
            linked: false,
            location: None,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn sink(&self) -> PatchSink {
        PatchSink::new(self.outbox.clone())
    }

    /// Hook the document change feed up to the outbound channel. Runs at
    /// most once; later calls are no-ops. If the location lookup fails the
    /// call can be retried without linking the feed a second time.
    pub async fn on_rendered<E>(&mut self, env: &mut E) -> Result<()>
    where
        E: Environment + ?Sized,
    {
        if self.linked {
            tracing::debug!("document already linked, ignoring rendered");
            return Ok(());
        }
        if !self.feed_attached {
            env.link(self.sink(), HOST_SETTER).await?;
            self.feed_attached = true;
        }
        self.location = env.location_params().await?.map(Location::new);
        self.linked = true;
        tracing::info!(has_location = self.location.is_some(), "document linked");
        Ok(())
    }

    /// Apply a host patch, then signal `idle`. A failure is reported as
    /// `status` before the `idle` goes out.
    pub async fn on_patch<E>(&mut self, env: &mut E, patch: &Value) -> Result<()>
    where
        E: Environment + ?Sized,
    {
        let applied = env.apply_patch(patch, HOST_SETTER).await.map_err(WorkerError::from);
        if let Err(e) = &applied {
            self.outbox.status(format!("Error while applying patch: {}", e.summary()));
        }
        self.outbox.idle();
        applied
    }

    /// Merge host location data, restricted to recognized parameters.
    pub async fn on_location<E>(&mut self, env: &mut E, raw: &Value) -> Result<()>
    where
        E: Environment + ?Sized,
    {
        let result = self.merge_location(env, raw).await;
        if let Err(e) = &result {
            self.outbox.status(format!("Error while updating location: {}", e.summary()));
        }
        result
    }

    async fn merge_location<E>(&mut self, env: &mut E, raw: &Value) -> Result<()>
    where
        E: Environment + ?Sized,
    {
        let Some(location) = self.location.as_mut() else {
            tracing::debug!("document has no location model, ignoring location");
            return Ok(());
        };
        let data = parse_location(raw)?;
        let changes = location.recognized(&data);
        if changes.is_empty() {
            return Ok(());
        }
        // the mirror only takes values the environment accepted
        env.update_location(&changes).await?;
        let applied = location.edit().update(&changes)?;
        tracing::debug!(keys = applied.len(), "location merged");
        Ok(())
    }
}
