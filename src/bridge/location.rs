//! Mirror of the document's location model.
//!
//! The model is read-only outside an [`EditGuard`]; only recognized
//! parameters can ever be set.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::error::WorkerError;

#[derive(Debug, Clone)]
pub struct Location {
    params: BTreeSet<String>,
    values: Map<String, Value>,
    readonly: bool,
}

impl Location {
    pub fn new<I, S>(params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            params: params.into_iter().map(Into::into).collect(),
            values: Map::new(),
            readonly: true,
        }
    }

    pub fn is_param(&self, key: &str) -> bool {
        self.params.contains(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// The entries of `data` that name recognized parameters.
    pub fn recognized(&self, data: &Map<String, Value>) -> Map<String, Value> {
        data.iter()
            .filter(|(key, _)| {
                let known = self.is_param(key);
                if !known {
                    tracing::debug!(key = %key, "ignoring unknown location parameter");
                }
                known
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Lift the read-only flag until the returned guard is dropped.
    pub fn edit(&mut self) -> EditGuard<'_> {
        let was_readonly = std::mem::replace(&mut self.readonly, false);
        EditGuard { location: self, was_readonly }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), WorkerError> {
        if self.readonly {
            return Err(WorkerError::ReadOnly);
        }
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Scoped write access to a [`Location`]. The previous read-only state is
/// restored on drop, on every exit path.
#[derive(Debug)]
pub struct EditGuard<'a> {
    location: &'a mut Location,
    was_readonly: bool,
}

impl EditGuard<'_> {
    /// Merge `data`, keeping only recognized parameters. Unknown keys are
    /// dropped silently. Returns the entries that were applied.
    pub fn update(&mut self, data: &Map<String, Value>) -> Result<Map<String, Value>, WorkerError> {
        let applied = self.location.recognized(data);
        for (key, value) in &applied {
            self.location.set(key, value.clone())?;
        }
        Ok(applied)
    }
}

impl Drop for EditGuard<'_> {
    fn drop(&mut self) {
        self.location.readonly = self.was_readonly;
    }
}
