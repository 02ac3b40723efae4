//! Embedded interpreter seam: the `Environment` trait and child-process handles.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::process::{Child, ChildStdin, ChildStdout};

use crate::bridge::PatchSink;
use crate::error::EnvError;
use crate::execution::RenderOutput;
use crate::provision::DependencySpec;

pub mod python;

pub use python::PythonEnvironment;

/// The embedded execution environment the worker drives.
///
/// Calls are strictly sequential; the worker never issues a second call
/// before the previous one returned.
#[async_trait]
pub trait Environment: Send {
    /// Short name used in status lines ("Loading python").
    fn name(&self) -> &str;

    async fn load(&mut self) -> Result<(), EnvError>;

    async fn install(&mut self, spec: &DependencySpec) -> Result<(), EnvError>;

    /// Run the program once. The document framework reports every change
    /// through `sink`.
    async fn run(&mut self, program: &str, sink: PatchSink) -> Result<RenderOutput, EnvError>;

    /// Connect the document change feed to `sink`. Changes made with
    /// `setter` must not be echoed back.
    async fn link(&mut self, sink: PatchSink, setter: &str) -> Result<(), EnvError>;

    async fn apply_patch(&mut self, patch: &Value, setter: &str) -> Result<(), EnvError>;

    /// Recognized location parameters, or `None` when the document has no
    /// location model.
    async fn location_params(&mut self) -> Result<Option<Vec<String>>, EnvError>;

    async fn update_location(&mut self, changes: &Map<String, Value>) -> Result<(), EnvError>;
}

pub struct ProcessHandle {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
}
