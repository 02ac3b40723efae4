#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

use panel_worker::bridge::{DocumentEvent, PatchSink};
use panel_worker::execution::{ProgramExecutor, RenderOutput};
use panel_worker::process::Environment;
use panel_worker::provision::DependencySpec;
use panel_worker::{EnvError, MessageRouter, OutboundMessage, Outbox};

pub const TRACE: &str = "Traceback (most recent call last):\n  File \"<exec>\", line 12, in <module>\nModuleNotFoundError: No module named 'geopandas'\n";

/// Scripted behaviour for [`FakeEnvironment`].
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub load_error: Option<String>,
    pub failing_installs: HashSet<String>,
    pub run_error: Option<String>,
    /// Emitted through the run sink while the program executes.
    pub run_events: Vec<DocumentEvent>,
    pub link_error: Option<String>,
    pub location_params: Option<Vec<String>>,
    /// Number of leading `location_params` calls that fail.
    pub failing_location_lookups: usize,
    pub patch_error: Option<String>,
    /// Framework re-reports every applied patch tagged with its setter.
    pub echo_patches: bool,
    /// Extra change the framework derives from every applied patch.
    pub derived_patch: Option<Value>,
    pub location_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct Calls {
    pub loads: usize,
    pub installs: Vec<String>,
    pub runs: Vec<String>,
    pub links: Vec<String>,
    pub patches: Vec<(Value, String)>,
    pub location_updates: Vec<Map<String, Value>>,
}

pub struct FakeEnvironment {
    script: Script,
    calls: Arc<Mutex<Calls>>,
    linked: Option<PatchSink>,
}

impl FakeEnvironment {
    pub fn new(script: Script) -> (Self, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        (
            Self {
                script,
                calls: calls.clone(),
                linked: None,
            },
            calls,
        )
    }
}

pub fn render_output() -> RenderOutput {
    RenderOutput {
        docs_json: json!("{\"doc\": {\"roots\": []}}"),
        render_items: json!([{"docid": "d1", "roots": {"r1": "root"}}]),
        root_ids: json!(["r1"]),
    }
}

#[async_trait]
impl Environment for FakeEnvironment {
    fn name(&self) -> &str {
        "fake"
    }

    async fn load(&mut self) -> Result<(), EnvError> {
        self.calls.lock().unwrap().loads += 1;
        match &self.script.load_error {
            Some(trace) => Err(EnvError::Raised(trace.clone())),
            None => Ok(()),
        }
    }

    async fn install(&mut self, spec: &DependencySpec) -> Result<(), EnvError> {
        self.calls.lock().unwrap().installs.push(spec.as_str().to_string());
        if self.script.failing_installs.contains(spec.as_str()) {
            return Err(EnvError::Raised(format!("ValueError: cannot install {}\n", spec)));
        }
        Ok(())
    }

    async fn run(&mut self, program: &str, sink: PatchSink) -> Result<RenderOutput, EnvError> {
        self.calls.lock().unwrap().runs.push(program.to_string());
        for ev in self.script.run_events.clone() {
            sink.emit(ev);
        }
        match &self.script.run_error {
            Some(trace) => Err(EnvError::Raised(trace.clone())),
            None => Ok(render_output()),
        }
    }

    async fn link(&mut self, sink: PatchSink, setter: &str) -> Result<(), EnvError> {
        self.calls.lock().unwrap().links.push(setter.to_string());
        if let Some(trace) = &self.script.link_error {
            return Err(EnvError::Raised(trace.clone()));
        }
        self.linked = Some(sink);
        Ok(())
    }

    async fn apply_patch(&mut self, patch: &Value, setter: &str) -> Result<(), EnvError> {
        self.calls.lock().unwrap().patches.push((patch.clone(), setter.to_string()));
        if let Some(trace) = &self.script.patch_error {
            return Err(EnvError::Raised(trace.clone()));
        }
        if let Some(sink) = &self.linked {
            if self.script.echo_patches {
                sink.emit(DocumentEvent::new(patch.clone()).with_setter(setter));
            }
            if let Some(derived) = &self.script.derived_patch {
                sink.emit(DocumentEvent::new(derived.clone()));
            }
        }
        Ok(())
    }

    async fn location_params(&mut self) -> Result<Option<Vec<String>>, EnvError> {
        if self.script.failing_location_lookups > 0 {
            self.script.failing_location_lookups -= 1;
            return Err(EnvError::Raised("Traceback\nRuntimeError: transient\n".into()));
        }
        Ok(self.script.location_params.clone())
    }

    async fn update_location(&mut self, changes: &Map<String, Value>) -> Result<(), EnvError> {
        if let Some(trace) = &self.script.location_error {
            return Err(EnvError::Raised(trace.clone()));
        }
        self.calls.lock().unwrap().location_updates.push(changes.clone());
        Ok(())
    }
}

pub fn deps(specs: &[&str]) -> Vec<DependencySpec> {
    specs.iter().copied().map(DependencySpec::from).collect()
}

pub fn router(
    script: Script,
    specs: &[&str],
) -> (
    MessageRouter<FakeEnvironment>,
    mpsc::UnboundedReceiver<OutboundMessage>,
    Arc<Mutex<Calls>>,
) {
    let (env, calls) = FakeEnvironment::new(script);
    let (outbox, rx) = Outbox::channel();
    let router = MessageRouter::new(env, outbox, deps(specs), ProgramExecutor::new("await write_doc()"));
    (router, rx, calls)
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<OutboundMessage>) -> Vec<OutboundMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

pub fn statuses(msgs: &[OutboundMessage]) -> Vec<String> {
    msgs.iter()
        .filter_map(|m| match m {
            OutboundMessage::Status { msg } => Some(msg.clone()),
            _ => None,
        })
        .collect()
}

pub fn count(msgs: &[OutboundMessage], pred: impl Fn(&OutboundMessage) -> bool) -> usize {
    msgs.iter().filter(|m| pred(m)).count()
}

pub fn is_idle(m: &OutboundMessage) -> bool {
    matches!(m, OutboundMessage::Idle)
}

pub fn is_patch(m: &OutboundMessage) -> bool {
    matches!(m, OutboundMessage::Patch { .. })
}

pub fn is_render(m: &OutboundMessage) -> bool {
    matches!(m, OutboundMessage::Render { .. })
}
