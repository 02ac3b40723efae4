//! One-shot program execution and its result types.

use serde_json::Value;

use crate::bridge::PatchSink;
use crate::error::{EnvError, WorkerError};
use crate::process::Environment;
use crate::protocol::{OutboundMessage, Outbox};

pub mod python;

/// The three values a successful run yields, passed through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub docs_json: Value,
    pub render_items: Value,
    pub root_ids: Value,
}

impl RenderOutput {
    /// Build from the program's return value, which must be a sequence of
    /// exactly three items.
    pub fn from_value(value: Value) -> Result<Self, EnvError> {
        match value {
            Value::Array(items) => match <[Value; 3]>::try_from(items) {
                Ok([docs_json, render_items, root_ids]) => Ok(Self {
                    docs_json,
                    render_items,
                    root_ids,
                }),
                Err(items) => Err(EnvError::Protocol(format!(
                    "program must return (docs_json, render_items, root_ids), got {} values",
                    items.len()
                ))),
            },
            other => Err(EnvError::Protocol(format!(
                "program must return (docs_json, render_items, root_ids), got {}",
                other
            ))),
        }
    }

    pub fn into_message(self) -> OutboundMessage {
        OutboundMessage::Render {
            docs_json: self.docs_json,
            render_items: self.render_items,
            root_ids: self.root_ids,
        }
    }
}

#[derive(Debug)]
pub enum ExecutionResult {
    Rendered(RenderOutput),
    ExecutionError { summary: String, cause: EnvError },
}

impl ExecutionResult {
    fn from_run(run: Result<RenderOutput, EnvError>) -> Self {
        match run {
            Ok(output) => ExecutionResult::Rendered(output),
            Err(cause) => ExecutionResult::ExecutionError {
                summary: summarize_trace(&cause.trace()),
                cause,
            },
        }
    }
}

/// The user-facing line of a multi-line trace: the second-to-last line.
/// A single-line trace is its own summary. When that line is blank the last
/// non-blank line is used instead.
pub fn summarize_trace(trace: &str) -> String {
    let lines: Vec<&str> = trace.split('\n').collect();
    let chosen = match lines.as_slice() {
        [only] => *only,
        _ => lines[lines.len() - 2],
    };
    if !chosen.trim().is_empty() {
        return chosen.to_string();
    }
    lines
        .iter()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.to_string())
        .unwrap_or_else(|| "Execution failed".to_string())
}

/// Runs the baked program exactly once.
#[derive(Debug, Clone)]
pub struct ProgramExecutor {
    program: String,
}

impl ProgramExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    pub async fn run<E>(&self, env: &mut E, sink: PatchSink) -> ExecutionResult
    where
        E: Environment + ?Sized,
    {
        tracing::info!(bytes = self.program.len(), "executing program");
        ExecutionResult::from_run(env.run(&self.program, sink).await)
    }

    /// Run the program and post the outcome: a `render` on success, the
    /// trace summary as `status` on failure. Failure is returned to the
    /// caller after reporting.
    pub async fn execute<E>(&self, env: &mut E, sink: PatchSink, outbox: &Outbox) -> Result<(), WorkerError>
    where
        E: Environment + ?Sized,
    {
        outbox.status("Executing code");
        match self.run(env, sink).await {
            ExecutionResult::Rendered(output) => {
                tracing::info!("program rendered");
                outbox.send(output.into_message());
                Ok(())
            }
            ExecutionResult::ExecutionError { summary, cause } => {
                tracing::error!(error = %summary, "program execution failed");
                outbox.status(summary.clone());
                Err(WorkerError::Execution { summary, source: cause })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_is_second_to_last_line() {
        let trace = "Traceback (most recent call last):\n  File \"<exec>\", line 3, in <module>\nModuleNotFoundError: No module named 'geopandas'\n";
        assert_eq!(summarize_trace(trace), "ModuleNotFoundError: No module named 'geopandas'");

        // without a trailing newline the rule still picks index len-2
        assert_eq!(summarize_trace("a\nb\nc"), "b");
    }

    #[test]
    fn single_line_trace_falls_back_to_itself() {
        assert_eq!(summarize_trace("interpreter exited"), "interpreter exited");
        assert_eq!(summarize_trace(""), "Execution failed");
    }

    #[test]
    fn blank_summary_line_falls_back_to_last_text() {
        assert_eq!(summarize_trace("\n"), "Execution failed");
        assert_eq!(summarize_trace("  \n\t\n"), "Execution failed");
        assert_eq!(
            summarize_trace("Traceback\nRuntimeError: interpreter died\n\n"),
            "RuntimeError: interpreter died"
        );
    }

    #[test]
    fn render_output_needs_three_values() {
        let out = RenderOutput::from_value(json!(["{}", {"a": 1}, ["r1"]])).unwrap();
        assert_eq!(out.docs_json, json!("{}"));
        assert_eq!(out.root_ids, json!(["r1"]));
        assert!(RenderOutput::from_value(json!(["{}", {}])).is_err());
        assert!(RenderOutput::from_value(json!(null)).is_err());
    }
}
