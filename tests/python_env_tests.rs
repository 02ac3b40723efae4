use panel_worker::bridge::PatchSink;
use panel_worker::execution::summarize_trace;
use panel_worker::process::{Environment, PythonEnvironment};
use panel_worker::{EnvError, OutboundMessage, Outbox};
use serde_json::json;

fn python() -> Option<&'static str> {
    ["python3", "python"].into_iter().find(|exe| {
        std::process::Command::new(exe)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    })
}

#[tokio::test]
async fn runs_program_and_forwards_send_patch() {
    let Some(exe) = python() else {
        println!("no python interpreter on PATH, skipping");
        return;
    };
    let (outbox, mut rx) = Outbox::channel();
    let mut env = PythonEnvironment::new(exe);
    env.load().await.unwrap();

    let program = r#"
import asyncio
print("program output goes to stderr")
sendPatch({"events": ["init"]}, [("b1", b"ab")])
await asyncio.sleep(0)
("{}", {"docid": "d1"}, ["root"])
"#;
    let out = env.run(program, PatchSink::new(outbox)).await.unwrap();
    assert_eq!(out.docs_json, json!("{}"));
    assert_eq!(out.render_items, json!({"docid": "d1"}));
    assert_eq!(out.root_ids, json!(["root"]));

    match rx.try_recv().unwrap() {
        OutboundMessage::Patch { patch, buffers } => {
            assert_eq!(patch, json!({"events": ["init"]}));
            assert_eq!(buffers, json!([{"id": "b1", "data": "YWI="}]));
        }
        other => panic!("expected patch, got {:?}", other),
    }
}

#[tokio::test]
async fn raised_errors_carry_the_python_traceback() {
    let Some(exe) = python() else {
        println!("no python interpreter on PATH, skipping");
        return;
    };
    let (outbox, _rx) = Outbox::channel();
    let mut env = PythonEnvironment::new(exe);
    env.load().await.unwrap();

    let err = env
        .run("raise ValueError('boom')", PatchSink::new(outbox.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, EnvError::Raised(_)));
    assert!(err.trace().starts_with("Traceback"));
    assert_eq!(summarize_trace(&err.trace()), "ValueError: boom");

    // a bad return shape is a protocol error, the interpreter stays usable
    let err = env.run("(1, 2)", PatchSink::new(outbox.clone())).await.unwrap_err();
    assert!(matches!(err, EnvError::Protocol(_)));
    assert!(env.run("('{}', [], [])", PatchSink::new(outbox)).await.is_ok());
}

#[tokio::test]
async fn requests_before_load_fail() {
    let (outbox, _rx) = Outbox::channel();
    let mut env = PythonEnvironment::new("python3");
    let err = env.run("1", PatchSink::new(outbox)).await.unwrap_err();
    assert!(matches!(err, EnvError::NotLoaded));
}

#[tokio::test]
async fn missing_interpreter_fails_to_spawn() {
    let mut env = PythonEnvironment::new("/nonexistent/python-for-panel-worker");
    assert!(matches!(env.load().await, Err(EnvError::Spawn(_))));
}
