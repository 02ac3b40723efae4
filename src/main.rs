mod cli;

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use is_terminal::IsTerminal;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use panel_worker::config::{self, Config};
use panel_worker::execution::ProgramExecutor;
use panel_worker::process::PythonEnvironment;
use panel_worker::program::{dependencies, PROGRAM};
use panel_worker::protocol::{inbound_stream, write_outbound, Outbox};
use panel_worker::MessageRouter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let cfg = Config::load();

    // stdout belongs to the protocol, logs go to stderr
    let filter = args.log_level.clone().unwrap_or_else(|| cfg.log_filter());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if std::io::stdin().is_terminal() {
        tracing::warn!("stdin is a terminal; the worker expects a host on the other end of a pipe");
    }

    let python = args.python.clone().unwrap_or_else(|| cfg.python());
    let program = match args.program.clone().or_else(|| cfg.get_path(config::PROGRAM)) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading program: {}", path.display()))?,
        None => PROGRAM.to_string(),
    };
    let skip_install = args.skip_install || cfg.get_bool(config::SKIP_INSTALL);

    let (outbox, outbound_rx) = Outbox::channel();
    let writer = tokio::spawn(write_outbound(outbound_rx, tokio::io::stdout()));

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut inbound = inbound_stream(BufReader::new(tokio::io::stdin()));
        while let Some(msg) = inbound.next().await {
            if inbound_tx.send(msg).is_err() {
                break;
            }
        }
    });

    tracing::info!(python = %python, skip_install, "starting worker");
    let router = MessageRouter::new(
        PythonEnvironment::new(python),
        outbox,
        dependencies(),
        ProgramExecutor::new(program),
    )
    .skip_install(skip_install);
    let result = router.run(inbound_rx).await;

    // Outbox clones die with the router and the interpreter reader; give the
    // writer a moment to flush what is left.
    match tokio::time::timeout(Duration::from_secs(2), writer).await {
        Ok(Ok(Err(e))) => tracing::warn!(error = %e, "failed writing outbound messages"),
        Ok(Err(e)) => tracing::warn!(error = %e, "outbound writer panicked"),
        Err(_) => tracing::debug!("outbound writer still busy at exit"),
        Ok(Ok(Ok(()))) => {}
    }

    if let Err(e) = result {
        tracing::error!(error = %e, "worker failed");
        // stdin may still be open; don't wait on the blocking reader
        std::process::exit(1);
    }
    Ok(())
}
