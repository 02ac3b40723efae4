use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "panel-worker", about = "Renders a Panel document in an embedded Python and syncs it with a host over stdio", version)]
pub struct Cli {
    /// Python executable to embed.
    #[arg(long)]
    pub python: Option<String>,

    /// Run this program file instead of the built-in one (development only).
    #[arg(long, value_name = "FILE")]
    pub program: Option<PathBuf>,

    /// Skip dependency provisioning.
    #[arg(long = "skip-install")]
    pub skip_install: bool,

    /// Tracing filter, e.g. `info` or `panel_worker=debug`.
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
