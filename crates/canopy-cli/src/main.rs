//! `canopy` binary.

use std::io;

use canopy_cli::{CliError, Shell};
use canopy_core::{RuntimeConfig, SystemEnv};
use canopy_harness::{MemorySurface, fixtures};
use canopy_proto::NodeKey;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Drive the Canopy demo application from stdin.
#[derive(Debug, Parser)]
#[command(name = "canopy", version, about)]
struct Args {
    /// Number of events the history retains
    #[arg(long, default_value_t = 100)]
    history_capacity: usize,

    /// Maximum nesting of update passes
    #[arg(long, default_value_t = 64)]
    max_update_depth: usize,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log: String,

    /// Component mounted before reading input
    #[arg(long)]
    mount: Option<String>,
}

fn main() -> Result<(), CliError> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&args.log))
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let config = RuntimeConfig {
        history_capacity: args.history_capacity,
        max_update_depth: args.max_update_depth,
    };
    let surface = MemorySurface::new();
    let mut app = fixtures::demo_app(surface.clone(), config, SystemEnv)?;
    if let Some(component) = &args.mount {
        let id = app.mount(component, NodeKey::ROOT)?;
        info!(%id, "mounted");
    }

    let mut shell = Shell::new(app, surface);
    shell.run_session(io::stdin().lock(), io::stdout().lock())
}
