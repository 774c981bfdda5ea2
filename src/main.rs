use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wicket::config::Config;
use wicket::routes::Router;
use wicket::server::{Listener, Shutdown};

/// HTTP/1.1 server with echo, user-agent and file endpoints.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory to serve files from under /files/
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Listen address as host:port, overrides the configuration
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let args = Args::parse();
    let mut cfg = Config::load(args.config.as_deref())?;
    if let Some(listen) = &args.listen {
        cfg.server.set_listen(listen)?;
    }
    if let Some(dir) = args.directory {
        cfg.static_files = Some(dir);
    }

    let files_dir = match cfg.static_files {
        Some(dir) => {
            let dir = dir
                .canonicalize()
                .with_context(|| format!("invalid directory {}", dir.display()))?;
            anyhow::ensure!(dir.is_dir(), "not a directory: {}", dir.display());
            tracing::info!("Serving files from {}", dir.display());
            Some(dir)
        }
        None => None,
    };

    let shutdown = Shutdown::new();
    let listener = Listener::bind(&cfg.server).await?;
    let mut server = tokio::spawn(listener.serve(Router::new(files_dir), shutdown.subscribe()));

    tokio::select! {
        res = &mut server => {
            res??;
        }

        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("Shutdown signal received");
            shutdown.trigger();
            server.await??;
        }
    }

    Ok(())
}
