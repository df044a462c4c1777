use clap::{ArgAction, Parser};
use docshelf_config::Config;
use docshelf_web::error::{ErrorKind, Result};
use exn::ResultExt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Browse, upload, view and delete PDF documents kept in a blob container.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON). Defaults to `docshelf.*` in
    /// the platform config directory, if present.
    #[arg(short, long, env = "DOCSHELF_CONFIG")]
    config: Option<PathBuf>,
    /// Address to listen on, overriding `server.listen`.
    #[arg(short, long)]
    listen: Option<SocketAddr>,
    /// More logging (-v for debug, -vv for trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "docshelf stopped");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    tracing::debug!(?config, "Configuration loaded");
    docshelf_web::serve(config, shutdown_signal()).await
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Ctrl-C received; finishing in-flight requests"),
        Err(e) => {
            tracing::error!(error = %e, "Could not listen for Ctrl-C; stop the process another way");
            std::future::pending::<()>().await;
        },
    }
}
