//! dwgview - Main entry point
//!
//! Serves the viewer and the DWG conversion API, or runs a one-shot
//! conversion / model inspection from the command line.

mod api;
mod config;
mod converter;
mod inspect;
mod server;
mod state;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::converter::Converter;

#[derive(Parser, Debug)]
#[command(name = "dwgview")]
#[command(about = "DWG to glTF conversion server and 3D viewer host")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "dwgview.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web server (default)
    Serve,
    /// Convert one DWG file to glTF and exit
    Convert {
        input: PathBuf,
        /// Defaults to the input path with a .gltf extension
        output: Option<PathBuf>,
    },
    /// Load a glTF model, frame it and print the result as JSON
    Inspect {
        /// URL or file path
        source: String,
        /// Scale the model so its largest dimension equals this size
        #[arg(long)]
        normalize: Option<f32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("dwgview v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&args.config)?;
    if let Ok(port) = std::env::var("PORT") {
        config.server.bind = config::with_port(&config.server.bind, &port);
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!(
                bind = %config.server.bind,
                uploads = %config.uploads.path.display(),
                public = %config.server.public_dir.display(),
                "Configuration loaded"
            );
            let bind = config.server.bind.clone();
            let state = state::AppState::new(config)?;
            server::run(state, &bind).await?;
        }
        Command::Convert { input, output } => {
            if !dwgview_core::upload::has_dwg_extension(&input.to_string_lossy()) {
                bail!("{} is not a .dwg file", input.display());
            }
            let output = output.unwrap_or_else(|| Converter::output_path_for(&input));
            let converter = Converter::new(&config.converter);
            let model = converter.convert(&input, &output).await?;
            println!("{}", model.display());
        }
        Command::Inspect { source, normalize } => {
            let report = inspect::inspect(&source, normalize).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
