//! Runcell server CLI
//!
//! Runs the HTTP execution service and a few configuration helpers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use runcell::toolchain::PROBE_TIMEOUT;
use runcell::{Config, DEFAULT_CONFIG, Runner, probe_all};
use runcell_server::{AppState, serve, shutdown_signal};
use tokio::net::TcpListener;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "runcell-server")]
#[command(about = "An HTTP service that runs code snippets in throwaway workspaces")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the configuration)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Address to bind (overrides the configuration)
    #[arg(short, long, global = true)]
    bind: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service (default)
    Serve,

    /// List available languages
    Languages,

    /// Show the effective configuration
    ShowConfig,

    /// Initialize a new configuration file
    Init {
        /// Output path (default: runcell.toml)
        #[arg(short, long, default_value = "runcell.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(Commands::Init { output, force }) = &cli.command {
        return init_config(output, *force).await;
    }

    if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
    }
    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await,
        Commands::Languages => {
            list_languages(&config);
            Ok(())
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
        Commands::Init { .. } => Ok(()),
    }
}

async fn run_server(config: Config) -> Result<()> {
    let toolchains = probe_all(&config, PROBE_TIMEOUT).await;
    let available = toolchains.iter().filter(|t| t.available).count();

    let runner = Runner::new(config).context("failed to build language registry")?;
    runner
        .workspaces()
        .prepare_root()
        .await
        .context("failed to create workspace root")?;

    let address = runner.config().listen_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind to {address}"))?;

    info!(
        %address,
        languages = ?runner.supported_languages(),
        toolchains_available = available,
        temp_root = %runner.workspaces().root().display(),
        max_timeout_ms = runner.config().max_timeout_ms,
        "runcell server listening"
    );

    serve(listener, AppState::new(runner, toolchains), shutdown_signal())
        .await
        .context("server error")
}

fn list_languages(config: &Config) {
    println!("Available languages:\n");

    for (id, lang) in &config.languages {
        println!("  {:<15} {} ({}, {})", id, lang.name, lang.kind, lang.version);
    }
}

fn show_config(config: &Config) {
    println!("Listen address: {}", config.listen_address());
    println!("Workspace root: {}", config.temp_root.display());
    println!();
    println!("Execution limits:");
    println!("  Default timeout: {} ms", config.default_timeout_ms);
    println!("  Max timeout: {} ms", config.max_timeout_ms);
    println!("  Max output: {} bytes per stream", config.max_output_bytes);
    match config.max_concurrent {
        Some(n) => println!(
            "  Max concurrent: {n} (queue timeout {} ms)",
            config.queue_timeout_ms
        ),
        None => println!("  Max concurrent: unbounded"),
    }
    println!("  Kill grace: {} ms", config.kill_grace_ms);
    println!("  Max body: {} bytes", config.max_body_bytes);
    println!();
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, DEFAULT_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
