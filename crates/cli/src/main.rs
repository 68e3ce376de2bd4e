//! FileScout CLI, the main entry point.
//!
//! Commands:
//! - `chat`: Interactive REPL or single-message mode
//! - `tools`: List the available tools and their parameters
//! - `init`: Write a default config file
//! - `doctor`: Diagnose configuration and endpoint health

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "filescout",
    about = "FileScout: a conversational assistant for exploring local files",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.filescout/config.toml
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the file assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Resume (or create) a named session
        #[arg(long)]
        session: Option<String>,

        /// Print the model's thinking and plan for every decision
        #[arg(long)]
        show_thinking: bool,
    },

    /// List the tools the assistant can use
    Tools,

    /// Write a default configuration file
    Init,

    /// Diagnose configuration and endpoint health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Chat {
            message,
            session,
            show_thinking,
        } => {
            let options = commands::chat::ChatOptions {
                message,
                session,
                show_thinking,
            };
            commands::chat::run(config_path, options).await
        }
        Commands::Tools => commands::tools::run(config_path).await,
        Commands::Init => commands::init::run(config_path).await,
        Commands::Doctor => commands::doctor::run(config_path).await,
    };

    if let Err(e) = result {
        eprintln!("  [Error] {e}");
        std::process::exit(1);
    }

    Ok(())
}
