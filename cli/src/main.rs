mod client;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "modelctl")]
#[command(author, version, about = "Manage the lifecycle of local AI models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon server
    Serve {
        /// Port to listen on (defaults to daemon.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the model catalog
    #[command(alias = "ls")]
    Models {
        /// Only models in this category (e.g., "programming")
        #[arg(short, long)]
        category: Option<String>,

        /// Only models with this status (e.g., "downloaded")
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Download a model and follow its progress
    Pull {
        /// Model id (e.g., "gpt2")
        model: String,
    },

    /// Load a downloaded model into the runtime
    Load {
        /// Model id
        model: String,
    },

    /// Unload a loaded model
    Unload {
        /// Model id
        model: String,
    },

    /// Show daemon, model and resource status
    Status,

    /// List active resource alerts
    Alerts {
        /// Only show this level ("warning" or "critical")
        #[arg(short, long)]
        level: Option<String>,

        /// Dismiss the alert with this id
        #[arg(short, long)]
        dismiss: Option<u64>,
    },

    /// View or set configuration
    Config {
        /// Config key (e.g., "daemon.port", "thresholds.cpu.critical")
        key: Option<String>,

        /// Value to set (if omitted, shows current value)
        value: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            commands::serve::execute(port).await?;
        }
        Commands::Models { category, status } => {
            commands::models::execute(category.as_deref(), status.as_deref()).await?;
        }
        Commands::Pull { model } => {
            commands::pull::execute(&model).await?;
        }
        Commands::Load { model } => {
            commands::load::load(&model).await?;
        }
        Commands::Unload { model } => {
            commands::load::unload(&model).await?;
        }
        Commands::Status => {
            commands::status::execute().await?;
        }
        Commands::Alerts { level, dismiss } => {
            commands::alerts::execute(level.as_deref(), dismiss).await?;
        }
        Commands::Config { key, value } => {
            commands::config::execute(key.as_deref(), value.as_deref()).await?;
        }
    }

    Ok(())
}
