use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Integration relay: course-connection generation with credential failover")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ~/.config/integration-relay/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the dispatch endpoint
    Serve {
        /// Listen address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,

        /// Listen port (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Generate connections for 2-4 courses, waiting out rate limits
    Generate {
        /// JSON file holding an array of course records
        #[arg(long)]
        courses: PathBuf,

        /// Dispatch endpoint URL (overrides client.endpoint)
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Manage the relay config file
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a commented default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective config
    Show {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
