use anyhow::Result;
use clap::Parser;

mod cli;
mod config_cmds;
mod generate_cmd;
mod render;
mod serve_cmd;

use cli::{Cli, Commands, ConfigCommands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { bind, port } => serve_cmd::handle_serve(config_path, bind, port).await,
        Commands::Generate { courses, endpoint } => {
            generate_cmd::handle_generate(config_path, &courses, endpoint).await
        }
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Init { force } => config_cmds::handle_config_init(config_path, force),
            ConfigCommands::Show { format } => config_cmds::handle_config_show(config_path, format),
        },
    }
}
