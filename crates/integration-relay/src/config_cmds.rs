use std::path::Path;

use anyhow::{Context, Result, bail};
use relay_config::RelayConfig;

use crate::cli::OutputFormat;

pub(crate) fn handle_config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let target = match config_path {
        Some(path) => path.to_path_buf(),
        None => relay_config::paths::config_file()
            .context("Failed to determine config directory")?,
    };
    if target.exists() && !force {
        bail!(
            "Config already exists at {} (use --force to overwrite)",
            target.display()
        );
    }

    let path = RelayConfig::save_default_template(Some(&target))?;
    eprintln!("Wrote relay config template to: {}", path.display());
    eprintln!("  Export credentials as a comma-separated list in GOOGLE_API_KEYS.");
    Ok(())
}

pub(crate) fn handle_config_show(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = RelayConfig::load(config_path)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => print!("{}", toml::to_string_pretty(&config)?),
    }
    Ok(())
}
