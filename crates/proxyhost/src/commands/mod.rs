pub mod config_cmd;
pub mod events;
pub mod run;

use std::path::PathBuf;

use proxyhost_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The config file in effect: `--config`, else the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(proxyhost_config::config_path)
}

/// Load file + environment, mapping failures to diagnostics.
pub fn load_config(global: &GlobalOpts) -> Result<(Config, PathBuf), CliError> {
    let path = config_path(global);
    let config =
        proxyhost_config::load_config_from(&path).map_err(|e| CliError::config(&path, e))?;
    Ok((config, path))
}
