//! Per-invocation application context.

use std::path::PathBuf;

use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::error::Result;

/// Everything a command needs beyond its own arguments.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub output_format: OutputFormat,
    pub robot_mode: bool,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config = Config::load(cli.config.as_deref())?;
        let output_format = cli.output_format();
        if !output_format.use_colors() {
            console::set_colors_enabled(false);
            colored::control::set_override(false);
        }
        Ok(Self {
            config,
            config_path: cli.config.clone(),
            output_format,
            robot_mode: output_format.is_machine_readable(),
        })
    }

    /// Context over an explicit config, for tests and embedding.
    #[must_use]
    pub fn with_config(config: Config, output_format: OutputFormat) -> Self {
        Self {
            config,
            config_path: None,
            output_format,
            robot_mode: output_format.is_machine_readable(),
        }
    }
}
