//! Command-line arguments. Values given here override `plotgrid.json`.

use std::path::PathBuf;

use clap::Parser;

use crate::config::ServerConfig;

#[derive(Parser, Debug, Default)]
#[command(name = "plotgrid", about = "Plot grid world host")]
pub struct CliArgs {
    /// Path to the JSON config file (default: `<data-dir>/plotgrid.json`).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding plot records and the config file.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Milliseconds between scheduler turns.
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Per-turn budget for chunk work, in milliseconds.
    #[arg(long)]
    pub budget_ms: Option<u64>,

    /// Log level (error, warn, info, debug, trace). RUST_LOG takes precedence.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Claim, merge and clear a few plots, print the result and exit.
    #[arg(long)]
    pub demo: bool,
}

impl CliArgs {
    /// Where the config file lives.
    pub fn config_path(&self) -> PathBuf {
        match &self.config {
            Some(path) => path.clone(),
            None => self
                .data_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(crate::config::DEFAULT_DATA_DIR))
                .join(crate::config::CONFIG_FILE),
        }
    }
}

impl ServerConfig {
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref dir) = args.data_dir {
            self.data_dir = dir.clone();
        }
        if let Some(ms) = args.tick_ms {
            self.tick_ms = ms;
        }
        if let Some(ms) = args.budget_ms {
            self.task_budget_ms = ms;
        }
        if let Some(ref level) = args.log_level {
            self.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_only_given_values() {
        let mut config = ServerConfig::default();
        let args = CliArgs {
            tick_ms: Some(20),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.tick_ms, 20);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.task_budget_ms, ServerConfig::default().task_budget_ms);
        assert_eq!(config.data_dir, ServerConfig::default().data_dir);
    }

    #[test]
    fn config_path_follows_data_dir() {
        let args = CliArgs {
            data_dir: Some(PathBuf::from("/srv/plots")),
            ..Default::default()
        };
        assert_eq!(args.config_path(), PathBuf::from("/srv/plots/plotgrid.json"));

        let args = CliArgs {
            config: Some(PathBuf::from("custom.json")),
            data_dir: Some(PathBuf::from("/srv/plots")),
            ..Default::default()
        };
        assert_eq!(args.config_path(), PathBuf::from("custom.json"));
    }

    #[test]
    fn parses_flags() {
        let args = CliArgs::parse_from(["plotgrid", "--tick-ms", "25", "--demo"]);
        assert_eq!(args.tick_ms, Some(25));
        assert!(args.demo);
        assert!(args.budget_ms.is_none());
    }
}
