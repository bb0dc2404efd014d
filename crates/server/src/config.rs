//! Server configuration, persisted as JSON next to the plot data.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use plotgrid_engine::PlotError;
use plotgrid_engine::world::AreaConfig;
use plotgrid_engine::world::layout::GridLayout;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const CONFIG_FILE: &str = "plotgrid.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Root of `plots/<world>.json`.
    pub data_dir: PathBuf,
    /// Milliseconds between scheduler turns.
    pub tick_ms: u64,
    /// Per-turn budget for chunk work.
    pub task_budget_ms: u64,
    pub autosave_secs: u64,
    /// Interval between metrics log lines; 0 disables them.
    pub stats_secs: u64,
    pub log_level: String,
    pub economy: EconomyConfig,
    pub limits: LimitConfig,
    pub worlds: Vec<WorldConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EconomyConfig {
    pub claim_price: f64,
    pub merge_price: f64,
    pub starting_balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitConfig {
    /// Plots one identity may own across all worlds.
    pub max_plots: usize,
    /// Largest merged component, in plots.
    pub max_merge_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    pub name: String,
    pub plot_width: i64,
    pub road_width: i64,
    pub auto_merge: bool,
    pub world_border: bool,
    pub merge_removes_roads: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            tick_ms: 50,
            task_budget_ms: 5,
            autosave_secs: 300,
            stats_secs: 60,
            log_level: "info".to_string(),
            economy: EconomyConfig::default(),
            limits: LimitConfig::default(),
            worlds: vec![WorldConfig::default()],
        }
    }
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            claim_price: 0.0,
            merge_price: 100.0,
            starting_balance: 1000.0,
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_plots: 16,
            max_merge_size: 64,
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: "plotworld".to_string(),
            plot_width: 42,
            road_width: 7,
            auto_merge: false,
            world_border: false,
            merge_removes_roads: true,
        }
    }
}

impl WorldConfig {
    pub fn area_config(&self) -> Result<AreaConfig, PlotError> {
        let mut config = AreaConfig::new(GridLayout::new(self.plot_width, self.road_width)?);
        config.auto_merge = self.auto_merge;
        config.world_border = self.world_border;
        config.merge_removes_roads = self.merge_removes_roads;
        Ok(config)
    }
}

impl ServerConfig {
    /// Load the config at `path`, or write and return the defaults if the file
    /// does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let config: ServerConfig = serde_json::from_str(&contents)
                .with_context(|| format!("parsing config {}", path.display()))?;
            tracing::info!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            let config = ServerConfig::default();
            config.save(path)?;
            tracing::info!("Created default config at {}", path.display());
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serializing config")?;
        std::fs::write(path, json).with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn task_budget(&self) -> Duration {
        Duration::from_millis(self.task_budget_ms.max(1))
    }
}
