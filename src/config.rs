use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{swlog_debug, Error, Result};

/// Which agent backend the engine talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BackendConfig {
    /// Deterministic in-process responses.
    #[default]
    Mock,
    /// External command; the prompt is appended as the last argument.
    Command { command: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Enables the edge mutation family.
    pub edge_optimize: bool,
    /// Enables the node (specialization swap) mutation family.
    pub node_optimize: bool,
    /// Caps team formation.
    pub max_team_size: usize,
    /// Probability of each extra forward edge when seeding the initial graph.
    pub init_connection_probability: f64,
    /// Maximum optimizer iterations.
    pub iteration_budget: usize,
    /// Consecutive rejections before the optimizer stops; 0 disables the check.
    pub plateau_limit: usize,
    /// Minimum gain over the best score for a trial to be accepted.
    pub improvement_epsilon: f64,
    /// Per-node execution timeout.
    pub node_timeout_secs: u64,
    /// Fixed RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
    pub backend: BackendConfig,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            edge_optimize: true,
            node_optimize: false,
            max_team_size: 6,
            init_connection_probability: 0.3,
            iteration_budget: 50,
            plateau_limit: 15,
            improvement_epsilon: 0.0,
            node_timeout_secs: 120,
            seed: None,
            backend: BackendConfig::Mock,
        }
    }
}

impl SwarmConfig {
    pub fn swarm_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".swarm"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::swarm_dir()?.join("swarm.toml"))
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_secs(self.node_timeout_secs)
    }

    /// Load from ~/.swarm/swarm.toml, falling back to defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        swlog_debug!("SwarmConfig::load path={}", path.display());
        if !path.exists() {
            swlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        swlog_debug!(
            "Config loaded: edge_optimize={}, node_optimize={}, budget={}, plateau={}",
            config.edge_optimize,
            config.node_optimize,
            config.iteration_budget,
            config.plateau_limit
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                swlog_debug!("Creating config directory {}", dir.display());
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        swlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.edge_optimize && !self.node_optimize {
            return Err(Error::Validation(
                "at least one of edge_optimize or node_optimize must be enabled".to_string(),
            ));
        }
        if self.max_team_size == 0 {
            return Err(Error::Validation("max_team_size must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.init_connection_probability) {
            return Err(Error::Validation(format!(
                "init_connection_probability {} is outside [0, 1]",
                self.init_connection_probability
            )));
        }
        if !self.improvement_epsilon.is_finite() || self.improvement_epsilon < 0.0 {
            return Err(Error::Validation(format!(
                "improvement_epsilon {} must be a non-negative number",
                self.improvement_epsilon
            )));
        }
        if self.node_timeout_secs == 0 {
            return Err(Error::Validation("node_timeout_secs must be positive".to_string()));
        }
        if let BackendConfig::Command { command } = &self.backend {
            if command.trim().is_empty() {
                return Err(Error::Validation("backend command is empty".to_string()));
            }
        }
        Ok(())
    }
}
