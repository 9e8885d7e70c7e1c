use chrono::Weekday;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TimetableError};
use crate::evolution::EvolutionConfig;
use crate::timegrid::{DEFAULT_SLOT_MINUTES, parse_weekday};

/// Environment variable naming an optional TOML config file.
pub const CONFIG_ENV_VAR: &str = "EXAM_TIMETABLER_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub slot_minutes: u32,
    pub excluded_weekday: String,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            slot_minutes: DEFAULT_SLOT_MINUTES,
            excluded_weekday: "Sunday".to_string(),
        }
    }
}

impl GridConfig {
    pub fn excluded_weekday(&self) -> Result<Weekday> {
        parse_weekday(&self.excluded_weekday)
    }

    pub fn validate(&self) -> Result<()> {
        if self.slot_minutes == 0 {
            return Err(TimetableError::InvalidConfig(
                "Slot duration must be at least one minute".to_string(),
            ));
        }
        self.excluded_weekday()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub grid: GridConfig,
    pub evolution: EvolutionConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        self.evolution.validate()?;
        Ok(())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Reads the file named by [`CONFIG_ENV_VAR`], or falls back to defaults.
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => {
                info!("Loading configuration from {}", path);
                Self::load_from_file(path)
            }
            Err(_) => Ok(Self::default()),
        }
    }
}
