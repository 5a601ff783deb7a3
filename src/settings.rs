use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{FleetError, Result};

/// Environment variable that overrides the stored registry API key.
pub const REGISTRY_KEY_ENV: &str = "FLEETDOCS_REGISTRY_KEY";

pub const DB_FILE_NAME: &str = "fleetdocs.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default = "default_trailing_months")]
    pub trailing_months: usize,
    #[serde(default)]
    pub registry: RegistrySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub base_url: String,
    pub rpc_function: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
}

fn default_trailing_months() -> usize {
    12
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            rpc_function: "get_vehicle_details".to_string(),
            api_key: None,
            timeout_secs: 30,
            batch_size: 5,
            batch_delay_ms: 500,
        }
    }
}

impl RegistrySettings {
    /// API key from the environment, falling back to the settings file.
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var(REGISTRY_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key.clone())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            company_name: String::new(),
            trailing_months: default_trailing_months(),
            registry: RegistrySettings::default(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("fleetdocs")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("fleetdocs")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| FleetError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

pub fn get_db_path() -> PathBuf {
    get_data_dir().join(DB_FILE_NAME)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
