//! Runtime configuration.
//!
//! Sources, later wins: built-in defaults, `config.json` in the data
//! directory, then environment variables.

use crate::error::{Result, TrackerError};
use crate::stats::DEFAULT_DISPLAY_LIMIT;
use crate::storage::file_stem_for;
use crate::viz::Viewport;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Number of item groups in the history overview.
    pub display_limit: usize,
    pub chart: Viewport,
    /// Locale tag for price labels (`en`, `de`, ...).
    pub locale: String,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Never written to disk; taken from `GEMINI_API_KEY` or `API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 30,
            api_key: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            display_limit: DEFAULT_DISPLAY_LIMIT,
            chart: Viewport::default(),
            locale: "en".to_string(),
            extraction: ExtractionConfig::default(),
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    if let Some(data) = dirs::data_dir() {
        data.join("shoptrack")
    } else {
        PathBuf::from(".shoptrack")
    }
}

impl Config {
    /// Load configuration for `data_dir` (or the default/`SHOPTRACK_DATA_DIR` one).
    pub fn load(data_dir: Option<&Path>) -> Result<Self> {
        let dir = data_dir
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("SHOPTRACK_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(default_data_dir);
        let path = dir.join(CONFIG_FILE);
        let mut cfg = if path.exists() {
            let s = fs::read_to_string(&path)?;
            serde_json::from_str::<Config>(&s)
                .map_err(|e| TrackerError::Config(format!("parse {}: {e}", path.display())))?
        } else {
            Config::default()
        };
        cfg.data_dir = dir;
        cfg.apply_env(|k| std::env::var(k).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply environment overrides through `get` (injectable for tests).
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, get: F) {
        let non_empty = |k: &str| get(k).filter(|v| !v.trim().is_empty());
        if let Some(key) = non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY")) {
            self.extraction.api_key = Some(key);
        }
        if let Some(model) = non_empty("SHOPTRACK_MODEL") {
            self.extraction.model = model;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.chart.is_valid() {
            return Err(TrackerError::Config(format!(
                "chart viewport {}x{} leaves no room inside padding {}",
                self.chart.width, self.chart.height, self.chart.padding
            )));
        }
        if self.display_limit == 0 {
            return Err(TrackerError::Config("display_limit must be at least 1".into()));
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        let s = serde_json::to_string_pretty(self)?;
        fs::write(self.data_dir.join(CONFIG_FILE), s)?;
        Ok(())
    }

    pub fn auth_path(&self) -> PathBuf {
        self.data_dir.join("auth.json")
    }

    pub fn list_path(&self, user_id: &str) -> PathBuf {
        self.data_dir
            .join(format!("list_{}.json", file_stem_for(user_id)))
    }
}
