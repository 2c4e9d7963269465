use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

const ENV_FILE: &str = ".env";
const DB_PATH_VAR: &str = "FIGHT_SETTLEMENT_DB";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub progression: ProgressionConfig,
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Write logs here instead of stderr.
    #[serde(default)]
    pub log_file: Option<String>,
}

fn default_db_path() -> String {
    "fight-settlement.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            log_file: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Minimum participation (whole percent) before positive ROI earns stars.
    pub participation_threshold_pct: u32,
    /// ROI above this percentage earns two stars instead of one.
    pub strong_roi_pct: f64,
    pub max_stars: f64,
    pub login_bonus_cap: f64,
    /// Logins in the window needed to earn the full bonus.
    pub logins_for_full_bonus: u32,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            participation_threshold_pct: 70,
            strong_roi_pct: 15.0,
            max_stars: 5.0,
            login_bonus_cap: 0.25,
            logins_for_full_bonus: 8,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LeaderboardConfig {
    pub accuracy_weight: f64,
    pub recent_accuracy_weight: f64,
    pub participation_weight: f64,
    /// How many of the latest completed events count as "recent form".
    pub recent_event_count: u32,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            accuracy_weight: 0.60,
            recent_accuracy_weight: 0.25,
            participation_weight: 0.15,
            recent_event_count: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BatchConfig {
    /// Users processed concurrently by the progression and snapshot jobs.
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .with_context(|| "Failed to parse config TOML")?;
        Ok(config)
    }

    /// Missing config file falls back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load .env file into process environment. Real env vars take precedence.
    pub fn load_env_file() {
        let path = Path::new(ENV_FILE);
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };
        // Strip BOM if present (common on Windows-created files)
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        for line in content.lines() {
            let line = line.trim().trim_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"').trim_matches('\'');
                if std::env::var(key).is_err() {
                    std::env::set_var(key, value);
                }
            }
        }
    }

    /// Database path, with `FIGHT_SETTLEMENT_DB` taking precedence over the file.
    pub fn database_path(&self) -> String {
        match std::env::var(DB_PATH_VAR) {
            Ok(p) if !p.trim().is_empty() => p.trim().to_string(),
            _ => self.database.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parses() {
        let config = Config::load(Path::new("config.toml")).unwrap();
        assert_eq!(config.progression.participation_threshold_pct, 70);
        assert_eq!(config.progression.logins_for_full_bonus, 8);
        assert_eq!(config.leaderboard.recent_event_count, 3);
        assert!((config.leaderboard.accuracy_weight - 0.60).abs() < f64::EPSILON);
        assert!(config.batch.max_concurrency >= 1);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.database.path, "fight-settlement.db");
        assert_eq!(config.progression.max_stars, 5.0);
        assert_eq!(config.batch.max_concurrency, 4);
    }

    #[test]
    fn test_partial_section_fills_defaults() {
        let config = Config::parse("[progression]\nstrong_roi_pct = 20.0\n").unwrap();
        assert_eq!(config.progression.strong_roi_pct, 20.0);
        assert_eq!(config.progression.participation_threshold_pct, 70);
    }

    #[test]
    fn test_bad_toml_is_error() {
        assert!(Config::parse("[progression\n").is_err());
    }
}
