//! Optional `.topic-reinforcement.toml` settings.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = ".topic-reinforcement.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory holding the CSV record sources.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            verbose: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default = "default_weak_topic_limit")]
    pub weak_topic_limit: usize,
    /// Rows in the topic ranking section.
    #[serde(default = "default_top_topics")]
    pub top_topics: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            weak_topic_limit: default_weak_topic_limit(),
            top_topics: default_top_topics(),
        }
    }
}

fn default_output() -> PathBuf {
    PathBuf::from("report.md")
}

fn default_weak_topic_limit() -> usize {
    5
}

fn default_top_topics() -> usize {
    10
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Fixed "today" for schedule views; the current date when unset.
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Explicit path must exist; the default file is used only when present.
    pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.general.data_dir, PathBuf::from("data"));
        assert_eq!(config.report.weak_topic_limit, 5);
        assert_eq!(config.report.top_topics, 10);
        assert!(config.schedule.today.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [report]
            weak_topic_limit = 3

            [schedule]
            today = "2026-02-12"
            "#,
        )
        .unwrap();
        assert_eq!(config.report.weak_topic_limit, 3);
        assert_eq!(config.report.output, PathBuf::from("report.md"));
        assert_eq!(config.schedule.today, NaiveDate::from_ymd_opt(2026, 2, 12));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(Config::resolve(Some(Path::new("/nonexistent/topic.toml"))).is_err());
    }
}
