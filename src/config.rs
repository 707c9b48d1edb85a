//! Configuration management for the job recommender

use crate::error::{JobbotError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    pub embedding: EmbeddingConfig,
    pub matching: MatchingConfig,
    pub preprocess: PreprocessConfig,
    pub availability: AvailabilityConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Raw scraped postings, the input of preprocessing
    pub data_jobs: PathBuf,
    pub job_offers: PathBuf,
    pub job_seekers: PathBuf,
    pub matches: PathBuf,
    /// Root of the dated embedding snapshots
    pub embeddings_dir: PathBuf,
    pub output_dir: PathBuf,
    pub models_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
    /// Maximum number of missing jobs embedded per run
    pub job_batch_cap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub excluded_companies: Vec<String>,
    pub english_threshold: f64,
    pub match_id_separator: char,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    pub recency_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityConfig {
    pub expired_tags: Vec<String>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub concurrency: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub user_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Markdown,
    Json,
    /// Plain-text listing, as printed by `recommend`
    Console,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("jobbot");

        Self {
            paths: PathsConfig {
                data_jobs: data_dir.join("data_jobs.json"),
                job_offers: data_dir.join("job_offers.json"),
                job_seekers: data_dir.join("job_seekers.json"),
                matches: data_dir.join("matches.json"),
                embeddings_dir: data_dir.join("embeddings"),
                output_dir: data_dir.join("recommendations"),
                models_dir: data_dir.join("models"),
            },
            embedding: EmbeddingConfig {
                model: "minishlab/potion-base-8M".to_string(),
                batch_size: 32,
                job_batch_cap: 500,
            },
            matching: MatchingConfig {
                excluded_companies: Vec::new(),
                english_threshold: 0.6,
                match_id_separator: '|',
            },
            preprocess: PreprocessConfig { recency_days: 7 },
            availability: AvailabilityConfig {
                expired_tags: vec![
                    "No longer accepting applications".to_string(),
                    "closed-job".to_string(),
                ],
                max_retries: 3,
                retry_delay_ms: 500,
                concurrency: 8,
                timeout_secs: 15,
            },
            output: OutputConfig {
                format: OutputFormat::Markdown,
                user_ids: Vec::new(),
            },
        }
    }
}

impl Config {
    /// Load from an explicit file, or from the default location (created on first use).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(JobbotError::Configuration(format!(
                        "Config file does not exist: {}",
                        path.display()
                    )));
                }
                Self::from_file(path)?
            }
            None => {
                let config_path = Self::config_path();
                if config_path.exists() {
                    Self::from_file(&config_path)?
                } else {
                    let config = Self::default();
                    config.save_to(&config_path)?;
                    config
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| JobbotError::Configuration(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| JobbotError::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("jobbot")
            .join("config.toml")
    }

    /// Reject settings that would make a run meaningless, before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.matching.english_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(JobbotError::Configuration(format!(
                "matching.english_threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        let separator = self.matching.match_id_separator;
        if separator.is_alphanumeric() || separator.is_whitespace() || separator == '-' || separator == '_' {
            return Err(JobbotError::Configuration(format!(
                "matching.match_id_separator '{}' may occur inside ids",
                separator
            )));
        }

        if self.embedding.batch_size == 0 {
            return Err(JobbotError::Configuration("embedding.batch_size must be positive".to_string()));
        }
        if self.embedding.job_batch_cap == 0 {
            return Err(JobbotError::Configuration("embedding.job_batch_cap must be positive".to_string()));
        }
        if self.embedding.model.trim().is_empty() {
            return Err(JobbotError::Configuration("embedding.model is empty".to_string()));
        }
        if self.preprocess.recency_days < 0 {
            return Err(JobbotError::Configuration("preprocess.recency_days must not be negative".to_string()));
        }
        if self.availability.concurrency == 0 {
            return Err(JobbotError::Configuration("availability.concurrency must be positive".to_string()));
        }

        Ok(())
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.paths.embeddings_dir)?;
        std::fs::create_dir_all(&self.paths.output_dir)?;
        std::fs::create_dir_all(&self.paths.models_dir)?;
        Ok(())
    }

    /// Rebase every store path under `root`; used for scratch workspaces.
    pub fn rooted_at(root: &Path) -> Self {
        let mut config = Self::default();
        config.paths = PathsConfig {
            data_jobs: root.join("data_jobs.json"),
            job_offers: root.join("job_offers.json"),
            job_seekers: root.join("job_seekers.json"),
            matches: root.join("matches.json"),
            embeddings_dir: root.join("embeddings"),
            output_dir: root.join("recommendations"),
            models_dir: root.join("models"),
        };
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.matching.english_threshold, 0.6);
        assert_eq!(config.matching.match_id_separator, '|');
    }

    #[test]
    fn test_round_trip_through_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::rooted_at(temp_dir.path());
        config.matching.excluded_companies = vec!["Fake Corp".to_string()];
        config.save_to(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.matching.excluded_companies, vec!["Fake Corp".to_string()]);
        assert_eq!(loaded.paths.matches, temp_dir.path().join("matches.json"));
    }

    #[test]
    fn test_missing_explicit_file_is_configuration_error() {
        let result = Config::load(Some(Path::new("does/not/exist.toml")));
        assert!(matches!(result, Err(JobbotError::Configuration(_))));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.matching.english_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.matching.match_id_separator = 'a';
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.embedding.job_batch_cap = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::from_toml("paths = 3");
        assert!(matches!(result, Err(JobbotError::Configuration(_))));
    }
}
