use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use shared::validation;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub qna: QnaConfig,
    /// Known courses and their presenters. Empty means every course is accepted.
    #[serde(default)]
    pub courses: Vec<CourseEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QnaConfig {
    /// Length of generated join codes
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    /// How many fresh codes to try before giving up on a create
    #[serde(default = "default_code_attempts")]
    pub code_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseEntry {
    pub course_ref: String,
    pub presenters: Vec<String>,
    /// Empty accepts any lecture reference
    #[serde(default)]
    pub lectures: Vec<String>,
}

fn default_code_length() -> usize { 6 }
fn default_code_attempts() -> u32 { 16 }

impl QnaConfig {
    /// Generated codes must pass the same check joins apply
    pub fn validate(&self) -> Result<()> {
        if !(1..=validation::MAX_CODE_CHARS).contains(&self.code_length) {
            bail!(
                "qna.code_length must be between 1 and {}, got {}",
                validation::MAX_CODE_CHARS,
                self.code_length
            );
        }
        if self.code_attempts == 0 {
            bail!("qna.code_attempts must be at least 1");
        }
        Ok(())
    }
}

impl Default for QnaConfig {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
            code_attempts: default_code_attempts(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                path: "./data/liveqa.db".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                token_expiry_hours: 24,
            },
            qna: QnaConfig::default(),
            courses: Vec::new(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Try to load from environment variable
        if let Ok(path) = std::env::var("LIVEQA_CONFIG") {
            return Self::load_from_path(&PathBuf::from(path));
        }

        // Try to load from default locations
        let default_paths = vec![
            PathBuf::from("liveqa-server.toml"),
            PathBuf::from("config/liveqa-server.toml"),
            PathBuf::from("/etc/liveqa/server.toml"),
        ];

        for path in default_paths {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        // Return default config if no file found
        tracing::warn!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.qna.validate()?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
