//! Configuration management
//!
//! Workspace location, text-generation settings and quiz quality limits,
//! persisted as TOML in the platform config directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides `workspace.dir`
pub const WORKSPACE_ENV: &str = "LEARNMAP_WORKSPACE";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    /// Text generation endpoint and models
    #[serde(default)]
    pub llm: LlmConfig,
    /// Quiz sizing and quality thresholds
    #[serde(default)]
    pub quiz: QuizConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root directory for the concept map and generated material
    #[serde(default = "default_workspace_dir")]
    pub dir: PathBuf,
    /// Concept map file name inside `dir`
    #[serde(default = "default_map_file")]
    pub map_file: String,
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("workspace")
}

fn default_map_file() -> String {
    "concept_map.json".to_string()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self { dir: default_workspace_dir(), map_file: default_map_file() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model for maps and quizzes
    #[serde(default = "default_model")]
    pub model: String,
    /// Model for long-form explanations
    #[serde(default = "default_explain_model")]
    pub explain_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Environment variable checked first for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_explain_model() -> String {
    "deepseek-reasoner".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_api_key_env() -> String {
    "DEEPSEEK_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            explain_model: default_explain_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizConfig {
    /// Minimum evenness score (0..1) before a quiz is rebalanced
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,
    /// Allowed deviation of a position's share from 25%
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_min_questions")]
    pub min_questions: usize,
    #[serde(default = "default_max_questions")]
    pub max_questions: usize,
    /// Generation requests before giving up on invalid output
    #[serde(default = "default_generation_attempts")]
    pub generation_attempts: u32,
}

fn default_quality_threshold() -> f64 {
    crate::quiz::quality::DEFAULT_THRESHOLD
}

fn default_tolerance() -> f64 {
    crate::quiz::quality::DEFAULT_TOLERANCE
}

fn default_min_questions() -> usize {
    3
}

fn default_max_questions() -> usize {
    50
}

fn default_generation_attempts() -> u32 {
    3
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            quality_threshold: default_quality_threshold(),
            tolerance: default_tolerance(),
            min_questions: default_min_questions(),
            max_questions: default_max_questions(),
            generation_attempts: default_generation_attempts(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load from `path`, writing defaults there if it does not exist yet
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Apply `LEARNMAP_WORKSPACE`, then an explicit CLI override
    pub fn apply_overrides(&mut self, env_workspace: Option<String>, cli_workspace: Option<PathBuf>) {
        if let Some(dir) = env_workspace.filter(|d| !d.trim().is_empty()) {
            self.workspace.dir = PathBuf::from(dir);
        }
        if let Some(dir) = cli_workspace {
            self.workspace.dir = dir;
        }
    }

    pub fn map_path(&self) -> PathBuf {
        self.workspace.dir.join(&self.workspace.map_file)
    }

    pub fn render(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_else(|e| format!("<unserializable config: {}>", e))
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "learnmap", "learnmap")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.workspace.dir, PathBuf::from("workspace"));
        assert_eq!(config.map_path(), PathBuf::from("workspace").join("concept_map.json"));
        assert_eq!(config.llm.model, "deepseek-chat");
        assert_eq!(config.quiz.quality_threshold, 0.7);
        assert_eq!(config.quiz.min_questions, 3);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[quiz]\nmin_questions = 5\n").unwrap();
        assert_eq!(config.quiz.min_questions, 5);
        assert_eq!(config.quiz.max_questions, 50);
        assert_eq!(config.llm, LlmConfig::default());
    }

    #[test]
    fn test_load_writes_defaults_then_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config, Config::default());

        let mut changed = config.clone();
        changed.llm.temperature = 0.3;
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), changed);
    }

    #[test]
    fn test_overrides_precedence() {
        let mut config = Config::default();
        config.apply_overrides(Some("/env/ws".into()), None);
        assert_eq!(config.workspace.dir, PathBuf::from("/env/ws"));
        config.apply_overrides(Some("/env/ws".into()), Some(PathBuf::from("/cli/ws")));
        assert_eq!(config.workspace.dir, PathBuf::from("/cli/ws"));
        let mut blank = Config::default();
        blank.apply_overrides(Some("  ".into()), None);
        assert_eq!(blank.workspace.dir, PathBuf::from("workspace"));
    }
}
