//! Configuration management for animforge
//!
//! Stores settings in ~/.config/animforge/config.json

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_ENV: &str = "XAI_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OpenAI-compatible endpoint root (`/chat/completions` is appended)
    pub api_base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Used only when XAI_API_KEY is unset
    pub api_key: Option<String>,
    /// Render attempts before the run is declared failed
    pub max_render_attempts: usize,
    pub render_timeout_secs: u64,
    pub renderer_program: String,
    pub scene_class: String,
    /// Where the renderer drops its videos, relative to the working directory
    pub videos_dir: PathBuf,
    pub output_root: PathBuf,
    /// Generate+check rounds per act in multi-pass mode
    pub act_max_attempts: usize,
    /// Checker rounds in single-pass mode
    pub checker_max_rounds: usize,
    /// Send every fix through the full-context prompt instead of the specialised fixers
    pub always_full_fix_prompt: bool,
    /// TOML file overriding built-in prompts
    pub prompts_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.x.ai/v1".to_string(),
            model: "grok-3-fast".to_string(),
            temperature: 0.3,
            api_key: None,
            max_render_attempts: 3,
            render_timeout_secs: 300,
            renderer_program: "manimgl".to_string(),
            scene_class: "GeneratedScene".to_string(),
            videos_dir: PathBuf::from("videos"),
            output_root: PathBuf::from("output"),
            act_max_attempts: 3,
            checker_max_rounds: 2,
            always_full_fix_prompt: false,
            prompts_file: None,
        }
    }
}

impl Config {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("animforge"))
    }

    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from an explicit path. Missing files give defaults; corrupt files
    /// are moved aside and also give defaults.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                let backup = preserve_corrupt_config(path, &content);
                tracing::warn!(
                    error = %err,
                    backup = %backup.display(),
                    "config file was corrupted; a backup was saved and defaults were loaded"
                );
                Self::default()
            }
        }
    }

    /// API key from XAI_API_KEY, then the config file.
    pub fn api_key(&self) -> Result<String, PipelineError> {
        resolve_api_key(std::env::var(API_KEY_ENV).ok(), self.api_key.as_deref())
            .ok_or_else(|| PipelineError::MissingApiKey(Self::config_location()))
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/animforge/config.json".to_string())
    }
}

fn resolve_api_key(env: Option<String>, configured: Option<&str>) -> Option<String> {
    env.filter(|k| !k.trim().is_empty()).or_else(|| {
        configured
            .filter(|k| !k.trim().is_empty())
            .map(str::to_string)
    })
}

fn preserve_corrupt_config(path: &Path, content: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let corrupt_path = path.with_extension(format!("json.corrupt-{}", stamp));
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
    corrupt_path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_render_attempts, 3);
        assert_eq!(config.render_timeout(), Duration::from_secs(300));
        assert_eq!(config.act_max_attempts, 3);
        assert_eq!(config.checker_max_rounds, 2);
        assert_eq!(config.scene_class, "GeneratedScene");
        assert!(!config.always_full_fix_prompt);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"model": "grok-4", "max_render_attempts": 5}"#).unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.model, "grok-4");
        assert_eq!(config.max_render_attempts, 5);
        assert_eq!(config.renderer_program, "manimgl");
    }

    #[test]
    fn test_loading_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let written = Config {
            model: "grok-4".into(),
            checker_max_rounds: 4,
            ..Config::default()
        };
        let content = serde_json::to_string_pretty(&written).unwrap();
        fs::write(&path, &content).unwrap();

        assert_eq!(Config::load_from(&path), written);
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_corrupt_file_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config, Config::default());
        assert!(!path.exists());

        let backups: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("corrupt"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(
            fs::read_to_string(backups[0].path()).unwrap(),
            "{ not json"
        );
    }

    #[test]
    fn test_api_key_precedence() {
        assert_eq!(
            resolve_api_key(Some("env-key".into()), Some("file-key")),
            Some("env-key".to_string())
        );
        assert_eq!(
            resolve_api_key(None, Some("file-key")),
            Some("file-key".to_string())
        );
        assert_eq!(
            resolve_api_key(Some("  ".into()), Some("file-key")),
            Some("file-key".to_string())
        );
        assert_eq!(resolve_api_key(None, None), None);
    }
}
