//! Companion configuration
//!
//! Defaults come from the environment; a JSON file can override any
//! field. The API key is never serialized back out.

use crate::llm::LlmConfig;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_TOPICS: [&str; 6] = ["music", "food", "travel", "games", "movies", "sports"];

pub const DEFAULT_ALPHA: f64 = 0.1;

/// Turns of history folded into the selection context
pub const DEFAULT_CONTEXT_TURNS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// Topic labels, in arm order
    pub topics: Vec<String>,

    /// Exploration weight for the bandit
    pub alpha: f64,

    /// History turns used when building the selection context
    pub context_turns: usize,

    /// Persona prompt for reply generation
    pub persona: String,

    pub llm: LlmConfig,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        let topics = std::env::var("RECOMATE_TOPICS")
            .ok()
            .map(|raw| parse_topics(&raw))
            .filter(|topics| !topics.is_empty())
            .unwrap_or_else(|| DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect());

        let alpha = std::env::var("RECOMATE_ALPHA")
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(DEFAULT_ALPHA);

        Self {
            topics,
            alpha,
            context_turns: DEFAULT_CONTEXT_TURNS,
            persona: "You are a friendly companion who chats casually and warmly.".to_string(),
            llm: LlmConfig::default(),
        }
    }
}

impl CompanionConfig {
    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: CompanionConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.topics.is_empty() {
            bail!("config must list at least one topic");
        }
        if let Some(blank) = self.topics.iter().position(|t| t.trim().is_empty()) {
            bail!("topic {} is blank", blank);
        }
        if !self.alpha.is_finite() {
            bail!("alpha must be a finite number");
        }
        Ok(())
    }
}

fn parse_topics(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_topics() {
        assert_eq!(parse_topics(" music, food ,,anime "), vec!["music", "food", "anime"]);
        assert!(parse_topics(" , ").is_empty());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recomate.json");
        let json = r#"{"topics": ["books", "cats"], "alpha": 0.3, "llm": {"model": "tiny"}}"#;
        std::fs::write(&path, json).unwrap();

        let config = CompanionConfig::load(&path).unwrap();
        assert_eq!(config.topics, vec!["books", "cats"]);
        assert_eq!(config.alpha, 0.3);
        assert_eq!(config.context_turns, DEFAULT_CONTEXT_TURNS);
        assert_eq!(config.llm.model, "tiny");
        assert_eq!(config.llm.max_tokens, LlmConfig::default().max_tokens);
    }

    #[test]
    fn test_load_rejects_empty_topics() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recomate.json");
        std::fs::write(&path, r#"{"topics": []}"#).unwrap();
        assert!(CompanionConfig::load(&path).is_err());

        std::fs::write(&path, r#"{"topics": ["ok", "  "]}"#).unwrap();
        assert!(CompanionConfig::load(&path).is_err());
    }

    #[test]
    fn test_load_reports_bad_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recomate.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = CompanionConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
        assert!(CompanionConfig::load(&dir.path().join("missing.json")).is_err());
    }
}
