//! Session configuration loaded from YAML

use std::path::Path;

use serde::{Deserialize, Serialize};

use recall_core::{CompletionOptions, RecallError, Result};
use recall_memory::MemoryConfig;
use recall_storage::StorageConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallConfig {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub completion: CompletionOptions,
}

fn default_name() -> String {
    "recall".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant. Use the earlier conversation provided to you when it is relevant."
        .to_string()
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            system_prompt: default_system_prompt(),
            memory: MemoryConfig::default(),
            storage: StorageConfig::default(),
            completion: CompletionOptions::default(),
        }
    }
}

impl RecallConfig {
    pub fn from_yaml(yaml_content: &str) -> Result<Self> {
        let config: RecallConfig = serde_yaml::from_str(yaml_content)
            .map_err(|e| RecallError::Config(format!("invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| RecallError::Config(e.to_string()))
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RecallError::Config("name cannot be empty".to_string()));
        }
        self.memory.validate()?;
        if let StorageConfig::File { path } = &self.storage {
            if path.trim().is_empty() {
                return Err(RecallError::Config(
                    "storage.path cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Completion options clamped into the provider's accepted ranges.
    pub fn completion_options(&self) -> CompletionOptions {
        self.completion.clone().validated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_memory::PeriodGranularity;

    #[test]
    fn test_config_minimal() {
        let config = RecallConfig::from_yaml("name: assistant\n").unwrap();
        assert_eq!(config.name, "assistant");
        assert_eq!(config.memory.short_term_limit, 10);
        assert_eq!(config.storage, StorageConfig::None);
        assert!(config.completion.stream);
    }

    #[test]
    fn test_config_full() {
        let yaml = r#"
name: barista
system_prompt: You recommend coffee.
memory:
  short_term_limit: 6
  eviction_batch_size: 3
  recent_window: 4
  relevance_limit: 2
  token_budget:
    total: 3000
    warn_at_percent: 90
  summarizer:
    granularity: week
storage:
  type: file
  path: ./data
completion:
  temperature: 0.2
  max_tokens: 512
  stream: false
"#;
        let config = RecallConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.system_prompt, "You recommend coffee.");
        assert_eq!(config.memory.short_term_limit, 6);
        assert_eq!(config.memory.token_budget.warn_at_percent, 90);
        assert_eq!(config.memory.summarizer.granularity, PeriodGranularity::Week);
        assert_eq!(config.storage, StorageConfig::file("./data"));
        assert!(!config.completion.stream);
        assert_eq!(config.completion.top_p, 0.9);
    }

    #[test]
    fn test_config_round_trip() {
        let config = RecallConfig::default().with_storage(StorageConfig::file("/tmp/recall"));
        let yaml = config.to_yaml().unwrap();
        let parsed = RecallConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_config_validation() {
        assert!(RecallConfig::from_yaml("memory:\n  short_term_limit: 0\n").is_err());
        assert!(RecallConfig::from_yaml("name: ''\n").is_err());
        assert!(RecallConfig::from_yaml("storage:\n  type: file\n  path: ''\n").is_err());
        assert!(matches!(
            RecallConfig::from_yaml("memory: [1, 2]"),
            Err(RecallError::Config(_))
        ));
    }

    #[test]
    fn test_completion_options_clamped() {
        let yaml = r#"
completion:
  temperature: 5.0
  max_tokens: 100000
  top_p: -1.0
"#;
        let options = RecallConfig::from_yaml(yaml).unwrap().completion_options();
        assert_eq!(options.temperature, 2.0);
        assert_eq!(options.max_tokens, 4000);
        assert_eq!(options.top_p, 0.0);
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("recall.yaml");
        std::fs::write(&path, "name: from-file\n").unwrap();
        assert_eq!(RecallConfig::from_yaml_file(&path).unwrap().name, "from-file");
        assert!(RecallConfig::from_yaml_file(dir.path().join("missing.yaml")).is_err());
    }
}
