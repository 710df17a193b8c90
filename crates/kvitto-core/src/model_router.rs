//! Model Router for task-based model selection
//!
//! Routes the three workflow calls (vision extraction, classification,
//! revision) to configured models and holds the ordered list of vision
//! alternates used when a reviewer asks for a different extraction model.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/kvitto/config/models.toml)
//! 2. Fall back to embedded defaults (compiled into binary)

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/models.toml");

/// Task types for model routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    /// Receipt image to draft fields
    Vision,
    /// Pick a category for a draft
    Classification,
    /// Apply reviewer instructions to a draft
    Revision,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vision => "vision",
            Self::Classification => "classification",
            Self::Revision => "revision",
        }
    }

    pub fn all() -> &'static [TaskType] {
        &[Self::Vision, Self::Classification, Self::Revision]
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "vision" => Ok(Self::Vision),
            "classification" => Ok(Self::Classification),
            "revision" => Ok(Self::Revision),
            _ => Err(format!("Unknown task type: {}", s)),
        }
    }
}

/// Configuration for a specific task type
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub model: String,
    /// Timeout for API calls
    pub timeout: Duration,
}

/// Router configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Default model for all task types
    pub default_model: String,
    pub default_timeout: Duration,
    pub tasks: HashMap<TaskType, TaskConfig>,
    /// Vision models offered, in order, on a change-model request
    pub vision_alternates: Vec<String>,
    /// How long a review prompt may wait for an answer
    pub review_timeout: Option<Duration>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_model: "llama3.2".to_string(),
            default_timeout: Duration::from_secs(30),
            tasks: HashMap::new(),
            vision_alternates: Vec::new(),
            review_timeout: None,
        }
    }
}

/// Model Router for task-based model selection
#[derive(Debug, Clone)]
pub struct ModelRouter {
    config: RouterConfig,
    config_path: Option<PathBuf>,
}

impl ModelRouter {
    /// Create a new model router with default configuration
    pub fn new() -> Result<Self> {
        let config = load_config(None)?;
        Ok(Self {
            config,
            config_path: default_config_path(),
        })
    }

    /// Create with a custom config path
    pub fn with_config_path(path: PathBuf) -> Result<Self> {
        let config = load_config(Some(&path))?;
        Ok(Self {
            config,
            config_path: Some(path),
        })
    }

    /// Create with an explicit configuration (for testing)
    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            config,
            config_path: None,
        }
    }

    /// Get the model to use for a task type
    pub fn model_for_task(&self, task: TaskType) -> &str {
        self.config
            .tasks
            .get(&task)
            .map(|c| c.model.as_str())
            .unwrap_or(&self.config.default_model)
    }

    /// Get the timeout for a task
    pub fn timeout_for_task(&self, task: TaskType) -> Duration {
        self.config
            .tasks
            .get(&task)
            .map(|c| c.timeout)
            .unwrap_or(self.config.default_timeout)
    }

    /// Pick the vision model to try after `current`
    ///
    /// Walks the alternates list cyclically starting after `current`. Returns
    /// `None` when there is no model other than `current` to offer.
    pub fn next_vision_model(&self, current: &str) -> Option<&str> {
        let mut candidates: Vec<&str> = self
            .config
            .vision_alternates
            .iter()
            .map(String::as_str)
            .collect();
        let primary = self.model_for_task(TaskType::Vision);
        if !candidates.contains(&primary) {
            candidates.insert(0, primary);
        }

        let start = candidates
            .iter()
            .position(|m| *m == current)
            .map(|i| i + 1)
            .unwrap_or(0);

        (0..candidates.len())
            .map(|offset| candidates[(start + offset) % candidates.len()])
            .find(|m| *m != current)
    }

    pub fn review_timeout(&self) -> Option<Duration> {
        self.config.review_timeout
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Get the config path (if using file-based config)
    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config_path.as_ref()
    }

    /// Reload configuration from disk
    pub fn reload(&mut self) -> Result<()> {
        self.config = load_config(self.config_path.as_ref())?;
        Ok(())
    }
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self::with_config(RouterConfig::default()))
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("kvitto").join("config").join("models.toml"))
}

/// Load configuration (override first, then default)
fn load_config(override_path: Option<&PathBuf>) -> Result<RouterConfig> {
    let path = override_path.cloned().or_else(default_config_path);

    let content = match path {
        Some(path) if path.exists() => fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?,
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    defaults: Option<RawDefaults>,
    models: Option<HashMap<String, RawTaskConfig>>,
    vision: Option<RawVision>,
    workflow: Option<RawWorkflow>,
}

#[derive(Debug, Deserialize)]
struct RawDefaults {
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawTaskConfig {
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawVision {
    #[serde(default)]
    alternates: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawWorkflow {
    review_timeout_secs: Option<u64>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<RouterConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = RouterConfig::default();

    if let Some(defaults) = raw.defaults {
        if let Some(model) = defaults.model {
            config.default_model = model;
        }
        if let Some(timeout) = defaults.timeout_secs {
            config.default_timeout = Duration::from_secs(timeout);
        }
    }

    if let Some(models) = raw.models {
        for (task_name, task_config) in models {
            let Ok(task) = task_name.parse::<TaskType>() else {
                tracing::warn!(task = %task_name, "Skipping unknown task type in model config");
                continue;
            };

            config.tasks.insert(
                task,
                TaskConfig {
                    model: task_config
                        .model
                        .unwrap_or_else(|| config.default_model.clone()),
                    timeout: task_config
                        .timeout_secs
                        .map(Duration::from_secs)
                        .unwrap_or(config.default_timeout),
                },
            );
        }
    }

    if let Some(vision) = raw.vision {
        config.vision_alternates = vision.alternates;
    }

    if let Some(workflow) = raw.workflow {
        config.review_timeout = workflow
            .review_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.default_model, "llama3.2");
        assert!(config.tasks.contains_key(&TaskType::Vision));
        assert!(!config.vision_alternates.is_empty());
        assert_eq!(config.review_timeout, Some(Duration::from_secs(900)));
    }

    #[test]
    fn test_router_model_selection() {
        let router = ModelRouter::with_config(parse_config(DEFAULT_CONFIG).unwrap());

        assert_eq!(router.model_for_task(TaskType::Vision), "llama3.2-vision:11b");
        assert_eq!(router.model_for_task(TaskType::Classification), "llama3.2");
        assert!(router.timeout_for_task(TaskType::Vision) > Duration::from_secs(30));
        assert_eq!(
            router.timeout_for_task(TaskType::Classification),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_next_vision_model_cycles() {
        let router = ModelRouter::with_config(RouterConfig {
            tasks: HashMap::from([(
                TaskType::Vision,
                TaskConfig {
                    model: "a".to_string(),
                    timeout: Duration::from_secs(1),
                },
            )]),
            vision_alternates: vec!["a".into(), "b".into(), "c".into()],
            ..Default::default()
        });

        assert_eq!(router.next_vision_model("a"), Some("b"));
        assert_eq!(router.next_vision_model("c"), Some("a"));
        // Models outside the list start from the top
        assert_eq!(router.next_vision_model("gpt-4o"), Some("a"));
    }

    #[test]
    fn test_next_vision_model_without_alternatives() {
        let router = ModelRouter::with_config(RouterConfig {
            tasks: HashMap::from([(
                TaskType::Vision,
                TaskConfig {
                    model: "only".to_string(),
                    timeout: Duration::from_secs(1),
                },
            )]),
            ..Default::default()
        });

        assert_eq!(router.next_vision_model("only"), None);
        assert_eq!(router.next_vision_model("other"), Some("only"));
    }

    #[test]
    fn test_zero_review_timeout_disables() {
        let config = parse_config("[workflow]\nreview_timeout_secs = 0\n").unwrap();
        assert_eq!(config.review_timeout, None);
    }

    #[test]
    fn test_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.toml");
        std::fs::write(&path, "[models.vision]\nmodel = \"llava\"\n").unwrap();

        let router = ModelRouter::with_config_path(path).unwrap();
        assert_eq!(router.model_for_task(TaskType::Vision), "llava");
        assert_eq!(router.review_timeout(), None);
    }
}
