//! planchain configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlanchainConfig {
    /// Critical-failure policy.
    pub engine: EngineConfig,
    /// Reference resolution behaviour.
    pub resolver: ResolverConfig,
    /// Execution history retention.
    pub history: HistoryConfig,
    /// Default parameter values injected by plan repair.
    pub repair: RepairConfig,
    /// Built-in operation settings.
    pub ops: OpsConfig,
    /// LLM planner settings.
    pub planner: PlannerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Operations whose failure halts the rest of the plan.
    pub critical_operations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Resolve unrecognised references by substring match over context keys.
    /// Off by default: the match can hit unintended entries.
    pub fuzzy_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum retained execution results; oldest are evicted first.
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RepairConfig {
    /// operation name -> parameter name -> default value
    pub defaults: BTreeMap<String, BTreeMap<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpsConfig {
    /// Base directory for relative paths. Empty = current directory.
    pub workspace_root: PathBuf,
    /// Default deadline for `execute_command`.
    pub command_timeout_secs: u64,
    /// Directory (relative to the workspace) where `send_email` spools messages.
    pub outbox_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlannerConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

// ============================================================
// Defaults
// ============================================================

impl Default for PlanchainConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            resolver: ResolverConfig::default(),
            history: HistoryConfig::default(),
            repair: RepairConfig::default(),
            ops: OpsConfig::default(),
            planner: PlannerConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            critical_operations: [
                "read_csv",
                "read_file",
                "read_json",
                "fetch_web_page",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_fallback: false,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

impl Default for RepairConfig {
    fn default() -> Self {
        let mut defaults = BTreeMap::new();
        defaults.insert(
            "send_email".to_string(),
            BTreeMap::from([
                ("to_email".to_string(), Value::from("ops@localhost")),
                ("subject".to_string(), Value::from("Automated Email")),
                (
                    "body".to_string(),
                    Value::from("This is an automated email."),
                ),
            ]),
        );
        defaults.insert(
            "read_csv".to_string(),
            BTreeMap::from([("file_path".to_string(), Value::from("data/sample.csv"))]),
        );
        defaults.insert(
            "read_file".to_string(),
            BTreeMap::from([("file_path".to_string(), Value::from("data/sample.txt"))]),
        );
        Self { defaults }
    }
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::new(),
            command_timeout_secs: 30,
            outbox_dir: "outbox".into(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            model: "claude-opus-4-6".into(),
            max_tokens: 1024,
            temperature: 0.3,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl PlanchainConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} - using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} - using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Strict variant of [`load`](Self::load): parse errors are returned.
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// `~/.planchain/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".planchain")
            .join("config.toml")
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
