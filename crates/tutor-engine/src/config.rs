//! Configuration types for the adaptive tutor.
//!
//! This module provides the `tutor.json` configuration: where learning
//! state is persisted, which selection policy the session uses, and how the
//! external question generator is reached.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};
use crate::generator::{HttpGenerator, OfflineGenerator, QuestionGenerator};
use crate::selector::{SelectionPolicy, DEFAULT_CANDIDATE_POOL};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "tutor.json";

/// Default key under which the learning state snapshot is stored.
fn default_session_key() -> String {
    "learningState".to_string()
}

/// Default directory for the file-backed store.
fn default_state_dir() -> String {
    ".tutor".to_string()
}

/// Default candidate pool size for the random policy.
const fn default_candidate_pool_size() -> usize {
    DEFAULT_CANDIDATE_POOL
}

/// Default generator request timeout in seconds.
const fn default_generator_timeout() -> u32 {
    20
}

/// Default output directory for reports.
fn default_output_dir() -> String {
    ".".to_string()
}

/// Main configuration for the tutor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Key of the persisted learning state snapshot.
    #[serde(default = "default_session_key")]
    pub session_key: String,

    /// Directory holding persisted snapshots.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// How the next skill is chosen. Fixed for the lifetime of a session.
    #[serde(default)]
    pub selection_policy: PolicyKind,

    /// Number of weakest skills eligible under the random policy.
    #[serde(default = "default_candidate_pool_size")]
    pub candidate_pool_size: usize,

    /// External question generator settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Output directory for generated reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_key: default_session_key(),
            state_dir: default_state_dir(),
            selection_policy: PolicyKind::default(),
            candidate_pool_size: default_candidate_pool_size(),
            generator: GeneratorConfig::default(),
            output_dir: default_output_dir(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `tutor.json` in the current directory. If not found, returns
    /// the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            TutorError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `tutor.json` in a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::ConfigParseError` if the file exists but contains
    /// invalid JSON or invalid enum values.
    ///
    /// Returns `TutorError::ConfigValidationError` if the configuration values
    /// are out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(TutorError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| TutorError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::ConfigValidationError` if any check fails.
    pub fn validate(&self) -> Result<()> {
        let key = self.session_key.trim();
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(TutorError::config_validation(
                "sessionKey must be a non-empty plain name",
                "Set sessionKey to a name such as \"learningState\" in your tutor.json",
            ));
        }

        if self.state_dir.trim().is_empty() {
            return Err(TutorError::config_validation(
                "stateDir must not be empty",
                "Provide a state directory in your tutor.json (for example \".tutor\")",
            ));
        }

        if self.candidate_pool_size == 0 {
            return Err(TutorError::config_validation(
                "candidatePoolSize must be greater than 0",
                "Set candidatePoolSize to at least 1 in your tutor.json",
            ));
        }

        if self.generator.timeout_seconds == 0 {
            return Err(TutorError::config_validation(
                "generator.timeoutSeconds must be greater than 0",
                "Set generator.timeoutSeconds to at least 1 second in your tutor.json",
            ));
        }

        if let Some(endpoint) = &self.generator.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(TutorError::config_validation(
                    format!("generator.endpoint '{endpoint}' is not an http(s) URL"),
                    "Use a full URL such as \"http://localhost:8787/generate\", or remove generator.endpoint to run offline",
                ));
            }
        }

        if self.output_dir.trim().is_empty() {
            return Err(TutorError::config_validation(
                "outputDir must not be empty",
                "Provide a valid output directory path in your tutor.json (use '.' for current directory)",
            ));
        }

        Ok(())
    }

    /// The selection policy this configuration describes.
    #[must_use]
    pub const fn selection_policy(&self) -> SelectionPolicy {
        match self.selection_policy {
            PolicyKind::WeakestFirst => SelectionPolicy::WeakestFirst,
            PolicyKind::RandomAmongWeakest => SelectionPolicy::RandomAmongWeakest {
                pool: self.candidate_pool_size,
            },
        }
    }

    /// Directory holding persisted snapshots.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        PathBuf::from(&self.state_dir)
    }
}

/// Named selection policies accepted in `tutor.json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PolicyKind {
    /// Deterministic weakest-skill selection (default).
    #[default]
    WeakestFirst,
    /// Uniform choice among the weakest skills.
    RandomAmongWeakest,
}

impl PolicyKind {
    /// Parses a string into a `PolicyKind`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "weakest_first" => Some(Self::WeakestFirst),
            "random_among_weakest" => Some(Self::RandomAmongWeakest),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for PolicyKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid selection policy '{s}': expected one of 'weakest_first', 'random_among_weakest'"
            ))
        })
    }
}

impl Serialize for PolicyKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::WeakestFirst => "weakest_first",
            Self::RandomAmongWeakest => "random_among_weakest",
        };
        serializer.serialize_str(s)
    }
}

/// External question generator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    /// URL questions are requested from. Absent means offline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_generator_timeout")]
    pub timeout_seconds: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_seconds: default_generator_timeout(),
        }
    }
}

impl GeneratorConfig {
    /// Builds the generator these settings describe.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn build(&self) -> Result<Arc<dyn QuestionGenerator>> {
        match &self.endpoint {
            Some(endpoint) => Ok(Arc::new(HttpGenerator::new(
                endpoint.clone(),
                Duration::from_secs(u64::from(self.timeout_seconds)),
            )?)),
            None => Ok(Arc::new(OfflineGenerator)),
        }
    }
}
