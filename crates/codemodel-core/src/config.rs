use crate::CodeModelError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for CodeModelError {
    fn from(err: ConfigError) -> Self {
        CodeModelError::Config(err.to_string())
    }
}

/// Main configuration for CodeModel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct CodeModelConfig {
    /// Traversal bounds for the dependency and data-flow tracers
    #[serde(default)]
    pub traversal: TraversalConfig,

    /// Weights for the composite complexity score
    #[serde(default)]
    pub complexity: ComplexityConfig,

    /// Pattern catalog tuning
    #[serde(default)]
    pub patterns: PatternConfig,

    /// Refactoring advisor thresholds
    #[serde(default)]
    pub refactoring: RefactoringConfig,

    /// Semantic search index settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TraversalConfig {
    /// Largest depth accepted by dependency analysis
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum number of hops reported by a data-flow trace
    #[serde(default = "default_max_flow_length")]
    pub max_flow_length: usize,

    /// Hops followed from a test when looking for indirect coverage
    #[serde(default = "default_coverage_depth")]
    pub coverage_depth: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_flow_length: default_max_flow_length(),
            coverage_depth: default_coverage_depth(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComplexityConfig {
    #[serde(default = "default_branch_weight")]
    pub branch_weight: f64,

    #[serde(default = "default_nesting_weight")]
    pub nesting_weight: f64,

    #[serde(default = "default_fan_out_weight")]
    pub fan_out_weight: f64,

    /// Threshold used when a request does not carry one
    #[serde(default = "default_complexity_threshold")]
    pub default_threshold: f64,
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            branch_weight: default_branch_weight(),
            nesting_weight: default_nesting_weight(),
            fan_out_weight: default_fan_out_weight(),
            default_threshold: default_complexity_threshold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PatternConfig {
    /// Matches scoring below this confidence are dropped
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Member count from which a class is reported as a God Object
    #[serde(default = "default_god_object_min_members")]
    pub god_object_min_members: usize,

    /// Distinct outgoing collaborators from which a class is reported as a God Object
    #[serde(default = "default_god_object_min_fan_out")]
    pub god_object_min_fan_out: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            god_object_min_members: default_god_object_min_members(),
            god_object_min_fan_out: default_god_object_min_fan_out(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RefactoringConfig {
    #[serde(default = "default_complexity_threshold")]
    pub complexity_threshold: f64,

    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,

    /// Base severity of an "add tests" suggestion
    #[serde(default = "default_uncovered_severity")]
    pub uncovered_severity: f64,
}

impl Default for RefactoringConfig {
    fn default() -> Self {
        Self {
            complexity_threshold: default_complexity_threshold(),
            max_suggestions: default_max_suggestions(),
            uncovered_severity: default_uncovered_severity(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    /// Exact brute-force cosine scan
    #[default]
    Flat,
    /// Random-hyperplane buckets with exact re-ranking of candidates
    Bucketed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchConfig {
    /// Embedding dimension (384 for all-MiniLM)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    #[serde(default = "default_search_limit")]
    pub default_limit: usize,

    #[serde(default = "default_max_search_limit")]
    pub max_limit: usize,

    #[serde(default)]
    pub index: IndexMode,

    /// Number of random hyperplanes (bits per bucket signature)
    #[serde(default = "default_hyperplanes")]
    pub hyperplanes: usize,

    /// Hamming radius of buckets probed around the query bucket
    #[serde(default = "default_probe_radius")]
    pub probe_radius: usize,

    /// Seed for the hyperplane generator; fixed so bucket layout is reproducible
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Batch size for embedding generation
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            dimension: default_embedding_dimension(),
            default_limit: default_search_limit(),
            max_limit: default_max_search_limit(),
            index: IndexMode::default(),
            hyperplanes: default_hyperplanes(),
            probe_radius: default_probe_radius(),
            seed: default_seed(),
            batch_size: default_batch_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_max_depth() -> usize {
    10
}
fn default_max_flow_length() -> usize {
    256
}
fn default_coverage_depth() -> usize {
    2
}
fn default_branch_weight() -> f64 {
    1.0
}
fn default_nesting_weight() -> f64 {
    2.0
}
fn default_fan_out_weight() -> f64 {
    0.5
}
fn default_complexity_threshold() -> f64 {
    10.0
}
fn default_min_confidence() -> f64 {
    0.5
}
fn default_god_object_min_members() -> usize {
    20
}
fn default_god_object_min_fan_out() -> usize {
    15
}
fn default_max_suggestions() -> usize {
    50
}
fn default_uncovered_severity() -> f64 {
    0.4
}
fn default_embedding_dimension() -> usize {
    384
}
fn default_search_limit() -> usize {
    10
}
fn default_max_search_limit() -> usize {
    100
}
fn default_hyperplanes() -> usize {
    8
}
fn default_probe_radius() -> usize {
    1
}
fn default_seed() -> u64 {
    42
}
fn default_batch_size() -> usize {
    32
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration manager with layered sources
pub struct ConfigManager {
    config: CodeModelConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (.codemodel.toml, then ~/.codemodel/config.toml)
    /// 3. Defaults
    pub fn load() -> Result<Self, ConfigError> {
        info!("Loading CodeModel configuration");

        Self::load_dotenv();

        let (config, config_path) = Self::load_config_file()?;
        let config = Self::apply_env_overrides(config, |key| std::env::var(key).ok());
        Self::validate_config(&config)?;

        match config_path {
            Some(ref path) => info!(path = %path.display(), "Configuration loaded"),
            None => info!("Configuration loaded from defaults"),
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Build from an in-memory TOML document (embedding hosts, tests)
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CodeModelConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    /// Load a specific file; environment variables are not consulted
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let config = Self::read_toml_file(path)?;
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: Some(path.to_path_buf()),
        })
    }

    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
        }
    }

    fn load_config_file() -> Result<(CodeModelConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".codemodel.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".codemodel").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((CodeModelConfig::default(), None))
    }

    fn read_toml_file(path: &Path) -> Result<CodeModelConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Apply `CODEMODEL_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(mut config: CodeModelConfig, lookup: F) -> CodeModelConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(value: Option<String>, key: &str) -> Option<T> {
            let raw = value?;
            match raw.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(key, value = %raw, "Ignoring unparsable environment override");
                    None
                }
            }
        }

        if let Some(depth) = parsed(lookup("CODEMODEL_MAX_DEPTH"), "CODEMODEL_MAX_DEPTH") {
            config.traversal.max_depth = depth;
        }
        if let Some(len) = parsed(
            lookup("CODEMODEL_MAX_FLOW_LENGTH"),
            "CODEMODEL_MAX_FLOW_LENGTH",
        ) {
            config.traversal.max_flow_length = len;
        }
        if let Some(depth) = parsed(lookup("CODEMODEL_COVERAGE_DEPTH"), "CODEMODEL_COVERAGE_DEPTH")
        {
            config.traversal.coverage_depth = depth;
        }
        if let Some(threshold) = parsed(
            lookup("CODEMODEL_COMPLEXITY_THRESHOLD"),
            "CODEMODEL_COMPLEXITY_THRESHOLD",
        ) {
            config.complexity.default_threshold = threshold;
            config.refactoring.complexity_threshold = threshold;
        }
        if let Some(confidence) = parsed(
            lookup("CODEMODEL_MIN_PATTERN_CONFIDENCE"),
            "CODEMODEL_MIN_PATTERN_CONFIDENCE",
        ) {
            config.patterns.min_confidence = confidence;
        }
        if let Some(dimension) = parsed(
            lookup("CODEMODEL_EMBEDDING_DIMENSION"),
            "CODEMODEL_EMBEDDING_DIMENSION",
        ) {
            config.search.dimension = dimension;
        }
        if let Some(mode) = lookup("CODEMODEL_SEARCH_INDEX") {
            match mode.to_lowercase().as_str() {
                "flat" => config.search.index = IndexMode::Flat,
                "bucketed" => config.search.index = IndexMode::Bucketed,
                other => warn!(value = other, "Ignoring unknown CODEMODEL_SEARCH_INDEX"),
            }
        }
        if let Some(limit) = parsed(
            lookup("CODEMODEL_SEARCH_MAX_LIMIT"),
            "CODEMODEL_SEARCH_MAX_LIMIT",
        ) {
            config.search.max_limit = limit;
        }
        if let Some(level) = lookup("CODEMODEL_LOG_LEVEL") {
            config.logging.level = level.to_lowercase();
        }
        if let Some(format) = lookup("CODEMODEL_LOG_FORMAT") {
            config.logging.format = format.to_lowercase();
        }

        config
    }

    /// Validate configuration
    pub fn validate_config(config: &CodeModelConfig) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

        let weights = [
            ("complexity.branch_weight", config.complexity.branch_weight),
            ("complexity.nesting_weight", config.complexity.nesting_weight),
            ("complexity.fan_out_weight", config.complexity.fan_out_weight),
            ("complexity.default_threshold", config.complexity.default_threshold),
            (
                "refactoring.complexity_threshold",
                config.refactoring.complexity_threshold,
            ),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{} must be a non-negative number, got {}", name, value));
            }
        }

        let unit_values = [
            ("patterns.min_confidence", config.patterns.min_confidence),
            (
                "refactoring.uncovered_severity",
                config.refactoring.uncovered_severity,
            ),
        ];
        for (name, value) in unit_values {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{} must be within [0, 1], got {}", name, value));
            }
        }

        if config.search.dimension == 0 {
            return invalid("search.dimension must be greater than 0".to_string());
        }
        if config.search.default_limit == 0 || config.search.max_limit == 0 {
            return invalid("search limits must be greater than 0".to_string());
        }
        if config.search.default_limit > config.search.max_limit {
            return invalid(format!(
                "search.default_limit ({}) exceeds search.max_limit ({})",
                config.search.default_limit, config.search.max_limit
            ));
        }
        if config.search.hyperplanes == 0 || config.search.hyperplanes > 32 {
            return invalid(format!(
                "search.hyperplanes must be within 1..=32, got {}",
                config.search.hyperplanes
            ));
        }
        if config.search.probe_radius > 2 {
            return invalid(format!(
                "search.probe_radius must be at most 2, got {}",
                config.search.probe_radius
            ));
        }
        if config.search.batch_size == 0 {
            return invalid("search.batch_size must be greater than 0".to_string());
        }
        if config.traversal.max_flow_length == 0 {
            return invalid("traversal.max_flow_length must be greater than 0".to_string());
        }

        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return invalid(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    other
                ))
            }
        }
        match config.logging.format.as_str() {
            "pretty" | "json" | "compact" => {}
            other => {
                return invalid(format!(
                    "Invalid log format: {}. Must be one of: pretty, json, compact",
                    other
                ))
            }
        }

        Ok(())
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &CodeModelConfig {
        &self.config
    }

    pub fn into_config(self) -> CodeModelConfig {
        self.config
    }

    /// Get the path to the config file that was loaded, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = CodeModelConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = CodeModelConfig::default();
        assert_eq!(config.traversal.max_depth, 10);
        assert_eq!(config.search.index, IndexMode::Flat);
        assert_eq!(config.logging.level, "warn");
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = CodeModelConfig::default();

        let mut bad_config = config.clone();
        bad_config.logging.level = "loud".to_string();
        assert!(ConfigManager::validate_config(&bad_config).is_err());

        let mut bad_config = config.clone();
        bad_config.patterns.min_confidence = 1.5;
        assert!(ConfigManager::validate_config(&bad_config).is_err());

        let mut bad_config = config.clone();
        bad_config.complexity.nesting_weight = -1.0;
        assert!(ConfigManager::validate_config(&bad_config).is_err());

        let mut bad_config = config;
        bad_config.search.default_limit = 500;
        assert!(ConfigManager::validate_config(&bad_config).is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let manager = ConfigManager::from_toml_str(
            r#"
                [complexity]
                nesting_weight = 3.0

                [search]
                index = "bucketed"
            "#,
        )
        .unwrap();
        let config = manager.config();
        assert_eq!(config.complexity.nesting_weight, 3.0);
        assert_eq!(config.complexity.branch_weight, 1.0);
        assert_eq!(config.search.index, IndexMode::Bucketed);
        assert_eq!(config.search.dimension, 384);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CODEMODEL_MAX_DEPTH", "4"),
            ("CODEMODEL_COMPLEXITY_THRESHOLD", "7.5"),
            ("CODEMODEL_SEARCH_INDEX", "BUCKETED"),
            ("CODEMODEL_EMBEDDING_DIMENSION", "not-a-number"),
        ]);
        let config = ConfigManager::apply_env_overrides(CodeModelConfig::default(), |key| {
            env.get(key).map(|v| v.to_string())
        });
        assert_eq!(config.traversal.max_depth, 4);
        assert_eq!(config.complexity.default_threshold, 7.5);
        assert_eq!(config.refactoring.complexity_threshold, 7.5);
        assert_eq!(config.search.index, IndexMode::Bucketed);
        assert_eq!(config.search.dimension, 384);
    }

    #[test]
    fn test_default_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        ConfigManager::create_default_config(&path).unwrap();

        let manager = ConfigManager::from_path(&path).unwrap();
        assert_eq!(manager.config(), &CodeModelConfig::default());
        assert_eq!(manager.config_path(), Some(path.as_path()));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigManager::from_path(&dir.path().join("absent.toml"))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
