use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub graph: GraphConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
    pub monitoring: MonitoringConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://data/ontoflow.db".to_string() }
    }
}

/// SPARQL endpoint the triples live in. Query and data paths follow the
/// Fuseki dataset layout (`/<dataset>/query`, `/<dataset>/data`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub endpoint_url: String,
    pub query_path: String,
    pub update_path: String,
    pub data_path: String,
    pub timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://localhost:3030/ontoflow".to_string(),
            query_path: "/query".to_string(),
            update_path: "/update".to_string(),
            data_path: "/data".to_string(),
            timeout_secs: 60,
        }
    }
}

/// OpenAI-compatible chat provider used by the LLM extractor
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub api_base: String,
    pub model_name: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: "https://api.openai.com/v1".to_string(),
            model_name: "gpt-4o-mini".to_string(),
            api_key: None,
            max_tokens: 4096,
            temperature: 0.1,
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), file: None }
    }
}

/// Monitoring executor configuration (loaded from conf/config.toml)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Tick interval for the in-process scheduler in seconds (default: 60)
    pub tick_secs: u64,
    /// Whether to start the monitoring executor at startup (default: true)
    pub enabled: bool,
    /// Time-series window fetched per metric, in days (default: 30)
    pub history_days: i64,
    /// Whether fired events are also appended to alert history
    pub record_alerts: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self { tick_secs: 60, enabled: true, history_days: 30, record_alerts: true }
    }
}

/// Default training hyperparameters for the auto-trainer
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub num_trees: usize,
    pub train_test_split: f64,
    pub shuffle: bool,
    pub random_seed: u64,
    /// Directory model artifacts are written to
    pub models_dir: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            num_trees: 100,
            train_test_split: 0.8,
            shuffle: true,
            random_seed: 42,
            models_dir: "data/models".to_string(),
        }
    }
}

/// Command line arguments for configuration overrides
#[derive(Parser, Debug, Clone)]
#[command(name = "ontoflow")]
#[command(version, about = "Ontoflow - Ontology-Driven Data Platform")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Database URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    /// SPARQL endpoint URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub graph_endpoint: Option<String>,

    /// Logging level (overrides config file, e.g., "info,ontoflow=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Monitoring tick interval in seconds (overrides config file)
    #[arg(long, value_name = "SECS")]
    pub monitoring_tick_secs: Option<u64>,

    /// Enable/disable the monitoring executor (overrides config file)
    #[arg(long, value_name = "BOOL")]
    pub monitoring_enabled: Option<bool>,
}

impl Config {
    /// Resolve the effective configuration.
    ///
    /// CLI flags beat `APP_*` environment variables, which beat whatever
    /// the TOML file says; keys nothing sets fall back to the defaults
    /// declared on each section.
    pub fn load() -> Result<Self, anyhow::Error> {
        let cli_args = CommandLineArgs::parse();

        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(&cli_args);
        config.validate()?;

        Ok(config)
    }

    /// Load from a TOML file without touching process arguments
    pub fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", path, e))?;
        tracing::info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - APP_DATABASE_URL: Database URL (default: sqlite://data/ontoflow.db)
    /// - APP_GRAPH_ENDPOINT: SPARQL endpoint URL
    /// - APP_LLM_API_KEY: API key for the chat provider
    /// - APP_LLM_ENABLED: Enable/disable the LLM extractor (true/false)
    /// - APP_LOG_LEVEL: Logging level (e.g., "info,ontoflow=debug")
    /// - APP_MONITORING_TICK_SECS: Monitoring tick interval in seconds
    /// - APP_MONITORING_ENABLED: Enable/disable the monitoring executor
    fn apply_env_overrides(&mut self) {
        if let Ok(db_url) = std::env::var("APP_DATABASE_URL") {
            self.database.url = db_url;
            tracing::info!("Override database.url from env");
        }

        if let Ok(endpoint) = std::env::var("APP_GRAPH_ENDPOINT") {
            self.graph.endpoint_url = endpoint;
            tracing::info!("Override graph.endpoint_url from env: {}", self.graph.endpoint_url);
        }

        if let Ok(key) = std::env::var("APP_LLM_API_KEY") {
            self.llm.api_key = Some(key);
            tracing::info!("Override llm.api_key from env");
        }

        if let Ok(enabled) = std::env::var("APP_LLM_ENABLED")
            && let Ok(val) = enabled.parse()
        {
            self.llm.enabled = val;
            tracing::info!("Override llm.enabled from env: {}", self.llm.enabled);
        }

        if let Ok(level) = std::env::var("APP_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }

        if let Ok(tick) = std::env::var("APP_MONITORING_TICK_SECS")
            && let Ok(val) = tick.parse()
        {
            self.monitoring.tick_secs = val;
            tracing::info!("Override monitoring.tick_secs from env: {}", self.monitoring.tick_secs);
        }

        if let Ok(enabled) = std::env::var("APP_MONITORING_ENABLED")
            && let Ok(val) = enabled.parse()
        {
            self.monitoring.enabled = val;
            tracing::info!("Override monitoring.enabled from env: {}", self.monitoring.enabled);
        }
    }

    /// Apply command line argument overrides (highest priority)
    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(db_url) = &args.database_url {
            self.database.url = db_url.clone();
            tracing::info!("Override database.url from CLI");
        }

        if let Some(endpoint) = &args.graph_endpoint {
            self.graph.endpoint_url = endpoint.clone();
            tracing::info!("Override graph.endpoint_url from CLI: {}", self.graph.endpoint_url);
        }

        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
            tracing::info!("Override logging.level from CLI: {}", self.logging.level);
        }

        if let Some(tick) = args.monitoring_tick_secs {
            self.monitoring.tick_secs = tick;
            tracing::info!("Override monitoring.tick_secs from CLI: {}", tick);
        }

        if let Some(enabled) = args.monitoring_enabled {
            self.monitoring.enabled = enabled;
            tracing::info!("Override monitoring.enabled from CLI: {}", enabled);
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.graph.endpoint_url.is_empty() {
            anyhow::bail!("Graph endpoint URL cannot be empty");
        }

        if self.llm.enabled && self.llm.api_key.is_none() {
            tracing::warn!("llm.enabled is set but no API key is configured");
        }

        if self.monitoring.tick_secs == 0 {
            anyhow::bail!("monitoring.tick_secs must be > 0");
        }
        if self.monitoring.history_days <= 0 {
            anyhow::bail!("monitoring.history_days must be > 0");
        }

        if self.training.train_test_split <= 0.0 || self.training.train_test_split > 1.0 {
            anyhow::bail!("training.train_test_split must be in (0, 1]");
        }
        if self.training.num_trees == 0 {
            anyhow::bail!("training.num_trees must be > 0");
        }

        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths = ["conf/config.toml", "config.toml"];

        possible_paths
            .iter()
            .find(|p| Path::new(p).exists())
            .map(|p| p.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.url, "sqlite://data/ontoflow.db");
        assert_eq!(config.monitoring.history_days, 30);
        assert!(config.monitoring.enabled);
        assert_eq!(config.training.train_test_split, 0.8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_sections() {
        let toml_str = r#"
            [database]
            url = "sqlite::memory:"

            [graph]
            endpoint_url = "http://graph:3030/kb"

            [monitoring]
            tick_secs = 5
            history_days = 7
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.graph.endpoint_url, "http://graph:3030/kb");
        assert_eq!(config.monitoring.tick_secs, 5);
        assert_eq!(config.monitoring.history_days, 7);
        // Unspecified sections fall back to defaults
        assert_eq!(config.training.max_depth, 10);
    }
}
