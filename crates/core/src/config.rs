use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub pipeline: PipelineConfig,
    pub executor: ExecutorConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Bounds for the analysis pipeline's lookup stages.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub stage_timeout_ms: u64,
}

/// Bounds for implement/rollback calls against enforcement points.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutorConfig {
    pub point_timeout_ms: u64,
    pub max_point_retries: u32,
    pub retry_delay_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!("unknown log format `{other}`"))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://changegate.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            pipeline: PipelineConfig { stage_timeout_ms: 3_000 },
            executor: ExecutorConfig {
                point_timeout_ms: 5_000,
                max_point_retries: 2,
                retry_delay_ms: 200,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database: Option<FileDatabase>,
    logging: Option<FileLogging>,
    pipeline: Option<FilePipeline>,
    executor: Option<FileExecutor>,
}

#[derive(Debug, Default, Deserialize)]
struct FileDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLogging {
    level: Option<String>,
    format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FilePipeline {
    stage_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileExecutor {
    point_timeout_ms: Option<u64>,
    max_point_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = options.config_path.unwrap_or_else(|| PathBuf::from("changegate.toml"));
        match fs::read_to_string(&path) {
            Ok(raw) => {
                let file: FileConfig = toml::from_str(&raw)
                    .map_err(|source| ConfigError::ParseFile { path: path.clone(), source })?;
                config.apply_file(file)?;
            }
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                if options.require_file {
                    return Err(ConfigError::MissingConfigFile(path));
                }
            }
            Err(source) => return Err(ConfigError::ReadFile { path, source }),
        }

        if let Some(url) = options.overrides.database_url {
            config.database.url = url;
        }
        if let Some(level) = options.overrides.log_level {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) -> Result<(), ConfigError> {
        if let Some(database) = file.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format.parse()?;
            }
        }
        if let Some(pipeline) = file.pipeline {
            if let Some(stage_timeout_ms) = pipeline.stage_timeout_ms {
                self.pipeline.stage_timeout_ms = stage_timeout_ms;
            }
        }
        if let Some(executor) = file.executor {
            if let Some(point_timeout_ms) = executor.point_timeout_ms {
                self.executor.point_timeout_ms = point_timeout_ms;
            }
            if let Some(max_point_retries) = executor.max_point_retries {
                self.executor.max_point_retries = max_point_retries;
            }
            if let Some(retry_delay_ms) = executor.retry_delay_ms {
                self.executor.retry_delay_ms = retry_delay_ms;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.pipeline.stage_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "pipeline.stage_timeout_ms must be positive".to_string(),
            ));
        }
        if self.executor.point_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "executor.point_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
