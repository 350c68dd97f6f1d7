use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "CURLTREE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub public_host: String,
    pub read_timeout_secs: u64,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst: u32,
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    pub output_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            public_host: "curltree.dev".to_string(),
            read_timeout_secs: 30,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst: 10,
            cleanup_interval_secs: 600,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./curltree.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            output: LogOutput::Stdout,
            output_file: None,
        }
    }
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl LogOutput {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stdout" => Some(Self::Stdout),
            "stderr" => Some(Self::Stderr),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}

impl Config {
    /// Defaults, then the TOML file (explicit path or `CURLTREE_CONFIG`), then
    /// `CURLTREE_*` environment overrides, then validation.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let mut config = match explicit_path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(host) = get("CURLTREE_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("CURLTREE_SERVER_PORT").and_then(|v| v.trim().parse().ok()) {
            self.server.port = port;
        }
        if let Some(public_host) = get("CURLTREE_PUBLIC_HOST") {
            self.server.public_host = public_host;
        }
        if let Some(path) = get("CURLTREE_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(level) = get("CURLTREE_LOG_LEVEL") {
            self.logging.level = level.trim().to_ascii_lowercase();
        }
        if let Some(format) = get("CURLTREE_LOG_FORMAT").and_then(|v| LogFormat::parse(&v)) {
            self.logging.format = format;
        }
        if let Some(output) = get("CURLTREE_LOG_OUTPUT").and_then(|v| LogOutput::parse(&v)) {
            self.logging.output = output;
        }
        if let Some(file) = get("CURLTREE_LOG_FILE") {
            self.logging.output_file = Some(PathBuf::from(file));
        }
        if let Some(rpm) = get("CURLTREE_RATE_LIMIT_PER_MINUTE").and_then(|v| v.trim().parse().ok())
        {
            self.server.rate_limit.requests_per_minute = rpm;
        }
        if let Some(burst) = get("CURLTREE_RATE_LIMIT_BURST").and_then(|v| v.trim().parse().ok()) {
            self.server.rate_limit.burst = burst;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server port must be 1-65535".to_string()));
        }
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server host is required".to_string()));
        }
        if self.server.read_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server read timeout must be greater than zero".to_string(),
            ));
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database path is required".to_string()));
        }
        if !matches!(
            self.logging.level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(ConfigError::Invalid(format!(
                "invalid log level: {}",
                self.logging.level
            )));
        }
        if self.logging.output == LogOutput::File && self.logging.output_file.is_none() {
            return Err(ConfigError::Invalid(
                "log output file is required when output is 'file'".to_string(),
            ));
        }
        let rate = &self.server.rate_limit;
        if rate.requests_per_minute == 0 || rate.burst == 0 || rate.cleanup_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "rate limit values must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
