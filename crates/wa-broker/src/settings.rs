//! Broker configuration.
//!
//! Layered with the `config` crate: built-in defaults, then the TOML file,
//! then `<PREFIX>__SECTION__KEY` environment variables.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub login: LoginConfig,
    pub render: RenderConfig,
    pub monday: MondayConfig,
    pub bridge: BridgeConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Path prefix all routes are mounted under (e.g. "/gosvc").
    pub path_prefix: String,
    /// Externally visible origin used to build OAuth redirect URIs.
    pub public_url: String,
    /// Mark cookies `Secure`. Enable when served over HTTPS.
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            path_prefix: "/gosvc".to_string(),
            public_url: "http://localhost:3000".to_string(),
            secure_cookies: false,
        }
    }
}

impl ServerConfig {
    /// Path prefix normalized to either "" or "/segment" without a trailing slash.
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.path_prefix.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        }
    }

    /// Public base URL of the service, including the path prefix.
    pub fn service_url(&self) -> String {
        format!(
            "{}{}",
            self.public_url.trim_end_matches('/'),
            self.normalized_prefix()
        )
    }
}

/// QR login configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// Seconds a pending login stays claimable.
    pub qr_timeout_secs: u64,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            qr_timeout_secs: 60,
        }
    }
}

impl LoginConfig {
    pub fn qr_timeout(&self) -> Duration {
        Duration::from_secs(self.qr_timeout_secs)
    }

    /// A zero timeout would expire every pending login on registration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.qr_timeout_secs == 0 {
            return Err(ConfigValidationError::ZeroQrTimeout);
        }
        Ok(())
    }
}

/// External QR renderer invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Program to run. Receives the login code on stdin, writes PNG to stdout.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            program: "qrencode".to_string(),
            args: vec![
                "-t".to_string(),
                "png".to_string(),
                "-o".to_string(),
                "-".to_string(),
            ],
        }
    }
}

/// monday.com OAuth application and API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MondayConfig {
    /// OAuth client id.
    pub client_id: Option<String>,
    /// OAuth client secret. Supports `env:VAR_NAME` indirection.
    pub client_secret: Option<String>,
    /// OAuth base URL (authorize and token endpoints live below it).
    pub auth_url: String,
    /// GraphQL endpoint.
    pub api_url: String,
    /// File upload endpoint.
    pub file_api_url: String,
}

impl Default for MondayConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            auth_url: "https://auth.monday.com/oauth2".to_string(),
            api_url: "https://api.monday.com/v2".to_string(),
            file_api_url: "https://api.monday.com/v2/file".to_string(),
        }
    }
}

impl MondayConfig {
    /// Resolve the client secret, expanding `env:VAR_NAME` syntax.
    pub fn resolve_client_secret(&self) -> Result<Option<String>, ConfigValidationError> {
        match &self.client_secret {
            None => Ok(None),
            Some(value) => {
                if let Some(var_name) = value.strip_prefix("env:") {
                    match std::env::var(var_name) {
                        Ok(secret) if !secret.is_empty() => Ok(Some(secret)),
                        Ok(_) => Err(ConfigValidationError::EnvVarEmpty(var_name.to_string())),
                        Err(_) => Err(ConfigValidationError::EnvVarNotFound(var_name.to_string())),
                    }
                } else {
                    Ok(Some(value.clone()))
                }
            }
        }
    }

    /// Validate that the OAuth application is fully configured.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        match self.client_id.as_deref() {
            Some(id) if !id.trim().is_empty() => {}
            _ => return Err(ConfigValidationError::MissingClientId),
        }
        if self.resolve_client_secret()?.is_none() {
            return Err(ConfigValidationError::MissingClientSecret);
        }
        Ok(())
    }
}

/// Messaging bridge daemon connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Base URL of the bridge daemon.
    pub base_url: String,
    /// Timeout for plain (non-streaming) bridge requests.
    pub request_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4100".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// OAuth client id is not configured.
    MissingClientId,
    /// OAuth client secret is not configured.
    MissingClientSecret,
    /// Environment variable not found (for `env:VAR_NAME` syntax).
    EnvVarNotFound(String),
    /// Environment variable is empty (for `env:VAR_NAME` syntax).
    EnvVarEmpty(String),
    /// `login.qr_timeout_secs` is zero.
    ZeroQrTimeout,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingClientId => write!(f, "monday.client_id is required to run the OAuth flow."),
            Self::MissingClientSecret => {
                write!(f, "monday.client_secret is required to run the OAuth flow.")
            }
            Self::EnvVarNotFound(var) => write!(
                f,
                "Environment variable '{}' not found (referenced via env:{} in config).",
                var, var
            ),
            Self::EnvVarEmpty(var) => write!(
                f,
                "Environment variable '{}' is empty (referenced via env:{} in config).",
                var, var
            ),
            Self::ZeroQrTimeout => write!(f, "login.qr_timeout_secs must be greater than zero."),
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Load configuration from an optional TOML file plus environment overrides.
pub fn load_config(path: &Path, env_prefix: &str) -> Result<AppConfig> {
    let built = Config::builder()
        .set_default("logging.level", "info")?
        .add_source(
            File::from(path)
                .format(FileFormat::Toml)
                .required(false),
        )
        .add_source(Environment::with_prefix(env_prefix).separator("__"))
        .build()
        .with_context(|| format!("reading config {}", path.display()))?;

    let config: AppConfig = built
        .try_deserialize()
        .context("deserializing configuration")?;
    config
        .login
        .validate()
        .with_context(|| format!("validating config {}", path.display()))?;
    Ok(config)
}

/// Write the default configuration to `path`, creating parent directories.
pub fn write_default_config(path: &Path, app_name: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let toml = toml::to_string_pretty(&AppConfig::default())
        .context("serializing default config to TOML")?;
    let body = format!(
        "# Configuration for {app_name}\n# File: {}\n\n{toml}",
        path.display()
    );
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}
