//! Configuration module for the print shop backend.
//!
//! This module provides structures and utilities for managing service configuration.
//! It supports loading configuration from TOML files and provides validation to ensure
//! all required configuration values are properly set.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod builders;
mod loader;

pub use builders::config::ConfigBuilder;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the print shop service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Shop instance settings.
	pub shop: ShopConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for order notifications. Defaults to the log notifier.
	#[serde(default)]
	pub notification: NotificationConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the shop instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShopConfig {
	/// Identifier of this instance, used in logs.
	pub id: String,
	/// Counter value used for a user's first order set.
	#[serde(default = "default_initial_order_number")]
	pub initial_order_number: u64,
}

fn default_initial_order_number() -> u64 {
	1
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Upper bound in seconds for a single storage call.
	#[serde(default = "default_storage_timeout")]
	pub timeout_seconds: u64,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

fn default_storage_timeout() -> u64 {
	10
}

/// Configuration for the order notification channel.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
	/// Which implementation to use as primary.
	#[serde(default = "default_notification_primary")]
	pub primary: String,
	/// Map of notification implementation names to their configurations.
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

impl Default for NotificationConfig {
	fn default() -> Self {
		Self {
			primary: default_notification_primary(),
			implementations: HashMap::from([(
				default_notification_primary(),
				toml::Value::Table(toml::Table::new()),
			)]),
		}
	}
}

fn default_notification_primary() -> String {
	"log".to_string()
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// CORS configuration.
	pub cors: Option<CorsConfig>,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			host: default_api_host(),
			port: default_api_port(),
			timeout_seconds: default_api_timeout(),
			max_request_size: default_max_request_size(),
			cors: None,
		}
	}
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins for CORS. `"*"` allows any origin.
	pub allowed_origins: Vec<String>,
	/// Allowed headers for CORS.
	#[serde(default)]
	pub allowed_headers: Vec<String>,
	/// Allowed methods for CORS.
	#[serde(default)]
	pub allowed_methods: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

/// Returns the default maximum request size in bytes (1MB).
fn default_max_request_size() -> usize {
	1024 * 1024
}

static ENV_VAR_PATTERN: Lazy<Result<Regex, regex::Error>> =
	Lazy::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}"));

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = ENV_VAR_PATTERN
		.as_ref()
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file with environment variable resolution.
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Returns the API settings, falling back to defaults when the section is absent.
	pub fn api_or_default(&self) -> ApiConfig {
		self.api.clone().unwrap_or_default()
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.shop.id.is_empty() {
			return Err(ConfigError::Validation("Shop ID cannot be empty".into()));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if self.storage.timeout_seconds == 0 || self.storage.timeout_seconds > 300 {
			return Err(ConfigError::Validation(
				"Storage timeout_seconds must be between 1 and 300".into(),
			));
		}

		if !self
			.notification
			.implementations
			.contains_key(&self.notification.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary notification '{}' not found in implementations",
				self.notification.primary
			)));
		}

		if let Some(ref api) = self.api {
			if api.enabled && api.timeout_seconds == 0 {
				return Err(ConfigError::Validation(
					"API timeout_seconds must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[shop]
id = "test-shop"

[storage]
primary = "memory"
[storage.implementations.memory]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("PRINTSHOP_TEST_HOST", "localhost");
		std::env::set_var("PRINTSHOP_TEST_PORT", "8025");

		let input = "url = \"http://${PRINTSHOP_TEST_HOST}:${PRINTSHOP_TEST_PORT}/send\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "url = \"http://localhost:8025/send\"");

		std::env::remove_var("PRINTSHOP_TEST_HOST");
		std::env::remove_var("PRINTSHOP_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${PRINTSHOP_MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${PRINTSHOP_MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.unwrap_err().to_string().contains("PRINTSHOP_MISSING_VAR"));
	}

	#[test]
	fn test_minimal_config_defaults() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.shop.initial_order_number, 1);
		assert_eq!(config.storage.timeout_seconds, 10);
		assert_eq!(config.notification.primary, "log");
		assert!(config.notification.implementations.contains_key("log"));
		assert!(config.api.is_none());
		assert_eq!(config.api_or_default().port, 3000);
	}

	#[test]
	fn test_full_config() {
		let config: Config = r#"
[shop]
id = "agc-print"
initial_order_number = 0

[storage]
primary = "file"
timeout_seconds = 5
[storage.implementations.file]
storage_path = "./data"

[notification]
primary = "webhook"
[notification.implementations.webhook]
url = "http://localhost:8025/send"
sender = "orders@example.com"

[api]
enabled = true
port = 8080
[api.cors]
allowed_origins = ["*"]
"#
		.parse()
		.unwrap();

		assert_eq!(config.shop.initial_order_number, 0);
		assert_eq!(config.storage.timeout_seconds, 5);
		assert_eq!(config.notification.primary, "webhook");
		let api = config.api.unwrap();
		assert_eq!(api.port, 8080);
		assert_eq!(api.host, "127.0.0.1");
		assert_eq!(api.cors.unwrap().allowed_origins, vec!["*"]);
	}

	#[test]
	fn test_primary_must_be_configured() {
		let err = r#"
[shop]
id = "s"

[storage]
primary = "file"
[storage.implementations.memory]
"#
		.parse::<Config>()
		.unwrap_err();
		assert!(err.to_string().contains("Primary storage 'file'"));

		let err = format!("{}\n[notification]\nprimary = \"webhook\"\n", MINIMAL)
			.parse::<Config>()
			.unwrap_err();
		assert!(err.to_string().contains("Primary notification 'webhook'"));
	}

	#[test]
	fn test_rejects_empty_shop_id_and_bad_timeout() {
		let err = MINIMAL
			.replace("test-shop", "")
			.parse::<Config>()
			.unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));

		let err = MINIMAL
			.replace("primary = \"memory\"", "primary = \"memory\"\ntimeout_seconds = 0")
			.parse::<Config>()
			.unwrap_err();
		assert!(err.to_string().contains("timeout_seconds"));
	}
}
