//! Configuration builder for creating test and development configurations.
//!
//! This module provides utilities for constructing Config instances with
//! sensible defaults, particularly useful for testing scenarios.

use crate::{ApiConfig, Config, NotificationConfig, ShopConfig, StorageConfig};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults to in-memory storage and the log notifier.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	shop_id: String,
	initial_order_number: u64,
	storage_primary: String,
	storage_config: toml::Value,
	storage_timeout_seconds: u64,
	notification_primary: String,
	notification_config: toml::Value,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		Self {
			shop_id: "test-shop".to_string(),
			initial_order_number: 1,
			storage_primary: "memory".to_string(),
			storage_config: toml::Value::Table(toml::Table::new()),
			storage_timeout_seconds: 10,
			notification_primary: "log".to_string(),
			notification_config: toml::Value::Table(toml::Table::new()),
			api: None,
		}
	}

	pub fn shop_id(mut self, id: impl Into<String>) -> Self {
		self.shop_id = id.into();
		self
	}

	/// Sets the counter value for a user's first order set.
	pub fn initial_order_number(mut self, value: u64) -> Self {
		self.initial_order_number = value;
		self
	}

	/// Selects the primary storage implementation and its settings.
	pub fn storage(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.storage_primary = primary.into();
		self.storage_config = config;
		self
	}

	pub fn storage_timeout_seconds(mut self, seconds: u64) -> Self {
		self.storage_timeout_seconds = seconds;
		self
	}

	/// Selects the primary notification implementation and its settings.
	pub fn notification(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.notification_primary = primary.into();
		self.notification_config = config;
		self
	}

	/// Sets the API configuration.
	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		Config {
			shop: ShopConfig {
				id: self.shop_id,
				initial_order_number: self.initial_order_number,
			},
			storage: StorageConfig {
				implementations: HashMap::from([(
					self.storage_primary.clone(),
					self.storage_config,
				)]),
				primary: self.storage_primary,
				timeout_seconds: self.storage_timeout_seconds,
			},
			notification: NotificationConfig {
				implementations: HashMap::from([(
					self.notification_primary.clone(),
					self.notification_config,
				)]),
				primary: self.notification_primary,
			},
			api: self.api,
		}
	}
}
