//! Builder for constructing the print shop engine.
//!
//! Storage and notification implementations are created from the factory
//! functions registered under the names used in the configuration file.

use crate::PrintShopEngine;
use printshop_config::Config;
use printshop_notify::{NotificationError, NotificationInterface, NotificationService};
use printshop_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component, keyed by implementation name.
pub struct EngineFactories<SF, NF> {
	pub storage_factories: HashMap<String, SF>,
	pub notification_factories: HashMap<String, NF>,
}

/// Instantiates every configured implementation that has a factory and
/// returns the primary one.
fn load_primary<T: ?Sized, F, E>(
	component: &'static str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
	factories: &HashMap<String, F>,
) -> Result<Box<T>, BuilderError>
where
	F: Fn(&toml::Value) -> Result<Box<T>, E>,
	E: std::fmt::Display,
{
	let mut loaded = HashMap::new();
	for (name, config) in implementations {
		let Some(factory) = factories.get(name) else {
			tracing::warn!(component, implementation = %name, "No factory registered, skipping");
			continue;
		};
		match factory(config) {
			Ok(implementation) => {
				tracing::info!(component, implementation = %name, enabled = %(name == primary), "Loaded");
				loaded.insert(name.clone(), implementation);
			},
			Err(e) => {
				tracing::error!(component, implementation = %name, error = %e, "Failed to create implementation");
				return Err(BuilderError::Config(format!(
					"Failed to create {} implementation '{}': {}",
					component, name, e
				)));
			},
		}
	}

	loaded.remove(primary).ok_or_else(|| {
		BuilderError::MissingComponent(format!(
			"primary {} '{}' failed to load or has no factory",
			component, primary
		))
	})
}

/// Builder for constructing a PrintShopEngine with pluggable implementations.
pub struct EngineBuilder {
	config: Config,
}

impl EngineBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine using the given factories.
	pub fn build<SF, NF>(
		self,
		factories: EngineFactories<SF, NF>,
	) -> Result<PrintShopEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		NF: Fn(&toml::Value) -> Result<Box<dyn NotificationInterface>, NotificationError>,
	{
		let storage_backend = load_primary(
			"storage",
			&self.config.storage.primary,
			&self.config.storage.implementations,
			&factories.storage_factories,
		)?;
		let storage = Arc::new(StorageService::with_timeout(
			storage_backend,
			Duration::from_secs(self.config.storage.timeout_seconds),
		));

		let notifier = load_primary(
			"notification",
			&self.config.notification.primary,
			&self.config.notification.implementations,
			&factories.notification_factories,
		)?;
		let notifications = Arc::new(NotificationService::new(notifier));

		Ok(PrintShopEngine::new(self.config, storage, notifications))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use printshop_config::ConfigBuilder;
	use printshop_notify::NotificationFactory;
	use printshop_storage::StorageFactory;

	fn factories() -> EngineFactories<StorageFactory, NotificationFactory> {
		EngineFactories {
			storage_factories: printshop_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			notification_factories: printshop_notify::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	#[tokio::test]
	async fn test_builds_from_default_config() {
		let engine = EngineBuilder::new(ConfigBuilder::new().build())
			.build(factories())
			.unwrap();
		assert_eq!(engine.config().shop.id, "test-shop");
		engine.shutdown().await.unwrap();
	}

	#[test]
	fn test_unknown_primary_is_missing_component() {
		let config = ConfigBuilder::new()
			.storage("redis", toml::Value::Table(toml::Table::new()))
			.build();
		let err = EngineBuilder::new(config).build(factories()).err().unwrap();
		assert!(matches!(err, BuilderError::MissingComponent(_)));
	}

	#[test]
	fn test_invalid_implementation_config() {
		let bad: toml::Value = toml::from_str("url = \"ftp://relay\"\nsender = \"a@b\"").unwrap();
		let config = ConfigBuilder::new().notification("webhook", bad).build();
		let err = EngineBuilder::new(config).build(factories()).err().unwrap();
		assert!(matches!(err, BuilderError::Config(_)));
	}
}
