//! In-memory storage backend implementation.
//!
//! This module provides a memory-based implementation of the StorageInterface trait,
//! useful for testing and development scenarios where persistence is not required.

use crate::{
	decode_counter, encode_counter, BatchBuilder, BatchOp, StorageError, StorageFactory,
	StorageInterface, StorageRegistry,
};
use async_trait::async_trait;
use printshop_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage implementation.
///
/// This implementation stores data in a HashMap in memory,
/// providing fast access but no persistence across restarts.
/// Batches are applied under the write lock, which makes them atomic.
pub struct MemoryStorage {
	/// The in-memory store protected by a read-write lock.
	store: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
	/// Creates a new MemoryStorage instance.
	pub fn new() -> Self {
		Self {
			store: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

/// Checks every precondition of a batch against the current map.
fn check_batch(store: &HashMap<String, Vec<u8>>, batch: &[BatchOp]) -> Result<(), StorageError> {
	for op in batch {
		match op {
			BatchOp::Insert { key, .. } if store.contains_key(key) => {
				return Err(StorageError::AlreadyExists(key.clone()));
			},
			BatchOp::Replace { key, expected, .. } => match store.get(key) {
				None => return Err(StorageError::NotFound(key.clone())),
				Some(current) if current != expected => {
					return Err(StorageError::Conflict(format!("{} was modified", key)));
				},
				Some(_) => {},
			},
			_ => {},
		}
	}
	Ok(())
}

fn apply_batch(store: &mut HashMap<String, Vec<u8>>, batch: Vec<BatchOp>) {
	for op in batch {
		match op {
			BatchOp::Insert { key, value } | BatchOp::Replace { key, value, .. } => {
				store.insert(key, value);
			},
			BatchOp::Delete { key } => {
				store.remove(&key);
			},
		}
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		store
			.get(key)
			.cloned()
			.ok_or_else(|| StorageError::NotFound(key.to_string()))
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.insert(key.to_string(), value);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let store = self.store.read().await;
		Ok(store.contains_key(key))
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let store = self.store.read().await;
		let mut keys: Vec<String> = store
			.keys()
			.filter(|key| key.starts_with(prefix))
			.cloned()
			.collect();
		keys.sort();
		Ok(keys)
	}

	async fn commit(&self, batch: Vec<BatchOp>) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		check_batch(&store, &batch)?;
		apply_batch(&mut store, batch);
		Ok(())
	}

	async fn increment_and_commit(
		&self,
		counter_key: &str,
		initial: u64,
		build: BatchBuilder,
	) -> Result<u64, StorageError> {
		let mut store = self.store.write().await;
		let current = match store.get(counter_key) {
			Some(bytes) => decode_counter(counter_key, bytes)?,
			None => initial,
		};

		let batch = build(current)?;
		check_batch(&store, &batch)?;
		apply_batch(&mut store, batch);
		store.insert(counter_key.to_string(), encode_counter(current + 1));
		Ok(current)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
///
/// Memory storage takes no configuration parameters.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	MemoryStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
