//! Storage module for the print shop backend.
//!
//! This module provides abstractions for persistent storage of orders, order
//! sets and per-user counters. Backends are plain key-value stores that in
//! addition support all-or-nothing batches and a counter increment that commits
//! together with a batch, which is what keeps order numbers gap-free.

use async_trait::async_trait;
use printshop_types::{ConfigSchema, ImplementationRegistry, StorageKey};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Number of compare-and-swap attempts before an update gives up.
const MAX_UPDATE_ATTEMPTS: usize = 8;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found: {0}")]
	NotFound(String),
	/// A batch inserted a key that already exists. Carries the full key.
	/// Nothing was written.
	#[error("Already exists: {0}")]
	AlreadyExists(String),
	/// A replaced value changed underneath the caller. Nothing was written.
	#[error("Conflict: {0}")]
	Conflict(String),
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// A read did not complete within the configured timeout.
	#[error("Storage timeout: {0}")]
	Timeout(String),
	/// A write did not complete within the configured timeout. It may or may
	/// not have been applied.
	#[error("Write outcome unknown: {0}")]
	Unconfirmed(String),
	/// A batch failed halfway and the backend could not restore the previous
	/// state.
	#[error("Partial write: {0}")]
	Partial(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

impl StorageError {
	/// Whether some of the requested changes may have become visible.
	pub fn outcome_unknown(&self) -> bool {
		matches!(self, StorageError::Unconfirmed(_) | StorageError::Partial(_))
	}
}

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
	/// Creates a key. Fails the batch with `AlreadyExists` if the key exists.
	Insert { key: String, value: Vec<u8> },
	/// Overwrites a key only if its current bytes equal `expected`.
	Replace {
		key: String,
		expected: Vec<u8>,
		value: Vec<u8>,
	},
	/// Removes a key. Removing an absent key is not an error.
	Delete { key: String },
}

impl BatchOp {
	pub fn key(&self) -> &str {
		match self {
			BatchOp::Insert { key, .. } | BatchOp::Replace { key, .. } | BatchOp::Delete { key } => {
				key
			},
		}
	}
}

/// Builds the batch committed alongside a counter increment. Receives the
/// counter value before the increment.
pub type BatchBuilder = Box<dyn FnOnce(u64) -> Result<Vec<BatchOp>, StorageError> + Send>;

/// Trait defining the low-level interface for storage backends.
///
/// This trait must be implemented by any storage backend that wants to
/// integrate with the print shop. Besides basic key-value access it requires
/// atomic batches: either every operation of a batch becomes visible or none.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, overwriting any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists every key starting with `prefix`. The prefix must name a
	/// namespace, e.g. `"orders:"`.
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Applies all operations or none of them.
	async fn commit(&self, batch: Vec<BatchOp>) -> Result<(), StorageError>;

	/// Reads the counter at `counter_key` (absent counts as `initial`), builds a
	/// batch from that value and commits the batch together with the counter
	/// advanced by one. Concurrent calls on the same counter are serialized.
	///
	/// Returns the value the batch was built with.
	async fn increment_and_commit(
		&self,
		counter_key: &str,
		initial: u64,
		build: BatchBuilder,
	) -> Result<u64, StorageError>;

	/// Advances a counter and returns its new value.
	async fn increment_and_get(&self, counter_key: &str, initial: u64) -> Result<u64, StorageError> {
		let current = self
			.increment_and_commit(counter_key, initial, Box::new(|_| Ok(Vec::new())))
			.await?;
		Ok(current + 1)
	}

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Releases backend resources. Further calls may fail.
	async fn close(&self) -> Result<(), StorageError> {
		Ok(())
	}
}

/// Type alias for storage factory functions.
///
/// This is the function signature that all storage implementations must provide
/// to create instances of their storage interface.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Parses a counter value as written by the backends.
pub(crate) fn decode_counter(key: &str, bytes: &[u8]) -> Result<u64, StorageError> {
	std::str::from_utf8(bytes)
		.ok()
		.and_then(|s| s.trim().parse().ok())
		.ok_or_else(|| StorageError::Serialization(format!("counter {} is not a number", key)))
}

pub(crate) fn encode_counter(value: u64) -> Vec<u8> {
	value.to_string().into_bytes()
}

fn to_bytes<T: Serialize>(data: &T) -> Result<Vec<u8>, StorageError> {
	serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
	serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Typed batch of writes, committed with [`StorageService::commit`] or
/// [`StorageService::increment_and_commit`].
#[derive(Debug, Default, Clone)]
pub struct Batch {
	ops: Vec<BatchOp>,
}

impl Batch {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a create-only write of `data` under `namespace:id`.
	pub fn insert<T: Serialize>(
		&mut self,
		namespace: StorageKey,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		self.ops.push(BatchOp::Insert {
			key: namespace.key(id),
			value: to_bytes(data)?,
		});
		Ok(())
	}

	pub fn delete(&mut self, namespace: StorageKey, id: &str) {
		self.ops.push(BatchOp::Delete {
			key: namespace.key(id),
		});
	}

	pub fn len(&self) -> usize {
		self.ops.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ops.is_empty()
	}

	pub fn into_ops(self) -> Vec<BatchOp> {
		self.ops
	}
}

/// High-level storage service that provides typed operations.
///
/// The StorageService wraps a low-level storage backend, serializes values as
/// JSON and bounds every backend call by the configured timeout.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
	/// Upper bound for a single backend call.
	timeout: Duration,
}

impl StorageService {
	/// Default bound on a single backend call.
	pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self::with_timeout(backend, Self::DEFAULT_TIMEOUT)
	}

	pub fn with_timeout(backend: Box<dyn StorageInterface>, timeout: Duration) -> Self {
		Self { backend, timeout }
	}

	async fn read<T, F>(&self, what: &str, fut: F) -> Result<T, StorageError>
	where
		F: std::future::Future<Output = Result<T, StorageError>>,
	{
		tokio::time::timeout(self.timeout, fut)
			.await
			.map_err(|_| StorageError::Timeout(format!("{} exceeded {:?}", what, self.timeout)))?
	}

	async fn write<T, F>(&self, what: &str, fut: F) -> Result<T, StorageError>
	where
		F: std::future::Future<Output = Result<T, StorageError>>,
	{
		tokio::time::timeout(self.timeout, fut).await.map_err(|_| {
			StorageError::Unconfirmed(format!("{} exceeded {:?}", what, self.timeout))
		})?
	}

	/// Stores a serializable value, overwriting any previous value.
	pub async fn store<T: Serialize>(
		&self,
		namespace: StorageKey,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = namespace.key(id);
		let bytes = to_bytes(data)?;
		self.write(&key, self.backend.set_bytes(&key, bytes)).await
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
		id: &str,
	) -> Result<T, StorageError> {
		let key = namespace.key(id);
		let bytes = self.read(&key, self.backend.get_bytes(&key)).await?;
		from_bytes(&bytes)
	}

	/// Retrieves every value of a namespace.
	///
	/// Records deleted between listing and reading are skipped.
	pub async fn retrieve_all<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
	) -> Result<Vec<T>, StorageError> {
		let prefix = namespace.prefix();
		let keys = self.read(&prefix, self.backend.list_keys(&prefix)).await?;

		let mut values = Vec::with_capacity(keys.len());
		for key in keys {
			match self.read(&key, self.backend.get_bytes(&key)).await {
				Ok(bytes) => values.push(from_bytes(&bytes)?),
				Err(StorageError::NotFound(_)) => continue,
				Err(e) => return Err(e),
			}
		}
		Ok(values)
	}

	/// Lists the ids in `namespace` that start with `id_prefix`, without
	/// reading their values.
	pub async fn list_ids(
		&self,
		namespace: StorageKey,
		id_prefix: &str,
	) -> Result<Vec<String>, StorageError> {
		let prefix = namespace.key(id_prefix);
		let keys = self.read(&prefix, self.backend.list_keys(&prefix)).await?;
		let strip = namespace.prefix();
		Ok(keys
			.into_iter()
			.filter_map(|key| key.strip_prefix(&strip).map(str::to_string))
			.collect())
	}

	/// Checks if a value exists in storage.
	pub async fn exists(&self, namespace: StorageKey, id: &str) -> Result<bool, StorageError> {
		let key = namespace.key(id);
		self.read(&key, self.backend.exists(&key)).await
	}

	/// Applies `mutate` to an existing record and writes it back.
	///
	/// The write only succeeds if the record is unchanged since it was read, so
	/// concurrent updates are never lost and a record deleted in the meantime is
	/// not recreated. Returns the stored value.
	pub async fn update_with<T, F>(
		&self,
		namespace: StorageKey,
		id: &str,
		mut mutate: F,
	) -> Result<T, StorageError>
	where
		T: Serialize + DeserializeOwned,
		F: FnMut(&mut T),
	{
		let key = namespace.key(id);

		for attempt in 1..=MAX_UPDATE_ATTEMPTS {
			let expected = self.read(&key, self.backend.get_bytes(&key)).await?;
			let mut value: T = from_bytes(&expected)?;
			mutate(&mut value);

			let op = BatchOp::Replace {
				key: key.clone(),
				expected,
				value: to_bytes(&value)?,
			};
			match self.write(&key, self.backend.commit(vec![op])).await {
				Ok(()) => return Ok(value),
				Err(StorageError::Conflict(_)) => {
					tracing::debug!(key = %key, attempt, "Concurrent update, retrying");
				},
				Err(e) => return Err(e),
			}
		}

		Err(StorageError::Conflict(format!(
			"{} kept changing after {} attempts",
			key, MAX_UPDATE_ATTEMPTS
		)))
	}

	/// Commits a batch atomically.
	pub async fn commit(&self, batch: Batch) -> Result<(), StorageError> {
		if batch.is_empty() {
			return Ok(());
		}
		self.write("batch commit", self.backend.commit(batch.into_ops()))
			.await
	}

	/// Advances the counter `namespace:id` and commits the batch produced by
	/// `build` in the same atomic step. `build` receives the value before the
	/// increment, which is also returned.
	pub async fn increment_and_commit<F>(
		&self,
		namespace: StorageKey,
		id: &str,
		initial: u64,
		build: F,
	) -> Result<u64, StorageError>
	where
		F: FnOnce(u64) -> Result<Batch, StorageError> + Send + 'static,
	{
		let key = namespace.key(id);
		let builder: BatchBuilder = Box::new(move |current| build(current).map(Batch::into_ops));
		self.write(
			&key,
			self.backend.increment_and_commit(&key, initial, builder),
		)
		.await
	}

	/// Advances the counter `namespace:id` and returns its new value.
	pub async fn increment_and_get(
		&self,
		namespace: StorageKey,
		id: &str,
		initial: u64,
	) -> Result<u64, StorageError> {
		let key = namespace.key(id);
		self.write(&key, self.backend.increment_and_get(&key, initial))
			.await
	}

	/// Releases the backend.
	pub async fn close(&self) -> Result<(), StorageError> {
		self.backend.close().await
	}
}
