//! File-based storage backend.
//!
//! Every record lives in its own JSON file under `<storage_path>/<namespace>/`.
//! Single writes go through a temp file and a rename, so readers never observe
//! a half-written record. Batches and counter increments take an exclusive
//! lock on `<storage_path>/.lock`, which serializes writers across threads and
//! across processes sharing the directory.

use crate::{
	decode_counter, encode_counter, BatchBuilder, BatchOp, StorageError, StorageFactory,
	StorageInterface, StorageRegistry,
};
use async_trait::async_trait;
use fs2::FileExt;
use printshop_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

const LOCK_FILE: &str = ".lock";
const RECORD_EXTENSION: &str = "json";

fn backend(e: io::Error) -> StorageError {
	StorageError::Backend(e.to_string())
}

/// Encodes an id so it is a safe, reversible file name.
fn encode_id(id: &str) -> String {
	let mut out = String::with_capacity(id.len());
	for byte in id.bytes() {
		if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
			out.push(byte as char);
		} else {
			out.push_str(&format!("%{:02X}", byte));
		}
	}
	out
}

fn decode_id(name: &str) -> Option<String> {
	let bytes = name.as_bytes();
	let mut out = Vec::with_capacity(bytes.len());
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b'%' {
			let hex = name.get(i + 1..i + 3)?;
			out.push(u8::from_str_radix(hex, 16).ok()?);
			i += 3;
		} else {
			out.push(bytes[i]);
			i += 1;
		}
	}
	String::from_utf8(out).ok()
}

fn valid_namespace(namespace: &str) -> bool {
	!namespace.is_empty()
		&& namespace
			.bytes()
			.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

/// Maps `namespace:id` onto `<base>/<namespace>/<encoded id>.json`.
fn key_path(base: &Path, key: &str) -> Result<PathBuf, StorageError> {
	let (namespace, id) = key
		.split_once(':')
		.filter(|(ns, _)| valid_namespace(ns))
		.ok_or_else(|| StorageError::Backend(format!("invalid storage key '{}'", key)))?;
	Ok(base
		.join(namespace)
		.join(format!("{}.{}", encode_id(id), RECORD_EXTENSION)))
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
	match std::fs::read(path) {
		Ok(bytes) => Ok(Some(bytes)),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(backend(e)),
	}
}

fn remove_if_present(path: &Path) -> io::Result<()> {
	match std::fs::remove_file(path) {
		Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
		_ => Ok(()),
	}
}

fn write_via_temp(path: &Path, temp: &Path, bytes: &[u8]) -> io::Result<()> {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	std::fs::write(temp, bytes)?;
	std::fs::rename(temp, path)
}

/// Exclusive advisory lock on the storage directory, released on drop.
struct DirLock {
	file: File,
}

impl DirLock {
	fn acquire(base: &Path) -> Result<Self, StorageError> {
		std::fs::create_dir_all(base).map_err(backend)?;
		let file = OpenOptions::new()
			.create(true)
			.truncate(false)
			.read(true)
			.write(true)
			.open(base.join(LOCK_FILE))
			.map_err(backend)?;
		file.lock_exclusive().map_err(backend)?;
		Ok(Self { file })
	}
}

impl Drop for DirLock {
	fn drop(&mut self) {
		if let Err(e) = FileExt::unlock(&self.file) {
			tracing::warn!("Failed to release storage lock: {}", e);
		}
	}
}

/// A batch operation resolved to a file, with the file's prior contents.
struct Staged {
	path: PathBuf,
	temp: PathBuf,
	previous: Option<Vec<u8>>,
	/// New contents, or `None` for a delete.
	write: Option<Vec<u8>>,
}

/// Checks preconditions and snapshots every file touched by the batch.
fn prepare(base: &Path, batch: Vec<BatchOp>) -> Result<Vec<Staged>, StorageError> {
	let mut staged = Vec::with_capacity(batch.len());
	for (index, op) in batch.into_iter().enumerate() {
		let path = key_path(base, op.key())?;
		let previous = read_optional(&path)?;
		let write = match op {
			BatchOp::Insert { key, value } => {
				if previous.is_some() {
					return Err(StorageError::AlreadyExists(key));
				}
				Some(value)
			},
			BatchOp::Replace {
				key,
				expected,
				value,
			} => match &previous {
				None => return Err(StorageError::NotFound(key)),
				Some(current) if *current != expected => {
					return Err(StorageError::Conflict(format!("{} was modified", key)));
				},
				Some(_) => Some(value),
			},
			BatchOp::Delete { .. } => None,
		};
		let temp = path.with_extension(format!("{}.tmp", index));
		staged.push(Staged {
			path,
			temp,
			previous,
			write,
		});
	}
	Ok(staged)
}

fn discard_temps(staged: &[Staged]) {
	for entry in staged.iter().filter(|s| s.write.is_some()) {
		let _ = remove_if_present(&entry.temp);
	}
}

/// Puts back the prior contents of the first `applied` entries.
fn restore(staged: &[Staged], applied: usize) -> io::Result<()> {
	for entry in staged[..applied].iter().rev() {
		match &entry.previous {
			Some(bytes) => write_via_temp(&entry.path, &entry.temp, bytes)?,
			None => remove_if_present(&entry.path)?,
		}
	}
	Ok(())
}

/// Applies a batch. Must be called with the directory lock held.
fn commit_locked(base: &Path, batch: Vec<BatchOp>) -> Result<(), StorageError> {
	let staged = prepare(base, batch)?;

	for entry in &staged {
		let Some(bytes) = &entry.write else { continue };
		let result = entry
			.path
			.parent()
			.map_or(Ok(()), std::fs::create_dir_all)
			.and_then(|_| std::fs::write(&entry.temp, bytes));
		if let Err(e) = result {
			discard_temps(&staged);
			return Err(backend(e));
		}
	}

	for (applied, entry) in staged.iter().enumerate() {
		let result = match &entry.write {
			Some(_) => std::fs::rename(&entry.temp, &entry.path),
			None => remove_if_present(&entry.path),
		};
		if let Err(e) = result {
			discard_temps(&staged[applied..]);
			return match restore(&staged, applied) {
				Ok(()) => Err(backend(e)),
				Err(restore_err) => {
					tracing::error!(
						error = %e,
						restore_error = %restore_err,
						"Batch failed and could not be rolled back"
					);
					Err(StorageError::Partial(format!(
						"{} (rollback failed: {})",
						e, restore_err
					)))
				},
			};
		}
	}

	Ok(())
}

/// File-based storage implementation.
///
/// This implementation stores data as JSON files on the filesystem,
/// providing simple persistence without requiring external dependencies.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
}

impl FileStorage {
	/// Creates a new FileStorage instance with the specified base path.
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	async fn blocking<T, F>(&self, f: F) -> Result<T, StorageError>
	where
		T: Send + 'static,
		F: FnOnce(&Path) -> Result<T, StorageError> + Send + 'static,
	{
		let base = self.base_path.clone();
		tokio::task::spawn_blocking(move || f(&base))
			.await
			.map_err(|e| StorageError::Backend(format!("storage task failed: {}", e)))?
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = key_path(&self.base_path, key)?;
		match fs::read(&path).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				Err(StorageError::NotFound(key.to_string()))
			},
			Err(e) => Err(backend(e)),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = key_path(&self.base_path, key)?;

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).await.map_err(backend)?;
		}

		// Write atomically by writing to temp file then renaming
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value).await.map_err(backend)?;
		fs::rename(&temp_path, &path).await.map_err(backend)?;
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = key_path(&self.base_path, key)?;
		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(backend(e)),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let path = key_path(&self.base_path, key)?;
		fs::try_exists(&path).await.map_err(backend)
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let (namespace, id_prefix) = prefix
			.split_once(':')
			.filter(|(ns, _)| valid_namespace(ns))
			.ok_or_else(|| {
				StorageError::Backend(format!("prefix '{}' does not name a namespace", prefix))
			})?;

		let mut entries = match fs::read_dir(self.base_path.join(namespace)).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(backend(e)),
		};

		let mut keys = Vec::new();
		while let Some(entry) = entries.next_entry().await.map_err(backend)? {
			let path = entry.path();
			if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
				continue;
			}
			let Some(id) = path
				.file_stem()
				.and_then(|s| s.to_str())
				.and_then(decode_id)
			else {
				tracing::debug!("Skipping unrecognized file {:?}", path);
				continue;
			};
			if id.starts_with(id_prefix) {
				keys.push(format!("{}:{}", namespace, id));
			}
		}
		keys.sort();
		Ok(keys)
	}

	async fn commit(&self, batch: Vec<BatchOp>) -> Result<(), StorageError> {
		self.blocking(move |base| {
			let _lock = DirLock::acquire(base)?;
			commit_locked(base, batch)
		})
		.await
	}

	async fn increment_and_commit(
		&self,
		counter_key: &str,
		initial: u64,
		build: BatchBuilder,
	) -> Result<u64, StorageError> {
		let counter_key = counter_key.to_string();
		self.blocking(move |base| {
			let _lock = DirLock::acquire(base)?;

			let counter_path = key_path(base, &counter_key)?;
			let stored = read_optional(&counter_path)?;
			let current = match &stored {
				Some(bytes) => decode_counter(&counter_key, bytes)?,
				None => initial,
			};

			let mut batch = build(current)?;
			let value = encode_counter(current + 1);
			batch.push(match stored {
				Some(expected) => BatchOp::Replace {
					key: counter_key,
					expected,
					value,
				},
				None => BatchOp::Insert {
					key: counter_key,
					value,
				},
			});

			commit_locked(base, batch)?;
			Ok(current)
		})
		.await
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(vec![], vec![Field::new("storage_path", FieldType::String)]);
		schema.validate(config)
	}
}

/// Factory function to create a storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage");

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
