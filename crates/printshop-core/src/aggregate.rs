//! Groups cart orders into a new order set.
//!
//! The order set, every member order with its membership marker and the
//! user's order-set counter are written in a single atomic step. Either all of
//! them become visible together, or nothing does.

use crate::ids::generate_id;
use crate::membership::marker_id;
use crate::OrderError;
use chrono::Local;
use printshop_storage::{Batch, StorageError, StorageService};
use printshop_types::{truncate_id, ClientInfo, Order, OrderSet, OrderStatus, StorageKey};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

/// Fresh order set ids tried before giving up on id collisions.
const MAX_ID_ATTEMPTS: usize = 3;

pub struct OrderSetAggregator {
	storage: Arc<StorageService>,
	/// Counter value used for a user's first order set.
	initial_order_number: u64,
}

impl OrderSetAggregator {
	pub fn new(storage: Arc<StorageService>, initial_order_number: u64) -> Self {
		Self {
			storage,
			initial_order_number,
		}
	}

	/// Creates an order set owning `orders` for `user`.
	///
	/// Every order is stamped with the new set id and re-owned by `user`. The
	/// set's `user_order_num` is the user's counter before this call, and the
	/// counter advances by exactly one. Concurrent calls for the same user
	/// never observe the same counter value.
	#[instrument(skip_all, fields(user = %user, orders = orders.len()))]
	pub async fn create_order_set(
		&self,
		orders: Vec<Order>,
		client: ClientInfo,
		user: &str,
	) -> Result<OrderSet, OrderError> {
		if orders.is_empty() {
			return Err(OrderError::Validation(
				"An order set needs at least one order".into(),
			));
		}
		if user.trim().is_empty() {
			return Err(OrderError::Validation("user is required".into()));
		}

		let mut seen = HashSet::with_capacity(orders.len());
		for order in &orders {
			if order.id.trim().is_empty() {
				return Err(OrderError::Validation("every order needs an id".into()));
			}
			if !seen.insert(order.id.as_str()) {
				return Err(OrderError::Validation(format!(
					"order {} appears more than once",
					order.id
				)));
			}
		}
		for order in &orders {
			if self.storage.exists(StorageKey::Orders, &order.id).await? {
				return Err(OrderError::Validation(format!(
					"order {} has already been placed",
					order.id
				)));
			}
		}

		let mut last_collision = None;
		for attempt in 1..=MAX_ID_ATTEMPTS {
			let (mut set, members) = stamp(&orders, &client, user);

			let pending = set.clone();
			let result = self
				.storage
				.increment_and_commit(
					StorageKey::UserCounters,
					user,
					self.initial_order_number,
					move |counter| {
						let mut set = pending;
						set.user_order_num = counter.to_string();

						let mut batch = Batch::new();
						batch.insert(StorageKey::OrderSets, &set.id, &set)?;
						for order in &members {
							batch.insert(StorageKey::Orders, &order.id, order)?;
							batch.insert(
								StorageKey::OrderSetMembers,
								&marker_id(&set.id, &order.id),
								&(),
							)?;
						}
						Ok(batch)
					},
				)
				.await;

			match result {
				Ok(counter) => {
					set.user_order_num = counter.to_string();
					tracing::info!(
						order_set_id = %truncate_id(&set.id),
						user_order_num = %set.user_order_num,
						orders = orders.len(),
						"Order set created"
					);
					return Ok(set);
				},
				Err(StorageError::AlreadyExists(key)) => match collision(&key) {
					Collision::Order(order_id) => {
						tracing::warn!(
							order_id = %truncate_id(order_id),
							"Order was placed by a concurrent checkout"
						);
						return Err(OrderError::Validation(format!(
							"order {} has already been placed",
							order_id
						)));
					},
					Collision::OrderSetId => {
						tracing::debug!(attempt, key = %key, "Order set id collided, retrying");
						last_collision = Some(key.clone());
					},
					Collision::Other => {
						tracing::error!(key = %key, "Unexpected key collision committing order set");
						return Err(StorageError::AlreadyExists(key.clone()).into());
					},
				},
				Err(e) => {
					tracing::error!(error = %e, "Failed to commit order set");
					return Err(e.into());
				},
			}
		}

		Err(StorageError::AlreadyExists(last_collision.unwrap_or_default()).into())
	}
}

/// What an already-existing key in the order set batch means.
enum Collision<'a> {
	/// A member order was placed by someone else in the meantime.
	Order(&'a str),
	/// The generated order set id is taken; a fresh id may succeed.
	OrderSetId,
	Other,
}

fn collision(key: &str) -> Collision<'_> {
	if let Some(order_id) = key.strip_prefix(&StorageKey::Orders.prefix()) {
		Collision::Order(order_id)
	} else if key.starts_with(&StorageKey::OrderSets.prefix())
		|| key.starts_with(&StorageKey::OrderSetMembers.prefix())
	{
		Collision::OrderSetId
	} else {
		Collision::Other
	}
}

/// Builds a fresh order set (counter not yet assigned) and its stamped members.
fn stamp(orders: &[Order], client: &ClientInfo, user: &str) -> (OrderSet, Vec<Order>) {
	let set = OrderSet {
		id: generate_id(),
		user: user.to_string(),
		user_order_num: String::new(),
		name: client.name.clone(),
		email: client.email.clone(),
		address: client.address.clone(),
		contact_no: client.contact_no.clone(),
		date_requested: Local::now().date_naive(),
		status: OrderStatus::Pending,
		price: None,
		reported: false,
	};

	let members = orders
		.iter()
		.cloned()
		.map(|mut order| {
			order.order_set_id = Some(set.id.clone());
			order.user = user.to_string();
			order.status = OrderStatus::Pending;
			order.price = None;
			order
		})
		.collect();

	(set, members)
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use printshop_storage::implementations::memory::MemoryStorage;
	use printshop_storage::{BatchBuilder, BatchOp, StorageInterface};
	use printshop_types::ConfigSchema;
	use std::sync::atomic::{AtomicUsize, Ordering};

	/// Memory backend that reports a taken order set id for the first
	/// `collisions` commits and can hide existing orders from `exists`, as if
	/// another checkout placed them after the check.
	struct CollidingStorage {
		inner: MemoryStorage,
		collisions: usize,
		hide_existing: bool,
		commits: Arc<AtomicUsize>,
	}

	impl CollidingStorage {
		fn new(collisions: usize, hide_existing: bool) -> (Self, Arc<AtomicUsize>) {
			let commits = Arc::new(AtomicUsize::new(0));
			let storage = Self {
				inner: MemoryStorage::new(),
				collisions,
				hide_existing,
				commits: commits.clone(),
			};
			(storage, commits)
		}
	}

	#[async_trait]
	impl StorageInterface for CollidingStorage {
		async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
			self.inner.get_bytes(key).await
		}

		async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
			self.inner.set_bytes(key, value).await
		}

		async fn delete(&self, key: &str) -> Result<(), StorageError> {
			self.inner.delete(key).await
		}

		async fn exists(&self, key: &str) -> Result<bool, StorageError> {
			if self.hide_existing {
				return Ok(false);
			}
			self.inner.exists(key).await
		}

		async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
			self.inner.list_keys(prefix).await
		}

		async fn commit(&self, batch: Vec<BatchOp>) -> Result<(), StorageError> {
			self.inner.commit(batch).await
		}

		async fn increment_and_commit(
			&self,
			counter_key: &str,
			initial: u64,
			build: BatchBuilder,
		) -> Result<u64, StorageError> {
			let attempt = self.commits.fetch_add(1, Ordering::SeqCst);
			if attempt < self.collisions {
				return Err(StorageError::AlreadyExists(format!(
					"order_sets:taken-{}",
					attempt
				)));
			}
			self.inner.increment_and_commit(counter_key, initial, build).await
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			self.inner.config_schema()
		}
	}

	fn colliding(
		collisions: usize,
		hide_existing: bool,
	) -> (OrderSetAggregator, Arc<StorageService>, Arc<AtomicUsize>) {
		let (backend, commits) = CollidingStorage::new(collisions, hide_existing);
		let storage = Arc::new(StorageService::new(Box::new(backend)));
		(OrderSetAggregator::new(storage.clone(), 1), storage, commits)
	}

	fn order(id: &str) -> Order {
		Order {
			id: id.into(),
			order_set_id: None,
			user: "someone-else".into(),
			print_type: "sticker".into(),
			quantity: 10,
			width: 2.0,
			height: 2.0,
			filename: format!("order-{}.png", id),
			file_path: format!("./public/order_images/order-{}.png", id),
			frame_option: None,
			frame_edges: None,
			frame_finishing: None,
			eyelets: None,
			diecut: Some(serde_json::json!(true)),
			remarks: None,
			status: OrderStatus::Priced,
			price: Some(rust_decimal::Decimal::new(5, 0)),
		}
	}

	fn client() -> ClientInfo {
		ClientInfo {
			name: "Alice".into(),
			email: "alice@example.com".into(),
			address: "1 Main St".into(),
			contact_no: "555-0100".into(),
		}
	}

	fn aggregator() -> (OrderSetAggregator, Arc<StorageService>) {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		(OrderSetAggregator::new(storage.clone(), 1), storage)
	}

	#[tokio::test]
	async fn test_members_are_stamped_and_reset() {
		let (aggregator, storage) = aggregator();
		let set = aggregator
			.create_order_set(vec![order("a"), order("b")], client(), "alice")
			.await
			.unwrap();

		assert_eq!(set.user_order_num, "1");
		assert_eq!(set.date_requested, Local::now().date_naive());
		for id in ["a", "b"] {
			let stored: Order = storage.retrieve(StorageKey::Orders, id).await.unwrap();
			assert_eq!(stored.order_set_id.as_deref(), Some(set.id.as_str()));
			assert_eq!(stored.user, "alice");
			assert_eq!(stored.status, OrderStatus::Pending);
			assert!(stored.price.is_none());
		}
		let stored: OrderSet = storage.retrieve(StorageKey::OrderSets, &set.id).await.unwrap();
		assert_eq!(stored, set);
	}

	#[tokio::test]
	async fn test_rejects_duplicate_and_already_placed_orders() {
		let (aggregator, storage) = aggregator();

		let err = aggregator
			.create_order_set(vec![order("a"), order("a")], client(), "alice")
			.await
			.unwrap_err();
		assert!(matches!(err, OrderError::Validation(_)));

		aggregator
			.create_order_set(vec![order("a")], client(), "alice")
			.await
			.unwrap();
		let err = aggregator
			.create_order_set(vec![order("a")], client(), "alice")
			.await
			.unwrap_err();
		assert!(matches!(err, OrderError::Validation(_)));

		let sets: Vec<OrderSet> = storage.retrieve_all(StorageKey::OrderSets).await.unwrap();
		assert_eq!(sets.len(), 1);
	}

	#[tokio::test]
	async fn test_initial_order_number_is_configurable() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let aggregator = OrderSetAggregator::new(storage, 0);
		let set = aggregator
			.create_order_set(vec![order("a")], client(), "carol")
			.await
			.unwrap();
		assert_eq!(set.user_order_num, "0");
	}

	#[tokio::test]
	async fn test_order_set_id_collision_retries_with_fresh_id() {
		let (aggregator, storage, commits) = colliding(MAX_ID_ATTEMPTS - 1, false);
		let set = aggregator
			.create_order_set(vec![order("a")], client(), "alice")
			.await
			.unwrap();

		assert_eq!(commits.load(Ordering::SeqCst), MAX_ID_ATTEMPTS);
		assert_eq!(set.user_order_num, "1");
		let stored: Order = storage.retrieve(StorageKey::Orders, "a").await.unwrap();
		assert_eq!(stored.order_set_id.as_deref(), Some(set.id.as_str()));
	}

	#[tokio::test]
	async fn test_persistent_id_collisions_give_up() {
		let (aggregator, storage, commits) = colliding(MAX_ID_ATTEMPTS, false);
		let err = aggregator
			.create_order_set(vec![order("a")], client(), "alice")
			.await
			.unwrap_err();

		assert_eq!(commits.load(Ordering::SeqCst), MAX_ID_ATTEMPTS);
		assert!(matches!(err, OrderError::Store(StorageError::AlreadyExists(_))));
		assert!(!storage.exists(StorageKey::Orders, "a").await.unwrap());
	}

	#[tokio::test]
	async fn test_order_placed_concurrently_is_not_retried() {
		let (aggregator, storage, commits) = colliding(0, true);
		let first = aggregator
			.create_order_set(vec![order("a")], client(), "bob")
			.await
			.unwrap();

		let err = aggregator
			.create_order_set(vec![order("b"), order("a")], client(), "alice")
			.await
			.unwrap_err();

		match &err {
			OrderError::Validation(message) => {
				assert_eq!(message, "order a has already been placed")
			},
			other => panic!("expected a validation error, got {:?}", other),
		}
		assert!(!err.is_retryable());
		assert_eq!(commits.load(Ordering::SeqCst), 2);

		let stored: Order = storage.retrieve(StorageKey::Orders, "a").await.unwrap();
		assert_eq!(stored.order_set_id.as_deref(), Some(first.id.as_str()));
		assert!(!storage.exists(StorageKey::Orders, "b").await.unwrap());
		let sets: Vec<OrderSet> = storage.retrieve_all(StorageKey::OrderSets).await.unwrap();
		assert_eq!(sets.len(), 1);
	}

	#[tokio::test]
	async fn test_membership_markers_written_with_set() {
		let (aggregator, storage) = aggregator();
		let set = aggregator
			.create_order_set(vec![order("b"), order("a")], client(), "alice")
			.await
			.unwrap();

		let members = crate::membership::member_ids(&storage, &set.id).await.unwrap();
		assert_eq!(members, vec!["a", "b"]);
	}
}
