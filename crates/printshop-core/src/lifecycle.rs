//! Status, price and reported-flag updates, and deletes.
//!
//! Setters are unconditional: staff may move an order or order set to any
//! status at any time. The order set `reported` flag is independent of status.

use crate::OrderError;
use crate::membership::{marker_id, member_ids};
use printshop_storage::{Batch, StorageService};
use printshop_types::{truncate_id, EntityKind, Order, OrderSet, OrderStatus, StorageKey};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// A stored record whose status and price staff can change.
pub trait Tracked: Serialize + DeserializeOwned + Send {
	const KIND: EntityKind;
	const NAMESPACE: StorageKey;

	fn set_status(&mut self, status: OrderStatus);
	fn set_price(&mut self, price: Decimal);
}

impl Tracked for Order {
	const KIND: EntityKind = EntityKind::Order;
	const NAMESPACE: StorageKey = StorageKey::Orders;

	fn set_status(&mut self, status: OrderStatus) {
		self.status = status;
	}

	fn set_price(&mut self, price: Decimal) {
		self.price = Some(price);
	}
}

impl Tracked for OrderSet {
	const KIND: EntityKind = EntityKind::OrderSet;
	const NAMESPACE: StorageKey = StorageKey::OrderSets;

	fn set_status(&mut self, status: OrderStatus) {
		self.status = status;
	}

	fn set_price(&mut self, price: Decimal) {
		self.price = Some(price);
	}
}

/// Applies staff changes to stored orders and order sets.
pub struct LifecycleManager {
	storage: Arc<StorageService>,
}

impl LifecycleManager {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	async fn update<T, F>(&self, id: &str, mutate: F) -> Result<T, OrderError>
	where
		T: Tracked,
		F: FnMut(&mut T),
	{
		self.storage
			.update_with(T::NAMESPACE, id, mutate)
			.await
			.map_err(|e| OrderError::lookup(T::KIND, id, e))
	}

	/// Sets the status of an order or order set.
	#[instrument(skip_all, fields(kind = %T::KIND, id = %truncate_id(id), status = %status))]
	pub async fn update_status<T: Tracked>(
		&self,
		id: &str,
		status: OrderStatus,
	) -> Result<T, OrderError> {
		let updated = self.update(id, |record: &mut T| record.set_status(status)).await?;
		tracing::info!("Status updated");
		Ok(updated)
	}

	/// Sets the price of an order or order set. Negative prices are rejected
	/// and leave the stored price unchanged.
	#[instrument(skip_all, fields(kind = %T::KIND, id = %truncate_id(id), price = %price))]
	pub async fn update_price<T: Tracked>(
		&self,
		id: &str,
		price: Decimal,
	) -> Result<T, OrderError> {
		if price.is_sign_negative() && !price.is_zero() {
			return Err(OrderError::Validation(format!(
				"price cannot be negative: {}",
				price
			)));
		}
		let updated = self.update(id, |record: &mut T| record.set_price(price)).await?;
		tracing::info!("Price updated");
		Ok(updated)
	}

	/// Marks an order set as included, or not, in a staff report.
	#[instrument(skip_all, fields(order_set_id = %truncate_id(id), reported = reported))]
	pub async fn update_reported(&self, id: &str, reported: bool) -> Result<OrderSet, OrderError> {
		let updated = self
			.update(id, |set: &mut OrderSet| set.reported = reported)
			.await?;
		tracing::info!("Reported flag updated");
		Ok(updated)
	}

	/// Deletes one order. Its order set is kept even if it becomes empty.
	///
	/// Returns the ids of the removed records.
	#[instrument(skip_all, fields(order_id = %truncate_id(id)))]
	pub async fn delete_order(&self, id: &str) -> Result<Vec<String>, OrderError> {
		let order: Order = self
			.storage
			.retrieve(StorageKey::Orders, id)
			.await
			.map_err(|e| OrderError::lookup(EntityKind::Order, id, e))?;

		let mut batch = Batch::new();
		batch.delete(StorageKey::Orders, &order.id);
		if let Some(set_id) = &order.order_set_id {
			batch.delete(StorageKey::OrderSetMembers, &marker_id(set_id, &order.id));
		}
		self.storage.commit(batch).await?;

		tracing::info!("Order deleted");
		Ok(vec![order.id])
	}

	/// Deletes an order set together with every order that belongs to it.
	///
	/// The orders and the set are removed in one atomic step, so a failure
	/// leaves all of them in place. Returns the removed order ids followed by
	/// the set id.
	#[instrument(skip_all, fields(order_set_id = %truncate_id(id)))]
	pub async fn delete_order_set(&self, id: &str) -> Result<Vec<String>, OrderError> {
		let set: OrderSet = self
			.storage
			.retrieve(StorageKey::OrderSets, id)
			.await
			.map_err(|e| OrderError::lookup(EntityKind::OrderSet, id, e))?;

		let mut deleted = member_ids(&self.storage, &set.id).await?;

		let mut batch = Batch::new();
		for order_id in &deleted {
			batch.delete(StorageKey::Orders, order_id);
			batch.delete(StorageKey::OrderSetMembers, &marker_id(&set.id, order_id));
		}
		batch.delete(StorageKey::OrderSets, &set.id);
		self.storage.commit(batch).await?;

		tracing::info!(orders = deleted.len(), "Order set deleted");
		deleted.push(set.id);
		Ok(deleted)
	}
}
