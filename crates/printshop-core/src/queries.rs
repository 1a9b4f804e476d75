//! Read-side lookups of orders and order sets.

use crate::OrderError;
use crate::membership::member_ids;
use printshop_storage::{StorageError, StorageService};
use printshop_types::{truncate_id, EntityKind, Order, OrderSet, OrderSetFilter, StorageKey};
use std::sync::Arc;

pub struct OrderQueries {
	storage: Arc<StorageService>,
}

impl OrderQueries {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	pub async fn get_order(&self, id: &str) -> Result<Order, OrderError> {
		self.storage
			.retrieve(StorageKey::Orders, id)
			.await
			.map_err(|e| OrderError::lookup(EntityKind::Order, id, e))
	}

	pub async fn get_order_set(&self, id: &str) -> Result<OrderSet, OrderError> {
		self.storage
			.retrieve(StorageKey::OrderSets, id)
			.await
			.map_err(|e| OrderError::lookup(EntityKind::OrderSet, id, e))
	}

	/// Orders belonging to an existing order set, by id. An emptied set
	/// yields an empty list.
	pub async fn get_orders_from_order_set(&self, id: &str) -> Result<Vec<Order>, OrderError> {
		if !self.storage.exists(StorageKey::OrderSets, id).await? {
			return Err(OrderError::NotFound {
				kind: EntityKind::OrderSet,
				id: id.to_string(),
			});
		}

		let mut orders = Vec::new();
		for order_id in member_ids(&self.storage, id).await? {
			match self.storage.retrieve::<Order>(StorageKey::Orders, &order_id).await {
				Ok(order) => orders.push(order),
				Err(StorageError::NotFound(_)) => {
					tracing::warn!(
						order_id = %truncate_id(&order_id),
						"Membership marker without order, skipping"
					);
				},
				Err(e) => return Err(e.into()),
			}
		}
		Ok(orders)
	}

	/// Order sets matching `filter`, oldest first.
	pub async fn list_order_sets(
		&self,
		filter: &OrderSetFilter,
	) -> Result<Vec<OrderSet>, OrderError> {
		let mut sets: Vec<OrderSet> = self
			.storage
			.retrieve_all::<OrderSet>(StorageKey::OrderSets)
			.await?
			.into_iter()
			.filter(|set| filter.matches(set))
			.collect();

		sets.sort_by_cached_key(|set| {
			(
				set.date_requested,
				set.user_order_num.parse::<u64>().unwrap_or(u64::MAX),
				set.id.clone(),
			)
		});
		Ok(sets)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::NaiveDate;
	use printshop_storage::implementations::memory::MemoryStorage;
	use printshop_types::OrderStatus;

	fn set(id: &str, user: &str, num: &str, day: u32, status: OrderStatus) -> OrderSet {
		OrderSet {
			id: id.into(),
			user: user.into(),
			user_order_num: num.into(),
			name: user.into(),
			email: format!("{}@example.com", user),
			address: "somewhere".into(),
			contact_no: "555".into(),
			date_requested: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
			status,
			price: None,
			reported: false,
		}
	}

	async fn seeded() -> OrderQueries {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let sets = [
			set("a", "alice", "10", 2, OrderStatus::Pending),
			set("b", "alice", "9", 2, OrderStatus::Completed),
			set("c", "bob", "1", 1, OrderStatus::Priced),
		];
		for s in &sets {
			storage.store(StorageKey::OrderSets, &s.id, s).await.unwrap();
		}
		OrderQueries::new(storage)
	}

	fn ids(sets: &[OrderSet]) -> Vec<&str> {
		sets.iter().map(|s| s.id.as_str()).collect()
	}

	#[tokio::test]
	async fn test_listing_is_sorted_and_filtered() {
		let queries = seeded().await;

		let all = queries.list_order_sets(&OrderSetFilter::default()).await.unwrap();
		assert_eq!(ids(&all), vec!["c", "b", "a"]);

		let active = queries
			.list_order_sets(&OrderSetFilter::default().active_only())
			.await
			.unwrap();
		assert_eq!(ids(&active), vec!["c", "a"]);

		let alice = queries
			.list_order_sets(&OrderSetFilter::for_user("alice").with_status(OrderStatus::Completed))
			.await
			.unwrap();
		assert_eq!(ids(&alice), vec!["b"]);

		let nobody = queries
			.list_order_sets(&OrderSetFilter::for_user("carol"))
			.await
			.unwrap();
		assert!(nobody.is_empty());
	}

	#[tokio::test]
	async fn test_lookups_of_unknown_ids() {
		let queries = seeded().await;

		assert!(matches!(
			queries.get_order("x").await,
			Err(OrderError::NotFound {
				kind: EntityKind::Order,
				..
			})
		));
		assert!(matches!(
			queries.get_orders_from_order_set("x").await,
			Err(OrderError::NotFound { .. })
		));
		assert!(queries.get_orders_from_order_set("a").await.unwrap().is_empty());
		assert_eq!(queries.get_order_set("c").await.unwrap().user, "bob");
	}
}
