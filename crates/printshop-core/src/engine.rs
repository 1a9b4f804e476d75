//! The print shop engine: the entry point for every order operation.

use crate::aggregate::OrderSetAggregator;
use crate::cart::build_order;
use crate::lifecycle::LifecycleManager;
use crate::queries::OrderQueries;
use crate::OrderError;
use printshop_config::Config;
use printshop_notify::NotificationService;
use printshop_storage::StorageService;
use printshop_types::{truncate_id, CartItemRequest, NewOrderSet, Order, OrderSet};
use std::sync::Arc;
use tracing::instrument;

/// Coordinates order placement, staff updates and lookups over one storage
/// handle and one notification channel.
#[derive(Clone)]
pub struct PrintShopEngine {
	config: Config,
	storage: Arc<StorageService>,
	notifications: Arc<NotificationService>,
	aggregator: Arc<OrderSetAggregator>,
	lifecycle: Arc<LifecycleManager>,
	queries: Arc<OrderQueries>,
}

impl PrintShopEngine {
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		notifications: Arc<NotificationService>,
	) -> Self {
		let aggregator = Arc::new(OrderSetAggregator::new(
			storage.clone(),
			config.shop.initial_order_number,
		));
		let lifecycle = Arc::new(LifecycleManager::new(storage.clone()));
		let queries = Arc::new(OrderQueries::new(storage.clone()));

		Self {
			config,
			storage,
			notifications,
			aggregator,
			lifecycle,
			queries,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	/// Staff-facing setters and deletes.
	pub fn lifecycle(&self) -> &LifecycleManager {
		&self.lifecycle
	}

	pub fn queries(&self) -> &OrderQueries {
		&self.queries
	}

	/// Validates a cart item and returns the canonical order. Nothing is stored.
	pub fn build_cart_item(
		&self,
		request: CartItemRequest,
		user: &str,
	) -> Result<Order, OrderError> {
		build_order(request, user)
	}

	/// Places the cart as a new order set and sends the client a confirmation.
	///
	/// The confirmation is sent only after the order set has been stored. A
	/// failed confirmation is logged and does not undo the order set.
	#[instrument(skip_all, fields(user = %user))]
	pub async fn place_order_set(
		&self,
		request: NewOrderSet,
		user: &str,
	) -> Result<OrderSet, OrderError> {
		let set = self
			.aggregator
			.create_order_set(request.orders, request.client, user)
			.await?;

		if let Err(e) = self
			.notifications
			.notify_order_placed(&set.email, &set.id, &set.name)
			.await
		{
			tracing::warn!(
				order_set_id = %truncate_id(&set.id),
				error = %e,
				"Failed to send order confirmation"
			);
		}

		Ok(set)
	}

	/// Releases the storage backend.
	pub async fn shutdown(&self) -> Result<(), OrderError> {
		tracing::info!(shop = %self.config.shop.id, "Shutting down print shop engine");
		self.storage.close().await?;
		Ok(())
	}
}
