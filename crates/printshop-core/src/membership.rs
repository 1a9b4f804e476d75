//! Order set membership markers.
//!
//! Every order placed in a set has an empty marker stored under
//! `order_set_members:{order_set_id}:{order_id}`. Markers are written and
//! removed in the same batch as their order, so the orders of a set can be
//! found by listing keys instead of reading every order.

use printshop_storage::{StorageError, StorageService};
use printshop_types::StorageKey;

/// Marker id for `order_id` in `set_id`.
pub(crate) fn marker_id(set_id: &str, order_id: &str) -> String {
	format!("{}:{}", set_id, order_id)
}

/// Ids of the orders currently marked as members of `set_id`, sorted.
pub(crate) async fn member_ids(
	storage: &StorageService,
	set_id: &str,
) -> Result<Vec<String>, StorageError> {
	let prefix = marker_id(set_id, "");
	let mut ids: Vec<String> = storage
		.list_ids(StorageKey::OrderSetMembers, &prefix)
		.await?
		.into_iter()
		.filter_map(|id| id.strip_prefix(&prefix).map(str::to_string))
		.collect();
	ids.sort();
	Ok(ids)
}
