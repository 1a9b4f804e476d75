//! Storage-related types for the print shop backend.

use std::str::FromStr;

/// Storage namespaces for the persisted collections.
///
/// Keys are formed as `"{namespace}:{id}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Individual print orders
	Orders,
	/// Order sets (one per checkout)
	OrderSets,
	/// Per-user order-set counters
	UserCounters,
	/// Membership markers keyed `{order_set_id}:{order_id}`
	OrderSetMembers,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::OrderSets => "order_sets",
			StorageKey::UserCounters => "user_counters",
			StorageKey::OrderSetMembers => "order_set_members",
		}
	}

	/// Builds the full key for a record in this namespace.
	pub fn key(&self, id: &str) -> String {
		format!("{}:{}", self.as_str(), id)
	}

	/// Prefix shared by every key of this namespace.
	pub fn prefix(&self) -> String {
		format!("{}:", self.as_str())
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Orders,
			Self::OrderSets,
			Self::UserCounters,
			Self::OrderSetMembers,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(Self::Orders),
			"order_sets" => Ok(Self::OrderSets),
			"user_counters" => Ok(Self::UserCounters),
			"order_set_members" => Ok(Self::OrderSetMembers),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_keys_round_trip_through_namespace() {
		for key in StorageKey::all() {
			assert_eq!(key.as_str().parse::<StorageKey>(), Ok(key));
			assert!(key.key("abc").starts_with(&key.prefix()));
		}
		assert_eq!(StorageKey::OrderSets.key("x1"), "order_sets:x1");
	}
}
