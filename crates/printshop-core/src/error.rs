//! Errors surfaced by order operations.

use printshop_storage::StorageError;
use printshop_types::{APIError, EntityKind};
use thiserror::Error;

/// Errors that can occur while building, placing or mutating orders.
///
/// `Store` means nothing was written and the call may be retried.
/// `Aggregation` means a multi-record write may have become partly visible;
/// callers must re-read before retrying.
#[derive(Debug, Error)]
pub enum OrderError {
	/// Bad input: missing or out-of-range fields, empty batches, negative prices.
	#[error("Validation error: {0}")]
	Validation(String),
	#[error("{kind} not found: {id}")]
	NotFound { kind: EntityKind, id: String },
	#[error("Storage error: {0}")]
	Store(#[source] StorageError),
	#[error("Aggregation error: {0}")]
	Aggregation(String),
}

impl OrderError {
	/// Whether repeating the same call may succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(self, OrderError::Store(_))
	}

	/// Maps a storage failure on a lookup of `kind`/`id`.
	pub(crate) fn lookup(kind: EntityKind, id: &str, err: StorageError) -> Self {
		match err {
			StorageError::NotFound(_) => OrderError::NotFound {
				kind,
				id: id.to_string(),
			},
			other => other.into(),
		}
	}
}

impl From<StorageError> for OrderError {
	fn from(err: StorageError) -> Self {
		if err.outcome_unknown() {
			OrderError::Aggregation(err.to_string())
		} else {
			OrderError::Store(err)
		}
	}
}

impl From<OrderError> for APIError {
	fn from(err: OrderError) -> Self {
		match err {
			OrderError::Validation(message) => APIError::BadRequest {
				error_type: "VALIDATION_ERROR".to_string(),
				message,
				details: None,
			},
			OrderError::NotFound { kind, .. } => APIError::NotFound {
				error_type: match kind {
					EntityKind::Order => "ORDER_NOT_FOUND",
					EntityKind::OrderSet => "ORDER_SET_NOT_FOUND",
				}
				.to_string(),
				message: format!("{} not found!", kind),
			},
			OrderError::Store(e) => APIError::ServiceUnavailable {
				error_type: "STORE_UNAVAILABLE".to_string(),
				message: e.to_string(),
				retry_after: Some(1),
			},
			OrderError::Aggregation(message) => APIError::InternalServerError {
				error_type: "AGGREGATION_ERROR".to_string(),
				message,
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_storage_error_mapping() {
		let err: OrderError = StorageError::Backend("disk full".into()).into();
		assert!(matches!(err, OrderError::Store(_)));
		assert!(err.is_retryable());

		let err: OrderError = StorageError::Partial("rename failed".into()).into();
		assert!(matches!(err, OrderError::Aggregation(_)));
		assert!(!err.is_retryable());

		let err: OrderError = StorageError::Unconfirmed("timed out".into()).into();
		assert!(matches!(err, OrderError::Aggregation(_)));

		let err = OrderError::lookup(
			EntityKind::OrderSet,
			"s1",
			StorageError::NotFound("order_sets:s1".into()),
		);
		assert_eq!(err.to_string(), "Order set not found: s1");
		assert!(!err.is_retryable());
	}

	#[test]
	fn test_api_error_mapping() {
		let api: APIError = OrderError::NotFound {
			kind: EntityKind::Order,
			id: "o1".into(),
		}
		.into();
		assert_eq!(api.status_code(), 404);
		assert_eq!(api.to_error_response().message, "Order not found!");

		let api: APIError = OrderError::Store(StorageError::Timeout("read".into())).into();
		assert_eq!(api.status_code(), 503);

		let api: APIError = OrderError::Aggregation("partial".into()).into();
		assert_eq!(api.status_code(), 500);
	}
}
