//! Turns a raw cart item submission into a canonical [`Order`].
//!
//! Nothing is persisted here: the client keeps the returned order in its cart
//! until checkout, when the order set aggregator stores it.

use crate::ids::generate_id;
use crate::OrderError;
use printshop_types::{CartItemRequest, Order, OrderStatus};
use serde_json::Value;

/// Keeps an optional attribute only if the client actually sent a value.
fn present(value: Option<Value>) -> Option<Value> {
	value.filter(|v| !v.is_null())
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, OrderError> {
	value.ok_or_else(|| OrderError::Validation(format!("{} is required", field)))
}

fn positive_dimension(value: Option<f64>, field: &str) -> Result<f64, OrderError> {
	let value = required(value, field)?;
	if !value.is_finite() || value <= 0.0 {
		return Err(OrderError::Validation(format!(
			"{} must be a positive number",
			field
		)));
	}
	Ok(value)
}

/// Validates a cart item and builds the order owned by `user`.
///
/// The print type is not checked against a fixed list. Type-specific
/// attributes are copied as given and left `null` when absent.
pub fn build_order(request: CartItemRequest, user: &str) -> Result<Order, OrderError> {
	if user.trim().is_empty() {
		return Err(OrderError::Validation("user is required".into()));
	}

	let print_type = required(request.print_type, "type")?;
	if print_type.trim().is_empty() {
		return Err(OrderError::Validation("type cannot be empty".into()));
	}

	let quantity = required(request.quantity, "quantity")?;
	let quantity = u32::try_from(quantity)
		.ok()
		.filter(|q| *q >= 1)
		.ok_or_else(|| OrderError::Validation("quantity must be at least 1".into()))?;

	let width = positive_dimension(request.width, "width")?;
	let height = positive_dimension(request.height, "height")?;
	let artifact = required(request.artifact, "artifact")?;

	Ok(Order {
		id: generate_id(),
		order_set_id: None,
		user: user.to_string(),
		print_type,
		quantity,
		width,
		height,
		filename: artifact.filename,
		file_path: artifact.file_path,
		frame_option: present(request.frame_option),
		frame_edges: present(request.frame_edges),
		frame_finishing: present(request.frame_finishing),
		eyelets: present(request.eyelets),
		diecut: present(request.diecut),
		remarks: present(request.remarks),
		status: OrderStatus::Pending,
		price: None,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use printshop_types::StoredArtifact;
	use serde_json::json;

	fn canvas_request() -> CartItemRequest {
		CartItemRequest {
			print_type: Some("canvas".into()),
			quantity: Some(2),
			width: Some(12.0),
			height: Some(18.0),
			artifact: Some(StoredArtifact {
				filename: "order-1.png".into(),
				file_path: "./public/order_images/order-1.png".into(),
			}),
			frame_option: Some(json!("black")),
			..CartItemRequest::default()
		}
	}

	#[test]
	fn test_builds_canonical_order() {
		let order = build_order(canvas_request(), "alice").unwrap();

		assert!(!order.id.is_empty());
		assert_eq!(order.user, "alice");
		assert_eq!(order.quantity, 2);
		assert_eq!(order.frame_option, Some(json!("black")));
		assert_eq!(order.status, OrderStatus::Pending);
		assert!(order.order_set_id.is_none());
		assert!(order.price.is_none());

		let value = serde_json::to_value(&order).unwrap();
		assert!(value["eyelets"].is_null());
		assert!(value["diecut"].is_null());
		assert!(value["remarks"].is_null());
	}

	#[test]
	fn test_each_build_gets_a_new_id() {
		let a = build_order(canvas_request(), "alice").unwrap();
		let b = build_order(canvas_request(), "alice").unwrap();
		assert_ne!(a.id, b.id);
	}

	#[test]
	fn test_unknown_type_is_accepted() {
		let mut request = canvas_request();
		request.print_type = Some("mug".into());
		request.frame_option = None;
		request.remarks = Some(json!("rush please"));

		let order = build_order(request, "bob").unwrap();
		assert_eq!(order.print_type, "mug");
		assert_eq!(order.remarks, Some(json!("rush please")));
		assert!(order.frame_option.is_none());
	}

	#[test]
	fn test_missing_required_fields() {
		for strip in ["type", "quantity", "width", "height", "artifact"] {
			let mut request = canvas_request();
			match strip {
				"type" => request.print_type = None,
				"quantity" => request.quantity = None,
				"width" => request.width = None,
				"height" => request.height = None,
				_ => request.artifact = None,
			}
			let err = build_order(request, "alice").unwrap_err();
			assert!(
				matches!(err, OrderError::Validation(ref m) if m.contains(strip)),
				"{} should be required, got {:?}",
				strip,
				err
			);
		}
	}

	#[test]
	fn test_out_of_range_values() {
		let mut request = canvas_request();
		request.quantity = Some(0);
		assert!(build_order(request, "alice").is_err());

		let mut request = canvas_request();
		request.width = Some(-3.0);
		assert!(build_order(request, "alice").is_err());

		let mut request = canvas_request();
		request.print_type = Some("  ".into());
		assert!(build_order(request, "alice").is_err());

		assert!(build_order(canvas_request(), "").is_err());
	}
}
