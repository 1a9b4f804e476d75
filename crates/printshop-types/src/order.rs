//! Print order types.
//!
//! An [`Order`] is one print job. Orders submitted together in one checkout are
//! grouped under an [`OrderSet`] which snapshots the client's contact details
//! and the user's running order-set number.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Status shared by orders and order sets.
///
/// The usual progression is `Pending -> Priced -> Reported -> Completed`, but
/// staff may set any status at any time. The order set `reported` flag is
/// tracked separately and every status/flag combination is valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
	/// Submitted, waiting for staff to price it.
	#[default]
	Pending,
	/// A price has been quoted.
	Priced,
	/// Included in a staff report.
	Reported,
	/// Printed and handed over.
	Completed,
}

impl OrderStatus {
	/// Returns the canonical string form used in JSON and URLs.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "Pending",
			OrderStatus::Priced => "Priced",
			OrderStatus::Reported => "Reported",
			OrderStatus::Completed => "Completed",
		}
	}

	/// An order set is active until it has been completed.
	pub fn is_active(&self) -> bool {
		!matches!(self, OrderStatus::Completed)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"pending" => Ok(Self::Pending),
			"priced" => Ok(Self::Priced),
			"reported" => Ok(Self::Reported),
			"completed" => Ok(Self::Completed),
			other => Err(format!("Unknown order status: {}", other)),
		}
	}
}

/// Which kind of record an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
	Order,
	OrderSet,
}

impl fmt::Display for EntityKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EntityKind::Order => write!(f, "Order"),
			EntityKind::OrderSet => write!(f, "Order set"),
		}
	}
}

/// Reference to an uploaded print artifact, as returned by file storage.
///
/// The core never inspects these values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredArtifact {
	pub filename: String,
	pub file_path: String,
}

/// A single print job.
///
/// Type-specific attributes are serialized as explicit `null` when absent;
/// clients rely on every key being present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	/// Unique identifier, generated when the cart item is built.
	pub id: String,
	/// Owning order set, assigned at aggregation time.
	#[serde(default)]
	pub order_set_id: Option<String>,
	/// Owning client username.
	pub user: String,
	/// Print type ("canvas", "sticker", "tarpaulin", ...). Opaque to the backend.
	#[serde(rename = "type")]
	pub print_type: String,
	pub quantity: u32,
	pub width: f64,
	pub height: f64,
	pub filename: String,
	pub file_path: String,
	/// Canvas prints.
	#[serde(default)]
	pub frame_option: Option<Value>,
	/// Canvas prints.
	#[serde(default)]
	pub frame_edges: Option<Value>,
	/// Canvas prints.
	#[serde(default)]
	pub frame_finishing: Option<Value>,
	/// Tarpaulin prints.
	#[serde(default)]
	pub eyelets: Option<Value>,
	/// Sticker prints.
	#[serde(default)]
	pub diecut: Option<Value>,
	#[serde(default)]
	pub remarks: Option<Value>,
	#[serde(default)]
	pub status: OrderStatus,
	#[serde(default)]
	pub price: Option<Decimal>,
}

/// Client contact details captured when an order set is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
	pub name: String,
	pub email: String,
	pub address: String,
	pub contact_no: String,
}

/// A batch of orders submitted together in one checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSet {
	/// Unique identifier, shared by every member order's `order_set_id`.
	pub id: String,
	pub user: String,
	/// The user's order-set counter at creation time. Never recomputed.
	pub user_order_num: String,
	pub name: String,
	pub email: String,
	pub address: String,
	pub contact_no: String,
	/// Server-local calendar date of submission, serialized as `YYYY-MM-DD`.
	pub date_requested: NaiveDate,
	#[serde(default)]
	pub status: OrderStatus,
	#[serde(default)]
	pub price: Option<Decimal>,
	#[serde(default)]
	pub reported: bool,
}

/// Raw cart item submission.
///
/// Required fields are optional here so that a missing field is reported as a
/// validation failure instead of a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
	#[serde(rename = "type")]
	pub print_type: Option<String>,
	pub quantity: Option<i64>,
	pub width: Option<f64>,
	pub height: Option<f64>,
	pub artifact: Option<StoredArtifact>,
	pub frame_option: Option<Value>,
	pub frame_edges: Option<Value>,
	pub frame_finishing: Option<Value>,
	pub eyelets: Option<Value>,
	pub diecut: Option<Value>,
	pub remarks: Option<Value>,
}

/// Checkout payload: the cart contents plus the client's contact details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderSet {
	pub orders: Vec<Order>,
	#[serde(flatten)]
	pub client: ClientInfo,
}

/// Narrows order set listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSetFilter {
	pub user: Option<String>,
	pub status: Option<OrderStatus>,
	/// `Some(true)` keeps only sets that are not completed.
	pub active: Option<bool>,
}

impl OrderSetFilter {
	pub fn for_user(user: impl Into<String>) -> Self {
		Self {
			user: Some(user.into()),
			..Self::default()
		}
	}

	pub fn with_status(mut self, status: OrderStatus) -> Self {
		self.status = Some(status);
		self
	}

	pub fn active_only(mut self) -> Self {
		self.active = Some(true);
		self
	}

	/// Returns true when the order set satisfies every populated criterion.
	pub fn matches(&self, set: &OrderSet) -> bool {
		if let Some(user) = &self.user {
			if &set.user != user {
				return false;
			}
		}
		if let Some(status) = self.status {
			if set.status != status {
				return false;
			}
		}
		match self.active {
			Some(active) => set.status.is_active() == active,
			None => true,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn sample_order() -> Order {
		Order {
			id: "o1".into(),
			order_set_id: None,
			user: "alice".into(),
			print_type: "canvas".into(),
			quantity: 2,
			width: 12.0,
			height: 18.0,
			filename: "order-o1.png".into(),
			file_path: "./public/order_images/order-o1.png".into(),
			frame_option: Some(json!("black")),
			frame_edges: None,
			frame_finishing: None,
			eyelets: None,
			diecut: None,
			remarks: None,
			status: OrderStatus::Pending,
			price: None,
		}
	}

	#[test]
	fn test_order_serializes_absent_attributes_as_null() {
		let value = serde_json::to_value(sample_order()).unwrap();
		let object = value.as_object().unwrap();

		for key in [
			"orderSetId",
			"frameEdges",
			"frameFinishing",
			"eyelets",
			"diecut",
			"remarks",
			"price",
		] {
			assert!(object.contains_key(key), "missing key {}", key);
			assert!(object[key].is_null(), "{} should be null", key);
		}
		assert_eq!(object["type"], json!("canvas"));
		assert_eq!(object["frameOption"], json!("black"));
		assert_eq!(object["status"], json!("Pending"));
	}

	#[test]
	fn test_status_parsing_is_case_insensitive() {
		assert_eq!("priced".parse::<OrderStatus>().unwrap(), OrderStatus::Priced);
		assert_eq!(
			"Completed".parse::<OrderStatus>().unwrap(),
			OrderStatus::Completed
		);
		assert!("shipped".parse::<OrderStatus>().is_err());
	}

	#[test]
	fn test_order_set_date_format() {
		let set = OrderSet {
			id: "s1".into(),
			user: "alice".into(),
			user_order_num: "2".into(),
			name: "Alice".into(),
			email: "alice@example.com".into(),
			address: "1 Main St".into(),
			contact_no: "555-0100".into(),
			date_requested: NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
			status: OrderStatus::Pending,
			price: None,
			reported: false,
		};

		let value = serde_json::to_value(&set).unwrap();
		assert_eq!(value["dateRequested"], json!("2024-03-07"));
		assert_eq!(value["userOrderNum"], json!("2"));
		assert_eq!(value["reported"], json!(false));
	}

	#[test]
	fn test_new_order_set_flattens_client_info() {
		let payload = json!({
			"orders": [],
			"name": "Alice",
			"email": "alice@example.com",
			"address": "1 Main St",
			"contactNo": "555-0100"
		});

		let request: NewOrderSet = serde_json::from_value(payload).unwrap();
		assert!(request.orders.is_empty());
		assert_eq!(request.client.contact_no, "555-0100");
	}

	#[test]
	fn test_filter_matching() {
		let mut set = OrderSet {
			id: "s1".into(),
			user: "bob".into(),
			user_order_num: "1".into(),
			name: "Bob".into(),
			email: "bob@example.com".into(),
			address: "2 Side St".into(),
			contact_no: "555-0101".into(),
			date_requested: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
			status: OrderStatus::Priced,
			price: None,
			reported: false,
		};

		assert!(OrderSetFilter::default().matches(&set));
		assert!(OrderSetFilter::for_user("bob").active_only().matches(&set));
		assert!(!OrderSetFilter::for_user("alice").matches(&set));
		assert!(!OrderSetFilter::default()
			.with_status(OrderStatus::Pending)
			.matches(&set));

		set.status = OrderStatus::Completed;
		assert!(!OrderSetFilter::default().active_only().matches(&set));
	}
}
