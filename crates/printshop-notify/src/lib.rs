//! Order notification module for the print shop backend.
//!
//! After an order set has been committed the client receives a confirmation
//! message. Delivery is pluggable: the `log` implementation only records the
//! message, the `webhook` implementation hands it to an HTTP mail relay.

use async_trait::async_trait;
use printshop_types::{truncate_id, ConfigSchema, ImplementationRegistry};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod log;
	pub mod webhook;
}

/// Errors that can occur while sending a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
	/// The relay could not be reached or did not answer in time.
	#[error("Network error: {0}")]
	Network(String),
	/// The relay answered but refused the message.
	#[error("Message rejected: {0}")]
	Rejected(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Identifier assigned to a sent message by the delivery channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// "Order placed" confirmation sent to the client of a new order set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlacedMessage {
	pub recipient: String,
	pub order_set_id: String,
	pub client_name: String,
}

impl OrderPlacedMessage {
	pub fn new(
		recipient: impl Into<String>,
		order_set_id: impl Into<String>,
		client_name: impl Into<String>,
	) -> Self {
		Self {
			recipient: recipient.into(),
			order_set_id: order_set_id.into(),
			client_name: client_name.into(),
		}
	}

	pub fn subject(&self) -> String {
		format!("[Order # {}] Order Confirmed", self.order_set_id)
	}

	/// HTML body signed by `shop_name`, pointing the client at `orders_url`.
	pub fn html_body(&self, shop_name: &str, orders_url: &str) -> String {
		format!(
			"<p>Dear {name},</p>\
			<p>Thank you for ordering with us. Your order with reference number <b>{id}</b> \
			has been received by our staff and is currently being processed. The total \
			project cost will be available within 24 hours. You may view the project cost \
			at {url}.</p>\
			<p>Thank you and have a great day! </p>\
			<p>{shop} </p>\
			<p>[Please do not reply to this email. This is an auto-generated message]</p>",
			name = self.client_name,
			id = self.order_set_id,
			url = orders_url,
			shop = shop_name,
		)
	}
}

/// Trait defining the interface for notification channels.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait NotificationInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Sends one confirmation and returns the channel's message id.
	async fn send(&self, message: &OrderPlacedMessage) -> Result<MessageId, NotificationError>;
}

/// Type alias for notification factory functions.
pub type NotificationFactory =
	fn(&toml::Value) -> Result<Box<dyn NotificationInterface>, NotificationError>;

/// Registry trait for notification implementations.
pub trait NotificationRegistry: ImplementationRegistry<Factory = NotificationFactory> {}

/// Get all registered notification implementations.
pub fn get_all_implementations() -> Vec<(&'static str, NotificationFactory)> {
	use implementations::{log, webhook};

	vec![
		(log::Registry::NAME, log::Registry::factory()),
		(webhook::Registry::NAME, webhook::Registry::factory()),
	]
}

/// Service wrapping the configured notification channel.
pub struct NotificationService {
	implementation: Box<dyn NotificationInterface>,
}

impl NotificationService {
	pub fn new(implementation: Box<dyn NotificationInterface>) -> Self {
		Self { implementation }
	}

	/// Sends the "order placed" confirmation for an order set.
	pub async fn notify_order_placed(
		&self,
		client_email: &str,
		order_set_id: &str,
		client_name: &str,
	) -> Result<MessageId, NotificationError> {
		if client_email.trim().is_empty() {
			return Err(NotificationError::Rejected(
				"order set has no client email".into(),
			));
		}

		let message = OrderPlacedMessage::new(client_email, order_set_id, client_name);
		let id = self.implementation.send(&message).await?;
		tracing::debug!(
			order_set_id = %truncate_id(order_set_id),
			message_id = %id,
			"Order confirmation sent"
		);
		Ok(id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_subject_and_body() {
		let message = OrderPlacedMessage::new("alice@example.com", "lx1abc", "Alice");
		assert_eq!(message.subject(), "[Order # lx1abc] Order Confirmed");

		let body = message.html_body("AGC Print", "agcprint.com/orders");
		assert!(body.starts_with("<p>Dear Alice,</p>"));
		assert!(body.contains("<b>lx1abc</b>"));
		assert!(body.contains("agcprint.com/orders"));
		assert!(body.contains("<p>AGC Print </p>"));
	}

	#[tokio::test]
	async fn test_service_rejects_missing_email() {
		let service = NotificationService::new(Box::new(implementations::log::LogNotifier::default()));
		let result = service.notify_order_placed(" ", "id", "Alice").await;
		assert!(matches!(result, Err(NotificationError::Rejected(_))));

		let id = service
			.notify_order_placed("alice@example.com", "id", "Alice")
			.await
			.unwrap();
		assert_eq!(id, MessageId("log-id".into()));
	}
}
