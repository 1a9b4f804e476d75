//! Notification channel that only writes the message to the log.
//!
//! Used in development and when no mail relay is configured.

use crate::{
	MessageId, NotificationError, NotificationFactory, NotificationInterface,
	NotificationRegistry, OrderPlacedMessage,
};
use async_trait::async_trait;
use printshop_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};

#[derive(Debug, Clone)]
pub struct LogNotifier {
	shop_name: String,
}

impl Default for LogNotifier {
	fn default() -> Self {
		Self {
			shop_name: "AGC Print".to_string(),
		}
	}
}

#[async_trait]
impl NotificationInterface for LogNotifier {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LogNotifierSchema)
	}

	async fn send(&self, message: &OrderPlacedMessage) -> Result<MessageId, NotificationError> {
		tracing::info!(
			to = %message.recipient,
			subject = %message.subject(),
			shop = %self.shop_name,
			"Order confirmation"
		);
		Ok(MessageId(format!("log-{}", message.order_set_id)))
	}
}

pub struct LogNotifierSchema;

impl ConfigSchema for LogNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![Field::new("shop_name", FieldType::String)]).validate(config)
	}
}

/// Factory function for the log notifier.
///
/// Configuration parameters:
/// - `shop_name`: name used in log lines (default: "AGC Print")
pub fn create_notifier(
	config: &toml::Value,
) -> Result<Box<dyn NotificationInterface>, NotificationError> {
	LogNotifierSchema
		.validate(config)
		.map_err(|e| NotificationError::Configuration(e.to_string()))?;

	let mut notifier = LogNotifier::default();
	if let Some(name) = config.get("shop_name").and_then(|v| v.as_str()) {
		notifier.shop_name = name.to_string();
	}
	Ok(Box::new(notifier))
}

/// Registry for the log notifier.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "log";
	type Factory = NotificationFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl NotificationRegistry for Registry {}
