//! Notification channel that posts messages to an HTTP mail relay.
//!
//! The relay receives `{from, to, subject, html}` as JSON and is expected to
//! answer with a 2xx status, optionally carrying `{"messageId": "..."}`.

use crate::{
	MessageId, NotificationError, NotificationFactory, NotificationInterface,
	NotificationRegistry, OrderPlacedMessage,
};
use async_trait::async_trait;
use printshop_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use serde::Serialize;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
	from: &'a str,
	to: &'a str,
	subject: String,
	html: String,
}

/// Posts order confirmations to a mail relay.
pub struct WebhookNotifier {
	client: reqwest::Client,
	url: String,
	sender: String,
	shop_name: String,
	orders_url: String,
}

impl WebhookNotifier {
	pub fn new(
		url: String,
		sender: String,
		timeout: Duration,
	) -> Result<Self, NotificationError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| NotificationError::Configuration(e.to_string()))?;
		Ok(Self {
			client,
			url,
			sender,
			shop_name: "AGC Print".to_string(),
			orders_url: "agcprint.com/orders".to_string(),
		})
	}
}

#[async_trait]
impl NotificationInterface for WebhookNotifier {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(WebhookNotifierSchema)
	}

	async fn send(&self, message: &OrderPlacedMessage) -> Result<MessageId, NotificationError> {
		let request = RelayRequest {
			from: &self.sender,
			to: &message.recipient,
			subject: message.subject(),
			html: message.html_body(&self.shop_name, &self.orders_url),
		};

		let response = self
			.client
			.post(&self.url)
			.json(&request)
			.send()
			.await
			.map_err(|e| NotificationError::Network(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(NotificationError::Rejected(format!(
				"relay answered {}: {}",
				status, body
			)));
		}

		// Relays that do not report an id still accepted the message.
		let body: serde_json::Value = response.json().await.unwrap_or_default();
		let id = body
			.get("messageId")
			.or_else(|| body.get("id"))
			.and_then(|v| v.as_str())
			.map(str::to_string)
			.unwrap_or_else(|| format!("webhook-{}", message.order_set_id));
		Ok(MessageId(id))
	}
}

pub struct WebhookNotifierSchema;

impl ConfigSchema for WebhookNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("url", FieldType::Url),
				Field::new("sender", FieldType::String),
			],
			vec![
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(120),
					},
				),
				Field::new("shop_name", FieldType::String),
				Field::new("orders_url", FieldType::String),
			],
		);
		schema.validate(config)
	}
}

/// Factory function for the webhook notifier.
///
/// Configuration parameters:
/// - `url`: relay endpoint (required)
/// - `sender`: from address (required)
/// - `timeout_seconds`: request timeout (default: 10)
/// - `shop_name`, `orders_url`: used in the message body
pub fn create_notifier(
	config: &toml::Value,
) -> Result<Box<dyn NotificationInterface>, NotificationError> {
	WebhookNotifierSchema
		.validate(config)
		.map_err(|e| NotificationError::Configuration(e.to_string()))?;

	let text = |key: &str| config.get(key).and_then(|v| v.as_str()).map(str::to_string);
	let url = text("url").ok_or_else(|| NotificationError::Configuration("url is required".into()))?;
	let sender =
		text("sender").ok_or_else(|| NotificationError::Configuration("sender is required".into()))?;
	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	let mut notifier = WebhookNotifier::new(url, sender, Duration::from_secs(timeout))?;
	if let Some(name) = text("shop_name") {
		notifier.shop_name = name;
	}
	if let Some(orders_url) = text("orders_url") {
		notifier.orders_url = orders_url;
	}
	Ok(Box::new(notifier))
}

/// Registry for the webhook notifier.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "webhook";
	type Factory = NotificationFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl NotificationRegistry for Registry {}
