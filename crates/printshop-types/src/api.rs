//! API types for the print shop HTTP API.
//!
//! This module defines the request and response bodies of the order endpoints
//! and the structured error type that maps failures onto HTTP status codes.

use crate::OrderStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `PATCH .../status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
	pub status: OrderStatus,
}

/// Body of `PATCH .../price`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdateRequest {
	pub price: Decimal,
}

/// Body of `PATCH order-sets/{id}/reported`.
///
/// Older clients send the flag under `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportedUpdateRequest {
	#[serde(alias = "status")]
	pub reported: bool,
}

/// Query string accepted by the order set listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSetQuery {
	pub status: Option<OrderStatus>,
	pub active: Option<bool>,
}

/// Response of the delete endpoints: every record id that was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
	pub deleted: Vec<String>,
}

/// Plain message body, used for "nothing found" answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
	pub message: String,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Bad request with validation errors (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// No acting user on the request (401)
	Unauthorized { message: String },
	/// Unknown record (404)
	NotFound { error_type: String, message: String },
	/// Service unavailable with optional retry information (503)
	ServiceUnavailable {
		error_type: String,
		message: String,
		retry_after: Option<u64>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::Unauthorized { .. } => 401,
			APIError::NotFound { .. } => 404,
			APIError::ServiceUnavailable { .. } => 503,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message, details, retry_after) = match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			} => (error_type.clone(), message.clone(), details.clone(), None),
			APIError::Unauthorized { message } => {
				("UNAUTHORIZED".to_string(), message.clone(), None, None)
			},
			APIError::NotFound {
				error_type,
				message,
			} => (error_type.clone(), message.clone(), None, None),
			APIError::ServiceUnavailable {
				error_type,
				message,
				retry_after,
			} => (error_type.clone(), message.clone(), None, *retry_after),
			APIError::InternalServerError {
				error_type,
				message,
			} => (error_type.clone(), message.clone(), None, None),
		};

		ErrorResponse {
			error,
			message,
			details,
			retry_after,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::Unauthorized { message } => write!(f, "Unauthorized: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::ServiceUnavailable { message, .. } => {
				write!(f, "Service Unavailable: {}", message)
			},
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_reported_accepts_legacy_status_key() {
		let body: ReportedUpdateRequest =
			serde_json::from_str(r#"{"status": true}"#).unwrap();
		assert!(body.reported);

		let body: ReportedUpdateRequest =
			serde_json::from_str(r#"{"reported": false}"#).unwrap();
		assert!(!body.reported);
	}

	#[test]
	fn test_price_accepts_numbers_and_strings() {
		let body: PriceUpdateRequest = serde_json::from_str(r#"{"price": 250.5}"#).unwrap();
		assert_eq!(body.price, Decimal::new(2505, 1));

		let body: PriceUpdateRequest = serde_json::from_str(r#"{"price": "99.99"}"#).unwrap();
		assert_eq!(body.price, Decimal::new(9999, 2));
	}

	#[test]
	fn test_error_status_codes() {
		let err = APIError::ServiceUnavailable {
			error_type: "STORE_UNAVAILABLE".into(),
			message: "timeout".into(),
			retry_after: Some(5),
		};
		assert_eq!(err.status_code(), 503);
		assert_eq!(err.to_error_response().retry_after, Some(5));

		let err = APIError::NotFound {
			error_type: "ORDER_NOT_FOUND".into(),
			message: "Order not found!".into(),
		};
		assert_eq!(err.status_code(), 404);
		assert_eq!(err.to_string(), "Not Found: Order not found!");
	}
}
