//! Print shop HTTP API handlers.

pub mod auth;
pub mod order;
pub mod order_set;

use axum::{
	http::StatusCode,
	response::{IntoResponse, Json, Response},
};
use printshop_types::MessageResponse;

/// 404 answer used when a listing comes back empty.
pub(crate) fn nothing_found(message: &str) -> Response {
	(
		StatusCode::NOT_FOUND,
		Json(MessageResponse {
			message: message.to_string(),
		}),
	)
		.into_response()
}
