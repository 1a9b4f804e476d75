//! Order endpoints: cart items, lookups, staff updates and deletes.

use crate::apis::auth::AuthUser;
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::Json,
};
use printshop_types::{
	truncate_id, APIError, CartItemRequest, DeleteResponse, Order, PriceUpdateRequest,
	StatusUpdateRequest,
};

/// Handles POST /api/orders/cart-item.
///
/// Validates one cart item and returns the canonical order. The order is not
/// stored until the cart is checked out as an order set.
pub async fn create_cart_item(
	State(state): State<AppState>,
	AuthUser(user): AuthUser,
	Json(request): Json<CartItemRequest>,
) -> Result<(StatusCode, Json<Order>), APIError> {
	let order = state.engine.build_cart_item(request, &user).map_err(|e| {
		tracing::warn!("Cart item rejected: {}", e);
		APIError::from(e)
	})?;
	Ok((StatusCode::CREATED, Json(order)))
}

/// Handles GET /api/orders/{id}.
pub async fn get_order(
	State(state): State<AppState>,
	AuthUser(_user): AuthUser,
	Path(id): Path<String>,
) -> Result<Json<Order>, APIError> {
	Ok(Json(state.engine.queries().get_order(&id).await?))
}

/// Handles PATCH /api/orders/{id}/status.
pub async fn update_status(
	State(state): State<AppState>,
	AuthUser(user): AuthUser,
	Path(id): Path<String>,
	Json(request): Json<StatusUpdateRequest>,
) -> Result<StatusCode, APIError> {
	state
		.engine
		.lifecycle()
		.update_status::<Order>(&id, request.status)
		.await?;
	tracing::info!(user = %user, order_id = %truncate_id(&id), "Order status updated");
	Ok(StatusCode::NO_CONTENT)
}

/// Handles PATCH /api/orders/{id}/price.
pub async fn update_price(
	State(state): State<AppState>,
	AuthUser(user): AuthUser,
	Path(id): Path<String>,
	Json(request): Json<PriceUpdateRequest>,
) -> Result<StatusCode, APIError> {
	state
		.engine
		.lifecycle()
		.update_price::<Order>(&id, request.price)
		.await?;
	tracing::info!(user = %user, order_id = %truncate_id(&id), "Order price updated");
	Ok(StatusCode::NO_CONTENT)
}

/// Handles DELETE /api/orders/{id}.
pub async fn delete_order(
	State(state): State<AppState>,
	AuthUser(user): AuthUser,
	Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, APIError> {
	let deleted = state.engine.lifecycle().delete_order(&id).await?;
	tracing::info!(user = %user, order_id = %truncate_id(&id), "Order deleted by staff");
	Ok(Json(DeleteResponse { deleted }))
}
