//! Order set endpoints: checkout, listings, staff updates and deletes.

use crate::apis::{auth::AuthUser, nothing_found};
use crate::server::AppState;
use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::{IntoResponse, Json, Response},
};
use printshop_types::{
	truncate_id, APIError, DeleteResponse, NewOrderSet, OrderSet, OrderSetFilter,
	OrderSetQuery, PriceUpdateRequest, ReportedUpdateRequest, StatusUpdateRequest,
};

fn filter_from(query: OrderSetQuery, user: Option<String>) -> OrderSetFilter {
	OrderSetFilter {
		user,
		status: query.status,
		active: query.active,
	}
}

async fn list(state: &AppState, filter: OrderSetFilter) -> Result<Response, APIError> {
	let sets = state.engine.queries().list_order_sets(&filter).await?;
	if sets.is_empty() {
		return Ok(nothing_found("No Orders Yet!"));
	}
	Ok(Json(sets).into_response())
}

/// Handles POST /api/order-sets.
///
/// Checks the cart out as a new order set owned by the acting user.
pub async fn create_order_set(
	State(state): State<AppState>,
	AuthUser(user): AuthUser,
	Json(request): Json<NewOrderSet>,
) -> Result<Json<OrderSet>, APIError> {
	match state.engine.place_order_set(request, &user).await {
		Ok(set) => Ok(Json(set)),
		Err(e) => {
			tracing::warn!("Order set creation failed: {}", e);
			Err(APIError::from(e))
		},
	}
}

/// Handles GET /api/order-sets.
pub async fn list_order_sets(
	State(state): State<AppState>,
	AuthUser(_user): AuthUser,
	Query(query): Query<OrderSetQuery>,
) -> Result<Response, APIError> {
	list(&state, filter_from(query, None)).await
}

/// Handles GET /api/order-sets/user/{username}.
pub async fn list_user_order_sets(
	State(state): State<AppState>,
	AuthUser(_user): AuthUser,
	Path(username): Path<String>,
	Query(query): Query<OrderSetQuery>,
) -> Result<Response, APIError> {
	list(&state, filter_from(query, Some(username))).await
}

/// Handles GET /api/order-sets/{id}.
pub async fn get_order_set(
	State(state): State<AppState>,
	AuthUser(_user): AuthUser,
	Path(id): Path<String>,
) -> Result<Json<OrderSet>, APIError> {
	Ok(Json(state.engine.queries().get_order_set(&id).await?))
}

/// Handles GET /api/order-sets/{id}/orders.
pub async fn get_order_set_orders(
	State(state): State<AppState>,
	AuthUser(_user): AuthUser,
	Path(id): Path<String>,
) -> Result<Response, APIError> {
	let orders = state.engine.queries().get_orders_from_order_set(&id).await?;
	if orders.is_empty() {
		return Ok(nothing_found("Orders not found!"));
	}
	Ok(Json(orders).into_response())
}

/// Handles PATCH /api/order-sets/{id}/status.
pub async fn update_status(
	State(state): State<AppState>,
	AuthUser(user): AuthUser,
	Path(id): Path<String>,
	Json(request): Json<StatusUpdateRequest>,
) -> Result<StatusCode, APIError> {
	state
		.engine
		.lifecycle()
		.update_status::<OrderSet>(&id, request.status)
		.await?;
	tracing::info!(user = %user, order_set_id = %truncate_id(&id), "Order set status updated");
	Ok(StatusCode::NO_CONTENT)
}

/// Handles PATCH /api/order-sets/{id}/price.
pub async fn update_price(
	State(state): State<AppState>,
	AuthUser(user): AuthUser,
	Path(id): Path<String>,
	Json(request): Json<PriceUpdateRequest>,
) -> Result<StatusCode, APIError> {
	state
		.engine
		.lifecycle()
		.update_price::<OrderSet>(&id, request.price)
		.await?;
	tracing::info!(user = %user, order_set_id = %truncate_id(&id), "Order set price updated");
	Ok(StatusCode::NO_CONTENT)
}

/// Handles PATCH /api/order-sets/{id}/reported.
pub async fn update_reported(
	State(state): State<AppState>,
	AuthUser(user): AuthUser,
	Path(id): Path<String>,
	Json(request): Json<ReportedUpdateRequest>,
) -> Result<StatusCode, APIError> {
	state
		.engine
		.lifecycle()
		.update_reported(&id, request.reported)
		.await?;
	tracing::info!(
		user = %user,
		order_set_id = %truncate_id(&id),
		"Order set reported flag updated"
	);
	Ok(StatusCode::NO_CONTENT)
}

/// Handles DELETE /api/order-sets/{id}.
///
/// Removes the order set and every order in it.
pub async fn delete_order_set(
	State(state): State<AppState>,
	AuthUser(user): AuthUser,
	Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, APIError> {
	let deleted = state.engine.lifecycle().delete_order_set(&id).await?;
	tracing::info!(user = %user, order_set_id = %truncate_id(&id), "Order set deleted by staff");
	Ok(Json(DeleteResponse { deleted }))
}
