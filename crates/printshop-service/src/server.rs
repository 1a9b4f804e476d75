//! HTTP server for the print shop API.
//!
//! All routes live under `/api`. Customers add cart items and check out order
//! sets; staff read, price, update and delete them.

use crate::apis::{order, order_set};
use axum::{
	extract::DefaultBodyLimit,
	http::{HeaderName, HeaderValue, Method},
	routing::{get, patch, post},
	Router,
};
use printshop_config::{ApiConfig, CorsConfig};
use printshop_core::PrintShopEngine;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
	cors::{Any, CorsLayer},
	timeout::TimeoutLayer,
	trace::TraceLayer,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// The engine handling every order operation.
	pub engine: Arc<PrintShopEngine>,
}

/// Builds the CORS layer. No configuration means any origin is accepted.
fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};

	let mut layer = CorsLayer::new();
	layer = if cors.allowed_origins.iter().any(|o| o == "*") {
		layer.allow_origin(Any)
	} else {
		layer.allow_origin(
			cors.allowed_origins
				.iter()
				.filter_map(|o| o.parse::<HeaderValue>().ok())
				.collect::<Vec<_>>(),
		)
	};
	layer = if cors.allowed_methods.is_empty() {
		layer.allow_methods(Any)
	} else {
		layer.allow_methods(
			cors.allowed_methods
				.iter()
				.filter_map(|m| m.parse::<Method>().ok())
				.collect::<Vec<_>>(),
		)
	};
	if cors.allowed_headers.is_empty() {
		layer.allow_headers(Any)
	} else {
		layer.allow_headers(
			cors.allowed_headers
				.iter()
				.filter_map(|h| h.parse::<HeaderName>().ok())
				.collect::<Vec<_>>(),
		)
	}
}

/// Builds the `/api` router with its middleware stack.
pub fn router(engine: Arc<PrintShopEngine>, api_config: &ApiConfig) -> Router {
	let api = Router::new()
		.route("/orders/cart-item", post(order::create_cart_item))
		.route(
			"/orders/{id}",
			get(order::get_order).delete(order::delete_order),
		)
		.route("/orders/{id}/status", patch(order::update_status))
		.route("/orders/{id}/price", patch(order::update_price))
		.route(
			"/order-sets",
			get(order_set::list_order_sets).post(order_set::create_order_set),
		)
		.route(
			"/order-sets/user/{username}",
			get(order_set::list_user_order_sets),
		)
		.route(
			"/order-sets/{id}",
			get(order_set::get_order_set).delete(order_set::delete_order_set),
		)
		.route("/order-sets/{id}/orders", get(order_set::get_order_set_orders))
		.route("/order-sets/{id}/status", patch(order_set::update_status))
		.route("/order-sets/{id}/price", patch(order_set::update_price))
		.route("/order-sets/{id}/reported", patch(order_set::update_reported));

	Router::new()
		.nest("/api", api)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(cors_layer(api_config.cors.as_ref()))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(AppState { engine })
}

/// Serves the API until `shutdown` resolves.
pub async fn start_server<F>(
	api_config: ApiConfig,
	engine: Arc<PrintShopEngine>,
	shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
	F: Future<Output = ()> + Send + 'static,
{
	let app = router(engine, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Print shop API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown)
		.await?;

	Ok(())
}
