//! Order lifecycle core for the print shop backend.
//!
//! This crate turns cart submissions into canonical orders, groups them into
//! order sets with a per-user running number, applies staff status and price
//! changes, and answers lookups. All state lives behind the injected
//! [`printshop_storage::StorageService`].

pub mod aggregate;
pub mod builder;
pub mod cart;
pub mod engine;
pub mod error;
pub mod ids;
pub mod lifecycle;
mod membership;
pub mod queries;

pub use builder::{BuilderError, EngineBuilder, EngineFactories};
pub use engine::PrintShopEngine;
pub use error::OrderError;
pub use lifecycle::Tracked;
