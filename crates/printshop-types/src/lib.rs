//! Common types module for the print shop order backend.
//!
//! This module defines the data model shared by every crate in the workspace:
//! print orders and order sets, the request payloads that create them, storage
//! namespaces, HTTP API shapes and configuration validation helpers.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Order and order set records, statuses and submission payloads.
pub mod order;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage namespaces for persisted records.
pub mod storage;
/// Formatting helpers shared by logging call sites.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use utils::truncate_id;
pub use validation::*;
