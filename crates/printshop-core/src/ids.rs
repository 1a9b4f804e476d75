//! Identifier generation for orders and order sets.

use chrono::Utc;
use uuid::Uuid;

/// Number of random hex characters leading the id.
const RANDOM_PREFIX_LEN: usize = 12;

/// Generates a short, URL-safe identifier.
///
/// The id is 48 random bits followed by the current time in microseconds, all
/// lowercase hex. The random part comes first so that shortened ids in log
/// lines stay distinct. Uniqueness is probabilistic; the store rejects the
/// rare collision.
pub fn generate_id() -> String {
	let micros = Utc::now().timestamp_micros().max(0) as u64;
	let random = Uuid::new_v4().simple().to_string();
	format!("{}{:x}", &random[..RANDOM_PREFIX_LEN], micros)
}
