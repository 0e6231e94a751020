//! redb table definitions for the healwatch state store.
//!
//! Both tables use monotonically increasing `u64` keys allocated inside the
//! inserting write transaction, and `&[u8]` values holding JSON.

use redb::TableDefinition;

/// Incident records keyed by incident id.
pub const INCIDENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("incidents");

/// Probe history keyed by check sequence number.
pub const CHECKS: TableDefinition<u64, &[u8]> = TableDefinition::new("checks");
