//! Projection implementations (read model builders).
//!
//! Projections consume domain events and build query-optimized read models.
//! All projections are:
//! - **Rebuildable**: can be reconstructed from the event stream
//! - **Group-scoped**: data is partitioned by group
//! - **Idempotent**: safe for at-least-once delivery

pub mod balances;
pub mod entries;

pub use balances::{BalancesProjectionError, GroupBalancesProjection};
pub use entries::{EntriesProjectionError, EntryRecord, GroupEntriesProjection};
