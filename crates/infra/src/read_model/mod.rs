//! Group-scoped read model storage abstractions.

pub mod group_store;

pub use group_store::{GroupStore, InMemoryGroupStore};
