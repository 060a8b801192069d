//! `splitledger-events` — event trait, envelopes, and pub/sub plumbing.

pub mod bus;
pub mod envelope;

pub use bus::{EventBus, InMemoryBusError, InMemoryEventBus, Subscription};
pub use envelope::{Event, EventEnvelope};
