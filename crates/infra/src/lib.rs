//! Infrastructure layer: event store, command dispatch, projections, service.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod service;

pub use service::{ExpenseDraft, LedgerService, RecordedPayment, ServiceError};
