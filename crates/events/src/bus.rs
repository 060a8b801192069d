//! Event publishing/subscription (mechanics only).
//!
//! This module provides the **event bus pattern** - a pub/sub mechanism for
//! distributing committed events to multiple consumers (projections, external
//! listeners).
//!
//! ## Design Philosophy
//!
//! The event bus is intentionally **lightweight** and makes minimal assumptions:
//!
//! - **Transport-agnostic**: Works with in-memory channels, message queues, etc.
//! - **At-least-once delivery**: Events may be delivered multiple times; consumers must be idempotent
//! - **No persistence**: Bus is for distribution, not storage (event store is source of truth)
//!
//! At-least-once is acceptable because events are appended to the event store
//! *before* publication, and projections are designed to skip duplicates. A
//! consumer can always rebuild from the store if it misses or repeats messages.

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

/// A subscription to an event stream.
///
/// Each subscription gets a copy of all events published to the bus (broadcast
/// semantics). Subscriptions are designed for single-threaded consumption; use
/// one per consumer thread.
///
/// Messages arrive in publication order for a single publisher. Concurrent
/// publishers have no cross-ordering guarantee.
#[derive(Debug)]
pub struct Subscription<E> {
    receiver: Receiver<E>,
}

impl<E> Subscription<E> {
    pub fn new(receiver: Receiver<E>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<E, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<E, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<E, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// The bus sits between the event store and event consumers:
///
/// ```text
/// Command → Event Store (append events) → Event Bus (publish) → Consumers
///                                                                   ├─ Projections
///                                                                   └─ External listeners
/// ```
///
/// Events are **stored first** (in the event store), then **published** (via
/// the bus). If publication fails, events are still in the store and can be
/// republished, which is why at-least-once delivery is acceptable.
///
/// `publish()` failures are surfaced to the caller (typically the command
/// dispatcher), which may retry. The trait requires `Send + Sync`; multiple
/// threads can publish concurrently.
pub trait EventBus<E>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: E) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<E>;
}

impl<E, B> EventBus<E> for Arc<B>
where
    B: EventBus<E> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: E) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<E> {
        (**self).subscribe()
    }
}

#[derive(Debug)]
pub enum InMemoryBusError {
    /// A publisher panicked while holding the subscriber lock.
    Poisoned,
}

/// Process-local fan-out bus over std mpsc channels.
///
/// - No IO / no async
/// - Best-effort fan-out
/// - At-least-once acceptable (subscribers must be idempotent)
#[derive(Debug)]
pub struct InMemoryEventBus<E> {
    subscribers: Mutex<Vec<mpsc::Sender<E>>>,
}

impl<E> InMemoryEventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E> Default for InMemoryEventBus<E> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<E> EventBus<E> for InMemoryEventBus<E>
where
    E: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: E) -> Result<(), Self::Error> {
        let mut subs = self.subscribers.lock().map_err(|_| InMemoryBusError::Poisoned)?;

        // Send to every live subscriber; prune the ones whose receiver is gone.
        subs.retain(|tx| tx.send(message.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription<E> {
        let (tx, rx) = mpsc::channel();

        // A poisoned lock still yields a subscription; it just never
        // receives anything until the process restarts.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_fans_out_to_all_subscribers() {
        let bus: InMemoryEventBus<u64> = InMemoryEventBus::new();
        let sub_a = bus.subscribe();
        let sub_b = bus.subscribe();

        bus.publish(7).unwrap();
        bus.publish(8).unwrap();

        assert_eq!(sub_a.try_recv().unwrap(), 7);
        assert_eq!(sub_a.try_recv().unwrap(), 8);
        assert_eq!(sub_b.try_recv().unwrap(), 7);
        assert_eq!(sub_b.try_recv().unwrap(), 8);
    }

    #[test]
    fn dropped_subscribers_are_pruned_on_publish() {
        let bus: InMemoryEventBus<u64> = InMemoryEventBus::new();
        let sub_kept = bus.subscribe();
        {
            let _sub_dropped = bus.subscribe();
        }

        bus.publish(1).unwrap();

        assert_eq!(sub_kept.try_recv().unwrap(), 1);
        assert_eq!(bus.subscribers.lock().unwrap().len(), 1);
    }
}
