//! Group entries projection.
//!
//! Read-only history of everything recorded in a group: each payment and
//! expense entry together with its transactions and, for expenses, the
//! annotation (description, category).

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use splitledger_core::{AggregateId, EntryId};
use splitledger_events::EventEnvelope;
use splitledger_groups::{ExpenseDetails, GroupEvent, GroupId, LedgerEntry, Transaction};

use crate::read_model::GroupStore;

/// Read model: one recorded entry with its transactions.
///
/// `details` is present for expenses and absent for payments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub entry: LedgerEntry,
    pub transactions: Vec<Transaction>,
    pub details: Option<ExpenseDetails>,
}

#[derive(Debug, Error)]
pub enum EntriesProjectionError {
    #[error("failed to deserialize group event: {0}")]
    Deserialize(String),

    #[error("stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Projection: group events → per-group entry history.
#[derive(Debug)]
pub struct GroupEntriesProjection<S>
where
    S: GroupStore<EntryId, EntryRecord>,
{
    store: S,
    /// Per-stream cursor to support at-least-once delivery (idempotent apply).
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> GroupEntriesProjection<S>
where
    S: GroupStore<EntryId, EntryRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    fn get_cursor(&self, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => *cursors.get(&aggregate_id).unwrap_or(&0),
            Err(_) => 0,
        }
    }

    fn update_cursor(&self, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(aggregate_id, sequence_number);
        }
    }

    fn clear_cursor(&self, aggregate_id: AggregateId) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.remove(&aggregate_id);
        }
    }

    /// One entry by id.
    pub fn get(&self, group_id: GroupId, entry_id: &EntryId) -> Option<EntryRecord> {
        self.store.get(group_id, entry_id)
    }

    /// All entries of a group, ordered by ascending entry id.
    ///
    /// Entry ids are UUIDv7, so this is creation-time order.
    pub fn list(&self, group_id: GroupId) -> Vec<EntryRecord> {
        let mut entries = self.store.list(group_id);
        entries.sort_by_key(|r| r.entry.entry_id);
        entries
    }

    /// Apply a published envelope into the projection.
    ///
    /// Same delivery contract as the balances projection: non-group aggregates
    /// are ignored, sequences must be monotonic per stream, and replays at or
    /// below the cursor are no-ops.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), EntriesProjectionError> {
        if envelope.aggregate_type() != splitledger_groups::AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.get_cursor(aggregate_id);

        if seq == 0 {
            return Err(EntriesProjectionError::NonMonotonicSequence { last, found: seq });
        }

        if seq <= last {
            return Ok(());
        }

        if seq != last + 1 && last != 0 {
            return Err(EntriesProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let event: GroupEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| EntriesProjectionError::Deserialize(e.to_string()))?;

        let group_id = event.group_id();
        if group_id.0 != aggregate_id {
            return Err(EntriesProjectionError::StreamMismatch(
                "event group_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            GroupEvent::GroupCreated(_)
            | GroupEvent::MemberJoined(_)
            | GroupEvent::CategoryAdded(_) => {}
            GroupEvent::PaymentRecorded(e) => {
                self.store.upsert(
                    group_id,
                    e.entry.entry_id,
                    EntryRecord {
                        entry: e.entry,
                        transactions: vec![e.debit, e.credit],
                        details: None,
                    },
                );
            }
            GroupEvent::ExpenseRecorded(e) => {
                self.store.upsert(
                    group_id,
                    e.entry.entry_id,
                    EntryRecord {
                        entry: e.entry,
                        transactions: e.transactions,
                        details: Some(e.details),
                    },
                );
            }
        }

        self.update_cursor(aggregate_id, seq);

        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), EntriesProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        {
            let mut groups = envs.iter().map(|e| e.aggregate_id()).collect::<Vec<_>>();
            groups.sort_by_key(|g| *g.as_uuid().as_bytes());
            groups.dedup();
            for g in groups {
                self.store.clear_group(GroupId::new(g));
                self.clear_cursor(g);
            }
        }

        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
