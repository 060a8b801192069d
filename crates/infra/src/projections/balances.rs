//! Group balances projection.
//!
//! Maintains per-member net balances for each group, folded incrementally from
//! recording events. The settlement planner runs over this read model.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use splitledger_core::{AggregateId, MemberId};
use splitledger_events::EventEnvelope;
use splitledger_groups::{GroupEvent, GroupId, Transaction};
use splitledger_settlement::MemberBalance;

use crate::read_model::GroupStore;

#[derive(Debug, Error)]
pub enum BalancesProjectionError {
    #[error("failed to deserialize group event: {0}")]
    Deserialize(String),

    #[error("stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Projection: group events → per-member net balances.
///
/// Members are seeded at zero when they get an account (group creation / join),
/// and every recorded transaction moves its member's balance by the signed
/// amount. Because every entry's transactions are balanced, the balances of a
/// group always sum to zero.
#[derive(Debug)]
pub struct GroupBalancesProjection<S>
where
    S: GroupStore<MemberId, MemberBalance>,
{
    store: S,
    /// Per-stream cursor to support at-least-once delivery (idempotent apply).
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> GroupBalancesProjection<S>
where
    S: GroupStore<MemberId, MemberBalance>,
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

    /// Balance of one member within a group.
    pub fn get(&self, group_id: GroupId, member_id: &MemberId) -> Option<MemberBalance> {
        self.store.get(group_id, member_id)
    }

    /// All balances of a group, ordered by ascending member id.
    pub fn list(&self, group_id: GroupId) -> Vec<MemberBalance> {
        let mut balances = self.store.list(group_id);
        balances.sort_by_key(|b| b.member_id);
        balances
    }

    fn seed_member(&self, group_id: GroupId, member_id: MemberId) {
        if self.store.get(group_id, &member_id).is_none() {
            self.store.upsert(
                group_id,
                member_id,
                MemberBalance {
                    member_id,
                    balance: 0,
                },
            );
        }
    }

    fn apply_transaction(&self, group_id: GroupId, tx: &Transaction) {
        let member_id = tx.account.member_id;
        let mut balance = self.store.get(group_id, &member_id).unwrap_or(MemberBalance {
            member_id,
            balance: 0,
        });

        // Debit positive, credit negative.
        balance.balance += tx.signed_amount();
        self.store.upsert(group_id, member_id, balance);
    }

    /// Apply a published envelope into the projection.
    ///
    /// - Ignores non-group aggregates (allows sharing a bus across modules).
    /// - Enforces monotonic sequence per stream.
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored).
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), BalancesProjectionError> {
        if envelope.aggregate_type() != splitledger_groups::AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.get_cursor(aggregate_id);

        if seq == 0 {
            return Err(BalancesProjectionError::NonMonotonicSequence { last, found: seq });
        }

        if seq <= last {
            // Duplicate or replay; safe to ignore.
            return Ok(());
        }

        if seq != last + 1 && last != 0 {
            // The first event may carry any positive sequence; after that we
            // enforce strict monotonic increments.
            return Err(BalancesProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let event: GroupEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| BalancesProjectionError::Deserialize(e.to_string()))?;

        let group_id = event.group_id();
        if group_id.0 != aggregate_id {
            return Err(BalancesProjectionError::StreamMismatch(
                "event group_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            GroupEvent::GroupCreated(e) => {
                self.seed_member(group_id, e.created_by);
            }
            GroupEvent::MemberJoined(e) => {
                self.seed_member(group_id, e.member_id);
            }
            GroupEvent::CategoryAdded(_) => {}
            GroupEvent::PaymentRecorded(e) => {
                self.apply_transaction(group_id, &e.debit);
                self.apply_transaction(group_id, &e.credit);
            }
            GroupEvent::ExpenseRecorded(e) => {
                for tx in &e.transactions {
                    self.apply_transaction(group_id, tx);
                }
            }
        }

        // Advance cursor after successful apply.
        self.update_cursor(aggregate_id, seq);

        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), BalancesProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        // Clear read model and cursor per group before rebuilding.
        {
            let mut groups = envs.iter().map(|e| e.aggregate_id()).collect::<Vec<_>>();
            groups.sort_by_key(|g| *g.as_uuid().as_bytes());
            groups.dedup();
            for g in groups {
                self.store.clear_group(GroupId::new(g));
                self.clear_cursor(g);
            }
        }

        // Deterministic replay order: aggregate, then sequence.
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
