//! Shared-expense ledger service (the library facade).
//!
//! `LedgerService` owns the command dispatcher and the two read-model
//! projections, and exposes the operations of the system: creating and joining
//! groups, recording payments and expenses, and querying balances, settlement
//! suggestions and entry history.
//!
//! The service assigns identifiers (UUIDv7) and timestamps on behalf of
//! callers, dispatches commands through the event-sourcing pipeline, and folds
//! committed events into its projections before returning so that reads
//! through the same service are read-your-writes. The event bus still carries
//! every committed envelope to external subscribers.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;

use splitledger_core::{AccountId, AggregateId, CategoryId, EntryId, MemberId};
use splitledger_events::{Event, EventBus, EventEnvelope};
use splitledger_groups::{
    AddCategory, CreateGroup, Group, GroupCommand, GroupEvent, GroupId, JoinGroup, LedgerEntry,
    RecordExpense, RecordPayment, SplitShare, Transaction,
};
use splitledger_settlement::{MemberBalance, SettlementTransfer, suggest_settlements};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};
use crate::projections::{EntryRecord, GroupBalancesProjection, GroupEntriesProjection};
use crate::read_model::InMemoryGroupStore;

#[derive(Debug)]
pub enum ServiceError {
    /// Command execution failed (domain, concurrency or store error).
    Dispatch(DispatchError),
    /// A committed event could not be folded into a projection.
    Projection(String),
    /// A committed event payload could not be decoded into the result type.
    Decode(String),
}

impl From<DispatchError> for ServiceError {
    fn from(value: DispatchError) -> Self {
        ServiceError::Dispatch(value)
    }
}

/// A recorded payment: the entry plus its two transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPayment {
    pub entry: LedgerEntry,
    pub debit: Transaction,
    pub credit: Transaction,
}

/// Caller input for recording an expense.
///
/// The service assigns the entry id and timestamp; everything else is taken
/// verbatim and validated by the group aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseDraft {
    pub name: String,
    /// Positive total amount in smallest unit.
    pub amount: i64,
    pub created_by: MemberId,
    pub paid_by: Vec<SplitShare>,
    pub benefited: Vec<SplitShare>,
    pub category_id: Option<CategoryId>,
    pub description: Option<String>,
}

type BalancesStore = Arc<InMemoryGroupStore<MemberId, MemberBalance>>;
type EntriesStore = Arc<InMemoryGroupStore<EntryId, EntryRecord>>;

/// Application service for shared expense groups.
///
/// Generic over the event store `S` and event bus `B`, like the dispatcher it
/// wraps; tests and embedded use run on the in-memory implementations.
#[derive(Debug)]
pub struct LedgerService<S, B> {
    dispatcher: CommandDispatcher<S, B>,
    balances_projection: GroupBalancesProjection<BalancesStore>,
    entries_projection: GroupEntriesProjection<EntriesStore>,
}

impl<S, B> LedgerService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store, bus),
            balances_projection: GroupBalancesProjection::new(Arc::new(InMemoryGroupStore::new())),
            entries_projection: GroupEntriesProjection::new(Arc::new(InMemoryGroupStore::new())),
        }
    }

    /// Create a group and open an account for its creator.
    ///
    /// The creator becomes the first member.
    pub fn create_group(
        &self,
        name: impl Into<String>,
        access_code: impl Into<String>,
        created_by: MemberId,
    ) -> Result<GroupId, ServiceError> {
        let group_id = GroupId::new(AggregateId::new());
        let command = GroupCommand::CreateGroup(CreateGroup {
            group_id,
            name: name.into(),
            access_code: access_code.into(),
            created_by,
            creator_account_id: AccountId::new(),
            occurred_at: Utc::now(),
        });

        self.execute(group_id, command)?;
        tracing::info!("group {} created by member {}", group_id, created_by);
        Ok(group_id)
    }

    /// Add a member to a group, opening an account for them.
    ///
    /// Returns the id of the new account.
    pub fn join_group(
        &self,
        group_id: GroupId,
        member_id: MemberId,
    ) -> Result<AccountId, ServiceError> {
        let account_id = AccountId::new();
        let command = GroupCommand::JoinGroup(JoinGroup {
            group_id,
            member_id,
            account_id,
            occurred_at: Utc::now(),
        });

        self.execute(group_id, command)?;
        tracing::info!("member {} joined group {}", member_id, group_id);
        Ok(account_id)
    }

    /// Register an expense category for a group.
    pub fn add_category(
        &self,
        group_id: GroupId,
        name: impl Into<String>,
    ) -> Result<CategoryId, ServiceError> {
        let category_id = CategoryId::new();
        let command = GroupCommand::AddCategory(AddCategory {
            group_id,
            category_id,
            name: name.into(),
            occurred_at: Utc::now(),
        });

        self.execute(group_id, command)?;
        Ok(category_id)
    }

    /// Record a direct transfer from `sender` to `receiver`.
    pub fn record_payment(
        &self,
        group_id: GroupId,
        sender: MemberId,
        receiver: MemberId,
        amount: i64,
    ) -> Result<RecordedPayment, ServiceError> {
        let command = GroupCommand::RecordPayment(RecordPayment {
            group_id,
            entry_id: EntryId::new(),
            sender,
            receiver,
            amount,
            occurred_at: Utc::now(),
        });

        let committed = self.execute(group_id, command)?;
        match decode_event(&committed)? {
            GroupEvent::PaymentRecorded(e) => {
                tracing::info!("payment of {} recorded in group {}", amount, group_id);
                Ok(RecordedPayment {
                    entry: e.entry,
                    debit: e.debit,
                    credit: e.credit,
                })
            }
            other => Err(ServiceError::Decode(format!(
                "expected payment_recorded event, got {}",
                other.event_type()
            ))),
        }
    }

    /// Record a shared expense split across members.
    pub fn record_expense(
        &self,
        group_id: GroupId,
        draft: ExpenseDraft,
    ) -> Result<LedgerEntry, ServiceError> {
        let command = GroupCommand::RecordExpense(RecordExpense {
            group_id,
            entry_id: EntryId::new(),
            name: draft.name,
            amount: draft.amount,
            created_by: draft.created_by,
            paid_by: draft.paid_by,
            benefited: draft.benefited,
            category_id: draft.category_id,
            description: draft.description,
            occurred_at: Utc::now(),
        });

        let committed = self.execute(group_id, command)?;
        match decode_event(&committed)? {
            GroupEvent::ExpenseRecorded(e) => {
                tracing::info!(
                    "expense '{}' of {} recorded in group {}",
                    e.entry.name,
                    e.entry.amount,
                    group_id
                );
                Ok(e.entry)
            }
            other => Err(ServiceError::Decode(format!(
                "expected expense_recorded event, got {}",
                other.event_type()
            ))),
        }
    }

    /// Net balance per member, ordered by ascending member id.
    ///
    /// Balances of a group always sum to zero.
    pub fn balances(&self, group_id: GroupId) -> Vec<MemberBalance> {
        self.balances_projection.list(group_id)
    }

    /// Transfers that would settle the group.
    pub fn suggest_settlements(&self, group_id: GroupId) -> Vec<SettlementTransfer> {
        suggest_settlements(&self.balances_projection.list(group_id))
    }

    /// Everything recorded in a group, in creation order.
    pub fn list_entries(&self, group_id: GroupId) -> Vec<EntryRecord> {
        self.entries_projection.list(group_id)
    }

    fn execute(
        &self,
        group_id: GroupId,
        command: GroupCommand,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        let committed = self.dispatcher.dispatch(
            group_id.0,
            splitledger_groups::AGGREGATE_TYPE,
            command,
            |id| Group::empty(GroupId::new(id)),
        )?;

        // Fold the committed events into our own projections before returning,
        // so reads through this service observe the write. The bus has already
        // carried the same envelopes to any external subscribers.
        for stored in &committed {
            let envelope = stored.to_envelope();
            self.balances_projection
                .apply_envelope(&envelope)
                .map_err(|e| ServiceError::Projection(e.to_string()))?;
            self.entries_projection
                .apply_envelope(&envelope)
                .map_err(|e| ServiceError::Projection(e.to_string()))?;
        }

        Ok(committed)
    }
}

fn decode_event(committed: &[StoredEvent]) -> Result<GroupEvent, ServiceError> {
    let stored = committed
        .first()
        .ok_or_else(|| ServiceError::Decode("no committed events".to_string()))?;

    serde_json::from_value(stored.payload.clone()).map_err(|e| ServiceError::Decode(e.to_string()))
}
