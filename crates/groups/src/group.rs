use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use splitledger_core::{
    AccountId, Aggregate, AggregateId, CategoryId, DomainError, EntryId, MemberId,
};
use splitledger_events::Event;

use crate::entry::{Account, ExpenseDetails, LedgerEntry, SplitShare, Transaction, TransactionKind};

/// Stream/aggregate type identifier for group streams.
pub const AGGREGATE_TYPE: &str = "groups.group";

/// Entry name used for payment entries.
pub const PAYMENT_ENTRY_NAME: &str = "Payment";

/// Group identifier (aggregate id).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub AggregateId);

impl GroupId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for GroupId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Group (shared expense ledger).
///
/// Note: Group does NOT hold entries or balances; it only tracks the membership
/// and categories needed to validate recording commands. Entries and balances
/// are derived from projections over recording events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    id: GroupId,
    name: String,
    access_code: String,
    created_by: Option<MemberId>,
    members: BTreeMap<MemberId, AccountId>,
    categories: BTreeMap<CategoryId, String>,
    version: u64,
    created: bool,
}

impl Group {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: GroupId) -> Self {
        Self {
            id,
            name: String::new(),
            access_code: String::new(),
            created_by: None,
            members: BTreeMap::new(),
            categories: BTreeMap::new(),
            version: 0,
            created: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access_code(&self) -> &str {
        &self.access_code
    }

    pub fn created_by(&self) -> Option<MemberId> {
        self.created_by
    }

    pub fn is_member(&self, member_id: MemberId) -> bool {
        self.members.contains_key(&member_id)
    }

    pub fn members(&self) -> &BTreeMap<MemberId, AccountId> {
        &self.members
    }

    pub fn categories(&self) -> &BTreeMap<CategoryId, String> {
        &self.categories
    }

    /// Snapshot of all member accounts, ordered by ascending member id.
    pub fn accounts(&self) -> Vec<Account> {
        self.members
            .iter()
            .map(|(member_id, account_id)| Account {
                account_id: *account_id,
                member_id: *member_id,
            })
            .collect()
    }
}

/// Command: CreateGroup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGroup {
    pub group_id: GroupId,
    pub name: String,
    pub access_code: String,
    pub created_by: MemberId,
    /// Account opened for the creating member.
    pub creator_account_id: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: JoinGroup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinGroup {
    pub group_id: GroupId,
    pub member_id: MemberId,
    /// Account opened for the joining member.
    pub account_id: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddCategory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddCategory {
    pub group_id: GroupId,
    pub category_id: CategoryId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment.
///
/// A direct transfer from `sender` to `receiver`: the sender is debited and the
/// receiver credited by the full amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub group_id: GroupId,
    pub entry_id: EntryId,
    pub sender: MemberId,
    pub receiver: MemberId,
    /// Positive amount in smallest unit.
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordExpense.
///
/// A shared expense: each payer is debited their paid share, each beneficiary
/// credited their benefited share. Both sides must sum to `amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordExpense {
    pub group_id: GroupId,
    pub entry_id: EntryId,
    pub name: String,
    /// Positive total amount in smallest unit.
    pub amount: i64,
    pub created_by: MemberId,
    pub paid_by: Vec<SplitShare>,
    pub benefited: Vec<SplitShare>,
    pub category_id: Option<CategoryId>,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupCommand {
    CreateGroup(CreateGroup),
    JoinGroup(JoinGroup),
    AddCategory(AddCategory),
    RecordPayment(RecordPayment),
    RecordExpense(RecordExpense),
}

/// Event: GroupCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCreated {
    pub group_id: GroupId,
    pub name: String,
    pub access_code: String,
    pub created_by: MemberId,
    pub creator_account_id: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MemberJoined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberJoined {
    pub group_id: GroupId,
    pub member_id: MemberId,
    pub account_id: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CategoryAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAdded {
    pub group_id: GroupId,
    pub category_id: CategoryId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
///
/// Carries the entry and both transactions as one immutable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub group_id: GroupId,
    pub entry: LedgerEntry,
    pub debit: Transaction,
    pub credit: Transaction,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ExpenseRecorded.
///
/// Carries the entry, all split transactions (debits first, then credits), and
/// the expense annotation as one immutable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecorded {
    pub group_id: GroupId,
    pub entry: LedgerEntry,
    pub transactions: Vec<Transaction>,
    pub details: ExpenseDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupEvent {
    GroupCreated(GroupCreated),
    MemberJoined(MemberJoined),
    CategoryAdded(CategoryAdded),
    PaymentRecorded(PaymentRecorded),
    ExpenseRecorded(ExpenseRecorded),
}

impl GroupEvent {
    /// The group stream this event belongs to.
    pub fn group_id(&self) -> GroupId {
        match self {
            GroupEvent::GroupCreated(e) => e.group_id,
            GroupEvent::MemberJoined(e) => e.group_id,
            GroupEvent::CategoryAdded(e) => e.group_id,
            GroupEvent::PaymentRecorded(e) => e.group_id,
            GroupEvent::ExpenseRecorded(e) => e.group_id,
        }
    }
}

impl Event for GroupEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GroupEvent::GroupCreated(_) => "groups.group.created",
            GroupEvent::MemberJoined(_) => "groups.group.member_joined",
            GroupEvent::CategoryAdded(_) => "groups.group.category_added",
            GroupEvent::PaymentRecorded(_) => "groups.group.payment_recorded",
            GroupEvent::ExpenseRecorded(_) => "groups.group.expense_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GroupEvent::GroupCreated(e) => e.occurred_at,
            GroupEvent::MemberJoined(e) => e.occurred_at,
            GroupEvent::CategoryAdded(e) => e.occurred_at,
            GroupEvent::PaymentRecorded(e) => e.occurred_at,
            GroupEvent::ExpenseRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Group {
    type Id = GroupId;
    type Command = GroupCommand;
    type Event = GroupEvent;
    type Error = DomainError;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            GroupEvent::GroupCreated(e) => {
                self.id = e.group_id;
                self.name = e.name.clone();
                self.access_code = e.access_code.clone();
                self.created_by = Some(e.created_by);
                self.members.insert(e.created_by, e.creator_account_id);
                self.created = true;
            }
            GroupEvent::MemberJoined(e) => {
                self.members.insert(e.member_id, e.account_id);
            }
            GroupEvent::CategoryAdded(e) => {
                self.categories.insert(e.category_id, e.name.clone());
            }
            // Recording events do not change validation state; entries and
            // balances live in projections.
            GroupEvent::PaymentRecorded(_) => {}
            GroupEvent::ExpenseRecorded(_) => {}
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            GroupCommand::CreateGroup(cmd) => self.handle_create(cmd),
            GroupCommand::JoinGroup(cmd) => self.handle_join(cmd),
            GroupCommand::AddCategory(cmd) => self.handle_add_category(cmd),
            GroupCommand::RecordPayment(cmd) => self.handle_record_payment(cmd),
            GroupCommand::RecordExpense(cmd) => self.handle_record_expense(cmd),
        }
    }
}

impl Group {
    fn ensure_group_id(&self, group_id: GroupId) -> Result<(), DomainError> {
        if self.id != group_id {
            return Err(DomainError::invariant("group_id mismatch"));
        }
        Ok(())
    }

    fn ensure_members<'a>(
        &self,
        member_ids: impl IntoIterator<Item = &'a MemberId>,
    ) -> Result<(), DomainError> {
        let mut missing: Vec<MemberId> = Vec::new();
        for id in member_ids {
            if !self.members.contains_key(id) && !missing.contains(id) {
                missing.push(*id);
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            let missing = missing
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            Err(DomainError::invalid_membership(format!(
                "not all users are group members (missing: {missing})"
            )))
        }
    }

    fn account(&self, member_id: MemberId) -> Result<Account, DomainError> {
        let account_id = self.members.get(&member_id).ok_or_else(|| {
            DomainError::invalid_membership(format!("{member_id} is not a group member"))
        })?;

        Ok(Account {
            account_id: *account_id,
            member_id,
        })
    }

    fn handle_create(&self, cmd: &CreateGroup) -> Result<Vec<GroupEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("group already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.access_code.trim().is_empty() {
            return Err(DomainError::validation("access code cannot be empty"));
        }

        Ok(vec![GroupEvent::GroupCreated(GroupCreated {
            group_id: cmd.group_id,
            name: cmd.name.clone(),
            access_code: cmd.access_code.clone(),
            created_by: cmd.created_by,
            creator_account_id: cmd.creator_account_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_join(&self, cmd: &JoinGroup) -> Result<Vec<GroupEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_group_id(cmd.group_id)?;

        if self.is_member(cmd.member_id) {
            return Err(DomainError::conflict("member already joined"));
        }

        Ok(vec![GroupEvent::MemberJoined(MemberJoined {
            group_id: cmd.group_id,
            member_id: cmd.member_id,
            account_id: cmd.account_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_category(&self, cmd: &AddCategory) -> Result<Vec<GroupEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_group_id(cmd.group_id)?;

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("category name cannot be empty"));
        }
        if self.categories.contains_key(&cmd.category_id) {
            return Err(DomainError::conflict("category already exists"));
        }

        Ok(vec![GroupEvent::CategoryAdded(CategoryAdded {
            group_id: cmd.group_id,
            category_id: cmd.category_id,
            name: cmd.name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_payment(&self, cmd: &RecordPayment) -> Result<Vec<GroupEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_group_id(cmd.group_id)?;

        if cmd.amount <= 0 {
            return Err(DomainError::validation("amount must be positive"));
        }

        self.ensure_members([&cmd.sender, &cmd.receiver])?;

        let sender_account = self.account(cmd.sender)?;
        let receiver_account = self.account(cmd.receiver)?;

        let entry = LedgerEntry {
            entry_id: cmd.entry_id,
            name: PAYMENT_ENTRY_NAME.to_string(),
            amount: cmd.amount,
            created_by: cmd.sender,
            created_at: cmd.occurred_at,
        };

        let debit = Transaction {
            account: sender_account,
            kind: TransactionKind::Debit,
            amount: cmd.amount,
        };
        let credit = Transaction {
            account: receiver_account,
            kind: TransactionKind::Credit,
            amount: cmd.amount,
        };

        Ok(vec![GroupEvent::PaymentRecorded(PaymentRecorded {
            group_id: cmd.group_id,
            entry,
            debit,
            credit,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_expense(&self, cmd: &RecordExpense) -> Result<Vec<GroupEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_group_id(cmd.group_id)?;

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.amount <= 0 {
            return Err(DomainError::validation("amount must be positive"));
        }
        if cmd.paid_by.is_empty() || cmd.benefited.is_empty() {
            return Err(DomainError::validation("expense split cannot be empty"));
        }
        for share in cmd.paid_by.iter().chain(cmd.benefited.iter()) {
            if share.amount <= 0 {
                return Err(DomainError::validation("share amounts must be positive"));
            }
        }
        if let Some(category_id) = cmd.category_id {
            if !self.categories.contains_key(&category_id) {
                return Err(DomainError::validation(format!(
                    "unknown category: {category_id}"
                )));
            }
        }

        self.ensure_members(
            cmd.paid_by
                .iter()
                .map(|s| &s.member_id)
                .chain(cmd.benefited.iter().map(|s| &s.member_id)),
        )?;

        let paid_total: i128 = cmd.paid_by.iter().map(|s| s.amount as i128).sum();
        let benefited_total: i128 = cmd.benefited.iter().map(|s| s.amount as i128).sum();

        if paid_total != cmd.amount as i128 {
            return Err(DomainError::amount_mismatch(format!(
                "paid shares sum to {paid_total}, expense amount is {}",
                cmd.amount
            )));
        }
        if benefited_total != cmd.amount as i128 {
            return Err(DomainError::amount_mismatch(format!(
                "benefited shares sum to {benefited_total}, expense amount is {}",
                cmd.amount
            )));
        }

        let mut transactions = Vec::with_capacity(cmd.paid_by.len() + cmd.benefited.len());
        for share in &cmd.paid_by {
            transactions.push(Transaction {
                account: self.account(share.member_id)?,
                kind: TransactionKind::Debit,
                amount: share.amount,
            });
        }
        for share in &cmd.benefited {
            transactions.push(Transaction {
                account: self.account(share.member_id)?,
                kind: TransactionKind::Credit,
                amount: share.amount,
            });
        }

        let entry = LedgerEntry {
            entry_id: cmd.entry_id,
            name: cmd.name.clone(),
            amount: cmd.amount,
            created_by: cmd.created_by,
            created_at: cmd.occurred_at,
        };

        let details = ExpenseDetails {
            description: cmd.description.clone(),
            category_id: cmd.category_id,
        };

        Ok(vec![GroupEvent::ExpenseRecorded(ExpenseRecorded {
            group_id: cmd.group_id,
            entry,
            transactions,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }
}
