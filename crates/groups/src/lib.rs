//! Groups domain module (shared expense ledgers, event-sourced).
//!
//! This crate contains business rules for expense groups: membership, double-entry
//! recording of payments and expenses, implemented purely as deterministic domain
//! logic (no IO, no HTTP, no storage).

pub mod entry;
pub mod group;

pub use entry::{Account, ExpenseDetails, LedgerEntry, SplitShare, Transaction, TransactionKind};
pub use group::{
    AddCategory, CategoryAdded, CreateGroup, ExpenseRecorded, Group, GroupCommand, GroupCreated,
    GroupEvent, GroupId, JoinGroup, MemberJoined, PaymentRecorded, RecordExpense, RecordPayment,
    AGGREGATE_TYPE, PAYMENT_ENTRY_NAME,
};
