//! Ledger entry value objects.
//!
//! An entry is a named, dated financial event (a payment or an expense) with a
//! total amount. It owns a set of transactions: signed movements against member
//! accounts. All amounts are in the smallest currency unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use splitledger_core::{AccountId, CategoryId, EntryId, MemberId};

/// Side of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Debit,
    Credit,
}

/// A member's account within one group (the target of transactions).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub account_id: AccountId,
    pub member_id: MemberId,
}

/// One movement within a ledger entry (immutable).
///
/// Transactions carry no identity of their own; they are lines owned by the
/// entry that recorded them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub account: Account,
    pub kind: TransactionKind,
    /// Positive amount in smallest unit (e.g., cents).
    pub amount: i64,
}

impl Transaction {
    /// Net effect on the target member's balance (debit positive, credit negative).
    ///
    /// A debit marks money put in by the member (the group owes them more); a
    /// credit marks value received (they owe the group more).
    pub fn signed_amount(&self) -> i64 {
        match self.kind {
            TransactionKind::Debit => self.amount,
            TransactionKind::Credit => -self.amount,
        }
    }
}

/// A named, dated financial event belonging to one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,
    pub name: String,
    /// Total entry amount in smallest unit.
    pub amount: i64,
    pub created_by: MemberId,
    pub created_at: DateTime<Utc>,
}

/// One member's share of an expense split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitShare {
    pub member_id: MemberId,
    /// Positive amount in smallest unit.
    pub amount: i64,
}

/// Annotation attached to expense entries (not payments).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExpenseDetails {
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
}
