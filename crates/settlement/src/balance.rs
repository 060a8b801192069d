//! Net member balances, folded from transactions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use splitledger_core::MemberId;
use splitledger_groups::{Account, Transaction};

/// A member's net position within one group.
///
/// Positive means the member is owed money by the group; negative means the
/// member owes the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberBalance {
    pub member_id: MemberId,
    /// Net balance in smallest unit (debit positive, credit negative).
    pub balance: i64,
}

/// Fold transactions into per-member net balances.
///
/// Every account is seeded at zero, so members without activity still appear
/// in the result. Output is ordered by ascending member id.
pub fn compute_balances(accounts: &[Account], transactions: &[Transaction]) -> Vec<MemberBalance> {
    let mut balances: BTreeMap<MemberId, i64> = BTreeMap::new();

    for account in accounts {
        balances.entry(account.member_id).or_insert(0);
    }
    for tx in transactions {
        *balances.entry(tx.account.member_id).or_insert(0) += tx.signed_amount();
    }

    balances
        .into_iter()
        .map(|(member_id, balance)| MemberBalance { member_id, balance })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitledger_core::AccountId;
    use splitledger_groups::TransactionKind;

    fn account(member_id: MemberId) -> Account {
        Account {
            account_id: AccountId::new(),
            member_id,
        }
    }

    fn tx(account: Account, kind: TransactionKind, amount: i64) -> Transaction {
        Transaction {
            account,
            kind,
            amount,
        }
    }

    #[test]
    fn folds_debits_and_credits_per_member() {
        let a = account(MemberId::new());
        let b = account(MemberId::new());
        let accounts = [a, b];

        // a paid 100 for b: a is debited, b credited.
        let transactions = [
            tx(a, TransactionKind::Debit, 100),
            tx(b, TransactionKind::Credit, 100),
            // b pays 40 back.
            tx(b, TransactionKind::Debit, 40),
            tx(a, TransactionKind::Credit, 40),
        ];

        let balances = compute_balances(&accounts, &transactions);
        let by_id: BTreeMap<MemberId, i64> =
            balances.iter().map(|mb| (mb.member_id, mb.balance)).collect();

        // a is still owed 60; b still owes 60.
        assert_eq!(by_id[&a.member_id], 60);
        assert_eq!(by_id[&b.member_id], -60);
    }

    #[test]
    fn seeds_inactive_members_at_zero() {
        let active = account(MemberId::new());
        let idle = account(MemberId::new());
        let transactions = [tx(active, TransactionKind::Credit, 10)];

        let balances = compute_balances(&[active, idle], &transactions);

        assert_eq!(balances.len(), 2);
        assert!(balances
            .iter()
            .any(|b| b.member_id == idle.member_id && b.balance == 0));
    }

    #[test]
    fn orders_by_ascending_member_id() {
        let mut accounts: Vec<Account> = (0..5).map(|_| account(MemberId::new())).collect();
        accounts.reverse();

        let balances = compute_balances(&accounts, &[]);

        let ids: Vec<MemberId> = balances.iter().map(|b| b.member_id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn balanced_entries_sum_to_zero() {
        let members: Vec<Account> = (0..4).map(|_| account(MemberId::new())).collect();

        // One expense: members[0] paid 90, three members benefit 30 each; the
        // fourth has no transactions and stays at zero.
        let transactions = [
            tx(members[0], TransactionKind::Debit, 90),
            tx(members[0], TransactionKind::Credit, 30),
            tx(members[1], TransactionKind::Credit, 30),
            tx(members[2], TransactionKind::Credit, 30),
        ];

        let balances = compute_balances(&members, &transactions);
        let total: i64 = balances.iter().map(|b| b.balance).sum();
        assert_eq!(total, 0);
    }
}
