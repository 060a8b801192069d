//! Settlement planning: which transfers square the group up.

use serde::{Deserialize, Serialize};

use splitledger_core::MemberId;

use crate::balance::MemberBalance;

/// A suggested transfer from one member to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementTransfer {
    pub payer: MemberId,
    pub receiver: MemberId,
    /// Positive amount in smallest unit.
    pub amount: i64,
}

/// Plan the transfers that settle all balances.
///
/// Greedy: repeatedly match the member owing the most against the member owed
/// the most, settle the debtor in full, and drop them from the pool. Zero-sum
/// input (which balanced ledger entries guarantee) yields at most `n - 1`
/// transfers for `n` members, all with positive amounts. Ties go to the lowest
/// member id on both sides, so the plan is deterministic for a given input set.
pub fn suggest_settlements(balances: &[MemberBalance]) -> Vec<SettlementTransfer> {
    let mut remaining: Vec<MemberBalance> = balances.to_vec();
    // Ascending member id; the strict comparisons below then keep the
    // first-seen (lowest) id on ties.
    remaining.sort_by_key(|b| b.member_id);

    let mut transfers = Vec::new();

    while remaining.len() > 1 {
        let mut ower = 0;
        let mut lender = 0;
        for (i, candidate) in remaining.iter().enumerate() {
            if candidate.balance < remaining[ower].balance {
                ower = i;
            }
            if candidate.balance > remaining[lender].balance {
                lender = i;
            }
        }

        // For zero-sum input the minimum is negative whenever any balance is
        // non-zero, so a zero here means everyone is settled already.
        let owed = remaining[ower].balance;
        if owed != 0 {
            transfers.push(SettlementTransfer {
                payer: remaining[ower].member_id,
                receiver: remaining[lender].member_id,
                amount: owed.abs(),
            });
            remaining[lender].balance -= owed.abs();
        }
        remaining.remove(ower);
    }

    transfers
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    /// Member ids with a fixed, known ordering (UUIDv7 ids order by their
    /// byte representation, so low u128 values sort first).
    fn member(n: u128) -> MemberId {
        MemberId::from_uuid(Uuid::from_u128(n))
    }

    fn balance(member_id: MemberId, balance: i64) -> MemberBalance {
        MemberBalance { member_id, balance }
    }

    /// Apply a transfer plan back onto the balances: paying raises the payer's
    /// balance, receiving lowers the receiver's.
    fn apply_transfers(
        balances: &[MemberBalance],
        transfers: &[SettlementTransfer],
    ) -> BTreeMap<MemberId, i64> {
        let mut by_id: BTreeMap<MemberId, i64> =
            balances.iter().map(|b| (b.member_id, b.balance)).collect();
        for t in transfers {
            *by_id.get_mut(&t.payer).unwrap() += t.amount;
            *by_id.get_mut(&t.receiver).unwrap() -= t.amount;
        }
        by_id
    }

    #[test]
    fn settles_three_member_group() {
        let (a, b, c) = (member(1), member(2), member(3));
        let balances = [balance(a, -30), balance(b, 10), balance(c, 20)];

        let transfers = suggest_settlements(&balances);

        assert_eq!(
            transfers,
            vec![
                SettlementTransfer {
                    payer: a,
                    receiver: c,
                    amount: 30,
                },
                SettlementTransfer {
                    payer: c,
                    receiver: b,
                    amount: 10,
                },
            ]
        );

        let settled = apply_transfers(&balances, &transfers);
        assert!(settled.values().all(|&v| v == 0));
    }

    #[test]
    fn two_members_settle_in_one_transfer() {
        let (a, b) = (member(1), member(2));
        let transfers = suggest_settlements(&[balance(a, 55), balance(b, -55)]);

        assert_eq!(
            transfers,
            vec![SettlementTransfer {
                payer: b,
                receiver: a,
                amount: 55,
            }]
        );
    }

    #[test]
    fn ties_go_to_the_lowest_member_id() {
        let (a, b, c) = (member(1), member(2), member(3));
        // b and c are owed the same amount; b has the lower id and is paid first.
        let balances = [balance(a, -10), balance(b, 5), balance(c, 5)];

        let transfers = suggest_settlements(&balances);

        assert_eq!(
            transfers,
            vec![
                SettlementTransfer {
                    payer: a,
                    receiver: b,
                    amount: 10,
                },
                SettlementTransfer {
                    payer: b,
                    receiver: c,
                    amount: 5,
                },
            ]
        );
    }

    #[test]
    fn plan_is_independent_of_input_order() {
        let (a, b, c, d) = (member(1), member(2), member(3), member(4));
        let forward = [balance(a, -25), balance(b, -5), balance(c, 10), balance(d, 20)];
        let mut reversed = forward;
        reversed.reverse();

        assert_eq!(suggest_settlements(&forward), suggest_settlements(&reversed));
    }

    #[test]
    fn settled_group_needs_no_transfers() {
        let balances = [balance(member(1), 0), balance(member(2), 0)];
        assert!(suggest_settlements(&balances).is_empty());
    }

    #[test]
    fn empty_and_single_member_groups_need_no_transfers() {
        assert!(suggest_settlements(&[]).is_empty());
        assert!(suggest_settlements(&[balance(member(1), 0)]).is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: for zero-sum balances the plan settles every member with
        /// at most `n - 1` positive transfers.
        #[test]
        fn plan_settles_any_zero_sum_balances(
            amounts in prop::collection::vec(-1_000_000i64..1_000_000i64, 1..12),
        ) {
            let mut balances: Vec<MemberBalance> = amounts
                .iter()
                .enumerate()
                .map(|(i, &a)| balance(member(i as u128 + 1), a))
                .collect();

            // Close the sum with one more member.
            let total: i64 = amounts.iter().sum();
            balances.push(balance(member(amounts.len() as u128 + 1), -total));

            let transfers = suggest_settlements(&balances);

            prop_assert!(transfers.len() <= balances.len() - 1);
            prop_assert!(transfers.iter().all(|t| t.amount > 0));
            prop_assert!(transfers.iter().all(|t| t.payer != t.receiver));

            let settled = apply_transfers(&balances, &transfers);
            prop_assert!(settled.values().all(|&v| v == 0));
        }
    }
}
