//! Settlement module (who owes whom, and how to square up).
//!
//! Pure computation over group balances: fold transactions into net member
//! positions and plan the transfers that settle them. No IO, no storage.

pub mod balance;
pub mod planner;

pub use balance::{MemberBalance, compute_balances};
pub use planner::{SettlementTransfer, suggest_settlements};
