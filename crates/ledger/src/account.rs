use serde::{Deserialize, Serialize};

use crebit_core::{AccountId, DomainError, DomainResult};

use crate::transaction::{TransactionCommand, TransactionKind};

/// Ledger account state: an immutable overdraft limit and a running balance.
///
/// The invariant `balance >= -overdraft_limit` must hold at every observable
/// point. This type only *decides* balance transitions; keeping the decision
/// atomic with respect to concurrent callers is the job of the store's
/// per-account unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Maximum amount the balance may go negative. Non-negative by
    /// provisioning.
    pub overdraft_limit: i64,
    pub balance: i64,
}

impl Account {
    pub fn new(id: AccountId, overdraft_limit: i64, balance: i64) -> DomainResult<Self> {
        if overdraft_limit < 0 {
            return Err(DomainError::validation("overdraft_limit must be non-negative"));
        }
        Ok(Self {
            id,
            overdraft_limit,
            balance,
        })
    }

    /// Lowest balance this account may reach.
    pub fn floor(&self) -> i64 {
        -self.overdraft_limit
    }

    /// New balance after an unconditional credit.
    pub fn credited(&self, value: i64) -> DomainResult<i64> {
        self.balance
            .checked_add(value)
            .ok_or_else(|| DomainError::validation("balance overflow"))
    }

    /// New balance after a debit, or `OverdraftExceeded` when the result
    /// would fall below the floor. The caller must not persist anything on
    /// rejection.
    pub fn debited(&self, value: i64) -> DomainResult<i64> {
        let new_balance = self
            .balance
            .checked_sub(value)
            .ok_or_else(|| DomainError::validation("balance overflow"))?;
        if new_balance < self.floor() {
            return Err(DomainError::OverdraftExceeded);
        }
        Ok(new_balance)
    }

    /// Decide the balance transition for a validated command.
    pub fn decide(&self, command: &TransactionCommand) -> DomainResult<i64> {
        match command.kind {
            TransactionKind::Credit => self.credited(command.value),
            TransactionKind::Debit => self.debited(command.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn account(overdraft_limit: i64, balance: i64) -> Account {
        Account::new(AccountId::new(1), overdraft_limit, balance).unwrap()
    }

    #[test]
    fn negative_overdraft_limit_is_rejected_at_construction() {
        assert!(Account::new(AccountId::new(1), -1, 0).is_err());
    }

    #[test]
    fn credit_is_unconditional() {
        assert_eq!(account(0, 0).credited(100).unwrap(), 100);
        assert_eq!(account(1000, -1000).credited(1).unwrap(), -999);
    }

    #[test]
    fn debit_to_exactly_the_floor_succeeds() {
        // value == balance + limit leaves the balance at exactly -limit.
        let acc = account(1000, 250);
        assert_eq!(acc.debited(1250).unwrap(), -1000);
    }

    #[test]
    fn debit_one_past_the_floor_is_rejected() {
        let acc = account(1000, 250);
        assert_eq!(acc.debited(1251).unwrap_err(), DomainError::OverdraftExceeded);
    }

    #[test]
    fn debit_sequence_against_limit() {
        // limit=1000, balance=0: -500, reject 600, then -500 lands on the floor.
        let mut acc = account(1000, 0);
        acc.balance = acc.debited(500).unwrap();
        assert_eq!(acc.balance, -500);
        assert_eq!(acc.debited(600).unwrap_err(), DomainError::OverdraftExceeded);
        acc.balance = acc.debited(500).unwrap();
        assert_eq!(acc.balance, -1000);
    }

    #[test]
    fn zero_limit_account_cannot_go_negative() {
        let mut acc = account(0, 0);
        acc.balance = acc.credited(100).unwrap();
        acc.balance = acc.debited(100).unwrap();
        assert_eq!(acc.balance, 0);
        assert_eq!(acc.debited(1).unwrap_err(), DomainError::OverdraftExceeded);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: for any op sequence, the balance never drops below the
        /// floor, and the final balance equals the initial balance plus the
        /// sum of accepted deltas (credits positive, debits negative).
        #[test]
        fn accepted_ops_sum_to_final_balance(
            overdraft_limit in 0i64..1_000_000,
            initial in -1_000i64..1_000_000,
            ops in prop::collection::vec((any::<bool>(), 1i64..100_000), 1..64)
        ) {
            let initial = initial.max(-overdraft_limit);
            let mut acc = account(overdraft_limit, initial);
            let mut accepted_sum: i64 = 0;

            for (is_credit, value) in ops {
                let outcome = if is_credit {
                    acc.credited(value)
                } else {
                    acc.debited(value)
                };
                if let Ok(new_balance) = outcome {
                    acc.balance = new_balance;
                    accepted_sum += if is_credit { value } else { -value };
                }
                prop_assert!(acc.balance >= acc.floor());
            }

            prop_assert_eq!(acc.balance, initial + accepted_sum);
        }
    }
}
