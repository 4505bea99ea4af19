use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use arcadia_core::CustomerId;

/// Loyalty tier as reported by the customer service.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoyaltyTier {
    Standard,
    Vip,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Earn,
    Redeem,
}

/// One loyalty ledger line. `points` is a positive magnitude; the sign is
/// carried by `transaction_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyTransaction {
    pub customer_id: CustomerId,
    pub transaction_type: TransactionType,
    pub points: i64,
    pub description: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoyaltyError {
    #[error("unknown customer")]
    UnknownCustomer,

    #[error("insufficient points: {required} required, {balance} available")]
    InsufficientPoints { balance: i64, required: i64 },

    #[error("invalid transaction: {0}")]
    Invalid(String),

    #[error("loyalty service unavailable: {0}")]
    Unavailable(String),
}

/// Read/append access to the customer loyalty ledger.
///
/// This is the external collaborator boundary: the balance invariant (no
/// negative balances) is enforced *here*, not by callers. The settlement
/// coordinator's balance read is an advisory pre-check only.
pub trait LoyaltyLedger: Send + Sync {
    fn balance(&self, customer_id: CustomerId) -> Result<i64, LoyaltyError>;

    fn tier(&self, customer_id: CustomerId) -> Result<LoyaltyTier, LoyaltyError>;

    fn append(&self, transaction: LoyaltyTransaction) -> Result<(), LoyaltyError>;
}

impl<L> LoyaltyLedger for Arc<L>
where
    L: LoyaltyLedger + ?Sized,
{
    fn balance(&self, customer_id: CustomerId) -> Result<i64, LoyaltyError> {
        (**self).balance(customer_id)
    }

    fn tier(&self, customer_id: CustomerId) -> Result<LoyaltyTier, LoyaltyError> {
        (**self).tier(customer_id)
    }

    fn append(&self, transaction: LoyaltyTransaction) -> Result<(), LoyaltyError> {
        (**self).append(transaction)
    }
}

/// Points earned per amount of paid tender.
///
/// Default: one point per 100.00 in currency (10 000 minor units).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarnRate {
    pub cents_per_point: u64,
}

impl Default for EarnRate {
    fn default() -> Self {
        Self {
            cents_per_point: 10_000,
        }
    }
}

impl EarnRate {
    /// Points awarded for a paid total, rounded down.
    pub fn points_for(&self, total_cents: u64) -> i64 {
        if self.cents_per_point == 0 {
            return 0;
        }
        (total_cents / self.cents_per_point) as i64
    }
}

#[derive(Debug, Clone)]
struct Account {
    tier: LoyaltyTier,
    transactions: Vec<LoyaltyTransaction>,
}

impl Account {
    fn balance(&self) -> i64 {
        self.transactions
            .iter()
            .map(|t| match t.transaction_type {
                TransactionType::Earn => t.points,
                TransactionType::Redeem => -t.points,
            })
            .sum()
    }
}

/// In-memory loyalty ledger for dev/tests. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryLoyaltyLedger {
    accounts: RwLock<HashMap<CustomerId, Account>>,
}

impl InMemoryLoyaltyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_customer(&self, customer_id: CustomerId, tier: LoyaltyTier) {
        if let Ok(mut accounts) = self.accounts.write() {
            accounts.entry(customer_id).or_insert(Account {
                tier,
                transactions: Vec::new(),
            });
        }
    }

    pub fn transactions(&self, customer_id: CustomerId) -> Vec<LoyaltyTransaction> {
        self.accounts
            .read()
            .ok()
            .and_then(|accounts| accounts.get(&customer_id).map(|a| a.transactions.clone()))
            .unwrap_or_default()
    }
}

impl LoyaltyLedger for InMemoryLoyaltyLedger {
    fn balance(&self, customer_id: CustomerId) -> Result<i64, LoyaltyError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| LoyaltyError::Unavailable("lock poisoned".to_string()))?;
        accounts
            .get(&customer_id)
            .map(Account::balance)
            .ok_or(LoyaltyError::UnknownCustomer)
    }

    fn tier(&self, customer_id: CustomerId) -> Result<LoyaltyTier, LoyaltyError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| LoyaltyError::Unavailable("lock poisoned".to_string()))?;
        accounts
            .get(&customer_id)
            .map(|a| a.tier)
            .ok_or(LoyaltyError::UnknownCustomer)
    }

    fn append(&self, transaction: LoyaltyTransaction) -> Result<(), LoyaltyError> {
        if transaction.points <= 0 {
            return Err(LoyaltyError::Invalid("points must be positive".to_string()));
        }

        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| LoyaltyError::Unavailable("lock poisoned".to_string()))?;
        let account = accounts
            .get_mut(&transaction.customer_id)
            .ok_or(LoyaltyError::UnknownCustomer)?;

        if transaction.transaction_type == TransactionType::Redeem {
            let balance = account.balance();
            if balance < transaction.points {
                return Err(LoyaltyError::InsufficientPoints {
                    balance,
                    required: transaction.points,
                });
            }
        }

        account.transactions.push(transaction);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn earn(customer_id: CustomerId, points: i64) -> LoyaltyTransaction {
        LoyaltyTransaction {
            customer_id,
            transaction_type: TransactionType::Earn,
            points,
            description: "test earn".to_string(),
        }
    }

    fn redeem(customer_id: CustomerId, points: i64) -> LoyaltyTransaction {
        LoyaltyTransaction {
            customer_id,
            transaction_type: TransactionType::Redeem,
            points,
            description: "test redeem".to_string(),
        }
    }

    #[test]
    fn balance_is_earns_minus_redeems() {
        let ledger = InMemoryLoyaltyLedger::new();
        let customer = CustomerId::new();
        ledger.register_customer(customer, LoyaltyTier::Standard);

        ledger.append(earn(customer, 50)).unwrap();
        ledger.append(redeem(customer, 20)).unwrap();

        assert_eq!(ledger.balance(customer).unwrap(), 30);
    }

    #[test]
    fn redeem_beyond_balance_is_rejected() {
        let ledger = InMemoryLoyaltyLedger::new();
        let customer = CustomerId::new();
        ledger.register_customer(customer, LoyaltyTier::Vip);
        ledger.append(earn(customer, 10)).unwrap();

        let err = ledger.append(redeem(customer, 11)).unwrap_err();
        assert_eq!(
            err,
            LoyaltyError::InsufficientPoints {
                balance: 10,
                required: 11,
            }
        );
        assert_eq!(ledger.balance(customer).unwrap(), 10);
    }

    #[test]
    fn unknown_customer_is_surfaced() {
        let ledger = InMemoryLoyaltyLedger::new();
        assert_eq!(
            ledger.balance(CustomerId::new()).unwrap_err(),
            LoyaltyError::UnknownCustomer
        );
    }

    #[test]
    fn earn_rate_rounds_down() {
        let rate = EarnRate::default();
        assert_eq!(rate.points_for(9_999), 0);
        assert_eq!(rate.points_for(10_000), 1);
        assert_eq!(rate.points_for(25_000), 2);
    }
}
