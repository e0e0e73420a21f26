use crate::error::{CoinflipError, Result};
use crate::platform::Platform;
use crate::types::AccountId;
use bitcoin::Amount;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// In-memory platform with a manually driven clock.
///
/// Cloning gives a full snapshot, so tests can compare the platform before
/// and after a rejected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPlatform {
    now: DateTime<Utc>,
    balances: HashMap<AccountId, Amount>,
    escrow: Amount,
}

impl MemoryPlatform {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            balances: HashMap::new(),
            escrow: Amount::ZERO,
        }
    }

    /// Credit an account, creating it if needed.
    pub fn fund(&mut self, account: &AccountId, amount: Amount) -> Result<()> {
        let balance = self.balances.entry(account.clone()).or_insert(Amount::ZERO);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| CoinflipError::overflow(format!("funding {}", account)))?;
        Ok(())
    }

    pub fn balance(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(Amount::ZERO)
    }

    pub fn advance(&mut self, by: Duration) {
        self.now = self.now + by;
    }

    pub fn set_now(&mut self, now: DateTime<Utc>) {
        self.now = now;
    }
}

impl Platform for MemoryPlatform {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn collect(&mut self, from: &AccountId, amount: Amount) -> Result<()> {
        let balance = self
            .balances
            .get(from)
            .copied()
            .ok_or_else(|| CoinflipError::account_not_found(from.as_str()))?;

        let remaining = balance
            .checked_sub(amount)
            .ok_or(CoinflipError::InsufficientFunds {
                need: amount.to_sat(),
                available: balance.to_sat(),
            })?;
        let escrow = self
            .escrow
            .checked_add(amount)
            .ok_or_else(|| CoinflipError::overflow("escrow"))?;

        self.balances.insert(from.clone(), remaining);
        self.escrow = escrow;
        Ok(())
    }

    fn pay(&mut self, to: &AccountId, amount: Amount) -> Result<()> {
        let escrow = self
            .escrow
            .checked_sub(amount)
            .ok_or(CoinflipError::EscrowShortfall {
                need: amount.to_sat(),
                held: self.escrow.to_sat(),
            })?;
        let balance = self
            .balance(to)
            .checked_add(amount)
            .ok_or_else(|| CoinflipError::overflow(format!("paying {}", to)))?;

        self.balances.insert(to.clone(), balance);
        self.escrow = escrow;
        Ok(())
    }

    fn escrowed(&self) -> Result<Amount> {
        Ok(self.escrow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> AccountId {
        AccountId::new("alice").unwrap()
    }

    #[test]
    fn test_collect_and_pay_move_funds_through_escrow() {
        let mut platform = MemoryPlatform::new(Utc::now());
        let bob = AccountId::new("bob").unwrap();
        platform.fund(&alice(), Amount::from_sat(100)).unwrap();

        platform.collect(&alice(), Amount::from_sat(40)).unwrap();
        assert_eq!(platform.balance(&alice()), Amount::from_sat(60));
        assert_eq!(platform.escrowed().unwrap(), Amount::from_sat(40));

        platform.pay(&bob, Amount::from_sat(40)).unwrap();
        assert_eq!(platform.balance(&bob), Amount::from_sat(40));
        assert_eq!(platform.escrowed().unwrap(), Amount::ZERO);
    }

    #[test]
    fn test_collect_rejects_overdraft_without_side_effects() {
        let mut platform = MemoryPlatform::new(Utc::now());
        platform.fund(&alice(), Amount::from_sat(10)).unwrap();
        let before = platform.clone();

        let err = platform.collect(&alice(), Amount::from_sat(11)).unwrap_err();
        assert!(matches!(
            err,
            CoinflipError::InsufficientFunds { need: 11, available: 10 }
        ));
        assert_eq!(platform, before);
    }

    #[test]
    fn test_pay_cannot_exceed_escrow() {
        let mut platform = MemoryPlatform::new(Utc::now());
        let err = platform.pay(&alice(), Amount::from_sat(1)).unwrap_err();
        assert!(matches!(err, CoinflipError::EscrowShortfall { need: 1, held: 0 }));
    }

    #[test]
    fn test_unknown_account_cannot_stake() {
        let mut platform = MemoryPlatform::new(Utc::now());
        let err = platform.collect(&alice(), Amount::from_sat(1)).unwrap_err();
        assert!(matches!(err, CoinflipError::AccountNotFound { .. }));
    }
}
