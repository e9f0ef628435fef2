use autosave_types::{AccountId, TokenError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Moves the stable asset between accounts. The ledger only ever debits an
/// owner through `transfer_from` with itself as spender.
pub trait TokenGateway {
    fn balance_of(&self, account: &AccountId) -> u64;
    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> u64;
    fn transfer_from(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), TokenError>;
    fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: u64) -> Result<(), TokenError>;
    fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: u64) -> Result<(), TokenError>;
}

/// Deterministic single-asset book used by the CLI sandbox, the simulation and tests.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryTokenGateway {
    balances: BTreeMap<AccountId, u64>,
    allowances: BTreeMap<(AccountId, AccountId), u64>,
    total_supply: u64,
}

impl InMemoryTokenGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, to: &AccountId, amount: u64) -> Result<(), TokenError> {
        let balance = self.balances.entry(*to).or_default();
        *balance = balance.checked_add(amount).ok_or(TokenError::Overflow)?;
        self.total_supply = self.total_supply.checked_add(amount).ok_or(TokenError::Overflow)?;
        Ok(())
    }

    pub fn burn(&mut self, from: &AccountId, amount: u64) -> Result<(), TokenError> {
        self.debit(from, amount)?;
        self.total_supply -= amount;
        Ok(())
    }

    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    fn debit(&mut self, from: &AccountId, amount: u64) -> Result<(), TokenError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                available,
                needed: amount,
            });
        }
        self.balances.insert(*from, available - amount);
        Ok(())
    }

    fn credit(&mut self, to: &AccountId, amount: u64) -> Result<(), TokenError> {
        let balance = self.balances.entry(*to).or_default();
        *balance = balance.checked_add(amount).ok_or(TokenError::Overflow)?;
        Ok(())
    }
}

impl TokenGateway for InMemoryTokenGateway {
    fn balance_of(&self, account: &AccountId) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> u64 {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    fn transfer_from(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), TokenError> {
        let allowed = self.allowance(from, spender);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance {
                available: allowed,
                needed: amount,
            });
        }
        self.debit(from, amount)?;
        self.credit(to, amount)?;
        self.allowances.insert((*from, *spender), allowed - amount);
        Ok(())
    }

    fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: u64) -> Result<(), TokenError> {
        self.debit(from, amount)?;
        self.credit(to, amount)
    }

    fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: u64) -> Result<(), TokenError> {
        self.allowances.insert((*owner, *spender), amount);
        Ok(())
    }
}
