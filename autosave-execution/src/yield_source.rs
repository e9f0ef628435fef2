use autosave_types::config::MAX_BPS;
use autosave_types::{AccountId, YieldSourceError};
use serde::{Deserialize, Serialize};

use crate::gateway::{InMemoryTokenGateway, TokenGateway};

pub const SECONDS_PER_YEAR: u64 = 365 * 86_400;

/// Interest-bearing venue holding the pooled position.
/// Amounts move through the token gateway the caller passes in.
pub trait YieldSource {
    /// Pulls `amount` from `from` and returns the shares minted for it.
    fn deposit(
        &mut self,
        tokens: &mut dyn TokenGateway,
        from: &AccountId,
        amount: u64,
    ) -> Result<u64, YieldSourceError>;
    /// Burns `shares` and sends the underlying to `to`; returns the amount sent.
    fn withdraw(
        &mut self,
        tokens: &mut dyn TokenGateway,
        to: &AccountId,
        shares: u64,
    ) -> Result<u64, YieldSourceError>;
    fn get_balance(&self) -> Result<u64, YieldSourceError>;
    /// Annual rate in basis points.
    fn get_apy(&self) -> Result<u64, YieldSourceError>;
    fn get_protocol_name(&self) -> Result<String, YieldSourceError>;
    fn is_healthy(&self) -> Result<bool, YieldSourceError>;
    /// Exits the whole position to `to`.
    fn emergency_withdraw(
        &mut self,
        tokens: &mut dyn TokenGateway,
        to: &AccountId,
    ) -> Result<u64, YieldSourceError>;
}

/// Deterministic venue with a configurable APY and failure switches.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MockYieldSource {
    pub protocol_name: String,
    /// Gateway account the venue keeps its funds in.
    pub custody: AccountId,
    pub apy_bps: u64,
    pub healthy: bool,
    pub fail_deposits: bool,
    pub fail_withdrawals: bool,
    pub fail_emergency: bool,
    pub fail_reads: bool,
    balance: u64,
    total_shares: u64,
}

impl MockYieldSource {
    pub fn new(protocol_name: &str, custody: AccountId, apy_bps: u64) -> Self {
        Self {
            protocol_name: protocol_name.to_string(),
            custody,
            apy_bps,
            healthy: true,
            fail_deposits: false,
            fail_withdrawals: false,
            fail_emergency: false,
            fail_reads: false,
            balance: 0,
            total_shares: 0,
        }
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn total_shares(&self) -> u64 {
        self.total_shares
    }

    /// Grows the position by simple interest over `elapsed_secs`.
    pub fn accrue(
        &mut self,
        tokens: &mut InMemoryTokenGateway,
        elapsed_secs: u64,
    ) -> Result<u64, YieldSourceError> {
        let interest = (self.balance as u128)
            .saturating_mul(self.apy_bps as u128)
            .saturating_mul(elapsed_secs as u128)
            / (MAX_BPS as u128 * SECONDS_PER_YEAR as u128);
        let interest = u64::try_from(interest).unwrap_or(u64::MAX);
        self.credit_yield(tokens, interest)?;
        Ok(interest)
    }

    pub fn credit_yield(
        &mut self,
        tokens: &mut InMemoryTokenGateway,
        amount: u64,
    ) -> Result<(), YieldSourceError> {
        tokens.mint(&self.custody, amount)?;
        self.balance = self.balance.saturating_add(amount);
        Ok(())
    }

    /// Simulates a loss inside the venue.
    pub fn slash(
        &mut self,
        tokens: &mut InMemoryTokenGateway,
        amount: u64,
    ) -> Result<(), YieldSourceError> {
        let amount = amount.min(self.balance);
        tokens.burn(&self.custody, amount)?;
        self.balance -= amount;
        Ok(())
    }

    fn check_reads(&self) -> Result<(), YieldSourceError> {
        if self.fail_reads {
            return Err(YieldSourceError::Reverted("read unavailable".into()));
        }
        Ok(())
    }
}

impl YieldSource for MockYieldSource {
    fn deposit(
        &mut self,
        tokens: &mut dyn TokenGateway,
        from: &AccountId,
        amount: u64,
    ) -> Result<u64, YieldSourceError> {
        if !self.healthy {
            return Err(YieldSourceError::Unhealthy);
        }
        if self.fail_deposits {
            return Err(YieldSourceError::Reverted("deposit rejected".into()));
        }
        let shares = if self.total_shares == 0 || self.balance == 0 {
            amount
        } else {
            ((amount as u128 * self.total_shares as u128) / self.balance as u128) as u64
        };
        tokens.transfer(from, &self.custody, amount)?;
        self.balance += amount;
        self.total_shares += shares;
        Ok(shares)
    }

    fn withdraw(
        &mut self,
        tokens: &mut dyn TokenGateway,
        to: &AccountId,
        shares: u64,
    ) -> Result<u64, YieldSourceError> {
        if self.fail_withdrawals {
            return Err(YieldSourceError::Reverted("withdraw rejected".into()));
        }
        if shares > self.total_shares {
            return Err(YieldSourceError::InsufficientShares {
                available: self.total_shares,
                requested: shares,
            });
        }
        if shares == 0 {
            return Ok(0);
        }
        let amount = ((shares as u128 * self.balance as u128) / self.total_shares as u128) as u64;
        tokens.transfer(&self.custody, to, amount)?;
        self.balance -= amount;
        self.total_shares -= shares;
        Ok(amount)
    }

    fn get_balance(&self) -> Result<u64, YieldSourceError> {
        self.check_reads()?;
        Ok(self.balance)
    }

    fn get_apy(&self) -> Result<u64, YieldSourceError> {
        self.check_reads()?;
        Ok(self.apy_bps)
    }

    fn get_protocol_name(&self) -> Result<String, YieldSourceError> {
        self.check_reads()?;
        Ok(self.protocol_name.clone())
    }

    fn is_healthy(&self) -> Result<bool, YieldSourceError> {
        self.check_reads()?;
        Ok(self.healthy)
    }

    fn emergency_withdraw(
        &mut self,
        tokens: &mut dyn TokenGateway,
        to: &AccountId,
    ) -> Result<u64, YieldSourceError> {
        if self.fail_emergency {
            return Err(YieldSourceError::Reverted("emergency exit rejected".into()));
        }
        let amount = self.balance;
        tokens.transfer(&self.custody, to, amount)?;
        self.balance = 0;
        self.total_shares = 0;
        Ok(amount)
    }
}
