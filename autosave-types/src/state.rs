use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::LedgerConfig;
use crate::emergency::{EmergencyWithdrawal, RequestId};
use crate::error::LedgerError;
use crate::plan::Plan;
use crate::AccountId;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolTotals {
    /// Doubles as the plan id generator.
    pub total_plans: u64,
    /// Lifetime principal deducted across all plans.
    pub total_principal: u64,
    /// Lifetime yield credited into plans.
    pub total_user_yield: u64,
    /// Lifetime protocol share of harvested yield.
    pub total_protocol_yield: u64,
    /// The pool's claim on the yield source.
    pub total_yield_shares: u64,
    /// Lifetime amounts moved into and out of yield sources.
    pub source_deposited: u64,
    pub source_withdrawn: u64,

    // === Bookkeeping ===
    pub harvested_user_yield: u64,
    pub total_harvested: u64,
    pub principal_withdrawn: u64,
    pub yield_withdrawn: u64,
    pub protocol_yield_withdrawn: u64,
    pub penalties_forfeited: u64,
    pub last_harvest: Option<u64>,
}

impl PoolTotals {
    pub fn protocol_yield_outstanding(&self) -> u64 {
        self.total_protocol_yield
            .saturating_sub(self.protocol_yield_withdrawn)
    }

    /// Lifetime gain of the pool's position: what the source holds plus
    /// everything taken out of it, less everything put in. Paying a claim or
    /// harvesting moves value out of the source without changing this.
    pub fn source_gain(&self, source_balance: u64) -> u64 {
        let out = source_balance as u128 + self.source_withdrawn as u128;
        let gain = out.saturating_sub(self.source_deposited as u128);
        u64::try_from(gain).unwrap_or(u64::MAX)
    }

    /// Gain not yet split between savers and the protocol.
    pub fn unharvested_gain(&self, source_balance: u64) -> u64 {
        self.source_gain(source_balance)
            .saturating_sub(self.total_harvested)
    }
}

/// The whole ledger. Every operation borrows it mutably for its full duration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LedgerState {
    pub admin: AccountId,
    pub pending_admin: Option<AccountId>,
    /// Account holding on-hand liquidity with the token gateway.
    pub pool_account: AccountId,
    pub keepers: BTreeSet<AccountId>,
    pub paused: bool,
    pub config: LedgerConfig,
    pub plans: BTreeMap<u64, Plan>,
    pub plans_by_owner: BTreeMap<AccountId, Vec<u64>>,
    pub pool: PoolTotals,
    pub emergency_requests: BTreeMap<RequestId, EmergencyWithdrawal>,
}

impl LedgerState {
    pub fn new(
        admin: AccountId,
        pool_account: AccountId,
        config: LedgerConfig,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self {
            admin,
            pending_admin: None,
            pool_account,
            keepers: BTreeSet::new(),
            paused: false,
            config,
            plans: BTreeMap::new(),
            plans_by_owner: BTreeMap::new(),
            pool: PoolTotals::default(),
            emergency_requests: BTreeMap::new(),
        })
    }

    pub fn plan(&self, id: u64) -> Result<&Plan, LedgerError> {
        self.plans.get(&id).ok_or(LedgerError::InvalidPlanId(id))
    }

    pub fn plan_mut(&mut self, id: u64) -> Result<&mut Plan, LedgerError> {
        self.plans.get_mut(&id).ok_or(LedgerError::InvalidPlanId(id))
    }

    pub fn plans_of(&self, owner: &AccountId) -> Vec<&Plan> {
        self.plans_by_owner
            .get(owner)
            .map(|ids| ids.iter().filter_map(|id| self.plans.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn is_admin(&self, account: &AccountId) -> bool {
        self.admin == *account
    }

    pub fn can_harvest(&self, account: &AccountId) -> bool {
        self.is_admin(account) || self.keepers.contains(account)
    }

    /// What the pool owes: held principal, credited yield, unpaid protocol fees.
    pub fn liabilities(&self) -> u128 {
        let owed_to_plans: u128 = self
            .plans
            .values()
            .map(|p| p.accumulated_balance as u128 + p.yield_earned as u128)
            .sum();
        owed_to_plans + self.pool.protocol_yield_outstanding() as u128
    }
}
