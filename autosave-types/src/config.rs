use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::plan::{SECONDS_PER_DAY, SECONDS_PER_HOUR};

pub const MAX_BPS: u64 = 10_000;
pub const MAX_PENALTY_BPS: u64 = 5_000;
pub const MIN_EMERGENCY_DELAY: u64 = SECONDS_PER_HOUR;
pub const MAX_EMERGENCY_DELAY: u64 = 30 * SECONDS_PER_DAY;

/// Tunable parameters. Amounts are in base units of a 6-decimal stable asset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerConfig {
    pub min_daily_deduction: u64,
    pub max_daily_deduction: u64,
    pub early_withdrawal_penalty_bps: u64,
    /// Share of harvested yield owed to savers; the rest is protocol fee.
    pub user_yield_share_bps: u64,
    /// On-hand liquidity must reach this before it is swept to the yield source.
    pub min_pool_threshold: u64,
    pub emergency_delay_secs: u64,
    pub harvest_interval_secs: u64,
    /// Absolute slack for the solvency check, absorbs rounding dust.
    pub accounting_tolerance: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            min_daily_deduction: 1_000_000,
            max_daily_deduction: 1_000_000_000,
            early_withdrawal_penalty_bps: 1_000,
            user_yield_share_bps: 9_000,
            min_pool_threshold: 100_000_000,
            emergency_delay_secs: 2 * SECONDS_PER_DAY,
            harvest_interval_secs: SECONDS_PER_DAY,
            accounting_tolerance: 10,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.min_daily_deduction == 0 || self.min_daily_deduction > self.max_daily_deduction {
            return Err(LedgerError::InvalidParameter(format!(
                "deduction limits [{}, {}]",
                self.min_daily_deduction, self.max_daily_deduction
            )));
        }
        if self.early_withdrawal_penalty_bps > MAX_PENALTY_BPS {
            return Err(LedgerError::InvalidParameter(format!(
                "penalty {} bps above cap {}",
                self.early_withdrawal_penalty_bps, MAX_PENALTY_BPS
            )));
        }
        if self.user_yield_share_bps > MAX_BPS {
            return Err(LedgerError::InvalidParameter(format!(
                "user yield share {} bps above {}",
                self.user_yield_share_bps, MAX_BPS
            )));
        }
        if !(MIN_EMERGENCY_DELAY..=MAX_EMERGENCY_DELAY).contains(&self.emergency_delay_secs) {
            return Err(LedgerError::InvalidParameter(format!(
                "emergency delay {}s outside [{}, {}]",
                self.emergency_delay_secs, MIN_EMERGENCY_DELAY, MAX_EMERGENCY_DELAY
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(LedgerConfig::default().validate().is_ok());
        assert_eq!(LedgerConfig::default().emergency_delay_secs, 172_800);
    }

    #[test]
    fn rejects_inverted_limits_and_caps() {
        let cfg = LedgerConfig {
            min_daily_deduction: 10,
            max_daily_deduction: 5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = LedgerConfig {
            early_withdrawal_penalty_bps: 5_001,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = LedgerConfig {
            emergency_delay_secs: 60,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: LedgerConfig =
            serde_json::from_str(r#"{ "min_daily_deduction": 1, "early_withdrawal_penalty_bps": 250 }"#)
                .unwrap();
        assert_eq!(cfg.min_daily_deduction, 1);
        assert_eq!(cfg.early_withdrawal_penalty_bps, 250);
        assert_eq!(cfg.user_yield_share_bps, 9_000);
    }
}
