use serde::{Deserialize, Serialize};

use crate::emergency::RequestId;
use crate::plan::PlanDuration;
use crate::AccountId;

/// Every mutating ledger operation, as submitted by a sender.
/// Replacing the yield source takes a live adapter and is not representable here.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum LedgerInstruction {
    // ══════════════════════════════════════════════════════════════
    // Saver Operations
    // ══════════════════════════════════════════════════════════════
    CreatePlan { daily_amount: u64, duration: PlanDuration },
    Withdraw { plan_id: u64, amount: u64 },
    ClaimYield { plan_id: u64 },

    // ══════════════════════════════════════════════════════════════
    // Keeper Operations
    // ══════════════════════════════════════════════════════════════
    ExecuteDeduction { plan_id: u64 },
    ExecuteDeductionsBatch { plan_ids: Vec<u64> },
    HarvestYield,

    // ══════════════════════════════════════════════════════════════
    // Admin Operations
    // ══════════════════════════════════════════════════════════════
    SetEarlyWithdrawalPenalty { bps: u64 },
    SetDeductionLimits { min: u64, max: u64 },
    SetUserYieldShare { bps: u64 },
    SetMinPoolThreshold { amount: u64 },
    SetEmergencyDelay { secs: u64 },
    SetHarvestInterval { secs: u64 },
    SetKeeper { keeper: AccountId, enabled: bool },
    ProposeAdmin { proposed: AccountId },
    AcceptAdmin,
    Pause,
    Unpause,
    WithdrawProtocolFees { to: AccountId, amount: u64 },

    // ══════════════════════════════════════════════════════════════
    // Emergency Path
    // ══════════════════════════════════════════════════════════════
    ScheduleEmergencyWithdrawal {
        user: AccountId,
        plan_id: u64,
        amount: u64,
        reason: String,
    },
    ExecuteEmergencyWithdrawal { id: RequestId },
    CancelEmergencyWithdrawal { id: RequestId },
}
