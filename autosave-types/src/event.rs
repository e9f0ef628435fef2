use serde::{Deserialize, Serialize};

use crate::emergency::RequestId;
use crate::plan::PlanDuration;
use crate::AccountId;

/// State transitions surfaced to off-ledger consumers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    // ══════════════════════════════════════════════════════════════
    // Plans & Deductions
    // ══════════════════════════════════════════════════════════════
    PlanCreated {
        plan_id: u64,
        owner: AccountId,
        daily_amount: u64,
        duration: PlanDuration,
        start_date: u64,
        end_date: u64,
        total_target: u64,
    },
    DeductionExecuted {
        plan_id: u64,
        amount: u64,
        accumulated_balance: u64,
        successful_deductions: u32,
        timestamp: u64,
    },
    DeductionMissed {
        plan_id: u64,
        reason: MissReason,
        missed_deductions: u32,
        timestamp: u64,
    },
    PlanCompleted {
        plan_id: u64,
        timestamp: u64,
    },
    WithdrawalExecuted {
        plan_id: u64,
        owner: AccountId,
        requested: u64,
        principal_part: u64,
        yield_part: u64,
        penalty: u64,
        payout: u64,
        is_early: bool,
    },

    // ══════════════════════════════════════════════════════════════
    // Yield Pool
    // ══════════════════════════════════════════════════════════════
    YieldDeposited {
        amount: u64,
        shares: u64,
        total_yield_shares: u64,
    },
    YieldWithdrawn {
        requested: u64,
        received: u64,
        shares_burned: u64,
        emergency_exit: bool,
    },
    YieldHarvested {
        total_yield: u64,
        user_yield: u64,
        protocol_yield: u64,
        timestamp: u64,
    },
    YieldDistributed {
        plan_id: u64,
        amount: u64,
        yield_earned: u64,
    },
    YieldClaimed {
        plan_id: u64,
        owner: AccountId,
        amount: u64,
    },

    // ══════════════════════════════════════════════════════════════
    // Emergency
    // ══════════════════════════════════════════════════════════════
    EmergencyScheduled {
        id: RequestId,
        admin: AccountId,
        user: AccountId,
        plan_id: u64,
        amount: u64,
        execution_time: u64,
        reason_hash: [u8; 32],
    },
    EmergencyExecuted {
        id: RequestId,
        user: AccountId,
        plan_id: u64,
        principal_part: u64,
        yield_part: u64,
        payout: u64,
    },
    EmergencyCancelled {
        id: RequestId,
        plan_id: u64,
    },

    // ══════════════════════════════════════════════════════════════
    // Admin
    // ══════════════════════════════════════════════════════════════
    ParameterUpdated {
        parameter: String,
        old_value: u64,
        new_value: u64,
    },
    YieldSourceReplaced {
        protocol_name: String,
        recovered: u64,
    },
    KeeperUpdated {
        keeper: AccountId,
        enabled: bool,
    },
    AdminProposed {
        proposed: AccountId,
    },
    AdminTransferred {
        previous: AccountId,
        admin: AccountId,
    },
    Paused {
        by: AccountId,
    },
    Unpaused {
        by: AccountId,
    },
    ProtocolFeesWithdrawn {
        to: AccountId,
        amount: u64,
    },
    InvariantViolated {
        assets: u64,
        liabilities: u64,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    InsufficientBalance,
    InsufficientAllowance,
    TransferFailed,
    /// The slot's window closed before anyone ran it.
    SlotElapsed,
}
