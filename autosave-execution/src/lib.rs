use autosave_types::emergency::RequestId;
use autosave_types::{AccountId, LedgerError, LedgerEvent, LedgerInstruction, LedgerState};
use tracing::{debug, warn};

pub mod accounting;
pub mod gateway;
pub mod instructions;
pub mod yield_source;

pub use accounting::{accounting_report, enforce_accounting, enforce_accounting_since, AccountingReport};
pub use gateway::{InMemoryTokenGateway, TokenGateway};
pub use instructions::admin;
pub use instructions::emergency::{
    cancel_emergency_withdrawal, execute_emergency_withdrawal, schedule_emergency_withdrawal,
};
pub use instructions::plans::{create_plan, get_plan, plans_of};
pub use instructions::scheduler::{
    execute_deduction, execute_deductions_batch, BatchReport, DeductionOutcome,
};
pub use instructions::withdrawal::{claim_yield, withdraw, WithdrawalReceipt};
pub use instructions::yield_pool::{
    accumulated_yield_of, deposit_to_yield, distribute_yield_to, harvest_yield,
    withdraw_from_yield, HarvestReport,
};
pub use yield_source::{MockYieldSource, YieldSource};

pub type LedgerResult<T> = Result<T, LedgerError>;

/// One serialized operation: the ledger, its external collaborators and the clock.
pub struct ExecutionContext<'a> {
    pub state: &'a mut LedgerState,
    pub tokens: &'a mut dyn TokenGateway,
    pub yield_source: Option<&'a mut dyn YieldSource>,
    pub timestamp: u64,
    pub events: Vec<LedgerEvent>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(state: &'a mut LedgerState, tokens: &'a mut dyn TokenGateway, timestamp: u64) -> Self {
        Self {
            state,
            tokens,
            yield_source: None,
            timestamp,
            events: Vec::new(),
        }
    }

    pub fn with_yield_source(mut self, source: &'a mut dyn YieldSource) -> Self {
        self.yield_source = Some(source);
        self
    }

    pub fn emit(&mut self, event: LedgerEvent) {
        debug!(?event, "ledger event");
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Liquidity the pool holds directly with the gateway.
    pub fn on_hand(&self) -> u64 {
        self.tokens.balance_of(&self.state.pool_account)
    }

    /// Source balance, or 0 when there is no source or the read fails.
    pub fn source_balance(&self) -> u64 {
        match self.yield_source.as_deref() {
            Some(source) => match source.get_balance() {
                Ok(balance) => balance,
                Err(e) => {
                    warn!("yield source balance unavailable: {}", e);
                    0
                }
            },
            None => 0,
        }
    }

    pub fn source_healthy(&self) -> bool {
        match self.yield_source.as_deref() {
            Some(source) => match source.is_healthy() {
                Ok(healthy) => healthy,
                Err(e) => {
                    warn!("yield source health check failed: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    pub fn source_apy(&self) -> u64 {
        self.yield_source
            .as_deref()
            .and_then(|s| s.get_apy().ok())
            .unwrap_or(0)
    }

    pub fn source_name(&self) -> String {
        self.yield_source
            .as_deref()
            .and_then(|s| s.get_protocol_name().ok())
            .unwrap_or_default()
    }
}

pub(crate) fn require_not_paused(state: &LedgerState) -> LedgerResult<()> {
    if state.paused {
        return Err(LedgerError::SystemPaused);
    }
    Ok(())
}

pub(crate) fn require_paused(state: &LedgerState) -> LedgerResult<()> {
    if !state.paused {
        return Err(LedgerError::SystemNotPaused);
    }
    Ok(())
}

pub(crate) fn require_admin(state: &LedgerState, caller: &AccountId) -> LedgerResult<()> {
    if !state.is_admin(caller) {
        return Err(LedgerError::Unauthorized);
    }
    Ok(())
}

/// `a * b / c` in 128-bit, failing on overflow of the result or `c == 0`.
pub(crate) fn mul_div(a: u64, b: u64, c: u64) -> LedgerResult<u64> {
    if c == 0 {
        return Err(LedgerError::MathOverflow);
    }
    let value = (a as u128)
        .checked_mul(b as u128)
        .ok_or(LedgerError::MathOverflow)?
        / c as u128;
    u64::try_from(value).map_err(|_| LedgerError::MathOverflow)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionOutcome {
    PlanCreated(u64),
    Deduction(DeductionOutcome),
    Batch(BatchReport),
    Withdrawal(WithdrawalReceipt),
    YieldClaimed(u64),
    Harvest(HarvestReport),
    EmergencyScheduled(RequestId),
    EmergencyExecuted(u64),
    Applied,
}

/// Routes one instruction and then enforces the solvency invariant against
/// the books as they stood before it.
pub fn execute_instruction(
    ctx: &mut ExecutionContext,
    sender: &AccountId,
    instruction: &LedgerInstruction,
) -> LedgerResult<InstructionOutcome> {
    let before = accounting_report(ctx);
    let outcome = match instruction {
        LedgerInstruction::CreatePlan { daily_amount, duration } => {
            InstructionOutcome::PlanCreated(create_plan(ctx, sender, *daily_amount, *duration)?)
        }
        LedgerInstruction::Withdraw { plan_id, amount } => {
            InstructionOutcome::Withdrawal(withdraw(ctx, sender, *plan_id, *amount)?)
        }
        LedgerInstruction::ClaimYield { plan_id } => {
            InstructionOutcome::YieldClaimed(claim_yield(ctx, sender, *plan_id)?)
        }
        LedgerInstruction::ExecuteDeduction { plan_id } => {
            InstructionOutcome::Deduction(execute_deduction(ctx, *plan_id)?)
        }
        LedgerInstruction::ExecuteDeductionsBatch { plan_ids } => {
            InstructionOutcome::Batch(execute_deductions_batch(ctx, plan_ids)?)
        }
        LedgerInstruction::HarvestYield => InstructionOutcome::Harvest(harvest_yield(ctx, sender)?),
        LedgerInstruction::SetEarlyWithdrawalPenalty { bps } => {
            admin::set_early_withdrawal_penalty(ctx, sender, *bps)?;
            InstructionOutcome::Applied
        }
        LedgerInstruction::SetDeductionLimits { min, max } => {
            admin::set_deduction_limits(ctx, sender, *min, *max)?;
            InstructionOutcome::Applied
        }
        LedgerInstruction::SetUserYieldShare { bps } => {
            admin::set_user_yield_share(ctx, sender, *bps)?;
            InstructionOutcome::Applied
        }
        LedgerInstruction::SetMinPoolThreshold { amount } => {
            admin::set_min_pool_threshold(ctx, sender, *amount)?;
            InstructionOutcome::Applied
        }
        LedgerInstruction::SetEmergencyDelay { secs } => {
            admin::set_emergency_delay(ctx, sender, *secs)?;
            InstructionOutcome::Applied
        }
        LedgerInstruction::SetHarvestInterval { secs } => {
            admin::set_harvest_interval(ctx, sender, *secs)?;
            InstructionOutcome::Applied
        }
        LedgerInstruction::SetKeeper { keeper, enabled } => {
            admin::set_keeper(ctx, sender, *keeper, *enabled)?;
            InstructionOutcome::Applied
        }
        LedgerInstruction::ProposeAdmin { proposed } => {
            admin::propose_admin(ctx, sender, *proposed)?;
            InstructionOutcome::Applied
        }
        LedgerInstruction::AcceptAdmin => {
            admin::accept_admin(ctx, sender)?;
            InstructionOutcome::Applied
        }
        LedgerInstruction::Pause => {
            admin::pause(ctx, sender)?;
            InstructionOutcome::Applied
        }
        LedgerInstruction::Unpause => {
            admin::unpause(ctx, sender)?;
            InstructionOutcome::Applied
        }
        LedgerInstruction::WithdrawProtocolFees { to, amount } => {
            admin::withdraw_protocol_fees(ctx, sender, *to, *amount)?;
            InstructionOutcome::Applied
        }
        LedgerInstruction::ScheduleEmergencyWithdrawal {
            user,
            plan_id,
            amount,
            reason,
        } => InstructionOutcome::EmergencyScheduled(schedule_emergency_withdrawal(
            ctx, sender, *user, *plan_id, *amount, reason,
        )?),
        LedgerInstruction::ExecuteEmergencyWithdrawal { id } => {
            InstructionOutcome::EmergencyExecuted(execute_emergency_withdrawal(ctx, sender, id)?)
        }
        LedgerInstruction::CancelEmergencyWithdrawal { id } => {
            cancel_emergency_withdrawal(ctx, sender, id)?;
            InstructionOutcome::Applied
        }
    };

    enforce_accounting_since(ctx, &before)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests;
