use autosave_types::event::MissReason;
use autosave_types::plan::{SECONDS_PER_DAY, SECONDS_PER_HOUR};
use autosave_types::{LedgerError, LedgerEvent};
use tracing::{info, warn};

use super::yield_pool::sweep_to_yield;
use crate::{require_not_paused, ExecutionContext, LedgerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeductionOutcome {
    Executed { amount: u64 },
    Missed(MissReason),
    /// The plan reached its end date; no deduction was taken.
    Matured,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub executed: Vec<u64>,
    pub missed: Vec<u64>,
    pub matured: Vec<u64>,
    pub skipped: Vec<(u64, LedgerError)>,
    pub collected: u64,
    pub swept: u64,
}

/// Runs the due deduction for one plan, then sweeps idle liquidity.
pub fn execute_deduction(ctx: &mut ExecutionContext, plan_id: u64) -> LedgerResult<DeductionOutcome> {
    require_not_paused(ctx.state)?;
    let outcome = deduct(ctx, plan_id)?;
    if matches!(outcome, DeductionOutcome::Executed { .. }) {
        let on_hand = ctx.on_hand();
        sweep_to_yield(ctx, on_hand);
    }
    Ok(outcome)
}

/// Per-item isolation: a bad entry is recorded as skipped and never aborts
/// the batch. Entries run in order; one sweep covers what the batch collected.
pub fn execute_deductions_batch(ctx: &mut ExecutionContext, plan_ids: &[u64]) -> LedgerResult<BatchReport> {
    require_not_paused(ctx.state)?;

    let mut report = BatchReport::default();
    for &plan_id in plan_ids {
        match deduct(ctx, plan_id) {
            Ok(DeductionOutcome::Executed { amount }) => {
                report.executed.push(plan_id);
                report.collected = report.collected.saturating_add(amount);
            }
            Ok(DeductionOutcome::Missed(_)) => report.missed.push(plan_id),
            Ok(DeductionOutcome::Matured) => report.matured.push(plan_id),
            Err(e) => {
                warn!("Batch skipping plan {}: {}", plan_id, e);
                report.skipped.push((plan_id, e));
            }
        }
    }

    if report.collected > 0 {
        report.swept = sweep_to_yield(ctx, report.collected);
    }

    info!(
        "Batch of {}: {} executed, {} missed, {} matured, {} skipped, {} swept",
        plan_ids.len(),
        report.executed.len(),
        report.missed.len(),
        report.matured.len(),
        report.skipped.len(),
        report.swept
    );
    Ok(report)
}

fn deduct(ctx: &mut ExecutionContext, plan_id: u64) -> LedgerResult<DeductionOutcome> {
    let now = ctx.timestamp;
    let pool_account = ctx.state.pool_account;
    let plan = ctx.state.plan(plan_id)?;
    if !plan.is_active || plan.is_completed {
        return Err(LedgerError::PlanNotActive(plan_id));
    }

    if plan.is_mature(now) {
        let plan = ctx.state.plan_mut(plan_id)?;
        plan.mark_completed();
        info!("Plan {} matured", plan_id);
        ctx.emit(LedgerEvent::PlanCompleted {
            plan_id,
            timestamp: now,
        });
        return Ok(DeductionOutcome::Matured);
    }

    // Slots whose window closed without a call are missed, never caught up.
    let remaining = plan.duration.days().saturating_sub(plan.slots_consumed());
    if remaining == 0 {
        return Err(LedgerError::InvalidParameter(format!(
            "plan {} has no slots left before maturity at {}",
            plan_id, plan.end_date
        )));
    }
    let stale = stale_slots(plan.next_deduction_at(), now).min(remaining);
    if stale == remaining {
        record_elapsed(ctx, plan_id, stale)?;
        ctx.state.plan_mut(plan_id)?.last_deduction_date = Some(now);
        return Ok(DeductionOutcome::Missed(MissReason::SlotElapsed));
    }
    let expected = plan
        .next_deduction_at()
        .saturating_add(stale.saturating_mul(SECONDS_PER_DAY));
    if let Some(last) = plan.last_deduction_date {
        let ran_within_hour = now < last.saturating_add(SECONDS_PER_HOUR);
        let slot_already_taken = last >= expected.saturating_sub(SECONDS_PER_HOUR);
        if ran_within_hour || slot_already_taken {
            return Err(LedgerError::DeductionAlreadyExecuted(plan_id));
        }
    }
    if now.saturating_add(SECONDS_PER_HOUR) < expected {
        return Err(LedgerError::InvalidParameter(format!(
            "deduction for plan {} not due until {}",
            plan_id, expected
        )));
    }

    let owner = plan.owner;
    let amount = plan.daily_amount;
    let miss = if ctx.tokens.balance_of(&owner) < amount {
        Some(MissReason::InsufficientBalance)
    } else if ctx.tokens.allowance(&owner, &pool_account) < amount {
        Some(MissReason::InsufficientAllowance)
    } else {
        match ctx.tokens.transfer_from(&pool_account, &owner, &pool_account, amount) {
            Ok(()) => None,
            Err(e) => {
                warn!("Deduction transfer for plan {} failed: {}", plan_id, e);
                Some(MissReason::TransferFailed)
            }
        }
    };

    if stale > 0 {
        record_elapsed(ctx, plan_id, stale)?;
    }

    let plan = ctx.state.plan_mut(plan_id)?;
    plan.last_deduction_date = Some(now);

    if let Some(reason) = miss {
        plan.missed_deductions = plan.missed_deductions.saturating_add(1);
        let missed_deductions = plan.missed_deductions;
        info!("Plan {} missed deduction: {:?}", plan_id, reason);
        ctx.emit(LedgerEvent::DeductionMissed {
            plan_id,
            reason,
            missed_deductions,
            timestamp: now,
        });
        return Ok(DeductionOutcome::Missed(reason));
    }

    plan.accumulated_balance = plan.accumulated_balance.saturating_add(amount);
    plan.principal_deposited = plan.principal_deposited.saturating_add(amount);
    plan.successful_deductions = plan.successful_deductions.saturating_add(1);
    let accumulated_balance = plan.accumulated_balance;
    let successful_deductions = plan.successful_deductions;
    ctx.state.pool.total_principal = ctx.state.pool.total_principal.saturating_add(amount);

    info!(
        "Plan {} deducted {} (deduction #{})",
        plan_id, amount, successful_deductions
    );
    ctx.emit(LedgerEvent::DeductionExecuted {
        plan_id,
        amount,
        accumulated_balance,
        successful_deductions,
        timestamp: now,
    });
    Ok(DeductionOutcome::Executed { amount })
}

fn record_elapsed(ctx: &mut ExecutionContext, plan_id: u64, slots: u64) -> LedgerResult<()> {
    let timestamp = ctx.timestamp;
    let plan = ctx.state.plan_mut(plan_id)?;
    plan.missed_deductions = plan.missed_deductions.saturating_add(slots as u32);
    let missed_deductions = plan.missed_deductions;
    info!("Plan {} skipped {} elapsed slot(s)", plan_id, slots);
    ctx.emit(LedgerEvent::DeductionMissed {
        plan_id,
        reason: MissReason::SlotElapsed,
        missed_deductions,
        timestamp,
    });
    Ok(())
}

/// A slot is open from one hour before its instant until one hour before the next.
fn stale_slots(expected: u64, now: u64) -> u64 {
    let window_end = expected.saturating_add(SECONDS_PER_DAY - SECONDS_PER_HOUR);
    if now < window_end {
        return 0;
    }
    (now - window_end) / SECONDS_PER_DAY + 1
}
