use autosave_types::config::MAX_BPS;
use autosave_types::{AccountId, LedgerError, LedgerEvent};
use tracing::info;

use super::yield_pool::{distribute_yield_to, ensure_liquidity};
use crate::{mul_div, require_not_paused, ExecutionContext, LedgerResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalReceipt {
    pub plan_id: u64,
    pub requested: u64,
    pub principal_part: u64,
    pub yield_part: u64,
    pub penalty: u64,
    pub payout: u64,
    pub is_early: bool,
}

/// Pays `amount` (0 = everything available) from a plan to its owner.
/// Before the end date the early-withdrawal penalty is withheld and stays in the pool.
pub fn withdraw(
    ctx: &mut ExecutionContext,
    caller: &AccountId,
    plan_id: u64,
    amount: u64,
) -> LedgerResult<WithdrawalReceipt> {
    require_not_paused(ctx.state)?;
    let now = ctx.timestamp;

    let plan = ctx.state.plan(plan_id)?;
    if plan.owner != *caller {
        return Err(LedgerError::NotPlanOwner(plan_id));
    }
    if !plan.is_withdrawable() {
        return Err(LedgerError::PlanNotActive(plan_id));
    }

    let available = plan.available();
    let requested = if amount == 0 { available } else { amount };
    if requested == 0 || requested > available {
        return Err(LedgerError::InvalidWithdrawalAmount {
            requested: amount,
            available,
        });
    }

    let is_early = now < plan.end_date;
    let payout = if is_early {
        let kept_bps = MAX_BPS.saturating_sub(ctx.state.config.early_withdrawal_penalty_bps);
        mul_div(requested, kept_bps, MAX_BPS)?
    } else {
        requested
    };
    let penalty = requested - payout;
    // Principal and yield leave in proportion to what the plan holds.
    let principal_part = mul_div(requested, plan.accumulated_balance, available)?;
    let yield_part = requested - principal_part;
    let owner = plan.owner;

    ensure_liquidity(ctx, payout)?;
    if payout > 0 {
        let pool = ctx.state.pool_account;
        ctx.tokens.transfer(&pool, &owner, payout)?;
    }

    let plan = ctx.state.plan_mut(plan_id)?;
    plan.accumulated_balance -= principal_part;
    plan.yield_earned -= yield_part;
    let emptied = plan.available() == 0 && plan.mark_completed();

    let totals = &mut ctx.state.pool;
    totals.principal_withdrawn = totals.principal_withdrawn.saturating_add(principal_part);
    totals.yield_withdrawn = totals.yield_withdrawn.saturating_add(yield_part);
    totals.penalties_forfeited = totals.penalties_forfeited.saturating_add(penalty);

    info!(
        "Plan {} withdrew {} (penalty {}, early: {})",
        plan_id, payout, penalty, is_early
    );
    if emptied {
        ctx.emit(LedgerEvent::PlanCompleted {
            plan_id,
            timestamp: now,
        });
    }
    ctx.emit(LedgerEvent::WithdrawalExecuted {
        plan_id,
        owner,
        requested,
        principal_part,
        yield_part,
        penalty,
        payout,
        is_early,
    });

    Ok(WithdrawalReceipt {
        plan_id,
        requested,
        principal_part,
        yield_part,
        penalty,
        payout,
        is_early,
    })
}

/// Credits whatever yield is pending and pays out the plan's whole yield
/// balance, penalty free. Returns 0 without side effects when nothing is owed.
pub fn claim_yield(ctx: &mut ExecutionContext, caller: &AccountId, plan_id: u64) -> LedgerResult<u64> {
    require_not_paused(ctx.state)?;

    let plan = ctx.state.plan(plan_id)?;
    if plan.owner != *caller {
        return Err(LedgerError::NotPlanOwner(plan_id));
    }
    let owner = plan.owner;

    distribute_yield_to(ctx, plan_id)?;
    let amount = ctx.state.plan(plan_id)?.yield_earned;
    if amount == 0 {
        return Ok(0);
    }

    ensure_liquidity(ctx, amount)?;
    let pool = ctx.state.pool_account;
    ctx.tokens.transfer(&pool, &owner, amount)?;

    ctx.state.plan_mut(plan_id)?.yield_earned = 0;
    ctx.state.pool.yield_withdrawn = ctx.state.pool.yield_withdrawn.saturating_add(amount);

    info!("Plan {} claimed {} yield", plan_id, amount);
    ctx.emit(LedgerEvent::YieldClaimed {
        plan_id,
        owner,
        amount,
    });
    Ok(amount)
}
