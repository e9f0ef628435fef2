use autosave_types::{AccountId, LedgerError, LedgerEvent, LedgerState, Plan, PlanDuration};
use tracing::info;

use crate::{require_not_paused, ExecutionContext, LedgerResult};

pub fn create_plan(
    ctx: &mut ExecutionContext,
    owner: &AccountId,
    daily_amount: u64,
    duration: PlanDuration,
) -> LedgerResult<u64> {
    require_not_paused(ctx.state)?;

    let cfg = &ctx.state.config;
    if daily_amount < cfg.min_daily_deduction || daily_amount > cfg.max_daily_deduction {
        return Err(LedgerError::InvalidDailyAmount {
            amount: daily_amount,
            min: cfg.min_daily_deduction,
            max: cfg.max_daily_deduction,
        });
    }

    let plan_id = ctx
        .state
        .pool
        .total_plans
        .checked_add(1)
        .ok_or(LedgerError::MathOverflow)?;
    let plan = Plan::new(plan_id, *owner, daily_amount, duration, ctx.timestamp)?;

    ctx.state.pool.total_plans = plan_id;
    ctx.state
        .plans_by_owner
        .entry(*owner)
        .or_default()
        .push(plan_id);

    info!(
        "Plan {} created: {} per day for {} days",
        plan_id,
        daily_amount,
        duration.days()
    );
    ctx.emit(LedgerEvent::PlanCreated {
        plan_id,
        owner: *owner,
        daily_amount,
        duration,
        start_date: plan.start_date,
        end_date: plan.end_date,
        total_target: plan.total_target,
    });
    ctx.state.plans.insert(plan_id, plan);

    Ok(plan_id)
}

pub fn get_plan(state: &LedgerState, plan_id: u64) -> LedgerResult<&Plan> {
    state.plan(plan_id)
}

pub fn plans_of<'s>(state: &'s LedgerState, owner: &AccountId) -> Vec<&'s Plan> {
    state.plans_of(owner)
}
