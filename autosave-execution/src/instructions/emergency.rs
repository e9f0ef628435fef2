//! Time-locked admin withdrawals, available only while the ledger is paused.
//!
//! A request is scheduled, waits out the configured delay and is then either
//! executed once or cancelled. Funds only ever go to the plan owner.

use autosave_types::emergency::{EmergencyWithdrawal, RequestId};
use autosave_types::{AccountId, LedgerError, LedgerEvent};
use tracing::{info, warn};

use super::yield_pool::ensure_liquidity;
use crate::{require_admin, require_paused, ExecutionContext, LedgerResult};

pub fn schedule_emergency_withdrawal(
    ctx: &mut ExecutionContext,
    admin: &AccountId,
    user: AccountId,
    plan_id: u64,
    amount: u64,
    reason: &str,
) -> LedgerResult<RequestId> {
    require_admin(ctx.state, admin)?;
    require_paused(ctx.state)?;

    let plan = ctx.state.plan(plan_id)?;
    if plan.owner != user {
        return Err(LedgerError::NotPlanOwner(plan_id));
    }
    let available = plan.available();
    if amount > available {
        return Err(LedgerError::InvalidWithdrawalAmount {
            requested: amount,
            available,
        });
    }

    let scheduled_time = ctx.timestamp;
    let execution_time = scheduled_time
        .checked_add(ctx.state.config.emergency_delay_secs)
        .ok_or(LedgerError::MathOverflow)?;
    let reason_hash = EmergencyWithdrawal::reason_hash(reason);
    let id = EmergencyWithdrawal::compute_id(
        admin,
        &user,
        plan_id,
        amount,
        scheduled_time,
        &reason_hash,
    );
    if ctx.state.emergency_requests.contains_key(&id) {
        return Err(LedgerError::EmergencyAlreadyScheduled);
    }

    ctx.state.emergency_requests.insert(
        id,
        EmergencyWithdrawal {
            id,
            admin: *admin,
            user,
            plan_id,
            amount,
            scheduled_time,
            execution_time,
            reason_hash,
            executed: false,
            cancelled: false,
        },
    );

    warn!(
        "Emergency withdrawal {} scheduled for plan {}, executable at {}",
        hex::encode(id),
        plan_id,
        execution_time
    );
    ctx.emit(LedgerEvent::EmergencyScheduled {
        id,
        admin: *admin,
        user,
        plan_id,
        amount,
        execution_time,
        reason_hash,
    });
    Ok(id)
}

/// Pays the request out to the plan owner and completes the plan.
/// The amount is clamped to what the plan still holds.
pub fn execute_emergency_withdrawal(
    ctx: &mut ExecutionContext,
    admin: &AccountId,
    id: &RequestId,
) -> LedgerResult<u64> {
    require_admin(ctx.state, admin)?;
    require_paused(ctx.state)?;

    let request = ctx
        .state
        .emergency_requests
        .get(id)
        .ok_or(LedgerError::EmergencyNotFound)?;
    if request.executed {
        return Err(LedgerError::EmergencyAlreadyExecuted);
    }
    if request.cancelled {
        return Err(LedgerError::EmergencyCancelled);
    }
    if ctx.timestamp < request.execution_time {
        return Err(LedgerError::EmergencyWithdrawalNotReady {
            execution_time: request.execution_time,
        });
    }
    let (user, plan_id, requested) = (request.user, request.plan_id, request.amount);

    let plan = ctx.state.plan(plan_id)?;
    let available = plan.available();
    let payout = if requested == 0 { available } else { requested.min(available) };
    let principal_part = payout.min(plan.accumulated_balance);
    let yield_part = payout - principal_part;

    ensure_liquidity(ctx, payout)?;
    if payout > 0 {
        let pool = ctx.state.pool_account;
        ctx.tokens.transfer(&pool, &user, payout)?;
    }

    let plan = ctx.state.plan_mut(plan_id)?;
    plan.accumulated_balance -= principal_part;
    plan.yield_earned -= yield_part;
    let completed = plan.mark_completed();

    let totals = &mut ctx.state.pool;
    totals.principal_withdrawn = totals.principal_withdrawn.saturating_add(principal_part);
    totals.yield_withdrawn = totals.yield_withdrawn.saturating_add(yield_part);

    if let Some(request) = ctx.state.emergency_requests.get_mut(id) {
        request.executed = true;
    }

    warn!(
        "Emergency withdrawal {} paid {} to plan {} owner",
        hex::encode(id),
        payout,
        plan_id
    );
    if completed {
        ctx.emit(LedgerEvent::PlanCompleted {
            plan_id,
            timestamp: ctx.timestamp,
        });
    }
    ctx.emit(LedgerEvent::EmergencyExecuted {
        id: *id,
        user,
        plan_id,
        principal_part,
        yield_part,
        payout,
    });
    Ok(payout)
}

/// Cancels a pending request. Allowed at any time before execution.
pub fn cancel_emergency_withdrawal(
    ctx: &mut ExecutionContext,
    admin: &AccountId,
    id: &RequestId,
) -> LedgerResult<()> {
    require_admin(ctx.state, admin)?;

    let request = ctx
        .state
        .emergency_requests
        .get_mut(id)
        .ok_or(LedgerError::EmergencyNotFound)?;
    if request.executed {
        return Err(LedgerError::EmergencyAlreadyExecuted);
    }
    if request.cancelled {
        return Err(LedgerError::EmergencyCancelled);
    }
    request.cancelled = true;
    let plan_id = request.plan_id;

    info!("Emergency withdrawal {} cancelled", hex::encode(id));
    ctx.emit(LedgerEvent::EmergencyCancelled { id: *id, plan_id });
    Ok(())
}
