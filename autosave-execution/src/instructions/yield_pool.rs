//! Pooled position in the yield source and per-plan yield entitlement.
//!
//! Plans never hold shares. The pool tracks the lifetime gain of its position,
//! `source_balance + source_withdrawn - source_deposited`, which claims,
//! harvests and re-sweeps leave unchanged. A plan's slice of that gain is
//! `gain * principal_deposited / total_principal`.
//!
//! The slice is ramped linearly over the plan duration and cut to the user
//! share. Whatever was already credited is netted out, and no plan is credited
//! beyond the user side of the gain that other plans have not yet taken.

use autosave_types::config::MAX_BPS;
use autosave_types::{AccountId, LedgerError, LedgerEvent, LedgerState, Plan};
use tracing::{debug, error, info, warn};

use crate::{mul_div, require_not_paused, ExecutionContext, LedgerResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub total_yield: u64,
    pub user_yield: u64,
    pub protocol_yield: u64,
}

/// Moves `amount` of on-hand liquidity into the source. Never fails the caller:
/// an unhealthy or reverting source leaves the funds on hand and returns 0.
pub fn deposit_to_yield(ctx: &mut ExecutionContext, amount: u64) -> u64 {
    if amount == 0 || ctx.yield_source.is_none() {
        return 0;
    }
    if !ctx.source_healthy() {
        debug!("Yield source unhealthy, keeping {} on hand", amount);
        return 0;
    }

    let pool = ctx.state.pool_account;
    let Some(source) = ctx.yield_source.as_deref_mut() else {
        return 0;
    };
    match source.deposit(&mut *ctx.tokens, &pool, amount) {
        Ok(shares) => {
            let pool_totals = &mut ctx.state.pool;
            pool_totals.total_yield_shares = pool_totals.total_yield_shares.saturating_add(shares);
            pool_totals.source_deposited = pool_totals.source_deposited.saturating_add(amount);
            let total_yield_shares = pool_totals.total_yield_shares;
            info!("Deposited {} to yield source for {} shares", amount, shares);
            ctx.emit(LedgerEvent::YieldDeposited {
                amount,
                shares,
                total_yield_shares,
            });
            amount
        }
        Err(e) => {
            warn!("Yield deposit of {} failed, funds stay on hand: {}", amount, e);
            0
        }
    }
}

/// Pulls roughly `amount` back to the pool. On failure the whole position is
/// exited once through the source's emergency path; if that fails as well the
/// funds are stuck and 0 is returned.
pub fn withdraw_from_yield(ctx: &mut ExecutionContext, amount: u64) -> u64 {
    let total_shares = ctx.state.pool.total_yield_shares;
    if amount == 0 || total_shares == 0 {
        return 0;
    }
    let balance = ctx.source_balance();
    if balance == 0 {
        return 0;
    }

    // Round shares up so the amount received covers the request.
    let shares = if amount >= balance {
        total_shares
    } else {
        let numerator = amount as u128 * total_shares as u128;
        let ceil = (numerator + balance as u128 - 1) / balance as u128;
        u64::try_from(ceil).unwrap_or(total_shares).min(total_shares)
    };

    let pool = ctx.state.pool_account;
    let Some(source) = ctx.yield_source.as_deref_mut() else {
        return 0;
    };

    let (received, shares_burned, emergency_exit) =
        match source.withdraw(&mut *ctx.tokens, &pool, shares) {
            Ok(received) => (received, shares, false),
            Err(e) => {
                warn!("Yield withdraw of {} shares failed ({}), exiting position", shares, e);
                match source.emergency_withdraw(&mut *ctx.tokens, &pool) {
                    Ok(received) => (received, total_shares, true),
                    Err(e) => {
                        error!(
                            "Emergency exit from yield source failed, {} remains stuck: {}",
                            balance, e
                        );
                        return 0;
                    }
                }
            }
        };

    let pool_totals = &mut ctx.state.pool;
    pool_totals.total_yield_shares = total_shares - shares_burned;
    pool_totals.source_withdrawn = pool_totals.source_withdrawn.saturating_add(received);
    info!("Withdrew {} from yield source ({} shares)", received, shares_burned);
    ctx.emit(LedgerEvent::YieldWithdrawn {
        requested: amount,
        received,
        shares_burned,
        emergency_exit,
    });
    received
}

/// Realizes the gain not yet harvested and splits it between
/// savers and the protocol.
pub fn harvest_yield(ctx: &mut ExecutionContext, caller: &AccountId) -> LedgerResult<HarvestReport> {
    require_not_paused(ctx.state)?;
    if !ctx.state.can_harvest(caller) {
        return Err(LedgerError::Unauthorized);
    }
    if ctx.yield_source.is_none() {
        return Err(LedgerError::YieldSourceNotSet);
    }
    if let Some(last) = ctx.state.pool.last_harvest {
        let next_allowed = last.saturating_add(ctx.state.config.harvest_interval_secs);
        if ctx.timestamp < next_allowed {
            return Err(LedgerError::HarvestTooSoon { next_allowed });
        }
    }

    let source_balance = ctx.source_balance();
    let total_yield = ctx
        .state
        .pool
        .unharvested_gain(source_balance)
        .min(source_balance);
    if total_yield == 0 {
        debug!("Nothing to harvest");
        return Ok(HarvestReport::default());
    }

    let received = withdraw_from_yield(ctx, total_yield);
    let harvested = received.min(total_yield);
    let user_yield = mul_div(harvested, ctx.state.config.user_yield_share_bps, MAX_BPS)?;
    let protocol_yield = harvested - user_yield;

    let pool = &mut ctx.state.pool;
    pool.harvested_user_yield = pool.harvested_user_yield.saturating_add(user_yield);
    pool.total_protocol_yield = pool.total_protocol_yield.saturating_add(protocol_yield);
    pool.total_harvested = pool.total_harvested.saturating_add(harvested);
    pool.last_harvest = Some(ctx.timestamp);

    info!(
        "Harvested {} (user {}, protocol {})",
        harvested, user_yield, protocol_yield
    );
    ctx.emit(LedgerEvent::YieldHarvested {
        total_yield: harvested,
        user_yield,
        protocol_yield,
        timestamp: ctx.timestamp,
    });

    Ok(HarvestReport {
        total_yield: harvested,
        user_yield,
        protocol_yield,
    })
}

/// Yield the plan could claim right now. Read-only.
pub fn accumulated_yield_of(ctx: &ExecutionContext, plan_id: u64) -> LedgerResult<u64> {
    let plan = ctx.state.plan(plan_id)?;
    pending_yield(ctx.state, plan, ctx.source_balance(), ctx.timestamp)
}

/// Credits pending yield into the plan. The only writer of plan-level yield.
pub fn distribute_yield_to(ctx: &mut ExecutionContext, plan_id: u64) -> LedgerResult<u64> {
    let source_balance = ctx.source_balance();
    let plan = ctx.state.plan(plan_id)?;
    let amount = pending_yield(ctx.state, plan, source_balance, ctx.timestamp)?;
    if amount == 0 {
        return Ok(0);
    }

    let plan = ctx.state.plan_mut(plan_id)?;
    plan.yield_earned = plan.yield_earned.checked_add(amount).ok_or(LedgerError::MathOverflow)?;
    plan.yield_credited = plan.yield_credited.saturating_add(amount);
    let yield_earned = plan.yield_earned;
    ctx.state.pool.total_user_yield = ctx.state.pool.total_user_yield.saturating_add(amount);

    ctx.emit(LedgerEvent::YieldDistributed {
        plan_id,
        amount,
        yield_earned,
    });
    Ok(amount)
}

fn pending_yield(state: &LedgerState, plan: &Plan, source_balance: u64, now: u64) -> LedgerResult<u64> {
    let pool = &state.pool;
    if pool.total_principal == 0 || pool.total_yield_shares == 0 {
        return Ok(0);
    }

    let gain = pool.source_gain(source_balance);
    let share = mul_div(gain, plan.principal_deposited, pool.total_principal)?;

    let duration = plan.duration.seconds();
    let elapsed = now.saturating_sub(plan.start_date).min(duration);
    let time_weighted = mul_div(share, elapsed, duration)?;
    let user_bps = state.config.user_yield_share_bps;
    let entitlement = mul_div(time_weighted, user_bps, MAX_BPS)?;

    // Never past the user side of the harvested and unharvested gain that no
    // plan has been credited yet.
    let unharvested_user = mul_div(pool.unharvested_gain(source_balance), user_bps, MAX_BPS)?;
    let unallocated = pool
        .harvested_user_yield
        .saturating_add(unharvested_user)
        .saturating_sub(pool.total_user_yield);
    Ok(entitlement
        .saturating_sub(plan.yield_credited)
        .min(unallocated))
}

/// Tops up on-hand liquidity from the source so `needed` can be paid out.
pub(crate) fn ensure_liquidity(ctx: &mut ExecutionContext, needed: u64) -> LedgerResult<()> {
    let on_hand = ctx.on_hand();
    if on_hand >= needed {
        return Ok(());
    }
    withdraw_from_yield(ctx, needed - on_hand);
    let available = ctx.on_hand();
    if available < needed {
        return Err(LedgerError::InsufficientLiquidity { needed, available });
    }
    Ok(())
}

/// Sweeps up to `amount` of on-hand funds once liquidity reaches the pooling threshold.
pub(crate) fn sweep_to_yield(ctx: &mut ExecutionContext, amount: u64) -> u64 {
    if ctx.yield_source.is_none() {
        return 0;
    }
    let on_hand = ctx.on_hand();
    if on_hand == 0 || on_hand < ctx.state.config.min_pool_threshold {
        return 0;
    }
    deposit_to_yield(ctx, amount.min(on_hand))
}
