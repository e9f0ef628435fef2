use autosave_types::config::{MAX_BPS, MAX_EMERGENCY_DELAY, MAX_PENALTY_BPS, MIN_EMERGENCY_DELAY};
use autosave_types::{AccountId, LedgerError, LedgerEvent};
use tracing::{info, warn};

use super::yield_pool::ensure_liquidity;
use crate::yield_source::YieldSource;
use crate::{require_admin, require_not_paused, require_paused, ExecutionContext, LedgerResult};

// ═══════════════════════════════════════════════════════════════
// Parameters
// ═══════════════════════════════════════════════════════════════

fn parameter_updated(ctx: &mut ExecutionContext, parameter: &str, old_value: u64, new_value: u64) {
    info!("{} updated: {} -> {}", parameter, old_value, new_value);
    ctx.emit(LedgerEvent::ParameterUpdated {
        parameter: parameter.to_string(),
        old_value,
        new_value,
    });
}

pub fn set_early_withdrawal_penalty(ctx: &mut ExecutionContext, caller: &AccountId, bps: u64) -> LedgerResult<()> {
    require_admin(ctx.state, caller)?;
    if bps > MAX_PENALTY_BPS {
        return Err(LedgerError::InvalidParameter(format!(
            "penalty {} bps exceeds {}",
            bps, MAX_PENALTY_BPS
        )));
    }
    let old = std::mem::replace(&mut ctx.state.config.early_withdrawal_penalty_bps, bps);
    parameter_updated(ctx, "early_withdrawal_penalty_bps", old, bps);
    Ok(())
}

pub fn set_deduction_limits(ctx: &mut ExecutionContext, caller: &AccountId, min: u64, max: u64) -> LedgerResult<()> {
    require_admin(ctx.state, caller)?;
    if min == 0 || min > max {
        return Err(LedgerError::InvalidParameter(format!(
            "deduction limits {}..={} are not a valid range",
            min, max
        )));
    }
    let old_min = std::mem::replace(&mut ctx.state.config.min_daily_deduction, min);
    let old_max = std::mem::replace(&mut ctx.state.config.max_daily_deduction, max);
    parameter_updated(ctx, "min_daily_deduction", old_min, min);
    parameter_updated(ctx, "max_daily_deduction", old_max, max);
    Ok(())
}

pub fn set_user_yield_share(ctx: &mut ExecutionContext, caller: &AccountId, bps: u64) -> LedgerResult<()> {
    require_admin(ctx.state, caller)?;
    if bps > MAX_BPS {
        return Err(LedgerError::InvalidParameter(format!(
            "user share {} bps exceeds {}",
            bps, MAX_BPS
        )));
    }
    let old = std::mem::replace(&mut ctx.state.config.user_yield_share_bps, bps);
    parameter_updated(ctx, "user_yield_share_bps", old, bps);
    Ok(())
}

pub fn set_min_pool_threshold(ctx: &mut ExecutionContext, caller: &AccountId, amount: u64) -> LedgerResult<()> {
    require_admin(ctx.state, caller)?;
    let old = std::mem::replace(&mut ctx.state.config.min_pool_threshold, amount);
    parameter_updated(ctx, "min_pool_threshold", old, amount);
    Ok(())
}

pub fn set_emergency_delay(ctx: &mut ExecutionContext, caller: &AccountId, secs: u64) -> LedgerResult<()> {
    require_admin(ctx.state, caller)?;
    if !(MIN_EMERGENCY_DELAY..=MAX_EMERGENCY_DELAY).contains(&secs) {
        return Err(LedgerError::InvalidParameter(format!(
            "emergency delay {}s outside {}..={}",
            secs, MIN_EMERGENCY_DELAY, MAX_EMERGENCY_DELAY
        )));
    }
    let old = std::mem::replace(&mut ctx.state.config.emergency_delay_secs, secs);
    parameter_updated(ctx, "emergency_delay_secs", old, secs);
    Ok(())
}

pub fn set_harvest_interval(ctx: &mut ExecutionContext, caller: &AccountId, secs: u64) -> LedgerResult<()> {
    require_admin(ctx.state, caller)?;
    let old = std::mem::replace(&mut ctx.state.config.harvest_interval_secs, secs);
    parameter_updated(ctx, "harvest_interval_secs", old, secs);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// Roles
// ═══════════════════════════════════════════════════════════════

pub fn set_keeper(ctx: &mut ExecutionContext, caller: &AccountId, keeper: AccountId, enabled: bool) -> LedgerResult<()> {
    require_admin(ctx.state, caller)?;
    if enabled {
        ctx.state.keepers.insert(keeper);
    } else {
        ctx.state.keepers.remove(&keeper);
    }
    info!("Keeper {} enabled: {}", hex::encode(keeper), enabled);
    ctx.emit(LedgerEvent::KeeperUpdated { keeper, enabled });
    Ok(())
}

/// First half of the admin handover; the proposed account must accept.
pub fn propose_admin(ctx: &mut ExecutionContext, caller: &AccountId, proposed: AccountId) -> LedgerResult<()> {
    require_admin(ctx.state, caller)?;
    ctx.state.pending_admin = Some(proposed);
    ctx.emit(LedgerEvent::AdminProposed { proposed });
    Ok(())
}

pub fn accept_admin(ctx: &mut ExecutionContext, caller: &AccountId) -> LedgerResult<()> {
    if ctx.state.pending_admin != Some(*caller) {
        return Err(LedgerError::Unauthorized);
    }
    let previous = std::mem::replace(&mut ctx.state.admin, *caller);
    ctx.state.pending_admin = None;
    info!("Admin transferred to {}", hex::encode(caller));
    ctx.emit(LedgerEvent::AdminTransferred {
        previous,
        admin: *caller,
    });
    Ok(())
}

pub fn pause(ctx: &mut ExecutionContext, caller: &AccountId) -> LedgerResult<()> {
    require_admin(ctx.state, caller)?;
    if ctx.state.paused {
        return Err(LedgerError::AlreadyPaused);
    }
    ctx.state.paused = true;
    warn!("Ledger paused");
    ctx.emit(LedgerEvent::Paused { by: *caller });
    Ok(())
}

pub fn unpause(ctx: &mut ExecutionContext, caller: &AccountId) -> LedgerResult<()> {
    require_admin(ctx.state, caller)?;
    require_paused(ctx.state)?;
    ctx.state.paused = false;
    info!("Ledger unpaused");
    ctx.emit(LedgerEvent::Unpaused { by: *caller });
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// Treasury
// ═══════════════════════════════════════════════════════════════

/// Pays out harvested protocol yield. `amount == 0` takes everything outstanding.
/// Fees stay in the pool while the ledger is halted.
pub fn withdraw_protocol_fees(
    ctx: &mut ExecutionContext,
    caller: &AccountId,
    to: AccountId,
    amount: u64,
) -> LedgerResult<u64> {
    require_admin(ctx.state, caller)?;
    require_not_paused(ctx.state)?;
    let outstanding = ctx.state.pool.protocol_yield_outstanding();
    let amount = if amount == 0 { outstanding } else { amount };
    if amount == 0 || amount > outstanding {
        return Err(LedgerError::InsufficientProtocolYield {
            requested: amount,
            available: outstanding,
        });
    }

    ensure_liquidity(ctx, amount)?;
    let pool = ctx.state.pool_account;
    ctx.tokens.transfer(&pool, &to, amount)?;
    ctx.state.pool.protocol_yield_withdrawn =
        ctx.state.pool.protocol_yield_withdrawn.saturating_add(amount);

    info!("Protocol fees {} paid to {}", amount, hex::encode(to));
    ctx.emit(LedgerEvent::ProtocolFeesWithdrawn { to, amount });
    Ok(amount)
}

/// Exits the current source and resets the pool's shares. The host swaps
/// `candidate` in afterwards; recovered funds stay on hand until the next sweep.
pub fn set_yield_source(
    ctx: &mut ExecutionContext,
    caller: &AccountId,
    candidate: &mut dyn YieldSource,
) -> LedgerResult<u64> {
    require_admin(ctx.state, caller)?;
    if !candidate.is_healthy().unwrap_or(false) {
        return Err(LedgerError::YieldSourceUnhealthy);
    }
    let protocol_name = candidate
        .get_protocol_name()
        .map_err(|_| LedgerError::YieldSourceUnhealthy)?;

    let pool = ctx.state.pool_account;
    let mut recovered = 0;
    if let Some(current) = ctx.yield_source.as_deref_mut() {
        if ctx.state.pool.total_yield_shares > 0 {
            recovered = current.emergency_withdraw(&mut *ctx.tokens, &pool).map_err(|e| {
                warn!("Could not exit current yield source: {}", e);
                LedgerError::YieldSourceUnhealthy
            })?;
        }
    }
    let pool_totals = &mut ctx.state.pool;
    pool_totals.total_yield_shares = 0;
    pool_totals.source_withdrawn = pool_totals.source_withdrawn.saturating_add(recovered);

    info!("Yield source replaced by {}, recovered {}", protocol_name, recovered);
    ctx.emit(LedgerEvent::YieldSourceReplaced {
        protocol_name,
        recovered,
    });
    Ok(recovered)
}
