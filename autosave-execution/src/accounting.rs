use autosave_types::{LedgerError, LedgerEvent};
use tracing::{error, warn};

use crate::{ExecutionContext, LedgerResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountingReport {
    pub on_hand: u64,
    /// `None` when the source could not be read; the check is then skipped.
    pub source_balance: Option<u64>,
    pub liabilities: u128,
}

impl AccountingReport {
    pub fn assets(&self) -> Option<u128> {
        self.source_balance
            .map(|source| self.on_hand as u128 + source as u128)
    }

    /// Positive surplus is penalties, unharvested gains and rounding dust.
    pub fn is_solvent(&self, tolerance: u64) -> Option<bool> {
        self.assets()
            .map(|assets| assets + tolerance as u128 >= self.liabilities)
    }

    /// How far liabilities exceed assets; `None` when the source is unreadable.
    pub fn deficit(&self) -> Option<u128> {
        self.assets()
            .map(|assets| self.liabilities.saturating_sub(assets))
    }
}

pub fn accounting_report(ctx: &ExecutionContext) -> AccountingReport {
    let source_balance = match ctx.yield_source.as_deref() {
        Some(source) => source.get_balance().ok(),
        None => Some(0),
    };
    AccountingReport {
        on_hand: ctx.on_hand(),
        source_balance,
        liabilities: ctx.state.liabilities(),
    }
}

/// Halts the ledger when assets no longer cover liabilities.
pub fn enforce_accounting(ctx: &mut ExecutionContext) -> LedgerResult<AccountingReport> {
    let report = accounting_report(ctx);
    check_report(ctx, report)
}

/// Post-check for one operation, given the report taken before it ran.
///
/// A ledger that was already under water and stays halted may keep running
/// operations that do not deepen the deficit, so the pause-gated emergency
/// path remains usable. Anything else that ends insolvent halts as usual.
pub fn enforce_accounting_since(
    ctx: &mut ExecutionContext,
    before: &AccountingReport,
) -> LedgerResult<AccountingReport> {
    let report = accounting_report(ctx);
    let tolerance = ctx.state.config.accounting_tolerance;
    if report.is_solvent(tolerance) == Some(false) && ctx.state.paused {
        if let (Some(false), Some(was), Some(now)) =
            (before.is_solvent(tolerance), before.deficit(), report.deficit())
        {
            if now <= was {
                warn!(
                    "Ledger still under water by {} (was {}), staying halted",
                    now, was
                );
                return Ok(report);
            }
        }
    }
    check_report(ctx, report)
}

fn check_report(ctx: &mut ExecutionContext, report: AccountingReport) -> LedgerResult<AccountingReport> {
    match report.is_solvent(ctx.state.config.accounting_tolerance) {
        Some(true) => Ok(report),
        Some(false) => {
            let assets = clamp(report.assets().unwrap_or(0));
            let liabilities = clamp(report.liabilities);
            error!(
                "Accounting invariant violated: assets {} < liabilities {}. Halting ledger.",
                assets, liabilities
            );
            ctx.state.paused = true;
            ctx.emit(LedgerEvent::InvariantViolated { assets, liabilities });
            Err(LedgerError::AccountingMismatch { assets, liabilities })
        }
        None => {
            warn!("Skipping accounting check: yield source balance unreadable");
            Ok(report)
        }
    }
}

fn clamp(v: u128) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}
