use autosave_execution::{
    admin, execute_instruction, ExecutionContext, InMemoryTokenGateway, InstructionOutcome,
    LedgerResult, MockYieldSource, TokenGateway,
};
use autosave_types::{AccountId, LedgerConfig, LedgerError, LedgerEvent, LedgerInstruction, LedgerState};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// A self-contained deployment: the ledger plus the in-memory token book and
/// yield venue it talks to. This is what the CLI persists between runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Sandbox {
    pub state: LedgerState,
    pub tokens: InMemoryTokenGateway,
    pub yield_source: Option<MockYieldSource>,
    /// Timestamp of the last committed instruction. Never moves backwards.
    pub clock: u64,
    /// Number of committed instructions.
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub sequence: u64,
    pub outcome: InstructionOutcome,
    pub events: Vec<LedgerEvent>,
}

impl Sandbox {
    pub fn new(
        admin: AccountId,
        pool_account: AccountId,
        config: LedgerConfig,
        genesis_time: u64,
    ) -> LedgerResult<Self> {
        Ok(Self {
            state: LedgerState::new(admin, pool_account, config)?,
            tokens: InMemoryTokenGateway::new(),
            yield_source: None,
            clock: genesis_time,
            sequence: 0,
        })
    }

    pub fn with_yield_source(mut self, source: MockYieldSource) -> Self {
        self.yield_source = Some(source);
        self
    }

    pub fn context(&mut self, timestamp: u64) -> ExecutionContext<'_> {
        let ctx = ExecutionContext::new(&mut self.state, &mut self.tokens, timestamp);
        match self.yield_source.as_mut() {
            Some(source) => ctx.with_yield_source(source),
            None => ctx,
        }
    }

    /// Runs one instruction against a draft and commits it only on success.
    /// A failed accounting check is the exception: the halt is kept.
    pub fn apply(
        &mut self,
        sender: &AccountId,
        instruction: &LedgerInstruction,
        timestamp: u64,
    ) -> LedgerResult<Applied> {
        self.check_clock(timestamp)?;

        let mut draft = self.clone();
        let result = {
            let mut ctx = draft.context(timestamp);
            execute_instruction(&mut ctx, sender, instruction).map(|outcome| (outcome, ctx.take_events()))
        };

        match result {
            Ok((outcome, events)) => {
                draft.clock = timestamp;
                draft.sequence += 1;
                *self = draft;
                Ok(Applied {
                    sequence: self.sequence,
                    outcome,
                    events,
                })
            }
            Err(e @ LedgerError::AccountingMismatch { .. }) => {
                error!("Instruction rejected by accounting check, ledger halted: {}", e);
                self.state.paused = true;
                self.clock = timestamp;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Moves the pool to a new venue. Not an instruction because the venue is
    /// a live object rather than data.
    pub fn replace_yield_source(
        &mut self,
        admin_account: &AccountId,
        mut candidate: MockYieldSource,
        timestamp: u64,
    ) -> LedgerResult<(u64, Vec<LedgerEvent>)> {
        self.check_clock(timestamp)?;

        let mut draft = self.clone();
        let (recovered, events) = {
            let mut ctx = draft.context(timestamp);
            let recovered = admin::set_yield_source(&mut ctx, admin_account, &mut candidate)?;
            (recovered, ctx.take_events())
        };
        draft.yield_source = Some(candidate);
        draft.clock = timestamp;
        draft.sequence += 1;
        *self = draft;
        Ok((recovered, events))
    }

    /// Lets the venue earn interest for `elapsed_secs` at its configured APY.
    pub fn accrue_yield(&mut self, elapsed_secs: u64) -> LedgerResult<u64> {
        let Some(source) = self.yield_source.as_mut() else {
            return Ok(0);
        };
        let interest = source
            .accrue(&mut self.tokens, elapsed_secs)
            .map_err(|e| LedgerError::InvalidParameter(e.to_string()))?;
        info!("Yield source accrued {} over {}s", interest, elapsed_secs);
        Ok(interest)
    }

    /// Mints test funds and authorizes the pool to pull them.
    pub fn fund(&mut self, account: &AccountId, amount: u64) -> LedgerResult<()> {
        self.tokens.mint(account, amount)?;
        let pool = self.state.pool_account;
        let allowance = self.tokens.allowance(account, &pool).saturating_add(amount);
        self.tokens.approve(account, &pool, allowance)?;
        Ok(())
    }

    fn check_clock(&self, timestamp: u64) -> LedgerResult<()> {
        if timestamp < self.clock {
            return Err(LedgerError::InvalidParameter(format!(
                "timestamp {} is before ledger clock {}",
                timestamp, self.clock
            )));
        }
        Ok(())
    }
}
