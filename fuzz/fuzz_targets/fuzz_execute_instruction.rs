#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use autosave_execution::{execute_instruction, ExecutionContext, InMemoryTokenGateway, MockYieldSource};
use autosave_types::{LedgerConfig, LedgerError, LedgerInstruction, LedgerState, PlanDuration};

const ADMIN: [u8; 32] = [1; 32];
const POOL: [u8; 32] = [2; 32];
const CUSTODY: [u8; 32] = [3; 32];
const SAVERS: [[u8; 32]; 3] = [[10; 32], [11; 32], [12; 32]];

#[derive(Arbitrary, Debug)]
enum Op {
    Create { saver: u8, daily: u16, duration: u8 },
    Deduct { plan: u8 },
    Batch { plans: Vec<u8> },
    Withdraw { saver: u8, plan: u8, amount: u32 },
    Claim { saver: u8, plan: u8 },
    ClaimAll,
    Harvest,
    HarvestAndClaimAll,
    Accrue { hours: u16 },
    Pause,
    Unpause,
}

#[derive(Arbitrary, Debug)]
struct Step {
    advance_mins: u16,
    op: Op,
}

// An honest venue that only ever gains must never trip the solvency check.
fn check<T>(result: Result<T, LedgerError>) {
    if let Err(LedgerError::AccountingMismatch { assets, liabilities }) = result {
        panic!("solvency broken: assets {} liabilities {}", assets, liabilities);
    }
}

fn claim_all(state: &mut LedgerState, tokens: &mut InMemoryTokenGateway, source: &mut MockYieldSource, now: u64) {
    let plans: Vec<(u64, [u8; 32])> = state.plans.values().map(|p| (p.id, p.owner)).collect();
    for (plan_id, owner) in plans {
        let mut ctx = ExecutionContext::new(&mut *state, &mut *tokens, now).with_yield_source(&mut *source);
        check(execute_instruction(&mut ctx, &owner, &LedgerInstruction::ClaimYield { plan_id }));
    }
}

fn duration_from(k: u8) -> PlanDuration {
    PlanDuration::ALL[k as usize % PlanDuration::ALL.len()]
}

fuzz_target!(|steps: Vec<Step>| {
    let config = LedgerConfig {
        min_daily_deduction: 1,
        min_pool_threshold: 1_000,
        harvest_interval_secs: 3_600,
        ..LedgerConfig::default()
    };
    let mut state = LedgerState::new(ADMIN, POOL, config).unwrap();
    let mut tokens = InMemoryTokenGateway::new();
    let mut source = MockYieldSource::new("fuzz", CUSTODY, 2_000);
    for saver in SAVERS {
        tokens.mint(&saver, 100_000_000).unwrap();
        tokens.approve(&saver, &POOL, u64::MAX).unwrap();
    }

    let mut now = 1_700_000_000u64;
    for step in steps.into_iter().take(256) {
        now += step.advance_mins as u64 * 60;
        let (sender, instruction) = match step.op {
            Op::Create { saver, daily, duration } => (
                SAVERS[saver as usize % SAVERS.len()],
                LedgerInstruction::CreatePlan {
                    daily_amount: daily as u64,
                    duration: duration_from(duration),
                },
            ),
            Op::Deduct { plan } => (ADMIN, LedgerInstruction::ExecuteDeduction { plan_id: plan as u64 }),
            Op::Batch { plans } => (
                ADMIN,
                LedgerInstruction::ExecuteDeductionsBatch {
                    plan_ids: plans.into_iter().take(16).map(u64::from).collect(),
                },
            ),
            Op::Withdraw { saver, plan, amount } => (
                SAVERS[saver as usize % SAVERS.len()],
                LedgerInstruction::Withdraw {
                    plan_id: plan as u64,
                    amount: amount as u64,
                },
            ),
            Op::Claim { saver, plan } => (
                SAVERS[saver as usize % SAVERS.len()],
                LedgerInstruction::ClaimYield { plan_id: plan as u64 },
            ),
            Op::Harvest => (ADMIN, LedgerInstruction::HarvestYield),
            Op::ClaimAll => {
                claim_all(&mut state, &mut tokens, &mut source, now);
                continue;
            }
            Op::HarvestAndClaimAll => {
                let mut ctx = ExecutionContext::new(&mut state, &mut tokens, now).with_yield_source(&mut source);
                check(execute_instruction(&mut ctx, &ADMIN, &LedgerInstruction::HarvestYield));
                claim_all(&mut state, &mut tokens, &mut source, now);
                continue;
            }
            Op::Accrue { hours } => {
                source.accrue(&mut tokens, hours as u64 * 3_600).unwrap();
                continue;
            }
            Op::Pause => (ADMIN, LedgerInstruction::Pause),
            Op::Unpause => (ADMIN, LedgerInstruction::Unpause),
        };

        let mut ctx = ExecutionContext::new(&mut state, &mut tokens, now).with_yield_source(&mut source);
        check(execute_instruction(&mut ctx, &sender, &instruction));

        // Claims and harvests together never hand out more than the venue earned.
        let pool = &state.pool;
        let paid = pool.total_user_yield as u128 + pool.total_protocol_yield as u128;
        assert!(paid <= pool.source_gain(source.balance()) as u128);
    }

    for plan in state.plans.values() {
        assert!(plan.slots_consumed() <= plan.duration.days());
        assert!(plan.accumulated_balance <= plan.principal_deposited);
    }
});
