#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use autosave_execution::{
    create_plan, execute_deduction, withdraw, ExecutionContext, InMemoryTokenGateway, TokenGateway,
};
use autosave_types::plan::SECONDS_PER_DAY;
use autosave_types::{LedgerConfig, LedgerState, PlanDuration};

const ADMIN: [u8; 32] = [1; 32];
const POOL: [u8; 32] = [2; 32];
const SAVER: [u8; 32] = [10; 32];
const START: u64 = 1_700_000_000;

#[derive(Arbitrary, Debug)]
struct WithdrawInput {
    daily: u32,
    deductions: u8,
    penalty_bps: u16,
    at_day: u16,
    amounts: Vec<u64>,
}

fuzz_target!(|data: WithdrawInput| {
    let config = LedgerConfig {
        min_daily_deduction: 1,
        early_withdrawal_penalty_bps: data.penalty_bps as u64 % 5_001,
        ..LedgerConfig::default()
    };
    let mut state = LedgerState::new(ADMIN, POOL, config).unwrap();
    let mut tokens = InMemoryTokenGateway::new();
    tokens.mint(&SAVER, u64::MAX / 2).unwrap();
    tokens.approve(&SAVER, &POOL, u64::MAX).unwrap();

    let daily = (data.daily as u64 % 1_000_000_000).max(1);
    let plan_id = {
        let mut ctx = ExecutionContext::new(&mut state, &mut tokens, START);
        create_plan(&mut ctx, &SAVER, daily, PlanDuration::NinetyDays).unwrap()
    };
    for day in 0..(data.deductions as u64 % 90) {
        let mut ctx = ExecutionContext::new(&mut state, &mut tokens, START + day * SECONDS_PER_DAY);
        execute_deduction(&mut ctx, plan_id).unwrap();
    }

    let now = START + (data.at_day as u64 % 120) * SECONDS_PER_DAY + 1;
    for amount in data.amounts.into_iter().take(32) {
        let before = state.plan(plan_id).unwrap().available();
        let mut ctx = ExecutionContext::new(&mut state, &mut tokens, now);
        match withdraw(&mut ctx, &SAVER, plan_id, amount) {
            Ok(receipt) => {
                assert_eq!(receipt.principal_part + receipt.yield_part, receipt.requested);
                assert_eq!(receipt.payout + receipt.penalty, receipt.requested);
                assert!(receipt.requested <= before);
                let after = state.plan(plan_id).unwrap().available();
                assert_eq!(after, before - receipt.requested);
            }
            Err(_) => assert_eq!(state.plan(plan_id).unwrap().available(), before),
        }
    }

    // Penalties stay behind; everything else left the pool.
    let plan = state.plan(plan_id).unwrap();
    assert_eq!(
        tokens.balance_of(&POOL),
        plan.available() + state.pool.penalties_forfeited
    );
});
