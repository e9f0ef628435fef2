#![no_main]

use libfuzzer_sys::fuzz_target;

use autosave_execution::{create_plan, execute_deduction, DeductionOutcome, ExecutionContext, InMemoryTokenGateway, TokenGateway};
use autosave_types::plan::SECONDS_PER_DAY;
use autosave_types::{LedgerConfig, LedgerState, PlanDuration};

const ADMIN: [u8; 32] = [1; 32];
const POOL: [u8; 32] = [2; 32];
const SAVER: [u8; 32] = [10; 32];
const START: u64 = 1_700_000_000;

fuzz_target!(|offsets: Vec<u32>| {
    let mut state = LedgerState::new(ADMIN, POOL, LedgerConfig::default()).unwrap();
    let mut tokens = InMemoryTokenGateway::new();
    tokens.mint(&SAVER, u64::MAX / 2).unwrap();
    tokens.approve(&SAVER, &POOL, u64::MAX).unwrap();

    let daily = 5_000_000;
    let plan_id = {
        let mut ctx = ExecutionContext::new(&mut state, &mut tokens, START);
        create_plan(&mut ctx, &SAVER, daily, PlanDuration::ThirtyDays).unwrap()
    };

    // Calls arrive in time order at arbitrary gaps.
    let mut now = START;
    let mut executed = 0u64;
    for gap in offsets.into_iter().take(512) {
        now += (gap as u64) % (2 * SECONDS_PER_DAY);
        let mut ctx = ExecutionContext::new(&mut state, &mut tokens, now);
        if let Ok(DeductionOutcome::Executed { amount }) =
            execute_deduction(&mut ctx, plan_id)
        {
            assert_eq!(amount, daily);
            executed += 1;
        }
    }

    let plan = state.plan(plan_id).unwrap();
    assert!(plan.slots_consumed() <= 30);
    assert_eq!(plan.successful_deductions as u64, executed);
    assert_eq!(plan.accumulated_balance, executed * daily);
    assert!(plan.accumulated_balance <= plan.total_target);
    assert_eq!(tokens.balance_of(&POOL), plan.accumulated_balance);
});
