use super::*;
use autosave_types::config::LedgerConfig;
use autosave_types::event::MissReason;
use autosave_types::plan::{PlanDuration, SECONDS_PER_DAY, SECONDS_PER_HOUR};

const ADMIN: AccountId = [1u8; 32];
const POOL: AccountId = [2u8; 32];
const CUSTODY: AccountId = [3u8; 32];
const ALICE: AccountId = [10u8; 32];
const BOB: AccountId = [11u8; 32];
const KEEPER: AccountId = [12u8; 32];
const TREASURY: AccountId = [13u8; 32];

const DAY: u64 = SECONDS_PER_DAY;
const HOUR: u64 = SECONDS_PER_HOUR;
const T0: u64 = 1_700_000_000;

struct Harness {
    state: LedgerState,
    tokens: InMemoryTokenGateway,
    source: MockYieldSource,
    with_source: bool,
}

impl Harness {
    /// Small amounts, nothing is ever swept unless a test lowers the threshold.
    fn new() -> Self {
        let config = LedgerConfig {
            min_daily_deduction: 1,
            max_daily_deduction: 1_000_000_000,
            min_pool_threshold: u64::MAX,
            ..LedgerConfig::default()
        };
        let mut tokens = InMemoryTokenGateway::new();
        for user in [ALICE, BOB] {
            tokens.mint(&user, 1_000_000).unwrap();
        }
        tokens.approve(&ALICE, &POOL, u64::MAX).unwrap();

        Self {
            state: LedgerState::new(ADMIN, POOL, config).unwrap(),
            tokens,
            source: MockYieldSource::new("mock-lending", CUSTODY, 500),
            with_source: true,
        }
    }

    fn pooled() -> Self {
        let mut h = Self::new();
        h.state.config.min_pool_threshold = 1;
        h
    }

    fn at<T>(&mut self, now: u64, f: impl FnOnce(&mut ExecutionContext) -> T) -> T {
        let ctx = ExecutionContext::new(&mut self.state, &mut self.tokens, now);
        let mut ctx = if self.with_source {
            ctx.with_yield_source(&mut self.source)
        } else {
            ctx
        };
        f(&mut ctx)
    }

    fn exec(
        &mut self,
        now: u64,
        sender: &AccountId,
        instruction: LedgerInstruction,
    ) -> LedgerResult<InstructionOutcome> {
        self.at(now, |ctx| execute_instruction(ctx, sender, &instruction))
    }

    fn events_of<T>(&mut self, now: u64, f: impl FnOnce(&mut ExecutionContext) -> T) -> (T, Vec<LedgerEvent>) {
        self.at(now, |ctx| {
            let out = f(&mut *ctx);
            (out, ctx.take_events())
        })
    }

    fn create(&mut self, owner: &AccountId, daily: u64, duration: PlanDuration) -> u64 {
        self.at(T0, |ctx| create_plan(ctx, owner, daily, duration))
            .unwrap()
    }

    fn deduct(&mut self, now: u64, plan_id: u64) -> LedgerResult<DeductionOutcome> {
        self.at(now, |ctx| execute_deduction(ctx, plan_id))
    }

    fn plan(&self, plan_id: u64) -> &autosave_types::Plan {
        self.state.plan(plan_id).unwrap()
    }
}

// ═══════════════════════════════════════════════════════════════
// Plan ledger
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_total_target_for_every_duration() {
    let mut h = Harness::new();
    for (i, duration) in PlanDuration::ALL.into_iter().enumerate() {
        let id = h.create(&ALICE, 25, duration);
        assert_eq!(id, i as u64 + 1);
        let plan = h.plan(id);
        assert_eq!(plan.total_target, 25 * duration.days());
        assert_eq!(plan.end_date, T0 + duration.days() * DAY);
    }

    let owned: Vec<u64> = plans_of(&h.state, &ALICE).iter().map(|p| p.id).collect();
    assert_eq!(owned, vec![1, 2, 3, 4]);
    assert!(plans_of(&h.state, &BOB).is_empty());
    assert_eq!(h.state.pool.total_plans, 4);
}

#[test]
fn test_create_plan_rejects_out_of_range_amount() {
    let mut h = Harness::new();
    h.state.config.min_daily_deduction = 10;
    h.state.config.max_daily_deduction = 100;

    for amount in [9, 101] {
        let err = h
            .at(T0, |ctx| create_plan(ctx, &ALICE, amount, PlanDuration::ThirtyDays))
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InvalidDailyAmount {
                amount,
                min: 10,
                max: 100
            }
        );
    }
    assert!(h.state.plans.is_empty());
    assert_eq!(get_plan(&h.state, 0).unwrap_err(), LedgerError::InvalidPlanId(0));
}

#[test]
fn test_plan_created_event_carries_schedule() {
    let mut h = Harness::new();
    let (id, events) = h.events_of(T0, |ctx| {
        create_plan(ctx, &ALICE, 10, PlanDuration::NinetyDays)
    });
    assert_eq!(id.unwrap(), 1);
    assert_eq!(
        events,
        vec![LedgerEvent::PlanCreated {
            plan_id: 1,
            owner: ALICE,
            daily_amount: 10,
            duration: PlanDuration::NinetyDays,
            start_date: T0,
            end_date: T0 + 90 * DAY,
            total_target: 900,
        }]
    );
}

// ═══════════════════════════════════════════════════════════════
// Deduction scheduler
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_thirty_day_plan_runs_to_maturity() {
    let mut h = Harness::new();
    let id = h.create(&ALICE, 10, PlanDuration::ThirtyDays);

    for day in 0..30 {
        let outcome = h.deduct(T0 + day * DAY, id).unwrap();
        assert_eq!(outcome, DeductionOutcome::Executed { amount: 10 });
    }
    assert_eq!(h.plan(id).successful_deductions, 30);
    assert_eq!(h.plan(id).accumulated_balance, 300);
    assert_eq!(h.state.pool.total_principal, 300);

    let (outcome, events) = h.events_of(T0 + 30 * DAY, |ctx| execute_deduction(ctx, id));
    assert_eq!(outcome.unwrap(), DeductionOutcome::Matured);
    assert_eq!(
        events,
        vec![LedgerEvent::PlanCompleted {
            plan_id: id,
            timestamp: T0 + 30 * DAY
        }]
    );
    assert!(h.plan(id).is_completed && !h.plan(id).is_active);
    assert_eq!(h.plan(id).accumulated_balance, 300);

    // Completion happens once; later calls are rejected without events.
    for extra in 1..4 {
        let (outcome, events) = h.events_of(T0 + (30 + extra) * DAY, |ctx| execute_deduction(ctx, id));
        assert_eq!(outcome.unwrap_err(), LedgerError::PlanNotActive(id));
        assert!(events.is_empty());
        assert!(h.plan(id).is_completed);
    }

    let before = h.tokens.balance_of(&ALICE);
    let receipt = h.at(T0 + 30 * DAY, |ctx| withdraw(ctx, &ALICE, id, 0)).unwrap();
    assert_eq!(receipt.payout, 300);
    assert_eq!(receipt.penalty, 0);
    assert!(!receipt.is_early);
    assert_eq!(h.tokens.balance_of(&ALICE), before + 300);
    assert_eq!(h.plan(id).available(), 0);
}

#[test]
fn test_second_deduction_same_day_fails_without_state_change() {
    let mut h = Harness::new();
    let id = h.create(&ALICE, 10, PlanDuration::ThirtyDays);
    h.deduct(T0, id).unwrap();

    let snapshot = h.state.clone();
    let balance = h.tokens.balance_of(&ALICE);
    for offset in [0, 10, HOUR - 1, 2 * HOUR, 12 * HOUR, DAY - HOUR - 1] {
        assert!(h.deduct(T0 + offset, id).is_err(), "offset {}", offset);
        assert_eq!(h.state, snapshot);
        assert_eq!(h.tokens.balance_of(&ALICE), balance);
    }
}

#[test]
fn test_deduction_window_boundaries() {
    let mut h = Harness::new();
    let id = h.create(&ALICE, 10, PlanDuration::ThirtyDays);
    h.deduct(T0, id).unwrap();

    // More than an hour early is premature.
    let err = h.deduct(T0 + DAY - HOUR - 1, id).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidParameter(_)));

    // Exactly one hour early is inside the band.
    let early = T0 + DAY - HOUR;
    assert_eq!(h.deduct(early, id).unwrap(), DeductionOutcome::Executed { amount: 10 });

    // Within the hour after a run the duplicate guard fires first.
    assert_eq!(
        h.deduct(early + HOUR - 1, id).unwrap_err(),
        LedgerError::DeductionAlreadyExecuted(id)
    );
    assert!(matches!(
        h.deduct(early + HOUR, id).unwrap_err(),
        LedgerError::InvalidParameter(_)
    ));
    assert_eq!(h.plan(id).next_deduction_at(), T0 + 2 * DAY);
}

#[test]
fn test_missed_deduction_advances_cursor_only() {
    let mut h = Harness::new();
    let id = h.create(&BOB, 10, PlanDuration::ThirtyDays);

    let (outcome, events) = h.events_of(T0, |ctx| execute_deduction(ctx, id));
    assert_eq!(
        outcome.unwrap(),
        DeductionOutcome::Missed(MissReason::InsufficientAllowance)
    );
    assert_eq!(
        events,
        vec![LedgerEvent::DeductionMissed {
            plan_id: id,
            reason: MissReason::InsufficientAllowance,
            missed_deductions: 1,
            timestamp: T0,
        }]
    );
    let plan = h.plan(id);
    assert_eq!(plan.successful_deductions, 0);
    assert_eq!(plan.accumulated_balance, 0);
    assert_eq!(plan.missed_deductions, 1);
    assert_eq!(plan.next_deduction_at(), T0 + DAY);
    assert_eq!(h.tokens.balance_of(&BOB), 1_000_000);

    h.tokens.approve(&BOB, &POOL, 1_000).unwrap();
    assert_eq!(
        h.deduct(T0 + DAY, id).unwrap(),
        DeductionOutcome::Executed { amount: 10 }
    );
    assert_eq!(h.plan(id).next_deduction_at(), T0 + 2 * DAY);
}

#[test]
fn test_missed_for_insufficient_balance() {
    let mut h = Harness::new();
    let poor = [42u8; 32];
    h.tokens.mint(&poor, 5).unwrap();
    h.tokens.approve(&poor, &POOL, u64::MAX).unwrap();
    let id = h.create(&poor, 10, PlanDuration::ThirtyDays);

    assert_eq!(
        h.deduct(T0, id).unwrap(),
        DeductionOutcome::Missed(MissReason::InsufficientBalance)
    );
    assert_eq!(h.tokens.balance_of(&poor), 5);
}

#[test]
fn test_elapsed_slots_are_missed_not_charged() {
    let mut h = Harness::new();
    let id = h.create(&ALICE, 10, PlanDuration::ThirtyDays);

    // Keeper was down for three days.
    assert_eq!(
        h.deduct(T0 + 3 * DAY, id).unwrap(),
        DeductionOutcome::Executed { amount: 10 }
    );
    let plan = h.plan(id);
    assert_eq!(plan.successful_deductions, 1);
    assert_eq!(plan.missed_deductions, 3);
    assert_eq!(plan.accumulated_balance, 10);
    assert_eq!(plan.next_deduction_at(), T0 + 4 * DAY);

    // A run that lands late in its window does not block the next slot.
    assert!(h.deduct(T0 + 4 * DAY + 22 * HOUR, id).is_ok());
    assert!(h.deduct(T0 + 5 * DAY, id).is_ok());
    assert_eq!(h.plan(id).successful_deductions, 3);
}

#[test]
fn test_no_slot_beyond_the_last_day() {
    let mut h = Harness::new();
    let idle = h.create(&ALICE, 10, PlanDuration::ThirtyDays);
    let busy = h.create(&ALICE, 10, PlanDuration::ThirtyDays);
    for day in 0..30 {
        h.deduct(T0 + day * DAY, busy).unwrap();
    }

    // Just inside the band of the instant that equals the end date.
    let late = T0 + 30 * DAY - HOUR / 2;
    assert_eq!(
        h.deduct(late, idle).unwrap(),
        DeductionOutcome::Missed(MissReason::SlotElapsed)
    );
    assert_eq!(h.plan(idle).missed_deductions, 30);
    assert_eq!(h.plan(idle).accumulated_balance, 0);
    assert!(matches!(h.deduct(late, busy).unwrap_err(), LedgerError::InvalidParameter(_)));
    assert_eq!(h.plan(busy).accumulated_balance, 300);

    assert!(matches!(
        h.deduct(late + HOUR / 4, idle).unwrap_err(),
        LedgerError::InvalidParameter(_)
    ));
    assert_eq!(h.deduct(T0 + 30 * DAY, idle).unwrap(), DeductionOutcome::Matured);
}

#[test]
fn test_batch_isolates_bad_entries() {
    let mut h = Harness::new();
    let alice_plan = h.create(&ALICE, 10, PlanDuration::ThirtyDays);
    let bob_plan = h.create(&BOB, 10, PlanDuration::ThirtyDays);

    let report = h
        .at(T0, |ctx| {
            execute_deductions_batch(ctx, &[alice_plan, bob_plan, 99, alice_plan])
        })
        .unwrap();
    assert_eq!(report.executed, vec![alice_plan]);
    assert_eq!(report.missed, vec![bob_plan]);
    assert_eq!(
        report.skipped,
        vec![
            (99, LedgerError::InvalidPlanId(99)),
            (alice_plan, LedgerError::DeductionAlreadyExecuted(alice_plan)),
        ]
    );
    assert_eq!(report.collected, 10);
    assert_eq!(report.swept, 0);
    assert_eq!(h.plan(alice_plan).accumulated_balance, 10);
}

#[test]
fn test_batch_sweeps_collected_funds_once() {
    let mut h = Harness::pooled();
    let a = h.create(&ALICE, 10, PlanDuration::ThirtyDays);
    let b = h.create(&ALICE, 15, PlanDuration::NinetyDays);

    let (report, events) = h.events_of(T0, |ctx| execute_deductions_batch(ctx, &[a, b]));
    let report = report.unwrap();
    assert_eq!(report.collected, 25);
    assert_eq!(report.swept, 25);
    let deposits = events
        .iter()
        .filter(|e| matches!(e, LedgerEvent::YieldDeposited { .. }))
        .count();
    assert_eq!(deposits, 1);
    assert_eq!(h.source.balance(), 25);
    assert_eq!(h.state.pool.total_yield_shares, 25);
    assert_eq!(h.tokens.balance_of(&POOL), 0);
}

#[test]
fn test_sweep_waits_for_threshold() {
    let mut h = Harness::new();
    h.state.config.min_pool_threshold = 30;
    let id = h.create(&ALICE, 10, PlanDuration::ThirtyDays);

    h.deduct(T0, id).unwrap();
    h.deduct(T0 + DAY, id).unwrap();
    assert_eq!(h.source.balance(), 0);
    h.deduct(T0 + 2 * DAY, id).unwrap();
    assert_eq!(h.source.balance(), 30);
    assert_eq!(h.tokens.balance_of(&POOL), 0);
}

// ═══════════════════════════════════════════════════════════════
// Withdrawals
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_early_withdrawal_scenario() {
    let mut h = Harness::new();
    let id = h.create(&ALICE, 10, PlanDuration::ThirtyDays);
    for day in 0..15 {
        h.deduct(T0 + day * DAY, id).unwrap();
    }
    assert_eq!(h.plan(id).accumulated_balance, 150);

    let before = h.tokens.balance_of(&ALICE);
    let outcome = h
        .exec(T0 + 15 * DAY, &ALICE, LedgerInstruction::Withdraw { plan_id: id, amount: 0 })
        .unwrap();
    let InstructionOutcome::Withdrawal(receipt) = outcome else {
        panic!("expected a withdrawal receipt");
    };
    assert!(receipt.is_early);
    assert_eq!(receipt.payout, 135);
    assert_eq!(receipt.penalty, 15);
    assert_eq!(h.tokens.balance_of(&ALICE), before + 135);

    // The penalty is only tracked by its counter and stays on hand.
    assert_eq!(h.state.pool.penalties_forfeited, 15);
    assert_eq!(h.tokens.balance_of(&POOL), 15);
    assert!(h.plan(id).is_completed);
}

#[test]
fn test_early_payout_matches_bps_formula() {
    let mut h = Harness::new();
    h.state.config.early_withdrawal_penalty_bps = 1_000;
    let id = h.create(&ALICE, 77, PlanDuration::ThirtyDays);
    h.deduct(T0, id).unwrap();

    let receipt = h.at(T0 + DAY / 2, |ctx| withdraw(ctx, &ALICE, id, 77)).unwrap();
    assert_eq!(receipt.payout, 77 * 9_000 / 10_000);
    assert_eq!(receipt.payout + receipt.penalty, 77);
}

#[test]
fn test_partial_withdrawal_is_pro_rata() {
    let mut h = Harness::new();
    let id = h.create(&ALICE, 100, PlanDuration::ThirtyDays);
    for day in 0..3 {
        h.deduct(T0 + day * DAY, id).unwrap();
    }
    // 300 principal, 100 credited yield backed by on-hand funds.
    h.state.plan_mut(id).unwrap().yield_earned = 100;
    h.tokens.mint(&POOL, 100).unwrap();

    let receipt = h.at(T0 + 30 * DAY, |ctx| withdraw(ctx, &ALICE, id, 100)).unwrap();
    assert_eq!(receipt.principal_part, 75);
    assert_eq!(receipt.yield_part, 25);
    assert_eq!(receipt.payout, 100);

    let receipt = h.at(T0 + 30 * DAY, |ctx| withdraw(ctx, &ALICE, id, 33)).unwrap();
    assert_eq!(receipt.principal_part + receipt.yield_part, 33);
    let plan = h.plan(id);
    assert_eq!(plan.accumulated_balance, 225 - receipt.principal_part);
    assert_eq!(plan.yield_earned, 75 - receipt.yield_part);
    assert!(plan.yield_earned > 0 && plan.accumulated_balance > 0);
}

#[test]
fn test_withdraw_validation() {
    let mut h = Harness::new();
    let id = h.create(&ALICE, 10, PlanDuration::ThirtyDays);

    assert_eq!(
        h.at(T0, |ctx| withdraw(ctx, &ALICE, id, 0)).unwrap_err(),
        LedgerError::InvalidWithdrawalAmount {
            requested: 0,
            available: 0
        }
    );
    h.deduct(T0, id).unwrap();
    assert_eq!(
        h.at(T0, |ctx| withdraw(ctx, &BOB, id, 5)).unwrap_err(),
        LedgerError::NotPlanOwner(id)
    );
    assert_eq!(
        h.at(T0, |ctx| withdraw(ctx, &ALICE, id, 11)).unwrap_err(),
        LedgerError::InvalidWithdrawalAmount {
            requested: 11,
            available: 10
        }
    );

    h.at(T0 + 31 * DAY, |ctx| withdraw(ctx, &ALICE, id, 0)).unwrap();
    assert_eq!(
        h.at(T0 + 31 * DAY, |ctx| withdraw(ctx, &ALICE, id, 0)).unwrap_err(),
        LedgerError::PlanNotActive(id)
    );
}

#[test]
fn test_withdraw_pulls_shortfall_from_source() {
    let mut h = Harness::pooled();
    let id = h.create(&ALICE, 50, PlanDuration::ThirtyDays);
    h.deduct(T0, id).unwrap();
    assert_eq!(h.tokens.balance_of(&POOL), 0);

    let receipt = h.at(T0 + 30 * DAY, |ctx| withdraw(ctx, &ALICE, id, 0)).unwrap();
    assert_eq!(receipt.payout, 50);
    assert_eq!(h.source.balance(), 0);
    assert_eq!(h.state.pool.total_yield_shares, 0);
}

// ═══════════════════════════════════════════════════════════════
// Yield pool
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_yield_is_zero_without_pool_totals() {
    let mut h = Harness::new();
    let id = h.create(&ALICE, 10, PlanDuration::ThirtyDays);
    assert_eq!(h.at(T0, |ctx| accumulated_yield_of(ctx, id)).unwrap(), 0);

    // Principal but no shares.
    h.deduct(T0, id).unwrap();
    h.source.credit_yield(&mut h.tokens, 1_000).unwrap();
    assert_eq!(h.at(T0 + 10 * DAY, |ctx| accumulated_yield_of(ctx, id)).unwrap(), 0);
    assert_eq!(h.at(T0 + 10 * DAY, |ctx| claim_yield(ctx, &ALICE, id)).unwrap(), 0);
}

#[test]
fn test_yield_ramps_with_time_and_user_share() {
    let mut h = Harness::pooled();
    let id = h.create(&ALICE, 1_000, PlanDuration::ThirtyDays);
    h.deduct(T0, id).unwrap();
    assert_eq!(h.source.balance(), 1_000);
    h.source.credit_yield(&mut h.tokens, 100).unwrap();

    assert_eq!(h.at(T0, |ctx| accumulated_yield_of(ctx, id)).unwrap(), 0);
    // Half way: 100 gain * 1/2 * 90%.
    assert_eq!(h.at(T0 + 15 * DAY, |ctx| accumulated_yield_of(ctx, id)).unwrap(), 45);
    // Clamped after maturity.
    assert_eq!(h.at(T0 + 90 * DAY, |ctx| accumulated_yield_of(ctx, id)).unwrap(), 90);
    // The read path never writes.
    assert_eq!(h.plan(id).yield_earned, 0);
}

#[test]
fn test_claim_yield_pays_and_nets_out_credit() {
    let mut h = Harness::pooled();
    let id = h.create(&ALICE, 1_000, PlanDuration::ThirtyDays);
    h.deduct(T0, id).unwrap();
    h.source.credit_yield(&mut h.tokens, 100).unwrap();

    let before = h.tokens.balance_of(&ALICE);
    let outcome = h
        .exec(T0 + 15 * DAY, &ALICE, LedgerInstruction::ClaimYield { plan_id: id })
        .unwrap();
    assert_eq!(outcome, InstructionOutcome::YieldClaimed(45));
    assert_eq!(h.tokens.balance_of(&ALICE), before + 45);
    assert_eq!(h.plan(id).yield_credited, 45);
    assert_eq!(h.plan(id).yield_earned, 0);
    assert_eq!(h.state.pool.total_user_yield, 45);

    // Nothing new has accrued.
    assert_eq!(h.at(T0 + 15 * DAY, |ctx| claim_yield(ctx, &ALICE, id)).unwrap(), 0);
    assert_eq!(
        h.at(T0 + 15 * DAY, |ctx| claim_yield(ctx, &BOB, id)).unwrap_err(),
        LedgerError::NotPlanOwner(id)
    );
}

#[test]
fn test_distribute_credits_plan() {
    let mut h = Harness::pooled();
    let id = h.create(&ALICE, 1_000, PlanDuration::ThirtyDays);
    h.deduct(T0, id).unwrap();
    h.source.credit_yield(&mut h.tokens, 300).unwrap();

    let (credited, events) = h.events_of(T0 + 30 * DAY, |ctx| distribute_yield_to(ctx, id));
    assert_eq!(credited.unwrap(), 270);
    assert_eq!(
        events,
        vec![LedgerEvent::YieldDistributed {
            plan_id: id,
            amount: 270,
            yield_earned: 270,
        }]
    );
    assert_eq!(h.at(T0 + 30 * DAY, |ctx| distribute_yield_to(ctx, id)).unwrap(), 0);
    assert_eq!(h.plan(id).available(), 1_270);
}

#[test]
fn test_harvest_splits_and_rate_limits() {
    let mut h = Harness::pooled();
    let id = h.create(&ALICE, 1_000, PlanDuration::ThirtyDays);
    h.deduct(T0, id).unwrap();
    h.source.credit_yield(&mut h.tokens, 200).unwrap();

    assert_eq!(
        h.at(T0, |ctx| harvest_yield(ctx, &KEEPER)).unwrap_err(),
        LedgerError::Unauthorized
    );
    h.at(T0, |ctx| admin::set_keeper(ctx, &ADMIN, KEEPER, true)).unwrap();

    let report = h.at(T0 + HOUR, |ctx| harvest_yield(ctx, &KEEPER)).unwrap();
    assert_eq!(
        report,
        HarvestReport {
            total_yield: 200,
            user_yield: 180,
            protocol_yield: 20
        }
    );
    assert_eq!(h.state.pool.total_protocol_yield, 20);
    assert_eq!(h.state.pool.harvested_user_yield, 180);
    assert_eq!(h.tokens.balance_of(&POOL), 200);
    assert_eq!(h.source.balance(), 1_000);

    assert_eq!(
        h.at(T0 + 2 * HOUR, |ctx| harvest_yield(ctx, &ADMIN)).unwrap_err(),
        LedgerError::HarvestTooSoon {
            next_allowed: T0 + HOUR + DAY
        }
    );

    // Harvesting moves the gain on hand without changing the entitlement.
    assert_eq!(h.at(T0 + 30 * DAY, |ctx| accumulated_yield_of(ctx, id)).unwrap(), 180);

    assert_eq!(
        h.at(T0 + 2 * HOUR, |ctx| admin::withdraw_protocol_fees(ctx, &ADMIN, TREASURY, 0))
            .unwrap(),
        20
    );
    assert_eq!(h.tokens.balance_of(&TREASURY), 20);
    assert_eq!(
        h.at(T0 + 2 * HOUR, |ctx| admin::withdraw_protocol_fees(ctx, &ADMIN, TREASURY, 1))
            .unwrap_err(),
        LedgerError::InsufficientProtocolYield {
            requested: 1,
            available: 0
        }
    );
}

#[test]
fn test_harvest_requires_source() {
    let mut h = Harness::new();
    h.with_source = false;
    assert_eq!(
        h.at(T0, |ctx| harvest_yield(ctx, &ADMIN)).unwrap_err(),
        LedgerError::YieldSourceNotSet
    );
}

#[test]
fn test_harvest_without_gain_is_noop() {
    let mut h = Harness::pooled();
    let id = h.create(&ALICE, 1_000, PlanDuration::ThirtyDays);
    h.deduct(T0, id).unwrap();

    let report = h.at(T0, |ctx| harvest_yield(ctx, &ADMIN)).unwrap();
    assert_eq!(report, HarvestReport::default());
    assert_eq!(h.state.pool.last_harvest, None);
}

#[test]
fn test_repeated_claims_add_up_to_one_claim() {
    let setup = || {
        let mut h = Harness::pooled();
        let id = h.create(&ALICE, 1_000, PlanDuration::ThirtyDays);
        h.deduct(T0, id).unwrap();
        h.source.credit_yield(&mut h.tokens, 100).unwrap();
        (h, id)
    };

    let (mut h, id) = setup();
    let first = h
        .exec(T0 + 15 * DAY, &ALICE, LedgerInstruction::ClaimYield { plan_id: id })
        .unwrap();
    assert_eq!(first, InstructionOutcome::YieldClaimed(45));
    assert_eq!(h.source.balance(), 1_055);
    // Paying the first claim out of the source must not shrink the second.
    let second = h
        .exec(T0 + 30 * DAY, &ALICE, LedgerInstruction::ClaimYield { plan_id: id })
        .unwrap();
    assert_eq!(second, InstructionOutcome::YieldClaimed(45));
    assert_eq!(h.plan(id).yield_credited, 90);
    assert_eq!(h.at(T0 + 60 * DAY, |ctx| accumulated_yield_of(ctx, id)).unwrap(), 0);

    let (mut once, id) = setup();
    let outcome = once
        .exec(T0 + 30 * DAY, &ALICE, LedgerInstruction::ClaimYield { plan_id: id })
        .unwrap();
    assert_eq!(outcome, InstructionOutcome::YieldClaimed(90));
    assert_eq!(h.tokens.balance_of(&ALICE), once.tokens.balance_of(&ALICE));
}

#[test]
fn test_harvested_gain_is_not_harvested_again_after_sweep() {
    let mut h = Harness::pooled();
    let id = h.create(&ALICE, 1_000, PlanDuration::ThirtyDays);
    h.deduct(T0, id).unwrap();
    h.source.credit_yield(&mut h.tokens, 200).unwrap();

    let report = h.at(T0 + HOUR, |ctx| harvest_yield(ctx, &ADMIN)).unwrap();
    assert_eq!(report.total_yield, 200);
    assert_eq!(h.tokens.balance_of(&POOL), 200);

    // The next deduction sweeps the harvested funds back with the new principal.
    h.deduct(T0 + DAY, id).unwrap();
    assert_eq!(h.tokens.balance_of(&POOL), 0);
    assert_eq!(h.source.balance(), 2_200);

    let report = h.at(T0 + 2 * DAY, |ctx| harvest_yield(ctx, &ADMIN)).unwrap();
    assert_eq!(report, HarvestReport::default());
    assert_eq!(h.state.pool.total_harvested, 200);
    assert_eq!(h.state.pool.total_protocol_yield, 20);

    // Only fresh gain is split.
    h.source.credit_yield(&mut h.tokens, 50).unwrap();
    let report = h.at(T0 + 3 * DAY, |ctx| harvest_yield(ctx, &ADMIN)).unwrap();
    assert_eq!(
        report,
        HarvestReport {
            total_yield: 50,
            user_yield: 45,
            protocol_yield: 5
        }
    );
    assert_eq!(h.state.pool.total_protocol_yield, 25);

    // Claiming after the harvests pays the full share of both gains.
    let outcome = h
        .exec(T0 + 30 * DAY, &ALICE, LedgerInstruction::ClaimYield { plan_id: id })
        .unwrap();
    assert_eq!(outcome, InstructionOutcome::YieldClaimed(225));
    let accounting = h.at(T0 + 30 * DAY, |ctx| accounting_report(ctx));
    assert_eq!(accounting.assets(), Some(2_025));
    assert_eq!(accounting.liabilities, 2_025);
}

#[test]
fn test_claim_after_harvest_keeps_entitlement() {
    let mut h = Harness::pooled();
    h.tokens.approve(&BOB, &POOL, u64::MAX).unwrap();
    let alice = h.create(&ALICE, 1_000, PlanDuration::ThirtyDays);
    let bob = h.create(&BOB, 1_000, PlanDuration::ThirtyDays);
    h.deduct(T0, alice).unwrap();
    h.deduct(T0, bob).unwrap();
    h.source.credit_yield(&mut h.tokens, 400).unwrap();

    let claimed = h.at(T0 + 15 * DAY, |ctx| claim_yield(ctx, &ALICE, alice)).unwrap();
    // 400 gain * 1/2 of principal * 1/2 of the term * 90%.
    assert_eq!(claimed, 90);

    h.at(T0 + 15 * DAY, |ctx| harvest_yield(ctx, &ADMIN)).unwrap();
    assert_eq!(h.state.pool.total_harvested, 400);

    assert_eq!(h.at(T0 + 30 * DAY, |ctx| claim_yield(ctx, &ALICE, alice)).unwrap(), 90);
    assert_eq!(h.at(T0 + 30 * DAY, |ctx| claim_yield(ctx, &BOB, bob)).unwrap(), 180);
    // A second harvest finds nothing new to split.
    let report = h.at(T0 + 30 * DAY, |ctx| harvest_yield(ctx, &ADMIN)).unwrap();
    assert_eq!(report, HarvestReport::default());
    let accounting = h.at(T0 + 30 * DAY, |ctx| accounting_report(ctx));
    assert_eq!(accounting.is_solvent(0), Some(true));
}

#[test]
fn test_late_plan_cannot_take_gain_already_paid() {
    let mut h = Harness::pooled();
    h.tokens.approve(&BOB, &POOL, u64::MAX).unwrap();
    let alice = h.create(&ALICE, 1_000, PlanDuration::ThirtyDays);
    h.deduct(T0, alice).unwrap();
    h.source.credit_yield(&mut h.tokens, 100).unwrap();
    assert_eq!(h.at(T0 + 30 * DAY, |ctx| claim_yield(ctx, &ALICE, alice)).unwrap(), 90);

    let later = T0 + 30 * DAY;
    let bob = h
        .at(later, |ctx| create_plan(ctx, &BOB, 9_000, PlanDuration::ThirtyDays))
        .unwrap();
    h.deduct(later, bob).unwrap();
    h.source.credit_yield(&mut h.tokens, 100).unwrap();

    // 90% of its principal share would be 162, but only 90 of the 180 user
    // side is still unclaimed.
    assert_eq!(h.at(later + 30 * DAY, |ctx| claim_yield(ctx, &BOB, bob)).unwrap(), 90);
    assert_eq!(h.at(later + 30 * DAY, |ctx| claim_yield(ctx, &ALICE, alice)).unwrap(), 0);
    assert_eq!(h.state.pool.total_user_yield, 180);
    let accounting = h.at(later + 30 * DAY, |ctx| accounting_report(ctx));
    assert_eq!(accounting.is_solvent(0), Some(true));
}

// ═══════════════════════════════════════════════════════════════
// Yield source failures
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_failed_deposit_keeps_funds_on_hand() {
    let mut h = Harness::pooled();
    h.source.fail_deposits = true;
    let id = h.create(&ALICE, 10, PlanDuration::ThirtyDays);

    assert_eq!(h.deduct(T0, id).unwrap(), DeductionOutcome::Executed { amount: 10 });
    assert_eq!(h.tokens.balance_of(&POOL), 10);
    assert_eq!(h.state.pool.total_yield_shares, 0);

    h.source.fail_deposits = false;
    h.source.healthy = false;
    h.deduct(T0 + DAY, id).unwrap();
    assert_eq!(h.tokens.balance_of(&POOL), 20);
}

#[test]
fn test_withdraw_falls_back_to_emergency_exit() {
    let mut h = Harness::pooled();
    let id = h.create(&ALICE, 500, PlanDuration::ThirtyDays);
    h.deduct(T0, id).unwrap();
    h.source.fail_withdrawals = true;

    let (received, events) = h.events_of(T0, |ctx| withdraw_from_yield(ctx, 100));
    assert_eq!(received, 500);
    assert_eq!(
        events,
        vec![LedgerEvent::YieldWithdrawn {
            requested: 100,
            received: 500,
            shares_burned: 500,
            emergency_exit: true,
        }]
    );
    assert_eq!(h.state.pool.total_yield_shares, 0);
    assert_eq!(h.tokens.balance_of(&POOL), 500);
}

#[test]
fn test_stuck_funds_surface_as_liquidity_error() {
    let mut h = Harness::pooled();
    let id = h.create(&ALICE, 500, PlanDuration::ThirtyDays);
    h.deduct(T0, id).unwrap();
    h.source.fail_withdrawals = true;
    h.source.fail_emergency = true;

    assert_eq!(h.at(T0, |ctx| withdraw_from_yield(ctx, 100)), 0);
    assert_eq!(h.state.pool.total_yield_shares, 500);
    assert_eq!(
        h.at(T0 + 30 * DAY, |ctx| withdraw(ctx, &ALICE, id, 0)).unwrap_err(),
        LedgerError::InsufficientLiquidity {
            needed: 500,
            available: 0
        }
    );
}

#[test]
fn test_unreadable_source_uses_safe_defaults() {
    let mut h = Harness::pooled();
    let id = h.create(&ALICE, 500, PlanDuration::ThirtyDays);
    h.deduct(T0, id).unwrap();
    h.source.fail_reads = true;

    assert_eq!(h.at(T0 + DAY, |ctx| accumulated_yield_of(ctx, id)).unwrap(), 0);
    let report = h.at(T0 + DAY, |ctx| accounting_report(ctx));
    assert_eq!(report.source_balance, None);
    assert!(h.at(T0 + DAY, |ctx| enforce_accounting(ctx)).is_ok());
    assert!(!h.state.paused);
}

// ═══════════════════════════════════════════════════════════════
// Emergency withdrawals
// ═══════════════════════════════════════════════════════════════

fn paused_with_plan() -> (Harness, u64) {
    let mut h = Harness::new();
    let id = h.create(&ALICE, 10, PlanDuration::ThirtyDays);
    for day in 0..5 {
        h.deduct(T0 + day * DAY, id).unwrap();
    }
    h.at(T0 + 5 * DAY, |ctx| admin::pause(ctx, &ADMIN)).unwrap();
    (h, id)
}

#[test]
fn test_emergency_requires_pause_and_admin() {
    let mut h = Harness::new();
    let id = h.create(&ALICE, 10, PlanDuration::ThirtyDays);
    h.deduct(T0, id).unwrap();

    assert_eq!(
        h.at(T0, |ctx| schedule_emergency_withdrawal(ctx, &ADMIN, ALICE, id, 0, "incident"))
            .unwrap_err(),
        LedgerError::SystemNotPaused
    );
    h.at(T0, |ctx| admin::pause(ctx, &ADMIN)).unwrap();
    assert_eq!(
        h.at(T0, |ctx| schedule_emergency_withdrawal(ctx, &BOB, ALICE, id, 0, "incident"))
            .unwrap_err(),
        LedgerError::Unauthorized
    );
    assert_eq!(
        h.at(T0, |ctx| schedule_emergency_withdrawal(ctx, &ADMIN, BOB, id, 0, "incident"))
            .unwrap_err(),
        LedgerError::NotPlanOwner(id)
    );

    // The normal paths are closed while paused.
    assert_eq!(h.deduct(T0 + DAY, id).unwrap_err(), LedgerError::SystemPaused);
    assert_eq!(
        h.at(T0, |ctx| withdraw(ctx, &ALICE, id, 0)).unwrap_err(),
        LedgerError::SystemPaused
    );
}

#[test]
fn test_emergency_lifecycle_pays_only_owner() {
    let (mut h, id) = paused_with_plan();
    let now = T0 + 5 * DAY;
    let delay = h.state.config.emergency_delay_secs;

    let request = h
        .at(now, |ctx| schedule_emergency_withdrawal(ctx, &ADMIN, ALICE, id, 0, "venue exploit"))
        .unwrap();
    assert_eq!(
        h.at(now, |ctx| schedule_emergency_withdrawal(ctx, &ADMIN, ALICE, id, 0, "venue exploit"))
            .unwrap_err(),
        LedgerError::EmergencyAlreadyScheduled
    );

    assert_eq!(
        h.at(now + delay - 1, |ctx| execute_emergency_withdrawal(ctx, &ADMIN, &request))
            .unwrap_err(),
        LedgerError::EmergencyWithdrawalNotReady {
            execution_time: now + delay
        }
    );

    let alice_before = h.tokens.balance_of(&ALICE);
    let admin_before = h.tokens.balance_of(&ADMIN);
    let paid = h
        .at(now + delay, |ctx| execute_emergency_withdrawal(ctx, &ADMIN, &request))
        .unwrap();
    assert_eq!(paid, 50);
    assert_eq!(h.tokens.balance_of(&ALICE), alice_before + 50);
    assert_eq!(h.tokens.balance_of(&ADMIN), admin_before);
    assert!(h.plan(id).is_completed);
    assert_eq!(h.plan(id).available(), 0);

    assert_eq!(
        h.at(now + delay + 1, |ctx| execute_emergency_withdrawal(ctx, &ADMIN, &request))
            .unwrap_err(),
        LedgerError::EmergencyAlreadyExecuted
    );
    assert_eq!(
        h.at(now + delay + 1, |ctx| cancel_emergency_withdrawal(ctx, &ADMIN, &request))
            .unwrap_err(),
        LedgerError::EmergencyAlreadyExecuted
    );
}

#[test]
fn test_cancelled_emergency_never_executes() {
    let (mut h, id) = paused_with_plan();
    let now = T0 + 5 * DAY;
    let delay = h.state.config.emergency_delay_secs;

    let request = h
        .at(now, |ctx| schedule_emergency_withdrawal(ctx, &ADMIN, ALICE, id, 20, "mistake"))
        .unwrap();
    let (cancelled, events) = h.events_of(now + 1, |ctx| {
        cancel_emergency_withdrawal(ctx, &ADMIN, &request)
    });
    cancelled.unwrap();
    assert_eq!(
        events,
        vec![LedgerEvent::EmergencyCancelled {
            id: request,
            plan_id: id
        }]
    );

    assert_eq!(
        h.at(now + delay, |ctx| execute_emergency_withdrawal(ctx, &ADMIN, &request))
            .unwrap_err(),
        LedgerError::EmergencyCancelled
    );
    assert_eq!(h.plan(id).accumulated_balance, 50);
    assert_eq!(
        h.at(now, |ctx| execute_emergency_withdrawal(ctx, &ADMIN, &[0u8; 32])).unwrap_err(),
        LedgerError::EmergencyNotFound
    );
}

#[test]
fn test_emergency_amount_is_clamped_and_debits_principal_first() {
    let (mut h, id) = paused_with_plan();
    let now = T0 + 5 * DAY;
    let delay = h.state.config.emergency_delay_secs;
    h.state.plan_mut(id).unwrap().yield_earned = 10;
    h.tokens.mint(&POOL, 10).unwrap();

    let request = h
        .at(now, |ctx| schedule_emergency_withdrawal(ctx, &ADMIN, ALICE, id, 55, "partial"))
        .unwrap();
    let (paid, events) = h.events_of(now + delay, |ctx| {
        execute_emergency_withdrawal(ctx, &ADMIN, &request)
    });
    assert_eq!(paid.unwrap(), 55);
    assert!(events.contains(&LedgerEvent::EmergencyExecuted {
        id: request,
        user: ALICE,
        plan_id: id,
        principal_part: 50,
        yield_part: 5,
        payout: 55,
    }));
    assert_eq!(h.plan(id).yield_earned, 5);
}

// ═══════════════════════════════════════════════════════════════
// Admin & accounting
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_admin_setters_are_guarded() {
    let mut h = Harness::new();
    assert_eq!(
        h.exec(T0, &BOB, LedgerInstruction::SetEarlyWithdrawalPenalty { bps: 100 })
            .unwrap_err(),
        LedgerError::Unauthorized
    );
    assert!(matches!(
        h.exec(T0, &ADMIN, LedgerInstruction::SetEarlyWithdrawalPenalty { bps: 5_001 }),
        Err(LedgerError::InvalidParameter(_))
    ));
    assert!(matches!(
        h.exec(T0, &ADMIN, LedgerInstruction::SetDeductionLimits { min: 10, max: 5 }),
        Err(LedgerError::InvalidParameter(_))
    ));
    assert!(matches!(
        h.exec(T0, &ADMIN, LedgerInstruction::SetEmergencyDelay { secs: 60 }),
        Err(LedgerError::InvalidParameter(_))
    ));
    assert!(matches!(
        h.exec(T0, &ADMIN, LedgerInstruction::SetUserYieldShare { bps: 10_001 }),
        Err(LedgerError::InvalidParameter(_))
    ));

    let (result, events) = h.events_of(T0, |ctx| {
        admin::set_early_withdrawal_penalty(ctx, &ADMIN, 2_500)
    });
    result.unwrap();
    assert_eq!(
        events,
        vec![LedgerEvent::ParameterUpdated {
            parameter: "early_withdrawal_penalty_bps".to_string(),
            old_value: 1_000,
            new_value: 2_500,
        }]
    );
    assert_eq!(h.state.config.early_withdrawal_penalty_bps, 2_500);
}

#[test]
fn test_pause_and_admin_handover() {
    let mut h = Harness::new();
    h.exec(T0, &ADMIN, LedgerInstruction::Pause).unwrap();
    assert_eq!(
        h.exec(T0, &ADMIN, LedgerInstruction::Pause).unwrap_err(),
        LedgerError::AlreadyPaused
    );
    h.exec(T0, &ADMIN, LedgerInstruction::Unpause).unwrap();
    assert_eq!(
        h.exec(T0, &ADMIN, LedgerInstruction::Unpause).unwrap_err(),
        LedgerError::SystemNotPaused
    );

    h.exec(T0, &ADMIN, LedgerInstruction::ProposeAdmin { proposed: BOB })
        .unwrap();
    assert_eq!(
        h.exec(T0, &ALICE, LedgerInstruction::AcceptAdmin).unwrap_err(),
        LedgerError::Unauthorized
    );
    h.exec(T0, &BOB, LedgerInstruction::AcceptAdmin).unwrap();
    assert_eq!(h.state.admin, BOB);
    assert_eq!(h.state.pending_admin, None);
    assert_eq!(
        h.exec(T0, &ADMIN, LedgerInstruction::Pause).unwrap_err(),
        LedgerError::Unauthorized
    );
}

#[test]
fn test_replacing_yield_source_recovers_position() {
    let mut h = Harness::pooled();
    let id = h.create(&ALICE, 400, PlanDuration::ThirtyDays);
    h.deduct(T0, id).unwrap();
    h.source.credit_yield(&mut h.tokens, 40).unwrap();

    let mut sick = MockYieldSource::new("sick", [30u8; 32], 0);
    sick.healthy = false;
    assert_eq!(
        h.at(T0, |ctx| admin::set_yield_source(ctx, &ADMIN, &mut sick)).unwrap_err(),
        LedgerError::YieldSourceUnhealthy
    );

    let mut next = MockYieldSource::new("next", [31u8; 32], 300);
    let recovered = h
        .at(T0, |ctx| admin::set_yield_source(ctx, &ADMIN, &mut next))
        .unwrap();
    assert_eq!(recovered, 440);
    assert_eq!(h.state.pool.total_yield_shares, 0);
    assert_eq!(h.tokens.balance_of(&POOL), 440);

    h.source = next;
    h.deduct(T0 + DAY, id).unwrap();
    assert_eq!(h.source.balance(), 840);
}

#[test]
fn test_accounting_mismatch_halts_ledger() {
    let mut h = Harness::pooled();
    let id = h.create(&ALICE, 1_000, PlanDuration::ThirtyDays);
    h.exec(T0, &KEEPER, LedgerInstruction::ExecuteDeduction { plan_id: id })
        .unwrap();
    h.source.slash(&mut h.tokens, 500).unwrap();

    let err = h
        .exec(T0 + HOUR, &ALICE, LedgerInstruction::CreatePlan {
            daily_amount: 10,
            duration: PlanDuration::ThirtyDays,
        })
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::AccountingMismatch {
            assets: 500,
            liabilities: 1_000
        }
    );
    assert!(h.state.paused);
    assert_eq!(
        h.exec(T0 + DAY, &KEEPER, LedgerInstruction::ExecuteDeduction { plan_id: id })
            .unwrap_err(),
        LedgerError::SystemPaused
    );
}

#[test]
fn test_emergency_exit_runs_while_under_water() {
    let mut h = Harness::pooled();
    let id = h.create(&ALICE, 1_000, PlanDuration::ThirtyDays);
    h.exec(T0, &KEEPER, LedgerInstruction::ExecuteDeduction { plan_id: id })
        .unwrap();
    h.source.slash(&mut h.tokens, 100).unwrap();
    assert!(matches!(
        h.exec(T0 + HOUR, &ADMIN, LedgerInstruction::SetHarvestInterval { secs: 60 }),
        Err(LedgerError::AccountingMismatch { .. })
    ));
    assert!(h.state.paused);

    let now = T0 + 2 * HOUR;
    let outcome = h
        .exec(now, &ADMIN, LedgerInstruction::ScheduleEmergencyWithdrawal {
            user: ALICE,
            plan_id: id,
            amount: 600,
            reason: "venue slashed".into(),
        })
        .unwrap();
    let InstructionOutcome::EmergencyScheduled(request) = outcome else {
        panic!("expected a scheduled request");
    };

    // Unpausing would leave the ledger running insolvent.
    assert_eq!(
        h.exec(now, &ADMIN, LedgerInstruction::Unpause).unwrap_err(),
        LedgerError::AccountingMismatch {
            assets: 900,
            liabilities: 1_000
        }
    );
    assert!(h.state.paused);
    assert_eq!(
        h.exec(now, &ADMIN, LedgerInstruction::WithdrawProtocolFees { to: TREASURY, amount: 0 })
            .unwrap_err(),
        LedgerError::SystemPaused
    );

    let before = h.tokens.balance_of(&ALICE);
    let ready = now + h.state.config.emergency_delay_secs;
    let outcome = h
        .exec(ready, &ADMIN, LedgerInstruction::ExecuteEmergencyWithdrawal { id: request })
        .unwrap();
    assert_eq!(outcome, InstructionOutcome::EmergencyExecuted(600));
    assert_eq!(h.tokens.balance_of(&ALICE), before + 600);
    assert!(h.state.paused);

    // The shortfall is carried, not deepened.
    let report = h.at(ready, |ctx| accounting_report(ctx));
    assert_eq!(report.deficit(), Some(100));
    assert_eq!(report.liabilities, 400);
}

#[test]
fn test_dispatcher_full_cycle_stays_solvent() {
    let mut h = Harness::pooled();
    h.tokens.approve(&BOB, &POOL, u64::MAX).unwrap();
    for user in [ALICE, BOB] {
        h.exec(T0, &user, LedgerInstruction::CreatePlan {
            daily_amount: 1_000,
            duration: PlanDuration::ThirtyDays,
        })
        .unwrap();
    }

    for day in 0..30 {
        let now = T0 + day * DAY;
        let outcome = h
            .exec(now, &KEEPER, LedgerInstruction::ExecuteDeductionsBatch { plan_ids: vec![1, 2] })
            .unwrap();
        let InstructionOutcome::Batch(report) = outcome else {
            panic!("expected a batch report");
        };
        assert_eq!(report.executed, vec![1, 2]);
        h.source.accrue(&mut h.tokens, DAY).unwrap();
    }

    h.exec(T0 + 30 * DAY, &ADMIN, LedgerInstruction::HarvestYield)
        .unwrap();
    h.exec(T0 + 30 * DAY, &ALICE, LedgerInstruction::Withdraw { plan_id: 1, amount: 0 })
        .unwrap();
    h.exec(T0 + 30 * DAY, &BOB, LedgerInstruction::ClaimYield { plan_id: 2 })
        .unwrap();
    h.exec(T0 + 30 * DAY, &BOB, LedgerInstruction::Withdraw { plan_id: 2, amount: 0 })
        .unwrap();

    assert!(h.tokens.balance_of(&ALICE) >= 1_000_000);
    assert!(h.tokens.balance_of(&BOB) >= 1_000_000);
    let report = h.at(T0 + 30 * DAY, |ctx| accounting_report(ctx));
    assert_eq!(report.is_solvent(0), Some(true));
}
