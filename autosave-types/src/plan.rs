use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::AccountId;

pub const SECONDS_PER_DAY: u64 = 86_400;
pub const SECONDS_PER_HOUR: u64 = 3_600;

/// Fixed plan lengths. Wire tags are the enum index (0..=3).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanDuration {
    ThirtyDays,
    NinetyDays,
    OneHundredEightyDays,
    ThreeHundredSixtyFiveDays,
}

const DURATION_DAYS: [(PlanDuration, u64); 4] = [
    (PlanDuration::ThirtyDays, 30),
    (PlanDuration::NinetyDays, 90),
    (PlanDuration::OneHundredEightyDays, 180),
    (PlanDuration::ThreeHundredSixtyFiveDays, 365),
];

impl PlanDuration {
    pub const ALL: [PlanDuration; 4] = [
        PlanDuration::ThirtyDays,
        PlanDuration::NinetyDays,
        PlanDuration::OneHundredEightyDays,
        PlanDuration::ThreeHundredSixtyFiveDays,
    ];

    pub fn days(self) -> u64 {
        DURATION_DAYS
            .iter()
            .find(|(d, _)| *d == self)
            .map(|(_, days)| *days)
            .unwrap_or(0)
    }

    pub fn seconds(self) -> u64 {
        self.days() * SECONDS_PER_DAY
    }

    pub fn tag(self) -> u8 {
        match self {
            PlanDuration::ThirtyDays => 0,
            PlanDuration::NinetyDays => 1,
            PlanDuration::OneHundredEightyDays => 2,
            PlanDuration::ThreeHundredSixtyFiveDays => 3,
        }
    }

    /// Accepts a day count (30/90/180/365) as typed by an operator.
    pub fn from_days(days: u64) -> Result<Self, LedgerError> {
        DURATION_DAYS
            .iter()
            .find(|(_, d)| *d == days)
            .map(|(duration, _)| *duration)
            .ok_or(LedgerError::InvalidPlanDuration(days))
    }
}

impl TryFrom<u8> for PlanDuration {
    type Error = LedgerError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(tag as usize)
            .copied()
            .ok_or(LedgerError::InvalidPlanDuration(tag as u64))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub id: u64,
    pub owner: AccountId,
    pub daily_amount: u64,
    pub start_date: u64,
    pub end_date: u64,
    pub total_target: u64,
    /// Principal currently held for the plan.
    pub accumulated_balance: u64,
    /// Lifetime principal deducted; never decreases.
    pub principal_deposited: u64,
    /// Credited yield that has not been paid out yet.
    pub yield_earned: u64,
    /// Lifetime yield credited, used to net out entitlement already paid in.
    pub yield_credited: u64,
    pub last_deduction_date: Option<u64>,
    pub successful_deductions: u32,
    pub missed_deductions: u32,
    pub is_active: bool,
    pub is_completed: bool,
    pub duration: PlanDuration,
}

impl Plan {
    pub fn new(
        id: u64,
        owner: AccountId,
        daily_amount: u64,
        duration: PlanDuration,
        start_date: u64,
    ) -> Result<Self, LedgerError> {
        let total_target = daily_amount
            .checked_mul(duration.days())
            .ok_or(LedgerError::MathOverflow)?;
        let end_date = start_date
            .checked_add(duration.seconds())
            .ok_or(LedgerError::MathOverflow)?;

        Ok(Self {
            id,
            owner,
            daily_amount,
            start_date,
            end_date,
            total_target,
            accumulated_balance: 0,
            principal_deposited: 0,
            yield_earned: 0,
            yield_credited: 0,
            last_deduction_date: None,
            successful_deductions: 0,
            missed_deductions: 0,
            is_active: true,
            is_completed: false,
            duration,
        })
    }

    pub fn available(&self) -> u64 {
        self.accumulated_balance.saturating_add(self.yield_earned)
    }

    /// Number of schedule slots consumed, hit or missed.
    pub fn slots_consumed(&self) -> u64 {
        self.successful_deductions as u64 + self.missed_deductions as u64
    }

    pub fn next_deduction_at(&self) -> u64 {
        self.start_date
            .saturating_add(self.slots_consumed().saturating_mul(SECONDS_PER_DAY))
    }

    pub fn is_mature(&self, now: u64) -> bool {
        now >= self.end_date
    }

    /// Active, or completed with something left to withdraw.
    pub fn is_withdrawable(&self) -> bool {
        self.is_active || (self.is_completed && self.available() > 0)
    }

    pub fn mark_completed(&mut self) -> bool {
        if self.is_completed {
            return false;
        }
        self.is_active = false;
        self.is_completed = true;
        true
    }
}
