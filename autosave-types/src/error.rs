use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("daily amount {amount} outside [{min}, {max}]")]
    InvalidDailyAmount { amount: u64, min: u64, max: u64 },

    #[error("unsupported plan duration {0}")]
    InvalidPlanDuration(u64),

    #[error("plan {0} does not exist")]
    InvalidPlanId(u64),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("plan {0} is not active")]
    PlanNotActive(u64),

    #[error("caller does not own plan {0}")]
    NotPlanOwner(u64),

    #[error("deduction for plan {0} already executed in this window")]
    DeductionAlreadyExecuted(u64),

    #[error("withdrawal of {requested} exceeds available {available}")]
    InvalidWithdrawalAmount { requested: u64, available: u64 },

    #[error("insufficient pool liquidity: need {needed}, have {available}")]
    InsufficientLiquidity { needed: u64, available: u64 },

    #[error("ledger is paused")]
    SystemPaused,

    #[error("ledger is not paused")]
    SystemNotPaused,

    #[error("ledger is already paused")]
    AlreadyPaused,

    #[error("caller is not authorized")]
    Unauthorized,

    #[error("harvest not allowed before {next_allowed}")]
    HarvestTooSoon { next_allowed: u64 },

    #[error("no yield source configured")]
    YieldSourceNotSet,

    #[error("yield source reports unhealthy")]
    YieldSourceUnhealthy,

    #[error("protocol yield {available} is less than requested {requested}")]
    InsufficientProtocolYield { requested: u64, available: u64 },

    #[error("emergency withdrawal not found")]
    EmergencyNotFound,

    #[error("emergency withdrawal already scheduled")]
    EmergencyAlreadyScheduled,

    #[error("emergency withdrawal already executed")]
    EmergencyAlreadyExecuted,

    #[error("emergency withdrawal was cancelled")]
    EmergencyCancelled,

    #[error("emergency withdrawal not executable before {execution_time}")]
    EmergencyWithdrawalNotReady { execution_time: u64 },

    #[error("accounting mismatch: assets {assets} below liabilities {liabilities}")]
    AccountingMismatch { assets: u64, liabilities: u64 },

    #[error("math overflow")]
    MathOverflow,

    #[error(transparent)]
    Token(#[from] TokenError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("insufficient balance: have {available}, need {needed}")]
    InsufficientBalance { available: u64, needed: u64 },

    #[error("insufficient allowance: have {available}, need {needed}")]
    InsufficientAllowance { available: u64, needed: u64 },

    #[error("balance overflow")]
    Overflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum YieldSourceError {
    #[error("yield source call reverted: {0}")]
    Reverted(String),

    #[error("yield source is unhealthy")]
    Unhealthy,

    #[error("insufficient shares: have {available}, requested {requested}")]
    InsufficientShares { available: u64, requested: u64 },

    #[error(transparent)]
    Token(#[from] TokenError),
}
