pub mod config;
pub mod emergency;
pub mod error;
pub mod event;
pub mod instruction;
pub mod plan;
pub mod state;

/// 32-byte account identity, as held by the token gateway.
pub type AccountId = [u8; 32];

pub use config::LedgerConfig;
pub use emergency::EmergencyWithdrawal;
pub use error::{LedgerError, TokenError, YieldSourceError};
pub use event::LedgerEvent;
pub use instruction::LedgerInstruction;
pub use plan::{Plan, PlanDuration};
pub use state::{LedgerState, PoolTotals};
