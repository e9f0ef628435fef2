use serde::{Deserialize, Serialize};

use crate::AccountId;

pub type RequestId = [u8; 32];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EmergencyWithdrawal {
    pub id: RequestId,
    pub admin: AccountId,
    pub user: AccountId,
    pub plan_id: u64,
    /// Zero means the whole available balance.
    pub amount: u64,
    pub scheduled_time: u64,
    pub execution_time: u64,
    pub reason_hash: [u8; 32],
    pub executed: bool,
    pub cancelled: bool,
}

impl EmergencyWithdrawal {
    pub fn reason_hash(reason: &str) -> [u8; 32] {
        *blake3::hash(reason.as_bytes()).as_bytes()
    }

    pub fn compute_id(
        admin: &AccountId,
        user: &AccountId,
        plan_id: u64,
        amount: u64,
        scheduled_time: u64,
        reason_hash: &[u8; 32],
    ) -> RequestId {
        #[derive(Serialize)]
        struct IdFields<'a> {
            admin: &'a AccountId,
            user: &'a AccountId,
            plan_id: u64,
            amount: u64,
            scheduled_time: u64,
            reason_hash: &'a [u8; 32],
        }

        let fields = IdFields {
            admin,
            user,
            plan_id,
            amount,
            scheduled_time,
            reason_hash,
        };

        let mut hasher = blake3::Hasher::new();
        hasher.update(&bincode::serialize(&fields).expect("emergency id serialization"));
        *hasher.finalize().as_bytes()
    }

    pub fn is_pending(&self) -> bool {
        !self.executed && !self.cancelled
    }
}
