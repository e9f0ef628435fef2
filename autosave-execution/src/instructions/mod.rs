pub mod admin;
pub mod emergency;
pub mod plans;
pub mod scheduler;
pub mod withdrawal;
pub mod yield_pool;
