//! Staking events published by the indexer.
//!
//! Each event kind is routed to its own queue. The queue names and the JSON
//! field names are shared with the consumer side and must not change
//! without a coordinated migration.

mod staking;

pub use staking::{
    ActiveStakingEvent, EventType, StakingEvent, UnbondingStakingEvent, WithdrawStakingEvent,
};

// ============================================
// Queue Names
// ============================================

pub const ACTIVE_STAKING_QUEUE_NAME: &str = "active_staking_queue";
pub const UNBONDING_STAKING_QUEUE_NAME: &str = "unbonding_staking_queue";
pub const WITHDRAW_STAKING_QUEUE_NAME: &str = "withdraw_staking_queue";
