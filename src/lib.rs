pub mod config;
pub mod events;
pub mod pubsub;
pub mod shutdown;
pub mod utils;

pub use config::Settings;
pub use events::{ActiveStakingEvent, StakingEvent, UnbondingStakingEvent, WithdrawStakingEvent};
pub use pubsub::{EventPublisher, PublisherError, RedpandaConnector};
