use std::fmt;

use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

use super::{ACTIVE_STAKING_QUEUE_NAME, UNBONDING_STAKING_QUEUE_NAME, WITHDRAW_STAKING_QUEUE_NAME};
use crate::utils::normalize_hex;

/// Discriminator carried in every payload as the numeric `event_type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum EventType {
    ActiveStaking = 1,
    UnbondingStaking = 2,
    WithdrawStaking = 3,
}

impl EventType {
    /// Destination queue for events of this kind.
    pub fn queue_name(self) -> &'static str {
        match self {
            EventType::ActiveStaking => ACTIVE_STAKING_QUEUE_NAME,
            EventType::UnbondingStaking => UNBONDING_STAKING_QUEUE_NAME,
            EventType::WithdrawStaking => WITHDRAW_STAKING_QUEUE_NAME,
        }
    }
}

impl From<EventType> for u8 {
    fn from(value: EventType) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for EventType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(EventType::ActiveStaking),
            2 => Ok(EventType::UnbondingStaking),
            3 => Ok(EventType::WithdrawStaking),
            other => Err(format!("unknown staking event type: {}", other)),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            EventType::ActiveStaking => "staking",
            EventType::UnbondingStaking => "unbonding",
            EventType::WithdrawStaking => "withdraw",
        };
        f.write_str(kind)
    }
}

/// Decode a hex field into its wire form.
fn deserialize_hex<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = String::deserialize(deserializer)?;
    Ok(normalize_hex(&value))
}

fn expect_event_type<'de, D: Deserializer<'de>>(
    deserializer: D,
    expected: EventType,
) -> Result<EventType, D::Error> {
    let found = EventType::deserialize(deserializer)?;
    if found != expected {
        return Err(D::Error::custom(format!(
            "event_type {} does not match {} event (expected {})",
            u8::from(found),
            expected,
            u8::from(expected)
        )));
    }
    Ok(found)
}

fn active_event_type<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EventType, D::Error> {
    expect_event_type(deserializer, EventType::ActiveStaking)
}

fn unbonding_event_type<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EventType, D::Error> {
    expect_event_type(deserializer, EventType::UnbondingStaking)
}

fn withdraw_event_type<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EventType, D::Error> {
    expect_event_type(deserializer, EventType::WithdrawStaking)
}

/// A newly observed staking transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveStakingEvent {
    #[serde(deserialize_with = "active_event_type")]
    pub event_type: EventType,
    #[serde(deserialize_with = "deserialize_hex")]
    pub staking_tx_hash_hex: String,
    #[serde(deserialize_with = "deserialize_hex")]
    pub staker_pk_hex: String,
    #[serde(deserialize_with = "deserialize_hex")]
    pub finality_provider_pk_hex: String,
    pub staking_value: u64,
    pub staking_start_height: u64,
    pub staking_start_timestamp: i64,
    #[serde(rename = "staking_timelock")]
    pub staking_time_lock: u64,
    pub staking_output_index: u64,
    #[serde(deserialize_with = "deserialize_hex")]
    pub staking_tx_hex: String,
    pub is_overflow: bool,
}

impl ActiveStakingEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        staking_tx_hash_hex: &str,
        staker_pk_hex: &str,
        finality_provider_pk_hex: &str,
        staking_value: u64,
        staking_start_height: u64,
        staking_start_timestamp: i64,
        staking_time_lock: u64,
        staking_output_index: u64,
        staking_tx_hex: &str,
        is_overflow: bool,
    ) -> Self {
        Self {
            event_type: EventType::ActiveStaking,
            staking_tx_hash_hex: normalize_hex(staking_tx_hash_hex),
            staker_pk_hex: normalize_hex(staker_pk_hex),
            finality_provider_pk_hex: normalize_hex(finality_provider_pk_hex),
            staking_value,
            staking_start_height,
            staking_start_timestamp,
            staking_time_lock,
            staking_output_index,
            staking_tx_hex: normalize_hex(staking_tx_hex),
            is_overflow,
        }
    }
}

/// An unbonding request spending a staking output early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingStakingEvent {
    #[serde(deserialize_with = "unbonding_event_type")]
    pub event_type: EventType,
    #[serde(deserialize_with = "deserialize_hex")]
    pub staking_tx_hash_hex: String,
    pub unbonding_start_height: u64,
    pub unbonding_start_timestamp: i64,
    #[serde(rename = "unbonding_timelock")]
    pub unbonding_time_lock: u64,
    pub unbonding_output_index: u64,
    #[serde(deserialize_with = "deserialize_hex")]
    pub unbonding_tx_hex: String,
    #[serde(deserialize_with = "deserialize_hex")]
    pub unbonding_tx_hash_hex: String,
}

impl UnbondingStakingEvent {
    pub fn new(
        staking_tx_hash_hex: &str,
        unbonding_start_height: u64,
        unbonding_start_timestamp: i64,
        unbonding_time_lock: u64,
        unbonding_output_index: u64,
        unbonding_tx_hex: &str,
        unbonding_tx_hash_hex: &str,
    ) -> Self {
        Self {
            event_type: EventType::UnbondingStaking,
            staking_tx_hash_hex: normalize_hex(staking_tx_hash_hex),
            unbonding_start_height,
            unbonding_start_timestamp,
            unbonding_time_lock,
            unbonding_output_index,
            unbonding_tx_hex: normalize_hex(unbonding_tx_hex),
            unbonding_tx_hash_hex: normalize_hex(unbonding_tx_hash_hex),
        }
    }
}

/// A completed withdrawal of a staking or unbonding output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawStakingEvent {
    #[serde(deserialize_with = "withdraw_event_type")]
    pub event_type: EventType,
    #[serde(deserialize_with = "deserialize_hex")]
    pub staking_tx_hash_hex: String,
}

impl WithdrawStakingEvent {
    pub fn new(staking_tx_hash_hex: &str) -> Self {
        Self {
            event_type: EventType::WithdrawStaking,
            staking_tx_hash_hex: normalize_hex(staking_tx_hash_hex),
        }
    }
}

/// Any of the three staking events, discriminated by `event_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakingEvent {
    Active(ActiveStakingEvent),
    Unbonding(UnbondingStakingEvent),
    Withdraw(WithdrawStakingEvent),
}

#[derive(Deserialize)]
struct EventTypeProbe {
    event_type: EventType,
}

impl StakingEvent {
    /// Decode a JSON document, choosing the event kind from its `event_type`.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(payload)?;
        let probe = EventTypeProbe::deserialize(&value)?;

        let event = match probe.event_type {
            EventType::ActiveStaking => StakingEvent::Active(serde_json::from_value(value)?),
            EventType::UnbondingStaking => StakingEvent::Unbonding(serde_json::from_value(value)?),
            EventType::WithdrawStaking => StakingEvent::Withdraw(serde_json::from_value(value)?),
        };

        Ok(event)
    }

    pub fn event_type(&self) -> EventType {
        match self {
            StakingEvent::Active(ev) => ev.event_type,
            StakingEvent::Unbonding(ev) => ev.event_type,
            StakingEvent::Withdraw(ev) => ev.event_type,
        }
    }

    /// Hash of the staking transaction the event belongs to.
    pub fn staking_tx_hash_hex(&self) -> &str {
        match self {
            StakingEvent::Active(ev) => &ev.staking_tx_hash_hex,
            StakingEvent::Unbonding(ev) => &ev.staking_tx_hash_hex,
            StakingEvent::Withdraw(ev) => &ev.staking_tx_hash_hex,
        }
    }
}
