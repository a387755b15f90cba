//! Utility functions for the staking queue publisher.
//!
//! - [`conversion`] - Hex string normalization

mod conversion;

pub use conversion::normalize_hex;
