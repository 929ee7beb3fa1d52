//! Encoding helpers for descriptor lists.
//! Pure functions; writing the bytes somewhere is the caller's job.

use crate::cluster::{error::Result, strategy::StrategyDescriptor};

pub fn to_json(descriptors: &[StrategyDescriptor]) -> Result<String> {
    Ok(serde_json::to_string_pretty(descriptors)?)
}

pub fn from_json(json: &str) -> Result<Vec<StrategyDescriptor>> {
    Ok(serde_json::from_str(json)?)
}

pub fn to_cbor(descriptors: &[StrategyDescriptor]) -> Result<Vec<u8>> {
    Ok(serde_cbor::to_vec(&descriptors)?)
}

pub fn from_cbor(bytes: &[u8]) -> Result<Vec<StrategyDescriptor>> {
    Ok(serde_cbor::from_slice(bytes)?)
}
