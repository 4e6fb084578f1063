use std::path::Path;

use alloy_primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::error::{JitError, JitResult};

pub trait ExtEnv {
    fn address(&self) -> Address;
    fn caller(&self) -> Address;
    fn origin(&self) -> Address;
    fn value(&self) -> U256;
    fn gas_price(&self) -> U256;
    fn previous_block_hash(&self) -> B256;
    fn coinbase(&self) -> Address;
    fn timestamp(&self) -> U256;
    fn number(&self) -> U256;
    fn difficulty(&self) -> U256;
    fn gas_limit(&self) -> U256;
    fn call_data(&self) -> &[u8];
    fn code(&self) -> &[u8];
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvSnapshot {
    pub address: Address,
    pub caller: Address,
    pub origin: Address,
    pub value: U256,
    pub gas_price: U256,
    pub previous_block_hash: B256,
    pub coinbase: Address,
    pub timestamp: U256,
    pub number: U256,
    pub difficulty: U256,
    pub gas_limit: U256,
    pub call_data: Bytes,
    pub code: Bytes,
}

impl EnvSnapshot {
    pub fn from_json_str(text: &str) -> JitResult<Self> {
        serde_json::from_str(text)
            .map_err(|err| JitError::Config(format!("invalid environment snapshot: {err}")))
    }

    pub fn load(path: impl AsRef<Path>) -> JitResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            JitError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn capture(env: &dyn ExtEnv) -> Self {
        Self {
            address: env.address(),
            caller: env.caller(),
            origin: env.origin(),
            value: env.value(),
            gas_price: env.gas_price(),
            previous_block_hash: env.previous_block_hash(),
            coinbase: env.coinbase(),
            timestamp: env.timestamp(),
            number: env.number(),
            difficulty: env.difficulty(),
            gas_limit: env.gas_limit(),
            call_data: Bytes::copy_from_slice(env.call_data()),
            code: Bytes::copy_from_slice(env.code()),
        }
    }
}

impl ExtEnv for EnvSnapshot {
    fn address(&self) -> Address {
        self.address
    }

    fn caller(&self) -> Address {
        self.caller
    }

    fn origin(&self) -> Address {
        self.origin
    }

    fn value(&self) -> U256 {
        self.value
    }

    fn gas_price(&self) -> U256 {
        self.gas_price
    }

    fn previous_block_hash(&self) -> B256 {
        self.previous_block_hash
    }

    fn coinbase(&self) -> Address {
        self.coinbase
    }

    fn timestamp(&self) -> U256 {
        self.timestamp
    }

    fn number(&self) -> U256 {
        self.number
    }

    fn difficulty(&self) -> U256 {
        self.difficulty
    }

    fn gas_limit(&self) -> U256 {
        self.gas_limit
    }

    fn call_data(&self) -> &[u8] {
        &self.call_data
    }

    fn code(&self) -> &[u8] {
        &self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_parses_partial_json_with_defaults() {
        let snapshot = EnvSnapshot::from_json_str(
            r#"{
                "address": "0x1111111111111111111111111111111111111111",
                "value": "0x64",
                "call_data": "0xdeadbeef"
            }"#,
        )
        .expect("snapshot should parse");
        assert_eq!(snapshot.address, Address::repeat_byte(0x11));
        assert_eq!(snapshot.value, U256::from(100u64));
        assert_eq!(snapshot.call_data(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(snapshot.caller, Address::ZERO);
        assert!(snapshot.code().is_empty());
    }

    #[test]
    fn snapshot_rejects_malformed_json() {
        let err = EnvSnapshot::from_json_str("{\"value\": []}").expect_err("should fail");
        assert!(matches!(err, JitError::Config(_)));
    }

    #[test]
    fn capture_copies_every_query() {
        let original = EnvSnapshot {
            caller: Address::repeat_byte(0x22),
            gas_limit: U256::from(30_000_000u64),
            code: Bytes::from_static(&[0x60, 0x00]),
            ..EnvSnapshot::default()
        };
        assert_eq!(EnvSnapshot::capture(&original), original);
    }
}
