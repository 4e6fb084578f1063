//! Binary contract between EVM JIT generated code and its host.

mod layout;
mod manifest;
mod status;
mod word;

pub use alloy_primitives::{Address, B256, U256};

pub use layout::{
    POINTER_SIZE, PointerSlot, RUNTIME_DATA_SIZE, RuntimeData, RuntimeField, Slot, SlotKind,
    WORD_ARRAY_SIZE,
};
pub use manifest::{LayoutManifest, SlotEntry};
pub use status::ReturnCode;
pub use word::{
    ADDRESS_SIZE, LayoutWord, WORD_SIZE, from_address, from_hash, from_layout_word, from_usize,
    to_address, to_layout_word, to_usize,
};

pub const ABI_VERSION: u16 = 1;

pub const ABORT_SYMBOL: &str = "evmjit.abort";
