use alloy_primitives::{Address, B256, U256};

pub const WORD_SIZE: usize = 32;
pub const ADDRESS_SIZE: usize = 20;

#[repr(C, align(8))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LayoutWord(pub [u8; WORD_SIZE]);

impl LayoutWord {
    pub const ZERO: Self = Self([0; WORD_SIZE]);

    pub const fn from_le_bytes(bytes: [u8; WORD_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn to_le_bytes(self) -> [u8; WORD_SIZE] {
        self.0
    }
}

pub fn to_layout_word(value: U256) -> LayoutWord {
    LayoutWord(value.to_le_bytes::<WORD_SIZE>())
}

pub fn from_layout_word(word: LayoutWord) -> U256 {
    U256::from_le_bytes(word.0)
}

/// Zero-extends an address into a word. The address bytes are big-endian,
/// so they land reversed in the low 20 bytes of the little-endian image.
pub fn from_address(address: Address) -> LayoutWord {
    let mut bytes = [0u8; WORD_SIZE];
    for (dst, src) in bytes.iter_mut().zip(address.as_slice().iter().rev()) {
        *dst = *src;
    }
    LayoutWord(bytes)
}

pub fn to_address(word: LayoutWord) -> Address {
    let mut bytes = [0u8; ADDRESS_SIZE];
    for (dst, src) in bytes.iter_mut().rev().zip(word.0.iter()) {
        *dst = *src;
    }
    Address::from(bytes)
}

pub fn from_hash(hash: B256) -> LayoutWord {
    to_layout_word(U256::from_be_bytes(hash.0))
}

pub fn from_usize(value: usize) -> LayoutWord {
    to_layout_word(U256::from(value))
}

pub fn to_usize(word: LayoutWord) -> Option<usize> {
    let value = from_layout_word(word);
    let limbs = value.as_limbs();
    if limbs[1..].iter().any(|limb| *limb != 0) {
        return None;
    }
    usize::try_from(limbs[0]).ok()
}
