use core::ffi::c_void;
use core::mem::{align_of, offset_of, size_of};

use serde::{Deserialize, Serialize};

use crate::word::{LayoutWord, WORD_SIZE};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RuntimeField {
    Gas = 0,
    Address = 1,
    Caller = 2,
    Origin = 3,
    CallValue = 4,
    CallDataSize = 5,
    GasPrice = 6,
    PrevHash = 7,
    CoinBase = 8,
    TimeStamp = 9,
    Number = 10,
    Difficulty = 11,
    GasLimit = 12,
    CodeSize = 13,
    ReturnDataOffset = 14,
    ReturnDataSize = 15,
}

impl RuntimeField {
    pub const COUNT: usize = 16;

    pub const ALL: [RuntimeField; Self::COUNT] = [
        RuntimeField::Gas,
        RuntimeField::Address,
        RuntimeField::Caller,
        RuntimeField::Origin,
        RuntimeField::CallValue,
        RuntimeField::CallDataSize,
        RuntimeField::GasPrice,
        RuntimeField::PrevHash,
        RuntimeField::CoinBase,
        RuntimeField::TimeStamp,
        RuntimeField::Number,
        RuntimeField::Difficulty,
        RuntimeField::GasLimit,
        RuntimeField::CodeSize,
        RuntimeField::ReturnDataOffset,
        RuntimeField::ReturnDataSize,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn from_index(index: usize) -> Option<Self> {
        if index < Self::COUNT {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            RuntimeField::Gas => "gas",
            RuntimeField::Address => "address",
            RuntimeField::Caller => "caller",
            RuntimeField::Origin => "origin",
            RuntimeField::CallValue => "callvalue",
            RuntimeField::CallDataSize => "calldatasize",
            RuntimeField::GasPrice => "gasprice",
            RuntimeField::PrevHash => "prevhash",
            RuntimeField::CoinBase => "coinbase",
            RuntimeField::TimeStamp => "timestamp",
            RuntimeField::Number => "number",
            RuntimeField::Difficulty => "difficulty",
            RuntimeField::GasLimit => "gaslimit",
            RuntimeField::CodeSize => "codesize",
            RuntimeField::ReturnDataOffset => "returndataoffset",
            RuntimeField::ReturnDataSize => "returndatasize",
        }
    }

    pub const fn is_internal(self) -> bool {
        matches!(
            self,
            RuntimeField::ReturnDataOffset | RuntimeField::ReturnDataSize
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PointerSlot {
    CallData = 0,
    Code = 1,
    Checkpoint = 2,
}

impl PointerSlot {
    pub const COUNT: usize = 3;

    pub const ALL: [PointerSlot; Self::COUNT] = [
        PointerSlot::CallData,
        PointerSlot::Code,
        PointerSlot::Checkpoint,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            PointerSlot::CallData => "calldata",
            PointerSlot::Code => "code",
            PointerSlot::Checkpoint => "checkpoint",
        }
    }

    pub const fn offset(self) -> usize {
        match self {
            PointerSlot::CallData => offset_of!(RuntimeData, call_data),
            PointerSlot::Code => offset_of!(RuntimeData, code),
            PointerSlot::Checkpoint => offset_of!(RuntimeData, checkpoint),
        }
    }
}

/// The block shared between the host and generated code.
///
/// Generated code addresses it purely through [`Slot::offset`]; nothing on
/// that side knows this struct exists, so its field order is the ABI.
#[repr(C)]
#[derive(Debug)]
pub struct RuntimeData {
    pub words: [LayoutWord; RuntimeField::COUNT],
    pub call_data: *const u8,
    pub code: *const u8,
    pub checkpoint: *const c_void,
}

pub const POINTER_SIZE: usize = size_of::<*const u8>();
pub const WORD_ARRAY_SIZE: usize = RuntimeField::COUNT * WORD_SIZE;
pub const RUNTIME_DATA_SIZE: usize = size_of::<RuntimeData>();

const _: () = {
    assert!(size_of::<LayoutWord>() == WORD_SIZE);
    assert!(offset_of!(RuntimeData, words) == 0);
    assert!(offset_of!(RuntimeData, call_data) == WORD_ARRAY_SIZE);
    assert!(offset_of!(RuntimeData, code) == WORD_ARRAY_SIZE + POINTER_SIZE);
    assert!(offset_of!(RuntimeData, checkpoint) == WORD_ARRAY_SIZE + 2 * POINTER_SIZE);
    assert!(
        RUNTIME_DATA_SIZE
            == (WORD_ARRAY_SIZE + PointerSlot::COUNT * POINTER_SIZE)
                .next_multiple_of(align_of::<RuntimeData>())
    );
    assert!(RUNTIME_DATA_SIZE <= u32::MAX as usize);
};

impl RuntimeData {
    pub const fn zeroed() -> Self {
        Self {
            words: [LayoutWord::ZERO; RuntimeField::COUNT],
            call_data: core::ptr::null(),
            code: core::ptr::null(),
            checkpoint: core::ptr::null(),
        }
    }

    pub fn word(&self, field: RuntimeField) -> LayoutWord {
        self.words[field.index()]
    }

    pub fn set_word(&mut self, field: RuntimeField, word: LayoutWord) {
        self.words[field.index()] = word;
    }

    pub fn pointer(&self, slot: PointerSlot) -> *const c_void {
        match slot {
            PointerSlot::CallData => self.call_data.cast(),
            PointerSlot::Code => self.code.cast(),
            PointerSlot::Checkpoint => self.checkpoint,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Word,
    Pointer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    Word(RuntimeField),
    Pointer(PointerSlot),
}

impl Slot {
    pub const COUNT: usize = RuntimeField::COUNT + PointerSlot::COUNT;

    pub fn all() -> impl Iterator<Item = Slot> {
        RuntimeField::ALL
            .into_iter()
            .map(Slot::Word)
            .chain(PointerSlot::ALL.into_iter().map(Slot::Pointer))
    }

    pub const fn offset(self) -> usize {
        match self {
            Slot::Word(field) => offset_of!(RuntimeData, words) + field.index() * WORD_SIZE,
            Slot::Pointer(slot) => slot.offset(),
        }
    }

    pub const fn offset_u32(self) -> u32 {
        self.offset() as u32
    }

    pub const fn size(self) -> usize {
        match self {
            Slot::Word(_) => WORD_SIZE,
            Slot::Pointer(_) => POINTER_SIZE,
        }
    }

    pub const fn kind(self) -> SlotKind {
        match self {
            Slot::Word(_) => SlotKind::Word,
            Slot::Pointer(_) => SlotKind::Pointer,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Slot::Word(field) => field.name(),
            Slot::Pointer(slot) => slot.name(),
        }
    }
}

impl From<RuntimeField> for Slot {
    fn from(field: RuntimeField) -> Self {
        Slot::Word(field)
    }
}

impl From<PointerSlot> for Slot {
    fn from(slot: PointerSlot) -> Self {
        Slot::Pointer(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::{from_layout_word, to_layout_word};
    use alloy_primitives::U256;

    #[test]
    fn fields_are_dense_and_ordered() {
        for (position, field) in RuntimeField::ALL.iter().enumerate() {
            assert_eq!(field.index(), position);
            assert_eq!(RuntimeField::from_index(position), Some(*field));
        }
        assert_eq!(RuntimeField::from_index(RuntimeField::COUNT), None);
    }

    #[test]
    fn only_return_data_fields_are_internal() {
        let internal: Vec<_> = RuntimeField::ALL
            .iter()
            .filter(|field| field.is_internal())
            .collect();
        assert_eq!(
            internal,
            [&RuntimeField::ReturnDataOffset, &RuntimeField::ReturnDataSize]
        );
    }

    #[test]
    fn word_slots_are_contiguous() {
        for field in RuntimeField::ALL {
            assert_eq!(Slot::Word(field).offset(), field.index() * WORD_SIZE);
        }
    }

    #[test]
    fn pointer_slots_follow_the_full_word_array() {
        let base = size_of::<[LayoutWord; RuntimeField::COUNT]>();
        for (position, slot) in PointerSlot::ALL.iter().enumerate() {
            assert_eq!(slot.offset(), base + position * POINTER_SIZE);
        }
    }

    #[test]
    fn slot_offsets_do_not_depend_on_written_words() {
        let mut data = RuntimeData::zeroed();
        let base = &data as *const RuntimeData as usize;
        let before: Vec<usize> = PointerSlot::ALL
            .iter()
            .map(|slot| slot.offset())
            .collect();

        data.set_word(RuntimeField::Gas, to_layout_word(U256::from(21_000u64)));
        data.set_word(RuntimeField::ReturnDataSize, to_layout_word(U256::MAX));

        let call_data = core::ptr::addr_of!(data.call_data) as usize - base;
        let code = core::ptr::addr_of!(data.code) as usize - base;
        let checkpoint = core::ptr::addr_of!(data.checkpoint) as usize - base;
        assert_eq!(before, vec![call_data, code, checkpoint]);
        assert_eq!(call_data, WORD_ARRAY_SIZE);
    }

    #[test]
    fn slots_do_not_overlap() {
        let mut slots: Vec<Slot> = Slot::all().collect();
        assert_eq!(slots.len(), Slot::COUNT);
        slots.sort_by_key(|slot| slot.offset());
        for pair in slots.windows(2) {
            assert!(pair[0].offset() + pair[0].size() <= pair[1].offset());
        }
        let last = slots[slots.len() - 1];
        assert!(last.offset() + last.size() <= RUNTIME_DATA_SIZE);
    }

    #[test]
    fn word_accessors_use_the_slot_offsets() {
        let mut data = RuntimeData::zeroed();
        let value = U256::from(0xC0DE_u64);
        data.set_word(RuntimeField::CodeSize, to_layout_word(value));

        let base = &data as *const RuntimeData as *const u8;
        let raw = unsafe {
            core::ptr::read_unaligned(
                base.add(Slot::Word(RuntimeField::CodeSize).offset()) as *const LayoutWord
            )
        };
        assert_eq!(from_layout_word(raw), value);
        assert_eq!(from_layout_word(data.word(RuntimeField::CodeSize)), value);
    }
}
