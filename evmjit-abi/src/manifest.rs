use serde::{Deserialize, Serialize};

use crate::ABI_VERSION;
use crate::layout::{POINTER_SIZE, RUNTIME_DATA_SIZE, Slot, SlotKind};
use crate::word::WORD_SIZE;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub name: String,
    pub kind: SlotKind,
    pub offset: usize,
    pub size: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutManifest {
    pub abi_version: u16,
    pub word_size: usize,
    pub pointer_size: usize,
    pub total_size: usize,
    pub slots: Vec<SlotEntry>,
}

impl LayoutManifest {
    pub fn current() -> Self {
        Self {
            abi_version: ABI_VERSION,
            word_size: WORD_SIZE,
            pointer_size: POINTER_SIZE,
            total_size: RUNTIME_DATA_SIZE,
            slots: Slot::all()
                .map(|slot| SlotEntry {
                    name: slot.name().to_string(),
                    kind: slot.kind(),
                    offset: slot.offset(),
                    size: slot.size(),
                })
                .collect(),
        }
    }

    pub fn mismatches(&self, other: &LayoutManifest) -> Vec<String> {
        let mut out = Vec::new();
        if self.abi_version != other.abi_version {
            out.push(format!(
                "abi version {} != {}",
                self.abi_version, other.abi_version
            ));
        }
        if self.word_size != other.word_size {
            out.push(format!("word size {} != {}", self.word_size, other.word_size));
        }
        if self.pointer_size != other.pointer_size {
            out.push(format!(
                "pointer size {} != {}",
                self.pointer_size, other.pointer_size
            ));
        }
        if self.total_size != other.total_size {
            out.push(format!(
                "total size {} != {}",
                self.total_size, other.total_size
            ));
        }
        if self.slots.len() != other.slots.len() {
            out.push(format!(
                "slot count {} != {}",
                self.slots.len(),
                other.slots.len()
            ));
        }
        for (position, (ours, theirs)) in self.slots.iter().zip(other.slots.iter()).enumerate() {
            if ours != theirs {
                out.push(format!(
                    "slot #{position}: {} {:?} @{}+{} != {} {:?} @{}+{}",
                    ours.name,
                    ours.kind,
                    ours.offset,
                    ours.size,
                    theirs.name,
                    theirs.kind,
                    theirs.offset,
                    theirs.size
                ));
            }
        }
        out
    }
}
