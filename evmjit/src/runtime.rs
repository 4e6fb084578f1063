use std::ffi::c_void;

use alloy_primitives::U256;
use jit_abi::{
    LayoutWord, RuntimeData, RuntimeField, from_address, from_hash, from_layout_word, from_usize,
    to_layout_word, to_usize,
};
use tracing::{debug, trace};

use crate::checkpoint::Checkpoint;
use crate::env::ExtEnv;

pub struct Runtime<'a> {
    data: RuntimeData,
    memory: &'a mut Vec<u8>,
    env: &'a dyn ExtEnv,
}

pub(crate) struct ExecParts<'r> {
    pub(crate) data: *mut RuntimeData,
    pub(crate) memory: &'r mut Vec<u8>,
    pub(crate) env: &'r dyn ExtEnv,
}

pub fn context_value(field: RuntimeField, gas: U256, env: &dyn ExtEnv) -> Option<LayoutWord> {
    let word = match field {
        RuntimeField::Gas => to_layout_word(gas),
        RuntimeField::Address => from_address(env.address()),
        RuntimeField::Caller => from_address(env.caller()),
        RuntimeField::Origin => from_address(env.origin()),
        RuntimeField::CallValue => to_layout_word(env.value()),
        RuntimeField::CallDataSize => from_usize(env.call_data().len()),
        RuntimeField::GasPrice => to_layout_word(env.gas_price()),
        RuntimeField::PrevHash => from_hash(env.previous_block_hash()),
        RuntimeField::CoinBase => from_address(env.coinbase()),
        RuntimeField::TimeStamp => to_layout_word(env.timestamp()),
        RuntimeField::Number => to_layout_word(env.number()),
        RuntimeField::Difficulty => to_layout_word(env.difficulty()),
        RuntimeField::GasLimit => to_layout_word(env.gas_limit()),
        RuntimeField::CodeSize => from_usize(env.code().len()),
        RuntimeField::ReturnDataOffset | RuntimeField::ReturnDataSize => return None,
    };
    Some(word)
}

impl<'a> Runtime<'a> {
    pub fn new(
        gas: U256,
        env: &'a dyn ExtEnv,
        memory: &'a mut Vec<u8>,
        checkpoint: &Checkpoint,
    ) -> Self {
        let mut data = RuntimeData::zeroed();
        for field in RuntimeField::ALL {
            if let Some(word) = context_value(field, gas, env) {
                data.set_word(field, word);
            }
        }
        data.call_data = env.call_data().as_ptr();
        data.code = env.code().as_ptr();
        data.checkpoint = checkpoint.handle();
        debug!(
            %gas,
            call_data_len = env.call_data().len(),
            code_len = env.code().len(),
            checkpoint = checkpoint.id(),
            "runtime constructed"
        );
        Self { data, memory, env }
    }

    pub fn get(&self, field: RuntimeField) -> U256 {
        from_layout_word(self.data.word(field))
    }

    pub fn set(&mut self, field: RuntimeField, value: U256) {
        self.data.set_word(field, to_layout_word(value));
    }

    pub fn gas(&self) -> U256 {
        self.get(RuntimeField::Gas)
    }

    /// Bytes registered as return data by generated code.
    ///
    /// Empty unless `[offset, offset + size)` lies inside the working memory.
    /// Offsets or sizes that do not fit in `usize`, or whose sum overflows,
    /// count as out of range.
    pub fn return_data(&self) -> &[u8] {
        let offset = to_usize(self.data.word(RuntimeField::ReturnDataOffset));
        let size = to_usize(self.data.word(RuntimeField::ReturnDataSize));
        let (Some(offset), Some(size)) = (offset, size) else {
            trace!("return data range exceeds host word size");
            return &[];
        };
        match offset.checked_add(size) {
            Some(end) if end <= self.memory.len() => &self.memory[offset..end],
            _ => {
                trace!(
                    offset,
                    size,
                    memory_len = self.memory.len(),
                    "return data range outside working memory"
                );
                &[]
            }
        }
    }

    pub fn data(&self) -> &RuntimeData {
        &self.data
    }

    pub fn env(&self) -> &'a dyn ExtEnv {
        self.env
    }

    pub fn checkpoint_handle(&self) -> *const c_void {
        self.data.checkpoint
    }

    pub(crate) fn exec_parts(&mut self) -> ExecParts<'_> {
        ExecParts {
            data: &mut self.data,
            memory: &mut *self.memory,
            env: self.env,
        }
    }
}
