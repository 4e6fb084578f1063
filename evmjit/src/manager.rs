use jit_abi::{PointerSlot, ReturnCode, RuntimeField, Slot};

use crate::ir::{FuncId, FunctionBuilder, FunctionRole, Type, Value};
use crate::opcode::{Instruction, context_field};

pub struct RuntimeManager<'b, 'm> {
    builder: &'b mut FunctionBuilder<'m>,
}

impl<'b, 'm> RuntimeManager<'b, 'm> {
    pub fn new(builder: &'b mut FunctionBuilder<'m>) -> Self {
        Self { builder }
    }

    pub fn builder(&mut self) -> &mut FunctionBuilder<'m> {
        self.builder
    }

    pub fn runtime_handle(&self) -> Value {
        let index = match self.builder.role() {
            FunctionRole::Entry => crate::ir::ENTRY_RUNTIME_PARAM,
            FunctionRole::Helper { runtime_param } => runtime_param,
        };
        self.builder.param(index)
    }

    fn slot_address(&mut self, slot: Slot) -> Value {
        let handle = self.runtime_handle();
        self.builder
            .ptr_offset(handle, slot.offset_u32(), &format!("{}Ptr", slot.name()))
    }

    pub fn field_address(&mut self, field: RuntimeField) -> Value {
        self.slot_address(field.into())
    }

    pub fn get(&mut self, field: RuntimeField) -> Value {
        let addr = self.field_address(field);
        self.builder.load(Type::Word, addr, field.name())
    }

    pub fn set(&mut self, field: RuntimeField, value: Value) {
        assert_eq!(
            self.builder.value_type(value),
            Type::Word,
            "runtime field '{}' stores a word",
            field.name()
        );
        let addr = self.field_address(field);
        self.builder.store(addr, value);
    }

    fn pointer(&mut self, slot: PointerSlot) -> Value {
        let addr = self.slot_address(slot.into());
        self.builder.load(Type::Ptr, addr, slot.name())
    }

    pub fn call_data_pointer(&mut self) -> Value {
        self.pointer(PointerSlot::CallData)
    }

    pub fn code_pointer(&mut self) -> Value {
        self.pointer(PointerSlot::Code)
    }

    pub fn checkpoint_handle(&mut self) -> Value {
        self.pointer(PointerSlot::Checkpoint)
    }

    pub fn gas(&mut self) -> Value {
        self.get(RuntimeField::Gas)
    }

    pub fn set_gas(&mut self, gas: Value) {
        self.set(RuntimeField::Gas, gas);
    }

    pub fn register_return_data(&mut self, offset: Value, size: Value) {
        self.set(RuntimeField::ReturnDataOffset, offset);
        self.set(RuntimeField::ReturnDataSize, size);
    }

    pub fn raise_abort(&mut self, code: ReturnCode) {
        let abort = self.builder.module_mut().abort_primitive();
        let handle = self.checkpoint_handle();
        let status = self.builder.const_i32(code.code());
        self.builder.call_extern(abort, &[handle, status]);
        self.builder.unreachable();
    }

    pub fn return_status(&mut self, code: ReturnCode) {
        let status = self.builder.const_i32(code.code());
        self.builder.ret(Some(status));
    }

    /// Reads the field behind a context-query instruction.
    ///
    /// # Panics
    ///
    /// If `inst` does not read a runtime field.
    pub fn get_by_opcode(&mut self, inst: Instruction) -> Value {
        let Some(field) = context_field(inst) else {
            panic!("instruction {inst} has no runtime field");
        };
        self.get(field)
    }

    pub fn call_helper(&mut self, callee: FuncId, args: &[Value]) -> Option<Value> {
        let function = self
            .builder
            .module()
            .function(callee)
            .unwrap_or_else(|| panic!("unknown function {callee:?}"));
        let FunctionRole::Helper { runtime_param } = function.role() else {
            panic!("'{}' is not a helper function", function.name());
        };
        assert!(
            runtime_param <= args.len(),
            "'{}' takes its runtime handle after the arguments given",
            function.name()
        );
        let mut full = Vec::with_capacity(args.len() + 1);
        full.extend_from_slice(&args[..runtime_param]);
        full.push(self.runtime_handle());
        full.extend_from_slice(&args[runtime_param..]);
        self.builder.call(callee, &full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Inst, Module, Signature};
    use jit_abi::ABORT_SYMBOL;

    #[test]
    fn field_access_uses_slot_offsets() {
        let mut module = Module::new("m");
        let main = module.declare_entry("main");
        {
            let mut builder = module.builder(main);
            let mut rt = RuntimeManager::new(&mut builder);
            rt.get(RuntimeField::CodeSize);
            rt.return_status(ReturnCode::Stop);
        }
        let function = module.function(main).expect("entry");
        let offsets: Vec<u32> = function
            .insts()
            .filter_map(|inst| match inst {
                Inst::PtrOffset { offset, .. } => Some(*offset),
                _ => None,
            })
            .collect();
        assert_eq!(offsets, vec![Slot::from(RuntimeField::CodeSize).offset_u32()]);
        module.verify().expect("module should verify");
    }

    #[test]
    fn raise_abort_declares_the_primitive_once() {
        let mut module = Module::new("m");
        let main = module.declare_entry("main");
        {
            let mut builder = module.builder(main);
            let second = builder.create_block();
            let mut rt = RuntimeManager::new(&mut builder);
            rt.raise_abort(ReturnCode::OutOfGas);
            rt.builder().switch_to_block(second);
            rt.raise_abort(ReturnCode::BadInstruction);
        }
        assert_eq!(module.externs().len(), 1);
        assert_eq!(module.externs()[0].name, ABORT_SYMBOL);
        module.verify().expect("module should verify");
    }

    #[test]
    fn helper_handle_is_threaded_explicitly() {
        let mut module = Module::new("m");
        let helper = module.declare_helper(
            "charge",
            Signature::new(vec![Type::Word, Type::Ptr], None),
            1,
        );
        {
            let mut builder = module.builder(helper);
            let mut rt = RuntimeManager::new(&mut builder);
            assert_eq!(rt.runtime_handle().index(), 1);
            let gas = rt.gas();
            let cost = rt.builder().param(0);
            let left = rt
                .builder()
                .binary(crate::ir::BinaryOp::Sub, gas, cost);
            rt.set_gas(left);
            rt.builder().ret(None);
        }
        let main = module.declare_entry("main");
        {
            let mut builder = module.builder(main);
            let mut rt = RuntimeManager::new(&mut builder);
            let cost = rt.builder().const_word(jit_abi::U256::from(3u64));
            assert_eq!(rt.call_helper(helper, &[cost]), None);
            rt.return_status(ReturnCode::Stop);
        }
        module.verify().expect("module should verify");
        let call = module
            .function(main)
            .expect("entry")
            .insts()
            .find_map(|inst| match inst {
                Inst::Call { args, .. } => Some(args.clone()),
                _ => None,
            })
            .expect("call emitted");
        assert_eq!(call.len(), 2);
        assert_eq!(call[1].index(), crate::ir::ENTRY_RUNTIME_PARAM);
    }

    #[test]
    #[should_panic(expected = "has no runtime field")]
    fn unmapped_opcode_is_fatal() {
        let mut module = Module::new("m");
        let main = module.declare_entry("main");
        let mut builder = module.builder(main);
        let mut rt = RuntimeManager::new(&mut builder);
        rt.get_by_opcode(Instruction::ADD);
    }
}
