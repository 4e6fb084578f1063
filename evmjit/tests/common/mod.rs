#![allow(dead_code, unused_imports)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

pub use alloy_primitives::{Address, B256, Bytes, U256};
pub use jit::{
    BinaryOp, BridgeConfig, CallOutcome, EnvSnapshot, ExecValue, HostCx, HostFunction,
    HostFunctions, Instruction, JitError, JitResult, Module, RuntimeManager, Signature, Type,
    execute_call,
};
pub use jit_abi::{ReturnCode, RuntimeField};

pub fn sample_env() -> EnvSnapshot {
    EnvSnapshot {
        address: Address::repeat_byte(0x11),
        caller: Address::repeat_byte(0x22),
        origin: Address::repeat_byte(0x33),
        value: U256::from(1_000_000_000u64),
        gas_price: U256::from(50u64),
        previous_block_hash: B256::repeat_byte(0x44),
        coinbase: Address::repeat_byte(0x55),
        timestamp: U256::from(1_438_269_988u64),
        number: U256::from(46_147u64),
        difficulty: U256::from(1_509_648_431_238u64),
        gas_limit: U256::from(3_141_592u64),
        call_data: Bytes::from_static(&[0xa9, 0x05, 0x9c, 0xbb]),
        code: Bytes::from_static(&[0x60, 0x00, 0x60, 0x00, 0xf3, 0x00, 0x00, 0x00, 0x00, 0x00]),
    }
}

/// A module whose entry function is emitted by `emit`. `emit` must end the
/// current block.
pub fn entry_module(name: &str, emit: impl FnOnce(&mut RuntimeManager<'_, '_>)) -> Module {
    let mut module = Module::new(name);
    let entry = module.declare_entry("main");
    let mut builder = module.builder(entry);
    let mut rt = RuntimeManager::new(&mut builder);
    emit(&mut rt);
    module
}

pub fn run(module: &Module, gas: u64, env: &EnvSnapshot, memory: &mut Vec<u8>) -> CallOutcome {
    run_with(module, gas, env, memory, &mut HostFunctions::new())
}

pub fn run_with(
    module: &Module,
    gas: u64,
    env: &EnvSnapshot,
    memory: &mut Vec<u8>,
    hosts: &mut HostFunctions,
) -> CallOutcome {
    execute_call(
        module,
        U256::from(gas),
        env,
        memory,
        hosts,
        &BridgeConfig::default(),
    )
    .expect("call should complete")
}

/// Runs `callee` as a nested call with the caller's environment and hands
/// its status code back to generated code.
pub struct SubcallHost {
    pub callee: Arc<Module>,
    pub gas: U256,
    pub outcomes: Rc<RefCell<Vec<CallOutcome>>>,
}

impl HostFunction for SubcallHost {
    fn call(&mut self, cx: &mut HostCx<'_>, _args: &[ExecValue]) -> JitResult<Option<ExecValue>> {
        let mut memory = Vec::new();
        let outcome = execute_call(
            &self.callee,
            self.gas,
            cx.env(),
            &mut memory,
            &mut HostFunctions::new(),
            cx.config(),
        )?;
        let status = U256::from(outcome.status.code() as u64);
        self.outcomes.borrow_mut().push(outcome);
        Ok(Some(ExecValue::Word(status)))
    }
}
