//! Self-check of the runtime ABI.
//!
//! Builds a small entry function that reads every context field by opcode and
//! the first byte behind each data pointer, reports them to the host, and
//! compares what generated code saw with what the host stored.

use std::cell::RefCell;
use std::rc::Rc;

use alloy_primitives::U256;
use jit_abi::{ReturnCode, RuntimeField, from_layout_word};
use serde::Serialize;
use tracing::warn;

use crate::config::BridgeConfig;
use crate::env::ExtEnv;
use crate::error::{JitError, JitResult};
use crate::exec::{ExecValue, HostCx, HostFunctions, execute_call};
use crate::ir::{BinaryOp, ExternId, Module, Signature, Type};
use crate::manager::RuntimeManager;
use crate::opcode::CONTEXT_FIELDS;
use crate::runtime::context_value;

pub const RECORD_HOST: &str = "probe.record";

const CALL_DATA_TAG: i32 = 0x100;
const CODE_TAG: i32 = 0x101;

fn emit_first_byte(
    rt: &mut RuntimeManager<'_, '_>,
    record: ExternId,
    size_field: RuntimeField,
    tag: i32,
) {
    let size = rt.get(size_field);
    let zero = rt.builder().const_word(U256::ZERO);
    let non_empty = rt.builder().binary(BinaryOp::Gt, size, zero);
    let read = rt.builder().create_block();
    let done = rt.builder().create_block();
    rt.builder().branch(non_empty, read, done);

    rt.builder().switch_to_block(read);
    let base = if size_field == RuntimeField::CodeSize {
        rt.code_pointer()
    } else {
        rt.call_data_pointer()
    };
    let byte = rt.builder().load_byte(base, zero);
    let tag = rt.builder().const_i32(tag);
    rt.builder().call_extern(record, &[tag, byte]);
    rt.builder().jump(done);

    rt.builder().switch_to_block(done);
}

pub fn build_probe_module() -> Module {
    let mut module = Module::new("abi-probe");
    let record = module.declare_extern(
        RECORD_HOST,
        Signature::new(vec![Type::I32, Type::Word], None),
        false,
    );
    let entry = module.declare_entry("probe");
    let mut builder = module.builder(entry);
    let mut rt = RuntimeManager::new(&mut builder);
    for (inst, _) in CONTEXT_FIELDS {
        let value = rt.get_by_opcode(inst);
        let tag = rt.builder().const_i32(i32::from(inst.byte()));
        rt.builder().call_extern(record, &[tag, value]);
    }
    emit_first_byte(&mut rt, record, RuntimeField::CallDataSize, CALL_DATA_TAG);
    emit_first_byte(&mut rt, record, RuntimeField::CodeSize, CODE_TAG);
    rt.return_status(ReturnCode::Stop);
    module
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProbeEntry {
    pub probe: String,
    pub expected: Option<U256>,
    pub observed: Option<U256>,
}

impl ProbeEntry {
    pub fn matches(&self) -> bool {
        self.expected == self.observed
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ProbeReport {
    pub status: String,
    pub gas_left: U256,
    pub entries: Vec<ProbeEntry>,
}

impl ProbeReport {
    pub fn mismatches(&self) -> impl Iterator<Item = &ProbeEntry> {
        self.entries.iter().filter(|entry| !entry.matches())
    }

    pub fn is_consistent(&self) -> bool {
        self.mismatches().next().is_none()
    }
}

pub fn run_probe(env: &dyn ExtEnv, gas: U256, config: &BridgeConfig) -> JitResult<ProbeReport> {
    let module = build_probe_module();
    let observed: Rc<RefCell<Vec<(i32, U256)>>> = Rc::default();
    let mut hosts = HostFunctions::new();
    let sink = Rc::clone(&observed);
    hosts.register(
        RECORD_HOST,
        2,
        move |_cx: &mut HostCx<'_>, args: &[ExecValue]| {
            let [tag, value] = args else {
                return Err(JitError::Host(format!(
                    "{RECORD_HOST} expects 2 arguments, got {}",
                    args.len()
                )));
            };
            sink.borrow_mut().push((tag.as_i32()?, value.as_word()?));
            Ok(None)
        },
    );

    let outcome = execute_call(&module, gas, env, &mut Vec::new(), &mut hosts, config)?;
    let observed = observed.borrow();
    let lookup = |tag: i32| {
        observed
            .iter()
            .find(|(seen, _)| *seen == tag)
            .map(|(_, value)| *value)
    };

    let mut entries: Vec<ProbeEntry> = CONTEXT_FIELDS
        .iter()
        .map(|(inst, field)| ProbeEntry {
            probe: format!("{inst} -> {}", field.name()),
            expected: context_value(*field, gas, env).map(from_layout_word),
            observed: lookup(i32::from(inst.byte())),
        })
        .collect();
    entries.push(ProbeEntry {
        probe: "calldata[0]".to_string(),
        expected: env.call_data().first().map(|byte| U256::from(*byte)),
        observed: lookup(CALL_DATA_TAG),
    });
    entries.push(ProbeEntry {
        probe: "code[0]".to_string(),
        expected: env.code().first().map(|byte| U256::from(*byte)),
        observed: lookup(CODE_TAG),
    });

    let report = ProbeReport {
        status: outcome.status.to_string(),
        gas_left: outcome.gas_left,
        entries,
    };
    for entry in report.mismatches() {
        warn!(
            probe = %entry.probe,
            expected = ?entry.expected,
            observed = ?entry.observed,
            "generated code disagrees with host"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvSnapshot;
    use alloy_primitives::Address;

    #[test]
    fn probe_module_verifies() {
        build_probe_module()
            .verify()
            .expect("probe module should verify");
    }

    #[test]
    fn probe_agrees_with_host_on_empty_data() {
        let env = EnvSnapshot {
            coinbase: Address::repeat_byte(0x42),
            ..EnvSnapshot::default()
        };
        let report = run_probe(&env, U256::from(7u64), &BridgeConfig::default())
            .expect("probe should run");
        assert!(report.is_consistent(), "{report:?}");
        assert_eq!(report.gas_left, U256::from(7u64));
        let pointers: Vec<_> = report.entries.iter().rev().take(2).collect();
        assert!(pointers.iter().all(|entry| entry.observed.is_none()));
    }
}
