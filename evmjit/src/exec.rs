//! Reference executor for generated modules.
//!
//! Runs a module the way native code would: the entry function receives the
//! address of the runtime block and every field access is a load or store at
//! an offset from it. Addresses are plain integers; each access is checked
//! against the regions generated code is allowed to touch and then performed
//! through that region's own base pointer.

use std::collections::HashMap;

use alloy_primitives::U256;
use jit_abi::{
    ABORT_SYMBOL, LayoutWord, RUNTIME_DATA_SIZE, ReturnCode, WORD_SIZE, from_layout_word,
    to_layout_word, to_usize,
};
use tracing::{debug, trace};

use crate::checkpoint::{self, Completion};
use crate::config::BridgeConfig;
use crate::env::ExtEnv;
use crate::error::{JitError, JitResult};
use crate::ir::{Block, FuncId, Function, Inst, Module, Type, Value};
use crate::runtime::{ExecParts, Runtime};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecValue {
    Word(U256),
    Ptr(usize),
    I32(i32),
}

impl ExecValue {
    pub fn ty(self) -> Type {
        match self {
            ExecValue::Word(_) => Type::Word,
            ExecValue::Ptr(_) => Type::Ptr,
            ExecValue::I32(_) => Type::I32,
        }
    }

    pub fn as_word(self) -> JitResult<U256> {
        match self {
            ExecValue::Word(value) => Ok(value),
            other => Err(type_error(Type::Word, other)),
        }
    }

    pub fn as_ptr(self) -> JitResult<usize> {
        match self {
            ExecValue::Ptr(addr) => Ok(addr),
            other => Err(type_error(Type::Ptr, other)),
        }
    }

    pub fn as_i32(self) -> JitResult<i32> {
        match self {
            ExecValue::I32(value) => Ok(value),
            other => Err(type_error(Type::I32, other)),
        }
    }
}

fn type_error(expected: Type, found: ExecValue) -> JitError {
    JitError::Exec(format!("expected {expected}, found {}", found.ty()))
}

pub struct HostCx<'h> {
    memory: &'h mut Vec<u8>,
    env: &'h dyn ExtEnv,
    config: &'h BridgeConfig,
}

impl<'h> HostCx<'h> {
    pub fn memory(&self) -> &[u8] {
        &self.memory[..]
    }

    pub fn memory_mut(&mut self) -> &mut Vec<u8> {
        &mut *self.memory
    }

    pub fn env(&self) -> &'h dyn ExtEnv {
        self.env
    }

    pub fn config(&self) -> &'h BridgeConfig {
        self.config
    }
}

pub trait HostFunction {
    fn call(&mut self, cx: &mut HostCx<'_>, args: &[ExecValue]) -> JitResult<Option<ExecValue>>;
}

impl<F> HostFunction for F
where
    F: FnMut(&mut HostCx<'_>, &[ExecValue]) -> JitResult<Option<ExecValue>>,
{
    fn call(&mut self, cx: &mut HostCx<'_>, args: &[ExecValue]) -> JitResult<Option<ExecValue>> {
        self(cx, args)
    }
}

struct HostEntry {
    arity: usize,
    function: Box<dyn HostFunction>,
}

#[derive(Default)]
pub struct HostFunctions {
    entries: Vec<HostEntry>,
    by_name: HashMap<String, usize>,
}

impl HostFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, arity: usize, function: F)
    where
        F: FnMut(&mut HostCx<'_>, &[ExecValue]) -> JitResult<Option<ExecValue>> + 'static,
    {
        self.register_boxed(name, arity, Box::new(function));
    }

    pub fn register_boxed(
        &mut self,
        name: impl Into<String>,
        arity: usize,
        function: Box<dyn HostFunction>,
    ) {
        let name = name.into();
        let entry = HostEntry { arity, function };
        if let Some(&slot) = self.by_name.get(&name)
            && let Some(existing) = self.entries.get_mut(slot)
        {
            *existing = entry;
            return;
        }
        self.entries.push(entry);
        self.by_name.insert(name, self.entries.len() - 1);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn call(
        &mut self,
        slot: usize,
        cx: &mut HostCx<'_>,
        args: &[ExecValue],
    ) -> JitResult<Option<ExecValue>> {
        let entry = self
            .entries
            .get_mut(slot)
            .ok_or_else(|| JitError::Exec(format!("host slot {slot} is not bound")))?;
        entry.function.call(cx, args)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallOutcome {
    pub status: ReturnCode,
    pub gas_left: U256,
    pub output: Vec<u8>,
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[derive(Clone, Copy, Debug)]
enum Binding {
    Abort,
    Host(usize),
}

fn bind_externs(module: &Module, hosts: &HostFunctions) -> JitResult<Vec<Binding>> {
    module
        .externs()
        .iter()
        .map(|decl| {
            if decl.name == ABORT_SYMBOL {
                return Ok(Binding::Abort);
            }
            let slot = *hosts
                .by_name
                .get(&decl.name)
                .ok_or_else(|| JitError::UnboundExtern(decl.name.clone()))?;
            let arity = hosts.entries[slot].arity;
            if arity != decl.signature.params.len() {
                return Err(JitError::Host(format!(
                    "host function '{}' takes {arity} arguments, extern declares {}",
                    decl.name,
                    decl.signature.params.len()
                )));
            }
            Ok(Binding::Host(slot))
        })
        .collect()
}

/// Runs the entry function of `module` once.
///
/// The call gets a fresh checkpoint and runtime block. The block outlives the
/// checkpoint, so gas and return data are read back however control came
/// back, except that an abort with a failure status ends the call with no
/// remaining gas and no output. Host errors and executor faults come back as
/// `Err`.
pub fn execute_call(
    module: &Module,
    gas: U256,
    env: &dyn ExtEnv,
    memory: &mut Vec<u8>,
    hosts: &mut HostFunctions,
    config: &BridgeConfig,
) -> JitResult<CallOutcome> {
    if config.verify_modules {
        module.verify()?;
    }
    let entry = module.entry().ok_or_else(|| {
        JitError::Exec(format!("module '{}' has no entry function", module.name()))
    })?;
    let bindings = bind_externs(module, hosts)?;
    debug!(module = module.name(), %gas, depth = checkpoint::depth(), "entering generated code");

    let mut runtime: Option<Runtime<'_>> = None;
    let completion = checkpoint::capture(config.max_call_depth, |checkpoint| -> JitResult<i32> {
        let runtime = runtime.insert(Runtime::new(gas, env, memory, checkpoint));
        Executor::new(module, &bindings, hosts, runtime.exec_parts(), config).run_entry(entry)
    })?;
    let runtime = runtime
        .ok_or_else(|| JitError::Exec("checkpoint completed without a runtime".to_string()))?;

    let (code, aborted) = match completion {
        Completion::Returned(result) => (result?, false),
        Completion::Aborted(code) => (code, true),
    };
    let status = ReturnCode::from_i32(code).ok_or(JitError::UnknownStatus(code))?;
    let outcome = if aborted && !status.is_success() {
        CallOutcome {
            status,
            gas_left: U256::ZERO,
            output: Vec::new(),
        }
    } else {
        let output = if status == ReturnCode::Return {
            runtime.return_data().to_vec()
        } else {
            Vec::new()
        };
        CallOutcome {
            status,
            gas_left: runtime.gas(),
            output,
        }
    };
    debug!(
        module = module.name(),
        status = %outcome.status,
        gas_left = %outcome.gas_left,
        output_len = outcome.output.len(),
        "left generated code"
    );
    Ok(outcome)
}

struct Region {
    start: usize,
    len: usize,
    base: *mut u8,
    writable: bool,
}

struct Executor<'x, 'r> {
    module: &'x Module,
    bindings: &'x [Binding],
    hosts: &'x mut HostFunctions,
    parts: ExecParts<'r>,
    config: &'x BridgeConfig,
    regions: [Region; 3],
    depth: usize,
}

impl<'x, 'r> Executor<'x, 'r> {
    fn new(
        module: &'x Module,
        bindings: &'x [Binding],
        hosts: &'x mut HostFunctions,
        parts: ExecParts<'r>,
        config: &'x BridgeConfig,
    ) -> Self {
        let data = parts.data.cast::<u8>();
        let call_data = parts.env.call_data();
        let code = parts.env.code();
        let regions = [
            Region {
                start: data as usize,
                len: RUNTIME_DATA_SIZE,
                base: data,
                writable: true,
            },
            Region {
                start: call_data.as_ptr() as usize,
                len: call_data.len(),
                base: call_data.as_ptr().cast_mut(),
                writable: false,
            },
            Region {
                start: code.as_ptr() as usize,
                len: code.len(),
                base: code.as_ptr().cast_mut(),
                writable: false,
            },
        ];
        Self {
            module,
            bindings,
            hosts,
            parts,
            config,
            regions,
            depth: 0,
        }
    }

    fn run_entry(&mut self, entry: FuncId) -> JitResult<i32> {
        let args = vec![
            ExecValue::Ptr(0),
            ExecValue::Ptr(self.parts.data as usize),
        ];
        match self.call_function(entry, args)? {
            Some(value) => value.as_i32(),
            None => Err(JitError::Exec("entry function returned no status".to_string())),
        }
    }

    fn resolve(&self, addr: usize, len: usize, write: bool) -> JitResult<*mut u8> {
        let fault = JitError::InvalidAccess { addr, len, write };
        for region in &self.regions {
            if let Some(offset) = addr.checked_sub(region.start)
                && offset
                    .checked_add(len)
                    .is_some_and(|end| end <= region.len)
            {
                if write && !region.writable {
                    return Err(fault);
                }
                return Ok(region.base.wrapping_add(offset));
            }
        }
        Err(fault)
    }

    fn load(&self, ty: Type, addr: usize) -> JitResult<ExecValue> {
        let value = match ty {
            Type::Word => {
                let ptr = self.resolve(addr, WORD_SIZE, false)?;
                // SAFETY: `resolve` checked the range lies inside a live region.
                let bytes = unsafe { ptr.cast::<[u8; WORD_SIZE]>().read_unaligned() };
                ExecValue::Word(from_layout_word(LayoutWord::from_le_bytes(bytes)))
            }
            Type::Ptr => {
                let ptr = self.resolve(addr, size_of::<*const u8>(), false)?;
                // SAFETY: as above.
                let value = unsafe { ptr.cast::<*const u8>().read_unaligned() };
                ExecValue::Ptr(value as usize)
            }
            Type::I32 => {
                let ptr = self.resolve(addr, size_of::<i32>(), false)?;
                // SAFETY: as above.
                ExecValue::I32(unsafe { ptr.cast::<i32>().read_unaligned() })
            }
        };
        Ok(value)
    }

    fn store(&mut self, addr: usize, value: ExecValue) -> JitResult<()> {
        match value {
            ExecValue::Word(word) => {
                let ptr = self.resolve(addr, WORD_SIZE, true)?;
                let bytes = to_layout_word(word).to_le_bytes();
                // SAFETY: `resolve` checked the range lies inside a writable region.
                unsafe { ptr.cast::<[u8; WORD_SIZE]>().write_unaligned(bytes) };
            }
            ExecValue::Ptr(target) => {
                let ptr = self.resolve(addr, size_of::<*const u8>(), true)?;
                // SAFETY: as above.
                unsafe { ptr.cast::<*const u8>().write_unaligned(target as *const u8) };
            }
            ExecValue::I32(int) => {
                let ptr = self.resolve(addr, size_of::<i32>(), true)?;
                // SAFETY: as above.
                unsafe { ptr.cast::<i32>().write_unaligned(int) };
            }
        }
        Ok(())
    }

    fn load_byte(&self, base: usize, index: U256) -> JitResult<U256> {
        let addr = to_usize(to_layout_word(index))
            .and_then(|index| base.checked_add(index))
            .ok_or(JitError::InvalidAccess {
                addr: base,
                len: 1,
                write: false,
            })?;
        let ptr = self.resolve(addr, 1, false)?;
        // SAFETY: `resolve` checked the byte lies inside a live region.
        Ok(U256::from(unsafe { ptr.read() }))
    }

    fn call_function(&mut self, func: FuncId, args: Vec<ExecValue>) -> JitResult<Option<ExecValue>> {
        if self.depth >= self.config.max_helper_depth {
            return Err(JitError::HelperDepthExceeded {
                limit: self.config.max_helper_depth,
            });
        }
        let module = self.module;
        let function = module
            .function(func)
            .ok_or_else(|| JitError::Exec(format!("unknown function {}", func.index())))?;
        self.depth += 1;
        let result = self.run_function(function, args);
        self.depth -= 1;
        result
    }

    fn run_function(
        &mut self,
        function: &'x Function,
        args: Vec<ExecValue>,
    ) -> JitResult<Option<ExecValue>> {
        let mut values: Vec<Option<ExecValue>> = vec![None; function.value_count()];
        for (slot, arg) in values.iter_mut().zip(args) {
            *slot = Some(arg);
        }
        let read = |values: &[Option<ExecValue>], value: Value| {
            values
                .get(value.index())
                .copied()
                .flatten()
                .ok_or_else(|| {
                    JitError::Exec(format!(
                        "value %{} used before definition in '{}'",
                        value.index(),
                        function.name()
                    ))
                })
        };

        let mut block = Block::ENTRY;
        loop {
            let insts = function.block(block).ok_or_else(|| {
                JitError::Exec(format!("missing block{} in '{}'", block.index(), function.name()))
            })?;
            let mut next = None;
            for inst in insts {
                match inst {
                    Inst::Const { dst, value } => {
                        values[dst.index()] = Some(ExecValue::Word(*value));
                    }
                    Inst::ConstI32 { dst, value } => {
                        values[dst.index()] = Some(ExecValue::I32(*value));
                    }
                    Inst::PtrOffset { dst, base, offset } => {
                        let base = read(&values, *base)?.as_ptr()?;
                        let addr = base.checked_add(*offset as usize).ok_or_else(|| {
                            JitError::Exec(format!("pointer offset overflow at {base:#x}"))
                        })?;
                        values[dst.index()] = Some(ExecValue::Ptr(addr));
                    }
                    Inst::Load { dst, ty, addr } => {
                        let addr = read(&values, *addr)?.as_ptr()?;
                        values[dst.index()] = Some(self.load(*ty, addr)?);
                    }
                    Inst::Store { addr, value } => {
                        let addr = read(&values, *addr)?.as_ptr()?;
                        let value = read(&values, *value)?;
                        self.store(addr, value)?;
                    }
                    Inst::LoadByte { dst, base, index } => {
                        let base = read(&values, *base)?.as_ptr()?;
                        let index = read(&values, *index)?.as_word()?;
                        values[dst.index()] = Some(ExecValue::Word(self.load_byte(base, index)?));
                    }
                    Inst::Binary { dst, op, lhs, rhs } => {
                        let lhs = read(&values, *lhs)?.as_word()?;
                        let rhs = read(&values, *rhs)?.as_word()?;
                        values[dst.index()] = Some(ExecValue::Word(op.apply(lhs, rhs)));
                    }
                    Inst::Call { dst, callee, args } => {
                        let args = args
                            .iter()
                            .map(|arg| read(&values, *arg))
                            .collect::<JitResult<Vec<_>>>()?;
                        let result = self.call_function(*callee, args)?;
                        if let Some(dst) = dst {
                            values[dst.index()] = result;
                        }
                    }
                    Inst::CallExtern { dst, callee, args } => {
                        let args = args
                            .iter()
                            .map(|arg| read(&values, *arg))
                            .collect::<JitResult<Vec<_>>>()?;
                        let result = self.call_extern(callee.index(), &args)?;
                        if let Some(dst) = dst {
                            if result.is_none() {
                                return Err(JitError::Host(format!(
                                    "extern {} returned no value",
                                    callee.index()
                                )));
                            }
                            values[dst.index()] = result;
                        }
                    }
                    Inst::Jump { target } => {
                        next = Some(*target);
                        break;
                    }
                    Inst::Branch {
                        cond,
                        then_block,
                        else_block,
                    } => {
                        let cond = read(&values, *cond)?.as_word()?;
                        next = Some(if cond.is_zero() {
                            *else_block
                        } else {
                            *then_block
                        });
                        break;
                    }
                    Inst::Return { value } => {
                        return value.map(|value| read(&values, value)).transpose();
                    }
                    Inst::Unreachable => {
                        return Err(JitError::Exec(format!(
                            "reached unreachable code in '{}'",
                            function.name()
                        )));
                    }
                }
            }
            block = next.ok_or_else(|| {
                JitError::Exec(format!(
                    "block{} of '{}' has no terminator",
                    block.index(),
                    function.name()
                ))
            })?;
        }
    }

    fn call_extern(&mut self, index: usize, args: &[ExecValue]) -> JitResult<Option<ExecValue>> {
        let binding = self
            .bindings
            .get(index)
            .copied()
            .ok_or_else(|| JitError::Exec(format!("extern {index} is not bound")))?;
        match binding {
            Binding::Abort => {
                let [handle, code] = args else {
                    return Err(JitError::Exec(
                        "abort primitive takes a checkpoint and a status".to_string(),
                    ));
                };
                let (handle, code) = (handle.as_ptr()?, code.as_i32()?);
                trace!(code, "generated code raised abort");
                checkpoint::abort_to(handle, code)
            }
            Binding::Host(slot) => {
                trace!(slot, args = args.len(), "host call");
                let mut cx = HostCx {
                    memory: &mut *self.parts.memory,
                    env: self.parts.env,
                    config: self.config,
                };
                self.hosts.call(slot, &mut cx, args)
            }
        }
    }
}
