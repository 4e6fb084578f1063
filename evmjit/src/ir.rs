//! Instruction emission context for generated functions.
//!
//! A [`Module`] is one compilation unit. Functions are declared up front and
//! filled in through a [`FunctionBuilder`]; the builder appends to the current
//! block and hands back typed SSA values. Malformed emission (unknown values,
//! wrong parameter indices) is a code generator bug and panics; everything
//! that can be checked after the fact is left to [`Module::verify`].

use std::fmt::{self, Write as _};

use alloy_primitives::U256;
use jit_abi::ABORT_SYMBOL;

use crate::error::{JitError, JitResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value(u32);

impl Value {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(u32);

impl Block {
    pub const ENTRY: Block = Block(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(u32);

impl FuncId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternId(u32);

impl ExternId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

pub const ENTRY_HOST_PARAM: usize = 0;
pub const ENTRY_RUNTIME_PARAM: usize = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Word,
    Ptr,
    I32,
}

impl Type {
    pub fn name(self) -> &'static str {
        match self {
            Type::Word => "word",
            Type::Ptr => "ptr",
            Type::I32 => "i32",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Option<Type>,
}

impl Signature {
    pub fn new(params: Vec<Type>, ret: Option<Type>) -> Self {
        Self { params, ret }
    }

    pub fn entry() -> Self {
        Self::new(vec![Type::Ptr, Type::Ptr], Some(Type::I32))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionRole {
    Entry,
    Helper { runtime_param: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Lt,
    Gt,
    Eq,
}

impl BinaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Lt => "lt",
            BinaryOp::Gt => "gt",
            BinaryOp::Eq => "eq",
        }
    }

    pub fn apply(self, lhs: U256, rhs: U256) -> U256 {
        let flag = |cond: bool| if cond { U256::from(1u64) } else { U256::ZERO };
        match self {
            BinaryOp::Add => lhs.wrapping_add(rhs),
            BinaryOp::Sub => lhs.wrapping_sub(rhs),
            BinaryOp::Lt => flag(lhs < rhs),
            BinaryOp::Gt => flag(lhs > rhs),
            BinaryOp::Eq => flag(lhs == rhs),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inst {
    Const {
        dst: Value,
        value: U256,
    },
    ConstI32 {
        dst: Value,
        value: i32,
    },
    PtrOffset {
        dst: Value,
        base: Value,
        offset: u32,
    },
    Load {
        dst: Value,
        ty: Type,
        addr: Value,
    },
    Store {
        addr: Value,
        value: Value,
    },
    LoadByte {
        dst: Value,
        base: Value,
        index: Value,
    },
    Binary {
        dst: Value,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
    },
    Call {
        dst: Option<Value>,
        callee: FuncId,
        args: Vec<Value>,
    },
    CallExtern {
        dst: Option<Value>,
        callee: ExternId,
        args: Vec<Value>,
    },
    Jump {
        target: Block,
    },
    Branch {
        cond: Value,
        then_block: Block,
        else_block: Block,
    },
    Return {
        value: Option<Value>,
    },
    Unreachable,
}

impl Inst {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Inst::Jump { .. } | Inst::Branch { .. } | Inst::Return { .. } | Inst::Unreachable
        )
    }
}

#[derive(Clone, Debug)]
pub struct Function {
    name: String,
    signature: Signature,
    role: FunctionRole,
    blocks: Vec<Vec<Inst>>,
    value_types: Vec<Type>,
    value_names: Vec<Option<String>>,
}

impl Function {
    fn new(name: String, signature: Signature, role: FunctionRole) -> Self {
        let runtime_param = match role {
            FunctionRole::Entry => ENTRY_RUNTIME_PARAM,
            FunctionRole::Helper { runtime_param } => runtime_param,
        };
        let value_names = (0..signature.params.len())
            .map(|index| {
                Some(match (role, index) {
                    (FunctionRole::Entry, ENTRY_HOST_PARAM) => "host".to_string(),
                    (_, index) if index == runtime_param => "rt".to_string(),
                    (_, index) => format!("arg{index}"),
                })
            })
            .collect();
        Self {
            name,
            value_types: signature.params.clone(),
            value_names,
            signature,
            role,
            blocks: vec![Vec::new()],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn role(&self) -> FunctionRole {
        self.role
    }

    pub fn runtime_param(&self) -> usize {
        match self.role {
            FunctionRole::Entry => ENTRY_RUNTIME_PARAM,
            FunctionRole::Helper { runtime_param } => runtime_param,
        }
    }

    pub fn param(&self, index: usize) -> Option<Value> {
        (index < self.signature.params.len()).then_some(Value(index as u32))
    }

    pub fn block(&self, block: Block) -> Option<&[Inst]> {
        self.blocks.get(block.index()).map(Vec::as_slice)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn value_count(&self) -> usize {
        self.value_types.len()
    }

    pub fn value_type(&self, value: Value) -> Option<Type> {
        self.value_types.get(value.index()).copied()
    }

    pub fn value_name(&self, value: Value) -> Option<&str> {
        self.value_names.get(value.index())?.as_deref()
    }

    pub fn insts(&self) -> impl Iterator<Item = &Inst> {
        self.blocks.iter().flatten()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternDecl {
    pub name: String,
    pub signature: Signature,
    pub noreturn: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Module {
    name: String,
    functions: Vec<Function>,
    externs: Vec<ExternDecl>,
    entry: Option<FuncId>,
    abort: Option<ExternId>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn push_function(&mut self, function: Function) -> FuncId {
        assert!(
            self.find_function(&function.name).is_none(),
            "function '{}' declared twice in module '{}'",
            function.name,
            self.name
        );
        self.functions.push(function);
        FuncId((self.functions.len() - 1) as u32)
    }

    pub fn declare_entry(&mut self, name: impl Into<String>) -> FuncId {
        assert!(
            self.entry.is_none(),
            "module '{}' already has an entry function",
            self.name
        );
        let id = self.push_function(Function::new(
            name.into(),
            Signature::entry(),
            FunctionRole::Entry,
        ));
        self.entry = Some(id);
        id
    }

    pub fn declare_helper(
        &mut self,
        name: impl Into<String>,
        signature: Signature,
        runtime_param: usize,
    ) -> FuncId {
        let name = name.into();
        assert_eq!(
            signature.params.get(runtime_param),
            Some(&Type::Ptr),
            "helper '{name}' must take the runtime handle as ptr parameter {runtime_param}"
        );
        self.push_function(Function::new(
            name,
            signature,
            FunctionRole::Helper { runtime_param },
        ))
    }

    pub fn declare_extern(
        &mut self,
        name: impl Into<String>,
        signature: Signature,
        noreturn: bool,
    ) -> ExternId {
        let name = name.into();
        if let Some(position) = self.externs.iter().position(|decl| decl.name == name) {
            let existing = &self.externs[position];
            assert!(
                existing.signature == signature && existing.noreturn == noreturn,
                "extern '{name}' redeclared with a different signature"
            );
            return ExternId(position as u32);
        }
        self.externs.push(ExternDecl {
            name,
            signature,
            noreturn,
        });
        ExternId((self.externs.len() - 1) as u32)
    }

    pub fn abort_primitive(&mut self) -> ExternId {
        if let Some(id) = self.abort {
            return id;
        }
        let id = self.declare_extern(
            ABORT_SYMBOL,
            Signature::new(vec![Type::Ptr, Type::I32], None),
            true,
        );
        self.abort = Some(id);
        id
    }

    pub fn has_abort_primitive(&self) -> bool {
        self.abort.is_some()
    }

    pub fn builder(&mut self, func: FuncId) -> FunctionBuilder<'_> {
        assert!(
            func.index() < self.functions.len(),
            "unknown function {func:?} in module '{}'",
            self.name
        );
        FunctionBuilder {
            module: self,
            func,
            current: Block::ENTRY,
        }
    }

    pub fn entry(&self) -> Option<FuncId> {
        self.entry
    }

    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(index, function)| (FuncId(index as u32), function))
    }

    pub fn find_function(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|function| function.name == name)
            .map(|index| FuncId(index as u32))
    }

    pub fn extern_decl(&self, id: ExternId) -> Option<&ExternDecl> {
        self.externs.get(id.index())
    }

    pub fn externs(&self) -> &[ExternDecl] {
        &self.externs
    }

    pub fn verify(&self) -> JitResult<()> {
        if self.entry.is_none() {
            return Err(JitError::Verify {
                function: self.name.clone(),
                message: "module has no entry function".to_string(),
            });
        }
        for function in &self.functions {
            Verifier {
                module: self,
                function,
            }
            .run()?;
        }
        Ok(())
    }

    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "module {}", self.name);
        for decl in &self.externs {
            let params: Vec<_> = decl.signature.params.iter().map(|ty| ty.name()).collect();
            let _ = write!(out, "extern {}({})", decl.name, params.join(", "));
            if let Some(ret) = decl.signature.ret {
                let _ = write!(out, " -> {ret}");
            }
            if decl.noreturn {
                out.push_str(" noreturn");
            }
            out.push('\n');
        }
        for (id, function) in self.functions() {
            out.push('\n');
            self.dump_function(&mut out, id, function);
        }
        out
    }

    fn dump_function(&self, out: &mut String, id: FuncId, function: &Function) {
        let params: Vec<String> = function
            .signature
            .params
            .iter()
            .enumerate()
            .map(|(index, ty)| format!("{}: {ty}", value_label(function, Value(index as u32))))
            .collect();
        let _ = write!(out, "fn {}({})", function.name, params.join(", "));
        if let Some(ret) = function.signature.ret {
            let _ = write!(out, " -> {ret}");
        }
        if Some(id) == self.entry {
            out.push_str(" [entry]");
        }
        out.push('\n');
        for (index, insts) in function.blocks.iter().enumerate() {
            let _ = writeln!(out, "block{index}:");
            for inst in insts {
                let _ = writeln!(out, "  {}", self.format_inst(function, inst));
            }
        }
    }

    fn format_inst(&self, function: &Function, inst: &Inst) -> String {
        let v = |value: &Value| value_label(function, *value);
        let list = |values: &[Value]| values.iter().map(v).collect::<Vec<_>>().join(", ");
        match inst {
            Inst::Const { dst, value } => format!("{} = const {value:#x}", v(dst)),
            Inst::ConstI32 { dst, value } => format!("{} = const.i32 {value}", v(dst)),
            Inst::PtrOffset { dst, base, offset } => {
                format!("{} = ptr.offset {}, {offset}", v(dst), v(base))
            }
            Inst::Load { dst, ty, addr } => format!("{} = load.{ty} {}", v(dst), v(addr)),
            Inst::Store { addr, value } => format!("store {}, {}", v(addr), v(value)),
            Inst::LoadByte { dst, base, index } => {
                format!("{} = load.byte {}, {}", v(dst), v(base), v(index))
            }
            Inst::Binary { dst, op, lhs, rhs } => {
                format!("{} = {} {}, {}", v(dst), op.mnemonic(), v(lhs), v(rhs))
            }
            Inst::Call { dst, callee, args } => {
                let name = self
                    .function(*callee)
                    .map(|callee| callee.name.as_str())
                    .unwrap_or("?");
                match dst {
                    Some(dst) => format!("{} = call {name}({})", v(dst), list(args)),
                    None => format!("call {name}({})", list(args)),
                }
            }
            Inst::CallExtern { dst, callee, args } => {
                let name = self
                    .extern_decl(*callee)
                    .map(|decl| decl.name.as_str())
                    .unwrap_or("?");
                match dst {
                    Some(dst) => format!("{} = call.extern {name}({})", v(dst), list(args)),
                    None => format!("call.extern {name}({})", list(args)),
                }
            }
            Inst::Jump { target } => format!("jump block{}", target.0),
            Inst::Branch {
                cond,
                then_block,
                else_block,
            } => format!(
                "branch {}, block{}, block{}",
                v(cond),
                then_block.0,
                else_block.0
            ),
            Inst::Return { value: Some(value) } => format!("return {}", v(value)),
            Inst::Return { value: None } => "return".to_string(),
            Inst::Unreachable => "unreachable".to_string(),
        }
    }
}

fn value_label(function: &Function, value: Value) -> String {
    match function.value_name(value) {
        Some(name) => format!("%{name}.{}", value.0),
        None => format!("%{}", value.0),
    }
}

struct Verifier<'a> {
    module: &'a Module,
    function: &'a Function,
}

impl Verifier<'_> {
    fn fail(&self, message: impl Into<String>) -> JitError {
        JitError::Verify {
            function: self.function.name.clone(),
            message: message.into(),
        }
    }

    fn ty(&self, value: Value) -> JitResult<Type> {
        self.function
            .value_type(value)
            .ok_or_else(|| self.fail(format!("undefined value %{}", value.0)))
    }

    fn expect(&self, value: Value, ty: Type, what: &str) -> JitResult<()> {
        let actual = self.ty(value)?;
        if actual != ty {
            return Err(self.fail(format!(
                "{what}: expected {ty}, found {actual} (%{})",
                value.0
            )));
        }
        Ok(())
    }

    fn block(&self, block: Block) -> JitResult<()> {
        if block.index() >= self.function.blocks.len() {
            return Err(self.fail(format!("branch to missing block{}", block.0)));
        }
        Ok(())
    }

    fn call(
        &self,
        callee: &str,
        signature: &Signature,
        dst: Option<Value>,
        args: &[Value],
    ) -> JitResult<()> {
        if args.len() != signature.params.len() {
            return Err(self.fail(format!(
                "call to '{callee}' passes {} arguments, expected {}",
                args.len(),
                signature.params.len()
            )));
        }
        for (arg, ty) in args.iter().zip(signature.params.iter()) {
            self.expect(*arg, *ty, &format!("argument to '{callee}'"))?;
        }
        match (dst, signature.ret) {
            (None, _) => Ok(()),
            (Some(dst), Some(ty)) => self.expect(dst, ty, &format!("result of '{callee}'")),
            (Some(_), None) => Err(self.fail(format!("'{callee}' returns nothing"))),
        }
    }

    fn run(&self) -> JitResult<()> {
        let signature = &self.function.signature;
        match self.function.role {
            FunctionRole::Entry => {
                if *signature != Signature::entry() {
                    return Err(self.fail("entry function must be (ptr, ptr) -> i32"));
                }
            }
            FunctionRole::Helper { runtime_param } => {
                if signature.params.get(runtime_param) != Some(&Type::Ptr) {
                    return Err(self.fail(format!(
                        "runtime handle parameter {runtime_param} is not a ptr"
                    )));
                }
            }
        }

        for (index, insts) in self.function.blocks.iter().enumerate() {
            let Some((last, body)) = insts.split_last() else {
                return Err(self.fail(format!("block{index} is empty")));
            };
            if !last.is_terminator() {
                return Err(self.fail(format!("block{index} does not end in a terminator")));
            }
            if body.iter().any(Inst::is_terminator) {
                return Err(self.fail(format!("block{index} has a terminator before its end")));
            }
            for inst in insts {
                self.inst(inst)?;
            }
        }
        Ok(())
    }

    fn inst(&self, inst: &Inst) -> JitResult<()> {
        match inst {
            Inst::Const { dst, .. } => self.expect(*dst, Type::Word, "const"),
            Inst::ConstI32 { dst, .. } => self.expect(*dst, Type::I32, "const.i32"),
            Inst::PtrOffset { dst, base, .. } => {
                self.expect(*base, Type::Ptr, "ptr.offset base")?;
                self.expect(*dst, Type::Ptr, "ptr.offset result")
            }
            Inst::Load { dst, ty, addr } => {
                self.expect(*addr, Type::Ptr, "load address")?;
                self.expect(*dst, *ty, "load result")
            }
            Inst::Store { addr, value } => {
                self.expect(*addr, Type::Ptr, "store address")?;
                self.ty(*value).map(|_| ())
            }
            Inst::LoadByte { dst, base, index } => {
                self.expect(*base, Type::Ptr, "load.byte base")?;
                self.expect(*index, Type::Word, "load.byte index")?;
                self.expect(*dst, Type::Word, "load.byte result")
            }
            Inst::Binary { dst, op, lhs, rhs } => {
                self.expect(*lhs, Type::Word, op.mnemonic())?;
                self.expect(*rhs, Type::Word, op.mnemonic())?;
                self.expect(*dst, Type::Word, op.mnemonic())
            }
            Inst::Call { dst, callee, args } => {
                let Some(function) = self.module.function(*callee) else {
                    return Err(self.fail(format!("call to unknown function {}", callee.0)));
                };
                if function.role == FunctionRole::Entry {
                    return Err(self.fail("the entry function cannot be called"));
                }
                self.call(&function.name, &function.signature, *dst, args)
            }
            Inst::CallExtern { dst, callee, args } => {
                let Some(decl) = self.module.extern_decl(*callee) else {
                    return Err(self.fail(format!("call to unknown extern {}", callee.0)));
                };
                if decl.noreturn && dst.is_some() {
                    return Err(self.fail(format!("noreturn extern '{}' has a result", decl.name)));
                }
                self.call(&decl.name, &decl.signature, *dst, args)
            }
            Inst::Jump { target } => self.block(*target),
            Inst::Branch {
                cond,
                then_block,
                else_block,
            } => {
                self.expect(*cond, Type::Word, "branch condition")?;
                self.block(*then_block)?;
                self.block(*else_block)
            }
            Inst::Return { value } => match (value, self.function.signature.ret) {
                (None, None) => Ok(()),
                (Some(value), Some(ty)) => self.expect(*value, ty, "return value"),
                _ => Err(self.fail("return does not match the function signature")),
            },
            Inst::Unreachable => Ok(()),
        }
    }
}

pub struct FunctionBuilder<'m> {
    module: &'m mut Module,
    func: FuncId,
    current: Block,
}

impl<'m> FunctionBuilder<'m> {
    fn function(&self) -> &Function {
        &self.module.functions[self.func.index()]
    }

    fn function_mut(&mut self) -> &mut Function {
        &mut self.module.functions[self.func.index()]
    }

    pub fn func_id(&self) -> FuncId {
        self.func
    }

    pub fn role(&self) -> FunctionRole {
        self.function().role
    }

    pub fn module(&self) -> &Module {
        &*self.module
    }

    pub fn module_mut(&mut self) -> &mut Module {
        &mut *self.module
    }

    pub fn param(&self, index: usize) -> Value {
        let function = self.function();
        function.param(index).unwrap_or_else(|| {
            panic!("function '{}' has no parameter {index}", function.name)
        })
    }

    pub fn value_type(&self, value: Value) -> Type {
        let function = self.function();
        function.value_type(value).unwrap_or_else(|| {
            panic!(
                "value %{} is not defined in function '{}'",
                value.0, function.name
            )
        })
    }

    pub fn create_block(&mut self) -> Block {
        let function = self.function_mut();
        function.blocks.push(Vec::new());
        Block((function.blocks.len() - 1) as u32)
    }

    pub fn switch_to_block(&mut self, block: Block) {
        assert!(
            block.index() < self.function().blocks.len(),
            "block{} does not exist in function '{}'",
            block.0,
            self.function().name
        );
        self.current = block;
    }

    pub fn current_block(&self) -> Block {
        self.current
    }

    fn new_value(&mut self, ty: Type, name: Option<&str>) -> Value {
        let function = self.function_mut();
        function.value_types.push(ty);
        function.value_names.push(name.map(str::to_string));
        Value((function.value_types.len() - 1) as u32)
    }

    fn push(&mut self, inst: Inst) {
        let block = self.current.index();
        self.function_mut().blocks[block].push(inst);
    }

    pub fn const_word(&mut self, value: U256) -> Value {
        let dst = self.new_value(Type::Word, None);
        self.push(Inst::Const { dst, value });
        dst
    }

    pub fn const_i32(&mut self, value: i32) -> Value {
        let dst = self.new_value(Type::I32, None);
        self.push(Inst::ConstI32 { dst, value });
        dst
    }

    pub fn ptr_offset(&mut self, base: Value, offset: u32, name: &str) -> Value {
        let dst = self.new_value(Type::Ptr, Some(name));
        self.push(Inst::PtrOffset { dst, base, offset });
        dst
    }

    pub fn load(&mut self, ty: Type, addr: Value, name: &str) -> Value {
        let dst = self.new_value(ty, Some(name));
        self.push(Inst::Load { dst, ty, addr });
        dst
    }

    pub fn store(&mut self, addr: Value, value: Value) {
        self.push(Inst::Store { addr, value });
    }

    pub fn load_byte(&mut self, base: Value, index: Value) -> Value {
        let dst = self.new_value(Type::Word, None);
        self.push(Inst::LoadByte { dst, base, index });
        dst
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Value {
        let dst = self.new_value(Type::Word, None);
        self.push(Inst::Binary { dst, op, lhs, rhs });
        dst
    }

    pub fn call(&mut self, callee: FuncId, args: &[Value]) -> Option<Value> {
        let ret = self
            .module
            .function(callee)
            .unwrap_or_else(|| panic!("unknown function {callee:?}"))
            .signature
            .ret;
        let dst = ret.map(|ty| self.new_value(ty, None));
        self.push(Inst::Call {
            dst,
            callee,
            args: args.to_vec(),
        });
        dst
    }

    pub fn call_extern(&mut self, callee: ExternId, args: &[Value]) -> Option<Value> {
        let decl = self
            .module
            .extern_decl(callee)
            .unwrap_or_else(|| panic!("unknown extern {callee:?}"));
        let ret = if decl.noreturn {
            None
        } else {
            decl.signature.ret
        };
        let dst = ret.map(|ty| self.new_value(ty, None));
        self.push(Inst::CallExtern {
            dst,
            callee,
            args: args.to_vec(),
        });
        dst
    }

    pub fn jump(&mut self, target: Block) {
        self.push(Inst::Jump { target });
    }

    pub fn branch(&mut self, cond: Value, then_block: Block, else_block: Block) {
        self.push(Inst::Branch {
            cond,
            then_block,
            else_block,
        });
    }

    pub fn ret(&mut self, value: Option<Value>) {
        self.push(Inst::Return { value });
    }

    pub fn unreachable(&mut self) {
        self.push(Inst::Unreachable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_parameters_are_host_and_runtime() {
        let mut module = Module::new("m");
        let main = module.declare_entry("main");
        let builder = module.builder(main);
        assert_eq!(builder.value_type(builder.param(ENTRY_HOST_PARAM)), Type::Ptr);
        assert_eq!(builder.value_type(builder.param(ENTRY_RUNTIME_PARAM)), Type::Ptr);
        let function = module.function(main).expect("entry exists");
        assert_eq!(function.value_name(Value(1)), Some("rt"));
        assert_eq!(function.runtime_param(), ENTRY_RUNTIME_PARAM);
    }

    #[test]
    fn builder_tracks_function_and_insertion_block() {
        let mut module = Module::new("m");
        let main = module.declare_entry("main");
        let mut builder = module.builder(main);
        assert_eq!(builder.func_id(), main);
        assert_eq!(builder.current_block(), Block::ENTRY);
        let exit = builder.create_block();
        builder.jump(exit);
        builder.switch_to_block(exit);
        assert_eq!(builder.current_block(), exit);
        let status = builder.const_i32(0);
        builder.ret(Some(status));
        let function = module.function(main).expect("entry exists");
        assert_eq!(function.block_count(), 2);
        module.verify().expect("module should verify");
    }

    #[test]
    fn abort_primitive_is_declared_once() {
        let mut module = Module::new("m");
        assert!(!module.has_abort_primitive());
        let first = module.abort_primitive();
        let second = module.abort_primitive();
        assert_eq!(first, second);
        assert_eq!(module.externs().len(), 1);
        assert_eq!(module.externs()[0].name, ABORT_SYMBOL);
        assert!(module.externs()[0].noreturn);
    }

    #[test]
    fn verify_accepts_a_minimal_entry() {
        let mut module = Module::new("m");
        let main = module.declare_entry("main");
        let mut builder = module.builder(main);
        let status = builder.const_i32(0);
        builder.ret(Some(status));
        module.verify().expect("module should verify");
    }

    #[test]
    fn verify_rejects_missing_terminator() {
        let mut module = Module::new("m");
        let main = module.declare_entry("main");
        let mut builder = module.builder(main);
        builder.const_i32(0);
        let err = module.verify().expect_err("should fail");
        assert!(err.to_string().contains("does not end in a terminator"), "{err}");
    }

    #[test]
    fn verify_rejects_type_mismatch() {
        let mut module = Module::new("m");
        let main = module.declare_entry("main");
        let mut builder = module.builder(main);
        let word = builder.const_word(U256::from(1u64));
        builder.load(Type::Word, word, "bogus");
        let status = builder.const_i32(0);
        builder.ret(Some(status));
        let err = module.verify().expect_err("should fail");
        assert!(err.to_string().contains("load address"), "{err}");
    }

    #[test]
    fn verify_rejects_calls_with_wrong_arity() {
        let mut module = Module::new("m");
        let helper = module.declare_helper(
            "helper",
            Signature::new(vec![Type::Ptr, Type::Word], None),
            0,
        );
        {
            let mut builder = module.builder(helper);
            builder.ret(None);
        }
        let main = module.declare_entry("main");
        let mut builder = module.builder(main);
        let rt = builder.param(ENTRY_RUNTIME_PARAM);
        builder.call(helper, &[rt]);
        let status = builder.const_i32(0);
        builder.ret(Some(status));
        let err = module.verify().expect_err("should fail");
        assert!(err.to_string().contains("passes 1 arguments"), "{err}");
    }

    #[test]
    fn verify_requires_an_entry() {
        let module = Module::new("empty");
        assert!(matches!(module.verify(), Err(JitError::Verify { .. })));
    }

    #[test]
    #[should_panic(expected = "must take the runtime handle")]
    fn helper_without_runtime_ptr_is_rejected() {
        let mut module = Module::new("m");
        module.declare_helper("helper", Signature::new(vec![Type::Word], None), 0);
    }

    #[test]
    fn dump_lists_named_values() {
        let mut module = Module::new("m");
        let main = module.declare_entry("main");
        let mut builder = module.builder(main);
        let rt = builder.param(ENTRY_RUNTIME_PARAM);
        let addr = builder.ptr_offset(rt, 0, "gasPtr");
        builder.load(Type::Word, addr, "gas");
        let status = builder.const_i32(0);
        builder.ret(Some(status));
        let dump = module.dump();
        assert!(dump.contains("fn main(%host.0: ptr, %rt.1: ptr) -> i32 [entry]"), "{dump}");
        assert!(dump.contains("%gasPtr.2 = ptr.offset %rt.1, 0"), "{dump}");
        assert!(dump.contains("%gas.3 = load.word %gasPtr.2"), "{dump}");
    }

    #[test]
    fn binary_ops_use_word_semantics() {
        let one = U256::from(1u64);
        assert_eq!(BinaryOp::Sub.apply(U256::ZERO, one), U256::MAX);
        assert_eq!(BinaryOp::Add.apply(U256::MAX, one), U256::ZERO);
        assert_eq!(BinaryOp::Lt.apply(U256::ZERO, one), one);
        assert_eq!(BinaryOp::Gt.apply(U256::ZERO, one), U256::ZERO);
        assert_eq!(BinaryOp::Eq.apply(one, one), one);
    }
}
