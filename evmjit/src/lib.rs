pub mod checkpoint;
pub mod config;
pub mod env;
pub mod error;
pub mod exec;
pub mod ir;
#[cfg(feature = "cli")]
pub mod logging;
pub mod manager;
pub mod opcode;
pub mod probe;
pub mod runtime;

pub use checkpoint::{Checkpoint, Completion, capture, jit_abort};
pub use config::BridgeConfig;
pub use env::{EnvSnapshot, ExtEnv};
pub use error::{JitError, JitResult};
pub use exec::{CallOutcome, ExecValue, HostCx, HostFunction, HostFunctions, execute_call};
pub use ir::{
    BinaryOp, Block, ExternId, FuncId, Function, FunctionBuilder, FunctionRole, Inst, Module,
    Signature, Type, Value,
};
pub use manager::RuntimeManager;
pub use opcode::{CONTEXT_FIELDS, Instruction, context_field};
pub use probe::{ProbeEntry, ProbeReport, build_probe_module, run_probe};
pub use runtime::{Runtime, context_value};
