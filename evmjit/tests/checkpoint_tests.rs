mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use common::*;

fn caller_module() -> Module {
    let mut module = Module::new("caller");
    let subcall = module.declare_extern(
        "host.subcall",
        Signature::new(vec![], Some(Type::Word)),
        false,
    );
    let entry = module.declare_entry("main");
    let mut builder = module.builder(entry);
    let mut rt = RuntimeManager::new(&mut builder);
    let status = rt
        .builder()
        .call_extern(subcall, &[])
        .expect("subcall returns a word");
    rt.set_gas(status);
    rt.return_status(ReturnCode::Stop);
    module
}

fn aborting_module(code: ReturnCode) -> Module {
    entry_module("callee", |rt| rt.raise_abort(code))
}

#[test]
fn nested_abort_resumes_in_the_nested_call() {
    let outcomes = Rc::new(RefCell::new(Vec::new()));
    let mut hosts = HostFunctions::new();
    hosts.register_boxed(
        "host.subcall",
        0,
        Box::new(SubcallHost {
            callee: Arc::new(aborting_module(ReturnCode::BadJumpDestination)),
            gas: U256::from(100u64),
            outcomes: Rc::clone(&outcomes),
        }),
    );

    let outcome = run_with(&caller_module(), 1_000, &sample_env(), &mut Vec::new(), &mut hosts);

    assert_eq!(outcome.status, ReturnCode::Stop);
    assert_eq!(outcome.gas_left, U256::from(101u64));
    let inner = outcomes.borrow();
    assert_eq!(inner.len(), 1);
    assert_eq!(inner[0].status, ReturnCode::BadJumpDestination);
    assert_eq!(jit::checkpoint::depth(), 0);
}

#[test]
fn nested_success_does_not_disturb_the_caller() {
    let outcomes = Rc::new(RefCell::new(Vec::new()));
    let callee = entry_module("callee", |rt| {
        let one = rt.builder().const_word(U256::from(1u64));
        let gas = rt.gas();
        let left = rt.builder().binary(BinaryOp::Sub, gas, one);
        rt.set_gas(left);
        rt.return_status(ReturnCode::Stop);
    });
    let mut hosts = HostFunctions::new();
    hosts.register_boxed(
        "host.subcall",
        0,
        Box::new(SubcallHost {
            callee: Arc::new(callee),
            gas: U256::from(50u64),
            outcomes: Rc::clone(&outcomes),
        }),
    );

    let outcome = run_with(&caller_module(), 1_000, &sample_env(), &mut Vec::new(), &mut hosts);
    assert_eq!(outcome.status, ReturnCode::Stop);
    assert_eq!(outcome.gas_left, U256::ZERO);
    assert_eq!(outcomes.borrow()[0].gas_left, U256::from(49u64));
}

#[test]
fn call_depth_limit_fails_the_outer_call() {
    let mut hosts = HostFunctions::new();
    hosts.register_boxed(
        "host.subcall",
        0,
        Box::new(SubcallHost {
            callee: Arc::new(aborting_module(ReturnCode::OutOfGas)),
            gas: U256::ZERO,
            outcomes: Rc::default(),
        }),
    );
    let config = BridgeConfig {
        max_call_depth: 1,
        ..BridgeConfig::default()
    };
    let err = execute_call(
        &caller_module(),
        U256::from(10u64),
        &sample_env(),
        &mut Vec::new(),
        &mut hosts,
        &config,
    )
    .expect_err("nested call exceeds the depth limit");
    assert_eq!(err, JitError::CallDepthExceeded { limit: 1 });
    assert_eq!(jit::checkpoint::depth(), 0);
}

#[test]
fn host_errors_unwind_cleanly() {
    let mut hosts = HostFunctions::new();
    hosts.register("host.subcall", 0, |_cx: &mut HostCx<'_>, _args: &[ExecValue]| {
        Err(JitError::Host("storage unavailable".to_string()))
    });
    let err = execute_call(
        &caller_module(),
        U256::from(10u64),
        &sample_env(),
        &mut Vec::new(),
        &mut hosts,
        &BridgeConfig::default(),
    )
    .expect_err("host failure propagates");
    assert_eq!(err, JitError::Host("storage unavailable".to_string()));
    assert_eq!(jit::checkpoint::depth(), 0);
}

#[test]
fn one_module_serves_many_threads() {
    let module = Arc::new(entry_module("shared", |rt| {
        let gas = rt.gas();
        let cost = rt.builder().const_word(U256::from(21u64));
        let short = rt.builder().binary(BinaryOp::Lt, gas, cost);
        let fail = rt.builder().create_block();
        let ok = rt.builder().create_block();
        rt.builder().branch(short, fail, ok);
        rt.builder().switch_to_block(fail);
        rt.raise_abort(ReturnCode::OutOfGas);
        rt.builder().switch_to_block(ok);
        let left = rt.builder().binary(BinaryOp::Sub, gas, cost);
        rt.set_gas(left);
        rt.return_status(ReturnCode::Stop);
    }));

    std::thread::scope(|scope| {
        for worker in 0..4u64 {
            let module = Arc::clone(&module);
            scope.spawn(move || {
                let env = sample_env();
                for round in 0..50u64 {
                    let gas = worker * 10 + round;
                    let outcome = run(&module, gas, &env, &mut Vec::new());
                    if gas < 21 {
                        assert_eq!(outcome.status, ReturnCode::OutOfGas);
                    } else {
                        assert_eq!(outcome.status, ReturnCode::Stop);
                        assert_eq!(outcome.gas_left, U256::from(gas - 21));
                    }
                }
                assert_eq!(jit::checkpoint::depth(), 0);
            });
        }
    });
}
