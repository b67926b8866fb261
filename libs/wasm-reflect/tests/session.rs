// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod common;

use std::sync::Arc;
use std::time::Duration;

use wasm_reflect::timing::Disabled;
use wasm_reflect::{Config, Error, Session, SessionState, Value};

const MATH: &str = r#"
(module
  (func (export "div") (param i32 i32) (result i32)
    local.get 0
    local.get 1
    i32.div_s)
  (func (export "boom")
    unreachable)
  (func (export "pair") (param i64) (result i64 i32)
    local.get 0
    i32.const 1)
  (func (export "spin") (param i32) (result i32)
    (local $i i32)
    (block $done
      (loop $again
        local.get $i
        local.get 0
        i32.ge_s
        br_if $done
        local.get $i
        i32.const 1
        i32.add
        local.set $i
        br $again))
    local.get $i))
"#;

#[test]
fn lifecycle() {
    let engine = common::engine();
    let mut session = common::session(&engine, MATH);
    assert_eq!(session.state(), SessionState::Compiled);

    session.new_memory_import().unwrap();
    assert_eq!(session.state(), SessionState::ImportsDeclared);

    session.instantiate().unwrap();
    assert_eq!(session.state(), SessionState::Instantiated);

    let err = session.new_global_import().unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState {
            state: SessionState::Instantiated,
            ..
        }
    ));
    assert!(matches!(
        session.instantiate(),
        Err(Error::InvalidState { .. })
    ));
}

#[test]
fn instantiate_without_declaring() {
    let engine = common::engine();
    let mut session = common::session(&engine, MATH);
    session.instantiate().unwrap();
    assert_eq!(session.call("div", &[Value::I32(9), Value::I32(3)]).unwrap().result(), Value::I32(3));
}

#[test]
fn calls_need_an_instance() {
    let engine = common::engine();
    let mut session = common::session(&engine, MATH);

    assert!(matches!(
        session.call("div", &[Value::I32(1), Value::I32(1)]),
        Err(Error::NotInstantiated)
    ));
    assert!(matches!(session.memory(), Err(Error::NotInstantiated)));
}

#[test]
fn traps_are_reported_not_raised() {
    let engine = common::engine();
    let mut session = common::instantiate(&engine, MATH);

    let invocation = session.call("boom", &[]).unwrap();
    assert!(!invocation.success());
    assert!(invocation.results().is_empty());
    assert_eq!(invocation.result(), Value::Void);

    let invocation = session
        .call("div", &[Value::I32(1), Value::I32(0)])
        .unwrap();
    assert!(!invocation.success());

    // the instance survives a trap
    let invocation = session
        .call("div", &[Value::I32(10), Value::I32(2)])
        .unwrap();
    assert!(invocation.success());
    assert_eq!(invocation.result(), Value::I32(5));
}

#[test]
fn mismatched_arguments_fail_the_call() {
    let engine = common::engine();
    let mut session = common::instantiate(&engine, MATH);

    let invocation = session.call("div", &[Value::I32(1)]).unwrap();
    assert!(!invocation.success());

    let invocation = session
        .call("div", &[Value::I64(1), Value::I64(1)])
        .unwrap();
    assert!(!invocation.success());

    // void arguments are dropped before the call
    let invocation = session
        .call("div", &[Value::I32(8), Value::Void, Value::I32(4)])
        .unwrap();
    assert!(invocation.success());
    assert_eq!(invocation.result(), Value::I32(2));
}

#[test]
fn multiple_results() {
    let engine = common::engine();
    let mut session = common::instantiate(&engine, MATH);

    let pair = session.function("pair").unwrap();
    assert_eq!(pair.results().len(), 2);

    let invocation = session.call("pair", &[Value::I64(-4)]).unwrap();
    assert_eq!(invocation.results(), [Value::I64(-4), Value::I32(1)]);
    assert_eq!(invocation.result(), Value::I64(-4));
}

#[test]
fn unknown_export() {
    let engine = common::engine();
    let mut session = common::instantiate(&engine, MATH);

    let err = session.call("missing", &[]).unwrap_err();
    assert!(matches!(err, Error::UnknownExport { name } if name == "missing"));
}

#[test]
fn calls_are_timed() {
    let engine = common::engine();
    let mut session = common::instantiate(&engine, MATH);

    let invocation = session.call("spin", &[Value::I32(100_000)]).unwrap();
    assert!(invocation.success());
    assert_eq!(invocation.result(), Value::I32(100_000));
    assert!(invocation.elapsed() > Duration::ZERO);
    assert_eq!(
        u128::from(invocation.elapsed_nanos()),
        invocation.elapsed().as_nanos()
    );

    session.set_call_timer(Arc::new(Disabled));
    let invocation = session.call("spin", &[Value::I32(10)]).unwrap();
    assert_eq!(invocation.elapsed(), Duration::ZERO);
}

#[test]
fn timing_can_be_disabled_by_config() {
    let engine = common::engine_with(&Config::default().measure_calls(false));
    let mut session = common::instantiate(&engine, MATH);

    let invocation = session.call("spin", &[Value::I32(1000)]).unwrap();
    assert!(invocation.success());
    assert_eq!(invocation.elapsed_nanos(), 0);
}

#[test]
fn invalid_bytes() {
    let engine = common::engine();

    let err = Session::compile(&engine, b"\0asm\x01\0\0\0\xff").unwrap_err();
    assert!(matches!(err, Error::InvalidWebAssembly { .. }));

    let err = Session::compile(&engine, b"not wasm at all").unwrap_err();
    assert!(matches!(err, Error::InvalidWebAssembly { .. }));
}

#[test]
fn start_function_trap_fails_the_session() {
    let engine = common::engine();
    let mut session = common::session(
        &engine,
        r#"
        (module
          (func $start unreachable)
          (start $start)
          (func (export "f")))
        "#,
    );

    let err = session.instantiate().unwrap_err();
    assert!(matches!(err, Error::Trap { .. }));
    assert_eq!(session.state(), SessionState::Failed);

    assert!(matches!(
        session.new_memory_import(),
        Err(Error::InvalidState {
            state: SessionState::Failed,
            ..
        })
    ));
    assert!(matches!(session.call("f", &[]), Err(Error::NotInstantiated)));
}

#[test]
fn sessions_share_a_module() {
    let engine = common::engine();
    let module = common::session(&engine, MATH).module().clone();

    let mut a = Session::from_module(module.clone());
    let mut b = Session::from_module(module);
    a.instantiate().unwrap();
    b.instantiate().unwrap();

    assert_eq!(a.functions().len(), b.functions().len());
    assert_eq!(
        a.call("div", &[Value::I32(6), Value::I32(2)]).unwrap().result(),
        b.call("div", &[Value::I32(6), Value::I32(2)]).unwrap().result()
    );
}
