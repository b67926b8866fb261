// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod common;

use wasm_reflect::{CodeLayout, Error, FuncIndex, Value, ValueType};

const ADD: &str = r#"
(module
  (func $add (export "add") (param i32 i32) (result i32)
    local.get 0
    local.get 1
    i32.add)
  (func $twice (export "twice") (export "double") (param i64) (result i64)
    local.get 0
    local.get 0
    i64.add)
  (func $helper (param f32) (result f64)
    local.get 0
    f64.promote_f32)
  (func (export "nothing")))
"#;

#[test]
fn add() {
    let engine = common::engine();
    let mut session = common::instantiate(&engine, ADD);

    let add = &session["add"];
    assert_eq!(add.params(), [ValueType::I32, ValueType::I32]);
    assert_eq!(add.return_type(), ValueType::I32);
    assert!(!add.code().is_empty());

    let invocation = session.call("add", &[Value::I32(2), Value::I32(3)]).unwrap();
    assert!(invocation.success());
    assert_eq!(invocation.result(), Value::I32(5));
    assert_eq!(invocation.results(), [Value::I32(5)]);
}

#[test]
fn every_function_is_cataloged() {
    let engine = common::engine();
    let session = common::instantiate(&engine, ADD);

    assert_eq!(session.functions().len(), 4);

    let helper = session
        .functions()
        .iter()
        .find(|f| f.debug_name() == Some("helper"))
        .unwrap();
    assert!(!helper.is_exported());
    assert_eq!(helper.name(), None);
    assert_eq!(helper.params(), [ValueType::F32]);
    assert_eq!(helper.return_type(), ValueType::F64);
    assert!(session.function("helper").is_none());

    let nothing = session.function("nothing").unwrap();
    assert!(nothing.params().is_empty());
    assert_eq!(nothing.return_type(), ValueType::Void);
}

#[test]
fn aliases_share_an_entry() {
    let engine = common::engine();
    let session = common::instantiate(&engine, ADD);

    let twice = session.function("twice").unwrap();
    let double = session.function("double").unwrap();
    assert_eq!(twice.index(), double.index());
    // entries are labeled with the first name they are exported under
    assert_eq!(twice.name(), Some("twice"));
    assert_eq!(double.name(), Some("twice"));
}

#[test]
fn code_ranges_tile_the_text() {
    let engine = common::engine();
    let session = common::instantiate(&engine, ADD);
    let layout = CodeLayout::for_module(session.module());
    let text_len = layout.text().len();

    let mut ranges: Vec<_> = session
        .functions()
        .iter()
        .map(|f| f.code_range().entry_range())
        .collect();
    ranges.sort_by_key(|r| r.start);

    for range in &ranges {
        assert!(!range.is_empty());
        assert!(range.end <= text_len);
    }
    for pair in ranges.windows(2) {
        assert!(pair[0].end <= pair[1].start, "{pair:?} overlap");
    }

    for entry in session.functions() {
        let range = entry.code_range().entry_range();
        assert_eq!(entry.code(), &layout.text()[range.clone()]);
        assert_eq!(layout.function_for_offset(range.start), Some(entry.index()));
    }
}

#[test]
fn hidden_functions_cannot_be_called() {
    let engine = common::engine();
    let mut session = common::instantiate(&engine, ADD);

    let helper = session
        .functions()
        .iter()
        .find(|f| !f.is_exported())
        .unwrap()
        .index();
    let err = session.invoke(helper, &[Value::F32(1.0)]).unwrap_err();
    assert!(matches!(err, Error::NotExported { index } if index == helper));

    let err = session.invoke(FuncIndex::from_u32(99), &[]).unwrap_err();
    assert!(matches!(err, Error::NotExported { .. }));
}

#[test]
fn function_imports_cannot_be_satisfied() {
    let engine = common::engine();
    let mut session = common::session(
        &engine,
        r#"
        (module
          (import "env" "log" (func (param i32)))
          (func (export "run") (result i32) i32.const 1))
        "#,
    );

    // nothing satisfies the function import
    let err = session.instantiate().unwrap_err();
    assert!(matches!(err, Error::MissingImport { .. }));
    assert!(session.functions().is_empty());
}

#[test]
fn empty_before_instantiation() {
    let engine = common::engine();
    let session = common::session(&engine, ADD);
    assert!(session.functions().is_empty());
    assert!(session.function("add").is_none());
}
