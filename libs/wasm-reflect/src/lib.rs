// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Reflection and import binding for compiled WebAssembly modules.
//!
//! This crate sits between a host and the WebAssembly execution engine. It compiles raw bytecode,
//! materializes the memory and global imports a module declares, instantiates it and then
//! exposes a typed view of the result: every compiled function with its signature and the raw
//! machine code the engine produced for it, plus an invocation path that reports how long each
//! call took.
//!
//! The entry point is [`Session`]:
//!
//! ```no_run
//! # fn main() -> wasm_reflect::Result<()> {
//! use wasm_reflect::{Config, Engine, Session, Value, ValueType};
//!
//! let engine = Engine::new(&Config::default())?;
//! let bytes = std::fs::read("add.wasm").unwrap();
//!
//! let mut session = Session::compile(&engine, &bytes)?;
//! session.new_memory_import()?;
//! session.new_global_import()?;
//! session.instantiate()?;
//!
//! let add = &session["add"];
//! assert_eq!(add.params(), [ValueType::I32, ValueType::I32]);
//!
//! let index = add.index();
//! let invocation = session.invoke(index, &[Value::I32(2), Value::I32(3)])?;
//! assert!(invocation.success());
//! assert_eq!(invocation.result(), Value::I32(5));
//! # Ok(())
//! # }
//! ```

mod catalog;
mod code_layout;
mod config;
mod engine;
mod errors;
mod imports;
mod indices;
mod instance;
mod invoke;
mod memory;
mod module;
mod session;
pub mod timing;
mod translate;
mod types;
mod utils;
mod values;

pub use catalog::{FunctionCatalog, FunctionEntry};
pub use code_layout::{CodeLayout, CodeRange, CodeRangeKind};
pub use config::{Config, OptLevel};
pub use engine::Engine;
pub use errors::{Error, MemoryAccessError};
pub use imports::{GlobalImport, MemoryPlan};
pub use indices::{FuncIndex, GlobalIndex, MemoryIndex, TypeIndex};
pub use invoke::Invocation;
pub use memory::{MemoryView, MemoryViewMut};
pub use module::{CompileWarning, CompiledModule};
pub use session::{Session, SessionState};
pub use translate::{EntityIndex, Import, ImportKind};
pub use types::{FuncSignature, ValueType};
pub use values::Value;

pub type Result<T> = core::result::Result<T, Error>;

/// The size of a WebAssembly page in bytes.
pub const WASM_PAGE_SIZE: u64 = 1 << 16;
/// The number of pages (for 32-bit modules) we can have before we run out of
/// byte index space.
pub const WASM32_MAX_PAGES: u64 = 1 << 16;
/// The number of pages (for 64-bit modules) we can have before we run out of
/// byte index space.
pub const WASM64_MAX_PAGES: u64 = 1 << 48;
