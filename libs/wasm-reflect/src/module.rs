// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use std::sync::Arc;

use wasmparser::Validator;

use crate::Error;
use crate::engine::Engine;
use crate::indices::FuncIndex;
use crate::translate::{
    self, EntityIndex, Import, ImportKind, ModuleTranslator, TranslatedModule,
};
use crate::types::FuncSignature;

/// A validated and compiled WebAssembly module, ready to be instantiated.
///
/// It holds the compiled code together with the metadata this crate reflects on: imports,
/// exports, function signatures and names. Cloning is cheap and clones share everything.
#[derive(Clone)]
pub struct CompiledModule(Arc<ModuleInner>);

struct ModuleInner {
    engine: Engine,
    translated: TranslatedModule,
    module: wasmtime::Module,
    bytecode: Box<[u8]>,
    /// The export the host reaches the module's own memory through.
    memory_export: Option<String>,
}

/// A problem with a module that does not prevent it from being compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileWarning {
    /// An import of a kind that is never materialized on the host side. Instantiation will fail
    /// unless the module is linked some other way.
    UnsupportedImport {
        module: String,
        name: String,
        kind: ImportKind,
    },
    /// A value type without a [`ValueType`](crate::ValueType) counterpart. It is reflected as
    /// `Void`.
    UnsupportedValueType {
        /// What the type belongs to, e.g. `"parameter"` or `"global"`.
        location: &'static str,
        /// The index of the type or global the value type was found in.
        index: u32,
        ty: String,
    },
    /// More than one linear memory; only the first one is visible through the session.
    MultipleMemories { count: usize },
    /// The `name` custom section could not be decoded and was ignored.
    MalformedNameSection { message: String },
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileWarning::UnsupportedImport { module, name, kind } => {
                write!(f, "{kind} import {module}::{name} cannot be provided")
            }
            CompileWarning::UnsupportedValueType {
                location,
                index,
                ty,
            } => write!(f, "{location} of type `{ty}` in entry {index} is reflected as void"),
            CompileWarning::MultipleMemories { count } => {
                write!(f, "module declares {count} memories, only the first is reflected")
            }
            CompileWarning::MalformedNameSection { message } => {
                write!(f, "ignoring malformed name section: {message}")
            }
        }
    }
}

impl CompiledModule {
    /// Creates a new module from the given WebAssembly bytes.
    ///
    /// The bytes are copied into a buffer owned by the module, validated, translated and handed to
    /// the engine's compiler. Non-fatal problems are logged and available through
    /// [`CompiledModule::warnings`].
    ///
    /// # Errors
    ///
    /// - [`Error::ResourceExhausted`] if the bytecode buffer cannot be allocated.
    /// - [`Error::InvalidWebAssembly`] if the bytes are not a valid module.
    /// - [`Error::Unsupported`] if the module uses a proposal this crate does not reflect.
    /// - [`Error::Compile`] if the engine fails to compile the validated module.
    pub fn from_bytes(engine: &Engine, bytes: &[u8]) -> crate::Result<Self> {
        let mut bytecode = Vec::new();
        bytecode
            .try_reserve_exact(bytes.len())
            .map_err(|_| Error::ResourceExhausted)?;
        bytecode.extend_from_slice(bytes);

        tracing::debug!("Validating and translating {} bytes...", bytecode.len());
        let mut validator = Validator::new_with_features(engine.features());
        let translated = ModuleTranslator::new(&mut validator).translate(&bytecode)?;

        for warning in &translated.warnings {
            tracing::warn!("{warning}");
        }

        // a memory the module defines is only reachable through an export, so add one if needed
        let mut memory_export = None;
        let mut rewritten = None;
        let defined_memory = translated
            .primary_memory()
            .filter(|(index, _)| !translated.is_imported_memory(*index));
        if let Some((index, _)) = defined_memory {
            match translated.memory_export_name(index) {
                Some(name) => memory_export = Some(name.to_string()),
                None => {
                    let name = translate::reserved_name(&translated);
                    rewritten = Some(translate::export_memory(&bytecode, &name)?);
                    memory_export = Some(name);
                }
            }
        }

        tracing::debug!("Compiling module...");
        let module = wasmtime::Module::from_binary(
            engine.wasmtime(),
            rewritten.as_deref().unwrap_or(bytecode.as_slice()),
        )
        .map_err(|err| Error::Compile {
            message: format!("{err:#}"),
        })?;

        Ok(Self(Arc::new(ModuleInner {
            engine: engine.clone(),
            translated,
            module,
            bytecode: bytecode.into_boxed_slice(),
            memory_export,
        })))
    }

    /// Returns the modules name if present.
    pub fn name(&self) -> Option<&str> {
        self.0.translated.name.as_deref()
    }

    /// Returns the modules imports.
    pub fn imports(&self) -> impl ExactSizeIterator<Item = &Import> {
        self.0.translated.imports.iter()
    }

    /// Returns the modules exports.
    pub fn exports(&self) -> impl ExactSizeIterator<Item = (&str, EntityIndex)> + '_ {
        self.0
            .translated
            .exports
            .iter()
            .map(|(name, index)| (name.as_str(), *index))
    }

    /// Returns the signature of a function, imported or defined.
    pub fn signature(&self, index: FuncIndex) -> Option<&FuncSignature> {
        self.0.translated.func_signature(index)
    }

    /// Returns the signature of a function import, `None` for other kinds of imports.
    pub fn import_signature(&self, import: &Import) -> Option<&FuncSignature> {
        self.0.translated.types.get(import.func_type()?)
    }

    /// Returns the module's start function, if it has one.
    pub fn start(&self) -> Option<FuncIndex> {
        self.0.translated.start
    }

    /// Returns the problems found while compiling the module.
    pub fn warnings(&self) -> &[CompileWarning] {
        &self.0.translated.warnings
    }

    /// Returns the bytecode this module was compiled from.
    pub fn bytecode(&self) -> &[u8] {
        &self.0.bytecode
    }

    pub fn engine(&self) -> &Engine {
        &self.0.engine
    }

    pub(crate) fn translated(&self) -> &TranslatedModule {
        &self.0.translated
    }

    pub(crate) fn wasmtime_module(&self) -> &wasmtime::Module {
        &self.0.module
    }

    /// The export name of the module's own memory, `None` if it has none or imports it.
    pub(crate) fn memory_export(&self) -> Option<&str> {
        self.0.memory_export.as_deref()
    }
}

impl fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledModule")
            .field("name", &self.name())
            .field("imports", &self.0.translated.imports.len())
            .field("exports", &self.0.translated.exports.len())
            .field("warnings", &self.warnings())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, ValueType};

    fn compile(wat: &str) -> crate::Result<CompiledModule> {
        let engine = Engine::new(&Config::default())?;
        CompiledModule::from_bytes(&engine, &wat::parse_str(wat).unwrap())
    }

    #[test]
    fn translates_metadata() {
        let module = compile(
            r#"(module $demo
                (import "env" "counter" (global (mut i32)))
                (import "env" "memory" (memory 1 2))
                (func $add (export "add") (param i32 i32) (result i32)
                    local.get 0
                    local.get 1
                    i32.add))"#,
        )
        .unwrap();

        assert_eq!(module.name(), Some("demo"));
        assert!(module.warnings().is_empty());

        let kinds: Vec<_> = module.imports().map(Import::kind).collect();
        assert_eq!(kinds, [ImportKind::Global, ImportKind::Memory]);

        let (name, index) = module.exports().next().unwrap();
        assert_eq!(name, "add");
        assert_eq!(index, EntityIndex::Function(FuncIndex::from_u32(0)));

        let sig = module.signature(FuncIndex::from_u32(0)).unwrap();
        assert_eq!(sig.params(), [ValueType::I32, ValueType::I32]);
        assert_eq!(sig.return_type(), ValueType::I32);
    }

    #[test]
    fn rejects_invalid_bytes() {
        let engine = Engine::new(&Config::default()).unwrap();
        let err = CompiledModule::from_bytes(&engine, b"\0asm\x01\0\0\0\x01").unwrap_err();
        assert!(matches!(err, Error::InvalidWebAssembly { .. }), "{err}");

        let err = CompiledModule::from_bytes(&engine, b"not wasm").unwrap_err();
        assert!(matches!(err, Error::InvalidWebAssembly { .. }), "{err}");
    }

    #[test]
    fn rejects_type_errors() {
        let err = compile(r#"(module (func (result i32) i64.const 1))"#).unwrap_err();
        assert!(matches!(err, Error::InvalidWebAssembly { .. }), "{err}");
    }

    #[test]
    fn disabled_proposals_are_invalid() {
        let engine = Engine::new(&Config::default().simd(false)).unwrap();
        let bytes = wat::parse_str(r#"(module (func (result v128) v128.const i64x2 0 0))"#).unwrap();
        let err = CompiledModule::from_bytes(&engine, &bytes).unwrap_err();
        assert!(matches!(err, Error::InvalidWebAssembly { .. }), "{err}");
    }

    #[test]
    fn warns_about_unreflected_items() {
        let module = compile(
            r#"(module
                (import "env" "log" (func (param i32)))
                (func (export "splat") (param v128) (result v128) local.get 0))"#,
        )
        .unwrap();

        let warnings = module.warnings();
        assert!(warnings.iter().any(|w| matches!(
            w,
            CompileWarning::UnsupportedImport {
                kind: ImportKind::Function,
                ..
            }
        )));
        assert!(warnings.iter().any(|w| matches!(
            w,
            CompileWarning::UnsupportedValueType {
                location: "parameter",
                ..
            }
        )));

        let sig = module.signature(FuncIndex::from_u32(1)).unwrap();
        assert_eq!(sig.params(), [ValueType::Void]);
    }

    #[test]
    fn multiple_memories() {
        let wat = r#"(module (memory 1) (memory 2))"#;
        // rejected unless the proposal is enabled
        assert!(compile(wat).is_err());

        let engine = Engine::new(&Config::default().multi_memory(true)).unwrap();
        let module = CompiledModule::from_bytes(&engine, &wat::parse_str(wat).unwrap()).unwrap();
        assert_eq!(
            module.warnings(),
            [CompileWarning::MultipleMemories { count: 2 }]
        );
    }

    #[test]
    fn function_names_from_name_section() {
        let module = compile(r#"(module (func $helper) (func $main (export "main")))"#).unwrap();
        let names = &module.translated().func_names;
        assert_eq!(names.get(&FuncIndex::from_u32(0)).map(String::as_str), Some("helper"));
        assert_eq!(names.get(&FuncIndex::from_u32(1)).map(String::as_str), Some("main"));
    }
}
