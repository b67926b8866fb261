// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod memory_export;
mod module_translator;

use core::fmt;

use cranelift_entity::PrimaryMap;
use hashbrown::HashMap;
pub use memory_export::{export_memory, reserved_name};
pub use module_translator::ModuleTranslator;
use wasmparser::collections::IndexMap;

use crate::indices::{FuncIndex, GlobalIndex, MemoryIndex, TableIndex, TypeIndex};
use crate::module::CompileWarning;
use crate::types::{FuncSignature, ValueType};

/// A translated WebAssembly module.
#[derive(Debug, Default)]
pub struct TranslatedModule {
    /// The name of this wasm module, if found,
    pub name: Option<String>,
    /// The function signatures declared in this module.
    pub types: PrimaryMap<TypeIndex, FuncSignature>,
    /// The signature index of every function, imported functions first.
    pub functions: PrimaryMap<FuncIndex, TypeIndex>,
    /// The memories declared in this module, imported memories first.
    pub memories: PrimaryMap<MemoryIndex, MemoryDesc>,
    /// The globals declared in this module, imported globals first.
    pub globals: PrimaryMap<GlobalIndex, GlobalDesc>,
    /// Imports in declaration order.
    pub imports: Vec<Import>,
    /// Exports by name, in declaration order.
    pub exports: IndexMap<String, EntityIndex>,
    /// Function names from the `name` custom section.
    pub func_names: HashMap<FuncIndex, String>,
    /// The start function of the module, if any.
    pub start: Option<FuncIndex>,

    pub num_imported_functions: u32,
    pub num_imported_memories: u32,
    pub num_imported_globals: u32,

    /// Non-fatal problems found while translating.
    pub warnings: Vec<CompileWarning>,
}

impl TranslatedModule {
    /// Test whether the given memory index is for an imported memory.
    #[inline]
    pub fn is_imported_memory(&self, index: MemoryIndex) -> bool {
        index.as_u32() < self.num_imported_memories
    }

    /// The signature of the given function, if it refers to a function type.
    pub fn func_signature(&self, index: FuncIndex) -> Option<&FuncSignature> {
        let ty = self.functions.get(index)?;
        self.types.get(*ty)
    }

    /// The export name of the given function, the first one if it is exported under several names.
    pub fn export_name(&self, index: FuncIndex) -> Option<&str> {
        self.exports.iter().find_map(|(name, entity)| match entity {
            EntityIndex::Function(i) if *i == index => Some(name.as_str()),
            _ => None,
        })
    }

    /// The first name the given memory is exported under.
    pub fn memory_export_name(&self, index: MemoryIndex) -> Option<&str> {
        self.exports.iter().find_map(|(name, entity)| match entity {
            EntityIndex::Memory(i) if *i == index => Some(name.as_str()),
            _ => None,
        })
    }

    /// The memory the host sees: the first imported memory, else the first defined one.
    pub fn primary_memory(&self) -> Option<(MemoryIndex, &MemoryDesc)> {
        self.memories.iter().next()
    }
}

/// A linear memory as declared by the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDesc {
    /// The minimum number of pages.
    pub minimum: u64,
    /// The maximum number of pages, if declared.
    pub maximum: Option<u64>,
    /// Whether this memory uses 64-bit indexes.
    pub memory64: bool,
    /// Whether this memory is shared between threads.
    pub shared: bool,
}

impl MemoryDesc {
    pub fn from_wasmparser(ty: wasmparser::MemoryType) -> Self {
        Self {
            minimum: ty.initial,
            maximum: ty.maximum,
            memory64: ty.memory64,
            shared: ty.shared,
        }
    }
}

/// A global as declared by the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalDesc {
    /// The reflected content type, [`ValueType::Void`] if the real type has no reflection.
    pub content_type: ValueType,
    /// Whether the global is mutable.
    pub mutable: bool,
}

/// An import the module declares.
#[derive(Debug, Clone)]
pub struct Import {
    /// Name of the imported module.
    pub module: String,
    /// Field name of the import.
    pub name: String,
    pub(crate) ty: EntityType,
}

impl Import {
    /// The signature index of a function import.
    pub(crate) fn func_type(&self) -> Option<TypeIndex> {
        match self.ty {
            EntityType::Function(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn kind(&self) -> ImportKind {
        match self.ty {
            EntityType::Function(_) => ImportKind::Function,
            EntityType::Table => ImportKind::Table,
            EntityType::Memory(_) => ImportKind::Memory,
            EntityType::Global(_) => ImportKind::Global,
        }
    }
}

/// What an import refers to, by its index in the module's own index spaces.
#[derive(Debug, Clone, Copy)]
pub(crate) enum EntityType {
    Function(TypeIndex),
    Table,
    Memory(MemoryIndex),
    Global(GlobalIndex),
}

/// The kind of an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportKind {
    Function,
    Table,
    Memory,
    Global,
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImportKind::Function => "function",
            ImportKind::Table => "table",
            ImportKind::Memory => "memory",
            ImportKind::Global => "global",
        })
    }
}

/// An index of an entity in one of the module's index spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityIndex {
    /// Function index.
    Function(FuncIndex),
    /// Table index.
    Table(TableIndex),
    /// Memory index.
    Memory(MemoryIndex),
    /// Global index.
    Global(GlobalIndex),
}
