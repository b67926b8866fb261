// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use hashbrown::HashMap;

use crate::code_layout::{CodeLayout, CodeRange};
use crate::indices::FuncIndex;
use crate::module::CompiledModule;
use crate::translate::EntityIndex;
use crate::types::{FuncSignature, ValueType};

/// Everything known about one compiled function.
#[derive(Debug, Clone)]
pub struct FunctionEntry {
    index: FuncIndex,
    name: Option<String>,
    debug_name: Option<String>,
    code: Box<[u8]>,
    code_range: CodeRange,
    signature: FuncSignature,
}

impl FunctionEntry {
    /// The function's index in the module's function index space.
    pub fn index(&self) -> FuncIndex {
        self.index
    }

    /// The name the function is exported under, `None` if it isn't exported.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_exported(&self) -> bool {
        self.name.is_some()
    }

    /// The function's name from the module's `name` section, if it has one.
    pub fn debug_name(&self) -> Option<&str> {
        self.debug_name.as_deref()
    }

    /// A copy of the machine code the engine generated for this function.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Where [`FunctionEntry::code`] came from inside the module's text section.
    pub fn code_range(&self) -> &CodeRange {
        &self.code_range
    }

    pub fn signature(&self) -> &FuncSignature {
        &self.signature
    }

    pub fn params(&self) -> &[ValueType] {
        self.signature.params()
    }

    pub fn results(&self) -> &[ValueType] {
        self.signature.results()
    }

    /// The first result type, [`ValueType::Void`] for functions without results.
    pub fn return_type(&self) -> ValueType {
        self.signature.return_type()
    }
}

/// The functions of an instantiated module, in code layout order.
#[derive(Debug, Default)]
pub struct FunctionCatalog {
    entries: Vec<FunctionEntry>,
    by_name: HashMap<String, usize>,
    by_index: HashMap<FuncIndex, usize>,
}

impl FunctionCatalog {
    /// Builds the catalog from a module's compiled code layout.
    ///
    /// Every function range in `layout` becomes an entry. Its export name and signature are
    /// looked up by function index. Functions exported under several names can be looked up by
    /// any of them.
    pub fn build(module: &CompiledModule, layout: &CodeLayout<'_>) -> Self {
        let translated = module.translated();

        let mut catalog = Self::default();
        for range in layout.functions() {
            let Some(index) = range.func_index() else {
                continue;
            };

            let entry = FunctionEntry {
                index,
                name: translated.export_name(index).map(ToString::to_string),
                debug_name: translated.func_names.get(&index).cloned(),
                code: layout.code(range).unwrap_or_default().into(),
                code_range: *range,
                signature: translated
                    .func_signature(index)
                    .cloned()
                    .unwrap_or_default(),
            };

            tracing::trace!(
                index = index.as_u32(),
                name = ?entry.name(),
                signature = %entry.signature,
                code_len = entry.code.len(),
                "cataloged function"
            );

            catalog.by_index.insert(index, catalog.entries.len());
            catalog.entries.push(entry);
        }

        for (name, entity) in &translated.exports {
            let EntityIndex::Function(index) = entity else {
                continue;
            };
            if let Some(pos) = catalog.by_index.get(index) {
                catalog.by_name.insert(name.clone(), *pos);
            }
        }

        tracing::debug!(
            functions = catalog.entries.len(),
            exported = catalog.by_name.len(),
            "built function catalog"
        );

        catalog
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &FunctionEntry> + '_ {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[FunctionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up an exported function by its export name.
    pub fn get(&self, name: &str) -> Option<&FunctionEntry> {
        self.entries.get(*self.by_name.get(name)?)
    }

    pub fn get_by_index(&self, index: FuncIndex) -> Option<&FunctionEntry> {
        self.entries.get(*self.by_index.get(&index)?)
    }
}

impl<'a> IntoIterator for &'a FunctionCatalog {
    type Item = &'a FunctionEntry;
    type IntoIter = core::slice::Iter<'a, FunctionEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
