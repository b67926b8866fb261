// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::mem;

use wasmparser::{
    BinaryReader, CompositeInnerType, ExportSectionReader, ExternalKind, FuncValidatorAllocations,
    FunctionBody, FunctionSectionReader, GlobalSectionReader, ImportSectionReader,
    MemorySectionReader, Name, NameSectionReader, Parser, Payload, TypeRef, TypeSectionReader,
    ValidPayload, Validator,
};

use crate::indices::{FuncIndex, GlobalIndex, MemoryIndex, TableIndex, TypeIndex};
use crate::module::CompileWarning;
use crate::translate::{
    EntityIndex, EntityType, GlobalDesc, Import, ImportKind, MemoryDesc, TranslatedModule,
};
use crate::types::{FuncSignature, ValueType};
use crate::wasm_unsupported;

/// A translator for converting the output of `wasmparser` into types used by this crate.
///
/// Validation happens in the same pass: every payload is fed through the validator before it is
/// translated, and function bodies are validated as they are encountered.
pub struct ModuleTranslator<'a> {
    result: TranslatedModule,
    validator: &'a mut Validator,
    allocs: FuncValidatorAllocations,
}

impl<'a> ModuleTranslator<'a> {
    /// Creates a new `ModuleTranslator` with the given `Validator`.
    pub fn new(validator: &'a mut Validator) -> Self {
        Self {
            validator,
            result: TranslatedModule::default(),
            allocs: FuncValidatorAllocations::default(),
        }
    }

    /// Validate and translate raw WASM bytes into a `TranslatedModule`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWebAssembly`](crate::Error::InvalidWebAssembly) if the bytes do not
    /// validate, and [`Error::Unsupported`](crate::Error::Unsupported) for proposals this crate
    /// does not reflect (exception handling).
    pub fn translate(mut self, data: &[u8]) -> crate::Result<TranslatedModule> {
        for payload in Parser::new(0).parse_all(data) {
            let payload = payload?;

            match self.validator.payload(&payload)? {
                ValidPayload::Func(func, body) => self.validate_function_body(func, &body)?,
                ValidPayload::Ok | ValidPayload::Parser(_) | ValidPayload::End(_) => {}
            }

            self.translate_payload(payload)?;
        }

        self.validator.reset();

        debug_assert!(self.result.functions.len() >= self.result.num_imported_functions as usize);
        debug_assert!(self.result.memories.len() >= self.result.num_imported_memories as usize);
        debug_assert!(self.result.globals.len() >= self.result.num_imported_globals as usize);

        tracing::debug!(
            types = self.result.types.len(),
            functions = self.result.functions.len(),
            imports = self.result.imports.len(),
            exports = self.result.exports.len(),
            "translated module"
        );

        Ok(self.result)
    }

    fn validate_function_body(
        &mut self,
        func: wasmparser::FuncToValidate<wasmparser::ValidatorResources>,
        body: &FunctionBody<'_>,
    ) -> crate::Result<()> {
        let mut validator = func.into_validator(mem::take(&mut self.allocs));
        validator.validate(body)?;
        self.allocs = validator.into_allocations();
        Ok(())
    }

    /// Translates a single payload (essentially a section) of a WASM module.
    fn translate_payload(&mut self, payload: Payload<'_>) -> crate::Result<()> {
        match payload {
            Payload::TypeSection(types) => self.translate_type_section(types)?,
            Payload::ImportSection(imports) => self.translate_import_section(imports)?,
            Payload::FunctionSection(functions) => self.translate_function_section(functions)?,
            Payload::MemorySection(memories) => self.translate_memory_section(memories)?,
            Payload::TagSection(_) => return Err(wasm_unsupported!("exception handling")),
            Payload::GlobalSection(globals) => self.translate_global_section(globals)?,
            Payload::ExportSection(exports) => self.translate_export_section(exports)?,
            Payload::StartSection { func, .. } => {
                self.result.start = Some(FuncIndex::from_u32(func));
            }
            Payload::CustomSection(section) if section.name() == "name" => {
                let reader =
                    NameSectionReader::new(BinaryReader::new(section.data(), section.data_offset()));
                // A broken name section is not a reason to reject the module.
                if let Err(err) = self.translate_name_section(reader) {
                    self.result
                        .warnings
                        .push(CompileWarning::MalformedNameSection {
                            message: err.to_string(),
                        });
                }
            }
            Payload::CustomSection(section) => {
                tracing::trace!("custom section {}", section.name());
            }
            // tables, elements, data and code carry nothing we reflect. The validator already
            // looked at them.
            _ => {}
        }
        Ok(())
    }

    fn translate_type_section(&mut self, types: TypeSectionReader<'_>) -> crate::Result<()> {
        for rec_group in types {
            for sub in rec_group?.into_types() {
                let signature = match &sub.composite_type.inner {
                    CompositeInnerType::Func(ty) => {
                        let index = self.result.types.next_key();
                        let params: Vec<_> = ty
                            .params()
                            .iter()
                            .map(|ty| self.convert_val_type(*ty, "parameter", index.as_u32()))
                            .collect();
                        let results: Vec<_> = ty
                            .results()
                            .iter()
                            .map(|ty| self.convert_val_type(*ty, "result", index.as_u32()))
                            .collect();
                        FuncSignature::new(params, results)
                    }
                    // Keep the index space dense; nothing can call through a non-function type.
                    _ => FuncSignature::default(),
                };
                self.result.types.push(signature);
            }
        }

        Ok(())
    }

    fn translate_import_section(&mut self, imports: ImportSectionReader<'_>) -> crate::Result<()> {
        self.result.imports.reserve_exact(imports.count() as usize);

        for import in imports {
            let import = import?;

            let ty = match import.ty {
                TypeRef::Func(index) => {
                    self.result.num_imported_functions += 1;

                    let signature = TypeIndex::from_u32(index);
                    self.result.functions.push(signature);
                    EntityType::Function(signature)
                }
                TypeRef::Table(_) => EntityType::Table,
                TypeRef::Memory(ty) => {
                    self.result.num_imported_memories += 1;

                    let index = self.result.memories.push(MemoryDesc::from_wasmparser(ty));
                    EntityType::Memory(index)
                }
                TypeRef::Global(ty) => {
                    self.result.num_imported_globals += 1;

                    let index = self.result.globals.next_key();
                    let content_type =
                        self.convert_val_type(ty.content_type, "global", index.as_u32());
                    self.result.globals.push(GlobalDesc {
                        content_type,
                        mutable: ty.mutable,
                    });
                    EntityType::Global(index)
                }
                _ => return Err(wasm_unsupported!("exception handling")),
            };

            let import = Import {
                module: import.module.to_string(),
                name: import.name.to_string(),
                ty,
            };

            if matches!(import.kind(), ImportKind::Function | ImportKind::Table) {
                self.result
                    .warnings
                    .push(CompileWarning::UnsupportedImport {
                        module: import.module.clone(),
                        name: import.name.clone(),
                        kind: import.kind(),
                    });
            }

            self.result.imports.push(import);
        }

        self.check_memory_count();

        Ok(())
    }

    fn translate_function_section(
        &mut self,
        functions: FunctionSectionReader<'_>,
    ) -> crate::Result<()> {
        self.result
            .functions
            .reserve_exact(functions.count() as usize);

        for index in functions {
            let signature = TypeIndex::from_u32(index?);
            self.result.functions.push(signature);
        }

        Ok(())
    }

    fn translate_memory_section(&mut self, memories: MemorySectionReader<'_>) -> crate::Result<()> {
        self.result.memories.reserve_exact(memories.count() as usize);

        for ty in memories {
            self.result.memories.push(MemoryDesc::from_wasmparser(ty?));
        }

        self.check_memory_count();

        Ok(())
    }

    fn translate_global_section(&mut self, globals: GlobalSectionReader<'_>) -> crate::Result<()> {
        self.result.globals.reserve_exact(globals.count() as usize);

        for global in globals {
            let global = global?;

            let index = self.result.globals.next_key();
            let content_type =
                self.convert_val_type(global.ty.content_type, "global", index.as_u32());
            self.result.globals.push(GlobalDesc {
                content_type,
                mutable: global.ty.mutable,
            });
        }

        Ok(())
    }

    fn translate_export_section(&mut self, exports: ExportSectionReader<'_>) -> crate::Result<()> {
        for export in exports {
            let export = export?;
            let index = match export.kind {
                ExternalKind::Func => EntityIndex::Function(FuncIndex::from_u32(export.index)),
                ExternalKind::Table => EntityIndex::Table(TableIndex::from_u32(export.index)),
                ExternalKind::Memory => EntityIndex::Memory(MemoryIndex::from_u32(export.index)),
                ExternalKind::Global => EntityIndex::Global(GlobalIndex::from_u32(export.index)),
                _ => return Err(wasm_unsupported!("exception handling")),
            };

            self.result.exports.insert(export.name.to_string(), index);
        }

        Ok(())
    }

    fn translate_name_section(&mut self, reader: NameSectionReader<'_>) -> crate::Result<()> {
        for subsection in reader {
            match subsection? {
                Name::Module { name, .. } => {
                    self.result.name = Some(name.to_string());
                }
                Name::Function(names) => {
                    for name in names {
                        let name = name?;

                        // Skip this naming if it's naming a function that
                        // doesn't actually exist.
                        if (name.index as usize) < self.result.functions.len() {
                            self.result
                                .func_names
                                .insert(FuncIndex::from_u32(name.index), name.name.to_string());
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Converts a value type, recording a warning if it has no reflection.
    fn convert_val_type(
        &mut self,
        ty: wasmparser::ValType,
        location: &'static str,
        index: u32,
    ) -> ValueType {
        ValueType::from_wasmparser(ty).unwrap_or_else(|| {
            self.result
                .warnings
                .push(CompileWarning::UnsupportedValueType {
                    location,
                    index,
                    ty: ty.to_string(),
                });
            ValueType::Void
        })
    }

    fn check_memory_count(&mut self) {
        let count = self.result.memories.len();
        let already_warned = self
            .result
            .warnings
            .iter()
            .any(|w| matches!(w, CompileWarning::MultipleMemories { .. }));

        if count > 1 && !already_warned {
            self.result
                .warnings
                .push(CompileWarning::MultipleMemories { count });
        }
    }
}
