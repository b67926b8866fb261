// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use hashbrown::HashMap;
use wasmtime::{ExternType, Global, Memory, MemoryType, Val};

use crate::indices::GlobalIndex;
use crate::instance::HostStore;
use crate::module::CompiledModule;
use crate::translate::EntityType;
use crate::types::ValueType;
use crate::values::Value;
use crate::{Error, wasm_unsupported};

/// The linear memory a session resolved for its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryPlan {
    /// Initial size in pages.
    pub minimum: u64,
    /// Maximum size in pages: the declared maximum, lowered to the configured cap if there is one.
    pub maximum: Option<u64>,
    /// Whether the memory uses 64-bit indexes.
    pub memory64: bool,
    /// Whether the memory is created by the host (imported) or by the module itself (defined).
    pub imported: bool,
}

#[derive(Debug)]
enum MemoryBacking {
    /// The module has no memory.
    None,
    /// The host created the memory; it is bound when instantiating.
    Imported { memory: Memory, plan: MemoryPlan },
    /// The module defines its memory; it is reachable through an export after instantiating.
    Defined(MemoryPlan),
}

impl MemoryBacking {
    fn plan(&self) -> Option<MemoryPlan> {
        match self {
            MemoryBacking::None => None,
            MemoryBacking::Imported { plan, .. } | MemoryBacking::Defined(plan) => Some(*plan),
        }
    }
}

/// A global imported by the module and backed by a host-side cell.
#[derive(Debug, Clone)]
pub struct GlobalImport {
    module: String,
    name: String,
    ty: ValueType,
    mutable: bool,
    cell: Global,
}

impl GlobalImport {
    /// The module name of the import.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The field name of the import, the key used by `set_global_import`/`get_global_import`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> ValueType {
        self.ty
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }
}

#[derive(Debug, Default)]
struct GlobalImports {
    /// In import order, which is the order the engine expects them in.
    entries: Vec<GlobalImport>,
    by_name: HashMap<String, usize>,
}

/// Materializes a module's memory and global imports before it is instantiated.
#[derive(Debug, Default)]
pub(crate) struct ImportResolver {
    memory: Option<MemoryBacking>,
    globals: Option<GlobalImports>,
    bound: bool,
}

impl ImportResolver {
    /// Resolves the module's memory, creating it if the module imports it.
    ///
    /// The memory is sized by the declared limits. `cap` lowers the maximum for memories that
    /// declare none or a larger one. Calling this again returns the first result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if the memory cannot be created or needs more pages than
    /// `cap` allows, and [`Error::Unsupported`] for shared memories.
    pub fn declare_memory(
        &mut self,
        store: &mut HostStore,
        module: &CompiledModule,
        cap: Option<u64>,
    ) -> crate::Result<Option<MemoryPlan>> {
        if let Some(backing) = &self.memory {
            return Ok(backing.plan());
        }

        let translated = module.translated();
        let Some((index, desc)) = translated.primary_memory() else {
            tracing::debug!("module has no memory");
            self.memory = Some(MemoryBacking::None);
            return Ok(None);
        };

        let maximum = match (desc.maximum, cap) {
            (Some(max), Some(cap)) => Some(max.min(cap)),
            (max, cap) => max.or(cap),
        };
        if let Some(max) = maximum.filter(|max| desc.minimum > *max) {
            return Err(Error::Allocation {
                message: format!(
                    "memory needs {} pages but may only have {max}",
                    desc.minimum
                ),
            });
        }

        let plan = MemoryPlan {
            minimum: desc.minimum,
            maximum,
            memory64: desc.memory64,
            imported: translated.is_imported_memory(index),
        };

        let backing = if plan.imported {
            if desc.shared {
                return Err(wasm_unsupported!("shared memories"));
            }

            let ty = memory_type(&plan)?;
            let memory = Memory::new(&mut *store, ty).map_err(|err| Error::Allocation {
                message: format!("{err:#}"),
            })?;
            tracing::debug!(?plan, "created memory import");
            MemoryBacking::Imported { memory, plan }
        } else {
            tracing::debug!(?plan, "module defines its own memory");
            MemoryBacking::Defined(plan)
        };

        self.memory = Some(backing);
        Ok(Some(plan))
    }

    /// Creates a host cell for every imported global, seeded with the zero value of its type.
    ///
    /// Globals whose type has no [`ValueType`] (references, `v128`) get the engine's default value
    /// and are recorded as [`ValueType::Void`]: they read as `Void` and writes to them are ignored.
    ///
    /// Calling this again does nothing. If any cell cannot be created no global is recorded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] for globals whose type has no default value and
    /// [`Error::Allocation`] if the engine cannot create a cell.
    pub fn declare_globals(
        &mut self,
        store: &mut HostStore,
        module: &CompiledModule,
    ) -> crate::Result<()> {
        if self.globals.is_some() {
            return Ok(());
        }

        let translated = module.translated();
        let mut globals = GlobalImports::default();

        // the engine lists imports in the same order, so global imports pair up by position
        let mut engine_types = module
            .wasmtime_module()
            .imports()
            .filter_map(|import| match import.ty() {
                ExternType::Global(ty) => Some(ty),
                _ => None,
            });

        // imported globals come first in the global index space, so a running count of global
        // imports is the index of each one's descriptor
        let mut next_global = 0;
        for import in &translated.imports {
            let EntityType::Global(index) = import.ty else {
                continue;
            };
            debug_assert_eq!(index, GlobalIndex::from_u32(next_global));
            let desc = translated.globals[GlobalIndex::from_u32(next_global)];
            next_global += 1;

            let Some(ty) = engine_types.next() else {
                return Err(Error::Link {
                    message: format!(
                        "global import {}::{} is missing from the compiled module",
                        import.module, import.name
                    ),
                });
            };
            let seed = Value::zero(desc.content_type)
                .to_wasmtime()
                .or_else(|| Val::default_for_ty(ty.content()));
            let Some(seed) = seed else {
                return Err(wasm_unsupported!(
                    "global import {}::{} has a type without a default value",
                    import.module,
                    import.name
                ));
            };

            let cell = Global::new(&mut *store, ty, seed).map_err(|err| Error::Allocation {
                message: format!("{err:#}"),
            })?;

            tracing::debug!(
                module = %import.module,
                name = %import.name,
                ty = %desc.content_type,
                mutable = desc.mutable,
                "created global import"
            );

            globals
                .by_name
                .insert(import.name.clone(), globals.entries.len());
            globals.entries.push(GlobalImport {
                module: import.module.clone(),
                name: import.name.clone(),
                ty: desc.content_type,
                mutable: desc.mutable,
                cell,
            });
        }

        self.globals = Some(globals);
        Ok(())
    }

    /// Writes a global by name.
    ///
    /// The bits of `value` are reinterpreted as the global's own type, whatever tag `value`
    /// carries. Names that don't belong to an imported global are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImmutableGlobal`] when writing an immutable global that is already bound to
    /// an instance.
    pub fn set_global(
        &mut self,
        store: &mut HostStore,
        name: &str,
        value: Value,
    ) -> crate::Result<()> {
        let bound = self.bound;
        let Some(entry) = self.entry_mut(name) else {
            tracing::debug!(name, "ignoring write to unknown global");
            return Ok(());
        };

        let value = Value::from_bits(entry.ty, value.to_bits());
        let Some(val) = value.to_wasmtime() else {
            return Ok(());
        };

        if entry.mutable {
            entry
                .cell
                .set(&mut *store, val)
                .map_err(|err| Error::Link {
                    message: format!("{err:#}"),
                })?;
        } else if bound {
            return Err(Error::ImmutableGlobal {
                name: name.to_string(),
            });
        } else {
            // not bound to anything yet, so swap in a fresh cell with the new value
            let ty = entry.cell.ty(&*store);
            entry.cell = Global::new(&mut *store, ty, val).map_err(|err| Error::Allocation {
                message: format!("{err:#}"),
            })?;
        }

        tracing::trace!(name, %value, "set global");
        Ok(())
    }

    /// Reads a global by name, returning `(Void, Value::Void)` for unknown names.
    pub fn get_global(&self, store: &mut HostStore, name: &str) -> (ValueType, Value) {
        match self.entry(name) {
            Some(entry) => (entry.ty, Value::from_wasmtime(&entry.cell.get(&mut *store))),
            None => (ValueType::Void, Value::Void),
        }
    }

    /// The imported globals in import order.
    pub fn globals(&self) -> &[GlobalImport] {
        self.globals
            .as_ref()
            .map_or(&[], |globals| globals.entries.as_slice())
    }

    pub fn memory_plan(&self) -> Option<MemoryPlan> {
        self.memory.as_ref().and_then(MemoryBacking::plan)
    }

    /// The host-created memory, if the module imports one.
    pub fn imported_memory(&self) -> Option<Memory> {
        match &self.memory {
            Some(MemoryBacking::Imported { memory, .. }) => Some(*memory),
            _ => None,
        }
    }

    /// The cell backing the `n`th global import.
    pub fn global_cell(&self, n: usize) -> Option<Global> {
        self.globals().get(n).map(|entry| entry.cell)
    }

    /// Records that the cells are now bound to an instance.
    pub fn mark_bound(&mut self) {
        self.bound = true;
    }

    fn entry(&self, name: &str) -> Option<&GlobalImport> {
        let globals = self.globals.as_ref()?;
        globals.entries.get(*globals.by_name.get(name)?)
    }

    fn entry_mut(&mut self, name: &str) -> Option<&mut GlobalImport> {
        let globals = self.globals.as_mut()?;
        let pos = *globals.by_name.get(name)?;
        globals.entries.get_mut(pos)
    }
}

fn memory_type(plan: &MemoryPlan) -> crate::Result<MemoryType> {
    if plan.memory64 {
        return Ok(MemoryType::new64(plan.minimum, plan.maximum));
    }

    let too_large = |_| Error::Allocation {
        message: "32-bit memory limits out of range".to_string(),
    };
    let minimum = u32::try_from(plan.minimum).map_err(too_large)?;
    let maximum = plan
        .maximum
        .map(u32::try_from)
        .transpose()
        .map_err(too_large)?;
    Ok(MemoryType::new(minimum, maximum))
}
