// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use hashbrown::HashMap;
use wasmtime::{Extern, Func, Memory, Store, StoreLimits};

use crate::Error;
use crate::imports::ImportResolver;
use crate::indices::FuncIndex;
use crate::module::CompiledModule;
use crate::translate::{EntityIndex, EntityType};

/// The engine store every session owns. Its data is the resource limiter that enforces the
/// configured memory cap.
pub(crate) type HostStore = Store<StoreLimits>;

/// A module bound to its imports.
#[derive(Debug)]
pub(crate) struct Instance {
    funcs: HashMap<FuncIndex, Func>,
    memory: Option<Memory>,
}

impl Instance {
    /// Binds the resolved imports to the module and runs its initialization.
    ///
    /// Imports are matched to the module's import table by position: the memory import gets the
    /// resolver's memory and the `n`th global import gets the `n`th global cell.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingImport`] if the resolver has nothing for an import.
    /// - [`Error::Trap`] if the start function traps.
    /// - [`Error::Link`] if the engine refuses the imports for any other reason.
    pub fn new(
        store: &mut HostStore,
        module: &CompiledModule,
        resolver: &ImportResolver,
    ) -> crate::Result<Self> {
        let translated = module.translated();

        let mut externs = Vec::with_capacity(translated.imports.len());
        let mut next_global = 0;
        for import in &translated.imports {
            let resolved: Option<Extern> = match import.ty {
                EntityType::Memory(index) if index.as_u32() == 0 => {
                    resolver.imported_memory().map(Extern::from)
                }
                EntityType::Global(_) => {
                    let cell = resolver.global_cell(next_global);
                    next_global += 1;
                    cell.map(Extern::from)
                }
                EntityType::Memory(_) | EntityType::Function(_) | EntityType::Table => None,
            };

            let Some(resolved) = resolved else {
                return Err(Error::MissingImport {
                    module: import.module.clone(),
                    field: import.name.clone(),
                    kind: import.kind(),
                });
            };
            externs.push(resolved);
        }

        tracing::debug!("Instantiating module with {} imports...", externs.len());
        let instance = wasmtime::Instance::new(&mut *store, module.wasmtime_module(), &externs)
            .map_err(|err| match err.downcast_ref::<wasmtime::Trap>() {
                Some(trap) => Error::Trap {
                    message: trap.to_string(),
                },
                None => Error::Link {
                    message: format!("{err:#}"),
                },
            })?;

        let mut funcs = HashMap::new();
        for (name, index) in &translated.exports {
            if let EntityIndex::Function(index) = index {
                if let Some(func) = instance.get_func(&mut *store, name) {
                    funcs.insert(*index, func);
                }
            }
        }

        let memory = match resolver.imported_memory() {
            Some(memory) => Some(memory),
            None => module
                .memory_export()
                .and_then(|name| instance.get_memory(&mut *store, name)),
        };

        tracing::debug!(
            exported_functions = funcs.len(),
            has_memory = memory.is_some(),
            "instantiated module"
        );

        Ok(Self { funcs, memory })
    }

    /// The handle of an exported function.
    pub fn func(&self, index: FuncIndex) -> Option<Func> {
        self.funcs.get(&index).copied()
    }

    /// The memory the host can see: the imported one, or else the module's own memory.
    pub fn memory(&self) -> Option<Memory> {
        self.memory
    }
}
