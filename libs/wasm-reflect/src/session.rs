// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use core::ops::Index;
use std::sync::Arc;

use wasmtime::{Store, StoreLimitsBuilder};

use crate::catalog::{FunctionCatalog, FunctionEntry};
use crate::code_layout::CodeLayout;
use crate::engine::Engine;
use crate::imports::{GlobalImport, ImportResolver, MemoryPlan};
use crate::indices::FuncIndex;
use crate::instance::{HostStore, Instance};
use crate::invoke::{self, Invocation};
use crate::memory::{MemoryView, MemoryViewMut};
use crate::module::CompiledModule;
use crate::timing::CallTimer;
use crate::types::ValueType;
use crate::values::Value;
use crate::{Error, WASM_PAGE_SIZE};

/// Where a [`Session`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The module is compiled; imports may be declared.
    Compiled,
    /// At least one kind of import has been declared.
    ImportsDeclared,
    /// The module is running; functions can be called.
    Instantiated,
    /// Instantiation failed. Nothing but inspecting the module is possible anymore.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Compiled => "compiled",
            SessionState::ImportsDeclared => "declaring imports",
            SessionState::Instantiated => "instantiated",
            SessionState::Failed => "failed",
        })
    }
}

/// One compiled module on its way to being a running, inspectable instance.
///
/// A session moves through [`SessionState`]s in one direction: compile, declare the memory and
/// global imports, instantiate, then list and call functions. Operations that don't fit the current
/// state return [`Error::InvalidState`].
pub struct Session {
    engine: Engine,
    module: CompiledModule,
    store: HostStore,
    resolver: ImportResolver,
    instance: Option<Instance>,
    catalog: FunctionCatalog,
    state: SessionState,
    timer: Arc<dyn CallTimer>,
}

impl Session {
    /// Compiles `bytes` and starts a session for the resulting module.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`CompiledModule::from_bytes`].
    #[tracing::instrument(level = "debug", skip_all, fields(len = bytes.len()))]
    pub fn compile(engine: &Engine, bytes: &[u8]) -> crate::Result<Self> {
        let module = CompiledModule::from_bytes(engine, bytes)?;
        Ok(Self::from_module(module))
    }

    /// Starts a session for an already compiled module.
    ///
    /// Each session gets its own store, so one module can back any number of sessions.
    pub fn from_module(module: CompiledModule) -> Self {
        let engine = module.engine().clone();

        let mut limits = StoreLimitsBuilder::new();
        if let Some(pages) = engine.config().max_memory_pages {
            let bytes = usize::try_from(pages.saturating_mul(WASM_PAGE_SIZE)).unwrap_or(usize::MAX);
            limits = limits.memory_size(bytes);
        }
        let mut store = Store::new(engine.wasmtime(), limits.build());
        store.limiter(|limits| limits);

        Self {
            timer: engine.timer(),
            engine,
            module,
            store,
            resolver: ImportResolver::default(),
            instance: None,
            catalog: FunctionCatalog::default(),
            state: SessionState::Compiled,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn module(&self) -> &CompiledModule {
        &self.module
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Creates the module's memory if it imports one, otherwise records the plan for its own.
    ///
    /// Returns `None` if the module has no memory at all. Calling this more than once returns
    /// the first result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] after instantiation and [`Error::Allocation`] if the
    /// memory cannot be created.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn new_memory_import(&mut self) -> crate::Result<Option<MemoryPlan>> {
        self.expect_declaring("declare a memory import")?;

        let cap = self.engine.config().max_memory_pages;
        let plan = self
            .resolver
            .declare_memory(&mut self.store, &self.module, cap)?;
        self.state = SessionState::ImportsDeclared;
        Ok(plan)
    }

    /// Creates a host cell for every global the module imports, seeded with zero.
    ///
    /// Calling this more than once changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] after instantiation and [`Error::Unsupported`] for globals
    /// with a type outside [`ValueType`].
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn new_global_import(&mut self) -> crate::Result<()> {
        self.expect_declaring("declare global imports")?;

        self.resolver.declare_globals(&mut self.store, &self.module)?;
        self.state = SessionState::ImportsDeclared;
        Ok(())
    }

    /// The memory resolved by [`Session::new_memory_import`], if any.
    pub fn memory_plan(&self) -> Option<MemoryPlan> {
        self.resolver.memory_plan()
    }

    /// The declared global imports in import order.
    pub fn global_imports(&self) -> &[GlobalImport] {
        self.resolver.globals()
    }

    /// Writes an imported global.
    ///
    /// The bits of `value` are reinterpreted as the global's declared type. Unknown names are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImmutableGlobal`] when writing an immutable global after instantiation.
    pub fn set_global_import(&mut self, name: &str, value: Value) -> crate::Result<()> {
        self.resolver.set_global(&mut self.store, name, value)
    }

    /// Reads an imported global, `(Void, Value::Void)` if there is none by that name.
    pub fn get_global_import(&mut self, name: &str) -> (ValueType, Value) {
        self.resolver.get_global(&mut self.store, name)
    }

    /// Binds the declared imports, runs the module's start function and catalogs its functions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the session is already instantiated or failed before.
    /// Any other error leaves the session [`SessionState::Failed`]: [`Error::MissingImport`] if an
    /// import was not declared, [`Error::Trap`] if the start function traps and [`Error::Link`] if
    /// the engine rejects the imports.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn instantiate(&mut self) -> crate::Result<()> {
        self.expect_declaring("instantiate")?;

        let instance = match Instance::new(&mut self.store, &self.module, &self.resolver) {
            Ok(instance) => instance,
            Err(err) => {
                tracing::debug!("instantiation failed: {err}");
                self.state = SessionState::Failed;
                return Err(err);
            }
        };
        self.resolver.mark_bound();

        let layout = CodeLayout::for_module(&self.module);
        self.catalog = FunctionCatalog::build(&self.module, &layout);

        self.instance = Some(instance);
        self.state = SessionState::Instantiated;
        Ok(())
    }

    /// A view of the instance's linear memory at its current size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInstantiated`] before instantiation and [`Error::NoMemory`] if the
    /// module has no memory.
    pub fn memory(&self) -> crate::Result<MemoryView<'_>> {
        let memory = self.instance()?.memory().ok_or(Error::NoMemory)?;
        Ok(MemoryView::new(memory.data(&self.store)))
    }

    /// A writable view of the instance's linear memory.
    ///
    /// # Errors
    ///
    /// See [`Session::memory`].
    pub fn memory_mut(&mut self) -> crate::Result<MemoryViewMut<'_>> {
        let memory = self.instance()?.memory().ok_or(Error::NoMemory)?;
        Ok(MemoryViewMut::new(memory.data_mut(&mut self.store)))
    }

    /// All compiled functions, empty before instantiation.
    pub fn functions(&self) -> &[FunctionEntry] {
        self.catalog.entries()
    }

    pub fn catalog(&self) -> &FunctionCatalog {
        &self.catalog
    }

    /// Looks up an exported function by name.
    pub fn function(&self, name: &str) -> Option<&FunctionEntry> {
        self.catalog.get(name)
    }

    pub fn function_by_index(&self, index: FuncIndex) -> Option<&FunctionEntry> {
        self.catalog.get_by_index(index)
    }

    /// Calls an exported function.
    ///
    /// A trap is not an error: it is reported through [`Invocation::success`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInstantiated`] without running any code if there is no instance and
    /// [`Error::NotExported`] if the function cannot be called from the host.
    pub fn invoke(&mut self, index: FuncIndex, args: &[Value]) -> crate::Result<Invocation> {
        let Some(instance) = &self.instance else {
            return Err(Error::NotInstantiated);
        };
        let entry = self
            .catalog
            .get_by_index(index)
            .ok_or(Error::NotExported { index })?;

        invoke::invoke(&mut self.store, instance, &*self.timer, entry, args)
    }

    /// Calls an exported function by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownExport`] if no function is exported under `name`, otherwise the
    /// errors of [`Session::invoke`].
    pub fn call(&mut self, name: &str, args: &[Value]) -> crate::Result<Invocation> {
        if self.instance.is_none() {
            return Err(Error::NotInstantiated);
        }
        let index = self
            .function(name)
            .ok_or_else(|| Error::UnknownExport {
                name: name.to_string(),
            })?
            .index();
        self.invoke(index, args)
    }

    /// Replaces the clock used to time invocations.
    pub fn set_call_timer(&mut self, timer: Arc<dyn CallTimer>) {
        self.timer = timer;
    }

    fn instance(&self) -> crate::Result<&Instance> {
        self.instance.as_ref().ok_or(Error::NotInstantiated)
    }

    fn expect_declaring(&self, operation: &'static str) -> crate::Result<()> {
        match self.state {
            SessionState::Compiled | SessionState::ImportsDeclared => Ok(()),
            state => Err(Error::InvalidState { operation, state }),
        }
    }
}

impl Index<&str> for Session {
    type Output = FunctionEntry;

    /// Returns the exported function named `name`.
    ///
    /// # Panics
    ///
    /// Panics if no function is exported under that name. Use [`Session::function`] for a
    /// fallible lookup.
    fn index(&self, name: &str) -> &Self::Output {
        match self.function(name) {
            Some(entry) => entry,
            None => panic!("no exported function named `{name}`"),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("module", &self.module)
            .field("state", &self.state)
            .field("functions", &self.catalog.len())
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}
