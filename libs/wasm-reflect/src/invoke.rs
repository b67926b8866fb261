// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::time::Duration;

use wasmtime::Val;

use crate::Error;
use crate::catalog::FunctionEntry;
use crate::instance::{HostStore, Instance};
use crate::timing::CallTimer;
use crate::values::Value;

/// The outcome of calling an exported function.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    success: bool,
    elapsed: Duration,
    results: Vec<Value>,
}

impl Invocation {
    /// Whether the call returned normally. A trap or rejected arguments make this `false`.
    pub fn success(&self) -> bool {
        self.success
    }

    /// How long the call took, measured around the call alone.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// [`Invocation::elapsed`] in nanoseconds, saturating at `u64::MAX`.
    pub fn elapsed_nanos(&self) -> u64 {
        u64::try_from(self.elapsed.as_nanos()).unwrap_or(u64::MAX)
    }

    /// The values the function returned, empty if the call failed.
    pub fn results(&self) -> &[Value] {
        &self.results
    }

    /// The first returned value, [`Value::Void`] if there is none.
    pub fn result(&self) -> Value {
        self.results.first().copied().unwrap_or_default()
    }
}

/// Calls the function described by `entry`.
///
/// Arguments are passed as given; [`Value::Void`] entries are dropped. The engine checks them
/// against the function's signature, and a mismatch is reported like a trap.
pub(crate) fn invoke(
    store: &mut HostStore,
    instance: &Instance,
    timer: &dyn CallTimer,
    entry: &FunctionEntry,
    args: &[Value],
) -> crate::Result<Invocation> {
    let func = instance
        .func(entry.index())
        .ok_or(Error::NotExported {
            index: entry.index(),
        })?;

    let params: Vec<Val> = args.iter().filter_map(|arg| arg.to_wasmtime()).collect();
    let mut results: Vec<Val> = func
        .ty(&*store)
        .results()
        .map(|ty| Val::default_for_ty(&ty).unwrap_or(Val::I32(0)))
        .collect();

    let mut outcome = Ok(());
    let elapsed = timer.measure(&mut || {
        outcome = func.call(&mut *store, &params, &mut results);
    });

    let invocation = match outcome {
        Ok(()) => Invocation {
            success: true,
            elapsed,
            results: results.iter().map(Value::from_wasmtime).collect(),
        },
        Err(err) => {
            tracing::debug!(
                index = entry.index().as_u32(),
                name = ?entry.name(),
                "call failed: {err:#}"
            );
            Invocation {
                success: false,
                elapsed,
                results: Vec::new(),
            }
        }
    };

    tracing::trace!(
        index = entry.index().as_u32(),
        success = invocation.success,
        elapsed_ns = invocation.elapsed_nanos(),
        "invoked function"
    );

    Ok(invocation)
}
