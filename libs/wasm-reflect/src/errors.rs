// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::indices::FuncIndex;
use crate::session::SessionState;
use crate::translate::ImportKind;
use core::fmt;

/// Convenience macro for creating an `Error::Unsupported` variant.
#[macro_export]
macro_rules! wasm_unsupported {
    ($($arg:tt)*) => { $crate::Error::Unsupported(::std::format!($($arg)*)) }
}

/// Error type for the crate
#[derive(Debug)]
pub enum Error {
    /// The input WebAssembly code is invalid.
    InvalidWebAssembly {
        /// A string describing the validation error.
        message: String,
        /// The bytecode offset where the error occurred.
        offset: usize,
    },
    /// Buffering the bytecode failed because no memory was available.
    ResourceExhausted,
    /// The engine failed to compile bytecode that passed validation.
    Compile {
        /// A human-readable description of the error.
        message: String,
    },
    /// A linear memory or global cell could not be created.
    Allocation {
        /// A human-readable description of the error.
        message: String,
    },
    /// The WebAssembly code used an unsupported feature.
    Unsupported(String),
    /// A required import was not provided.
    MissingImport {
        /// The module name of the import.
        module: String,
        /// The field name of the import.
        field: String,
        /// The kind of the import.
        kind: ImportKind,
    },
    /// The engine refused to link the provided imports.
    Link {
        /// A human-readable description of the error.
        message: String,
    },
    /// A WebAssembly trap occurred while running the module's start function.
    Trap {
        /// A human-readable description of the trap.
        message: String,
    },
    /// The operation requires a live instance.
    NotInstantiated,
    /// The function has no export and cannot be called from the host.
    NotExported {
        /// The index of the function.
        index: FuncIndex,
    },
    /// No exported function with the given name exists.
    UnknownExport {
        /// The requested export name.
        name: String,
    },
    /// The module has no linear memory that can be reached from the host.
    NoMemory,
    /// Attempted to write an immutable global after it was bound to an instance.
    ImmutableGlobal {
        /// The import field name of the global.
        name: String,
    },
    /// The operation is not valid in the session's current state.
    InvalidState {
        /// The operation that was attempted.
        operation: &'static str,
        /// The state the session was in.
        state: SessionState,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidWebAssembly { message, offset } => {
                f.write_fmt(format_args!("invalid WASM input at {offset}: {message}"))
            }
            Self::ResourceExhausted => f.write_str("out of memory while buffering bytecode"),
            Self::Compile { message } => {
                f.write_fmt(format_args!("failed to compile module: {message}"))
            }
            Self::Allocation { message } => {
                f.write_fmt(format_args!("failed to allocate import: {message}"))
            }
            Self::Unsupported(feature) => f.write_fmt(format_args!(
                "Feature used by the WebAssembly code is not supported: {feature}"
            )),
            Self::MissingImport {
                module,
                field,
                kind,
            } => f.write_fmt(format_args!(
                "Missing required import {module}::{field} ({kind})"
            )),
            Self::Link { message } => f.write_fmt(format_args!("failed to link module: {message}")),
            Self::Trap { message } => {
                f.write_fmt(format_args!("module initialization trapped: {message}"))
            }
            Self::NotInstantiated => f.write_str("module has not been instantiated"),
            Self::NotExported { index } => f.write_fmt(format_args!(
                "function {} is not exported",
                index.as_u32()
            )),
            Self::UnknownExport { name } => {
                f.write_fmt(format_args!("no exported function named `{name}`"))
            }
            Self::NoMemory => f.write_str("module has no linear memory"),
            Self::ImmutableGlobal { name } => f.write_fmt(format_args!(
                "global `{name}` is immutable and already bound to an instance"
            )),
            Self::InvalidState { operation, state } => f.write_fmt(format_args!(
                "cannot {operation} while the session is {state}"
            )),
        }
    }
}

impl From<wasmparser::BinaryReaderError> for Error {
    fn from(e: wasmparser::BinaryReaderError) -> Self {
        Self::InvalidWebAssembly {
            message: e.message().into(),
            offset: e.offset(),
        }
    }
}

impl core::error::Error for Error {}

/// Error for out of bounds [`MemoryView`](crate::MemoryView) access.
#[derive(Debug)]
#[non_exhaustive]
pub struct MemoryAccessError {
    // Keep struct internals private for future extensibility.
    _private: (),
}

impl MemoryAccessError {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

impl fmt::Display for MemoryAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "out of bounds memory access")
    }
}

impl core::error::Error for MemoryAccessError {}
