// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use wasmparser::WasmFeatures;

use crate::wasm_unsupported;

fn default_true() -> bool {
    true
}

/// Engine and session configuration.
///
/// Loaded from TOML with kebab-case keys, e.g.
///
/// ```toml
/// opt-level = "speed"
/// simd = false
/// max-memory-pages = 256
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "each flag maps to one engine feature"
)]
pub struct Config {
    /// How hard the compiler should try to optimize generated code.
    #[serde(default)]
    pub opt_level: OptLevel,
    /// Enable the multi-value proposal.
    #[serde(default = "default_true")]
    pub multi_value: bool,
    /// Enable the bulk memory proposal.
    #[serde(default = "default_true")]
    pub bulk_memory: bool,
    /// Enable the reference types proposal. Requires `bulk-memory`.
    #[serde(default = "default_true")]
    pub reference_types: bool,
    /// Enable 128-bit SIMD.
    #[serde(default = "default_true")]
    pub simd: bool,
    /// Enable 64-bit linear memories.
    #[serde(default)]
    pub memory64: bool,
    /// Allow more than one linear memory. Only the first one is reachable from the host.
    #[serde(default)]
    pub multi_memory: bool,
    /// Measure the wall-clock duration of every invocation.
    #[serde(default = "default_true")]
    pub measure_calls: bool,
    /// Caps the maximum size of every memory, in pages: declared maxima above it are lowered
    /// and memories without a maximum are bounded by it.
    #[serde(default)]
    pub max_memory_pages: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            opt_level: OptLevel::default(),
            multi_value: true,
            bulk_memory: true,
            reference_types: true,
            simd: true,
            memory64: false,
            multi_memory: false,
            measure_calls: true,
            max_memory_pages: None,
        }
    }
}

/// Optimization level of the compiler backend.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub enum OptLevel {
    /// No optimizations.
    None,
    /// Optimize for speed. This is the default.
    #[default]
    Speed,
    /// Optimize for speed and code size.
    SpeedAndSize,
}

impl Config {
    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid TOML, contains unknown keys or describes a
    /// combination of features the engine cannot provide.
    pub fn from_toml_str(str: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(str).context("failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails to parse, see [`Config::from_toml_str`].
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let str = fs::read_to_string(path).context("failed to read configuration file")?;
        Self::from_toml_str(&str).with_context(|| format!("in {}", path.display()))
    }

    /// Serializes the configuration back into TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string(self).context("failed to serialize configuration")
    }

    /// Checks that the enabled features are consistent with each other.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`](crate::Error::Unsupported) if a feature is enabled without
    /// one it depends on.
    pub fn validate(&self) -> crate::Result<()> {
        if self.reference_types && !self.bulk_memory {
            return Err(wasm_unsupported!(
                "reference types require bulk memory to be enabled"
            ));
        }
        if self.max_memory_pages == Some(0) {
            return Err(wasm_unsupported!("max-memory-pages must not be zero"));
        }
        Ok(())
    }

    #[must_use]
    pub fn opt_level(mut self, level: OptLevel) -> Self {
        self.opt_level = level;
        self
    }

    #[must_use]
    pub fn multi_value(mut self, enable: bool) -> Self {
        self.multi_value = enable;
        self
    }

    #[must_use]
    pub fn bulk_memory(mut self, enable: bool) -> Self {
        self.bulk_memory = enable;
        self
    }

    #[must_use]
    pub fn reference_types(mut self, enable: bool) -> Self {
        self.reference_types = enable;
        self
    }

    #[must_use]
    pub fn simd(mut self, enable: bool) -> Self {
        self.simd = enable;
        self
    }

    #[must_use]
    pub fn memory64(mut self, enable: bool) -> Self {
        self.memory64 = enable;
        self
    }

    #[must_use]
    pub fn multi_memory(mut self, enable: bool) -> Self {
        self.multi_memory = enable;
        self
    }

    #[must_use]
    pub fn measure_calls(mut self, enable: bool) -> Self {
        self.measure_calls = enable;
        self
    }

    #[must_use]
    pub fn max_memory_pages(mut self, pages: Option<u64>) -> Self {
        self.max_memory_pages = pages;
        self
    }

    /// The proposals the validator accepts.
    pub(crate) fn wasm_features(&self) -> WasmFeatures {
        let mut features = WasmFeatures::WASM1
            | WasmFeatures::MUTABLE_GLOBAL
            | WasmFeatures::SIGN_EXTENSION
            | WasmFeatures::SATURATING_FLOAT_TO_INT;

        features.set(WasmFeatures::MULTI_VALUE, self.multi_value);
        features.set(WasmFeatures::BULK_MEMORY, self.bulk_memory);
        features.set(WasmFeatures::REFERENCE_TYPES, self.reference_types);
        features.set(WasmFeatures::SIMD, self.simd);
        features.set(WasmFeatures::MEMORY64, self.memory64);
        features.set(WasmFeatures::MULTI_MEMORY, self.multi_memory);

        features
    }

    pub(crate) fn to_wasmtime(&self) -> wasmtime::Config {
        let mut cfg = wasmtime::Config::new();

        cfg.cranelift_opt_level(match self.opt_level {
            OptLevel::None => wasmtime::OptLevel::None,
            OptLevel::Speed => wasmtime::OptLevel::Speed,
            OptLevel::SpeedAndSize => wasmtime::OptLevel::SpeedAndSize,
        });

        cfg.wasm_multi_value(self.multi_value);
        cfg.wasm_bulk_memory(self.bulk_memory);
        cfg.wasm_simd(self.simd);
        cfg.wasm_memory64(self.memory64);
        cfg.wasm_multi_memory(self.multi_memory);
        cfg.wasm_reference_types(self.reference_types);

        // everything else the engine may turn on by default stays off, so that the engine
        // accepts exactly what `wasm_features` validates
        cfg.wasm_tail_call(false);
        cfg.wasm_extended_const(false);
        cfg.wasm_relaxed_simd(false);
        cfg.wasm_function_references(false);
        cfg.wasm_gc(false);
        cfg.wasm_threads(false);
        cfg.wasm_shared_everything_threads(false);
        cfg.wasm_wide_arithmetic(false);
        cfg.wasm_custom_page_sizes(false);
        cfg.wasm_exceptions(false);
        cfg.wasm_stack_switching(false);

        cfg
    }
}
