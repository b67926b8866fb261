// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use std::sync::Arc;

use wasmparser::WasmFeatures;

use crate::Error;
use crate::config::Config;
use crate::timing::{CallTimer, Disabled, WallClock};

/// Global context for compilation and execution.
///
/// An engine can be safely shared across threads and is a cheap cloneable
/// handle to the actual engine. The engine itself will be deallocated once all
/// references to it have gone away.
#[derive(Debug, Clone)]
pub struct Engine(Arc<EngineInner>);

struct EngineInner {
    inner: wasmtime::Engine,
    config: Config,
    features: WasmFeatures,
    timer: Arc<dyn CallTimer>,
}

impl fmt::Debug for EngineInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineInner")
            .field("config", &self.config)
            .field("features", &self.features)
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates a new engine from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] if the configuration is inconsistent or the engine cannot
    /// provide the requested features on this host.
    pub fn new(config: &Config) -> crate::Result<Self> {
        config.validate()?;

        let inner = wasmtime::Engine::new(&config.to_wasmtime())
            .map_err(|err| Error::Unsupported(format!("{err:#}")))?;

        let timer: Arc<dyn CallTimer> = if config.measure_calls {
            Arc::new(WallClock)
        } else {
            Arc::new(Disabled)
        };

        tracing::debug!(?config, "created engine");

        Ok(Self(Arc::new(EngineInner {
            inner,
            config: config.clone(),
            features: config.wasm_features(),
            timer,
        })))
    }

    pub fn same(lhs: &Engine, rhs: &Engine) -> bool {
        Arc::ptr_eq(&lhs.0, &rhs.0)
    }

    pub fn config(&self) -> &Config {
        &self.0.config
    }

    /// The proposals modules compiled by this engine may use.
    pub fn features(&self) -> WasmFeatures {
        self.0.features
    }

    pub(crate) fn wasmtime(&self) -> &wasmtime::Engine {
        &self.0.inner
    }

    /// The timer new sessions start out with.
    pub(crate) fn timer(&self) -> Arc<dyn CallTimer> {
        Arc::clone(&self.0.timer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_are_the_same_engine() {
        let engine = Engine::new(&Config::default()).unwrap();
        let other = engine.clone();
        assert!(Engine::same(&engine, &other));

        let third = Engine::new(&Config::default()).unwrap();
        assert!(!Engine::same(&engine, &third));
    }

    #[test]
    fn rejects_inconsistent_config() {
        let config = Config::default().bulk_memory(false);
        assert!(matches!(Engine::new(&config), Err(Error::Unsupported(_))));
    }

    #[test]
    fn features_follow_config() {
        let engine = Engine::new(&Config::default().simd(false)).unwrap();
        assert!(!engine.features().contains(WasmFeatures::SIMD));
        assert!(!engine.config().simd);
    }

    #[test]
    fn engine_and_validator_agree() {
        let engine = Engine::new(&Config::default()).unwrap();
        let cases = [
            // tail calls
            (r#"(module (func $f (return_call $f)))"#, false),
            // extended constant expressions
            (r#"(module (global i32 (i32.add (i32.const 1) (i32.const 2))))"#, false),
            // relaxed simd
            (
                r#"(module (func (param v128) (result v128)
                     local.get 0
                     i32x4.relaxed_trunc_f32x4_s))"#,
                false,
            ),
            // shared memories
            (r#"(module (memory 1 1 shared))"#, false),
            (
                r#"(module (func (param v128) (result v128)
                     local.get 0
                     i32x4.abs))"#,
                true,
            ),
            (r#"(module (global funcref (ref.null func)))"#, true),
        ];

        for (wat, valid) in cases {
            let bytes = wat::parse_str(wat).unwrap();
            let validator = wasmparser::Validator::new_with_features(engine.features())
                .validate_all(&bytes)
                .is_ok();
            let compiler = wasmtime::Module::validate(engine.wasmtime(), &bytes).is_ok();
            assert_eq!(validator, valid, "validator on {wat}");
            assert_eq!(compiler, valid, "engine on {wat}");
        }
    }
}
