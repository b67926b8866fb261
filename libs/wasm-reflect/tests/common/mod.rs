// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

#![allow(unused, reason = "not used by all tests")]

use std::sync::Once;

use tracing_subscriber::EnvFilter;
use wasm_reflect::{Config, Engine, Session};

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn engine() -> Engine {
    engine_with(&Config::default())
}

pub fn engine_with(config: &Config) -> Engine {
    init_tracing();
    Engine::new(config).unwrap()
}

pub fn session(engine: &Engine, wat: &str) -> Session {
    let bytes = wat::parse_str(wat).unwrap();
    Session::compile(engine, &bytes).unwrap()
}

/// Compiles, declares every import and instantiates.
pub fn instantiate(engine: &Engine, wat: &str) -> Session {
    let mut session = session(engine, wat);
    session.new_memory_import().unwrap();
    session.new_global_import().unwrap();
    session.instantiate().unwrap();
    session
}
