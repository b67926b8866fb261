// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod cmds;
mod logger;

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueHint};
use color_eyre::eyre::eyre;
use wasm_reflect::{Config, Engine};

pub type Result<T> = color_eyre::Result<T>;

/// Helper for passing VERSION to opt.
/// If `CARGO_VERSION_INFO` is set, use it, otherwise use `CARGO_PKG_VERSION`.
fn version() -> &'static str {
    option_env!("CARGO_VERSION_INFO").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Compile WebAssembly modules and look at what the engine made of them.
#[derive(Debug, Parser)]
#[clap(version = version())]
struct Inspect {
    #[clap(subcommand)]
    cmd: Cmd,
    #[clap(flatten)]
    opts: Options,
}

#[derive(Debug, Parser)]
pub struct Options {
    /// Enables verbose logging
    #[clap(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Path to the engine configuration file, in TOML.
    #[clap(long, global = true, env = "WASM_INSPECT_CONFIG", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,
}

impl Options {
    /// Builds the engine described by `--config`, or the default one.
    pub fn engine(&self) -> crate::Result<Engine> {
        let config = match &self.config {
            Some(path) => Config::from_path(path).map_err(|err| eyre!("{err:#}"))?,
            None => Config::default(),
        };
        tracing::debug!(?config, "creating engine");

        Ok(Engine::new(&config)?)
    }
}

#[derive(Debug, Parser)]
enum Cmd {
    /// Lists every compiled function of a module
    Functions(cmds::functions::Cmd),
    /// Prints the machine code generated for each function
    Dump(cmds::dump::Cmd),
    /// Instantiates a module and calls one of its exported functions
    Invoke(cmds::invoke::Cmd),
}

fn main() -> crate::Result<()> {
    color_eyre::install()?;

    let inspect = Inspect::parse();
    logger::init(inspect.opts.verbose);

    match &inspect.cmd {
        Cmd::Functions(cmd) => cmd.run(&inspect.opts),
        Cmd::Dump(cmd) => cmd.run(&inspect.opts),
        Cmd::Invoke(cmd) => cmd.run(&inspect.opts),
    }
}
