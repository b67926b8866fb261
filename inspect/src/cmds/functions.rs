// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::path::PathBuf;

use clap::{Parser, ValueHint};

use crate::Options;
use crate::cmds::{declare, label};

#[derive(Debug, Parser)]
pub struct Cmd {
    /// The module to inspect, in binary or text format
    #[clap(value_hint = ValueHint::FilePath)]
    module: PathBuf,
}

impl Cmd {
    pub fn run(&self, opts: &Options) -> crate::Result<()> {
        let mut session = declare(opts, &self.module)?;
        session.instantiate()?;

        println!(
            "{:>5}  {:<24} {:<36} {:>10}",
            "index", "name", "signature", "code size"
        );
        for entry in session.functions() {
            println!(
                "{:>5}  {:<24} {:<36} {:>10}",
                entry.index().as_u32(),
                label(entry),
                entry.signature().to_string(),
                entry.code().len()
            );
        }

        tracing::info!(
            functions = session.functions().len(),
            exported = session.functions().iter().filter(|f| f.is_exported()).count(),
            "done"
        );

        Ok(())
    }
}
