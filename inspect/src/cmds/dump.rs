// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::path::PathBuf;

use clap::{Parser, ValueHint};
use color_eyre::eyre::bail;
use wasm_reflect::{CodeLayout, FunctionEntry};

use crate::Options;
use crate::cmds::{declare, label};

const BYTES_PER_LINE: usize = 16;

#[derive(Debug, Parser)]
pub struct Cmd {
    /// The module to inspect, in binary or text format
    #[clap(value_hint = ValueHint::FilePath)]
    module: PathBuf,
    /// Only dump the function with this export or debug name
    #[clap(short, long)]
    function: Option<String>,
}

impl Cmd {
    pub fn run(&self, opts: &Options) -> crate::Result<()> {
        let mut session = declare(opts, &self.module)?;
        session.instantiate()?;

        let layout = CodeLayout::for_module(session.module());
        tracing::debug!(
            base = format_args!("{:#x}", layout.base_address()),
            text_len = layout.text().len(),
            "text section"
        );

        let wanted = self.function.as_deref();
        // resolves every export alias, not just the one the entry is labeled with
        let exported = wanted
            .and_then(|name| session.function(name))
            .map(FunctionEntry::index);

        let mut dumped = 0;
        for entry in session.functions() {
            let selected = wanted.is_none_or(|name| {
                exported == Some(entry.index()) || entry.debug_name() == Some(name)
            });
            if !selected {
                continue;
            }
            dump(entry);
            dumped += 1;
        }

        match &self.function {
            Some(name) if dumped == 0 => bail!("no function named `{name}`"),
            _ => Ok(()),
        }
    }
}

fn dump(entry: &FunctionEntry) {
    let range = entry.code_range();
    println!(
        "function {} {}: {} ({} bytes at {:#x})",
        entry.index().as_u32(),
        label(entry),
        entry.signature(),
        entry.code().len(),
        range.normal_entry
    );

    for (line, chunk) in entry.code().chunks(BYTES_PER_LINE).enumerate() {
        let offset = range.normal_entry + line * BYTES_PER_LINE;
        let bytes: Vec<String> = chunk.iter().map(|byte| format!("{byte:02x}")).collect();
        println!("  {offset:08x}: {}", bytes.join(" "));
    }
    println!();
}
