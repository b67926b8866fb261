// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::path::PathBuf;

use clap::{Parser, ValueHint};
use color_eyre::Help;
use color_eyre::eyre::{Context, bail, eyre};
use wasm_reflect::{GlobalImport, Value, ValueType};

use crate::Options;
use crate::cmds::declare;

#[derive(Debug, Parser)]
pub struct Cmd {
    /// The module to run, in binary or text format
    #[clap(value_hint = ValueHint::FilePath)]
    module: PathBuf,
    /// The name of the exported function to call
    export: String,
    /// Arguments, parsed according to the function's parameter types
    #[clap(allow_hyphen_values = true)]
    args: Vec<String>,
    /// Sets an imported global before instantiating, as NAME=VALUE.
    ///
    /// The value is parsed according to the global's declared type.
    #[clap(long = "global", value_parser = parse_assignment)]
    globals: Vec<(String, String)>,
}

impl Cmd {
    pub fn run(&self, opts: &Options) -> crate::Result<()> {
        let mut session = declare(opts, &self.module)?;

        for (name, raw) in &self.globals {
            let Some(ty) = session
                .global_imports()
                .iter()
                .find(|global| global.name() == name)
                .map(GlobalImport::ty)
            else {
                bail!("module imports no global named `{name}`");
            };
            let value = parse_value(ty, raw).with_context(|| format!("invalid value for `{name}`"))?;
            session.set_global_import(name, value)?;
        }

        session.instantiate()?;

        let entry = session
            .function(&self.export)
            .ok_or_else(|| eyre!("module exports no function named `{}`", self.export))?;

        if entry.params().len() != self.args.len() {
            return Err(eyre!(
                "`{}` takes {} arguments but {} were given",
                self.export,
                entry.params().len(),
                self.args.len()
            ))
            .with_note(|| format!("signature: {}", entry.signature()));
        }

        let args = entry
            .params()
            .iter()
            .zip(&self.args)
            .enumerate()
            .map(|(i, (ty, raw))| {
                parse_value(*ty, raw).with_context(|| format!("invalid argument #{i}"))
            })
            .collect::<crate::Result<Vec<_>>>()?;
        let index = entry.index();

        let invocation = session.invoke(index, &args)?;
        if !invocation.success() {
            bail!(
                "`{}` trapped after {} ns",
                self.export,
                invocation.elapsed_nanos()
            );
        }

        for value in invocation.results() {
            println!("{value}");
        }
        println!("elapsed: {} ns", invocation.elapsed_nanos());

        Ok(())
    }
}

/// Parses `raw` as a value of type `ty`.
///
/// Integers that only fit the unsigned range are accepted and keep their bits.
fn parse_value(ty: ValueType, raw: &str) -> crate::Result<Value> {
    let value = match ty {
        ValueType::I32 => match raw.parse::<i32>() {
            Ok(v) => Value::I32(v),
            Err(_) => Value::I32(raw.parse::<u32>()?.cast_signed()),
        },
        ValueType::I64 => match raw.parse::<i64>() {
            Ok(v) => Value::I64(v),
            Err(_) => Value::from_u64(raw.parse::<u64>()?),
        },
        ValueType::F32 => Value::F32(raw.parse()?),
        ValueType::F64 => Value::F64(raw.parse()?),
        ValueType::Void => bail!("cannot pass a value of type {ty}"),
    };
    Ok(value)
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))?;
    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers() {
        assert_eq!(parse_value(ValueType::I32, "-5").unwrap(), Value::I32(-5));
        assert_eq!(
            parse_value(ValueType::I32, "4294967295").unwrap(),
            Value::I32(-1)
        );
        assert_eq!(
            parse_value(ValueType::I64, "18446744073709551615")
                .unwrap()
                .as_u64(),
            Some(u64::MAX)
        );
        assert!(parse_value(ValueType::I32, "4294967296").is_err());
        assert!(parse_value(ValueType::I64, "abc").is_err());
    }

    #[test]
    fn floats() {
        let v = parse_value(ValueType::F64, "1.5").unwrap();
        assert_eq!(v.unwrap_f64().to_bits(), 1.5f64.to_bits());
        let v = parse_value(ValueType::F32, "-0").unwrap();
        assert_eq!(v.unwrap_f32().to_bits(), 0x8000_0000);
    }

    #[test]
    fn void_is_rejected() {
        assert!(parse_value(ValueType::Void, "0").is_err());
    }

    #[test]
    fn assignments() {
        assert_eq!(
            parse_assignment("counter=7").unwrap(),
            ("counter".to_string(), "7".to_string())
        );
        assert_eq!(
            parse_assignment("x=a=b").unwrap(),
            ("x".to_string(), "a=b".to_string())
        );
        assert!(parse_assignment("counter").is_err());
    }
}
