// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

pub mod dump;
pub mod functions;
pub mod invoke;

use std::path::Path;

use color_eyre::eyre::Context;
use wasm_reflect::{FunctionEntry, Session};

use crate::Options;

/// Compiles the module at `path` and declares its memory and global imports.
///
/// Text-format modules are accepted as well as binaries.
pub fn declare(opts: &Options, path: &Path) -> crate::Result<Session> {
    let engine = opts.engine()?;
    let bytes =
        wat::parse_file(path).with_context(|| format!("failed to read `{}`", path.display()))?;

    let mut session = Session::compile(&engine, &bytes)
        .with_context(|| format!("failed to compile `{}`", path.display()))?;

    if let Some(plan) = session.new_memory_import()? {
        tracing::debug!(?plan, "resolved memory");
    }
    session.new_global_import()?;

    Ok(session)
}

/// The name to show for a function: its export name, else its debug name in parentheses.
pub fn label(entry: &FunctionEntry) -> String {
    match (entry.name(), entry.debug_name()) {
        (Some(name), _) => name.to_string(),
        (None, Some(debug_name)) => format!("({debug_name})"),
        (None, None) => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::{fs, process};

    use super::*;

    #[derive(Clone, Default)]
    struct Logs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Logs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn warnings_are_logged_once() {
        let path = std::env::temp_dir().join(format!("wasm-inspect-{}.wat", process::id()));
        fs::write(
            &path,
            r#"(module (import "env" "log" (func)) (func (export "f")))"#,
        )
        .unwrap();

        let logs = Logs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer({
                let logs = logs.clone();
                move || logs.clone()
            })
            .finish();
        let opts = Options {
            verbose: 0,
            config: None,
        };
        let session = tracing::subscriber::with_default(subscriber, || declare(&opts, &path));
        fs::remove_file(&path).unwrap();

        assert_eq!(session.unwrap().module().warnings().len(), 1);
        let logs = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(logs.matches("env::log cannot be provided").count(), 1, "{logs}");
    }
}
