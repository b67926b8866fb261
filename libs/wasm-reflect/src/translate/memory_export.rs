// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Makes a module's own linear memory reachable from the host.
//!
//! The engine only hands out memories that are imported or exported. For modules that define a
//! memory without exporting it, the binary is re-emitted with one extra export of memory `0`.
//! Every other section is copied byte for byte, so function bodies and their compiled code are
//! unaffected.

use wasm_encoder::{ExportKind, ExportSection, RawSection};
use wasmparser::{ExternalKind, Parser, Payload};

use crate::translate::TranslatedModule;

/// Name of the added export. Extended with underscores if the module already uses it.
const MEMORY_EXPORT: &str = "__wasm_reflect_memory";

/// Section ids that must come after the export section.
const AFTER_EXPORTS: [u8; 5] = [
    8,  // start
    9,  // element
    12, // data count
    10, // code
    11, // data
];

/// Picks an export name for memory `0` that does not clash with any of the module's exports.
pub fn reserved_name(translated: &TranslatedModule) -> String {
    let mut name = MEMORY_EXPORT.to_string();
    while translated.exports.contains_key(&name) {
        name.push('_');
    }
    name
}

/// Re-emits `bytes` with an additional export of memory `0` under `name`.
///
/// The module is expected to be valid already.
pub fn export_memory(bytes: &[u8], name: &str) -> crate::Result<Vec<u8>> {
    let mut module = wasm_encoder::Module::new();
    let mut exported = false;

    for payload in Parser::new(0).parse_all(bytes) {
        let payload = payload?;

        if let Payload::ExportSection(reader) = &payload {
            let mut exports = ExportSection::new();
            for export in reader.clone() {
                let export = export?;
                exports.export(export.name, convert_kind(export.kind), export.index);
            }
            exports.export(name, ExportKind::Memory, 0);
            module.section(&exports);
            exported = true;
            continue;
        }

        let Some((id, range)) = payload.as_section() else {
            continue;
        };
        if !exported && AFTER_EXPORTS.contains(&id) {
            module.section(&memory_only(name));
            exported = true;
        }
        module.section(&RawSection {
            id,
            data: &bytes[range],
        });
    }

    if !exported {
        module.section(&memory_only(name));
    }

    tracing::trace!(name, "exported module-defined memory");
    Ok(module.finish())
}

fn memory_only(name: &str) -> ExportSection {
    let mut exports = ExportSection::new();
    exports.export(name, ExportKind::Memory, 0);
    exports
}

fn convert_kind(kind: ExternalKind) -> ExportKind {
    match kind {
        ExternalKind::Func => ExportKind::Func,
        ExternalKind::Table => ExportKind::Table,
        ExternalKind::Memory => ExportKind::Memory,
        ExternalKind::Global => ExportKind::Global,
        ExternalKind::Tag => ExportKind::Tag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmparser::{Validator, WasmFeatures};

    fn exports(bytes: &[u8]) -> Vec<(String, ExternalKind, u32)> {
        let mut out = Vec::new();
        for payload in Parser::new(0).parse_all(bytes) {
            if let Payload::ExportSection(reader) = payload.unwrap() {
                for export in reader {
                    let export = export.unwrap();
                    out.push((export.name.to_string(), export.kind, export.index));
                }
            }
        }
        out
    }

    fn validate(bytes: &[u8]) {
        Validator::new_with_features(WasmFeatures::default())
            .validate_all(bytes)
            .unwrap();
    }

    #[test]
    fn adds_an_export_section() {
        let bytes = wat::parse_str(
            r#"
            (module
              (memory 1 2)
              (func $f i32.const 0 i32.load drop)
              (start $f)
              (data (i32.const 0) "abc"))
            "#,
        )
        .unwrap();

        let out = export_memory(&bytes, MEMORY_EXPORT).unwrap();
        validate(&out);
        assert_eq!(
            exports(&out),
            [(MEMORY_EXPORT.to_string(), ExternalKind::Memory, 0)]
        );
    }

    #[test]
    fn extends_the_existing_exports() {
        let bytes = wat::parse_str(
            r#"
            (module
              (memory 1)
              (global (export "g") i32 (i32.const 1))
              (func (export "f") (export "f2")))
            "#,
        )
        .unwrap();

        let out = export_memory(&bytes, "mem").unwrap();
        validate(&out);
        assert_eq!(
            exports(&out),
            [
                ("g".to_string(), ExternalKind::Global, 0),
                ("f".to_string(), ExternalKind::Func, 0),
                ("f2".to_string(), ExternalKind::Func, 0),
                ("mem".to_string(), ExternalKind::Memory, 0),
            ]
        );
    }

    #[test]
    fn keeps_custom_sections() {
        let bytes = wat::parse_str(r#"(module $named (memory 1) (func $body))"#).unwrap();

        let out = export_memory(&bytes, MEMORY_EXPORT).unwrap();
        validate(&out);

        let customs: Vec<String> = Parser::new(0)
            .parse_all(&out)
            .filter_map(|payload| match payload.unwrap() {
                Payload::CustomSection(section) => Some(section.name().to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(customs, ["name"]);
    }
}
