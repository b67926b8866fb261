// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::ops::Range;

use crate::indices::FuncIndex;
use crate::module::CompiledModule;

/// What a [`CodeRange`] contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRangeKind {
    /// The body of a defined WebAssembly function.
    Function(FuncIndex),
    /// Anything else the engine placed in the text section: trampolines, padding, constants.
    Other,
}

/// A range of machine code inside a module's text section, as offsets from its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeRange {
    pub kind: CodeRangeKind,
    /// Offset of the first byte of the range.
    pub begin: usize,
    /// Offset at which regular calls enter the code. Equal to `begin` unless the range starts with
    /// a prologue that is only reachable some other way.
    pub normal_entry: usize,
    /// Offset one past the last byte of the range.
    pub end: usize,
}

impl CodeRange {
    pub fn is_function(&self) -> bool {
        matches!(self.kind, CodeRangeKind::Function(_))
    }

    pub fn func_index(&self) -> Option<FuncIndex> {
        match self.kind {
            CodeRangeKind::Function(index) => Some(index),
            CodeRangeKind::Other => None,
        }
    }

    /// The span of code reached through the normal entry.
    pub fn entry_range(&self) -> Range<usize> {
        self.normal_entry..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.normal_entry
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The layout of a compiled module's text section.
///
/// Ranges are sorted by offset and together cover the whole text section without overlap.
#[derive(Debug, Clone)]
pub struct CodeLayout<'a> {
    text: &'a [u8],
    ranges: Vec<CodeRange>,
}

impl<'a> CodeLayout<'a> {
    /// Recovers the layout of a module's compiled code.
    ///
    /// The engine reports where each defined function's body lives in the text section. Every
    /// byte not covered by a function is attributed to a [`CodeRangeKind::Other`] range.
    pub fn for_module(module: &'a CompiledModule) -> Self {
        let compiled = module.wasmtime_module();

        // the engine numbers functions the same way the module does, imports first
        let functions = compiled.functions().map(|func| {
            let index = FuncIndex::from_u32(func.index.as_u32());
            (index, func.offset..func.offset + func.len)
        });

        let layout = Self::from_parts(compiled.text(), functions);

        tracing::debug!(
            text_len = layout.text.len(),
            ranges = layout.ranges.len(),
            "recovered code layout"
        );

        layout
    }

    /// Builds a layout from the text section and the offsets of each function in it.
    ///
    /// Function ranges reaching past the end of `text` are clamped to it.
    pub(crate) fn from_parts(
        text: &'a [u8],
        functions: impl IntoIterator<Item = (FuncIndex, Range<usize>)>,
    ) -> Self {
        let mut functions: Vec<_> = functions
            .into_iter()
            .map(|(index, range)| {
                let end = range.end.min(text.len());
                (index, range.start.min(end)..end)
            })
            .collect();
        functions.sort_by_key(|(_, range)| range.start);

        let mut ranges = Vec::with_capacity(functions.len() * 2 + 1);
        let mut cursor = 0;
        for (index, range) in functions {
            // overlapping ranges keep the part not already claimed
            let begin = range.start.max(cursor);
            if begin > cursor {
                ranges.push(CodeRange {
                    kind: CodeRangeKind::Other,
                    begin: cursor,
                    normal_entry: cursor,
                    end: begin,
                });
            }
            let end = range.end.max(begin);
            ranges.push(CodeRange {
                kind: CodeRangeKind::Function(index),
                begin,
                normal_entry: begin,
                end,
            });
            cursor = end;
        }
        if cursor < text.len() {
            ranges.push(CodeRange {
                kind: CodeRangeKind::Other,
                begin: cursor,
                normal_entry: cursor,
                end: text.len(),
            });
        }

        Self { text, ranges }
    }

    /// All ranges in offset order.
    pub fn ranges(&self) -> &[CodeRange] {
        &self.ranges
    }

    /// Only the ranges holding function bodies, in offset order.
    pub fn functions(&self) -> impl Iterator<Item = &CodeRange> + '_ {
        self.ranges.iter().filter(|range| range.is_function())
    }

    /// The whole text section.
    pub fn text(&self) -> &'a [u8] {
        self.text
    }

    /// The bytes of `range` starting at its normal entry.
    ///
    /// Returns `None` if the range does not belong to this layout's text section.
    pub fn code(&self, range: &CodeRange) -> Option<&'a [u8]> {
        self.text.get(range.entry_range())
    }

    /// The address the text section is mapped at in this process.
    pub fn base_address(&self) -> usize {
        self.text.as_ptr().addr()
    }

    /// Finds the function whose code contains the given text offset.
    pub fn function_for_offset(&self, offset: usize) -> Option<FuncIndex> {
        let pos = self.ranges.partition_point(|range| range.end <= offset);
        let range = self.ranges.get(pos)?;
        if range.begin <= offset && offset < range.end {
            range.func_index()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_entity::EntityRef;
    use proptest::prelude::*;

    fn func(i: u32) -> FuncIndex {
        FuncIndex::from_u32(i)
    }

    #[test]
    fn gaps_become_other_ranges() {
        let text = [0u8; 64];
        let layout = CodeLayout::from_parts(&text, [(func(1), 16..32), (func(0), 0..8)]);

        let kinds: Vec<_> = layout.ranges().iter().map(|r| (r.kind, r.begin, r.end)).collect();
        assert_eq!(
            kinds,
            [
                (CodeRangeKind::Function(func(0)), 0, 8),
                (CodeRangeKind::Other, 8, 16),
                (CodeRangeKind::Function(func(1)), 16, 32),
                (CodeRangeKind::Other, 32, 64),
            ]
        );
        assert_eq!(layout.functions().count(), 2);
    }

    #[test]
    fn code_copies_entry_range() {
        let text: Vec<u8> = (0..32).collect();
        let layout = CodeLayout::from_parts(&text, [(func(0), 4..12)]);
        let range = layout.functions().next().unwrap();
        assert_eq!(layout.code(range).unwrap(), &text[4..12]);
        assert_eq!(range.len(), 8);
    }

    #[test]
    fn lookup_by_offset() {
        let text = [0u8; 48];
        let layout = CodeLayout::from_parts(&text, [(func(3), 8..16), (func(4), 16..40)]);

        assert_eq!(layout.function_for_offset(0), None);
        assert_eq!(layout.function_for_offset(8), Some(func(3)));
        assert_eq!(layout.function_for_offset(15), Some(func(3)));
        assert_eq!(layout.function_for_offset(16), Some(func(4)));
        assert_eq!(layout.function_for_offset(40), None);
        assert_eq!(layout.function_for_offset(1000), None);
    }

    #[test]
    fn empty_text() {
        let layout = CodeLayout::from_parts(&[], []);
        assert!(layout.ranges().is_empty());
        assert_eq!(layout.function_for_offset(0), None);
    }

    proptest! {
        #[test]
        fn ranges_tile_the_text(
            len in 0usize..4096,
            spans in proptest::collection::vec((0usize..4096, 1usize..256), 0..16),
        ) {
            let text = vec![0u8; len];
            let functions = spans
                .iter()
                .enumerate()
                .map(|(i, (start, size))| {
                    (FuncIndex::new(i), *start..start + size)
                });
            let layout = CodeLayout::from_parts(&text, functions);

            let mut cursor = 0;
            for range in layout.ranges() {
                prop_assert_eq!(range.begin, cursor);
                prop_assert!(range.begin <= range.end);
                prop_assert!(layout.code(range).is_some());
                cursor = range.end;
            }
            prop_assert_eq!(cursor, len);

            for range in layout.functions() {
                if !range.is_empty() {
                    prop_assert_eq!(layout.function_for_offset(range.begin), range.func_index());
                }
            }
        }
    }
}
