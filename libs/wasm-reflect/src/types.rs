// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

/// The closed set of value types this crate reflects.
///
/// WebAssembly knows more value types than these (`v128` and the reference types), but the
/// reflection surface only distinguishes the four numeric types. Everything else, and the absence
/// of a value, maps to [`ValueType::Void`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    #[default]
    Void,
    I32,
    I64,
    F32,
    F64,
}

impl ValueType {
    /// Converts a `wasmparser` value type, returning `None` for types outside the reflected set.
    pub fn from_wasmparser(ty: wasmparser::ValType) -> Option<Self> {
        use wasmparser::ValType;
        match ty {
            ValType::I32 => Some(Self::I32),
            ValType::I64 => Some(Self::I64),
            ValType::F32 => Some(Self::F32),
            ValType::F64 => Some(Self::F64),
            ValType::V128 | ValType::Ref(_) => None,
        }
    }

    /// Converts an engine value type, returning `None` for types outside the reflected set.
    pub fn from_wasmtime(ty: &wasmtime::ValType) -> Option<Self> {
        match ty {
            wasmtime::ValType::I32 => Some(Self::I32),
            wasmtime::ValType::I64 => Some(Self::I64),
            wasmtime::ValType::F32 => Some(Self::F32),
            wasmtime::ValType::F64 => Some(Self::F64),
            _ => None,
        }
    }

    pub(crate) fn to_wasmtime(self) -> Option<wasmtime::ValType> {
        match self {
            ValueType::Void => None,
            ValueType::I32 => Some(wasmtime::ValType::I32),
            ValueType::I64 => Some(wasmtime::ValType::I64),
            ValueType::F32 => Some(wasmtime::ValType::F32),
            ValueType::F64 => Some(wasmtime::ValType::F64),
        }
    }

    pub fn is_void(self) -> bool {
        matches!(self, ValueType::Void)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueType::Void => "void",
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
        })
    }
}

/// The signature of a WebAssembly function as seen through [`ValueType`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct FuncSignature {
    params: Box<[ValueType]>,
    results: Box<[ValueType]>,
}

impl FuncSignature {
    pub fn new(
        params: impl IntoIterator<Item = ValueType>,
        results: impl IntoIterator<Item = ValueType>,
    ) -> Self {
        Self {
            params: params.into_iter().collect(),
            results: results.into_iter().collect(),
        }
    }

    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    /// All result types in declaration order.
    ///
    /// Functions using the multi-value proposal can have more than one.
    pub fn results(&self) -> &[ValueType] {
        &self.results
    }

    /// The first result type, or [`ValueType::Void`] if the function returns nothing.
    pub fn return_type(&self) -> ValueType {
        self.results.first().copied().unwrap_or_default()
    }
}

impl fmt::Display for FuncSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(") -> ")?;
        match &*self.results {
            [] => f.write_str("void"),
            [single] => write!(f, "{single}"),
            results => {
                f.write_str("(")?;
                for (i, result) in results.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{result}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_numeric_types() {
        assert_eq!(
            ValueType::from_wasmparser(wasmparser::ValType::I32),
            Some(ValueType::I32)
        );
        assert_eq!(
            ValueType::from_wasmparser(wasmparser::ValType::F64),
            Some(ValueType::F64)
        );
        assert_eq!(ValueType::from_wasmparser(wasmparser::ValType::V128), None);
        assert_eq!(
            ValueType::from_wasmtime(&wasmtime::ValType::I64),
            Some(ValueType::I64)
        );
        assert_eq!(ValueType::from_wasmtime(&wasmtime::ValType::V128), None);
    }

    #[test]
    fn void_has_no_engine_type() {
        assert!(ValueType::Void.to_wasmtime().is_none());
        assert!(ValueType::F32.to_wasmtime().is_some());
    }

    #[test]
    fn return_type_is_first_result() {
        let sig = FuncSignature::new([ValueType::I32], [ValueType::F32, ValueType::I64]);
        assert_eq!(sig.return_type(), ValueType::F32);
        assert_eq!(sig.results().len(), 2);

        let sig = FuncSignature::new([], []);
        assert_eq!(sig.return_type(), ValueType::Void);
    }

    #[test]
    fn display() {
        let sig = FuncSignature::new([ValueType::I32, ValueType::I32], [ValueType::I32]);
        assert_eq!(sig.to_string(), "(i32, i32) -> i32");

        let sig = FuncSignature::new([], []);
        assert_eq!(sig.to_string(), "() -> void");

        let sig = FuncSignature::new([ValueType::F64], [ValueType::I32, ValueType::I64]);
        assert_eq!(sig.to_string(), "(f64) -> (i32, i64)");
    }
}
