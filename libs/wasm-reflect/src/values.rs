// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::types::ValueType;
use crate::utils::enum_accessors;
use core::fmt;

/// A tagged value crossing the host/WebAssembly boundary.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum Value {
    /// The absence of a value, also the sentinel returned for unknown globals.
    #[default]
    Void,
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    /// Returns the zero value of the given type.
    pub fn zero(ty: ValueType) -> Self {
        match ty {
            ValueType::Void => Value::Void,
            ValueType::I32 => Value::I32(0),
            ValueType::I64 => Value::I64(0),
            ValueType::F32 => Value::F32(0.0),
            ValueType::F64 => Value::F64(0.0),
        }
    }

    /// Returns the [`ValueType`] tag of this value.
    pub fn ty(&self) -> ValueType {
        match self {
            Value::Void => ValueType::Void,
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
        }
    }

    /// Returns the raw bit pattern of this value, zero-extended to 64 bits.
    ///
    /// Floats are returned as their IEEE 754 encoding so NaN payloads survive.
    pub fn to_bits(self) -> u64 {
        match self {
            Value::Void => 0,
            Value::I32(v) => u64::from(v.cast_unsigned()),
            Value::I64(v) => v.cast_unsigned(),
            Value::F32(v) => u64::from(v.to_bits()),
            Value::F64(v) => v.to_bits(),
        }
    }

    /// Reinterprets a raw bit pattern as a value of type `ty`.
    ///
    /// 32-bit types read the low half of `bits`. This is the same view a C union would give
    /// when reading a member other than the one last written.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "32-bit types keep the low half"
    )]
    pub fn from_bits(ty: ValueType, bits: u64) -> Self {
        match ty {
            ValueType::Void => Value::Void,
            ValueType::I32 => Value::I32((bits as u32).cast_signed()),
            ValueType::I64 => Value::I64(bits.cast_signed()),
            ValueType::F32 => Value::F32(f32::from_bits(bits as u32)),
            ValueType::F64 => Value::F64(f64::from_bits(bits)),
        }
    }

    /// Wraps an unsigned 64-bit integer, as a host would pass a `BigInt` into an `i64` slot.
    pub fn from_u64(val: u64) -> Self {
        Value::I64(val.cast_signed())
    }

    /// Returns the unsigned 64-bit view of an `i64` value.
    pub fn as_u64(&self) -> Option<u64> {
        self.i64().map(i64::cast_unsigned)
    }

    enum_accessors! {
        e
        (I32(i32) is_i32 i32 unwrap_i32 *e)
        (I64(i64) is_i64 i64 unwrap_i64 *e)
        (F32(f32) is_f32 f32 unwrap_f32 *e)
        (F64(f64) is_f64 f64 unwrap_f64 *e)
    }

    pub(crate) fn to_wasmtime(self) -> Option<wasmtime::Val> {
        match self {
            Value::Void => None,
            Value::I32(v) => Some(wasmtime::Val::I32(v)),
            Value::I64(v) => Some(wasmtime::Val::I64(v)),
            Value::F32(v) => Some(wasmtime::Val::F32(v.to_bits())),
            Value::F64(v) => Some(wasmtime::Val::F64(v.to_bits())),
        }
    }

    /// Converts an engine value, mapping everything outside the reflected set to [`Value::Void`].
    pub(crate) fn from_wasmtime(val: &wasmtime::Val) -> Self {
        match val {
            wasmtime::Val::I32(v) => Value::I32(*v),
            wasmtime::Val::I64(v) => Value::I64(*v),
            wasmtime::Val::F32(bits) => Value::F32(f32::from_bits(*bits)),
            wasmtime::Val::F64(bits) => Value::F64(f64::from_bits(*bits)),
            _ => Value::Void,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => f.write_str("void"),
            Value::I32(v) => write!(f, "{v}:i32"),
            Value::I64(v) => write!(f, "{v}:i64"),
            Value::F32(v) => write!(f, "{v}:f32"),
            Value::F64(v) => write!(f, "{v}:f64"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}
