//! Conversions between [`Value`]s and the bit patterns of scalar encodings.
//!
//! The encoder accepts loose input: any integer variant, any float variant,
//! or a base-10 string where a number is expected. Every integer kind goes
//! through the same path: the logical value is widened, checked against the
//! declared width, and reinterpreted as the two's-complement bit pattern the
//! wire carries. A 32-bit kind accepts anything representable in 32 bits,
//! signed or unsigned, so `U32(u32::MAX)` is a valid `int32` of `-1`.
//!
//! The decoder goes the other way with [`from_wire_bits`], always producing
//! the canonical variant for the declared type.

use crate::error::CoercionError;
use crate::schema::ScalarType;
use crate::value::{MapKey, Value};
use crate::wire::{zigzag_decode32, zigzag_decode64, zigzag_encode32, zigzag_encode64};

type Result<T> = std::result::Result<T, CoercionError>;

/// Widens any integer-like value to its exact logical value
fn integer(value: &Value, target: &'static str) -> Result<i128> {
    match value {
        Value::I32(n) => Ok(i128::from(*n)),
        Value::I64(n) => Ok(i128::from(*n)),
        Value::U32(n) => Ok(i128::from(*n)),
        Value::U64(n) => Ok(i128::from(*n)),
        Value::F32(n) => float_to_integer(f64::from(*n), target),
        Value::F64(n) => float_to_integer(*n, target),
        Value::String(s) => s
            .trim()
            .parse::<i128>()
            .map_err(|_| CoercionError::unparseable(target, s.as_str())),
        other => Err(CoercionError::unsupported(target, other.type_name())),
    }
}

fn float_to_integer(n: f64, target: &'static str) -> Result<i128> {
    if !n.is_finite() {
        return Err(CoercionError::out_of_range(target, n));
    }
    // Saturating cast; anything this large fails the width check afterwards
    Ok(n.trunc() as i128)
}

fn fit32(n: i128, target: &'static str) -> Result<u32> {
    let bits = if n < 0 {
        i32::try_from(n).map(|v| v as u32)
    } else {
        u32::try_from(n)
    };
    bits.map_err(|_| CoercionError::out_of_range(target, n))
}

fn fit64(n: i128, target: &'static str) -> Result<u64> {
    let bits = if n < 0 {
        i64::try_from(n).map(|v| v as u64)
    } else {
        u64::try_from(n)
    };
    bits.map_err(|_| CoercionError::out_of_range(target, n))
}

/// Coerces to a 64-bit unsigned accumulator.
///
/// Negative values come back as their two's-complement bit pattern.
pub fn to_u64(value: &Value) -> Result<u64> {
    fit64(integer(value, "uint64")?, "uint64")
}

/// Coerces to a signed 64-bit integer
pub fn to_i64(value: &Value) -> Result<i64> {
    let n = integer(value, "int64")?;
    i64::try_from(n).map_err(|_| CoercionError::out_of_range("int64", n))
}

/// Coerces to a double
pub fn to_f64(value: &Value) -> Result<f64> {
    match value {
        Value::F64(n) => Ok(*n),
        Value::F32(n) => Ok(f64::from(*n)),
        Value::I32(n) => Ok(f64::from(*n)),
        Value::I64(n) => Ok(*n as f64),
        Value::U32(n) => Ok(f64::from(*n)),
        Value::U64(n) => Ok(*n as f64),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| CoercionError::unparseable("double", s.as_str())),
        other => Err(CoercionError::unsupported("double", other.type_name())),
    }
}

/// Coerces to a float.
///
/// Finite values beyond the `f32` range are rejected; NaN and infinities
/// pass through.
pub fn to_f32(value: &Value) -> Result<f32> {
    let n = match value {
        Value::F32(n) => return Ok(*n),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| CoercionError::unparseable("float", s.as_str()))?,
        other => to_f64(other).map_err(|e| e.retarget("float"))?,
    };

    let narrowed = n as f32;
    if n.is_finite() && !narrowed.is_finite() {
        return Err(CoercionError::out_of_range("float", n));
    }
    Ok(narrowed)
}

/// Coerces to a bool: non-zero integers are true, strings must spell it out
pub fn to_bool(value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(CoercionError::unparseable("bool", s.as_str())),
        },
        Value::I32(_) | Value::I64(_) | Value::U32(_) | Value::U64(_) => {
            integer(value, "bool").map(|n| n != 0)
        }
        other => Err(CoercionError::unsupported("bool", other.type_name())),
    }
}

/// Produces the bits a scalar puts on the wire.
///
/// For varint kinds this is the varint payload (sign-extended for `int32`,
/// zigzag-mapped for `sint*`); for fixed kinds it is the raw little-endian
/// word. `string` and `bytes` are length-delimited and have no bit form.
pub fn scalar_bits(scalar: ScalarType, value: &Value) -> Result<u64> {
    let target = scalar.name();
    Ok(match scalar {
        ScalarType::Int32 => fit32(integer(value, target)?, target)? as i32 as i64 as u64,
        ScalarType::Uint32 | ScalarType::Fixed32 | ScalarType::Sfixed32 => {
            u64::from(fit32(integer(value, target)?, target)?)
        }
        ScalarType::Sint32 => {
            let n = fit32(integer(value, target)?, target)? as i32;
            u64::from(zigzag_encode32(n))
        }
        ScalarType::Int64
        | ScalarType::Uint64
        | ScalarType::Fixed64
        | ScalarType::Sfixed64 => fit64(integer(value, target)?, target)?,
        ScalarType::Sint64 => {
            let n = fit64(integer(value, target)?, target)? as i64;
            zigzag_encode64(n)
        }
        ScalarType::Bool => u64::from(to_bool(value)?),
        ScalarType::Float => u64::from(to_f32(value)?.to_bits()),
        ScalarType::Double => to_f64(value)?.to_bits(),
        ScalarType::String | ScalarType::Bytes => {
            return Err(CoercionError::unsupported(target, value.type_name()))
        }
    })
}

/// Bits for an enum number: the `int32` encoding
pub fn enum_bits(value: &Value) -> Result<u64> {
    scalar_bits(ScalarType::Int32, value)
}

/// Interprets raw wire bits as the declared scalar type.
///
/// `bits` is the varint payload or the fixed-width word, zero-extended.
/// Length-delimited kinds are decoded elsewhere and yield `None`.
pub fn from_wire_bits(scalar: ScalarType, bits: u64) -> Option<Value> {
    Some(match scalar {
        ScalarType::Int32 | ScalarType::Sfixed32 => Value::I32(bits as u32 as i32),
        ScalarType::Int64 | ScalarType::Sfixed64 => Value::I64(bits as i64),
        ScalarType::Uint32 | ScalarType::Fixed32 => Value::U32(bits as u32),
        ScalarType::Uint64 | ScalarType::Fixed64 => Value::U64(bits),
        ScalarType::Sint32 => Value::I32(zigzag_decode32(bits as u32)),
        ScalarType::Sint64 => Value::I64(zigzag_decode64(bits)),
        ScalarType::Bool => Value::Bool(bits != 0),
        ScalarType::Float => Value::F32(f32::from_bits(bits as u32)),
        ScalarType::Double => Value::F64(f64::from_bits(bits)),
        ScalarType::String | ScalarType::Bytes => return None,
    })
}

/// Converts a decoded scalar into a map key
pub fn to_map_key(value: Value) -> Result<MapKey> {
    MapKey::try_from(value).map_err(|other| CoercionError::unsupported("map key", other.type_name()))
}
