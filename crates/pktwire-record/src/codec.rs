//! Byte-order-aware scalar encoding.
//!
//! Everything here works on a single element slice whose length equals the
//! element width. Integers travel as raw `u64` bit patterns internally so
//! bitfield storage units and tagged fields share one path.

use byteorder::{BigEndian, ByteOrder as Endian, LittleEndian};

use crate::{ByteOrder, FieldType, RecordError, Value};

/// Reads an integer element as its raw, zero-extended bit pattern.
pub(crate) fn read_raw(order: ByteOrder, bytes: &[u8]) -> u64 {
    match order {
        ByteOrder::Little => LittleEndian::read_uint(bytes, bytes.len()),
        ByteOrder::Big => BigEndian::read_uint(bytes, bytes.len()),
    }
}

/// Writes the low `bytes.len()` bytes of `raw`.
pub(crate) fn write_raw(order: ByteOrder, bytes: &mut [u8], raw: u64) {
    let nbytes = bytes.len();
    let raw = if nbytes == 8 {
        raw
    } else {
        raw & ((1u64 << (nbytes * 8)) - 1)
    };
    match order {
        ByteOrder::Little => LittleEndian::write_uint(bytes, raw, nbytes),
        ByteOrder::Big => BigEndian::write_uint(bytes, raw, nbytes),
    }
}

/// Decodes one element of `ty`.
pub(crate) fn read_scalar(ty: FieldType, order: ByteOrder, bytes: &[u8]) -> Value {
    match ty {
        FieldType::Bytes(_) => {
            let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
            Value::Bytes(bytes[..end].to_vec())
        }
        FieldType::F32 => Value::Float(f64::from(f32::from_bits(read_raw(order, bytes) as u32))),
        FieldType::F64 => Value::Float(f64::from_bits(read_raw(order, bytes))),
        ty if ty.is_signed() => {
            let shift = 64 - ty.bits();
            Value::Int(((read_raw(order, bytes) << shift) as i64) >> shift)
        }
        _ => Value::UInt(read_raw(order, bytes)),
    }
}

/// Encodes `value` as one element of `ty`, rejecting values that don't fit.
pub(crate) fn write_scalar(
    field: &str,
    ty: FieldType,
    order: ByteOrder,
    bytes: &mut [u8],
    value: &Value,
) -> Result<(), RecordError> {
    match ty {
        FieldType::Bytes(width) => {
            let data: &[u8] = match value {
                Value::Bytes(b) => b,
                Value::Text(s) => s.as_bytes(),
                other => return Err(mismatch(field, ty, other)),
            };
            if data.len() > width {
                return Err(RecordError::OutOfRange {
                    field: field.to_string(),
                    ty,
                    value: format!("{} bytes", data.len()),
                });
            }
            bytes[..data.len()].copy_from_slice(data);
            bytes[data.len()..].fill(0);
        }
        FieldType::F32 => {
            let x = value.as_f64().ok_or_else(|| mismatch(field, ty, value))?;
            write_raw(order, bytes, u64::from((x as f32).to_bits()));
        }
        FieldType::F64 => {
            let x = value.as_f64().ok_or_else(|| mismatch(field, ty, value))?;
            write_raw(order, bytes, x.to_bits());
        }
        ty => write_raw(order, bytes, integer_bits(field, ty, value)?),
    }
    Ok(())
}

/// Range-checks an integer value against `ty` and returns its two's
/// complement bit pattern.
pub(crate) fn integer_bits(field: &str, ty: FieldType, value: &Value) -> Result<u64, RecordError> {
    let out_of_range = || RecordError::OutOfRange {
        field: field.to_string(),
        ty,
        value: value.to_string(),
    };
    let bits = ty.bits();
    match value {
        Value::UInt(u) | Value::Tag { raw: u, .. } => {
            let max = if ty.is_signed() {
                ty.max_unsigned() >> 1
            } else {
                ty.max_unsigned()
            };
            if *u > max {
                return Err(out_of_range());
            }
            Ok(*u)
        }
        Value::Int(i) => {
            if ty.is_signed() {
                let min = -(1i128 << (bits - 1));
                let max = (1i128 << (bits - 1)) - 1;
                if i128::from(*i) < min || i128::from(*i) > max {
                    return Err(out_of_range());
                }
                Ok((*i as u64) & ty.max_unsigned())
            } else {
                let u = u64::try_from(*i).map_err(|_| out_of_range())?;
                if u > ty.max_unsigned() {
                    return Err(out_of_range());
                }
                Ok(u)
            }
        }
        other => Err(mismatch(field, ty, other)),
    }
}

/// Reverses the bytes of every element in `bytes` (a run of `ty` elements).
pub(crate) fn swap_elements(ty: FieldType, bytes: &mut [u8]) {
    if !ty.is_order_sensitive() {
        return;
    }
    for element in bytes.chunks_exact_mut(ty.width()) {
        element.reverse();
    }
}

fn mismatch(field: &str, ty: FieldType, value: &Value) -> RecordError {
    RecordError::TypeMismatch {
        field: field.to_string(),
        expected: ty.to_string(),
        found: value.kind().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_round_trip_both_orders() {
        let mut buf = [0u8; 2];
        write_raw(ByteOrder::Little, &mut buf, 0x1234);
        assert_eq!(buf, [0x34, 0x12]);
        assert_eq!(read_raw(ByteOrder::Little, &buf), 0x1234);

        write_raw(ByteOrder::Big, &mut buf, 0x1234);
        assert_eq!(buf, [0x12, 0x34]);
        assert_eq!(read_raw(ByteOrder::Big, &buf), 0x1234);
    }

    #[test]
    fn test_signed_values_sign_extend() {
        let mut buf = [0u8; 2];
        write_scalar("x", FieldType::I16, ByteOrder::Big, &mut buf, &Value::Int(-2)).unwrap();
        assert_eq!(buf, [0xFF, 0xFE]);
        assert_eq!(read_scalar(FieldType::I16, ByteOrder::Big, &buf), Value::Int(-2));
    }

    #[test]
    fn test_float_encoding() {
        let mut buf = [0u8; 4];
        write_scalar("x", FieldType::F32, ByteOrder::Big, &mut buf, &Value::Float(1.0)).unwrap();
        assert_eq!(buf, [0x3F, 0x80, 0x00, 0x00]);
        assert_eq!(read_scalar(FieldType::F32, ByteOrder::Big, &buf), Value::Float(1.0));
    }

    #[test]
    fn test_integer_range_checks() {
        assert!(integer_bits("x", FieldType::U8, &Value::UInt(255)).is_ok());
        assert!(matches!(
            integer_bits("x", FieldType::U8, &Value::UInt(256)),
            Err(RecordError::OutOfRange { .. })
        ));
        assert!(matches!(
            integer_bits("x", FieldType::U8, &Value::Int(-1)),
            Err(RecordError::OutOfRange { .. })
        ));
        assert_eq!(integer_bits("x", FieldType::I8, &Value::Int(-128)).unwrap(), 0x80);
        assert!(integer_bits("x", FieldType::I8, &Value::UInt(128)).is_err());
        assert!(matches!(
            integer_bits("x", FieldType::U16, &Value::Float(1.0)),
            Err(RecordError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_byte_strings_pad_and_trim() {
        let mut buf = [0xAAu8; 6];
        write_scalar("name", FieldType::Bytes(6), ByteOrder::Little, &mut buf, &Value::from("abc"))
            .unwrap();
        assert_eq!(&buf, b"abc\0\0\0");
        assert_eq!(
            read_scalar(FieldType::Bytes(6), ByteOrder::Little, &buf),
            Value::Bytes(b"abc".to_vec())
        );
        assert!(
            write_scalar("name", FieldType::Bytes(2), ByteOrder::Little, &mut buf[..2], &Value::from("abc"))
                .is_err()
        );
    }

    #[test]
    fn test_swap_elements_reverses_each_element() {
        let mut buf = [1, 2, 3, 4];
        swap_elements(FieldType::U16, &mut buf);
        assert_eq!(buf, [2, 1, 4, 3]);
        swap_elements(FieldType::U8, &mut buf);
        assert_eq!(buf, [2, 1, 4, 3]);
    }
}
