//! PackStream value codec.
//!
//! Every value is encoded as a marker byte optionally followed by a size and
//! payload. Scalars and containers always select the tightest marker their
//! magnitude or size permits.

use simdutf8::basic::from_utf8;

use crate::buffer::{ChunkedReadBuffer, ChunkedWriteBuffer};
use crate::constant::{GraphSignature, MessageSignature, marker};
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use crate::value::{Structure, Value};

/// Encode one value onto the write buffer.
pub fn pack(value: &Value, buf: &mut ChunkedWriteBuffer) -> Result<()> {
    match value {
        Value::Null => {
            write_u8(buf, marker::NULL);
            Ok(())
        }
        Value::Boolean(true) => {
            write_u8(buf, marker::TRUE);
            Ok(())
        }
        Value::Boolean(false) => {
            write_u8(buf, marker::FALSE);
            Ok(())
        }
        Value::Integer(v) => {
            pack_int(*v, buf);
            Ok(())
        }
        Value::Float(v) => {
            write_u8(buf, marker::FLOAT_64);
            write_f64(buf, *v);
            Ok(())
        }
        Value::String(s) => pack_str(s, buf),
        Value::List(items) => pack_list(items, buf),
        Value::Map(entries) => pack_map(entries, buf),
        Value::Structure(s) => pack_structure(s.signature, &s.fields, buf),
    }
}

fn pack_int(val: i64, buf: &mut ChunkedWriteBuffer) {
    if (0..=127).contains(&val) {
        write_u8(buf, val as u8);
    } else if (-16..=-1).contains(&val) {
        // Tiny negative integers are the two's complement byte 0xF0..0xFF.
        write_u8(buf, val as i8 as u8);
    } else if (-128..=-17).contains(&val) {
        write_u8(buf, marker::INT_8);
        write_i8(buf, val as i8);
    } else if (i64::from(i16::MIN)..=i64::from(i16::MAX)).contains(&val) {
        write_u8(buf, marker::INT_16);
        write_i16(buf, val as i16);
    } else if (i64::from(i32::MIN)..=i64::from(i32::MAX)).contains(&val) {
        write_u8(buf, marker::INT_32);
        write_i32(buf, val as i32);
    } else {
        write_u8(buf, marker::INT_64);
        write_i64(buf, val);
    }
}

/// Encode a UTF-8 string; the size is its byte length.
pub(crate) fn pack_str(val: &str, buf: &mut ChunkedWriteBuffer) -> Result<()> {
    let size = val.len();
    if size < 16 {
        write_u8(buf, marker::TINY_STRING | size as u8);
    } else if size < 256 {
        write_u8(buf, marker::STRING_8);
        write_u8(buf, size as u8);
    } else if size < 65536 {
        write_u8(buf, marker::STRING_16);
        write_u16(buf, size as u16);
    } else if size <= u32::MAX as usize {
        write_u8(buf, marker::STRING_32);
        write_u32(buf, size as u32);
    } else {
        return Err(Error::Buffer(format!(
            "string exceeds max size {}: {}",
            u32::MAX,
            size
        )));
    }
    write_bytes(buf, val.as_bytes());
    Ok(())
}

pub(crate) fn pack_list(items: &[Value], buf: &mut ChunkedWriteBuffer) -> Result<()> {
    let size = items.len();
    if size < 16 {
        write_u8(buf, marker::TINY_LIST | size as u8);
    } else if size < 256 {
        write_u8(buf, marker::LIST_8);
        write_u8(buf, size as u8);
    } else if size < 65536 {
        write_u8(buf, marker::LIST_16);
        write_u16(buf, size as u16);
    } else if size <= u32::MAX as usize {
        write_u8(buf, marker::LIST_32);
        write_u32(buf, size as u32);
    } else {
        return Err(Error::Buffer(format!(
            "list exceeds max size {}: {}",
            u32::MAX,
            size
        )));
    }
    for item in items {
        pack(item, buf)?;
    }
    Ok(())
}

/// Encode map entries as repeated key/value pairs in producer order.
pub(crate) fn pack_map(entries: &[(String, Value)], buf: &mut ChunkedWriteBuffer) -> Result<()> {
    let size = entries.len();
    if size < 16 {
        write_u8(buf, marker::TINY_MAP | size as u8);
    } else if size < 256 {
        write_u8(buf, marker::MAP_8);
        write_u8(buf, size as u8);
    } else if size < 65536 {
        write_u8(buf, marker::MAP_16);
        write_u16(buf, size as u16);
    } else if size <= u32::MAX as usize {
        write_u8(buf, marker::MAP_32);
        write_u32(buf, size as u32);
    } else {
        return Err(Error::Buffer(format!(
            "map exceeds max size {}: {}",
            u32::MAX,
            size
        )));
    }
    for (key, value) in entries {
        pack_str(key, buf)?;
        pack(value, buf)?;
    }
    Ok(())
}

/// Encode a structure header, signature, and fields.
///
/// Structures have no 32-bit form; more than 65535 fields is an error.
pub(crate) fn pack_structure(
    signature: u8,
    fields: &[Value],
    buf: &mut ChunkedWriteBuffer,
) -> Result<()> {
    let size = fields.len();
    if size < 16 {
        write_u8(buf, marker::TINY_STRUCT | size as u8);
    } else if size < 256 {
        write_u8(buf, marker::STRUCT_8);
        write_u8(buf, size as u8);
    } else if size < 65536 {
        write_u8(buf, marker::STRUCT_16);
        write_u16(buf, size as u16);
    } else {
        return Err(Error::Buffer(format!(
            "structure exceeds max size 65535: {}",
            size
        )));
    }
    write_u8(buf, signature);
    for field in fields {
        pack(field, buf)?;
    }
    Ok(())
}

/// Decode one value from the read buffer.
pub fn unpack(buf: &mut ChunkedReadBuffer) -> Result<Value> {
    let m = read_u8(buf)?;
    match m {
        // Tiny positive integers are the marker byte itself.
        0x00..=0x7F => Ok(Value::Integer(i64::from(m))),
        // Tiny negative integers are the two's complement byte.
        0xF0..=0xFF => Ok(Value::Integer(i64::from(m as i8))),
        0x80..=0x8F => unpack_str((m & 0x0F) as usize, buf),
        0x90..=0x9F => unpack_list((m & 0x0F) as usize, buf),
        0xA0..=0xAF => unpack_map((m & 0x0F) as usize, buf),
        0xB0..=0xBF => Ok(Value::Structure(unpack_structure(
            (m & 0x0F) as usize,
            buf,
        )?)),
        marker::NULL => Ok(Value::Null),
        marker::FLOAT_64 => Ok(Value::Float(read_f64(buf)?)),
        marker::FALSE => Ok(Value::Boolean(false)),
        marker::TRUE => Ok(Value::Boolean(true)),
        marker::INT_8 => Ok(Value::Integer(i64::from(read_i8(buf)?))),
        marker::INT_16 => Ok(Value::Integer(i64::from(read_i16(buf)?))),
        marker::INT_32 => Ok(Value::Integer(i64::from(read_i32(buf)?))),
        marker::INT_64 => Ok(Value::Integer(read_i64(buf)?)),
        marker::STRING_8 => {
            let size = read_u8(buf)? as usize;
            unpack_str(size, buf)
        }
        marker::STRING_16 => {
            let size = read_u16(buf)? as usize;
            unpack_str(size, buf)
        }
        marker::STRING_32 => {
            let size = read_u32(buf)? as usize;
            unpack_str(size, buf)
        }
        marker::LIST_8 => {
            let size = read_u8(buf)? as usize;
            unpack_list(size, buf)
        }
        marker::LIST_16 => {
            let size = read_u16(buf)? as usize;
            unpack_list(size, buf)
        }
        marker::LIST_32 => {
            let size = read_u32(buf)? as usize;
            unpack_list(size, buf)
        }
        marker::MAP_8 => {
            let size = read_u8(buf)? as usize;
            unpack_map(size, buf)
        }
        marker::MAP_16 => {
            let size = read_u16(buf)? as usize;
            unpack_map(size, buf)
        }
        marker::MAP_32 => {
            let size = read_u32(buf)? as usize;
            unpack_map(size, buf)
        }
        marker::STRUCT_8 => {
            let size = read_u8(buf)? as usize;
            Ok(Value::Structure(unpack_structure(size, buf)?))
        }
        marker::STRUCT_16 => {
            let size = read_u16(buf)? as usize;
            Ok(Value::Structure(unpack_structure(size, buf)?))
        }
        _ => Err(Error::Protocol(format!("unknown marker '0x{:02X}'", m))),
    }
}

fn unpack_str(size: usize, buf: &mut ChunkedReadBuffer) -> Result<Value> {
    let bytes = read_bytes(buf, size)?;
    let s = from_utf8(bytes)
        .map_err(|_| Error::Protocol("string payload is not valid UTF-8".to_string()))?;
    Ok(Value::String(s.to_string()))
}

fn unpack_list(size: usize, buf: &mut ChunkedReadBuffer) -> Result<Value> {
    let mut items = Vec::with_capacity(size.min(1024));
    for _ in 0..size {
        items.push(unpack(buf)?);
    }
    Ok(Value::List(items))
}

fn unpack_map(size: usize, buf: &mut ChunkedReadBuffer) -> Result<Value> {
    let mut entries = Vec::with_capacity(size.min(1024));
    for _ in 0..size {
        let key = match unpack(buf)? {
            Value::String(key) => key,
            other => {
                return Err(Error::Protocol(format!(
                    "map key must be a string, got {:?}",
                    other
                )));
            }
        };
        let value = unpack(buf)?;
        entries.push((key, value));
    }
    Ok(Value::Map(entries))
}

/// Decode a structure body: signature byte then exactly `size` fields.
///
/// Unknown signatures, and known signatures with the wrong field count, are
/// protocol errors.
pub(crate) fn unpack_structure(size: usize, buf: &mut ChunkedReadBuffer) -> Result<Structure> {
    let signature = read_u8(buf)?;
    let arity = MessageSignature::from_u8(signature)
        .map(MessageSignature::arity)
        .or_else(|| GraphSignature::from_u8(signature).map(GraphSignature::arity));
    match arity {
        None => {
            return Err(Error::Protocol(format!(
                "unrecognized structure signature '0x{:02X}' with size '{}'",
                signature, size
            )));
        }
        Some(arity) if arity != size => {
            return Err(Error::Protocol(format!(
                "structure signature '0x{:02X}' expects {} fields, got {}",
                signature, arity, size
            )));
        }
        Some(_) => {}
    }
    let mut fields = Vec::with_capacity(size);
    for _ in 0..size {
        fields.push(unpack(buf)?);
    }
    Ok(Structure { signature, fields })
}
