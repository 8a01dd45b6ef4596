use zerocopy::FromBytes;
use zerocopy::byteorder::big_endian::{
    F64 as F64BE, I16 as I16BE, I32 as I32BE, I64 as I64BE, U16 as U16BE, U32 as U32BE,
};

use crate::buffer::{ChunkedReadBuffer, ChunkedWriteBuffer};
use crate::error::Result;

/// Read 1-byte unsigned integer
pub fn read_u8(buf: &mut ChunkedReadBuffer) -> Result<u8> {
    Ok(buf.read(1)?[0])
}

/// Read 2-byte big-endian unsigned integer
pub fn read_u16(buf: &mut ChunkedReadBuffer) -> Result<u16> {
    Ok(U16BE::ref_from_bytes(buf.read(2)?)?.get())
}

/// Read 4-byte big-endian unsigned integer
pub fn read_u32(buf: &mut ChunkedReadBuffer) -> Result<u32> {
    Ok(U32BE::ref_from_bytes(buf.read(4)?)?.get())
}

/// Read 1-byte signed integer
pub fn read_i8(buf: &mut ChunkedReadBuffer) -> Result<i8> {
    Ok(buf.read(1)?[0] as i8)
}

/// Read 2-byte big-endian signed integer
pub fn read_i16(buf: &mut ChunkedReadBuffer) -> Result<i16> {
    Ok(I16BE::ref_from_bytes(buf.read(2)?)?.get())
}

/// Read 4-byte big-endian signed integer
pub fn read_i32(buf: &mut ChunkedReadBuffer) -> Result<i32> {
    Ok(I32BE::ref_from_bytes(buf.read(4)?)?.get())
}

/// Read 8-byte big-endian signed integer
pub fn read_i64(buf: &mut ChunkedReadBuffer) -> Result<i64> {
    Ok(I64BE::ref_from_bytes(buf.read(8)?)?.get())
}

/// Read 8-byte big-endian IEEE-754 double
pub fn read_f64(buf: &mut ChunkedReadBuffer) -> Result<f64> {
    Ok(F64BE::ref_from_bytes(buf.read(8)?)?.get())
}

/// Read `len` raw bytes
pub fn read_bytes<'buf>(buf: &'buf mut ChunkedReadBuffer, len: usize) -> Result<&'buf [u8]> {
    buf.read(len)
}

/// Write 1-byte unsigned integer
pub fn write_u8(buf: &mut ChunkedWriteBuffer, value: u8) {
    buf.write(&[value]);
}

/// Write 2-byte big-endian unsigned integer
pub fn write_u16(buf: &mut ChunkedWriteBuffer, value: u16) {
    buf.write(&value.to_be_bytes());
}

/// Write 4-byte big-endian unsigned integer
pub fn write_u32(buf: &mut ChunkedWriteBuffer, value: u32) {
    buf.write(&value.to_be_bytes());
}

/// Write 1-byte signed integer
pub fn write_i8(buf: &mut ChunkedWriteBuffer, value: i8) {
    buf.write(&value.to_be_bytes());
}

/// Write 2-byte big-endian signed integer
pub fn write_i16(buf: &mut ChunkedWriteBuffer, value: i16) {
    buf.write(&value.to_be_bytes());
}

/// Write 4-byte big-endian signed integer
pub fn write_i32(buf: &mut ChunkedWriteBuffer, value: i32) {
    buf.write(&value.to_be_bytes());
}

/// Write 8-byte big-endian signed integer
pub fn write_i64(buf: &mut ChunkedWriteBuffer, value: i64) {
    buf.write(&value.to_be_bytes());
}

/// Write 8-byte big-endian IEEE-754 double
pub fn write_f64(buf: &mut ChunkedWriteBuffer, value: f64) {
    buf.write(&value.to_be_bytes());
}

/// Write raw bytes
pub fn write_bytes(buf: &mut ChunkedWriteBuffer, data: &[u8]) {
    buf.write(data);
}
