//! Binary I/O extension traits: little-endian primitives, LEB128 varints and
//! length-prefixed strings.
//!
//! Varints store 7 bits per byte, least significant group first, with the high
//! bit set on every byte except the last. Signed values are written as their
//! two's complement bit pattern, so negative numbers always take the full width.

use std::io::{Read, Write};

use crate::error::Error;

/// Extension trait for writing little-endian binary values.
pub trait BinaryWrite: Write {
    fn write_u8(&mut self, value: u8) -> Result<(), Error> {
        self.write_all(&[value])?;
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<(), Error> {
        self.write_u8(u8::from(value))
    }

    fn write_u16(&mut self, value: u16) -> Result<(), Error> {
        self.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_u32(&mut self, value: u32) -> Result<(), Error> {
        self.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_u64(&mut self, value: u64) -> Result<(), Error> {
        self.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_opt_u32(&mut self, value: u32) -> Result<(), Error> {
        self.write_opt_u64(u64::from(value))
    }

    fn write_opt_i32(&mut self, value: i32) -> Result<(), Error> {
        self.write_opt_u32(value as u32)
    }

    fn write_opt_u64(&mut self, mut value: u64) -> Result<(), Error> {
        let mut buf = [0u8; 10];
        let mut len = 0;
        while value >= 0x80 {
            buf[len] = (value as u8) | 0x80;
            value >>= 7;
            len += 1;
        }
        buf[len] = value as u8;
        self.write_all(&buf[..=len])?;
        Ok(())
    }

    fn write_opt_usize(&mut self, value: usize) -> Result<(), Error> {
        self.write_opt_u64(value as u64)
    }

    /// u8 length prefix. Used for short identifiers such as chromosome names.
    fn write_prefixed_string(&mut self, s: &str) -> Result<(), Error> {
        let len = s.len();
        if len > 255 {
            return Err(Error::Validation(format!(
                "string too long for u8 prefix: {len} bytes"
            )));
        }
        self.write_all(&[len as u8])?;
        self.write_all(s.as_bytes())?;
        Ok(())
    }

    /// Varint length prefix, for strings of arbitrary length.
    fn write_opt_string(&mut self, s: &str) -> Result<(), Error> {
        self.write_opt_usize(s.len())?;
        self.write_all(s.as_bytes())?;
        Ok(())
    }
}

/// Extension trait for reading little-endian binary values.
pub trait BinaryRead: Read {
    fn read_u8(&mut self) -> Result<u8, Error> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_bool(&mut self) -> Result<bool, Error> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(Error::Format(format!("invalid boolean byte: {b}"))),
        }
    }

    fn read_u16(&mut self) -> Result<u16, Error> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64, Error> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn read_opt_u32(&mut self) -> Result<u32, Error> {
        let value = read_varint(self, 5)?;
        u32::try_from(value)
            .map_err(|_| Error::Format(format!("varint {value} does not fit in 32 bits")))
    }

    fn read_opt_i32(&mut self) -> Result<i32, Error> {
        Ok(self.read_opt_u32()? as i32)
    }

    fn read_opt_u64(&mut self) -> Result<u64, Error> {
        read_varint(self, 10)
    }

    fn read_opt_usize(&mut self) -> Result<usize, Error> {
        let value = self.read_opt_u64()?;
        usize::try_from(value)
            .map_err(|_| Error::Format(format!("varint {value} does not fit in usize")))
    }

    fn read_prefixed_string(&mut self) -> Result<String, Error> {
        let len = self.read_u8()? as usize;
        read_utf8(self, len)
    }

    fn read_opt_string(&mut self) -> Result<String, Error> {
        let len = self.read_opt_usize()?;
        read_utf8(self, len)
    }
}

impl<W: Write + ?Sized> BinaryWrite for W {}
impl<R: Read + ?Sized> BinaryRead for R {}

fn read_varint<R: Read + ?Sized>(reader: &mut R, max_bytes: usize) -> Result<u64, Error> {
    let mut value: u64 = 0;
    for i in 0..max_bytes {
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf)?;
        let byte = buf[0];
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(Error::Format(format!(
        "varint exceeds {max_bytes} bytes: stream is corrupt"
    )))
}

fn read_utf8<R: Read + ?Sized>(reader: &mut R, len: usize) -> Result<String, Error> {
    if len == 0 {
        return Ok(String::new());
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| Error::Parse(format!("invalid UTF-8: {e}")))
}
