//! Low-level ordered byte primitives the codec builds on.
//!
//! Mirrors the teacher's `storage::serde` reader/writer pair, extended with the ordering tricks
//! (sign-bit flip for signed integers, IEEE-754 bit-flip for floats) an index key needs that a
//! plain wire format does not.

use thiserror::Error;

pub struct Writer {
    buffer: Vec<u8>,
}

impl Writer {
    pub fn new(capacity: usize) -> Self {
        Writer {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// Big-endian with the sign bit flipped, so two's-complement negatives sort before positives.
    pub fn write_i64_ordered(&mut self, value: i64) {
        let flipped = (value as u64) ^ (1u64 << 63);
        self.write_u64(flipped);
    }

    /// The standard bit-flip trick: for positives, flip the sign bit; for negatives, flip every
    /// bit. The result compares as ordered unsigned bytes matching real number order.
    pub fn write_f64_ordered(&mut self, value: f64) {
        let bits = value.to_bits();
        let flipped = if bits & (1u64 << 63) != 0 {
            !bits
        } else {
            bits | (1u64 << 63)
        };
        self.write_u64(flipped);
    }

    pub fn write_bytes_raw(&mut self, value: &[u8]) {
        self.buffer.extend_from_slice(value);
    }

    /// u16-length-prefixed bytes, so a reader can stop without depending on what follows.
    pub fn write_bytes(&mut self, value: &[u8]) {
        let len = value.len().min(u16::MAX as usize) as u16;
        self.write_u16(len);
        self.buffer.extend_from_slice(&value[..len as usize]);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buffer
    }
}

pub struct Reader<'a> {
    buffer: &'a [u8],
    index: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Reader { buffer, index: 0 }
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        let buffer = self.read_next(1)?;
        Ok(buffer[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, ReadError> {
        let buffer = self.read_next(4)?;
        Ok(u32::from_be_bytes(buffer.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64, ReadError> {
        let buffer = self.read_next(8)?;
        Ok(u64::from_be_bytes(buffer.try_into().unwrap()))
    }

    pub fn read_i64_ordered(&mut self) -> Result<i64, ReadError> {
        let flipped = self.read_u64()?;
        Ok((flipped ^ (1u64 << 63)) as i64)
    }

    pub fn read_f64_ordered(&mut self) -> Result<f64, ReadError> {
        let bits = self.read_u64()?;
        let original = if bits & (1u64 << 63) != 0 {
            bits & !(1u64 << 63)
        } else {
            !bits
        };
        Ok(f64::from_bits(original))
    }

    pub fn read_bytes_raw(&mut self, num_bytes: usize) -> Result<&'a [u8], ReadError> {
        self.read_next(num_bytes)
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, ReadError> {
        let length = self.read_u16()?;
        let buffer = self.read_next(length.into())?;
        Ok(buffer.to_vec())
    }

    pub fn read_str(&mut self) -> Result<String, ReadError> {
        let bytes = self.read_bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn read_u16(&mut self) -> Result<u16, ReadError> {
        let buffer = self.read_next(2)?;
        Ok(u16::from_be_bytes([buffer[0], buffer[1]]))
    }

    fn read_next(&mut self, num_bytes: usize) -> Result<&'a [u8], ReadError> {
        if self.index + num_bytes > self.buffer.len() {
            return Err(ReadError::EndOfInput);
        }
        let prev_index = self.index;
        self.index += num_bytes;
        Ok(&self.buffer[prev_index..self.index])
    }
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("end of input")]
    EndOfInput,
}
