// Distributed under The MIT License (MIT)
//
// Copyright (c) 2019 The `image-rs` developers
//! Typed reads and writes of fixed-width numbers in a configured byte order.
use std::io::{self, Read, Seek, SeekFrom, Write};

use alloc::vec::Vec;
use bytemuck::Pod;

use crate::buf::SharedBuffer;

/// The order of bytes of a multi-byte number in a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
}

/// An error while reading or writing a byte stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The stream ended before the requested number of bytes was available.
    #[error("unexpected end of stream: wanted {wanted} bytes at offset {offset}")]
    UnexpectedEof { offset: u64, wanted: usize },
    #[error("stream i/o failed: {0}")]
    Io(#[from] io::Error),
}

/// A fixed-width number that can be read from or written to a stream.
///
/// Only plain numbers qualify, each byte pattern of the right size is a valid value.
pub trait Scalar: Pod {}

macro_rules! scalar {
    ($($ty:ty),*) => {
        $(impl Scalar for $ty {})*
    };
}

scalar!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl ByteOrder {
    /// The byte order of the machine running this code.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// Whether numbers in this order must be reversed to be used on this machine.
    pub const fn is_swapped(self) -> bool {
        !matches!(
            (self, ByteOrder::native()),
            (ByteOrder::Little, ByteOrder::Little) | (ByteOrder::Big, ByteOrder::Big)
        )
    }
}

/// Convert every `sample_size`-wide sample in `bytes` between `order` and the host order.
///
/// Trailing bytes that do not form a full sample are left as they are. Single byte samples are
/// never touched.
pub fn reorder(bytes: &mut [u8], sample_size: usize, order: ByteOrder) {
    if sample_size <= 1 || !order.is_swapped() {
        return;
    }

    for sample in bytes.chunks_exact_mut(sample_size) {
        sample.reverse();
    }
}

/// Reads typed values from a byte source.
pub struct ByteReader<R> {
    inner: R,
    order: ByteOrder,
    offset: u64,
}

/// Writes typed values to a byte sink.
pub struct ByteWriter<W> {
    inner: W,
    order: ByteOrder,
    offset: u64,
}

impl<R: Read> ByteReader<R> {
    pub fn new(inner: R, order: ByteOrder) -> Self {
        ByteReader {
            inner,
            order,
            offset: 0,
        }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// The number of bytes consumed so far, or the absolute position after a seek.
    pub fn position(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read a number, swapping its bytes when the configured order is not the host order.
    pub fn read<T: Scalar>(&mut self) -> Result<T, StreamError> {
        let mut value = T::zeroed();
        let bytes = bytemuck::bytes_of_mut(&mut value);
        self.fill(bytes)?;

        if self.order.is_swapped() {
            bytes.reverse();
        }

        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8, StreamError> {
        self.read()
    }

    pub fn read_u16(&mut self) -> Result<u16, StreamError> {
        self.read()
    }

    pub fn read_u32(&mut self) -> Result<u32, StreamError> {
        self.read()
    }

    pub fn read_u64(&mut self) -> Result<u64, StreamError> {
        self.read()
    }

    pub fn read_i8(&mut self) -> Result<i8, StreamError> {
        self.read()
    }

    pub fn read_i16(&mut self) -> Result<i16, StreamError> {
        self.read()
    }

    pub fn read_i32(&mut self) -> Result<i32, StreamError> {
        self.read()
    }

    pub fn read_i64(&mut self) -> Result<i64, StreamError> {
        self.read()
    }

    pub fn read_f32(&mut self) -> Result<f32, StreamError> {
        self.read()
    }

    pub fn read_f64(&mut self) -> Result<f64, StreamError> {
        self.read()
    }

    /// Read a payload of exactly `len` bytes, which may contain any byte including zero.
    ///
    /// The buffer grows with the bytes that actually arrive, a length claimed by a header is never
    /// allocated up front.
    pub fn read_bytes(&mut self, len: usize) -> Result<SharedBuffer, StreamError> {
        self.read_up_to(len).map(SharedBuffer::from)
    }

    /// Read a fixed-length character field of exactly `len` bytes.
    ///
    /// The field is returned raw, nothing is trimmed at an embedded zero byte.
    pub fn read_fixed_length_chars(&mut self, len: usize) -> Result<Vec<u8>, StreamError> {
        self.read_up_to(len)
    }

    /// Skip over a number of bytes.
    pub fn skip(&mut self, len: u64) -> Result<(), StreamError> {
        let copied = io::copy(&mut (&mut self.inner).take(len), &mut io::sink())?;
        self.offset += copied;

        if copied < len {
            return Err(StreamError::UnexpectedEof {
                offset: self.offset,
                wanted: (len - copied) as usize,
            });
        }

        Ok(())
    }

    /// Read everything left in the stream.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>, StreamError> {
        let mut rest = Vec::new();
        let read = self.inner.read_to_end(&mut rest)?;
        self.offset += read as u64;
        Ok(rest)
    }

    fn read_up_to(&mut self, len: usize) -> Result<Vec<u8>, StreamError> {
        let mut bytes = Vec::new();
        let read = (&mut self.inner).take(len as u64).read_to_end(&mut bytes)?;
        self.offset += read as u64;

        if read < len {
            return Err(StreamError::UnexpectedEof {
                offset: self.offset,
                wanted: len - read,
            });
        }

        Ok(bytes)
    }

    fn fill(&mut self, bytes: &mut [u8]) -> Result<(), StreamError> {
        match self.inner.read_exact(bytes) {
            Ok(()) => {
                self.offset += bytes.len() as u64;
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                Err(StreamError::UnexpectedEof {
                    offset: self.offset,
                    wanted: bytes.len(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl<R: Read + Seek> ByteReader<R> {
    /// Move to an absolute offset from the start of the stream.
    pub fn seek_to(&mut self, offset: u64) -> Result<(), StreamError> {
        self.offset = self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }
}

impl<W: Write> ByteWriter<W> {
    pub fn new(inner: W, order: ByteOrder) -> Self {
        ByteWriter {
            inner,
            order,
            offset: 0,
        }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// The number of bytes written so far.
    pub fn position(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Write a number, swapping its bytes when the configured order is not the host order.
    pub fn write<T: Scalar>(&mut self, value: T) -> Result<(), StreamError> {
        let mut value = value;
        let bytes = bytemuck::bytes_of_mut(&mut value);

        if self.order.is_swapped() {
            bytes.reverse();
        }

        self.write_bytes(bytes)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), StreamError> {
        self.write(value)
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), StreamError> {
        self.write(value)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), StreamError> {
        self.write(value)
    }

    pub fn write_u64(&mut self, value: u64) -> Result<(), StreamError> {
        self.write(value)
    }

    pub fn write_i8(&mut self, value: i8) -> Result<(), StreamError> {
        self.write(value)
    }

    pub fn write_i16(&mut self, value: i16) -> Result<(), StreamError> {
        self.write(value)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), StreamError> {
        self.write(value)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<(), StreamError> {
        self.write(value)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<(), StreamError> {
        self.write(value)
    }

    pub fn write_f64(&mut self, value: f64) -> Result<(), StreamError> {
        self.write(value)
    }

    /// Write raw bytes, never swapped.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        self.inner.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    /// Write a character field of exactly `len` bytes, zero padded or cut off.
    pub fn write_fixed_length_chars(
        &mut self,
        chars: &[u8],
        len: usize,
    ) -> Result<(), StreamError> {
        let used = chars.len().min(len);
        self.write_bytes(&chars[..used])?;
        self.write_zeros(len - used)
    }

    /// Write a run of zero bytes.
    pub fn write_zeros(&mut self, len: usize) -> Result<(), StreamError> {
        const ZEROS: [u8; 64] = [0; 64];
        let mut remaining = len;

        while remaining > 0 {
            let step = remaining.min(ZEROS.len());
            self.write_bytes(&ZEROS[..step])?;
            remaining -= step;
        }

        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), StreamError> {
        self.inner.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{reorder, ByteOrder, ByteReader, ByteWriter, StreamError};
    use std::io::Cursor;

    #[test]
    fn big_endian_reads() {
        let bytes = [0x01, 0xda, 0x00, 0x00, 0x01, 0x00, 0xff, 0xfe];
        let mut reader = ByteReader::new(&bytes[..], ByteOrder::Big);

        assert_eq!(reader.read_i16().unwrap(), 474);
        assert_eq!(reader.read_u32().unwrap(), 256);
        assert_eq!(reader.read_i16().unwrap(), -2);
        assert_eq!(reader.position(), 8);
    }

    #[test]
    fn little_endian_reads() {
        let bytes = [0x34, 0x12, 0x00, 0x00, 0x80, 0x3f];
        let mut reader = ByteReader::new(&bytes[..], ByteOrder::Little);

        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_f32().unwrap(), 1.0);
    }

    #[test]
    fn single_bytes_never_swap() {
        let bytes = [0x80, 0x7f];
        let mut reader = ByteReader::new(&bytes[..], ByteOrder::Big);
        assert_eq!(reader.read_i8().unwrap(), -128);
        assert_eq!(reader.read_u8().unwrap(), 0x7f);
    }

    #[test]
    fn truncated_read_reports_offset() {
        let bytes = [0u8; 3];
        let mut reader = ByteReader::new(&bytes[..], ByteOrder::Little);

        assert!(reader.read_u16().is_ok());
        match reader.read_u32() {
            Err(StreamError::UnexpectedEof { offset, wanted }) => {
                assert_eq!(offset, 2);
                assert_eq!(wanted, 4);
            }
            other => panic!("expected end of stream, got {:?}", other),
        }
    }

    #[test]
    fn oversized_payload_claim_fails() {
        let bytes = [7u8; 5];
        let mut reader = ByteReader::new(&bytes[..], ByteOrder::Little);

        match reader.read_bytes(usize::MAX / 2) {
            Err(StreamError::UnexpectedEof { offset, wanted }) => {
                assert_eq!(offset, 5);
                assert_eq!(wanted, usize::MAX / 2 - 5);
            }
            other => panic!("expected end of stream, got {:?}", other.map(|buf| buf.len())),
        }
    }

    #[test]
    fn payload_reads_exact_length() {
        let bytes = [1u8, 0, 2, 3];
        let mut reader = ByteReader::new(&bytes[..], ByteOrder::Big);
        assert_eq!(&*reader.read_bytes(3).unwrap(), &[1, 0, 2]);
        assert_eq!(reader.position(), 3);
        assert_eq!(reader.read_u8().unwrap(), 3);
    }

    #[test]
    fn fixed_length_chars_keep_zeros() {
        let bytes = *b"ab\0cd";
        let mut reader = ByteReader::new(&bytes[..], ByteOrder::Big);
        assert_eq!(reader.read_fixed_length_chars(5).unwrap(), b"ab\0cd");
    }

    #[test]
    fn writer_mirrors_reader() {
        let mut writer = ByteWriter::new(Vec::new(), ByteOrder::Big);
        writer.write_u16(474).unwrap();
        writer.write_i32(-5).unwrap();
        writer.write_f64(0.25).unwrap();
        writer.write_fixed_length_chars(b"name", 6).unwrap();
        writer.write_zeros(3).unwrap();
        assert_eq!(writer.position(), 2 + 4 + 8 + 6 + 3);

        let bytes = writer.into_inner();
        assert_eq!(&bytes[..2], &[0x01, 0xda]);

        let mut reader = ByteReader::new(Cursor::new(bytes), ByteOrder::Big);
        assert_eq!(reader.read_u16().unwrap(), 474);
        assert_eq!(reader.read_i32().unwrap(), -5);
        assert_eq!(reader.read_f64().unwrap(), 0.25);
        assert_eq!(reader.read_fixed_length_chars(6).unwrap(), b"name\0\0");
        reader.seek_to(0).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 0x01);
    }

    #[test]
    fn reorder_swaps_samples() {
        let mut bytes = [1u8, 2, 3, 4, 5];
        let foreign = if ByteOrder::native() == ByteOrder::Little {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        };

        reorder(&mut bytes, 2, foreign);
        assert_eq!(bytes, [2, 1, 4, 3, 5]);

        reorder(&mut bytes, 2, ByteOrder::native());
        assert_eq!(bytes, [2, 1, 4, 3, 5]);
    }
}
