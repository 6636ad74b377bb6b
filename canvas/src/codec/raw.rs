//! The raw container, an uncompressed dump of an image buffer.
//!
//! All numbers are little endian. The file starts with a fixed block of 64 bytes:
//!
//! | offset | size | field                                  |
//! |--------|------|----------------------------------------|
//! | 0      | 4    | magic, the bytes `RAWI`                |
//! | 4      | 2    | version                                |
//! | 6      | 1    | encoding, `0` for uncompressed         |
//! | 7      | 57   | unused, zero                           |
//!
//! followed by width (`u32`), height (`u32`), the pixel format tag (`u16`) and the payload
//! length in bytes (`u64`). The payload follows immediately, rows top to bottom with each channel
//! sample in little endian.
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use raster_texel::{reorder, ByteOrder, ByteReader, ByteWriter, SharedBuffer};

use super::{CodecError, ImageMetadata};
use crate::image::Image;
use crate::layout::{LayoutError, PixelFormat};

pub const RAW_MAGIC: [u8; 4] = *b"RAWI";
pub const RAW_VERSION: u16 = 1;
/// Length of the block before the geometry fields.
pub const RAW_PREAMBLE_LEN: usize = 64;
/// Offset of the first payload byte.
pub const RAW_DATA_OFFSET: usize = RAW_PREAMBLE_LEN + 4 + 4 + 2 + 8;

/// How the payload is encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RawEncoding {
    Uncompressed = 0,
}

/// The parsed header of a raw container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawHeader {
    pub version: u16,
    pub encoding: RawEncoding,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub payload_len: u64,
}

/// Reads raw container files.
#[derive(Debug, Default)]
pub struct RawReader {
    path: Option<PathBuf>,
    header: Option<RawHeader>,
    data: SharedBuffer,
}

impl RawHeader {
    fn read<R: Read>(stream: &mut ByteReader<R>) -> Result<Self, CodecError> {
        let magic = stream.read_fixed_length_chars(RAW_MAGIC.len())?;
        if magic != RAW_MAGIC {
            let mut found = [0; 4];
            found.copy_from_slice(&magic);
            return Err(CodecError::BadMagic {
                found: u32::from_le_bytes(found),
            });
        }

        let version = stream.read_u16()?;
        if version > RAW_VERSION {
            return Err(CodecError::Unsupported {
                what: "raw container version",
                value: version.into(),
            });
        }

        let encoding = match stream.read_u8()? {
            0 => RawEncoding::Uncompressed,
            other => {
                return Err(CodecError::Unsupported {
                    what: "raw encoding",
                    value: other.into(),
                })
            }
        };

        stream.skip((RAW_PREAMBLE_LEN - 7) as u64)?;

        let width = stream.read_u32()?;
        let height = stream.read_u32()?;
        let format = PixelFormat::from_tag(stream.read_u16()?)?;
        let payload_len = stream.read_u64()?;

        let expected = format.image_len(width, height)?;
        if payload_len != expected as u64 {
            return Err(LayoutError::LengthMismatch {
                expected,
                found: payload_len.try_into().unwrap_or(usize::MAX),
            }
            .into());
        }

        Ok(RawHeader {
            version,
            encoding,
            width,
            height,
            format,
            payload_len,
        })
    }

    fn write<W: Write>(&self, stream: &mut ByteWriter<W>) -> Result<(), CodecError> {
        stream.write_bytes(&RAW_MAGIC)?;
        stream.write_u16(self.version)?;
        stream.write_u8(self.encoding as u8)?;
        stream.write_zeros(RAW_PREAMBLE_LEN - 7)?;
        stream.write_u32(self.width)?;
        stream.write_u32(self.height)?;
        stream.write_u16(self.format.tag())?;
        stream.write_u64(self.payload_len)?;
        Ok(())
    }
}

impl RawReader {
    pub fn new() -> Self {
        RawReader::default()
    }

    pub fn set_filename_path(&mut self, path: &Path) {
        self.path = Some(path.to_path_buf());
    }

    pub fn filename_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn load_header(&mut self) -> Result<(), CodecError> {
        self.load_file(true)
    }

    pub fn load(&mut self) -> Result<(), CodecError> {
        self.load_file(false)
    }

    fn load_file(&mut self, header_only: bool) -> Result<(), CodecError> {
        match super::open(self.filename_path()) {
            Ok(file) => self.decode(file, header_only),
            Err(err) => {
                self.clear();
                Err(super::rejected("raw", self.filename_path(), err))
            }
        }
    }

    /// Decode a container from any byte source.
    ///
    /// On error the reader is cleared.
    pub fn decode<R: Read>(&mut self, src: R, header_only: bool) -> Result<(), CodecError> {
        self.clear();

        let mut stream = ByteReader::new(src, ByteOrder::Little);
        let result = RawHeader::read(&mut stream).and_then(|header| {
            log::debug!(
                "raw: {}x{} {:?}, {} payload bytes",
                header.width,
                header.height,
                header.format,
                header.payload_len
            );

            if !header_only {
                let mut data = stream.read_bytes(header.payload_len as usize)?;
                let sample = usize::from(header.format.bytes_per_channel());
                reorder(data.as_bytes_mut(), sample, ByteOrder::Little);
                self.data = data;
            }

            Ok(header)
        });

        match result {
            Ok(header) => {
                self.header = Some(header);
                Ok(())
            }
            Err(err) => {
                self.clear();
                Err(super::rejected("raw", self.filename_path(), err))
            }
        }
    }

    pub fn header(&self) -> Option<&RawHeader> {
        self.header.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.header.is_some()
    }

    pub fn metadata(&self) -> Option<ImageMetadata> {
        self.header.map(|header| ImageMetadata {
            width: header.width,
            height: header.height,
            format: header.format,
            bottom_up: false,
        })
    }

    pub fn image_data(&self) -> &SharedBuffer {
        &self.data
    }

    /// Forget header and payload, the path is kept.
    pub fn clear(&mut self) {
        self.header = None;
        self.data.clear();
    }
}

/// Encode an image as a raw container.
pub fn encode<W: Write>(image: &Image, dst: W) -> Result<(), CodecError> {
    let format = super::encodable_format(image)?;
    let data = image.image_data();
    let header = RawHeader {
        version: RAW_VERSION,
        encoding: RawEncoding::Uncompressed,
        width: image.width(),
        height: image.height(),
        format,
        payload_len: data.len() as u64,
    };

    let mut stream = ByteWriter::new(dst, ByteOrder::Little);
    header.write(&mut stream)?;

    let sample = usize::from(format.bytes_per_channel());
    if ByteOrder::Little.is_swapped() && sample > 1 {
        let mut swapped = data.as_bytes().to_vec();
        reorder(&mut swapped, sample, ByteOrder::Little);
        stream.write_bytes(&swapped)?;
    } else {
        stream.write_bytes(data.as_bytes())?;
    }

    stream.flush()?;
    Ok(())
}

/// Write an image to a raw container file.
pub fn save(path: &Path, image: &Image) -> Result<(), CodecError> {
    super::encodable_format(image)?;
    let file = BufWriter::new(File::create(path)?);
    encode(image, file)
}
