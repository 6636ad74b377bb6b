//! The SGI image format, also known by its extensions `.rgb`, `.rgba`, `.bw` and `.sgi`.
//!
//! A big endian header of 512 bytes is followed by channel planar data, scanlines stored from the
//! bottom of the image upwards. Data is either stored verbatim or compressed per scanline and
//! channel with a run-length scheme. Only one byte per channel is supported.
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use raster_texel::{ByteOrder, ByteReader, ByteWriter, SharedBuffer};

use super::{CodecError, ImageMetadata};
use crate::image::Image;
use crate::layout::{PixelFormat, SampleKind};

pub const SGI_MAGIC: i16 = 474;
/// Image data starts at this absolute offset.
pub const SGI_HEADER_LEN: u64 = 512;
/// The length of the raw image name field.
pub const SGI_NAME_LEN: usize = 80;

/// How the pixel data of a file is stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum SgiStorage {
    #[default]
    Verbatim = 0,
    Rle = 1,
}

/// The parsed header of an SGI file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SgiHeader {
    pub storage: SgiStorage,
    pub bytes_per_channel: u8,
    pub dimension: u16,
    pub width: u16,
    pub height: u16,
    pub channels: u16,
    pub min_value: i32,
    pub max_value: i32,
    /// The raw name field, not trimmed at an embedded zero byte.
    pub name: Vec<u8>,
    pub colormap: i32,
}

/// Reads SGI files.
#[derive(Debug, Default)]
pub struct SgiReader {
    path: Option<PathBuf>,
    header: Option<SgiHeader>,
    format: Option<PixelFormat>,
    data: SharedBuffer,
}

/// Writes SGI files from 8-bit images with one, three or four channels.
#[derive(Clone, Debug, Default)]
pub struct SgiWriter {
    storage: SgiStorage,
    name: Vec<u8>,
}

impl SgiHeader {
    fn read<R: Read + Seek>(stream: &mut ByteReader<R>) -> Result<Self, CodecError> {
        let magic = stream.read_i16()?;
        if magic != SGI_MAGIC {
            return Err(CodecError::BadMagic {
                found: u32::from(magic as u16),
            });
        }

        let storage = match stream.read_u8()? {
            0 => SgiStorage::Verbatim,
            1 => SgiStorage::Rle,
            other => {
                return Err(CodecError::Unsupported {
                    what: "sgi storage",
                    value: other.into(),
                })
            }
        };

        let bytes_per_channel = stream.read_u8()?;
        let dimension = stream.read_u16()?;
        let width = stream.read_u16()?;
        let height = stream.read_u16()?;
        let channels = stream.read_u16()?;
        let min_value = stream.read_i32()?;
        let max_value = stream.read_i32()?;
        stream.skip(4)?;
        let name = stream.read_fixed_length_chars(SGI_NAME_LEN)?;
        let colormap = stream.read_i32()?;
        stream.seek_to(SGI_HEADER_LEN)?;

        let mut header = SgiHeader {
            storage,
            bytes_per_channel,
            dimension,
            width,
            height,
            channels,
            min_value,
            max_value,
            name,
            colormap,
        };

        // Fewer dimensions leave the trailing sizes meaningless.
        match dimension {
            1 => {
                header.height = 1;
                header.channels = 1;
            }
            2 => header.channels = 1,
            3 => {}
            other => {
                return Err(CodecError::Unsupported {
                    what: "sgi dimension count",
                    value: other.into(),
                })
            }
        }

        Ok(header)
    }

    fn write<W: Write>(&self, stream: &mut ByteWriter<W>) -> Result<(), CodecError> {
        stream.write_i16(SGI_MAGIC)?;
        stream.write_u8(self.storage as u8)?;
        stream.write_u8(self.bytes_per_channel)?;
        stream.write_u16(self.dimension)?;
        stream.write_u16(self.width)?;
        stream.write_u16(self.height)?;
        stream.write_u16(self.channels)?;
        stream.write_i32(self.min_value)?;
        stream.write_i32(self.max_value)?;
        stream.write_zeros(4)?;
        stream.write_fixed_length_chars(&self.name, SGI_NAME_LEN)?;
        stream.write_i32(self.colormap)?;

        let written = stream.position();
        stream.write_zeros((SGI_HEADER_LEN - written) as usize)?;
        Ok(())
    }

    /// The pixel format of the decoded data.
    pub fn format(&self) -> Result<PixelFormat, CodecError> {
        if self.bytes_per_channel != 1 {
            return Err(CodecError::Unsupported {
                what: "sgi bytes per channel",
                value: self.bytes_per_channel.into(),
            });
        }

        u8::try_from(self.channels)
            .ok()
            .and_then(|channels| PixelFormat::find(channels, SampleKind::U8))
            .ok_or(CodecError::Unsupported {
                what: "sgi channel count",
                value: self.channels.into(),
            })
    }

    fn pixels(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }
}

impl SgiReader {
    pub fn new() -> Self {
        SgiReader::default()
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
                Err(super::rejected("sgi", self.filename_path(), err))
            }
        }
    }

    /// Decode an SGI image from a seekable byte source.
    ///
    /// The payload is pixel interleaved, its scanlines remain bottom-to-top. On error the reader
    /// is cleared.
    pub fn decode<R: Read + Seek>(&mut self, src: R, header_only: bool) -> Result<(), CodecError> {
        self.clear();

        let mut stream = ByteReader::new(src, ByteOrder::Big);
        let result = SgiHeader::read(&mut stream).and_then(|header| {
            let format = header.format()?;
            log::debug!(
                "sgi: {}x{}x{} {:?}",
                header.width,
                header.height,
                header.channels,
                header.storage
            );

            if !header_only {
                let planar = match header.storage {
                    SgiStorage::Verbatim => {
                        let len = header.pixels() * usize::from(header.channels);
                        stream.read_bytes(len)?.into_vec()
                    }
                    SgiStorage::Rle => read_rle_planes(&mut stream, &header)?,
                };

                let channels = usize::from(header.channels);
                self.data = SharedBuffer::from(interleave(&planar, header.pixels(), channels));
            }

            Ok((header, format))
        });

        match result {
            Ok((header, format)) => {
                self.header = Some(header);
                self.format = Some(format);
                Ok(())
            }
            Err(err) => {
                self.clear();
                Err(super::rejected("sgi", self.filename_path(), err))
            }
        }
    }

    pub fn header(&self) -> Option<&SgiHeader> {
        self.header.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.header.is_some()
    }

    pub fn metadata(&self) -> Option<ImageMetadata> {
        let header = self.header.as_ref()?;
        Some(ImageMetadata {
            width: header.width.into(),
            height: header.height.into(),
            format: self.format?,
            bottom_up: true,
        })
    }

    pub fn image_data(&self) -> &SharedBuffer {
        &self.data
    }

    /// Forget header and payload, the path is kept.
    pub fn clear(&mut self) {
        self.header = None;
        self.format = None;
        self.data.clear();
    }
}

/// Read the offset tables and decode every scanline of every channel into planar order.
fn read_rle_planes<R: Read>(
    stream: &mut ByteReader<R>,
    header: &SgiHeader,
) -> Result<Vec<u8>, CodecError> {
    let height = usize::from(header.height);
    let width = usize::from(header.width);
    let count = height * usize::from(header.channels);

    let mut starts = Vec::with_capacity(count);
    for _ in 0..count {
        starts.push(stream.read_i32()?);
    }

    let mut lengths = Vec::with_capacity(count);
    for _ in 0..count {
        lengths.push(stream.read_i32()?);
    }

    // Offsets in the tables count from the start of the file.
    let pool_start = stream.position();
    let pool = stream.read_to_end()?;

    let mut sources = Vec::with_capacity(count);
    for (idx, (&start, &length)) in starts.iter().zip(&lengths).enumerate() {
        let corrupt = || CodecError::CorruptRle {
            row: (idx % height) as u32,
            channel: (idx / height) as u32,
        };

        let begin = u64::try_from(start)
            .ok()
            .and_then(|start| start.checked_sub(pool_start))
            .ok_or_else(corrupt)? as usize;
        let length = usize::try_from(length).map_err(|_| corrupt())?;
        let source = begin
            .checked_add(length)
            .and_then(|end| pool.get(begin..end))
            .ok_or_else(corrupt)?;
        sources.push(source);
    }

    // Scanlines may share their runs, the decoded size is only bounded by the header.
    let len = count * width;
    let mut planar = Vec::new();
    planar
        .try_reserve_exact(len)
        .map_err(|_| CodecError::Allocation { bytes: len as u64 })?;
    planar.resize(len, 0);

    for (idx, source) in sources.into_iter().enumerate() {
        let scanline = &mut planar[idx * width..(idx + 1) * width];
        decode_rle_scanline(source, scanline).ok_or(CodecError::CorruptRle {
            row: (idx % height) as u32,
            channel: (idx / height) as u32,
        })?;
    }

    Ok(planar)
}

/// Expand one run-length encoded scanline into `dst`.
///
/// Each control byte holds a count in its low seven bits. With the high bit set the next `count`
/// bytes are copied literally, otherwise the next byte is repeated `count` times. A count of zero
/// ends the scanline. Returns the number of bytes written, or `None` if the runs do not fit into
/// `dst` or the source ends within a run.
pub fn decode_rle_scanline(src: &[u8], dst: &mut [u8]) -> Option<usize> {
    let mut src = src.iter().copied();
    let mut written = 0;

    while let Some(control) = src.next() {
        let count = usize::from(control & 0x7f);
        if count == 0 {
            break;
        }

        let run = dst.get_mut(written..written + count)?;
        if control & 0x80 != 0 {
            for byte in run.iter_mut() {
                *byte = src.next()?;
            }
        } else {
            run.fill(src.next()?);
        }

        written += count;
    }

    Some(written)
}

/// Compress one scanline, appending the runs and a terminating zero to `dst`.
pub fn encode_rle_scanline(src: &[u8], dst: &mut Vec<u8>) {
    const MAX_RUN: usize = 0x7f;

    fn repeat_len(src: &[u8]) -> usize {
        let first = src[0];
        src.iter()
            .take(MAX_RUN)
            .take_while(|&&byte| byte == first)
            .count()
    }

    let mut pos = 0;
    while pos < src.len() {
        let repeat = repeat_len(&src[pos..]);
        if repeat >= 3 {
            dst.push(repeat as u8);
            dst.push(src[pos]);
            pos += repeat;
            continue;
        }

        // Collect literals until a repeat worth encoding starts.
        let start = pos;
        while pos < src.len() && pos - start < MAX_RUN && repeat_len(&src[pos..]) < 3 {
            pos += 1;
        }

        dst.push(0x80 | (pos - start) as u8);
        dst.extend_from_slice(&src[start..pos]);
    }

    dst.push(0);
}

/// Convert channel planar bytes into pixel interleaved bytes.
fn interleave(planar: &[u8], pixels: usize, channels: usize) -> Vec<u8> {
    let mut interleaved = vec![0; pixels * channels];

    for (channel, plane) in planar.chunks_exact(pixels.max(1)).take(channels).enumerate() {
        for (pixel, &value) in plane.iter().enumerate() {
            interleaved[pixel * channels + channel] = value;
        }
    }

    interleaved
}

impl SgiWriter {
    pub fn new(storage: SgiStorage) -> Self {
        SgiWriter {
            storage,
            name: Vec::new(),
        }
    }

    /// Set the image name stored in the header, cut off at 80 bytes.
    pub fn with_name(mut self, name: &[u8]) -> Self {
        self.name = name.to_vec();
        self
    }

    fn header_for(&self, image: &Image) -> Result<SgiHeader, CodecError> {
        let format = super::encodable_format(image)?;
        if format.sample_kind() != SampleKind::U8 {
            return Err(CodecError::Unsupported {
                what: "sgi output format",
                value: format.tag().into(),
            });
        }

        let too_large = |value: u32| CodecError::Unsupported {
            what: "sgi dimension",
            value: value.into(),
        };

        let width = u16::try_from(image.width()).map_err(|_| too_large(image.width()))?;
        let height = u16::try_from(image.height()).map_err(|_| too_large(image.height()))?;
        let channels = format.channels();

        Ok(SgiHeader {
            storage: self.storage,
            bytes_per_channel: 1,
            dimension: if channels == 1 { 2 } else { 3 },
            width,
            height,
            channels: channels.into(),
            min_value: 0,
            max_value: 255,
            name: self.name.clone(),
            colormap: 0,
        })
    }

    /// Encode an image, rows are written bottom-to-top.
    pub fn encode<W: Write>(&self, image: &Image, dst: W) -> Result<(), CodecError> {
        let header = self.header_for(image)?;
        let planes = planar_bottom_up(image.image_data(), &header);
        let mut stream = ByteWriter::new(dst, ByteOrder::Big);
        header.write(&mut stream)?;

        match self.storage {
            SgiStorage::Verbatim => stream.write_bytes(&planes)?,
            SgiStorage::Rle => write_rle_planes(&mut stream, &planes, &header)?,
        }

        stream.flush()?;
        Ok(())
    }

    /// Write an image to an SGI file.
    pub fn save(&self, path: &Path, image: &Image) -> Result<(), CodecError> {
        self.header_for(image)?;
        let file = BufWriter::new(File::create(path)?);
        self.encode(image, file)
    }
}

/// Split interleaved top-to-bottom pixels into channel planes of bottom-to-top rows.
fn planar_bottom_up(data: &[u8], header: &SgiHeader) -> Vec<u8> {
    let width = usize::from(header.width);
    let height = usize::from(header.height);
    let channels = usize::from(header.channels);
    let mut planes = vec![0; width * height * channels];

    for channel in 0..channels {
        let plane = &mut planes[channel * width * height..][..width * height];
        for (file_row, row) in plane.chunks_exact_mut(width.max(1)).enumerate() {
            let image_row = height - 1 - file_row;
            for (x, value) in row.iter_mut().enumerate() {
                *value = data[(image_row * width + x) * channels + channel];
            }
        }
    }

    planes
}

fn write_rle_planes<W: Write>(
    stream: &mut ByteWriter<W>,
    planes: &[u8],
    header: &SgiHeader,
) -> Result<(), CodecError> {
    let width = usize::from(header.width);
    let count = usize::from(header.height) * usize::from(header.channels);

    let mut starts = Vec::with_capacity(count);
    let mut lengths = Vec::with_capacity(count);
    let mut pool = Vec::new();
    let pool_start = SGI_HEADER_LEN as usize + 2 * 4 * count;

    for idx in 0..count {
        let before = pool.len();
        encode_rle_scanline(&planes[idx * width..(idx + 1) * width], &mut pool);
        starts.push(pool_start + before);
        lengths.push(pool.len() - before);
    }

    let offset_error = |value: usize| CodecError::Unsupported {
        what: "sgi rle offset",
        value: value as u64,
    };

    for &start in &starts {
        stream.write_i32(i32::try_from(start).map_err(|_| offset_error(start))?)?;
    }

    for &length in &lengths {
        stream.write_i32(i32::try_from(length).map_err(|_| offset_error(length))?)?;
    }

    stream.write_bytes(&pool)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        decode_rle_scanline, encode_rle_scanline, interleave, SgiReader, SgiStorage, SgiWriter,
        SGI_HEADER_LEN,
    };
    use crate::codec::CodecError;
    use crate::image::Image;
    use crate::layout::PixelFormat;
    use std::io::Cursor;

    #[test]
    fn rle_control_bytes() {
        // Three copies of 7, two literals, then the terminator.
        let src = [0x03, 7, 0x82, 1, 2, 0x00, 0x05, 9];
        let mut dst = [0u8; 8];

        assert_eq!(decode_rle_scanline(&src, &mut dst), Some(5));
        assert_eq!(dst, [7, 7, 7, 1, 2, 0, 0, 0]);
    }

    #[test]
    fn rle_overflow_is_rejected() {
        let mut dst = [0u8; 2];
        assert_eq!(decode_rle_scanline(&[0x03, 1], &mut dst), None);
        assert_eq!(decode_rle_scanline(&[0x82, 1], &mut dst), None);
    }

    #[test]
    fn rle_scanline_matches_verbatim() {
        let scanline: Vec<u8> = [0u8, 0, 0, 0, 5, 6, 7, 7, 8, 8, 8, 8, 8, 1]
            .into_iter()
            .chain((0..200).map(|i| (i % 3) as u8))
            .chain(core::iter::repeat(9).take(300))
            .collect();

        let mut encoded = Vec::new();
        encode_rle_scanline(&scanline, &mut encoded);
        assert_eq!(encoded.last(), Some(&0));
        assert!(encoded.len() < scanline.len());

        let mut decoded = vec![0; scanline.len()];
        assert_eq!(
            decode_rle_scanline(&encoded, &mut decoded),
            Some(scanline.len())
        );
        assert_eq!(decoded, scanline);
    }

    #[test]
    fn planar_to_interleaved() {
        let planar = [1, 2, 3, 10, 20, 30];
        assert_eq!(interleave(&planar, 3, 2), vec![1, 10, 2, 20, 3, 30]);
    }

    fn gradient(format: PixelFormat, width: u32, height: u32) -> Image {
        let mut image = Image::with_format(width, height, format).unwrap();
        for (idx, byte) in image.image_data_mut().iter_mut().enumerate() {
            *byte = (idx * 7 % 256) as u8;
        }
        image
    }

    fn decode(bytes: Vec<u8>) -> Result<SgiReader, CodecError> {
        let mut reader = SgiReader::new();
        reader.decode(Cursor::new(bytes), false)?;
        Ok(reader)
    }

    #[test]
    fn both_storages_decode_identically() {
        let image = gradient(PixelFormat::Rgb8Ui, 5, 4);

        let mut verbatim = Vec::new();
        SgiWriter::new(SgiStorage::Verbatim)
            .encode(&image, &mut verbatim)
            .unwrap();
        let mut rle = Vec::new();
        SgiWriter::new(SgiStorage::Rle)
            .encode(&image, &mut rle)
            .unwrap();

        assert_eq!(verbatim.len(), SGI_HEADER_LEN as usize + 5 * 4 * 3);
        assert_eq!(&verbatim[..2], &[0x01, 0xda]);

        let verbatim = decode(verbatim).unwrap();
        let rle = decode(rle).unwrap();
        assert_eq!(verbatim.image_data(), rle.image_data());

        let metadata = rle.metadata().unwrap();
        assert_eq!(metadata.format, PixelFormat::Rgb8Ui);
        assert!(metadata.bottom_up);

        let decoded = Image::from_reader(&crate::codec::ImageReader::SgiRgb(rle)).unwrap();
        assert_eq!(decoded.image_data(), image.image_data());
    }

    #[test]
    fn name_is_kept_raw() {
        let image = gradient(PixelFormat::R8Ui, 2, 2);
        let mut bytes = Vec::new();
        SgiWriter::new(SgiStorage::Verbatim)
            .with_name(b"abc\0def")
            .encode(&image, &mut bytes)
            .unwrap();

        let reader = decode(bytes).unwrap();
        let name = &reader.header().unwrap().name;
        assert_eq!(name.len(), 80);
        assert_eq!(&name[..7], b"abc\0def");
    }

    #[test]
    fn wide_channels_fail_closed() {
        let image = gradient(PixelFormat::Rgba8Ui, 2, 2);
        let mut bytes = Vec::new();
        SgiWriter::new(SgiStorage::Verbatim)
            .encode(&image, &mut bytes)
            .unwrap();
        // Claim two bytes per channel.
        bytes[3] = 2;

        let mut reader = SgiReader::new();
        assert!(matches!(
            reader.decode(Cursor::new(bytes), false),
            Err(CodecError::Unsupported { value: 2, .. })
        ));
        assert!(!reader.is_valid());
        assert!(reader.image_data().is_empty());
    }

    #[test]
    fn bad_magic_fails_closed() {
        let mut bytes = vec![0u8; SGI_HEADER_LEN as usize];
        bytes[0] = 0x12;
        let mut reader = SgiReader::new();
        assert!(matches!(
            reader.decode(Cursor::new(bytes), true),
            Err(CodecError::BadMagic { .. })
        ));
    }

    #[test]
    fn rle_with_bad_offsets_is_corrupt() {
        let image = gradient(PixelFormat::R8Ui, 3, 2);
        let mut bytes = Vec::new();
        SgiWriter::new(SgiStorage::Rle)
            .encode(&image, &mut bytes)
            .unwrap();
        // Point the first scanline into the header.
        bytes[512..516].copy_from_slice(&16i32.to_be_bytes());

        let mut reader = SgiReader::new();
        assert!(matches!(
            reader.decode(Cursor::new(bytes), false),
            Err(CodecError::CorruptRle { row: 0, channel: 0 })
        ));
    }

    fn encoded(storage: SgiStorage, image: &Image) -> Vec<u8> {
        let mut bytes = Vec::new();
        SgiWriter::new(storage).encode(image, &mut bytes).unwrap();
        bytes
    }

    fn assert_truncated(bytes: Vec<u8>) {
        let mut reader = SgiReader::new();
        let result = reader.decode(Cursor::new(bytes), false);
        assert!(matches!(result, Err(CodecError::Stream(_))), "{:?}", result);
        assert!(!reader.is_valid());
        assert!(reader.image_data().is_empty());
    }

    #[test]
    fn short_verbatim_payload_fails_closed() {
        let mut bytes = encoded(SgiStorage::Verbatim, &gradient(PixelFormat::Rgb8Ui, 4, 3));
        bytes.truncate(bytes.len() - 5);
        assert_truncated(bytes);
    }

    #[test]
    fn cut_offset_tables_fail_closed() {
        let mut bytes = encoded(SgiStorage::Rle, &gradient(PixelFormat::Rgba8Ui, 4, 3));
        // Twelve scanlines, the table of starts ends halfway through.
        bytes.truncate(SGI_HEADER_LEN as usize + 6 * 4 + 2);
        assert_truncated(bytes);
    }

    #[test]
    fn oversized_header_claims_fail_closed() {
        for storage in [SgiStorage::Verbatim, SgiStorage::Rle] {
            let mut bytes = encoded(storage, &gradient(PixelFormat::Rgba8Ui, 2, 2));
            bytes.truncate(SGI_HEADER_LEN as usize);
            bytes[6..12].copy_from_slice(&[0xff, 0xff, 0xff, 0xff, 0x00, 0x04]);
            assert_truncated(bytes);
        }
    }

    #[test]
    fn non_u8_images_are_not_written() {
        let image = Image::with_format(1, 1, PixelFormat::Rgb16Ui).unwrap();
        assert!(SgiWriter::new(SgiStorage::Rle)
            .encode(&image, Vec::new())
            .is_err());
    }
}
