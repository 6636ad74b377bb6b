//! Decoders and encoders filling and draining [`Image`](crate::Image) buffers.
//!
//! Every format is read through the same contract: point the reader at a file, then either parse
//! only the metadata with `load_header` or the whole file with `load`. A failing load clears the
//! reader, it never keeps a partially decoded state. The [`ImageReader`] enum closes over all
//! supported formats so that the consumer needs no knowledge of which one produced the bytes.
#[cfg(feature = "external-formats")]
pub mod external;
pub mod hgt;
pub mod raw;
pub mod sgi;

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use raster_texel::{SharedBuffer, StreamError};

use crate::image::Image;
use crate::layout::{LayoutError, PixelFormat};

/// An error while decoding or encoding an image file.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("no file path was set")]
    NoPath,
    #[error("the reader holds no decoded image")]
    NotLoaded,
    #[error("no codec handles the file extension {0:?}")]
    UnknownExtension(String),
    #[error("writing {0:?} files is not supported")]
    UnsupportedWrite(FileKind),
    /// The leading magic number does not identify the expected format.
    #[error("bad magic number {found:#x}")]
    BadMagic { found: u32 },
    /// The header is well formed but describes data this codec does not decode.
    #[error("unsupported {what}: {value}")]
    Unsupported { what: &'static str, value: u64 },
    #[error("payload holds {found} bytes, expected {expected}")]
    Truncated { expected: u64, found: u64 },
    #[error("an image of {bytes} bytes cannot be allocated")]
    Allocation { bytes: u64 },
    #[error("corrupt run-length data in scanline {row} of channel {channel}")]
    CorruptRle { row: u32, channel: u32 },
    #[error("no geographic corner can be parsed from {0:?}")]
    MissingGeoreference(String),
    #[error("terrain file of {size} bytes matches no known grid")]
    UnknownTerrain { size: u64 },
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("file i/o failed: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "external-formats")]
    #[error(transparent)]
    External(#[from] image::ImageError),
}

/// The file formats known to this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileKind {
    Raw,
    SgiRgb,
    Hgt,
    Png,
    Tga,
}

/// Geometry and format of a decoded image, as reported by a reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Scanlines of the payload are stored bottom-to-top and must be flipped for display.
    pub bottom_up: bool,
}

/// A reader for any of the supported formats.
#[derive(Debug)]
pub enum ImageReader {
    Raw(raw::RawReader),
    SgiRgb(sgi::SgiReader),
    Hgt(hgt::HgtReader),
    #[cfg(feature = "external-formats")]
    Png(external::ExternalReader),
    #[cfg(feature = "external-formats")]
    Tga(external::ExternalReader),
}

macro_rules! dispatch {
    ($value:expr, $reader:ident => $body:expr) => {
        match $value {
            ImageReader::Raw($reader) => $body,
            ImageReader::SgiRgb($reader) => $body,
            ImageReader::Hgt($reader) => $body,
            #[cfg(feature = "external-formats")]
            ImageReader::Png($reader) => $body,
            #[cfg(feature = "external-formats")]
            ImageReader::Tga($reader) => $body,
        }
    };
}

impl FileKind {
    /// Resolve the format from the extension of a path, ignoring case.
    pub fn from_path(path: &Path) -> Result<Self, CodecError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let kind = match extension.as_str() {
            "raw" => FileKind::Raw,
            "rgb" | "rgba" | "sgi" | "bw" | "int" | "inta" => FileKind::SgiRgb,
            "hgt" => FileKind::Hgt,
            "png" => FileKind::Png,
            "tga" => FileKind::Tga,
            _ => return Err(CodecError::UnknownExtension(extension)),
        };

        Ok(kind)
    }
}

impl ImageReader {
    /// Create the reader for a format, pointed at no file yet.
    pub fn new(kind: FileKind) -> Result<Self, CodecError> {
        let reader = match kind {
            FileKind::Raw => ImageReader::Raw(raw::RawReader::new()),
            FileKind::SgiRgb => ImageReader::SgiRgb(sgi::SgiReader::new()),
            FileKind::Hgt => ImageReader::Hgt(hgt::HgtReader::new()),
            #[cfg(feature = "external-formats")]
            FileKind::Png => {
                ImageReader::Png(external::ExternalReader::new(external::ExternalKind::Png))
            }
            #[cfg(feature = "external-formats")]
            FileKind::Tga => {
                ImageReader::Tga(external::ExternalReader::new(external::ExternalKind::Tga))
            }
            #[cfg(not(feature = "external-formats"))]
            FileKind::Png | FileKind::Tga => {
                return Err(CodecError::Unsupported {
                    what: "file kind without the external-formats feature",
                    value: kind as u64,
                })
            }
        };

        Ok(reader)
    }

    /// Create the reader matching the extension of a path and point it at that path.
    pub fn for_path(path: impl AsRef<Path>) -> Result<Self, CodecError> {
        let path = path.as_ref();
        let mut reader = ImageReader::new(FileKind::from_path(path)?)?;
        reader.set_filename_path(path);
        Ok(reader)
    }

    pub fn kind(&self) -> FileKind {
        match self {
            ImageReader::Raw(_) => FileKind::Raw,
            ImageReader::SgiRgb(_) => FileKind::SgiRgb,
            ImageReader::Hgt(_) => FileKind::Hgt,
            #[cfg(feature = "external-formats")]
            ImageReader::Png(_) => FileKind::Png,
            #[cfg(feature = "external-formats")]
            ImageReader::Tga(_) => FileKind::Tga,
        }
    }

    pub fn set_filename_path(&mut self, path: &Path) {
        dispatch!(self, reader => reader.set_filename_path(path))
    }

    pub fn filename_path(&self) -> Option<&Path> {
        dispatch!(self, reader => reader.filename_path())
    }

    /// Parse only the metadata.
    pub fn load_header(&mut self) -> Result<(), CodecError> {
        dispatch!(self, reader => reader.load_header())
    }

    /// Parse the metadata and decode the payload.
    pub fn load(&mut self) -> Result<(), CodecError> {
        dispatch!(self, reader => reader.load())
    }

    pub fn is_valid(&self) -> bool {
        dispatch!(self, reader => reader.is_valid())
    }

    /// The metadata, after a successful `load_header` or `load`.
    pub fn metadata(&self) -> Option<ImageMetadata> {
        dispatch!(self, reader => reader.metadata())
    }

    /// The decoded payload in native endian, empty after a header-only load.
    pub fn image_data(&self) -> &SharedBuffer {
        dispatch!(self, reader => reader.image_data())
    }

    pub fn clear(&mut self) {
        dispatch!(self, reader => reader.clear())
    }
}

/// Open a file for buffered decoding.
pub(crate) fn open(path: Option<&Path>) -> Result<BufReader<File>, CodecError> {
    let path = path.ok_or(CodecError::NoPath)?;
    Ok(BufReader::new(File::open(path)?))
}

/// The format of an image that holds a complete payload, as every encoder requires.
pub(crate) fn encodable_format(image: &Image) -> Result<PixelFormat, CodecError> {
    match image.internal_format() {
        Some(format) if image.has_image_data() => Ok(format),
        _ => Err(CodecError::NotLoaded),
    }
}

/// Log a rejected file and pass on the error.
pub(crate) fn rejected(codec: &str, path: Option<&Path>, err: CodecError) -> CodecError {
    log::warn!("{}: rejecting {:?}: {}", codec, path, err);
    err
}
