//! PNG and TGA files, decoded by the `image` crate and exposed through the common reader contract.
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use image::codecs::png::PngDecoder;
use image::codecs::tga::TgaDecoder;
use image::{ColorType, DynamicImage, ImageDecoder};
use raster_texel::SharedBuffer;

use super::{CodecError, ImageMetadata};
use crate::layout::PixelFormat;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExternalKind {
    Png,
    Tga,
}

/// Reads files of an [`ExternalKind`].
///
/// Gray-alpha images are widened to RGBA, the other color types map onto the format with the
/// same channels and sample type. Rows are top-to-bottom.
#[derive(Debug)]
pub struct ExternalReader {
    kind: ExternalKind,
    path: Option<PathBuf>,
    metadata: Option<ImageMetadata>,
    data: SharedBuffer,
}

impl ExternalKind {
    fn name(self) -> &'static str {
        match self {
            ExternalKind::Png => "png",
            ExternalKind::Tga => "tga",
        }
    }
}

impl ExternalReader {
    pub fn new(kind: ExternalKind) -> Self {
        ExternalReader {
            kind,
            path: None,
            metadata: None,
            data: SharedBuffer::default(),
        }
    }

    pub fn kind(&self) -> ExternalKind {
        self.kind
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
                Err(super::rejected(self.kind.name(), self.filename_path(), err))
            }
        }
    }

    /// Decode from a byte source. On error the reader is cleared.
    pub fn decode<R: Read + Seek>(&mut self, src: R, header_only: bool) -> Result<(), CodecError> {
        self.clear();

        let result = match self.kind {
            ExternalKind::Png => PngDecoder::new(src)
                .map_err(CodecError::from)
                .and_then(|decoder| self.decode_with(decoder, header_only)),
            ExternalKind::Tga => TgaDecoder::new(src)
                .map_err(CodecError::from)
                .and_then(|decoder| self.decode_with(decoder, header_only)),
        };

        result.map_err(|err| {
            self.clear();
            super::rejected(self.kind.name(), self.filename_path(), err)
        })
    }

    fn decode_with<'a, D: ImageDecoder<'a>>(
        &mut self,
        decoder: D,
        header_only: bool,
    ) -> Result<(), CodecError> {
        let (width, height) = decoder.dimensions();
        let format = format_of(decoder.color_type())?;
        log::debug!("{}: {}x{} {:?}", self.kind.name(), width, height, format);

        if !header_only {
            let image = DynamicImage::from_decoder(decoder)?;
            self.data = SharedBuffer::from(pixel_bytes(image));
        }

        self.metadata = Some(ImageMetadata {
            width,
            height,
            format,
            bottom_up: false,
        });

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.metadata.is_some()
    }

    pub fn metadata(&self) -> Option<ImageMetadata> {
        self.metadata
    }

    pub fn image_data(&self) -> &SharedBuffer {
        &self.data
    }

    /// Forget metadata and payload, the path is kept.
    pub fn clear(&mut self) {
        self.metadata = None;
        self.data.clear();
    }
}

fn format_of(color: ColorType) -> Result<PixelFormat, CodecError> {
    let format = match color {
        ColorType::L8 => PixelFormat::R8Ui,
        ColorType::Rgb8 => PixelFormat::Rgb8Ui,
        ColorType::La8 | ColorType::Rgba8 => PixelFormat::Rgba8Ui,
        ColorType::L16 => PixelFormat::R16Ui,
        ColorType::Rgb16 => PixelFormat::Rgb16Ui,
        ColorType::La16 | ColorType::Rgba16 => PixelFormat::Rgba16Ui,
        ColorType::Rgb32F => PixelFormat::Rgb32F,
        ColorType::Rgba32F => PixelFormat::Rgba32F,
        other => {
            return Err(CodecError::Unsupported {
                what: "external color type with bytes per pixel",
                value: other.bytes_per_pixel().into(),
            })
        }
    };

    Ok(format)
}

/// The native endian samples of a decoded image in the layout chosen by `format_of`.
fn pixel_bytes(image: DynamicImage) -> Vec<u8> {
    match image {
        DynamicImage::ImageLumaA8(_) => image.to_rgba8().into_raw(),
        DynamicImage::ImageLumaA16(_) => {
            bytemuck::cast_slice(&image.to_rgba16().into_raw()).to_vec()
        }
        other => other.as_bytes().to_vec(),
    }
}
