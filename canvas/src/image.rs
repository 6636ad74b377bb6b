//! A byte-buffer based image with a dynamic pixel format.
use std::path::{Path, PathBuf};

use raster_texel::SharedBuffer;

use crate::codec::{hgt, raw, sgi, CodecError, FileKind, ImageMetadata, ImageReader};
use crate::color::NormalizedColor;
use crate::layout::{LayoutError, PixelFormat};
use crate::pixel;
use crate::wrap::WrapMode;

/// A raster of pixels in one of the registered [`PixelFormat`]s.
///
/// The pixel bytes live in a [`SharedBuffer`], so cloning an image or handing out its data is
/// cheap and the bytes are only copied when one of the holders writes to them.
///
/// An image may also hold only metadata, after [`Image::load_header`] or
/// [`Image::unload_image_data`]. Pixel reads on such an image return the zero color and writes are
/// ignored.
#[derive(Clone, Debug, Default)]
pub struct Image {
    buffer: SharedBuffer,
    width: u32,
    height: u32,
    format: Option<PixelFormat>,
    wrap: WrapMode,
    valid: bool,
    path: Option<PathBuf>,
}

impl Image {
    /// Create an empty, invalid image.
    pub fn new() -> Self {
        Image::default()
    }

    /// Create a zero-filled image.
    pub fn with_format(width: u32, height: u32, format: PixelFormat) -> Result<Self, LayoutError> {
        let mut image = Image::new();
        image.set(width, height, format)?;
        Ok(image)
    }

    /// Decode an image from a file, choosing the codec by its extension.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CodecError> {
        let mut image = Image::new();
        image.set_filename_path(path.as_ref());
        image.load()?;
        Ok(image)
    }

    /// Copy geometry, format and payload out of a loaded reader.
    ///
    /// The payload is shared with the reader, not copied, unless its scanlines are stored
    /// bottom-to-top and must be flipped.
    pub fn from_reader(reader: &ImageReader) -> Result<Self, CodecError> {
        let metadata = reader.metadata().ok_or(CodecError::NotLoaded)?;
        let mut image = Image::new();
        image.assign(&metadata, reader.image_data().clone())?;
        image.path = reader.filename_path().map(Path::to_path_buf);
        Ok(image)
    }

    /// Reallocate for a new geometry and format, all pixels are zero.
    pub fn set(&mut self, width: u32, height: u32, format: PixelFormat) -> Result<(), LayoutError> {
        self.set_data(width, height, format, None)
    }

    /// Reallocate for a new geometry and format, copying the pixels from `bytes` if given.
    ///
    /// The length of `bytes` must match the layout exactly. On error the image is unchanged.
    pub fn set_data(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
        bytes: Option<&[u8]>,
    ) -> Result<(), LayoutError> {
        let len = format.image_len(width, height)?;

        let buffer = match bytes {
            Some(bytes) if bytes.len() != len => {
                return Err(LayoutError::LengthMismatch {
                    expected: len,
                    found: bytes.len(),
                })
            }
            Some(bytes) => SharedBuffer::from(bytes),
            None => SharedBuffer::with_len(len),
        };

        self.buffer = buffer;
        self.width = width;
        self.height = height;
        self.format = Some(format);
        self.valid = true;
        Ok(())
    }

    fn assign(&mut self, metadata: &ImageMetadata, data: SharedBuffer) -> Result<(), LayoutError> {
        let len = metadata.format.image_len(metadata.width, metadata.height)?;
        if data.len() != len {
            return Err(LayoutError::LengthMismatch {
                expected: len,
                found: data.len(),
            });
        }

        self.buffer = data;
        self.width = metadata.width;
        self.height = metadata.height;
        self.format = Some(metadata.format);
        self.valid = true;

        if metadata.bottom_up {
            self.flip_vertical();
        }

        Ok(())
    }

    fn assign_header(&mut self, metadata: &ImageMetadata) {
        self.buffer.clear();
        self.width = metadata.width;
        self.height = metadata.height;
        self.format = Some(metadata.format);
        self.valid = true;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The pixel format, `None` for an image that was never set or has been cleared.
    pub fn internal_format(&self) -> Option<PixelFormat> {
        self.format
    }

    /// The pixel bytes in native endian, rows top to bottom.
    pub fn image_data(&self) -> &SharedBuffer {
        &self.buffer
    }

    /// The pixel bytes, detached from any other holder.
    pub fn image_data_mut(&mut self) -> &mut [u8] {
        self.buffer.as_bytes_mut()
    }

    /// Whether the image holds metadata.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether the image holds pixel bytes for its whole layout.
    pub fn has_image_data(&self) -> bool {
        self.format
            .and_then(|format| format.image_len(self.width, self.height).ok())
            .is_some_and(|len| len > 0 && len == self.buffer.len())
    }

    pub fn wrap_mode(&self) -> WrapMode {
        self.wrap
    }

    pub fn set_wrap_mode(&mut self, wrap: WrapMode) {
        self.wrap = wrap;
    }

    pub fn filename_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_filename_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    /// Release the pixel bytes, keep geometry and format.
    pub fn unload_image_data(&mut self) {
        self.buffer.clear();
    }

    /// Drop all data and metadata.
    ///
    /// The file path is kept such that the same file can be loaded again.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.width = 0;
        self.height = 0;
        self.format = None;
        self.valid = false;
    }

    fn pixel_range(&self, x: u32, y: u32) -> Option<(PixelFormat, core::ops::Range<usize>)> {
        let format = self.format?;
        let bpp = format.bytes_per_pixel();
        let start = (y as usize * self.width as usize + x as usize) * bpp;
        let end = start + bpp;

        if end > self.buffer.len() {
            return None;
        }

        Some((format, start..end))
    }

    /// Read the pixel nearest to integer coordinates, resolved by the wrap mode.
    ///
    /// Returns the zero color when the coordinate does not resolve to a pixel.
    pub fn pixel_color(&self, x: i64, y: i64) -> NormalizedColor {
        self.wrap
            .apply(x, y, self.width, self.height)
            .and_then(|(x, y)| self.pixel_range(x, y))
            .map(|(format, range)| (format.info().read)(&self.buffer.as_bytes()[range]))
            .unwrap_or_default()
    }

    /// Sample bilinearly between the four pixels whose centers surround a point.
    ///
    /// Pixel `(x, y)` covers the square from `(x, y)` to `(x + 1, y + 1)`, its center lies at
    /// `(x + 0.5, y + 0.5)`. Sampling exactly at a center returns that pixel unchanged. Each of the
    /// four samples is resolved separately by the wrap mode.
    pub fn sample_color(&self, fx: f64, fy: f64) -> NormalizedColor {
        // The sample to the left/top of the point along each axis, ties go left/top.
        fn lower_sample(coord: f64) -> i64 {
            let pixel = coord.floor();
            let delta = coord - (pixel + 0.5);
            if delta <= 0.0 {
                pixel as i64 - 1
            } else {
                pixel as i64
            }
        }

        let x0 = lower_sample(fx);
        let y0 = lower_sample(fy);

        let tx = (fx - (x0 as f64 + 0.5)).clamp(0.0, 1.0);
        let ty = (fy - (y0 as f64 + 0.5)).clamp(0.0, 1.0);

        let c00 = self.pixel_color(x0, y0);
        let c10 = self.pixel_color(x0 + 1, y0);
        let c01 = self.pixel_color(x0, y0 + 1);
        let c11 = self.pixel_color(x0 + 1, y0 + 1);

        c00 * ((1.0 - tx) * (1.0 - ty))
            + c10 * (tx * (1.0 - ty))
            + c01 * ((1.0 - tx) * ty)
            + c11 * (tx * ty)
    }

    /// Write a pixel, ignored for coordinates outside of the image.
    pub fn set_pixel_color(&mut self, x: i64, y: i64, color: &NormalizedColor) {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return;
        };

        if x >= self.width || y >= self.height {
            return;
        }

        if let Some((format, range)) = self.pixel_range(x, y) {
            (format.info().write)(&mut self.buffer.as_bytes_mut()[range], color);
        }
    }

    /// Mirror the rows, the first row becomes the last.
    pub fn flip_vertical(&mut self) {
        let Some(format) = self.format else {
            return;
        };

        let row = self.width as usize * format.bytes_per_pixel();
        if self.buffer.len() == row * self.height as usize {
            flip_rows(self.buffer.as_bytes_mut(), row);
        }
    }

    /// Mirror the columns, the first pixel of each row becomes the last.
    pub fn flip_horizontal(&mut self) {
        let Some(format) = self.format else {
            return;
        };

        let bpp = format.bytes_per_pixel();
        let row = self.width as usize * bpp;
        if row == 0 || self.buffer.len() != row * self.height as usize {
            return;
        }

        let width = self.width as usize;
        for line in self.buffer.as_bytes_mut().chunks_exact_mut(row) {
            for x in 0..width / 2 {
                let (left, right) = line.split_at_mut((width - 1 - x) * bpp);
                left[x * bpp..(x + 1) * bpp].swap_with_slice(&mut right[..bpp]);
            }
        }
    }

    /// Parse only the metadata of the file at the filename path.
    pub fn load_header(&mut self) -> Result<(), CodecError> {
        let result = self.reader().and_then(|mut reader| {
            reader.load_header()?;
            let metadata = reader.metadata().ok_or(CodecError::NotLoaded)?;
            self.assign_header(&metadata);
            Ok(())
        });

        if result.is_err() {
            self.clear();
        }

        result
    }

    /// Decode the file at the filename path.
    pub fn load(&mut self) -> Result<(), CodecError> {
        let result = self.reader().and_then(|mut reader| {
            reader.load()?;
            let metadata = reader.metadata().ok_or(CodecError::NotLoaded)?;
            self.assign(&metadata, reader.image_data().clone())?;
            Ok(())
        });

        if result.is_err() {
            self.clear();
        }

        result
    }

    fn reader(&self) -> Result<ImageReader, CodecError> {
        let path = self.path.as_deref().ok_or(CodecError::NoPath)?;
        ImageReader::for_path(path)
    }

    /// Encode the image into a file, choosing the codec by its extension.
    ///
    /// `.raw` files use the raw container, SGI extensions are written run-length encoded and
    /// `.hgt` accepts only [`PixelFormat::R16I`] images.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CodecError> {
        let path = path.as_ref();
        match FileKind::from_path(path)? {
            FileKind::Raw => raw::save(path, self),
            FileKind::SgiRgb => sgi::SgiWriter::new(sgi::SgiStorage::Rle).save(path, self),
            FileKind::Hgt => hgt::save(path, self),
            other => Err(CodecError::UnsupportedWrite(other)),
        }
    }
}

/// Reverse the order of the `row`-byte rows of `bytes` in place.
pub(crate) fn flip_rows(bytes: &mut [u8], row: usize) {
    if row == 0 {
        return;
    }

    let rows = bytes.len() / row;
    for y in 0..rows / 2 {
        let (top, bottom) = bytes.split_at_mut((rows - 1 - y) * row);
        top[y * row..(y + 1) * row].swap_with_slice(&mut bottom[..row]);
    }
}

/// Decode the pixel of an image buffer at integer coordinates, no wrapping applied.
pub fn image_pixel(image: &Image, x: u32, y: u32) -> Option<NormalizedColor> {
    let (format, range) = image.pixel_range(x, y)?;
    if x >= image.width || y >= image.height {
        return None;
    }

    pixel::read_pixel(format, &image.buffer.as_bytes()[range]).ok()
}

#[cfg(test)]
mod tests {
    use super::{flip_rows, Image};
    use crate::color::NormalizedColor;
    use crate::layout::{LayoutError, PixelFormat};
    use crate::wrap::WrapMode;

    #[test]
    fn set_allocates_zeroed() {
        let image = Image::with_format(4, 3, PixelFormat::Rgb16Ui).unwrap();
        assert_eq!(image.image_data().len(), 4 * 3 * 3 * 2);
        assert!(image.image_data().iter().all(|&b| b == 0));
        assert!(image.is_valid());
        assert!(image.has_image_data());
    }

    #[test]
    fn set_data_checks_length() {
        let mut image = Image::new();
        let err = image.set_data(2, 2, PixelFormat::R8Ui, Some(&[1, 2, 3]));
        assert_eq!(
            err,
            Err(LayoutError::LengthMismatch {
                expected: 4,
                found: 3
            })
        );
        assert!(!image.is_valid());

        image
            .set_data(2, 2, PixelFormat::R8Ui, Some(&[1, 2, 3, 4]))
            .unwrap();
        assert_eq!(image.image_data().as_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn pixel_write_is_format_identical_to_helpers() {
        let mut image = Image::with_format(2, 1, PixelFormat::Rgba16I).unwrap();
        let color = NormalizedColor::new(0.5, -0.5, 0.25, 0.0);
        image.set_pixel_color(1, 0, &color);

        let mut expected = [0u8; 8];
        crate::pixel::write_pixel(PixelFormat::Rgba16I, &mut expected, &color).unwrap();
        assert_eq!(&image.image_data().as_bytes()[8..], &expected);
        assert_eq!(super::image_pixel(&image, 1, 0), Some(image.pixel_color(1, 0)));
    }

    #[test]
    fn out_of_bounds_write_is_ignored() {
        let mut image = Image::with_format(2, 2, PixelFormat::R8Ui).unwrap();
        image.set_pixel_color(2, 0, &NormalizedColor::new(1.0, 0.0, 0.0, 1.0));
        image.set_pixel_color(-1, 0, &NormalizedColor::new(1.0, 0.0, 0.0, 1.0));
        assert!(image.image_data().iter().all(|&b| b == 0));
    }

    #[test]
    fn border_reads_zero() {
        let mut image = Image::with_format(1, 1, PixelFormat::R8Ui).unwrap();
        image.set_pixel_color(0, 0, &NormalizedColor::new(1.0, 0.0, 0.0, 1.0));
        image.set_wrap_mode(WrapMode::ClampToBorder);

        assert_eq!(image.pixel_color(1, 0), NormalizedColor::default());
        assert_eq!(image.pixel_color(0, 0).red::<u8>(), 255);

        image.set_wrap_mode(WrapMode::Repeat);
        assert_eq!(image.pixel_color(5, -3).red::<u8>(), 255);
    }

    #[test]
    fn writes_do_not_leak_into_clones() {
        let mut image = Image::with_format(2, 2, PixelFormat::R8Ui).unwrap();
        let copy = image.clone();
        image.set_pixel_color(0, 0, &NormalizedColor::new(1.0, 0.0, 0.0, 1.0));

        assert_eq!(image.pixel_color(0, 0).red::<u8>(), 255);
        assert_eq!(copy.pixel_color(0, 0).red::<u8>(), 0);
    }

    #[test]
    fn flips() {
        let mut image = Image::new();
        image
            .set_data(3, 2, PixelFormat::R8Ui, Some(&[1, 2, 3, 4, 5, 6]))
            .unwrap();

        image.flip_vertical();
        assert_eq!(image.image_data().as_bytes(), &[4, 5, 6, 1, 2, 3]);
        image.flip_horizontal();
        assert_eq!(image.image_data().as_bytes(), &[6, 5, 4, 3, 2, 1]);

        let mut odd = [1u8, 2, 3, 4, 5, 6];
        flip_rows(&mut odd, 2);
        assert_eq!(odd, [5, 6, 3, 4, 1, 2]);
    }

    #[test]
    fn unload_and_clear() {
        let mut image = Image::with_format(2, 2, PixelFormat::Rgba8Ui).unwrap();
        image.set_filename_path("tile.raw");

        image.unload_image_data();
        assert!(image.is_valid());
        assert!(!image.has_image_data());
        assert_eq!(image.width(), 2);
        assert_eq!(image.pixel_color(0, 0), NormalizedColor::default());

        image.clear();
        assert!(!image.is_valid());
        assert_eq!(image.internal_format(), None);
        assert_eq!(image.width(), 0);
        assert_eq!(image.filename_path(), Some(std::path::Path::new("tile.raw")));
    }
}
