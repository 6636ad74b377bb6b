//! Defines the pixel formats of our images.
use half::f16;

use crate::color::NormalizedColor;
use crate::pixel;

/// The numeric type of every channel in a pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F16,
    F32,
}

/// An error describing an impossible or mismatched buffer layout.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// The byte size of the image does not fit into memory.
    #[error("an image of {width}x{height} pixels does not fit in memory")]
    TooLarge { width: u32, height: u32 },
    /// A given payload does not have the length demanded by the layout.
    #[error("payload holds {found} bytes, layout requires {expected}")]
    LengthMismatch { expected: usize, found: usize },
    /// No format is registered for a tag.
    #[error("no pixel format has the tag {0}")]
    UnknownTag(u16),
}

/// One row of the format registry.
///
/// Every property of a format is constant, including the functions converting between its
/// bytes and a [`NormalizedColor`]. All pixel reads and writes dispatch through this table.
#[derive(Clone, Copy)]
pub(crate) struct FormatInfo {
    pub(crate) format: PixelFormat,
    pub(crate) name: &'static str,
    pub(crate) channels: u8,
    pub(crate) kind: SampleKind,
    /// Decode one pixel from native endian bytes, the slice holds at least one pixel.
    pub(crate) read: fn(&[u8]) -> NormalizedColor,
    /// Encode one pixel to native endian bytes, the slice holds at least one pixel.
    pub(crate) write: fn(&mut [u8], &NormalizedColor),
}

macro_rules! pixel_formats {
    ($(
        $(#[$attr:meta])*
        $format:ident = $tag:literal: $channels:literal x $ty:ty, $kind:ident;
    )*) => {
        /// Identifies the channel count and channel type of a raster buffer.
        ///
        /// The discriminant is the stable tag under which a format is stored in files.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum PixelFormat {
            $($(#[$attr])* $format = $tag,)*
        }

        static REGISTRY: &[FormatInfo] = &[
            $(FormatInfo {
                format: PixelFormat::$format,
                name: stringify!($format),
                channels: $channels,
                kind: SampleKind::$kind,
                read: pixel::read::<$ty, $channels>,
                write: pixel::write::<$ty, $channels>,
            },)*
        ];
    };
}

pixel_formats! {
    /// One unsigned 8-bit channel.
    R8Ui = 0: 1 x u8, U8;
    R8I = 1: 1 x i8, I8;
    R16Ui = 2: 1 x u16, U16;
    /// One signed 16-bit channel, the format of terrain elevation grids.
    R16I = 3: 1 x i16, I16;
    R32Ui = 4: 1 x u32, U32;
    R32I = 5: 1 x i32, I32;
    R16F = 6: 1 x f16, F16;
    R32F = 7: 1 x f32, F32;
    Rgb8Ui = 8: 3 x u8, U8;
    Rgb8I = 9: 3 x i8, I8;
    Rgb16Ui = 10: 3 x u16, U16;
    Rgb16I = 11: 3 x i16, I16;
    Rgb32Ui = 12: 3 x u32, U32;
    Rgb32I = 13: 3 x i32, I32;
    Rgb16F = 14: 3 x f16, F16;
    Rgb32F = 15: 3 x f32, F32;
    /// Four unsigned 8-bit channels, the most common interchange format.
    Rgba8Ui = 16: 4 x u8, U8;
    Rgba8I = 17: 4 x i8, I8;
    Rgba16Ui = 18: 4 x u16, U16;
    Rgba16I = 19: 4 x i16, I16;
    Rgba32Ui = 20: 4 x u32, U32;
    Rgba32I = 21: 4 x i32, I32;
    Rgba16F = 22: 4 x f16, F16;
    Rgba32F = 23: 4 x f32, F32;
}

impl SampleKind {
    /// The byte width of one channel.
    pub const fn bytes(self) -> u8 {
        match self {
            SampleKind::U8 | SampleKind::I8 => 1,
            SampleKind::U16 | SampleKind::I16 | SampleKind::F16 => 2,
            SampleKind::U32 | SampleKind::I32 | SampleKind::F32 => 4,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, SampleKind::I8 | SampleKind::I16 | SampleKind::I32)
    }

    pub const fn is_float(self) -> bool {
        matches!(self, SampleKind::F16 | SampleKind::F32)
    }
}

impl PixelFormat {
    /// All formats, ordered by tag.
    pub fn all() -> impl Iterator<Item = PixelFormat> {
        REGISTRY.iter().map(|info| info.format)
    }

    pub(crate) fn info(self) -> &'static FormatInfo {
        &REGISTRY[self as usize]
    }

    /// The stable tag of this format.
    pub fn tag(self) -> u16 {
        self as u16
    }

    /// Look up a format by its stable tag.
    pub fn from_tag(tag: u16) -> Result<Self, LayoutError> {
        REGISTRY
            .get(usize::from(tag))
            .map(|info| info.format)
            .ok_or(LayoutError::UnknownTag(tag))
    }

    /// Find the format with a channel count and channel type.
    pub fn find(channels: u8, kind: SampleKind) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|info| info.channels == channels && info.kind == kind)
            .map(|info| info.format)
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// The number of channels, one of 1, 3 or 4.
    pub fn channels(self) -> u8 {
        self.info().channels
    }

    pub fn sample_kind(self) -> SampleKind {
        self.info().kind
    }

    /// The byte width of each channel, one of 1, 2 or 4.
    pub fn bytes_per_channel(self) -> u8 {
        self.info().kind.bytes()
    }

    pub fn bytes_per_pixel(self) -> usize {
        usize::from(self.channels()) * usize::from(self.bytes_per_channel())
    }

    /// The byte length of an image with this format.
    pub fn image_len(self, width: u32, height: u32) -> Result<usize, LayoutError> {
        let too_large = LayoutError::TooLarge { width, height };
        let width = usize::try_from(width).map_err(|_| too_large.clone())?;
        let height = usize::try_from(height).map_err(|_| too_large.clone())?;

        width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(self.bytes_per_pixel()))
            .ok_or(too_large)
    }
}
