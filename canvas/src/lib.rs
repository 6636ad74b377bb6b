//! A format-agnostic raster image buffer and the codecs that fill it.
//!
//! An [`Image`] stores its pixels as plain bytes in one of the registered [`PixelFormat`]s. Pixels
//! are read and written as [`NormalizedColor`] values, so the same code works with every format.
//! Reads outside of the image are resolved by a [`WrapMode`].
//!
//! # Usage
//!
//! ```
//! use raster_canvas::{Image, NormalizedColor, PixelFormat, WrapMode};
//!
//! let mut image = Image::with_format(2, 2, PixelFormat::Rgba8Ui)?;
//! image.set_pixel_color(0, 0, &NormalizedColor::new(1.0, 0.0, 0.5, 1.0));
//!
//! image.set_wrap_mode(WrapMode::Repeat);
//! assert_eq!(image.pixel_color(2, 2).red::<f32>(), 1.0);
//!
//! // Halfway between the centers of the two top pixels.
//! let mixed = image.sample_color(1.0, 0.5);
//! assert!((mixed.red::<f64>() - 0.5).abs() < 1e-9);
//! # use raster_canvas::LayoutError;
//! # Ok::<(), LayoutError>(())
//! ```
//!
//! Files are decoded by extension, see the [`codec`] module for the formats.
//!
//! ```no_run
//! use raster_canvas::Image;
//!
//! let tile = Image::open("N45W072.hgt")?;
//! println!("{}x{} {:?}", tile.width(), tile.height(), tile.internal_format());
//! # Ok::<(), raster_canvas::CodecError>(())
//! ```
#![deny(unsafe_code)]

/// Normalized colors and channel conversions.
pub mod color;
pub mod codec;
mod image;
/// The pixel format registry.
pub mod layout;
mod pixel;
mod wrap;

#[cfg(test)]
mod tests;

pub use self::codec::{CodecError, FileKind, ImageMetadata, ImageReader};
pub use self::color::{Normalize, NormalizedColor};
pub use self::image::{image_pixel, Image};
pub use self::layout::{LayoutError, PixelFormat, SampleKind};
pub use self::pixel::{read_pixel, write_pixel};
pub use self::wrap::WrapMode;

pub use raster_texel::SharedBuffer;
