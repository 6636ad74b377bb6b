//! Conversion of single pixels between bytes and normalized colors.
//!
//! The generic functions here are instantiated once per format in the registry. Callers never
//! switch on the format themselves, they look up its row and call through it.
use core::mem::size_of;

use bytemuck::Pod;

use crate::color::{NormalizedColor, Normalize};
use crate::layout::{LayoutError, PixelFormat};

/// Decode a pixel of `N` channels of type `T` from native endian bytes.
pub(crate) fn read<T: Normalize + Pod, const N: usize>(bytes: &[u8]) -> NormalizedColor {
    let size = size_of::<T>();
    let mut color = NormalizedColor::BLACK;

    for (idx, sample) in bytes.chunks_exact(size).take(N).enumerate() {
        let value: T = bytemuck::pod_read_unaligned(sample);
        color.set_channel(idx, value.normalize());
    }

    color
}

/// Encode a pixel of `N` channels of type `T` into native endian bytes.
pub(crate) fn write<T: Normalize + Pod, const N: usize>(bytes: &mut [u8], color: &NormalizedColor) {
    let size = size_of::<T>();
    let channels = color.channels();

    for (sample, &value) in bytes.chunks_exact_mut(size).take(N).zip(&channels) {
        let value = T::unnormalize(value);
        sample.copy_from_slice(bytemuck::bytes_of(&value));
    }
}

/// Decode the pixel at the start of `bytes`.
pub fn read_pixel(format: PixelFormat, bytes: &[u8]) -> Result<NormalizedColor, LayoutError> {
    let len = format.bytes_per_pixel();
    let pixel = bytes.get(..len).ok_or(LayoutError::LengthMismatch {
        expected: len,
        found: bytes.len(),
    })?;

    Ok((format.info().read)(pixel))
}

/// Encode a color into the pixel at the start of `bytes`.
pub fn write_pixel(
    format: PixelFormat,
    bytes: &mut [u8],
    color: &NormalizedColor,
) -> Result<(), LayoutError> {
    let len = format.bytes_per_pixel();
    let found = bytes.len();
    let pixel = bytes
        .get_mut(..len)
        .ok_or(LayoutError::LengthMismatch { expected: len, found })?;

    (format.info().write)(pixel, color);
    Ok(())
}
