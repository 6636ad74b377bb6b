/// How pixel coordinates outside of the image resolve to pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WrapMode {
    /// Coordinates outside the image resolve to nothing, reads substitute a zero color.
    ClampToBorder,
    /// Coordinates are clamped to the nearest edge pixel.
    #[default]
    ClampToEdge,
    /// The image is tiled periodically in both directions.
    Repeat,
}

impl WrapMode {
    /// Resolve a coordinate along an axis with `dimension` pixels.
    ///
    /// Returns `None` for an empty axis, or when the coordinate lies outside of it with
    /// [`WrapMode::ClampToBorder`].
    ///
    /// ```
    /// use raster_canvas::WrapMode;
    ///
    /// assert_eq!(WrapMode::Repeat.resolve(-1, 8), Some(7));
    /// assert_eq!(WrapMode::Repeat.resolve(8, 8), Some(0));
    /// assert_eq!(WrapMode::ClampToEdge.resolve(-3, 8), Some(0));
    /// assert_eq!(WrapMode::ClampToBorder.resolve(8, 8), None);
    /// ```
    pub fn resolve(self, coord: i64, dimension: u32) -> Option<u32> {
        if dimension == 0 {
            return None;
        }

        let dim = i64::from(dimension);
        let resolved = match self {
            WrapMode::ClampToBorder => {
                if coord < 0 || coord >= dim {
                    return None;
                }
                coord
            }
            WrapMode::ClampToEdge => coord.clamp(0, dim - 1),
            WrapMode::Repeat if coord < 0 => {
                // A multiple of the dimension maps to `dim` first, which wraps back to 0.
                let rem = (coord.unsigned_abs() % dimension as u64) as i64;
                (dim - rem) % dim
            }
            WrapMode::Repeat => coord % dim,
        };

        // In `0..dim` for all arms.
        Some(resolved as u32)
    }

    /// Resolve both coordinates of a pixel in an image of `width` by `height`.
    pub fn apply(self, x: i64, y: i64, width: u32, height: u32) -> Option<(u32, u32)> {
        Some((self.resolve(x, width)?, self.resolve(y, height)?))
    }
}
