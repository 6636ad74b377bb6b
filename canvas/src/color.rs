use core::ops;

use half::f16;

/// A channel value that can be mapped onto the normalized real line and back.
///
/// Integer codes of unsigned types map onto `[0.0, 1.0]` while signed types map onto
/// `[-0.5, 0.5]`. Zero of a signed type is thus close to, but not exactly at, `0.0` since the
/// range of two's complement numbers is not symmetric.
///
/// Floating point channels are already real numbers and pass through unchanged.
pub trait Normalize: Copy {
    /// Map the value to its normalized real.
    fn normalize(self) -> f64;

    /// Map a normalized real back to the nearest representable value.
    ///
    /// Reals outside the normalized range saturate at the bounds of integer types.
    fn unnormalize(value: f64) -> Self;
}

/// Normalize an integer code, computing in a signed 64-bit accumulator.
fn normalize_integer(value: i64, min: i64, max: i64) -> f64 {
    let range = (max - min) as f64;
    let unit = (value - min) as f64 / range;

    if min < 0 {
        unit - 0.5
    } else {
        unit
    }
}

fn unnormalize_integer(value: f64, min: i64, max: i64) -> i64 {
    let range = (max - min) as f64;
    let unit = if min < 0 { value + 0.5 } else { value };

    // Rounding first makes the cast exact for every code that was normalized before.
    let offset = (unit * range).round();
    let offset = offset.clamp(0.0, range) as i64;

    offset + min
}

macro_rules! integer_channel {
    ($($ty:ty),*) => {
        $(
            impl Normalize for $ty {
                fn normalize(self) -> f64 {
                    normalize_integer(self.into(), <$ty>::MIN.into(), <$ty>::MAX.into())
                }

                fn unnormalize(value: f64) -> Self {
                    let code = unnormalize_integer(value, <$ty>::MIN.into(), <$ty>::MAX.into());
                    // In range by construction.
                    code as $ty
                }
            }
        )*
    };
}

integer_channel!(u8, i8, u16, i16, u32, i32);

impl Normalize for f16 {
    fn normalize(self) -> f64 {
        self.to_f64()
    }

    fn unnormalize(value: f64) -> Self {
        f16::from_f64(value)
    }
}

impl Normalize for f32 {
    fn normalize(self) -> f64 {
        self.into()
    }

    fn unnormalize(value: f64) -> Self {
        value as f32
    }
}

impl Normalize for f64 {
    fn normalize(self) -> f64 {
        self
    }

    fn unnormalize(value: f64) -> Self {
        value
    }
}

/// A color with four channels, each normalized by its source type.
///
/// This is the common currency of all pixel reads and writes. The channel order is red, green,
/// blue, alpha. Formats with fewer channels leave the remaining channels at `0.0` for color and
/// `1.0` for alpha when reading, and ignore them when writing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NormalizedColor {
    channels: [f64; 4],
}

macro_rules! typed_constructors {
    ($($from:ident, $rgba:ident, $rgb:ident: $ty:ty;)*) => {
        impl NormalizedColor {
            $(
                #[doc = concat!("Normalize four `", stringify!($ty), "` channels.")]
                pub fn $from(red: $ty, green: $ty, blue: $ty, alpha: $ty) -> Self {
                    Self::from_rgba([red, green, blue, alpha])
                }

                #[doc = concat!("All four channels as `", stringify!($ty), "`.")]
                pub fn $rgba(&self) -> [$ty; 4] {
                    self.rgba()
                }

                #[doc = concat!("The three color channels as `", stringify!($ty), "`.")]
                pub fn $rgb(&self) -> [$ty; 3] {
                    self.rgb()
                }
            )*
        }
    };
}

typed_constructors! {
    from_u8, rgba_u8, rgb_u8: u8;
    from_i8, rgba_i8, rgb_i8: i8;
    from_u16, rgba_u16, rgb_u16: u16;
    from_i16, rgba_i16, rgb_i16: i16;
    from_u32, rgba_u32, rgb_u32: u32;
    from_i32, rgba_i32, rgb_i32: i32;
    from_f16, rgba_f16, rgb_f16: f16;
    from_f32, rgba_f32, rgb_f32: f32;
    from_f64, rgba_f64, rgb_f64: f64;
}

macro_rules! channel_accessors {
    ($($get:ident, $set:ident = $idx:literal;)*) => {
        impl NormalizedColor {
            $(
                pub fn $get<T: Normalize>(&self) -> T {
                    T::unnormalize(self.channels[$idx])
                }

                pub fn $set<T: Normalize>(&mut self, value: T) {
                    self.channels[$idx] = value.normalize();
                }
            )*
        }
    };
}

channel_accessors! {
    red, set_red = 0;
    green, set_green = 1;
    blue, set_blue = 2;
    alpha, set_alpha = 3;
}

impl NormalizedColor {
    /// Opaque black, as read from a format without an alpha channel.
    pub const BLACK: Self = NormalizedColor::new(0.0, 0.0, 0.0, 1.0);

    /// A color from already normalized channels.
    pub const fn new(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        NormalizedColor {
            channels: [red, green, blue, alpha],
        }
    }

    /// Normalize four channels of any type.
    pub fn from_rgba<T: Normalize>(rgba: [T; 4]) -> Self {
        NormalizedColor {
            channels: rgba.map(T::normalize),
        }
    }

    /// Normalize three color channels, alpha is opaque.
    pub fn from_rgb<T: Normalize>(rgb: [T; 3]) -> Self {
        let [r, g, b] = rgb.map(T::normalize);
        NormalizedColor::new(r, g, b, 1.0)
    }

    pub fn rgba<T: Normalize>(&self) -> [T; 4] {
        self.channels.map(T::unnormalize)
    }

    pub fn rgb<T: Normalize>(&self) -> [T; 3] {
        let [r, g, b, _] = self.channels;
        [r, g, b].map(T::unnormalize)
    }

    /// The normalized channels, in order red, green, blue, alpha.
    pub fn channels(&self) -> [f64; 4] {
        self.channels
    }

    /// One normalized channel, `None` past the alpha channel.
    pub fn channel(&self, index: usize) -> Option<f64> {
        self.channels.get(index).copied()
    }

    /// Overwrite one normalized channel, ignored past the alpha channel.
    pub fn set_channel(&mut self, index: usize, value: f64) {
        if let Some(channel) = self.channels.get_mut(index) {
            *channel = value;
        }
    }

    /// Linear interpolation towards `other`, channel by channel.
    pub fn lerp(self, other: Self, t: f64) -> Self {
        self * (1.0 - t) + other * t
    }
}

impl ops::Add for NormalizedColor {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        let [a, b, c, d] = self.channels;
        let [e, f, g, h] = other.channels;
        NormalizedColor::new(a + e, b + f, c + g, d + h)
    }
}

impl ops::Mul<f64> for NormalizedColor {
    type Output = Self;

    fn mul(self, factor: f64) -> Self {
        NormalizedColor {
            channels: self.channels.map(|ch| ch * factor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NormalizedColor, Normalize};
    use half::f16;

    fn round_trip<T>(values: impl IntoIterator<Item = T>)
    where
        T: Normalize + PartialEq + core::fmt::Debug,
    {
        for value in values {
            assert_eq!(T::unnormalize(value.normalize()), value);
        }
    }

    #[test]
    fn small_integers_round_trip_exhaustively() {
        round_trip(u8::MIN..=u8::MAX);
        round_trip(i8::MIN..=i8::MAX);
        round_trip(u16::MIN..=u16::MAX);
        round_trip(i16::MIN..=i16::MAX);
    }

    #[test]
    fn wide_integers_round_trip_sampled() {
        let step = 65_521;
        round_trip((0..=u32::MAX).step_by(step));
        round_trip([u32::MAX, u32::MAX - 1, 1, 0]);
        round_trip((i32::MIN..=i32::MAX).step_by(step));
        round_trip([i32::MIN, i32::MIN + 1, -1, 0, 1, i32::MAX - 1, i32::MAX]);
    }

    #[test]
    fn floats_pass_through() {
        round_trip([0.0f32, -1.5, 1e-8, 3.25e7]);
        round_trip([0.0f64, -2.0, 0.1]);
        round_trip([f16::ZERO, f16::ONE, f16::from_f32(-0.5), f16::MAX]);
        assert_eq!(2.5f32.normalize(), 2.5);
    }

    #[test]
    fn ranges_by_signedness() {
        assert_eq!(0u8.normalize(), 0.0);
        assert_eq!(255u8.normalize(), 1.0);
        assert_eq!(u32::MAX.normalize(), 1.0);
        assert_eq!(i8::MIN.normalize(), -0.5);
        assert_eq!(i8::MAX.normalize(), 0.5);
        assert_eq!(i32::MIN.normalize(), -0.5);
        assert_eq!(i32::MAX.normalize(), 0.5);
    }

    #[test]
    fn integers_saturate() {
        assert_eq!(u8::unnormalize(2.0), 255);
        assert_eq!(u8::unnormalize(-1.0), 0);
        assert_eq!(i16::unnormalize(0.75), i16::MAX);
        assert_eq!(i16::unnormalize(-0.75), i16::MIN);
    }

    #[test]
    fn mixed_channel_accessors() {
        let mut color = NormalizedColor::from_u8(255, 0, 51, 255);
        assert_eq!(color.red::<u16>(), u16::MAX);
        assert_eq!(color.blue::<f64>(), 0.2);

        color.set_green(i8::MAX);
        assert_eq!(color.green::<f64>(), 0.5);
        assert_eq!(color.rgb_u8(), [255, 128, 51]);
        assert_eq!(color.rgba_u8(), [255, 128, 51, 255]);
    }

    #[test]
    fn rgb_constructor_is_opaque() {
        let color = NormalizedColor::from_rgb([0u16, 0, 65535]);
        assert_eq!(color.channels(), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn interpolation() {
        let black = NormalizedColor::new(0.0, 0.0, 0.0, 1.0);
        let white = NormalizedColor::new(1.0, 1.0, 1.0, 1.0);
        assert_eq!(black.lerp(white, 0.5), NormalizedColor::new(0.5, 0.5, 0.5, 1.0));
        assert_eq!(black.lerp(white, 1.0), white);
    }
}
