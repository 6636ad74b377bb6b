//! Benchmarks nearest and bilinear reads across whole images.
use brunch::Bench;

use raster_canvas::{Image, LayoutError, NormalizedColor, PixelFormat, WrapMode};

#[derive(Clone, Copy, Debug)]
enum Filter {
    Nearest,
    Bilinear,
}

struct Sample {
    format: PixelFormat,
    filter: Filter,
    wrap: WrapMode,
    sz: u32,
}

impl Sample {
    fn name(&self) -> String {
        format!(
            "sample({}, {:?}, {:?}, {})",
            self.format.name(),
            self.filter,
            self.wrap,
            self.sz
        )
    }

    fn prepare(self) -> Result<impl FnMut() -> NormalizedColor, LayoutError> {
        let mut image = Image::with_format(self.sz, self.sz, self.format)?;
        for (idx, byte) in image.image_data_mut().iter_mut().enumerate() {
            *byte = idx as u8;
        }
        image.set_wrap_mode(self.wrap);

        let sz = i64::from(self.sz);
        let filter = self.filter;

        Ok(move || {
            let mut sum = NormalizedColor::default();
            // One pixel of overhang on each side exercises the wrap mode.
            for y in -1..=sz {
                for x in -1..=sz {
                    sum = sum
                        + match filter {
                            Filter::Nearest => image.pixel_color(x, y),
                            Filter::Bilinear => {
                                image.sample_color(x as f64 + 0.25, y as f64 + 0.75)
                            }
                        };
                }
            }
            sum
        })
    }
}

fn main() {
    let tests = [
        Sample {
            format: PixelFormat::Rgba8Ui,
            filter: Filter::Nearest,
            wrap: WrapMode::ClampToEdge,
            sz: 256,
        },
        Sample {
            format: PixelFormat::Rgba8Ui,
            filter: Filter::Bilinear,
            wrap: WrapMode::ClampToEdge,
            sz: 256,
        },
        Sample {
            format: PixelFormat::Rgba8Ui,
            filter: Filter::Bilinear,
            wrap: WrapMode::Repeat,
            sz: 256,
        },
        Sample {
            format: PixelFormat::R16I,
            filter: Filter::Nearest,
            wrap: WrapMode::ClampToBorder,
            sz: 256,
        },
        Sample {
            format: PixelFormat::R16I,
            filter: Filter::Bilinear,
            wrap: WrapMode::ClampToBorder,
            sz: 256,
        },
        Sample {
            format: PixelFormat::Rgb32F,
            filter: Filter::Bilinear,
            wrap: WrapMode::Repeat,
            sz: 256,
        },
    ];

    let mut benches = brunch::Benches::default();
    benches.extend(tests.map(|sample| {
        Bench::new(format!("canvas::sampling::main::{}", sample.name()))
            .run(sample.prepare().expect("Failed to setup benchmark"))
    }));
    benches.finish();
}
