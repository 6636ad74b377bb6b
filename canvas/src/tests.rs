use crate::codec::{raw, ImageReader};
use crate::{Image, LayoutError, NormalizedColor, PixelFormat, WrapMode};

/// A 3x3 single channel float image holding `x + 3 * y` in each pixel.
fn ramp() -> Result<Image, LayoutError> {
    let values: Vec<f32> = (0..9).map(|v| v as f32).collect();
    let mut image = Image::new();
    image.set_data(3, 3, PixelFormat::R32F, Some(bytemuck::cast_slice(&values)))?;
    Ok(image)
}

#[test]
fn sampling_at_centers_is_exact() -> Result<(), LayoutError> {
    let image = ramp()?;
    for y in 0..3 {
        for x in 0..3 {
            let sampled = image.sample_color(x as f64 + 0.5, y as f64 + 0.5);
            assert_eq!(sampled, image.pixel_color(x, y), "at {},{}", x, y);
            assert_eq!(sampled.red::<f32>(), (x + 3 * y) as f32);
        }
    }

    Ok(())
}

#[test]
fn sampling_at_shared_corner_averages_four() -> Result<(), LayoutError> {
    let image = ramp()?;
    // Pixels (0,0), (1,0), (0,1) and (1,1) hold 0, 1, 3 and 4.
    let sampled = image.sample_color(1.0, 1.0);
    assert_eq!(sampled.channels(), [2.0, 0.0, 0.0, 1.0]);

    let sampled = image.sample_color(2.0, 2.0);
    assert_eq!(sampled.red::<f64>(), (4.0 + 5.0 + 7.0 + 8.0) / 4.0);
    Ok(())
}

#[test]
fn sampling_on_shared_edge_averages_two() -> Result<(), LayoutError> {
    let image = ramp()?;
    assert_eq!(image.sample_color(1.0, 0.5).red::<f64>(), 0.5);
    assert_eq!(image.sample_color(2.5, 1.0).red::<f64>(), 3.5);
    Ok(())
}

#[test]
fn sampling_weights_by_distance() -> Result<(), LayoutError> {
    let image = ramp()?;
    // A quarter of the way from the center of (0,0) towards the center of (1,0).
    assert_eq!(image.sample_color(0.75, 0.5).red::<f64>(), 0.25);
    Ok(())
}

#[test]
fn colored_fixture() -> Result<(), LayoutError> {
    let mut image = Image::with_format(3, 3, PixelFormat::Rgba8Ui)?;
    let corners = [
        (0, 0, [0, 0, 0, 255]),
        (2, 0, [255, 0, 0, 255]),
        (0, 2, [0, 255, 0, 255]),
        (2, 2, [0, 0, 255, 255]),
        (1, 0, [128, 0, 0, 255]),
        (0, 1, [0, 128, 0, 255]),
        (1, 1, [64, 64, 64, 255]),
    ];

    for (x, y, [r, g, b, a]) in corners {
        image.set_pixel_color(x, y, &NormalizedColor::from_u8(r, g, b, a));
    }

    for (x, y, rgba) in corners {
        let center = image.sample_color(x as f64 + 0.5, y as f64 + 0.5);
        assert_eq!(center.rgba_u8(), rgba, "at {},{}", x, y);
    }

    // The corner shared by the top-left four pixels.
    assert_eq!(image.sample_color(1.0, 1.0).rgba_u8(), [48, 48, 16, 255]);
    // The edge between the two top-left pixels.
    assert_eq!(image.sample_color(1.0, 0.5).rgba_u8(), [64, 0, 0, 255]);
    Ok(())
}

#[test]
fn sampling_across_the_edge_follows_wrap_mode() -> Result<(), LayoutError> {
    let mut image = ramp()?;

    image.set_wrap_mode(WrapMode::ClampToEdge);
    assert_eq!(image.sample_color(0.0, 0.5).red::<f64>(), 0.0);

    image.set_wrap_mode(WrapMode::Repeat);
    // Between the centers of (2,0) and (0,0).
    assert_eq!(image.sample_color(0.0, 0.5).red::<f64>(), 1.0);
    assert_eq!(image.sample_color(3.0, 0.5).red::<f64>(), 1.0);

    image.set_wrap_mode(WrapMode::ClampToBorder);
    // Half of the weight falls on the zero color outside of the image.
    let sampled = image.sample_color(3.0, 0.5);
    assert_eq!(sampled.channels(), [1.0, 0.0, 0.0, 0.5]);
    Ok(())
}

#[test]
fn repeat_tiles_pixel_reads() -> Result<(), LayoutError> {
    let mut image = Image::with_format(8, 8, PixelFormat::Rgba8Ui)?;
    for y in 0..8 {
        for x in 0..8 {
            let color = NormalizedColor::from_u8(x as u8 * 16, y as u8 * 16, 0, 255);
            image.set_pixel_color(x, y, &color);
        }
    }

    image.set_wrap_mode(WrapMode::Repeat);
    assert_eq!(image.pixel_color(-1, 0), image.pixel_color(7, 0));
    assert_eq!(image.pixel_color(8, 0), image.pixel_color(0, 0));
    assert_eq!(image.pixel_color(-8, -9), image.pixel_color(0, 7));
    assert_eq!(image.pixel_color(21, 3).rgba_u8(), [5 * 16, 3 * 16, 0, 255]);
    Ok(())
}

#[test]
fn every_format_reads_back_what_it_wrote() -> Result<(), LayoutError> {
    let color = NormalizedColor::new(0.25, 0.125, 0.375, 0.5);

    for format in PixelFormat::all() {
        let mut image = Image::with_format(2, 1, format)?;
        image.set_pixel_color(0, 0, &color);
        let first = image.pixel_color(0, 0);

        // Quantization happens once, a second write keeps the value.
        image.set_pixel_color(1, 0, &first);
        assert_eq!(image.pixel_color(1, 0), first, "{}", format.name());

        match format.channels() {
            1 => {
                assert_eq!(first.green::<f64>(), 0.0, "{}", format.name());
                assert_eq!(first.alpha::<f64>(), 1.0, "{}", format.name());
            }
            3 => assert_eq!(first.alpha::<f64>(), 1.0, "{}", format.name()),
            _ => assert!((first.alpha::<f64>() - 0.5).abs() < 0.01, "{}", format.name()),
        }

        if format.sample_kind().is_float() {
            assert_eq!(first.red::<f64>(), 0.25, "{}", format.name());
        }
    }

    Ok(())
}

#[test]
fn reader_payload_is_shared_with_image() {
    let mut source = Image::with_format(4, 4, PixelFormat::R8Ui).unwrap();
    source.image_data_mut().fill(9);

    let mut bytes = Vec::new();
    raw::encode(&source, &mut bytes).unwrap();
    let mut reader = raw::RawReader::new();
    reader.decode(&bytes[..], false).unwrap();

    let reader = ImageReader::Raw(reader);
    let mut image = Image::from_reader(&reader).unwrap();
    assert!(image.image_data().ptr_eq(reader.image_data()));

    // The first write detaches the image from the reader.
    image.set_pixel_color(0, 0, &NormalizedColor::BLACK);
    assert!(!image.image_data().ptr_eq(reader.image_data()));
    assert_eq!(reader.image_data().at(0), Some(9));
    assert_eq!(image.image_data().at(0), Some(0));
}
