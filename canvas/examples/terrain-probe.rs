use raster_canvas::codec::hgt::HgtReader;
use raster_canvas::CodecError;

/// Prints the georeference of an `.hgt` tile and the elevation at a position.
///
/// Usage: `terrain-probe N45W072.hgt -71.5 45.25`
fn main() -> Result<(), CodecError> {
    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "N45W072.hgt".into());
    let lon: f64 = args.next().and_then(|v| v.parse().ok()).unwrap_or(-71.5);
    let lat: f64 = args.next().and_then(|v| v.parse().ok()).unwrap_or(45.5);

    let mut tile = HgtReader::new();
    tile.set_filename_path(path.as_ref());
    tile.load()?;

    if let Some(header) = tile.header() {
        let (lower, upper) = (header.lower_left(), header.upper_right());
        println!(
            "{:?} {}x{}, ({}, {}) to ({}, {})",
            header.kind,
            header.geometry.width,
            header.geometry.height,
            lower.lon,
            lower.lat,
            upper.lon,
            upper.lat
        );
    }

    match tile.elevation(lon, lat) {
        Some(meters) => println!("elevation at ({}, {}): {} m", lon, lat, meters),
        None => println!("no elevation at ({}, {})", lon, lat),
    }

    Ok(())
}
