//! Terrain elevation grids in the headerless `.hgt` layout of the SRTM datasets.
//!
//! A file is a grid of big endian `i16` samples with the southern row first. Nothing in the file
//! describes its geometry. The standard SRTM tiles are recognized by their exact size and carry
//! their south-western corner in the file name, for example `N45W072.hgt`. Whole-globe ETOPO5
//! grids are recognized by name. Any other grid needs an explicit [`HgtGeometry`].
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use raster_texel::{reorder, ByteOrder, ByteReader, ByteWriter, SharedBuffer};

use super::{CodecError, ImageMetadata};
use crate::image::{flip_rows, Image};
use crate::layout::PixelFormat;

/// Samples with this value carry no elevation.
pub const VOID_ELEVATION: i16 = -32768;
/// Samples per side of a tile with one arc second spacing.
pub const SRTM1_SAMPLES: u32 = 3601;
/// Samples per side of a tile with three arc second spacing.
pub const SRTM3_SAMPLES: u32 = 1201;
/// The file name marker of the whole-globe dataset.
pub const ETOPO5_NAME: &str = "ETOPO5";
pub const ETOPO5_WIDTH: u32 = 4320;
pub const ETOPO5_HEIGHT: u32 = 2160;

const SAMPLE_BYTES: u64 = 2;

/// A geodetic position in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

/// Size, sample spacing and placement of an elevation grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HgtGeometry {
    pub width: u32,
    pub height: u32,
    /// Degrees between neighboring samples.
    pub resolution: f64,
    pub lower_left: GeoPoint,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HgtKind {
    Srtm1,
    Srtm3,
    Etopo5,
    Custom,
}

/// What was inferred about a grid from its name and size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HgtHeader {
    pub kind: HgtKind,
    pub geometry: HgtGeometry,
}

/// Reads elevation grids.
#[derive(Debug, Default)]
pub struct HgtReader {
    path: Option<PathBuf>,
    custom: Option<HgtGeometry>,
    header: Option<HgtHeader>,
    data: SharedBuffer,
}

impl HgtGeometry {
    fn srtm(samples: u32, lower_left: GeoPoint) -> Self {
        HgtGeometry {
            width: samples,
            height: samples,
            resolution: 1.0 / f64::from(samples - 1),
            lower_left,
        }
    }

    pub fn etopo5() -> Self {
        HgtGeometry {
            width: ETOPO5_WIDTH,
            height: ETOPO5_HEIGHT,
            resolution: 1.0 / 12.0,
            lower_left: GeoPoint {
                lon: -180.0,
                lat: -90.0,
            },
        }
    }

    /// The file size of a grid with this geometry.
    pub fn byte_len(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * SAMPLE_BYTES
    }

    pub fn upper_right(&self) -> GeoPoint {
        GeoPoint {
            lon: self.lower_left.lon + f64::from(self.width) * self.resolution,
            lat: self.lower_left.lat + f64::from(self.height) * self.resolution,
        }
    }
}

impl HgtHeader {
    pub fn lower_left(&self) -> GeoPoint {
        self.geometry.lower_left
    }

    pub fn upper_right(&self) -> GeoPoint {
        self.geometry.upper_right()
    }
}

/// Parse the south-western corner from a name like `N45W072.hgt`.
///
/// The first `[NS]<digits>[EW]<digits>` sequence anywhere in the name is used, `S` and `W` negate
/// their axis.
///
/// ```
/// use raster_canvas::codec::hgt::parse_lower_left;
///
/// let corner = parse_lower_left("N45W072.hgt").unwrap();
/// assert_eq!((corner.lon, corner.lat), (-72.0, 45.0));
/// ```
pub fn parse_lower_left(name: &str) -> Option<GeoPoint> {
    let bytes = name.as_bytes();
    (0..bytes.len()).find_map(|start| {
        let (lat, rest) = signed_degrees(&bytes[start..], b'N', b'S')?;
        let (lon, _) = signed_degrees(rest, b'E', b'W')?;
        Some(GeoPoint { lon, lat })
    })
}

fn signed_degrees(bytes: &[u8], positive: u8, negative: u8) -> Option<(f64, &[u8])> {
    let (&hemisphere, rest) = bytes.split_first()?;
    let sign = match hemisphere.to_ascii_uppercase() {
        h if h == positive => 1.0,
        h if h == negative => -1.0,
        _ => return None,
    };

    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    let value: u32 = core::str::from_utf8(&rest[..digits]).ok()?.parse().ok()?;
    Some((sign * f64::from(value), &rest[digits..]))
}

/// Infer the grid geometry of a file.
///
/// An explicit geometry always wins. Otherwise the exact file size identifies SRTM tiles, whose
/// corner must then be part of the name, and the name identifies ETOPO5 grids.
pub fn classify(
    file_name: &str,
    size: u64,
    custom: Option<&HgtGeometry>,
) -> Result<HgtHeader, CodecError> {
    let srtm = |kind, samples| -> Result<HgtHeader, CodecError> {
        let lower_left = parse_lower_left(file_name)
            .ok_or_else(|| CodecError::MissingGeoreference(file_name.to_owned()))?;
        Ok(HgtHeader {
            kind,
            geometry: HgtGeometry::srtm(samples, lower_left),
        })
    };

    let header = if let Some(geometry) = custom {
        HgtHeader {
            kind: HgtKind::Custom,
            geometry: *geometry,
        }
    } else if size == HgtGeometry::srtm(SRTM1_SAMPLES, GeoPoint::default()).byte_len() {
        return srtm(HgtKind::Srtm1, SRTM1_SAMPLES);
    } else if size == HgtGeometry::srtm(SRTM3_SAMPLES, GeoPoint::default()).byte_len() {
        return srtm(HgtKind::Srtm3, SRTM3_SAMPLES);
    } else if file_name.to_ascii_uppercase().contains(ETOPO5_NAME) {
        HgtHeader {
            kind: HgtKind::Etopo5,
            geometry: HgtGeometry::etopo5(),
        }
    } else {
        return Err(CodecError::UnknownTerrain { size });
    };

    let expected = header.geometry.byte_len();
    if size < expected {
        return Err(CodecError::Truncated {
            expected,
            found: size,
        });
    }

    Ok(header)
}

impl HgtReader {
    pub fn new() -> Self {
        HgtReader::default()
    }

    pub fn set_filename_path(&mut self, path: &Path) {
        self.path = Some(path.to_path_buf());
    }

    pub fn filename_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Use a fixed geometry instead of inferring one, `None` restores inference.
    pub fn set_custom_geometry(&mut self, geometry: Option<HgtGeometry>) {
        self.custom = geometry;
    }

    pub fn custom_geometry(&self) -> Option<&HgtGeometry> {
        self.custom.as_ref()
    }

    pub fn load_header(&mut self) -> Result<(), CodecError> {
        self.load_file(true)
    }

    pub fn load(&mut self) -> Result<(), CodecError> {
        self.load_file(false)
    }

    fn load_file(&mut self, header_only: bool) -> Result<(), CodecError> {
        let opened = super::open(self.filename_path()).and_then(|file| {
            let size = file.get_ref().metadata()?.len();
            Ok((file, size))
        });

        match opened {
            Ok((file, size)) => {
                let name = self
                    .filename_path()
                    .and_then(Path::file_name)
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.decode(file, &name, size, header_only)
            }
            Err(err) => {
                self.clear();
                Err(super::rejected("hgt", self.filename_path(), err))
            }
        }
    }

    /// Decode a grid of `size` bytes named `file_name` from a byte source.
    ///
    /// The payload ends up with the northern row first and samples in native endian. On error
    /// the reader is cleared.
    pub fn decode<R: Read>(
        &mut self,
        src: R,
        file_name: &str,
        size: u64,
        header_only: bool,
    ) -> Result<(), CodecError> {
        self.clear();

        let result = classify(file_name, size, self.custom.as_ref()).and_then(|header| {
            let geometry = &header.geometry;
            log::debug!(
                "hgt: {:?} {}x{} from ({}, {})",
                header.kind,
                geometry.width,
                geometry.height,
                geometry.lower_left.lon,
                geometry.lower_left.lat
            );

            if !header_only {
                let mut stream = ByteReader::new(src, ByteOrder::Big);
                let mut data = stream.read_bytes(geometry.byte_len() as usize)?;
                let bytes = data.as_bytes_mut();
                reorder(bytes, SAMPLE_BYTES as usize, ByteOrder::Big);
                flip_rows(bytes, geometry.width as usize * SAMPLE_BYTES as usize);
                self.data = data;
            }

            Ok(header)
        });

        match result {
            Ok(header) => {
                self.header = Some(header);
                Ok(())
            }
            Err(err) => {
                self.clear();
                Err(super::rejected("hgt", self.filename_path(), err))
            }
        }
    }

    pub fn header(&self) -> Option<&HgtHeader> {
        self.header.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.header.is_some()
    }

    pub fn metadata(&self) -> Option<ImageMetadata> {
        self.header.map(|header| ImageMetadata {
            width: header.geometry.width,
            height: header.geometry.height,
            format: PixelFormat::R16I,
            bottom_up: false,
        })
    }

    pub fn image_data(&self) -> &SharedBuffer {
        &self.data
    }

    /// The elevation of the sample nearest to a position.
    ///
    /// Returns `None` outside of the grid, before a full load, and for void samples.
    pub fn elevation(&self, lon: f64, lat: f64) -> Option<i16> {
        let geometry = &self.header.as_ref()?.geometry;
        let col = ((lon - geometry.lower_left.lon) / geometry.resolution).round();
        let row = ((lat - geometry.lower_left.lat) / geometry.resolution).round();

        let (width, height) = (f64::from(geometry.width), f64::from(geometry.height));
        if !(col >= 0.0 && col < width && row >= 0.0 && row < height) {
            return None;
        }

        // The northern row comes first in memory.
        let line = geometry.height as usize - 1 - row as usize;
        let offset = (line * geometry.width as usize + col as usize) * SAMPLE_BYTES as usize;
        let sample = self.data.as_bytes().get(offset..offset + SAMPLE_BYTES as usize)?;
        let value: i16 = bytemuck::pod_read_unaligned(sample);

        (value != VOID_ELEVATION).then_some(value)
    }

    /// Forget header and payload, the path and any custom geometry are kept.
    pub fn clear(&mut self) {
        self.header = None;
        self.data.clear();
    }
}

/// Encode an [`PixelFormat::R16I`] image as an elevation grid, southern row first.
pub fn encode<W: Write>(image: &Image, dst: W) -> Result<(), CodecError> {
    check_format(image)?;

    let mut bytes = image.image_data().as_bytes().to_vec();
    flip_rows(&mut bytes, image.width() as usize * SAMPLE_BYTES as usize);
    reorder(&mut bytes, SAMPLE_BYTES as usize, ByteOrder::Big);

    let mut stream = ByteWriter::new(dst, ByteOrder::Big);
    stream.write_bytes(&bytes)?;
    stream.flush()?;
    Ok(())
}

/// Write an [`PixelFormat::R16I`] image to an `.hgt` file.
pub fn save(path: &Path, image: &Image) -> Result<(), CodecError> {
    check_format(image)?;
    let file = BufWriter::new(File::create(path)?);
    encode(image, file)
}

fn check_format(image: &Image) -> Result<(), CodecError> {
    match super::encodable_format(image)? {
        PixelFormat::R16I => Ok(()),
        other => Err(CodecError::Unsupported {
            what: "hgt output format",
            value: other.tag().into(),
        }),
    }
}
