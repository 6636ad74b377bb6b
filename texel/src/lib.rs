// Distributed under The MIT License (MIT)
//
// Copyright (c) 2019, 2020 The `image-rs` developers
//! # Bytes for raster codecs
//!
//! Two primitives that every binary image codec needs and that are independent of any pixel
//! interpretation:
//!
//! - [`SharedBuffer`], reference counted bytes that are copied only when a write would otherwise
//!   become visible through another handle.
//! - [`ByteReader`] and [`ByteWriter`], reading and writing fixed-width numbers in an explicitly
//!   configured [`ByteOrder`].
//!
//! ## Usage
//!
//! ```
//! use raster_texel::{ByteOrder, ByteReader, SharedBuffer};
//!
//! let header = [0x01, 0xda, 0x01, 0x01];
//! let mut reader = ByteReader::new(&header[..], ByteOrder::Big);
//! assert_eq!(reader.read_i16()?, 474);
//! assert_eq!(reader.read_u8()?, 1);
//!
//! let payload = SharedBuffer::from(&header[..]);
//! let mut copy = payload.clone();
//! copy[0] = 0xff;
//! assert_eq!(payload[0], 0x01);
//! # Ok::<(), raster_texel::StreamError>(())
//! ```
#![deny(unsafe_code)]
extern crate alloc;

mod buf;
pub mod stream;

pub use self::buf::SharedBuffer;
pub use self::stream::{reorder, ByteOrder, ByteReader, ByteWriter, Scalar, StreamError};
