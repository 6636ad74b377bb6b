// Distributed under The MIT License (MIT)
//
// Copyright (c) 2019 The `image-rs` developers
use core::{cmp, fmt, ops};

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Reference counted bytes with copy-on-write semantics.
///
/// Cloning a buffer is cheap, it only increments an atomic counter and both handles then refer to
/// the same allocation. All accessors that may mutate the contents first ensure that this handle
/// is the only one referring to its allocation, copying the bytes if necessary. A write through
/// one handle is thus never observed through another.
///
/// The counter is atomic so handles may be cloned and dropped on different threads. Note that
/// detaching does not synchronize two writers racing on the *same* handle, this requires exclusive
/// access (`&mut`) which the borrow checker already enforces.
///
/// ```
/// use raster_texel::SharedBuffer;
///
/// let mut buffer = SharedBuffer::from(&b"abcd"[..]);
/// let alias = buffer.clone();
/// assert_eq!(buffer.ref_count(), 2);
///
/// buffer[0] = b'x';
/// assert_eq!(buffer.as_bytes(), b"xbcd");
/// assert_eq!(alias.as_bytes(), b"abcd");
/// assert_eq!(alias.ref_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct SharedBuffer {
    /// The backing memory.
    inner: Arc<Vec<u8>>,
}

impl SharedBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        SharedBuffer::default()
    }

    /// Allocate a zero-filled buffer with a number of bytes.
    pub fn with_len(length: usize) -> Self {
        SharedBuffer {
            inner: Arc::new(alloc::vec![0; length]),
        }
    }

    /// The number of bytes in the buffer.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Retrieve the byte capacity of the allocated storage.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// The number of handles currently sharing this allocation.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Query if two buffers share the same memory region.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// View the contents, never copies.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_slice()
    }

    /// View the contents as text, if they are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(self.as_bytes()).ok()
    }

    /// Get a single byte, never copies.
    pub fn at(&self, index: usize) -> Option<u8> {
        self.inner.get(index).copied()
    }

    /// Ensure this buffer is its own copy.
    ///
    /// Performs a deep copy only when the allocation is currently shared with another handle.
    pub fn detach(&mut self) -> &mut Vec<u8> {
        Arc::make_mut(&mut self.inner)
    }

    /// Get the contents mutably without copying, if there are no other handles.
    pub fn get_mut(&mut self) -> Option<&mut [u8]> {
        Arc::get_mut(&mut self.inner).map(Vec::as_mut_slice)
    }

    /// Return the contents as a mutable byte slice, detaching first.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.detach().as_mut_slice()
    }

    /// Change the length, new bytes are zero.
    pub fn resize(&mut self, length: usize) {
        if length == self.len() {
            return;
        }

        if self.get_mut().is_none() {
            // Copy only the prefix that survives.
            let keep = cmp::min(length, self.len());
            let mut fresh = Vec::with_capacity(length);
            fresh.extend_from_slice(&self.inner[..keep]);
            fresh.resize(length, 0);
            self.inner = Arc::new(fresh);
        } else {
            self.detach().resize(length, 0);
        }
    }

    /// Set every byte to a value.
    pub fn fill(&mut self, value: u8) {
        if self.get_mut().is_none() {
            self.inner = Arc::new(alloc::vec![value; self.len()]);
        } else {
            self.as_bytes_mut().fill(value);
        }
    }

    /// Replace the whole contents.
    ///
    /// This never writes into storage shared with another handle.
    pub fn set(&mut self, bytes: &[u8]) {
        match Arc::get_mut(&mut self.inner) {
            Some(vec) => {
                vec.clear();
                vec.extend_from_slice(bytes);
            }
            None => self.inner = Arc::new(bytes.to_vec()),
        }
    }

    /// Drop the reference to the contents, leaving an empty buffer.
    pub fn clear(&mut self) {
        *self = SharedBuffer::new();
    }

    /// Append bytes at the end.
    ///
    /// A shared buffer is copied into a fresh allocation sized for the final length instead of
    /// being copied and then grown.
    pub fn append(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }

        match Arc::get_mut(&mut self.inner) {
            Some(vec) => vec.extend_from_slice(bytes),
            None => {
                let mut fresh = Vec::with_capacity(self.len() + bytes.len());
                fresh.extend_from_slice(&self.inner);
                fresh.extend_from_slice(bytes);
                self.inner = Arc::new(fresh);
            }
        }
    }

    /// Concatenate two buffers into a new one.
    pub fn concat(&self, other: &[u8]) -> SharedBuffer {
        if other.is_empty() {
            return self.clone();
        }

        let mut fresh = Vec::with_capacity(self.len() + other.len());
        fresh.extend_from_slice(self.as_bytes());
        fresh.extend_from_slice(other);
        SharedBuffer::from(fresh)
    }

    /// Copy out a sub range of the buffer.
    ///
    /// The range is clipped to the available bytes. A slice covering the whole buffer shares the
    /// allocation instead of copying.
    pub fn slice(&self, pos: usize, len: usize) -> SharedBuffer {
        let start = cmp::min(pos, self.len());
        let end = start.saturating_add(len).min(self.len());

        if start == 0 && end == self.len() {
            return self.clone();
        }

        SharedBuffer::from(&self.inner[start..end])
    }

    /// Unwrap the contents, copying only if they are shared.
    pub fn into_vec(self) -> Vec<u8> {
        Arc::try_unwrap(self.inner).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl From<&'_ [u8]> for SharedBuffer {
    fn from(bytes: &'_ [u8]) -> Self {
        SharedBuffer {
            inner: Arc::new(bytes.to_vec()),
        }
    }
}

impl From<Vec<u8>> for SharedBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        SharedBuffer {
            inner: Arc::new(bytes),
        }
    }
}

impl From<&'_ str> for SharedBuffer {
    fn from(text: &'_ str) -> Self {
        SharedBuffer::from(text.as_bytes())
    }
}

impl From<String> for SharedBuffer {
    fn from(text: String) -> Self {
        SharedBuffer::from(text.into_bytes())
    }
}

impl ops::Deref for SharedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl ops::Index<usize> for SharedBuffer {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        &self.inner[index]
    }
}

impl ops::IndexMut<usize> for SharedBuffer {
    fn index_mut(&mut self, index: usize) -> &mut u8 {
        &mut self.detach()[index]
    }
}

impl ops::Add<&'_ [u8]> for &'_ SharedBuffer {
    type Output = SharedBuffer;

    fn add(self, other: &'_ [u8]) -> SharedBuffer {
        self.concat(other)
    }
}

impl ops::AddAssign<&'_ [u8]> for SharedBuffer {
    fn add_assign(&mut self, other: &'_ [u8]) {
        self.append(other)
    }
}

impl cmp::PartialEq for SharedBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.as_bytes() == other.as_bytes()
    }
}

impl cmp::Eq for SharedBuffer {}

impl cmp::PartialEq<[u8]> for SharedBuffer {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("len", &self.len())
            .field("refs", &self.ref_count())
            .finish()
    }
}
