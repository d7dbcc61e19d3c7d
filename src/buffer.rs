//! Compressed-Frame Buffers
//!
//! The JPEG library writes each compressed frame into a growable
//! destination buffer. [`FrameBuffer`] models the destination manager:
//! it starts small, doubles its capacity whenever the codec runs out of
//! room, and refuses (rather than aborts) when the allocator declines
//! the doubled size. A finished frame is handed to the caller as a
//! [`VideoBuffer`] that owns the bytes until dropped.

use std::io::{self, Write};

/// Initial destination capacity for one compressed frame.
///
/// Typical desktop-content JPEG frames at the lower quality grid points
/// are a few kilobytes; the buffer doubles from here as needed.
const INITIAL_CAPACITY: usize = 8192;

/// Growable destination buffer for one compressed frame.
///
/// Implements [`std::io::Write`] so the JPEG shim can stream into it.
/// Growth failures surface as [`io::ErrorKind::OutOfMemory`] and abort
/// the frame instead of the process.
#[derive(Debug)]
pub struct FrameBuffer {
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Create an empty buffer with the default initial capacity.
    ///
    /// Returns `None` when even the initial allocation is refused.
    #[must_use]
    pub fn new() -> Option<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(INITIAL_CAPACITY).ok()?;
        Some(Self { data })
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether anything has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Ensure room for `additional` more bytes, doubling the capacity
    /// until it fits.
    fn ensure_space(&mut self, additional: usize) -> io::Result<()> {
        let needed = self.data.len() + additional;
        if needed <= self.data.capacity() {
            return Ok(());
        }

        let mut target = self.data.capacity().max(INITIAL_CAPACITY);
        while target < needed {
            target *= 2;
        }

        self.data
            .try_reserve_exact(target - self.data.len())
            .map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))
    }

    /// Finish the frame, transferring ownership of the bytes.
    #[must_use]
    pub fn finish(self) -> VideoBuffer {
        VideoBuffer { data: self.data }
    }
}

impl Write for FrameBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ensure_space(buf.len())?;
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One finished compressed frame, ready for wire transmission.
///
/// The payload is a complete baseline JPEG byte stream. The buffer owns
/// its storage; dropping it releases the frame.
#[derive(Debug, Clone)]
pub struct VideoBuffer {
    data: Vec<u8>,
}

impl VideoBuffer {
    /// The encoded JPEG bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Encoded length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame is empty (never the case for a successful
    /// encode).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume the buffer, returning the owned bytes.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl AsRef<[u8]> for VideoBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
