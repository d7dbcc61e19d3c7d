//! Error types for the MJPEG encoder
//!
//! Provides typed errors that library users can match and handle
//! specifically. Every error corresponds to a frame the encoder could
//! not produce; the encoder itself stays usable and the next frame may
//! succeed.

use thiserror::Error;

use crate::bitmap::PixelFormat;
use crate::encoder::Codec;

/// Errors that can occur while constructing the encoder or encoding a
/// frame.
///
/// A frame-level error means the submitted frame was abandoned; rate
/// control state is preserved and the stream continues with the next
/// frame.
///
/// # Examples
///
/// ```no_run
/// # use mjpeg_adaptive::{MjpegEncoder, Codec, DefaultHost, EncoderError};
/// match MjpegEncoder::new(Codec::Vp8, 8_000_000, Box::new(DefaultHost)) {
///     Ok(_) => unreachable!(),
///     Err(EncoderError::UnsupportedCodec(codec)) => {
///         eprintln!("codec {codec:?} needs a different encoder");
///     }
///     Err(e) => eprintln!("error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum EncoderError {
    /// The requested codec is not handled by this encoder
    ///
    /// This encoder only produces baseline MJPEG streams. Other codecs
    /// belong to other encoder implementations.
    #[error("codec {0:?} is not supported by the MJPEG encoder")]
    UnsupportedCodec(Codec),

    /// The source pixel format cannot be converted to codec scanlines
    ///
    /// Only 32-bit BGRX/RGBA, 24-bit RGB, and 16-bit 5-6-5 bitmaps can
    /// be streamed.
    #[error("pixel format {0:?} cannot be converted for streaming")]
    UnsupportedFormat(PixelFormat),

    /// Row byte math overflowed for the submitted dimensions
    #[error("stride computation overflowed for width {width}")]
    StrideOverflow {
        /// Width in pixels that caused the overflow
        width: u32,
    },

    /// The submitted rectangle does not fit inside the bitmap
    #[error("rectangle {0} exceeds bitmap bounds {1}x{2}")]
    RectOutOfBounds(String, u32, u32),

    /// A bitmap chunk ended in the middle of a stored row
    ///
    /// Chunk boundaries must fall on stride boundaries; a shorter
    /// remainder indicates corrupt chunk bookkeeping upstream.
    #[error("bitmap chunk {chunk} holds a partial row ({remaining} of {stride} bytes)")]
    BadChunkAlignment {
        /// Index of the offending chunk
        chunk: usize,
        /// Bytes left in the chunk
        remaining: usize,
        /// Expected row stride in bytes
        stride: usize,
    },

    /// The bitmap ran out of data before all rows were read
    #[error("bitmap data exhausted after {lines_read} of {lines_expected} rows")]
    TruncatedBitmap {
        /// Rows successfully extracted
        lines_read: u32,
        /// Rows the rectangle required
        lines_expected: u32,
    },

    /// The compressed-output buffer could not grow
    ///
    /// Raised when the allocator refuses the doubled capacity mid-frame.
    /// The frame is abandoned; encoding may succeed again once memory
    /// pressure subsides.
    #[error("output buffer could not grow past {capacity} bytes")]
    OutputOverflow {
        /// Capacity at the time growth failed
        capacity: usize,
    },

    /// The JPEG library rejected the frame
    #[error("JPEG compression failed: {0}")]
    Codec(String),
}

/// Result type for encoder operations
///
/// This is a convenience alias for `Result<T, EncoderError>`.
pub type Result<T> = std::result::Result<T, EncoderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EncoderError::UnsupportedCodec(Codec::H264);
        assert_eq!(
            err.to_string(),
            "codec H264 is not supported by the MJPEG encoder"
        );

        let err = EncoderError::TruncatedBitmap {
            lines_read: 3,
            lines_expected: 8,
        };
        assert_eq!(err.to_string(), "bitmap data exhausted after 3 of 8 rows");
    }

    #[test]
    fn test_error_matching() {
        let err = EncoderError::OutputOverflow { capacity: 8192 };
        assert!(matches!(err, EncoderError::OutputOverflow { capacity: 8192 }));
    }
}
