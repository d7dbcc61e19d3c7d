//! Baseline JPEG Shim
//!
//! Thin adapter between the scanline-oriented encode loop and the
//! `image` crate's whole-image JPEG encoder. The encode loop feeds one
//! converted RGB row at a time; the shim accumulates them and compresses
//! the finished plane into the caller's [`FrameBuffer`] when the frame
//! is complete.

use std::io;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageError};

use crate::buffer::FrameBuffer;
use crate::error::{EncoderError, Result};

/// One in-flight JPEG compression.
pub(crate) struct JpegFrame {
    width: u32,
    height: u32,
    quality: u8,
    rows: Vec<u8>,
    lines: u32,
}

impl JpegFrame {
    /// Start a frame at the given quality.
    pub(crate) fn begin(width: u32, height: u32, quality: u8) -> Result<Self> {
        let row_len = (width as usize)
            .checked_mul(3)
            .ok_or(EncoderError::StrideOverflow { width })?;
        let plane = row_len
            .checked_mul(height as usize)
            .ok_or(EncoderError::StrideOverflow { width })?;

        let mut rows = Vec::new();
        rows.try_reserve_exact(plane).map_err(|_| {
            EncoderError::Codec(format!("scanline buffer allocation failed ({plane} bytes)"))
        })?;

        Ok(Self {
            width,
            height,
            quality,
            rows,
            lines: 0,
        })
    }

    /// Bytes expected per scanline.
    pub(crate) fn row_len(&self) -> usize {
        self.width as usize * 3
    }

    /// Append one RGB scanline.
    pub(crate) fn write_scanline(&mut self, row: &[u8]) {
        debug_assert_eq!(row.len(), self.row_len());
        debug_assert!(self.lines < self.height);
        self.rows.extend_from_slice(row);
        self.lines += 1;
    }

    /// Compress the accumulated plane into `out`, returning the number
    /// of bytes written.
    pub(crate) fn finish(self, out: &mut FrameBuffer) -> Result<usize> {
        if self.lines != self.height {
            return Err(EncoderError::Codec(format!(
                "frame incomplete: {} of {} scanlines",
                self.lines, self.height
            )));
        }

        let encoder = JpegEncoder::new_with_quality(&mut *out, self.quality);
        encoder
            .write_image(
                &self.rows,
                self.width,
                self.height,
                ExtendedColorType::Rgb8,
            )
            .map_err(|err| match err {
                ImageError::IoError(io_err) if io_err.kind() == io::ErrorKind::OutOfMemory => {
                    EncoderError::OutputOverflow {
                        capacity: out.capacity(),
                    }
                }
                other => EncoderError::Codec(other.to_string()),
            })?;

        Ok(out.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encodes_valid_jpeg_stream() {
        let mut frame = JpegFrame::begin(4, 2, 80).expect("begin");
        let row = vec![128u8; frame.row_len()];
        frame.write_scanline(&row);
        frame.write_scanline(&row);

        let mut out = FrameBuffer::new().expect("buffer");
        let written = frame.finish(&mut out).expect("finish");
        assert!(written > 0);

        let jpeg = out.finish();
        assert_eq!(written, jpeg.len());
        // SOI marker at the start, EOI at the end
        assert_eq!(&jpeg.data()[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg.data()[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_quality_changes_output_size() {
        let mut sizes = Vec::new();
        for quality in [20u8, 80] {
            let mut frame = JpegFrame::begin(16, 16, quality).expect("begin");
            // Noisy-ish gradient so higher quality has detail to keep
            for y in 0..16u32 {
                let row: Vec<u8> = (0..16u32)
                    .flat_map(|x| {
                        let v = ((x * 16 + y * 7) % 256) as u8;
                        [v, v.wrapping_mul(3), v.wrapping_add(40)]
                    })
                    .collect();
                frame.write_scanline(&row);
            }
            let mut out = FrameBuffer::new().expect("buffer");
            sizes.push(frame.finish(&mut out).expect("finish"));
        }
        assert!(sizes[1] > sizes[0], "quality 80 should outweigh quality 20");
    }

    #[test]
    fn test_incomplete_frame_rejected() {
        let mut frame = JpegFrame::begin(4, 2, 50).expect("begin");
        let row = vec![0u8; frame.row_len()];
        frame.write_scanline(&row);

        let mut out = FrameBuffer::new().expect("buffer");
        let err = frame.finish(&mut out).expect_err("one scanline missing");
        assert!(matches!(err, EncoderError::Codec(_)));
    }
}
