//! Video Encoder Interface and MJPEG Implementation
//!
//! [`VideoEncoder`] is the capability set a streaming server drives:
//! frame submission, client/server feedback ingress, and rate queries.
//! [`MjpegEncoder`] is the MJPEG implementation, wiring the rate
//! controller, the scanline extractor, and the JPEG shim together.
//!
//! # Usage
//!
//! ```rust
//! use mjpeg_adaptive::{
//!     Codec, DefaultHost, FrameBitmap, FrameOutcome, MediaTime, MjpegEncoder, PixelFormat,
//!     Rect, VideoEncoder,
//! };
//!
//! let mut encoder =
//!     MjpegEncoder::new(Codec::Mjpeg, 8_000_000, Box::new(DefaultHost)).expect("mjpeg");
//!
//! // A 2x2 BGRX test frame in a single chunk
//! let pixels = vec![0u8; 16];
//! let chunks: &[&[u8]] = &[&pixels];
//! let bitmap = FrameBitmap {
//!     format: PixelFormat::Bgrx32,
//!     width: 2,
//!     height: 2,
//!     stride: 8,
//!     top_down: true,
//!     chunks,
//! };
//!
//! match encoder.encode_frame(&bitmap, Rect::new(0, 0, 2, 2), MediaTime::from_millis(0)) {
//!     Ok(FrameOutcome::Encoded(frame)) => assert!(!frame.is_empty()),
//!     Ok(FrameOutcome::Dropped) => {}
//!     Err(e) => eprintln!("frame abandoned: {e}"),
//! }
//! ```

use tracing::{debug, warn};

use crate::bitmap::{FrameBitmap, LineReader, Rect};
use crate::buffer::{FrameBuffer, VideoBuffer};
use crate::clock::{Clock, MediaTime, SystemClock};
use crate::codec::JpegFrame;
use crate::error::{EncoderError, Result};
use crate::quality::QUALITY_SAMPLES;
use crate::rate::{ClientStreamReport, FrameAdmission, RateControl, StreamHost};

/// Video codecs of the surrounding stream protocol.
///
/// Each codec is served by its own encoder implementation; this crate
/// provides the [`Codec::Mjpeg`] one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Motion JPEG: independently decodable baseline JPEG frames.
    Mjpeg,
    /// VP8. Not handled by this crate.
    Vp8,
    /// H.264. Not handled by this crate.
    H264,
}

/// Result of submitting one candidate frame.
#[derive(Debug)]
pub enum FrameOutcome {
    /// The frame was compressed; the buffer is ready for transmission.
    Encoded(VideoBuffer),
    /// The admission gate skipped the frame to hold the target pacing.
    Dropped,
}

/// Aggregate encoder statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderStats {
    /// Bit rate the encoder was constructed with, bits/sec
    pub starting_bit_rate: u64,

    /// Current bit rate estimate, bits/sec
    pub cur_bit_rate: u64,

    /// Mean JPEG quality over all encoded frames
    pub avg_quality: f64,
}

/// Capability set a streaming server drives an encoder through.
///
/// Callers serialize access: no method may be invoked re-entrantly or
/// concurrently with another.
pub trait VideoEncoder {
    /// Submit one candidate frame.
    ///
    /// Returns [`FrameOutcome::Dropped`] when the admission gate skips
    /// the frame; errors mean the frame was abandoned and the encoder
    /// is ready for the next one.
    fn encode_frame(
        &mut self,
        bitmap: &FrameBitmap<'_>,
        rect: Rect,
        frame_mm_time: MediaTime,
    ) -> Result<FrameOutcome>;

    /// Ingest a playback report from the client.
    fn client_stream_report(&mut self, report: ClientStreamReport);

    /// Note that the streaming server dropped an outgoing frame.
    fn notify_server_frame_drop(&mut self);

    /// Current bit rate estimate in bits/sec.
    fn bit_rate(&self) -> u64;

    /// Aggregate statistics for this stream.
    fn stats(&self) -> EncoderStats;
}

/// Adaptive MJPEG encoder.
///
/// Owns all per-stream state; create one per outgoing video stream and
/// drop it when the stream ends. See the crate docs for the control
/// loop.
pub struct MjpegEncoder {
    rate: RateControl,
    starting_bit_rate: u64,
    num_frames: u64,
    sum_quality: u64,
}

impl MjpegEncoder {
    /// Create an encoder for `codec` with a starting bit-rate estimate
    /// in bits/sec.
    ///
    /// Fails with [`EncoderError::UnsupportedCodec`] for any codec
    /// other than [`Codec::Mjpeg`].
    pub fn new(
        codec: Codec,
        starting_bit_rate_bps: u64,
        host: Box<dyn StreamHost>,
    ) -> Result<Self> {
        Self::with_clock(codec, starting_bit_rate_bps, host, Box::new(SystemClock))
    }

    /// Like [`MjpegEncoder::new`] with an explicit time source, for
    /// tests and offline simulation.
    pub fn with_clock(
        codec: Codec,
        starting_bit_rate_bps: u64,
        host: Box<dyn StreamHost>,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        if codec != Codec::Mjpeg {
            return Err(EncoderError::UnsupportedCodec(codec));
        }

        debug!(starting_bit_rate_bps, "creating MJPEG encoder");
        Ok(Self {
            rate: RateControl::new(starting_bit_rate_bps, host, clock),
            starting_bit_rate: starting_bit_rate_bps,
            num_frames: 0,
            sum_quality: 0,
        })
    }

    /// Run the scanline loop and JPEG compression for one frame.
    fn compress(&self, bitmap: &FrameBitmap<'_>, rect: Rect, quality: u8) -> Result<VideoBuffer> {
        let mut reader = LineReader::new(bitmap, rect)?;
        let mut frame = JpegFrame::begin(rect.width, rect.height, quality)?;

        let mut row = vec![0u8; frame.row_len()];
        for _ in 0..rect.height {
            reader.next_rgb_row(&mut row)?;
            frame.write_scanline(&row);
        }

        let mut out = FrameBuffer::new().ok_or(EncoderError::OutputOverflow { capacity: 0 })?;
        frame.finish(&mut out)?;
        Ok(out.finish())
    }
}

impl VideoEncoder for MjpegEncoder {
    fn encode_frame(
        &mut self,
        bitmap: &FrameBitmap<'_>,
        rect: Rect,
        frame_mm_time: MediaTime,
    ) -> Result<FrameOutcome> {
        let quality_id = match self.rate.begin_frame(frame_mm_time) {
            FrameAdmission::Admit { quality_id } => quality_id,
            FrameAdmission::Drop => return Ok(FrameOutcome::Dropped),
        };
        let quality = QUALITY_SAMPLES[quality_id];

        match self.compress(bitmap, rect, quality) {
            Ok(buffer) => {
                self.rate.frame_encoded(buffer.len() as u64);
                self.num_frames += 1;
                self.sum_quality += u64::from(quality);
                Ok(FrameOutcome::Encoded(buffer))
            }
            Err(err) => {
                self.rate.frame_failed();
                warn!(%err, "frame abandoned");
                Err(err)
            }
        }
    }

    fn client_stream_report(&mut self, report: ClientStreamReport) {
        self.rate.client_stream_report(report);
    }

    fn notify_server_frame_drop(&mut self) {
        self.rate.notify_server_frame_drop();
    }

    fn bit_rate(&self) -> u64 {
        self.rate.bit_rate()
    }

    fn stats(&self) -> EncoderStats {
        let avg_quality = if self.num_frames == 0 {
            0.0
        } else {
            self.sum_quality as f64 / self.num_frames as f64
        };
        EncoderStats {
            starting_bit_rate: self.starting_bit_rate,
            cur_bit_rate: self.rate.bit_rate(),
            avg_quality,
        }
    }
}
