//! # mjpeg-adaptive
//!
//! Adaptive-rate MJPEG video encoding core for remote display
//! streaming.
//!
//! The crate turns raw framebuffer rectangles into a stream of
//! independently decodable baseline JPEG frames, sized for a network
//! of unknown and varying capacity. The JPEG compression itself is
//! ordinary; the engineering content is the closed-loop controller
//! that continuously adjusts two knobs, JPEG quality and target frame
//! rate, against an estimated channel byte rate and client/server
//! feedback.
//!
//! # Features
//!
//! - **Admission gating**: per-frame pacing against an adjusted frame
//!   rate, so the long-run average tracks the target
//! - **Quality probing**: bounded evaluation rounds over a fixed
//!   seven-point JPEG quality grid pick the best sustainable
//!   quality/fps operating point
//! - **Bit-rate estimation**: encoded-frame statistics plus client
//!   stream reports and server drop notifications move the channel
//!   estimate up and down
//! - **Pixel conversion**: 32-bit BGRX/RGBA, 24-bit RGB, and 16-bit
//!   5-6-5 chunked bitmaps converted to codec scanlines
//! - **Deterministic testing**: the monotonic time source is a trait,
//!   with a manual clock for simulations
//!
//! # Quick Start
//!
//! ```rust
//! use mjpeg_adaptive::{
//!     Codec, DefaultHost, FrameBitmap, FrameOutcome, MediaTime, MjpegEncoder, PixelFormat,
//!     Rect, VideoEncoder,
//! };
//!
//! // 8 Mbps starting estimate, default host callbacks
//! let mut encoder =
//!     MjpegEncoder::new(Codec::Mjpeg, 8_000_000, Box::new(DefaultHost)).expect("mjpeg");
//!
//! let pixels = vec![0u8; 4 * 64 * 64];
//! let chunks: &[&[u8]] = &[&pixels];
//! let bitmap = FrameBitmap {
//!     format: PixelFormat::Bgrx32,
//!     width: 64,
//!     height: 64,
//!     stride: 256,
//!     top_down: true,
//!     chunks,
//! };
//!
//! match encoder.encode_frame(&bitmap, Rect::new(0, 0, 64, 64), MediaTime::from_millis(0)) {
//!     Ok(FrameOutcome::Encoded(frame)) => {
//!         // send frame.data() to the viewer
//!         assert!(!frame.is_empty());
//!     }
//!     Ok(FrameOutcome::Dropped) => {
//!         // pacing gate skipped this frame
//!     }
//!     Err(e) => eprintln!("frame abandoned: {e}"),
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Streaming server   │  frames, rects, media timestamps
//! └─────────┬───────────┘
//!           │ encode_frame()
//!           ▼
//! ┌─────────────────────┐
//! │  RateControl        │ ◄── admission gate (adjusted fps)
//! │  (adaptive state)   │     quality evaluation rounds
//! └─────────┬───────────┘     bit-rate estimator
//!           │ admitted at quality id
//!           ▼
//! ┌─────────────────────┐
//! │  LineReader         │ ◄── chunk walking
//! │  (pixel adapter)    │     format conversion to RGB
//! └─────────┬───────────┘
//!           │ scanlines
//!           ▼
//! ┌─────────────────────┐
//! │  JPEG shim          │ ◄── baseline JPEG via `image`
//! │  (growable buffer)  │     doubling destination buffer
//! └─────────┬───────────┘
//!           │ VideoBuffer
//!           ▼
//!    wire transmission        feedback returns via
//!                             client_stream_report() and
//!                             notify_server_frame_drop()
//! ```
//!
//! # Concurrency
//!
//! The encoder is deliberately single-threaded: one caller owns it and
//! serializes frame submission, feedback, and queries. Host callbacks
//! run synchronously on the caller's thread and must not re-enter the
//! encoder.

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod bitmap;
pub mod buffer;
pub mod clock;
mod codec;
pub mod encoder;
pub mod error;
pub mod quality;
pub mod rate;

// =============================================================================
// RE-EXPORTS - PRIMARY API
// =============================================================================

// Encoder (primary entry point)
pub use encoder::{Codec, EncoderStats, FrameOutcome, MjpegEncoder, VideoEncoder};

// Feedback interface
pub use rate::{ClientStreamReport, DefaultHost, StreamHost};

// Frame input and output types
pub use bitmap::{FrameBitmap, PixelFormat, Rect};
pub use buffer::VideoBuffer;

// Time sources
pub use clock::{Clock, ManualClock, MediaTime, SystemClock};

// Errors
pub use error::{EncoderError, Result};

// Quality grid
pub use quality::{MEDIAN_QUALITY_ID, QUALITY_SAMPLES};

// =============================================================================
// CRATE-LEVEL ITEMS
// =============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
