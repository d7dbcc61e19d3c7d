//! Adaptive Rate Control
//!
//! Closed-loop controller that keeps an MJPEG stream inside an
//! estimated channel byte rate by adjusting two knobs: the JPEG quality
//! grid point and the target frame rate.
//!
//! # How It Works
//!
//! Every candidate frame passes through an admission gate paced by
//! `adjusted_fps`, an internal rate kept at or above the target `fps`
//! so the long-run average actually tracks the target. Encoded frame
//! sizes feed a short moving window; when the window says the channel
//! could sustain a different frame rate at the current quality, a
//! quality-evaluation round probes neighboring grid points for a better
//! operating point.
//!
//! Two feedback paths move the byte-rate estimate itself:
//!
//! - **Server drops**: the streaming server reporting that it had to
//!   drop outgoing frames. A drop share above 10% over roughly a second
//!   lowers the estimate.
//! - **Client stream reports**: playback statistics from the viewer.
//!   Shrinking playback latency lowers the estimate; a clean, stable
//!   report raises it.
//!
//! Downgrades are suppressed for the first three seconds after
//! construction, so a cold-start burst does not poison the estimate.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::clock::{Clock, MediaTime};
use crate::quality::{
    achievable_fps, EvalReason, EvalStep, EvalType, QualityEval, IMPROVE_QUALITY_FPS_STRICT_TH,
    MEDIAN_QUALITY_ID, QUALITY_SAMPLES,
};

/// Highest target frame rate the controller will set.
pub(crate) const MAX_FPS: u32 = 25;

/// Lowest target frame rate the controller will set.
pub(crate) const MIN_FPS: u32 = 1;

/// Frames averaged for the recent-size window.
const AVERAGE_SIZE_WINDOW: u32 = 3;

/// Minimum accumulated frames before the measured byte rate is trusted.
const BIT_RATE_EVAL_MIN_NUM_FRAMES: u32 = 3;

/// Cadence of the adjusted-fps recalibration, in milliseconds.
const ADJUST_FPS_WINDOW_MS: u64 = 500;

/// Initial `adjusted_fps / fps` pacing ratio.
const INITIAL_ADJUSTED_FPS_RATIO: f64 = 1.5;

/// Target frame rate installed at stream start.
const INITIAL_FPS: u32 = 5;

/// Downgrades are ignored for this long after construction.
const WARMUP_TIME: Duration = Duration::from_secs(3);

/// Server drop statistics are evaluated once per this many seconds of
/// nominal frames.
const SERVER_STATUS_EVAL_FPS_INTERVAL: u32 = 1;

/// Drop share above which the bit rate is decreased.
const SERVER_DROP_FACTOR_TH: f64 = 0.1;

/// Stability required after a bit-rate change before a positive client
/// report may raise the rate again, in media-time milliseconds.
const POSITIVE_REPORT_TIMEOUT_MS: i64 = 2000;

/// Stricter stability timeout used near the top of the operating range.
const POSITIVE_REPORT_STRICT_TIMEOUT_MS: i64 = 3000;

/// Ceiling for the playback delay pushed to the client, in ms.
const MAX_CLIENT_PLAYBACK_DELAY_MS: u64 = 5000;

/// Video delay below this is an immediate negative report, in ms.
const VIDEO_DELAY_NEGATIVE_TH_MS: i32 = -15;

/// Video latency must exceed audio latency by this factor before the
/// audio-underflow rule downgrades.
const VIDEO_VS_AUDIO_LATENCY_FACTOR: f64 = 1.25;

/// Audio latency below this share of its observed maximum counts as
/// collapsed.
const AUDIO_LATENCY_DECREASE_FACTOR: f64 = 0.5;

/// Video latency below this share of its maximum is a medium decrease.
const VIDEO_DELAY_MEDIUM_DECREASE_FACTOR: f64 = 0.5;

/// Video latency below this share of its maximum is a major decrease.
const VIDEO_DELAY_MAJOR_DECREASE_FACTOR: f64 = 0.25;

/// Callbacks supplied by the streaming host.
///
/// All methods have defaults, so a host that cannot answer a question
/// simply omits the override. Implementations must not call back into
/// the encoder.
pub trait StreamHost {
    /// Frame rate at which the source currently produces frames.
    fn source_fps(&self) -> u32 {
        MAX_FPS
    }

    /// Network round-trip time to the client, in milliseconds.
    ///
    /// The controller uses half of this as the one-way latency.
    fn roundtrip_ms(&self) -> u32 {
        0
    }

    /// Push a new minimum playback delay to the client, in ms.
    fn update_client_playback_delay(&mut self, delay_ms: u32) {
        let _ = delay_ms;
    }
}

/// Host with every default: a 25 fps source, zero latency, and no
/// playback-delay sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHost;

impl StreamHost for DefaultHost {}

/// Playback statistics reported by the client.
#[derive(Debug, Clone, Copy)]
pub struct ClientStreamReport {
    /// Frames the client received in the reported window
    pub num_frames: u32,

    /// Frames the client dropped in the reported window
    pub num_drops: u32,

    /// Media time of the first frame in the window
    pub start_frame_mm_time: MediaTime,

    /// Media time of the last frame in the window
    pub end_frame_mm_time: MediaTime,

    /// Margin between a frame's deadline and its arrival; negative
    /// means frames arrive late
    pub video_delay_ms: i32,

    /// Audio playback latency observed by the client
    pub audio_delay_ms: u32,
}

/// Encoded-frame statistics accumulated since the last bit-rate change.
#[derive(Debug, Default)]
struct BitRateInfo {
    change_start_time: Option<Instant>,
    change_start_mm_time: MediaTime,
    last_frame_time: Option<Instant>,
    num_enc_frames: u32,
    sum_enc_size: u64,
    was_upgraded: bool,
}

impl BitRateInfo {
    /// Open a fresh measurement window. The admission-gate timestamp is
    /// deliberately kept.
    fn restart(&mut self, was_upgraded: bool) {
        self.change_start_time = None;
        self.change_start_mm_time = MediaTime::ZERO;
        self.num_enc_frames = 0;
        self.sum_enc_size = 0;
        self.was_upgraded = was_upgraded;
    }
}

/// Latency maxima observed since the last bit-rate decrement.
#[derive(Debug, Default)]
struct ClientState {
    max_video_latency: i32,
    max_audio_latency: u32,
}

/// Local frame accounting for server-side drop detection.
#[derive(Debug, Default)]
struct ServerState {
    num_frames_encoded: u32,
    num_frames_dropped: u32,
}

/// Admission decision for one candidate frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameAdmission {
    /// Encode the frame at this grid point.
    Admit {
        /// Quality id to encode at
        quality_id: usize,
    },
    /// Too soon since the last accepted frame.
    Drop,
}

/// All adaptive state for one stream.
///
/// Owned by the encoder; not thread-safe by design. The caller
/// serializes frame submission and feedback.
pub(crate) struct RateControl {
    clock: Box<dyn Clock>,
    host: Box<dyn StreamHost>,

    quality_id: usize,
    fps: u32,
    /// Pacing rate for the admission gate, kept >= `fps`.
    adjusted_fps: f64,
    adjusted_fps_start_time: Option<Instant>,
    adjusted_fps_num_frames: u64,

    /// Estimated channel capacity in bytes/sec.
    byte_rate: u64,
    /// Frame size the current operating point was chosen on.
    base_enc_size: u64,
    last_enc_size: u64,
    sum_recent_enc_size: u64,
    num_recent_enc_frames: u32,

    warmup_start_time: Option<Instant>,

    during_quality_eval: bool,
    quality_eval: QualityEval,
    bit_rate_info: BitRateInfo,
    client_state: ClientState,
    server_state: ServerState,
}

impl RateControl {
    /// Create the controller and arm the initial calibration round.
    pub(crate) fn new(
        starting_bit_rate_bps: u64,
        host: Box<dyn StreamHost>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let mut rate = Self {
            clock,
            host,
            quality_id: MEDIAN_QUALITY_ID,
            fps: INITIAL_FPS,
            adjusted_fps: 0.0,
            adjusted_fps_start_time: None,
            adjusted_fps_num_frames: 0,
            byte_rate: 0,
            base_enc_size: 0,
            last_enc_size: 0,
            sum_recent_enc_size: 0,
            num_recent_enc_frames: 0,
            warmup_start_time: Some(now),
            during_quality_eval: false,
            quality_eval: QualityEval::default(),
            bit_rate_info: BitRateInfo::default(),
            client_state: ClientState::default(),
            server_state: ServerState::default(),
        };

        rate.reset_quality(MEDIAN_QUALITY_ID, INITIAL_FPS, 0);
        rate.byte_rate = (starting_bit_rate_bps / 8).max(1);

        // The first real encode calibrates the operating point against
        // the actual channel
        rate.during_quality_eval = true;
        rate.quality_eval.arm_set(EvalReason::RateChange);

        rate
    }

    /// Current bit rate estimate in bits/sec.
    pub(crate) fn bit_rate(&self) -> u64 {
        self.byte_rate * 8
    }

    pub(crate) fn quality_id(&self) -> usize {
        self.quality_id
    }

    /// Steps 1-5 of frame submission: recalibration, admission gate,
    /// parameter update, and timing bookkeeping.
    pub(crate) fn begin_frame(&mut self, frame_mm_time: MediaTime) -> FrameAdmission {
        let now = self.clock.now();

        if self.adjusted_fps_start_time.is_none() {
            self.adjusted_fps_start_time = Some(now);
        }
        self.adjust_fps(now);

        if let Some(last) = self.bit_rate_info.last_frame_time {
            let interval = now.saturating_duration_since(last);
            if interval < Duration::from_secs_f64(1.0 / self.adjusted_fps) {
                return FrameAdmission::Drop;
            }
        }

        self.adjust_params_to_bit_rate();

        if !self.during_quality_eval || self.quality_eval.reason == EvalReason::SizeChange {
            if self.bit_rate_info.change_start_time.is_none() {
                self.bit_rate_info.change_start_time = Some(now);
                self.bit_rate_info.change_start_mm_time = frame_mm_time;
            }
            self.bit_rate_info.last_frame_time = Some(now);
        }

        FrameAdmission::Admit {
            quality_id: self.quality_id,
        }
    }

    /// Account for a successfully encoded frame of `enc_size` bytes.
    pub(crate) fn frame_encoded(&mut self, enc_size: u64) {
        self.last_enc_size = enc_size;
        self.server_state.num_frames_encoded += 1;

        if !self.during_quality_eval || self.quality_eval.reason == EvalReason::SizeChange {
            if self.num_recent_enc_frames >= AVERAGE_SIZE_WINDOW {
                self.num_recent_enc_frames = 0;
                self.sum_recent_enc_size = 0;
            }
            self.sum_recent_enc_size += enc_size;
            self.num_recent_enc_frames += 1;
            self.adjusted_fps_num_frames += 1;
        }

        self.bit_rate_info.sum_enc_size += enc_size;
        self.bit_rate_info.num_enc_frames += 1;
    }

    /// Account for a frame the codec had to abandon.
    pub(crate) fn frame_failed(&mut self) {
        self.last_enc_size = 0;
    }

    /// Periodic recalibration of the pacing rate against the achieved
    /// frame rate.
    fn adjust_fps(&mut self, now: Instant) {
        let Some(start) = self.adjusted_fps_start_time else {
            return;
        };
        let elapsed_ms = now.saturating_duration_since(start).as_millis() as u64;

        if self.during_quality_eval
            || elapsed_ms <= ADJUST_FPS_WINDOW_MS
            || (elapsed_ms as f64) <= 1000.0 / self.adjusted_fps
        {
            return;
        }

        let avg_fps = (self.adjusted_fps_num_frames * 1000) as f64 / elapsed_ms as f64;
        debug!(
            frames = self.adjusted_fps_num_frames,
            window_ms = elapsed_ms,
            avg_fps,
            fps = self.fps,
            adjusted_fps = self.adjusted_fps,
            "fps recalibration"
        );

        if avg_fps + 0.5 < f64::from(self.fps) && f64::from(self.host.source_fps()) > avg_fps {
            let new_adjusted_fps = if avg_fps == 0.0 {
                self.adjusted_fps * 2.0
            } else {
                self.adjusted_fps * (f64::from(self.fps) / avg_fps)
            };
            self.adjusted_fps = f64::from(self.fps * 2).min(new_adjusted_fps);
            debug!(adjusted_fps = self.adjusted_fps, "increasing adjusted fps");
        } else if f64::from(self.fps) + 0.5 < avg_fps {
            let new_adjusted_fps = self.adjusted_fps / (avg_fps / f64::from(self.fps));
            self.adjusted_fps = f64::from(self.fps).max(new_adjusted_fps);
            debug!(adjusted_fps = self.adjusted_fps, "decreasing adjusted fps");
        }

        self.adjusted_fps_start_time = Some(now);
        self.adjusted_fps_num_frames = 0;
    }

    /// Re-evaluate quality and frame rate against the byte-rate
    /// estimate. Runs once per admitted frame, before encoding.
    fn adjust_params_to_bit_rate(&mut self) {
        if self.last_enc_size == 0 {
            return;
        }

        if self.during_quality_eval {
            self.quality_eval
                .record_sample(self.quality_id, self.last_enc_size);
            self.eval_quality();
            return;
        }

        if self.num_recent_enc_frames < AVERAGE_SIZE_WINDOW.min(self.fps) {
            self.process_server_drops();
            return;
        }

        let new_avg_enc_size = self.sum_recent_enc_size / u64::from(self.num_recent_enc_frames);
        let new_fps = achievable_fps(self.byte_rate, new_avg_enc_size);
        let src_fps = self.host.source_fps();

        if new_fps > self.fps && (self.fps < src_fps || self.quality_id < QUALITY_SAMPLES.len() - 1)
        {
            debug!(
                new_fps,
                fps = self.fps,
                new_avg_enc_size,
                base_enc_size = self.base_enc_size,
                "size headroom, probing upward"
            );
            self.arm_upgrade_eval(EvalReason::SizeChange, self.quality_id, self.fps);
        } else if new_fps < self.fps && new_fps < src_fps {
            debug!(
                new_fps,
                fps = self.fps,
                new_avg_enc_size,
                base_enc_size = self.base_enc_size,
                "sizes grew, probing downward"
            );
            self.arm_downgrade_eval(EvalReason::SizeChange, self.quality_id, self.fps);
        } else {
            self.process_server_drops();
        }
    }

    /// One step of the active quality-evaluation round.
    fn eval_quality(&mut self) {
        let src_fps = self.host.source_fps();
        match self
            .quality_eval
            .step(self.quality_id, self.byte_rate, src_fps)
        {
            None => {}
            Some(EvalStep::Sample(next_id)) => {
                debug!(from = self.quality_id, to = next_id, "sampling next quality");
                self.quality_id = next_id;
            }
            Some(EvalStep::Complete {
                quality_id,
                fps,
                enc_size,
            }) => {
                self.reset_quality(quality_id, fps, enc_size);
            }
        }
    }

    /// Install a new operating point and leave any active round.
    fn reset_quality(&mut self, quality_id: usize, fps: u32, enc_size: u64) {
        self.during_quality_eval = false;

        if self.quality_id != quality_id {
            self.last_enc_size = 0;
        }
        if self.quality_eval.reason == EvalReason::RateChange {
            self.server_state = ServerState::default();
        }
        self.quality_id = quality_id;
        self.quality_eval = QualityEval::default();

        let fps_ratio = if self.adjusted_fps != 0.0 {
            self.adjusted_fps / f64::from(self.fps)
        } else {
            INITIAL_ADJUSTED_FPS_RATIO
        };
        self.fps = fps.clamp(MIN_FPS, MAX_FPS);
        self.adjusted_fps = f64::from(self.fps) * fps_ratio;
        debug!(
            quality = QUALITY_SAMPLES[self.quality_id],
            fps = self.fps,
            adjusted_fps = self.adjusted_fps,
            "operating point reset"
        );
        self.adjusted_fps_start_time = None;
        self.adjusted_fps_num_frames = 0;
        self.base_enc_size = enc_size;
        self.sum_recent_enc_size = 0;
        self.num_recent_enc_frames = 0;

        let min_delay = self.min_required_playback_delay(enc_size);
        self.host.update_client_playback_delay(min_delay);
    }

    /// One-way latency to the client in milliseconds.
    fn latency_ms(&self) -> u32 {
        self.host.roundtrip_ms() / 2
    }

    /// Smallest playback delay at which a frame of `frame_enc_size`
    /// bytes arrives before its deadline.
    fn min_required_playback_delay(&self, frame_enc_size: u64) -> u32 {
        let latency = self.latency_ms();
        if frame_enc_size == 0 || self.byte_rate == 0 {
            return latency;
        }
        let one_frame_time_ms = frame_enc_size * 1000 / self.byte_rate;
        (one_frame_time_ms * 2 + u64::from(latency)).min(MAX_CLIENT_PLAYBACK_DELAY_MS) as u32
    }

    fn arm_upgrade_eval(&mut self, reason: EvalReason, min_quality_id: usize, min_quality_fps: u32) {
        self.during_quality_eval = true;
        self.quality_eval
            .arm_upgrade(reason, min_quality_id, min_quality_fps);
    }

    fn arm_downgrade_eval(&mut self, reason: EvalReason, max_quality_id: usize, max_quality_fps: u32) {
        self.during_quality_eval = true;
        self.quality_eval
            .arm_downgrade(reason, max_quality_id, max_quality_fps);
    }

    /// Abort an active round, falling back to its conservative bound.
    fn quality_eval_stop(&mut self) {
        if !self.during_quality_eval {
            return;
        }
        let (quality_id, fps) = self.quality_eval.abort_point();
        debug!(quality_id, fps, "aborting quality evaluation");
        self.reset_quality(quality_id, fps, 0);
    }

    /// Measured byte rate and average frame size over the current
    /// window, when the window holds enough evidence.
    fn measured_bit_rate_info(&self) -> Option<(u64, u64)> {
        let info = &self.bit_rate_info;
        if info.num_enc_frames < BIT_RATE_EVAL_MIN_NUM_FRAMES.max(self.fps) {
            return None;
        }
        let start = info.change_start_time?;
        let end = info.last_frame_time?;
        let duration = end.saturating_duration_since(start);
        if duration.is_zero() {
            return None;
        }

        let measured_byte_rate = (info.sum_enc_size as f64 / duration.as_secs_f64()) as u64;
        let avg_frame_size = info.sum_enc_size / u64::from(info.num_enc_frames);
        Some((measured_byte_rate, avg_frame_size))
    }

    /// Lower the byte-rate estimate and probe downward.
    fn decrease_bit_rate(&mut self) {
        self.quality_eval_stop();
        self.client_state = ClientState::default();

        if let Some(warmup_start) = self.warmup_start_time {
            if self.clock.now().saturating_duration_since(warmup_start) < WARMUP_TIME {
                debug!("during warmup, ignoring");
                return;
            }
            self.warmup_start_time = None;
        }

        let (measured_byte_rate, decrease_size) =
            if let Some((measured, avg_frame_size)) = self.measured_bit_rate_info() {
                (measured, avg_frame_size)
            } else {
                debug!("not enough samples for a measured rate");
                (self.byte_rate, self.byte_rate / u64::from(self.fps))
            };

        let measured_byte_rate = measured_byte_rate.min(self.byte_rate);
        let decrease_size = if decrease_size >= measured_byte_rate {
            measured_byte_rate / 2
        } else {
            decrease_size
        };

        self.byte_rate = (measured_byte_rate - decrease_size).max(1);
        self.bit_rate_info.restart(false);
        debug!(
            bit_rate_mbps = (self.byte_rate * 8) as f64 / 1e6,
            "bit rate decreased"
        );

        self.arm_downgrade_eval(EvalReason::RateChange, self.quality_id, self.fps);
    }

    /// Raise the byte-rate estimate and probe upward.
    fn increase_bit_rate(&mut self) {
        let Some((measured_byte_rate, increase_size)) = self.measured_bit_rate_info() else {
            debug!("not enough frames to evaluate the bit rate, no change");
            return;
        };

        self.quality_eval_stop();

        if measured_byte_rate + increase_size >= self.byte_rate {
            self.byte_rate = measured_byte_rate.min(self.byte_rate) + increase_size;
            debug!(
                bit_rate_mbps = (self.byte_rate * 8) as f64 / 1e6,
                "bit rate increased"
            );
        } else {
            debug!("measured rate below the current estimate, keeping it");
        }

        self.bit_rate_info.restart(true);
        self.arm_upgrade_eval(EvalReason::RateChange, self.quality_id, self.fps);
    }

    /// Evaluate the server-side drop share once enough nominal frames
    /// have passed.
    fn process_server_drops(&mut self) {
        let eval_fps = self.fps.min(self.host.source_fps());
        if self.server_state.num_frames_encoded < eval_fps * SERVER_STATUS_EVAL_FPS_INTERVAL {
            return;
        }

        let num_frames_total =
            self.server_state.num_frames_dropped + self.server_state.num_frames_encoded;
        let drop_factor =
            f64::from(self.server_state.num_frames_dropped) / f64::from(num_frames_total);

        debug!(drop_factor, "server drop evaluation");
        if drop_factor > SERVER_DROP_FACTOR_TH {
            self.decrease_bit_rate();
        }

        self.server_state.num_frames_encoded = 0;
        self.server_state.num_frames_dropped = 0;
    }

    /// The streaming server dropped one of our frames before sending.
    pub(crate) fn notify_server_frame_drop(&mut self) {
        self.server_state.num_frames_dropped += 1;
        self.process_server_drops();
    }

    /// Ingest a playback report from the client.
    pub(crate) fn client_stream_report(&mut self, report: ClientStreamReport) {
        debug!(
            frames = report.num_frames,
            drops = report.num_drops,
            duration_ms = report.end_frame_mm_time.delta_ms(report.start_frame_mm_time),
            video_delay = report.video_delay_ms,
            audio_delay = report.audio_delay_ms,
            "client stream report"
        );

        if self.during_quality_eval
            && self.quality_eval.eval_type == EvalType::Downgrade
            && self.quality_eval.reason == EvalReason::RateChange
        {
            debug!("during downgrade evaluation, ignoring");
            return;
        }

        let avg_enc_size = if self.num_recent_enc_frames > 0 {
            self.sum_recent_enc_size / u64::from(self.num_recent_enc_frames)
        } else {
            0
        };
        let min_playback_delay = self.min_required_playback_delay(avg_enc_size);
        let mut is_video_delay_small = false;

        if i64::from(min_playback_delay) > i64::from(report.video_delay_ms) {
            let src_fps = self.host.source_fps();
            // At the absolute ceiling the real channel rate cannot be
            // estimated, so the delay gap carries no information
            if self.quality_id != QUALITY_SAMPLES.len() - 1
                || self.fps < src_fps.min(MAX_FPS)
                || report.video_delay_ms < 0
            {
                is_video_delay_small = true;
                self.host.update_client_playback_delay(min_playback_delay);
            }
        }

        // Client audio underflow shows up as collapsed audio latency
        // while video latency stays high; slow the video to match
        if report.video_delay_ms > 0
            && f64::from(report.audio_delay_ms)
                < AUDIO_LATENCY_DECREASE_FACTOR * f64::from(self.client_state.max_audio_latency)
            && f64::from(report.video_delay_ms)
                > VIDEO_VS_AUDIO_LATENCY_FACTOR * f64::from(report.audio_delay_ms)
        {
            debug!("video latency far above audio latency");
            self.handle_negative_report(report.end_frame_mm_time);
            return;
        }

        if report.video_delay_ms < VIDEO_DELAY_NEGATIVE_TH_MS {
            self.handle_negative_report(report.end_frame_mm_time);
        } else {
            self.client_state.max_video_latency = self
                .client_state
                .max_video_latency
                .max(report.video_delay_ms);
            self.client_state.max_audio_latency = self
                .client_state
                .max_audio_latency
                .max(report.audio_delay_ms);

            let medium_delay_th = VIDEO_DELAY_MEDIUM_DECREASE_FACTOR
                * f64::from(self.client_state.max_video_latency);
            let major_delay_th = VIDEO_DELAY_MAJOR_DECREASE_FACTOR
                * f64::from(self.client_state.max_video_latency);

            // Downgrade on a major latency decrease, or a medium one
            // paired with a playback delay that is already too small
            if (f64::from(report.video_delay_ms) < medium_delay_th && is_video_delay_small)
                || f64::from(report.video_delay_ms) < major_delay_th
            {
                debug!("video delay shrinking");
                self.handle_negative_report(report.end_frame_mm_time);
            } else if report.num_drops == 0 {
                self.handle_positive_report(report.start_frame_mm_time);
            }
        }
    }

    fn handle_negative_report(&mut self, report_end_mm_time: MediaTime) {
        // A downgrade that already happened after the reported window
        // makes the report stale
        if !self.bit_rate_info.was_upgraded
            && (self.bit_rate_info.change_start_mm_time > report_end_mm_time
                || self.bit_rate_info.change_start_mm_time.is_zero())
        {
            debug!("report predates the last bit rate change, ignoring");
            return;
        }

        self.decrease_bit_rate();
    }

    fn handle_positive_report(&mut self, report_start_mm_time: MediaTime) {
        if self.during_quality_eval && self.quality_eval.reason == EvalReason::RateChange {
            debug!("during rate change evaluation, ignoring");
            return;
        }

        let timeout = if (self.fps > IMPROVE_QUALITY_FPS_STRICT_TH
            || self.fps >= self.host.source_fps())
            && self.quality_id > MEDIAN_QUALITY_ID
        {
            POSITIVE_REPORT_STRICT_TIMEOUT_MS
        } else {
            POSITIVE_REPORT_TIMEOUT_MS
        };

        let stable_client_mm_time =
            report_start_mm_time.delta_ms(self.bit_rate_info.change_start_mm_time);

        if self.bit_rate_info.change_start_mm_time.is_zero() || stable_client_mm_time < timeout {
            debug!(
                stable_client_mm_time,
                timeout, "not enough playback stability since the last change"
            );
            return;
        }

        self.increase_bit_rate();
    }
}
