//! Quality Grid and Evaluation Rounds
//!
//! The encoder never picks an arbitrary JPEG quality: it operates on a
//! fixed seven-point grid and refers to grid points by id. When the
//! rate controller suspects the operating point is wrong it runs an
//! *evaluation round*: a bounded walk over neighboring grid points,
//! encoding one real frame per point, until the highest quality whose
//! frame size still admits a reasonable frame rate is found.
//!
//! The walk assumes compressed size grows with quality. When a codec
//! breaks that monotonicity the completion step falls back to the best
//! frame rate actually observed during the round, so a bad sample can
//! never select a worse operating point than one already measured.

use tracing::debug;

use crate::rate::MAX_FPS;

/// The JPEG quality grid. Decisions reference indices into this table,
/// never raw quality values.
pub const QUALITY_SAMPLES: [u8; 7] = [20, 30, 40, 50, 60, 70, 80];

/// Grid index of the median quality, the starting operating point.
pub const MEDIAN_QUALITY_ID: usize = QUALITY_SAMPLES.len() / 2;

/// Below this frame rate, raising quality further is only worthwhile if
/// the source itself is that slow.
pub(crate) const IMPROVE_QUALITY_FPS_STRICT_TH: u32 = 10;

/// Minimum frame rate at which a quality upgrade may be attempted.
pub(crate) const IMPROVE_QUALITY_FPS_PERMISSIVE_TH: u32 = 5;

/// Highest frame rate a frame of `enc_size` bytes admits at `byte_rate`.
///
/// An unknown frame size is treated as unconstrained.
pub(crate) fn achievable_fps(byte_rate: u64, enc_size: u64) -> u32 {
    if enc_size == 0 {
        MAX_FPS
    } else {
        (byte_rate / enc_size).min(u64::from(u32::MAX)) as u32
    }
}

/// What kind of operating-point change a round is probing for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EvalType {
    /// Initial calibration at stream start.
    Set,
    /// Looking for a higher quality/fps point.
    Upgrade,
    /// Looking for a lower quality/fps point.
    Downgrade,
}

/// Why the round was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum EvalReason {
    /// Observed frame sizes drifted from the sizes the current point
    /// was chosen on.
    #[default]
    SizeChange,
    /// The bit-rate estimate itself moved.
    RateChange,
}

/// Outcome of one evaluation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EvalStep {
    /// Move to this grid point and encode a frame there.
    Sample(usize),
    /// The round is over; install this operating point.
    Complete {
        quality_id: usize,
        fps: u32,
        enc_size: u64,
    },
}

/// State of one quality-evaluation round.
///
/// Outside a round only the boundary defaults are meaningful
/// (`max_quality_id`/`max_quality_fps` reset to the grid top).
#[derive(Debug, Clone)]
pub(crate) struct QualityEval {
    pub(crate) eval_type: EvalType,
    pub(crate) reason: EvalReason,
    /// Encoded frame size per grid point; 0 means not yet sampled.
    pub(crate) encoded_size_by_quality: [u64; QUALITY_SAMPLES.len()],
    pub(crate) min_quality_id: usize,
    pub(crate) min_quality_fps: u32,
    pub(crate) max_quality_id: usize,
    pub(crate) max_quality_fps: u32,
    /// Best frame rate observed in this round and where it occurred.
    pub(crate) max_sampled_fps: u32,
    pub(crate) max_sampled_fps_quality_id: usize,
}

impl Default for QualityEval {
    fn default() -> Self {
        Self {
            eval_type: EvalType::Set,
            reason: EvalReason::default(),
            encoded_size_by_quality: [0; QUALITY_SAMPLES.len()],
            min_quality_id: 0,
            min_quality_fps: 0,
            max_quality_id: QUALITY_SAMPLES.len() - 1,
            max_quality_fps: MAX_FPS,
            max_sampled_fps: 0,
            max_sampled_fps_quality_id: 0,
        }
    }
}

impl QualityEval {
    /// Arm an initial calibration round.
    pub(crate) fn arm_set(&mut self, reason: EvalReason) {
        self.eval_type = EvalType::Set;
        self.reason = reason;
    }

    /// Arm an upgrade round bounded below by the current operating
    /// point.
    pub(crate) fn arm_upgrade(&mut self, reason: EvalReason, min_quality_id: usize, min_quality_fps: u32) {
        self.eval_type = EvalType::Upgrade;
        self.reason = reason;
        self.min_quality_id = min_quality_id;
        self.min_quality_fps = min_quality_fps;
    }

    /// Arm a downgrade round bounded above by the current operating
    /// point.
    pub(crate) fn arm_downgrade(&mut self, reason: EvalReason, max_quality_id: usize, max_quality_fps: u32) {
        self.eval_type = EvalType::Downgrade;
        self.reason = reason;
        self.max_quality_id = max_quality_id;
        self.max_quality_fps = max_quality_fps;
    }

    /// Record the encoded size of a frame produced at `quality_id`.
    pub(crate) fn record_sample(&mut self, quality_id: usize, enc_size: u64) {
        self.encoded_size_by_quality[quality_id] = enc_size;
    }

    /// Operating point to fall back to when the round is aborted.
    pub(crate) fn abort_point(&self) -> (usize, u32) {
        match self.eval_type {
            EvalType::Upgrade => (self.min_quality_id, self.min_quality_fps),
            EvalType::Downgrade => (self.max_quality_id, self.max_quality_fps),
            EvalType::Set => (MEDIAN_QUALITY_ID, MAX_FPS / 2),
        }
    }

    /// Advance the round after a frame at `quality_id` was sampled.
    ///
    /// Returns `None` while the current grid point still lacks a
    /// sample.
    pub(crate) fn step(&mut self, quality_id: usize, byte_rate: u64, src_fps: u32) -> Option<EvalStep> {
        let enc_size = self.encoded_size_by_quality[quality_id];
        if enc_size == 0 {
            debug!(quality_id, "size info missing");
            return None;
        }

        let fps = achievable_fps(byte_rate, enc_size);
        debug!(
            quality = QUALITY_SAMPLES[quality_id],
            fps, src_fps, "evaluating quality sample"
        );

        if fps > self.max_sampled_fps
            || (fps >= src_fps && quality_id > self.max_sampled_fps_quality_id)
        {
            self.max_sampled_fps = fps;
            self.max_sampled_fps_quality_id = quality_id;
        }

        let top_id = QUALITY_SAMPLES.len() - 1;
        let candidate = if quality_id > MEDIAN_QUALITY_ID
            && fps < IMPROVE_QUALITY_FPS_STRICT_TH
            && fps < src_fps
        {
            // Above the median, losing frame rate to quality is the
            // worse trade
            if self.encoded_size_by_quality[quality_id - 1] == 0 {
                return Some(EvalStep::Sample(quality_id - 1));
            }
            quality_id - 1
        } else if (fps > IMPROVE_QUALITY_FPS_PERMISSIVE_TH
            && f64::from(fps) >= 0.66 * f64::from(self.min_quality_fps))
            || fps >= src_fps
        {
            // Enough headroom to try the next quality up
            if quality_id == top_id
                || quality_id == self.max_quality_id
                || self.encoded_size_by_quality[quality_id + 1] != 0
            {
                quality_id
            } else if quality_id == MEDIAN_QUALITY_ID
                && fps < IMPROVE_QUALITY_FPS_STRICT_TH
                && fps < src_fps
            {
                quality_id
            } else {
                return Some(EvalStep::Sample(quality_id + 1));
            }
        } else {
            // Frame rate too low to hold this quality
            if quality_id == 0
                || quality_id == self.min_quality_id
                || self.encoded_size_by_quality[quality_id - 1] != 0
            {
                quality_id
            } else {
                return Some(EvalStep::Sample(quality_id - 1));
            }
        };

        Some(self.complete(candidate, byte_rate))
    }

    /// Close the round, preferring the best observed frame rate over
    /// the final walk position.
    fn complete(&self, candidate: usize, byte_rate: u64) -> EvalStep {
        let quality_id = if self.max_sampled_fps != 0 {
            candidate.max(self.max_sampled_fps_quality_id)
        } else {
            candidate
        };

        let enc_size = self.encoded_size_by_quality[quality_id];
        let mut fps = achievable_fps(byte_rate, enc_size);
        if quality_id == self.min_quality_id {
            fps = fps.max(self.min_quality_fps);
        }
        if quality_id == self.max_quality_id {
            fps = fps.min(self.max_quality_fps);
        }

        debug!(
            quality = QUALITY_SAMPLES[quality_id],
            fps, enc_size, "quality evaluation complete"
        );
        EvalStep::Complete {
            quality_id,
            fps,
            enc_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC_FPS: u32 = 25;

    /// Drive a round to completion with per-quality frame sizes,
    /// returning the chosen point and the number of frames consumed.
    fn run_round(
        eval: &mut QualityEval,
        start_id: usize,
        byte_rate: u64,
        sizes: &[u64; QUALITY_SAMPLES.len()],
        src_fps: u32,
    ) -> (usize, u32, u32) {
        let mut quality_id = start_id;
        for frame in 1..=QUALITY_SAMPLES.len() as u32 {
            eval.record_sample(quality_id, sizes[quality_id]);
            match eval.step(quality_id, byte_rate, src_fps) {
                Some(EvalStep::Sample(next)) => quality_id = next,
                Some(EvalStep::Complete {
                    quality_id: final_id,
                    fps,
                    ..
                }) => return (final_id, fps, frame),
                None => panic!("sample was just recorded"),
            }
        }
        panic!("round did not converge within the grid size");
    }

    #[test]
    fn test_defaults_span_the_grid() {
        let eval = QualityEval::default();
        assert_eq!(eval.max_quality_id, 6);
        assert_eq!(eval.max_quality_fps, MAX_FPS);
        assert_eq!(eval.min_quality_id, 0);
        assert!(eval.encoded_size_by_quality.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_achievable_fps() {
        assert_eq!(achievable_fps(1_000_000, 40_000), 25);
        assert_eq!(achievable_fps(1_000_000, 0), MAX_FPS);
        assert_eq!(achievable_fps(100, 1_000_000), 0);
    }

    #[test]
    fn test_upgrade_walks_to_the_top() {
        let mut eval = QualityEval::default();
        eval.arm_upgrade(EvalReason::SizeChange, MEDIAN_QUALITY_ID, 5);

        // Small frames: every grid point admits the full frame rate
        let sizes = [40_000; QUALITY_SAMPLES.len()];
        let (final_id, fps, frames) =
            run_round(&mut eval, MEDIAN_QUALITY_ID, 1_000_000, &sizes, SRC_FPS);

        assert_eq!(final_id, 6);
        assert_eq!(fps, 25); // clamped by max_quality_fps
        assert!(frames <= 7);
    }

    #[test]
    fn test_low_fps_walks_down() {
        let mut eval = QualityEval::default();
        eval.arm_downgrade(EvalReason::RateChange, MEDIAN_QUALITY_ID, 20);

        // Big frames at every point: 2 fps at the median, a bit more
        // below it
        let sizes = [100_000, 200_000, 300_000, 500_000, 0, 0, 0];
        let (final_id, _fps, frames) =
            run_round(&mut eval, MEDIAN_QUALITY_ID, 1_000_000, &sizes, SRC_FPS);

        assert!(final_id < MEDIAN_QUALITY_ID);
        assert!(frames <= 7);
    }

    #[test]
    fn test_above_median_prefers_frame_rate() {
        let mut eval = QualityEval::default();
        eval.arm_downgrade(EvalReason::SizeChange, 5, 9);

        // 8 fps at quality 5: above the median with a sub-strict frame
        // rate, the walk must first sample the next point down
        let sizes = [0, 0, 0, 100_000, 110_000, 125_000, 0];
        eval.record_sample(5, sizes[5]);
        let step = eval.step(5, 1_000_000, SRC_FPS).expect("sampled");
        assert_eq!(step, EvalStep::Sample(4));
    }

    #[test]
    fn test_median_special_case_completes() {
        let mut eval = QualityEval::default();
        eval.arm_upgrade(EvalReason::RateChange, 0, 0);

        // 8 fps at the median: permissive threshold passes (8 > 5) but
        // the strict one fails, so the round ends at the median rather
        // than sampling upward
        eval.record_sample(MEDIAN_QUALITY_ID, 125_000);
        let step = eval
            .step(MEDIAN_QUALITY_ID, 1_000_000, SRC_FPS)
            .expect("sampled");
        assert_eq!(
            step,
            EvalStep::Complete {
                quality_id: MEDIAN_QUALITY_ID,
                fps: 8,
                enc_size: 125_000,
            }
        );
    }

    #[test]
    fn test_monotonicity_breach_keeps_best_observed() {
        // The codec produced a SMALLER frame at a higher quality:
        // quality 2 admits 5 fps while quality 1 only admits 3.
        let mut eval = QualityEval::default();
        eval.arm_downgrade(EvalReason::SizeChange, 2, 10);
        let byte_rate = 100_000;

        eval.record_sample(2, 20_000); // 5 fps
        assert_eq!(eval.step(2, byte_rate, SRC_FPS), Some(EvalStep::Sample(1)));

        eval.record_sample(1, 30_000); // 3 fps, despite lower quality
        assert_eq!(eval.step(1, byte_rate, SRC_FPS), Some(EvalStep::Sample(0)));

        eval.record_sample(0, 28_000); // 3 fps
        let step = eval.step(0, byte_rate, SRC_FPS).expect("sampled");

        // Completion overrides the walk position with the best sample
        assert_eq!(
            step,
            EvalStep::Complete {
                quality_id: 2,
                fps: 5,
                enc_size: 20_000,
            }
        );
    }

    #[test]
    fn test_best_sample_tie_break_can_demote_fps() {
        let mut eval = QualityEval::default();
        eval.arm_upgrade(EvalReason::SizeChange, 3, 5);
        let src_fps = 15;

        // Quality 4 admits 20 fps
        eval.record_sample(4, 50_000);
        let _ = eval.step(4, 1_000_000, src_fps);
        assert_eq!(eval.max_sampled_fps, 20);
        assert_eq!(eval.max_sampled_fps_quality_id, 4);

        // Quality 5 admits only 18 fps, but 18 >= src_fps and the id is
        // higher, so the stored best is replaced wholesale
        eval.record_sample(5, 55_000);
        let _ = eval.step(5, 1_000_000, src_fps);
        assert_eq!(eval.max_sampled_fps, 18);
        assert_eq!(eval.max_sampled_fps_quality_id, 5);
    }

    #[test]
    fn test_abort_points() {
        let mut eval = QualityEval::default();

        eval.arm_upgrade(EvalReason::RateChange, 2, 7);
        assert_eq!(eval.abort_point(), (2, 7));

        eval.arm_downgrade(EvalReason::RateChange, 4, 12);
        assert_eq!(eval.abort_point(), (4, 12));

        eval.arm_set(EvalReason::RateChange);
        assert_eq!(eval.abort_point(), (MEDIAN_QUALITY_ID, MAX_FPS / 2));
    }

    #[test]
    fn test_upgrade_respects_max_bound() {
        let mut eval = QualityEval::default();
        eval.arm_upgrade(EvalReason::SizeChange, 3, 5);
        eval.max_quality_id = 4;
        eval.max_quality_fps = 12;

        let sizes = [40_000; QUALITY_SAMPLES.len()];
        let (final_id, fps, _) = run_round(&mut eval, 3, 1_000_000, &sizes, SRC_FPS);

        assert_eq!(final_id, 4);
        assert_eq!(fps, 12); // clamped by max_quality_fps at the bound
    }
}
