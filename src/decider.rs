//! The per-segment capture policy.
//!
//! [`CapturePolicy::decide`] is a pure function of a [`CaptureState`], the
//! current frame index and the text extracted from it. [`CaptureDecider`]
//! pairs a policy with the rolling state of one segment and applies the
//! state transition whenever a capture fires.
//!
//! Rules, in order:
//!
//! 1. Empty text never captures.
//! 2. Frames closer than `min_interval` to the last capture never capture.
//! 3. The first text seen in a segment always captures.
//! 4. Otherwise capture if the similarity to the last captured text drops
//!    below the threshold, or if `max_interval` frames have elapsed.

use crate::similarity::similarity_ratio;

/// Default minimum spacing between captures, in frames.
pub const DEFAULT_MIN_INTERVAL: u64 = 15;
/// Default maximum spacing between captures, in frames.
pub const DEFAULT_MAX_INTERVAL: u64 = 150;
/// Default similarity below which text counts as new content.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.25;

/// Rolling capture state of one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureState {
    /// Text of the most recent capture; empty until the first capture.
    pub last_text: String,
    /// Frame index of the most recent capture, or the segment start.
    pub last_frame: u64,
}

impl CaptureState {
    /// Fresh state for a segment starting at `start_frame`.
    pub fn new(start_frame: u64) -> Self {
        Self {
            last_text: String::new(),
            last_frame: start_frame,
        }
    }

    /// `true` until the first capture has been recorded.
    pub fn is_fresh(&self) -> bool {
        self.last_text.is_empty()
    }

    /// Frames elapsed since the last capture.
    pub fn frames_since_capture(&self, frame_number: u64) -> u64 {
        frame_number.saturating_sub(self.last_frame)
    }

    /// Record a capture of `text` at `frame_number`.
    pub fn record(&mut self, frame_number: u64, text: &str) {
        self.last_text.clear();
        self.last_text.push_str(text);
        self.last_frame = frame_number;
    }
}

/// Why a frame was not captured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// No text was extracted.
    NoText,
    /// The minimum spacing since the last capture has not elapsed.
    TooSoon,
    /// The text is still similar to the last capture.
    Similar {
        /// Similarity to the last captured text.
        similarity: f64,
    },
}

/// Why a frame was captured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureReason {
    /// First text seen in the segment.
    First,
    /// Text diverged from the last capture.
    ContentChanged {
        /// Similarity to the last captured text.
        similarity: f64,
    },
    /// Maximum spacing reached under stable content.
    Forced {
        /// Similarity to the last captured text.
        similarity: f64,
    },
}

/// Outcome of evaluating one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Leave the frame alone; state is unchanged.
    Skip(SkipReason),
    /// Persist the frame and advance the state.
    Capture(CaptureReason),
}

impl Decision {
    /// `true` for [`Decision::Capture`].
    pub fn is_capture(&self) -> bool {
        matches!(self, Decision::Capture(_))
    }
}

/// Spacing and similarity knobs of the capture rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapturePolicy {
    /// Minimum frames between two captures.
    pub min_interval: u64,
    /// Frames after which stable content is captured again.
    pub max_interval: u64,
    /// Similarity strictly below which text counts as changed.
    pub similarity_threshold: f64,
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl CapturePolicy {
    /// `true` if `frame_number` is still inside the spacing floor.
    ///
    /// The scanner uses this to skip text extraction for frames that could
    /// never be captured anyway.
    pub fn too_soon(&self, state: &CaptureState, frame_number: u64) -> bool {
        state.frames_since_capture(frame_number) < self.min_interval
    }

    /// Evaluate one frame against `state` without modifying it.
    pub fn decide(&self, state: &CaptureState, frame_number: u64, text: &str) -> Decision {
        if text.is_empty() {
            return Decision::Skip(SkipReason::NoText);
        }
        if self.too_soon(state, frame_number) {
            return Decision::Skip(SkipReason::TooSoon);
        }
        if state.is_fresh() {
            return Decision::Capture(CaptureReason::First);
        }

        let similarity = similarity_ratio(&state.last_text, text);
        if similarity < self.similarity_threshold {
            Decision::Capture(CaptureReason::ContentChanged { similarity })
        } else if state.frames_since_capture(frame_number) >= self.max_interval {
            Decision::Capture(CaptureReason::Forced { similarity })
        } else {
            Decision::Skip(SkipReason::Similar { similarity })
        }
    }
}

/// A [`CapturePolicy`] bound to the rolling state of one segment.
#[derive(Debug, Clone)]
pub struct CaptureDecider {
    policy: CapturePolicy,
    state: CaptureState,
}

impl CaptureDecider {
    /// Create a decider for a segment starting at `start_frame`.
    pub fn new(policy: CapturePolicy, start_frame: u64) -> Self {
        Self {
            policy,
            state: CaptureState::new(start_frame),
        }
    }

    /// The policy in effect.
    pub fn policy(&self) -> &CapturePolicy {
        &self.policy
    }

    /// Current rolling state.
    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// See [`CapturePolicy::too_soon`].
    pub fn too_soon(&self, frame_number: u64) -> bool {
        self.policy.too_soon(&self.state, frame_number)
    }

    /// Evaluate a frame and, on capture, record it as the new reference.
    ///
    /// The state advances as soon as the decision is made, whether or not
    /// the caller manages to persist the frame.
    pub fn evaluate(&mut self, frame_number: u64, text: &str) -> Decision {
        let decision = self.policy.decide(&self.state, frame_number, text);
        if decision.is_capture() {
            self.state.record(frame_number, text);
        }
        decision
    }
}
