//! Frame timing and delta time.
//!
//! [`Time`] is advanced by the context at the start of each unpaused frame.
//! Hooks read it through `cx.time()` for the clamped, scaled frame delta and
//! the total elapsed time.

use std::time::{Duration, Instant};

/// Frame timing. Owned by the [`Context`](crate::Context).
#[derive(Debug, Clone, Copy)]
pub struct Time {
    /// When the last frame was measured (wall clock).
    last_frame: Option<Instant>,
    /// Raw duration of the previous frame, before clamping.
    raw_delta: Duration,
    /// Clamped and scaled delta.
    delta: Duration,
    /// Sum of all deltas handed out so far.
    elapsed: Duration,
    /// Number of frames run.
    frame_count: u64,
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

impl Time {
    pub fn new() -> Self {
        Self {
            last_frame: None,
            raw_delta: Duration::ZERO,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Wall-clock time since the previous call. Zero on the first call.
    pub(crate) fn measure(&mut self) -> Duration {
        let now = Instant::now();
        let raw = self
            .last_frame
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(Duration::ZERO);
        self.last_frame = Some(now);
        raw
    }

    /// Start a new frame with the given raw delta. A non-finite scale counts
    /// as 1; a scaled delta too large for a `Duration` stays unscaled.
    pub(crate) fn advance(&mut self, raw: Duration, max_delta: Duration, time_scale: f32) {
        self.raw_delta = raw;
        let clamped = raw.min(max_delta);
        let scale = if time_scale.is_finite() { time_scale.max(0.0) } else { 1.0 };
        self.delta = if scale == 1.0 {
            clamped
        } else {
            Duration::try_from_secs_f64(clamped.as_secs_f64() * f64::from(scale)).unwrap_or(clamped)
        };
        self.elapsed = self.elapsed.saturating_add(self.delta);
        self.frame_count += 1;
    }

    /// Clamped, scaled duration of the current frame.
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Delta time in seconds (f32), the most common way to use it.
    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Unclamped duration of the current frame.
    pub fn raw_delta(&self) -> Duration {
        self.raw_delta
    }

    /// Total scaled time since the first frame.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    /// Index of the current frame; the first frame is 1.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frames per second derived from the raw delta.
    pub fn fps(&self) -> f32 {
        let secs = self.raw_delta.as_secs_f32();
        if secs > 0.0 { 1.0 / secs } else { 0.0 }
    }
}
