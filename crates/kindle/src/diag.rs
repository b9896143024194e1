//! # Diagnostics — Per-Frame Statistics
//!
//! Compiled with the `diagnostics` feature (on by default). The context
//! times every phase and counts lifecycle churn; [`Context::diagnostics`]
//! bundles that with current totals into a serialisable [`DiagSnapshot`]
//! that a host can log or ship to a dev tool.
//!
//! ```text
//! {
//!   "frame": 120, "delta_secs": 0.016, "nodes": 42, "components": 57,
//!   "registered_last_frame": 3, "removed_last_frame": 1,
//!   "phases": [{ "phase": "Update", "components": 12, "micros": 84.0 }, ...]
//! }
//! ```

use std::time::Duration;

use serde::Serialize;

use crate::context::Context;
use crate::phase::FramePhase;

/// Timings and counters collected during one tick.
#[derive(Debug, Clone, Default)]
pub(crate) struct FrameStats {
    phase_time: [Duration; FramePhase::COUNT],
    registered: usize,
    removed: usize,
}

impl FrameStats {
    pub(crate) fn record_phase(&mut self, phase: FramePhase, elapsed: Duration) {
        self.phase_time[phase.index()] = elapsed;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseTiming {
    pub phase: FramePhase,
    /// Components scheduled for the phase right now.
    pub components: usize,
    /// Time spent in the phase during the last frame, hooks plus coroutines.
    pub micros: f64,
}

/// A point-in-time view of a context.
#[derive(Debug, Clone, Serialize)]
pub struct DiagSnapshot {
    pub frame: u64,
    pub delta_secs: f32,
    pub elapsed_secs: f32,
    pub fps: f32,
    pub paused: bool,
    pub nodes: usize,
    pub components: usize,
    pub queued_components: usize,
    pub coroutines: usize,
    pub registered_last_frame: usize,
    pub removed_last_frame: usize,
    pub phases: Vec<PhaseTiming>,
}

impl DiagSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Context {
    pub(crate) fn begin_frame_stats(&mut self) {
        self.stats.phase_time = [Duration::ZERO; FramePhase::COUNT];
    }

    /// Move the lifecycle counters into the frame's stats.
    pub(crate) fn end_frame_stats(&mut self) {
        self.stats.registered = std::mem::take(&mut self.lifecycle.registered_this_frame);
        self.stats.removed = std::mem::take(&mut self.lifecycle.removed_this_frame);
    }

    pub fn diagnostics(&self) -> DiagSnapshot {
        let time = self.time();
        DiagSnapshot {
            frame: time.frame_count(),
            delta_secs: time.delta_secs(),
            elapsed_secs: time.elapsed_secs(),
            fps: time.fps(),
            paused: self.is_paused(),
            nodes: self.graph.len(),
            components: self.lifecycle.len(),
            queued_components: self.lifecycle.queued(),
            coroutines: self.coroutines.len(),
            registered_last_frame: self.stats.registered,
            removed_last_frame: self.stats.removed,
            phases: FramePhase::ALL
                .iter()
                .map(|&phase| PhaseTiming {
                    phase,
                    components: self.lifecycle.phase_order(phase).len(),
                    micros: self.stats.phase_time[phase.index()].as_secs_f64() * 1e6,
                })
                .collect(),
        }
    }
}
