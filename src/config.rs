//! Tunable parameters for the attack map.
//!
//! The visual constants (easing durations, width clamps, altitude scale)
//! are tuned by eye, not derived; they live here so they can be adjusted
//! in one place without touching the engines.

use std::time::Duration;

/// Top-level run configuration assembled from CLI flags and settings.
#[derive(Clone)]
pub struct GlobeConfig {
    /// Seconds per frame.
    pub frame_time: f32,
    /// How many countries the KPI panel ranks.
    pub top_n: usize,
    /// Synthesize a local demo feed instead of connecting anywhere.
    pub demo: bool,
    /// Seed for the demo feed RNG.
    pub seed: Option<u64>,
}

/// Arc animation tuning.
#[derive(Clone, Copy)]
pub struct ArcTuning {
    /// Time for the head to travel source -> target.
    pub travel: Duration,
    /// Linear fade-out time after travel completes.
    pub fade: Duration,
    /// Hard cap on in-flight arcs; oldest evicted first beyond this.
    pub max_arcs: usize,
    /// Width clamp bounds applied after the sqrt transform.
    pub width_min: f32,
    pub width_max: f32,
    /// Peak altitude in degrees of latitude per unit of arc width.
    pub altitude_deg: f32,
    /// Initial progress; never zero, so geometry is never degenerate.
    pub progress_epsilon: f32,
}

impl Default for ArcTuning {
    fn default() -> Self {
        Self {
            travel: Duration::from_millis(2500),
            fade: Duration::from_millis(1400),
            max_arcs: 256,
            width_min: 0.6,
            width_max: 3.0,
            altitude_deg: 6.0,
            progress_epsilon: 1e-3,
        }
    }
}

/// Rolling-window aggregation tuning.
#[derive(Clone, Copy)]
pub struct WindowTuning {
    /// Trailing span kept in the log.
    pub window_ms: i64,
    /// Span of the events/minute counter.
    pub minute_ms: i64,
}

impl Default for WindowTuning {
    fn default() -> Self {
        Self {
            window_ms: 300_000,
            minute_ms: 60_000,
        }
    }
}

/// Stream connection tuning.
#[derive(Clone, Copy)]
pub struct StreamTuning {
    /// Per-candidate open timeout while probing.
    pub open_timeout: Duration,
    /// Fixed delay before a full retry cycle. Unconditional and uncapped:
    /// a long-lived dashboard keeps trying forever.
    pub retry_delay: Duration,
    /// Messages drained per frame so a burst cannot starve rendering.
    pub max_drain: usize,
}

impl Default for StreamTuning {
    fn default() -> Self {
        Self {
            open_timeout: Duration::from_secs(4),
            retry_delay: Duration::from_secs(3),
            max_drain: 64,
        }
    }
}

/// Camera/gesture tuning.
#[derive(Clone, Copy)]
pub struct ViewTuning {
    /// Fraction of a raw drag delta actually applied, in (0, 1).
    pub drag_sensitivity: f32,
    /// Idle auto-rotation in degrees per second.
    pub auto_rotate_deg: f32,
    pub zoom_min: f32,
    pub zoom_max: f32,
}

impl Default for ViewTuning {
    fn default() -> Self {
        Self {
            drag_sensitivity: 0.35,
            auto_rotate_deg: 4.0,
            zoom_min: 0.3,
            zoom_max: 3.0,
        }
    }
}

/// KPI recompute debounce: bursts of events coalesce into at most one
/// stats pass per this interval.
pub const STATS_REFRESH: Duration = Duration::from_millis(250);
