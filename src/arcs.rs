//! Arc lifecycle: admission, easing, fade and eviction of attack arcs.
//!
//! Each accepted event becomes one `ArcRecord` animated along a great
//! circle. Records age on a monotonic clock: progress eases out over the
//! travel duration, alpha ramps down over the fade duration, then the
//! record is evicted. Because every arc shares the same lifetime, records
//! expire strictly in insertion order and eviction only ever pops the
//! front of the deque.

use std::collections::VecDeque;
use std::time::Instant;

use crate::config::ArcTuning;
use crate::event::AttackEvent;
use crate::geo::{resolve_with_fallback, GeoResolver};

/// One in-flight visual arc. Positions are `(lat, lon)` degrees.
pub struct ArcRecord {
    pub source: (f32, f32),
    pub target: (f32, f32),
    /// Palette index assigned round-robin at admission.
    pub color: usize,
    /// sqrt(intensity), clamped; drives stroke weight and arc altitude.
    pub width_base: f32,
    born_at: Instant,
    /// Eased travel fraction in (0, 1]; non-decreasing until eviction.
    pub progress: f32,
    /// 1.0 while traveling, then a linear ramp to 0 over the fade.
    pub alpha: f32,
}

pub struct ArcLifecycleEngine {
    arcs: VecDeque<ArcRecord>,
    tuning: ArcTuning,
    palette_len: usize,
    next_color: usize,
}

impl ArcLifecycleEngine {
    pub fn new(tuning: ArcTuning, palette_len: usize) -> Self {
        Self {
            arcs: VecDeque::with_capacity(tuning.max_arcs),
            tuning,
            palette_len: palette_len.max(1),
            next_color: 0,
        }
    }

    /// Admit one event as a new arc. Unknown source codes jitter on their
    /// own seed; unknown or GLOBAL destinations jitter on the combined
    /// `src:dst` seed so distinct flows fan out while repeats stay put.
    pub fn admit(&mut self, event: &AttackEvent, geo: &GeoResolver, now: Instant) {
        let source = geo.resolve_or_jitter(&event.src_country);
        let target = if event.is_global_dest() {
            resolve_with_fallback(&format!("{}:{}", event.src_country, event.dst_country))
        } else {
            geo.resolve(&event.dst_country).unwrap_or_else(|| {
                resolve_with_fallback(&format!("{}:{}", event.src_country, event.dst_country))
            })
        };

        let width_base = (event.intensity.sqrt() as f32)
            .clamp(self.tuning.width_min, self.tuning.width_max);
        let color = self.next_color;
        self.next_color = (self.next_color + 1) % self.palette_len;

        self.arcs.push_back(ArcRecord {
            source,
            target,
            color,
            width_base,
            born_at: now,
            progress: self.tuning.progress_epsilon,
            alpha: 1.0,
        });

        // FIFO cap: oldest out first, regardless of animation age.
        while self.arcs.len() > self.tuning.max_arcs {
            self.arcs.pop_front();
        }
    }

    /// Advance every arc to `now` and evict the expired prefix.
    pub fn tick(&mut self, now: Instant) {
        let travel = self.tuning.travel.as_secs_f32();
        let fade = self.tuning.fade.as_secs_f32();
        let epsilon = self.tuning.progress_epsilon;

        for arc in &mut self.arcs {
            let age = now.saturating_duration_since(arc.born_at).as_secs_f32();
            let t = (age / travel).min(1.0);
            // max() with the current value keeps progress monotone even if
            // the caller hands us a stale `now`.
            arc.progress = arc.progress.max(ease_out_cubic(t).max(epsilon));
            arc.alpha = if t >= 1.0 {
                (1.0 - (age - travel) / fade).clamp(0.0, 1.0)
            } else {
                1.0
            };
        }

        let lifetime = travel + fade;
        while let Some(front) = self.arcs.front() {
            if now.saturating_duration_since(front.born_at).as_secs_f32() > lifetime {
                self.arcs.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArcRecord> {
        self.arcs.iter()
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Peak altitude of an arc, in degrees of latitude.
    pub fn altitude_of(&self, arc: &ArcRecord) -> f32 {
        self.tuning.altitude_deg * arc.width_base
    }
}

/// Standard ease-out cubic.
fn ease_out_cubic(t: f32) -> f32 {
    let u = 1.0 - t.clamp(0.0, 1.0);
    1.0 - u * u * u
}

/// Interpolate along the great circle between an arc's endpoints at
/// `frac` in [0, 1]. Returns `(lat, lon, altitude)` in degrees, where
/// altitude follows a sine profile: zero at both endpoints, peaking at
/// the midpoint scaled by `peak_altitude`.
///
/// Identical or antipodal endpoints would make the spherical
/// interpolation divide by ~zero; those collapse to a zero-length path
/// at the source.
pub fn sample_arc(arc: &ArcRecord, frac: f32, peak_altitude: f32) -> (f32, f32, f32) {
    let frac = frac.clamp(0.0, 1.0);
    let altitude = (frac * std::f32::consts::PI).sin() * peak_altitude;

    let a = unit_vector(arc.source);
    let b = unit_vector(arc.target);
    let dot = (a.0 * b.0 + a.1 * b.1 + a.2 * b.2).clamp(-1.0, 1.0);
    let omega = dot.acos();
    if omega.sin().abs() < 1e-4 {
        // Zero-length (or degenerate antipodal) path.
        return (arc.source.0, arc.source.1, altitude);
    }

    let sin_omega = omega.sin();
    let wa = ((1.0 - frac) * omega).sin() / sin_omega;
    let wb = (frac * omega).sin() / sin_omega;
    let p = (
        wa * a.0 + wb * b.0,
        wa * a.1 + wb * b.1,
        wa * a.2 + wb * b.2,
    );

    let lat = p.2.asin().to_degrees();
    let lon = p.1.atan2(p.0).to_degrees();
    (lat, lon, altitude)
}

fn unit_vector((lat, lon): (f32, f32)) -> (f32, f32, f32) {
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    (lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::GLOBAL_DEST;
    use std::time::Duration;

    fn event(src: &str, dst: &str, intensity: f64) -> AttackEvent {
        AttackEvent {
            ts_ms: 0,
            src_country: src.to_string(),
            dst_country: dst.to_string(),
            intensity,
            attack_type: None,
        }
    }

    fn engine() -> ArcLifecycleEngine {
        ArcLifecycleEngine::new(ArcTuning::default(), 6)
    }

    fn geo() -> GeoResolver {
        GeoResolver::from_json(r#"{"US": [39.8, -98.6], "DE": [51.2, 10.4]}"#).unwrap()
    }

    #[test]
    fn admit_caps_at_max_with_fifo_eviction() {
        let tuning = ArcTuning {
            max_arcs: 3,
            ..ArcTuning::default()
        };
        let mut eng = ArcLifecycleEngine::new(tuning, 6);
        let geo = geo();
        let now = Instant::now();
        for i in 0..5 {
            eng.admit(&event("US", "DE", 1.0 + i as f64), &geo, now);
        }
        assert_eq!(eng.len(), 3);
        // Oldest two (intensity 1, 2) evicted; survivors are 3, 4, 5.
        let widths: Vec<f32> = eng.iter().map(|a| a.width_base).collect();
        assert!((widths[0] - 3.0f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn progress_is_monotone_and_alpha_gated() {
        let tuning = ArcTuning {
            travel: Duration::from_millis(100),
            fade: Duration::from_millis(100),
            ..ArcTuning::default()
        };
        let mut eng = ArcLifecycleEngine::new(tuning, 6);
        let t0 = Instant::now();
        eng.admit(&event("US", "DE", 4.0), &geo(), t0);

        let mut last_progress = 0.0f32;
        for ms in [0u64, 20, 50, 80, 100, 120, 150] {
            eng.tick(t0 + Duration::from_millis(ms));
            let arc = eng.iter().next().unwrap();
            assert!(arc.progress >= last_progress, "progress regressed at {}ms", ms);
            if arc.progress < 1.0 {
                assert_eq!(arc.alpha, 1.0, "alpha fell before travel done at {}ms", ms);
            }
            last_progress = arc.progress;
        }
        // Mid-fade: travel done, alpha partly down.
        let arc = eng.iter().next().unwrap();
        assert!((arc.progress - 1.0).abs() < 1e-5);
        assert!(arc.alpha < 1.0 && arc.alpha > 0.0);
    }

    #[test]
    fn expired_arcs_are_evicted() {
        let tuning = ArcTuning {
            travel: Duration::from_millis(100),
            fade: Duration::from_millis(50),
            ..ArcTuning::default()
        };
        let mut eng = ArcLifecycleEngine::new(tuning, 6);
        let t0 = Instant::now();
        eng.admit(&event("US", "DE", 1.0), &geo(), t0);
        eng.tick(t0 + Duration::from_millis(149));
        assert_eq!(eng.len(), 1);
        eng.tick(t0 + Duration::from_millis(151));
        assert_eq!(eng.len(), 0);
    }

    #[test]
    fn progress_starts_above_zero() {
        let mut eng = engine();
        eng.admit(&event("US", "DE", 1.0), &geo(), Instant::now());
        let arc = eng.iter().next().unwrap();
        assert!(arc.progress > 0.0);
        assert_eq!(arc.alpha, 1.0);
    }

    #[test]
    fn width_saturates_under_intensity_spikes() {
        let mut eng = engine();
        let geo = geo();
        let now = Instant::now();
        eng.admit(&event("US", "DE", 1e9), &geo, now);
        eng.admit(&event("US", "DE", 0.0), &geo, now);
        let widths: Vec<f32> = eng.iter().map(|a| a.width_base).collect();
        assert_eq!(widths[0], ArcTuning::default().width_max);
        assert_eq!(widths[1], ArcTuning::default().width_min);
    }

    #[test]
    fn palette_assignment_is_round_robin() {
        let mut eng = ArcLifecycleEngine::new(ArcTuning::default(), 3);
        let geo = geo();
        let now = Instant::now();
        for _ in 0..5 {
            eng.admit(&event("US", "DE", 1.0), &geo, now);
        }
        let colors: Vec<usize> = eng.iter().map(|a| a.color).collect();
        assert_eq!(colors, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn global_destination_jitters_deterministically() {
        let mut eng = engine();
        let geo = geo();
        let now = Instant::now();
        eng.admit(&event("US", GLOBAL_DEST, 1.0), &geo, now);
        eng.admit(&event("US", GLOBAL_DEST, 1.0), &geo, now);
        eng.admit(&event("CN", GLOBAL_DEST, 1.0), &geo, now);
        let targets: Vec<(f32, f32)> = eng.iter().map(|a| a.target).collect();
        assert_eq!(targets[0], targets[1]); // same flow, same point
        assert_ne!(targets[0], targets[2]); // distinct flows spread out
    }

    #[test]
    fn sample_endpoints_and_midpoint() {
        let mut eng = engine();
        eng.admit(&event("US", "DE", 1.0), &geo(), Instant::now());
        let arc = eng.iter().next().unwrap();

        let (lat0, lon0, alt0) = sample_arc(arc, 0.0, 6.0);
        assert!((lat0 - arc.source.0).abs() < 1e-2);
        assert!((lon0 - arc.source.1).abs() < 1e-2);
        assert!(alt0.abs() < 1e-5);

        let (lat1, lon1, alt1) = sample_arc(arc, 1.0, 6.0);
        assert!((lat1 - arc.target.0).abs() < 1e-2);
        assert!((lon1 - arc.target.1).abs() < 1e-2);
        assert!(alt1.abs() < 1e-4);

        let (_, _, alt_mid) = sample_arc(arc, 0.5, 6.0);
        assert!((alt_mid - 6.0).abs() < 1e-4);
    }

    #[test]
    fn degenerate_path_does_not_blow_up() {
        let arc = ArcRecord {
            source: (10.0, 20.0),
            target: (10.0, 20.0),
            color: 0,
            width_base: 1.0,
            born_at: Instant::now(),
            progress: 0.5,
            alpha: 1.0,
        };
        let (lat, lon, alt) = sample_arc(&arc, 0.5, 6.0);
        assert!(lat.is_finite() && lon.is_finite() && alt.is_finite());
        assert_eq!((lat, lon), (10.0, 20.0));
    }
}
