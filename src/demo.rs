//! Local demo feed.
//!
//! When no endpoint is configured (or `--demo` is passed) the dashboard
//! synthesizes plausible attack events from the loaded centroid table, so
//! the globe still shows traffic. Demo events go through the exact same
//! admission path as live ones; nothing downstream can tell them apart.

use rand::prelude::*;
use std::time::{Duration, Instant};

use crate::event::{AttackEvent, GLOBAL_DEST, UNKNOWN_COUNTRY};
use crate::geo::GeoResolver;

const ATTACK_TYPES: [&str; 5] = ["dos", "probe", "bruteforce", "malware", "exploit"];

pub struct DemoFeed {
    rng: StdRng,
    codes: Vec<String>,
    next_at: Instant,
}

impl DemoFeed {
    pub fn new(seed: Option<u64>, geo: &GeoResolver, now: Instant) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            codes: geo.codes().map(String::from).collect(),
            next_at: now,
        }
    }

    /// Emit at most one event per call, paced randomly.
    pub fn poll(&mut self, now: Instant) -> Option<AttackEvent> {
        if now < self.next_at {
            return None;
        }
        self.next_at = now + Duration::from_millis(self.rng.gen_range(120..900));

        let src = self.pick_code(0.05);
        let dst = if self.rng.gen_bool(0.7) {
            GLOBAL_DEST.to_string()
        } else {
            self.pick_code(0.0)
        };
        Some(AttackEvent {
            ts_ms: chrono::Utc::now().timestamp_millis(),
            src_country: src,
            dst_country: dst,
            intensity: self.rng.gen_range(1.0..60.0f64).powf(0.8).max(1.0),
            attack_type: Some(ATTACK_TYPES.choose(&mut self.rng).unwrap().to_string()),
        })
    }

    fn pick_code(&mut self, unknown_chance: f64) -> String {
        if self.codes.is_empty() || self.rng.gen_bool(unknown_chance) {
            UNKNOWN_COUNTRY.to_string()
        } else {
            self.codes.choose(&mut self.rng).unwrap().clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_events_are_normalized() {
        let geo = GeoResolver::from_json(r#"{"US": [39.8, -98.6], "DE": [51.2, 10.4]}"#).unwrap();
        let now = Instant::now();
        let mut feed = DemoFeed::new(Some(7), &geo, now);
        let mut seen = 0;
        for i in 0..200 {
            if let Some(ev) = feed.poll(now + Duration::from_secs(i)) {
                assert!(ev.intensity >= 1.0);
                assert!(!ev.src_country.is_empty());
                assert!(!ev.dst_country.is_empty());
                seen += 1;
            }
        }
        assert!(seen > 0);
    }

    #[test]
    fn pacing_holds_between_emissions() {
        let geo = GeoResolver::from_json(r#"{"US": [39.8, -98.6]}"#).unwrap();
        let now = Instant::now();
        let mut feed = DemoFeed::new(Some(1), &geo, now);
        assert!(feed.poll(now).is_some());
        // Immediately after an emission the feed is paced out.
        assert!(feed.poll(now).is_none());
    }
}
