//! Rolling-window aggregation of attack events into dashboard KPIs.
//!
//! Entries arrive in non-decreasing timestamp order, so expiry is a
//! contiguous prefix: pruning advances a front index instead of
//! rescanning, and storage compacts once the dead prefix outgrows the
//! live tail.

use std::collections::HashMap;

use crate::config::WindowTuning;

struct WindowEntry {
    ts_ms: i64,
    country: String,
    intensity: f64,
}

/// One ranked country in the KPI panel.
#[derive(Clone, Debug, PartialEq)]
pub struct CountryStat {
    pub code: String,
    pub count: usize,
    pub intensity: f64,
}

/// Snapshot of the rolling KPIs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WindowStats {
    pub events_last_minute: usize,
    pub total_intensity: f64,
    pub top_countries: Vec<CountryStat>,
}

/// Time-bounded ordered log of event summaries.
pub struct AggregationWindow {
    entries: Vec<WindowEntry>,
    head: usize,
    tuning: WindowTuning,
    top_n: usize,
}

impl AggregationWindow {
    pub fn new(tuning: WindowTuning, top_n: usize) -> Self {
        Self {
            entries: Vec::new(),
            head: 0,
            tuning,
            top_n,
        }
    }

    /// Append one event summary. Timestamps are assumed non-decreasing by
    /// arrival; the feed guarantees this and the demo feed preserves it.
    pub fn record(&mut self, ts_ms: i64, country: &str, intensity: f64) {
        self.entries.push(WindowEntry {
            ts_ms,
            country: country.to_string(),
            intensity,
        });
    }

    /// Drop every entry older than the trailing window. Single forward
    /// scan over the expired prefix; compacts when more than half the
    /// vector is dead.
    pub fn prune(&mut self, now_ms: i64) {
        let cutoff = now_ms - self.tuning.window_ms;
        while self.head < self.entries.len() && self.entries[self.head].ts_ms < cutoff {
            self.head += 1;
        }
        if self.head > self.entries.len() / 2 && self.head > 0 {
            self.entries.drain(..self.head);
            self.head = 0;
        }
    }

    /// Entries currently inside the window.
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.entries.len() - self.head
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Derive the KPIs. Prunes first, so stale entries can never leak into
    /// the numbers; idempotent between `record` calls.
    pub fn compute_stats(&mut self, now_ms: i64) -> WindowStats {
        self.prune(now_ms);

        let minute_cutoff = now_ms - self.tuning.minute_ms;
        let mut events_last_minute = 0;
        let mut total_intensity = 0.0;
        let mut per_country: HashMap<&str, (usize, f64)> = HashMap::new();

        for entry in &self.entries[self.head..] {
            if entry.ts_ms >= minute_cutoff {
                events_last_minute += 1;
            }
            total_intensity += entry.intensity;
            let slot = per_country.entry(entry.country.as_str()).or_insert((0, 0.0));
            slot.0 += 1;
            slot.1 += entry.intensity;
        }

        let mut top_countries: Vec<CountryStat> = per_country
            .into_iter()
            .map(|(code, (count, intensity))| CountryStat {
                code: code.to_string(),
                count,
                intensity,
            })
            .collect();
        // Rank by count, ties by summed intensity; code keeps the order
        // deterministic when both tie.
        top_countries.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then(b.intensity.total_cmp(&a.intensity))
                .then(a.code.cmp(&b.code))
        });
        top_countries.truncate(self.top_n);

        WindowStats {
            events_last_minute,
            total_intensity,
            top_countries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> AggregationWindow {
        AggregationWindow::new(WindowTuning::default(), 5)
    }

    #[test]
    fn counts_and_ranks_a_basic_mix() {
        let mut w = window();
        let now = 1_000_000;
        w.record(now - 30_000, "US", 1.0);
        w.record(now - 20_000, "US", 2.0);
        w.record(now - 10_000, "DE", 1.0);

        let stats = w.compute_stats(now);
        assert_eq!(stats.events_last_minute, 3);
        assert_eq!(stats.total_intensity, 4.0);
        assert_eq!(
            stats.top_countries,
            vec![
                CountryStat { code: "US".into(), count: 2, intensity: 3.0 },
                CountryStat { code: "DE".into(), count: 1, intensity: 1.0 },
            ]
        );
    }

    #[test]
    fn window_edge_exclusion() {
        let mut w = window();
        let now = 10_000_000;
        w.record(now - 300_001, "US", 1.0); // one ms past the window
        w.record(now - 300_000, "DE", 1.0); // exactly at the edge: kept
        w.prune(now);
        let stats = w.compute_stats(now);
        assert_eq!(w.len(), 1);
        assert_eq!(stats.total_intensity, 1.0);
        assert!(stats.top_countries.iter().all(|c| c.code != "US"));
    }

    #[test]
    fn events_last_minute_ignores_older_window_entries() {
        let mut w = window();
        let now = 10_000_000;
        w.record(now - 120_000, "US", 5.0); // in window, outside the minute
        w.record(now - 30_000, "DE", 1.0);
        let stats = w.compute_stats(now);
        assert_eq!(stats.events_last_minute, 1);
        assert_eq!(stats.total_intensity, 6.0);
    }

    #[test]
    fn compute_stats_is_idempotent() {
        let mut w = window();
        let now = 500_000;
        w.record(now - 1000, "US", 2.0);
        w.record(now - 500, "CN", 3.0);
        let first = w.compute_stats(now);
        let second = w.compute_stats(now);
        assert_eq!(first, second);
    }

    #[test]
    fn tie_on_count_breaks_by_intensity() {
        let mut w = window();
        let now = 500_000;
        w.record(now - 100, "US", 1.0);
        w.record(now - 90, "CN", 9.0);
        let stats = w.compute_stats(now);
        assert_eq!(stats.top_countries[0].code, "CN");
        assert_eq!(stats.top_countries[1].code, "US");
    }

    #[test]
    fn top_n_truncates() {
        let mut w = AggregationWindow::new(WindowTuning::default(), 2);
        let now = 500_000;
        for (i, code) in ["US", "CN", "DE", "FR"].into_iter().enumerate() {
            w.record(now - 100 + i as i64, code, 1.0);
        }
        let stats = w.compute_stats(now);
        assert_eq!(stats.top_countries.len(), 2);
    }

    #[test]
    fn prune_compacts_dead_prefix() {
        let mut w = window();
        for i in 0..100 {
            w.record(i, "US", 1.0);
        }
        // Everything recorded so far is far older than the window.
        w.prune(1_000_000);
        assert_eq!(w.len(), 0);
        assert_eq!(w.entries.len(), 0); // compacted, not just skipped
        w.record(1_000_000, "DE", 1.0);
        assert_eq!(w.len(), 1);
    }
}
