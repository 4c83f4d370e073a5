//! Attack event model and ingestion normalization.
//!
//! The feed delivers loosely-shaped JSON payloads (optional fields, sloppy
//! numerics). Everything downstream works with fully-populated
//! `AttackEvent` records, so all defaulting happens here, once.

use serde::Deserialize;

/// Sentinel for an event with no usable source country.
pub const UNKNOWN_COUNTRY: &str = "??";

/// Sentinel destination for broadcast/unattributed attacks.
pub const GLOBAL_DEST: &str = "GLOBAL";

/// A single normalized attack event. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct AttackEvent {
    /// Epoch milliseconds; defaults to receive time when the feed omits it.
    pub ts_ms: i64,
    /// Upper-case ISO-2 code, or `"??"`.
    pub src_country: String,
    /// Upper-case ISO-2 code, or `"GLOBAL"`.
    pub dst_country: String,
    /// Always finite and >= 1.0.
    pub intensity: f64,
    /// Informational only; shown in the status line when present.
    pub attack_type: Option<String>,
}

/// Wire shape of a feed payload. Every field is optional on the wire.
#[derive(Deserialize)]
struct RawEvent {
    ts: Option<i64>,
    src_country: Option<String>,
    dst_country: Option<String>,
    intensity_index: Option<f64>,
    attack_type: Option<String>,
}

impl AttackEvent {
    /// Parse a feed payload, filling gaps per the defaulting rules.
    /// `recv_ms` is the wall-clock receive time used when `ts` is absent.
    pub fn parse(payload: &str, recv_ms: i64) -> Result<AttackEvent, serde_json::Error> {
        let raw: RawEvent = serde_json::from_str(payload)?;
        Ok(AttackEvent {
            ts_ms: raw.ts.unwrap_or(recv_ms),
            src_country: normalize_code(raw.src_country, UNKNOWN_COUNTRY),
            dst_country: normalize_code(raw.dst_country, GLOBAL_DEST),
            intensity: normalize_intensity(raw.intensity_index),
            attack_type: raw.attack_type.filter(|t| !t.is_empty()),
        })
    }

    /// True when the destination is the broadcast sentinel.
    pub fn is_global_dest(&self) -> bool {
        self.dst_country == GLOBAL_DEST
    }
}

/// Heartbeat/comment payloads keep the transport alive but carry no event.
pub fn is_heartbeat(payload: &str) -> bool {
    let trimmed = payload.trim();
    trimmed.is_empty() || trimmed.starts_with(':')
}

fn normalize_code(code: Option<String>, fallback: &str) -> String {
    match code {
        Some(c) if !c.trim().is_empty() => c.trim().to_ascii_uppercase(),
        _ => fallback.to_string(),
    }
}

/// Intensity must be finite and positive; everything else collapses to 1.0.
fn normalize_intensity(raw: Option<f64>) -> f64 {
    match raw {
        Some(v) if v.is_finite() && v >= 1.0 => v,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_payload() {
        let ev = AttackEvent::parse(
            r#"{"ts":1700000000000,"src_country":"us","dst_country":"de","intensity_index":4.5,"attack_type":"dos"}"#,
            99,
        )
        .unwrap();
        assert_eq!(ev.ts_ms, 1_700_000_000_000);
        assert_eq!(ev.src_country, "US");
        assert_eq!(ev.dst_country, "DE");
        assert_eq!(ev.intensity, 4.5);
        assert_eq!(ev.attack_type.as_deref(), Some("dos"));
    }

    #[test]
    fn parse_defaults_missing_fields() {
        let ev = AttackEvent::parse(r#"{"src_country":"CN"}"#, 1234).unwrap();
        assert_eq!(ev.ts_ms, 1234);
        assert_eq!(ev.src_country, "CN");
        assert_eq!(ev.dst_country, GLOBAL_DEST);
        assert!(ev.is_global_dest());
        assert_eq!(ev.intensity, 1.0);
        assert!(ev.attack_type.is_none());
    }

    #[test]
    fn parse_defaults_missing_source() {
        let ev = AttackEvent::parse(r#"{"dst_country":"FR"}"#, 0).unwrap();
        assert_eq!(ev.src_country, UNKNOWN_COUNTRY);
        assert_eq!(ev.dst_country, "FR");
    }

    #[test]
    fn negative_and_bogus_intensity_clamps_to_one() {
        for payload in [
            r#"{"src_country":"US","intensity_index":-3}"#,
            r#"{"src_country":"US","intensity_index":0}"#,
            r#"{"src_country":"US","intensity_index":1e999}"#,
        ] {
            let ev = AttackEvent::parse(payload, 0).unwrap();
            assert_eq!(ev.intensity, 1.0, "payload: {}", payload);
        }
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(AttackEvent::parse("not json", 0).is_err());
        assert!(AttackEvent::parse(r#"{"ts":"yesterday"}"#, 0).is_err());
    }

    #[test]
    fn heartbeat_detection() {
        assert!(is_heartbeat(""));
        assert!(is_heartbeat("   "));
        assert!(is_heartbeat(": keepalive"));
        assert!(!is_heartbeat(r#"{"src_country":"US"}"#));
    }
}
