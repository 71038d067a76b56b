//! Data structures exchanged between mesh nodes.
//!
//! These types are serialised using [`serde`](https://serde.rs/) and
//! travel between peers as the body of `/vector` responses, and to
//! clients as the `format=json` rendering of a matrix.  Field names on
//! the wire are kept stable so that older nodes can still read them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Destination string carried by cells synthesized during padding.
pub const PLACEHOLDER_DESTINATION: &str = "dummy";

/// Duration reported for a target that no strategy could reach.
///
/// This is the largest value a signed 64 bit nanosecond count can
/// hold, so it survives the trip over the wire unchanged.
pub const UNREACHABLE: Duration = Duration::from_nanos(i64::MAX as u64);

/// One round-trip measurement from this node to one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Latency {
    pub destination: String,
    #[serde(rename = "ip", default, skip_serializing_if = "Option::is_none")]
    pub resolved_ip: Option<String>,
    #[serde(rename = "host", default, skip_serializing_if = "Option::is_none")]
    pub resolved_host: Option<String>,
    #[serde(with = "nanos")]
    pub duration: Duration,
    pub ok: bool,
    #[serde(rename = "prober", default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Set on cells that were synthesized to align a matrix row.
    #[serde(default, skip_serializing_if = "is_false")]
    pub placeholder: bool,
}

impl Latency {
    /// A filler cell for a column this row has no measurement for.
    pub fn placeholder() -> Self {
        Self {
            destination: PLACEHOLDER_DESTINATION.to_string(),
            resolved_ip: None,
            resolved_host: None,
            duration: Duration::ZERO,
            ok: true,
            strategy: None,
            placeholder: true,
        }
    }

    /// The label used for this cell's destination in tables and graphs.
    pub fn label(&self) -> &str {
        ip_or_host(&self.resolved_ip, &self.resolved_host)
    }
}

/// One node's measurements of all of its peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vector {
    pub source: String,
    #[serde(rename = "ip", default, skip_serializing_if = "Option::is_none")]
    pub resolved_ip: Option<String>,
    #[serde(rename = "host", default, skip_serializing_if = "Option::is_none")]
    pub resolved_host: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub latencies: Vec<Latency>,
    pub ok: bool,
}

impl Vector {
    /// An empty, not yet retrieved vector for `source`.
    pub fn pending(source: String, resolved_ip: Option<String>, resolved_host: String) -> Self {
        Self {
            source,
            resolved_ip,
            resolved_host: Some(resolved_host),
            latencies: Vec::new(),
            ok: false,
        }
    }

    pub fn label(&self) -> &str {
        ip_or_host(&self.resolved_ip, &self.resolved_host)
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn ip_or_host<'a>(ip: &'a Option<String>, host: &'a Option<String>) -> &'a str {
    ip.as_deref().or(host.as_deref()).unwrap_or("")
}

/// Durations travel as a signed count of nanoseconds.
mod nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        let n = i64::try_from(d.as_nanos()).unwrap_or(i64::MAX);
        s.serialize_i64(n)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let n = i64::deserialize(d)?;
        Ok(Duration::from_nanos(n.max(0) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_wire_format() {
        let l = Latency {
            destination: "http://a.example.com:80".into(),
            resolved_ip: Some("10.0.0.1".into()),
            resolved_host: Some("a.example.com".into()),
            duration: Duration::from_millis(3),
            ok: true,
            strategy: Some("http-ping-prober".into()),
            placeholder: false,
        };
        let v = serde_json::to_value(&l).unwrap();
        assert_eq!(v["duration"], 3_000_000);
        assert_eq!(v["ip"], "10.0.0.1");
        assert_eq!(v["prober"], "http-ping-prober");
        assert!(v.get("placeholder").is_none());
    }

    #[test]
    fn unreachable_survives_the_wire() {
        let mut l = Latency::placeholder();
        l.duration = UNREACHABLE;
        let s = serde_json::to_string(&l).unwrap();
        assert!(s.contains(&i64::MAX.to_string()));
        let back: Latency = serde_json::from_str(&s).unwrap();
        assert_eq!(back.duration, UNREACHABLE);
        assert!(back.placeholder);
    }

    #[test]
    fn reads_vectors_without_optional_fields() {
        let v: Vector = serde_json::from_str(r#"{"source":"x","ok":false}"#).unwrap();
        assert!(v.latencies.is_empty());
        assert_eq!(v.label(), "");
    }
}
