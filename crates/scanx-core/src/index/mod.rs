//! Index interfaces: the producer side of a scan.
//!
//! An index fills an [`IndexConnection`] with entries and closes its sender
//! when done. Scans run on the caller's thread and block on backpressure.

pub mod memory;

use crate::connection::IndexConnection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use memory::MemoryPrimaryIndex;

/// Kind of index backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    /// Backend default
    Default,
    /// View index
    View,
    /// Global secondary index
    Gsi,
}

/// Availability of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    /// Being built or rebuilt
    Pending,
    /// Available for scans
    Online,
    /// Requires manual intervention
    Offline,
}

/// Consistency requested for a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanConsistency {
    #[default]
    Unbounded,
    ScanPlus,
    AtPlus,
}

/// Which range bounds are part of the range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Inclusion {
    #[default]
    Neither,
    Low,
    High,
    Both,
}

impl Inclusion {
    pub fn includes_low(self) -> bool {
        matches!(self, Inclusion::Low | Inclusion::Both)
    }

    pub fn includes_high(self) -> bool {
        matches!(self, Inclusion::High | Inclusion::Both)
    }
}

/// Key range; an empty bound is unbounded on that side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    #[serde(default)]
    pub low: Vec<Value>,
    #[serde(default)]
    pub high: Vec<Value>,
    #[serde(default)]
    pub inclusion: Inclusion,
}

/// Equality keys plus a range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Span {
    #[serde(default)]
    pub seek: Vec<Value>,
    #[serde(default)]
    pub range: Range,
}

impl Span {
    /// Span covering every key.
    pub fn full() -> Self {
        Self::default()
    }

    /// Span over `[low, high]` with the given inclusion.
    pub fn between(low: Value, high: Value, inclusion: Inclusion) -> Self {
        Self {
            seek: Vec::new(),
            range: Range {
                low: vec![low],
                high: vec![high],
                inclusion,
            },
        }
    }
}

/// An index that can be scanned.
pub trait Index: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn index_type(&self) -> IndexType;

    fn state(&self) -> IndexState;

    /// Scan `span` into `conn`. `distinct` and `limit` are hints; a `limit`
    /// of 0 means no limit. The sender is closed when the scan returns.
    fn scan(
        &self,
        span: &Span,
        distinct: bool,
        limit: u64,
        consistency: ScanConsistency,
        conn: &IndexConnection,
    );
}

/// An index over document keys.
pub trait PrimaryIndex: Index {
    /// Scan every entry into `conn`, up to `limit` (0 means no limit).
    fn scan_entries(&self, limit: u64, consistency: ScanConsistency, conn: &IndexConnection);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inclusion() {
        assert!(!Inclusion::Neither.includes_low());
        assert!(!Inclusion::Neither.includes_high());
        assert!(Inclusion::Low.includes_low());
        assert!(!Inclusion::Low.includes_high());
        assert!(Inclusion::Both.includes_low() && Inclusion::Both.includes_high());
    }

    #[test]
    fn test_consistency_serde() {
        let cons: ScanConsistency = serde_json::from_str(r#""scan_plus""#).unwrap();
        assert_eq!(cons, ScanConsistency::ScanPlus);
        assert_eq!(
            serde_json::to_string(&ScanConsistency::AtPlus).unwrap(),
            r#""at_plus""#
        );
    }

    #[test]
    fn test_span_between() {
        let span = Span::between(json!("a"), json!("m"), Inclusion::Low);
        assert_eq!(span.range.low, vec![json!("a")]);
        assert_eq!(span.range.high, vec![json!("m")]);
        assert!(span.seek.is_empty());
        assert!(Span::full().range.low.is_empty());
    }
}
