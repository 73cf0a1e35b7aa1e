//! In-memory primary index over a synthetic keyspace.

use super::{Index, IndexState, IndexType, PrimaryIndex, ScanConsistency, Span};
use crate::connection::IndexConnection;
use crate::entry::IndexEntry;
use crate::error::ScanError;
use serde_json::Value;
use tracing::debug;

/// Primary index over `n` documents keyed `"0"` to `"n-1"`.
///
/// Keys are produced in numeric order and compared as strings against span
/// bounds. Once a key passes the lower bound, later keys are not checked
/// against it again.
#[derive(Debug, Clone)]
pub struct MemoryPrimaryIndex {
    name: String,
    nitems: usize,
}

impl MemoryPrimaryIndex {
    pub fn new(name: impl Into<String>, nitems: usize) -> Self {
        Self {
            name: name.into(),
            nitems,
        }
    }

    pub fn len(&self) -> usize {
        self.nitems
    }

    pub fn is_empty(&self) -> bool {
        self.nitems == 0
    }

    fn limit(&self, limit: u64) -> usize {
        if limit == 0 {
            self.nitems
        } else {
            usize::try_from(limit).unwrap_or(usize::MAX).min(self.nitems)
        }
    }
}

/// Extract a string bound, reporting anything else.
fn string_bound<'a>(
    bound: &'a [Value],
    side: &'static str,
    conn: &IndexConnection,
) -> Option<Option<&'a str>> {
    match bound.first() {
        None => Some(None),
        Some(Value::String(s)) => Some(Some(s.as_str())),
        Some(other) => {
            conn.error(ScanError::InvalidBound {
                side,
                value: other.to_string(),
            });
            None
        }
    }
}

impl Index for MemoryPrimaryIndex {
    fn id(&self) -> &str {
        &self.name
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn index_type(&self) -> IndexType {
        IndexType::Default
    }

    fn state(&self) -> IndexState {
        IndexState::Online
    }

    fn scan(
        &self,
        span: &Span,
        _distinct: bool,
        limit: u64,
        _consistency: ScanConsistency,
        conn: &IndexConnection,
    ) {
        let sender = conn.sender();

        let Some(mut low) = string_bound(&span.range.low, "lower", conn) else {
            sender.close();
            return;
        };
        let Some(high) = string_bound(&span.range.high, "upper", conn) else {
            sender.close();
            return;
        };

        let inclusion = span.range.inclusion;
        let limit = self.limit(limit);
        let mut sent = 0;

        for i in 0..self.nitems {
            if sent >= limit {
                break;
            }
            let id = i.to_string();

            if let Some(lo) = low {
                if id.as_str() < lo || (id == lo && !inclusion.includes_low()) {
                    continue;
                }
            }
            low = None;

            if let Some(hi) = high {
                if id.as_str() > hi || (id == hi && !inclusion.includes_high()) {
                    break;
                }
            }

            if !sender.send_entry(IndexEntry::new(id)) {
                debug!(index = %self.name, sent, "Scan cancelled");
                break;
            }
            sent += 1;
        }

        sender.close();
    }
}

impl PrimaryIndex for MemoryPrimaryIndex {
    fn scan_entries(&self, limit: u64, _consistency: ScanConsistency, conn: &IndexConnection) {
        let sender = conn.sender();
        let limit = self.limit(limit);

        for i in 0..limit {
            if !sender.send_entry(IndexEntry::new(i.to_string())) {
                debug!(index = %self.name, sent = i, "Scan cancelled");
                break;
            }
        }

        sender.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Context;
    use crate::exchange::Received;
    use crate::index::Inclusion;
    use crate::settings::ScanSettings;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Default)]
    struct Errors(Mutex<Vec<ScanError>>);

    impl Context for Errors {
        fn fatal(&self, err: ScanError) {
            self.0.lock().push(err);
        }

        fn error(&self, err: ScanError) {
            self.0.lock().push(err);
        }

        fn warning(&self, _wrn: ScanError) {}
    }

    fn connection(ctx: Arc<Errors>) -> IndexConnection {
        // large enough that scans never block on a single thread
        IndexConnection::new(&Arc::new(ScanSettings::new(256, 2)), ctx)
    }

    fn drain(conn: &IndexConnection) -> Vec<String> {
        let mut keys = Vec::new();
        while let Received::Entry(entry) = conn.sender().get_entry() {
            keys.push(entry.primary_key);
        }
        keys
    }

    #[test]
    fn test_metadata() {
        let index = MemoryPrimaryIndex::new("#primary", 3);
        assert_eq!(index.id(), "#primary");
        assert_eq!(index.name(), "#primary");
        assert_eq!(index.index_type(), IndexType::Default);
        assert_eq!(index.state(), IndexState::Online);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_scan_entries_all() {
        let index = MemoryPrimaryIndex::new("p", 5);
        let conn = connection(Arc::default());

        index.scan_entries(0, ScanConsistency::Unbounded, &conn);
        assert_eq!(drain(&conn), vec!["0", "1", "2", "3", "4"]);
        assert!(conn.sender().get_entry() == Received::EndOfScan);
    }

    #[test]
    fn test_scan_entries_limit() {
        let index = MemoryPrimaryIndex::new("p", 5);
        let conn = connection(Arc::default());

        index.scan_entries(2, ScanConsistency::Unbounded, &conn);
        assert_eq!(drain(&conn), vec!["0", "1"]);
    }

    #[test]
    fn test_scan_full_span() {
        let index = MemoryPrimaryIndex::new("p", 4);
        let conn = connection(Arc::default());

        index.scan(&Span::full(), false, 0, ScanConsistency::Unbounded, &conn);
        assert_eq!(drain(&conn), vec!["0", "1", "2", "3"]);
    }

    #[test]
    fn test_scan_bounds_inclusion() {
        let index = MemoryPrimaryIndex::new("p", 8);

        let conn = connection(Arc::default());
        let span = Span::between(json!("2"), json!("5"), Inclusion::Both);
        index.scan(&span, false, 0, ScanConsistency::Unbounded, &conn);
        assert_eq!(drain(&conn), vec!["2", "3", "4", "5"]);

        let conn = connection(Arc::default());
        let span = Span::between(json!("2"), json!("5"), Inclusion::Neither);
        index.scan(&span, false, 0, ScanConsistency::Unbounded, &conn);
        assert_eq!(drain(&conn), vec!["3", "4"]);
    }

    #[test]
    fn test_scan_limit_counts_sent_entries() {
        let index = MemoryPrimaryIndex::new("p", 8);
        let conn = connection(Arc::default());

        let span = Span::between(json!("3"), json!("7"), Inclusion::Both);
        index.scan(&span, false, 2, ScanConsistency::ScanPlus, &conn);
        assert_eq!(drain(&conn), vec!["3", "4"]);
    }

    #[test]
    fn test_scan_invalid_bound() {
        let index = MemoryPrimaryIndex::new("p", 8);
        let ctx = Arc::new(Errors::default());
        let conn = connection(ctx.clone());

        let span = Span::between(json!(4), json!("7"), Inclusion::Both);
        index.scan(&span, false, 0, ScanConsistency::Unbounded, &conn);

        assert_eq!(conn.sender().get_entry(), Received::EndOfScan);
        let errors = ctx.0.lock();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0],
            ScanError::InvalidBound {
                side: "lower",
                value: "4".into()
            }
        );
    }

    #[test]
    fn test_scan_stops_when_cancelled() {
        let index = MemoryPrimaryIndex::new("p", 100);
        let conn = connection(Arc::default());
        conn.send_stop();

        index.scan_entries(0, ScanConsistency::Unbounded, &conn);
        assert_eq!(conn.sender().length(), 0);
    }
}
