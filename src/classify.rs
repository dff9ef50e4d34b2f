//! Flow classifier and aggregator - stage 3 of the pipeline.
//!
//! Streams the flow log line by line, derives a (port, protocol name) key
//! per record from fields 6 and 7, resolves its tag, and accumulates two
//! count tables. A single pass in file order; the first malformed record
//! aborts the run.

use std::collections::HashMap;
use std::io::BufRead;

use tracing::trace;

use crate::error::FlowError;
use crate::lookup::{FlowKey, TagLookup};
use crate::protocols::ProtocolTable;

/// Sentinel tag for records whose (port, protocol) pair has no lookup entry.
pub const UNTAGGED: &str = "Untagged";

/// Minimum whitespace-separated fields per flow-log record.
const MIN_FIELDS: usize = 8;
/// 0-indexed position of the destination port field.
const PORT_FIELD: usize = 6;
/// 0-indexed position of the protocol identifier field.
const PROTOCOL_FIELD: usize = 7;

/// Counts per (port, protocol) pair, iterated in first-seen order.
#[derive(Debug, Default)]
pub struct PairCounts {
    counts: HashMap<FlowKey, u64>,
    order: Vec<FlowKey>,
}

impl PairCounts {
    fn increment(&mut self, key: &FlowKey) {
        match self.counts.get_mut(key) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(key.clone(), 1);
                self.order.push(key.clone());
            }
        }
    }

    pub fn get(&self, key: &FlowKey) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Entries in the order their keys were first observed.
    pub fn iter(&self) -> impl Iterator<Item = (&FlowKey, u64)> {
        self.order.iter().map(|key| (key, self.counts[key]))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Counts per tag, pre-seeded with every known tag at zero.
///
/// Seeded before classification begins; `increment` never creates a key, so
/// the output always lists every known tag even when it never matched.
#[derive(Debug)]
pub struct TagCounts {
    counts: HashMap<String, u64>,
    order: Vec<String>,
}

impl TagCounts {
    /// Seeds the table with the lookup's distinct tags in first-seen order,
    /// followed by the `Untagged` sentinel.
    pub fn seeded(tags: &[String]) -> Self {
        let mut order = tags.to_vec();
        order.push(UNTAGGED.to_string());
        let counts = order.iter().map(|tag| (tag.clone(), 0)).collect();
        Self { counts, order }
    }

    fn increment(&mut self, tag: &str) {
        debug_assert!(self.counts.contains_key(tag), "tag {tag:?} was not seeded");
        if let Some(count) = self.counts.get_mut(tag) {
            *count += 1;
        }
    }

    pub fn get(&self, tag: &str) -> u64 {
        self.counts.get(tag).copied().unwrap_or(0)
    }

    /// Entries in seeding order (lookup tag order, then `Untagged`).
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.order.iter().map(|tag| (tag.as_str(), self.counts[tag]))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Aggregate result of a classification run.
#[derive(Debug)]
pub struct Classification {
    pub pair_counts: PairCounts,
    pub tag_counts: TagCounts,
    pub records: u64,
}

/// Streams the flow log once, classifying each record.
///
/// The protocol identifier field is parsed as an integer and indexed into
/// the protocol table; an identifier with no table row is fatal, since it
/// indicates a reference-table/flow-log version mismatch.
pub fn classify<R: BufRead>(
    reader: R,
    protocols: &ProtocolTable,
    lookup: &TagLookup,
) -> Result<Classification, FlowError> {
    let mut pair_counts = PairCounts::default();
    let mut tag_counts = TagCounts::seeded(lookup.tag_order());
    let mut records = 0u64;

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|source| FlowError::Read {
            line: line_no,
            source,
        })?;

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < MIN_FIELDS {
            return Err(FlowError::TooFewFields {
                line: line_no,
                found: fields.len(),
            });
        }

        let id_text = fields[PROTOCOL_FIELD];
        let id: usize = id_text.parse().map_err(|_| FlowError::BadProtocolId {
            line: line_no,
            id: id_text.to_string(),
        })?;
        let protocol = protocols.name(id).ok_or(FlowError::UnknownProtocol {
            line: line_no,
            id,
            rows: protocols.len(),
        })?;

        let key = FlowKey::new(fields[PORT_FIELD], protocol);
        pair_counts.increment(&key);

        match lookup.tag(&key) {
            Some(tag) => {
                trace!("record {line_no}: {key} -> {tag}");
                tag_counts.increment(tag);
            }
            None => {
                trace!("record {line_no}: {key} -> {UNTAGGED}");
                tag_counts.increment(UNTAGGED);
            }
        }
        records += 1;
    }

    Ok(Classification {
        pair_counts,
        tag_counts,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocols() -> ProtocolTable {
        // Rows 0-6; row 1 = icmp, row 6 = tcp.
        let source = "0,HOPOPT\n1,ICMP\n2,IGMP\n3,GGP\n4,IPv4\n5,ST\n6,TCP\n";
        ProtocolTable::from_reader(source.as_bytes()).unwrap()
    }

    fn lookup() -> TagLookup {
        let source = "Port,Protocol,Tag\n49153,tcp,sv_P1\n23,tcp,sv_P1\n25,tcp,sv_P2\n";
        TagLookup::from_reader(source.as_bytes()).unwrap()
    }

    fn record(port: &str, protocol_id: &str) -> String {
        format!("2 123456789012 eni-0a1b 10.0.1.201 198.51.100.2 443 {port} {protocol_id} 25 20000 1620140761 1620140821 ACCEPT OK")
    }

    #[test]
    fn test_tagged_record_increments_pair_and_tag() {
        let log = record("49153", "6");
        let result = classify(log.as_bytes(), &protocols(), &lookup()).unwrap();

        assert_eq!(result.records, 1);
        assert_eq!(result.pair_counts.get(&FlowKey::new("49153", "tcp")), 1);
        assert_eq!(result.tag_counts.get("sv_p1"), 1);
        assert_eq!(result.tag_counts.get(UNTAGGED), 0);
    }

    #[test]
    fn test_lookup_miss_falls_back_to_untagged() {
        let log = record("9999", "6");
        let result = classify(log.as_bytes(), &protocols(), &lookup()).unwrap();

        assert_eq!(result.pair_counts.get(&FlowKey::new("9999", "tcp")), 1);
        assert_eq!(result.tag_counts.get(UNTAGGED), 1);
    }

    #[test]
    fn test_counts_sum_to_record_count() {
        let log = [
            record("49153", "6"),
            record("49153", "6"),
            record("25", "6"),
            record("9999", "6"),
            record("0", "1"),
        ]
        .join("\n");
        let result = classify(log.as_bytes(), &protocols(), &lookup()).unwrap();

        assert_eq!(result.records, 5);
        assert_eq!(result.pair_counts.total(), 5);
        assert_eq!(result.tag_counts.total(), 5);
    }

    #[test]
    fn test_tag_counts_never_grow_during_classification() {
        let log = [record("49153", "6"), record("9999", "6")].join("\n");
        let lookup = lookup();
        let result = classify(log.as_bytes(), &protocols(), &lookup).unwrap();

        // Every seeded tag plus the sentinel, nothing else.
        assert_eq!(result.tag_counts.len(), lookup.tag_order().len() + 1);
        let tags: Vec<&str> = result.tag_counts.iter().map(|(tag, _)| tag).collect();
        assert_eq!(tags, vec!["sv_p1", "sv_p2", UNTAGGED]);
    }

    #[test]
    fn test_pair_counts_keep_first_seen_order() {
        let log = [
            record("9999", "6"),
            record("49153", "6"),
            record("9999", "6"),
        ]
        .join("\n");
        let result = classify(log.as_bytes(), &protocols(), &lookup()).unwrap();

        let keys: Vec<String> = result
            .pair_counts
            .iter()
            .map(|(key, _)| key.to_string())
            .collect();
        assert_eq!(keys, vec!["9999,tcp", "49153,tcp"]);
    }

    #[test]
    fn test_empty_log_keeps_zero_seeded_tags() {
        let result = classify("".as_bytes(), &protocols(), &lookup()).unwrap();

        assert_eq!(result.records, 0);
        assert!(result.pair_counts.is_empty());
        assert_eq!(result.tag_counts.get("sv_p1"), 0);
        assert_eq!(result.tag_counts.get("sv_p2"), 0);
        assert_eq!(result.tag_counts.get(UNTAGGED), 0);
    }

    #[test]
    fn test_short_record_aborts_with_line_number() {
        let log = format!("{}\n1 2 3\n", record("49153", "6"));
        let err = classify(log.as_bytes(), &protocols(), &lookup()).unwrap_err();
        match err {
            FlowError::TooFewFields { line, found } => {
                assert_eq!(line, 2);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_protocol_id_aborts() {
        let log = record("49153", "42");
        let err = classify(log.as_bytes(), &protocols(), &lookup()).unwrap_err();
        match err {
            FlowError::UnknownProtocol { line, id, rows } => {
                assert_eq!(line, 1);
                assert_eq!(id, 42);
                assert_eq!(rows, 7);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_protocol_id_aborts() {
        let log = record("49153", "tcp");
        let err = classify(log.as_bytes(), &protocols(), &lookup()).unwrap_err();
        assert!(matches!(err, FlowError::BadProtocolId { line: 1, .. }));
    }

    #[test]
    fn test_whitespace_splitting_collapses_runs() {
        let log = "  2\t123456789012  eni-0a1b 10.0.1.201 198.51.100.2 443\t49153   6 25 20000 1620140761 1620140821 ACCEPT OK  ";
        let result = classify(log.as_bytes(), &protocols(), &lookup()).unwrap();
        assert_eq!(result.pair_counts.get(&FlowKey::new("49153", "tcp")), 1);
    }

    #[test]
    fn test_port_text_kept_verbatim() {
        // Leading zeros distinguish keys; "049153" does not match "49153".
        let log = record("049153", "6");
        let result = classify(log.as_bytes(), &protocols(), &lookup()).unwrap();

        assert_eq!(result.pair_counts.get(&FlowKey::new("049153", "tcp")), 1);
        assert_eq!(result.tag_counts.get("sv_p1"), 0);
        assert_eq!(result.tag_counts.get(UNTAGGED), 1);
    }
}
