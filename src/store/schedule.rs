//! Delayed-delivery schedule (`ADD`, `READ`, `FLUSH_SCHEDULE`,
//! `LENGTH_SCHEDULE`), backed by a min-heap keyed on `(timestamp, sequence)`
//! so entries with an identical timestamp pop back out in insertion order.

use super::{Store, Value};
use crate::error::CommandError;
use chrono::NaiveDateTime;
use std::cmp::{Ordering, Reverse};

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, CommandError> {
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    Err(CommandError::BadTimestamp)
}

pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

#[derive(Debug, Clone)]
pub(crate) struct ScheduleEntry {
    pub ts: NaiveDateTime,
    pub seq: u64,
    pub payload: Value,
}

impl PartialEq for ScheduleEntry {
    fn eq(&self, other: &Self) -> bool {
        self.ts == other.ts && self.seq == other.seq
    }
}
impl Eq for ScheduleEntry {}
impl PartialOrd for ScheduleEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScheduleEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ts.cmp(&other.ts).then_with(|| self.seq.cmp(&other.seq))
    }
}

/// A schedule entry as exposed to callers: its due timestamp and payload.
#[derive(Debug, Clone)]
pub struct ScheduleItem {
    pub ts: NaiveDateTime,
    pub payload: Value,
}

impl Store {
    pub fn schedule_add(&mut self, ts: NaiveDateTime, payload: Value) -> Result<i64, CommandError> {
        let seq = self.schedule_seq;
        self.schedule_seq += 1;
        self.schedule.push(Reverse(ScheduleEntry { ts, seq, payload }));
        Ok(1)
    }

    /// Pops every entry due at or before `ts`, in (timestamp, insertion)
    /// order.
    pub fn schedule_read(&mut self, ts: NaiveDateTime) -> Vec<ScheduleItem> {
        let mut out = Vec::new();
        while let Some(Reverse(entry)) = self.schedule.peek() {
            if entry.ts > ts {
                break;
            }
            let Reverse(entry) = self.schedule.pop().unwrap();
            out.push(ScheduleItem { ts: entry.ts, payload: entry.payload });
        }
        out
    }

    pub fn schedule_flush(&mut self) -> i64 {
        let n = self.schedule.len();
        self.schedule.clear();
        n as i64
    }

    pub fn schedule_length(&self) -> i64 {
        self.schedule.len() as i64
    }

    /// Snapshot support: every entry in `(ts, seq)` order, without
    /// disturbing the live schedule.
    pub(crate) fn peek_schedule_sorted(&self) -> Vec<(NaiveDateTime, Value)> {
        let mut entries: Vec<&ScheduleEntry> = self.schedule.iter().map(|Reverse(e)| e).collect();
        entries.sort_by(|a, b| a.cmp(b));
        entries.into_iter().map(|e| (e.ts, e.payload.clone())).collect()
    }

    /// Snapshot support: rebuild the schedule from entries already in
    /// ascending `(ts, seq)` order, replacing whatever was there.
    pub(crate) fn load_schedule_sorted(&mut self, entries: Vec<(NaiveDateTime, Value)>) {
        self.schedule.clear();
        self.schedule_seq = 0;
        for (ts, payload) in entries {
            let seq = self.schedule_seq;
            self.schedule_seq += 1;
            self.schedule.push(Reverse(ScheduleEntry { ts, seq, payload }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Scalar;

    #[test]
    fn parses_with_and_without_fractional_seconds() {
        assert!(parse_timestamp("2026-07-26 10:00:00").is_ok());
        assert!(parse_timestamp("2026-07-26 10:00:00.123456").is_ok());
        assert!(parse_timestamp("not a timestamp").is_err());
    }

    #[test]
    fn read_pops_due_entries_in_insertion_order_on_ties() {
        let mut store = Store::new();
        let ts = parse_timestamp("2026-07-26 10:00:00").unwrap();
        store.schedule_add(ts, Value::Kv(Scalar::Text("first".into()))).unwrap();
        store.schedule_add(ts, Value::Kv(Scalar::Text("second".into()))).unwrap();
        let later = parse_timestamp("2026-07-26 11:00:00").unwrap();
        let due = store.schedule_read(later);
        assert_eq!(due.len(), 2);
        match (&due[0].payload, &due[1].payload) {
            (Value::Kv(Scalar::Text(a)), Value::Kv(Scalar::Text(b))) => {
                assert_eq!(a, "first");
                assert_eq!(b, "second");
            }
            _ => panic!("unexpected payloads"),
        }
    }

    #[test]
    fn read_leaves_not_yet_due_entries_in_place() {
        let mut store = Store::new();
        let soon = parse_timestamp("2026-07-26 10:00:00").unwrap();
        let far = parse_timestamp("2099-01-01 00:00:00").unwrap();
        store.schedule_add(soon, Value::Kv(Scalar::Int(1))).unwrap();
        store.schedule_add(far, Value::Kv(Scalar::Int(2))).unwrap();
        let due = store.schedule_read(soon);
        assert_eq!(due.len(), 1);
        assert_eq!(store.schedule_length(), 1);
    }
}
