//! The in-memory data store: typed key/value payloads, lazy expiry, and the
//! delayed-delivery schedule.

mod hash;
mod kv;
mod queue;
pub(crate) mod schedule;
mod set;
pub mod value;

pub use value::{Scalar, Tag, Value};

use crate::error::CommandError;
use ordered_float::OrderedFloat;
use schedule::ScheduleEntry;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

pub use schedule::ScheduleItem;

/// An expiry deadline paired with the key it belongs to, ordered so the
/// smallest deadline sorts first inside a `BinaryHeap<Reverse<_>>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ExpiryEntry {
    at: OrderedFloat<f64>,
    key: Vec<u8>,
}

/// The keyspace plus its expiry bookkeeping and the schedule heap.
///
/// A key's authoritative deadline lives in `expiry_map`; `expiry_heap` is a
/// min-heap of candidates that may contain stale entries (a key can be
/// re-EXPIREd, leaving its old heap entry behind) — a popped entry is only
/// acted on if it still matches the authoritative map.
pub struct Store {
    kv: HashMap<Vec<u8>, Value>,
    expiry_map: HashMap<Vec<u8>, f64>,
    expiry_heap: BinaryHeap<Reverse<ExpiryEntry>>,
    schedule: BinaryHeap<Reverse<ScheduleEntry>>,
    schedule_seq: u64,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Store {
            kv: HashMap::new(),
            expiry_map: HashMap::new(),
            expiry_heap: BinaryHeap::new(),
            schedule: BinaryHeap::new(),
            schedule_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.kv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kv.is_empty()
    }

    /// Current wall-clock time in fractional seconds, the same unit used
    /// throughout expiry and schedule bookkeeping.
    pub fn now() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }

    fn is_expired(&self, key: &[u8], now: f64) -> bool {
        self.expiry_map.get(key).is_some_and(|&at| now > at)
    }

    /// Drop `key` from the keyspace if its deadline has passed.
    fn expire_if_due(&mut self, key: &[u8]) {
        let now = Self::now();
        if self.is_expired(key, now) {
            self.kv.remove(key);
            self.expiry_map.remove(key);
        }
    }

    /// Pop every heap entry whose deadline is at or before `now`, discarding
    /// stale ones, and delete the rest from the keyspace. Returns the count
    /// of keys actually removed.
    pub fn sweep_expired(&mut self) -> usize {
        let now = Self::now();
        let mut removed = 0;
        while let Some(Reverse(entry)) = self.expiry_heap.peek() {
            if entry.at.0 > now {
                break;
            }
            let Reverse(entry) = self.expiry_heap.pop().unwrap();
            if self.expiry_map.get(&entry.key) == Some(&entry.at.0) {
                self.kv.remove(&entry.key);
                self.expiry_map.remove(&entry.key);
                removed += 1;
            }
        }
        removed
    }

    /// Type-guard a key before a command touches it: expire it first, then
    /// require it to either be absent (creating an empty payload of `tag`
    /// when `set_missing` is true) or already hold `tag`.
    fn guard(&mut self, key: &[u8], tag: Tag, set_missing: bool) -> Result<(), CommandError> {
        self.expire_if_due(key);
        match self.kv.get(key) {
            Some(v) if v.tag() == tag => Ok(()),
            Some(_) => Err(CommandError::WrongType),
            None => {
                if set_missing {
                    self.kv.insert(key.to_vec(), Value::empty(tag));
                }
                Ok(())
            }
        }
    }

    /// Like [`Store::guard`], but additionally requires an existing `Kv`
    /// payload to hold a number (used by INCR/DECR family commands, which
    /// treat a missing key as zero rather than creating one).
    fn guard_numeric_kv(&mut self, key: &[u8]) -> Result<(), CommandError> {
        self.expire_if_due(key);
        match self.kv.get(key) {
            Some(Value::Kv(s)) if s.is_numeric() => Ok(()),
            Some(Value::Kv(_)) | Some(_) => Err(CommandError::WrongType),
            None => Ok(()),
        }
    }

    pub fn expire(&mut self, key: &[u8], ttl_seconds: f64) {
        let at = Self::now() + ttl_seconds;
        self.expiry_map.insert(key.to_vec(), at);
        self.expiry_heap.push(Reverse(ExpiryEntry { at: OrderedFloat(at), key: key.to_vec() }));
    }

    pub fn flush(&mut self) -> usize {
        let n = self.kv.len();
        self.kv.clear();
        self.expiry_map.clear();
        self.expiry_heap.clear();
        n
    }

    pub fn flush_all(&mut self) {
        self.flush();
        self.schedule_flush();
    }

    /// Direct, type-checked access for command handlers that live outside
    /// this module.
    fn get(&mut self, key: &[u8]) -> Option<&Value> {
        self.expire_if_due(key);
        self.kv.get(key)
    }

    fn get_mut(&mut self, key: &[u8]) -> Option<&mut Value> {
        self.expire_if_due(key);
        self.kv.get_mut(key)
    }

    fn remove(&mut self, key: &[u8]) -> Option<Value> {
        self.expire_if_due(key);
        let v = self.kv.remove(key);
        self.expiry_map.remove(key);
        v
    }

    fn contains(&mut self, key: &[u8]) -> bool {
        self.expire_if_due(key);
        self.kv.contains_key(key)
    }

    fn set_raw(&mut self, key: &[u8], value: Value) {
        self.expiry_map.remove(key);
        self.kv.insert(key.to_vec(), value);
    }

    /// Snapshot support: iterate live (unexpired) keys.
    pub(crate) fn iter_live(&self) -> impl Iterator<Item = (&Vec<u8>, &Value)> {
        let now = Self::now();
        self.kv
            .iter()
            .filter(move |(k, _)| !self.expiry_map.get(*k).is_some_and(|&at| now > at))
    }

    /// Snapshot support: replace the entire keyspace, clearing expiry state.
    pub(crate) fn replace_all(&mut self, entries: HashMap<Vec<u8>, Value>) {
        self.kv = entries;
        self.expiry_map.clear();
        self.expiry_heap.clear();
    }

    /// Snapshot support: insert entries whose keys are not already present.
    pub(crate) fn merge_missing(&mut self, entries: HashMap<Vec<u8>, Value>) {
        for (k, v) in entries {
            self.kv.entry(k).or_insert(v);
        }
        self.expiry_map.clear();
        self.expiry_heap.clear();
    }
}
