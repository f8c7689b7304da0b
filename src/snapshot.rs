//! Persistent snapshots: the whole keyspace and schedule, serialized with
//! the same wire frame codec used for client traffic and written to a file.
//!
//! Expiry state is intentionally not part of the snapshot; it is reset by
//! both [`restore`] (replace) and [`merge`] (existing keys win).

use crate::protocol::{Frame, FrameCodec, FrameError};
use crate::store::schedule::{format_timestamp, parse_timestamp};
use crate::store::{Store, Value};
use bytes::BytesMut;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed snapshot: {0}")]
    Malformed(String),
}

fn store_to_frame(store: &Store) -> Frame {
    let kv = store
        .iter_live()
        .map(|(k, v)| (Frame::Bulk(k.clone().into()), v.clone().into_frame()))
        .collect();
    let schedule = store
        .peek_schedule_sorted()
        .into_iter()
        .map(|(ts, payload)| Frame::Array(vec![Frame::Simple(format_timestamp(&ts)), payload.into_frame()]))
        .collect();
    Frame::Dict(vec![
        (Frame::Simple("kv".into()), Frame::Dict(kv)),
        (Frame::Simple("schedule".into()), Frame::Array(schedule)),
    ])
}

struct Parsed {
    kv: HashMap<Vec<u8>, Value>,
    schedule: Vec<(chrono::NaiveDateTime, Value)>,
}

fn frame_to_parsed(frame: Frame) -> Result<Parsed, SnapshotError> {
    let Frame::Dict(top) = frame else {
        return Err(SnapshotError::Malformed("expected top-level dict".into()));
    };
    let mut kv = HashMap::new();
    let mut schedule = Vec::new();
    for (key, value) in top {
        let Frame::Simple(name) = key else {
            return Err(SnapshotError::Malformed("expected simple-text section name".into()));
        };
        match name.as_str() {
            "kv" => {
                let Frame::Dict(entries) = value else {
                    return Err(SnapshotError::Malformed("kv section must be a dict".into()));
                };
                for (k, v) in entries {
                    let Frame::Bulk(key_bytes) = k else {
                        return Err(SnapshotError::Malformed("kv keys must be bulk bytes".into()));
                    };
                    let value = Value::from_frame(v).map_err(|e| SnapshotError::Malformed(e.to_string()))?;
                    kv.insert(key_bytes.to_vec(), value);
                }
            }
            "schedule" => {
                let Frame::Array(items) = value else {
                    return Err(SnapshotError::Malformed("schedule section must be an array".into()));
                };
                for item in items {
                    let Frame::Array(pair) = item else {
                        return Err(SnapshotError::Malformed("schedule entries must be pairs".into()));
                    };
                    let mut it = pair.into_iter();
                    let (Some(ts_frame), Some(payload_frame), None) = (it.next(), it.next(), it.next()) else {
                        return Err(SnapshotError::Malformed("schedule entry must have exactly 2 fields".into()));
                    };
                    let Frame::Simple(ts_str) = ts_frame else {
                        return Err(SnapshotError::Malformed("schedule timestamp must be simple text".into()));
                    };
                    let ts = parse_timestamp(&ts_str).map_err(|e| SnapshotError::Malformed(e.to_string()))?;
                    let payload = Value::from_frame(payload_frame).map_err(|e| SnapshotError::Malformed(e.to_string()))?;
                    schedule.push((ts, payload));
                }
            }
            other => return Err(SnapshotError::Malformed(format!("unknown snapshot section {other:?}"))),
        }
    }
    Ok(Parsed { kv, schedule })
}

/// Writes the full keyspace and schedule to `path`, overwriting it.
pub fn save(store: &Store, path: &Path) -> Result<(), SnapshotError> {
    let frame = store_to_frame(store);
    let mut buf = BytesMut::new();
    FrameCodec.encode(frame, &mut buf)?;
    std::fs::write(path, &buf[..])?;
    Ok(())
}

fn load(path: &Path) -> Result<Option<Parsed>, SnapshotError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path)?;
    let mut buf = BytesMut::from(&bytes[..]);
    let frame = FrameCodec
        .decode(&mut buf)?
        .ok_or_else(|| SnapshotError::Malformed("truncated snapshot file".into()))?;
    Ok(Some(frame_to_parsed(frame)?))
}

/// Replaces the entire store with the snapshot's contents. Returns `false`
/// if the file doesn't exist, leaving the store untouched.
pub fn restore(store: &mut Store, path: &Path) -> Result<bool, SnapshotError> {
    match load(path)? {
        Some(parsed) => {
            store.replace_all(parsed.kv);
            store.load_schedule_sorted(parsed.schedule);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Merges the snapshot into the current store: existing keys win, the
/// schedule is replaced wholesale. Returns `false` if the file doesn't
/// exist.
pub fn merge(store: &mut Store, path: &Path) -> Result<bool, SnapshotError> {
    match load(path)? {
        Some(parsed) => {
            store.merge_missing(parsed.kv);
            store.load_schedule_sorted(parsed.schedule);
            Ok(true)
        }
        None => Ok(false),
    }
}
