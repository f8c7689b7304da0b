//! Scalar key/value commands (`GET`, `SET`, `INCR`, `APPEND`, ...).
//!
//! `SET`'s payload can itself be a hash/queue/set shape — the tag is
//! inferred from the argument frame before it ever reaches here, so this
//! module mostly works with fully-formed [`Value`]s.

use super::value::scalar_add;
use super::{Scalar, Store, Tag, Value};
use crate::error::CommandError;

impl Store {
    pub fn kv_set(&mut self, key: &[u8], value: Value) -> Result<i64, CommandError> {
        self.set_raw(key, value);
        Ok(1)
    }

    pub fn kv_setnx(&mut self, key: &[u8], value: Value) -> Result<i64, CommandError> {
        if self.contains(key) {
            Ok(0)
        } else {
            self.set_raw(key, value);
            Ok(1)
        }
    }

    pub fn kv_setex(&mut self, key: &[u8], ttl: f64, value: Value) -> Result<i64, CommandError> {
        self.set_raw(key, value);
        self.expire(key, ttl);
        Ok(1)
    }

    pub fn kv_get(&mut self, key: &[u8]) -> Result<Option<Value>, CommandError> {
        Ok(self.get(key).cloned())
    }

    pub fn kv_getset(&mut self, key: &[u8], value: Value) -> Result<Option<Value>, CommandError> {
        let old = self.get(key).cloned();
        self.set_raw(key, value);
        Ok(old)
    }

    pub fn kv_delete(&mut self, key: &[u8]) -> Result<i64, CommandError> {
        Ok(if self.remove(key).is_some() { 1 } else { 0 })
    }

    pub fn kv_mdelete(&mut self, keys: &[Vec<u8>]) -> Result<i64, CommandError> {
        Ok(keys.iter().filter(|k| self.remove(k).is_some()).count() as i64)
    }

    pub fn kv_exists(&mut self, key: &[u8]) -> Result<i64, CommandError> {
        Ok(if self.contains(key) { 1 } else { 0 })
    }

    pub fn kv_mget(&mut self, keys: &[Vec<u8>]) -> Result<Vec<Option<Value>>, CommandError> {
        Ok(keys.iter().map(|k| self.get(k).cloned()).collect())
    }

    pub fn kv_mset(&mut self, pairs: Vec<(Vec<u8>, Value)>) -> Result<i64, CommandError> {
        let n = pairs.len() as i64;
        for (k, v) in pairs {
            self.set_raw(&k, v);
        }
        Ok(n)
    }

    pub fn kv_msetex(&mut self, ttl: f64, pairs: Vec<(Vec<u8>, Value)>) -> Result<i64, CommandError> {
        let n = pairs.len() as i64;
        for (k, v) in pairs {
            self.set_raw(&k, v);
            self.expire(&k, ttl);
        }
        Ok(n)
    }

    pub fn kv_pop(&mut self, key: &[u8]) -> Result<Option<Value>, CommandError> {
        Ok(self.remove(key))
    }

    pub fn kv_mpop(&mut self, keys: &[Vec<u8>]) -> Result<Vec<Option<Value>>, CommandError> {
        Ok(keys.iter().map(|k| self.remove(k)).collect())
    }

    pub fn kv_len(&mut self) -> i64 {
        self.len() as i64
    }

    pub fn kv_flush(&mut self) -> i64 {
        self.flush() as i64
    }

    fn incr_by(&mut self, key: &[u8], n: Scalar) -> Result<Scalar, CommandError> {
        self.guard_numeric_kv(key)?;
        let existing = match self.get(key) {
            Some(Value::Kv(s)) => s.clone(),
            Some(_) => return Err(CommandError::WrongType),
            None => Scalar::Int(0),
        };
        let updated = scalar_add(existing, n)?;
        self.set_raw(key, Value::Kv(updated.clone()));
        Ok(updated)
    }

    pub fn kv_incr(&mut self, key: &[u8]) -> Result<Scalar, CommandError> {
        self.incr_by(key, Scalar::Int(1))
    }

    pub fn kv_decr(&mut self, key: &[u8]) -> Result<Scalar, CommandError> {
        self.incr_by(key, Scalar::Int(-1))
    }

    pub fn kv_incrby(&mut self, key: &[u8], n: i64) -> Result<Scalar, CommandError> {
        self.incr_by(key, Scalar::Int(n))
    }

    pub fn kv_decrby(&mut self, key: &[u8], n: i64) -> Result<Scalar, CommandError> {
        self.incr_by(key, Scalar::Int(-n))
    }

    /// `APPEND key value`: creates the key if absent. If it holds a queue,
    /// extends it (or pushes a bare scalar). If it holds a scalar, combines
    /// with native `+` semantics. Anything else is incompatible.
    pub fn kv_append(&mut self, key: &[u8], incoming: Value) -> Result<Value, CommandError> {
        if !self.contains(key) {
            self.set_raw(key, incoming);
            return Ok(self.get(key).cloned().unwrap());
        }
        match (self.get_mut(key).unwrap(), incoming) {
            (Value::Queue(dq), Value::Queue(items)) => {
                dq.extend(items);
            }
            (Value::Queue(dq), Value::Kv(scalar)) => {
                dq.push_back(scalar);
            }
            (Value::Kv(existing), Value::Kv(incoming)) => {
                let combined = scalar_add(existing.clone(), incoming)?;
                *existing = combined;
            }
            _ => return Err(CommandError::IncompatibleTypes),
        }
        Ok(self.get(key).cloned().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn set_then_get_scalar() {
        let mut store = Store::new();
        store.kv_set(b"k", Value::Kv(Scalar::Int(5))).unwrap();
        match store.kv_get(b"k").unwrap() {
            Some(Value::Kv(Scalar::Int(5))) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn incr_on_missing_key_starts_at_zero() {
        let mut store = Store::new();
        assert_eq!(store.kv_incr(b"counter").unwrap(), Scalar::Int(1));
        assert_eq!(store.kv_incrby(b"counter", 4).unwrap(), Scalar::Int(5));
    }

    #[test]
    fn incr_on_non_numeric_existing_is_wrong_type() {
        let mut store = Store::new();
        store.kv_set(b"k", Value::Kv(Scalar::Text("nope".into()))).unwrap();
        assert_eq!(store.kv_incr(b"k").unwrap_err(), CommandError::WrongType);
    }

    #[test]
    fn append_to_missing_key_creates_it() {
        let mut store = Store::new();
        let v = store.kv_append(b"k", Value::Kv(Scalar::Text("hi".into()))).unwrap();
        match v {
            Value::Kv(Scalar::Text(s)) => assert_eq!(s, "hi"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn append_extends_queue_with_queue() {
        let mut store = Store::new();
        store.kv_set(b"k", Value::from_frame(crate::protocol::Frame::Array(vec![
            crate::protocol::Frame::Text("alpha".into()),
            crate::protocol::Frame::Text("beta".into()),
            crate::protocol::Frame::Text("gamma".into()),
        ])).unwrap()).unwrap();
        let appended = Value::from_frame(crate::protocol::Frame::Array(vec![
            crate::protocol::Frame::Text("pi".into()),
            crate::protocol::Frame::Bulk(Bytes::from_static(b"omega")),
        ])).unwrap();
        store.kv_append(b"k", appended).unwrap();
        let result = store.kv_get(b"k").unwrap().unwrap();
        match result {
            Value::Queue(q) => {
                let texts: Vec<String> = q
                    .iter()
                    .map(|s| match s {
                        Scalar::Text(t) => t.clone(),
                        Scalar::Bytes(b) => String::from_utf8_lossy(b).to_string(),
                        _ => panic!("unexpected scalar"),
                    })
                    .collect();
                assert_eq!(texts, vec!["alpha", "beta", "gamma", "pi", "omega"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn append_incompatible_types_errors() {
        let mut store = Store::new();
        store.kv_set(b"k", Value::Kv(Scalar::Int(1))).unwrap();
        let incoming = Value::Hash(Default::default());
        assert_eq!(store.kv_append(b"k", incoming).unwrap_err(), CommandError::IncompatibleTypes);
    }
}
