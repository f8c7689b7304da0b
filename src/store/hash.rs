//! Hash field commands (`HSET`, `HGETALL`, `HINCRBY`, ...), backed by an
//! `IndexMap` so field iteration preserves insertion order.

use super::value::scalar_add;
use super::{Scalar, Store, Tag, Value};
use crate::error::CommandError;
use indexmap::IndexMap;

impl Store {
    fn hash_mut(&mut self, key: &[u8]) -> Result<&mut IndexMap<Vec<u8>, Scalar>, CommandError> {
        match self.get_mut(key) {
            Some(Value::Hash(h)) => Ok(h),
            _ => Err(CommandError::WrongType),
        }
    }

    fn hash(&mut self, key: &[u8]) -> Result<&IndexMap<Vec<u8>, Scalar>, CommandError> {
        match self.get(key) {
            Some(Value::Hash(h)) => Ok(h),
            _ => Err(CommandError::WrongType),
        }
    }

    pub fn hset(&mut self, key: &[u8], field: Vec<u8>, value: Scalar) -> Result<i64, CommandError> {
        self.guard(key, Tag::Hash, true)?;
        self.hash_mut(key)?.insert(field, value);
        Ok(1)
    }

    pub fn hsetnx(&mut self, key: &[u8], field: Vec<u8>, value: Scalar) -> Result<i64, CommandError> {
        self.guard(key, Tag::Hash, true)?;
        let h = self.hash_mut(key)?;
        if h.contains_key(&field) {
            Ok(0)
        } else {
            h.insert(field, value);
            Ok(1)
        }
    }

    pub fn hmset(&mut self, key: &[u8], pairs: Vec<(Vec<u8>, Scalar)>) -> Result<i64, CommandError> {
        self.guard(key, Tag::Hash, true)?;
        let n = pairs.len() as i64;
        let h = self.hash_mut(key)?;
        for (f, v) in pairs {
            h.insert(f, v);
        }
        Ok(n)
    }

    pub fn hget(&mut self, key: &[u8], field: &[u8]) -> Result<Option<Scalar>, CommandError> {
        self.guard(key, Tag::Hash, true)?;
        Ok(self.hash(key)?.get(field).cloned())
    }

    /// Returns the requested fields in request order, each paired with its
    /// value or `None` if absent.
    pub fn hmget(&mut self, key: &[u8], fields: Vec<Vec<u8>>) -> Result<Vec<(Vec<u8>, Option<Scalar>)>, CommandError> {
        self.guard(key, Tag::Hash, true)?;
        let h = self.hash(key)?;
        Ok(fields.into_iter().map(|f| { let v = h.get(&f).cloned(); (f, v) }).collect())
    }

    pub fn hgetall(&mut self, key: &[u8]) -> Result<IndexMap<Vec<u8>, Scalar>, CommandError> {
        self.guard(key, Tag::Hash, true)?;
        Ok(self.hash(key)?.clone())
    }

    pub fn hkeys(&mut self, key: &[u8]) -> Result<Vec<Vec<u8>>, CommandError> {
        self.guard(key, Tag::Hash, true)?;
        Ok(self.hash(key)?.keys().cloned().collect())
    }

    pub fn hvals(&mut self, key: &[u8]) -> Result<Vec<Scalar>, CommandError> {
        self.guard(key, Tag::Hash, true)?;
        Ok(self.hash(key)?.values().cloned().collect())
    }

    pub fn hlen(&mut self, key: &[u8]) -> Result<i64, CommandError> {
        self.guard(key, Tag::Hash, true)?;
        Ok(self.hash(key)?.len() as i64)
    }

    pub fn hexists(&mut self, key: &[u8], field: &[u8]) -> Result<i64, CommandError> {
        self.guard(key, Tag::Hash, true)?;
        Ok(if self.hash(key)?.contains_key(field) { 1 } else { 0 })
    }

    /// Field deletion preserves the relative order of what's left, matching
    /// a plain `dict`'s `del`.
    pub fn hdel(&mut self, key: &[u8], field: &[u8]) -> Result<i64, CommandError> {
        self.guard(key, Tag::Hash, true)?;
        Ok(if self.hash_mut(key)?.shift_remove(field).is_some() { 1 } else { 0 })
    }

    pub fn hincrby(&mut self, key: &[u8], field: &[u8], n: i64) -> Result<Scalar, CommandError> {
        self.guard(key, Tag::Hash, true)?;
        let h = self.hash_mut(key)?;
        let current = h.get(field).cloned().unwrap_or(Scalar::Int(0));
        if !current.is_numeric() {
            return Err(CommandError::WrongType);
        }
        let updated = scalar_add(current, Scalar::Int(n))?;
        h.insert(field.to_vec(), updated.clone());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn hset_then_hget_roundtrips() {
        let mut store = Store::new();
        store.hset(b"h", b"f".to_vec(), Scalar::Bytes(Bytes::from_static(b"v"))).unwrap();
        assert_eq!(store.hget(b"h", b"f").unwrap(), Some(Scalar::Bytes(Bytes::from_static(b"v"))));
    }

    #[test]
    fn hmget_preserves_requested_order_with_nulls() {
        let mut store = Store::new();
        store.hset(b"h", b"a".to_vec(), Scalar::Int(1)).unwrap();
        let got = store.hmget(b"h", vec![b"a".to_vec(), b"missing".to_vec()]).unwrap();
        assert_eq!(got, vec![(b"a".to_vec(), Some(Scalar::Int(1))), (b"missing".to_vec(), None)]);
    }

    #[test]
    fn hdel_preserves_remaining_order() {
        let mut store = Store::new();
        store.hset(b"h", b"a".to_vec(), Scalar::Int(1)).unwrap();
        store.hset(b"h", b"b".to_vec(), Scalar::Int(2)).unwrap();
        store.hset(b"h", b"c".to_vec(), Scalar::Int(3)).unwrap();
        store.hdel(b"h", b"b").unwrap();
        assert_eq!(store.hkeys(b"h").unwrap(), vec![b"a".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn hincrby_treats_missing_field_as_zero() {
        let mut store = Store::new();
        assert_eq!(store.hincrby(b"h", b"f", 5).unwrap(), Scalar::Int(5));
        assert_eq!(store.hincrby(b"h", b"f", 2).unwrap(), Scalar::Int(7));
    }
}
