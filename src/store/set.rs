//! Set commands (`SADD`, `SINTER`, `SPOP`, ...), backed by an `IndexSet`.
//!
//! `SMEMBERS` returns the set payload as-is (wire-encoded with the `&` set
//! tag); the multi-key combinators (`SDIFF`/`SINTER`/`SUNION`) return plain
//! lists, matching the original server's use of `list(...)` around the
//! computed Python `set`.

use super::{Scalar, Store, Tag, Value};
use crate::error::CommandError;
use indexmap::IndexSet;

impl Store {
    fn set_mut(&mut self, key: &[u8]) -> Result<&mut IndexSet<Scalar>, CommandError> {
        match self.get_mut(key) {
            Some(Value::Set(s)) => Ok(s),
            _ => Err(CommandError::WrongType),
        }
    }

    fn set_ref(&mut self, key: &[u8]) -> Result<&IndexSet<Scalar>, CommandError> {
        match self.get(key) {
            Some(Value::Set(s)) => Ok(s),
            _ => Err(CommandError::WrongType),
        }
    }

    pub fn sadd(&mut self, key: &[u8], members: Vec<Scalar>) -> Result<i64, CommandError> {
        self.guard(key, Tag::Set, true)?;
        let s = self.set_mut(key)?;
        for m in members {
            s.insert(m);
        }
        Ok(s.len() as i64)
    }

    pub fn scard(&mut self, key: &[u8]) -> Result<i64, CommandError> {
        self.guard(key, Tag::Set, true)?;
        Ok(self.set_ref(key)?.len() as i64)
    }

    pub fn sismember(&mut self, key: &[u8], member: &Scalar) -> Result<i64, CommandError> {
        self.guard(key, Tag::Set, true)?;
        Ok(if self.set_ref(key)?.contains(member) { 1 } else { 0 })
    }

    pub fn smembers(&mut self, key: &[u8]) -> Result<IndexSet<Scalar>, CommandError> {
        self.guard(key, Tag::Set, true)?;
        Ok(self.set_ref(key)?.clone())
    }

    /// Pops up to `n` arbitrary members and returns them as a list.
    pub fn spop(&mut self, key: &[u8], n: usize) -> Result<Vec<Scalar>, CommandError> {
        self.guard(key, Tag::Set, true)?;
        let s = self.set_mut(key)?;
        let mut popped = Vec::with_capacity(n.min(s.len()));
        for _ in 0..n {
            match s.pop() {
                Some(v) => popped.push(v),
                None => break,
            }
        }
        Ok(popped)
    }

    pub fn srem(&mut self, key: &[u8], members: &[Scalar]) -> Result<i64, CommandError> {
        self.guard(key, Tag::Set, true)?;
        let s = self.set_mut(key)?;
        let mut removed = 0;
        for m in members {
            if s.shift_remove(m) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn combine(&mut self, keys: &[Vec<u8>], op: SetOp) -> Result<Vec<Scalar>, CommandError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.guard(&keys[0], Tag::Set, true)?;
        let mut acc: IndexSet<Scalar> = self.set_ref(&keys[0])?.clone();
        for key in &keys[1..] {
            self.guard(key, Tag::Set, true)?;
            let other = self.set_ref(key)?;
            acc = match op {
                SetOp::Diff => acc.difference(other).cloned().collect(),
                SetOp::Inter => acc.intersection(other).cloned().collect(),
                SetOp::Union => acc.union(other).cloned().collect(),
            };
        }
        Ok(acc.into_iter().collect())
    }

    pub fn sdiff(&mut self, keys: &[Vec<u8>]) -> Result<Vec<Scalar>, CommandError> {
        self.combine(keys, SetOp::Diff)
    }

    pub fn sinter(&mut self, keys: &[Vec<u8>]) -> Result<Vec<Scalar>, CommandError> {
        self.combine(keys, SetOp::Inter)
    }

    pub fn sunion(&mut self, keys: &[Vec<u8>]) -> Result<Vec<Scalar>, CommandError> {
        self.combine(keys, SetOp::Union)
    }

    /// Stores the combined result into `dest`, unconditionally replacing
    /// whatever was there (even a different-typed value) — `dest` is always
    /// left holding a `SET`. Returns the resulting cardinality.
    fn combine_store(&mut self, dest: &[u8], keys: &[Vec<u8>], op: SetOp) -> Result<i64, CommandError> {
        let result: IndexSet<Scalar> = self.combine(keys, op)?.into_iter().collect();
        let n = result.len() as i64;
        self.set_raw(dest, Value::Set(result));
        Ok(n)
    }

    pub fn sdiffstore(&mut self, dest: &[u8], keys: &[Vec<u8>]) -> Result<i64, CommandError> {
        self.combine_store(dest, keys, SetOp::Diff)
    }

    pub fn sinterstore(&mut self, dest: &[u8], keys: &[Vec<u8>]) -> Result<i64, CommandError> {
        self.combine_store(dest, keys, SetOp::Inter)
    }

    pub fn sunionstore(&mut self, dest: &[u8], keys: &[Vec<u8>]) -> Result<i64, CommandError> {
        self.combine_store(dest, keys, SetOp::Union)
    }
}

#[derive(Clone, Copy)]
enum SetOp {
    Diff,
    Inter,
    Union,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sadd_dedups() {
        let mut store = Store::new();
        store.sadd(b"s", vec![Scalar::Int(1), Scalar::Int(1), Scalar::Int(2)]).unwrap();
        assert_eq!(store.scard(b"s").unwrap(), 2);
    }

    #[test]
    fn sinter_across_two_keys() {
        let mut store = Store::new();
        store.sadd(b"a", vec![Scalar::Int(1), Scalar::Int(2)]).unwrap();
        store.sadd(b"b", vec![Scalar::Int(2), Scalar::Int(3)]).unwrap();
        let mut got = store.sinter(&[b"a".to_vec(), b"b".to_vec()]).unwrap();
        got.sort();
        assert_eq!(got, vec![Scalar::Int(2)]);
    }

    #[test]
    fn sinterstore_overwrites_dest_regardless_of_prior_type() {
        let mut store = Store::new();
        store.set_raw(b"dest", Value::Kv(Scalar::Int(99)));
        store.sadd(b"a", vec![Scalar::Int(1)]).unwrap();
        store.sadd(b"b", vec![Scalar::Int(1)]).unwrap();
        let n = store.sinterstore(b"dest", &[b"a".to_vec(), b"b".to_vec()]).unwrap();
        assert_eq!(n, 1);
        assert_eq!(store.smembers(b"dest").unwrap().len(), 1);
    }
}
