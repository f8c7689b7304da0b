//! List/queue commands (`LPUSH`, `RPOP`, `LRANGE`, ...), backed by a
//! `VecDeque<Scalar>` so both ends push and pop in O(1).

use super::{Scalar, Store, Tag, Value};
use crate::error::CommandError;
use std::collections::VecDeque;

fn wrap_index(idx: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if idx < 0 { idx + len } else { idx };
    if i < 0 || i >= len {
        None
    } else {
        Some(i as usize)
    }
}

impl Store {
    fn queue_mut(&mut self, key: &[u8]) -> Result<&mut VecDeque<Scalar>, CommandError> {
        match self.get_mut(key) {
            Some(Value::Queue(q)) => Ok(q),
            _ => Err(CommandError::WrongType),
        }
    }

    fn queue(&mut self, key: &[u8]) -> Result<&VecDeque<Scalar>, CommandError> {
        match self.get(key) {
            Some(Value::Queue(q)) => Ok(q),
            _ => Err(CommandError::WrongType),
        }
    }

    /// `LPUSH key v1 v2 ...` pushes each value to the front in argument
    /// order, the same net effect as Python's `deque.extendleft`: later
    /// arguments end up closer to the front.
    pub fn lpush(&mut self, key: &[u8], values: Vec<Scalar>) -> Result<i64, CommandError> {
        self.guard(key, Tag::Queue, true)?;
        let q = self.queue_mut(key)?;
        for v in values {
            q.push_front(v);
        }
        Ok(q.len() as i64)
    }

    pub fn rpush(&mut self, key: &[u8], values: Vec<Scalar>) -> Result<i64, CommandError> {
        self.guard(key, Tag::Queue, true)?;
        let q = self.queue_mut(key)?;
        for v in values {
            q.push_back(v);
        }
        Ok(q.len() as i64)
    }

    pub fn lpop(&mut self, key: &[u8]) -> Result<Scalar, CommandError> {
        self.guard(key, Tag::Queue, true)?;
        self.queue_mut(key)?.pop_front().ok_or(CommandError::EmptyKey)
    }

    pub fn rpop(&mut self, key: &[u8]) -> Result<Scalar, CommandError> {
        self.guard(key, Tag::Queue, true)?;
        self.queue_mut(key)?.pop_back().ok_or(CommandError::EmptyKey)
    }

    /// Removes the first occurrence of `value`. Returns 1 if something was
    /// removed, 0 otherwise.
    pub fn lrem(&mut self, key: &[u8], value: &Scalar) -> Result<i64, CommandError> {
        self.guard(key, Tag::Queue, true)?;
        let q = self.queue_mut(key)?;
        if let Some(idx) = q.iter().position(|v| v == value) {
            q.remove(idx);
            Ok(1)
        } else {
            Ok(0)
        }
    }

    pub fn llen(&mut self, key: &[u8]) -> Result<i64, CommandError> {
        self.guard(key, Tag::Queue, true)?;
        Ok(self.queue(key)?.len() as i64)
    }

    pub fn lindex(&mut self, key: &[u8], idx: i64) -> Result<Scalar, CommandError> {
        self.guard(key, Tag::Queue, true)?;
        let q = self.queue(key)?;
        let i = wrap_index(idx, q.len()).ok_or(CommandError::IndexOutOfRange)?;
        Ok(q[i].clone())
    }

    /// Returns 1 on success, 0 if `idx` is out of range — not an error.
    pub fn lset(&mut self, key: &[u8], idx: i64, value: Scalar) -> Result<i64, CommandError> {
        self.guard(key, Tag::Queue, true)?;
        let q = self.queue_mut(key)?;
        match wrap_index(idx, q.len()) {
            Some(i) => {
                q[i] = value;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    /// Half-open `[start, stop)` slice, clamped to bounds, supporting
    /// negative indices. `stop = None` means "to the end".
    pub fn lrange(&mut self, key: &[u8], start: i64, stop: Option<i64>) -> Result<Vec<Scalar>, CommandError> {
        self.guard(key, Tag::Queue, true)?;
        let q = self.queue(key)?;
        let len = q.len() as i64;
        let clamp = |i: i64| -> i64 {
            let i = if i < 0 { (i + len).max(0) } else { i };
            i.min(len)
        };
        let start = clamp(start);
        let stop = clamp(stop.unwrap_or(len));
        if start >= stop {
            return Ok(Vec::new());
        }
        Ok(q.iter().skip(start as usize).take((stop - start) as usize).cloned().collect())
    }

    pub fn ltrim(&mut self, key: &[u8], start: i64, stop: i64) -> Result<i64, CommandError> {
        let kept = self.lrange(key, start, Some(stop))?;
        let q = self.queue_mut(key)?;
        *q = kept.into();
        Ok(q.len() as i64)
    }

    /// Pops the tail of `src` and pushes it to the front of `dest`. Returns
    /// 0 without effect if `src` is empty.
    pub fn rpoplpush(&mut self, src: &[u8], dest: &[u8]) -> Result<i64, CommandError> {
        self.guard(src, Tag::Queue, true)?;
        let popped = self.queue_mut(src)?.pop_back();
        let Some(value) = popped else {
            return Ok(0);
        };
        self.guard(dest, Tag::Queue, true)?;
        self.queue_mut(dest)?.push_front(value);
        Ok(1)
    }

    /// Clears the queue, returning its prior length.
    pub fn lflush(&mut self, key: &[u8]) -> Result<i64, CommandError> {
        self.guard(key, Tag::Queue, true)?;
        let q = self.queue_mut(key)?;
        let n = q.len();
        q.clear();
        Ok(n as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lpush_reverses_multi_value_order() {
        let mut store = Store::new();
        store.lpush(b"q", vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3)]).unwrap();
        assert_eq!(store.lrange(b"q", 0, None).unwrap(), vec![Scalar::Int(3), Scalar::Int(2), Scalar::Int(1)]);
    }

    #[test]
    fn scenario_one_mixed_push_order() {
        let mut store = Store::new();
        store.lpush(b"queue", vec![Scalar::Text("i1".into())]).unwrap();
        store.lpush(b"queue", vec![Scalar::Text("i2".into())]).unwrap();
        store.rpush(b"queue", vec![Scalar::Text("i3".into())]).unwrap();
        store.rpush(b"queue", vec![Scalar::Text("i4".into())]).unwrap();
        let got = store.lrange(b"queue", 0, None).unwrap();
        assert_eq!(
            got,
            vec![
                Scalar::Text("i2".into()),
                Scalar::Text("i1".into()),
                Scalar::Text("i3".into()),
                Scalar::Text("i4".into()),
            ]
        );
    }

    #[test]
    fn lpop_on_empty_queue_is_empty_key_error() {
        let mut store = Store::new();
        assert_eq!(store.lpop(b"q").unwrap_err(), CommandError::EmptyKey);
    }

    #[test]
    fn lindex_out_of_range_errors() {
        let mut store = Store::new();
        store.rpush(b"q", vec![Scalar::Int(1)]).unwrap();
        assert_eq!(store.lindex(b"q", 5).unwrap_err(), CommandError::IndexOutOfRange);
    }

    #[test]
    fn lset_out_of_range_returns_zero_not_error() {
        let mut store = Store::new();
        store.rpush(b"q", vec![Scalar::Int(1)]).unwrap();
        assert_eq!(store.lset(b"q", 5, Scalar::Int(9)).unwrap(), 0);
    }

    #[test]
    fn rpoplpush_moves_between_queues() {
        let mut store = Store::new();
        store.rpush(b"src", vec![Scalar::Int(1), Scalar::Int(2)]).unwrap();
        assert_eq!(store.rpoplpush(b"src", b"dst").unwrap(), 1);
        assert_eq!(store.lrange(b"dst", 0, None).unwrap(), vec![Scalar::Int(2)]);
        assert_eq!(store.lrange(b"src", 0, None).unwrap(), vec![Scalar::Int(1)]);
    }
}
