//! Scalar and composite value types backing the store, plus the conversions
//! to and from wire [`Frame`]s.

use crate::error::CommandError;
use crate::protocol::Frame;
use bytes::{Bytes, BytesMut};
use indexmap::{IndexMap, IndexSet};
use ordered_float::OrderedFloat;
use std::collections::VecDeque;

/// An atomic payload: a byte string, text, a number, a bool, or null.
///
/// `f64` has no native `Eq`/`Hash`/`Ord`; [`Scalar::Float`] wraps it in
/// `OrderedFloat` for total ordering instead, so the whole enum can derive
/// its comparison traits the same way the rest of the stack's numeric
/// newtypes do. Variant declaration order doubles as the cross-variant
/// ranking used when sets/maps hold mixed scalar kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scalar {
    Bytes(Bytes),
    Text(String),
    Int(i64),
    Float(OrderedFloat<f64>),
    Bool(bool),
    Null,
}

impl Scalar {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Scalar::Int(_) | Scalar::Float(_))
    }

    /// Convert a decoded argument frame into a scalar, rejecting container
    /// frames the wire grammar allows but scalar positions do not.
    pub fn from_frame(frame: Frame) -> Result<Scalar, CommandError> {
        match frame {
            Frame::Bulk(b) => Ok(Scalar::Bytes(b)),
            Frame::Text(s) => Ok(Scalar::Text(s)),
            Frame::Simple(s) => Ok(Scalar::Text(s)),
            Frame::Int(i) => Ok(Scalar::Int(i)),
            Frame::Float(f) => Ok(Scalar::Float(OrderedFloat(f))),
            Frame::Null => Ok(Scalar::Null),
            other => Err(CommandError::BadRequest(format!(
                "expected a scalar argument, got {other:?}"
            ))),
        }
    }

    pub fn into_frame(self) -> Frame {
        match self {
            Scalar::Bytes(b) => Frame::Bulk(b),
            Scalar::Text(s) => Frame::Text(s),
            Scalar::Int(i) => Frame::Int(i),
            Scalar::Float(f) => Frame::Float(f.0),
            Scalar::Bool(b) => Frame::Int(if b { 1 } else { 0 }),
            Scalar::Null => Frame::Null,
        }
    }

    /// Render as a byte string for use as a hash field key or similar.
    pub fn as_key_bytes(&self) -> Vec<u8> {
        match self {
            Scalar::Bytes(b) => b.to_vec(),
            Scalar::Text(s) => s.as_bytes().to_vec(),
            Scalar::Int(i) => i.to_string().into_bytes(),
            Scalar::Float(f) => f.0.to_string().into_bytes(),
            Scalar::Bool(b) => (if *b { "1" } else { "0" }).into(),
            Scalar::Null => Vec::new(),
        }
    }
}

/// Combine two scalars with native `+` semantics: concatenation for
/// byte/text payloads, arithmetic addition for numeric ones. Anything else
/// is an incompatible combination.
pub fn scalar_add(a: Scalar, b: Scalar) -> Result<Scalar, CommandError> {
    use Scalar::*;
    match (a, b) {
        (Bytes(x), Bytes(y)) => {
            let mut buf = BytesMut::with_capacity(x.len() + y.len());
            buf.extend_from_slice(&x);
            buf.extend_from_slice(&y);
            Ok(Bytes(buf.freeze()))
        }
        (Text(mut x), Text(y)) => {
            x.push_str(&y);
            Ok(Text(x))
        }
        (Int(x), Int(y)) => Ok(Int(x.wrapping_add(y))),
        (Float(x), Float(y)) => Ok(Float(OrderedFloat(x.0 + y.0))),
        (Int(x), Float(y)) | (Float(y), Int(x)) => Ok(Float(OrderedFloat(x as f64 + y.0))),
        (Bool(x), Bool(y)) => Ok(Int(x as i64 + y as i64)),
        (Bool(x), Int(y)) | (Int(y), Bool(x)) => Ok(Int(x as i64 + y)),
        _ => Err(CommandError::IncompatibleTypes),
    }
}

/// The four payload shapes a key can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Kv,
    Hash,
    Queue,
    Set,
}

/// The value stored under a key: a bare scalar, or one of the three
/// collection shapes, each holding scalars.
#[derive(Debug, Clone)]
pub enum Value {
    Kv(Scalar),
    Hash(IndexMap<Vec<u8>, Scalar>),
    Queue(VecDeque<Scalar>),
    Set(IndexSet<Scalar>),
}

impl Value {
    pub fn tag(&self) -> Tag {
        match self {
            Value::Kv(_) => Tag::Kv,
            Value::Hash(_) => Tag::Hash,
            Value::Queue(_) => Tag::Queue,
            Value::Set(_) => Tag::Set,
        }
    }

    pub fn empty(tag: Tag) -> Value {
        match tag {
            Tag::Kv => Value::Kv(Scalar::Null),
            Tag::Hash => Value::Hash(IndexMap::new()),
            Tag::Queue => Value::Queue(VecDeque::new()),
            Tag::Set => Value::Set(IndexSet::new()),
        }
    }

    /// Infer a value's shape from an argument frame: mappings become
    /// `Hash`, arrays become `Queue`, sets become `Set`, everything else is
    /// a bare `Kv` scalar.
    pub fn from_frame(frame: Frame) -> Result<Value, CommandError> {
        match frame {
            Frame::Dict(pairs) => {
                let mut map = IndexMap::with_capacity(pairs.len());
                for (k, v) in pairs {
                    let key = frame_to_key_bytes(k)?;
                    map.insert(key, Scalar::from_frame(v)?);
                }
                Ok(Value::Hash(map))
            }
            Frame::Array(items) => {
                let mut deque = VecDeque::with_capacity(items.len());
                for item in items {
                    deque.push_back(Scalar::from_frame(item)?);
                }
                Ok(Value::Queue(deque))
            }
            Frame::Set(items) => {
                let mut set = IndexSet::with_capacity(items.len());
                for item in items {
                    set.insert(Scalar::from_frame(item)?);
                }
                Ok(Value::Set(set))
            }
            other => Ok(Value::Kv(Scalar::from_frame(other)?)),
        }
    }

    pub fn into_frame(self) -> Frame {
        match self {
            Value::Kv(s) => s.into_frame(),
            Value::Hash(map) => Frame::Dict(
                map.into_iter()
                    .map(|(k, v)| (Frame::Bulk(Bytes::from(k)), v.into_frame()))
                    .collect(),
            ),
            Value::Queue(deque) => Frame::Array(deque.into_iter().map(Scalar::into_frame).collect()),
            Value::Set(set) => Frame::Set(set.into_iter().map(Scalar::into_frame).collect()),
        }
    }
}

fn frame_to_key_bytes(frame: Frame) -> Result<Vec<u8>, CommandError> {
    Ok(Scalar::from_frame(frame)?.as_key_bytes())
}
