//! Command dispatch: decodes a request [`Frame`] into a command name plus
//! arguments, looks the name up in a registry seeded at construction, and
//! runs it against the shared [`Engine`].
//!
//! Mirrors the original server's `respond()`/`get_commands()` split: a flat
//! `HashMap` from uppercased command name to handler, with an
//! [`Dispatcher::add_command`] extension point that stays usable for the
//! lifetime of a shared `Arc<Dispatcher>`.

use crate::error::CommandError;
use crate::protocol::Frame;
use crate::snapshot;
use crate::store::schedule::parse_timestamp;
use crate::store::{Scalar, Store, Value};
use bytes::Bytes;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Per-engine counters surfaced by `INFO`, alongside the keyspace.
#[derive(Debug, Default)]
pub struct Stats {
    pub commands_processed: u64,
    pub command_errors: u64,
    pub active_connections: u64,
    pub connections: u64,
}

/// Everything a command handler can touch: the keyspace and the counters.
/// Held behind a single `tokio::sync::Mutex` by the server so handlers stay
/// synchronous and never `.await` while holding the lock.
#[derive(Default)]
pub struct Engine {
    pub store: Store,
    pub stats: Stats,
}

/// What a dispatched command asks the connection loop to do next.
pub enum Outcome {
    /// Write `Frame` back to the client and keep the connection open.
    Reply(Frame),
    /// Write `Frame`, then close this connection.
    Quit(Frame),
    /// Write `Frame`, then begin a full server shutdown.
    Shutdown(Frame),
}

type CommandHandler = Arc<dyn Fn(&mut Engine, &[Frame]) -> Result<Outcome, CommandError> + Send + Sync>;

/// The command name -> handler registry.
///
/// Held behind a `RwLock` rather than plain interior state so `add_command`
/// can register new commands through a shared `Arc<Dispatcher>` — once a
/// connection task has cloned the `Arc`, `&mut Dispatcher` is unreachable,
/// but a writer lock isn't.
pub struct Dispatcher {
    registry: RwLock<HashMap<String, CommandHandler>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let mut registry = HashMap::new();
        register_builtin_commands(&mut registry);
        Dispatcher { registry: RwLock::new(registry) }
    }

    /// Register (or override) a command handler under `name`, matched
    /// case-insensitively at dispatch time. Visible to every connection
    /// already holding a clone of this `Dispatcher`'s `Arc`.
    pub fn add_command<F>(&self, name: &str, handler: F)
    where
        F: Fn(&mut Engine, &[Frame]) -> Result<Outcome, CommandError> + Send + Sync + 'static,
    {
        self.registry.write().unwrap().insert(name.to_ascii_uppercase(), Arc::new(handler));
    }

    /// Run one request frame to completion, updating `engine.stats` and
    /// always producing an `Outcome` — protocol/argument failures become
    /// `-` error replies rather than propagating up the call stack.
    pub fn dispatch(&self, engine: &mut Engine, frame: Frame) -> Outcome {
        let argv = match extract_argv(frame) {
            Ok(argv) => argv,
            Err(e) => {
                engine.stats.command_errors += 1;
                return Outcome::Reply(Frame::error(e.to_string()));
            }
        };
        let name = match &argv[0] {
            Frame::Bulk(b) => String::from_utf8_lossy(b).to_ascii_uppercase(),
            Frame::Text(s) | Frame::Simple(s) => s.to_ascii_uppercase(),
            other => {
                engine.stats.command_errors += 1;
                return Outcome::Reply(Frame::error(format!(
                    "First parameter must be command name. Received {other:?}"
                )));
            }
        };
        let Some(handler) = self.registry.read().unwrap().get(&name).cloned() else {
            engine.stats.command_errors += 1;
            return Outcome::Reply(Frame::error(format!("Unrecognized command: {name}")));
        };
        match handler(engine, &argv[1..]) {
            Ok(outcome) => {
                engine.stats.commands_processed += 1;
                outcome
            }
            Err(e) => {
                engine.stats.command_errors += 1;
                Outcome::Reply(Frame::error(e.to_string()))
            }
        }
    }
}

/// Turn a decoded request frame into `[command, args...]`. A top-level
/// array is taken as-is; a simple-text request is split on whitespace (for
/// hand-typed clients); anything else is a bad request.
fn extract_argv(frame: Frame) -> Result<Vec<Frame>, CommandError> {
    match frame {
        Frame::Array(items) => {
            if items.is_empty() {
                return Err(CommandError::BadRequest("empty command array".into()));
            }
            Ok(items)
        }
        Frame::Simple(s) => {
            let words: Vec<Frame> = s.split_whitespace().map(|w| Frame::Text(w.to_string())).collect();
            if words.is_empty() {
                return Err(CommandError::BadRequest("empty request".into()));
            }
            Ok(words)
        }
        Frame::Unknown(_) => Err(CommandError::UnknownCommand("unparseable request".into())),
        other => Err(CommandError::BadRequest(format!(
            "Unrecognized request type {other:?}"
        ))),
    }
}

// ---- argument coercion helpers -------------------------------------------------

fn arg_bytes(f: &Frame) -> Result<Vec<u8>, CommandError> {
    match f {
        Frame::Bulk(b) => Ok(b.to_vec()),
        Frame::Text(s) | Frame::Simple(s) => Ok(s.as_bytes().to_vec()),
        Frame::Int(i) => Ok(i.to_string().into_bytes()),
        other => Err(CommandError::BadRequest(format!("expected a key/string argument, got {other:?}"))),
    }
}

fn arg_string(f: &Frame) -> Result<String, CommandError> {
    match f {
        Frame::Bulk(b) => Ok(String::from_utf8_lossy(b).to_string()),
        Frame::Text(s) | Frame::Simple(s) => Ok(s.clone()),
        other => Err(CommandError::BadRequest(format!("expected a string argument, got {other:?}"))),
    }
}

fn arg_i64(f: &Frame) -> Result<i64, CommandError> {
    match f {
        Frame::Int(i) => Ok(*i),
        Frame::Text(s) | Frame::Simple(s) => s.parse().map_err(|_| CommandError::NotAnInteger),
        Frame::Bulk(b) => std::str::from_utf8(b)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(CommandError::NotAnInteger),
        _ => Err(CommandError::NotAnInteger),
    }
}

fn arg_f64(f: &Frame) -> Result<f64, CommandError> {
    match f {
        Frame::Float(n) => Ok(*n),
        Frame::Int(i) => Ok(*i as f64),
        Frame::Text(s) | Frame::Simple(s) => s.parse().map_err(|_| CommandError::NotAnInteger),
        Frame::Bulk(b) => std::str::from_utf8(b)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(CommandError::NotAnInteger),
        _ => Err(CommandError::NotAnInteger),
    }
}

fn need(args: &[Frame], n: usize) -> Result<(), CommandError> {
    if args.len() < n {
        Err(CommandError::WrongArity)
    } else {
        Ok(())
    }
}

fn scalars(args: &[Frame]) -> Result<Vec<Scalar>, CommandError> {
    args.iter().cloned().map(Scalar::from_frame).collect()
}

fn keys(args: &[Frame]) -> Result<Vec<Vec<u8>>, CommandError> {
    args.iter().map(arg_bytes).collect()
}

fn value_frame_reply(v: Value) -> Frame {
    v.into_frame()
}

fn hash_frame(map: IndexMap<Vec<u8>, Scalar>) -> Frame {
    Frame::Dict(map.into_iter().map(|(k, v)| (Frame::Bulk(Bytes::from(k)), v.into_frame())).collect())
}

macro_rules! reply {
    ($expr:expr) => {
        Ok(Outcome::Reply($expr))
    };
}

fn insert_command<F>(registry: &mut HashMap<String, CommandHandler>, name: &str, handler: F)
where
    F: Fn(&mut Engine, &[Frame]) -> Result<Outcome, CommandError> + Send + Sync + 'static,
{
    registry.insert(name.to_ascii_uppercase(), Arc::new(handler));
}

fn register_builtin_commands(d: &mut HashMap<String, CommandHandler>) {
    // ---- Queue commands ----
    insert_command(d, "LPUSH", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let n = e.store.lpush(&key, scalars(&a[1..])?)?;
        reply!(Frame::Int(n))
    });
    insert_command(d, "RPUSH", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let n = e.store.rpush(&key, scalars(&a[1..])?)?;
        reply!(Frame::Int(n))
    });
    insert_command(d, "LPOP", |e, a| {
        need(a, 1)?;
        let key = arg_bytes(&a[0])?;
        reply!(e.store.lpop(&key)?.into_frame())
    });
    insert_command(d, "RPOP", |e, a| {
        need(a, 1)?;
        let key = arg_bytes(&a[0])?;
        reply!(e.store.rpop(&key)?.into_frame())
    });
    insert_command(d, "LREM", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let value = Scalar::from_frame(a[1].clone())?;
        reply!(Frame::Int(e.store.lrem(&key, &value)?))
    });
    insert_command(d, "LLEN", |e, a| {
        need(a, 1)?;
        let key = arg_bytes(&a[0])?;
        reply!(Frame::Int(e.store.llen(&key)?))
    });
    insert_command(d, "LINDEX", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let idx = arg_i64(&a[1])?;
        reply!(e.store.lindex(&key, idx)?.into_frame())
    });
    insert_command(d, "LRANGE", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let start = arg_i64(&a[1])?;
        let stop = if a.len() > 2 { Some(arg_i64(&a[2])?) } else { None };
        let items = e.store.lrange(&key, start, stop)?;
        reply!(Frame::Array(items.into_iter().map(Scalar::into_frame).collect()))
    });
    insert_command(d, "LSET", |e, a| {
        need(a, 3)?;
        let key = arg_bytes(&a[0])?;
        let idx = arg_i64(&a[1])?;
        let value = Scalar::from_frame(a[2].clone())?;
        reply!(Frame::Int(e.store.lset(&key, idx, value)?))
    });
    insert_command(d, "LTRIM", |e, a| {
        need(a, 3)?;
        let key = arg_bytes(&a[0])?;
        let start = arg_i64(&a[1])?;
        let stop = arg_i64(&a[2])?;
        reply!(Frame::Int(e.store.ltrim(&key, start, stop)?))
    });
    insert_command(d, "RPOPLPUSH", |e, a| {
        need(a, 2)?;
        let src = arg_bytes(&a[0])?;
        let dest = arg_bytes(&a[1])?;
        reply!(Frame::Int(e.store.rpoplpush(&src, &dest)?))
    });
    insert_command(d, "LFLUSH", |e, a| {
        need(a, 1)?;
        let key = arg_bytes(&a[0])?;
        reply!(Frame::Int(e.store.lflush(&key)?))
    });

    // ---- Hash commands ----
    insert_command(d, "HSET", |e, a| {
        need(a, 3)?;
        let key = arg_bytes(&a[0])?;
        let field = arg_bytes(&a[1])?;
        let value = Scalar::from_frame(a[2].clone())?;
        reply!(Frame::Int(e.store.hset(&key, field, value)?))
    });
    insert_command(d, "HSETNX", |e, a| {
        need(a, 3)?;
        let key = arg_bytes(&a[0])?;
        let field = arg_bytes(&a[1])?;
        let value = Scalar::from_frame(a[2].clone())?;
        reply!(Frame::Int(e.store.hsetnx(&key, field, value)?))
    });
    insert_command(d, "HMSET", |e, a| {
        need(a, 3)?;
        if (a.len() - 1) % 2 != 0 {
            return Err(CommandError::WrongArity);
        }
        let key = arg_bytes(&a[0])?;
        let mut pairs = Vec::new();
        let mut rest = a[1..].iter();
        while let (Some(f), Some(v)) = (rest.next(), rest.next()) {
            pairs.push((arg_bytes(f)?, Scalar::from_frame(v.clone())?));
        }
        reply!(Frame::Int(e.store.hmset(&key, pairs)?))
    });
    insert_command(d, "HGET", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let field = arg_bytes(&a[1])?;
        reply!(e.store.hget(&key, &field)?.map(Scalar::into_frame).unwrap_or(Frame::Null))
    });
    insert_command(d, "HMGET", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let fields = keys(&a[1..])?;
        let got = e.store.hmget(&key, fields)?;
        let dict = got
            .into_iter()
            .map(|(f, v)| (Frame::Bulk(Bytes::from(f)), v.map(Scalar::into_frame).unwrap_or(Frame::Null)))
            .collect();
        reply!(Frame::Dict(dict))
    });
    insert_command(d, "HGETALL", |e, a| {
        need(a, 1)?;
        let key = arg_bytes(&a[0])?;
        reply!(hash_frame(e.store.hgetall(&key)?))
    });
    insert_command(d, "HKEYS", |e, a| {
        need(a, 1)?;
        let key = arg_bytes(&a[0])?;
        let ks = e.store.hkeys(&key)?;
        reply!(Frame::Array(ks.into_iter().map(|k| Frame::Bulk(Bytes::from(k))).collect()))
    });
    insert_command(d, "HVALS", |e, a| {
        need(a, 1)?;
        let key = arg_bytes(&a[0])?;
        let vs = e.store.hvals(&key)?;
        reply!(Frame::Array(vs.into_iter().map(Scalar::into_frame).collect()))
    });
    insert_command(d, "HLEN", |e, a| {
        need(a, 1)?;
        let key = arg_bytes(&a[0])?;
        reply!(Frame::Int(e.store.hlen(&key)?))
    });
    insert_command(d, "HEXISTS", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let field = arg_bytes(&a[1])?;
        reply!(Frame::Int(e.store.hexists(&key, &field)?))
    });
    insert_command(d, "HDEL", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let field = arg_bytes(&a[1])?;
        reply!(Frame::Int(e.store.hdel(&key, &field)?))
    });
    insert_command(d, "HINCRBY", |e, a| {
        need(a, 3)?;
        let key = arg_bytes(&a[0])?;
        let field = arg_bytes(&a[1])?;
        let n = arg_i64(&a[2])?;
        reply!(e.store.hincrby(&key, &field, n)?.into_frame())
    });

    // ---- Set commands ----
    insert_command(d, "SADD", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        reply!(Frame::Int(e.store.sadd(&key, scalars(&a[1..])?)?))
    });
    insert_command(d, "SCARD", |e, a| {
        need(a, 1)?;
        let key = arg_bytes(&a[0])?;
        reply!(Frame::Int(e.store.scard(&key)?))
    });
    insert_command(d, "SISMEMBER", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let member = Scalar::from_frame(a[1].clone())?;
        reply!(Frame::Int(e.store.sismember(&key, &member)?))
    });
    insert_command(d, "SMEMBERS", |e, a| {
        need(a, 1)?;
        let key = arg_bytes(&a[0])?;
        let members = e.store.smembers(&key)?;
        reply!(Frame::Set(members.into_iter().map(Scalar::into_frame).collect()))
    });
    insert_command(d, "SPOP", |e, a| {
        need(a, 1)?;
        let key = arg_bytes(&a[0])?;
        let n = if a.len() > 1 { arg_i64(&a[1])?.max(0) as usize } else { 1 };
        let popped = e.store.spop(&key, n)?;
        reply!(Frame::Array(popped.into_iter().map(Scalar::into_frame).collect()))
    });
    insert_command(d, "SREM", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let members = scalars(&a[1..])?;
        reply!(Frame::Int(e.store.srem(&key, &members)?))
    });
    insert_command(d, "SDIFF", |e, a| {
        need(a, 1)?;
        let ks = keys(a)?;
        reply!(Frame::Array(e.store.sdiff(&ks)?.into_iter().map(Scalar::into_frame).collect()))
    });
    insert_command(d, "SINTER", |e, a| {
        need(a, 1)?;
        let ks = keys(a)?;
        reply!(Frame::Array(e.store.sinter(&ks)?.into_iter().map(Scalar::into_frame).collect()))
    });
    insert_command(d, "SUNION", |e, a| {
        need(a, 1)?;
        let ks = keys(a)?;
        reply!(Frame::Array(e.store.sunion(&ks)?.into_iter().map(Scalar::into_frame).collect()))
    });
    insert_command(d, "SDIFFSTORE", |e, a| {
        need(a, 2)?;
        let dest = arg_bytes(&a[0])?;
        let ks = keys(&a[1..])?;
        reply!(Frame::Int(e.store.sdiffstore(&dest, &ks)?))
    });
    insert_command(d, "SINTERSTORE", |e, a| {
        need(a, 2)?;
        let dest = arg_bytes(&a[0])?;
        let ks = keys(&a[1..])?;
        reply!(Frame::Int(e.store.sinterstore(&dest, &ks)?))
    });
    insert_command(d, "SUNIONSTORE", |e, a| {
        need(a, 2)?;
        let dest = arg_bytes(&a[0])?;
        let ks = keys(&a[1..])?;
        reply!(Frame::Int(e.store.sunionstore(&dest, &ks)?))
    });

    // ---- KV commands ----
    insert_command(d, "SET", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let value = Value::from_frame(a[1].clone())?;
        reply!(Frame::Int(e.store.kv_set(&key, value)?))
    });
    insert_command(d, "SETNX", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let value = Value::from_frame(a[1].clone())?;
        reply!(Frame::Int(e.store.kv_setnx(&key, value)?))
    });
    insert_command(d, "SETEX", |e, a| {
        need(a, 3)?;
        let key = arg_bytes(&a[0])?;
        let ttl = arg_f64(&a[1])?;
        let value = Value::from_frame(a[2].clone())?;
        reply!(Frame::Int(e.store.kv_setex(&key, ttl, value)?))
    });
    insert_command(d, "GET", |e, a| {
        need(a, 1)?;
        let key = arg_bytes(&a[0])?;
        reply!(e.store.kv_get(&key)?.map(value_frame_reply).unwrap_or(Frame::Null))
    });
    insert_command(d, "GETSET", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let value = Value::from_frame(a[1].clone())?;
        reply!(e.store.kv_getset(&key, value)?.map(value_frame_reply).unwrap_or(Frame::Null))
    });
    insert_command(d, "DELETE", |e, a| {
        need(a, 1)?;
        let key = arg_bytes(&a[0])?;
        reply!(Frame::Int(e.store.kv_delete(&key)?))
    });
    insert_command(d, "MDELETE", |e, a| {
        need(a, 1)?;
        let ks = keys(a)?;
        reply!(Frame::Int(e.store.kv_mdelete(&ks)?))
    });
    insert_command(d, "EXISTS", |e, a| {
        need(a, 1)?;
        let key = arg_bytes(&a[0])?;
        reply!(Frame::Int(e.store.kv_exists(&key)?))
    });
    insert_command(d, "MGET", |e, a| {
        need(a, 1)?;
        let ks = keys(a)?;
        let got = e.store.kv_mget(&ks)?;
        reply!(Frame::Array(got.into_iter().map(|v| v.map(value_frame_reply).unwrap_or(Frame::Null)).collect()))
    });
    insert_command(d, "MSET", |e, a| {
        need(a, 2)?;
        if a.len() % 2 != 0 {
            return Err(CommandError::WrongArity);
        }
        let mut pairs = Vec::new();
        let mut rest = a.iter();
        while let (Some(k), Some(v)) = (rest.next(), rest.next()) {
            pairs.push((arg_bytes(k)?, Value::from_frame(v.clone())?));
        }
        reply!(Frame::Int(e.store.kv_mset(pairs)?))
    });
    insert_command(d, "MSETEX", |e, a| {
        need(a, 3)?;
        let ttl = arg_f64(&a[0])?;
        if (a.len() - 1) % 2 != 0 {
            return Err(CommandError::WrongArity);
        }
        let mut pairs = Vec::new();
        let mut rest = a[1..].iter();
        while let (Some(k), Some(v)) = (rest.next(), rest.next()) {
            pairs.push((arg_bytes(k)?, Value::from_frame(v.clone())?));
        }
        reply!(Frame::Int(e.store.kv_msetex(ttl, pairs)?))
    });
    insert_command(d, "POP", |e, a| {
        need(a, 1)?;
        let key = arg_bytes(&a[0])?;
        reply!(e.store.kv_pop(&key)?.map(value_frame_reply).unwrap_or(Frame::Null))
    });
    insert_command(d, "MPOP", |e, a| {
        need(a, 1)?;
        let ks = keys(a)?;
        let got = e.store.kv_mpop(&ks)?;
        reply!(Frame::Array(got.into_iter().map(|v| v.map(value_frame_reply).unwrap_or(Frame::Null)).collect()))
    });
    insert_command(d, "LEN", |_e, a| {
        need(a, 0)?;
        reply!(Frame::Int(_e.store.kv_len()))
    });
    insert_command(d, "FLUSH", |e, _a| reply!(Frame::Int(e.store.kv_flush())));
    insert_command(d, "INCR", |e, a| {
        need(a, 1)?;
        let key = arg_bytes(&a[0])?;
        reply!(e.store.kv_incr(&key)?.into_frame())
    });
    insert_command(d, "DECR", |e, a| {
        need(a, 1)?;
        let key = arg_bytes(&a[0])?;
        reply!(e.store.kv_decr(&key)?.into_frame())
    });
    insert_command(d, "INCRBY", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let n = arg_i64(&a[1])?;
        reply!(e.store.kv_incrby(&key, n)?.into_frame())
    });
    insert_command(d, "DECRBY", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let n = arg_i64(&a[1])?;
        reply!(e.store.kv_decrby(&key, n)?.into_frame())
    });
    insert_command(d, "APPEND", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let incoming = Value::from_frame(a[1].clone())?;
        reply!(e.store.kv_append(&key, incoming)?.into_frame())
    });

    // ---- Schedule commands ----
    insert_command(d, "ADD", |e, a| {
        need(a, 2)?;
        let ts = parse_timestamp(&arg_string(&a[0])?)?;
        let payload = Value::from_frame(a[1].clone())?;
        reply!(Frame::Int(e.store.schedule_add(ts, payload)?))
    });
    insert_command(d, "READ", |e, a| {
        need(a, 1)?;
        let ts = parse_timestamp(&arg_string(&a[0])?)?;
        let due = e.store.schedule_read(ts);
        reply!(Frame::Array(due.into_iter().map(|item| item.payload.into_frame()).collect()))
    });
    insert_command(d, "FLUSH_SCHEDULE", |e, _a| reply!(Frame::Int(e.store.schedule_flush())));
    insert_command(d, "LENGTH_SCHEDULE", |e, _a| reply!(Frame::Int(e.store.schedule_length())));

    // ---- Misc commands ----
    insert_command(d, "EXPIRE", |e, a| {
        need(a, 2)?;
        let key = arg_bytes(&a[0])?;
        let ttl = arg_f64(&a[1])?;
        e.store.expire(&key, ttl);
        reply!(Frame::Int(1))
    });
    insert_command(d, "INFO", |e, _a| {
        let pairs = vec![
            (Frame::Simple("active_connections".into()), Frame::Int(e.stats.active_connections as i64)),
            (Frame::Simple("commands_processed".into()), Frame::Int(e.stats.commands_processed as i64)),
            (Frame::Simple("command_errors".into()), Frame::Int(e.stats.command_errors as i64)),
            (Frame::Simple("connections".into()), Frame::Int(e.stats.connections as i64)),
            (Frame::Simple("keys".into()), Frame::Int(e.store.len() as i64)),
            (Frame::Simple("timestamp".into()), Frame::Float(Store::now())),
        ];
        reply!(Frame::Dict(pairs))
    });
    insert_command(d, "FLUSHALL", |e, _a| {
        e.store.flush_all();
        reply!(Frame::Int(1))
    });
    insert_command(d, "SAVE", |e, a| {
        need(a, 1)?;
        let path = PathBuf::from(arg_string(&a[0])?);
        snapshot::save(&e.store, &path).map_err(|err| CommandError::Io(err.to_string()))?;
        reply!(Frame::Int(1))
    });
    insert_command(d, "RESTORE", |e, a| {
        need(a, 1)?;
        let path = PathBuf::from(arg_string(&a[0])?);
        let ok = snapshot::restore(&mut e.store, &path).map_err(|err| CommandError::Io(err.to_string()))?;
        reply!(Frame::Int(if ok { 1 } else { 0 }))
    });
    insert_command(d, "MERGE", |e, a| {
        need(a, 1)?;
        let path = PathBuf::from(arg_string(&a[0])?);
        let ok = snapshot::merge(&mut e.store, &path).map_err(|err| CommandError::Io(err.to_string()))?;
        reply!(Frame::Int(if ok { 1 } else { 0 }))
    });
    insert_command(d, "QUIT", |_e, _a| Ok(Outcome::Quit(Frame::Int(1))));
    insert_command(d, "SHUTDOWN", |_e, _a| Ok(Outcome::Shutdown(Frame::Int(1))));
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn engine() -> Engine {
        Engine::default()
    }

    fn run(d: &Dispatcher, e: &mut Engine, argv: Vec<Frame>) -> Frame {
        match d.dispatch(e, Frame::Array(argv)) {
            Outcome::Reply(f) => f,
            Outcome::Quit(f) => f,
            Outcome::Shutdown(f) => f,
        }
    }

    #[test]
    fn set_then_get() {
        let d = Dispatcher::new();
        let mut e = engine();
        run(&d, &mut e, vec![Frame::text("SET"), Frame::bulk(Bytes::from_static(b"k")), Frame::Int(5)]);
        let got = run(&d, &mut e, vec![Frame::text("GET"), Frame::bulk(Bytes::from_static(b"k"))]);
        assert_eq!(got, Frame::Int(5));
    }

    #[test]
    fn unknown_command_is_an_error_reply() {
        let d = Dispatcher::new();
        let mut e = engine();
        let got = run(&d, &mut e, vec![Frame::text("NOPE")]);
        assert!(matches!(got, Frame::Error(_)));
        assert_eq!(e.stats.command_errors, 1);
    }

    #[test]
    fn quit_is_not_counted_as_an_error() {
        let d = Dispatcher::new();
        let mut e = engine();
        match d.dispatch(&mut e, Frame::Array(vec![Frame::text("QUIT")])) {
            Outcome::Quit(Frame::Int(1)) => {}
            _ => panic!("expected Quit(1)"),
        }
        assert_eq!(e.stats.command_errors, 0);
        assert_eq!(e.stats.commands_processed, 1);
    }

    #[test]
    fn wrong_type_becomes_error_frame() {
        let d = Dispatcher::new();
        let mut e = engine();
        run(&d, &mut e, vec![Frame::text("SET"), Frame::bulk(Bytes::from_static(b"k")), Frame::Int(1)]);
        let got = run(&d, &mut e, vec![Frame::text("LPUSH"), Frame::bulk(Bytes::from_static(b"k")), Frame::Int(1)]);
        assert!(matches!(got, Frame::Error(_)));
    }

    #[test]
    fn simple_text_request_splits_on_whitespace() {
        let d = Dispatcher::new();
        let mut e = engine();
        let got = d.dispatch(&mut e, Frame::Simple("INFO".into()));
        assert!(matches!(got, Outcome::Reply(Frame::Dict(_))));
    }

    #[test]
    fn add_command_extension_point_overrides() {
        let d = Dispatcher::new();
        d.add_command("PING", |_e, _a| Ok(Outcome::Reply(Frame::Simple("PONG".into()))));
        let mut e = engine();
        let got = run(&d, &mut e, vec![Frame::text("PING")]);
        assert_eq!(got, Frame::Simple("PONG".into()));
    }

    #[test]
    fn add_command_is_visible_through_a_shared_arc() {
        let d = Arc::new(Dispatcher::new());
        let d_writer = d.clone();
        d_writer.add_command("PING", |_e, _a| Ok(Outcome::Reply(Frame::Simple("PONG".into()))));
        let mut e = engine();
        let got = run(&d, &mut e, vec![Frame::text("PING")]);
        assert_eq!(got, Frame::Simple("PONG".into()));
    }
}
