//! Wire Frame Format
//!
//! A recursive, self-describing line-oriented protocol. Every frame starts
//! with a one-byte tag that selects its shape; most bodies are terminated by
//! `\r\n`, and the container tags (`*`, `%`, `&`) are followed by that many
//! nested frames (pairs, for `%`).
//!
//! ```text
//! +text\r\n            simple text
//! -message\r\n          error
//! :123\r\n              integer (no '.')
//! :1.5\r\n              float (has '.')
//! $5\r\nhello\r\n       bulk bytes
//! $-1\r\n               null
//! ^5\r\nhello\r\n       bulk unicode text
//! @13\r\n{"a": true}\r\n json
//! *2\r\n<f1><f2>        array
//! %1\r\n<k><v>          dict (pair count, not frame count)
//! &2\r\n<f1><f2>        set (duplicates collapse on decode)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Frame parsing/serialization errors.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed length prefix: {0:?}")]
    BadLength(Vec<u8>),

    #[error("malformed integer body: {0:?}")]
    BadInteger(Vec<u8>),

    #[error("invalid utf-8 in bulk unicode frame")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("invalid json payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("simple text may not contain a line break")]
    EmbeddedNewline,

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// A decoded wire frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `+` simple text, no embedded CR/LF.
    Simple(String),
    /// `-` error message.
    Error(String),
    /// `:` integer body.
    Int(i64),
    /// `:` float body (always carries a '.').
    Float(f64),
    /// `$` raw bytes.
    Bulk(Bytes),
    /// `^` UTF-8 text.
    Text(String),
    /// `@` JSON-decoded value.
    Json(serde_json::Value),
    /// `*` ordered sequence of frames.
    Array(Vec<Frame>),
    /// `%` ordered key/value pairs.
    Dict(Vec<(Frame, Frame)>),
    /// `&` deduplicated collection of frames.
    Set(Vec<Frame>),
    /// `$-1` the null bulk frame.
    Null,
    /// An unrecognized leading tag byte. The decoder resynchronizes by
    /// reading to the next `\r\n` and hands the raw tag+line back up so the
    /// dispatcher can report it as an unknown command.
    Unknown(String),
}

impl Frame {
    pub fn array(items: Vec<Frame>) -> Frame {
        Frame::Array(items)
    }

    pub fn bulk(bytes: impl Into<Bytes>) -> Frame {
        Frame::Bulk(bytes.into())
    }

    pub fn text(s: impl Into<String>) -> Frame {
        Frame::Text(s.into())
    }

    pub fn error(msg: impl Into<String>) -> Frame {
        Frame::Error(msg.into())
    }
}

/// Tokio codec for the wire frame grammar.
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        let mut pos = 0usize;
        match parse_frame(src, &mut pos)? {
            Some(frame) => {
                src.advance(pos);
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_frame(&item, dst)
    }
}

/// Parse one frame starting at `*pos` in `buf`. Returns `Ok(None)` if the
/// buffer doesn't yet hold a complete frame; `*pos` is reset to its value on
/// entry so a retry after more data arrives reparses cleanly from scratch.
fn parse_frame(buf: &[u8], pos: &mut usize) -> Result<Option<Frame>, FrameError> {
    let start = *pos;
    if *pos >= buf.len() {
        return Ok(None);
    }
    let tag = buf[*pos];
    *pos += 1;

    macro_rules! need {
        ($opt:expr) => {
            match $opt {
                Some(v) => v,
                None => {
                    *pos = start;
                    return Ok(None);
                }
            }
        };
    }

    let frame = match tag {
        b'+' => Frame::Simple(need!(read_line(buf, pos)?)),
        b'-' => Frame::Error(need!(read_line(buf, pos)?)),
        b':' => {
            let line = need!(read_line(buf, pos)?);
            parse_number(&line)?
        }
        b'$' => match need!(read_bulk(buf, pos)?) {
            Some(bytes) => Frame::Bulk(bytes),
            None => Frame::Null,
        },
        b'^' => match need!(read_bulk(buf, pos)?) {
            Some(bytes) => Frame::Text(std::str::from_utf8(&bytes)?.to_string()),
            None => Frame::Null,
        },
        b'@' => match need!(read_bulk(buf, pos)?) {
            Some(bytes) => Frame::Json(serde_json::from_slice(&bytes)?),
            None => Frame::Null,
        },
        b'*' => {
            let line = need!(read_line(buf, pos)?);
            let count = parse_count(&line)?;
            let mut items = Vec::with_capacity(count.min(4096));
            for _ in 0..count {
                items.push(need!(parse_frame(buf, pos)?));
            }
            Frame::Array(items)
        }
        b'%' => {
            let line = need!(read_line(buf, pos)?);
            let pairs = parse_count(&line)?;
            let mut items = Vec::with_capacity(pairs.min(4096));
            for _ in 0..pairs {
                let key = need!(parse_frame(buf, pos)?);
                let value = need!(parse_frame(buf, pos)?);
                items.push((key, value));
            }
            Frame::Dict(items)
        }
        b'&' => {
            let line = need!(read_line(buf, pos)?);
            let count = parse_count(&line)?;
            let mut items: Vec<Frame> = Vec::with_capacity(count.min(4096));
            for _ in 0..count {
                let item = need!(parse_frame(buf, pos)?);
                if !items.contains(&item) {
                    items.push(item);
                }
            }
            Frame::Set(items)
        }
        other => {
            let rest = need!(read_line(buf, pos)?);
            Frame::Unknown(format!("{}{}", other as char, rest))
        }
    };

    Ok(Some(frame))
}

/// Read up to (and consuming) the next `\r\n`. Returns `None` if no
/// terminator is present yet in the buffer.
fn read_line(buf: &[u8], pos: &mut usize) -> Result<Option<String>, FrameError> {
    let rest = &buf[*pos..];
    match find_crlf(rest) {
        Some(idx) => {
            let line = std::str::from_utf8(&rest[..idx])?.to_string();
            *pos += idx + 2;
            Ok(Some(line))
        }
        None => Ok(None),
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Read a `$`-style length-prefixed body: the length line, then exactly that
/// many bytes plus a trailing `\r\n`. A length of `-1` means null.
fn read_bulk(buf: &[u8], pos: &mut usize) -> Result<Option<Option<Bytes>>, FrameError> {
    let line = match read_line(buf, pos)? {
        Some(l) => l,
        None => return Ok(None),
    };
    let len: i64 = line
        .parse()
        .map_err(|_| FrameError::BadLength(line.clone().into_bytes()))?;
    if len == -1 {
        return Ok(Some(None));
    }
    if len < 0 {
        return Err(FrameError::BadLength(line.into_bytes()));
    }
    let len = len as usize;
    if buf.len() < *pos + len + 2 {
        return Ok(None);
    }
    let data = Bytes::copy_from_slice(&buf[*pos..*pos + len]);
    *pos += len + 2;
    Ok(Some(Some(data)))
}

fn parse_count(line: &str) -> Result<usize, FrameError> {
    line.parse()
        .map_err(|_| FrameError::BadLength(line.as_bytes().to_vec()))
}

fn parse_number(line: &str) -> Result<Frame, FrameError> {
    if line.contains('.') {
        line.parse::<f64>()
            .map(Frame::Float)
            .map_err(|_| FrameError::BadInteger(line.as_bytes().to_vec()))
    } else {
        line.parse::<i64>()
            .map(Frame::Int)
            .map_err(|_| FrameError::BadInteger(line.as_bytes().to_vec()))
    }
}

/// Serialize `frame` into `dst` per the tag table above.
fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
    match frame {
        Frame::Simple(s) => {
            if s.contains('\r') || s.contains('\n') {
                return Err(FrameError::EmbeddedNewline);
            }
            dst.put_u8(b'+');
            dst.extend_from_slice(s.as_bytes());
            dst.extend_from_slice(b"\r\n");
        }
        Frame::Error(msg) => {
            dst.put_u8(b'-');
            dst.extend_from_slice(msg.as_bytes());
            dst.extend_from_slice(b"\r\n");
        }
        Frame::Int(n) => {
            dst.put_u8(b':');
            dst.extend_from_slice(n.to_string().as_bytes());
            dst.extend_from_slice(b"\r\n");
        }
        Frame::Float(f) => {
            dst.put_u8(b':');
            dst.extend_from_slice(format_float(*f).as_bytes());
            dst.extend_from_slice(b"\r\n");
        }
        Frame::Bulk(bytes) => encode_bulk(dst, b'$', Some(bytes.as_ref())),
        Frame::Text(s) => encode_bulk(dst, b'^', Some(s.as_bytes())),
        Frame::Json(value) => {
            let encoded = serde_json::to_vec(value)?;
            encode_bulk(dst, b'@', Some(&encoded));
        }
        Frame::Array(items) => {
            dst.put_u8(b'*');
            dst.extend_from_slice(items.len().to_string().as_bytes());
            dst.extend_from_slice(b"\r\n");
            for item in items {
                encode_frame(item, dst)?;
            }
        }
        Frame::Dict(pairs) => {
            dst.put_u8(b'%');
            dst.extend_from_slice(pairs.len().to_string().as_bytes());
            dst.extend_from_slice(b"\r\n");
            for (k, v) in pairs {
                encode_frame(k, dst)?;
                encode_frame(v, dst)?;
            }
        }
        Frame::Set(items) => {
            dst.put_u8(b'&');
            dst.extend_from_slice(items.len().to_string().as_bytes());
            dst.extend_from_slice(b"\r\n");
            for item in items {
                encode_frame(item, dst)?;
            }
        }
        Frame::Null => encode_bulk(dst, b'$', None::<&[u8]>),
        Frame::Unknown(raw) => {
            dst.extend_from_slice(raw.as_bytes());
            dst.extend_from_slice(b"\r\n");
        }
    }
    Ok(())
}

fn encode_bulk(dst: &mut BytesMut, tag: u8, body: Option<&[u8]>) {
    dst.put_u8(tag);
    match body {
        Some(b) => {
            dst.extend_from_slice(b.len().to_string().as_bytes());
            dst.extend_from_slice(b"\r\n");
            dst.extend_from_slice(b);
            dst.extend_from_slice(b"\r\n");
        }
        None => dst.extend_from_slice(b"-1\r\n"),
    }
}

/// Format a float so its body always contains a '.', which is how the
/// decoder distinguishes floats from integers on the wire.
fn format_float(f: f64) -> String {
    let s = format!("{f}");
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        format!("{s}.0")
    }
}
