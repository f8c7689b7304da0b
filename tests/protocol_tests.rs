//! Protocol-level integration tests: round-trip encode/decode across the
//! full frame grammar, including pipelining and partial-read behavior.

use bytes::BytesMut;
use kvault::protocol::{Frame, FrameCodec};
use kvault::FrameError;
use tokio_util::codec::{Decoder, Encoder};

fn roundtrip(frame: Frame) -> Frame {
    let mut codec = FrameCodec;
    let mut buf = BytesMut::new();
    codec.encode(frame, &mut buf).unwrap();
    codec.decode(&mut buf).unwrap().unwrap()
}

#[test]
fn simple_and_error_roundtrip() {
    assert_eq!(roundtrip(Frame::Simple("OK".into())), Frame::Simple("OK".into()));
    assert_eq!(roundtrip(Frame::Error("boom".into())), Frame::Error("boom".into()));
}

#[test]
fn integers_and_floats_roundtrip_including_whole_numbers() {
    assert_eq!(roundtrip(Frame::Int(-42)), Frame::Int(-42));
    assert_eq!(roundtrip(Frame::Float(3.25)), Frame::Float(3.25));
    assert_eq!(roundtrip(Frame::Float(5.0)), Frame::Float(5.0));
}

#[test]
fn bulk_and_text_roundtrip() {
    assert_eq!(roundtrip(Frame::Bulk(b"\x00\x01binary".to_vec().into())), Frame::Bulk(b"\x00\x01binary".to_vec().into()));
    assert_eq!(roundtrip(Frame::Text("hello world".into())), Frame::Text("hello world".into()));
}

#[test]
fn null_roundtrips() {
    assert_eq!(roundtrip(Frame::Null), Frame::Null);
}

#[test]
fn json_roundtrips() {
    let mut obj = serde_json::Map::new();
    obj.insert("a".to_string(), serde_json::json!(1));
    let frame = Frame::Json(serde_json::Value::Object(obj));
    assert_eq!(roundtrip(frame.clone()), frame);
}

#[test]
fn nested_array_of_dicts_and_sets_roundtrips() {
    let frame = Frame::Array(vec![
        Frame::Dict(vec![(Frame::Text("k".into()), Frame::Int(1))]),
        Frame::Set(vec![Frame::Int(1), Frame::Int(2), Frame::Int(1)]),
        Frame::Array(vec![Frame::Null, Frame::Float(1.5)]),
    ]);
    let got = roundtrip(frame);
    match got {
        Frame::Array(items) => {
            assert_eq!(items.len(), 3);
            match &items[1] {
                Frame::Set(members) => assert_eq!(members.len(), 2, "set decode should deduplicate"),
                other => panic!("expected Set, got {other:?}"),
            }
        }
        other => panic!("expected Array, got {other:?}"),
    }
}

#[test]
fn deeply_nested_array_roundtrips() {
    let mut frame = Frame::Int(7);
    for _ in 0..32 {
        frame = Frame::Array(vec![frame]);
    }
    let got = roundtrip(frame);
    let mut cur = got;
    for _ in 0..32 {
        match cur {
            Frame::Array(mut items) => {
                assert_eq!(items.len(), 1);
                cur = items.pop().unwrap();
            }
            other => panic!("expected Array, got {other:?}"),
        }
    }
    assert_eq!(cur, Frame::Int(7));
}

#[test]
fn incomplete_frame_consumes_nothing_and_waits_for_more_bytes() {
    let mut codec = FrameCodec;
    let mut buf = BytesMut::from(&b"*2\r\n$3\r\nSET\r\n"[..]);
    assert_eq!(codec.decode(&mut buf).unwrap(), None);
    assert!(!buf.is_empty(), "partial frame must remain buffered");

    buf.extend_from_slice(b"$1\r\nk\r\n");
    let frame = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(frame, Frame::Array(vec![Frame::Bulk(b"SET".to_vec().into()), Frame::Bulk(b"k".to_vec().into())]));
    assert!(buf.is_empty());
}

#[test]
fn pipelined_frames_decode_one_at_a_time() {
    let mut codec = FrameCodec;
    let mut buf = BytesMut::from(&b":1\r\n:2\r\n:3\r\n"[..]);
    assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Int(1)));
    assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Int(2)));
    assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Int(3)));
    assert_eq!(codec.decode(&mut buf).unwrap(), None);
}

#[test]
fn eof_with_empty_buffer_is_none_not_error() {
    let mut codec = FrameCodec;
    let mut buf = BytesMut::new();
    assert_eq!(codec.decode(&mut buf).unwrap(), None);
}

#[test]
fn unknown_tag_is_reported_without_panicking() {
    let mut codec = FrameCodec;
    let mut buf = BytesMut::from(&b"?weird\r\n"[..]);
    let err = codec.decode(&mut buf);
    assert!(err.is_err());
}

#[test]
fn bad_length_prefix_is_a_decode_error() {
    let mut codec = FrameCodec;
    let mut buf = BytesMut::from(&b"$abc\r\nxyz\r\n"[..]);
    match codec.decode(&mut buf) {
        Err(FrameError::BadLength(_)) => {}
        other => panic!("expected BadLength, got {other:?}"),
    }
}

#[test]
fn dict_preserves_key_order() {
    let frame = Frame::Dict(vec![
        (Frame::Text("z".into()), Frame::Int(1)),
        (Frame::Text("a".into()), Frame::Int(2)),
        (Frame::Text("m".into()), Frame::Int(3)),
    ]);
    match roundtrip(frame) {
        Frame::Dict(pairs) => {
            let keys: Vec<String> = pairs
                .into_iter()
                .map(|(k, _)| match k {
                    Frame::Text(s) => s,
                    other => panic!("unexpected key frame {other:?}"),
                })
                .collect();
            assert_eq!(keys, vec!["z", "a", "m"]);
        }
        other => panic!("expected Dict, got {other:?}"),
    }
}
