//! WASM-target tests for chat-core.
//!
//! Runs the chunk decoder, SSE codec, transport accumulator, and EventBus
//! under wasm32-unknown-unknown via `wasm-pack test --node`.

#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::*;

use chat_core::chunk::{decode_chunks, ChunkDecoder};
use chat_core::event_bus::EventBus;
use chat_core::sse::{encode_done, encode_payload, parse_line, LineSplitter, SseEvent};
use chat_core::transport::{accumulate, TransportUpdate};
use chat_types::event::SessionEvent;
use chat_types::stream::StreamPayload;

use futures::stream::{self, StreamExt};

// ─── ChunkDecoder Tests ──────────────────────────────────

#[wasm_bindgen_test]
fn chunk_decoder_split_sequence() {
    let bytes = "日本".as_bytes();
    let mut decoder = ChunkDecoder::new();
    let mut text = decoder.decode(&bytes[..2]);
    text.push_str(&decoder.decode(&bytes[2..4]));
    text.push_str(&decoder.decode(&bytes[4..]));
    assert_eq!(text, "日本");
}

#[wasm_bindgen_test]
fn decode_chunks_joins_pieces() {
    assert_eq!(decode_chunks(vec!["Hel", "lo"]), "Hello");
}

// ─── SSE Codec Tests ─────────────────────────────────────

#[wasm_bindgen_test]
fn sse_encode_then_parse() {
    let line = encode_payload(&StreamPayload::content("hi")).unwrap();
    let mut lines = LineSplitter::new();
    let complete = lines.push(line.as_bytes());
    assert_eq!(
        parse_line(&complete[0]),
        Some(SseEvent::Payload(StreamPayload::content("hi")))
    );
    assert_eq!(parse_line(encode_done().trim_end().as_bytes()), Some(SseEvent::Done));
}

// ─── Transport Tests ─────────────────────────────────────

#[wasm_bindgen_test]
async fn accumulate_progression() {
    let body: Vec<chat_types::Result<Vec<u8>>> = vec![
        Ok(b"data: {\"content\":\"Hel\"}\n\ndata: {\"con".to_vec()),
        Ok(b"tent\":\"lo\"}\n\n".to_vec()),
    ];
    let updates: Vec<_> = accumulate(stream::iter(body).boxed_local()).collect().await;
    assert_eq!(
        updates,
        vec![
            Ok(TransportUpdate::Text("Hel".to_string())),
            Ok(TransportUpdate::Text("Hello".to_string())),
            Ok(TransportUpdate::Done("Hello".to_string())),
        ]
    );
}

// ─── EventBus Tests ──────────────────────────────────────

#[wasm_bindgen_test]
fn event_bus_emit_and_drain() {
    let bus = EventBus::new();
    bus.emit(SessionEvent::ThreadCleared);
    assert!(bus.has_pending());
    assert_eq!(bus.drain().len(), 1);
    assert!(!bus.has_pending());
}
