//! Browser `fetch` helpers shared by the HTTP adapters.
//!
//! Uses gloo-net for the request and reads the response body through the
//! Streams API (`ReadableStreamDefaultReader`) so callers see each increment
//! as it arrives instead of the whole body at the end.

use futures::stream;
use gloo_net::http::{Request, Response};
use js_sys::{Reflect, Uint8Array};
use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::ReadableStreamDefaultReader;

use chat_core::ports::ByteStream;
use chat_types::{ChatError, Result};

/// Header naming the calling application
pub const APP_HEADER: &str = "x-app";

fn js_error(context: &str, value: JsValue) -> ChatError {
    ChatError::JsInterop(format!("{}: {:?}", context, value))
}

/// POST a JSON body.
pub async fn post_json(url: &str, app: &str, body: &impl Serialize) -> Result<Response> {
    Request::post(url)
        .header("Content-Type", "application/json")
        .header(APP_HEADER, app)
        .json(body)
        .map_err(|e| ChatError::Serialization(e.to_string()))?
        .send()
        .await
        .map_err(|e| ChatError::Network(e.to_string()))
}

/// Non-2xx responses become `ChatError::Http` carrying the body text.
pub async fn check_status(response: Response) -> Result<Response> {
    if response.ok() {
        return Ok(response);
    }
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| response.status_text());
    log::warn!("HTTP {} from {}", status, response.url());
    Err(ChatError::Http { status, body })
}

/// Owns the reader; cancels the underlying fetch if dropped before the end.
struct BodyReader {
    reader: ReadableStreamDefaultReader,
    done: bool,
}

impl BodyReader {
    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>>> {
        if self.done {
            return None;
        }
        let result = match JsFuture::from(self.reader.read()).await {
            Ok(result) => result,
            Err(e) => {
                self.done = true;
                return Some(Err(ChatError::Network(format!("body read failed: {:?}", e))));
            }
        };

        let done = Reflect::get(&result, &JsValue::from_str("done"))
            .map(|v| v.as_bool().unwrap_or(false))
            .unwrap_or(true);
        if done {
            self.done = true;
            return None;
        }

        match Reflect::get(&result, &JsValue::from_str("value")) {
            Ok(value) => Some(Ok(Uint8Array::new(&value).to_vec())),
            Err(e) => {
                self.done = true;
                Some(Err(js_error("body chunk", e)))
            }
        }
    }
}

impl Drop for BodyReader {
    fn drop(&mut self) {
        if !self.done {
            log::debug!("Cancelling unfinished response body");
            let _ = self.reader.cancel();
        }
    }
}

/// Expose a response body as a stream of byte increments.
pub fn body_stream(response: Response) -> Result<ByteStream<'static>> {
    let body = response
        .body()
        .ok_or_else(|| ChatError::Network("response has no body".to_string()))?;
    let reader = body
        .get_reader()
        .dyn_into::<ReadableStreamDefaultReader>()
        .map_err(|e| js_error("body reader", e.into()))?;

    let state = BodyReader { reader, done: false };
    Ok(Box::pin(stream::unfold(state, |mut state| async move {
        let chunk = state.next_chunk().await?;
        Some((chunk, state))
    })))
}
