//! Chat App, the WASM entry point.
//!
//! Exposes one [`ChatClient`] per conversation session to JavaScript.
//! Every action returns a `Promise`; presentation code drains session
//! events and reads snapshots to redraw.

mod app;

#[cfg(test)]
mod tests;

use std::future::Future;
use std::rc::Rc;

use gloo_utils::format::JsValueSerdeExt;
use js_sys::Promise;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use chat_core::session::DEFAULT_THREAD_LIMIT;
use chat_types::config::{ChatConfig, SettingsPatch};
use chat_types::ChatError;

use crate::app::{build_session, Session};

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Chat WASM starting...");
}

fn to_js_error(error: ChatError) -> JsValue {
    js_sys::Error::new(&error.to_string()).into()
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    JsValue::from_serde(value).map_err(|e| to_js_error(ChatError::Serialization(e.to_string())))
}

/// Run an action against the session and settle the promise with its
/// serialized result.
fn settle<F, Fut, T>(session: &Rc<Session>, action: F) -> Promise
where
    F: FnOnce(Rc<Session>) -> Fut,
    Fut: Future<Output = chat_types::Result<T>> + 'static,
    T: Serialize,
{
    let future = action(session.clone());
    future_to_promise(async move {
        let value = future.await.map_err(to_js_error)?;
        to_js(&value)
    })
}

#[wasm_bindgen]
pub struct ChatClient {
    session: Rc<Session>,
}

#[wasm_bindgen]
impl ChatClient {
    /// Build a session from a JSON `ChatConfig`.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<ChatClient, JsValue> {
        let config = ChatConfig::from_json(config_json).map_err(to_js_error)?;
        let session = build_session(config).map_err(to_js_error)?;
        Ok(ChatClient { session: Rc::new(session) })
    }

    // ─── Threads ─────────────────────────────────────────────

    #[wasm_bindgen(js_name = loadThreads)]
    pub fn load_threads(&self, limit: Option<usize>) -> Promise {
        let limit = limit.unwrap_or(DEFAULT_THREAD_LIMIT);
        settle(&self.session, move |s| async move { s.load_threads(limit).await })
    }

    #[wasm_bindgen(js_name = createThread)]
    pub fn create_thread(&self, title: Option<String>) -> Promise {
        settle(&self.session, move |s| async move { s.create_thread(title.as_deref()).await })
    }

    #[wasm_bindgen(js_name = startThread)]
    pub fn start_thread(&self, title: Option<String>, initial_message: String) -> Promise {
        settle(&self.session, move |s| async move {
            s.start_thread(title.as_deref(), &initial_message).await
        })
    }

    #[wasm_bindgen(js_name = selectThread)]
    pub fn select_thread(&self, thread_id: String) -> Promise {
        settle(&self.session, move |s| async move { s.select_thread(&thread_id).await })
    }

    #[wasm_bindgen(js_name = deleteThread)]
    pub fn delete_thread(&self, thread_id: String) -> Promise {
        settle(&self.session, move |s| async move { s.delete_thread(&thread_id).await })
    }

    #[wasm_bindgen(js_name = renameThread)]
    pub fn rename_thread(&self, thread_id: String, title: String) -> Promise {
        settle(&self.session, move |s| async move {
            s.update_thread_title(&thread_id, &title).await
        })
    }

    #[wasm_bindgen(js_name = clearCurrentThread)]
    pub fn clear_current_thread(&self) {
        self.session.clear_current_thread();
    }

    // ─── Messages ────────────────────────────────────────────

    #[wasm_bindgen(js_name = sendMessage)]
    pub fn send_message(&self, content: String) -> Promise {
        settle(&self.session, move |s| async move { s.send_message(&content).await })
    }

    #[wasm_bindgen(js_name = streamMessage)]
    pub fn stream_message(&self, content: String) -> Promise {
        settle(&self.session, move |s| async move { s.stream_message(&content).await })
    }

    #[wasm_bindgen(js_name = stopStreaming)]
    pub fn stop_streaming(&self, thread_id: &str) -> bool {
        self.session.stop_streaming(thread_id)
    }

    // ─── Settings & Usage ────────────────────────────────────

    #[wasm_bindgen(js_name = updateSettings)]
    pub fn update_settings(&self, patch: JsValue) -> Result<Promise, JsValue> {
        let patch: SettingsPatch = patch
            .into_serde()
            .map_err(|e| to_js_error(ChatError::Serialization(e.to_string())))?;
        Ok(settle(&self.session, move |s| async move {
            Ok(s.update_settings(patch).await)
        }))
    }

    #[wasm_bindgen(js_name = loadTokenUsage)]
    pub fn load_token_usage(&self, period: String) -> Promise {
        settle(&self.session, move |s| async move { s.load_token_usage(&period).await })
    }

    #[wasm_bindgen(js_name = resetUsage)]
    pub fn reset_usage(&self) {
        self.session.reset_usage();
    }

    // ─── Snapshots ───────────────────────────────────────────

    pub fn threads(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.threads())
    }

    #[wasm_bindgen(js_name = activeThread)]
    pub fn active_thread(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.active_thread())
    }

    pub fn settings(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.settings())
    }

    pub fn ledger(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.ledger())
    }

    pub fn phase(&self, thread_id: &str) -> Result<JsValue, JsValue> {
        to_js(&self.session.phase(thread_id))
    }

    #[wasm_bindgen(js_name = visibleBuffer)]
    pub fn visible_buffer(&self) -> Option<String> {
        self.session.visible_buffer()
    }

    #[wasm_bindgen(js_name = lastError)]
    pub fn last_error(&self) -> Option<String> {
        self.session.last_error()
    }

    #[wasm_bindgen(js_name = threadsError)]
    pub fn threads_error(&self) -> Option<String> {
        self.session.threads_error()
    }

    #[wasm_bindgen(js_name = isLoadingThreads)]
    pub fn is_loading_threads(&self) -> bool {
        self.session.is_loading_threads()
    }

    #[wasm_bindgen(js_name = clearError)]
    pub fn clear_error(&self) {
        self.session.clear_error();
    }

    /// Session events since the last drain, oldest first.
    #[wasm_bindgen(js_name = drainEvents)]
    pub fn drain_events(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.events().drain())
    }
}
