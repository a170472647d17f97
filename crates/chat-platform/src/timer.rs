use std::future::Future;
use std::pin::Pin;

use chat_core::ports::Timer;
use gloo_timers::future::TimeoutFuture;

/// `setTimeout`-backed timer
#[derive(Debug, Default, Clone, Copy)]
pub struct GlooTimer;

impl Timer for GlooTimer {
    fn sleep(&self, ms: u64) -> Pin<Box<dyn Future<Output = ()>>> {
        let ms = u32::try_from(ms).unwrap_or(u32::MAX);
        Box::pin(TimeoutFuture::new(ms))
    }
}
