//! Coroutine spawning on the `may` runtime

use may::coroutine::JoinHandle;
use std::io;

// Migration bodies serialize JSON and touch the filesystem; the default
// coroutine stack is too small for that. Set per coroutine, never on the
// process-wide `may` config the host owns.
const COROUTINE_STACK_SIZE: usize = 0x8000;

/// Spawn `f` as a `may` coroutine with its own stack size
///
/// Fails only if the coroutine stack cannot be allocated.
pub(crate) fn spawn<F, T>(f: F) -> io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    may::go_with!(COROUTINE_STACK_SIZE, f)
}

/// Render a coroutine panic payload for error messages
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "coroutine panicked".to_string()
    }
}
