// Per-call message and cancellation hooks.
//
// Encode and decode loops report progress through `Hooks::message` and poll
// `Hooks::checkpoint` between windows. Both callbacks are optional and are
// owned by the call that uses them; nothing is installed process-wide.

use std::fmt;

use crate::format::error::{DecodeError, EncodeError};

/// Optional callbacks consulted by the encode and decode loops.
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use oxipatch::hooks::Hooks;
///
/// let stop = AtomicBool::new(false);
/// let mut seen = Vec::new();
/// let mut hooks = Hooks::new()
///     .with_message(|m| seen.push(m.to_owned()))
///     .with_cancel(|| stop.load(Ordering::Relaxed));
/// hooks.message("hello");
/// assert!(!hooks.cancelled());
/// drop(hooks);
/// assert_eq!(seen, ["hello"]);
/// ```
#[derive(Default)]
pub struct Hooks<'a> {
    on_message: Option<Box<dyn FnMut(&str) + 'a>>,
    cancel: Option<Box<dyn Fn() -> bool + 'a>>,
}

impl<'a> Hooks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive progress and warning messages.
    pub fn with_message(mut self, f: impl FnMut(&str) + 'a) -> Self {
        self.on_message = Some(Box::new(f));
        self
    }

    /// Stop at the next window boundary once `f` returns true.
    pub fn with_cancel(mut self, f: impl Fn() -> bool + 'a) -> Self {
        self.cancel = Some(Box::new(f));
        self
    }

    pub fn message(&mut self, msg: &str) {
        if let Some(f) = self.on_message.as_mut() {
            f(msg);
        }
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|f| f())
    }

    pub(crate) fn checkpoint_encode(&self) -> Result<(), EncodeError> {
        if self.cancelled() {
            log::debug!("encode cancelled at window boundary");
            return Err(EncodeError::Cancelled);
        }
        Ok(())
    }

    pub(crate) fn checkpoint_decode(&self) -> Result<(), DecodeError> {
        if self.cancelled() {
            log::debug!("decode cancelled at window boundary");
            return Err(DecodeError::Cancelled);
        }
        Ok(())
    }
}

impl fmt::Debug for Hooks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_message", &self.on_message.is_some())
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}
