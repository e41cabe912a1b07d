//! Synchronous signal bus.
//!
//! Channels are keyed by name and hold handlers in connection order.
//! Sending runs every handler in turn and stops at the first error, which is
//! handed back to the caller unchanged.

use anyhow::Result;
use std::{collections::HashMap, rc::Rc};

/// Fired after a context is prepared, before its program runs.
pub const BEFORE_FILE_PROCESSED: &str = "before_file_processed";
/// Fired after a context's program ran (or was skipped as up to date).
pub const AFTER_FILE_PUBLISHED: &str = "after_file_published";
/// Fired once per build after every context went through.
pub const BEFORE_BUILD_FINISHED: &str = "before_build_finished";

/// A subscriber: receives the sender mutably and the payload by reference.
pub type Handler<S, P> = Rc<dyn Fn(&mut S, &P) -> Result<()>>;

pub struct SignalBus<S, P> {
    channels: HashMap<String, Vec<Handler<S, P>>>,
}

impl<S, P> Default for SignalBus<S, P> {
    fn default() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }
}

impl<S, P> Clone for SignalBus<S, P> {
    fn clone(&self) -> Self {
        Self {
            channels: self.channels.clone(),
        }
    }
}

impl<S, P> SignalBus<S, P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the named channel if it does not exist yet.
    pub fn channel(&mut self, name: &str) -> &mut Vec<Handler<S, P>> {
        self.channels.entry(name.to_owned()).or_default()
    }

    /// Append a handler to `name`.
    pub fn connect(&mut self, name: &str, handler: impl Fn(&mut S, &P) -> Result<()> + 'static) {
        self.channel(name).push(Rc::new(handler));
    }

    pub fn receiver_count(&self, name: &str) -> usize {
        self.channels.get(name).map_or(0, Vec::len)
    }

    /// The handlers of `name`, detached from the bus.
    ///
    /// Callers that own the bus take this snapshot before dispatching, so
    /// handlers are free to borrow the owner mutably.
    pub fn receivers(&self, name: &str) -> Vec<Handler<S, P>> {
        self.channels.get(name).cloned().unwrap_or_default()
    }

    /// Run every handler of `name` in connection order; fail fast.
    pub fn send(&self, name: &str, sender: &mut S, payload: &P) -> Result<()> {
        dispatch(&self.receivers(name), sender, payload)
    }
}

/// Invoke `handlers` in order, stopping at the first error.
pub fn dispatch<S, P>(handlers: &[Handler<S, P>], sender: &mut S, payload: &P) -> Result<()> {
    handlers.iter().try_for_each(|handler| handler(sender, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    type Log = Vec<String>;

    #[test]
    fn test_handlers_run_in_connection_order() {
        let mut bus: SignalBus<Log, u32> = SignalBus::new();
        bus.connect("ping", |log, n| {
            log.push(format!("first {n}"));
            Ok(())
        });
        bus.connect("ping", |log, n| {
            log.push(format!("second {n}"));
            Ok(())
        });

        let mut log = Log::new();
        bus.send("ping", &mut log, &7).unwrap();
        assert_eq!(log, ["first 7", "second 7"]);
    }

    #[test]
    fn test_fail_fast_skips_remaining() {
        let mut bus: SignalBus<Log, ()> = SignalBus::new();
        bus.connect("go", |log, _| {
            log.push("a".into());
            Ok(())
        });
        bus.connect("go", |_, _| bail!("boom"));
        bus.connect("go", |log, _| {
            log.push("c".into());
            Ok(())
        });

        let mut log = Log::new();
        let err = bus.send("go", &mut log, &()).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(log, ["a"]);
    }

    #[test]
    fn test_channel_is_idempotent() {
        let mut bus: SignalBus<Log, ()> = SignalBus::new();
        bus.channel("x");
        bus.connect("x", |_, _| Ok(()));
        bus.channel("x");
        assert_eq!(bus.receiver_count("x"), 1);
        assert_eq!(bus.receiver_count("missing"), 0);
    }

    #[test]
    fn test_send_unknown_channel_is_noop() {
        let bus: SignalBus<Log, ()> = SignalBus::new();
        let mut log = Log::new();
        bus.send("nobody", &mut log, &()).unwrap();
        assert!(log.is_empty());
    }
}
