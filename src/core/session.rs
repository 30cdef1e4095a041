//! Caller-owned context overlays
//!
//! A `Session` is a plain owned value: it shares no state with other sessions
//! and is mutated only through `&mut self`, so the borrow checker keeps one
//! session from being changed while another thread formats with it.

use super::context::{Context, FieldValue};
use crate::global;
use std::fmt;

/// Extra key/value pairs layered on top of every message logged through it
///
/// # Example
///
/// ```
/// use rust_log_pipeline::core::Session;
///
/// let mut session = Session::new().with("request_id", "abc-123");
/// session.set("user", 42);
/// assert_eq!(session.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    context: Context,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key-value pair, replacing any previous value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.context.insert(key, value);
    }

    #[must_use]
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.context.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.context.remove(key)
    }

    /// New session holding this session's pairs overridden by `other`'s
    #[must_use]
    pub fn overlay(&self, other: &Session) -> Session {
        let mut context = self.context.clone();
        context.extend_from(&other.context);
        Session { context }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn len(&self) -> usize {
        self.context.len()
    }

    pub fn is_empty(&self) -> bool {
        self.context.is_empty()
    }

    /// Log through the process-wide logger with this session's overlay
    #[inline(never)]
    pub fn log_with_skip(&self, skip: usize, level: impl AsRef<str>, args: fmt::Arguments<'_>) {
        global::logger().log_with_skip(skip + 1, level.as_ref(), Some(self), args);
    }

    #[inline(never)]
    pub fn log(&self, level: impl AsRef<str>, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, level, args);
    }

    #[inline(never)]
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, "debug", args);
    }

    #[inline(never)]
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, "info", args);
    }

    #[inline(never)]
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, "warn", args);
    }

    #[inline(never)]
    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, "error", args);
    }

    #[inline(never)]
    pub fn fatal(&self, args: fmt::Arguments<'_>) {
        self.log_with_skip(1, "fatal", args);
    }
}

impl From<Context> for Session {
    fn from(context: Context) -> Self {
        Self { context }
    }
}
