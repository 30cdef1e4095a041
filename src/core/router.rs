//! Level routing
//!
//! The level → handlers table is an immutable snapshot published through
//! `ArcSwap`. Reconfiguration builds a complete new table and swaps the
//! pointer; readers holding the old snapshot keep using it undisturbed and
//! never observe a table that is half old and half new.

use super::handler::Handler;
use arc_swap::{ArcSwap, Guard};
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable level → handlers mapping
#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: HashMap<String, Vec<Arc<Handler>>>,
}

impl RoutingTable {
    /// Append every handler to each level it declares, preserving order
    ///
    /// Handlers are not deduplicated: listing one twice routes to it twice.
    pub fn build<I>(handlers: I) -> Self
    where
        I: IntoIterator<Item = Arc<Handler>>,
    {
        let mut routes: HashMap<String, Vec<Arc<Handler>>> = HashMap::new();
        for handler in handlers {
            for level in handler.level_names() {
                routes
                    .entry(level.clone())
                    .or_insert_with(|| Vec::with_capacity(4))
                    .push(Arc::clone(&handler));
            }
        }
        Self { routes }
    }

    /// Handlers for `level`; empty when none are configured
    pub fn handlers(&self, level: &str) -> &[Arc<Handler>] {
        self.routes.get(level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn levels(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Every distinct handler in the table
    pub fn unique_handlers(&self) -> Vec<Arc<Handler>> {
        let mut unique: Vec<Arc<Handler>> = Vec::new();
        for handler in self.routes.values().flatten() {
            if !unique.iter().any(|known| Arc::ptr_eq(known, handler)) {
                unique.push(Arc::clone(handler));
            }
        }
        unique
    }
}

/// Maps level names to the handlers responsible for them
#[derive(Debug)]
pub struct LevelRouter {
    table: ArcSwap<RoutingTable>,
}

impl LevelRouter {
    /// Router with the default stderr handler for the standard levels
    pub fn new() -> Self {
        Self::with_handlers([Arc::new(Handler::default_stderr())])
    }

    pub fn with_handlers<I>(handlers: I) -> Self
    where
        I: IntoIterator<Item = Arc<Handler>>,
    {
        Self {
            table: ArcSwap::from_pointee(RoutingTable::build(handlers)),
        }
    }

    /// Owned copy of the handler list for `level`
    pub fn route(&self, level: &str) -> Vec<Arc<Handler>> {
        self.table.load().handlers(level).to_vec()
    }

    /// Cheap guard on the current table for the hot path
    pub fn load(&self) -> Guard<Arc<RoutingTable>> {
        self.table.load()
    }

    /// Current table, kept alive for as long as the caller holds it
    pub fn snapshot(&self) -> Arc<RoutingTable> {
        self.table.load_full()
    }

    /// Replace the whole table in one atomic step
    pub fn reconfigure<I>(&self, handlers: I)
    where
        I: IntoIterator<Item = Arc<Handler>>,
    {
        self.table.store(Arc::new(RoutingTable::build(handlers)));
    }
}

impl Default for LevelRouter {
    fn default() -> Self {
        Self::new()
    }
}
