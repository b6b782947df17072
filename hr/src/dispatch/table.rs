//! DispatchTable - message kind to handler mapping

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::builtin;
use super::traits::Handler;

/// Registered handlers keyed by message kind
#[derive(Clone)]
pub struct DispatchTable {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl DispatchTable {
    /// Create a table with every built-in capability
    pub fn standard() -> Self {
        let mut table = Self::empty();
        builtin::register_all(&mut table);
        debug!(count = table.len(), "DispatchTable::standard: registered built-in handlers");
        table
    }

    /// Create an empty table (for testing)
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Add a handler, replacing any previous handler for the same kind
    pub fn add(&mut self, handler: impl Handler + 'static) {
        self.add_arc(Arc::new(handler));
    }

    pub fn add_arc(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.insert(handler.kind().to_string(), handler);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(kind).cloned()
    }

    pub fn has(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.handlers.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::standard()
    }
}
