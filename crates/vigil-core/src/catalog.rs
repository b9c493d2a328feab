//! Handler types by name
//!
//! Configuration refers to handler types by name; the catalog is where those
//! names resolve.

use crate::descriptor::HandlerType;
use crate::errors::{Result, VigilError};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name → handler type
#[derive(Debug, Default, Clone)]
pub struct HandlerCatalog {
    types: BTreeMap<String, Arc<HandlerType>>,
}

impl HandlerCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler_type` under `name`, replacing any earlier entry
    pub fn register(&mut self, name: impl Into<String>, handler_type: Arc<HandlerType>) {
        self.types.insert(name.into(), handler_type);
    }

    /// Look up a name
    pub fn get(&self, name: &str) -> Option<Arc<HandlerType>> {
        self.types.get(name).cloned()
    }

    /// Look up a name, failing with a configuration error
    pub fn resolve(&self, name: &str) -> Result<Arc<HandlerType>> {
        self.get(name)
            .ok_or_else(|| VigilError::config(format!("unknown handler '{name}'")))
    }

    /// Registered names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}
