//! Concurrent registry of deployed contexts keyed by context path.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use wharf_types::ContextInfo;

use super::context::WebContext;

/// Contexts attached to the handler chain.
///
/// Request threads take the read lock; deployers take the write lock only for
/// the duration of a single insert, removal, or replacement.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    contexts: RwLock<BTreeMap<String, Arc<WebContext>>>,
}

impl ContextRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, context_path: &str) -> bool {
        self.read().contains_key(context_path)
    }

    #[must_use]
    pub fn get(&self, context_path: &str) -> Option<Arc<WebContext>> {
        self.read().get(context_path).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Inserts `context`, returning the context previously bound to its path.
    pub fn insert(&self, context: Arc<WebContext>) -> Option<Arc<WebContext>> {
        self.write()
            .insert(context.context_path().to_owned(), context)
    }

    /// Inserts `context` only when its path is free.
    ///
    /// Returns the context back when the path is taken.
    pub fn try_insert(&self, context: Arc<WebContext>) -> Result<(), Arc<WebContext>> {
        let mut contexts = self.write();
        if contexts.contains_key(context.context_path()) {
            return Err(context);
        }
        contexts.insert(context.context_path().to_owned(), context);
        Ok(())
    }

    pub fn remove(&self, context_path: &str) -> Option<Arc<WebContext>> {
        self.write().remove(context_path)
    }

    /// Removes the context at `old_path` and inserts `replacement` under one
    /// write lock, so readers see either the old or the new context.
    ///
    /// Fails, leaving the registry untouched, when the replacement's path is
    /// held by a context other than the one being replaced.
    pub fn replace(
        &self,
        old_path: &str,
        replacement: Arc<WebContext>,
    ) -> Result<Option<Arc<WebContext>>, Arc<WebContext>> {
        let mut contexts = self.write();
        let new_path = replacement.context_path();
        if new_path != old_path && contexts.contains_key(new_path) {
            return Err(replacement);
        }
        let previous = contexts.remove(old_path);
        contexts.insert(new_path.to_owned(), replacement);
        Ok(previous)
    }

    /// Finds the context with the longest path prefix matching the request.
    #[must_use]
    pub fn resolve(&self, host: Option<&str>, path: &str) -> Option<Arc<WebContext>> {
        self.read()
            .values()
            .filter(|context| context.matches(host, path))
            .max_by_key(|context| {
                (
                    context.settings().virtual_host.is_some(),
                    context.context_path().len(),
                )
            })
            .cloned()
    }

    /// Contexts ordered by path.
    #[must_use]
    pub fn contexts(&self) -> Vec<Arc<WebContext>> {
        self.read().values().cloned().collect()
    }

    #[must_use]
    pub fn infos(&self) -> Vec<ContextInfo> {
        self.read().values().map(|context| context.info()).collect()
    }

    /// Removes every context.
    pub fn drain(&self) -> Vec<Arc<WebContext>> {
        std::mem::take(&mut *self.write()).into_values().collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Arc<WebContext>>> {
        self.contexts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Arc<WebContext>>> {
        self.contexts.write().unwrap_or_else(PoisonError::into_inner)
    }
}
