//! Module registry.
//!
//! Maps each loaded module's key to its instance. A key is present exactly
//! when the module finished loading and has not been unloaded.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ModuleError, ModuleResult};
use crate::key::ModuleKey;
use crate::module::Module;

/// Loaded modules in registration order.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<ModuleKey, Arc<dyn Module>>,
    order: Vec<ModuleKey>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under its own key.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::AlreadyRegistered`] if the key is taken.
    pub fn register(&mut self, module: Arc<dyn Module>) -> ModuleResult<()> {
        let key = module.key().clone();
        if self.modules.contains_key(&key) {
            return Err(ModuleError::AlreadyRegistered(key));
        }

        self.order.push(key.clone());
        self.modules.insert(key, module);
        Ok(())
    }

    /// Remove a module, returning it if it was present.
    pub fn unregister(&mut self, key: &ModuleKey) -> Option<Arc<dyn Module>> {
        let module = self.modules.remove(key)?;
        self.order.retain(|k| k != key);
        Some(module)
    }

    /// Get a module by key.
    #[must_use]
    pub fn get(&self, key: &ModuleKey) -> Option<Arc<dyn Module>> {
        self.modules.get(key).cloned()
    }

    /// Whether `key` is registered.
    #[must_use]
    pub fn contains(&self, key: &ModuleKey) -> bool {
        self.modules.contains_key(key)
    }

    /// Registered keys, oldest first.
    #[must_use]
    pub fn keys(&self) -> Vec<ModuleKey> {
        self.order.clone()
    }

    /// Registered modules, oldest first.
    #[must_use]
    pub fn modules(&self) -> Vec<Arc<dyn Module>> {
        self.order
            .iter()
            .filter_map(|key| self.modules.get(key).cloned())
            .collect()
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether no modules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{DestroyContext, InitContext};
    use async_trait::async_trait;

    struct Stub(ModuleKey);

    #[async_trait]
    impl Module for Stub {
        fn key(&self) -> &ModuleKey {
            &self.0
        }

        async fn init(&self, _ctx: &InitContext) -> ModuleResult<()> {
            Ok(())
        }

        async fn destroy(&self, _ctx: &DestroyContext) -> ModuleResult<()> {
            Ok(())
        }
    }

    fn stub(label: &str) -> Arc<dyn Module> {
        Arc::new(Stub(ModuleKey::new(label)))
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ModuleRegistry::new();
        let module = stub("search");
        let key = module.key().clone();

        registry.register(module).unwrap();
        assert!(registry.contains(&key));
        assert_eq!(registry.get(&key).unwrap().key(), &key);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = ModuleRegistry::new();
        let module = stub("search");
        registry.register(Arc::clone(&module)).unwrap();

        let result = registry.register(module);
        assert!(matches!(result, Err(ModuleError::AlreadyRegistered(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_same_label_different_keys_both_register() {
        let mut registry = ModuleRegistry::new();
        registry.register(stub("search")).unwrap();
        registry.register(stub("search")).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_order_preserved_across_unregister() {
        let mut registry = ModuleRegistry::new();
        let (a, b, c) = (stub("a"), stub("b"), stub("c"));
        let keys: Vec<ModuleKey> = [&a, &b, &c].iter().map(|m| m.key().clone()).collect();
        for m in [a, b, c] {
            registry.register(m).unwrap();
        }
        assert_eq!(registry.keys(), keys);

        assert!(registry.unregister(&keys[1]).is_some());
        assert_eq!(registry.keys(), vec![keys[0].clone(), keys[2].clone()]);
        assert_eq!(
            registry
                .modules()
                .iter()
                .map(|m| m.key().clone())
                .collect::<Vec<_>>(),
            registry.keys()
        );
    }

    #[test]
    fn test_unregister_missing() {
        let mut registry = ModuleRegistry::new();
        assert!(registry.unregister(&ModuleKey::new("ghost")).is_none());
        assert!(registry.is_empty());
    }
}
