//! Module identity.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_KEY_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique module identity.
///
/// Equality and hashing use an id allocated at construction, never the
/// label, so two keys built from the same label are different modules.
/// Declare one key per module type, typically as a `static`:
///
/// ```
/// use std::sync::LazyLock;
/// use stagehand_modules::ModuleKey;
///
/// static SEARCH: LazyLock<ModuleKey> = LazyLock::new(|| ModuleKey::new("search"));
///
/// assert_eq!(SEARCH.label(), Some("search"));
/// assert_ne!(*SEARCH, ModuleKey::new("search"));
/// ```
#[derive(Clone)]
pub struct ModuleKey {
    id: u64,
    label: Option<Arc<str>>,
}

impl ModuleKey {
    /// Allocate a key with a human-readable label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: next_id(),
            label: Some(Arc::from(label.into())),
        }
    }

    /// Allocate a key without a label.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            id: next_id(),
            label: None,
        }
    }

    /// The process-unique numeric id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The label, if one was given.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The label, or `module-<id>` for anonymous keys.
    ///
    /// Used as the default storage directory name and settings table name.
    #[must_use]
    pub fn name(&self) -> String {
        match &self.label {
            Some(label) => label.to_string(),
            None => format!("module-{}", self.id),
        }
    }
}

fn next_id() -> u64 {
    NEXT_KEY_ID.fetch_add(1, Ordering::Relaxed)
}

impl PartialEq for ModuleKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ModuleKey {}

impl Hash for ModuleKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "ModuleKey({}#{})", label, self.id),
            None => write!(f, "ModuleKey(#{})", self.id),
        }
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => f.write_str(label),
            None => write!(f, "module-{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_same_label_distinct_keys() {
        let a = ModuleKey::new("search");
        let b = ModuleKey::new("search");
        assert_ne!(a, b);
        assert_eq!(a.label(), b.label());
    }

    #[test]
    fn test_clone_is_equal() {
        let a = ModuleKey::new("search");
        let b = a.clone();
        assert_eq!(a, b);

        let set: HashSet<ModuleKey> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_anonymous_name_falls_back_to_id() {
        let key = ModuleKey::anonymous();
        assert!(key.label().is_none());
        assert_eq!(key.name(), format!("module-{}", key.id()));
        assert_eq!(key.to_string(), key.name());
    }

    #[test]
    fn test_debug_shows_label_and_id() {
        let key = ModuleKey::new("journal");
        assert_eq!(format!("{key:?}"), format!("ModuleKey(journal#{})", key.id()));
    }
}
