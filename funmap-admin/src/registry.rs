//! Field registry: dirty-state tracking for atomic fields and whole subtrees
//!
//! Every tracked unit of editor state is registered under a string id with a
//! baseline ("original", the last-saved value).
//!
//! - **Simple** entries hold `original` and `current` JSON values compared by
//!   equality.
//! - **Composite** entries hold the baseline snapshot (plus its serialization) and a
//!   [`Capturable`] source that reproduces a comparable snapshot from live state.
//!   No current value is cached for composites; it is recaptured on every query.
//!
//! Comparisons are structural. `serde_json::Value` objects keep their keys
//! sorted, so two structurally equal snapshots always serialize identically.

use funmap_common::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A stateful component whose whole subtree is tracked as one field
///
/// Implementations must not notify the session from inside these methods:
/// they are called while the session state is locked.
pub trait Capturable: Send + Sync {
    /// Snapshot of the live state, comparable by serialization
    fn capture(&self) -> Value;

    /// Re-render live state from a previously captured snapshot (discard)
    fn restore(&self, snapshot: &Value) -> Result<()>;

    /// Body written by the save request; defaults to the snapshot itself
    fn payload(&self) -> Value {
        self.capture()
    }
}

/// Kind of registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Simple,
    Composite,
}

enum FieldEntry {
    Simple { original: Value, current: Value },
    Composite {
        original: Value,
        /// Serialized form of `original`, the comparison key
        original_text: String,
        source: Arc<dyn Capturable>,
    },
}

impl FieldEntry {
    fn kind(&self) -> FieldKind {
        match self {
            FieldEntry::Simple { .. } => FieldKind::Simple,
            FieldEntry::Composite { .. } => FieldKind::Composite,
        }
    }

    fn is_changed(&self) -> bool {
        match self {
            FieldEntry::Simple { original, current } => current != original,
            FieldEntry::Composite {
                original_text,
                source,
                ..
            } => serialize_snapshot(&source.capture()) != *original_text,
        }
    }

    fn rebaseline(&mut self) {
        match self {
            FieldEntry::Simple { original, current } => *original = current.clone(),
            FieldEntry::Composite {
                original,
                original_text,
                source,
            } => {
                let snapshot = source.capture();
                *original_text = serialize_snapshot(&snapshot);
                *original = snapshot;
            }
        }
    }
}

fn serialize_snapshot(snapshot: &Value) -> String {
    snapshot.to_string()
}

/// Registry of every tracked field, keyed by id
#[derive(Default)]
pub struct FieldRegistry {
    fields: BTreeMap<String, FieldEntry>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a simple field; `current` starts equal to `original`
    ///
    /// Re-registering an existing id is rejected; unregister it first.
    pub fn register_field(&mut self, id: impl Into<String>, original: impl Into<Value>) -> Result<()> {
        let id = id.into();
        if self.fields.contains_key(&id) {
            return Err(Error::AlreadyRegistered(id));
        }
        let original = original.into();
        self.fields.insert(
            id,
            FieldEntry::Simple {
                current: original.clone(),
                original,
            },
        );
        Ok(())
    }

    /// Set the current value of a simple field
    pub fn update_field(&mut self, id: &str, current: impl Into<Value>) -> Result<()> {
        match self.fields.get_mut(id) {
            Some(FieldEntry::Simple { current: slot, .. }) => {
                *slot = current.into();
                Ok(())
            }
            Some(FieldEntry::Composite { .. }) => Err(Error::InvalidInput(format!(
                "Field \"{}\" is composite; its value is captured, not set",
                id
            ))),
            None => Err(Error::UnregisteredField(id.to_string())),
        }
    }

    /// Remove an entry; returns whether it existed
    pub fn unregister_field(&mut self, id: &str) -> bool {
        self.fields.remove(id).is_some()
    }

    /// Register a composite; its current capture becomes the baseline
    pub fn register_composite(&mut self, id: impl Into<String>, source: Arc<dyn Capturable>) -> Result<()> {
        let id = id.into();
        if self.fields.contains_key(&id) {
            return Err(Error::AlreadyRegistered(id));
        }
        let original = source.capture();
        let original_text = serialize_snapshot(&original);
        self.fields.insert(
            id,
            FieldEntry::Composite {
                original,
                original_text,
                source,
            },
        );
        Ok(())
    }

    /// Re-baseline a composite from its live state (after its subtree saved)
    ///
    /// Returns false when `id` is not a registered composite.
    pub fn update_composite_baseline(&mut self, id: &str) -> bool {
        match self.fields.get_mut(id) {
            Some(entry) if entry.kind() == FieldKind::Composite => {
                entry.rebaseline();
                true
            }
            _ => false,
        }
    }

    /// Whether any entry differs from its baseline
    pub fn has_changes(&self) -> bool {
        self.fields.values().any(FieldEntry::is_changed)
    }

    /// Ids of entries that differ from their baseline
    pub fn changed_ids(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, entry)| entry.is_changed())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Whether a single entry differs from its baseline
    pub fn is_changed(&self, id: &str) -> bool {
        self.fields.get(id).is_some_and(FieldEntry::is_changed)
    }

    /// Advance every baseline to the current state
    pub fn mark_all_saved(&mut self) {
        for entry in self.fields.values_mut() {
            entry.rebaseline();
        }
    }

    /// Set a simple field's baseline to `value` (the value that was persisted)
    pub fn commit_field(&mut self, id: &str, value: Value) -> bool {
        match self.fields.get_mut(id) {
            Some(FieldEntry::Simple { original, .. }) => {
                *original = value;
                true
            }
            _ => false,
        }
    }

    /// Set a composite's baseline to `snapshot` (the state that was persisted)
    pub fn commit_composite(&mut self, id: &str, snapshot: Value) -> bool {
        match self.fields.get_mut(id) {
            Some(FieldEntry::Composite {
                original,
                original_text,
                ..
            }) => {
                *original_text = serialize_snapshot(&snapshot);
                *original = snapshot;
                true
            }
            _ => false,
        }
    }

    /// Revert every simple field to its baseline
    ///
    /// Returns the ids and restored values of fields that actually changed.
    pub fn revert_simple_fields(&mut self) -> Vec<(String, Value)> {
        let mut reverted = Vec::new();
        for (id, entry) in self.fields.iter_mut() {
            if let FieldEntry::Simple { original, current } = entry {
                if current != original {
                    *current = original.clone();
                    reverted.push((id.clone(), original.clone()));
                }
            }
        }
        reverted
    }

    /// Composite sources with their baseline snapshots
    pub fn composite_baselines(&self) -> Vec<(String, Value, Arc<dyn Capturable>)> {
        self.fields
            .iter()
            .filter_map(|(id, entry)| match entry {
                FieldEntry::Composite {
                    original, source, ..
                } => Some((id.clone(), original.clone(), Arc::clone(source))),
                _ => None,
            })
            .collect()
    }

    /// Changed simple fields with their current values
    pub fn changed_simple_values(&self) -> Vec<(String, Value)> {
        self.fields
            .iter()
            .filter_map(|(id, entry)| match entry {
                FieldEntry::Simple { original, current } if current != original => {
                    Some((id.clone(), current.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Changed composites with their baseline snapshot and source
    pub fn changed_composites(&self) -> Vec<(String, Value, Arc<dyn Capturable>)> {
        self.fields
            .iter()
            .filter(|(_, entry)| entry.is_changed())
            .filter_map(|(id, entry)| match entry {
                FieldEntry::Composite {
                    original, source, ..
                } => Some((id.clone(), original.clone(), Arc::clone(source))),
                _ => None,
            })
            .collect()
    }

    pub fn kind(&self, id: &str) -> Option<FieldKind> {
        self.fields.get(id).map(FieldEntry::kind)
    }

    /// Baseline value (composites: snapshot taken at the last save)
    pub fn original(&self, id: &str) -> Option<Value> {
        match self.fields.get(id)? {
            FieldEntry::Simple { original, .. } => Some(original.clone()),
            FieldEntry::Composite { original, .. } => Some(original.clone()),
        }
    }

    /// Current value (composites: fresh capture)
    pub fn current(&self, id: &str) -> Option<Value> {
        match self.fields.get(id)? {
            FieldEntry::Simple { current, .. } => Some(current.clone()),
            FieldEntry::Composite { source, .. } => Some(source.capture()),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.fields.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::RwLock;
    use serde_json::json;

    /// Minimal composite backed by a JSON value
    struct Doc(RwLock<Value>);

    impl Capturable for Doc {
        fn capture(&self) -> Value {
            self.0.read().clone()
        }

        fn restore(&self, snapshot: &Value) -> Result<()> {
            *self.0.write() = snapshot.clone();
            Ok(())
        }
    }

    #[test]
    fn test_simple_field_dirty_iff_differs_from_original() {
        let mut registry = FieldRegistry::new();
        registry.register_field("settings.website_name", "Funmap").unwrap();
        assert!(!registry.has_changes());

        registry.update_field("settings.website_name", "Funmap!").unwrap();
        assert!(registry.has_changes());
        assert_eq!(registry.changed_ids(), vec!["settings.website_name".to_string()]);

        // Typing the original back clears the change
        registry.update_field("settings.website_name", "Funmap").unwrap();
        assert!(!registry.has_changes());
        assert!(registry.changed_ids().is_empty());
    }

    #[test]
    fn test_update_unregistered_field_is_error_and_noop() {
        let mut registry = FieldRegistry::new();
        registry.register_field("a", 1).unwrap();

        let err = registry.update_field("missing", 2).unwrap_err();
        assert!(matches!(err, Error::UnregisteredField(id) if id == "missing"));
        assert!(!registry.has_changes());
        assert!(!registry.contains("missing"));
    }

    #[test]
    fn test_reregister_rejected() {
        let mut registry = FieldRegistry::new();
        registry.register_field("a", true).unwrap();
        assert!(matches!(
            registry.register_field("a", false),
            Err(Error::AlreadyRegistered(_))
        ));

        assert!(registry.unregister_field("a"));
        registry.register_field("a", false).unwrap();
        assert_eq!(registry.original("a"), Some(json!(false)));
    }

    #[test]
    fn test_unregister_removes_dirty_entry() {
        let mut registry = FieldRegistry::new();
        registry.register_field("field.7", "x").unwrap();
        registry.update_field("field.7", "y").unwrap();
        assert!(registry.has_changes());

        registry.unregister_field("field.7");
        assert!(!registry.has_changes());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_composite_compares_structurally() {
        let doc = Arc::new(Doc(RwLock::new(json!({"b": 1, "a": [1, 2]}))));
        let mut registry = FieldRegistry::new();
        registry.register_composite("doc", doc.clone()).unwrap();
        assert!(!registry.has_changes());

        // Distinct but structurally equal value is unchanged
        *doc.0.write() = json!({"a": [1, 2], "b": 1});
        assert!(!registry.has_changes());

        *doc.0.write() = json!({"a": [1, 2, 3], "b": 1});
        assert!(registry.is_changed("doc"));
        assert_eq!(registry.kind("doc"), Some(FieldKind::Composite));
    }

    #[test]
    fn test_capture_is_idempotent() {
        let doc = Doc(RwLock::new(json!({"venues": [{"name": "Hall"}]})));
        assert_eq!(
            serialize_snapshot(&doc.capture()),
            serialize_snapshot(&doc.capture())
        );
    }

    #[test]
    fn test_update_composite_baseline() {
        let doc = Arc::new(Doc(RwLock::new(json!([1]))));
        let mut registry = FieldRegistry::new();
        registry.register_composite("doc", doc.clone()).unwrap();

        *doc.0.write() = json!([1, 2]);
        assert!(registry.has_changes());

        assert!(registry.update_composite_baseline("doc"));
        assert!(!registry.has_changes());
        assert_eq!(registry.original("doc"), Some(json!([1, 2])));
        assert!(!registry.update_composite_baseline("missing"));
    }

    #[test]
    fn test_commit_composite_keeps_later_edits_dirty() {
        let doc = Arc::new(Doc(RwLock::new(json!([1]))));
        let mut registry = FieldRegistry::new();
        registry.register_composite("doc", doc.clone()).unwrap();

        *doc.0.write() = json!([1, 2]);
        let sent = doc.capture();
        *doc.0.write() = json!([1, 2, 3]);

        assert!(registry.commit_composite("doc", sent));
        assert_eq!(registry.original("doc"), Some(json!([1, 2])));
        assert!(registry.is_changed("doc"));
        assert!(!registry.commit_composite("missing", json!(null)));
    }

    #[test]
    fn test_mark_all_saved_clears_everything() {
        let doc = Arc::new(Doc(RwLock::new(json!("a"))));
        let mut registry = FieldRegistry::new();
        registry.register_field("x", 1).unwrap();
        registry.register_composite("doc", doc.clone()).unwrap();

        registry.update_field("x", 2).unwrap();
        *doc.0.write() = json!("b");
        assert_eq!(registry.changed_ids().len(), 2);

        registry.mark_all_saved();
        assert!(!registry.has_changes());
        assert_eq!(registry.original("x"), Some(json!(2)));
    }

    #[test]
    fn test_revert_simple_fields_reports_changed_only() {
        let mut registry = FieldRegistry::new();
        registry.register_field("a", "one").unwrap();
        registry.register_field("b", "two").unwrap();
        registry.update_field("b", "TWO").unwrap();

        let reverted = registry.revert_simple_fields();
        assert_eq!(reverted, vec![("b".to_string(), json!("two"))]);
        assert_eq!(registry.current("b"), Some(json!("two")));
        assert!(!registry.has_changes());
    }

    #[test]
    fn test_composite_rejects_direct_update() {
        let doc = Arc::new(Doc(RwLock::new(json!(null))));
        let mut registry = FieldRegistry::new();
        registry.register_composite("doc", doc).unwrap();
        assert!(matches!(
            registry.update_field("doc", 1),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_commit_field_advances_single_baseline() {
        let mut registry = FieldRegistry::new();
        registry.register_field("settings.admin_autosave", false).unwrap();
        registry.update_field("settings.admin_autosave", true).unwrap();

        assert!(registry.commit_field("settings.admin_autosave", json!(true)));
        assert!(!registry.has_changes());
    }
}
