//! Message catalog component
//!
//! Editable free-text messages keyed by message key. Tracked as the
//! `messages` composite; its save request carries only the entries that differ
//! from the baseline.

use crate::registry::Capturable;
use crate::session::ChangeNotifier;
use funmap_common::{Error, Result};
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const MESSAGES_FIELD: &str = "messages";

pub struct MessageCatalog {
    messages: RwLock<BTreeMap<String, String>>,
    notifier: ChangeNotifier,
}

impl MessageCatalog {
    pub fn new(messages: BTreeMap<String, String>, notifier: ChangeNotifier) -> Self {
        Self {
            messages: RwLock::new(messages),
            notifier,
        }
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.messages.read().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.messages.read().keys().cloned().collect()
    }

    /// Replace a message's text; returns whether it changed
    pub fn edit(&self, key: &str, text: &str) -> Result<bool> {
        let changed = {
            let mut messages = self.messages.write();
            let slot = messages
                .get_mut(key)
                .ok_or_else(|| Error::NotFound(format!("message \"{}\"", key)))?;
            if slot.as_str() == text {
                false
            } else {
                *slot = text.to_string();
                true
            }
        };
        self.notifier.notify();
        Ok(changed)
    }
}

impl Capturable for MessageCatalog {
    fn capture(&self) -> Value {
        let messages = self.messages.read();
        Value::Object(
            messages
                .iter()
                .map(|(key, text)| (key.clone(), Value::String(text.clone())))
                .collect::<Map<_, _>>(),
        )
    }

    fn restore(&self, snapshot: &Value) -> Result<()> {
        let restored: BTreeMap<String, String> = serde_json::from_value(snapshot.clone())?;
        *self.messages.write() = restored;
        Ok(())
    }
}

/// Save body: the messages whose text differs from the baseline
pub fn modified_messages(baseline: &Value, current: &Value) -> Value {
    let modified: Vec<Value> = current
        .as_object()
        .into_iter()
        .flatten()
        .filter(|(key, text)| baseline.get(key.as_str()) != Some(*text))
        .map(|(key, text)| json!({ "message_key": key, "message_text": text }))
        .collect();
    json!({ "messages": modified })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> MessageCatalog {
        let mut messages = BTreeMap::new();
        messages.insert("msg_admin_saved".to_string(), "Saved".to_string());
        messages.insert("msg_post_success".to_string(), "Posted!".to_string());
        MessageCatalog::new(messages, ChangeNotifier::detached())
    }

    #[test]
    fn test_edit_unknown_key_is_not_found() {
        assert!(matches!(catalog().edit("nope", "x"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_modified_messages_only_lists_changes() {
        let catalog = catalog();
        let baseline = catalog.capture();
        assert!(catalog.edit("msg_admin_saved", "All saved").unwrap());
        assert!(!catalog.edit("msg_post_success", "Posted!").unwrap());

        let body = modified_messages(&baseline, &catalog.capture());
        assert_eq!(
            body,
            json!({"messages": [{"message_key": "msg_admin_saved", "message_text": "All saved"}]})
        );
    }

    #[test]
    fn test_restore_from_snapshot() {
        let catalog = catalog();
        let baseline = catalog.capture();
        catalog.edit("msg_admin_saved", "Changed").unwrap();
        catalog.restore(&baseline).unwrap();
        assert_eq!(catalog.text("msg_admin_saved").as_deref(), Some("Saved"));
        assert_eq!(catalog.keys().len(), 2);
    }
}
