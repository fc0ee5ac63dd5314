//! # Property Store
//!
//! Holds the component's current properties. Values start out as the defaults from
//! [`ComponentOptions`](crate::component::ComponentOptions), get the owner's initial
//! set merged in at handshake, and then every `Props` message merges a delta on top.
//!
//! Merges are shallow: keys present in the delta replace the stored value, keys absent
//! from the delta are left alone. Nothing is ever removed.

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Property bag: string keys to arbitrary JSON values.
pub type Props = Map<String, Value>;

type ChangeHook = Arc<dyn Fn(&Props) + Send + Sync>;

pub struct PropertyStore {
    values: RwLock<Props>,
    on_change: Option<ChangeHook>,
}

impl PropertyStore {
    pub fn new(defaults: Props) -> Self {
        Self {
            values: RwLock::new(defaults),
            on_change: None,
        }
    }

    /// Called once after every [`merge`](Self::merge) with the merged values.
    pub fn with_change_hook(mut self, hook: impl Fn(&Props) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Arc::new(hook));
        self
    }

    /// Merges `delta` and fires the change hook exactly once, even for an empty delta.
    pub fn merge(&self, delta: Props) {
        self.apply(delta);
        self.notify();
    }

    /// Merges without notifying. The handshake uses this to get the owner's initial
    /// props in place before `on_enter` runs.
    pub(crate) fn apply(&self, delta: Props) {
        let mut values = self.values.write();
        for (key, value) in delta {
            values.insert(key, value);
        }
    }

    /// Fires the change hook on a snapshot, so no lock is held while it runs.
    pub(crate) fn notify(&self) {
        if let Some(hook) = &self.on_change {
            let snapshot = self.snapshot();
            hook(&snapshot);
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    pub fn snapshot(&self) -> Props {
        self.values.read().clone()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl Default for PropertyStore {
    fn default() -> Self {
        Self::new(Props::new())
    }
}

impl fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyStore")
            .field("values", &*self.values.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn props(value: Value) -> Props {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn merges_are_shallow_and_keep_absent_keys() {
        let store = PropertyStore::new(props(json!({ "a": 0, "b": 0 })));
        store.merge(props(json!({ "a": 1 })));
        store.merge(props(json!({ "b": 2, "c": { "nested": true } })));
        store.merge(props(json!({ "c": { "other": 1 } })));

        assert_eq!(
            Value::Object(store.snapshot()),
            json!({ "a": 1, "b": 2, "c": { "other": 1 } })
        );
    }

    #[test]
    fn hook_fires_once_per_merge_including_empty() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = {
            let calls = calls.clone();
            PropertyStore::default().with_change_hook(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        store.merge(props(json!({ "a": 1, "b": 2, "c": 3 })));
        store.merge(Props::new());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        store.apply(props(json!({ "d": 4 })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.get("d"), Some(json!(4)));
    }

    #[test]
    fn hook_sees_each_merged_state() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let store = {
            let seen = seen.clone();
            PropertyStore::new(props(json!({ "n": 0, "label": "x" })))
                .with_change_hook(move |values| seen.lock().push(Value::Object(values.clone())))
        };

        store.merge(props(json!({ "n": 1 })));
        store.merge(props(json!({ "n": 2 })));
        assert_eq!(
            *seen.lock(),
            vec![
                json!({ "n": 1, "label": "x" }),
                json!({ "n": 2, "label": "x" }),
            ]
        );
    }
}
