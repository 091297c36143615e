//! Intent store
//!
//! Driver-commanded boolean requests, set from the UI thread and read
//! as a consistent snapshot by the egress scheduler once per cycle.
//! This is the only shared object mutated from outside its owner's
//! loop; a single mutex guards the whole store, so no intent is ever
//! observed partially updated.

use std::collections::BTreeMap;
use std::sync::Mutex;

/// Thread-safe store of named boolean intents
pub struct IntentStore {
    values: Mutex<BTreeMap<String, bool>>,
}

impl IntentStore {
    /// Create a store; every registered intent starts inactive
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = names.into_iter().map(|n| (n.into(), false)).collect();
        Self {
            values: Mutex::new(values),
        }
    }

    /// Set an intent; callable from any thread, idempotent.
    ///
    /// An unregistered name is logged and ignored: the UI boundary is
    /// total, the binding check is the startup tx-spec validation.
    pub fn set(&self, name: &str, active: bool) {
        let mut values = self.values.lock().expect("intent store lock");
        match values.get_mut(name) {
            Some(slot) => *slot = active,
            None => log::warn!("Ignoring unknown intent '{}'", name),
        }
    }

    /// Take an internally consistent snapshot of all intents
    pub fn snapshot(&self) -> BTreeMap<String, bool> {
        self.values.lock().expect("intent store lock").clone()
    }
}
