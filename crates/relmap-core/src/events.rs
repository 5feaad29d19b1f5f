//! Lifecycle event hooks.
//!
//! Hooks are plain subscriber lists per (model, event kind). A hook may
//! set the prevent-default flag on the event it receives; the save/delete
//! orchestration checks that flag before performing the default action.
//! Vetoing is a control signal, never an error.

use crate::value::Value;
use std::collections::BTreeMap;
use std::collections::HashMap;

/// The lifecycle points a hook can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PreSave,
    PostSave,
    PreDelete,
    PostDelete,
}

/// An event delivered to hooks, carrying a read-only view of the record.
#[derive(Debug)]
pub struct Event<'a> {
    kind: EventKind,
    model: &'a str,
    values: &'a BTreeMap<String, Value>,
    prevented: bool,
}

impl<'a> Event<'a> {
    /// Event kind.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Model the record belongs to.
    pub fn model(&self) -> &str {
        self.model
    }

    /// Current column values of the record.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        self.values
    }

    /// Veto the default action for this event.
    pub fn prevent_default(&mut self) {
        self.prevented = true;
    }

    /// Whether any hook vetoed the default action.
    pub fn is_prevented(&self) -> bool {
        self.prevented
    }
}

/// A subscribed lifecycle hook.
pub type Hook = Box<dyn Fn(&mut Event<'_>) + Send + Sync>;

/// Ordered hook subscriber lists per (model, event kind).
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<(String, EventKind), Vec<Hook>>,
}

impl HookRegistry {
    /// Create an empty hook registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a hook; hooks run in subscription order.
    pub fn subscribe<F>(&mut self, model: impl Into<String>, kind: EventKind, hook: F)
    where
        F: Fn(&mut Event<'_>) + Send + Sync + 'static,
    {
        self.hooks
            .entry((model.into(), kind))
            .or_default()
            .push(Box::new(hook));
    }

    /// Emit an event to every subscriber, returning true when any hook
    /// vetoed the default action.
    pub fn emit(&self, kind: EventKind, model: &str, values: &BTreeMap<String, Value>) -> bool {
        let Some(hooks) = self.hooks.get(&(model.to_string(), kind)) else {
            return false;
        };
        let mut event = Event {
            kind,
            model,
            values,
            prevented: false,
        };
        for hook in hooks {
            hook(&mut event);
        }
        event.is_prevented()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("subscriptions", &self.hooks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn veto_flag() {
        let mut registry = HookRegistry::new();
        registry.subscribe("User", EventKind::PreDelete, |event| {
            if event.values().get("protected") == Some(&Value::Bool(true)) {
                event.prevent_default();
            }
        });

        let mut values = BTreeMap::new();
        values.insert("protected".to_string(), Value::Bool(true));
        assert!(registry.emit(EventKind::PreDelete, "User", &values));

        values.insert("protected".to_string(), Value::Bool(false));
        assert!(!registry.emit(EventKind::PreDelete, "User", &values));
    }

    #[test]
    fn hooks_run_in_order() {
        use std::sync::Mutex;
        use std::sync::Arc;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            registry.subscribe("User", EventKind::PreSave, move |_| {
                seen.lock().unwrap().push(tag);
            });
        }
        registry.emit(EventKind::PreSave, "User", &BTreeMap::new());
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn unknown_model_is_silent() {
        let registry = HookRegistry::new();
        assert!(!registry.emit(EventKind::PostSave, "Ghost", &BTreeMap::new()));
    }
}
