use crate::runtime::value::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One lexical scope. Scopes form a parent chain; function values capture the
/// scope that was current when they were created, so the chain is shared and
/// bindings live behind a lock.
pub struct Scope {
    bindings: Mutex<HashMap<String, Value>>,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    pub fn root() -> Arc<Scope> {
        Arc::new(Scope {
            bindings: Mutex::new(HashMap::new()),
            parent: None,
        })
    }

    pub fn child(parent: &Arc<Scope>) -> Arc<Scope> {
        Arc::new(Scope {
            bindings: Mutex::new(HashMap::new()),
            parent: Some(parent.clone()),
        })
    }

    /// Introduce or overwrite a binding in this scope. Redeclaration is legal
    /// in the language, so this never fails.
    pub fn declare(&self, name: &str, value: Value) {
        self.bindings
            .lock()
            .unwrap()
            .insert(name.to_string(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.lock().unwrap().get(name) {
            return Some(value.clone());
        }
        match &self.parent {
            Some(parent) => parent.lookup(name),
            None => None,
        }
    }

    pub fn has(&self, name: &str) -> bool {
        if self.bindings.lock().unwrap().contains_key(name) {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.has(name),
            None => false,
        }
    }

    /// Assign to an existing binding somewhere along the chain. Returns false
    /// when the name is bound nowhere; the caller decides what that means
    /// (strictness policy lives in the link provider, not here).
    pub fn assign(&self, name: &str, value: Value) -> bool {
        {
            let mut bindings = self.bindings.lock().unwrap();
            if let Some(slot) = bindings.get_mut(name) {
                *slot = value;
                return true;
            }
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => false,
        }
    }

    pub fn global(self: &Arc<Self>) -> Arc<Scope> {
        let mut current = self.clone();
        while let Some(parent) = current.parent.clone() {
            current = parent;
        }
        current
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.bindings.lock().unwrap().keys().cloned().collect();
        f.debug_struct("Scope")
            .field("bindings", &names)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_the_parent_chain() {
        let root = Scope::root();
        root.declare("x", Value::Number(1.0));
        let inner = Scope::child(&root);
        inner.declare("y", Value::Number(2.0));

        assert!(matches!(inner.lookup("x"), Some(Value::Number(n)) if n == 1.0));
        assert!(matches!(inner.lookup("y"), Some(Value::Number(n)) if n == 2.0));
        assert!(root.lookup("y").is_none());
    }

    #[test]
    fn assign_updates_the_owning_scope() {
        let root = Scope::root();
        root.declare("x", Value::Number(1.0));
        let inner = Scope::child(&root);

        assert!(inner.assign("x", Value::Number(5.0)));
        assert!(matches!(root.lookup("x"), Some(Value::Number(n)) if n == 5.0));
        assert!(!inner.assign("missing", Value::Null));
    }

    #[test]
    fn global_reaches_the_chain_root() {
        let root = Scope::root();
        let a = Scope::child(&root);
        let b = Scope::child(&a);
        assert!(Arc::ptr_eq(&b.global(), &root));
    }
}
