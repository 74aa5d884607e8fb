use std::collections::BTreeMap;

use crate::lang::ast::Identifier;

/// Flat name-to-value bindings for one function invocation.
///
/// There is deliberately no parent chain: a callee sees only its own
/// parameters and whatever it assigns itself, never the caller's bindings.
pub struct Scope<T> {
    inner: BTreeMap<Identifier, T>,
}

impl<T> Scope<T> {
    pub fn new() -> Self {
        Scope {
            inner: BTreeMap::new(),
        }
    }

    pub fn get(&self, ident: &Identifier) -> Option<&T> {
        self.inner.get(ident)
    }

    pub fn insert(&mut self, ident: Identifier, val: T) {
        self.inner.insert(ident, val);
    }
}

impl<T> Default for Scope<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[test]
fn test_insert_overwrites() {
    let mut scope: Scope<i64> = Scope::new();
    let x = Identifier("x".to_string());

    assert!(scope.get(&x).is_none());

    scope.insert(x.clone(), 1);
    assert_eq!(scope.get(&x), Some(&1));

    scope.insert(x.clone(), 2);
    assert_eq!(scope.get(&x), Some(&2));
}
