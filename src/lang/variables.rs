use std::collections::BTreeMap;

use crate::lang::ast::Identifier;

/// Scope chain
///
/// The global scope lives as long as the interpreter. Every function call pushes a scope on
/// top of whatever scope its caller runs in and pops it on return, so name resolution is
/// dynamic: a function body sees its caller's locals.
pub struct Variables<T> {
    global: BTreeMap<Identifier, T>,
    locals: Vec<BTreeMap<Identifier, T>>,
}

impl<T> Variables<T> {
    pub fn new() -> Self {
        Variables {
            global: BTreeMap::default(),
            locals: Vec::new(),
        }
    }

    pub fn push_scope(&mut self) {
        self.locals.push(BTreeMap::default());
    }

    /// Pop the innermost call scope. The global scope is never popped
    pub fn pop_scope(&mut self) {
        assert!(!self.locals.is_empty());
        self.locals.pop();
    }

    /// Number of call scopes on top of the global one
    pub fn depth(&self) -> usize {
        self.locals.len()
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        for scope in self.locals.iter().rev() {
            if let Some(val) = scope.get(name) {
                return Some(val);
            }
        }

        self.global.get(name)
    }

    pub fn is_global(&self, name: &str) -> bool {
        self.global.contains_key(name)
    }

    /// Bind `ident` in the innermost scope
    pub fn insert(&mut self, ident: Identifier, val: T) {
        let scope = match self.locals.last_mut() {
            Some(scope) => scope,
            None => &mut self.global,
        };

        scope.insert(ident, val);
    }
}

#[cfg(test)]
fn ident(name: &str) -> Identifier {
    Identifier::new(name).expect("Invalid identifier")
}

#[test]
fn test_scopes() {
    let mut vars = Variables::new();
    vars.insert(ident("x"), 1);
    vars.insert(ident("y"), 2);
    assert_eq!(vars.depth(), 0);

    vars.push_scope();
    vars.insert(ident("x"), 10);
    assert_eq!(vars.get("x"), Some(&10));
    assert_eq!(vars.get("y"), Some(&2));
    assert!(vars.is_global("x"));

    vars.push_scope();
    vars.insert(ident("z"), 3);
    assert_eq!(vars.depth(), 2);
    assert_eq!(vars.get("x"), Some(&10));
    assert_eq!(vars.get("z"), Some(&3));

    vars.pop_scope();
    assert_eq!(vars.get("z"), None);
    assert!(!vars.is_global("z"));

    vars.pop_scope();
    assert_eq!(vars.get("x"), Some(&1));
    assert_eq!(vars.depth(), 0);
}
