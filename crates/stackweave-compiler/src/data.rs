//! Typed, scoped key/value storage.
//!
//! [`DataScopes`] is a chain of scopes. Lookups search from the innermost
//! scope outwards; writes go to the innermost scope unless they explicitly
//! target an ancestor. Values are keyed by a typed [`Key`], so a lookup
//! always yields the type the key was declared with.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use rustc_hash::FxHashMap;

/// A typed key into [`DataScopes`]. Keys compare by name.
pub struct Key<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.name)
    }
}

type Scope = FxHashMap<&'static str, Box<dyn Any>>;

/// A chain of scopes; the root scope is never popped.
pub struct DataScopes {
    scopes: Vec<Scope>,
}

impl Default for DataScopes {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DataScopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<Vec<&str>> = self
            .scopes
            .iter()
            .map(|scope| scope.keys().copied().collect())
            .collect();
        f.debug_struct("DataScopes").field("scopes", &keys).finish()
    }
}

impl DataScopes {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Drop the innermost scope and its values. The root scope stays.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Index of the innermost scope; the root is 0.
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Nearest value for `key`, searching outwards.
    pub fn get<T: 'static>(&self, key: Key<T>) -> Option<&T> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(key.name))
            .and_then(|value| value.downcast_ref())
    }

    /// Every value for `key`, innermost first.
    pub fn get_all<T: 'static>(&self, key: Key<T>) -> Vec<&T> {
        self.scopes
            .iter()
            .rev()
            .filter_map(|scope| scope.get(key.name))
            .filter_map(|value| value.downcast_ref())
            .collect()
    }

    /// Store `value` in the innermost scope.
    pub fn set<T: 'static>(&mut self, key: Key<T>, value: T) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(key.name, Box::new(value));
        }
    }

    /// Store `value` in the scope at `depth`. Returns false if there is no
    /// such scope.
    pub fn set_in<T: 'static>(&mut self, depth: usize, key: Key<T>, value: T) -> bool {
        match self.scopes.get_mut(depth) {
            Some(scope) => {
                scope.insert(key.name, Box::new(value));
                true
            }
            None => false,
        }
    }

    pub fn set_root<T: 'static>(&mut self, key: Key<T>, value: T) {
        self.set_in(0, key, value);
    }

    /// Remove `key` from the innermost scope only.
    pub fn remove<T: 'static>(&mut self, key: Key<T>) -> Option<T> {
        let value = self.scopes.last_mut()?.remove(key.name)?;
        value.downcast().ok().map(|boxed| *boxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNT: Key<u32> = Key::new("count");
    const LABEL: Key<String> = Key::new("label");

    #[test]
    fn child_falls_back_to_parent() {
        let mut data = DataScopes::new();
        data.set(COUNT, 1);
        data.push_scope();
        assert_eq!(data.get(COUNT), Some(&1));

        data.set(COUNT, 2);
        assert_eq!(data.get(COUNT), Some(&2));
        assert_eq!(data.get_all(COUNT), vec![&2, &1]);

        data.pop_scope();
        assert_eq!(data.get(COUNT), Some(&1));
    }

    #[test]
    fn writes_can_target_ancestors() {
        let mut data = DataScopes::new();
        data.push_scope();
        data.push_scope();
        data.set_root(LABEL, "root".to_string());
        assert!(data.set_in(1, COUNT, 7));
        assert!(!data.set_in(5, COUNT, 8));

        data.pop_scope();
        assert_eq!(data.get(COUNT), Some(&7));
        data.pop_scope();
        assert_eq!(data.get(COUNT), None);
        assert_eq!(data.get(LABEL).map(String::as_str), Some("root"));
    }

    #[test]
    fn root_scope_is_never_popped() {
        let mut data = DataScopes::new();
        data.set(COUNT, 3);
        data.pop_scope();
        assert_eq!(data.depth(), 0);
        assert_eq!(data.get(COUNT), Some(&3));
    }

    #[test]
    fn remove_only_touches_innermost() {
        let mut data = DataScopes::new();
        data.set(COUNT, 1);
        data.push_scope();
        assert_eq!(data.remove(COUNT), None);
        data.set(COUNT, 2);
        assert_eq!(data.remove(COUNT), Some(2));
        assert_eq!(data.get(COUNT), Some(&1));
    }
}
