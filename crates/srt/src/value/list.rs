use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::Value;

/// Shared, identity-bearing sequence used for both lists and tuples.
///
/// Clones alias the same elements. A container kept across runs is refreshed in
/// place with [`ValueList::refresh`] so consumers holding a clone see the update.
#[derive(Clone, Default)]
pub struct ValueList {
    items: Arc<RwLock<Vec<Value>>>,
}

impl ValueList {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: Arc::new(RwLock::new(items)),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.read().get(index).cloned()
    }

    /// Snapshot of the current elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.items.read().clone()
    }

    pub fn ptr_eq(&self, other: &ValueList) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }

    /// Overwrites the elements without changing the container identity.
    pub fn refresh(&self, values: impl IntoIterator<Item = Value>) {
        let mut items = self.items.write();
        items.clear();
        items.extend(values);
    }

    pub fn with_items<R>(&self, f: impl FnOnce(&[Value]) -> R) -> R {
        f(&self.items.read())
    }
}

impl From<Vec<Value>> for ValueList {
    fn from(items: Vec<Value>) -> Self {
        Self::new(items)
    }
}

impl fmt::Debug for ValueList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.read().iter()).finish()
    }
}
