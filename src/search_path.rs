use std::{fmt, sync::Arc};

use parking_lot::RwLock;

/// Ordered list of directories consulted by `load`.
///
/// Clones share the same underlying sequence, so the root `load` binding and
/// its `core` mirror always observe each other's changes. Reads and writes go
/// through a lock, which keeps the sequence consistent when several
/// interpreters on different threads share one path.
#[derive(Clone, Default)]
pub struct SearchPath {
    dirs: Arc<RwLock<Vec<String>>>,
}

impl SearchPath {
    pub fn new<I, S>(dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dirs: Arc::new(RwLock::new(dirs.into_iter().map(Into::into).collect())),
        }
    }

    /// Copy of the current entries; resolution walks this instead of holding
    /// the lock while scripts run.
    pub fn snapshot(&self) -> Vec<String> {
        self.dirs.read().clone()
    }

    pub fn len(&self) -> usize {
        self.dirs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<String> {
        self.dirs.read().get(index).cloned()
    }

    pub fn push(&self, dir: impl Into<String>) {
        self.dirs.write().push(dir.into());
    }

    /// Inserts before `index`; returns `false` when `index` is past the end.
    pub fn insert(&self, index: usize, dir: impl Into<String>) -> bool {
        let mut dirs = self.dirs.write();
        if index > dirs.len() {
            return false;
        }
        dirs.insert(index, dir.into());
        true
    }

    pub fn set(&self, index: usize, dir: impl Into<String>) -> bool {
        match self.dirs.write().get_mut(index) {
            Some(slot) => {
                *slot = dir.into();
                true
            }
            None => false,
        }
    }

    pub fn pop(&self) -> Option<String> {
        self.dirs.write().pop()
    }

    pub fn same_as(&self, other: &SearchPath) -> bool {
        Arc::ptr_eq(&self.dirs, &other.dirs)
    }
}

impl fmt::Debug for SearchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.dirs.read().iter()).finish()
    }
}
