use std::{fmt, hash::Hash, marker::PhantomData};

/// Typed index into an [`Assets`] store.
pub struct Handle<T> {
    idx: usize,
    _p: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub fn index(&self) -> usize {
        self.idx
    }
}

/// Append-only store; handles stay valid for the lifetime of the store.
pub struct Assets<T> {
    items: Vec<T>,
}

impl<T> Assets<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, item: T) -> Handle<T> {
        let idx = self.items.len();
        self.items.push(item);
        Handle {
            idx,
            _p: PhantomData,
        }
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.items.get(handle.idx)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.items.iter().enumerate().map(|(idx, item)| {
            (
                Handle {
                    idx,
                    _p: PhantomData,
                },
                item,
            )
        })
    }
}

impl<T> Default for Assets<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Copy for Handle<T> {}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

// manual impls so that handles compare and print without bounds on `T`
impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.idx == other.idx
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.idx.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.idx).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_stable() {
        let mut assets = Assets::new();
        let a = assets.push("a");
        let b = assets.push("b");

        assert_eq!(assets.len(), 2);
        assert_eq!(assets.get(a), Some(&"a"));
        assert_eq!(assets.get(b), Some(&"b"));
        assert_eq!(b.index(), 1);

        let collected: Vec<_> = assets.iter().map(|(h, item)| (h.index(), *item)).collect();
        assert_eq!(collected, [(0, "a"), (1, "b")]);
    }
}
