// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::ops::Index;

/// Index of an object allocated in a [`PerFlushArena`].
///
/// Only meaningful until the arena is reset at the end of the flush.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DrawId(pub(crate) u32);

impl DrawId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Bump allocator for objects that live exactly as long as one flush.
///
/// Objects are appended and referenced by [`DrawId`]; nothing is freed
/// individually. [`reset`](Self::reset) drops everything at once and keeps
/// the allocation for the next flush.
#[derive(Debug)]
pub struct PerFlushArena<T> {
    items: Vec<T>,
}

impl<T> Default for PerFlushArena<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> PerFlushArena<T> {
    /// The ID the next allocation will receive.
    pub fn next_id(&self) -> DrawId {
        DrawId(self.items.len() as u32)
    }

    pub fn alloc(&mut self, item: T) -> DrawId {
        let id = self.next_id();
        self.items.push(item);
        id
    }

    pub fn get(&self, id: DrawId) -> Option<&T> {
        self.items.get(id.index())
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn reset(&mut self) {
        self.items.clear();
    }
}

impl<T> Index<DrawId> for PerFlushArena<T> {
    type Output = T;

    fn index(&self, id: DrawId) -> &T {
        &self.items[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense_and_reset_per_flush() {
        let mut arena = PerFlushArena::default();
        assert_eq!(arena.next_id(), DrawId(0));
        let a = arena.alloc("a");
        let b = arena.alloc("b");
        assert_eq!((a.index(), b.index()), (0, 1));
        assert_eq!(arena[b], "b");
        arena.reset();
        assert!(arena.is_empty());
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.alloc("c"), DrawId(0));
    }
}
