//! Dense per-kind component storage
//!
//! A sparse set: `sparse[entity.index]` points into the packed `ids`/`data`
//! arrays, so iteration walks contiguous memory and removal is a swap-remove.

use crate::core::types::EntityId;

#[derive(Debug, Clone)]
pub struct ComponentTable<T> {
    sparse: Vec<Option<usize>>,
    ids: Vec<EntityId>,
    data: Vec<T>,
}

impl<T> ComponentTable<T> {
    pub fn new() -> Self {
        Self {
            sparse: Vec::new(),
            ids: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[inline]
    fn dense_index(&self, entity: EntityId) -> Option<usize> {
        let dense = (*self.sparse.get(entity.index as usize)?)?;
        (self.ids[dense] == entity).then_some(dense)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.dense_index(entity).is_some()
    }

    /// Insert or overwrite; returns the previous value
    pub fn insert(&mut self, entity: EntityId, value: T) -> Option<T> {
        if let Some(dense) = self.dense_index(entity) {
            return Some(std::mem::replace(&mut self.data[dense], value));
        }

        let slot = entity.index as usize;
        if slot >= self.sparse.len() {
            self.sparse.resize(slot + 1, None);
        }
        self.sparse[slot] = Some(self.ids.len());
        self.ids.push(entity);
        self.data.push(value);
        None
    }

    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.dense_index(entity).map(|dense| &self.data[dense])
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        let dense = self.dense_index(entity)?;
        Some(&mut self.data[dense])
    }

    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        let dense = self.dense_index(entity)?;
        self.sparse[entity.index as usize] = None;

        self.ids.swap_remove(dense);
        let value = self.data.swap_remove(dense);
        if let Some(&moved) = self.ids.get(dense) {
            self.sparse[moved.index as usize] = Some(dense);
        }
        Some(value)
    }

    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.ids.iter().copied().zip(self.data.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> + '_ {
        self.ids.iter().copied().zip(self.data.iter_mut())
    }

    pub fn clear(&mut self) {
        self.sparse.clear();
        self.ids.clear();
        self.data.clear();
    }
}

impl<T> Default for ComponentTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
