//! Index-addressed entity pools.
//!
//! A [`Pool`] is a dense vector of optional slots. A record's ID is its slot
//! index; removing a record empties the slot, and the ID is not handed out
//! again during the same load unless the slot is explicitly refilled.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::id::PoolId;

/// Errors raised by pool allocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("pool is full ({limit} slots)")]
    Full { limit: usize },
    #[error("slot {index} is already occupied")]
    Occupied { index: usize },
    #[error("slot {index} exceeds the pool limit of {limit}")]
    OutOfRange { index: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct Pool<I, T> {
    slots: Vec<Option<T>>,
    limit: usize,
    #[serde(skip)]
    _id: PhantomData<I>,
}

impl<I: PoolId, T> Pool<I, T> {
    /// Create an empty pool that can hold at most `limit` records.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            slots: Vec::new(),
            limit,
            _id: PhantomData,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of valid records.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Returns `true` if `n` more records fit.
    pub fn can_allocate(&self, n: usize) -> bool {
        self.len() + n <= self.limit
    }

    /// Store a record in the first free slot.
    pub fn insert(&mut self, item: T) -> Result<I, PoolError> {
        if let Some(index) = self.slots.iter().position(Option::is_none) {
            self.slots[index] = Some(item);
            return Ok(I::from_index(index));
        }
        if self.slots.len() >= self.limit {
            return Err(PoolError::Full { limit: self.limit });
        }
        self.slots.push(Some(item));
        Ok(I::from_index(self.slots.len() - 1))
    }

    /// Store a record at a specific ID, as the chunk decoder does.
    pub fn insert_at(&mut self, id: I, item: T) -> Result<(), PoolError> {
        let index = id.index();
        if index >= self.limit {
            return Err(PoolError::OutOfRange {
                index,
                limit: self.limit,
            });
        }
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        if self.slots[index].is_some() {
            return Err(PoolError::Occupied { index });
        }
        self.slots[index] = Some(item);
        Ok(())
    }

    pub fn get(&self, id: I) -> Option<&T> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    /// Remove a record. Trailing empty slots are kept so IDs stay stable.
    pub fn remove(&mut self, id: I) -> Option<T> {
        self.slots.get_mut(id.index()).and_then(Option::take)
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Iterate valid records in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|t| (I::from_index(i), t)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (I, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.as_mut().map(|t| (I::from_index(i), t)))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    /// Snapshot of valid IDs, for loops that mutate other pools.
    pub fn ids(&self) -> Vec<I> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Keep only the records for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(I, &mut T) -> bool) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Some(item) = slot {
                if !keep(I::from_index(i), item) {
                    *slot = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::TownId;

    #[test]
    fn insert_fills_first_free_slot() {
        let mut pool: Pool<TownId, &str> = Pool::with_limit(8);
        let a = pool.insert("a").unwrap();
        let b = pool.insert("b").unwrap();
        assert_eq!((a, b), (TownId(0), TownId(1)));

        pool.remove(a);
        assert_eq!(pool.insert("c").unwrap(), TownId(0));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn dangling_lookup_is_none() {
        let mut pool: Pool<TownId, u32> = Pool::with_limit(8);
        pool.insert_at(TownId(3), 30).unwrap();
        assert_eq!(pool.get(TownId(3)), Some(&30));
        assert_eq!(pool.get(TownId(2)), None);
        assert_eq!(pool.get(TownId(100)), None);
    }

    #[test]
    fn insert_at_rejects_occupied_and_out_of_range() {
        let mut pool: Pool<TownId, u32> = Pool::with_limit(4);
        pool.insert_at(TownId(1), 1).unwrap();
        assert_eq!(
            pool.insert_at(TownId(1), 2),
            Err(PoolError::Occupied { index: 1 })
        );
        assert_eq!(
            pool.insert_at(TownId(4), 2),
            Err(PoolError::OutOfRange { index: 4, limit: 4 })
        );
    }

    #[test]
    fn full_pool_reports_error() {
        let mut pool: Pool<TownId, u32> = Pool::with_limit(2);
        pool.insert(1).unwrap();
        pool.insert(2).unwrap();
        assert!(!pool.can_allocate(1));
        assert_eq!(pool.insert(3), Err(PoolError::Full { limit: 2 }));
    }

    #[test]
    fn iteration_skips_empty_slots() {
        let mut pool: Pool<TownId, u32> = Pool::with_limit(8);
        pool.insert_at(TownId(0), 0).unwrap();
        pool.insert_at(TownId(5), 5).unwrap();
        let ids: Vec<_> = pool.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![TownId(0), TownId(5)]);

        pool.retain(|id, _| id != TownId(0));
        assert_eq!(pool.ids(), vec![TownId(5)]);
    }
}
