use super::index_trait::IndexRef;
use std::{marker::PhantomData, ops};

/// A dense map from keys of type `K` to data of type `D`. Keys are handed out
/// by [IndexedMap::push] in allocation order and are never invalidated: the
/// map only grows.
#[derive(Debug, Clone)]
pub struct IndexedMap<K, D>
where
    K: IndexRef,
{
    data: Vec<D>,
    phantom: PhantomData<K>,
}

impl<K, D> ops::IndexMut<K> for IndexedMap<K, D>
where
    K: IndexRef,
{
    fn index_mut(&mut self, index: K) -> &mut Self::Output {
        &mut self.data[index.index()]
    }
}

impl<K, D> ops::Index<K> for IndexedMap<K, D>
where
    K: IndexRef,
{
    type Output = D;

    fn index(&self, index: K) -> &Self::Output {
        &self.data[index.index()]
    }
}

impl<K, D> IndexedMap<K, D>
where
    K: IndexRef,
{
    pub fn with_capacity(size: usize) -> Self {
        Self {
            data: Vec::with_capacity(size),
            phantom: PhantomData,
        }
    }

    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            phantom: PhantomData,
        }
    }

    pub fn get(&self, index: K) -> Option<&D> {
        self.data.get(index.index())
    }

    /// Add a new item and return the key it was stored under.
    pub fn push(&mut self, item: D) -> K {
        let idx = K::new(self.data.len());
        self.data.push(item);
        idx
    }

    /// The key the next [IndexedMap::push] will return.
    pub fn peek_next_idx(&self) -> K {
        K::new(self.data.len())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = K> {
        (0..self.data.len()).map(K::new)
    }

    pub fn values(&self) -> impl Iterator<Item = &D> {
        self.data.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &D)> {
        self.data.iter().enumerate().map(|(i, v)| (K::new(i), v))
    }
}

impl<K, D> Default for IndexedMap<K, D>
where
    K: IndexRef,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impl_index;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct TestIdx(u32);
    impl_index!(TestIdx);

    proptest! {
        #[test]
        fn pushed_items_are_retrievable(items in prop::collection::vec(any::<u64>(), 0..64)) {
            let mut map: IndexedMap<TestIdx, u64> = IndexedMap::new();
            let keys: Vec<_> = items.iter().map(|i| map.push(*i)).collect();
            prop_assert_eq!(map.len(), items.len());
            for (key, item) in keys.iter().zip(items.iter()) {
                prop_assert_eq!(map[*key], *item);
            }
            prop_assert!(map.get(TestIdx(items.len() as u32)).is_none());
        }
    }

    #[test]
    fn keys_follow_allocation_order() {
        let mut map: IndexedMap<TestIdx, &str> = IndexedMap::new();
        assert_eq!(map.peek_next_idx(), TestIdx(0));
        let a = map.push("a");
        let b = map.push("b");
        assert_eq!((a, b), (TestIdx(0), TestIdx(1)));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec![a, b]);
        map[b] = "c";
        assert_eq!(map.values().copied().collect::<Vec<_>>(), vec!["a", "c"]);
    }
}
