//! Hierarchical, page-oriented item cache.
//!
//! An [`ItemCache`] owns one level's lazily-loaded item list: a sparse store
//! of loaded items indexed by their position within the level, the known (or
//! placeholder) total count for the level, the set of in-flight page
//! requests, and one owned sub-cache per expanded item. Sub-caches are keyed
//! by the item's stable [`ItemKey`] and destroyed when the item is collapsed,
//! unloaded, or the cache is cleared.
//!
//! The cache also maintains the flattened view of its subtree: `flat_size`
//! (this level's count plus every expanded descendant level's, in depth-first
//! visual order) and an ordered snapshot of expanded positions that lets the
//! flat-index walkers run in O(expanded siblings per level) instead of
//! O(flat size).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use super::provider::{CacheId, ItemKey};

/// Counter for generating cache generation ids.
static CACHE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_cache_id() -> CacheId {
    CacheId(CACHE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// The resolved context of one flat index.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndexContext<T> {
    /// The item at this position, or `None` if its page is not loaded yet.
    pub item: Option<T>,
    /// Depth of the owning level; 0 is the root.
    pub level: usize,
    /// Generation id of the owning cache.
    pub cache: CacheId,
    /// Position within the owning level.
    pub index: usize,
}

/// One level's page-oriented item store.
pub(crate) struct ItemCache<T> {
    /// Generation id; reallocated by [`clear`](Self::clear) so responses
    /// addressed to the old generation become inert.
    id: CacheId,
    /// Loaded items by level-local index. Sparse: holes are unloaded slots.
    items: BTreeMap<usize, T>,
    /// Known total count for this level (0 until established).
    size: usize,
    /// Pages with an outstanding provider request.
    pending_pages: HashSet<usize>,
    /// Sub-caches of expanded items, keyed by stable item identity.
    sub_caches: HashMap<ItemKey, ItemCache<T>>,
    /// Cached recursive size of this subtree.
    flat_size: usize,
    /// `(local index, key)` of expanded items that own a sub-cache, in
    /// ascending index order. Rebuilt by [`recalculate_size`](Self::recalculate_size).
    expanded_entries: Vec<(usize, ItemKey)>,
}

impl<T: Clone> ItemCache<T> {
    /// Create an empty cache with the given (possibly placeholder) size.
    pub(crate) fn new(size: usize) -> Self {
        Self {
            id: next_cache_id(),
            items: BTreeMap::new(),
            size,
            pending_pages: HashSet::new(),
            sub_caches: HashMap::new(),
            flat_size: size,
            expanded_entries: Vec::new(),
        }
    }

    pub(crate) fn id(&self) -> CacheId {
        self.id
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn set_size(&mut self, size: usize) {
        self.size = size;
        // Drop loaded items that fell beyond the new end.
        self.items.retain(|&index, _| index < size);
    }

    /// Total visible row count of this subtree, as of the last
    /// [`recalculate_size`](Self::recalculate_size).
    pub(crate) fn flat_size(&self) -> usize {
        self.flat_size
    }

    /// The item at `index` within this level, if loaded. Never triggers
    /// loading.
    pub(crate) fn item(&self, index: usize) -> Option<&T> {
        self.items.get(&index)
    }

    /// Write one page of items starting at `page * page_size`, and mark the
    /// page no longer pending.
    pub(crate) fn set_page(&mut self, page: usize, page_size: usize, items: Vec<T>) {
        let start = page * page_size;
        for (offset, item) in items.into_iter().enumerate() {
            self.items.insert(start + offset, item);
        }
        self.pending_pages.remove(&page);
    }

    /// Whether every slot of `page` within the known size is loaded.
    ///
    /// While the size is still unestablished nothing counts as loaded, so
    /// the first request always goes out.
    pub(crate) fn is_page_loaded(&self, page: usize, page_size: usize) -> bool {
        if self.size == 0 {
            return false;
        }
        let start = page * page_size;
        let end = ((page + 1) * page_size).min(self.size);
        if start >= end {
            return true;
        }
        (start..end).all(|index| self.items.contains_key(&index))
    }

    /// Record an outstanding request for `page`. Returns `false` if one is
    /// already in flight.
    pub(crate) fn mark_pending(&mut self, page: usize) -> bool {
        self.pending_pages.insert(page)
    }

    pub(crate) fn is_page_pending(&self, page: usize) -> bool {
        self.pending_pages.contains(&page)
    }

    /// Whether any page request is outstanding in this subtree.
    pub(crate) fn any_pending(&self) -> bool {
        !self.pending_pages.is_empty() || self.sub_caches.values().any(ItemCache::any_pending)
    }

    /// Create a sub-cache for the loaded, expanded item at `index` if it has
    /// none yet. Returns the sub-cache's key and generation id when one was
    /// created (the caller then requests its first page).
    pub(crate) fn ensure_sub_cache(
        &mut self,
        index: usize,
        key_fn: &dyn Fn(&T) -> ItemKey,
        expanded_fn: &dyn Fn(&T) -> bool,
    ) -> Option<(ItemKey, CacheId)> {
        let item = self.items.get(&index)?;
        if !expanded_fn(item) {
            return None;
        }
        let key = key_fn(item);
        if self.sub_caches.contains_key(&key) {
            return None;
        }
        let sub = ItemCache::new(0);
        let sub_id = sub.id;
        self.sub_caches.insert(key, sub);
        Some((key, sub_id))
    }

    pub(crate) fn sub_cache(&self, key: ItemKey) -> Option<&ItemCache<T>> {
        self.sub_caches.get(&key)
    }

    /// Remove (and drop) the sub-cache owned by `key`, recursively discarding
    /// its descendants. Returns `true` if one existed.
    pub(crate) fn remove_sub_cache(&mut self, key: ItemKey) -> bool {
        self.sub_caches.remove(&key).is_some()
    }

    /// Remove the sub-cache owned by `key` wherever it lives in this subtree.
    pub(crate) fn remove_sub_cache_deep(&mut self, key: ItemKey) -> bool {
        if self.remove_sub_cache(key) {
            return true;
        }
        self.sub_caches
            .values_mut()
            .any(|sub| sub.remove_sub_cache_deep(key))
    }

    /// The expanded item that owns the cache with generation id `id`, if that
    /// cache is a descendant of this one.
    pub(crate) fn parent_item_of(&self, id: CacheId) -> Option<&T> {
        for &(index, key) in &self.expanded_entries {
            let sub = &self.sub_caches[&key];
            if sub.id == id {
                return self.items.get(&index);
            }
            if let Some(item) = sub.parent_item_of(id) {
                return Some(item);
            }
        }
        None
    }

    /// Discard all loaded items, pending requests and sub-caches while
    /// preserving `size`.
    ///
    /// A fresh generation id is allocated, so responses to requests issued
    /// against the old generation have no observable effect.
    pub(crate) fn clear(&mut self) {
        self.id = next_cache_id();
        self.items.clear();
        self.pending_pages.clear();
        self.sub_caches.clear();
        self.expanded_entries.clear();
        self.flat_size = self.size;
    }

    /// Recompute `flat_size` top-down and rebuild the expanded-entry
    /// snapshot. Idempotent; also prunes sub-caches whose owning item is no
    /// longer loaded or no longer expanded.
    pub(crate) fn recalculate_size(
        &mut self,
        key_fn: &dyn Fn(&T) -> ItemKey,
        expanded_fn: &dyn Fn(&T) -> bool,
    ) -> usize {
        let mut entries = Vec::new();
        let mut descendants = 0;
        for (&index, item) in &self.items {
            if !expanded_fn(item) {
                continue;
            }
            let key = key_fn(item);
            if let Some(sub) = self.sub_caches.get_mut(&key) {
                descendants += sub.recalculate_size(key_fn, expanded_fn);
                entries.push((index, key));
            }
        }

        let live: HashSet<ItemKey> = entries.iter().map(|&(_, key)| key).collect();
        self.sub_caches.retain(|key, _| live.contains(key));

        self.expanded_entries = entries;
        self.flat_size = self.size + descendants;
        self.flat_size
    }

    /// Resolve the row at `offset` (relative to this cache's first row) to
    /// its owning cache and level-local index.
    ///
    /// `offset` must be below `flat_size`; the controller clamps before
    /// calling.
    pub(crate) fn context_at(&self, offset: usize, level: usize) -> FlatIndexContext<T> {
        // `consumed` counts descendant rows of expanded items that precede
        // the current position at this level.
        let mut consumed = 0;
        for &(index, key) in &self.expanded_entries {
            let position = index + consumed;
            if offset <= position {
                break;
            }
            let sub = &self.sub_caches[&key];
            if offset <= position + sub.flat_size {
                return sub.context_at(offset - position - 1, level + 1);
            }
            consumed += sub.flat_size;
        }

        let index = offset - consumed;
        FlatIndexContext {
            item: self.items.get(&index).cloned(),
            level,
            cache: self.id,
            index,
        }
    }

    /// Compute the flat offset (relative to this cache's first row) of the
    /// row addressed by per-level indices.
    ///
    /// `usize::MAX` is the "last item at this level" sentinel. Levels whose
    /// size is unknown resolve best-effort: the path stops descending where
    /// no sub-cache exists yet, and the caller re-resolves once more data is
    /// loaded.
    pub(crate) fn flat_index_of_path(&self, path: &[usize]) -> usize {
        let Some(&head) = path.first() else {
            return 0;
        };
        let index = head.min(self.size.saturating_sub(1));

        let mut offset = 0;
        let mut sub_of_index = None;
        for &(entry_index, key) in &self.expanded_entries {
            if entry_index < index {
                offset += self.sub_caches[&key].flat_size;
            } else {
                if entry_index == index {
                    sub_of_index = Some(key);
                }
                break;
            }
        }

        let base = index + offset;
        match (path.len() > 1, sub_of_index) {
            (true, Some(key)) => base + 1 + self.sub_caches[&key].flat_index_of_path(&path[1..]),
            _ => base,
        }
    }

    /// Find the cache with generation id `id` in this subtree.
    pub(crate) fn find_cache(&self, id: CacheId) -> Option<&ItemCache<T>> {
        if self.id == id {
            return Some(self);
        }
        self.sub_caches.values().find_map(|sub| sub.find_cache(id))
    }

    /// Mutable variant of [`find_cache`](Self::find_cache).
    pub(crate) fn find_cache_mut(&mut self, id: CacheId) -> Option<&mut ItemCache<T>> {
        if self.id == id {
            return Some(self);
        }
        self.sub_caches
            .values_mut()
            .find_map(|sub| sub.find_cache_mut(id))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    // Items carry their own expansion flag so the predicate closures stay
    // trivial in these tests.
    #[derive(Debug, Clone, Hash, PartialEq, Eq)]
    struct Node {
        name: String,
        expanded: bool,
    }

    fn node(name: &str) -> Node {
        Node {
            name: name.into(),
            expanded: false,
        }
    }

    fn expanded(name: &str) -> Node {
        Node {
            name: name.into(),
            expanded: true,
        }
    }

    fn key_of(item: &Node) -> ItemKey {
        ItemKey::of(&item.name)
    }

    fn is_expanded(item: &Node) -> bool {
        item.expanded
    }

    fn filled(names: &[Node]) -> ItemCache<Node> {
        let mut cache = ItemCache::new(names.len());
        cache.set_page(0, names.len().max(1), names.to_vec());
        cache
    }

    fn recalc(cache: &mut ItemCache<Node>) -> usize {
        cache.recalculate_size(&key_of, &is_expanded)
    }

    #[test]
    fn test_item_lookup_is_sparse() {
        let mut cache = ItemCache::new(10);
        cache.set_page(1, 2, vec![node("c"), node("d")]);

        assert!(cache.item(0).is_none());
        assert_eq!(cache.item(2).map(|n| n.name.as_str()), Some("c"));
        assert_eq!(cache.item(3).map(|n| n.name.as_str()), Some("d"));
        assert!(cache.item(4).is_none());
    }

    #[test]
    fn test_page_loaded_tracking() {
        let mut cache = ItemCache::new(3);
        assert!(!cache.is_page_loaded(0, 2));
        assert!(cache.mark_pending(0));
        assert!(!cache.mark_pending(0)); // already in flight

        cache.set_page(0, 2, vec![node("a"), node("b")]);
        assert!(cache.is_page_loaded(0, 2));
        assert!(!cache.is_page_pending(0));

        // Last page is short; loading its single slot completes it.
        cache.set_page(1, 2, vec![node("c")]);
        assert!(cache.is_page_loaded(1, 2));
    }

    #[test]
    fn test_flat_size_with_sub_caches() {
        let mut cache = filled(&[node("a"), expanded("b"), node("c")]);
        cache
            .ensure_sub_cache(1, &key_of, &is_expanded)
            .expect("sub-cache created");
        {
            let sub = cache.sub_caches.get_mut(&ItemKey::of("b")).unwrap();
            sub.set_size(2);
            sub.set_page(0, 2, vec![node("b1"), node("b2")]);
        }

        assert_eq!(recalc(&mut cache), 5);
        // Idempotent.
        assert_eq!(recalc(&mut cache), 5);
    }

    #[test]
    fn test_context_at_descends_into_expanded_items() {
        let mut cache = filled(&[node("a"), expanded("b"), node("c")]);
        cache.ensure_sub_cache(1, &key_of, &is_expanded).unwrap();
        {
            let sub = cache.sub_caches.get_mut(&ItemKey::of("b")).unwrap();
            sub.set_size(2);
            sub.set_page(0, 2, vec![node("b1"), node("b2")]);
        }
        recalc(&mut cache);

        let names: Vec<_> = (0..cache.flat_size())
            .map(|i| {
                let ctx = cache.context_at(i, 0);
                (ctx.item.unwrap().name, ctx.level, ctx.index)
            })
            .collect();
        assert_eq!(
            names,
            vec![
                ("a".to_string(), 0, 0),
                ("b".to_string(), 0, 1),
                ("b1".to_string(), 1, 0),
                ("b2".to_string(), 1, 1),
                ("c".to_string(), 0, 2),
            ]
        );
    }

    #[test]
    fn test_context_at_unloaded_slot() {
        let mut cache = ItemCache::new(4);
        cache.set_page(0, 2, vec![node("a"), node("b")]);
        recalc(&mut cache);

        let ctx = cache.context_at(3, 0);
        assert!(ctx.item.is_none());
        assert_eq!(ctx.index, 3);
        assert_eq!(ctx.level, 0);
    }

    #[test]
    fn test_flat_index_of_path_round_trip() {
        let mut cache = filled(&[expanded("a"), node("b"), expanded("c")]);
        for index in [0, 2] {
            cache.ensure_sub_cache(index, &key_of, &is_expanded).unwrap();
        }
        for (name, children) in [("a", 2usize), ("c", 3usize)] {
            let sub = cache.sub_caches.get_mut(&ItemKey::of(name)).unwrap();
            sub.set_size(children);
            let items = (0..children).map(|i| node(&format!("{name}{i}"))).collect();
            sub.set_page(0, children, items);
        }
        recalc(&mut cache);
        assert_eq!(cache.flat_size(), 8);

        // Every flat index decomposes and re-derives to itself.
        for flat in 0..cache.flat_size() {
            let ctx = cache.context_at(flat, 0);
            let path = match (ctx.level, ctx.index) {
                (0, i) => vec![i],
                (1, i) => {
                    // Parent is whichever expanded root item owns ctx.cache.
                    let parent = cache
                        .expanded_entries
                        .iter()
                        .find(|(_, key)| cache.sub_caches[key].id == ctx.cache)
                        .map(|&(index, _)| index)
                        .unwrap();
                    vec![parent, i]
                }
                _ => unreachable!(),
            };
            assert_eq!(cache.flat_index_of_path(&path), flat, "path {path:?}");
        }
    }

    #[test]
    fn test_flat_index_of_path_sentinel() {
        let mut cache = filled(&[node("a"), node("b"), node("c"), node("d"), node("e")]);
        recalc(&mut cache);
        assert_eq!(cache.flat_index_of_path(&[usize::MAX]), 4);
    }

    #[test]
    fn test_clear_preserves_size_and_rotates_generation() {
        let mut cache = filled(&[expanded("a"), node("b")]);
        cache.ensure_sub_cache(0, &key_of, &is_expanded).unwrap();
        recalc(&mut cache);

        let old_id = cache.id();
        cache.mark_pending(1);
        cache.clear();

        assert_eq!(cache.size(), 2);
        assert_ne!(cache.id(), old_id);
        assert!(cache.item(0).is_none());
        assert!(!cache.any_pending());
        assert!(cache.sub_cache(ItemKey::of("a")).is_none());
    }

    #[test]
    fn test_recalculate_prunes_collapsed_sub_caches() {
        let mut cache = filled(&[expanded("a"), node("b")]);
        cache.ensure_sub_cache(0, &key_of, &is_expanded).unwrap();
        recalc(&mut cache);
        assert!(cache.sub_cache(ItemKey::of("a")).is_some());

        // Collapse by rewriting the item with the flag off.
        cache.items.insert(0, node("a"));
        recalc(&mut cache);
        assert!(cache.sub_cache(ItemKey::of("a")).is_none());
        assert_eq!(cache.flat_size(), 2);
    }

    // Flat size additivity: for a random two-level tree,
    // flat_size == root size + sum of expanded children's sizes.
    proptest! {
        #[test]
        fn prop_flat_size_additivity(
            shape in prop::collection::vec((any::<bool>(), 0usize..5), 1..8)
        ) {
            let items: Vec<Node> = shape
                .iter()
                .enumerate()
                .map(|(i, &(expanded_flag, _))| Node {
                    name: format!("n{i}"),
                    expanded: expanded_flag,
                })
                .collect();
            let mut cache = filled(&items);

            let mut expected = items.len();
            for (i, &(expanded_flag, children)) in shape.iter().enumerate() {
                if !expanded_flag {
                    continue;
                }
                cache.ensure_sub_cache(i, &key_of, &is_expanded).unwrap();
                let key = ItemKey::of(&format!("n{i}"));
                let sub = cache.sub_caches.get_mut(&key).unwrap();
                sub.set_size(children);
                let loaded = (0..children)
                    .map(|c| node(&format!("n{i}c{c}")))
                    .collect();
                sub.set_page(0, children.max(1), loaded);
                expected += children;
            }

            prop_assert_eq!(recalc(&mut cache), expected);
            // And decomposition covers every index exactly once.
            for flat in 0..cache.flat_size() {
                let ctx = cache.context_at(flat, 0);
                prop_assert!(ctx.item.is_some());
            }
        }
    }
}
