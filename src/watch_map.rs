use std::fmt::Debug;
use std::hash::BuildHasher;
use std::hash::Hash;
use std::iter::FusedIterator;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use arc_swap::Guard;

use crate::rank_list;
use crate::rank_list::RankList;
use crate::rank_list::Ranked;

/// The hasher builder used when none is supplied.
pub type DefaultHashBuilder = foldhash::fast::RandomState;

type Sink<K, V> = Box<dyn Fn(&K, &Arc<Entry<K, V>>) + Send + Sync>;
type Provider<K, V> = Box<dyn Fn(&K) -> Option<V> + Send + Sync>;

#[inline(always)]
fn same_value<V>(a: Option<&Arc<V>>, b: Option<&Arc<V>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// A key paired with a replaceable value and the key's cached hash.
///
/// The hash is computed once, when the entry is built, and is the entry's
/// rank in the backing [`RankList`] for its whole lifetime. The value can
/// be swapped in place without touching the list structure; an entry whose
/// value has been cleared is *vacant* and is rejected by the list.
pub struct Entry<K, V> {
    key: K,
    rank: u64,
    value: ArcSwapOption<V>,
}

impl<K, V> Entry<K, V> {
    pub(crate) fn new(key: K, rank: u64, value: V) -> Self {
        Entry {
            key,
            rank,
            value: ArcSwapOption::from_pointee(value),
        }
    }

    /// The key this entry was created with.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The current value, or `None` if the entry has been vacated by a
    /// removal.
    pub fn value(&self) -> Option<Arc<V>> {
        self.value.load_full()
    }

    /// Replaces the value in place and returns the value that was
    /// displaced.
    ///
    /// Concurrent replacements race on a compare-and-swap; the loser
    /// retries against the freshly observed value until its swap lands, so
    /// the last writer wins and the returned previous value is always the
    /// one this call actually displaced.
    pub fn replace(&self, value: V) -> Option<Arc<V>> {
        let next = Arc::new(value);
        let mut current = self.value.load_full();
        loop {
            let previous = self
                .value
                .compare_and_swap(&current, Some(Arc::clone(&next)));
            if same_value((*previous).as_ref(), current.as_ref()) {
                return current;
            }
            current = Guard::into_inner(previous);
        }
    }

    /// Clears the value, leaving the entry vacant.
    pub(crate) fn take(&self) -> Option<Arc<V>> {
        self.value.swap(None)
    }
}

impl<K, V> Ranked for Entry<K, V> {
    fn rank(&self) -> u64 {
        self.rank
    }

    fn is_vacant(&self) -> bool {
        self.value.load().is_none()
    }
}

impl<K: Debug, V: Debug> Debug for Entry<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("rank", &self.rank)
            .field("value", &self.value())
            .finish()
    }
}

/// A map that reports every committed change to registered sinks.
///
/// `WatchMap<K, V, S>` stores its entries in a [`RankList`] sorted by each
/// key's cached hash, so lookups are a lock-free binary search and
/// iteration works over atomically captured snapshots. On every successful
/// insert, update, and removal the map synchronously invokes each
/// registered change sink on the mutating thread, in registration order,
/// before the mutating call returns. An optional default-value provider
/// materializes values for missing keys on first access.
///
/// Sinks and the provider are handed to the map up front, builder-style,
/// before it is shared; a sink must not call back into the same map's
/// mutating operations.
///
/// # Keys are equated by hash alone
///
/// Lookup compares cached hashes and nothing else; `Eq` is deliberately
/// not required of `K`. Two keys whose hashes collide are indistinguishable
/// and share one entry. This is a cache-style contract: with a 64-bit
/// hasher collisions are assumed rare, not impossible.
///
/// # Example
///
/// ```rust
/// use rank_map::WatchMap;
///
/// let map: WatchMap<String, i32> = WatchMap::new().on_change(|key, entry| {
///     println!("{key} changed to {:?}", entry.value());
/// });
///
/// map.insert("a".to_string(), 1);
/// map.insert("b".to_string(), 2);
/// assert_eq!(map.len(), 2);
/// ```
pub struct WatchMap<K, V, S = DefaultHashBuilder> {
    entries: RankList<Entry<K, V>>,
    sinks: Vec<Sink<K, V>>,
    provider: Option<Provider<K, V>>,
    hash_builder: S,
}

impl<K, V, S> Debug for WatchMap<K, V, S>
where
    K: Debug + Hash + Clone,
    V: Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for entry in self.iter() {
            map.entry(entry.key(), &entry.value());
        }
        map.finish()
    }
}

impl<K, V, S> WatchMap<K, V, S>
where
    K: Hash + Clone,
    S: BuildHasher,
{
    /// Creates an empty map with the given hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates an empty map sized for at least `capacity` entries, with the
    /// given hasher builder.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        WatchMap {
            entries: RankList::with_capacity(capacity),
            sinks: Vec::new(),
            provider: None,
            hash_builder,
        }
    }

    /// Installs the default-value provider and returns the map.
    ///
    /// On a lookup miss, [`get`](WatchMap::get) and
    /// [`contains_key`](WatchMap::contains_key) invoke the provider once.
    /// A `Some` result is stored as a fresh entry (and reported to the
    /// sinks); a `None` result is returned without storing anything, so an
    /// absent default is re-requested on every miss.
    ///
    /// The provider must not touch the map it is supplying.
    pub fn with_default_provider(
        mut self,
        provider: impl Fn(&K) -> Option<V> + Send + Sync + 'static,
    ) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    /// Appends a change sink and returns the map.
    ///
    /// Sinks run synchronously on the mutating thread, in the order they
    /// were registered, before the mutating call returns, so a slow sink
    /// delays the writer. Queueing, batching, and retries belong to the
    /// sink. A sink must not reenter this map's mutating operations.
    pub fn on_change(
        mut self,
        sink: impl Fn(&K, &Arc<Entry<K, V>>) + Send + Sync + 'static,
    ) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the capacity of the backing list's current snapshot.
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    #[inline]
    fn rank_of(&self, key: &K) -> u64 {
        self.hash_builder.hash_one(key)
    }

    fn lookup(&self, rank: u64) -> Option<Arc<Entry<K, V>>> {
        self.entries
            .search(rank)
            .ok()
            .and_then(|index| self.entries.get(index))
    }

    fn notify(&self, entry: &Arc<Entry<K, V>>) {
        for sink in &self.sinks {
            sink(entry.key(), entry);
        }
    }

    fn materialize(&self, key: &K, rank: u64) -> Option<Arc<V>> {
        let provider = self.provider.as_ref()?;
        let value = provider(key)?;

        let entry = Arc::new(Entry::new(key.clone(), rank, value));
        let stored = entry.value();
        if self.entries.push(Arc::clone(&entry)).is_ok() {
            self.notify(&entry);
        }
        stored
    }

    /// Returns the value for `key`, materializing a default for a missing
    /// key when a provider is installed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    ///
    /// use rank_map::WatchMap;
    ///
    /// let map: WatchMap<i32, &str> = WatchMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get(&1), Some(Arc::new("a")));
    /// assert_eq!(map.get(&2), None);
    /// ```
    ///
    /// With a provider, the first miss stores the default:
    ///
    /// ```rust
    /// use std::sync::Arc;
    ///
    /// use rank_map::WatchMap;
    ///
    /// let map: WatchMap<i32, i32> =
    ///     WatchMap::new().with_default_provider(|key| Some(*key * 2));
    /// assert_eq!(map.get(&3), Some(Arc::new(6)));
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let rank = self.rank_of(key);
        match self.lookup(rank) {
            Some(entry) => entry.value(),
            None => self.materialize(key, rank),
        }
    }

    /// Returns `true` if `key` resolves to a value.
    ///
    /// This follows the same lookup-or-materialize path as
    /// [`get`](WatchMap::get): a default materialized as a side effect
    /// counts as present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Inserts or updates the value for `key` and returns the previous
    /// value, if any.
    ///
    /// Fires one change notification on every successful call, whether the
    /// entry was created or updated in place.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    ///
    /// use rank_map::WatchMap;
    ///
    /// let map: WatchMap<i32, &str> = WatchMap::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some(Arc::new("a")));
    /// assert_eq!(map.get(&37), Some(Arc::new("b")));
    /// ```
    pub fn insert(&self, key: K, value: V) -> Option<Arc<V>> {
        let rank = self.rank_of(&key);
        if let Some(entry) = self.lookup(rank) {
            let previous = entry.replace(value);
            self.notify(&entry);
            return previous;
        }

        let entry = Arc::new(Entry::new(key, rank, value));
        if self.entries.push(Arc::clone(&entry)).is_ok() {
            self.notify(&entry);
        }
        None
    }

    /// Removes `key` and returns the value that was present.
    ///
    /// A hit clears the entry's value, evicts the entry from the backing
    /// list, and fires one change notification carrying the (now vacant)
    /// removed entry. A miss returns `None` and fires nothing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    ///
    /// use rank_map::WatchMap;
    ///
    /// let map: WatchMap<i32, &str> = WatchMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.remove(&1), Some(Arc::new("a")));
    /// assert_eq!(map.remove(&1), None);
    /// ```
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        let rank = self.rank_of(key);
        let index = self.entries.search(rank).ok()?;
        let entry = self.entries.get(index)?;

        let previous = entry.take();
        self.entries.remove(index);
        self.notify(&entry);
        previous
    }

    /// Returns a snapshot iterator over the map's entries.
    ///
    /// The backing snapshot is captured once, when this method is called;
    /// mutations that commit afterwards are invisible to the returned
    /// iterator.
    pub fn iter(&self) -> Iter<K, V> {
        Iter {
            inner: self.entries.iter(),
        }
    }

    /// Returns a snapshot iterator over cloned keys.
    pub fn keys(&self) -> Keys<K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns a snapshot iterator over values, skipping entries vacated
    /// after the snapshot was taken.
    pub fn values(&self) -> Values<K, V> {
        Values { inner: self.iter() }
    }
}

impl<K, V, S> WatchMap<K, V, S>
where
    K: Hash + Clone,
    S: BuildHasher + Default,
{
    /// Creates an empty map using the default hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rank_map::WatchMap;
    ///
    /// let map: WatchMap<i32, String> = WatchMap::new();
    /// assert!(map.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates an empty map sized for at least `capacity` entries, using
    /// the default hasher builder.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, S> Default for WatchMap<K, V, S>
where
    K: Hash + Clone,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> Extend<(K, V)> for WatchMap<K, V, S>
where
    K: Hash + Clone,
    S: BuildHasher,
{
    /// Bulk-inserts the pairs through [`insert`](WatchMap::insert); sinks
    /// fire for every pair.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for WatchMap<K, V, S>
where
    K: Hash + Clone,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

/// A snapshot iterator over the entries of a [`WatchMap`].
pub struct Iter<K, V> {
    inner: rank_list::Iter<Entry<K, V>>,
}

impl<K, V> Iterator for Iter<K, V> {
    type Item = Arc<Entry<K, V>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> FusedIterator for Iter<K, V> {}

/// A snapshot iterator over the keys of a [`WatchMap`].
pub struct Keys<K, V> {
    inner: Iter<K, V>,
}

impl<K: Clone, V> Iterator for Keys<K, V> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|entry| entry.key().clone())
    }
}

impl<K: Clone, V> FusedIterator for Keys<K, V> {}

/// A snapshot iterator over the values of a [`WatchMap`].
pub struct Values<K, V> {
    inner: Iter<K, V>,
}

impl<K, V> Iterator for Values<K, V> {
    type Item = Arc<V>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = self.inner.next()?;
            if let Some(value) = entry.value() {
                return Some(value);
            }
        }
    }
}

impl<K, V> FusedIterator for Values<K, V> {}
