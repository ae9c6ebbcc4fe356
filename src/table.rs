use crate::raw::{self, Permit};
use crate::{Argument, Error, Phase};

use std::fmt;
use std::marker::PhantomData;

/// The default hash function type, a plain function pointer.
pub type HashFn<K> = fn(usize, &K) -> isize;

/// A concurrent hash table with a fixed number of buckets.
///
/// Each bucket is a chain of nodes, and every node carries its own lock. Operations
/// walk a chain with hand-over-hand locking, holding at most two adjacent node locks
/// at a time, so operations on different keys in the same bucket interleave at node
/// granularity and operations on different buckets never contend.
///
/// The bucket for a key is chosen by a caller-supplied hash function, called with
/// the bucket count and the key. A result outside `0..buckets` is reported as
/// [`Error::OutOfRange`] rather than indexed.
///
/// Tables are shut down in two steps. [`HashTable::request_stop`] rejects all new
/// operations with [`Error::Stopped`], and [`HashTable::destroy`] waits for every
/// operation that was already admitted to finish before releasing the entries.
///
/// # Examples
///
/// ```
/// use chaintab::HashTable;
///
/// fn modulo(buckets: usize, key: &i64) -> isize {
///     (*key % buckets as i64) as isize
/// }
///
/// let table = HashTable::new(5, modulo).unwrap();
/// assert_eq!(table.insert(1, "a"), Ok(true));
/// assert_eq!(table.insert(11, "b"), Ok(true));
/// assert_eq!(table.insert(1, "c"), Ok(false));
/// assert_eq!(table.bucket_size(1), Ok(2));
///
/// table.request_stop().unwrap();
/// table.destroy().unwrap();
/// ```
pub struct HashTable<K, V, H = HashFn<K>> {
    raw: raw::HashTable<K, V, H>,
}

/// A builder for a [`HashTable`].
///
/// Both the bucket count and the hash function must be provided.
///
/// # Examples
///
/// ```rust
/// use chaintab::HashTable;
///
/// let table: HashTable<u32, String, _> = HashTable::builder()
///     // Set the fixed number of buckets.
///     .buckets(64)
///     // Set the function mapping a key to a bucket index.
///     .hasher(|buckets: usize, key: &u32| (*key as usize % buckets) as isize)
///     // Construct the table.
///     .build()
///     .unwrap();
///
/// assert_eq!(table.buckets(), 64);
/// ```
pub struct HashTableBuilder<K, V, H = HashFn<K>> {
    buckets: usize,
    hasher: Option<H>,
    _kv: PhantomData<fn() -> (K, V)>,
}

impl<K, V> HashTableBuilder<K, V> {
    /// Set the function used to map keys to buckets.
    ///
    /// The function is called with the bucket count and a key, and must return the
    /// same index for the same inputs. It must not access the table itself.
    pub fn hasher<H>(self, hasher: H) -> HashTableBuilder<K, V, H>
    where
        H: Fn(usize, &K) -> isize,
    {
        HashTableBuilder {
            buckets: self.buckets,
            hasher: Some(hasher),
            _kv: PhantomData,
        }
    }
}

impl<K, V, H> HashTableBuilder<K, V, H> {
    /// Set the number of buckets.
    ///
    /// The bucket count is fixed for the lifetime of the table, and must be at
    /// least one.
    pub fn buckets(self, buckets: usize) -> HashTableBuilder<K, V, H> {
        HashTableBuilder { buckets, ..self }
    }

    /// Construct a [`HashTable`] from the builder, using the configured options.
    ///
    /// Returns [`Error::InvalidArgument`] if the bucket count is zero or no hash
    /// function was provided.
    pub fn build(self) -> Result<HashTable<K, V, H>, Error>
    where
        H: Fn(usize, &K) -> isize,
    {
        if self.buckets == 0 {
            return Err(Error::InvalidArgument(Argument::Buckets));
        }

        let Some(hasher) = self.hasher else {
            return Err(Error::InvalidArgument(Argument::Hasher));
        };

        Ok(HashTable {
            raw: raw::HashTable::new(self.buckets, hasher),
        })
    }
}

impl<K, V, H> fmt::Debug for HashTableBuilder<K, V, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTableBuilder")
            .field("buckets", &self.buckets)
            .field("hasher", &self.hasher.is_some())
            .finish()
    }
}

impl<K, V> HashTable<K, V> {
    /// Returns a builder for a `HashTable`.
    ///
    /// See [`HashTableBuilder`] for details.
    pub fn builder() -> HashTableBuilder<K, V> {
        HashTableBuilder {
            buckets: 0,
            hasher: None,
            _kv: PhantomData,
        }
    }
}

impl<K, V, H> HashTable<K, V, H>
where
    K: Eq,
    H: Fn(usize, &K) -> isize,
{
    /// Creates an empty `HashTable` with the given bucket count and hash function.
    ///
    /// Returns [`Error::InvalidArgument`] if `buckets` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use chaintab::HashTable;
    ///
    /// let table: HashTable<i64, &str, _> =
    ///     HashTable::new(16, |buckets, key: &i64| key.rem_euclid(buckets as i64) as isize)
    ///         .unwrap();
    /// assert_eq!(table.len(), Ok(0));
    /// ```
    pub fn new(buckets: usize, hasher: H) -> Result<HashTable<K, V, H>, Error> {
        if buckets == 0 {
            return Err(Error::InvalidArgument(Argument::Buckets));
        }

        Ok(HashTable {
            raw: raw::HashTable::new(buckets, hasher),
        })
    }

    /// Admits a single operation scope against the table.
    ///
    /// The returned [`TableRef`] exposes the same operations as the table, without
    /// checking for a stop request on each call. Operations through the reference
    /// keep running after a stop is requested, and [`HashTable::destroy`] blocks
    /// until the reference is dropped.
    ///
    /// Returns [`Error::Stopped`] if a stop was already requested.
    ///
    /// # Examples
    ///
    /// ```
    /// use chaintab::HashTable;
    ///
    /// let table: HashTable<i64, u64, _> =
    ///     HashTable::new(4, |n, k: &i64| (*k as usize % n) as isize).unwrap();
    ///
    /// let admitted = table.enter().unwrap();
    /// for key in 0..8 {
    ///     admitted.insert(key, 0).unwrap();
    /// }
    /// assert_eq!(admitted.len(), 8);
    /// ```
    #[inline]
    pub fn enter(&self) -> Result<TableRef<'_, K, V, H>, Error> {
        Ok(TableRef {
            permit: self.raw.admit()?,
            raw: &self.raw,
        })
    }

    /// Inserts a key-value pair.
    ///
    /// Returns `Ok(false)` if the key is already present, in which case the stored
    /// value is left untouched and `value` is dropped.
    #[inline]
    pub fn insert(&self, key: K, value: V) -> Result<bool, Error> {
        self.enter()?.insert(key, value)
    }

    /// Replaces the value stored for a key.
    ///
    /// Returns `Ok(false)` if the key is not present.
    #[inline]
    pub fn update(&self, key: &K, value: V) -> Result<bool, Error> {
        self.enter()?.update(key, value)
    }

    /// Removes a key from the table.
    ///
    /// Returns `Ok(false)` if the key is not present.
    #[inline]
    pub fn remove(&self, key: &K) -> Result<bool, Error> {
        self.enter()?.remove(key)
    }

    /// Returns `true` if the table contains the key.
    #[inline]
    pub fn contains(&self, key: &K) -> Result<bool, Error> {
        self.enter()?.contains(key)
    }

    /// Replaces the value stored for a key with the result of `f`, returning the
    /// new value.
    ///
    /// `f` runs while the entry is locked, and must not access the table. Returns
    /// `Ok(None)` if the key is not present, in which case `f` is not called.
    ///
    /// # Examples
    ///
    /// ```
    /// use chaintab::HashTable;
    ///
    /// let table = HashTable::new(8, |n, k: &i64| (*k as usize % n) as isize).unwrap();
    /// table.insert(3, 10).unwrap();
    ///
    /// assert_eq!(table.compute(&3, |v| v * 2), Ok(Some(20)));
    /// assert_eq!(table.compute(&4, |v| v * 2), Ok(None));
    /// ```
    #[inline]
    pub fn compute<F>(&self, key: &K, f: F) -> Result<Option<V>, Error>
    where
        F: FnOnce(&V) -> V,
        V: Clone,
    {
        self.enter()?.compute(key, f)
    }

    /// Returns a clone of the value stored for a key.
    #[inline]
    pub fn get(&self, key: &K) -> Result<Option<V>, Error>
    where
        V: Clone,
    {
        self.enter()?.get(key)
    }

    /// Returns the number of entries in the bucket at `index`.
    ///
    /// Returns [`Error::OutOfRange`] if `index` is not less than the bucket count.
    #[inline]
    pub fn bucket_size(&self, index: usize) -> Result<usize, Error> {
        self.enter()?.bucket_size(index)
    }

    /// Returns the number of entries in the table.
    ///
    /// This is the sum of the bucket sizes, each read independently. It is exact
    /// when no operations are running concurrently.
    #[inline]
    pub fn len(&self) -> Result<usize, Error> {
        Ok(self.enter()?.len())
    }

    /// Returns `true` if the table contains no entries.
    #[inline]
    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.enter()?.is_empty())
    }
}

impl<K, V, H> HashTable<K, V, H> {
    /// Returns the fixed number of buckets.
    #[inline]
    pub fn buckets(&self) -> usize {
        self.raw.buckets()
    }

    /// Returns the current lifecycle phase of the table.
    pub fn phase(&self) -> Phase {
        self.raw.phase()
    }

    /// Returns `true` if a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.phase() != Phase::Running
    }

    /// Stops admitting new operations.
    ///
    /// Operations that were admitted before the stop run to completion. Returns
    /// [`Error::AlreadyStopped`] if a stop was already requested.
    pub fn request_stop(&self) -> Result<(), Error> {
        self.raw.request_stop()
    }

    /// Waits for every admitted operation to finish, then releases all entries.
    ///
    /// Blocks without spinning until the last in-flight operation completes. Returns
    /// [`Error::NotYetStopped`] if no stop was requested, and [`Error::Destroyed`] if
    /// the table was already destroyed. Exactly one call succeeds.
    ///
    /// Calling this while the current thread holds a [`TableRef`] deadlocks.
    pub fn destroy(&self) -> Result<(), Error> {
        self.raw.destroy()
    }
}

impl<K, V, H> fmt::Debug for HashTable<K, V, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTable")
            .field("buckets", &self.buckets())
            .field("phase", &self.phase())
            .finish()
    }
}

/// An admitted reference to a [`HashTable`].
///
/// Created by [`HashTable::enter`]. While the reference is alive, the table counts
/// it as an in-flight operation.
pub struct TableRef<'table, K, V, H> {
    permit: Permit<'table>,
    raw: &'table raw::HashTable<K, V, H>,
}

impl<K, V, H> TableRef<'_, K, V, H>
where
    K: Eq,
    H: Fn(usize, &K) -> isize,
{
    /// Inserts a key-value pair.
    ///
    /// See [`HashTable::insert`] for details.
    #[inline]
    pub fn insert(&self, key: K, value: V) -> Result<bool, Error> {
        self.raw.insert(key, value, &self.permit)
    }

    /// Replaces the value stored for a key.
    ///
    /// See [`HashTable::update`] for details.
    #[inline]
    pub fn update(&self, key: &K, value: V) -> Result<bool, Error> {
        self.raw.update(key, value, &self.permit)
    }

    /// Removes a key from the table.
    ///
    /// See [`HashTable::remove`] for details.
    #[inline]
    pub fn remove(&self, key: &K) -> Result<bool, Error> {
        self.raw.remove(key, &self.permit)
    }

    /// Returns `true` if the table contains the key.
    #[inline]
    pub fn contains(&self, key: &K) -> Result<bool, Error> {
        self.raw.contains(key, &self.permit)
    }

    /// Replaces the value stored for a key with the result of `f`.
    ///
    /// See [`HashTable::compute`] for details.
    #[inline]
    pub fn compute<F>(&self, key: &K, f: F) -> Result<Option<V>, Error>
    where
        F: FnOnce(&V) -> V,
        V: Clone,
    {
        self.raw.compute(key, f, &self.permit)
    }

    /// Returns a clone of the value stored for a key.
    #[inline]
    pub fn get(&self, key: &K) -> Result<Option<V>, Error>
    where
        V: Clone,
    {
        self.raw.get(key, &self.permit)
    }
}

impl<K, V, H> TableRef<'_, K, V, H> {
    /// Returns the number of entries in the bucket at `index`.
    #[inline]
    pub fn bucket_size(&self, index: usize) -> Result<usize, Error> {
        self.raw.bucket_len(index, &self.permit)
    }

    /// Returns the number of entries in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len(&self.permit)
    }

    /// Returns `true` if the table contains no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V, H> fmt::Debug for TableRef<'_, K, V, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableRef")
            .field("buckets", &self.raw.buckets())
            .finish()
    }
}
