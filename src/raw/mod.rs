mod chain;
mod gate;
mod shutdown;
mod utils;

pub use self::gate::Gate;
pub use self::shutdown::{Permit, Phase};

use parking_lot::Mutex;

use self::chain::Chain;
use self::shutdown::Shutdown;
use self::utils::CachePadded;
use crate::Error;

// A fixed-size hash table of lock-coupled chains.
//
// Operations that touch entries take a `Permit`, proving that they were admitted
// by the shutdown coordinator and will finish before the table is torn down.
pub struct HashTable<K, V, H> {
    buckets: Box<[CachePadded<Bucket<K, V>>]>,
    hasher: H,
    shutdown: Shutdown,
}

// A chain and the number of nodes in it.
//
// The counter has its own lock, and is only updated after the chain operation
// has released every node lock it acquired. The two lock domains never nest.
//
// Because of this, a remove may adjust the counter before the insert of the same
// key does, so the counter can briefly go negative.
struct Bucket<K, V> {
    chain: Chain<K, V>,
    len: Mutex<isize>,
}

impl<K, V> Bucket<K, V> {
    #[inline]
    fn len(&self) -> usize {
        usize::try_from(*self.len.lock()).unwrap_or(0)
    }
}

impl<K, V, H> HashTable<K, V, H> {
    // Creates a table with the given number of buckets.
    //
    // The bucket count must be non-zero, which is validated by the builder.
    pub fn new(buckets: usize, hasher: H) -> HashTable<K, V, H> {
        debug_assert!(buckets > 0);

        let buckets = (0..buckets)
            .map(|_| {
                CachePadded::new(Bucket {
                    chain: Chain::new(),
                    len: Mutex::new(0),
                })
            })
            .collect();

        HashTable {
            buckets,
            hasher,
            shutdown: Shutdown::new(),
        }
    }

    #[inline]
    pub fn buckets(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn admit(&self) -> Result<Permit<'_>, Error> {
        self.shutdown.admit()
    }

    pub fn request_stop(&self) -> Result<(), Error> {
        self.shutdown.request_stop()
    }

    pub fn phase(&self) -> Phase {
        self.shutdown.phase()
    }

    // Waits for all admitted operations to finish, then releases every entry.
    pub fn destroy(&self) -> Result<(), Error> {
        self.shutdown.drain()?;

        // No operation can be admitted past this point, so the chains are
        // exclusively ours.
        let released = self
            .buckets
            .iter()
            .map(|bucket| {
                let released = bucket.chain.clear();
                *bucket.len.lock() = 0;
                released
            })
            .sum::<usize>();

        tracing::debug!(released, buckets = self.buckets.len(), "table destroyed");
        Ok(())
    }

    // Returns the number of entries in the bucket at `index`.
    pub fn bucket_len(&self, index: usize, _permit: &Permit<'_>) -> Result<usize, Error> {
        match self.buckets.get(index) {
            Some(bucket) => Ok(bucket.len()),
            None => Err(Error::OutOfRange {
                index: isize::try_from(index).unwrap_or(isize::MAX),
                buckets: self.buckets.len(),
            }),
        }
    }

    // Returns the sum of all bucket counters.
    //
    // Each counter is read under its own lock, so concurrent updates to other
    // buckets may or may not be reflected.
    pub fn len(&self, _permit: &Permit<'_>) -> usize {
        self.buckets.iter().map(|bucket| bucket.len()).sum()
    }
}

impl<K, V, H> HashTable<K, V, H>
where
    K: Eq,
    H: Fn(usize, &K) -> isize,
{
    // Returns the bucket for `key`, validating the hash function's result.
    #[inline]
    fn bucket(&self, key: &K) -> Result<&Bucket<K, V>, Error> {
        let buckets = self.buckets.len();
        let index = (self.hasher)(buckets, key);

        match usize::try_from(index) {
            Ok(i) if i < buckets => Ok(&self.buckets[i]),
            _ => {
                tracing::warn!(index, buckets, "hash function returned an out of range bucket");
                Err(Error::OutOfRange { index, buckets })
            }
        }
    }

    pub fn insert(&self, key: K, value: V, _permit: &Permit<'_>) -> Result<bool, Error> {
        let bucket = self.bucket(&key)?;
        let inserted = bucket.chain.insert(key, value);

        if inserted {
            *bucket.len.lock() += 1;
        }

        Ok(inserted)
    }

    pub fn update(&self, key: &K, value: V, _permit: &Permit<'_>) -> Result<bool, Error> {
        Ok(self.bucket(key)?.chain.update(key, value))
    }

    pub fn remove(&self, key: &K, _permit: &Permit<'_>) -> Result<bool, Error> {
        let bucket = self.bucket(key)?;
        let removed = bucket.chain.remove(key);

        if removed {
            *bucket.len.lock() -= 1;
        }

        Ok(removed)
    }

    pub fn contains(&self, key: &K, _permit: &Permit<'_>) -> Result<bool, Error> {
        Ok(self.bucket(key)?.chain.contains(key))
    }

    // Replaces the value for `key` with `f(value)`, returning a copy of the new value.
    //
    // `f` runs while the entry's node is locked.
    pub fn compute<F>(&self, key: &K, f: F, _permit: &Permit<'_>) -> Result<Option<V>, Error>
    where
        F: FnOnce(&V) -> V,
        V: Clone,
    {
        let computed = self.bucket(key)?.chain.with_value(key, |value| {
            let computed = f(&*value);
            *value = computed;
            value.clone()
        });

        Ok(computed)
    }

    pub fn get(&self, key: &K, _permit: &Permit<'_>) -> Result<Option<V>, Error>
    where
        V: Clone,
    {
        Ok(self.bucket(key)?.chain.with_value(key, |value| value.clone()))
    }
}
