use chaintab::{Argument, Error, HashTable, Phase};

use std::sync::Arc;
use std::thread;

mod common;
use common::{expected_bucket_size, modulo, with_table};

#[test]
fn new() {
    with_table::<usize>(|table| drop(table()));
}

#[test]
fn zero_buckets() {
    let table = HashTable::<i64, usize>::new(0, modulo);
    assert_eq!(table.unwrap_err(), Error::InvalidArgument(Argument::Buckets));
}

#[test]
fn builder() {
    let table: HashTable<i64, usize> = HashTable::builder()
        .buckets(13)
        .hasher(modulo as fn(usize, &i64) -> isize)
        .build()
        .unwrap();
    assert_eq!(table.buckets(), 13);
    assert_eq!(table.phase(), Phase::Running);

    let err = HashTable::<i64, usize>::builder()
        .hasher(modulo as fn(usize, &i64) -> isize)
        .build()
        .unwrap_err();
    assert_eq!(err, Error::InvalidArgument(Argument::Buckets));

    let err = HashTable::<i64, usize>::builder()
        .buckets(4)
        .build()
        .unwrap_err();
    assert_eq!(err, Error::InvalidArgument(Argument::Hasher));
}

#[test]
fn insert() {
    with_table::<usize>(|table| {
        let table = table();
        assert_eq!(table.insert(42, 0), Ok(true));
        assert_eq!(table.contains(&42), Ok(true));
        assert_eq!(table.len(), Ok(1));
    });
}

#[test]
fn insert_duplicate() {
    with_table::<&str>(|table| {
        let table = table();
        assert_eq!(table.insert(7, "first"), Ok(true));
        assert_eq!(table.insert(7, "second"), Ok(false));
        assert_eq!(table.get(&7), Ok(Some("first")));
        assert_eq!(table.len(), Ok(1));
    });
}

#[test]
fn empty() {
    with_table::<usize>(|table| {
        let table = table();
        assert_eq!(table.is_empty(), Ok(true));
        assert_eq!(table.get(&42), Ok(None));
        assert_eq!(table.contains(&42), Ok(false));
        assert_eq!(table.remove(&42), Ok(false));
        assert_eq!(table.update(&42, 1), Ok(false));
        assert_eq!(table.compute(&42, |v| v + 1), Ok(None));

        for bucket in 0..table.buckets() {
            assert_eq!(table.bucket_size(bucket), Ok(0));
        }
    });
}

#[test]
fn insert_and_remove() {
    with_table::<usize>(|table| {
        let table = table();
        table.insert(42, 0).unwrap();
        assert_eq!(table.remove(&42), Ok(true));
        assert_eq!(table.contains(&42), Ok(false));
        assert_eq!(table.remove(&42), Ok(false));
        assert_eq!(table.is_empty(), Ok(true));
    });
}

#[test]
fn update() {
    with_table::<&str>(|table| {
        let table = table();
        table.insert(3, "v1").unwrap();
        assert_eq!(table.update(&3, "v2"), Ok(true));
        assert_eq!(table.get(&3), Ok(Some("v2")));
        assert_eq!(table.len(), Ok(1));
    });
}

#[test]
fn compute() {
    with_table::<usize>(|table| {
        let table = table();
        table.insert(1, 10).unwrap();
        assert_eq!(table.compute(&1, |v| v * 3), Ok(Some(30)));
        assert_eq!(table.compute(&1, |v| v + 1), Ok(Some(31)));
        assert_eq!(table.get(&1), Ok(Some(31)));
    });
}

#[test]
fn remove_from_chain() {
    // Every key lands in bucket 0, so removals hit the head, middle and tail.
    let table = HashTable::new(4, |_, _: &i64| 0).unwrap();
    for key in 0..5 {
        table.insert(key, key).unwrap();
    }
    assert_eq!(table.bucket_size(0), Ok(5));

    assert_eq!(table.remove(&0), Ok(true));
    assert_eq!(table.remove(&2), Ok(true));
    assert_eq!(table.remove(&4), Ok(true));
    assert_eq!(table.bucket_size(0), Ok(2));

    assert_eq!(table.get(&1), Ok(Some(1)));
    assert_eq!(table.get(&3), Ok(Some(3)));
    for key in [0, 2, 4] {
        assert_eq!(table.contains(&key), Ok(false));
    }
}

#[test]
fn bucket_sizes() {
    let table = HashTable::new(5, modulo).unwrap();
    for key in [1, 2, 3, 11, 22, 33] {
        assert_eq!(table.insert(key, ()), Ok(true));
    }

    assert_eq!(table.bucket_size(0), Ok(0));
    assert_eq!(table.bucket_size(1), Ok(2));
    assert_eq!(table.bucket_size(2), Ok(2));
    assert_eq!(table.bucket_size(3), Ok(2));
    assert_eq!(table.bucket_size(4), Ok(0));
    assert_eq!(table.len(), Ok(6));

    table.remove(&11).unwrap();
    assert_eq!(table.bucket_size(1), Ok(1));

    // Failed inserts and removes leave the counters alone.
    table.insert(2, ()).unwrap();
    table.remove(&11).unwrap();
    assert_eq!(table.bucket_size(1), Ok(1));
    assert_eq!(table.bucket_size(2), Ok(2));
}

#[test]
fn bucket_size_out_of_range() {
    with_table::<usize>(|table| {
        let table = table();
        let buckets = table.buckets();
        assert_eq!(
            table.bucket_size(buckets),
            Err(Error::OutOfRange {
                index: buckets as isize,
                buckets
            })
        );
    });
}

#[test]
fn hash_out_of_range() {
    let table = HashTable::new(4, |n, key: &i64| *key as isize * n as isize).unwrap();
    assert_eq!(table.insert(0, 0), Ok(true));

    // 1 * 4 is one past the last bucket.
    let err = Error::OutOfRange {
        index: 4,
        buckets: 4,
    };
    assert_eq!(table.insert(1, 1), Err(err));
    assert_eq!(table.contains(&1), Err(err));
    assert_eq!(table.update(&1, 1), Err(err));
    assert_eq!(table.remove(&1), Err(err));
    assert_eq!(table.get(&1), Err(err));

    let err = Error::OutOfRange {
        index: -4,
        buckets: 4,
    };
    assert_eq!(table.insert(-1, 1), Err(err));
    assert_eq!(table.len(), Ok(1));
}

#[test]
fn many_keys() {
    const ENTRIES: i64 = if cfg!(miri) { 64 } else { 1 << 12 };

    with_table::<i64>(|table| {
        let table = table();
        for i in 0..ENTRIES {
            assert_eq!(table.insert(i, i * 2), Ok(true));
        }

        for i in 0..ENTRIES {
            assert_eq!(table.get(&i), Ok(Some(i * 2)));
        }

        let buckets = table.buckets();
        for bucket in 0..buckets {
            assert_eq!(
                table.bucket_size(bucket),
                Ok(expected_bucket_size(buckets, bucket, 0..ENTRIES))
            );
        }

        for i in (0..ENTRIES).step_by(2) {
            assert_eq!(table.remove(&i), Ok(true));
        }
        assert_eq!(table.len(), Ok(ENTRIES as usize / 2));

        for bucket in 0..buckets {
            let remaining = (0..ENTRIES).filter(|i| i % 2 == 1);
            assert_eq!(
                table.bucket_size(bucket),
                Ok(expected_bucket_size(buckets, bucket, remaining))
            );
        }
    });
}

#[test]
fn enter() {
    with_table::<usize>(|table| {
        let table = table();
        let admitted = table.enter().unwrap();
        for i in 0..16 {
            admitted.insert(i, i as usize).unwrap();
        }
        assert_eq!(admitted.len(), 16);
        assert_eq!(admitted.get(&5), Ok(Some(5)));
        assert_eq!(admitted.remove(&5), Ok(true));
        assert!(!admitted.is_empty());
        drop(admitted);

        assert_eq!(table.len(), Ok(15));
    });
}

#[test]
fn concurrent_insert() {
    with_table::<usize>(|table| {
        let table = Arc::new(table());

        let table1 = table.clone();
        let t1 = thread::spawn(move || {
            for i in 0..64 {
                table1.insert(i, 0).unwrap();
            }
        });
        let table2 = table.clone();
        let t2 = thread::spawn(move || {
            for i in 0..64 {
                table2.insert(i, 1).unwrap();
            }
        });

        t1.join().unwrap();
        t2.join().unwrap();

        for i in 0..64 {
            let v = table.get(&i).unwrap().unwrap();
            assert!(v == 0 || v == 1);
        }
        assert_eq!(table.len(), Ok(64));
    });
}

#[test]
fn concurrent_remove() {
    with_table::<i64>(|table| {
        let table = Arc::new(table());

        for i in 0..64 {
            table.insert(i, i).unwrap();
        }

        let removers = (0..2)
            .map(|_| {
                let table = table.clone();
                thread::spawn(move || {
                    (0..64)
                        .filter(|i| table.remove(i).unwrap())
                        .count()
                })
            })
            .collect::<Vec<_>>();

        // every key is removed by exactly one thread
        let removed: usize = removers.into_iter().map(|t| t.join().unwrap()).sum();
        assert_eq!(removed, 64);

        for i in 0..64 {
            assert_eq!(table.contains(&i), Ok(false));
        }
        assert_eq!(table.is_empty(), Ok(true));
    });
}

#[test]
fn concurrent_update() {
    with_table::<usize>(|table| {
        let table = Arc::new(table());

        for i in 0..64 {
            table.insert(i, i as usize).unwrap();
        }

        let workers = (0..2)
            .map(|_| {
                let table = table.clone();
                thread::spawn(move || {
                    for i in 0..64 {
                        let new = table.compute(&i, |v| v + 1).unwrap().unwrap();
                        assert!(new == i as usize + 1 || new == i as usize + 2);
                    }
                })
            })
            .collect::<Vec<_>>();

        for worker in workers {
            worker.join().unwrap();
        }

        for i in 0..64 {
            assert_eq!(table.get(&i), Ok(Some(i as usize + 2)));
        }
    });
}

#[test]
fn current_kv_dropped() {
    let dropped1 = Arc::new(0);
    let dropped2 = Arc::new(0);

    let table = HashTable::new(4, |n, k: &Arc<usize>| (**k % n) as isize).unwrap();
    table.insert(dropped1.clone(), dropped2.clone()).unwrap();
    assert_eq!(Arc::strong_count(&dropped1), 2);
    assert_eq!(Arc::strong_count(&dropped2), 2);

    drop(table);

    assert_eq!(Arc::strong_count(&dropped1), 1);
    assert_eq!(Arc::strong_count(&dropped2), 1);
}

#[test]
fn replaced_value_dropped() {
    let old = Arc::new(0);
    let new = Arc::new(1);

    let table = HashTable::new(4, modulo).unwrap();
    table.insert(1, old.clone()).unwrap();
    table.update(&1, new.clone()).unwrap();
    assert_eq!(Arc::strong_count(&old), 1);
    assert_eq!(Arc::strong_count(&new), 2);

    table.remove(&1).unwrap();
    assert_eq!(Arc::strong_count(&new), 1);
}

#[test]
fn debug() {
    let table = HashTable::<i64, usize>::new(3, modulo).unwrap();
    let formatted = format!("{:?}", table);
    assert_eq!(formatted, "HashTable { buckets: 3, phase: Running }");
}

// Hash functions that put every key in the same bucket, creating long chains.
mod hasher {
    use super::*;

    fn check(hasher: fn(usize, &i64) -> isize) {
        let range = if cfg!(miri) { 0..16 } else { 0..100 };

        let table = HashTable::<i64, i64>::new(8, hasher).unwrap();
        for i in range.clone() {
            table.insert(i, i).unwrap();
        }

        assert_eq!(table.contains(&i64::MIN), Ok(false));
        assert_eq!(table.contains(&(range.start - 1)), Ok(false));
        for i in range.clone() {
            assert_eq!(table.contains(&i), Ok(true));
        }
        assert_eq!(table.contains(&range.end), Ok(false));
        assert_eq!(table.contains(&i64::MAX), Ok(false));
    }

    #[test]
    fn first_bucket() {
        check(|_, _| 0);
    }

    #[test]
    fn last_bucket() {
        check(|n, _| n as isize - 1);
    }
}
