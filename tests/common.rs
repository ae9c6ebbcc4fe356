#![allow(dead_code)]

use chaintab::HashTable;

// Prints a log message if `RUST_LOG=debug` is set.
#[macro_export]
macro_rules! debug {
    ($($x:tt)*) => {
        if std::env::var("RUST_LOG").as_deref() == Ok("debug") {
            println!($($x)*);
        }
    };
}

// A hash function that maps `key` to `key mod buckets`.
pub fn modulo(buckets: usize, key: &i64) -> isize {
    key.rem_euclid(buckets as i64) as isize
}

// Run the test on tables with different bucket counts.
//
// A single bucket puts every key in the same chain, stressing lock coupling. A
// prime bucket count spreads keys evenly, and a larger count keeps chains short.
pub fn with_table<V>(mut test: impl FnMut(&dyn Fn() -> HashTable<i64, V>)) {
    for buckets in [1, 7, 64] {
        // Short chains see little contention.
        if cfg!(chaintab_stress) && buckets > 7 {
            continue;
        }

        debug!("running with {buckets} buckets");
        test(&(move || HashTable::new(buckets, modulo as fn(usize, &i64) -> isize).unwrap()));
    }
}

// Returns the number of keys in `keys` that hash to `bucket`.
pub fn expected_bucket_size(
    buckets: usize,
    bucket: usize,
    keys: impl IntoIterator<Item = i64>,
) -> usize {
    keys.into_iter()
        .filter(|key| modulo(buckets, key) as usize == bucket)
        .count()
}

// Returns the number of threads to use for stress testing.
pub fn threads() -> usize {
    if cfg!(miri) {
        2
    } else {
        num_cpus::get_physical().next_power_of_two()
    }
}
