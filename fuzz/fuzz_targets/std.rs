#![no_main]

use libfuzzer_sys::fuzz_target;

use arbitrary::Arbitrary;
use chaintab::{HashTable, Outcome};
use std::collections::HashMap as StdHashMap;

#[derive(Debug, Arbitrary)]
enum Operation<K, V> {
    Insert(K, V),
    Remove(K),
    Get(K),
    Contains(K),
    Len,
    BucketSize(u8),
    Update(K, V),
    Compute(K, V),
    Batch(Vec<BatchOperation<K, V>>),
}

#[derive(Debug, Arbitrary)]
enum BatchOperation<K, V> {
    Insert(K, V),
    Remove(K),
    Contains(K),
    Update(K, V),
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    buckets: u8,
    operations: Vec<Operation<u32, u32>>,
}

fn bucket(buckets: usize, key: &u32) -> isize {
    (*key as usize % buckets) as isize
}

fn fuzz_table(input: FuzzInput) {
    let buckets = usize::from(input.buckets).max(1);
    let mut std_map = StdHashMap::new();
    let table = HashTable::new(buckets, bucket as fn(usize, &u32) -> isize).unwrap();

    for op in input.operations {
        match op {
            Operation::Insert(k, v) => {
                let std_result = !std_map.contains_key(&k);
                if std_result {
                    std_map.insert(k, v);
                }
                assert_eq!(Ok(std_result), table.insert(k, v));
            }
            Operation::Remove(k) => {
                let std_result = std_map.remove(&k).is_some();
                assert_eq!(Ok(std_result), table.remove(&k));
            }
            Operation::Get(k) => {
                let std_result = std_map.get(&k).copied();
                assert_eq!(Ok(std_result), table.get(&k));
            }
            Operation::Contains(k) => {
                let std_result = std_map.contains_key(&k);
                assert_eq!(Ok(std_result), table.contains(&k));
            }
            Operation::Len => {
                assert_eq!(Ok(std_map.len()), table.len());
            }
            Operation::BucketSize(index) => {
                let index = usize::from(index);
                let table_result = table.bucket_size(index);

                if index < buckets {
                    let std_result = std_map
                        .keys()
                        .filter(|k| bucket(buckets, k) as usize == index)
                        .count();
                    assert_eq!(Ok(std_result), table_result);
                } else {
                    assert!(table_result.is_err());
                }
            }
            Operation::Update(k, v) => {
                let std_result = std_map.get_mut(&k).map(|e| *e = v).is_some();
                assert_eq!(Ok(std_result), table.update(&k, v));
            }
            Operation::Compute(k, v) => {
                let std_result = std_map.get_mut(&k).map(|e| {
                    *e = e.wrapping_add(v);
                    *e
                });
                let table_result = table.compute(&k, |e| e.wrapping_add(v));
                assert_eq!(Ok(std_result), table_result);
            }
            Operation::Batch(batch) => batch_ops(&mut std_map, &table, batch),
        }
    }

    // Final consistency checks
    for (k, v) in std_map.iter() {
        assert_eq!(Ok(Some(*v)), table.get(k));
    }
    assert_eq!(Ok(std_map.len()), table.len());

    table.request_stop().unwrap();
    table.destroy().unwrap();
}

// Batch operations run concurrently, so only operations on distinct keys have a
// defined result.
fn batch_ops(
    std_map: &mut StdHashMap<u32, u32>,
    table: &HashTable<u32, u32>,
    batch: Vec<BatchOperation<u32, u32>>,
) {
    let mut seen = std::collections::HashSet::new();
    let mut operations = batch
        .into_iter()
        .filter_map(|op| {
            let operation = match op {
                BatchOperation::Insert(k, v) => chaintab::Operation::insert(k, v),
                BatchOperation::Remove(k) => chaintab::Operation::remove(k),
                BatchOperation::Contains(k) => chaintab::Operation::contains(k),
                BatchOperation::Update(k, v) => chaintab::Operation::update(k, v),
            };
            seen.insert(*operation.key()).then_some(operation)
        })
        .take(16)
        .collect::<Vec<_>>();

    table.run_batch(&mut operations);

    for operation in &operations {
        let k = *operation.key();
        let expected = match operation.action() {
            chaintab::Action::Insert(v) => {
                if std_map.contains_key(&k) {
                    Outcome::AlreadyExists
                } else {
                    std_map.insert(k, *v);
                    Outcome::Inserted
                }
            }
            chaintab::Action::Remove => match std_map.remove(&k) {
                Some(_) => Outcome::Removed,
                None => Outcome::NotFound,
            },
            chaintab::Action::Contains => match std_map.contains_key(&k) {
                true => Outcome::Present,
                false => Outcome::Absent,
            },
            chaintab::Action::Update(v) => match std_map.get_mut(&k) {
                Some(e) => {
                    *e = *v;
                    Outcome::Updated
                }
                None => Outcome::NotFound,
            },
            chaintab::Action::Compute(_) => unreachable!(),
        };
        assert_eq!(Some(&expected), operation.result());
    }
}

fuzz_target!(|data: FuzzInput| {
    fuzz_table(data);
});
