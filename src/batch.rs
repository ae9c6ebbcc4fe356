use std::fmt;
use std::thread;

use crate::raw::Gate;
use crate::{Error, HashTable};

/// An operation to run as part of a batch.
///
/// Operations are constructed before calling [`HashTable::run_batch`]. Each one is
/// read by exactly one worker, which records the result in the operation when it
/// completes.
///
/// # Examples
///
/// ```
/// use chaintab::{HashTable, Operation, Outcome};
///
/// let table = HashTable::new(5, |n, k: &i64| (*k as usize % n) as isize).unwrap();
/// table.insert(7, 1).unwrap();
///
/// let mut operations = vec![
///     Operation::insert(1, 10),
///     Operation::remove(2),
///     Operation::compute(7, |v| v + 1),
/// ];
/// table.run_batch(&mut operations);
///
/// assert_eq!(operations[0].result(), Some(&Outcome::Inserted));
/// assert_eq!(operations[1].result(), Some(&Outcome::NotFound));
/// assert_eq!(operations[2].result(), Some(&Outcome::Applied(2)));
/// ```
pub struct Operation<K, V> {
    key: K,
    action: Action<V>,
    result: Option<Outcome<V>>,
}

/// The action an [`Operation`] performs on its key.
pub enum Action<V> {
    /// Insert the value if the key is absent.
    Insert(V),

    /// Remove the key.
    Remove,

    /// Check whether the key is present.
    Contains,

    /// Replace the value stored for the key.
    Update(V),

    /// Replace the value stored for the key with the result of the function.
    Compute(Box<dyn Fn(&V) -> V + Send + Sync>),
}

/// The result of an [`Operation`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Outcome<V> {
    /// The key was inserted.
    Inserted,

    /// The key was already present, nothing was inserted.
    AlreadyExists,

    /// The value was replaced.
    Updated,

    /// The key was removed.
    Removed,

    /// The key was not present.
    NotFound,

    /// The key is present.
    Present,

    /// The key is absent.
    Absent,

    /// The value was replaced with the contained result.
    Applied(V),

    /// The operation was not performed.
    Rejected(Error),
}

impl<K, V> Operation<K, V> {
    fn new(key: K, action: Action<V>) -> Operation<K, V> {
        Operation {
            key,
            action,
            result: None,
        }
    }

    /// An operation that inserts `value` for `key`.
    pub fn insert(key: K, value: V) -> Operation<K, V> {
        Operation::new(key, Action::Insert(value))
    }

    /// An operation that removes `key`.
    pub fn remove(key: K) -> Operation<K, V> {
        Operation::new(key, Action::Remove)
    }

    /// An operation that checks whether `key` is present.
    pub fn contains(key: K) -> Operation<K, V> {
        Operation::new(key, Action::Contains)
    }

    /// An operation that replaces the value for `key` with `value`.
    pub fn update(key: K, value: V) -> Operation<K, V> {
        Operation::new(key, Action::Update(value))
    }

    /// An operation that replaces the value for `key` with `f(value)`.
    pub fn compute<F>(key: K, f: F) -> Operation<K, V>
    where
        F: Fn(&V) -> V + Send + Sync + 'static,
    {
        Operation::new(key, Action::Compute(Box::new(f)))
    }

    /// Returns the key this operation acts on.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns the action this operation performs.
    pub fn action(&self) -> &Action<V> {
        &self.action
    }

    /// Returns the result of the operation, or `None` if it has not run.
    pub fn result(&self) -> Option<&Outcome<V>> {
        self.result.as_ref()
    }

    /// Takes the result of the operation, leaving `None` in its place.
    pub fn take_result(&mut self) -> Option<Outcome<V>> {
        self.result.take()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Operation<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("key", &self.key)
            .field("action", &self.action)
            .field("result", &self.result)
            .finish()
    }
}

impl<V: fmt::Debug> fmt::Debug for Action<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Insert(value) => f.debug_tuple("Insert").field(value).finish(),
            Action::Remove => f.write_str("Remove"),
            Action::Contains => f.write_str("Contains"),
            Action::Update(value) => f.debug_tuple("Update").field(value).finish(),
            Action::Compute(_) => f.write_str("Compute"),
        }
    }
}

impl<K, V, H> HashTable<K, V, H>
where
    K: Eq + Clone + Send,
    V: Clone + Send,
    H: Fn(usize, &K) -> isize + Sync,
{
    /// Runs every operation concurrently, returning once all of them have completed.
    ///
    /// One worker thread is started per operation. Workers are held at a start gate
    /// until all of them have been created, so the order of `operations` carries no
    /// meaning. Each operation is attempted exactly once and its result recorded,
    /// see [`Operation::result`].
    ///
    /// Every worker is admitted as an in-flight operation for its whole run. If a
    /// stop is requested while the batch is running, workers that were not yet
    /// admitted record [`Outcome::Rejected`] with [`Error::Stopped`].
    pub fn run_batch(&self, operations: &mut [Operation<K, V>]) {
        let gate = Gate::new();
        tracing::trace!(operations = operations.len(), "dispatching batch");

        thread::scope(|s| {
            // Open the gate once all workers are spawned, or if spawning fails,
            // otherwise the scope would wait on workers that never start.
            let _opener = gate.opener();

            for operation in operations.iter_mut() {
                let gate = &gate;

                s.spawn(move || {
                    gate.wait();
                    let outcome = self.execute(operation);
                    operation.result = Some(outcome);
                });
            }
        });

        tracing::trace!(operations = operations.len(), "batch complete");
    }

    // Runs a single operation under its own admission.
    fn execute(&self, operation: &Operation<K, V>) -> Outcome<V> {
        let table = match self.enter() {
            Ok(table) => table,
            Err(err) => return Outcome::Rejected(err),
        };

        let key = &operation.key;
        let outcome = match &operation.action {
            Action::Insert(value) => table
                .insert(key.clone(), value.clone())
                .map(|inserted| match inserted {
                    true => Outcome::Inserted,
                    false => Outcome::AlreadyExists,
                }),
            Action::Remove => table.remove(key).map(|removed| match removed {
                true => Outcome::Removed,
                false => Outcome::NotFound,
            }),
            Action::Contains => table.contains(key).map(|present| match present {
                true => Outcome::Present,
                false => Outcome::Absent,
            }),
            Action::Update(value) => table.update(key, value.clone()).map(|updated| match updated {
                true => Outcome::Updated,
                false => Outcome::NotFound,
            }),
            Action::Compute(f) => table
                .compute(key, |value| f(value))
                .map(|computed| computed.map_or(Outcome::NotFound, Outcome::Applied)),
        };

        outcome.unwrap_or_else(Outcome::Rejected)
    }
}
