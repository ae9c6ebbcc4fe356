use std::sync::Arc;

use lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

// A link to the next node in a chain.
//
// Each link is the sole long-lived owner of its node. Additional references only
// exist transiently, while a traversal holds the lock of the node's predecessor.
type Link<K, V> = Option<Arc<Mutex<Node<K, V>>>>;

// A locked node, holding its own reference to the node.
//
// Owned guards are what make hand-over-hand locking expressible: the guard for a
// successor does not borrow from the guard of its predecessor, so the predecessor
// can be released while the successor stays locked.
type NodeGuard<K, V> = ArcMutexGuard<RawMutex, Node<K, V>>;

// A key-value pair in a bucket chain.
//
// All fields are protected by the mutex wrapping the node.
struct Node<K, V> {
    key: K,
    value: V,
    next: Link<K, V>,
}

impl<K, V> Node<K, V> {
    fn alloc(key: K, value: V) -> Arc<Mutex<Node<K, V>>> {
        Arc::new(Mutex::new(Node {
            key,
            value,
            next: None,
        }))
    }
}

// A singly-linked chain of nodes rooted at a bucket slot.
//
// The slot has its own lock, which plays the role of the predecessor for the
// first node. Every traversal acquires the slot lock, then the first node, and
// from there holds at most two adjacent node locks at a time. Since all threads
// acquire locks in chain order, there are no lock-order cycles.
pub struct Chain<K, V> {
    head: Mutex<Link<K, V>>,
}

impl<K, V> Chain<K, V> {
    pub fn new() -> Chain<K, V> {
        Chain {
            head: Mutex::new(None),
        }
    }

    // Unlinks every node in the chain, returning the number of nodes released.
    //
    // Callers must guarantee that no other operation is traversing the chain.
    pub fn clear(&self) -> usize {
        let head = self.head.lock().take();
        unlink_all(head)
    }
}

impl<K: Eq, V> Chain<K, V> {
    // Locks the first node of the chain, or returns `None` if the chain is empty.
    //
    // The slot lock is held until the first node is locked.
    fn first(&self) -> Option<NodeGuard<K, V>> {
        self.head.lock().as_ref().map(|node| node.lock_arc())
    }

    // Advances `current` to its successor, locking the successor before the current
    // node is released.
    //
    // Returns `false` if `current` is the tail, in which case it stays locked.
    #[inline]
    fn advance(current: &mut NodeGuard<K, V>) -> bool {
        match current.next.clone() {
            Some(next) => {
                // The assignment releases the old guard only after the new one is acquired.
                *current = next.lock_arc();
                true
            }
            None => false,
        }
    }

    // Finds the node with the given key, returning it locked.
    //
    // Only the matching node's lock is held on return.
    fn find(&self, key: &K) -> Option<NodeGuard<K, V>> {
        let mut current = self.first()?;

        loop {
            if current.key == *key {
                return Some(current);
            }

            if !Chain::advance(&mut current) {
                return None;
            }
        }
    }

    // Appends a new node for `key` at the tail of the chain.
    //
    // Returns `false` without modifying the chain if the key is already present.
    // Concurrent inserters of the same key serialize on the tail lock: the loser
    // observes the winner's node as the new tail and backs off.
    pub fn insert(&self, key: K, value: V) -> bool {
        let mut head = self.head.lock();
        let first = head.as_ref().map(|node| node.lock_arc());

        let Some(mut current) = first else {
            // An empty chain is installed under the slot lock alone.
            *head = Some(Node::alloc(key, value));
            return true;
        };

        drop(head);

        loop {
            if current.key == key {
                return false;
            }

            if !Chain::advance(&mut current) {
                break;
            }
        }

        current.next = Some(Node::alloc(key, value));
        true
    }

    // Replaces the value stored for `key`, returning `false` if the key is absent.
    pub fn update(&self, key: &K, value: V) -> bool {
        match self.find(key) {
            Some(mut node) => {
                node.value = value;
                true
            }
            None => false,
        }
    }

    // Returns `true` if the chain contains `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    // Runs `f` on the value stored for `key` while holding that node's lock.
    pub fn with_value<F, R>(&self, key: &K, f: F) -> Option<R>
    where
        F: FnOnce(&mut V) -> R,
    {
        let mut node = self.find(key)?;
        Some(f(&mut node.value))
    }

    // Removes the node for `key`, returning `false` if the key is absent.
    //
    // The unlink happens while both the predecessor (or the slot, for the first
    // node) and the removed node are locked. The removed node is unlocked before
    // its memory is released.
    pub fn remove(&self, key: &K) -> bool {
        let mut head = self.head.lock();
        let first = head.as_ref().map(|node| node.lock_arc());

        let Some(mut prev) = first else {
            return false;
        };

        if prev.key == *key {
            *head = prev.next.take();
            return true;
        }

        drop(head);

        loop {
            let Some(next) = prev.next.clone() else {
                return false;
            };

            let mut current = next.lock_arc();

            if current.key == *key {
                prev.next = current.next.take();
                return true;
            }

            prev = current;
        }
    }
}

impl<K, V> Drop for Chain<K, V> {
    fn drop(&mut self) {
        unlink_all(self.head.get_mut().take());
    }
}

// Releases a list of nodes iteratively, returning the number of nodes released.
//
// Dropping a node recursively drops its successor, so long chains are cut apart
// one link at a time instead.
fn unlink_all<K, V>(mut link: Link<K, V>) -> usize {
    let mut released = 0;

    while let Some(node) = link {
        released += 1;

        link = match Arc::try_unwrap(node) {
            Ok(node) => node.into_inner().next,
            // Another thread is still releasing its guard. Detach the successor so
            // the node is dropped on its own.
            Err(node) => {
                let next = node.lock().next.take();
                next
            }
        };
    }

    released
}
