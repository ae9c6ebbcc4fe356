use std::sync::atomic::{AtomicU32, Ordering};

// A one-shot start gate.
//
// Threads block in `wait` until the gate is opened. Waiting uses a futex through
// `atomic_wait` rather than spinning on the flag.
pub struct Gate {
    state: AtomicU32,
}

impl Gate {
    const CLOSED: u32 = 0;
    const OPEN: u32 = 1;

    pub fn new() -> Gate {
        Gate {
            state: AtomicU32::new(Gate::CLOSED),
        }
    }

    // Block until the gate is opened.
    pub fn wait(&self) {
        // `wait` may return spuriously, recheck the state.
        while self.state.load(Ordering::Acquire) == Gate::CLOSED {
            atomic_wait::wait(&self.state, Gate::CLOSED);
        }
    }

    // Open the gate, waking all waiting threads.
    pub fn open(&self) {
        self.state.store(Gate::OPEN, Ordering::Release);
        atomic_wait::wake_all(&self.state);
    }

    // Returns a guard that opens the gate when dropped.
    pub fn opener(&self) -> Opener<'_> {
        Opener(self)
    }
}

// Opens the gate on drop, including during unwinding.
pub struct Opener<'a>(&'a Gate);

impl Drop for Opener<'_> {
    fn drop(&mut self) {
        self.0.open();
    }
}
