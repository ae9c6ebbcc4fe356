use parking_lot::{Condvar, Mutex};

use crate::Error;

/// The lifecycle phase of a [`HashTable`](crate::HashTable).
///
/// A table moves through the phases in order and never goes back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Operations are admitted.
    Running,

    /// A stop was requested. New operations are rejected, admitted operations
    /// run to completion.
    StopRequested,

    /// Every admitted operation has finished and the table was torn down.
    Drained,
}

// Coordinates admission of operations with table shutdown.
//
// Every operation holds a `Permit` for its duration. Teardown waits on `drained`
// until the number of outstanding permits reaches zero.
pub struct Shutdown {
    state: Mutex<State>,
    drained: Condvar,
}

struct State {
    phase: Phase,
    in_flight: usize,
}

// Proof that an operation was admitted.
//
// Dropping the permit releases the admission, and wakes any waiting teardown
// if this was the last operation in flight after a stop.
pub struct Permit<'a> {
    shutdown: &'a Shutdown,
}

impl Drop for Permit<'_> {
    #[inline]
    fn drop(&mut self) {
        self.shutdown.release();
    }
}

impl Shutdown {
    pub fn new() -> Shutdown {
        Shutdown {
            state: Mutex::new(State {
                phase: Phase::Running,
                in_flight: 0,
            }),
            drained: Condvar::new(),
        }
    }

    // Admit an operation, or reject it if a stop was requested.
    //
    // The phase check and the increment happen under the same lock, so no
    // operation can slip in after `request_stop` returns.
    #[inline]
    pub fn admit(&self) -> Result<Permit<'_>, Error> {
        let mut state = self.state.lock();

        if state.phase != Phase::Running {
            return Err(Error::Stopped);
        }

        state.in_flight += 1;
        Ok(Permit { shutdown: self })
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.in_flight -= 1;

        if state.in_flight == 0 && state.phase == Phase::StopRequested {
            self.drained.notify_all();
        }
    }

    // Stop admitting new operations.
    pub fn request_stop(&self) -> Result<(), Error> {
        let mut state = self.state.lock();

        if state.phase != Phase::Running {
            return Err(Error::AlreadyStopped);
        }

        state.phase = Phase::StopRequested;
        tracing::debug!(in_flight = state.in_flight, "stop requested");
        Ok(())
    }

    // Block until every admitted operation has finished, then move to `Drained`.
    //
    // Exactly one caller observes the transition. Concurrent or later callers
    // receive `Error::Destroyed`.
    pub fn drain(&self) -> Result<(), Error> {
        let mut state = self.state.lock();

        match state.phase {
            Phase::Running => return Err(Error::NotYetStopped),
            Phase::Drained => return Err(Error::Destroyed),
            Phase::StopRequested => {}
        }

        while state.phase == Phase::StopRequested && state.in_flight > 0 {
            self.drained.wait(&mut state);
        }

        // Another caller finished the drain while we were waiting.
        if state.phase == Phase::Drained {
            return Err(Error::Destroyed);
        }

        state.phase = Phase::Drained;
        tracing::debug!("drained");
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }
}
