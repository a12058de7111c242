//! Open/closed lifecycle gate shared by channel operations.

use std::cell::Cell;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

thread_local! {
    /// Passes held by the current thread, across every gate.
    static HELD: Cell<usize> = const { Cell::new(0) };
}

/// Counts threads inside a channel operation.
///
/// Operations [`Gate::enter`] while open; [`Gate::close`] flips the gate
/// closed and then waits until every operation has left. A thread that is
/// itself inside an operation on any gate, such as a handler disposing a
/// channel, closes without waiting: two handlers disposing each other's
/// channel would otherwise wait on one another forever.
#[derive(Debug, Default)]
pub(crate) struct Gate {
    state: Mutex<GateState>,
    drained: Condvar,
}

#[derive(Debug, Default)]
struct GateState {
    closed: bool,
    inside: usize,
}

/// Proof of being inside the gate; leaves on drop.
pub(crate) struct Pass<'a> {
    gate: &'a Gate,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enter the gate, or `None` once it is closed.
    pub(crate) fn enter(&self) -> Option<Pass<'_>> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        state.inside += 1;
        HELD.with(|held| held.set(held.get() + 1));
        Some(Pass { gate: self })
    }

    /// Close the gate. Returns `false` if it was already closed.
    pub(crate) fn close(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.closed = true;

        if HELD.with(Cell::get) > 0 {
            return true;
        }
        while state.inside > 0 {
            state = self
                .drained
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl Drop for Pass<'_> {
    fn drop(&mut self) {
        HELD.with(|held| held.set(held.get().saturating_sub(1)));
        let mut state = self.gate.lock();
        state.inside = state.inside.saturating_sub(1);
        drop(state);
        self.gate.drained.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn enter_fails_after_close() {
        let gate = Gate::new();
        assert!(gate.enter().is_some());
        assert!(gate.close());
        assert!(gate.is_closed());
        assert!(gate.enter().is_none());
    }

    #[test]
    fn close_is_reported_once() {
        let gate = Gate::new();
        assert!(gate.close());
        assert!(!gate.close());
    }

    #[test]
    fn close_from_inside_own_pass_does_not_wait() {
        let gate = Gate::new();
        let pass = gate.enter().unwrap();
        let nested = gate.enter().unwrap();
        assert!(gate.close());
        drop(nested);
        drop(pass);
    }

    #[test]
    fn close_waits_for_other_threads() {
        let gate = Arc::new(Gate::new());
        let left = Arc::new(AtomicBool::new(false));
        let (entered_tx, entered_rx) = mpsc::channel();

        let worker = {
            let gate = Arc::clone(&gate);
            let left = Arc::clone(&left);
            thread::spawn(move || {
                let pass = gate.enter().unwrap();
                entered_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(50));
                left.store(true, Ordering::SeqCst);
                drop(pass);
            })
        };

        entered_rx.recv().unwrap();
        assert!(gate.close());
        assert!(left.load(Ordering::SeqCst));
        worker.join().unwrap();
    }

    #[test]
    fn closers_inside_each_others_gates_do_not_wait() {
        let gates = [Arc::new(Gate::new()), Arc::new(Gate::new())];
        let barrier = Arc::new(Barrier::new(2));
        let (done_tx, done_rx) = mpsc::channel();

        for (own, peer) in [(0, 1), (1, 0)] {
            let own = Arc::clone(&gates[own]);
            let peer = Arc::clone(&gates[peer]);
            let barrier = Arc::clone(&barrier);
            let done_tx = done_tx.clone();
            thread::spawn(move || {
                let _pass = own.enter().unwrap();
                barrier.wait();
                done_tx.send(peer.close()).unwrap();
            });
        }

        for _ in 0..2 {
            let closed = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert!(closed);
        }
        assert!(gates.iter().all(|g| g.is_closed()));
    }
}
