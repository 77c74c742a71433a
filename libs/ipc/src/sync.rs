// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Sync gates: the multi-party rendezvous primitive spawn barriers are
//! built on (spec §4.3, glossary "Sync gate").
//!
//! Real hardware sync gates are out of scope (spec §1); this is the
//! stand-in, built directly on a condition variable rather than routed
//! through the [`crate::loopback::Noc`], since a sync gate is a distinct
//! physical unit from mailboxes/portals on the real target.

use std::sync::{Arc, Condvar, Mutex};

/// A single multi-party rendezvous point: `n` parties call [`wait`](Self::wait)
/// and none of them return until all `n` have arrived.
pub struct SyncGate {
    state: Mutex<State>,
    cond: Condvar,
}

struct State {
    arrived: usize,
    generation: u64,
}

impl SyncGate {
    pub fn new() -> Arc<Self> {
        Arc::new(SyncGate {
            state: Mutex::new(State {
                arrived: 0,
                generation: 0,
            }),
            cond: Condvar::new(),
        })
    }

    /// Blocks until `n` total parties (across all callers sharing this
    /// gate) have called `wait`, then releases all of them together.
    pub fn wait(&self, n: usize) {
        let mut state = self.state.lock().unwrap();
        let my_generation = state.generation;
        state.arrived += 1;

        if state.arrived >= n {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cond.notify_all();
        }
        else {
            while state.generation == my_generation {
                state = self.cond.wait(state).unwrap();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn all_parties_release_together() {
        let gate = SyncGate::new();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let gate = Arc::clone(&gate);
            handles.push(thread::spawn(move || {
                gate.wait(4);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn gate_can_be_reused_across_generations() {
        let gate = SyncGate::new();
        for _ in 0..3 {
            let mut handles = Vec::new();
            for _ in 0..2 {
                let gate = Arc::clone(&gate);
                handles.push(thread::spawn(move || gate.wait(2)));
            }
            for h in handles {
                h.join().unwrap();
            }
        }
    }
}
