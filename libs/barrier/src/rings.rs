// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Drives a [`SpawnBarrier`] ring by ring, using a [`Topology`] to know
//! how many rings exist (spec §4.3: "Each spawn ring level ... performs
//! one barrier wait before handing control to servers of ring `r+1`").

use nvx_base::config::Topology;

use crate::barrier::SpawnBarrier;

/// Walks spawn rings `0..=last_ring` in order, running one barrier wait
/// per ring after the caller's `on_ring` callback has started that
/// ring's local servers (spec §4.10, step 3: "Signal the spawn barrier").
pub struct RingSequencer<'a> {
    topology: &'a Topology,
    barrier: SpawnBarrier,
}

impl<'a> RingSequencer<'a> {
    pub fn new(topology: &'a Topology, barrier: SpawnBarrier) -> Self {
        RingSequencer { topology, barrier }
    }

    /// Runs `on_ring(ring)` for every ring present in the topology, from
    /// lowest to highest, waiting on the barrier after each.
    pub fn run_setup<F>(&self, mut on_ring: F)
    where
        F: FnMut(u8),
    {
        for ring in 0..=self.topology.last_ring() {
            on_ring(ring);
            self.barrier.wait();
        }
    }

    /// Runs `on_ring(ring)` for every ring from highest to lowest,
    /// waiting on the barrier after each (spec §4.10: "Teardown mirrors
    /// setup in reverse ring order").
    pub fn run_teardown<F>(&self, mut on_ring: F)
    where
        F: FnMut(u8),
    {
        for ring in (0..=self.topology.last_ring()).rev() {
            on_ring(ring);
            self.barrier.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[test]
    fn setup_visits_rings_in_ascending_order() {
        let topo = Topology::unix64();
        let barrier = SpawnBarrier::new(1);
        let seq = RingSequencer::new(&topo, barrier);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        seq.run_setup(move |ring| seen2.lock().unwrap().push(ring));
        let seen = seen.lock().unwrap().clone();
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted);
        assert_eq!(*seen.first().unwrap(), 0);
        assert_eq!(*seen.last().unwrap(), topo.last_ring());
    }

    #[test]
    fn teardown_visits_rings_in_descending_order() {
        let topo = Topology::unix64();
        let barrier = SpawnBarrier::new(1);
        let seq = RingSequencer::new(&topo, barrier);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        seq.run_teardown(move |ring| seen2.lock().unwrap().push(ring));
        let seen = seen.lock().unwrap().clone();
        assert_eq!(*seen.first().unwrap(), topo.last_ring());
        assert_eq!(*seen.last().unwrap(), 0);
    }

    #[test]
    fn multi_node_setup_barrier_synchronizes_rings() {
        let topo = Topology::unix64();
        let barrier = SpawnBarrier::new(2);
        let order = Arc::new(Mutex::new(Vec::new()));

        let topo_a = topo.clone();
        let barrier_a = barrier.handle();
        let order_a = Arc::clone(&order);
        let a = thread::spawn(move || {
            let seq = RingSequencer::new(&topo_a, barrier_a);
            seq.run_setup(|ring| order_a.lock().unwrap().push(('a', ring)));
        });

        let topo_b = topo.clone();
        let barrier_b = barrier.handle();
        let order_b = Arc::clone(&order);
        let b = thread::spawn(move || {
            let seq = RingSequencer::new(&topo_b, barrier_b);
            seq.run_setup(|ring| order_b.lock().unwrap().push(('b', ring)));
        });

        a.join().unwrap();
        b.join().unwrap();

        let order = order.lock().unwrap();
        assert_eq!(order.len(), 2 * (topo.last_ring() as usize + 1));
    }
}
