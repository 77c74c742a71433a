// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Two-phase spawn barrier: `syncs[0]` (all-to-leader) and `syncs[1]`
//! (leader-to-all), per spec §4.3.

use std::sync::Arc;

use nvx_ipc::SyncGate;

/// One barrier shared by the leader and every follower spawner.
///
/// Each side calls [`wait`](Self::wait) once per ring; nobody proceeds to
/// the next ring until the slowest party of the current one has arrived.
/// The two gates exist because the spec names them as distinct phases
/// rather than a single N-party rendezvous: the leader is the only party
/// that needs to observe "everyone has arrived" before releasing
/// followers, matching a real two-phase barrier over a NoC link where
/// the leader fans in, then fans out.
pub struct SpawnBarrier {
    to_leader: Arc<SyncGate>,
    to_all: Arc<SyncGate>,
    parties: usize,
}

impl SpawnBarrier {
    /// `parties` is the leader plus every follower node (spec §4.3:
    /// "followers include all spawner nodes listed in configuration").
    pub fn new(parties: usize) -> Self {
        SpawnBarrier {
            to_leader: SyncGate::new(),
            to_all: SyncGate::new(),
            parties,
        }
    }

    /// Shares this barrier's gates with another handle bound to the same
    /// rendezvous (one handle per node/thread in-process).
    pub fn handle(&self) -> SpawnBarrier {
        SpawnBarrier {
            to_leader: Arc::clone(&self.to_leader),
            to_all: Arc::clone(&self.to_all),
            parties: self.parties,
        }
    }

    /// Blocks until every party has reached this ring boundary.
    pub fn wait(&self) {
        self.to_leader.wait(self.parties);
        self.to_all.wait(self.parties);
    }
}
