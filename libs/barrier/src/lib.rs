// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! The multi-ring spawn barrier (spec §4.3, component D): a two-phase
//! rendezvous among spawner nodes that also orders server startup
//! within a node by "ring".

mod barrier;
mod rings;

pub use barrier::SpawnBarrier;
pub use rings::RingSequencer;
