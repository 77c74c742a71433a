// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Per-server connection registry (spec §3 "Connection slot", §4.2).
//!
//! Grounded directly on `connection.c`: a fixed table mapping
//! `remote_pid -> (slot, refcount, reply-port)`, externally synchronized
//! by the single-threaded server event loop that owns it (spec §5).

use nvx_base::ids::PortId;
use nvx_base::limits::NANVIX_CONNECTIONS_MAX;
use nvx_base::{Code, Error, Pid, Result};

#[derive(Debug, Clone, Copy)]
struct Slot {
    remote_pid: Pid,
    refcount: u32,
    reply_port: Option<PortId>,
}

impl Slot {
    const fn free() -> Self {
        Slot {
            remote_pid: Pid::INVALID,
            refcount: 0,
            reply_port: None,
        }
    }

    fn is_free(&self) -> bool {
        !self.remote_pid.is_valid()
    }
}

/// A fixed-capacity table of client connections, one instance per server.
pub struct ConnectionRegistry {
    slots: Vec<Slot>,
}

/// Index of an occupied slot; used downstream as the key into
/// per-connection process state (spec §4.2).
pub type SlotIndex = usize;

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_capacity(NANVIX_CONNECTIONS_MAX)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ConnectionRegistry {
            slots: vec![Slot::free(); capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Registers (or re-registers) `remote_pid` as connected.
    ///
    /// If already present, increments its refcount; otherwise occupies
    /// the first free slot. Fails with `EAGAIN` if the table is full,
    /// `EINVAL` if `remote_pid < 0`.
    pub fn connect(&mut self, remote_pid: Pid) -> Result<SlotIndex> {
        if !remote_pid.is_valid() {
            return Err(Error::new(Code::Inval));
        }

        if let Some(idx) = self.lookup(remote_pid) {
            self.slots[idx].refcount += 1;
            return Ok(idx);
        }

        let idx = self
            .slots
            .iter()
            .position(|s| s.is_free())
            .ok_or_else(|| Error::new(Code::Again))?;
        self.slots[idx] = Slot {
            remote_pid,
            refcount: 1,
            reply_port: None,
        };
        Ok(idx)
    }

    /// Decrements `remote_pid`'s refcount; frees the slot at zero.
    /// Fails with `ENOENT` if absent.
    pub fn disconnect(&mut self, remote_pid: Pid) -> Result<()> {
        let idx = self.lookup(remote_pid).ok_or_else(|| Error::new(Code::NoEnt))?;
        let slot = &mut self.slots[idx];
        slot.refcount -= 1;
        if slot.refcount == 0 {
            self.slots[idx] = Slot::free();
        }
        Ok(())
    }

    /// Returns the slot index holding `remote_pid`, if connected.
    pub fn lookup(&self, remote_pid: Pid) -> Option<SlotIndex> {
        if !remote_pid.is_valid() {
            return None;
        }
        self.slots.iter().position(|s| s.remote_pid == remote_pid)
    }

    /// Lists every currently connected remote pid.
    pub fn list(&self) -> Vec<Pid> {
        self.slots
            .iter()
            .filter(|s| !s.is_free())
            .map(|s| s.remote_pid)
            .collect()
    }

    /// Records the reply port known for a connected remote.
    pub fn set_port(&mut self, remote_pid: Pid, port: PortId) -> Result<()> {
        let idx = self.lookup(remote_pid).ok_or_else(|| Error::new(Code::NoEnt))?;
        self.slots[idx].reply_port = Some(port);
        Ok(())
    }

    /// Returns the reply port recorded for a connected remote, if any.
    pub fn get_port(&self, remote_pid: Pid) -> Result<Option<PortId>> {
        let idx = self.lookup(remote_pid).ok_or_else(|| Error::new(Code::NoEnt))?;
        Ok(self.slots[idx].reply_port)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
