// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! The Name service (spec §4.4, component E): a bidirectional table of
//! `name ↔ (node, port)` bindings plus pid/pgid allocation, grounded on
//! `original_source/src/test/name/master.c`'s link/lookup/unlink
//! exercise and `include/nanvix/servers/name.h`'s opcode set.

use nvx_base::limits::{NAME_MAX, NANVIX_PROC_MAX};
use nvx_base::{Code, Error, NodeId, Pgid, Pid, PortId, Result};

#[derive(Debug, Clone)]
struct NameEntry {
    name: String,
    node: NodeId,
    port: PortId,
    pid: Pid,
    pgid: Pgid,
    last_heartbeat: u64,
}

fn name_is_valid(name: &str) -> bool {
    !name.is_empty() && name.len() < NAME_MAX
}

/// The process-wide Name server table (spec §3: "array of
/// `NANVIX_PROC_MAX` entries").
pub struct NameServer {
    entries: Vec<Option<NameEntry>>,
}

impl Default for NameServer {
    fn default() -> Self {
        Self::new()
    }
}

impl NameServer {
    pub fn new() -> Self {
        NameServer {
            entries: (0..NANVIX_PROC_MAX).map(|_| None).collect(),
        }
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.as_ref().is_some_and(|e| e.name == name))
    }

    fn find_by_pid(&self, pid: Pid) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.as_ref().is_some_and(|e| e.pid == pid))
    }

    /// `LINK(name, node, port)`.
    pub fn link(&mut self, name: &str, node: NodeId, port: PortId) -> Result<()> {
        if !name_is_valid(name) {
            return Err(Error::new(Code::Inval));
        }
        if self.find(name).is_some() {
            return Err(Error::new(Code::Exists));
        }
        let slot = self
            .entries
            .iter()
            .position(|e| e.is_none())
            .ok_or_else(|| Error::new(Code::NoSpace))?;
        self.entries[slot] = Some(NameEntry {
            name: name.to_string(),
            node,
            port,
            pid: Pid::INVALID,
            pgid: Pgid::INVALID,
            last_heartbeat: 0,
        });
        Ok(())
    }

    /// `LOOKUP(name)`.
    pub fn lookup(&self, name: &str) -> Result<(NodeId, PortId)> {
        let idx = self.find(name).ok_or_else(|| Error::new(Code::NoEnt))?;
        let e = self.entries[idx].as_ref().unwrap();
        Ok((e.node, e.port))
    }

    /// `UNLINK(name)`; fails with `EPERM` if `caller_node` does not own
    /// the binding (spec §4.4).
    pub fn unlink(&mut self, name: &str, caller_node: NodeId) -> Result<()> {
        let idx = self.find(name).ok_or_else(|| Error::new(Code::NoEnt))?;
        let e = self.entries[idx].as_ref().unwrap();
        if e.node != caller_node {
            return Err(Error::new(Code::Perm));
        }
        self.entries[idx] = None;
        Ok(())
    }

    /// `EXIT(name)`: unconditional removal, used when the owning process
    /// itself is tearing down.
    pub fn exit(&mut self, name: &str) -> Result<()> {
        let idx = self.find(name).ok_or_else(|| Error::new(Code::NoEnt))?;
        self.entries[idx] = None;
        Ok(())
    }

    /// `HEARTBEAT(name)`: updates `last_heartbeat`. The sweep policy
    /// that would use this timestamp is left to a future liveness
    /// checker (spec §9 open question); this server only records it.
    pub fn heartbeat(&mut self, name: &str, now: u64) -> Result<()> {
        let idx = self.find(name).ok_or_else(|| Error::new(Code::NoEnt))?;
        self.entries[idx].as_mut().unwrap().last_heartbeat = now;
        Ok(())
    }

    pub fn last_heartbeat(&self, name: &str) -> Result<u64> {
        let idx = self.find(name).ok_or_else(|| Error::new(Code::NoEnt))?;
        Ok(self.entries[idx].as_ref().unwrap().last_heartbeat)
    }

    /// `GETPID(name)`.
    pub fn get_pid(&self, name: &str) -> Result<Pid> {
        let idx = self.find(name).ok_or_else(|| Error::new(Code::NoEnt))?;
        Ok(self.entries[idx].as_ref().unwrap().pid)
    }

    /// `SETPID(name, pid)`; refuses a `pid` already bound elsewhere.
    pub fn set_pid(&mut self, name: &str, pid: Pid) -> Result<()> {
        if !pid.is_valid() {
            return Err(Error::new(Code::Inval));
        }
        if self.find_by_pid(pid).is_some() {
            return Err(Error::new(Code::Exists));
        }
        let idx = self.find(name).ok_or_else(|| Error::new(Code::NoEnt))?;
        self.entries[idx].as_mut().unwrap().pid = pid;
        Ok(())
    }

    /// `GETPGID(name)`.
    pub fn get_pgid(&self, name: &str) -> Result<Pgid> {
        let idx = self.find(name).ok_or_else(|| Error::new(Code::NoEnt))?;
        Ok(self.entries[idx].as_ref().unwrap().pgid)
    }

    /// `SETPGID(name, pgid)`; `pgid == 0` creates a new group equal to
    /// the target's own pid (spec §4.4: the POSIX rule).
    pub fn set_pgid(&mut self, name: &str, pgid: i32) -> Result<()> {
        let idx = self.find(name).ok_or_else(|| Error::new(Code::NoEnt))?;
        let own_pid = self.entries[idx].as_ref().unwrap().pid;
        if !own_pid.is_valid() {
            return Err(Error::new(Code::Inval));
        }
        let resolved = if pgid == 0 { Pgid(own_pid.0) } else { Pgid(pgid) };
        self.entries[idx].as_mut().unwrap().pgid = resolved;
        Ok(())
    }
}
