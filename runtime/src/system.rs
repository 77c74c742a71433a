// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Boots every server named in a [`Topology`] ring by ring, per spec
//! §4.10's four steps: claim well-known inboxes, run the servers'
//! dispatch loops, signal the spawn barrier between rings, and reverse
//! the order at teardown.
//!
//! This in-process harness runs every server and client as threads of
//! one program rather than as separate OS processes across real NoC
//! clusters (out of scope per spec §1), so [`SpawnBarrier::new(1)`] is
//! used throughout: one party is this process itself, not one per
//! cluster node. The ring ordering and barrier handshake it exercises
//! are otherwise exactly the ones a multi-node deployment would run.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use nvx_base::config::Topology;
use nvx_base::ids::{Address, NodeId, PortId};
use nvx_base::limits::BLOCK_SIZE;
use nvx_base::{Code, Error, Pid, Result};
use nvx_barrier::{RingSequencer, SpawnBarrier};
use nvx_bcache::Ramdisk;
use nvx_ipc::Noc;
use nvx_name_server::NameServer;
use nvx_rcache::PageCache;
use nvx_rmem_server::RmemServer;
use nvx_vfs_core::MinixFs;
use nvx_vfsd_server::VfsServer;

use crate::name::{self, NameClient, NameMsg};
use crate::rmem::{self, RmemClient, RmemMsg};
use crate::sysv::{self, SysvMsg, SysvState};
use crate::vfs::{self, VfsClient, VfsMsg};

/// Blocks in the reference in-memory volume, sized generously for the
/// scenarios in spec §8 (a handful of small files, nowhere near real
/// device capacity).
const VFS_DISK_BLOCKS: u32 = 4096;
const VFS_NINODES: u32 = 128;

/// First port handed to a client endpoint; server ports in
/// `config/*.toml` stay below this, so the two ranges never collide.
const CLIENT_PORT_BASE: u16 = 1000;

fn resolve(topology: &Topology, name: &str) -> Result<Address> {
    topology
        .resolve(name)
        .map(|e| Address::new(e.node, e.port))
        .ok_or_else(|| Error::with_msg(Code::NoEnt, format!("no '{name}' entry in topology")))
}

/// A fully booted system: every server thread running, ready to accept
/// client connections over its protocol's [`Noc`].
pub struct System {
    topology: Topology,
    name_noc: Arc<Noc<NameMsg>>,
    sysv_noc: Arc<Noc<SysvMsg>>,
    rmem_noc: Arc<Noc<RmemMsg>>,
    vfs_noc: Arc<Noc<VfsMsg>>,
    name_addr: Address,
    sysv_addr: Address,
    rmem_addr: Address,
    vfs_addr: Address,
    next_client_port: AtomicU16,
    handles: Vec<JoinHandle<()>>,
}

impl System {
    /// Runs spec §4.10's setup sequence: claims every well-known inbox,
    /// spawns one thread per server, and walks spawn rings in order.
    pub fn boot(topology: Topology) -> Result<System> {
        let name_addr = resolve(&topology, "name-server")?;
        let sysv_addr = resolve(&topology, "sysv-server")?;
        let rmem_addr = resolve(&topology, "rmem-server")?;
        let vfs_addr = resolve(&topology, "vfs-server")?;

        let name_noc: Arc<Noc<NameMsg>> = Noc::new();
        let sysv_noc: Arc<Noc<SysvMsg>> = Noc::new();
        let rmem_noc: Arc<Noc<RmemMsg>> = Noc::new();
        let vfs_noc: Arc<Noc<VfsMsg>> = Noc::new();

        let barrier = SpawnBarrier::new(1);
        let seq = RingSequencer::new(&topology, barrier);
        let mut handles = Vec::new();

        seq.run_setup(|ring| {
            for entry in topology.ring(ring) {
                match entry.name.as_str() {
                    "name-server" => {
                        let ep = name_noc.open(name_addr).expect("name inbox already claimed");
                        handles.push(std::thread::spawn(move || {
                            let mut srv = NameServer::new();
                            if let Err(e) = name::serve(&ep, name_addr, &mut srv) {
                                log::error!("name server exited: {e}");
                            }
                        }));
                    },
                    "sysv-server" => {
                        let ep = sysv_noc.open(sysv_addr).expect("sysv inbox already claimed");
                        handles.push(std::thread::spawn(move || {
                            let mut state = SysvState::new();
                            if let Err(e) = sysv::serve(&ep, sysv_addr, &mut state) {
                                log::error!("sysv server exited: {e}");
                            }
                        }));
                    },
                    "rmem-server" => {
                        let ep = rmem_noc.open(rmem_addr).expect("rmem inbox already claimed");
                        handles.push(std::thread::spawn(move || {
                            let mut srv = RmemServer::new();
                            if let Err(e) = rmem::serve(&ep, rmem_addr, &mut srv) {
                                log::error!("rmem server exited: {e}");
                            }
                        }));
                    },
                    "vfs-server" => {
                        let ep = vfs_noc.open(vfs_addr).expect("vfs inbox already claimed");
                        handles.push(std::thread::spawn(move || {
                            let disk = Ramdisk::new(VFS_DISK_BLOCKS as usize * BLOCK_SIZE);
                            let fs = MinixFs::format(disk, VFS_DISK_BLOCKS, VFS_NINODES)
                                .expect("fresh volume must format");
                            let mut srv = VfsServer::new(fs);
                            if let Err(e) = vfs::serve(&ep, vfs_addr, &mut srv) {
                                log::error!("vfs server exited: {e}");
                            }
                        }));
                    },
                    other => log::warn!("unknown server '{other}' in topology, skipping"),
                }
            }
        });

        Ok(System {
            topology,
            name_noc,
            sysv_noc,
            rmem_noc,
            vfs_noc,
            name_addr,
            sysv_addr,
            rmem_addr,
            vfs_addr,
            next_client_port: AtomicU16::new(CLIENT_PORT_BASE),
            handles,
        })
    }

    fn client_port(&self) -> PortId {
        PortId(self.next_client_port.fetch_add(1, Ordering::Relaxed))
    }

    /// Opens a fresh Name client bound to `pid` on the leader node.
    pub fn name_client(&self, pid: Pid) -> Result<NameClient> {
        let addr = Address::new(NodeId(0), self.client_port());
        let ep = self.name_noc.open(addr)?;
        Ok(NameClient::new(ep, addr, self.name_addr, pid))
    }

    pub fn sysv_client(&self, pid: Pid) -> Result<sysv::SysvClient> {
        let addr = Address::new(NodeId(0), self.client_port());
        let ep = self.sysv_noc.open(addr)?;
        Ok(sysv::SysvClient::new(ep, addr, self.sysv_addr, pid))
    }

    pub fn rmem_client(&self, pid: Pid) -> Result<RmemClient> {
        let addr = Address::new(NodeId(0), self.client_port());
        let ep = self.rmem_noc.open(addr)?;
        Ok(RmemClient::new(ep, addr, self.rmem_addr, pid))
    }

    pub fn vfs_client(&self, pid: Pid) -> Result<VfsClient> {
        let addr = Address::new(NodeId(0), self.client_port());
        let ep = self.vfs_noc.open(addr)?;
        Ok(VfsClient::new(ep, addr, self.vfs_addr, pid))
    }

    /// A page cache backed by a fresh [`RmemClient`] talking to the
    /// running RMem server (spec §4.7, the reference link named in this
    /// module's doc comment).
    pub fn page_cache(&self, pid: Pid) -> Result<PageCache<RmemClient>> {
        Ok(PageCache::new(self.rmem_client(pid)?))
    }

    /// Runs spec §4.10's teardown sequence in reverse ring order, then
    /// joins every server thread.
    pub fn shutdown(self) -> Result<()> {
        let barrier = SpawnBarrier::new(1);
        let seq = RingSequencer::new(&self.topology, barrier);
        seq.run_teardown(|ring| {
            for entry in self.topology.ring(ring) {
                let result = match entry.name.as_str() {
                    "name-server" => self.name_client(Pid(0)).and_then(|c| c.shutdown()),
                    "sysv-server" => self.sysv_client(Pid(0)).and_then(|c| c.shutdown()),
                    "rmem-server" => self.rmem_client(Pid(0)).and_then(|c| c.shutdown()),
                    "vfs-server" => self.vfs_client(Pid(0)).and_then(|c| c.shutdown()),
                    _ => Ok(()),
                };
                if let Err(e) = result {
                    log::warn!("shutdown of '{}' failed: {e}", entry.name);
                }
            }
        });

        for handle in self.handles {
            let _ = handle.join();
        }
        Ok(())
    }
}
