// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! The VFS server (spec §4.9, component J): a thin wrapper tying
//! [`nvx_vfs_core::MinixFs`] to a [`ConnectionRegistry`] so a remote
//! pid's `VFS_EXIT` tears down exactly the per-connection file table
//! that pid's opens accumulated, grounded on `include/nanvix/servers/
//! vfs/vfs.h`'s opcode set (`VFS_OPEN/CLOSE/READ/WRITE/SEEK/UNLINK/
//! STAT/EXIT`) and on `connection.c`'s connect/disconnect lifecycle.

use nvx_base::{Code, Error, Pid, Result};
use nvx_bcache::BlockDevice;
use nvx_conn::ConnectionRegistry;
use nvx_vfs_core::{MinixFs, OpenFlags, Stat, Whence};

/// The VFS server: one mounted volume plus the connections currently
/// attached to it.
pub struct VfsServer<D: BlockDevice> {
    fs: MinixFs<D>,
    conns: ConnectionRegistry,
}

impl<D: BlockDevice> VfsServer<D> {
    pub fn new(fs: MinixFs<D>) -> Self {
        VfsServer {
            fs,
            conns: ConnectionRegistry::new(),
        }
    }

    /// First contact from `remote_pid`: registers the connection and
    /// gives it a fresh file table rooted at the volume's root.
    pub fn connect(&mut self, remote_pid: Pid) -> Result<usize> {
        let slot = self.conns.connect(remote_pid)?;
        self.fs.attach(slot);
        Ok(slot)
    }

    /// Registers `remote_pid` if this is its first contact with the
    /// server; a no-op for an already-connected pid. Used by the runtime
    /// dispatcher, which sees client pids only as they show up on the
    /// wire rather than through an explicit `VFS_CONNECT` opcode.
    pub fn connect_if_new(&mut self, remote_pid: Pid) -> Result<()> {
        if self.conns.lookup(remote_pid).is_none() {
            self.connect(remote_pid)?;
        }
        Ok(())
    }

    /// `VFS_EXIT`: tears down `remote_pid`'s connection. Matches
    /// `connection.c`'s refcounted disconnect — the file table is only
    /// released once the refcount reaches zero.
    pub fn exit(&mut self, remote_pid: Pid) -> Result<()> {
        let slot = self
            .conns
            .lookup(remote_pid)
            .ok_or_else(|| Error::new(Code::NoEnt))?;
        self.conns.disconnect(remote_pid)?;
        if self.conns.lookup(remote_pid).is_none() {
            self.fs.detach(slot);
        }
        Ok(())
    }

    fn slot_of(&self, remote_pid: Pid) -> Result<usize> {
        self.conns.lookup(remote_pid).ok_or_else(|| Error::new(Code::NoEnt))
    }

    pub fn open(&mut self, remote_pid: Pid, path: &str, flags: OpenFlags) -> Result<usize> {
        let slot = self.slot_of(remote_pid)?;
        self.fs.open(slot, path, flags)
    }

    pub fn close(&mut self, remote_pid: Pid, fd: usize) -> Result<()> {
        let slot = self.slot_of(remote_pid)?;
        self.fs.close(slot, fd)
    }

    pub fn read(&mut self, remote_pid: Pid, fd: usize, buf: &mut [u8]) -> Result<usize> {
        let slot = self.slot_of(remote_pid)?;
        self.fs.read(slot, fd, buf)
    }

    pub fn write(&mut self, remote_pid: Pid, fd: usize, buf: &[u8]) -> Result<usize> {
        let slot = self.slot_of(remote_pid)?;
        self.fs.write(slot, fd, buf)
    }

    pub fn seek(&mut self, remote_pid: Pid, fd: usize, offset: i64, whence: Whence) -> Result<u64> {
        let slot = self.slot_of(remote_pid)?;
        self.fs.seek(slot, fd, offset, whence)
    }

    pub fn unlink(&mut self, remote_pid: Pid, path: &str) -> Result<()> {
        let slot = self.slot_of(remote_pid)?;
        self.fs.unlink(slot, path)
    }

    pub fn stat(&mut self, remote_pid: Pid, path: &str) -> Result<Stat> {
        let slot = self.slot_of(remote_pid)?;
        self.fs.stat(slot, path)
    }

    /// Teardown (spec §4.10): flush dirty buffers and bitmaps back to
    /// the device before the ring that hosts this server shuts down.
    pub fn shutdown(mut self) -> Result<()> {
        self.fs.unmount()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvx_bcache::Ramdisk;
    use nvx_base::limits::BLOCK_SIZE;

    fn fresh_server() -> VfsServer<Ramdisk> {
        let disk = Ramdisk::new(64 * BLOCK_SIZE);
        let fs = MinixFs::format(disk, 64, 32).unwrap();
        VfsServer::new(fs)
    }

    #[test]
    fn connect_open_write_read_round_trip() {
        let mut srv = fresh_server();
        let pid = Pid(1);
        srv.connect(pid).unwrap();
        let fd = srv
            .open(pid, "/greeting", OpenFlags::CREATE | OpenFlags::WRITE)
            .unwrap();
        srv.write(pid, fd, b"hi").unwrap();
        srv.close(pid, fd).unwrap();

        let fd2 = srv.open(pid, "/greeting", OpenFlags::READ).unwrap();
        let mut buf = [0u8; 8];
        let n = srv.read(pid, fd2, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"hi");
    }

    #[test]
    fn calls_from_unconnected_pid_are_rejected() {
        let mut srv = fresh_server();
        assert_eq!(
            srv.open(Pid(9), "/x", OpenFlags::CREATE).unwrap_err().code(),
            Code::NoEnt
        );
    }

    #[test]
    fn exit_releases_connection_and_later_calls_fail() {
        let mut srv = fresh_server();
        let pid = Pid(1);
        srv.connect(pid).unwrap();
        srv.exit(pid).unwrap();
        assert_eq!(
            srv.stat(pid, "/").unwrap_err().code(),
            Code::NoEnt
        );
    }

    #[test]
    fn two_connections_have_independent_file_tables() {
        let mut srv = fresh_server();
        let a = Pid(1);
        let b = Pid(2);
        srv.connect(a).unwrap();
        srv.connect(b).unwrap();
        let fd_a = srv.open(a, "/shared", OpenFlags::CREATE | OpenFlags::WRITE).unwrap();
        srv.write(a, fd_a, b"from a").unwrap();
        srv.close(a, fd_a).unwrap();

        let fd_b = srv.open(b, "/shared", OpenFlags::READ).unwrap();
        assert_eq!(fd_b, 0);
    }
}
