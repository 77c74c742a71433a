// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Wire protocol for the VFS service (spec §4.9): `OPEN/CLOSE/SEEK/
//! UNLINK/STAT/EXIT` are plain mailbox round-trips; `READ`/`WRITE` move
//! their buffers over the portal handshake, the same shape the RMem
//! protocol in [`crate::rmem`] uses.
//!
//! A connection's first message implicitly attaches it (there is no
//! `VFS_CONNECT` opcode in spec §6's client surface), via
//! [`nvx_vfsd_server::VfsServer::connect_if_new`].

use nvx_base::ids::Address;
use nvx_base::{Code, Error, Pid, Result};
use nvx_bcache::BlockDevice;
use nvx_ipc::header::RequestIdGen;
use nvx_ipc::{Endpoint, Message, MessageHeader};
use nvx_vfsd_server::VfsServer;
use nvx_vfs_core::{OpenFlags, Stat, Whence};

#[derive(Debug, Clone)]
pub enum VfsMsg {
    Open { path: String, flags: OpenFlags },
    Close { fd: usize },
    Read { fd: usize, len: usize },
    Write { fd: usize, len: usize },
    Seek { fd: usize, offset: i64, whence: Whence },
    Unlink { path: String },
    Stat { path: String },
    Exit,
    Shutdown,

    FdReply { fd: usize },
    Ack,
    /// Announces that a portal transfer of the read's return length
    /// follows.
    DataReady { len: usize },
    Written { n: usize },
    OffsetReply { offset: u64 },
    StatReply { stat: Stat },
    Fail { code: Code },
}

/// Runs the VFS server's serve loop until a [`VfsMsg::Shutdown`] arrives.
/// `READ`/`WRITE` step outside the plain request/reply shape, so this
/// loop (like [`crate::rmem::serve`]) handles the portal handshake
/// inline.
pub fn serve<D: BlockDevice>(
    ep: &Endpoint<VfsMsg>,
    self_addr: Address,
    server: &mut VfsServer<D>,
) -> Result<()> {
    loop {
        let msg = ep.recv_message()?;
        if matches!(msg.payload, VfsMsg::Shutdown) {
            return Ok(());
        }
        let pid = msg.header.source_pid;
        let src = Address::new(msg.header.src_node, msg.header.src_port);
        let reply_header = msg.header.reply_to(0, self_addr.node, self_addr.port);

        if let Err(e) = server.connect_if_new(pid) {
            ep.send_message(
                src,
                Message { header: reply_header, payload: VfsMsg::Fail { code: e.code() } },
            )?;
            continue;
        }

        match msg.payload {
            VfsMsg::Shutdown => unreachable!(),
            VfsMsg::Open { path, flags } => {
                let payload = match server.open(pid, &path, flags) {
                    Ok(fd) => VfsMsg::FdReply { fd },
                    Err(e) => VfsMsg::Fail { code: e.code() },
                };
                ep.send_message(src, Message { header: reply_header, payload })?;
            },
            VfsMsg::Close { fd } => {
                let payload = match server.close(pid, fd) {
                    Ok(()) => VfsMsg::Ack,
                    Err(e) => VfsMsg::Fail { code: e.code() },
                };
                ep.send_message(src, Message { header: reply_header, payload })?;
            },
            VfsMsg::Read { fd, len } => {
                let mut buf = vec![0u8; len];
                match server.read(pid, fd, &mut buf) {
                    Ok(n) => {
                        ep.send_portal(
                            src,
                            Message { header: reply_header, payload: VfsMsg::DataReady { len: n } },
                            &buf[..n],
                        )?;
                    },
                    Err(e) => {
                        ep.send_message(
                            src,
                            Message { header: reply_header, payload: VfsMsg::Fail { code: e.code() } },
                        )?;
                    },
                }
            },
            VfsMsg::Write { fd, len } => {
                // the header carrying `Write { fd, len }` was already
                // consumed above; the payload itself arrives next on the
                // portal.
                let data = ep.recv_portal_exact(len)?;
                let payload = match server.write(pid, fd, &data) {
                    Ok(n) => VfsMsg::Written { n },
                    Err(e) => VfsMsg::Fail { code: e.code() },
                };
                ep.send_message(src, Message { header: reply_header, payload })?;
            },
            VfsMsg::Seek { fd, offset, whence } => {
                let payload = match server.seek(pid, fd, offset, whence) {
                    Ok(offset) => VfsMsg::OffsetReply { offset },
                    Err(e) => VfsMsg::Fail { code: e.code() },
                };
                ep.send_message(src, Message { header: reply_header, payload })?;
            },
            VfsMsg::Unlink { path } => {
                let payload = match server.unlink(pid, &path) {
                    Ok(()) => VfsMsg::Ack,
                    Err(e) => VfsMsg::Fail { code: e.code() },
                };
                ep.send_message(src, Message { header: reply_header, payload })?;
            },
            VfsMsg::Stat { path } => {
                let payload = match server.stat(pid, &path) {
                    Ok(stat) => VfsMsg::StatReply { stat },
                    Err(e) => VfsMsg::Fail { code: e.code() },
                };
                ep.send_message(src, Message { header: reply_header, payload })?;
            },
            VfsMsg::Exit => {
                let payload = match server.exit(pid) {
                    Ok(()) => VfsMsg::Ack,
                    Err(e) => VfsMsg::Fail { code: e.code() },
                };
                ep.send_message(src, Message { header: reply_header, payload })?;
            },
            VfsMsg::FdReply { .. }
            | VfsMsg::Ack
            | VfsMsg::DataReady { .. }
            | VfsMsg::Written { .. }
            | VfsMsg::OffsetReply { .. }
            | VfsMsg::StatReply { .. }
            | VfsMsg::Fail { .. } => {
                ep.send_message(
                    src,
                    Message { header: reply_header, payload: VfsMsg::Fail { code: Code::Inval } },
                )?;
            },
        }
    }
}

/// Client stub for the VFS service.
pub struct VfsClient {
    ep: Endpoint<VfsMsg>,
    server: Address,
    self_addr: Address,
    pid: Pid,
    reqs: RequestIdGen,
}

impl VfsClient {
    pub fn new(ep: Endpoint<VfsMsg>, self_addr: Address, server: Address, pid: Pid) -> Self {
        VfsClient { ep, server, self_addr, pid, reqs: RequestIdGen::new() }
    }

    fn header(&self) -> MessageHeader {
        MessageHeader {
            opcode: 0,
            src_node: self.self_addr.node,
            src_port: self.self_addr.port,
            dst_node: self.server.node,
            dst_port: self.server.port,
            request_id: self.reqs.next(),
            source_pid: self.pid,
        }
    }

    fn call(&self, payload: VfsMsg) -> Result<VfsMsg> {
        self.ep.send_message(self.server, Message { header: self.header(), payload })?;
        Ok(self.ep.recv_message()?.payload)
    }

    pub fn open(&self, path: &str, flags: OpenFlags) -> Result<usize> {
        match self.call(VfsMsg::Open { path: path.to_string(), flags })? {
            VfsMsg::FdReply { fd } => Ok(fd),
            VfsMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    pub fn close(&self, fd: usize) -> Result<()> {
        match self.call(VfsMsg::Close { fd })? {
            VfsMsg::Ack => Ok(()),
            VfsMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    pub fn read(&self, fd: usize, buf: &mut [u8]) -> Result<usize> {
        self.ep.send_message(
            self.server,
            Message { header: self.header(), payload: VfsMsg::Read { fd, len: buf.len() } },
        )?;
        match self.ep.recv_message()?.payload {
            VfsMsg::DataReady { len } => {
                let data = self.ep.recv_portal_exact(len)?;
                buf[..len].copy_from_slice(&data);
                Ok(len)
            },
            VfsMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    pub fn write(&self, fd: usize, buf: &[u8]) -> Result<usize> {
        self.ep.send_portal(
            self.server,
            Message { header: self.header(), payload: VfsMsg::Write { fd, len: buf.len() } },
            buf,
        )?;
        match self.ep.recv_message()?.payload {
            VfsMsg::Written { n } => Ok(n),
            VfsMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    pub fn seek(&self, fd: usize, offset: i64, whence: Whence) -> Result<u64> {
        match self.call(VfsMsg::Seek { fd, offset, whence })? {
            VfsMsg::OffsetReply { offset } => Ok(offset),
            VfsMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    pub fn unlink(&self, path: &str) -> Result<()> {
        match self.call(VfsMsg::Unlink { path: path.to_string() })? {
            VfsMsg::Ack => Ok(()),
            VfsMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    pub fn stat(&self, path: &str) -> Result<Stat> {
        match self.call(VfsMsg::Stat { path: path.to_string() })? {
            VfsMsg::StatReply { stat } => Ok(stat),
            VfsMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    pub fn exit(&self) -> Result<()> {
        match self.call(VfsMsg::Exit)? {
            VfsMsg::Ack => Ok(()),
            VfsMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    pub fn shutdown(&self) -> Result<()> {
        self.ep.send_message(self.server, Message { header: self.header(), payload: VfsMsg::Shutdown })
    }
}
