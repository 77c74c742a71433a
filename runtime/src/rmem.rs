// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Wire protocol for the RMem service (spec §4.6): `ALLOC`/`FREE` are
//! plain mailbox round-trips, while `READ`/`WRITE` move a whole page over
//! the portal handshake spec §4.1 describes — a mailbox header announcing
//! the transfer, then the bulk bytes.

use nvx_base::ids::Address;
use nvx_base::limits::PAGE_SIZE;
use nvx_base::{Code, Error, Pid, Result};
use nvx_ipc::header::RequestIdGen;
use nvx_ipc::{Endpoint, Message, MessageHeader};
use nvx_rcache::RmemBackend;
use nvx_rmem_server::RmemServer;

#[derive(Debug, Clone)]
pub enum RmemMsg {
    Alloc,
    Free { page: u32 },
    Read { page: u32 },
    Write { page: u32 },
    Shutdown,

    PageReply { page: u32 },
    Ack,
    /// Announces that a portal transfer of exactly [`PAGE_SIZE`] bytes
    /// follows, in reply to a [`RmemMsg::Read`].
    DataReady,
    Fail { code: Code },
}

fn page_addr(page: u32) -> usize {
    page as usize * PAGE_SIZE
}

/// Runs the RMem server's serve loop until a [`RmemMsg::Shutdown`]
/// arrives. `READ`/`WRITE` step outside the plain request/reply shape
/// every other opcode uses, so this loop handles the portal handshake
/// inline rather than going through a single `dispatch` function.
pub fn serve(ep: &Endpoint<RmemMsg>, self_addr: Address, server: &mut RmemServer) -> Result<()> {
    loop {
        let msg = ep.recv_message()?;
        let src = Address::new(msg.header.src_node, msg.header.src_port);
        let reply_header = msg.header.reply_to(0, self_addr.node, self_addr.port);

        match msg.payload {
            RmemMsg::Shutdown => return Ok(()),
            RmemMsg::Alloc => {
                let page = server.alloc();
                let payload = if page == nvx_rmem_server::RMEM_NULL {
                    RmemMsg::Fail { code: Code::NoSpace }
                } else {
                    RmemMsg::PageReply { page }
                };
                ep.send_message(src, Message { header: reply_header, payload })?;
            },
            RmemMsg::Free { page } => {
                let payload = match server.free(page) {
                    Ok(()) => RmemMsg::Ack,
                    Err(e) => RmemMsg::Fail { code: e.code() },
                };
                ep.send_message(src, Message { header: reply_header, payload })?;
            },
            RmemMsg::Read { page } => {
                let mut buf = vec![0u8; PAGE_SIZE];
                match server.read(page_addr(page), &mut buf) {
                    Ok(()) => {
                        ep.send_portal(
                            src,
                            Message { header: reply_header, payload: RmemMsg::DataReady },
                            &buf,
                        )?;
                    },
                    Err(e) => {
                        ep.send_message(
                            src,
                            Message { header: reply_header, payload: RmemMsg::Fail { code: e.code() } },
                        )?;
                    },
                }
            },
            RmemMsg::Write { page } => {
                let data = ep.recv_portal_exact(PAGE_SIZE)?;
                let payload = match server.write(page_addr(page), &data) {
                    Ok(()) => RmemMsg::Ack,
                    Err(e) => RmemMsg::Fail { code: e.code() },
                };
                ep.send_message(src, Message { header: reply_header, payload })?;
            },
            RmemMsg::PageReply { .. }
            | RmemMsg::Ack
            | RmemMsg::DataReady
            | RmemMsg::Fail { .. } => {
                ep.send_message(
                    src,
                    Message { header: reply_header, payload: RmemMsg::Fail { code: Code::Inval } },
                )?;
            },
        }
    }
}

/// Client stub for the RMem service, and the reference implementation of
/// [`RmemBackend`] a [`nvx_rcache::PageCache`] can be built over when it
/// needs a real remote link rather than the in-memory stub.
pub struct RmemClient {
    ep: Endpoint<RmemMsg>,
    server: Address,
    self_addr: Address,
    pid: Pid,
    reqs: RequestIdGen,
}

impl RmemClient {
    pub fn new(ep: Endpoint<RmemMsg>, self_addr: Address, server: Address, pid: Pid) -> Self {
        RmemClient { ep, server, self_addr, pid, reqs: RequestIdGen::new() }
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

    pub fn shutdown(&self) -> Result<()> {
        self.ep.send_message(self.server, Message { header: self.header(), payload: RmemMsg::Shutdown })
    }
}

impl RmemBackend for RmemClient {
    fn alloc(&mut self) -> Result<u32> {
        self.ep.send_message(self.server, Message { header: self.header(), payload: RmemMsg::Alloc })?;
        match self.ep.recv_message()?.payload {
            RmemMsg::PageReply { page } => Ok(page),
            RmemMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    fn free(&mut self, page: u32) -> Result<()> {
        self.ep.send_message(
            self.server,
            Message { header: self.header(), payload: RmemMsg::Free { page } },
        )?;
        match self.ep.recv_message()?.payload {
            RmemMsg::Ack => Ok(()),
            RmemMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    fn read(&mut self, page: u32, buf: &mut [u8]) -> Result<()> {
        self.ep.send_message(
            self.server,
            Message { header: self.header(), payload: RmemMsg::Read { page } },
        )?;
        match self.ep.recv_message()?.payload {
            RmemMsg::DataReady => {
                let data = self.ep.recv_portal_exact(PAGE_SIZE)?;
                buf.copy_from_slice(&data);
                Ok(())
            },
            RmemMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    fn write(&mut self, page: u32, buf: &[u8]) -> Result<()> {
        self.ep.send_portal(
            self.server,
            Message { header: self.header(), payload: RmemMsg::Write { page } },
            buf,
        )?;
        match self.ep.recv_message()?.payload {
            RmemMsg::Ack => Ok(()),
            RmemMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvx_base::ids::{NodeId, PortId};
    use nvx_ipc::Noc;
    use std::thread;

    #[test]
    fn alloc_write_read_round_trip_over_portal() {
        let noc: std::sync::Arc<Noc<RmemMsg>> = Noc::new();
        let server_addr = Address::new(NodeId(0), PortId(1));
        let server_ep = noc.open(server_addr).unwrap();

        let handle = thread::spawn(move || {
            let mut srv = RmemServer::new();
            serve(&server_ep, server_addr, &mut srv).unwrap();
        });

        let client_addr = Address::new(NodeId(0), PortId(2));
        let client_ep = noc.open(client_addr).unwrap();
        let mut client = RmemClient::new(client_ep, client_addr, server_addr, Pid(1));

        let page = client.alloc().unwrap();
        let payload = vec![0x5Au8; PAGE_SIZE];
        client.write(page, &payload).unwrap();
        let mut out = vec![0u8; PAGE_SIZE];
        client.read(page, &mut out).unwrap();
        assert_eq!(out, payload);

        client.free(page).unwrap();
        assert_eq!(client.read(page, &mut out).unwrap_err().code(), Code::Inval);

        client.shutdown().unwrap();
        handle.join().unwrap();
    }
}
