// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Wire protocol for the Name service (spec §4.4): one message type
//! carrying both request and reply shapes, matching the small, fixed set
//! of opcodes (`LOOKUP`, `LINK`, `UNLINK`, `HEARTBEAT`, `GETPID`,
//! `SETPID`, `GETPGID`, `SETPGID`, `EXIT`) named there.

use nvx_base::ids::{Address, NodeId, PortId};
use nvx_base::{Code, Error, Pgid, Pid, Result};
use nvx_ipc::header::RequestIdGen;
use nvx_ipc::{Endpoint, Message, MessageHeader};
use nvx_name_server::NameServer;

use crate::client::call;

#[derive(Debug, Clone)]
pub enum NameMsg {
    Link { name: String, node: NodeId, port: PortId },
    Lookup { name: String },
    Unlink { name: String },
    Exit { name: String },
    Heartbeat { name: String, now: u64 },
    GetPid { name: String },
    SetPid { name: String, pid: Pid },
    GetPgid { name: String },
    SetPgid { name: String, pgid: i32 },
    Shutdown,

    Ack,
    NodePort { node: NodeId, port: PortId },
    PidReply { pid: Pid },
    PgidReply { pgid: Pgid },
    TimestampReply { value: u64 },
    Fail { code: Code },
}

fn dispatch(server: &mut NameServer, caller_node: NodeId, req: &NameMsg) -> NameMsg {
    let outcome = match req {
        NameMsg::Link { name, node, port } => server.link(name, *node, *port).map(|_| NameMsg::Ack),
        NameMsg::Lookup { name } => server
            .lookup(name)
            .map(|(node, port)| NameMsg::NodePort { node, port }),
        NameMsg::Unlink { name } => server.unlink(name, caller_node).map(|_| NameMsg::Ack),
        NameMsg::Exit { name } => server.exit(name).map(|_| NameMsg::Ack),
        NameMsg::Heartbeat { name, now } => server.heartbeat(name, *now).map(|_| NameMsg::Ack),
        NameMsg::GetPid { name } => server.get_pid(name).map(|pid| NameMsg::PidReply { pid }),
        NameMsg::SetPid { name, pid } => server.set_pid(name, *pid).map(|_| NameMsg::Ack),
        NameMsg::GetPgid { name } => server.get_pgid(name).map(|pgid| NameMsg::PgidReply { pgid }),
        NameMsg::SetPgid { name, pgid } => server.set_pgid(name, *pgid).map(|_| NameMsg::Ack),
        NameMsg::Shutdown => unreachable!("Shutdown is handled by the serve loop"),
        _ => return NameMsg::Fail { code: Code::Inval },
    };
    outcome.unwrap_or_else(|e| NameMsg::Fail { code: e.code() })
}

/// Runs the Name server's serve loop until a [`NameMsg::Shutdown`]
/// arrives (spec §4.10, step 4: "receive header; dispatch by opcode;
/// reply with header + payload").
pub fn serve(ep: &Endpoint<NameMsg>, self_addr: Address, server: &mut NameServer) -> Result<()> {
    loop {
        let msg = ep.recv_message()?;
        if matches!(msg.payload, NameMsg::Shutdown) {
            return Ok(());
        }
        let reply_payload = dispatch(server, msg.header.src_node, &msg.payload);
        let reply_header = msg.header.reply_to(0, self_addr.node, self_addr.port);
        let dst = Address::new(msg.header.src_node, msg.header.src_port);
        ep.send_message(
            dst,
            Message {
                header: reply_header,
                payload: reply_payload,
            },
        )?;
    }
}

/// Client stub for the Name service.
pub struct NameClient {
    ep: Endpoint<NameMsg>,
    server: Address,
    self_addr: Address,
    pid: Pid,
    reqs: RequestIdGen,
}

impl NameClient {
    pub fn new(ep: Endpoint<NameMsg>, self_addr: Address, server: Address, pid: Pid) -> Self {
        NameClient {
            ep,
            server,
            self_addr,
            pid,
            reqs: RequestIdGen::new(),
        }
    }

    fn call(&self, req: NameMsg) -> Result<NameMsg> {
        call(&self.ep, self.server, self.self_addr, self.pid, &self.reqs, req)
    }

    pub fn link(&self, name: &str, node: NodeId, port: PortId) -> Result<()> {
        match self.call(NameMsg::Link { name: name.to_string(), node, port })? {
            NameMsg::Ack => Ok(()),
            NameMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    pub fn lookup(&self, name: &str) -> Result<(NodeId, PortId)> {
        match self.call(NameMsg::Lookup { name: name.to_string() })? {
            NameMsg::NodePort { node, port } => Ok((node, port)),
            NameMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    pub fn unlink(&self, name: &str) -> Result<()> {
        match self.call(NameMsg::Unlink { name: name.to_string() })? {
            NameMsg::Ack => Ok(()),
            NameMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    pub fn heartbeat(&self, name: &str, now: u64) -> Result<()> {
        match self.call(NameMsg::Heartbeat { name: name.to_string(), now })? {
            NameMsg::Ack => Ok(()),
            NameMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    /// Fire-and-forget: tells the server to leave its serve loop. No
    /// reply is expected.
    pub fn shutdown(&self) -> Result<()> {
        let header = MessageHeader {
            opcode: 0,
            src_node: self.self_addr.node,
            src_port: self.self_addr.port,
            dst_node: self.server.node,
            dst_port: self.server.port,
            request_id: self.reqs.next(),
            source_pid: self.pid,
        };
        self.ep.send_message(self.server, Message { header, payload: NameMsg::Shutdown })
    }
}
