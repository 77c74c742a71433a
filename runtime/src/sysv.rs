// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Wire protocol for the SysV service (spec §4.5): message queues and
//! semaphores share one server process and one opcode space, the way
//! `original_source/include/nanvix/servers/sysv.h` lists both families
//! side by side.
//!
//! `msg_send`/`msg_receive`/`sem_op` can block (spec §4.5/§5/§9). The
//! server is single-threaded and cooperative: a request that would block
//! is simply not replied to in this iteration of the loop. Its
//! [`MessageHeader`] is the token the domain stores (`nvx_sysv_server`)
//! park on their wait lists; when a later, paired request frees it, the
//! store hands back that same header plus the parked request's result as
//! a [`Completion`](nvx_sysv_server::Completion), and this module sends
//! the delayed reply to it the same way it would have sent an immediate
//! one (`MessageHeader::reply_to`, spec §5: "a reply's `request_id`
//! equals the request's").

use nvx_base::ids::Address;
use nvx_base::{Code, Error, Pid, Result};
use nvx_ipc::header::RequestIdGen;
use nvx_ipc::{Endpoint, Message, MessageHeader};
use nvx_sysv_server::{Completion, IpcFlags, MsgQueueStore, Outcome, SemOp, SemaphoreStore};

use crate::client::call;

/// Combined per-process SysV state: the message-queue store and the
/// semaphore store (spec §4.5 names them as siblings of one service).
/// Parked requests are keyed on the requester's own [`MessageHeader`], so
/// a delayed reply can be built from it exactly like an immediate one.
pub struct SysvState {
    pub msgs: MsgQueueStore<MessageHeader>,
    pub sems: SemaphoreStore<MessageHeader>,
}

impl Default for SysvState {
    fn default() -> Self {
        SysvState {
            msgs: MsgQueueStore::new(),
            sems: SemaphoreStore::new(),
        }
    }
}

impl SysvState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub enum SysvMsg {
    MsgGet { key: i32, flags: IpcFlags },
    MsgSend { id: usize, mtype: i64, data: Vec<u8>, flags: IpcFlags },
    MsgReceive { id: usize, mtype: i64, flags: IpcFlags },
    MsgClose { id: usize },
    SemGet { key: i32, nsems: usize, flags: IpcFlags },
    SemOp { id: usize, ops: Vec<SemOp> },
    SemClose { id: usize },
    Shutdown,

    IdReply { id: usize },
    Ack,
    Message { mtype: i64, data: Vec<u8> },
    Fail { code: Code },
}

fn reply_dst(header: &MessageHeader) -> Address {
    Address::new(header.src_node, header.src_port)
}

fn send_reply(
    ep: &Endpoint<SysvMsg>,
    self_addr: Address,
    header: &MessageHeader,
    payload: SysvMsg,
) -> Result<()> {
    let reply_header = header.reply_to(0, self_addr.node, self_addr.port);
    ep.send_message(reply_dst(header), Message { header: reply_header, payload })
}

fn flush_msg_completions(
    ep: &Endpoint<SysvMsg>,
    self_addr: Address,
    completions: Vec<Completion<MessageHeader, (i64, Vec<u8>)>>,
) -> Result<()> {
    for c in completions {
        send_reply(ep, self_addr, &c.token, SysvMsg::Message { mtype: c.result.0, data: c.result.1 })?;
    }
    Ok(())
}

fn flush_ack_completions(
    ep: &Endpoint<SysvMsg>,
    self_addr: Address,
    completions: Vec<Completion<MessageHeader, ()>>,
) -> Result<()> {
    for c in completions {
        send_reply(ep, self_addr, &c.token, SysvMsg::Ack)?;
    }
    Ok(())
}

/// Handles one request, sending its reply immediately unless it parks
/// (spec §4.5/§9), and flushes any delayed replies the request's own
/// effect on the queue/semaphore set just unblocked.
fn handle(
    ep: &Endpoint<SysvMsg>,
    self_addr: Address,
    state: &mut SysvState,
    header: &MessageHeader,
    req: &SysvMsg,
) -> Result<()> {
    match req {
        SysvMsg::MsgGet { key, flags } => {
            let reply = match state.msgs.msg_get(*key, *flags) {
                Ok(id) => SysvMsg::IdReply { id },
                Err(e) => SysvMsg::Fail { code: e.code() },
            };
            send_reply(ep, self_addr, header, reply)
        },
        SysvMsg::MsgSend { id, mtype, data, flags } => {
            let message = nvx_sysv_server::Message { mtype: *mtype, data: data.clone() };
            match state.msgs.msg_send(*id, message, *flags, *header) {
                Ok((Outcome::Ready(()), completions)) => {
                    send_reply(ep, self_addr, header, SysvMsg::Ack)?;
                    flush_msg_completions(ep, self_addr, completions)
                },
                Ok((Outcome::Parked, _)) => Ok(()),
                Err(e) => send_reply(ep, self_addr, header, SysvMsg::Fail { code: e.code() }),
            }
        },
        SysvMsg::MsgReceive { id, mtype, flags } => {
            match state.msgs.msg_receive(*id, *mtype, *flags, *header) {
                Ok((Outcome::Ready((mtype, data)), completions)) => {
                    send_reply(ep, self_addr, header, SysvMsg::Message { mtype, data })?;
                    flush_ack_completions(ep, self_addr, completions)
                },
                Ok((Outcome::Parked, _)) => Ok(()),
                Err(e) => send_reply(ep, self_addr, header, SysvMsg::Fail { code: e.code() }),
            }
        },
        SysvMsg::MsgClose { id } => {
            let reply = match state.msgs.msg_close(*id) {
                Ok(()) => SysvMsg::Ack,
                Err(e) => SysvMsg::Fail { code: e.code() },
            };
            send_reply(ep, self_addr, header, reply)
        },
        SysvMsg::SemGet { key, nsems, flags } => {
            let reply = match state.sems.sem_get(*key, *nsems, *flags) {
                Ok(id) => SysvMsg::IdReply { id },
                Err(e) => SysvMsg::Fail { code: e.code() },
            };
            send_reply(ep, self_addr, header, reply)
        },
        SysvMsg::SemOp { id, ops } => match state.sems.sem_op(*id, ops.clone(), *header) {
            Ok((Outcome::Ready(()), completions)) => {
                send_reply(ep, self_addr, header, SysvMsg::Ack)?;
                flush_ack_completions(ep, self_addr, completions)
            },
            Ok((Outcome::Parked, _)) => Ok(()),
            Err(e) => send_reply(ep, self_addr, header, SysvMsg::Fail { code: e.code() }),
        },
        SysvMsg::SemClose { id } => {
            let reply = match state.sems.sem_close(*id) {
                Ok(()) => SysvMsg::Ack,
                Err(e) => SysvMsg::Fail { code: e.code() },
            };
            send_reply(ep, self_addr, header, reply)
        },
        SysvMsg::Shutdown => unreachable!("Shutdown is handled by the serve loop"),
        _ => send_reply(ep, self_addr, header, SysvMsg::Fail { code: Code::Inval }),
    }
}

/// Runs the SysV server's serve loop until a [`SysvMsg::Shutdown`]
/// arrives.
pub fn serve(ep: &Endpoint<SysvMsg>, self_addr: Address, state: &mut SysvState) -> Result<()> {
    loop {
        let msg = ep.recv_message()?;
        if matches!(msg.payload, SysvMsg::Shutdown) {
            return Ok(());
        }
        handle(ep, self_addr, state, &msg.header, &msg.payload)?;
    }
}

/// Client stub for the SysV service.
pub struct SysvClient {
    ep: Endpoint<SysvMsg>,
    server: Address,
    self_addr: Address,
    pid: Pid,
    reqs: RequestIdGen,
}

impl SysvClient {
    pub fn new(ep: Endpoint<SysvMsg>, self_addr: Address, server: Address, pid: Pid) -> Self {
        SysvClient { ep, server, self_addr, pid, reqs: RequestIdGen::new() }
    }

    fn call(&self, req: SysvMsg) -> Result<SysvMsg> {
        call(&self.ep, self.server, self.self_addr, self.pid, &self.reqs, req)
    }

    pub fn msg_get(&self, key: i32, flags: IpcFlags) -> Result<usize> {
        match self.call(SysvMsg::MsgGet { key, flags })? {
            SysvMsg::IdReply { id } => Ok(id),
            SysvMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    /// Blocks until the send completes, which may be after a later
    /// `msg_receive` on another client frees a ring slot (spec §4.5).
    pub fn msg_send(&self, id: usize, mtype: i64, data: Vec<u8>, flags: IpcFlags) -> Result<()> {
        match self.call(SysvMsg::MsgSend { id, mtype, data, flags })? {
            SysvMsg::Ack => Ok(()),
            SysvMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    /// Blocks until a matching message is available, which may be after
    /// a later `msg_send` on another client (spec §4.5).
    pub fn msg_receive(&self, id: usize, mtype: i64, flags: IpcFlags) -> Result<(i64, Vec<u8>)> {
        match self.call(SysvMsg::MsgReceive { id, mtype, flags })? {
            SysvMsg::Message { mtype, data } => Ok((mtype, data)),
            SysvMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    pub fn sem_get(&self, key: i32, nsems: usize, flags: IpcFlags) -> Result<usize> {
        match self.call(SysvMsg::SemGet { key, nsems, flags })? {
            SysvMsg::IdReply { id } => Ok(id),
            SysvMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

    /// Blocks until the whole batch applies atomically, which may be
    /// after a later `sem_op` on another client increments a semaphore
    /// this batch was waiting on (spec §4.5).
    pub fn sem_op(&self, id: usize, ops: Vec<SemOp>) -> Result<()> {
        match self.call(SysvMsg::SemOp { id, ops })? {
            SysvMsg::Ack => Ok(()),
            SysvMsg::Fail { code } => Err(Error::new(code)),
            _ => Err(Error::new(Code::Inval)),
        }
    }

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
        self.ep.send_message(self.server, Message { header, payload: SysvMsg::Shutdown })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvx_base::ids::{NodeId, PortId};
    use nvx_ipc::Noc;
    use std::thread;

    #[test]
    fn queue_fifo_round_trip_over_loopback() {
        let noc: std::sync::Arc<Noc<SysvMsg>> = Noc::new();
        let server_addr = Address::new(NodeId(0), PortId(1));
        let server_ep = noc.open(server_addr).unwrap();

        let handle = thread::spawn(move || {
            let mut state = SysvState::new();
            serve(&server_ep, server_addr, &mut state).unwrap();
        });

        let client_addr = Address::new(NodeId(0), PortId(2));
        let client_ep = noc.open(client_addr).unwrap();
        let client = SysvClient::new(client_ep, client_addr, server_addr, Pid(1));

        let id = client.msg_get(100, IpcFlags::CREAT).unwrap();
        client.msg_send(id, 1, vec![1u8; 512], IpcFlags::empty()).unwrap();
        client.msg_send(id, 1, vec![2u8; 512], IpcFlags::empty()).unwrap();
        let (_, first) = client.msg_receive(id, 0, IpcFlags::empty()).unwrap();
        let (_, second) = client.msg_receive(id, 0, IpcFlags::empty()).unwrap();
        assert_eq!(first, vec![1u8; 512]);
        assert_eq!(second, vec![2u8; 512]);

        client.shutdown().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn semaphore_mutual_exclusion_over_loopback() {
        let noc: std::sync::Arc<Noc<SysvMsg>> = Noc::new();
        let server_addr = Address::new(NodeId(0), PortId(3));
        let server_ep = noc.open(server_addr).unwrap();

        let handle = thread::spawn(move || {
            let mut state = SysvState::new();
            serve(&server_ep, server_addr, &mut state).unwrap();
        });

        let client_addr = Address::new(NodeId(0), PortId(4));
        let client_ep = noc.open(client_addr).unwrap();
        let client = SysvClient::new(client_ep, client_addr, server_addr, Pid(1));

        let id = client.sem_get(100, 1, IpcFlags::CREAT | IpcFlags::EXCL).unwrap();
        client
            .sem_op(id, vec![SemOp { sem_num: 0, sem_op: 1, sem_flg: IpcFlags::empty() }])
            .unwrap();
        client
            .sem_op(id, vec![SemOp { sem_num: 0, sem_op: -1, sem_flg: IpcFlags::empty() }])
            .unwrap();
        client
            .sem_op(id, vec![SemOp { sem_num: 0, sem_op: 0, sem_flg: IpcFlags::empty() }])
            .unwrap();
        let err = client
            .sem_op(id, vec![SemOp { sem_num: 0, sem_op: -1, sem_flg: IpcFlags::NOWAIT }])
            .unwrap_err();
        assert_eq!(err.code(), Code::Again);

        client.shutdown().unwrap();
        handle.join().unwrap();
    }

    /// A `msg_receive` that arrives before any message is sent blocks
    /// (no reply yet); a subsequent `msg_send` from another client must
    /// deliver the message straight to it and unblock its `call`.
    #[test]
    fn receiver_blocked_on_empty_queue_is_woken_by_a_later_send() {
        let noc: std::sync::Arc<Noc<SysvMsg>> = Noc::new();
        let server_addr = Address::new(NodeId(0), PortId(5));
        let server_ep = noc.open(server_addr).unwrap();

        let handle = thread::spawn(move || {
            let mut state = SysvState::new();
            serve(&server_ep, server_addr, &mut state).unwrap();
        });

        let receiver_addr = Address::new(NodeId(0), PortId(6));
        let receiver_ep = noc.open(receiver_addr).unwrap();
        let receiver = SysvClient::new(receiver_ep, receiver_addr, server_addr, Pid(1));

        let sender_addr = Address::new(NodeId(0), PortId(7));
        let sender_ep = noc.open(sender_addr).unwrap();
        let sender = SysvClient::new(sender_ep, sender_addr, server_addr, Pid(2));

        let id = receiver.msg_get(200, IpcFlags::CREAT).unwrap();

        let recv_handle = thread::spawn(move || receiver.msg_receive(id, 0, IpcFlags::empty()));

        // give the receive a chance to actually reach the server and park.
        thread::sleep(std::time::Duration::from_millis(50));
        sender.msg_send(id, 3, b"woke up".to_vec(), IpcFlags::empty()).unwrap();

        let (mtype, data) = recv_handle.join().unwrap().unwrap();
        assert_eq!(mtype, 3);
        assert_eq!(data, b"woke up".to_vec());

        sender.shutdown().unwrap();
        handle.join().unwrap();
    }

    /// A `sem_op` batch that would block parks without replying; a later
    /// `sem_op` on another client that increments the semaphore must
    /// wake it with the delayed `Ack`.
    #[test]
    fn blocked_sem_op_is_woken_by_a_later_increment() {
        let noc: std::sync::Arc<Noc<SysvMsg>> = Noc::new();
        let server_addr = Address::new(NodeId(0), PortId(8));
        let server_ep = noc.open(server_addr).unwrap();

        let handle = thread::spawn(move || {
            let mut state = SysvState::new();
            serve(&server_ep, server_addr, &mut state).unwrap();
        });

        let waiter_addr = Address::new(NodeId(0), PortId(9));
        let waiter_ep = noc.open(waiter_addr).unwrap();
        let waiter = SysvClient::new(waiter_ep, waiter_addr, server_addr, Pid(1));

        let signaler_addr = Address::new(NodeId(0), PortId(10));
        let signaler_ep = noc.open(signaler_addr).unwrap();
        let signaler = SysvClient::new(signaler_ep, signaler_addr, server_addr, Pid(2));

        let id = waiter.sem_get(300, 1, IpcFlags::CREAT).unwrap();

        let wait_handle = thread::spawn(move || {
            waiter.sem_op(id, vec![SemOp { sem_num: 0, sem_op: -1, sem_flg: IpcFlags::empty() }])
        });

        thread::sleep(std::time::Duration::from_millis(50));
        signaler
            .sem_op(id, vec![SemOp { sem_num: 0, sem_op: 1, sem_flg: IpcFlags::empty() }])
            .unwrap();

        wait_handle.join().unwrap().unwrap();

        signaler.shutdown().unwrap();
        handle.join().unwrap();
    }
}
