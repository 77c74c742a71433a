// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! The reference transport backend: an in-process NoC built on channels.
//!
//! This stands in for real mailbox/portal hardware (out of scope per spec
//! §1). Each server or client opens an inbox bound to its `(node, port)`;
//! everyone else reaches it by looking that address up in the shared
//! [`Noc`] registry, exactly as spec §4.10 step 1 describes ("claim the
//! inbox bound to the server's known port").

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use nvx_base::ids::Address;
use nvx_base::{Code, Error, Result};

use crate::header::MessageHeader;

/// A framed mailbox message: the fixed header plus a typed, opcode-shaped
/// payload specific to one server's protocol.
#[derive(Debug, Clone)]
pub struct Message<P> {
    pub header: MessageHeader,
    pub payload: P,
}

/// One transport frame: either a control-plane mailbox message, or a
/// data-plane portal transfer (spec §4.1: "Data-plane transfers ... follow
/// the mailbox control handshake").
#[derive(Debug, Clone)]
pub enum Frame<P> {
    Mailbox(Message<P>),
    Portal(Vec<u8>),
}

/// Shared registry of inboxes, keyed by `(node, port)`.
///
/// Multiple servers and clients share one `Noc` per protocol domain (one
/// instantiation of `Noc<P>` per server's payload type `P`).
pub struct Noc<P> {
    inboxes: Mutex<HashMap<Address, Sender<Frame<P>>>>,
}

impl<P> Default for Noc<P> {
    fn default() -> Self {
        Noc {
            inboxes: Mutex::new(HashMap::new()),
        }
    }
}

impl<P> Noc<P> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Opens an inbox bound to `addr`. Fails if the address is already
    /// claimed by another endpoint (spawners bind exactly one inbox per
    /// well-known server port).
    pub fn open(self: &Arc<Self>, addr: Address) -> Result<Endpoint<P>> {
        let (tx, rx) = mpsc::channel();
        let mut inboxes = self.inboxes.lock().unwrap();
        if inboxes.contains_key(&addr) {
            return Err(Error::with_msg(
                Code::Exists,
                format!("inbox already open at {addr}"),
            ));
        }
        inboxes.insert(addr, tx);
        Ok(Endpoint {
            noc: Arc::clone(self),
            addr,
            rx,
        })
    }

    /// Closes the inbox at `addr`, if any.
    pub fn close(&self, addr: Address) {
        self.inboxes.lock().unwrap().remove(&addr);
    }

    fn route(&self, dst: Address, frame: Frame<P>) -> Result<()> {
        let inboxes = self.inboxes.lock().unwrap();
        let tx = inboxes
            .get(&dst)
            .ok_or_else(|| Error::with_msg(Code::NoEnt, format!("no inbox at {dst}")))?;
        tx.send(frame)
            .map_err(|_| Error::with_msg(Code::NoEnt, format!("inbox at {dst} closed")))
    }
}

/// One endpoint into the NoC: an open inbox plus the ability to send to
/// any other known address.
pub struct Endpoint<P> {
    noc: Arc<Noc<P>>,
    addr: Address,
    rx: Receiver<Frame<P>>,
}

impl<P> Endpoint<P> {
    pub fn addr(&self) -> Address {
        self.addr
    }

    /// Sends a framed mailbox message to `dst`.
    pub fn send_message(&self, dst: Address, msg: Message<P>) -> Result<()> {
        self.noc.route(dst, Frame::Mailbox(msg))
    }

    /// Blocks until the next mailbox message arrives on this inbox.
    ///
    /// Per spec §5, this is one of the server's only suspension points.
    /// If a portal frame arrives out of turn (a caller violated the
    /// handshake in spec §4.1 by writing bulk data before its header was
    /// consumed), that is a protocol error.
    pub fn recv_message(&self) -> Result<Message<P>> {
        match self.rx.recv() {
            Ok(Frame::Mailbox(msg)) => Ok(msg),
            Ok(Frame::Portal(_)) => Err(Error::with_msg(
                Code::Inval,
                "received portal data without a preceding mailbox header",
            )),
            Err(_) => Err(Error::with_msg(Code::NoEnt, "inbox closed")),
        }
    }

    /// Non-blocking variant of [`recv_message`](Self::recv_message).
    pub fn try_recv_message(&self) -> Option<Result<Message<P>>> {
        match self.rx.try_recv() {
            Ok(Frame::Mailbox(msg)) => Some(Ok(msg)),
            Ok(Frame::Portal(_)) => Some(Err(Error::with_msg(
                Code::Inval,
                "received portal data without a preceding mailbox header",
            ))),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => {
                Some(Err(Error::with_msg(Code::NoEnt, "inbox closed")))
            },
        }
    }

    /// Writes `data` to `dst` over the portal, preceded by the mailbox
    /// header the handshake requires (spec §4.1).
    pub fn send_portal(&self, dst: Address, header_msg: Message<P>, data: &[u8]) -> Result<()> {
        self.send_message(dst, header_msg)?;
        self.noc.route(dst, Frame::Portal(data.to_vec()))
    }

    /// Reads exactly `expected_size` bytes from the portal. Per spec
    /// §4.1, a size mismatch is an error, not a short read.
    pub fn recv_portal_exact(&self, expected_size: usize) -> Result<Vec<u8>> {
        match self.rx.recv() {
            Ok(Frame::Portal(data)) if data.len() == expected_size => Ok(data),
            Ok(Frame::Portal(data)) => Err(Error::with_msg(
                Code::Inval,
                format!(
                    "portal size mismatch: expected {expected_size}, got {}",
                    data.len()
                ),
            )),
            Ok(Frame::Mailbox(_)) => Err(Error::with_msg(
                Code::Inval,
                "expected portal data, got a mailbox message",
            )),
            Err(_) => Err(Error::with_msg(Code::NoEnt, "inbox closed")),
        }
    }
}

impl<P> Drop for Endpoint<P> {
    fn drop(&mut self) {
        self.noc.close(self.addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvx_base::ids::{NodeId, PortId};
    use nvx_base::Pid;

    fn hdr(req: u32) -> MessageHeader {
        MessageHeader {
            opcode: 1,
            src_node: NodeId(0),
            src_port: PortId(1),
            dst_node: NodeId(0),
            dst_port: PortId(2),
            request_id: req,
            source_pid: Pid(1),
        }
    }

    #[test]
    fn send_and_recv_round_trips() {
        let noc: Arc<Noc<u32>> = Noc::new();
        let server = noc.open(Address::new(NodeId(0), PortId(2))).unwrap();
        let client = noc.open(Address::new(NodeId(0), PortId(1))).unwrap();

        client
            .send_message(
                server.addr(),
                Message {
                    header: hdr(1),
                    payload: 123,
                },
            )
            .unwrap();

        let msg = server.recv_message().unwrap();
        assert_eq!(msg.payload, 123);
        assert_eq!(msg.header.request_id, 1);
    }

    #[test]
    fn send_to_unknown_address_fails() {
        let noc: Arc<Noc<u32>> = Noc::new();
        let client = noc.open(Address::new(NodeId(0), PortId(1))).unwrap();
        let err = client
            .send_message(
                Address::new(NodeId(9), PortId(9)),
                Message {
                    header: hdr(1),
                    payload: 0,
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), Code::NoEnt);
    }

    #[test]
    fn double_open_of_same_address_fails() {
        let noc: Arc<Noc<u32>> = Noc::new();
        let addr = Address::new(NodeId(0), PortId(2));
        let _first = noc.open(addr).unwrap();
        let err = noc.open(addr).unwrap_err();
        assert_eq!(err.code(), Code::Exists);
    }

    #[test]
    fn portal_transfer_requires_matching_size() {
        let noc: Arc<Noc<u32>> = Noc::new();
        let server = noc.open(Address::new(NodeId(0), PortId(2))).unwrap();
        let client = noc.open(Address::new(NodeId(0), PortId(1))).unwrap();

        client
            .send_portal(
                server.addr(),
                Message {
                    header: hdr(5),
                    payload: 7,
                },
                &[1, 2, 3, 4],
            )
            .unwrap();

        // the mailbox header announcing the transfer arrives first
        let announce = server.recv_message().unwrap();
        assert_eq!(announce.payload, 7);

        let data = server.recv_portal_exact(4).unwrap();
        assert_eq!(data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn portal_size_mismatch_is_rejected() {
        let noc: Arc<Noc<u32>> = Noc::new();
        let server = noc.open(Address::new(NodeId(0), PortId(2))).unwrap();
        let client = noc.open(Address::new(NodeId(0), PortId(1))).unwrap();

        client
            .send_portal(
                server.addr(),
                Message {
                    header: hdr(5),
                    payload: 0,
                },
                &[1, 2, 3, 4],
            )
            .unwrap();
        let _ = server.recv_message().unwrap();

        let err = server.recv_portal_exact(5).unwrap_err();
        assert_eq!(err.code(), Code::Inval);
    }
}
