// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! The request/reply round trip every client stub in this crate is built
//! on (spec §4.1: stamp `src_*`/`request_id` on send, match it on the
//! reply). One synchronous call per client method, matching the "client
//! library routines which block on mailbox/portal round-trips" model of
//! spec §5 — there is no concurrent multiplexing to do because each
//! client only ever has one request in flight.

use nvx_base::ids::Address;
use nvx_base::{Pid, Result};
use nvx_ipc::header::RequestIdGen;
use nvx_ipc::{Endpoint, Message, MessageHeader};

/// Sends `payload` to `dst` and blocks for the matching mailbox reply.
pub fn call<P>(
    ep: &Endpoint<P>,
    dst: Address,
    self_addr: Address,
    pid: Pid,
    reqs: &RequestIdGen,
    payload: P,
) -> Result<P> {
    let header = MessageHeader {
        opcode: 0,
        src_node: self_addr.node,
        src_port: self_addr.port,
        dst_node: dst.node,
        dst_port: dst.port,
        request_id: reqs.next(),
        source_pid: pid,
    };
    ep.send_message(dst, Message { header, payload })?;
    let reply = ep.recv_message()?;
    Ok(reply.payload)
}
