// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! The fixed header every server message begins with (spec §3 "Message
//! header", §4.1).

use std::sync::atomic::{AtomicU32, Ordering};

use nvx_base::ids::{NodeId, PortId};
use nvx_base::{Code, Error, Pid, Result};

/// Byte size of the header's wire encoding. Part of the "bit-exact"
/// contract in spec §6: the mailbox record is 64 bytes, of which this is
/// the fixed prefix every server understands without looking at the
/// opcode-specific payload.
pub const HEADER_WIRE_SIZE: usize = 20;

/// `{ opcode, src_node, src_port, dst_node, dst_port, request_id,
/// source_pid }` from spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub opcode: u16,
    pub src_node: NodeId,
    pub src_port: PortId,
    pub dst_node: NodeId,
    pub dst_port: PortId,
    pub request_id: u32,
    pub source_pid: Pid,
}

impl MessageHeader {
    /// Encodes the header into its fixed 20-byte wire form.
    pub fn to_bytes(&self) -> [u8; HEADER_WIRE_SIZE] {
        let mut buf = [0u8; HEADER_WIRE_SIZE];
        buf[0..2].copy_from_slice(&self.opcode.to_le_bytes());
        buf[2..4].copy_from_slice(&self.src_node.0.to_le_bytes());
        buf[4..6].copy_from_slice(&self.src_port.0.to_le_bytes());
        buf[6..8].copy_from_slice(&self.dst_node.0.to_le_bytes());
        buf[8..10].copy_from_slice(&self.dst_port.0.to_le_bytes());
        buf[10..14].copy_from_slice(&self.request_id.to_le_bytes());
        buf[14..18].copy_from_slice(&self.source_pid.0.to_le_bytes());
        // bytes 18..20 reserved, kept zeroed
        buf
    }

    /// Decodes a header from its fixed 20-byte wire form.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != HEADER_WIRE_SIZE {
            return Err(Error::with_msg(
                Code::Inval,
                format!("header must be {HEADER_WIRE_SIZE} bytes, got {}", buf.len()),
            ));
        }
        let u16_at = |off: usize| u16::from_le_bytes([buf[off], buf[off + 1]]);
        let u32_at = |off: usize| {
            u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
        };
        Ok(MessageHeader {
            opcode: u16_at(0),
            src_node: NodeId(u16_at(2)),
            src_port: PortId(u16_at(4)),
            dst_node: NodeId(u16_at(6)),
            dst_port: PortId(u16_at(8)),
            request_id: u32_at(10),
            source_pid: Pid(u32_at(14) as i32),
        })
    }

    /// Builds the header of a reply to `self`, stamped with the same
    /// `request_id` (spec §5: "A reply's `request_id` equals the
    /// request's").
    pub fn reply_to(&self, opcode: u16, server_node: NodeId, server_port: PortId) -> Self {
        MessageHeader {
            opcode,
            src_node: server_node,
            src_port: server_port,
            dst_node: self.src_node,
            dst_port: self.src_port,
            request_id: self.request_id,
            source_pid: self.source_pid,
        }
    }
}

/// Monotonically increasing request-id source, one per client connection
/// (spec §4.1: "`request_id` from a monotonically increasing counter").
#[derive(Debug, Default)]
pub struct RequestIdGen(AtomicU32);

impl RequestIdGen {
    pub const fn new() -> Self {
        RequestIdGen(AtomicU32::new(1))
    }

    pub fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}
