// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Runtime Bootstrap (spec §4.10, component K): wires the transport
//! adapter, message framing, and every server in this workspace into one
//! running system, ordered ring by ring through [`nvx_barrier`].
//!
//! Each submodule here owns one server's wire protocol (request/reply
//! payload enum, server-side dispatch, and a client stub), grounded on
//! the opcode sets named in spec §4.4 (Name), §4.5 (SysV), §4.6 (RMem),
//! and §4.9 (VFS). [`system`] is the piece spec §4.10 itself names: the
//! per-ring setup/teardown sequencer plus the reference RMem-backed page
//! cache link.

pub mod client;
pub mod name;
pub mod rmem;
pub mod sysv;
pub mod system;
pub mod vfs;

pub use system::System;
