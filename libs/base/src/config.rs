// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Server-placement configuration (spec §6: "Two configurations are
//! specified — a 2-I/O-cluster NoC target and a 4-spawner development
//! target — with server placement tables").
//!
//! Tables are data, not re-compiled constants, so a deployment can add a
//! cluster without touching Rust source; `serde` already sits in the
//! wire-format dependency graph, so pairing it with `toml` here keeps the
//! format readable without introducing an unrelated parser.

use serde::Deserialize;
use std::path::Path;

use crate::errors::{Code, Error, Result};
use crate::ids::{NodeId, PortId};

/// The 2-I/O-cluster NoC target, embedded at build time.
pub const MPPA256_TOML: &str = include_str!("../../../config/mppa256.toml");

/// The 4-spawner development target, embedded at build time.
pub const UNIX64_TOML: &str = include_str!("../../../config/unix64.toml");

#[derive(Debug, Deserialize)]
struct RawServerEntry {
    name: String,
    node: u16,
    port: u16,
    ring: u8,
}

#[derive(Debug, Deserialize)]
struct RawTopology {
    leader: u16,
    followers: Vec<u16>,
    server: Vec<RawServerEntry>,
}

/// One entry in the server-placement table: a well-known `{name, node,
/// port}` triple plus the spawn ring it belongs to (spec §4.3/§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEntry {
    pub name: String,
    pub node: NodeId,
    pub port: PortId,
    pub ring: u8,
}

/// A fully parsed spawn topology: who the barrier leader is, which nodes
/// participate as followers, and where every well-known server lives.
#[derive(Debug, Clone)]
pub struct Topology {
    pub leader: NodeId,
    pub followers: Vec<NodeId>,
    pub servers: Vec<ServerEntry>,
}

impl Topology {
    fn from_raw(raw: RawTopology) -> Self {
        Topology {
            leader: NodeId(raw.leader),
            followers: raw.followers.into_iter().map(NodeId).collect(),
            servers: raw
                .server
                .into_iter()
                .map(|s| ServerEntry {
                    name: s.name,
                    node: NodeId(s.node),
                    port: PortId(s.port),
                    ring: s.ring,
                })
                .collect(),
        }
    }

    /// Parses a topology from TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawTopology = toml::from_str(text)
            .map_err(|e| Error::with_msg(Code::Inval, format!("invalid topology: {e}")))?;
        Ok(Self::from_raw(raw))
    }

    /// Loads a topology from a file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::with_msg(Code::NoEnt, e.to_string()))?;
        Self::parse(&text)
    }

    /// The built-in 2-I/O-cluster NoC target.
    pub fn mppa256() -> Self {
        Self::parse(MPPA256_TOML).expect("embedded mppa256.toml must parse")
    }

    /// The built-in 4-spawner development target.
    pub fn unix64() -> Self {
        Self::parse(UNIX64_TOML).expect("embedded unix64.toml must parse")
    }

    /// Looks up a server's address by its well-known name.
    pub fn resolve(&self, name: &str) -> Option<&ServerEntry> {
        self.servers.iter().find(|s| s.name == name)
    }

    /// Greatest ring number present in the table.
    pub fn last_ring(&self) -> u8 {
        self.servers.iter().map(|s| s.ring).max().unwrap_or(0)
    }

    /// Servers belonging to a given spawn ring, in table order.
    pub fn ring(&self, ring: u8) -> impl Iterator<Item = &ServerEntry> {
        self.servers.iter().filter(move |s| s.ring == ring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mppa256_resolves_every_server() {
        let topo = Topology::mppa256();
        assert_eq!(topo.leader, NodeId(0));
        assert!(topo.resolve("name-server").is_some());
        assert!(topo.resolve("sysv-server").is_some());
        assert!(topo.resolve("rmem-server").is_some());
        assert!(topo.resolve("vfs-server").is_some());
        assert!(topo.resolve("does-not-exist").is_none());
    }

    #[test]
    fn unix64_has_four_followers() {
        let topo = Topology::unix64();
        assert_eq!(topo.followers.len(), 4);
    }

    #[test]
    fn rings_are_ordered() {
        let topo = Topology::mppa256();
        assert_eq!(topo.last_ring(), 2);
        let ring0: Vec<_> = topo.ring(0).collect();
        assert_eq!(ring0.len(), 1);
        assert_eq!(ring0[0].name, "name-server");
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = Topology::parse("not valid toml [[[").unwrap_err();
        assert_eq!(err.code(), Code::Inval);
    }
}
