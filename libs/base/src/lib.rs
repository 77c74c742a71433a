// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Shared foundations used by every server and client runtime in this
//! workspace: error codes, node/process identity types, size limits, and
//! configuration loading.

pub mod config;
pub mod errors;
pub mod ids;
pub mod limits;
pub mod logging;

pub use errors::{Code, Error, Result};
pub use ids::{NodeId, Pgid, Pid, PortId};
