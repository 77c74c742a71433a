// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! The block buffer cache (spec §4.8, component I): a fixed set of lines
//! keyed by `(dev, block)`, sitting between the VFS core and a block
//! device.

pub mod device;

mod cache;

pub use cache::{BufferCache, BufferHandle};
pub use device::{BlockDevice, Ramdisk};
