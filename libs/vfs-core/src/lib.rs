// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! MINIX-shaped file system core (spec §4.9, component J): superblock,
//! bitmaps, inodes, path resolution, and per-connection file tables, all
//! sitting atop [`nvx_bcache::BufferCache`].

mod bitmap;
mod fprocess;
mod fs;
mod inode;
mod path;
mod superblock;

pub use fprocess::{FileDescriptor, FileState, FsProcess};
pub use fs::{MinixFs, OpenFlags, Stat, Whence};
pub use inode::{DiskInode, FileType};
pub use superblock::Superblock;
