// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Fixed capacities named throughout spec §3/§4. These are compile-time
//! defaults; the server-placement configuration (§6) may override a subset
//! of them at process start, but the table shapes (fixed-size arrays) are
//! load-bearing invariants, not just performance defaults.

/// Maximum length, in bytes, of a name server entry (excludes the NUL).
pub const NAME_MAX: usize = 64;

/// Maximum number of simultaneously registered processes in the Name
/// service.
pub const NANVIX_PROC_MAX: usize = 128;

/// Maximum number of connection slots per server.
pub const NANVIX_CONNECTIONS_MAX: usize = 16;

/// Maximum number of SysV message queues.
pub const NANVIX_MSG_MAX: usize = 16;

/// Maximum number of messages buffered per SysV message queue.
pub const NANVIX_MSG_LENGTH_MAX: usize = 8;

/// Maximum size, in bytes, of a single SysV message.
pub const NANVIX_MSG_SIZE_MAX: usize = 1024;

/// Maximum number of SysV semaphores.
pub const NANVIX_SEM_MAX: usize = 32;

/// Number of pages in the RMem server's flat pool.
pub const RMEM_NUM_BLOCKS: usize = 1024;

/// Size, in bytes, of a single RMem page.
pub const RMEM_BLOCK_SIZE: usize = 4096;

/// Total addressable size of the RMem pool, in bytes.
pub const RMEM_SIZE: usize = RMEM_NUM_BLOCKS * RMEM_BLOCK_SIZE;

/// Page number reserved to mean "no page".
pub const NULL_PAGE: u32 = 0;

/// Number of lines in the page cache (RMem client).
pub const RCACHE_LENGTH: usize = 32;

/// Page size used by the page cache; equal to [`RMEM_BLOCK_SIZE`].
pub const PAGE_SIZE: usize = RMEM_BLOCK_SIZE;

/// Number of lines in the block buffer cache.
pub const NR_BUFFERS: usize = 128;

/// Device block size used by the buffer cache and the MINIX file system.
pub const BLOCK_SIZE: usize = 512;

/// Maximum number of simultaneously open files per process.
pub const NANVIX_OPEN_MAX: usize = 16;

/// Magic constant at the head of a MINIX superblock.
pub const MINIX_SUPER_MAGIC: u16 = 0x137F;

/// Inode number of the root directory.
pub const MINIX_ROOT_INO: u32 = 1;

/// Number of direct zone pointers kept in an inode.
pub const MINIX_NR_DZONES: usize = 7;

/// Number of zone numbers packed into a single indirect block.
pub const ZONE_PTRS_PER_BLOCK: usize = BLOCK_SIZE / 4;

/// Size, in bytes, of the mailbox record (spec §6: "bit-exact").
pub const MAILBOX_MSG_SIZE: usize = 64;
