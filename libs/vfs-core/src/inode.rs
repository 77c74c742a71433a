// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! On-disk and in-core inode representation (spec §4.9).
//!
//! The on-disk layout follows traditional MINIX fields; the original
//! source's own `struct d_inode` was not retained in the filtered
//! source pack, so the field set here is the minimal one spec §4.9's
//! "zones[]" reference and this workspace's read/write/seek/stat
//! operations actually need. Beyond the direct zones, one `indirect`
//! pointer names a block packed with further zone numbers, the
//! traditional MINIX way of letting a file outgrow `MINIX_NR_DZONES`
//! direct zones without widening the inode itself.

use nvx_base::limits::MINIX_NR_DZONES;

/// File type recorded in an inode's mode field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular,
    Directory,
}

/// A MINIX on-disk inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskInode {
    pub mode: u16,
    pub uid: u16,
    pub gid: u8,
    pub nlinks: u8,
    pub size: u32,
    pub time: u32,
    pub zones: [u32; MINIX_NR_DZONES],
    /// Zone holding a flat array of further zone numbers, `0` if none is
    /// allocated yet.
    pub indirect: u32,
}

pub const DISK_INODE_SIZE: usize = 64;

impl DiskInode {
    pub fn free() -> Self {
        DiskInode {
            mode: 0,
            uid: 0,
            gid: 0,
            nlinks: 0,
            size: 0,
            time: 0,
            zones: [0; MINIX_NR_DZONES],
            indirect: 0,
        }
    }

    pub fn is_free(&self) -> bool {
        self.nlinks == 0
    }

    pub fn file_type(&self) -> FileType {
        if self.mode & Self::DIR_BIT != 0 {
            FileType::Directory
        }
        else {
            FileType::Regular
        }
    }

    const DIR_BIT: u16 = 1 << 14;

    pub fn new_regular(mode: u16) -> Self {
        DiskInode {
            mode: mode & !Self::DIR_BIT,
            uid: 0,
            gid: 0,
            nlinks: 1,
            size: 0,
            time: 0,
            zones: [0; MINIX_NR_DZONES],
            indirect: 0,
        }
    }

    pub fn new_directory(mode: u16) -> Self {
        DiskInode {
            mode: mode | Self::DIR_BIT,
            uid: 0,
            gid: 0,
            nlinks: 1,
            size: 0,
            time: 0,
            zones: [0; MINIX_NR_DZONES],
            indirect: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; DISK_INODE_SIZE] {
        let mut buf = [0u8; DISK_INODE_SIZE];
        buf[0..2].copy_from_slice(&self.mode.to_le_bytes());
        buf[2..4].copy_from_slice(&self.uid.to_le_bytes());
        buf[4] = self.gid;
        buf[5] = self.nlinks;
        buf[6..10].copy_from_slice(&self.size.to_le_bytes());
        buf[10..14].copy_from_slice(&self.time.to_le_bytes());
        for (i, z) in self.zones.iter().enumerate() {
            let off = 14 + i * 4;
            buf[off..off + 4].copy_from_slice(&z.to_le_bytes());
        }
        let indirect_off = 14 + MINIX_NR_DZONES * 4;
        buf[indirect_off..indirect_off + 4].copy_from_slice(&self.indirect.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        let u16_at = |o: usize| u16::from_le_bytes([buf[o], buf[o + 1]]);
        let u32_at = |o: usize| u32::from_le_bytes([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]);
        let mut zones = [0u32; MINIX_NR_DZONES];
        for (i, z) in zones.iter_mut().enumerate() {
            *z = u32_at(14 + i * 4);
        }
        let indirect = u32_at(14 + MINIX_NR_DZONES * 4);
        DiskInode {
            mode: u16_at(0),
            uid: u16_at(2),
            gid: buf[4],
            nlinks: buf[5],
            size: u32_at(6),
            time: u32_at(10),
            zones,
            indirect,
        }
    }
}
