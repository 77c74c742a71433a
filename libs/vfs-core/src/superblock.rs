// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! The MINIX superblock (spec §4.9: "Superblock integrity is verified by
//! a magic constant ... mismatch aborts mount with `EINVAL`").
//!
//! Grounded on `minix_super_read`/`minix_super_write` in
//! `original_source/src/sys/fs/vfs/minix/super.c`: the superblock and the
//! two bitmaps are read and written directly through the block device,
//! never through the buffer cache, "to keep them pinned" (spec §4.9).

use nvx_base::limits::{BLOCK_SIZE, MINIX_SUPER_MAGIC};
use nvx_base::{Code, Error, Result};
use nvx_bcache::BlockDevice;

/// On-disk superblock, block 1 of a MINIX volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub ninodes: u32,
    pub imap_blocks: u16,
    pub zmap_blocks: u16,
    pub first_data_zone: u16,
    pub log_zone_size: u16,
    pub max_size: u32,
    pub zones: u32,
    pub magic: u16,
}

const WIRE_SIZE: usize = 20;

impl Superblock {
    /// Block index of the superblock itself.
    pub const BLOCK_NUM: u32 = 1;

    fn to_bytes(self) -> [u8; WIRE_SIZE] {
        let mut buf = [0u8; WIRE_SIZE];
        buf[0..4].copy_from_slice(&self.ninodes.to_le_bytes());
        buf[4..6].copy_from_slice(&self.imap_blocks.to_le_bytes());
        buf[6..8].copy_from_slice(&self.zmap_blocks.to_le_bytes());
        buf[8..10].copy_from_slice(&self.first_data_zone.to_le_bytes());
        buf[10..12].copy_from_slice(&self.log_zone_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.max_size.to_le_bytes());
        buf[16..18].copy_from_slice((self.zones as u16).to_le_bytes().as_slice());
        buf[18..20].copy_from_slice(&self.magic.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> Self {
        let u16_at = |o: usize| u16::from_le_bytes([buf[o], buf[o + 1]]);
        let u32_at = |o: usize| u32::from_le_bytes([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]);
        Superblock {
            ninodes: u32_at(0),
            imap_blocks: u16_at(4),
            zmap_blocks: u16_at(6),
            first_data_zone: u16_at(8),
            log_zone_size: u16_at(10),
            max_size: u32_at(12),
            zones: u16_at(16) as u32,
            magic: u16_at(18),
        }
    }

    /// Reads and validates the superblock from `device`. Returns
    /// `EINVAL` on a bad magic, matching `minix_super_read`.
    pub fn read(device: &mut impl BlockDevice) -> Result<Self> {
        let mut raw = [0u8; BLOCK_SIZE];
        device.read_block(Self::BLOCK_NUM, &mut raw)?;
        let sb = Self::from_bytes(&raw);
        if sb.magic != MINIX_SUPER_MAGIC {
            return Err(Error::new(Code::Inval));
        }
        Ok(sb)
    }

    /// Writes the superblock back to `device`.
    pub fn write(&self, device: &mut impl BlockDevice) -> Result<()> {
        if self.magic != MINIX_SUPER_MAGIC {
            return Err(Error::new(Code::Inval));
        }
        let mut raw = [0u8; BLOCK_SIZE];
        raw[..WIRE_SIZE].copy_from_slice(&self.to_bytes());
        device.write_block(Self::BLOCK_NUM, &raw)
    }

    /// Block index where the inode bitmap begins (spec §4.9: "blocks
    /// 2..2+imap-1 inode bitmap").
    pub fn imap_start(&self) -> u32 {
        2
    }

    /// Block index where the zone bitmap begins.
    pub fn zmap_start(&self) -> u32 {
        self.imap_start() + self.imap_blocks as u32
    }

    /// Block index where the inode table begins.
    pub fn inode_table_start(&self) -> u32 {
        self.zmap_start() + self.zmap_blocks as u32
    }

    /// Number of blocks occupied by the inode table.
    pub fn inode_table_blocks(&self) -> u32 {
        let inodes_per_block = (BLOCK_SIZE / super::inode::DISK_INODE_SIZE) as u32;
        (self.ninodes + inodes_per_block - 1) / inodes_per_block
    }

    /// Block index of the first data zone.
    pub fn first_data_block(&self) -> u32 {
        self.first_data_zone as u32
    }
}
