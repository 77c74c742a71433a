// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Block device interface (spec §9: "Represent as a variant ... with a
//! small dispatch table on `(read_block, write_block)`").
//!
//! The ramdisk byte array is explicitly external to this specification's
//! core (spec §1), treated as a device satisfying this interface. One
//! reference device — [`Ramdisk`] — is provided so the buffer cache and
//! VFS core can be exercised without real hardware, grounded on
//! `ramdisk_read`/`ramdisk_write` in `original_source`.

use nvx_base::limits::BLOCK_SIZE;
use nvx_base::{Code, Error, Result};

/// A block-addressable storage device.
pub trait BlockDevice {
    /// Reads block `block_num` into `buf` (exactly [`BLOCK_SIZE`] bytes).
    fn read_block(&mut self, block_num: u32, buf: &mut [u8]) -> Result<()>;

    /// Writes `buf` (exactly [`BLOCK_SIZE`] bytes) to block `block_num`.
    fn write_block(&mut self, block_num: u32, buf: &[u8]) -> Result<()>;

    /// Total number of addressable blocks.
    fn num_blocks(&self) -> u32;
}

/// An in-memory ramdisk, addressed in whole blocks.
pub struct Ramdisk {
    data: Vec<u8>,
    block_size: usize,
}

impl Ramdisk {
    pub fn new(size_bytes: usize) -> Self {
        Ramdisk {
            data: vec![0u8; size_bytes],
            block_size: BLOCK_SIZE,
        }
    }

    fn bounds_check(&self, block_num: u32, len: usize) -> Result<usize> {
        let off = block_num as usize * self.block_size;
        if off >= self.data.len() {
            return Err(Error::new(Code::Inval));
        }
        if off + len > self.data.len() {
            return Err(Error::new(Code::Inval));
        }
        Ok(off)
    }
}

impl BlockDevice for Ramdisk {
    fn read_block(&mut self, block_num: u32, buf: &mut [u8]) -> Result<()> {
        let off = self.bounds_check(block_num, buf.len())?;
        buf.copy_from_slice(&self.data[off..off + buf.len()]);
        Ok(())
    }

    fn write_block(&mut self, block_num: u32, buf: &[u8]) -> Result<()> {
        let off = self.bounds_check(block_num, buf.len())?;
        self.data[off..off + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn num_blocks(&self) -> u32 {
        (self.data.len() / self.block_size) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_round_trip() {
        let mut disk = Ramdisk::new(4 * BLOCK_SIZE);
        let buf = [0xAB; BLOCK_SIZE];
        disk.write_block(1, &buf).unwrap();
        let mut out = [0u8; BLOCK_SIZE];
        disk.read_block(1, &mut out).unwrap();
        assert_eq!(out, buf);
    }

    #[test]
    fn offset_at_size_is_rejected() {
        let mut disk = Ramdisk::new(2 * BLOCK_SIZE);
        let mut out = [0u8; BLOCK_SIZE];
        let err = disk.read_block(2, &mut out).unwrap_err();
        assert_eq!(err.code(), Code::Inval);
    }

    #[test]
    fn crossing_size_is_rejected() {
        let mut disk = Ramdisk::new(2 * BLOCK_SIZE);
        // block 1 is the last valid block; a read larger than BLOCK_SIZE
        // starting there crosses the end of the device.
        let mut out = vec![0u8; BLOCK_SIZE * 2];
        let err = disk.read_block(1, &mut out).unwrap_err();
        assert_eq!(err.code(), Code::Inval);
    }
}
