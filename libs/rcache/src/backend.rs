// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! The capability the page cache needs from whatever is backing it: the
//! RMem server, reached over request/reply (spec §4.6/§4.7).
//!
//! Kept as a trait, the way spec §9 asks for the block device to be "a
//! device-interface capability, not a preprocessor rewrite" — here applied
//! to the RMem link instead of a block device.

use nvx_base::limits::PAGE_SIZE;
use nvx_base::Result;

/// Backing store for a [`crate::PageCache`]: an RMem link (real client
/// talking to the RMem server over the transport, or an in-memory stub
/// for tests).
pub trait RmemBackend {
    /// Allocates a fresh remote page, returning its page number.
    fn alloc(&mut self) -> Result<u32>;

    /// Releases a remote page.
    fn free(&mut self, page: u32) -> Result<()>;

    /// Fetches a page's bytes into `buf` (exactly [`PAGE_SIZE`] bytes).
    fn read(&mut self, page: u32, buf: &mut [u8]) -> Result<()>;

    /// Writes a page's bytes from `buf` (exactly [`PAGE_SIZE`] bytes).
    fn write(&mut self, page: u32, buf: &[u8]) -> Result<()>;
}

/// An in-memory stand-in for the RMem server, used by tests and by
/// callers that don't need a real cross-cluster link.
#[derive(Default)]
pub struct InMemoryRmem {
    pages: std::collections::HashMap<u32, Box<[u8; PAGE_SIZE]>>,
    next: u32,
}

impl InMemoryRmem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RmemBackend for InMemoryRmem {
    fn alloc(&mut self) -> Result<u32> {
        self.next += 1;
        let page = self.next;
        self.pages.insert(page, Box::new([0u8; PAGE_SIZE]));
        Ok(page)
    }

    fn free(&mut self, page: u32) -> Result<()> {
        self.pages
            .remove(&page)
            .map(|_| ())
            .ok_or_else(|| nvx_base::Error::new(nvx_base::Code::NoEnt))
    }

    fn read(&mut self, page: u32, buf: &mut [u8]) -> Result<()> {
        let frame = self
            .pages
            .get(&page)
            .ok_or_else(|| nvx_base::Error::new(nvx_base::Code::NoEnt))?;
        buf.copy_from_slice(frame.as_slice());
        Ok(())
    }

    fn write(&mut self, page: u32, buf: &[u8]) -> Result<()> {
        let frame = self
            .pages
            .get_mut(&page)
            .ok_or_else(|| nvx_base::Error::new(nvx_base::Code::NoEnt))?;
        frame.copy_from_slice(buf);
        Ok(())
    }
}
