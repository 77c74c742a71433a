// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! The block buffer cache itself: a fixed table of buffers keyed by
//! `(dev, block_num)`, with LRU eviction and an explicit dirty bit (spec
//! §4.8). Unlike the page cache in `nvx-rcache`, callers state intent
//! up front through `bread` vs. `getblk`, so dirtiness is tracked
//! precisely rather than pessimistically.

use std::collections::HashMap;

use nvx_base::limits::{BLOCK_SIZE, NR_BUFFERS};
use nvx_base::{Code, Error, Result};

use crate::device::BlockDevice;

/// Opaque handle to a buffer held by a caller between `bread`/`getblk`
/// and the matching `brelse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferHandle(usize);

struct Buffer {
    dev: u32,
    block_num: u32,
    data: Box<[u8; BLOCK_SIZE]>,
    dirty: bool,
    refcount: u32,
    valid: bool,
    age: u64,
}

impl Buffer {
    fn empty() -> Self {
        Buffer {
            dev: 0,
            block_num: 0,
            data: Box::new([0u8; BLOCK_SIZE]),
            dirty: false,
            refcount: 0,
            valid: false,
            age: 0,
        }
    }
}

/// A fixed-size LRU cache of device blocks, one table shared by every
/// mounted device (spec §4.8: "shared, LRU, write-back").
pub struct BufferCache<D: BlockDevice> {
    device: D,
    buffers: Vec<Buffer>,
    index: HashMap<(u32, u32), usize>,
    clock: u64,
}

impl<D: BlockDevice> BufferCache<D> {
    pub fn new(device: D) -> Self {
        Self::with_capacity(device, NR_BUFFERS)
    }

    pub fn with_capacity(device: D, capacity: usize) -> Self {
        BufferCache {
            device,
            buffers: (0..capacity).map(|_| Buffer::empty()).collect(),
            index: HashMap::new(),
            clock: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn free_slot(&self) -> Option<usize> {
        self.buffers.iter().position(|b| !b.valid)
    }

    fn pick_victim(&self) -> Option<usize> {
        self.buffers
            .iter()
            .enumerate()
            .filter(|(_, b)| b.valid && b.refcount == 0)
            .min_by_key(|(i, b)| (b.age, *i))
            .map(|(i, _)| i)
    }

    fn write_back(&mut self, idx: usize) -> Result<()> {
        let buf = &self.buffers[idx];
        if buf.dirty {
            self.device.write_block(buf.block_num, buf.data.as_slice())?;
        }
        Ok(())
    }

    /// Returns the slot holding `(dev, block_num)`, loading it from the
    /// device (possibly evicting an unheld LRU victim) if necessary, and
    /// bumps its refcount. Mirrors the original `getblk`/`bread` split:
    /// this is `getblk`'s slot-acquisition half.
    fn acquire(&mut self, dev: u32, block_num: u32) -> Result<usize> {
        if let Some(&idx) = self.index.get(&(dev, block_num)) {
            let clock = self.tick();
            let buf = &mut self.buffers[idx];
            buf.refcount += 1;
            buf.age = clock;
            return Ok(idx);
        }

        let idx = match self.free_slot() {
            Some(idx) => idx,
            None => {
                let victim = self.pick_victim().ok_or_else(|| Error::new(Code::Busy))?;
                self.write_back(victim)?;
                let old_key = (self.buffers[victim].dev, self.buffers[victim].block_num);
                self.index.remove(&old_key);
                victim
            },
        };

        self.buffers[idx] = Buffer::empty();
        self.buffers[idx].dev = dev;
        self.buffers[idx].block_num = block_num;
        self.buffers[idx].refcount = 1;
        self.index.insert((dev, block_num), idx);
        Ok(idx)
    }

    /// Reads block `block_num` of `dev` into the cache (filling it from
    /// the device on a miss) and returns a handle plus the bytes.
    pub fn bread(&mut self, dev: u32, block_num: u32) -> Result<(BufferHandle, &[u8])> {
        let idx = self.acquire(dev, block_num)?;
        if !self.buffers[idx].valid {
            self.device
                .read_block(block_num, self.buffers[idx].data.as_mut_slice())?;
            self.buffers[idx].valid = true;
        }
        Ok((BufferHandle(idx), self.buffers[idx].data.as_slice()))
    }

    /// Acquires a buffer without reading it from the device first, for
    /// callers about to overwrite it completely (the original `getblk`
    /// fast path used when writing a full block).
    pub fn getblk(&mut self, dev: u32, block_num: u32) -> Result<(BufferHandle, &mut [u8])> {
        let idx = self.acquire(dev, block_num)?;
        self.buffers[idx].valid = true;
        Ok((BufferHandle(idx), self.buffers[idx].data.as_mut_slice()))
    }

    fn buffer_mut(&mut self, handle: BufferHandle) -> Result<&mut Buffer> {
        self.buffers
            .get_mut(handle.0)
            .filter(|b| b.valid)
            .ok_or_else(|| Error::new(Code::Inval))
    }

    /// Marks `handle`'s buffer dirty without writing through immediately
    /// (spec §4.8: "write-back"; flushed later by `brelse`'s write-back
    /// path or an explicit `flush_all`).
    pub fn buffer_set_dirty(&mut self, handle: BufferHandle) -> Result<()> {
        self.buffer_mut(handle)?.dirty = true;
        Ok(())
    }

    pub fn buffer_is_dirty(&self, handle: BufferHandle) -> Result<bool> {
        self.buffers
            .get(handle.0)
            .filter(|b| b.valid)
            .map(|b| b.dirty)
            .ok_or_else(|| Error::new(Code::Inval))
    }

    /// Writes `data` into the buffer and marks it dirty; `data` must be
    /// exactly [`BLOCK_SIZE`] bytes.
    pub fn bwrite(&mut self, handle: BufferHandle, data: &[u8]) -> Result<()> {
        let buf = self.buffer_mut(handle)?;
        if data.len() != BLOCK_SIZE {
            return Err(Error::new(Code::Inval));
        }
        buf.data.as_mut_slice().copy_from_slice(data);
        buf.dirty = true;
        Ok(())
    }

    /// Immediately writes the buffer's current contents through to the
    /// device, independent of the dirty bit (the original `bwrite`'s
    /// synchronous variant, `bwrite2` in this workspace to avoid a name
    /// clash with the buffered form above).
    pub fn bwrite2(&mut self, handle: BufferHandle) -> Result<()> {
        let idx = handle.0;
        self.write_back(idx)?;
        self.buffers[idx].dirty = false;
        Ok(())
    }

    /// Releases a buffer previously obtained from `bread`/`getblk`,
    /// decrementing its refcount. The buffer is not evicted just because
    /// it reaches a zero refcount; it simply becomes eligible.
    pub fn brelse(&mut self, handle: BufferHandle) -> Result<()> {
        let buf = self
            .buffers
            .get_mut(handle.0)
            .filter(|b| b.valid)
            .ok_or_else(|| Error::new(Code::Inval))?;
        if buf.refcount > 0 {
            buf.refcount -= 1;
        }
        Ok(())
    }

    /// Reads straight from the device, bypassing the cache entirely.
    /// Used for metadata the file system keeps pinned outside the
    /// buffer cache, such as the superblock and its bitmaps (spec §4.9:
    /// "goes through the block device, not the buffer cache").
    pub fn raw_read(&mut self, block_num: u32, buf: &mut [u8]) -> Result<()> {
        self.device.read_block(block_num, buf)
    }

    /// Writes straight to the device, bypassing the cache entirely.
    pub fn raw_write(&mut self, block_num: u32, buf: &[u8]) -> Result<()> {
        self.device.write_block(block_num, buf)
    }

    /// Writes every dirty buffer back to the device without evicting it.
    pub fn flush_all(&mut self) -> Result<()> {
        for idx in 0..self.buffers.len() {
            self.write_back(idx)?;
            self.buffers[idx].dirty = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Ramdisk;

    fn cache_with(capacity: usize, disk_blocks: usize) -> BufferCache<Ramdisk> {
        BufferCache::with_capacity(Ramdisk::new(disk_blocks * BLOCK_SIZE), capacity)
    }

    #[test]
    fn bread_then_bwrite_then_reread_sees_update() {
        let mut cache = cache_with(4, 8);
        let (h, _) = cache.bread(0, 2).unwrap();
        cache.bwrite(h, &[0x42; BLOCK_SIZE]).unwrap();
        cache.brelse(h).unwrap();

        let (h2, data) = cache.bread(0, 2).unwrap();
        assert_eq!(data[0], 0x42);
        cache.brelse(h2).unwrap();
    }

    #[test]
    fn dirty_bit_round_trips() {
        let mut cache = cache_with(2, 4);
        let (h, _) = cache.bread(0, 0).unwrap();
        assert!(!cache.buffer_is_dirty(h).unwrap());
        cache.buffer_set_dirty(h).unwrap();
        assert!(cache.buffer_is_dirty(h).unwrap());
        cache.brelse(h).unwrap();
    }

    #[test]
    fn bwrite2_flushes_independent_of_dirty_bit() {
        let mut cache = cache_with(2, 4);
        let (h, buf) = cache.getblk(0, 1).unwrap();
        buf.copy_from_slice(&[0x11; BLOCK_SIZE]);
        cache.bwrite2(h).unwrap();
        assert!(!cache.buffer_is_dirty(h).unwrap());
        cache.brelse(h).unwrap();
    }

    #[test]
    fn held_buffer_cannot_be_evicted() {
        let mut cache = cache_with(1, 4);
        let (h, _) = cache.bread(0, 0).unwrap();
        let err = cache.bread(0, 1).unwrap_err();
        assert_eq!(err.code(), Code::Busy);
        cache.brelse(h).unwrap();
    }

    #[test]
    fn lru_evicts_least_recently_used_buffer() {
        let mut cache = cache_with(2, 8);
        let (ha, _) = cache.bread(0, 0).unwrap();
        cache.brelse(ha).unwrap();
        let (hb, _) = cache.bread(0, 1).unwrap();
        cache.brelse(hb).unwrap();
        // touch block 0 again so block 1 becomes the LRU victim
        let (ha2, _) = cache.bread(0, 0).unwrap();
        cache.brelse(ha2).unwrap();

        cache.bread(0, 2).unwrap();

        assert!(!cache.index.contains_key(&(0, 1)));
        assert!(cache.index.contains_key(&(0, 0)));
    }

    #[test]
    fn different_devices_with_same_block_num_do_not_alias() {
        let mut cache = cache_with(4, 8);
        let (h0, _) = cache.getblk(0, 0).unwrap();
        cache.bwrite(h0, &[1u8; BLOCK_SIZE]).unwrap();
        cache.brelse(h0).unwrap();

        let (h1, _) = cache.getblk(1, 0).unwrap();
        cache.bwrite(h1, &[2u8; BLOCK_SIZE]).unwrap();
        cache.brelse(h1).unwrap();

        let (_, data0) = cache.bread(0, 0).unwrap();
        assert_eq!(data0[0], 1);
    }

    #[test]
    fn flush_all_clears_dirty_bits() {
        let mut cache = cache_with(2, 4);
        let (h, _) = cache.getblk(0, 0).unwrap();
        cache.bwrite(h, &[9u8; BLOCK_SIZE]).unwrap();
        cache.brelse(h).unwrap();
        cache.flush_all().unwrap();
        assert!(!cache.buffer_is_dirty(h).unwrap());
    }
}
