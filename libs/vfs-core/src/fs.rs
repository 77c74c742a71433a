// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Ties the superblock, bitmaps, inodes, directories, and per-connection
//! file tables into the operation surface spec §6's `vfs_*` calls name:
//! `stat`, `open`, `close`, `unlink`, `seek`, `read`, `write`, grounded
//! on `include/nanvix/servers/vfs/vfs.h`.

use std::collections::HashMap;

use nvx_base::limits::{BLOCK_SIZE, MINIX_NR_DZONES, ZONE_PTRS_PER_BLOCK};
use nvx_base::{Code, Error, Result};
use nvx_bcache::{BlockDevice, BufferCache};

use crate::bitmap::Bitmap;
use crate::fprocess::FsProcess;
use crate::inode::{DiskInode, FileType, DISK_INODE_SIZE};
use crate::path::{self, Component};
use crate::superblock::Superblock;

bitflags::bitflags! {
    /// Open-call flags (spec §4.9's file descriptor state machine plus
    /// the create/exclusive/truncate/append modifiers every `vfs_open`
    /// caller needs).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const READ     = 1 << 0;
        const WRITE    = 1 << 1;
        const CREATE   = 1 << 2;
        const EXCL     = 1 << 3;
        const TRUNCATE = 1 << 4;
        const APPEND   = 1 << 5;
    }
}

/// Reposition base for `vfs_seek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

/// Fields returned by `vfs_stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub inode_num: u32,
    pub mode: u16,
    pub size: u32,
    pub nlinks: u8,
}

const DEV: u32 = 0;
const DIRENT_NAME_MAX: usize = 28;
const DIRENT_SIZE: usize = 4 + DIRENT_NAME_MAX;
const DIRENTS_PER_BLOCK: usize = BLOCK_SIZE / DIRENT_SIZE;

fn encode_dirent(ino: u32, name: &str) -> [u8; DIRENT_SIZE] {
    let mut buf = [0u8; DIRENT_SIZE];
    buf[0..4].copy_from_slice(&ino.to_le_bytes());
    let bytes = name.as_bytes();
    let n = bytes.len().min(DIRENT_NAME_MAX);
    buf[4..4 + n].copy_from_slice(&bytes[..n]);
    buf
}

fn decode_dirent(raw: &[u8]) -> (u32, &str) {
    let ino = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
    let name_bytes = &raw[4..DIRENT_SIZE];
    let len = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
    (ino, std::str::from_utf8(&name_bytes[..len]).unwrap_or(""))
}

/// A mounted MINIX volume plus the per-connection state layered on it.
pub struct MinixFs<D: BlockDevice> {
    superblock: Superblock,
    imap: Bitmap,
    zmap: Bitmap,
    bcache: BufferCache<D>,
    processes: HashMap<usize, FsProcess>,
}

struct RawDeviceView<'a, D: BlockDevice> {
    bcache: &'a mut BufferCache<D>,
}

impl<'a, D: BlockDevice> BlockDevice for RawDeviceView<'a, D> {
    fn read_block(&mut self, block_num: u32, buf: &mut [u8]) -> Result<()> {
        self.bcache.raw_read(block_num, buf)
    }
    fn write_block(&mut self, block_num: u32, buf: &[u8]) -> Result<()> {
        self.bcache.raw_write(block_num, buf)
    }
    fn num_blocks(&self) -> u32 {
        u32::MAX
    }
}

impl<D: BlockDevice> MinixFs<D> {
    /// Mounts an already-formatted volume (spec §4.9: magic mismatch
    /// aborts mount with `EINVAL`).
    pub fn mount(device: D) -> Result<Self> {
        let mut bcache = BufferCache::new(device);
        let superblock = {
            let mut raw = RawDeviceView { bcache: &mut bcache };
            Superblock::read(&mut raw)?
        };
        let imap = {
            let mut raw = RawDeviceView { bcache: &mut bcache };
            Bitmap::read(&mut raw, superblock.imap_start(), superblock.imap_blocks)?
        };
        let zmap = {
            let mut raw = RawDeviceView { bcache: &mut bcache };
            Bitmap::read(&mut raw, superblock.zmap_start(), superblock.zmap_blocks)?
        };
        Ok(MinixFs {
            superblock,
            imap,
            zmap,
            bcache,
            processes: HashMap::new(),
        })
    }

    /// Flushes dirty buffers and writes the superblock/bitmaps back
    /// (spec §4.10: "all servers flush dirty state ... buffer cache
    /// `bwrite` of dirty buffers").
    pub fn unmount(&mut self) -> Result<()> {
        self.bcache.flush_all()?;
        let mut raw = RawDeviceView { bcache: &mut self.bcache };
        self.superblock.write(&mut raw)?;
        self.imap.write(&mut raw)?;
        self.zmap.write(&mut raw)?;
        Ok(())
    }

    fn inode_location(&self, ino: u32) -> (u32, usize) {
        let inodes_per_block = BLOCK_SIZE / DISK_INODE_SIZE;
        let idx = (ino - 1) as usize;
        let block = self.superblock.inode_table_start() + (idx / inodes_per_block) as u32;
        let offset = (idx % inodes_per_block) * DISK_INODE_SIZE;
        (block, offset)
    }

    fn read_inode(&mut self, ino: u32) -> Result<DiskInode> {
        let (block, offset) = self.inode_location(ino);
        let (h, data) = self.bcache.bread(DEV, block)?;
        let inode = DiskInode::from_bytes(&data[offset..offset + DISK_INODE_SIZE]);
        self.bcache.brelse(h)?;
        Ok(inode)
    }

    fn write_inode(&mut self, ino: u32, inode: &DiskInode) -> Result<()> {
        let (block, offset) = self.inode_location(ino);
        let (h, data) = self.bcache.bread(DEV, block)?;
        let mut full = [0u8; BLOCK_SIZE];
        full.copy_from_slice(data);
        full[offset..offset + DISK_INODE_SIZE].copy_from_slice(&inode.to_bytes());
        self.bcache.bwrite(h, &full)?;
        self.bcache.brelse(h)?;
        Ok(())
    }

    fn alloc_inode(&mut self) -> Result<u32> {
        self.imap.alloc(self.superblock.ninodes)
    }

    fn zone_block(&self, zone_bit: u32) -> u32 {
        self.superblock.first_data_block() + (zone_bit - 1)
    }

    fn alloc_zone(&mut self) -> Result<u32> {
        let bit = self.zmap.alloc(self.superblock.zones)?;
        Ok(self.zone_block(bit))
    }

    fn free_zone(&mut self, block: u32) {
        let bit = block - self.superblock.first_data_block() + 1;
        self.zmap.free(bit);
    }

    /// Maximum file size this volume can represent: `MINIX_NR_DZONES`
    /// direct zones plus one indirect block's worth of further zones
    /// (spec §4.9: "`EFBIG` if the file would exceed maximum
    /// representable size").
    fn max_file_size(&self) -> u64 {
        self.superblock.max_size as u64
    }

    fn alloc_zone_zeroed(&mut self) -> Result<u32> {
        let zone = self.alloc_zone()?;
        let (h, _) = self.bcache.getblk(DEV, zone)?;
        self.bcache.bwrite(h, &[0u8; BLOCK_SIZE])?;
        self.bcache.brelse(h)?;
        Ok(zone)
    }

    fn indirect_entry(&mut self, indirect_zone: u32, pos: usize) -> Result<u32> {
        let (h, data) = self.bcache.bread(DEV, indirect_zone)?;
        let off = pos * 4;
        let val = u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]]);
        self.bcache.brelse(h)?;
        Ok(val)
    }

    fn set_indirect_entry(&mut self, indirect_zone: u32, pos: usize, value: u32) -> Result<()> {
        let (h, data) = self.bcache.bread(DEV, indirect_zone)?;
        let mut full = [0u8; BLOCK_SIZE];
        full.copy_from_slice(data);
        self.bcache.brelse(h)?;
        let off = pos * 4;
        full[off..off + 4].copy_from_slice(&value.to_le_bytes());
        let (h2, _) = self.bcache.getblk(DEV, indirect_zone)?;
        self.bcache.bwrite(h2, &full)?;
        self.bcache.brelse(h2)?;
        Ok(())
    }

    /// Returns the physical zone holding `zone_idx`'s data, or `0` if
    /// none is allocated yet. Read-only: never allocates.
    fn read_zone_ptr(&mut self, inode: &DiskInode, zone_idx: usize) -> Result<u32> {
        if zone_idx < MINIX_NR_DZONES {
            return Ok(inode.zones[zone_idx]);
        }
        let pos = zone_idx - MINIX_NR_DZONES;
        if pos >= ZONE_PTRS_PER_BLOCK || inode.indirect == 0 {
            return Ok(0);
        }
        self.indirect_entry(inode.indirect, pos)
    }

    /// Returns the physical zone for `zone_idx`, allocating a direct
    /// slot, the indirect block, or an indirect entry as needed, plus
    /// whether the zone was freshly allocated (so its content is known
    /// zero and need not be read back before a partial write). `EFBIG`
    /// once `zone_idx` exceeds what `zones[]` plus one indirect block
    /// can address.
    fn zone_for_write(&mut self, inode: &mut DiskInode, zone_idx: usize) -> Result<(u32, bool)> {
        if zone_idx >= MINIX_NR_DZONES + ZONE_PTRS_PER_BLOCK {
            return Err(Error::new(Code::TooBig));
        }
        if zone_idx < MINIX_NR_DZONES {
            if inode.zones[zone_idx] == 0 {
                inode.zones[zone_idx] = self.alloc_zone()?;
                return Ok((inode.zones[zone_idx], true));
            }
            return Ok((inode.zones[zone_idx], false));
        }
        let pos = zone_idx - MINIX_NR_DZONES;
        if inode.indirect == 0 {
            inode.indirect = self.alloc_zone_zeroed()?;
        }
        let existing = self.indirect_entry(inode.indirect, pos)?;
        if existing != 0 {
            return Ok((existing, false));
        }
        let zone = self.alloc_zone()?;
        self.set_indirect_entry(inode.indirect, pos, zone)?;
        Ok((zone, true))
    }

    /// Frees every zone reachable from `inode` — direct zones, the
    /// zones an indirect block names, and the indirect block itself.
    fn free_all_zones(&mut self, inode: &DiskInode) -> Result<()> {
        for &zone in inode.zones.iter().filter(|&&z| z != 0) {
            self.free_zone(zone);
        }
        if inode.indirect != 0 {
            for pos in 0..ZONE_PTRS_PER_BLOCK {
                let zone = self.indirect_entry(inode.indirect, pos)?;
                if zone != 0 {
                    self.free_zone(zone);
                }
            }
            self.free_zone(inode.indirect);
        }
        Ok(())
    }

    fn lookup_in_dir(&mut self, dir_ino: u32, name: &str) -> Result<u32> {
        let inode = self.read_inode(dir_ino)?;
        for &zone in inode.zones.iter().filter(|&&z| z != 0) {
            let (h, data) = self.bcache.bread(DEV, zone)?;
            let mut found = None;
            for i in 0..DIRENTS_PER_BLOCK {
                let raw = &data[i * DIRENT_SIZE..(i + 1) * DIRENT_SIZE];
                let (ino, ent_name) = decode_dirent(raw);
                if ino != 0 && ent_name == name {
                    found = Some(ino);
                    break;
                }
            }
            self.bcache.brelse(h)?;
            if let Some(ino) = found {
                return Ok(ino);
            }
        }
        Err(Error::new(Code::NoEnt))
    }

    /// Appends `(name, child_ino)` into `dir_ino`'s first slot with room,
    /// allocating a new zone if every existing one is full.
    fn add_dirent(&mut self, dir_ino: u32, name: &str, child_ino: u32) -> Result<()> {
        if name.len() > DIRENT_NAME_MAX {
            return Err(Error::new(Code::NameTooLong));
        }
        let mut inode = self.read_inode(dir_ino)?;
        let mut inode_dirty = false;

        for slot_idx in 0..inode.zones.len() {
            if inode.zones[slot_idx] == 0 {
                inode.zones[slot_idx] = self.alloc_zone()?;
                inode_dirty = true;
            }
            let zone = inode.zones[slot_idx];

            // read the zone's current content through the cache (a
            // freshly allocated zone reads back as zero-filled, same as
            // an unused dirent slot) before mutating it, so an eviction
            // between allocation and write-back never loses entries
            // already on the device.
            let (h, data) = self.bcache.bread(DEV, zone)?;
            let mut full = [0u8; BLOCK_SIZE];
            full.copy_from_slice(data);
            self.bcache.brelse(h)?;

            let free_offset = (0..DIRENTS_PER_BLOCK).find_map(|i| {
                let off = i * DIRENT_SIZE;
                let (ino, _) = decode_dirent(&full[off..off + DIRENT_SIZE]);
                (ino == 0).then_some(off)
            });

            if let Some(off) = free_offset {
                full[off..off + DIRENT_SIZE].copy_from_slice(&encode_dirent(child_ino, name));
                let (h2, _) = self.bcache.getblk(DEV, zone)?;
                self.bcache.bwrite(h2, &full)?;
                self.bcache.brelse(h2)?;
                if inode_dirty {
                    self.write_inode(dir_ino, &inode)?;
                }
                return Ok(());
            }
        }

        if inode_dirty {
            self.write_inode(dir_ino, &inode)?;
        }
        Err(Error::new(Code::NoSpace))
    }

    fn remove_dirent(&mut self, dir_ino: u32, name: &str) -> Result<()> {
        let inode = self.read_inode(dir_ino)?;
        for &zone in inode.zones.iter().filter(|&&z| z != 0) {
            let (h, data) = self.bcache.bread(DEV, zone)?;
            let mut full = [0u8; BLOCK_SIZE];
            full.copy_from_slice(data);
            self.bcache.brelse(h)?;

            let mut removed = false;
            for i in 0..DIRENTS_PER_BLOCK {
                let entry = &mut full[i * DIRENT_SIZE..(i + 1) * DIRENT_SIZE];
                let (ino, ent_name) = decode_dirent(entry);
                if ino != 0 && ent_name == name {
                    entry.fill(0);
                    removed = true;
                    break;
                }
            }

            if removed {
                let (h2, _) = self.bcache.getblk(DEV, zone)?;
                self.bcache.bwrite(h2, &full)?;
                self.bcache.brelse(h2)?;
                return Ok(());
            }
        }
        Err(Error::new(Code::NoEnt))
    }

    /// Resolves `path` relative to `conn`'s working directory (or its
    /// root, for an absolute path), honoring `.`/`..` (spec §4.9).
    fn resolve(&mut self, conn: usize, path: &str) -> Result<u32> {
        let (root, pwd) = {
            let proc = self.processes.get(&conn).ok_or_else(|| Error::new(Code::Inval))?;
            (proc.root_inode, proc.pwd_inode)
        };
        let mut cur = if path::is_absolute(path) { root } else { pwd };
        for comp in path::components(path) {
            match comp {
                Component::CurDir => {},
                Component::ParentDir | Component::Name(_) => {
                    let name = match comp {
                        Component::ParentDir => "..",
                        Component::Name(n) => n,
                        Component::CurDir => unreachable!(),
                    };
                    cur = self.lookup_in_dir(cur, name)?;
                },
            }
        }
        Ok(cur)
    }

    fn split_parent(path: &str) -> (&str, &str) {
        match path.rfind('/') {
            Some(idx) => {
                let parent = if idx == 0 { "/" } else { &path[..idx] };
                (parent, &path[idx + 1..])
            },
            None => (".", path),
        }
    }

    /// Registers a fresh connection, rooted at the volume's root inode.
    pub fn attach(&mut self, conn: usize) {
        self.processes.insert(conn, FsProcess::new(Superblock::ROOT_INODE));
    }

    pub fn detach(&mut self, conn: usize) {
        self.processes.remove(&conn);
    }

    /// `vfs_open`.
    pub fn open(&mut self, conn: usize, path: &str, flags: OpenFlags) -> Result<usize> {
        if path.is_empty() {
            return Err(Error::new(Code::Inval));
        }

        let existing = self.resolve(conn, path);
        let ino = match existing {
            Ok(ino) => {
                if flags.contains(OpenFlags::CREATE) && flags.contains(OpenFlags::EXCL) {
                    return Err(Error::new(Code::Exists));
                }
                if flags.contains(OpenFlags::TRUNCATE) {
                    let mut inode = self.read_inode(ino)?;
                    inode.size = 0;
                    self.write_inode(ino, &inode)?;
                }
                ino
            },
            Err(e) if e.code() == Code::NoEnt && flags.contains(OpenFlags::CREATE) => {
                let (parent_path, name) = Self::split_parent(path);
                let parent_ino = self.resolve(conn, parent_path)?;
                let new_ino = self.alloc_inode()?;
                self.write_inode(new_ino, &DiskInode::new_regular(0o644))?;
                self.add_dirent(parent_ino, name, new_ino)?;
                new_ino
            },
            Err(e) => return Err(e),
        };

        let append = flags.contains(OpenFlags::APPEND);
        let proc = self.processes.get_mut(&conn).ok_or_else(|| Error::new(Code::Inval))?;
        proc.install(ino, append)
    }

    /// `vfs_close`.
    pub fn close(&mut self, conn: usize, fd: usize) -> Result<()> {
        let proc = self.processes.get_mut(&conn).ok_or_else(|| Error::new(Code::Inval))?;
        proc.close(fd)?;
        Ok(())
    }

    /// `vfs_read`.
    pub fn read(&mut self, conn: usize, fd: usize, buf: &mut [u8]) -> Result<usize> {
        let (ino, mut offset) = {
            let proc = self.processes.get(&conn).ok_or_else(|| Error::new(Code::Inval))?;
            let desc = proc.get(fd)?;
            (desc.inode_num, desc.offset)
        };
        let inode = self.read_inode(ino)?;
        let mut total = 0;
        while total < buf.len() && offset < inode.size as u64 {
            let zone_idx = (offset / BLOCK_SIZE as u64) as usize;
            let zone_off = (offset % BLOCK_SIZE as u64) as usize;
            let zone = self.read_zone_ptr(&inode, zone_idx)?;
            if zone == 0 {
                break;
            }
            let (h, data) = self.bcache.bread(DEV, zone)?;
            let avail_in_block = BLOCK_SIZE - zone_off;
            let remaining_in_file = (inode.size as u64 - offset) as usize;
            let n = (buf.len() - total).min(avail_in_block).min(remaining_in_file);
            buf[total..total + n].copy_from_slice(&data[zone_off..zone_off + n]);
            self.bcache.brelse(h)?;
            total += n;
            offset += n as u64;
        }
        let proc = self.processes.get_mut(&conn).unwrap();
        proc.get_mut(fd)?.offset = offset;
        Ok(total)
    }

    /// `vfs_write`.
    pub fn write(&mut self, conn: usize, fd: usize, buf: &[u8]) -> Result<usize> {
        let (ino, append, mut offset) = {
            let proc = self.processes.get(&conn).ok_or_else(|| Error::new(Code::Inval))?;
            let desc = proc.get(fd)?;
            (desc.inode_num, desc.append, desc.offset)
        };
        let mut inode = self.read_inode(ino)?;
        if append {
            offset = inode.size as u64;
        }

        if !buf.is_empty() && offset + buf.len() as u64 > self.max_file_size() {
            return Err(Error::new(Code::TooBig));
        }

        let mut total = 0;
        while total < buf.len() {
            let zone_idx = (offset / BLOCK_SIZE as u64) as usize;
            let zone_off = (offset % BLOCK_SIZE as u64) as usize;
            let (zone, freshly_allocated) = self.zone_for_write(&mut inode, zone_idx)?;
            let n = (buf.len() - total).min(BLOCK_SIZE - zone_off);

            // a partial-block write must preserve the rest of the
            // block's existing content, so read it through the cache
            // first rather than trust getblk's (possibly stale) buffer.
            let mut full = [0u8; BLOCK_SIZE];
            if !freshly_allocated {
                let (h, data) = self.bcache.bread(DEV, zone)?;
                full.copy_from_slice(data);
                self.bcache.brelse(h)?;
            }
            full[zone_off..zone_off + n].copy_from_slice(&buf[total..total + n]);
            let (h, _) = self.bcache.getblk(DEV, zone)?;
            self.bcache.bwrite(h, &full)?;
            self.bcache.brelse(h)?;
            total += n;
            offset += n as u64;
        }

        if offset > inode.size as u64 {
            inode.size = offset as u32;
        }
        self.write_inode(ino, &inode)?;

        let proc = self.processes.get_mut(&conn).unwrap();
        proc.get_mut(fd)?.offset = offset;
        Ok(total)
    }

    /// `vfs_seek`.
    pub fn seek(&mut self, conn: usize, fd: usize, offset: i64, whence: Whence) -> Result<u64> {
        let ino = {
            let proc = self.processes.get(&conn).ok_or_else(|| Error::new(Code::Inval))?;
            proc.get(fd)?.inode_num
        };
        let size = self.read_inode(ino)?.size as i64;
        let proc = self.processes.get_mut(&conn).unwrap();
        let desc = proc.get_mut(fd)?;
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => desc.offset as i64,
            Whence::End => size,
        };
        let new_offset = base + offset;
        if new_offset < 0 {
            return Err(Error::new(Code::Inval));
        }
        desc.offset = new_offset as u64;
        Ok(desc.offset)
    }

    /// `vfs_unlink`.
    pub fn unlink(&mut self, conn: usize, path: &str) -> Result<()> {
        let (parent_path, name) = Self::split_parent(path);
        let parent_ino = self.resolve(conn, parent_path)?;
        let ino = self.lookup_in_dir(parent_ino, name)?;
        let mut inode = self.read_inode(ino)?;
        if inode.file_type() == FileType::Directory {
            return Err(Error::new(Code::Perm));
        }
        self.remove_dirent(parent_ino, name)?;
        inode.nlinks = inode.nlinks.saturating_sub(1);
        if inode.nlinks == 0 {
            self.free_all_zones(&inode)?;
            self.imap.free(ino);
            self.write_inode(ino, &DiskInode::free())?;
        }
        else {
            self.write_inode(ino, &inode)?;
        }
        Ok(())
    }

    /// `vfs_stat`.
    pub fn stat(&mut self, conn: usize, path: &str) -> Result<Stat> {
        let ino = self.resolve(conn, path)?;
        let inode = self.read_inode(ino)?;
        Ok(Stat {
            inode_num: ino,
            mode: inode.mode,
            size: inode.size,
            nlinks: inode.nlinks,
        })
    }

    /// Builds a fresh volume: superblock, bitmaps, and a root directory
    /// containing `.`/`..` self-entries. Not part of spec §6's client
    /// surface (no `mkfs` opcode is named there); provided so a volume
    /// can be brought up without external tooling.
    pub fn format(mut device: D, total_blocks: u32, ninodes: u32) -> Result<Self> {
        let imap_blocks = ((ninodes + 1) / (BLOCK_SIZE as u32 * 8) + 1) as u16;
        let zmap_blocks = 1u16;
        let inode_table_blocks = (ninodes as usize).div_ceil(BLOCK_SIZE / DISK_INODE_SIZE) as u32;
        let first_data_zone = 2 + imap_blocks as u32 + zmap_blocks as u32 + inode_table_blocks;
        let zones = total_blocks.saturating_sub(first_data_zone) + 1;

        let superblock = Superblock {
            ninodes,
            imap_blocks,
            zmap_blocks,
            first_data_zone: first_data_zone as u16,
            log_zone_size: 0,
            max_size: (MINIX_NR_DZONES + ZONE_PTRS_PER_BLOCK) as u32 * BLOCK_SIZE as u32,
            zones,
            magic: nvx_base::limits::MINIX_SUPER_MAGIC,
        };
        superblock.write(&mut device)?;

        let mut imap = Bitmap::read(&mut device, superblock.imap_start(), imap_blocks)?;
        let mut zmap = Bitmap::read(&mut device, superblock.zmap_start(), zmap_blocks)?;

        let root_ino = imap.alloc(ninodes)?;
        debug_assert_eq!(root_ino, Superblock::ROOT_INODE);
        let root_zone_bit = zmap.alloc(zones)?;
        let root_zone_block = first_data_zone + (root_zone_bit - 1);

        let mut root_inode = DiskInode::new_directory(0o755);
        root_inode.zones[0] = root_zone_block;
        root_inode.nlinks = 2;

        let mut dir_block = [0u8; BLOCK_SIZE];
        dir_block[0..DIRENT_SIZE].copy_from_slice(&encode_dirent(root_ino, "."));
        dir_block[DIRENT_SIZE..2 * DIRENT_SIZE].copy_from_slice(&encode_dirent(root_ino, ".."));
        root_inode.size = BLOCK_SIZE as u32;

        device.write_block(root_zone_block, &dir_block)?;

        imap.write(&mut device)?;
        zmap.write(&mut device)?;

        let mut fs = MinixFs {
            superblock,
            imap,
            zmap,
            bcache: BufferCache::new(device),
            processes: HashMap::new(),
        };
        fs.write_inode(root_ino, &root_inode)?;
        fs.bcache.flush_all()?;
        Ok(fs)
    }
}

impl Superblock {
    pub const ROOT_INODE: u32 = nvx_base::limits::MINIX_ROOT_INO;
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvx_bcache::Ramdisk;

    fn fresh_fs() -> MinixFs<Ramdisk> {
        let disk = Ramdisk::new(512 * BLOCK_SIZE);
        MinixFs::format(disk, 512, 32).unwrap()
    }

    #[test]
    fn create_write_read_round_trips() {
        let mut fs = fresh_fs();
        fs.attach(0);
        let fd = fs
            .open(0, "/hello.txt", OpenFlags::CREATE | OpenFlags::WRITE)
            .unwrap();
        let n = fs.write(0, fd, b"hello, minix").unwrap();
        assert_eq!(n, b"hello, minix".len());
        fs.close(0, fd).unwrap();

        let fd2 = fs.open(0, "/hello.txt", OpenFlags::READ).unwrap();
        let mut buf = [0u8; 32];
        let read = fs.read(0, fd2, &mut buf).unwrap();
        assert_eq!(&buf[..read], b"hello, minix");
    }

    #[test]
    fn exclusive_create_on_existing_file_fails() {
        let mut fs = fresh_fs();
        fs.attach(0);
        fs.open(0, "/a", OpenFlags::CREATE).unwrap();
        let err = fs
            .open(0, "/a", OpenFlags::CREATE | OpenFlags::EXCL)
            .unwrap_err();
        assert_eq!(err.code(), Code::Exists);
    }

    #[test]
    fn open_missing_file_without_create_is_enoent() {
        let mut fs = fresh_fs();
        fs.attach(0);
        let err = fs.open(0, "/nope", OpenFlags::READ).unwrap_err();
        assert_eq!(err.code(), Code::NoEnt);
    }

    #[test]
    fn read_write_on_closed_fd_is_ebadf() {
        let mut fs = fresh_fs();
        fs.attach(0);
        let fd = fs.open(0, "/a", OpenFlags::CREATE).unwrap();
        fs.close(0, fd).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(fs.read(0, fd, &mut buf).unwrap_err().code(), Code::BadFd);
    }

    #[test]
    fn unlink_removes_directory_entry() {
        let mut fs = fresh_fs();
        fs.attach(0);
        fs.open(0, "/a", OpenFlags::CREATE).unwrap();
        fs.unlink(0, "/a").unwrap();
        let err = fs.open(0, "/a", OpenFlags::READ).unwrap_err();
        assert_eq!(err.code(), Code::NoEnt);
    }

    #[test]
    fn stat_reports_size_and_links() {
        let mut fs = fresh_fs();
        fs.attach(0);
        let fd = fs
            .open(0, "/a", OpenFlags::CREATE | OpenFlags::WRITE)
            .unwrap();
        fs.write(0, fd, b"1234567").unwrap();
        fs.close(0, fd).unwrap();
        let st = fs.stat(0, "/a").unwrap();
        assert_eq!(st.size, 7);
        assert_eq!(st.nlinks, 1);
    }

    #[test]
    fn seek_end_then_append_read() {
        let mut fs = fresh_fs();
        fs.attach(0);
        let fd = fs
            .open(0, "/a", OpenFlags::CREATE | OpenFlags::WRITE)
            .unwrap();
        fs.write(0, fd, b"abc").unwrap();
        fs.seek(0, fd, 0, Whence::Set).unwrap();
        let mut buf = [0u8; 3];
        fs.read(0, fd, &mut buf).unwrap();
        assert_eq!(&buf, b"abc");
        fs.close(0, fd).unwrap();
    }

    #[test]
    fn dot_and_dotdot_resolve_to_root() {
        let mut fs = fresh_fs();
        fs.attach(0);
        let st_dot = fs.stat(0, "/.").unwrap();
        let st_dotdot = fs.stat(0, "/..").unwrap();
        assert_eq!(st_dot.inode_num, Superblock::ROOT_INODE);
        assert_eq!(st_dotdot.inode_num, Superblock::ROOT_INODE);
    }

    #[test]
    fn unmount_flushes_dirty_state_without_error() {
        let mut fs = fresh_fs();
        fs.attach(0);
        let fd = fs
            .open(0, "/a", OpenFlags::CREATE | OpenFlags::WRITE)
            .unwrap();
        fs.write(0, fd, b"persisted").unwrap();
        fs.close(0, fd).unwrap();
        fs.unmount().unwrap();
    }

    #[test]
    fn write_past_direct_zones_reads_back() {
        // writes at byte offset 8*BLOCK_SIZE, one zone beyond the 7
        // direct zones `MINIX_NR_DZONES` holds, so this only succeeds if
        // the indirect block is wired up.
        let mut fs = fresh_fs();
        fs.attach(0);
        let fd = fs
            .open(0, "/disk", OpenFlags::CREATE | OpenFlags::READ | OpenFlags::WRITE)
            .unwrap();

        let offset = 8 * BLOCK_SIZE as i64;
        fs.seek(0, fd, offset, Whence::Set).unwrap();
        let written = fs.write(0, fd, &[1u8; 512]).unwrap();
        assert_eq!(written, 512);

        fs.seek(0, fd, offset, Whence::Set).unwrap();
        let mut buf = [0u8; 512];
        let read = fs.read(0, fd, &mut buf).unwrap();
        assert_eq!(read, 512);
        assert!(buf.iter().all(|&b| b == 1));
        fs.close(0, fd).unwrap();
    }

    #[test]
    fn write_spanning_indirect_zones_preserves_earlier_content() {
        let mut fs = fresh_fs();
        fs.attach(0);
        let fd = fs
            .open(0, "/b", OpenFlags::CREATE | OpenFlags::WRITE | OpenFlags::READ)
            .unwrap();
        // first populate a direct zone, then jump past it into the
        // indirect range, leaving a hole in between.
        fs.write(0, fd, b"direct").unwrap();
        fs.seek(0, fd, 10 * BLOCK_SIZE as i64, Whence::Set).unwrap();
        fs.write(0, fd, b"indirect").unwrap();
        fs.close(0, fd).unwrap();

        let fd2 = fs.open(0, "/b", OpenFlags::READ).unwrap();
        let mut buf = [0u8; 6];
        fs.read(0, fd2, &mut buf).unwrap();
        assert_eq!(&buf, b"direct");
        fs.seek(0, fd2, 10 * BLOCK_SIZE as i64, Whence::Set).unwrap();
        let mut buf2 = [0u8; 8];
        fs.read(0, fd2, &mut buf2).unwrap();
        assert_eq!(&buf2, b"indirect");
    }

    #[test]
    fn write_beyond_max_size_is_efbig() {
        let mut fs = fresh_fs();
        fs.attach(0);
        let fd = fs.open(0, "/huge", OpenFlags::CREATE | OpenFlags::WRITE).unwrap();
        let max_size = fs.superblock.max_size as i64;
        fs.seek(0, fd, max_size, Whence::Set).unwrap();
        let err = fs.write(0, fd, &[1u8; 1]).unwrap_err();
        assert_eq!(err.code(), Code::TooBig);
    }

    #[test]
    fn unlink_frees_indirect_zones() {
        let mut fs = fresh_fs();
        fs.attach(0);
        let fd = fs
            .open(0, "/c", OpenFlags::CREATE | OpenFlags::WRITE)
            .unwrap();
        fs.seek(0, fd, 9 * BLOCK_SIZE as i64, Whence::Set).unwrap();
        fs.write(0, fd, b"zz").unwrap();
        fs.close(0, fd).unwrap();
        fs.unlink(0, "/c").unwrap();

        // a fresh file should be able to reuse those same zones.
        let fd2 = fs
            .open(0, "/d", OpenFlags::CREATE | OpenFlags::WRITE)
            .unwrap();
        fs.seek(0, fd2, 9 * BLOCK_SIZE as i64, Whence::Set).unwrap();
        fs.write(0, fd2, b"zz").unwrap();
        fs.close(0, fd2).unwrap();
    }
}
