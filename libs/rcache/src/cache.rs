// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

use std::collections::HashMap;

use nvx_base::limits::{NULL_PAGE, PAGE_SIZE, RCACHE_LENGTH};
use nvx_base::{Code, Error, Result};

use crate::backend::RmemBackend;
use crate::policy::{LineView, PolicyKind};

struct Line {
    page_number: Option<u32>,
    frame: Box<[u8; PAGE_SIZE]>,
    dirty: bool,
    refcount: u32,
    age: u64,
    strike: i32,
}

impl Line {
    fn empty() -> Self {
        Line {
            page_number: None,
            frame: Box::new([0u8; PAGE_SIZE]),
            dirty: false,
            refcount: 0,
            age: 0,
            strike: 0,
        }
    }
}

/// Fixed-length associative cache of remote pages (spec §4.7).
///
/// A page number appears in at most one line (spec §3 invariant). The
/// cache is used from a single-threaded context (spec §5), so the "at
/// most one in-flight fetch per page number" guarantee in spec §4.7 falls
/// out of serial execution rather than needing explicit coalescing logic.
pub struct PageCache<B: RmemBackend> {
    backend: B,
    lines: Vec<Line>,
    index: HashMap<u32, usize>,
    policy: PolicyKind,
    clock: u64,
}

impl<B: RmemBackend> PageCache<B> {
    pub fn new(backend: B) -> Self {
        Self::with_capacity(backend, RCACHE_LENGTH)
    }

    pub fn with_capacity(backend: B, capacity: usize) -> Self {
        PageCache {
            backend,
            lines: (0..capacity).map(|_| Line::empty()).collect(),
            index: HashMap::new(),
            policy: PolicyKind::Fifo,
            clock: 0,
        }
    }

    /// Atomically switches the active replacement policy. Existing lines
    /// retain their current metadata (spec §4.7).
    pub fn select_replacement_policy(&mut self, policy: PolicyKind) {
        self.policy = policy;
    }

    pub fn policy(&self) -> PolicyKind {
        self.policy
    }

    /// Delegates to RMem; returns the new page number.
    pub fn alloc(&mut self) -> Result<u32> {
        self.backend.alloc()
    }

    /// Invalidates any cached copy of `n` without write-back (the page is
    /// being discarded remotely), then frees it.
    pub fn free(&mut self, n: u32) -> Result<()> {
        if let Some(idx) = self.index.remove(&n) {
            self.lines[idx] = Line::empty();
        }
        self.backend.free(n)
    }

    fn tick_clock(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Advances every AGING line's shift register by one tick. A no-op
    /// under any other policy (spec §4.7: "per-tick shift-register").
    pub fn tick(&mut self) {
        if self.policy == PolicyKind::Aging {
            for line in &mut self.lines {
                if line.page_number.is_some() {
                    line.age = self.policy.tick(line.age);
                }
            }
        }
    }

    fn candidates(&self) -> Vec<LineView> {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.page_number.is_some())
            .map(|(i, l)| LineView {
                index: i,
                refcount: l.refcount,
                age: l.age,
            })
            .collect()
    }

    fn free_slot(&self) -> Option<usize> {
        self.lines.iter().position(|l| l.page_number.is_none())
    }

    fn write_back(&mut self, idx: usize) -> Result<()> {
        let line = &self.lines[idx];
        if line.dirty {
            let page = line.page_number.expect("write_back on empty line");
            self.backend.write(page, line.frame.as_slice())?;
        }
        Ok(())
    }

    fn fill(&mut self, idx: usize, n: u32) -> Result<()> {
        self.backend.read(n, self.lines[idx].frame.as_mut_slice())?;
        Ok(())
    }

    /// Returns a mutable view of page `n`'s frame, fetching it (and
    /// possibly evicting a victim) if not already cached.
    pub fn get(&mut self, n: u32) -> Result<&mut [u8]> {
        if n == NULL_PAGE {
            return Err(Error::new(Code::Inval));
        }

        if self.policy == PolicyKind::Bypass {
            return self.get_bypass(n);
        }

        let idx = if let Some(&idx) = self.index.get(&n) {
            idx
        }
        else {
            let idx = match self.free_slot() {
                Some(idx) => idx,
                None => {
                    let victim = self
                        .policy
                        .pick_victim(&self.candidates())
                        .ok_or_else(|| Error::new(Code::Busy))?;
                    self.write_back(victim)?;
                    if let Some(old_page) = self.lines[victim].page_number {
                        self.index.remove(&old_page);
                    }
                    victim
                },
            };
            self.fill(idx, n)?;
            let clock = self.tick_clock();
            let line = &mut self.lines[idx];
            line.page_number = Some(n);
            line.dirty = false;
            line.refcount = 0;
            line.strike = 0;
            line.age = self.policy.age_on_insert(clock);
            self.index.insert(n, idx);
            idx
        };

        let clock = self.tick_clock();
        let line = &mut self.lines[idx];
        line.refcount += 1;
        line.age = self.policy.age_on_access(line.age, clock);
        // the caller receives a mutable pointer: conservatively assume it
        // may write through it, the same way BYPASS always writes back.
        line.dirty = true;
        Ok(line.frame.as_mut_slice())
    }

    fn get_bypass(&mut self, n: u32) -> Result<&mut [u8]> {
        // exactly one line is used as a transfer buffer under BYPASS.
        if self.lines.is_empty() {
            return Err(Error::new(Code::Busy));
        }
        let idx = 0;
        self.fill(idx, n)?;
        let line = &mut self.lines[idx];
        line.page_number = Some(n);
        line.dirty = true;
        line.refcount = 1;
        Ok(line.frame.as_mut_slice())
    }

    /// Decrements the refcount of the line holding `n`. If `strike != 0`,
    /// records a policy-dependent eviction-bias hint. Under BYPASS, writes
    /// back immediately and invalidates.
    pub fn put(&mut self, n: u32, strike: i32) -> Result<()> {
        if self.policy == PolicyKind::Bypass {
            if let Some(idx) = self.lines.iter().position(|l| l.page_number == Some(n)) {
                self.write_back(idx)?;
                self.lines[idx] = Line::empty();
            }
            return Ok(());
        }

        let idx = self
            .index
            .get(&n)
            .copied()
            .ok_or_else(|| Error::new(Code::NoEnt))?;
        let line = &mut self.lines[idx];
        if line.refcount > 0 {
            line.refcount -= 1;
        }
        if strike != 0 {
            line.strike = strike;
        }
        Ok(())
    }

    /// Flushes every dirty line back to RMem without evicting it. Used by
    /// runtime teardown (spec §4.10).
    pub fn flush_all(&mut self) -> Result<()> {
        for idx in 0..self.lines.len() {
            self.write_back(idx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryRmem;

    fn cache_with(policy: PolicyKind, capacity: usize) -> PageCache<InMemoryRmem> {
        let mut cache = PageCache::with_capacity(InMemoryRmem::new(), capacity);
        cache.select_replacement_policy(policy);
        cache
    }

    #[test]
    fn read_own_writes_across_policies() {
        for policy in [
            PolicyKind::Fifo,
            PolicyKind::Lru,
            PolicyKind::Nfu,
            PolicyKind::Aging,
        ] {
            let mut cache = cache_with(policy, 4);
            let n = cache.alloc().unwrap();
            {
                let p = cache.get(n).unwrap();
                p[0] = 0xA5;
                p[4095] = 0xA5;
            }
            cache.put(n, 0).unwrap();
            let p2 = cache.get(n).unwrap();
            assert_eq!(p2[0], 0xA5);
            assert_eq!(p2[4095], 0xA5);
        }
    }

    #[test]
    fn bypass_writes_back_immediately() {
        let mut cache = cache_with(PolicyKind::Bypass, 1);
        let n = cache.alloc().unwrap();
        {
            let p = cache.get(n).unwrap();
            p[0] = 7;
        }
        cache.put(n, 0).unwrap();
        // re-fetch from the (now updated) backend directly
        let p2 = cache.get(n).unwrap();
        assert_eq!(p2[0], 7);
    }

    #[test]
    fn rcache_put_leaves_refcount_balanced() {
        let mut cache = cache_with(PolicyKind::Lru, 2);
        let n = cache.alloc().unwrap();
        cache.get(n).unwrap();
        cache.put(n, 0).unwrap();
        // a further put on an already-zero refcount must not panic or
        // underflow
        let idx = *cache.index.get(&n).unwrap();
        assert_eq!(cache.lines[idx].refcount, 0);
    }

    #[test]
    fn pinned_line_cannot_be_evicted() {
        let mut cache = cache_with(PolicyKind::Fifo, 1);
        let a = cache.alloc().unwrap();
        let b = cache.alloc().unwrap();
        cache.get(a).unwrap(); // refcount now 1, never put back
        let err = cache.get(b).unwrap_err();
        assert_eq!(err.code(), Code::Busy);
    }

    #[test]
    fn fifo_evicts_oldest_insertion_even_after_access() {
        let mut cache = cache_with(PolicyKind::Fifo, 2);
        let a = cache.alloc().unwrap();
        let b = cache.alloc().unwrap();
        cache.get(a).unwrap();
        cache.put(a, 0).unwrap();
        cache.get(b).unwrap();
        cache.put(b, 0).unwrap();
        // access `a` again; FIFO must not treat this as a re-insertion
        cache.get(a).unwrap();
        cache.put(a, 0).unwrap();

        let c = cache.alloc().unwrap();
        cache.get(c).unwrap(); // forces an eviction
        cache.put(c, 0).unwrap();

        // `a` was inserted first, so it should have been evicted, not `b`
        assert!(!cache.index.contains_key(&a));
        assert!(cache.index.contains_key(&b));
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let mut cache = cache_with(PolicyKind::Lru, 2);
        let a = cache.alloc().unwrap();
        let b = cache.alloc().unwrap();
        cache.get(a).unwrap();
        cache.put(a, 0).unwrap();
        cache.get(b).unwrap();
        cache.put(b, 0).unwrap();
        // touch `a` again, making `b` the least recently used
        cache.get(a).unwrap();
        cache.put(a, 0).unwrap();

        let c = cache.alloc().unwrap();
        cache.get(c).unwrap();
        cache.put(c, 0).unwrap();

        assert!(!cache.index.contains_key(&b));
        assert!(cache.index.contains_key(&a));
    }

    #[test]
    fn alloc_on_exhausted_backend_propagates_error() {
        struct AlwaysFull;
        impl RmemBackend for AlwaysFull {
            fn alloc(&mut self) -> Result<u32> {
                Err(Error::new(Code::NoMem))
            }
            fn free(&mut self, _page: u32) -> Result<()> {
                Ok(())
            }
            fn read(&mut self, _page: u32, _buf: &mut [u8]) -> Result<()> {
                Ok(())
            }
            fn write(&mut self, _page: u32, _buf: &[u8]) -> Result<()> {
                Ok(())
            }
        }
        let mut cache = PageCache::with_capacity(AlwaysFull, 1);
        assert_eq!(cache.alloc().unwrap_err().code(), Code::NoMem);
    }
}
