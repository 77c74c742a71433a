// Copyright (c) 2011-2026 The Maintainers of Nanvix
//
// Licensed under the MIT License.

//! Replacement policies for the page cache (spec §4.7).
//!
//! A tagged variant with a uniform capability set, per spec §9's guidance
//! for dispatching over the block-device/replacement-policy axis: each
//! policy picks a victim among the candidate lines and reuses the single
//! `age` field of spec §3's cache-line struct for a different purpose.

/// The five policies named in spec §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Disables caching: every `get` fetches, every `put` writes back.
    Bypass,
    /// Victim = smallest insertion age.
    Fifo,
    /// Victim = smallest last-access age.
    Lru,
    /// Victim = smallest historical use counter.
    Nfu,
    /// Victim = smallest per-tick shift-register counter.
    Aging,
}

/// What a policy needs to see of one cache line to score it as an
/// eviction candidate. Deliberately minimal: policies never need the
/// frame bytes themselves.
#[derive(Debug, Clone, Copy)]
pub struct LineView {
    pub index: usize,
    pub refcount: u32,
    pub age: u64,
}

impl PolicyKind {
    /// Picks a victim among `candidates`, tie-breaking by lowest slot
    /// index (spec §4.7: "tie-break by lowest slot index"). Lines with
    /// `refcount > 0` must already be excluded by the caller (spec §4.7:
    /// "Refcount-held lines are never victimized").
    pub fn pick_victim(self, candidates: &[LineView]) -> Option<usize> {
        candidates
            .iter()
            .filter(|l| l.refcount == 0)
            .min_by_key(|l| (l.age, l.index))
            .map(|l| l.index)
    }

    /// Value to stamp into a line's `age` field the moment it is filled
    /// with a freshly fetched page, given the current logical clock.
    pub fn age_on_insert(self, clock: u64) -> u64 {
        match self {
            // FIFO wants insertion order; LRU/NFU/AGING all start a fresh
            // line at the current clock value too (NFU/AGING then only
            // grow from here via note_access/tick).
            PolicyKind::Bypass
            | PolicyKind::Fifo
            | PolicyKind::Lru
            | PolicyKind::Nfu
            | PolicyKind::Aging => clock,
        }
    }

    /// New `age` value for a line that was just accessed via `get`, given
    /// its current age and the current logical clock.
    pub fn age_on_access(self, current_age: u64, clock: u64) -> u64 {
        match self {
            // FIFO's age is fixed at insertion time; later accesses must
            // not move it, or the policy degenerates into LRU.
            PolicyKind::Bypass | PolicyKind::Fifo => current_age,
            PolicyKind::Lru => clock,
            // NFU: a monotonically increasing historical use counter.
            PolicyKind::Nfu => current_age + 1,
            // AGING: set the high bit of the shift register on access.
            PolicyKind::Aging => current_age | Self::AGING_HIGH_BIT,
        }
    }

    const AGING_HIGH_BIT: u64 = 1 << 63;

    /// Advances the per-tick shift register for AGING lines. A no-op for
    /// every other policy.
    pub fn tick(self, current_age: u64) -> u64 {
        match self {
            PolicyKind::Aging => current_age >> 1,
            _ => current_age,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(index: usize, refcount: u32, age: u64) -> LineView {
        LineView {
            index,
            refcount,
            age,
        }
    }

    #[test]
    fn victim_ties_broken_by_lowest_index() {
        let candidates = [view(2, 0, 5), view(0, 0, 5), view(1, 0, 5)];
        assert_eq!(PolicyKind::Lru.pick_victim(&candidates), Some(0));
    }

    #[test]
    fn pinned_lines_are_never_victims() {
        let candidates = [view(0, 1, 0), view(1, 0, 10)];
        assert_eq!(PolicyKind::Lru.pick_victim(&candidates), Some(1));
    }

    #[test]
    fn no_candidates_means_no_victim() {
        let candidates = [view(0, 1, 0), view(1, 2, 0)];
        assert_eq!(PolicyKind::Fifo.pick_victim(&candidates), None);
    }

    #[test]
    fn fifo_age_is_stable_across_accesses() {
        assert_eq!(PolicyKind::Fifo.age_on_access(3, 99), 3);
    }

    #[test]
    fn nfu_counter_grows_monotonically() {
        let mut age = PolicyKind::Nfu.age_on_insert(0);
        for _ in 0..5 {
            age = PolicyKind::Nfu.age_on_access(age, 0);
        }
        assert_eq!(age, 5);
    }

    #[test]
    fn aging_shift_register_decays_over_ticks() {
        let age = PolicyKind::Aging.age_on_access(0, 0);
        assert_eq!(age, PolicyKind::AGING_HIGH_BIT);
        let decayed = PolicyKind::Aging.tick(age);
        assert_eq!(decayed, PolicyKind::AGING_HIGH_BIT >> 1);
    }
}
