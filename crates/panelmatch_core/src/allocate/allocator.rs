//! Round-robin allocator with a hard per-provider capacity.
//!
//! # Invariants
//! - Pool order is fixed at construction and defines the probe cycle.
//! - Every pool member has a counter from the start; there is no lazy zero.
//! - `allocate` stops after one full cycle, so it always terminates.

use crate::model::roster::ProviderId;
use log::{trace, warn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::num::NonZeroU32;

/// Outcome of one allocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// A provider under capacity was found and its load incremented.
    Assigned { provider: ProviderId, probes: usize },
    /// Every provider was probed once and all were at capacity.
    Exhausted { probes: usize },
}

impl Allocation {
    pub fn probes(&self) -> usize {
        match self {
            Self::Assigned { probes, .. } | Self::Exhausted { probes } => *probes,
        }
    }

    pub fn provider(&self) -> Option<ProviderId> {
        match self {
            Self::Assigned { provider, .. } => Some(*provider),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Owns the cursor and load counters for one assignment run.
#[derive(Debug, Clone)]
pub struct RoundRobinAllocator {
    pool: Vec<ProviderId>,
    slots: HashMap<ProviderId, usize>,
    loads: Vec<u32>,
    cursor: usize,
    capacity: NonZeroU32,
}

impl RoundRobinAllocator {
    /// Builds an allocator over `pool` in the given order.
    ///
    /// Repeated ids are collapsed to their first occurrence so one cycle visits
    /// each provider exactly once.
    pub fn new(pool: impl IntoIterator<Item = ProviderId>, capacity: NonZeroU32) -> Self {
        let mut seen = HashSet::new();
        let mut duplicates = 0usize;
        let pool: Vec<ProviderId> = pool
            .into_iter()
            .filter(|id| {
                let fresh = seen.insert(*id);
                if !fresh {
                    duplicates += 1;
                }
                fresh
            })
            .collect();

        if duplicates > 0 {
            warn!(
                "event=allocator_init module=allocate status=ok duplicate_provider_ids={duplicates} pool_size={}",
                pool.len()
            );
        }

        let slots = pool
            .iter()
            .enumerate()
            .map(|(slot, id)| (*id, slot))
            .collect();
        let loads = vec![0; pool.len()];

        Self {
            pool,
            slots,
            loads,
            cursor: 0,
            capacity,
        }
    }

    /// Seeds counters with load that already exists outside this run.
    ///
    /// Ids outside the pool are ignored. Values above capacity are clamped,
    /// which leaves that provider full for the whole run.
    pub fn with_existing_load(mut self, existing: &BTreeMap<ProviderId, u32>) -> Self {
        let capacity = self.capacity.get();
        for (id, load) in existing {
            let Some(&slot) = self.slots.get(id) else {
                continue;
            };
            if *load > capacity {
                warn!(
                    "event=allocator_seed module=allocate status=ok provider_id={id} existing_load={load} capacity={capacity} clamped=true"
                );
            }
            self.loads[slot] = (*load).min(capacity);
        }
        self
    }

    /// Tries to place one eligible patient.
    ///
    /// Probes start at the shared cursor and advance it, wrapping at the end
    /// of the pool. At most `pool_len()` providers are probed.
    pub fn allocate(&mut self) -> Allocation {
        let len = self.pool.len();
        let capacity = self.capacity.get();
        let mut probes = 0;

        while probes < len {
            let slot = self.cursor;
            self.cursor = (self.cursor + 1) % len;
            probes += 1;

            if self.loads[slot] < capacity {
                self.loads[slot] += 1;
                return Allocation::Assigned {
                    provider: self.pool[slot],
                    probes,
                };
            }
        }

        trace!("event=allocate module=allocate status=exhausted probes={probes}");
        Allocation::Exhausted { probes }
    }

    pub fn capacity(&self) -> NonZeroU32 {
        self.capacity
    }

    /// Providers in cycle order.
    pub fn pool(&self) -> &[ProviderId] {
        &self.pool
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// Slot that the next probe will visit.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Current load, or `None` for providers outside the pool.
    pub fn load_of(&self, provider: ProviderId) -> Option<u32> {
        self.slots.get(&provider).map(|slot| self.loads[*slot])
    }

    /// `(provider, load)` pairs in cycle order.
    pub fn loads(&self) -> Vec<(ProviderId, u32)> {
        self.pool
            .iter()
            .copied()
            .zip(self.loads.iter().copied())
            .collect()
    }

    /// Open slots left across the pool.
    pub fn remaining_capacity(&self) -> u64 {
        let capacity = u64::from(self.capacity.get());
        self.loads
            .iter()
            .map(|load| capacity - u64::from(*load))
            .sum()
    }

    pub fn is_saturated(&self) -> bool {
        self.remaining_capacity() == 0
    }

    /// Zeroes every counter and rewinds the cursor.
    pub fn reset(&mut self) {
        self.loads.iter_mut().for_each(|load| *load = 0);
        self.cursor = 0;
    }
}
