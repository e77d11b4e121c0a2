//! Allocation of interactive entry ids within one gump instance.

use crate::error::*;
use std::collections::HashSet;
use rand::Rng;
use rand_pcg::Pcg64Mcg;


/// Largest id handed out under macro protection. Replies carry ids the client
/// echoes back, and the macro-protected range is what scripts would have to
/// guess from.
pub const MACRO_ID_MAX: i32 = 0xffff;

/// Number of random draws before a macro-protected allocation gives up.
pub const MAX_RANDOM_ATTEMPTS: usize = 4096;


/// Id of an interactive entry (button, checkbox, radio, text field), unique
/// within one gump instance. This is what the client echoes back in replies.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct EntryId(pub i32);

/// How fresh ids are chosen.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum IdPolicy {
    /// 1, 2, 3, ... skipping anything already taken.
    Sequential,
    /// Pseudo-random in `1..=MACRO_ID_MAX`, so client-side scripts can't
    /// hard-code ids.
    MacroProtected,
}

/// Per-instance id allocator. Never hands out an id that is currently live.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    policy: IdPolicy,
    // next candidate for sequential allocation
    next: i32,
    // ids currently reserved by some node of the instance
    live: HashSet<EntryId>,
    // total number of ids ever handed out or reserved
    allocated: u64,
    rng: Pcg64Mcg,
}

impl IdAllocator {
    /// Construct with the given policy and random seed. The seed only matters
    /// for macro-protected allocation.
    pub fn new(policy: IdPolicy, seed: u128) -> Self {
        IdAllocator {
            policy,
            next: 1,
            live: HashSet::new(),
            allocated: 0,
            rng: Pcg64Mcg::new(seed),
        }
    }

    pub fn policy(&self) -> IdPolicy {
        self.policy
    }

    /// Change policy. Only affects ids allocated from now on.
    pub fn set_policy(&mut self, policy: IdPolicy) {
        self.policy = policy;
    }

    /// Allocate a fresh id according to the active policy.
    pub fn allocate(&mut self) -> Result<EntryId> {
        let id = match self.policy {
            IdPolicy::Sequential => self.next_sequential()?,
            IdPolicy::MacroProtected => self.next_random()?,
        };
        self.live.insert(id);
        self.allocated += 1;
        Ok(id)
    }

    /// Reserve an id chosen explicitly by content code.
    pub fn reserve(&mut self, id: EntryId) -> Result<()> {
        ensure!(!self.live.contains(&id), ApiUsage, "entry id {} is already in use", id.0);
        self.live.insert(id);
        self.allocated += 1;
        Ok(())
    }

    /// Make an id available again.
    pub fn release(&mut self, id: EntryId) {
        self.live.remove(&id);
    }

    pub fn is_live(&self, id: EntryId) -> bool {
        self.live.contains(&id)
    }

    /// Number of ids currently live.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Number of ids ever allocated or reserved.
    pub fn allocated(&self) -> u64 {
        self.allocated
    }

    fn next_sequential(&mut self) -> Result<EntryId> {
        loop {
            ensure!(self.next < i32::MAX, IdsExhausted, "sequential entry ids exhausted");
            let id = EntryId(self.next);
            self.next += 1;
            if !self.live.contains(&id) {
                return Ok(id);
            }
        }
    }

    fn next_random(&mut self) -> Result<EntryId> {
        for _ in 0..MAX_RANDOM_ATTEMPTS {
            let id = EntryId(self.rng.gen_range(1..=MACRO_ID_MAX));
            if !self.live.contains(&id) {
                return Ok(id);
            }
        }
        bail!(
            IdsExhausted,
            "no free macro-protected id after {} attempts ({} live)",
            MAX_RANDOM_ATTEMPTS,
            self.live.len(),
        );
    }
}


#[test]
fn test_sequential_skips_reserved() {
    let mut ids = IdAllocator::new(IdPolicy::Sequential, 0);
    ids.reserve(EntryId(2)).unwrap();
    assert_eq!(ids.allocate().unwrap(), EntryId(1));
    assert_eq!(ids.allocate().unwrap(), EntryId(3));
    assert_eq!(ids.allocate().unwrap(), EntryId(4));
    assert_eq!(ids.allocated(), 4);
}

#[test]
fn test_reserve_duplicate_fails() {
    let mut ids = IdAllocator::new(IdPolicy::Sequential, 0);
    let id = ids.allocate().unwrap();
    let e = ids.reserve(id).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ApiUsage);
    ids.release(id);
    ids.reserve(id).unwrap();
}

#[test]
fn test_macro_protected_never_repeats_live() {
    let mut ids = IdAllocator::new(IdPolicy::MacroProtected, 0x5eed_5eed_5eed);
    let mut seen = HashSet::new();
    for _ in 0..10_000 {
        let id = ids.allocate().unwrap();
        assert!(id.0 >= 1 && id.0 <= MACRO_ID_MAX);
        assert!(seen.insert(id), "repeated live id {:?}", id);
    }
    assert_eq!(ids.live_count(), 10_000);
}

#[test]
fn test_macro_protected_exhaustion_is_error() {
    let mut ids = IdAllocator::new(IdPolicy::MacroProtected, 7);
    for n in 1..=MACRO_ID_MAX {
        ids.reserve(EntryId(n)).unwrap();
    }
    assert_eq!(ids.allocate().unwrap_err().kind(), ErrorKind::IdsExhausted);
}
