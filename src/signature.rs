//! Archetype signatures: bitsets over component type ids.
//!
//! A [`Signature`] is a variable-length bitset backed by 64-bit limbs.
//! `with`/`without` return new signatures and never mutate the receiver.
//! Two signatures are equal iff they represent the same id set, regardless
//! of trailing zero limbs, and equal signatures hash equal.
//!
//! Limb buffers are rented from a thread-local pool bucketed by power of
//! two up to [`POOL_MAX_LIMBS`] limbs, so the structural-mutation hot path
//! does not touch the heap once warm. Buffers return to the pool when a
//! signature is dropped; archetypes hold their own copy.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::registry::ComponentId;

const LIMB_BITS: usize = 64;

/// Largest pooled buffer, in limbs (2048 component ids). Bigger signatures
/// fall back to plain allocation.
const POOL_MAX_LIMBS: usize = 32;

/// Buckets for 1, 2, 4, 8, 16 and 32 limbs.
const POOL_BUCKETS: usize = 6;

/// Retained buffers per bucket; excess is dropped.
const POOL_BUCKET_DEPTH: usize = 32;

struct LimbPool {
    buckets: [Vec<Vec<u64>>; POOL_BUCKETS],
}

thread_local! {
    static LIMB_POOL: RefCell<LimbPool> = RefCell::new(LimbPool {
        buckets: [const { Vec::new() }; POOL_BUCKETS],
    });
}

impl LimbPool {
    fn bucket_for_len(limbs: usize) -> Option<usize> {
        if limbs == 0 || limbs > POOL_MAX_LIMBS {
            return None;
        }
        Some(limbs.next_power_of_two().trailing_zeros() as usize)
    }

    fn bucket_for_capacity(capacity: usize) -> Option<usize> {
        if capacity == 0 {
            return None;
        }
        let floor = usize::BITS - 1 - capacity.leading_zeros();
        Some((floor as usize).min(POOL_BUCKETS - 1))
    }

    fn rent(&mut self, limbs: usize) -> Vec<u64> {
        match Self::bucket_for_len(limbs) {
            Some(bucket) => {
                let mut buf = self.buckets[bucket]
                    .pop()
                    .unwrap_or_else(|| Vec::with_capacity(1 << bucket));
                buf.clear();
                buf.resize(limbs, 0);
                buf
            }
            None => vec![0; limbs],
        }
    }

    fn give_back(&mut self, buf: Vec<u64>) {
        if let Some(bucket) = Self::bucket_for_capacity(buf.capacity()) {
            let slot = &mut self.buckets[bucket];
            if slot.len() < POOL_BUCKET_DEPTH {
                slot.push(buf);
            }
        }
    }
}

fn rent(limbs: usize) -> Vec<u64> {
    LIMB_POOL
        .try_with(|pool| pool.borrow_mut().rent(limbs))
        .unwrap_or_else(|_| vec![0; limbs])
}

/// A set of component type ids; the identity of an archetype.
pub struct Signature {
    limbs: Vec<u64>,
}

impl Signature {
    /// The empty signature (no component types).
    pub const fn empty() -> Self {
        Signature { limbs: Vec::new() }
    }

    /// Returns a new signature with the bit for `id` set.
    pub fn with(&self, id: ComponentId) -> Signature {
        let word = id.index() / LIMB_BITS;
        let len = self.limbs.len().max(word + 1);
        let mut limbs = rent(len);
        limbs[..self.limbs.len()].copy_from_slice(&self.limbs);
        limbs[word] |= 1 << (id.index() % LIMB_BITS);
        Signature { limbs }
    }

    /// Returns a new signature with the bit for `id` cleared.
    pub fn without(&self, id: ComponentId) -> Signature {
        let mut next = self.clone();
        let word = id.index() / LIMB_BITS;
        if word < next.limbs.len() {
            next.limbs[word] &= !(1 << (id.index() % LIMB_BITS));
        }
        next
    }

    /// Whether the bit for `id` is set.
    #[inline]
    pub fn has(&self, id: ComponentId) -> bool {
        let word = id.index() / LIMB_BITS;
        match self.limbs.get(word) {
            Some(&limb) => limb & (1 << (id.index() % LIMB_BITS)) != 0,
            None => false,
        }
    }

    /// Whether no bit is set.
    pub fn is_empty(&self) -> bool {
        self.limbs.iter().all(|&limb| limb == 0)
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.limbs.iter().map(|limb| limb.count_ones() as usize).sum()
    }

    /// Whether every bit of `other` is also set in `self`.
    pub fn is_superset_of(&self, other: &Signature) -> bool {
        for (word, &limb) in other.limbs.iter().enumerate() {
            let own = self.limbs.get(word).copied().unwrap_or(0);
            if limb & !own != 0 {
                return false;
            }
        }
        true
    }

    /// Whether `self` and `other` share at least one bit. Short-circuits on
    /// the first non-zero AND.
    pub fn has_intersection(&self, other: &Signature) -> bool {
        let len = self.limbs.len().min(other.limbs.len());
        for word in 0..len {
            if self.limbs[word] & other.limbs[word] != 0 {
                return true;
            }
        }
        false
    }

    /// Iterator over set ids, ascending.
    pub fn ones(&self) -> OnesIter<'_> {
        OnesIter {
            limbs: &self.limbs,
            word: 0,
            current: self.limbs.first().copied().unwrap_or(0),
        }
    }

    /// Stable FNV-1a fold over the significant limbs. Trailing zero limbs do
    /// not influence the hash, so `hash(a) == hash(b)` whenever `a == b`.
    pub fn fnv_hash(&self) -> u64 {
        const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
        let mut hash = FNV_OFFSET;
        for &limb in self.significant() {
            for byte in limb.to_le_bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(FNV_PRIME);
            }
        }
        hash
    }

    /// The limbs with trailing zeros trimmed; the canonical form used by
    /// equality and hashing.
    fn significant(&self) -> &[u64] {
        let mut len = self.limbs.len();
        while len > 0 && self.limbs[len - 1] == 0 {
            len -= 1;
        }
        &self.limbs[..len]
    }
}

impl Default for Signature {
    fn default() -> Self {
        Signature::empty()
    }
}

impl Clone for Signature {
    fn clone(&self) -> Self {
        let mut limbs = rent(self.limbs.len());
        limbs.copy_from_slice(&self.limbs);
        Signature { limbs }
    }
}

impl Drop for Signature {
    fn drop(&mut self) {
        let limbs = std::mem::take(&mut self.limbs);
        if limbs.capacity() == 0 {
            return;
        }
        // Ignore TLS teardown; the buffer just drops normally then.
        let _ = LIMB_POOL.try_with(|pool| pool.borrow_mut().give_back(limbs));
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Signature) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for Signature {}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let significant = self.significant();
        state.write_usize(significant.len());
        for &limb in significant {
            state.write_u64(limb);
        }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ones()).finish()
    }
}

/// Iterator over the set bits of a signature.
pub struct OnesIter<'a> {
    limbs: &'a [u64],
    word: usize,
    current: u64,
}

impl<'a> Iterator for OnesIter<'a> {
    type Item = ComponentId;

    fn next(&mut self) -> Option<ComponentId> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(ComponentId::from_index(self.word * LIMB_BITS + bit));
            }
            self.word += 1;
            if self.word >= self.limbs.len() {
                return None;
            }
            self.current = self.limbs[self.word];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index: usize) -> ComponentId {
        ComponentId::from_index(index)
    }

    #[test]
    fn with_and_without_do_not_mutate() {
        let a = Signature::empty().with(id(3));
        let b = a.with(id(70));
        assert!(a.has(id(3)));
        assert!(!a.has(id(70)));
        assert!(b.has(id(3)));
        assert!(b.has(id(70)));

        let c = b.without(id(3));
        assert!(b.has(id(3)));
        assert!(!c.has(id(3)));
        assert!(c.has(id(70)));
    }

    #[test]
    fn equality_ignores_trailing_zero_limbs() {
        let short = Signature::empty().with(id(1));
        let long = Signature::empty().with(id(1)).with(id(200)).without(id(200));
        assert!(long.limbs.len() > short.limbs.len());
        assert_eq!(short, long);
        assert_eq!(short.fnv_hash(), long.fnv_hash());
    }

    #[test]
    fn superset_and_intersection() {
        let ab = Signature::empty().with(id(0)).with(id(65));
        let a = Signature::empty().with(id(0));
        let c = Signature::empty().with(id(2));

        assert!(ab.is_superset_of(&a));
        assert!(!a.is_superset_of(&ab));
        assert!(ab.is_superset_of(&Signature::empty()));
        assert!(ab.has_intersection(&a));
        assert!(!ab.has_intersection(&c));
    }

    #[test]
    fn ones_iterates_ascending() {
        let sig = Signature::empty().with(id(130)).with(id(2)).with(id(64));
        let ids: Vec<usize> = sig.ones().map(|c| c.index()).collect();
        assert_eq!(ids, vec![2, 64, 130]);
        assert_eq!(sig.count_ones(), 3);
    }

    #[test]
    fn pooled_buffers_are_reused() {
        // Warm the pool, then check a rent of the same bucket reuses capacity.
        let warm = Signature::empty().with(id(5));
        let capacity = warm.limbs.capacity();
        drop(warm);
        let next = Signature::empty().with(id(9));
        assert_eq!(next.limbs.capacity(), capacity);
    }

    #[test]
    fn hash_is_usable_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(Signature::empty().with(id(1)), 10);
        let probe = Signature::empty().with(id(1)).with(id(99)).without(id(99));
        assert_eq!(map.get(&probe), Some(&10));
    }
}
