//! Hash trie back-end with two-table compaction.
//!
//! Edges are stored in open-addressed hash tables keyed by the packed pair
//! (parent id, edge symbol).  Probing starts in a small power-of-two `primary`
//! table kept under a low load factor.  LZ78 dictionaries only ever grow, so
//! once enough of the text has been consumed to predict the final size, all
//! entries migrate in a single pass into a `secondary` table sized directly
//! for that prediction and run at a high load factor.  That avoids repeated
//! large rehashes late in the stream while keeping early probes cheap.

use log::{debug,trace};
use super::{Lz78Trie,NodeId,UNDEF,expected_remaining};

/// widest parent id the packed key can carry
const MAX_PARENT: u64 = (1u64 << 56) - 1;
/// slots in the primary table before any growth
const INITIAL_CAPACITY: usize = 1024;
/// default ceiling on the primary table's fill fraction
const PRIMARY_MAX_LOAD: f64 = 0.30;
/// ceiling on the secondary table's fill fraction
const SECONDARY_MAX_LOAD: f64 = 0.95;

/// pack an edge into one machine word; injective while the parent id stays
/// below 2^56
fn pack_edge(parent: NodeId,c: u8) -> u64 {
    debug_assert!((parent as u64) <= MAX_PARENT);
    ((parent as u64) << 8) | c as u64
}

/// 64-bit hash with avalanche behavior, applied to packed edges
pub trait KeyHash {
    fn hash(&self,key: u64) -> u64;
}

/// the xor-shift-multiply finalizer of splitmix64
#[derive(Default)]
pub struct MixHasher;

impl KeyHash for MixHasher {
    fn hash(&self,mut key: u64) -> u64 {
        key = (key ^ (key >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        key = (key ^ (key >> 27)).wrapping_mul(0x94d049bb133111eb);
        key ^ (key >> 31)
    }
}

/// One open-addressed table with linear probing.  A slot whose value is
/// `UNDEF` is empty; node ids never equal the sentinel.
struct ProbeTable {
    keys: Vec<u64>,
    values: Vec<NodeId>,
    entries: usize,
    max_load: f64,
    /// power-of-two capacity probes by mask, direct capacity by remainder
    pow2: bool
}

impl ProbeTable {
    fn with_capacity(capacity: usize,max_load: f64,pow2: bool) -> Self {
        let capacity = match pow2 {
            true => capacity.next_power_of_two(),
            false => capacity.max(2)
        };
        Self {
            keys: vec![0;capacity],
            values: vec![UNDEF;capacity],
            entries: 0,
            max_load,
            pow2
        }
    }
    fn capacity(&self) -> usize {
        self.values.len()
    }
    fn start_slot(&self,hash: u64) -> usize {
        match self.pow2 {
            true => hash as usize & (self.capacity() - 1),
            false => hash as usize % self.capacity()
        }
    }
    /// probe for `key`; if absent store `value` in the first free slot and
    /// return `None`, else return the stored value
    fn insert(&mut self,key: u64,hash: u64,value: NodeId) -> Option<NodeId> {
        debug_assert!(self.entries < self.capacity());
        let mut slot = self.start_slot(hash);
        loop {
            if self.values[slot] == UNDEF {
                self.keys[slot] = key;
                self.values[slot] = value;
                self.entries += 1;
                return None;
            }
            if self.keys[slot] == key {
                return Some(self.values[slot]);
            }
            slot += 1;
            if slot == self.capacity() {
                slot = 0;
            }
        }
    }
    fn over_load(&self) -> bool {
        (self.entries + 1) as f64 > self.capacity() as f64 * self.max_load
    }
}

pub struct HashTrie<H: KeyHash = MixHasher> {
    hasher: H,
    primary: ProbeTable,
    /// present once the single compaction pass has run
    secondary: Option<ProbeTable>,
    roots: usize,
    text_length: usize,
    consumed: usize
}

impl HashTrie<MixHasher> {
    pub fn new(text_length: usize) -> Self {
        Self::with_hasher(MixHasher::default(),text_length)
    }
}

impl<H: KeyHash> HashTrie<H> {
    pub fn with_hasher(hasher: H,text_length: usize) -> Self {
        Self {
            hasher,
            primary: ProbeTable::with_capacity(INITIAL_CAPACITY,PRIMARY_MAX_LOAD,true),
            secondary: None,
            roots: 0,
            text_length,
            consumed: 0
        }
    }
    /// adjust the primary table's load ceiling; sizing hint only
    pub fn max_load_factor(&mut self,max_load: f64) {
        debug_assert!(max_load > 0.0 && max_load <= 1.0);
        self.primary.max_load = max_load;
    }
    /// rebuild `src` into a fresh table of the given shape
    fn rebuild(hasher: &H,src: &ProbeTable,capacity: usize,max_load: f64,pow2: bool) -> ProbeTable {
        let mut table = ProbeTable::with_capacity(capacity,max_load,pow2);
        for slot in 0..src.capacity() {
            if src.values[slot] != UNDEF {
                let key = src.keys[slot];
                table.insert(key,hasher.hash(key),src.values[slot]);
            }
        }
        table
    }
    /// the single compaction pass: move everything into a secondary table
    /// sized directly for the expected final entry count
    fn migrate(&mut self,expected: usize) {
        debug!("compacting {} edges into a table of {} slots",self.primary.entries,expected);
        let secondary = Self::rebuild(&self.hasher,&self.primary,expected,SECONDARY_MAX_LOAD,false);
        self.primary = ProbeTable::with_capacity(2,self.primary.max_load,true);
        self.secondary = Some(secondary);
    }
    fn expected_entries(&self) -> usize {
        let remaining = self.text_length.saturating_sub(self.consumed);
        let expected = self.primary.entries + 1 + expected_remaining(self.size(),self.text_length,remaining);
        (expected as f64/SECONDARY_MAX_LOAD).ceil() as usize
    }
}

impl<H: KeyHash> Lz78Trie for HashTrie<H> {
    fn add_root(&mut self,c: u8) -> NodeId {
        // roots are implicit: get_root resolves them without table entries, so
        // a packed edge key can never alias a root
        debug_assert!(self.secondary.is_none() && self.primary.entries == 0);
        debug_assert_eq!(self.roots,c as usize);
        self.roots += 1;
        self.size() as NodeId - 1
    }

    fn get_root(&self,c: u8) -> NodeId {
        c as NodeId
    }

    fn find_or_insert(&mut self,parent: NodeId,c: u8) -> NodeId {
        self.consumed += 1;
        let newleaf_id = self.size() as NodeId;
        let key = pack_edge(parent,c);
        let hash = self.hasher.hash(key);

        if let Some(secondary) = &mut self.secondary {
            if let Some(existing) = secondary.insert(key,hash,newleaf_id) {
                return existing;
            }
            if secondary.over_load() {
                // the size prediction fell short; grow the direct table
                let capacity = (secondary.capacity()*2).max(secondary.entries + 2);
                trace!("secondary table regrown to {} slots",capacity);
                *secondary = Self::rebuild(&self.hasher,secondary,capacity,SECONDARY_MAX_LOAD,false);
            }
            return UNDEF;
        }

        if let Some(existing) = self.primary.insert(key,hash,newleaf_id) {
            return existing;
        }
        if self.primary.over_load() {
            let expected = self.expected_entries();
            if (expected as f64) < self.primary.capacity() as f64 * 2.0 * SECONDARY_MAX_LOAD {
                self.migrate(expected);
            } else {
                // prediction still far off, stay primary and double
                self.primary = Self::rebuild(&self.hasher,&self.primary,self.primary.capacity()*2,self.primary.max_load,true);
            }
        }
        UNDEF
    }

    fn size(&self) -> usize {
        match &self.secondary {
            Some(secondary) => self.roots + secondary.entries,
            None => self.roots + self.primary.entries
        }
    }

    fn clear(&mut self) {
        self.primary = ProbeTable::with_capacity(INITIAL_CAPACITY,self.primary.max_load,true);
        self.secondary = None;
        self.roots = 0;
        self.consumed = 0;
    }
}

// *************** TESTS *****************

#[cfg(test)]
fn seeded(text_length: usize) -> HashTrie {
    let mut trie = HashTrie::new(text_length);
    for c in 0..=255 {
        trie.add_root(c);
    }
    trie
}

#[test]
fn packed_keys_are_injective() {
    assert_eq!(pack_edge(0,0xff),0xff);
    assert_eq!(pack_edge(1,0),0x100);
    assert_ne!(pack_edge(0x0101,0x01),pack_edge(0x0100,0x01));
}

#[test]
fn mix_hash_avalanches() {
    let hasher = MixHasher::default();
    // neighboring keys should land far apart
    let a = hasher.hash(0x100);
    let b = hasher.hash(0x101);
    assert_ne!(a,b);
    assert!((a ^ b).count_ones() > 8);
    assert_eq!(hasher.hash(0x100),a);
}

#[test]
fn migration_preserves_edges() {
    // drive enough distinct edges through a small text bound to force the
    // compaction, then verify every edge still resolves to its original id
    let mut trie = seeded(4000);
    let mut minted = Vec::new();
    for parent in 0..40u32 {
        for c in 0..40u8 {
            assert_eq!(trie.find_or_insert(parent,c),UNDEF);
            minted.push((parent,c,trie.size() as NodeId - 1));
        }
    }
    assert!(trie.secondary.is_some());
    for (parent,c,id) in minted {
        assert_eq!(trie.find_or_insert(parent,c),id);
    }
}

#[test]
fn survives_bad_size_prediction() {
    // claim a tiny text so the estimator undershoots badly, then insert far
    // more edges than predicted
    let mut trie = seeded(10);
    let mut minted = Vec::new();
    for parent in 0..100u32 {
        for c in 0..100u8 {
            assert_eq!(trie.find_or_insert(parent,c),UNDEF);
            minted.push((parent,c,trie.size() as NodeId - 1));
        }
    }
    for (parent,c,id) in minted {
        assert_eq!(trie.find_or_insert(parent,c),id);
    }
}

#[test]
fn tunable_load_factor_compacts_earlier() {
    // a lower ceiling trips the growth trigger, and the small text bound
    // keeps the projected size under the migration threshold
    let mut trie = HashTrie::new(1000);
    trie.max_load_factor(0.05);
    for c in 0..=255 {
        trie.add_root(c);
    }
    for c in 0..100u8 {
        assert_eq!(trie.find_or_insert(0,c),UNDEF);
    }
    assert!(trie.secondary.is_some());
}

#[test]
fn ids_are_dense_and_ordered() {
    let mut trie = seeded(1000);
    for i in 0..500u32 {
        let parent = i/2;
        let c = (i % 2) as u8;
        assert_eq!(trie.find_or_insert(parent,c),UNDEF);
        assert_eq!(trie.size(),super::ROOT_COUNT + i as usize + 1);
    }
}
