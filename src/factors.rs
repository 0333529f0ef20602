//! Container for LZSS-style factor runs.
//!
//! A factor replaces the run of `len` symbols at text position `pos` with a
//! reference to the earlier occurrence starting at `src`.  The buffer records
//! factors in insertion order, tracks on the fly whether that order is sorted
//! by position, and keeps the run length extremes for sizing decisions
//! downstream.

#[derive(Clone,Copy,PartialEq,Debug)]
pub struct Factor {
    pub pos: u32,
    pub src: u32,
    pub len: u32
}

pub struct FactorBuffer {
    factors: Vec<Factor>,
    sorted: bool,
    shortest: u32,
    longest: u32
}

impl FactorBuffer {
    pub fn new() -> Self {
        Self {
            factors: Vec::new(),
            sorted: true,
            shortest: u32::MAX,
            longest: 0
        }
    }
    pub fn push(&mut self,pos: u32,src: u32,len: u32) {
        self.sorted = self.sorted && self.factors.last().map_or(true,|f| pos >= f.pos);
        self.factors.push(Factor { pos, src, len });
        self.shortest = self.shortest.min(len);
        self.longest = self.longest.max(len);
    }
    pub fn get(&self,i: usize) -> &Factor {
        &self.factors[i]
    }
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
    pub fn len(&self) -> usize {
        self.factors.len()
    }
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }
    /// sort by position; does nothing when insertion order was already sorted
    pub fn sort(&mut self) {
        if !self.sorted {
            self.factors.sort_by_key(|f| f.pos);
            self.sorted = true;
        }
    }
    pub fn shortest_factor(&self) -> u32 {
        self.shortest
    }
    pub fn longest_factor(&self) -> u32 {
        self.longest
    }
}

// *************** TESTS *****************

#[test]
fn tracks_sortedness() {
    let mut buf = FactorBuffer::new();
    assert!(buf.is_empty());
    buf.push(0,0,4);
    buf.push(10,2,3);
    assert!(buf.is_sorted());
    buf.push(5,1,7);
    assert!(!buf.is_sorted());
    buf.sort();
    assert!(buf.is_sorted());
    assert_eq!(buf.get(1).pos,5);
    assert_eq!(buf.len(),3);
}

#[test]
fn tracks_extremes() {
    let mut buf = FactorBuffer::new();
    buf.push(0,0,4);
    buf.push(4,1,9);
    buf.push(13,2,2);
    assert_eq!(buf.shortest_factor(),2);
    assert_eq!(buf.longest_factor(),9);
}
