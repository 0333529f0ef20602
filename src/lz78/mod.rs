//! LZ78 Prefix Dictionary
//!
//! The dictionary is a trie that hands out a dense identifier for every
//! distinct prefix inserted.  Identifiers follow insertion order and are never
//! reused; the roots for all 256 byte values are seeded first, so the root of
//! symbol `c` is always node `c`.  Two physical representations are provided
//! behind one trait: a binary sorted sibling-list trie and a compacting hash
//! trie.  Both produce identical hit/insert outcomes and identifiers for any
//! query sequence.
//!
//! A greedy factorizer drives either back-end: each factor is the longest
//! prefix already in the dictionary plus one extension symbol, and each factor
//! grows the dictionary by exactly one node.

pub mod binary_trie;
pub mod hash_trie;

pub use binary_trie::BinarySortedTrie;
pub use hash_trie::HashTrie;

use std::io::{Cursor,Read,Write,Seek,SeekFrom};
use log::{debug,trace};
use crate::tools::bitstream::{BitWriter,BitReader};
use crate::{Error,DYNERR};

/// dense identifier of a dictionary node
pub type NodeId = u32;
/// marks "no such child"; `find_or_insert` returns it to signal an insertion
pub const UNDEF: NodeId = NodeId::MAX;
/// number of per-symbol roots seeded into every dictionary
const ROOT_COUNT: usize = 256;

/// The operation set shared by both dictionary back-ends.
pub trait Lz78Trie {
    /// Seed the root node for one symbol.  Called once per symbol value in
    /// ascending order before any other insertion, so root ids equal symbol
    /// values.
    fn add_root(&mut self,c: u8) -> NodeId;
    /// the node representing the single-symbol prefix `c`
    fn get_root(&self,c: u8) -> NodeId;
    /// Return the child of `parent` along edge `c` if the edge exists.
    /// Otherwise allocate a fresh node for it, whose id is the dictionary size
    /// before the call, and return `UNDEF`.
    fn find_or_insert(&mut self,parent: NodeId,c: u8) -> NodeId;
    /// number of nodes including the roots
    fn size(&self) -> usize;
    /// forget everything including the roots
    fn clear(&mut self);
}

/// Estimate how many more distinct prefixes will be inserted into a dictionary
/// that already holds `nodes` of them, judging by the mean factor length over
/// the consumed part of the text.  This is only a sizing hint; both back-ends
/// stay correct if it is wrong.
pub fn expected_remaining(nodes: usize,text_length: usize,remaining: usize) -> usize {
    let consumed = text_length.saturating_sub(remaining);
    if nodes <= ROOT_COUNT || consumed == 0 {
        return remaining/2 + 1;
    }
    let mean_factor_len = (consumed / (nodes - ROOT_COUNT)).max(1);
    remaining/mean_factor_len + 1
}

/// selects the physical representation of the dictionary
#[derive(Clone,Copy,PartialEq,Debug)]
pub enum TrieBackend {
    /// sorted sibling lists, gentle on memory
    BinarySorted,
    /// two-table compacting hash, faster on wide fan-out
    Hash
}

/// create a dictionary with all 256 roots seeded
pub fn create_trie(backend: TrieBackend,text_length: usize) -> Box<dyn Lz78Trie> {
    let mut trie: Box<dyn Lz78Trie> = match backend {
        TrieBackend::BinarySorted => Box::new(BinarySortedTrie::new(text_length)),
        TrieBackend::Hash => Box::new(HashTrie::new(text_length))
    };
    for c in 0..=255 {
        trie.add_root(c);
    }
    trie
}

/// Main compression function.
/// `expanded_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `compressed_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.
pub fn compress<R,W>(expanded_in: &mut R, compressed_out: &mut W, backend: TrieBackend) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let mut input = Vec::new();
    expanded_in.seek(SeekFrom::Start(0))?;
    expanded_in.read_to_end(&mut input)?;
    // node ids must stay below the sentinel
    if input.len() >= UNDEF as usize - ROOT_COUNT {
        return Err(Box::new(Error::FileTooLarge));
    }
    let mut writer = BitWriter::new();
    writer.write_varint(input.len() as u64);
    let mut trie = create_trie(backend,input.len());
    let mut pos = 0;
    debug!("entering factor loop");
    while pos < input.len() {
        let mut node = trie.get_root(input[pos]);
        pos += 1;
        loop {
            if pos == input.len() {
                // the input ended inside a known prefix, emit it without an extension
                trace!("final factor {}",node);
                writer.write_varint(node as u64);
                break;
            }
            let child = trie.find_or_insert(node,input[pos]);
            if child == UNDEF {
                trace!("factor ({},{})",node,input[pos]);
                writer.write_varint(node as u64);
                writer.write_int(input[pos] as u64,8);
                pos += 1;
                break;
            }
            node = child;
            pos += 1;
        }
    }
    debug!("dictionary holds {} nodes",trie.size());
    let bytes = writer.to_bytes();
    compressed_out.write_all(&bytes)?;
    compressed_out.flush()?;
    Ok((input.len() as u64,bytes.len() as u64))
}

/// Main decompression function.
/// `compressed_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `expanded_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.
pub fn expand<R,W>(compressed_in: &mut R, expanded_out: &mut W) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let mut input = Vec::new();
    compressed_in.seek(SeekFrom::Start(0))?;
    compressed_in.read_to_end(&mut input)?;
    let mut reader = BitReader::from_bytes(&input);
    let text_length = reader.read_varint::<u64>()?;
    // the decoder mirrors dictionary growth with parent links only; spelling a
    // prefix walks to its root
    let mut parent: Vec<NodeId> = vec![UNDEF;ROOT_COUNT];
    let mut literal: Vec<u8> = (0..=255).collect();
    let mut output: Vec<u8> = Vec::new();
    let mut spell: Vec<u8> = Vec::new();
    debug!("entering factor loop over {} symbols",text_length);
    while (output.len() as u64) < text_length {
        let id = reader.read_varint::<u64>()?;
        if id >= parent.len() as u64 {
            return Err(Box::new(Error::CorruptFactor));
        }
        spell.clear();
        let mut node = id as NodeId;
        loop {
            spell.push(literal[node as usize]);
            if parent[node as usize] == UNDEF {
                break;
            }
            node = parent[node as usize];
        }
        output.extend(spell.iter().rev());
        if (output.len() as u64) < text_length {
            let c = reader.read_int::<u8>(8)?;
            output.push(c);
            parent.push(id as NodeId);
            literal.push(c);
        }
    }
    expanded_out.write_all(&output)?;
    expanded_out.flush()?;
    Ok((input.len() as u64,output.len() as u64))
}

/// Convenience function, calls `compress` with a slice returning a Vec
pub fn compress_slice(slice: &[u8],backend: TrieBackend) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    compress(&mut src,&mut ans,backend)?;
    Ok(ans.into_inner())
}

/// Convenience function, calls `expand` with a slice returning a Vec
pub fn expand_slice(slice: &[u8]) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    expand(&mut src,&mut ans)?;
    Ok(ans.into_inner())
}

// *************** TESTS *****************

#[test]
fn compression_works() {
    // "aaaa" factors as (a,a) then the bare prefix aa: varint 4, varint 97,
    // 8 bits of 'a', varint 256
    for backend in [TrieBackend::BinarySorted,TrieBackend::Hash] {
        let compressed = compress_slice("aaaa".as_bytes(),backend).expect("compression failed");
        assert_eq!(compressed,hex::decode("0461618002").unwrap());
    }
}

#[test]
fn empty_input() {
    let compressed = compress_slice(&[],TrieBackend::BinarySorted).expect("compression failed");
    assert_eq!(compressed,hex::decode("00").unwrap());
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,Vec::<u8>::new());
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    for backend in [TrieBackend::BinarySorted,TrieBackend::Hash] {
        let compressed = compress_slice(test_data,backend).expect("compression failed");
        let expanded = expand_slice(&compressed).expect("expansion failed");
        assert_eq!(test_data.to_vec(),expanded);
    }
}

#[test]
fn invertibility_binary_data() {
    let mut test_data = Vec::new();
    for i in 0..4096u32 {
        test_data.push((i*i % 251) as u8);
        test_data.push((i % 3) as u8);
    }
    for backend in [TrieBackend::BinarySorted,TrieBackend::Hash] {
        let compressed = compress_slice(&test_data,backend).expect("compression failed");
        let expanded = expand_slice(&compressed).expect("expansion failed");
        assert_eq!(test_data,expanded);
    }
}

#[test]
fn insert_once_then_hit_forever() {
    for backend in [TrieBackend::BinarySorted,TrieBackend::Hash] {
        let mut trie = create_trie(backend,1000);
        assert_eq!(trie.size(),256);
        let root = trie.get_root(b'a');
        assert_eq!(root,b'a' as NodeId);
        // first query of a distinct edge inserts, every later query hits with
        // a stable id
        assert_eq!(trie.find_or_insert(root,b'b'),UNDEF);
        let id = trie.size() as NodeId - 1;
        assert_eq!(id,256);
        for _i in 0..3 {
            assert_eq!(trie.find_or_insert(root,b'b'),id);
        }
        // a different edge at the same parent is its own node
        assert_eq!(trie.find_or_insert(root,b'a'),UNDEF);
        assert_eq!(trie.size(),258);
        assert_eq!(trie.find_or_insert(root,b'a'),257);
        // children of the new node are distinct from children of the root
        assert_eq!(trie.find_or_insert(id,b'b'),UNDEF);
        assert_eq!(trie.find_or_insert(id,b'b'),258);
    }
}

#[test]
fn backends_agree() {
    // identical query sequences must give identical hit/insert outcomes
    let text = "abracadabra banana abracadabra banana how much wood would a woodchuck chuck".as_bytes();
    let mut binary = create_trie(TrieBackend::BinarySorted,text.len());
    let mut hash = create_trie(TrieBackend::Hash,text.len());
    let mut pos = 0;
    while pos < text.len() {
        let mut node = binary.get_root(text[pos]);
        assert_eq!(node,hash.get_root(text[pos]));
        pos += 1;
        while pos < text.len() {
            let child = binary.find_or_insert(node,text[pos]);
            assert_eq!(child,hash.find_or_insert(node,text[pos]));
            assert_eq!(binary.size(),hash.size());
            pos += 1;
            if child == UNDEF {
                break;
            }
            node = child;
        }
    }
}

#[test]
fn clear_forgets_everything() {
    for backend in [TrieBackend::BinarySorted,TrieBackend::Hash] {
        let mut trie = create_trie(backend,100);
        let root = trie.get_root(b'x');
        trie.find_or_insert(root,b'y');
        assert_eq!(trie.size(),257);
        trie.clear();
        assert_eq!(trie.size(),0);
    }
}

#[test]
fn corrupt_factor_rejected() {
    let mut writer = BitWriter::new();
    writer.write_varint(5); // text length
    writer.write_varint(900); // no such node yet
    assert!(matches!(expand_slice(&writer.to_bytes()),Err(_)));
}
