//! Canonical Huffman Coding
//!
//! This builds a canonical Huffman code over the bytes that actually occur in
//! the input (the effective alphabet) and serializes just enough of the table
//! to decode: the longest codeword length, the number of codewords of each
//! length, and the symbols in canonical order.  Codeword lengths come from the
//! in-place heap construction given in Managing Gigabytes, chapter 2.3.
//!
//! Stream layout is one mode bit (0 = at most one distinct symbol, 1 =
//! general), the serialized table in general mode, the text length as a
//! variable width integer, then the body.  In trivial mode each occurrence is
//! stored as 8 raw bits; in general mode each occurrence is its codeword,
//! written MSB-first.

use std::io::{Cursor,Read,Write,Seek,SeekFrom};
use log::{debug,trace};
use crate::tools::bitstream::{BitWriter,BitReader};
use crate::{Error,DYNERR};

/// longest codeword the table representation admits
const MAX_CODE_LEN: usize = 64;
/// number of distinct byte values
const FULL_ALPHABET: usize = 256;
/// sentinel rank for symbols outside the effective alphabet
const NO_RANK: u16 = u16::MAX;

/// Count occurrences of every byte value over the whole input.
pub fn count_bytes(input: &[u8]) -> [u64;FULL_ALPHABET] {
    let mut counts = [0u64;FULL_ALPHABET];
    for &c in input {
        counts[c as usize] += 1;
    }
    counts
}

/// number of distinct byte values with a non-zero count
pub fn effective_alphabet_size(counts: &[u64;FULL_ALPHABET]) -> usize {
    counts.iter().filter(|&&c| c != 0).count()
}

/// the symbols with non-zero count, ascending by value
fn effective_alphabet(counts: &[u64;FULL_ALPHABET]) -> Vec<u8> {
    let mut alphabet = Vec::new();
    for i in 0..FULL_ALPHABET {
        if counts[i] != 0 {
            alphabet.push(i as u8);
        }
    }
    debug_assert!(!alphabet.is_empty());
    alphabet
}

// The length assignment works a single scratch array `a` of size 2*sigma.
// The lower half is a min-heap of pointers into the upper half, which holds
// leaf weights, then accumulates internal node weights and parent pointers as
// the tree is built.  The heap is ordered by the pointed-at weight.

fn pointed_weight(a: &[u64],i: usize) -> u64 {
    a[a[i] as usize]
}

fn sift_down(a: &mut [u64],mut i: usize,heap_len: usize) {
    loop {
        let left = 2*i + 1;
        if left >= heap_len {
            return;
        }
        let mut child = left;
        if left + 1 < heap_len && pointed_weight(a,left+1) < pointed_weight(a,child) {
            child = left + 1;
        }
        if pointed_weight(a,i) <= pointed_weight(a,child) {
            return;
        }
        a.swap(i,child);
        i = child;
    }
}

fn sift_up(a: &mut [u64],mut i: usize) {
    while i > 0 {
        let parent = (i-1)/2;
        if pointed_weight(a,parent) <= pointed_weight(a,i) {
            return;
        }
        a.swap(i,parent);
        i = parent;
    }
}

fn make_heap(a: &mut [u64],heap_len: usize) {
    for i in (0..heap_len/2).rev() {
        sift_down(a,i,heap_len);
    }
}

/// move the minimum to slot `heap_len-1` and restore the heap in front of it
fn pop_heap(a: &mut [u64],heap_len: usize) {
    a.swap(0,heap_len-1);
    sift_down(a,0,heap_len-1);
}

fn push_heap(a: &mut [u64],heap_len: usize) {
    sift_up(a,heap_len-1);
}

/// Assign codeword lengths to the effective alphabet.  `weights` holds the
/// count of each effective symbol in ascending symbol order and must have at
/// least two entries.  Returns the length of each symbol's codeword in the
/// same order.
fn assign_code_lengths(weights: &[u64]) -> Vec<u8> {
    let sigma = weights.len();
    debug_assert!(sigma >= 2);
    debug_assert!(sigma <= FULL_ALPHABET);
    let mut scratch = [0u64;2*FULL_ALPHABET];
    let a = &mut scratch[..2*sigma];
    for i in 0..sigma {
        a[i] = (sigma + i) as u64;
        a[sigma + i] = weights[i];
    }
    make_heap(a,sigma);

    // each round combines the two lightest subtrees into a node at slot h+1,
    // leaving parent pointers behind in the slots that held their weights
    let mut h = sigma - 1;
    while h > 0 {
        pop_heap(a,h+1);
        let m1 = a[h] as usize;
        h -= 1;
        pop_heap(a,h+1);
        let m2 = a[h] as usize;
        a[h+1] = a[m1] + a[m2];
        a[h] = (h+1) as u64;
        a[m1] = (h+1) as u64;
        a[m2] = (h+1) as u64;
        push_heap(a,h+1);
    }

    // one bottom-up pass turns parent pointers into depths, valid because
    // every slot's parent index is strictly less than the slot itself
    a[1] = 0;
    for i in 2..2*sigma {
        a[i] = a[a[i] as usize] + 1;
    }

    let mut lengths = vec![0u8;sigma];
    for i in 0..sigma {
        assert!(a[sigma+i] <= MAX_CODE_LEN as u64,"codeword length exceeds {} bits",MAX_CODE_LEN);
        lengths[i] = a[sigma+i] as u8;
        trace!("symbol rank {} weight {} length {}",i,weights[i],lengths[i]);
    }
    lengths
}

/// The decode side of a canonical Huffman table.  This is exactly what gets
/// serialized; everything else the codec needs is derived on demand, and the
/// encode-only arrays live in a separate [CodeBook] so decoders never build
/// them.
pub struct HuffmanTable {
    /// length of the longest codeword, in [1,64]
    longest: u8,
    /// index l-1 stores how many codewords have length l
    num_per_length: Vec<u16>,
    /// canonical rank -> symbol, sorted by (codeword length, symbol value)
    symbols: Vec<u8>
}

/// Encode-side arrays derived from a [HuffmanTable]
pub struct CodeBook {
    /// canonical rank -> codeword
    codewords: Vec<u64>,
    /// canonical rank -> codeword length
    lengths: Vec<u8>,
    /// symbol -> canonical rank, `NO_RANK` for absent symbols
    rank_by_symbol: [u16;FULL_ALPHABET]
}

impl HuffmanTable {
    /// Build the table from full-alphabet counts.  At least two distinct
    /// symbols must have occurred; callers handle smaller alphabets in
    /// trivial mode.
    pub fn from_counts(counts: &[u64;FULL_ALPHABET]) -> Self {
        let alphabet = effective_alphabet(counts);
        let sigma = alphabet.len();
        debug_assert!(sigma >= 2);
        let weights: Vec<u64> = alphabet.iter().map(|&c| counts[c as usize]).collect();
        let lengths = assign_code_lengths(&weights);

        // canonical order sorts by length ascending with ties by symbol value;
        // the sort is stable and the alphabet is already ascending by value
        let mut order: Vec<usize> = (0..sigma).collect();
        order.sort_by_key(|&i| lengths[i]);
        let symbols: Vec<u8> = order.iter().map(|&i| alphabet[i]).collect();
        let longest = lengths[order[sigma-1]];

        let mut num_per_length = vec![0u16;longest as usize];
        for &i in &order {
            num_per_length[lengths[i] as usize - 1] += 1;
        }
        Self {
            longest,
            num_per_length,
            symbols
        }
    }
    pub fn alphabet_size(&self) -> usize {
        self.symbols.len()
    }
    /// per-rank codeword lengths, expanded from the per-length counts
    fn ordered_code_lengths(&self) -> Vec<u8> {
        let mut ans = Vec::with_capacity(self.symbols.len());
        for (i,&n) in self.num_per_length.iter().enumerate() {
            for _j in 0..n {
                ans.push(i as u8 + 1);
            }
        }
        ans
    }
    /// smallest codeword of each length, at index length-1
    fn first_codes(&self) -> Vec<u64> {
        let longest = self.longest as usize;
        let mut ans = vec![0u64;longest];
        for l in (1..longest).rev() {
            ans[l-1] = (ans[l] + self.num_per_length[l] as u64)/2;
        }
        ans
    }
    /// canonical rank of the first codeword of each length, at index length-1
    fn first_ranks(&self,ordered_lengths: &[u8]) -> Vec<usize> {
        let mut ans = vec![usize::MAX;self.longest as usize];
        ans[ordered_lengths[0] as usize - 1] = 0;
        for i in 1..ordered_lengths.len() {
            if ordered_lengths[i-1] < ordered_lengths[i] {
                ans[ordered_lengths[i] as usize - 1] = i;
            }
        }
        ans
    }
    /// derive the encode-side arrays
    pub fn code_book(&self) -> CodeBook {
        let lengths = self.ordered_code_lengths();
        let mut next_code = self.first_codes();
        let mut codewords = vec![0u64;lengths.len()];
        for i in 0..lengths.len() {
            let slot = lengths[i] as usize - 1;
            codewords[i] = next_code[slot];
            next_code[slot] += 1;
            trace!("codeword {} : {:0w$b}",i,codewords[i],w = lengths[i] as usize);
        }
        let mut rank_by_symbol = [NO_RANK;FULL_ALPHABET];
        for (rank,&sym) in self.symbols.iter().enumerate() {
            rank_by_symbol[sym as usize] = rank as u16;
        }
        CodeBook {
            codewords,
            lengths,
            rank_by_symbol
        }
    }
    /// Serialize the table: longest length, count per length, alphabet size,
    /// then the symbols in canonical order as raw octets.
    pub fn write(&self,writer: &mut BitWriter) {
        writer.write_varint(self.longest as u64);
        for &n in &self.num_per_length {
            writer.write_varint(n as u64);
        }
        writer.write_varint(self.symbols.len() as u64);
        for &sym in &self.symbols {
            writer.write_int(sym as u64,8);
        }
    }
    /// Deserialize and validate a table.  Anything that could not have been
    /// produced by `write` comes back as `Error::CorruptTable`.
    pub fn read(reader: &mut BitReader) -> Result<Self,Error> {
        let longest = reader.read_varint::<u64>()?;
        if longest < 1 || longest > MAX_CODE_LEN as u64 {
            return Err(Error::CorruptTable);
        }
        let mut num_per_length = vec![0u16;longest as usize];
        let mut total: u64 = 0;
        for slot in num_per_length.iter_mut() {
            let n = reader.read_varint::<u64>()?;
            if n > FULL_ALPHABET as u64 {
                return Err(Error::CorruptTable);
            }
            *slot = n as u16;
            total += n;
        }
        let alphabet_size = reader.read_varint::<u64>()?;
        if alphabet_size < 2 || alphabet_size > FULL_ALPHABET as u64 || alphabet_size != total {
            return Err(Error::CorruptTable);
        }
        if num_per_length[longest as usize - 1] == 0 {
            return Err(Error::CorruptTable);
        }
        // a complete code satisfies Kraft's equality, and completeness is what
        // guarantees the decode loop always lands on a valid rank
        let mut kraft: u128 = 0;
        for (i,&n) in num_per_length.iter().enumerate() {
            kraft += (n as u128) << (longest as usize - 1 - i);
        }
        if kraft != 1u128 << longest {
            return Err(Error::CorruptTable);
        }
        let mut symbols = Vec::with_capacity(alphabet_size as usize);
        for _i in 0..alphabet_size {
            symbols.push(reader.read_int::<u8>(8)?);
        }
        Ok(Self {
            longest: longest as u8,
            num_per_length,
            symbols
        })
    }
}

impl CodeBook {
    /// write one symbol's codeword, MSB first
    fn put_symbol(&self,sym: u8,writer: &mut BitWriter) {
        let rank = self.rank_by_symbol[sym as usize];
        debug_assert!(rank != NO_RANK,"symbol {} is outside the effective alphabet",sym);
        writer.write_int(self.codewords[rank as usize],self.lengths[rank as usize] as usize);
    }
}

/// Encoder over one byte stream.  Construction makes the statistics pass and
/// writes the mode bit, table and text length; `encode` makes up the second
/// pass, one symbol at a time.
pub struct HuffmanEncoder {
    book: Option<CodeBook>
}

impl HuffmanEncoder {
    pub fn new(input: &[u8],writer: &mut BitWriter) -> Self {
        let counts = count_bytes(input);
        let sigma = effective_alphabet_size(&counts);
        debug!("effective alphabet has {} symbols",sigma);
        if sigma <= 1 {
            writer.write_bit(false);
            writer.write_varint(input.len() as u64);
            return Self { book: None };
        }
        writer.write_bit(true);
        let table = HuffmanTable::from_counts(&counts);
        table.write(writer);
        writer.write_varint(input.len() as u64);
        Self { book: Some(table.code_book()) }
    }
    pub fn encode(&self,sym: u8,writer: &mut BitWriter) {
        match &self.book {
            Some(book) => book.put_symbol(sym,writer),
            None => writer.write_int(sym as u64,8)
        }
    }
}

struct DecodeState {
    /// canonical rank -> symbol
    symbols: Vec<u8>,
    /// smallest codeword of each length, at index length-1
    first_codes: Vec<u64>,
    /// canonical rank of the first codeword of each length, at index length-1
    first_ranks: Vec<usize>
}

/// Decoder over one byte stream.  Construction reads the mode bit, the table
/// in general mode, and the text length; `decode` then produces one symbol
/// per call until `remaining` hits zero.
pub struct HuffmanDecoder {
    text_length: u64,
    remaining: u64,
    state: Option<DecodeState>
}

impl HuffmanDecoder {
    pub fn new(reader: &mut BitReader) -> Result<Self,Error> {
        if !reader.read_bit()? {
            let text_length = reader.read_varint::<u64>()?;
            return Ok(Self {
                text_length,
                remaining: text_length,
                state: None
            });
        }
        let table = HuffmanTable::read(reader)?;
        let ordered_lengths = table.ordered_code_lengths();
        let state = DecodeState {
            first_codes: table.first_codes(),
            first_ranks: table.first_ranks(&ordered_lengths),
            symbols: table.symbols
        };
        let text_length = reader.read_varint::<u64>()?;
        Ok(Self {
            text_length,
            remaining: text_length,
            state: Some(state)
        })
    }
    pub fn text_length(&self) -> u64 {
        self.text_length
    }
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
    pub fn decode(&mut self,reader: &mut BitReader) -> Result<u8,Error> {
        debug_assert!(self.remaining > 0);
        self.remaining -= 1;
        match &self.state {
            None => reader.read_int::<u8>(8),
            Some(state) => {
                // accumulate bits until the value reaches the first codeword of
                // its length; completeness of the code bounds the loop by the
                // longest length, where the first codeword is 0
                let mut value: u64 = 0;
                let mut length: usize = 0;
                loop {
                    value = (value << 1) | reader.read_bit()? as u64;
                    length += 1;
                    if value >= state.first_codes[length-1] {
                        break;
                    }
                }
                trace!("codeword {:0w$b} length {}",value,length,w = length);
                let rank = state.first_ranks[length-1] + (value - state.first_codes[length-1]) as usize;
                Ok(state.symbols[rank])
            }
        }
    }
}

/// Main compression function.
/// `expanded_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `compressed_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.
pub fn compress<R,W>(expanded_in: &mut R, compressed_out: &mut W) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let mut input = Vec::new();
    expanded_in.seek(SeekFrom::Start(0))?;
    expanded_in.read_to_end(&mut input)?;
    let mut writer = BitWriter::new();
    let encoder = HuffmanEncoder::new(&input,&mut writer);
    debug!("entering encode loop over {} symbols",input.len());
    for &c in &input {
        encoder.encode(c,&mut writer);
    }
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
    let mut decoder = HuffmanDecoder::new(&mut reader)?;
    debug!("entering decode loop over {} symbols",decoder.text_length());
    let mut output = Vec::new();
    while decoder.remaining() > 0 {
        output.push(decoder.decode(&mut reader)?);
    }
    expanded_out.write_all(&output)?;
    expanded_out.flush()?;
    Ok((input.len() as u64,output.len() as u64))
}

/// Convenience function, calls `compress` with a slice returning a Vec
pub fn compress_slice(slice: &[u8]) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    compress(&mut src,&mut ans)?;
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

#[cfg(test)]
fn check_kraft_equality(table: &HuffmanTable) {
    let longest = table.longest as usize;
    let mut sum: u128 = 0;
    for (i,&n) in table.num_per_length.iter().enumerate() {
        sum += (n as u128) << (longest - 1 - i);
    }
    assert_eq!(sum,1u128 << longest);
}

#[test]
fn empty_input() {
    let compressed = compress_slice(&[]).expect("compression failed");
    assert_eq!(compressed,hex::decode("0000").unwrap());
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,Vec::<u8>::new());
}

#[test]
fn single_symbol_alphabet() {
    // trivial mode: mode bit 0, varint length 4, then 4 x 8 raw bits
    let compressed = compress_slice("aaaa".as_bytes()).expect("compression failed");
    assert_eq!(compressed,hex::decode("0230b0b0b080").unwrap());
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,"aaaa".as_bytes().to_vec());
}

#[test]
fn two_symbol_alphabet() {
    // sigma=2 gives both symbols one bit; canonical tie-break puts a before b
    let compressed = compress_slice("ab".as_bytes()).expect("compression failed");
    assert_eq!(compressed,hex::decode("80810130b10120").unwrap());
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,"ab".as_bytes().to_vec());
}

#[test]
fn abracadabra_table_properties() {
    let text = "abracadabra".as_bytes();
    let counts = count_bytes(text);
    let table = HuffmanTable::from_counts(&counts);
    assert_eq!(table.alphabet_size(),5);
    check_kraft_equality(&table);
    // most frequent symbol gets the shortest codeword, and lengths are
    // non-decreasing in canonical order
    let ordered = table.ordered_code_lengths();
    assert_eq!(table.symbols[0],b'a');
    assert_eq!(ordered[0],1);
    for i in 1..ordered.len() {
        assert!(ordered[i-1] <= ordered[i]);
    }
    let compressed = compress_slice(text).expect("compression failed");
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,text.to_vec());
}

#[test]
fn frequency_length_monotonicity() {
    let text = "the quick brown fox jumps over the lazy dog, again and again and again".as_bytes();
    let counts = count_bytes(text);
    let table = HuffmanTable::from_counts(&counts);
    check_kraft_equality(&table);
    let ordered = table.ordered_code_lengths();
    for i in 0..table.symbols.len() {
        for j in i+1..table.symbols.len() {
            if ordered[i] < ordered[j] {
                assert!(counts[table.symbols[i] as usize] >= counts[table.symbols[j] as usize]);
            }
        }
    }
}

#[test]
fn full_alphabet() {
    let text: Vec<u8> = (0..=255).collect();
    let counts = count_bytes(&text);
    let table = HuffmanTable::from_counts(&counts);
    assert_eq!(table.longest,8);
    check_kraft_equality(&table);
    let compressed = compress_slice(&text).expect("compression failed");
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,text);
}

#[test]
fn skewed_distribution() {
    let mut text = vec![b'x';1_000_000];
    text.push(b'y');
    let compressed = compress_slice(&text).expect("compression failed");
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,text);
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let compressed = compress_slice(test_data).expect("compression failed");
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);
}

#[test]
fn decode_consumes_every_bit() {
    let test_data = "what will the pad bits be".as_bytes();
    let compressed = compress_slice(test_data).expect("compression failed");
    let mut reader = BitReader::from_bytes(&compressed);
    let mut decoder = HuffmanDecoder::new(&mut reader).expect("bad header");
    while decoder.remaining() > 0 {
        decoder.decode(&mut reader).expect("decode failed");
    }
    assert!(compressed.len()*8 - reader.position() < 8);
}

#[test]
fn corrupt_table_rejected() {
    // longest of 0 and longest of 65 are both outside [1,64]
    for bad_longest in [0u64,65] {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        writer.write_varint(bad_longest);
        writer.write_varint(2);
        assert!(matches!(expand_slice(&writer.to_bytes()),Err(_)));
    }
    // counts that violate Kraft's equality
    let mut writer = BitWriter::new();
    writer.write_bit(true);
    writer.write_varint(2); // longest
    writer.write_varint(1); // one codeword of length 1
    writer.write_varint(1); // one codeword of length 2: incomplete
    writer.write_varint(2); // alphabet size
    writer.write_int(b'a' as u64,8);
    writer.write_int(b'b' as u64,8);
    assert!(matches!(expand_slice(&writer.to_bytes()),Err(_)));
}

#[test]
fn truncated_body_errs() {
    let mut writer = BitWriter::new();
    writer.write_bit(false);
    writer.write_varint(12); // promises 12 raw symbols, delivers none
    assert!(matches!(expand_slice(&writer.to_bytes()),Err(_)));
}
