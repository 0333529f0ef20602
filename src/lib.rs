//! # Prefixpress Library
//!
//! Compression kernels built on prefix structures:
//! * `huffman` is a canonical Huffman coder for byte streams: alphabet analysis,
//!   code construction, table serialization, and bit-exact encode/decode
//! * `lz78` is an incremental prefix dictionary with two interchangeable
//!   back-ends, plus a greedy factorizer that drives either one
//! * `factors` is a small container for LZSS-style factor runs
//!
//! The compression/expansion functions are generics that operate on trait objects
//! with bounds `Read + Seek` or `Write + Seek`.  There are convenience functions
//! for working directly with buffers.
//!
//! ## File Example
//!
//! ```rs
//! use prefixpress::*;
//! let mut in_file = std::fs::File::open("some_input_path").expect("open failed");
//! let mut out_file = std::fs::File::create("some_output_path").expect("create failed");
//! let (in_size,out_size) = huffman::compress(&mut in_file,&mut out_file)
//!     .expect("compression failed");
//! eprintln!("compressed {} into {}",in_size,out_size);
//! ```
//!
//! ## Buffer Example
//!
//! ```rs
//! use prefixpress::*;
//! let test_data = "This is the chaunt of the priests.  The chaunt of the priests of Mung.".as_bytes();
//! let compressed = huffman::compress_slice(test_data).expect("compression failed");
//! ```

mod tools;
pub mod huffman;
pub mod lz78;
pub mod factors;

type DYNERR = Box<dyn std::error::Error>;

/// Codec Errors
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("file too large")]
    FileTooLarge,
    #[error("unexpected end of bit stream")]
    UnexpectedEof,
    #[error("variable width integer overflowed the requested type")]
    VarintOverflow,
    #[error("Huffman table is corrupt")]
    CorruptTable,
    #[error("dictionary factor is corrupt")]
    CorruptFactor
}
