//! Tools shared by the compression modules

pub mod bitstream;
