//! minicpu library.
//!
//! Provides an 8-bit fantasy CPU emulator, its memory-mapped screen, and a
//! namespaced macro-assembler and disassembler for its instruction set.

pub mod toolchain;
pub mod utils;

pub use toolchain::errors::Error;
