//! Toolchain for the minicpu: a fantasy 8-bit machine with a 16-bit address
//! space, plus the assembler that targets it.
//!
//! The assembler, disassembler and CPU all read the instruction table in
//! [`isa`], so opcode numbering, operand shapes and cycle categories cannot
//! drift between them.
//!
//! # Machine
//!
//! - **Registers**: five general byte registers (`a`, `b`, `c`, `d`, `m`) and
//!   the byte halves of IP and SP (`ipl`, `iph`, `spl`, `sph`)
//! - **Flags**: `zero` and `carry`, set by arithmetic only
//! - **Memory**: 64 KiB, with `0xe000..=0xefff` routed to an [`io::IoDevice`]
//! - **Stack**: grows upward from `0xf000`
//! - **Entry point**: the little-endian address stored at `0x0000`
//!
//! # Modules
//!
//! - [`assembler`]: Two-pass assembly with namespaces, exports and aliases
//! - [`cpu`]: Fetch/decode/execute loop with cycle budgets and profiling
//! - [`disassembler`]: Byte image to mnemonic listing
//! - [`errors`]: Assembly and execution error types
//! - [`io`]: Memory-mapped device trait and the 16x16 screen with buttons
//! - [`isa`]: Instruction set definition and register names
//! - [`namespace`]: Qualified names and the namespace stack
//! - [`operand`]: Operand tokens, numeric literals and label halves
//! - [`parser`]: Line tokenizer and statement parser
//! - [`symbols`]: Label and alias table

pub mod assembler;
pub mod cpu;
pub mod disassembler;
pub mod errors;
pub mod io;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod namespace;
pub mod operand;
pub mod parser;
pub mod symbols;
