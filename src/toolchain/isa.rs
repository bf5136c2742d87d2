//! Instruction Set Architecture (ISA) definitions.
//!
//! Defines the CPU's instruction set. The [`for_each_instruction!`](crate::for_each_instruction)
//! macro holds the canonical instruction definitions and invokes a callback macro
//! for code generation, so the assembler, the CPU decoder and the disassembler
//! all read the same table.
//!
//! This module generates:
//! - The [`Instruction`] enum with opcode mappings
//! - `TryFrom<u8>` for decoding opcodes
//! - Mnemonic lookup and per-instruction operand kinds
//!
//! # Encoding
//!
//! Every instruction is one opcode byte followed by one byte per operand.
//! An operand byte is either a register index (see [`Register`]) or an
//! immediate value. The `dat` pseudo-instruction has no opcode and emits its
//! operands verbatim.

use crate::toolchain::cpu::CycleCategory;
use crate::toolchain::errors::CpuError;

/// Mnemonic of the raw data pseudo-instruction.
pub const DATA_MNEMONIC: &str = "dat";

/// Invokes a callback macro with the complete instruction definition list.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Data move
            // =========================
            /// NUM reg, imm ; reg = imm
            Num = 0x00, "num" => [reg: Reg, value: Imm], DataMove,
            /// MOV dst, src ; dst = src
            Mov = 0x01, "mov" => [dst: Reg, src: Reg], DataMove,
            // =========================
            // Control flow
            // =========================
            /// JMP lo, hi ; ip = hi:lo
            Jmp = 0x02, "jmp" => [lo: Imm, hi: Imm], ControlFlow,
            /// JIN rlo, rhi ; ip = rhi:rlo
            Jin = 0x03, "jin" => [lo: Reg, hi: Reg], ControlFlow,
            /// JIZ lo, hi ; if zero then ip = hi:lo
            Jiz = 0x04, "jiz" => [lo: Imm, hi: Imm], ControlFlow,
            /// JNZ lo, hi ; if !zero then ip = hi:lo
            Jnz = 0x05, "jnz" => [lo: Imm, hi: Imm], ControlFlow,
            /// JIC lo, hi ; if carry then ip = hi:lo
            Jic = 0x06, "jic" => [lo: Imm, hi: Imm], ControlFlow,
            /// JNC lo, hi ; if !carry then ip = hi:lo
            Jnc = 0x07, "jnc" => [lo: Imm, hi: Imm], ControlFlow,
            /// CLC lo, hi ; push ip.lo, push ip.hi, ip = hi:lo
            Clc = 0x08, "clc" => [lo: Imm, hi: Imm], ControlFlow,
            /// CLR rlo, rhi ; push ip.lo, push ip.hi, ip = rhi:rlo
            Clr = 0x09, "clr" => [lo: Reg, hi: Reg], ControlFlow,
            /// RET ; pop ip.hi, pop ip.lo
            Ret = 0x0a, "ret" => [], ControlFlow,
            // =========================
            // Stack frame
            // =========================
            /// ALC n ; sp += n
            Alc = 0x0b, "alc" => [size: Imm], Stack,
            /// EAT n ; sp -= n
            Eat = 0x0c, "eat" => [size: Imm], Stack,
            /// OFG reg, k ; reg = mem[sp - k - 1]
            Ofg = 0x0d, "ofg" => [reg: Reg, offset: Imm], Stack,
            /// OFS reg, k ; mem[sp - k - 1] = reg
            Ofs = 0x0e, "ofs" => [reg: Reg, offset: Imm], Stack,
            /// POP reg ; sp -= 1, reg = mem[sp]
            Pop = 0x0f, "pop" => [reg: Reg], Stack,
            /// PSH reg ; mem[sp] = reg, sp += 1
            Psh = 0x10, "psh" => [reg: Reg], Stack,
            // =========================
            // Memory
            // =========================
            /// GEC lo, hi ; m = mem[hi:lo]
            Gec = 0x11, "gec" => [lo: Imm, hi: Imm], Memory,
            /// SEC lo, hi ; mem[hi:lo] = m
            Sec = 0x12, "sec" => [lo: Imm, hi: Imm], Memory,
            /// GER rlo, rhi ; m = mem[rhi:rlo]
            Ger = 0x13, "ger" => [lo: Reg, hi: Reg], Memory,
            /// SER rlo, rhi ; mem[rhi:rlo] = m
            Ser = 0x14, "ser" => [lo: Reg, hi: Reg], Memory,
            // =========================
            // Arithmetic / logic
            // =========================
            /// INC reg ; reg += 1 (flags)
            Inc = 0x15, "inc" => [reg: Reg], Arithmetic,
            /// DEC reg ; reg -= 1 (flags)
            Dec = 0x16, "dec" => [reg: Reg], Arithmetic,
            /// ADD dst, src ; dst += src (flags)
            Add = 0x17, "add" => [dst: Reg, src: Reg], Arithmetic,
            /// SUB dst, src ; dst -= src (flags)
            Sub = 0x18, "sub" => [dst: Reg, src: Reg], Arithmetic,
            /// MUL dst, src ; dst *= src (flags)
            Mul = 0x19, "mul" => [dst: Reg, src: Reg], Arithmetic,
            /// SHL dst, src ; dst <<= src
            Shl = 0x1a, "shl" => [dst: Reg, src: Reg], Arithmetic,
            /// SHR dst, src ; dst >>= src
            Shr = 0x1b, "shr" => [dst: Reg, src: Reg], Arithmetic,
            /// INL rlo, rhi ; rhi:rlo += 1 (16-bit, wrapping)
            Inl = 0x1c, "inl" => [lo: Reg, hi: Reg], Arithmetic,
            /// DEL rlo, rhi ; rhi:rlo -= 1 (16-bit, wrapping)
            Del = 0x1d, "del" => [lo: Reg, hi: Reg], Arithmetic,
            // =========================
            // Halt
            // =========================
            /// HLT ; stop execution
            Hlt = 0xff, "hlt" => [], Halt,
        }
    };
}

/// Kind of a single operand byte.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OperandKind {
    /// Register index.
    Reg,
    /// Immediate byte (literal or resolved label half).
    Imm,
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:expr, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ], $category:ident
        ),* $(,)?
    ) => {
        /// CPU instruction, discriminant = opcode.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u8> for Instruction {
            type Error = CpuError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Instruction::$name), )*
                    _ => Err(CpuError::InvalidOpcode { ip: 0, opcode: value }),
                }
            }
        }

        impl Instruction {
            /// Every instruction in opcode table order.
            pub const ALL: &'static [Instruction] = &[ $( Instruction::$name, )* ];

            /// Returns the opcode byte.
            pub const fn opcode(&self) -> u8 {
                *self as u8
            }

            /// Returns the assembly mnemonic for this instruction.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Instruction::$name => $mnemonic, )*
                }
            }

            /// Operand kinds, in encoding order.
            pub const fn operands(&self) -> &'static [OperandKind] {
                match self {
                    $( Instruction::$name => &[ $( OperandKind::$kind ),* ], )*
                }
            }

            /// Encoded size in bytes (opcode + operands).
            pub const fn size(&self) -> usize {
                1 + self.operands().len()
            }

            /// Profiling category of this instruction.
            pub const fn category(&self) -> CycleCategory {
                match self {
                    $( Instruction::$name => CycleCategory::$category, )*
                }
            }

            /// Looks up an instruction by its (lowercase) mnemonic.
            pub fn from_mnemonic(name: &str) -> Option<Instruction> {
                match name {
                    $( $mnemonic => Some(Instruction::$name), )*
                    _ => None,
                }
            }
        }
    };
}

for_each_instruction!(define_instructions);

/// A line-leading mnemonic: a real instruction or the `dat` pseudo-instruction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Mnemonic {
    Op(Instruction),
    Dat,
}

impl Mnemonic {
    /// Looks up any mnemonic, including `dat`.
    pub fn lookup(name: &str) -> Option<Mnemonic> {
        if name == DATA_MNEMONIC {
            return Some(Mnemonic::Dat);
        }
        Instruction::from_mnemonic(name).map(Mnemonic::Op)
    }

    /// Opcode byte, `None` for `dat`.
    pub const fn opcode(&self) -> Option<u8> {
        match self {
            Mnemonic::Op(instr) => Some(instr.opcode()),
            Mnemonic::Dat => None,
        }
    }

    /// Operand kinds, `None` for `dat` (which takes any number of bytes).
    pub const fn operands(&self) -> Option<&'static [OperandKind]> {
        match self {
            Mnemonic::Op(instr) => Some(instr.operands()),
            Mnemonic::Dat => None,
        }
    }
}

/// The nine addressable 8-bit registers.
///
/// `Ipl`/`Iph` and `Spl`/`Sph` are the low/high halves of the 16-bit
/// instruction and stack pointers.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Register {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
    M = 4,
    Ipl = 5,
    Iph = 6,
    Spl = 7,
    Sph = 8,
}

impl Register {
    /// All registers in index order.
    pub const ALL: [Register; 9] = [
        Register::A,
        Register::B,
        Register::C,
        Register::D,
        Register::M,
        Register::Ipl,
        Register::Iph,
        Register::Spl,
        Register::Sph,
    ];

    /// Encoded register index.
    pub const fn index(&self) -> u8 {
        *self as u8
    }

    /// Assembly name of the register.
    pub const fn name(&self) -> &'static str {
        match self {
            Register::A => "a",
            Register::B => "b",
            Register::C => "c",
            Register::D => "d",
            Register::M => "m",
            Register::Ipl => "ipl",
            Register::Iph => "iph",
            Register::Spl => "spl",
            Register::Sph => "sph",
        }
    }

    pub fn from_name(name: &str) -> Option<Register> {
        Register::ALL.into_iter().find(|r| r.name() == name)
    }

    pub fn from_index(index: u8) -> Option<Register> {
        Register::ALL.get(index as usize).copied()
    }
}
