//! Byte image to mnemonic listing, driven by the same ISA table as the
//! assembler and CPU.
//!
//! Every rendered line is valid assembler input: register operands print as
//! register names, immediates as hex bytes, and anything that does not decode
//! (unknown opcode, truncated instruction) as a `dat` line.

use crate::toolchain::isa::{DATA_MNEMONIC, Instruction, OperandKind, Register};
use std::fmt;

/// One decoded instruction or data run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DisasmLine {
    pub address: u16,
    pub bytes: Vec<u8>,
    pub text: String,
}

impl fmt::Display for DisasmLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex: Vec<_> = self.bytes.iter().map(|b| format!("{b:02x}")).collect();
        write!(f, "{:04x}:  {:<10}  {}", self.address, hex.join(" "), self.text)
    }
}

fn render_operand(kind: OperandKind, byte: u8) -> String {
    match (kind, Register::from_index(byte)) {
        (OperandKind::Reg, Some(reg)) => reg.name().to_string(),
        (OperandKind::Reg, None) => byte.to_string(),
        (OperandKind::Imm, _) => format!("{byte:#04x}"),
    }
}

fn data_line(bytes: &[u8]) -> String {
    let mut text = DATA_MNEMONIC.to_string();
    for b in bytes {
        text.push(' ');
        text.push_str(&format!("{b:#04x}"));
    }
    text
}

/// Decodes the instruction at `offset`, returning its text and length.
///
/// `offset` must be inside `bytes`.
pub fn decode(bytes: &[u8], offset: usize) -> (String, usize) {
    let opcode = bytes[offset];
    let Ok(instr) = Instruction::try_from(opcode) else {
        return (data_line(&bytes[offset..=offset]), 1);
    };
    let Some(operands) = bytes.get(offset + 1..offset + instr.size()) else {
        let rest = &bytes[offset..];
        return (data_line(rest), rest.len());
    };
    let mut text = instr.mnemonic().to_string();
    for (kind, byte) in instr.operands().iter().zip(operands) {
        text.push(' ');
        text.push_str(&render_operand(*kind, *byte));
    }
    (text, instr.size())
}

/// Disassembles a whole image loaded at `origin`.
pub fn disassemble(bytes: &[u8], origin: u16) -> Vec<DisasmLine> {
    let mut out = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let (text, len) = decode(bytes, offset);
        out.push(DisasmLine {
            address: origin.wrapping_add(offset as u16),
            bytes: bytes[offset..offset + len].to_vec(),
            text,
        });
        offset += len;
    }
    out
}

/// Renders a full listing, one line per instruction.
pub fn listing(bytes: &[u8], origin: u16) -> String {
    disassemble(bytes, origin)
        .iter()
        .map(|line| format!("{line}\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::assembler::assemble;

    #[test]
    fn decode_uses_register_names_and_hex_immediates() {
        assert_eq!(decode(&[0x00, 4, 16], 0), ("num m 0x10".to_string(), 3));
        assert_eq!(decode(&[0x0a], 0), ("ret".to_string(), 1));
        assert_eq!(decode(&[0x01, 9, 0], 0), ("mov 9 a".to_string(), 3));
    }

    #[test]
    fn unknown_and_truncated_become_data() {
        assert_eq!(decode(&[0x42], 0), ("dat 0x42".to_string(), 1));
        assert_eq!(decode(&[0x02, 0x10], 0), ("dat 0x02 0x10".to_string(), 2));
    }

    #[test]
    fn disassembly_reproduces_mnemonics() {
        let src = ".top\nnum a 3\ndec a\njnz %top\nclc %top\nhlt";
        let bytes = assemble(src, 0x10).unwrap();
        let lines = disassemble(&bytes, 0x10);
        let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(
            texts,
            [
                "num a 0x03",
                "dec a",
                "jnz 0x10 0x00",
                "clc 0x10 0x00",
                "hlt"
            ]
        );
        assert_eq!(lines[2].address, 0x15);
    }

    #[test]
    fn listing_reassembles_to_same_bytes() {
        let bytes = assemble("psh c\nofg c 3\nmul c m\ndat 7 0x42\nser c d", 0).unwrap();
        let source: String = disassemble(&bytes, 0)
            .into_iter()
            .map(|l| l.text + "\n")
            .collect();
        assert_eq!(assemble(&source, 0).unwrap(), bytes);
    }

    #[test]
    fn listing_format() {
        let text = listing(&[0x02, 0x13, 0x00], 0x10);
        assert_eq!(text, "0010:  02 13 00    jmp 0x13 0x00\n");
    }
}
