use crate::toolchain::errors::AsmErrorKind;
use crate::toolchain::isa::{OperandKind, Register};
use crate::toolchain::namespace::{NameRef, Path};

/// Prefix of a low-byte label operand (`:name`).
const LOW_PREFIX: char = ':';
/// Suffix of a high-byte label operand (`name:`).
const HIGH_SUFFIX: char = ':';
/// Prefix expanding to both halves (`%name` = `:name name:`).
const BOTH_PREFIX: char = '%';

/// Which byte of a 16-bit label address an operand selects.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Half {
    Low,
    High,
}

impl Half {
    pub const fn select(&self, address: u16) -> u8 {
        let [lo, hi] = address.to_le_bytes();
        match self {
            Half::Low => lo,
            Half::High => hi,
        }
    }
}

/// One operand byte as written in source.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Arg {
    /// Numeric literal, already reduced modulo 256.
    Literal(u8),
    Register(Register),
    Label { name: NameRef, half: Half },
}

impl Arg {
    /// Whether this argument may fill a slot of `kind`.
    ///
    /// Register slots take a register name or a raw index literal; immediate
    /// slots take literals and label halves.
    pub fn fits(&self, kind: OperandKind) -> bool {
        matches!(
            (self, kind),
            (Arg::Literal(_), _)
                | (Arg::Register(_), OperandKind::Reg)
                | (Arg::Label { .. }, OperandKind::Imm)
        )
    }
}

/// An emitted byte, either final or waiting for pass 2.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operand {
    Byte(u8),
    /// Half of the address bound to `target`, which was qualified against
    /// the namespace of the referencing line.
    Label {
        target: Path,
        half: Half,
        line: usize,
        column: usize,
    },
}

/// Parses a numeric literal: decimal, `0x` hex or `0b` binary, with an
/// optional leading `-`. The value is reduced modulo 256.
pub fn parse_number(tok: &str) -> Option<u8> {
    let (negative, digits) = match tok.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, tok),
    };
    let (radix, body) = if let Some(hex) = digits.strip_prefix("0x") {
        (16, hex)
    } else if let Some(bin) = digits.strip_prefix("0b") {
        (2, bin)
    } else {
        (10, digits)
    };
    if body.is_empty() {
        return None;
    }
    // Reduce while folding so literal length never overflows.
    let value = body.chars().try_fold(0u32, |acc, c| {
        c.to_digit(radix).map(|d| (acc * radix + d) % 256)
    })?;
    let value = value as u8;
    Some(if negative { value.wrapping_neg() } else { value })
}

fn label(text: &str, half: Half) -> Result<Arg, AsmErrorKind> {
    NameRef::parse(text, false)
        .map(|name| Arg::Label { name, half })
        .ok_or_else(|| invalid(text))
}

fn invalid(tok: &str) -> AsmErrorKind {
    AsmErrorKind::InvalidOperand {
        operand: tok.to_string(),
        expected: "a number, a register or a label reference",
    }
}

/// Parses one operand token. `%name` expands to two arguments.
pub fn parse_arg(tok: &str) -> Result<Vec<Arg>, AsmErrorKind> {
    if let Some(name) = tok.strip_prefix(BOTH_PREFIX) {
        return Ok(vec![label(name, Half::Low)?, label(name, Half::High)?]);
    }
    if let Some(name) = tok.strip_prefix(LOW_PREFIX) {
        return Ok(vec![label(name, Half::Low)?]);
    }
    if let Some(name) = tok.strip_suffix(HIGH_SUFFIX) {
        return Ok(vec![label(name, Half::High)?]);
    }
    if let Some(value) = parse_number(tok) {
        return Ok(vec![Arg::Literal(value)]);
    }
    if let Some(reg) = Register::from_name(tok) {
        return Ok(vec![Arg::Register(reg)]);
    }
    Err(invalid(tok))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_wrap_modulo_256() {
        assert_eq!(parse_number("300"), Some(44));
        assert_eq!(parse_number("-1"), Some(255));
        assert_eq!(parse_number("-256"), Some(0));
        assert_eq!(parse_number("0xff"), Some(255));
        assert_eq!(parse_number("0x1ff"), Some(255));
        assert_eq!(parse_number("0b101"), Some(5));
        assert_eq!(parse_number("-0x10"), Some(240));
    }

    #[test]
    fn long_literals_still_reduce() {
        assert_eq!(parse_number("99999999999999999999"), Some(255));
        assert_eq!(parse_number("-0x123456789abcdef0123"), Some(221));
        assert_eq!(parse_number(&format!("0b1{}", "0".repeat(80))), Some(0));
    }

    #[test]
    fn malformed_numbers_rejected() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("0x"), None);
        assert_eq!(parse_number("12a"), None);
        assert_eq!(parse_number("0b2"), None);
        assert_eq!(parse_number("+5"), None);
        assert_eq!(parse_number("0x-5"), None);
    }

    #[test]
    fn percent_expands_to_both_halves() {
        let args = parse_arg("%Game.main").unwrap();
        assert_eq!(args.len(), 2);
        assert!(matches!(&args[0], Arg::Label { half: Half::Low, name } if name.bare() == "Game.main"));
        assert!(matches!(&args[1], Arg::Label { half: Half::High, .. }));
    }

    #[test]
    fn label_halves_and_registers() {
        assert!(matches!(
            parse_arg(":coordinates").unwrap().as_slice(),
            [Arg::Label { half: Half::Low, .. }]
        ));
        assert!(matches!(
            parse_arg("coordinates:").unwrap().as_slice(),
            [Arg::Label { half: Half::High, .. }]
        ));
        assert_eq!(parse_arg("m").unwrap(), vec![Arg::Register(Register::M)]);
        assert_eq!(parse_arg("0x10").unwrap(), vec![Arg::Literal(0x10)]);
    }

    #[test]
    fn bad_tokens_are_invalid_operands() {
        assert!(matches!(parse_arg("r1"), Err(AsmErrorKind::InvalidOperand { .. })));
        assert!(matches!(parse_arg(":"), Err(AsmErrorKind::InvalidOperand { .. })));
        assert!(matches!(parse_arg("%a..b"), Err(AsmErrorKind::InvalidOperand { .. })));
    }

    #[test]
    fn half_select() {
        assert_eq!(Half::Low.select(0x1234), 0x34);
        assert_eq!(Half::High.select(0x1234), 0x12);
    }

    #[test]
    fn arg_fits_slot_kinds() {
        let label = parse_arg(":x").unwrap().remove(0);
        assert!(Arg::Literal(3).fits(OperandKind::Reg));
        assert!(Arg::Register(Register::A).fits(OperandKind::Reg));
        assert!(!Arg::Register(Register::A).fits(OperandKind::Imm));
        assert!(label.fits(OperandKind::Imm));
        assert!(!label.fits(OperandKind::Reg));
    }
}
