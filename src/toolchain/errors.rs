use minicpu_derive::Error;

/// Reasons an assembly unit is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmErrorKind {
    /// Line matches none of the grammar forms.
    #[error("syntax error: {0}")]
    Syntax(String),
    /// First token of an instruction line is not in the ISA table.
    #[error("unknown mnemonic `{0}`")]
    UnknownMnemonic(String),
    /// Wrong number of operand bytes after `%label` expansion.
    #[error("`{mnemonic}` expects {expected} operand(s), got {found}")]
    ArityMismatch {
        mnemonic: &'static str,
        expected: usize,
        found: usize,
    },
    /// Operand token is not valid for its slot.
    #[error("invalid operand `{operand}`: expected {expected}")]
    InvalidOperand {
        operand: String,
        expected: &'static str,
    },
    /// A qualified name was bound twice.
    #[error("duplicate label `{0}`")]
    DuplicateLabel(String),
    /// `namespace pop` with only the root left.
    #[error("cannot pop the root namespace")]
    PopRoot,
    /// Public export from a path containing an anonymous namespace.
    #[error("cannot export `{0}` from an anonymous namespace")]
    ExportFromAnonymous(String),
    /// `export` at root, where there is no parent to export into.
    #[error("cannot export `{0}` from the root namespace")]
    ExportFromRoot(String),
    /// Reference to a name that was never bound.
    #[error("undefined label `{0}`")]
    UndefinedLabel(String),
    /// `use`/`export` aliases that refer back to themselves.
    #[error("alias cycle through `{0}`")]
    AliasCycle(String),
    /// Assembled image does not fit in the address space.
    #[error("program of {size} bytes mounted at {mount:#06x} exceeds the address space")]
    ProgramTooLarge { mount: u16, size: usize },
    /// Source file could not be read.
    #[error("io error: {0}")]
    Io(String),
}

/// An assembly failure with the source position it was raised at.
///
/// `line` is 1-based; 0 marks errors that belong to the whole unit
/// (unreadable file, oversized output). `column` is the 1-based column of
/// the offending token, 0 when the whole line is at fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct AsmError {
    pub line: usize,
    pub column: usize,
    pub text: String,
    pub kind: AsmErrorKind,
}

impl AsmError {
    pub fn new(line: usize, text: impl Into<String>, kind: AsmErrorKind) -> Self {
        Self {
            line,
            column: 0,
            text: text.into(),
            kind,
        }
    }

    pub fn with_column(mut self, column: usize) -> Self {
        self.column = column;
        self
    }

    /// Error not tied to a particular source line.
    pub fn unit(kind: AsmErrorKind) -> Self {
        Self::new(0, String::new(), kind)
    }
}

/// Fatal CPU faults. Both carry the address of the faulting instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuError {
    /// Stack, offset, fetch or load arithmetic left `0..=0xffff`.
    #[error("address {address} out of range (ip {ip:#06x})")]
    AddressOutOfRange { ip: u16, address: i64 },
    /// Opcode byte not in the instruction table.
    #[error("invalid opcode {opcode:#04x} (ip {ip:#06x})")]
    InvalidOpcode { ip: u16, opcode: u8 },
}

impl CpuError {
    /// Rebinds the fault to the instruction that raised it.
    pub fn at(self, ip: u16) -> Self {
        match self {
            CpuError::AddressOutOfRange { address, .. } => {
                CpuError::AddressOutOfRange { ip, address }
            }
            CpuError::InvalidOpcode { opcode, .. } => CpuError::InvalidOpcode { ip, opcode },
        }
    }
}

/// Top-level error used by the binaries.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Asm(#[from] AsmError),
    #[error("{0}")]
    Cpu(#[from] CpuError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
