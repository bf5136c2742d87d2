//! Line tokenizer and parser.
//!
//! Every source line is one of a closed set of forms, parsed into a [`Line`]:
//!
//! ```text
//! # comment
//! .name [public [as alias]]
//! namespace <name> | private namespace [<name>] | namespace pop
//! namespace reset [<path> | global]
//! def <name> [public [as alias]]        (also: sub <name> ...)
//! export <name> [as <alias>]
//! use <name> [as <alias>]
//! dat <byte>...
//! <mnemonic> <operand>...
//! ```

use crate::toolchain::errors::{AsmError, AsmErrorKind};
use crate::toolchain::isa::{Instruction, Mnemonic, OperandKind};
use crate::toolchain::namespace::{NameRef, is_identifier};
use crate::toolchain::operand::{Arg, parse_arg};

const COMMENT_CHAR: char = '#';
const LABEL_PREFIX: char = '.';

const KW_NAMESPACE: &str = "namespace";
const KW_PRIVATE: &str = "private";
const KW_POP: &str = "pop";
const KW_RESET: &str = "reset";
const KW_DEF: &str = "def";
const KW_SUB: &str = "sub";
const KW_PUBLIC: &str = "public";
const KW_AS: &str = "as";
const KW_EXPORT: &str = "export";
const KW_USE: &str = "use";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    /// 1-based column in the line.
    pub offset: usize,
}

/// Splits a line into whitespace-separated tokens, dropping any `#` comment.
pub fn tokenize(line: &str) -> Vec<Token<'_>> {
    let code = match line.find(COMMENT_CHAR) {
        Some(pos) => &line[..pos],
        None => line,
    };
    let mut out = Vec::with_capacity(4);
    // Byte index and character column of the token being scanned.
    let mut start: Option<(usize, usize)> = None;
    for (col, (i, c)) in code.char_indices().enumerate() {
        match (c.is_whitespace(), start) {
            (true, Some((s, first))) => {
                out.push(Token {
                    text: &code[s..i],
                    offset: first + 1,
                });
                start = None;
            }
            (false, None) => start = Some((i, col)),
            _ => {}
        }
    }
    if let Some((s, first)) = start {
        out.push(Token {
            text: &code[s..],
            offset: first + 1,
        });
    }
    out
}

/// Whether a declared label is re-exported under its public name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Private,
    /// `public [as alias]`
    Public { alias: Option<NameRef> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceOp<'a> {
    /// `namespace A.B`
    Push(NameRef),
    /// `private namespace [A]`
    Private(Option<&'a str>),
    /// `namespace pop`
    Pop,
    /// `namespace reset [path | global]`; an empty path is the root.
    Reset(NameRef),
}

/// An operand with the token it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located<'a> {
    pub arg: Arg,
    pub token: Token<'a>,
}

/// One parsed source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    Empty,
    Label {
        name: &'a str,
        visibility: Visibility,
    },
    Namespace(NamespaceOp<'a>),
    /// `def` / `sub`: label plus a private namespace of the same name.
    Def {
        name: &'a str,
        visibility: Visibility,
    },
    Export {
        name: NameRef,
        alias: Option<NameRef>,
    },
    Use {
        name: NameRef,
        alias: Option<NameRef>,
    },
    Data(Vec<Located<'a>>),
    Instruction {
        instr: Instruction,
        args: Vec<Located<'a>>,
    },
}

/// Recursive-descent cursor over one line's tokens.
struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    line_no: usize,
    text: &'a str,
}

impl<'a> Parser<'a> {
    fn next(&mut self) -> Option<Token<'a>> {
        let tok = self.tokens.get(self.pos).copied();
        self.pos += 1;
        tok
    }

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn error(&self, tok: Option<Token<'a>>, kind: AsmErrorKind) -> AsmError {
        let err = AsmError::new(self.line_no, self.text, kind);
        match tok {
            Some(tok) => err.with_column(tok.offset),
            None => err,
        }
    }

    fn syntax(&self, tok: Option<Token<'a>>, message: impl Into<String>) -> AsmError {
        self.error(tok, AsmErrorKind::Syntax(message.into()))
    }

    fn expect_end(&mut self) -> Result<(), AsmError> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(self.syntax(
                Some(tok),
                format!("unexpected `{}` at end of line", tok.text),
            )),
        }
    }

    /// Consumes `keyword` if it is the next token.
    fn accept(&mut self, keyword: &str) -> bool {
        if self.peek().is_some_and(|t| t.text == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn identifier(&mut self, what: &str) -> Result<&'a str, AsmError> {
        match self.next() {
            Some(tok) if is_identifier(tok.text) => Ok(tok.text),
            Some(tok) => Err(self.syntax(Some(tok), format!("invalid {what} `{}`", tok.text))),
            None => Err(self.syntax(None, format!("missing {what}"))),
        }
    }

    /// A dotted name. `plain` rejects `global.` and `$.` prefixes.
    fn name(&mut self, what: &str, plain: bool) -> Result<NameRef, AsmError> {
        let Some(tok) = self.next() else {
            return Err(self.syntax(None, format!("missing {what}")));
        };
        match NameRef::parse(tok.text, false) {
            Some(name) if !plain || name.is_plain() => Ok(name),
            _ => Err(self.syntax(Some(tok), format!("invalid {what} `{}`", tok.text))),
        }
    }

    /// `[as alias]`
    fn alias(&mut self) -> Result<Option<NameRef>, AsmError> {
        if self.accept(KW_AS) {
            Ok(Some(self.name("alias", true)?))
        } else {
            Ok(None)
        }
    }

    /// `[public [as alias]]`
    fn visibility(&mut self) -> Result<Visibility, AsmError> {
        if self.accept(KW_PUBLIC) {
            Ok(Visibility::Public {
                alias: self.alias()?,
            })
        } else {
            Ok(Visibility::Private)
        }
    }

    fn line(&mut self) -> Result<Line<'a>, AsmError> {
        let Some(first) = self.next() else {
            return Ok(Line::Empty);
        };
        let line = match first.text {
            text if text.starts_with(LABEL_PREFIX) => {
                let name = &text[LABEL_PREFIX.len_utf8()..];
                if !is_identifier(name) {
                    return Err(self.syntax(Some(first), format!("invalid label `{text}`")));
                }
                Line::Label {
                    name,
                    visibility: self.visibility()?,
                }
            }
            KW_NAMESPACE => Line::Namespace(self.namespace()?),
            KW_PRIVATE => {
                if !self.accept(KW_NAMESPACE) {
                    return Err(self.syntax(self.peek(), "expected `namespace` after `private`"));
                }
                let name = match self.peek() {
                    Some(_) => Some(self.identifier("namespace name")?),
                    None => None,
                };
                Line::Namespace(NamespaceOp::Private(name))
            }
            KW_DEF => self.subroutine()?,
            // `sub a b` is the instruction; `sub name [public ...]` declares.
            KW_SUB
                if self.tokens.len() == 2
                    || self.tokens.get(2).is_some_and(|t| t.text == KW_PUBLIC) =>
            {
                self.subroutine()?
            }
            KW_EXPORT => Line::Export {
                name: self.name("export name", true)?,
                alias: self.alias()?,
            },
            KW_USE => Line::Use {
                name: self.name("name", false)?,
                alias: self.alias()?,
            },
            _ => return self.instruction(first),
        };
        self.expect_end()?;
        Ok(line)
    }

    fn subroutine(&mut self) -> Result<Line<'a>, AsmError> {
        Ok(Line::Def {
            name: self.identifier("subroutine name")?,
            visibility: self.visibility()?,
        })
    }

    fn namespace(&mut self) -> Result<NamespaceOp<'a>, AsmError> {
        if self.accept(KW_POP) {
            return Ok(NamespaceOp::Pop);
        }
        if self.accept(KW_RESET) {
            let Some(tok) = self.next() else {
                return Ok(NamespaceOp::Reset(NameRef {
                    absolute: true,
                    ..NameRef::default()
                }));
            };
            return match NameRef::parse(tok.text, true) {
                Some(path) if path.climb == 0 => Ok(NamespaceOp::Reset(path)),
                _ => Err(self.syntax(Some(tok), format!("invalid namespace path `{}`", tok.text))),
            };
        }
        Ok(NamespaceOp::Push(self.name("namespace name", true)?))
    }

    fn operands(&mut self) -> Result<Vec<Located<'a>>, AsmError> {
        let mut out = Vec::with_capacity(self.tokens.len());
        while let Some(tok) = self.next() {
            let args = parse_arg(tok.text).map_err(|kind| self.error(Some(tok), kind))?;
            out.extend(args.into_iter().map(|arg| Located { arg, token: tok }));
        }
        Ok(out)
    }

    fn check_kind(&self, located: &Located<'a>, kind: OperandKind) -> Result<(), AsmError> {
        if located.arg.fits(kind) {
            return Ok(());
        }
        let expected = match kind {
            OperandKind::Reg => "a register",
            OperandKind::Imm => "an immediate",
        };
        Err(self.error(
            Some(located.token),
            AsmErrorKind::InvalidOperand {
                operand: located.token.text.to_string(),
                expected,
            },
        ))
    }

    fn instruction(&mut self, first: Token<'a>) -> Result<Line<'a>, AsmError> {
        let mnemonic = Mnemonic::lookup(first.text).ok_or_else(|| {
            self.error(
                Some(first),
                AsmErrorKind::UnknownMnemonic(first.text.to_string()),
            )
        })?;
        let args = self.operands()?;
        match mnemonic {
            Mnemonic::Dat => {
                for located in &args {
                    self.check_kind(located, OperandKind::Imm)?;
                }
                Ok(Line::Data(args))
            }
            Mnemonic::Op(instr) => {
                let kinds = instr.operands();
                if args.len() != kinds.len() {
                    return Err(self.error(
                        Some(first),
                        AsmErrorKind::ArityMismatch {
                            mnemonic: instr.mnemonic(),
                            expected: kinds.len(),
                            found: args.len(),
                        },
                    ));
                }
                for (located, kind) in args.iter().zip(kinds) {
                    self.check_kind(located, *kind)?;
                }
                Ok(Line::Instruction { instr, args })
            }
        }
    }
}

/// Parses one source line. `line_no` is 1-based and only used for errors.
pub fn parse_line(line_no: usize, text: &str) -> Result<Line<'_>, AsmError> {
    Parser {
        tokens: tokenize(text),
        pos: 0,
        line_no,
        text,
    }
    .line()
}
