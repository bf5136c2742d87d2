//! Two-pass macro-assembler.
//!
//! Converts namespaced assembly source into the byte image executed by
//! [`Cpu`](crate::toolchain::cpu::Cpu).
//!
//! # Passes
//!
//! 1. Walk the source line by line, maintaining the namespace stack. Every
//!    opcode and literal becomes a final byte; every label operand becomes a
//!    deferred [`Operand::Label`] holding the fully-qualified target. Label,
//!    `use` and `export` lines bind names in the [`LabelTable`].
//! 2. Check that every alias resolves, then evaluate the deferred operands
//!    against the completed table.
//!
//! Label addresses are absolute: the first emitted byte sits at the mount
//! address.
//!
//! # Namespaces
//!
//! ```text
//! namespace Game
//!     def main public        # Game.main, body in a private scope
//!     use Player.x as x      # resolved from the parent scope (Game)
//!     use $.Player.y as y    # each `$` climbs one more level
//!         gec %x
//!         hlt
//!     namespace pop
//! namespace pop
//! ```

use crate::toolchain::errors::{AsmError, AsmErrorKind};
use crate::toolchain::namespace::{ANONYMOUS, Interner, NameRef, NamespaceStack, Path, Symbol};
use crate::toolchain::operand::{Arg, Operand};
use crate::toolchain::parser::{Line, Located, NamespaceOp, Visibility, parse_line};
use crate::toolchain::symbols::{Binding, LabelTable, Unresolved};
use crate::{debug, error};
use std::fmt::Write;
use std::fs;

/// Mount address used by the bundled tools when none is given.
pub const DEFAULT_MOUNT_ADDRESS: u16 = 0x10;

/// Size of the CPU's address space.
const ADDRESS_SPACE: usize = 0x1_0000;

/// Formats a compiler-style diagnostic for an assembly failure.
pub fn render_assembly_diagnostic(file: &str, err: &AsmError) -> String {
    let mut diag = String::new();
    let _ = writeln!(diag, "error: {}", err.kind);
    if err.line == 0 {
        let _ = writeln!(diag, " --> {file}");
        return diag;
    }

    let line_text = err.text.trim_end_matches('\r');
    // Columns count characters, not bytes.
    let column = match err.column {
        0 => line_text.chars().take_while(|c| c.is_whitespace()).count() + 1,
        col => col,
    };
    let _ = writeln!(diag, " --> {file}:{}:{column}", err.line);
    let underline = " ".repeat(column.saturating_sub(1));
    let _ = writeln!(diag, "     |");
    let _ = writeln!(diag, "{:>4} | {}", err.line, line_text);
    let _ = writeln!(diag, "     | {}^", underline);
    diag
}

/// Emit a diagnostic for assembly errors through the logger.
fn log_assembly_error(file: &str, err: &AsmError) {
    error!("{}", render_assembly_diagnostic(file, err).trim_end());
}

/// Output of a successful assembly.
#[derive(Debug, Clone)]
pub struct Assembly {
    bytes: Vec<u8>,
    mount: u16,
    /// Every bound name with its resolved address, sorted by address.
    symbols: Vec<(String, u16)>,
}

impl Assembly {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn mount(&self) -> u16 {
        self.mount
    }

    /// Resolved symbol table, sorted by address then name. Private scopes
    /// render with their unique tag (`main#3.skip`).
    pub fn symbols(&self) -> &[(String, u16)] {
        &self.symbols
    }

    /// Address of a fully-qualified name, as rendered in [`Assembly::symbols`].
    pub fn lookup(&self, name: &str) -> Option<u16> {
        self.symbols
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, addr)| *addr)
    }
}

/// Assembly state for one source unit.
struct Assembler<'src> {
    lines: Vec<&'src str>,
    interner: Interner,
    scope: NamespaceStack,
    labels: LabelTable,
    operands: Vec<Operand>,
    mount: u16,
    anonymous: Symbol,
}

impl<'src> Assembler<'src> {
    fn new(source: &'src str, mount: u16) -> Self {
        let mut interner = Interner::new();
        let anonymous = interner.intern(ANONYMOUS);
        Self {
            lines: source.lines().collect(),
            interner,
            scope: NamespaceStack::new(),
            labels: LabelTable::new(),
            operands: Vec::new(),
            mount,
            anonymous,
        }
    }

    fn err(&self, line_no: usize, kind: AsmErrorKind) -> AsmError {
        let text = self.lines.get(line_no.wrapping_sub(1)).copied().unwrap_or("");
        AsmError::new(line_no, text, kind)
    }

    fn render(&self, path: &Path) -> String {
        path.display(&self.interner)
    }

    fn intern_all(&mut self, parts: &[String]) -> Vec<Symbol> {
        parts.iter().map(|p| self.interner.intern(p)).collect()
    }

    /// Absolute address of the next emitted byte.
    fn address(&self) -> usize {
        self.mount as usize + self.operands.len()
    }

    fn check_size(&self, line_no: usize) -> Result<(), AsmError> {
        if self.address() > ADDRESS_SPACE {
            return Err(self.err(
                line_no,
                AsmErrorKind::ProgramTooLarge {
                    mount: self.mount,
                    size: self.operands.len(),
                },
            ));
        }
        Ok(())
    }

    /// Address for a label declared on `line_no`.
    fn here(&self, line_no: usize) -> Result<u16, AsmError> {
        u16::try_from(self.address()).map_err(|_| {
            self.err(
                line_no,
                AsmErrorKind::ProgramTooLarge {
                    mount: self.mount,
                    size: self.operands.len(),
                },
            )
        })
    }

    fn define(&mut self, line_no: usize, name: Path, binding: Binding) -> Result<(), AsmError> {
        if self.labels.define(name.clone(), binding, line_no) {
            Ok(())
        } else {
            Err(self.err(line_no, AsmErrorKind::DuplicateLabel(self.render(&name))))
        }
    }

    /// Scope a reference is resolved against: the root for `global.` names,
    /// otherwise `levels` frames up plus one per leading `$`.
    fn base(&self, name: &NameRef, levels: usize) -> Path {
        if name.absolute {
            Path::root()
        } else {
            self.scope.ancestor(levels + name.climb)
        }
    }

    /// Binds `demangle(current).alias` to a just-declared label.
    fn export_public(
        &mut self,
        line_no: usize,
        declared: &Path,
        name: &str,
        alias: Option<NameRef>,
    ) -> Result<(), AsmError> {
        let public = self
            .scope
            .current()
            .demangle(self.anonymous)
            .ok_or_else(|| self.err(line_no, AsmErrorKind::ExportFromAnonymous(name.to_string())))?;
        let parts = match alias {
            Some(alias) => alias.parts,
            None => vec![name.to_string()],
        };
        let target = public.join(&self.intern_all(&parts));
        if &target == declared {
            return Ok(());
        }
        self.define(line_no, target, Binding::Alias(declared.clone()))
    }

    /// Declares `name` at the current address, exporting it if public.
    fn declare(&mut self, line_no: usize, name: &str, visibility: Visibility) -> Result<Symbol, AsmError> {
        let sym = self.interner.intern(name);
        let declared = self.scope.current().join(&[sym]);
        let address = self.here(line_no)?;
        self.define(line_no, declared.clone(), Binding::Address(address))?;
        if let Visibility::Public { alias } = visibility {
            self.export_public(line_no, &declared, name, alias)?;
        }
        Ok(sym)
    }

    fn emit_args(&mut self, line_no: usize, args: Vec<Located<'_>>) {
        for located in args {
            let operand = match located.arg {
                Arg::Literal(value) => Operand::Byte(value),
                Arg::Register(reg) => Operand::Byte(reg.index()),
                Arg::Label { name, half } => {
                    let names = self.intern_all(&name.parts);
                    Operand::Label {
                        target: self.base(&name, 0).join(&names),
                        half,
                        line: line_no,
                        column: located.token.offset,
                    }
                }
            };
            self.operands.push(operand);
        }
    }

    fn namespace(&mut self, line_no: usize, op: NamespaceOp<'_>) -> Result<(), AsmError> {
        match op {
            NamespaceOp::Push(name) => {
                let names = self.intern_all(&name.parts);
                self.scope.push(&names);
            }
            NamespaceOp::Private(name) => {
                let sym = self.interner.intern(name.unwrap_or(ANONYMOUS));
                self.scope.push_private(sym);
            }
            NamespaceOp::Pop => {
                if !self.scope.pop() {
                    return Err(self.err(line_no, AsmErrorKind::PopRoot));
                }
            }
            NamespaceOp::Reset(path) => {
                let names = self.intern_all(&path.parts);
                self.scope.reset(&names);
            }
        }
        Ok(())
    }

    fn line(&mut self, line_no: usize, line: Line<'_>) -> Result<(), AsmError> {
        match line {
            Line::Empty => {}
            Line::Label { name, visibility } => {
                self.declare(line_no, name, visibility)?;
            }
            Line::Def { name, visibility } => {
                let sym = self.declare(line_no, name, visibility)?;
                self.scope.push_private(sym);
            }
            Line::Namespace(op) => self.namespace(line_no, op)?,
            Line::Export { name, alias } => {
                if self.scope.depth() == 0 {
                    return Err(self.err(line_no, AsmErrorKind::ExportFromRoot(name.bare())));
                }
                let names = self.intern_all(&name.parts);
                let target = self.scope.current().join(&names);
                let alias = self.intern_all(&alias.unwrap_or(name).parts);
                let exported = self.scope.ancestor(1).join(&alias);
                self.define(line_no, exported, Binding::Alias(target))?;
            }
            Line::Use { name, alias } => {
                let names = self.intern_all(&name.parts);
                let target = self.base(&name, 1).join(&names);
                let alias = match alias {
                    Some(alias) => self.intern_all(&alias.parts),
                    None => names,
                };
                let local = self.scope.current().join(&alias);
                self.define(line_no, local, Binding::Alias(target))?;
            }
            Line::Data(args) => {
                self.emit_args(line_no, args);
                self.check_size(line_no)?;
            }
            Line::Instruction { instr, args } => {
                self.operands.push(Operand::Byte(instr.opcode()));
                self.emit_args(line_no, args);
                self.check_size(line_no)?;
            }
        }
        Ok(())
    }

    fn pass_one(&mut self) -> Result<(), AsmError> {
        let lines = self.lines.clone();
        for (idx, text) in lines.into_iter().enumerate() {
            let line_no = idx + 1;
            let line = parse_line(line_no, text)?;
            self.line(line_no, line)?;
        }
        Ok(())
    }

    fn unresolved(&self, line_no: usize, reason: Unresolved) -> AsmError {
        let kind = match reason {
            Unresolved::Missing(path) => AsmErrorKind::UndefinedLabel(self.render(&path)),
            Unresolved::Cycle(path) => AsmErrorKind::AliasCycle(self.render(&path)),
        };
        self.err(line_no, kind)
    }

    /// Every alias must lead to an address, referenced or not.
    fn check_aliases(&self) -> Result<(), AsmError> {
        for (name, entry) in self.labels.iter() {
            if let Binding::Alias(_) = entry.binding {
                self.labels
                    .resolve(name)
                    .map_err(|reason| self.unresolved(entry.line, reason))?;
            }
        }
        Ok(())
    }

    fn pass_two(&self) -> Result<Vec<u8>, AsmError> {
        self.operands
            .iter()
            .map(|operand| match operand {
                Operand::Byte(value) => Ok(*value),
                Operand::Label {
                    target,
                    half,
                    line,
                    column,
                } => self
                    .labels
                    .resolve(target)
                    .map(|address| half.select(address))
                    .map_err(|reason| self.unresolved(*line, reason).with_column(*column)),
            })
            .collect()
    }

    fn symbols(&self) -> Vec<(String, u16)> {
        let mut symbols: Vec<_> = self
            .labels
            .iter()
            .filter_map(|(name, _)| {
                self.labels
                    .resolve(name)
                    .ok()
                    .map(|addr| (self.render(name), addr))
            })
            .collect();
        symbols.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        symbols
    }

    fn finish(mut self) -> Result<Assembly, AsmError> {
        self.pass_one()?;
        self.check_aliases()?;
        let bytes = self.pass_two()?;
        debug!(
            "assembled {} bytes at {:#06x}, {} names bound",
            bytes.len(),
            self.mount,
            self.labels.len()
        );
        Ok(Assembly {
            bytes,
            mount: self.mount,
            symbols: self.symbols(),
        })
    }
}

/// Assembles `source` into raw bytes, with labels computed relative to
/// `mount`.
pub fn assemble(source: &str, mount: u16) -> Result<Vec<u8>, AsmError> {
    assemble_source(source, mount).map(Assembly::into_bytes)
}

/// Assembles `source` keeping the resolved symbol table.
pub fn assemble_source(source: &str, mount: u16) -> Result<Assembly, AsmError> {
    Assembler::new(source, mount).finish()
}

/// Assembles source with an associated filename for error diagnostics.
///
/// Logs a compiler-style diagnostic on failure.
fn assemble_source_with_name(source: &str, mount: u16, source_name: &str) -> Result<Assembly, AsmError> {
    let result = assemble_source(source, mount);
    if let Err(err) = &result {
        log_assembly_error(source_name, err);
    }
    result
}

/// Convenience: assemble directly from file path.
pub fn assemble_file<P: AsRef<std::path::Path>>(path: P, mount: u16) -> Result<Assembly, AsmError> {
    let path_ref = path.as_ref();
    let name = path_ref.display().to_string();
    let source = fs::read_to_string(path_ref).map_err(|e| {
        let err = AsmError::unit(AsmErrorKind::Io(format!("{name}: {e}")));
        log_assembly_error(&name, &err);
        err
    })?;
    assemble_source_with_name(&source, mount, &name)
}
