//! Namespace scopes for qualified label names.
//!
//! Names are stored as [`Path`]s of interned [`Segment`]s rather than dotted
//! strings. A segment produced by `private namespace` or `def` carries a
//! unique tag, which keeps same-named private scopes apart; [`Path::demangle`]
//! strips those tags to obtain the public name of a scope.

use std::collections::HashMap;
use std::fmt::Write;

/// Separator between path segments in source text.
pub const SEPARATOR: char = '.';
/// Leading segment that makes a name absolute.
pub const GLOBAL: &str = "global";
/// Leading segment that climbs one namespace level.
pub const PARENT: &str = "$";
/// Name given to `private namespace` without a name.
pub const ANONYMOUS: &str = "<anonymous>";

/// Interned segment name.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Symbol(u32);

/// String interner for segment names.
#[derive(Debug, Default)]
pub struct Interner {
    names: Vec<String>,
    ids: HashMap<String, Symbol>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(sym) = self.ids.get(name) {
            return *sym;
        }
        let sym = Symbol(self.names.len() as u32);
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), sym);
        sym
    }

    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.names[sym.0 as usize]
    }
}

/// One path component. `tag` is set for private scopes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Segment {
    pub name: Symbol,
    pub tag: Option<u32>,
}

impl Segment {
    pub const fn named(name: Symbol) -> Self {
        Self { name, tag: None }
    }
}

/// A fully-qualified name. The empty path is the root namespace.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Path(Vec<Segment>);

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// This path extended by untagged `names`.
    pub fn join(&self, names: &[Symbol]) -> Path {
        let mut segments = self.0.clone();
        segments.extend(names.iter().copied().map(Segment::named));
        Path(segments)
    }

    /// Strips unique tags. Returns `None` if any segment is anonymous,
    /// since such a scope has no public name.
    pub fn demangle(&self, anonymous: Symbol) -> Option<Path> {
        self.0
            .iter()
            .map(|seg| (seg.name != anonymous).then_some(Segment::named(seg.name)))
            .collect::<Option<Vec<_>>>()
            .map(Path)
    }

    /// Renders the path as `a.b#3.c`.
    pub fn display(&self, interner: &Interner) -> String {
        let mut out = String::new();
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(SEPARATOR);
            }
            out.push_str(interner.resolve(seg.name));
            if let Some(tag) = seg.tag {
                let _ = write!(out, "#{tag}");
            }
        }
        out
    }
}

/// A name as written in source: optional `global.` or leading `$.`
/// segments, then one or more dotted parts.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NameRef {
    /// Starts with `global`: resolved from the root.
    pub absolute: bool,
    /// Number of leading `$` segments.
    pub climb: usize,
    pub parts: Vec<String>,
}

impl NameRef {
    /// Parses `[global.|$.]*a.b.c`. With `allow_empty`, a bare `global`
    /// (no parts) is accepted.
    pub fn parse(text: &str, allow_empty: bool) -> Option<NameRef> {
        let mut name = NameRef::default();
        let mut segments = text.split(SEPARATOR).peekable();
        if segments.peek() == Some(&GLOBAL) {
            segments.next();
            name.absolute = true;
        }
        while !name.absolute && segments.peek() == Some(&PARENT) {
            segments.next();
            name.climb += 1;
        }
        for part in segments {
            if !is_identifier(part) {
                return None;
            }
            name.parts.push(part.to_string());
        }
        if name.parts.is_empty() && !(allow_empty && name.absolute) {
            return None;
        }
        Some(name)
    }

    /// Dotted parts without the `global`/`$` prefix.
    pub fn bare(&self) -> String {
        self.parts.join(".")
    }

    pub fn is_plain(&self) -> bool {
        !self.absolute && self.climb == 0
    }
}

/// Whether `text` is a valid single name segment: `[_a-zA-Z0-9]+`.
pub fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && text
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Stack of namespace frames.
///
/// A frame may hold several segments (`namespace A.B` pushes both as one
/// frame), so one `namespace pop` undoes one push. Tags come from a counter
/// that restarts with every stack, keeping assembly output deterministic.
#[derive(Debug, Default)]
pub struct NamespaceStack {
    segments: Vec<Segment>,
    /// Segment count of each frame.
    frames: Vec<usize>,
    next_tag: u32,
}

impl NamespaceStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn current(&self) -> Path {
        Path(self.segments.clone())
    }

    /// The namespace `levels` frames up from the current one, stopping at
    /// the root.
    pub fn ancestor(&self, levels: usize) -> Path {
        let keep = self.frames.len().saturating_sub(levels);
        let len: usize = self.frames[..keep].iter().sum();
        Path(self.segments[..len].to_vec())
    }

    pub fn push(&mut self, names: &[Symbol]) {
        self.segments
            .extend(names.iter().copied().map(Segment::named));
        self.frames.push(names.len());
    }

    /// Pushes `name` with a fresh unique tag.
    pub fn push_private(&mut self, name: Symbol) -> Segment {
        let segment = Segment {
            name,
            tag: Some(self.next_tag),
        };
        self.next_tag += 1;
        self.segments.push(segment);
        self.frames.push(1);
        segment
    }

    /// Pops one frame. Returns `false` at the root.
    pub fn pop(&mut self) -> bool {
        let Some(count) = self.frames.pop() else {
            return false;
        };
        self.segments.truncate(self.segments.len() - count);
        true
    }

    /// Replaces the whole stack with `names`, one frame per segment.
    pub fn reset(&mut self, names: &[Symbol]) {
        self.segments.clear();
        self.frames.clear();
        for name in names {
            self.push(std::slice::from_ref(name));
        }
    }
}
