use crate::toolchain::namespace::Path;
use std::collections::{HashMap, HashSet};

/// What a qualified name is bound to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Binding {
    /// Absolute address of a label.
    Address(u16),
    /// Another qualified name, produced by `use`, `export` and public labels.
    Alias(Path),
}

/// Binding plus the source line that created it.
#[derive(Clone, Debug)]
pub struct Entry {
    pub binding: Binding,
    pub line: usize,
}

/// Why a name could not be resolved to an address.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Unresolved {
    /// The name, or the end of its alias chain, was never bound.
    Missing(Path),
    /// The alias chain returns to a name already visited.
    Cycle(Path),
}

/// Append-only table of label bindings.
///
/// Aliases are stored unresolved and followed at lookup time, so a `use`
/// may name a label that is only defined further down the source.
#[derive(Debug, Default)]
pub struct LabelTable {
    entries: HashMap<Path, Entry>,
    /// Definition order, for deterministic iteration.
    order: Vec<Path>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name`. Returns `false` if it is already bound.
    pub fn define(&mut self, name: Path, binding: Binding, line: usize) -> bool {
        if self.entries.contains_key(&name) {
            return false;
        }
        self.order.push(name.clone());
        self.entries.insert(name, Entry { binding, line });
        true
    }

    pub fn get(&self, name: &Path) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Follows aliases from `name` to an address.
    pub fn resolve(&self, name: &Path) -> Result<u16, Unresolved> {
        let mut current = name;
        let mut visited = HashSet::new();
        loop {
            if !visited.insert(current) {
                return Err(Unresolved::Cycle(current.clone()));
            }
            match self.entries.get(current) {
                Some(Entry {
                    binding: Binding::Address(addr),
                    ..
                }) => return Ok(*addr),
                Some(Entry {
                    binding: Binding::Alias(target),
                    ..
                }) => current = target,
                None => return Err(Unresolved::Missing(current.clone())),
            }
        }
    }

    /// Iterates bindings in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &Entry)> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name).map(|entry| (name, entry)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::namespace::Interner;

    fn path(interner: &mut Interner, dotted: &str) -> Path {
        let names: Vec<_> = dotted.split('.').map(|n| interner.intern(n)).collect();
        Path::root().join(&names)
    }

    #[test]
    fn define_rejects_rebinding() {
        let mut interner = Interner::new();
        let mut table = LabelTable::new();
        let x = path(&mut interner, "Player.x");
        assert!(table.define(x.clone(), Binding::Address(0x20), 1));
        assert!(!table.define(x.clone(), Binding::Address(0x30), 2));
        assert_eq!(table.resolve(&x), Ok(0x20));
        assert_eq!(table.get(&x).map(|e| e.line), Some(1));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn alias_chains_resolve() {
        let mut interner = Interner::new();
        let mut table = LabelTable::new();
        let a = path(&mut interner, "a");
        let b = path(&mut interner, "b");
        let c = path(&mut interner, "c");
        table.define(a.clone(), Binding::Alias(b.clone()), 1);
        table.define(b.clone(), Binding::Alias(c.clone()), 2);
        table.define(c, Binding::Address(0x1234), 3);
        assert_eq!(table.resolve(&a), Ok(0x1234));
    }

    #[test]
    fn missing_and_cyclic_aliases() {
        let mut interner = Interner::new();
        let mut table = LabelTable::new();
        let a = path(&mut interner, "a");
        let b = path(&mut interner, "b");
        let ghost = path(&mut interner, "ghost");
        table.define(a.clone(), Binding::Alias(b.clone()), 1);
        table.define(b.clone(), Binding::Alias(a.clone()), 2);
        assert_eq!(table.resolve(&a), Err(Unresolved::Cycle(a.clone())));
        assert_eq!(table.resolve(&ghost), Err(Unresolved::Missing(ghost.clone())));
    }

    #[test]
    fn iter_follows_definition_order() {
        let mut interner = Interner::new();
        let mut table = LabelTable::new();
        for (i, name) in ["z", "a", "m"].iter().enumerate() {
            table.define(path(&mut interner, name), Binding::Address(i as u16), i + 1);
        }
        let lines: Vec<_> = table.iter().map(|(_, e)| e.line).collect();
        assert_eq!(lines, [1, 2, 3]);
        assert!(!table.is_empty());
    }
}
