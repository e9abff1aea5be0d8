//! Top-level declarations: variables, types and units, in declaration order.

use crate::ast::SourceLoc;
use crate::value::{Type, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    Var,
    Type,
    Unit,
}

#[derive(Debug, Clone)]
pub(crate) enum Binding {
    Var(Value),
    Type(Type),
    /// Unit of `bits` bits; `value` is the `uint<64>` handed to clients.
    Unit { bits: u64, value: Value },
}

impl Binding {
    fn kind(&self) -> DeclKind {
        match self {
            Binding::Var(_) => DeclKind::Var,
            Binding::Type(_) => DeclKind::Type,
            Binding::Unit { .. } => DeclKind::Unit,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Decl {
    pub name: String,
    pub source: String,
    pub loc: SourceLoc,
    pub binding: Binding,
}

/// A declaration as seen by [`Compiler::map_declarations`](crate::Compiler::map_declarations).
#[derive(Debug, Clone, Copy)]
pub struct DeclInfo<'a> {
    pub kind: DeclKind,
    pub name: &'a str,
    /// Source text of the declaration.
    pub source: &'a str,
    pub loc: SourceLoc,
    /// Value of a variable or unit. Always `None` for types.
    pub value: Option<Value>,
}

/// Symbol table. Each kind has its own namespace; redeclaring a name replaces the old
/// declaration in place.
#[derive(Debug, Default)]
pub(crate) struct Env {
    decls: Vec<Decl>,
    index: HashMap<(DeclKind, String), usize>,
}

impl Env {
    pub fn new() -> Self {
        Env::default()
    }

    pub fn declare(&mut self, decl: Decl) {
        let key = (decl.binding.kind(), decl.name.clone());
        match self.index.get(&key) {
            Some(&i) => self.decls[i] = decl,
            None => {
                self.index.insert(key, self.decls.len());
                self.decls.push(decl);
            }
        }
    }

    fn lookup(&self, kind: DeclKind, name: &str) -> Option<&Decl> {
        self.index
            .get(&(kind, name.to_string()))
            .and_then(|&i| self.decls.get(i))
    }

    pub fn var(&self, name: &str) -> Option<Value> {
        match self.lookup(DeclKind::Var, name)?.binding {
            Binding::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn set_var(&mut self, name: &str, value: Value) -> bool {
        let Some(&i) = self.index.get(&(DeclKind::Var, name.to_string())) else {
            return false;
        };
        match &mut self.decls[i].binding {
            Binding::Var(slot) => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    pub fn type_of(&self, name: &str) -> Option<&Type> {
        match &self.lookup(DeclKind::Type, name)?.binding {
            Binding::Type(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn unit_bits(&self, name: &str) -> Option<u64> {
        match self.lookup(DeclKind::Unit, name)?.binding {
            Binding::Unit { bits, .. } => Some(bits),
            _ => None,
        }
    }

    /// Kinds under which `name` is declared, in `Var`, `Type`, `Unit` order.
    pub fn kinds_of(&self, name: &str) -> Vec<DeclKind> {
        [DeclKind::Var, DeclKind::Type, DeclKind::Unit]
            .into_iter()
            .filter(|k| self.index.contains_key(&(*k, name.to_string())))
            .collect()
    }

    pub fn value_of(&self, kind: DeclKind, name: &str) -> Option<Value> {
        match self.lookup(kind, name)?.binding {
            Binding::Var(v) => Some(v),
            Binding::Unit { value, .. } => Some(value),
            Binding::Type(_) => None,
        }
    }

    /// Declarations in declaration order, optionally restricted to one kind.
    pub fn iter(&self, kind: Option<DeclKind>) -> impl Iterator<Item = DeclInfo<'_>> {
        self.decls
            .iter()
            .filter(move |d| kind.map_or(true, |k| d.binding.kind() == k))
            .map(|d| DeclInfo {
                kind: d.binding.kind(),
                name: &d.name,
                source: &d.source,
                loc: d.loc,
                value: match d.binding {
                    Binding::Var(v) => Some(v),
                    Binding::Unit { value, .. } => Some(value),
                    Binding::Type(_) => None,
                },
            })
    }
}
