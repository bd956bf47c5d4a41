//! Symbols and the AST-node-to-symbol mapping produced by semantic analysis.
//!
//! The planner treats the table as read-only, with one exception: expanding
//! `RETURN *` allocates fresh identifier and named-expression nodes and
//! associates them with symbols that already exist.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::cypher_ast::ast::NodeId;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum SymbolKind {
    Any,
    Node,
    Edge,
    Path,
    Expression,
}

/// A variable binding resolved by semantic analysis.
///
/// Identity is the `(name, position, kind)` triple assigned at creation;
/// `position` is unique within one symbol table, so it also gives symbols a
/// stable total order used wherever the planner needs deterministic output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub position: usize,
    pub user_declared: bool,
    pub kind: SymbolKind,
    pub token_position: i64,
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.position == other.position && self.kind == other.kind
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.position.hash(state);
        self.kind.hash(state);
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.position
            .cmp(&other.position)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.kind.cmp(&other.kind))
    }
}

/// Mapping from AST node identity to [`Symbol`].
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    next_position: usize,
    table: HashMap<NodeId, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new symbol with the next free position. The symbol is not
    /// yet associated with any node; see [`SymbolTable::associate`].
    pub fn create_symbol(
        &mut self,
        name: impl Into<String>,
        user_declared: bool,
        kind: SymbolKind,
        token_position: i64,
    ) -> Symbol {
        let symbol = Symbol {
            name: name.into(),
            position: self.next_position,
            user_declared,
            kind,
            token_position,
        };
        self.next_position += 1;
        symbol
    }

    pub fn associate(&mut self, node: NodeId, symbol: Symbol) {
        self.table.insert(node, symbol);
    }

    /// Looks up the symbol of a node. Every node the planner asks about must
    /// have been resolved by semantic analysis; a missing entry is a bug in
    /// an earlier pass and aborts.
    pub fn at(&self, node: NodeId) -> &Symbol {
        self.table
            .get(&node)
            .unwrap_or_else(|| panic!("symbol table has no entry for AST node {}", node))
    }

    pub fn get(&self, node: NodeId) -> Option<&Symbol> {
        self.table.get(&node)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
