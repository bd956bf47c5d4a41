//! Deferred construction of named paths.
//!
//! `p = (a)-[e]->(b)` can only build the path value once `a`, `e` and `b`
//! are all bound, which may happen anywhere in the expansion order the MATCH
//! planner picks. Pending paths wait here and are emitted as soon as their
//! last atom symbol binds.

use std::collections::HashSet;

use crate::cypher_ast::ast::Pattern;
use crate::cypher_ast::symbol_table::{Symbol, SymbolTable};
use crate::query_planner::operators::{ConstructNamedPath, LogicalOperator};

#[derive(Debug, Default)]
pub struct NamedPathBuilder {
    pending: Vec<(Symbol, Vec<Symbol>)>,
}

impl NamedPathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `pattern` when the query names it.
    pub fn add_pattern(&mut self, pattern: &Pattern, symbol_table: &SymbolTable) {
        if !pattern.identifier.user_declared {
            return;
        }
        let path_symbol = symbol_table.at(pattern.identifier.id).clone();
        let elements = pattern
            .atoms
            .iter()
            .map(|atom| symbol_table.at(atom.identifier().id).clone())
            .collect();
        self.pending.push((path_symbol, elements));
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Emits a `ConstructNamedPath` for every pending path whose atoms are
    /// all bound, binding the path symbol in turn.
    pub fn emit_ready(
        &mut self,
        mut tail: LogicalOperator,
        bound: &mut HashSet<Symbol>,
    ) -> LogicalOperator {
        let mut index = 0;
        while index < self.pending.len() {
            let all_bound = self.pending[index]
                .1
                .iter()
                .all(|symbol| bound.contains(symbol));
            if all_bound {
                let (path_symbol, path_elements) = self.pending.remove(index);
                bound.insert(path_symbol.clone());
                tail = LogicalOperator::ConstructNamedPath(ConstructNamedPath {
                    input: Box::new(tail),
                    path_symbol,
                    path_elements,
                });
            } else {
                index += 1;
            }
        }
        tail
    }
}
