//! Input side of the planner: the semantically analyzed Cypher AST,
//! the symbol table produced by semantic analysis, and a visitor for
//! walking expression trees.

pub mod ast;
pub mod symbol_table;
pub mod visitor;

pub use ast::*;
pub use symbol_table::{Symbol, SymbolKind, SymbolTable};
