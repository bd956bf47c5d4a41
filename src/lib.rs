//! Rule-based Cypher query planner.
//!
//! This crate turns a semantically analyzed Cypher AST, together with its
//! resolved symbol table, into a tree of logical operators for a physical
//! evaluator:
//! - Clause-by-clause assembly: MATCH, OPTIONAL MATCH, UNWIND, WITH,
//!   RETURN, CREATE, MERGE, SET, REMOVE, DELETE, CREATE INDEX
//! - Filter pushdown to the operator that binds the last free symbol
//! - Aggregation grouping derived from the expression structure
//! - Deferred named-path construction
//!
//! Parsing, semantic analysis, storage access and execution live elsewhere;
//! the planner only consumes their outputs and an index-metadata oracle.

pub mod config;
pub mod cypher_ast;
pub mod query_planner;
