//! Rule-based query planning.
//!
//! [`plan_query`] takes an analyzed [`CypherQuery`](crate::cypher_ast::ast::CypherQuery)
//! plus its symbol table and produces a [`LogicalOperator`] tree for the
//! executor. Planning is deterministic, single-threaded, and makes no
//! storage accesses beyond the [`DatabaseIndexes`] oracle it is given.

pub mod errors;
pub mod operators;

mod create_clause;
mod filters;
mod match_clause;
mod merge_clause;
mod named_paths;
mod pattern;
mod plan_builder;
mod return_body;
mod write_clauses;

pub use errors::PlanError;
pub use operators::LogicalOperator;
pub use pattern::{reduce_pattern, ChainStep, PatternChain};
pub use plan_builder::{plan_query, DatabaseIndexes, NoIndexes, PlanningContext};
pub use return_body::{gen_return_body, ReturnBodyContext};
