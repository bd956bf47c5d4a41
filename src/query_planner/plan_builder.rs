//! Planning context and the top-level query assembler.
//!
//! The assembler walks the clauses in source order, dispatching each one to
//! its clause planner and threading three pieces of state through: the set
//! of bound symbols, the write marker, and the operator tail the next clause
//! grows from.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::PlannerConfig;
use crate::cypher_ast::ast::{AstStorage, Clause, CypherQuery};
use crate::cypher_ast::symbol_table::{Symbol, SymbolTable};
use crate::query_planner::create_clause::plan_create;
use crate::query_planner::errors::PlanError;
use crate::query_planner::match_clause::plan_match;
use crate::query_planner::merge_clause::plan_merge;
use crate::query_planner::operators::{self, LogicalOperator};
use crate::query_planner::return_body::{gen_return_body, ReturnBodyContext};
use crate::query_planner::write_clauses::plan_write_clause;

/// Index metadata the MATCH planner consults when picking scans.
///
/// The storage catalog is an external collaborator; this is the narrow view
/// of it the planner needs. Counts are approximate and only compared against
/// the expand-to-existing threshold.
pub trait DatabaseIndexes {
    fn label_property_index_exists(&self, label: &str, property: &str) -> bool;

    fn vertices_count(&self, label: &str, property: &str) -> i64;
}

/// The no-index oracle: every scan degrades to label or full scans.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndexes;

impl DatabaseIndexes for NoIndexes {
    fn label_property_index_exists(&self, _label: &str, _property: &str) -> bool {
        false
    }

    fn vertices_count(&self, _label: &str, _property: &str) -> i64 {
        i64::MAX
    }
}

/// State threaded through one planning run.
///
/// The symbol table and storage are borrowed mutably only for the `RETURN *`
/// expansion; everything else reads them. Plans from concurrent queries use
/// separate contexts and never share state.
pub struct PlanningContext<'a> {
    pub symbol_table: &'a mut SymbolTable,
    pub storage: &'a mut AstStorage,
    pub indexes: &'a dyn DatabaseIndexes,
    pub config: &'a PlannerConfig,
    abort: Option<&'a AtomicBool>,
    pub(crate) bound_symbols: HashSet<Symbol>,
    pub(crate) is_write: bool,
}

impl<'a> PlanningContext<'a> {
    pub fn new(
        symbol_table: &'a mut SymbolTable,
        storage: &'a mut AstStorage,
        indexes: &'a dyn DatabaseIndexes,
        config: &'a PlannerConfig,
    ) -> Self {
        Self {
            symbol_table,
            storage,
            indexes,
            config,
            abort: None,
            bound_symbols: HashSet::new(),
            is_write: false,
        }
    }

    /// Installs a cooperative abort flag. It is checked between clauses and
    /// between pattern reductions; once set, planning stops with
    /// [`PlanError::Aborted`] and everything built so far is dropped.
    pub fn with_abort(mut self, abort: &'a AtomicBool) -> Self {
        self.abort = Some(abort);
        self
    }

    pub(crate) fn check_abort(&self) -> Result<(), PlanError> {
        match self.abort {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(PlanError::Aborted),
            _ => Ok(()),
        }
    }

    /// Binds `symbol`, returning whether it was newly bound.
    pub(crate) fn bind(&mut self, symbol: Symbol) -> bool {
        self.bound_symbols.insert(symbol)
    }

    pub(crate) fn is_bound(&self, symbol: &Symbol) -> bool {
        self.bound_symbols.contains(symbol)
    }

    /// The symbols currently in scope, mainly useful to tests and callers
    /// inspecting what a plan exposes.
    pub fn bound_symbols(&self) -> &HashSet<Symbol> {
        &self.bound_symbols
    }
}

/// Plans one analyzed query into a logical operator tree.
///
/// Clauses are planned strictly in source order. RETURN (and CREATE INDEX)
/// terminate the pipeline; anything after them is rejected.
pub fn plan_query(
    query: &CypherQuery,
    context: &mut PlanningContext<'_>,
) -> Result<LogicalOperator, PlanError> {
    if query.clauses.len() > 1
        && query
            .clauses
            .iter()
            .any(|clause| matches!(clause, Clause::CreateIndex(_)))
    {
        return Err(PlanError::IndexInCompoundQuery);
    }

    let mut tail = LogicalOperator::Once;
    let mut terminated = false;
    for clause in &query.clauses {
        context.check_abort()?;
        if terminated {
            return Err(PlanError::ReturnMustBeLast);
        }
        tail = match clause {
            Clause::Match(match_clause) => {
                log::debug!(
                    "planning {}MATCH with {} pattern(s)",
                    if match_clause.optional { "OPTIONAL " } else { "" },
                    match_clause.patterns.len()
                );
                plan_match(match_clause, tail, context)?
            }
            Clause::Unwind(unwind) => {
                let output_symbol = context
                    .symbol_table
                    .at(unwind.named_expression.id)
                    .clone();
                log::debug!("planning UNWIND into `{}`", output_symbol.name);
                context.bind(output_symbol.clone());
                LogicalOperator::Unwind(operators::Unwind {
                    input: Box::new(tail),
                    input_expression: unwind.named_expression.expression.clone(),
                    output_symbol,
                })
            }
            Clause::With(with) => {
                log::debug!("planning WITH, write prefix: {}", context.is_write);
                let body = ReturnBodyContext::new(
                    &with.body,
                    context.symbol_table,
                    context.storage,
                    &context.bound_symbols,
                    with.where_clause.as_ref(),
                );
                // A writing prefix must settle and become visible before the
                // next part of the query runs.
                let accumulate = context.is_write;
                let advance_command = context.is_write;
                let operator =
                    gen_return_body(tail, advance_command, &body, accumulate, &context.bound_symbols);
                // WITH is the scoping boundary: only its outputs survive.
                context.bound_symbols = body.output_symbols().iter().cloned().collect();
                context.is_write = false;
                operator
            }
            Clause::Return(return_clause) => {
                log::debug!("planning RETURN, write prefix: {}", context.is_write);
                let body = ReturnBodyContext::new(
                    &return_clause.body,
                    context.symbol_table,
                    context.storage,
                    &context.bound_symbols,
                    None,
                );
                // Unlike WITH, RETURN only needs the accumulation; the
                // transaction machinery handles visibility after the query.
                let accumulate = context.is_write;
                let operator = gen_return_body(tail, false, &body, accumulate, &context.bound_symbols);
                terminated = true;
                operator
            }
            Clause::Create(create) => {
                log::debug!("planning CREATE with {} pattern(s)", create.patterns.len());
                plan_create(create, tail, context)?
            }
            Clause::Merge(merge) => {
                log::debug!("planning MERGE");
                plan_merge(merge, tail, context)?
            }
            Clause::CreateIndex(create_index) => {
                log::debug!(
                    "planning CREATE INDEX ON :{}({})",
                    create_index.label,
                    create_index.property
                );
                terminated = true;
                LogicalOperator::CreateIndex(operators::CreateIndex {
                    label: create_index.label.clone(),
                    property: create_index.property.clone(),
                })
            }
            other => plan_write_clause(other, tail, context)?,
        };
    }
    Ok(tail)
}
