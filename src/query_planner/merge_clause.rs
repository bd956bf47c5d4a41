//! MERGE planning.
//!
//! MERGE is match-or-create: for each input row the match branch runs
//! first, and only when it produces nothing does the create branch run.
//! Both branches are planned against their own `Once` leaf with the outer
//! bindings in scope, and each carries its ON MATCH / ON CREATE actions.

use crate::cypher_ast::ast::Merge;
use crate::query_planner::create_clause::gen_create_for_pattern;
use crate::query_planner::errors::PlanError;
use crate::query_planner::match_clause::plan_reading;
use crate::query_planner::operators::{self, LogicalOperator};
use crate::query_planner::plan_builder::PlanningContext;
use crate::query_planner::write_clauses::plan_write_clause;

pub(crate) fn plan_merge(
    merge: &Merge,
    input: LogicalOperator,
    context: &mut PlanningContext<'_>,
) -> Result<LogicalOperator, PlanError> {
    context.check_abort()?;
    let outer_bound = context.bound_symbols().clone();

    let mut merge_match = plan_reading(
        std::slice::from_ref(&merge.pattern),
        None,
        LogicalOperator::Once,
        context,
    )?;
    for clause in &merge.on_match {
        merge_match = plan_write_clause(clause, merge_match, context)?;
    }
    // Both branches bind the same pattern symbols; remember the result and
    // rewind so the create branch sees the outer scope.
    let merged_bound = context.bound_symbols().clone();
    context.bound_symbols = outer_bound;

    let mut merge_create =
        gen_create_for_pattern(&merge.pattern, LogicalOperator::Once, context)?;
    for clause in &merge.on_create {
        merge_create = plan_write_clause(clause, merge_create, context)?;
    }

    context.bound_symbols = merged_bound;
    context.is_write = true;
    Ok(LogicalOperator::Merge(operators::Merge {
        input: Box::new(input),
        merge_match: Box::new(merge_match),
        merge_create: Box::new(merge_create),
    }))
}
