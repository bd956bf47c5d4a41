//! Emission for the clauses that mutate the database without matching or
//! creating patterns: DELETE, SET and REMOVE.
//!
//! Each one wraps the current tail in its operator and raises the write
//! marker, which the next WITH or RETURN consumes to place Accumulate.

use crate::cypher_ast::ast::Clause;
use crate::query_planner::errors::PlanError;
use crate::query_planner::operators::{
    Delete, LogicalOperator, RemoveLabels, RemoveProperty, SetLabels, SetProperties,
    SetPropertiesOp, SetProperty,
};
use crate::query_planner::plan_builder::PlanningContext;

/// Plans one DELETE/SET/REMOVE clause. Callers dispatch exhaustively, so a
/// non-write clause here is a planner bug.
pub(crate) fn plan_write_clause(
    clause: &Clause,
    input: LogicalOperator,
    context: &mut PlanningContext<'_>,
) -> Result<LogicalOperator, PlanError> {
    let operator = match clause {
        Clause::Delete(delete) => LogicalOperator::Delete(Delete {
            input: Box::new(input),
            expressions: delete.expressions.clone(),
            detach: delete.detach,
        }),
        Clause::SetProperty(set) => LogicalOperator::SetProperty(SetProperty {
            input: Box::new(input),
            property_lookup: set.property_lookup.clone(),
            expression: set.expression.clone(),
        }),
        Clause::SetProperties(set) => {
            let input_symbol = context.symbol_table.at(set.identifier.id).clone();
            LogicalOperator::SetProperties(SetProperties {
                input: Box::new(input),
                input_symbol,
                expression: set.expression.clone(),
                op: if set.update {
                    SetPropertiesOp::Update
                } else {
                    SetPropertiesOp::Replace
                },
            })
        }
        Clause::SetLabels(set) => {
            let input_symbol = context.symbol_table.at(set.identifier.id).clone();
            LogicalOperator::SetLabels(SetLabels {
                input: Box::new(input),
                input_symbol,
                labels: set.labels.clone(),
            })
        }
        Clause::RemoveProperty(remove) => LogicalOperator::RemoveProperty(RemoveProperty {
            input: Box::new(input),
            property_lookup: remove.property_lookup.clone(),
        }),
        Clause::RemoveLabels(remove) => {
            let input_symbol = context.symbol_table.at(remove.identifier.id).clone();
            LogicalOperator::RemoveLabels(RemoveLabels {
                input: Box::new(input),
                input_symbol,
                labels: remove.labels.clone(),
            })
        }
        other => panic!("clause {:?} is not a write clause", std::mem::discriminant(other)),
    };
    context.is_write = true;
    Ok(operator)
}
