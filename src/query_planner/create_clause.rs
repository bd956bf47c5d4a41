//! CREATE planning.
//!
//! Reduces each pattern: the first node becomes a `CreateNode` unless its
//! symbol is already bound (creating an edge off an existing node), and
//! every following triple becomes a `CreateExpand`. Edge symbols must be
//! fresh; re-declaring one is a semantic error surfaced to the user.

use crate::cypher_ast::ast::{Create, Pattern};
use crate::query_planner::errors::PlanError;
use crate::query_planner::operators::{
    ConstructNamedPath, CreateExpand, CreateNode, LogicalOperator,
};
use crate::query_planner::pattern::reduce_pattern;
use crate::query_planner::plan_builder::PlanningContext;

pub(crate) fn plan_create(
    create: &Create,
    input: LogicalOperator,
    context: &mut PlanningContext<'_>,
) -> Result<LogicalOperator, PlanError> {
    let mut tail = input;
    for pattern in &create.patterns {
        context.check_abort()?;
        tail = gen_create_for_pattern(pattern, tail, context)?;
    }
    context.is_write = true;
    Ok(tail)
}

/// Plans one CREATE pattern. MERGE reuses this for its create branch.
pub(crate) fn gen_create_for_pattern(
    pattern: &Pattern,
    input: LogicalOperator,
    context: &mut PlanningContext<'_>,
) -> Result<LogicalOperator, PlanError> {
    let mut tail = reduce_pattern(
        pattern,
        context,
        |context, node| {
            let symbol = context.symbol_table.at(node.identifier.id).clone();
            if context.bind(symbol.clone()) {
                Ok(LogicalOperator::CreateNode(CreateNode {
                    input: Box::new(input),
                    node_symbol: symbol,
                    labels: node.labels.clone(),
                    properties: node.properties.clone(),
                }))
            } else {
                Ok(input)
            }
        },
        |context, last, previous, edge, node| {
            // The previous node feeds the expansion; whether the far node
            // already exists decides if only the edge is created.
            let input_symbol = context.symbol_table.at(previous.identifier.id).clone();
            let node_symbol = context.symbol_table.at(node.identifier.id).clone();
            let existing_node = !context.bind(node_symbol.clone());
            let edge_symbol = context.symbol_table.at(edge.identifier.id).clone();
            if !context.bind(edge_symbol.clone()) {
                return Err(PlanError::EdgeRedeclaration(edge_symbol.name));
            }
            Ok(LogicalOperator::CreateExpand(CreateExpand {
                input: Box::new(last),
                input_symbol,
                node_symbol,
                node_labels: node.labels.clone(),
                node_properties: node.properties.clone(),
                edge_symbol,
                edge_type: edge.edge_types.first().cloned(),
                edge_properties: edge.properties.clone(),
                direction: edge.direction,
                existing_node,
            }))
        },
    )?;

    // A named CREATE pattern binds everything at once, so the path can be
    // built immediately.
    if pattern.identifier.user_declared {
        let path_symbol = context.symbol_table.at(pattern.identifier.id).clone();
        let path_elements = pattern
            .atoms
            .iter()
            .map(|atom| context.symbol_table.at(atom.identifier().id).clone())
            .collect();
        context.bind(path_symbol.clone());
        tail = LogicalOperator::ConstructNamedPath(ConstructNamedPath {
            input: Box::new(tail),
            path_symbol,
            path_elements,
        });
    }
    Ok(tail)
}
