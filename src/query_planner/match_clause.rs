//! MATCH planning.
//!
//! Per pattern the planner picks a starting atom, preferring an endpoint
//! that is already bound, then one with the cheapest available scan, and
//! walks the chain from there emitting expansions. After every binding the
//! filter store drains and the named-path builder runs, so filters land as
//! deep as their symbols allow and paths are built as soon as possible.

use crate::cypher_ast::ast::{Match, NodeAtom, Pattern, Where};
use crate::cypher_ast::symbol_table::Symbol;
use crate::query_planner::errors::PlanError;
use crate::query_planner::filters::Filters;
use crate::query_planner::named_paths::NamedPathBuilder;
use crate::query_planner::operators::{
    BoundType, Expand, ExpandVariable, Filter, LogicalOperator, Optional, RangeBound, ScanAll,
    ScanAllByLabel, ScanAllByLabelPropertyRange, ScanAllByLabelPropertyValue,
};
use crate::query_planner::pattern::{ChainStep, PatternChain};
use crate::query_planner::plan_builder::PlanningContext;

use super::filters::PropertyComparison;

pub(crate) fn plan_match(
    match_clause: &Match,
    input: LogicalOperator,
    context: &mut PlanningContext<'_>,
) -> Result<LogicalOperator, PlanError> {
    if match_clause.optional {
        // The optional subtree grows from its own leaf; symbols bound
        // outside stay visible inside it.
        let outer_bound = context.bound_symbols().clone();
        let branch = plan_reading(
            &match_clause.patterns,
            match_clause.where_clause.as_ref(),
            LogicalOperator::Once,
            context,
        )?;
        let mut optional_symbols: Vec<Symbol> = context
            .bound_symbols()
            .difference(&outer_bound)
            .cloned()
            .collect();
        optional_symbols.sort();
        Ok(LogicalOperator::Optional(Optional {
            input: Box::new(input),
            optional: Box::new(branch),
            optional_symbols,
        }))
    } else {
        plan_reading(
            &match_clause.patterns,
            match_clause.where_clause.as_ref(),
            input,
            context,
        )
    }
}

/// Plans a pattern list plus optional WHERE. MERGE reuses this for its
/// match branch.
pub(crate) fn plan_reading(
    patterns: &[Pattern],
    where_clause: Option<&Where>,
    input: LogicalOperator,
    context: &mut PlanningContext<'_>,
) -> Result<LogicalOperator, PlanError> {
    let mut filters = Filters::new();
    let mut named_paths = NamedPathBuilder::new();
    for pattern in patterns {
        filters.add_pattern_filters(pattern, context.symbol_table);
        named_paths.add_pattern(pattern, context.symbol_table);
    }
    if let Some(where_clause) = where_clause {
        filters.add_where(&where_clause.expression, context.symbol_table);
    }

    // Constraints on symbols bound by earlier clauses apply right away.
    let mut tail = drain(input, &mut filters, &mut named_paths, context);
    for pattern in patterns {
        context.check_abort()?;
        tail = plan_pattern(pattern, tail, &mut filters, &mut named_paths, context)?;
    }
    assert!(
        filters.is_empty(),
        "WHERE refers to symbols the query never binds"
    );
    Ok(tail)
}

fn plan_pattern(
    pattern: &Pattern,
    tail: LogicalOperator,
    filters: &mut Filters,
    named_paths: &mut NamedPathBuilder,
    context: &mut PlanningContext<'_>,
) -> Result<LogicalOperator, PlanError> {
    let chain = orient_chain(PatternChain::parse(pattern), filters, context);

    let mut tail = gen_starting_node(chain.first, tail, filters, context);
    tail = drain(tail, filters, named_paths, context);

    let mut previous = chain.first;
    for step in &chain.steps {
        context.check_abort()?;
        tail = gen_expand_step(previous, step, tail, filters, named_paths, context);
        previous = step.node;
        tail = drain(tail, filters, named_paths, context);
    }
    Ok(tail)
}

/// Flips the chain when its far end is the better place to start.
fn orient_chain<'a>(
    chain: PatternChain<'a>,
    filters: &Filters,
    context: &PlanningContext<'_>,
) -> PatternChain<'a> {
    if chain.steps.is_empty() {
        return chain;
    }
    let first_bound = context.is_bound(context.symbol_table.at(chain.first.identifier.id));
    let last_node = chain.steps.last().expect("non-empty steps").node;
    let last_bound = context.is_bound(context.symbol_table.at(last_node.identifier.id));
    if first_bound {
        return chain;
    }
    if last_bound {
        log::debug!(
            "match: starting pattern from bound `{}`",
            last_node.identifier.name
        );
        return chain.reversed();
    }
    // Neither end is bound; prefer the better scan, source order on ties.
    if scan_score(last_node, filters, context) > scan_score(chain.first, filters, context) {
        log::debug!(
            "match: starting pattern from indexed `{}`",
            last_node.identifier.name
        );
        return chain.reversed();
    }
    chain
}

/// 2 for an indexed label+property lookup, 1 for a label scan, 0 otherwise.
fn scan_score(node: &NodeAtom, filters: &Filters, context: &PlanningContext<'_>) -> u8 {
    let symbol = context.symbol_table.at(node.identifier.id);
    let Some(label) = filters.scan_label(symbol) else {
        return 0;
    };
    if let Some(property) = filters.has_property_value(symbol, &context.bound_symbols) {
        if context.indexes.label_property_index_exists(label, property) {
            return 2;
        }
    }
    1
}

/// Emits the scan binding the first node of a chain, or nothing when it is
/// already bound.
fn gen_starting_node(
    node: &NodeAtom,
    tail: LogicalOperator,
    filters: &mut Filters,
    context: &mut PlanningContext<'_>,
) -> LogicalOperator {
    let symbol = context.symbol_table.at(node.identifier.id).clone();
    if !context.bind(symbol.clone()) {
        return tail;
    }
    gen_scan(symbol, tail, filters, context)
}

/// Picks the cheapest scan the filters and indexes allow, claiming the
/// filters the scan subsumes.
fn gen_scan(
    symbol: Symbol,
    tail: LogicalOperator,
    filters: &mut Filters,
    context: &mut PlanningContext<'_>,
) -> LogicalOperator {
    let Some(label) = filters.scan_label(&symbol).map(str::to_string) else {
        return LogicalOperator::ScanAll(ScanAll {
            input: Box::new(tail),
            output_symbol: symbol,
        });
    };

    if let Some(property) = filters
        .has_property_value(&symbol, &context.bound_symbols)
        .map(str::to_string)
    {
        if context.indexes.label_property_index_exists(&label, &property) {
            let label = filters
                .take_scan_label(&symbol)
                .expect("label filter was just seen");
            let (property, expression) = filters
                .take_property_value(&symbol, &context.bound_symbols)
                .expect("property filter was just seen");
            return LogicalOperator::ScanAllByLabelPropertyValue(ScanAllByLabelPropertyValue {
                input: Box::new(tail),
                output_symbol: symbol,
                label,
                property,
                expression,
            });
        }
    }

    if let Some(property) = filters
        .has_property_range(&symbol, &context.bound_symbols)
        .map(str::to_string)
    {
        if context.indexes.label_property_index_exists(&label, &property) {
            let label = filters
                .take_scan_label(&symbol)
                .expect("label filter was just seen");
            let (lower, upper) =
                filters.take_property_range(&symbol, &property, &context.bound_symbols);
            return LogicalOperator::ScanAllByLabelPropertyRange(ScanAllByLabelPropertyRange {
                input: Box::new(tail),
                output_symbol: symbol,
                label,
                property,
                lower_bound: lower.map(range_bound),
                upper_bound: upper.map(range_bound),
            });
        }
    }

    let label = filters
        .take_scan_label(&symbol)
        .expect("label filter was just seen");
    LogicalOperator::ScanAllByLabel(ScanAllByLabel {
        input: Box::new(tail),
        output_symbol: symbol,
        label,
    })
}

fn range_bound((comparison, expression): (PropertyComparison, crate::cypher_ast::ast::Expression)) -> RangeBound {
    let bound_type = match comparison {
        PropertyComparison::GreaterThanEqual | PropertyComparison::LessThanEqual => {
            BoundType::Inclusive
        }
        _ => BoundType::Exclusive,
    };
    RangeBound {
        expression,
        bound_type,
    }
}

/// Emits the expansion for one `-[edge]-(node)` step.
fn gen_expand_step(
    previous: &NodeAtom,
    step: &ChainStep<'_>,
    tail: LogicalOperator,
    filters: &mut Filters,
    named_paths: &mut NamedPathBuilder,
    context: &mut PlanningContext<'_>,
) -> LogicalOperator {
    let input_symbol = context.symbol_table.at(previous.identifier.id).clone();
    let node_symbol = context.symbol_table.at(step.node.identifier.id).clone();
    let edge_symbol = context.symbol_table.at(step.edge.identifier.id).clone();

    if let Some(variable_length) = step.edge.variable_length {
        let existing_node = !context.bind(node_symbol.clone());
        context.bind(edge_symbol.clone());
        return LogicalOperator::ExpandVariable(ExpandVariable {
            input: Box::new(tail),
            input_symbol,
            node_symbol,
            edge_symbol,
            direction: step.direction,
            edge_types: step.edge.edge_types.clone(),
            lower_bound: variable_length.lower_bound,
            upper_bound: variable_length.upper_bound,
            existing_node,
        });
    }

    let existing_edge = !context.bind(edge_symbol.clone());
    let mut tail = tail;
    let mut existing_node = context.is_bound(&node_symbol);
    if !existing_node && expand_to_existing(step.node, filters, context) {
        // Cheaper to look the far node up by index and connect the two
        // bound endpoints than to enumerate neighbors.
        log::debug!(
            "match: expanding to indexed `{}` as existing",
            step.node.identifier.name
        );
        context.bind(node_symbol.clone());
        tail = gen_scan(node_symbol.clone(), tail, filters, context);
        tail = drain(tail, filters, named_paths, context);
        existing_node = true;
    } else if !existing_node {
        context.bind(node_symbol.clone());
    }

    LogicalOperator::Expand(Expand {
        input: Box::new(tail),
        input_symbol,
        node_symbol,
        edge_symbol,
        direction: step.direction,
        edge_types: step.edge.edge_types.clone(),
        existing_node,
        existing_edge,
    })
}

/// The expand-to-existing rule: take an indexed lookup instead of a regular
/// expansion when the indexed side holds at most the configured number of
/// vertices. A threshold of -1 disables the rule.
fn expand_to_existing(
    node: &NodeAtom,
    filters: &Filters,
    context: &PlanningContext<'_>,
) -> bool {
    if !context.config.expand_existing_enabled() {
        return false;
    }
    let symbol = context.symbol_table.at(node.identifier.id);
    let Some(label) = filters.scan_label(symbol) else {
        return false;
    };
    let Some(property) = filters.has_property_value(symbol, &context.bound_symbols) else {
        return false;
    };
    context.indexes.label_property_index_exists(label, property)
        && context.indexes.vertices_count(label, property)
            <= context.config.vertex_count_to_expand_existing
}

/// Applies every filter whose symbols are now bound, then every named path
/// whose atoms are.
fn drain(
    tail: LogicalOperator,
    filters: &mut Filters,
    named_paths: &mut NamedPathBuilder,
    context: &mut PlanningContext<'_>,
) -> LogicalOperator {
    let mut tail = tail;
    if let Some(expression) = filters.extract(&context.bound_symbols) {
        tail = LogicalOperator::Filter(Filter {
            input: Box::new(tail),
            expression,
        });
    }
    named_paths.emit_ready(tail, &mut context.bound_symbols)
}
