//! The logical operator tree the planner emits.
//!
//! Operators form a strict tree: every operator exclusively owns its input
//! child, and a plan is handed to the executor by value. Each operator
//! publishes the symbols it introduces and the expressions it references;
//! beyond that the executor contract is opaque to the planner.
//!
//! Expressions inside operators are owned clones of the analyzed AST, so a
//! plan has no lifetime ties to the query that produced it.

use serde::{Deserialize, Serialize};

use crate::cypher_ast::ast::{
    AggregationOp, EdgeDirection, Expression, NamedExpression, OrderByItem, PropertyLookup,
};
use crate::cypher_ast::symbol_table::Symbol;

/// One aggregation computed by an [`Aggregate`] operator.
///
/// `first` is absent for `count(*)`; `second` is only present for map
/// collection. The result lands in `output_symbol`.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct AggregateElement {
    pub first: Option<Expression>,
    pub second: Option<Expression>,
    pub op: AggregationOp,
    pub output_symbol: Symbol,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum BoundType {
    Inclusive,
    Exclusive,
}

/// One end of a property range lookup.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RangeBound {
    pub expression: Expression,
    pub bound_type: BoundType,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum SetPropertiesOp {
    /// `SET n += map`: merge the map into existing properties.
    Update,
    /// `SET n = map`: drop existing properties first.
    Replace,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ScanAll {
    pub input: Box<LogicalOperator>,
    pub output_symbol: Symbol,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ScanAllByLabel {
    pub input: Box<LogicalOperator>,
    pub output_symbol: Symbol,
    pub label: String,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ScanAllByLabelPropertyValue {
    pub input: Box<LogicalOperator>,
    pub output_symbol: Symbol,
    pub label: String,
    pub property: String,
    pub expression: Expression,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ScanAllByLabelPropertyRange {
    pub input: Box<LogicalOperator>,
    pub output_symbol: Symbol,
    pub label: String,
    pub property: String,
    pub lower_bound: Option<RangeBound>,
    pub upper_bound: Option<RangeBound>,
}

/// Single-hop expansion from a bound node along an edge.
///
/// `existing_node`/`existing_edge` mark endpoints that were already bound by
/// an ancestor; the executor then matches against the bound value instead of
/// binding a new one.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Expand {
    pub input: Box<LogicalOperator>,
    pub input_symbol: Symbol,
    pub node_symbol: Symbol,
    pub edge_symbol: Symbol,
    pub direction: EdgeDirection,
    pub edge_types: Vec<String>,
    pub existing_node: bool,
    pub existing_edge: bool,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ExpandVariable {
    pub input: Box<LogicalOperator>,
    pub input_symbol: Symbol,
    pub node_symbol: Symbol,
    pub edge_symbol: Symbol,
    pub direction: EdgeDirection,
    pub edge_types: Vec<String>,
    pub lower_bound: Option<i64>,
    pub upper_bound: Option<i64>,
    pub existing_node: bool,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub input: Box<LogicalOperator>,
    pub expression: Expression,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Produce {
    pub input: Box<LogicalOperator>,
    pub named_expressions: Vec<NamedExpression>,
}

/// Materializes the input before the rest of the pipeline runs.
///
/// Placed between a writing prefix and WITH/RETURN so projections observe
/// the final state of the updated records. `advance_command` additionally
/// makes the writes visible, which WITH needs and RETURN does not.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Accumulate {
    pub input: Box<LogicalOperator>,
    pub symbols: Vec<Symbol>,
    pub advance_command: bool,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Aggregate {
    pub input: Box<LogicalOperator>,
    pub aggregations: Vec<AggregateElement>,
    pub group_by: Vec<Expression>,
    /// Symbols whose bindings survive through the aggregation.
    pub remember: Vec<Symbol>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Skip {
    pub input: Box<LogicalOperator>,
    pub expression: Expression,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Limit {
    pub input: Box<LogicalOperator>,
    pub expression: Expression,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OrderBy {
    pub input: Box<LogicalOperator>,
    pub order_by: Vec<OrderByItem>,
    pub output_symbols: Vec<Symbol>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Distinct {
    pub input: Box<LogicalOperator>,
    pub value_symbols: Vec<Symbol>,
}

/// Wraps an OPTIONAL MATCH subtree. When the subtree produces no rows the
/// symbols it would bind are filled with nulls instead.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Optional {
    pub input: Box<LogicalOperator>,
    pub optional: Box<LogicalOperator>,
    pub optional_symbols: Vec<Symbol>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Unwind {
    pub input: Box<LogicalOperator>,
    pub input_expression: Expression,
    pub output_symbol: Symbol,
}

/// Builds a path value once every atom along it is bound.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ConstructNamedPath {
    pub input: Box<LogicalOperator>,
    pub path_symbol: Symbol,
    pub path_elements: Vec<Symbol>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CreateNode {
    pub input: Box<LogicalOperator>,
    pub node_symbol: Symbol,
    pub labels: Vec<String>,
    pub properties: Vec<(String, Expression)>,
}

/// Creates an edge (and possibly its far node) starting from the node bound
/// to `input_symbol`. With `existing_node` set only the edge is created.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CreateExpand {
    pub input: Box<LogicalOperator>,
    pub input_symbol: Symbol,
    pub node_symbol: Symbol,
    pub node_labels: Vec<String>,
    pub node_properties: Vec<(String, Expression)>,
    pub edge_symbol: Symbol,
    pub edge_type: Option<String>,
    pub edge_properties: Vec<(String, Expression)>,
    pub direction: EdgeDirection,
    pub existing_node: bool,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Delete {
    pub input: Box<LogicalOperator>,
    pub expressions: Vec<Expression>,
    pub detach: bool,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SetProperty {
    pub input: Box<LogicalOperator>,
    pub property_lookup: PropertyLookup,
    pub expression: Expression,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SetProperties {
    pub input: Box<LogicalOperator>,
    pub input_symbol: Symbol,
    pub expression: Expression,
    pub op: SetPropertiesOp,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SetLabels {
    pub input: Box<LogicalOperator>,
    pub input_symbol: Symbol,
    pub labels: Vec<String>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RemoveProperty {
    pub input: Box<LogicalOperator>,
    pub property_lookup: PropertyLookup,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RemoveLabels {
    pub input: Box<LogicalOperator>,
    pub input_symbol: Symbol,
    pub labels: Vec<String>,
}

/// MATCH-or-CREATE. Rows flow into `merge_match`; when it yields nothing
/// for an input row, `merge_create` runs instead. Both branches are rooted
/// at [`LogicalOperator::Once`] and include their ON MATCH / ON CREATE
/// actions.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Merge {
    pub input: Box<LogicalOperator>,
    pub merge_match: Box<LogicalOperator>,
    pub merge_create: Box<LogicalOperator>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CreateIndex {
    pub label: String,
    pub property: String,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum LogicalOperator {
    /// Produces a single empty row; the leaf every pipeline grows from.
    Once,
    ScanAll(ScanAll),
    ScanAllByLabel(ScanAllByLabel),
    ScanAllByLabelPropertyValue(ScanAllByLabelPropertyValue),
    ScanAllByLabelPropertyRange(ScanAllByLabelPropertyRange),
    Expand(Expand),
    ExpandVariable(ExpandVariable),
    Filter(Filter),
    Produce(Produce),
    Accumulate(Accumulate),
    Aggregate(Aggregate),
    Skip(Skip),
    Limit(Limit),
    OrderBy(OrderBy),
    Distinct(Distinct),
    Optional(Optional),
    Unwind(Unwind),
    ConstructNamedPath(ConstructNamedPath),
    CreateNode(CreateNode),
    CreateExpand(CreateExpand),
    Delete(Delete),
    SetProperty(SetProperty),
    SetProperties(SetProperties),
    SetLabels(SetLabels),
    RemoveProperty(RemoveProperty),
    RemoveLabels(RemoveLabels),
    Merge(Merge),
    CreateIndex(CreateIndex),
}

impl LogicalOperator {
    /// The operator's input child, if it has one. `Once` and `CreateIndex`
    /// are leaves.
    pub fn input(&self) -> Option<&LogicalOperator> {
        match self {
            LogicalOperator::Once | LogicalOperator::CreateIndex(_) => None,
            LogicalOperator::ScanAll(op) => Some(&op.input),
            LogicalOperator::ScanAllByLabel(op) => Some(&op.input),
            LogicalOperator::ScanAllByLabelPropertyValue(op) => Some(&op.input),
            LogicalOperator::ScanAllByLabelPropertyRange(op) => Some(&op.input),
            LogicalOperator::Expand(op) => Some(&op.input),
            LogicalOperator::ExpandVariable(op) => Some(&op.input),
            LogicalOperator::Filter(op) => Some(&op.input),
            LogicalOperator::Produce(op) => Some(&op.input),
            LogicalOperator::Accumulate(op) => Some(&op.input),
            LogicalOperator::Aggregate(op) => Some(&op.input),
            LogicalOperator::Skip(op) => Some(&op.input),
            LogicalOperator::Limit(op) => Some(&op.input),
            LogicalOperator::OrderBy(op) => Some(&op.input),
            LogicalOperator::Distinct(op) => Some(&op.input),
            LogicalOperator::Optional(op) => Some(&op.input),
            LogicalOperator::Unwind(op) => Some(&op.input),
            LogicalOperator::ConstructNamedPath(op) => Some(&op.input),
            LogicalOperator::CreateNode(op) => Some(&op.input),
            LogicalOperator::CreateExpand(op) => Some(&op.input),
            LogicalOperator::Delete(op) => Some(&op.input),
            LogicalOperator::SetProperty(op) => Some(&op.input),
            LogicalOperator::SetProperties(op) => Some(&op.input),
            LogicalOperator::SetLabels(op) => Some(&op.input),
            LogicalOperator::RemoveProperty(op) => Some(&op.input),
            LogicalOperator::RemoveLabels(op) => Some(&op.input),
            LogicalOperator::Merge(op) => Some(&op.input),
        }
    }

    /// Symbols this operator binds that its input did not provide. Produce
    /// needs the symbol table to resolve its named expressions.
    pub fn introduced_symbols(&self, symbol_table: &crate::cypher_ast::SymbolTable) -> Vec<Symbol> {
        match self {
            LogicalOperator::ScanAll(op) => vec![op.output_symbol.clone()],
            LogicalOperator::ScanAllByLabel(op) => vec![op.output_symbol.clone()],
            LogicalOperator::ScanAllByLabelPropertyValue(op) => vec![op.output_symbol.clone()],
            LogicalOperator::ScanAllByLabelPropertyRange(op) => vec![op.output_symbol.clone()],
            LogicalOperator::Expand(op) => {
                let mut symbols = Vec::new();
                if !op.existing_node {
                    symbols.push(op.node_symbol.clone());
                }
                if !op.existing_edge {
                    symbols.push(op.edge_symbol.clone());
                }
                symbols
            }
            LogicalOperator::ExpandVariable(op) => {
                let mut symbols = vec![op.edge_symbol.clone()];
                if !op.existing_node {
                    symbols.push(op.node_symbol.clone());
                }
                symbols
            }
            LogicalOperator::Produce(op) => op
                .named_expressions
                .iter()
                .map(|named| symbol_table.at(named.id).clone())
                .collect(),
            LogicalOperator::Aggregate(op) => op
                .aggregations
                .iter()
                .map(|element| element.output_symbol.clone())
                .collect(),
            LogicalOperator::Optional(op) => op.optional_symbols.clone(),
            LogicalOperator::Unwind(op) => vec![op.output_symbol.clone()],
            LogicalOperator::ConstructNamedPath(op) => vec![op.path_symbol.clone()],
            LogicalOperator::CreateNode(op) => vec![op.node_symbol.clone()],
            LogicalOperator::CreateExpand(op) => {
                let mut symbols = Vec::new();
                if !op.existing_node {
                    symbols.push(op.node_symbol.clone());
                }
                symbols.push(op.edge_symbol.clone());
                symbols
            }
            // Both branches bind the same pattern symbols; report the match
            // branch's bindings as the operator's own.
            LogicalOperator::Merge(op) => {
                let mut symbols = Vec::new();
                let mut cursor = Some(op.merge_match.as_ref());
                while let Some(operator) = cursor {
                    symbols.extend(operator.introduced_symbols(symbol_table));
                    cursor = operator.input();
                }
                symbols
            }
            _ => Vec::new(),
        }
    }

    /// The expressions this operator evaluates.
    pub fn expressions(&self) -> Vec<&Expression> {
        match self {
            LogicalOperator::ScanAllByLabelPropertyValue(op) => vec![&op.expression],
            LogicalOperator::ScanAllByLabelPropertyRange(op) => {
                let mut expressions = Vec::new();
                if let Some(bound) = &op.lower_bound {
                    expressions.push(&bound.expression);
                }
                if let Some(bound) = &op.upper_bound {
                    expressions.push(&bound.expression);
                }
                expressions
            }
            LogicalOperator::Filter(op) => vec![&op.expression],
            LogicalOperator::Produce(op) => op
                .named_expressions
                .iter()
                .map(|named| &named.expression)
                .collect(),
            LogicalOperator::Aggregate(op) => {
                let mut expressions: Vec<&Expression> = Vec::new();
                for element in &op.aggregations {
                    expressions.extend(element.first.as_ref());
                    expressions.extend(element.second.as_ref());
                }
                expressions.extend(op.group_by.iter());
                expressions
            }
            LogicalOperator::Skip(op) => vec![&op.expression],
            LogicalOperator::Limit(op) => vec![&op.expression],
            LogicalOperator::OrderBy(op) => {
                op.order_by.iter().map(|item| &item.expression).collect()
            }
            LogicalOperator::Unwind(op) => vec![&op.input_expression],
            LogicalOperator::CreateNode(op) => {
                op.properties.iter().map(|(_, value)| value).collect()
            }
            LogicalOperator::CreateExpand(op) => op
                .node_properties
                .iter()
                .chain(&op.edge_properties)
                .map(|(_, value)| value)
                .collect(),
            LogicalOperator::Delete(op) => op.expressions.iter().collect(),
            LogicalOperator::SetProperty(op) => {
                vec![op.property_lookup.expression.as_ref(), &op.expression]
            }
            LogicalOperator::SetProperties(op) => vec![&op.expression],
            LogicalOperator::RemoveProperty(op) => vec![op.property_lookup.expression.as_ref()],
            _ => Vec::new(),
        }
    }

    /// Stable name for logging and plan dumps.
    pub fn name(&self) -> &'static str {
        match self {
            LogicalOperator::Once => "Once",
            LogicalOperator::ScanAll(_) => "ScanAll",
            LogicalOperator::ScanAllByLabel(_) => "ScanAllByLabel",
            LogicalOperator::ScanAllByLabelPropertyValue(_) => "ScanAllByLabelPropertyValue",
            LogicalOperator::ScanAllByLabelPropertyRange(_) => "ScanAllByLabelPropertyRange",
            LogicalOperator::Expand(_) => "Expand",
            LogicalOperator::ExpandVariable(_) => "ExpandVariable",
            LogicalOperator::Filter(_) => "Filter",
            LogicalOperator::Produce(_) => "Produce",
            LogicalOperator::Accumulate(_) => "Accumulate",
            LogicalOperator::Aggregate(_) => "Aggregate",
            LogicalOperator::Skip(_) => "Skip",
            LogicalOperator::Limit(_) => "Limit",
            LogicalOperator::OrderBy(_) => "OrderBy",
            LogicalOperator::Distinct(_) => "Distinct",
            LogicalOperator::Optional(_) => "Optional",
            LogicalOperator::Unwind(_) => "Unwind",
            LogicalOperator::ConstructNamedPath(_) => "ConstructNamedPath",
            LogicalOperator::CreateNode(_) => "CreateNode",
            LogicalOperator::CreateExpand(_) => "CreateExpand",
            LogicalOperator::Delete(_) => "Delete",
            LogicalOperator::SetProperty(_) => "SetProperty",
            LogicalOperator::SetProperties(_) => "SetProperties",
            LogicalOperator::SetLabels(_) => "SetLabels",
            LogicalOperator::RemoveProperty(_) => "RemoveProperty",
            LogicalOperator::RemoveLabels(_) => "RemoveLabels",
            LogicalOperator::Merge(_) => "Merge",
            LogicalOperator::CreateIndex(_) => "CreateIndex",
        }
    }
}
