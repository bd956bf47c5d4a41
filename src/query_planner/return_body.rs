//! Classification of WITH/RETURN bodies and emission of their operator
//! pipeline.
//!
//! The classifier walks every named expression once, post-order, keeping a
//! stack of "this subtree contains an aggregation" flags. That single pass
//! yields everything the body pipeline needs: the output symbols, the
//! aggregations with their result symbols, the non-aggregate subtrees to
//! group by, and the set of previously bound symbols the body reads.
//!
//! In `WITH sum(n.a) + 2 * n.b AS s, n.c AS nc` the classifier groups by
//! `2 * n.b` and `n.c`: whenever a composite expression mixes aggregating
//! and non-aggregating children, each non-aggregating child becomes a
//! grouping key, and a named expression without any aggregation groups by
//! its whole value.

use std::collections::HashSet;

use crate::cypher_ast::ast::{
    AstStorage, Expression, NamedExpression, OrderByItem, ReturnBody, Where,
};
use crate::cypher_ast::symbol_table::{Symbol, SymbolTable};
use crate::cypher_ast::visitor::{walk_expression, ExpressionVisitor};
use crate::query_planner::operators::{
    Accumulate, Aggregate, AggregateElement, Distinct, Filter, Limit, LogicalOperator, OrderBy,
    Produce, Skip,
};

pub struct ReturnBodyContext {
    distinct: bool,
    skip: Option<Expression>,
    limit: Option<Expression>,
    order_by: Vec<OrderByItem>,
    where_expression: Option<Expression>,
    named_expressions: Vec<NamedExpression>,
    output_symbols: Vec<Symbol>,
    used_symbols: HashSet<Symbol>,
    aggregations: Vec<AggregateElement>,
    group_by: Vec<Expression>,
    has_aggregation: Vec<bool>,
}

impl ReturnBodyContext {
    /// Classifies `body`. Expands `*` first so those columns come before the
    /// explicitly written ones; the expansion is the one place the planner
    /// grows the symbol table, by associating fresh identifier and
    /// named-expression nodes with the existing symbols.
    pub fn new(
        body: &ReturnBody,
        symbol_table: &mut SymbolTable,
        storage: &mut AstStorage,
        bound_symbols: &HashSet<Symbol>,
        where_clause: Option<&Where>,
    ) -> Self {
        let mut context = Self {
            distinct: body.distinct,
            skip: body.skip.clone(),
            limit: body.limit.clone(),
            order_by: body.order_by.clone(),
            where_expression: where_clause.map(|clause| clause.expression.clone()),
            named_expressions: Vec::new(),
            output_symbols: Vec::new(),
            used_symbols: HashSet::new(),
            aggregations: Vec::new(),
            group_by: Vec::new(),
            has_aggregation: Vec::new(),
        };

        if body.all_identifiers {
            context.expand_user_symbols(symbol_table, storage, bound_symbols);
        }

        for named in &body.named_expressions {
            context
                .output_symbols
                .push(symbol_table.at(named.id).clone());
            context.classify_named_expression(named, symbol_table);
            context.named_expressions.push(named.clone());
        }

        if context.aggregations.is_empty() {
            // Visiting ORDER BY and WHERE only matters for used-symbol
            // collection. With aggregations present they may only refer to
            // newly produced symbols, so they are skipped entirely; finding
            // an aggregation in them here means semantic analysis let an
            // illegal body through.
            let order_by = context.order_by.clone();
            for item in &order_by {
                context.classify_auxiliary(&item.expression, symbol_table);
            }
            if let Some(where_expression) = context.where_expression.clone() {
                context.classify_auxiliary(&where_expression, symbol_table);
            }
            assert!(
                context.aggregations.is_empty(),
                "unexpected aggregations in ORDER BY or WHERE"
            );
        }

        context
    }

    /// Generates a named expression per user-declared bound symbol, sorted
    /// ascending by name, and seeds outputs, used symbols and grouping keys
    /// with them.
    fn expand_user_symbols(
        &mut self,
        symbol_table: &mut SymbolTable,
        storage: &mut AstStorage,
        bound_symbols: &HashSet<Symbol>,
    ) {
        assert!(
            self.named_expressions.is_empty() && self.output_symbols.is_empty(),
            "`*` must be expanded before named expressions are classified"
        );
        let mut user_symbols: Vec<&Symbol> = bound_symbols
            .iter()
            .filter(|symbol| symbol.user_declared)
            .collect();
        user_symbols.sort_by(|a, b| a.name.cmp(&b.name));

        for symbol in user_symbols {
            let identifier = storage.create_identifier(&symbol.name, true);
            symbol_table.associate(identifier.id, symbol.clone());
            let named = storage.create_named_expression(
                &symbol.name,
                Expression::Identifier(identifier.clone()),
            );
            symbol_table.associate(named.id, symbol.clone());

            self.group_by.push(Expression::Identifier(identifier));
            self.output_symbols.push(symbol.clone());
            self.used_symbols.insert(symbol.clone());
            self.named_expressions.push(named);
        }
    }

    fn classify_named_expression(&mut self, named: &NamedExpression, symbol_table: &SymbolTable) {
        let mut classifier = Classifier {
            context: self,
            symbol_table,
        };
        walk_expression(&named.expression, &mut classifier);
        assert_eq!(
            self.has_aggregation.len(),
            1,
            "classification must reduce to a single aggregation flag"
        );
        let has_aggregation = self.has_aggregation.pop().unwrap();
        if !has_aggregation {
            self.group_by.push(named.expression.clone());
        }
    }

    fn classify_auxiliary(&mut self, expression: &Expression, symbol_table: &SymbolTable) {
        let mut classifier = Classifier {
            context: self,
            symbol_table,
        };
        walk_expression(expression, &mut classifier);
        self.has_aggregation.pop();
    }

    pub fn distinct(&self) -> bool {
        self.distinct
    }

    pub fn skip(&self) -> Option<&Expression> {
        self.skip.as_ref()
    }

    pub fn limit(&self) -> Option<&Expression> {
        self.limit.as_ref()
    }

    pub fn order_by(&self) -> &[OrderByItem] {
        &self.order_by
    }

    pub fn where_expression(&self) -> Option<&Expression> {
        self.where_expression.as_ref()
    }

    pub fn named_expressions(&self) -> &[NamedExpression] {
        &self.named_expressions
    }

    /// Symbols produced by the body, in emission order.
    pub fn output_symbols(&self) -> &[Symbol] {
        &self.output_symbols
    }

    /// Previously bound symbols the body reads outside of output columns.
    pub fn used_symbols(&self) -> &HashSet<Symbol> {
        &self.used_symbols
    }

    pub fn aggregations(&self) -> &[AggregateElement] {
        &self.aggregations
    }

    pub fn group_by(&self) -> &[Expression] {
        &self.group_by
    }
}

/// Post-order walker computing the aggregation flags.
struct Classifier<'a> {
    context: &'a mut ReturnBodyContext,
    symbol_table: &'a SymbolTable,
}

impl Classifier<'_> {
    /// Pops one flag per child, ORs them, and when aggregating and
    /// non-aggregating children mix, turns every non-aggregating child into
    /// a grouping key.
    fn reduce_children(&mut self, children: Vec<&Expression>) {
        let mut flags = Vec::with_capacity(children.len());
        for _ in 0..children.len() {
            flags.push(
                self.context
                    .has_aggregation
                    .pop()
                    .expect("one aggregation flag per child"),
            );
        }
        flags.reverse();
        let has_aggregation = flags.iter().any(|flag| *flag);
        if has_aggregation {
            for (child, flag) in children.iter().zip(&flags) {
                if !flag {
                    self.context.group_by.push((*child).clone());
                }
            }
        }
        self.context.has_aggregation.push(has_aggregation);
    }
}

impl ExpressionVisitor for Classifier<'_> {
    fn post_visit(&mut self, expr: &Expression) {
        match expr {
            Expression::Literal(_) | Expression::Parameter(_) => {
                self.context.has_aggregation.push(false);
            }
            Expression::Identifier(identifier) => {
                let symbol = self.symbol_table.at(identifier.id).clone();
                // New symbols introduced by the body itself are not "used",
                // even when ORDER BY or WHERE mention them.
                if !self.context.output_symbols.contains(&symbol) {
                    self.context.used_symbols.insert(symbol);
                }
                self.context.has_aggregation.push(false);
            }
            Expression::ListLiteral(elements) => {
                self.reduce_children(elements.iter().collect());
            }
            Expression::MapLiteral(entries) => {
                self.reduce_children(entries.iter().map(|(_, value)| value).collect());
            }
            Expression::PropertyLookup(lookup) => {
                self.reduce_children(vec![lookup.expression.as_ref()]);
            }
            Expression::LabelsTest(test) => {
                self.reduce_children(vec![test.expression.as_ref()]);
            }
            Expression::Operator(application) => {
                self.reduce_children(application.operands.iter().collect());
            }
            Expression::ListSlicing(slicing) => {
                let mut children: Vec<&Expression> = vec![slicing.list.as_ref()];
                if let Some(lower) = &slicing.lower_bound {
                    children.push(lower.as_ref());
                }
                if let Some(upper) = &slicing.upper_bound {
                    children.push(upper.as_ref());
                }
                self.reduce_children(children);
            }
            Expression::Function(call) => {
                self.reduce_children(call.arguments.iter().collect());
            }
            Expression::If(_) => {
                let mut has_aggregation = false;
                for _ in 0..3 {
                    has_aggregation |= self
                        .context
                        .has_aggregation
                        .pop()
                        .expect("three aggregation flags for IF");
                }
                assert!(
                    !has_aggregation,
                    "aggregations inside CASE are not allowed"
                );
                self.context.has_aggregation.push(false);
            }
            Expression::All(all) => {
                let mut has_aggregation = false;
                for _ in 0..2 {
                    has_aggregation |= self
                        .context
                        .has_aggregation
                        .pop()
                        .expect("two aggregation flags for ALL");
                }
                // The quantifier binds its own variable; it is not a free
                // symbol of the body.
                self.context
                    .used_symbols
                    .remove(self.symbol_table.at(all.identifier.id));
                self.context.has_aggregation.push(has_aggregation);
            }
            Expression::Aggregation(aggregation) => {
                let argument_count =
                    aggregation.first.is_some() as usize + aggregation.second.is_some() as usize;
                for _ in 0..argument_count {
                    self.context
                        .has_aggregation
                        .pop()
                        .expect("one aggregation flag per aggregation argument");
                }
                self.context.aggregations.push(AggregateElement {
                    first: aggregation.first.as_deref().cloned(),
                    second: aggregation.second.as_deref().cloned(),
                    op: aggregation.op,
                    output_symbol: self.symbol_table.at(aggregation.id).clone(),
                });
                self.context.has_aggregation.push(true);
            }
        }
    }
}

/// Threads the body pipeline onto `input`, bottom-up:
/// Accumulate, Aggregate, Produce, Distinct, OrderBy, Skip, Limit, Filter.
///
/// Accumulate comes first so a writing prefix settles before anything is
/// computed from it. SKIP and LIMIT act on aggregated results, so Aggregate
/// precedes them. ORDER BY and WHERE may refer to symbols the body itself
/// produces, so both follow Produce, and WHERE goes last to filter the
/// final projection.
pub fn gen_return_body(
    input: LogicalOperator,
    advance_command: bool,
    context: &ReturnBodyContext,
    accumulate: bool,
    bound_symbols: &HashSet<Symbol>,
) -> LogicalOperator {
    let mut captured: Vec<Symbol> = bound_symbols.iter().cloned().collect();
    captured.sort();

    let mut last = input;
    if accumulate {
        last = LogicalOperator::Accumulate(Accumulate {
            input: Box::new(last),
            symbols: captured.clone(),
            advance_command,
        });
    }
    if !context.aggregations().is_empty() {
        last = LogicalOperator::Aggregate(Aggregate {
            input: Box::new(last),
            aggregations: context.aggregations().to_vec(),
            group_by: context.group_by().to_vec(),
            remember: captured,
        });
    }
    last = LogicalOperator::Produce(Produce {
        input: Box::new(last),
        named_expressions: context.named_expressions().to_vec(),
    });
    // Distinct deduplicates produced rows, so it sits right above Produce.
    if context.distinct() {
        last = LogicalOperator::Distinct(Distinct {
            input: Box::new(last),
            value_symbols: context.output_symbols().to_vec(),
        });
    }
    if !context.order_by().is_empty() {
        last = LogicalOperator::OrderBy(OrderBy {
            input: Box::new(last),
            order_by: context.order_by().to_vec(),
            output_symbols: context.output_symbols().to_vec(),
        });
    }
    if let Some(skip) = context.skip() {
        last = LogicalOperator::Skip(Skip {
            input: Box::new(last),
            expression: skip.clone(),
        });
    }
    if let Some(limit) = context.limit() {
        last = LogicalOperator::Limit(Limit {
            input: Box::new(last),
            expression: limit.clone(),
        });
    }
    if let Some(where_expression) = context.where_expression() {
        last = LogicalOperator::Filter(Filter {
            input: Box::new(last),
            expression: where_expression.clone(),
        });
    }
    last
}
