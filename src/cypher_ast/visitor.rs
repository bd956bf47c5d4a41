//! Expression visitor.
//!
//! Separates tree traversal from the work done at each node so that
//! different passes (the return-body classifier, free-symbol collection)
//! can share one walker. Children are visited in source order, and
//! `post_visit` fires after all children of a node, which is what
//! stack-based classifiers rely on.

use std::collections::HashSet;

use crate::cypher_ast::ast::Expression;
use crate::cypher_ast::symbol_table::{Symbol, SymbolTable};

pub trait ExpressionVisitor {
    /// Called before descending into `expr`. Return false to skip the
    /// subtree entirely (its `post_visit` is skipped too).
    fn pre_visit(&mut self, _expr: &Expression) -> bool {
        true
    }

    /// Called after every child of `expr` has been visited.
    fn post_visit(&mut self, _expr: &Expression);
}

/// Drives an [`ExpressionVisitor`] over `expr` in depth-first order.
///
/// The AST is a tree by construction; a cycle would make this recurse
/// forever, and earlier passes guarantee there is none.
pub fn walk_expression<V: ExpressionVisitor>(expr: &Expression, visitor: &mut V) {
    if !visitor.pre_visit(expr) {
        return;
    }
    match expr {
        Expression::Literal(_) | Expression::Identifier(_) | Expression::Parameter(_) => {}
        Expression::ListLiteral(elements) => {
            for element in elements {
                walk_expression(element, visitor);
            }
        }
        Expression::MapLiteral(entries) => {
            for (_, value) in entries {
                walk_expression(value, visitor);
            }
        }
        Expression::PropertyLookup(lookup) => {
            walk_expression(&lookup.expression, visitor);
        }
        Expression::LabelsTest(test) => {
            walk_expression(&test.expression, visitor);
        }
        Expression::Operator(application) => {
            for operand in &application.operands {
                walk_expression(operand, visitor);
            }
        }
        Expression::ListSlicing(slicing) => {
            walk_expression(&slicing.list, visitor);
            if let Some(lower) = &slicing.lower_bound {
                walk_expression(lower, visitor);
            }
            if let Some(upper) = &slicing.upper_bound {
                walk_expression(upper, visitor);
            }
        }
        Expression::Function(call) => {
            for argument in &call.arguments {
                walk_expression(argument, visitor);
            }
        }
        Expression::If(if_operator) => {
            walk_expression(&if_operator.condition, visitor);
            walk_expression(&if_operator.then_expression, visitor);
            walk_expression(&if_operator.else_expression, visitor);
        }
        Expression::All(all) => {
            // The quantifier identifier is a local binding, not a child
            // expression.
            walk_expression(&all.list_expression, visitor);
            walk_expression(&all.predicate, visitor);
        }
        Expression::Aggregation(aggregation) => {
            if let Some(first) = &aggregation.first {
                walk_expression(first, visitor);
            }
            if let Some(second) = &aggregation.second {
                walk_expression(second, visitor);
            }
        }
    }
    visitor.post_visit(expr);
}

/// Collects the free symbols of an expression.
///
/// Symbols bound inside quantifiers are removed again once the quantifier
/// closes, so `all(x IN lst WHERE x > n)` reports `lst` and `n` but not `x`.
pub struct UsedSymbolsCollector<'a> {
    symbol_table: &'a SymbolTable,
    pub symbols: HashSet<Symbol>,
}

impl<'a> UsedSymbolsCollector<'a> {
    pub fn new(symbol_table: &'a SymbolTable) -> Self {
        Self {
            symbol_table,
            symbols: HashSet::new(),
        }
    }

    pub fn collect(expression: &Expression, symbol_table: &'a SymbolTable) -> HashSet<Symbol> {
        let mut collector = Self::new(symbol_table);
        walk_expression(expression, &mut collector);
        collector.symbols
    }
}

impl ExpressionVisitor for UsedSymbolsCollector<'_> {
    fn post_visit(&mut self, expr: &Expression) {
        match expr {
            Expression::Identifier(identifier) => {
                self.symbols.insert(self.symbol_table.at(identifier.id).clone());
            }
            Expression::All(all) => {
                self.symbols.remove(self.symbol_table.at(all.identifier.id));
            }
            _ => {}
        }
    }
}
