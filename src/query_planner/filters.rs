//! Filter collection and pushdown.
//!
//! All filtering constraints of a MATCH clause end up here: inline label and
//! property constraints from pattern atoms first, then the WHERE expression
//! split into top-level AND conjuncts, everything in source order. The
//! planner drains the store after each new symbol binding, so every filter
//! is emitted directly above the operator that binds the last of its free
//! symbols.

use std::collections::HashSet;

use crate::cypher_ast::ast::{
    Expression, LabelsTest, Operator, OperatorApplication, Pattern, PatternAtom, PropertyLookup,
};
use crate::cypher_ast::symbol_table::{Symbol, SymbolTable};
use crate::cypher_ast::visitor::UsedSymbolsCollector;

/// Comparisons a property filter can carry, normalized so the property
/// lookup is on the left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyComparison {
    Equal,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
}

/// What a stored filter constrains. Label and property filters carry enough
/// structure for the MATCH planner to turn them into indexed scans.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterKind {
    Generic,
    /// A labels test on a single pattern symbol.
    Label { symbol: Symbol, labels: Vec<String> },
    /// `symbol.property <comparison> value`, where `value` does not refer to
    /// `symbol` itself.
    Property {
        symbol: Symbol,
        property: String,
        comparison: PropertyComparison,
        value: Expression,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterInfo {
    pub expression: Expression,
    pub used_symbols: HashSet<Symbol>,
    pub kind: FilterKind,
}

impl FilterInfo {
    fn is_covered_by(&self, bound: &HashSet<Symbol>) -> bool {
        self.used_symbols.iter().all(|symbol| bound.contains(symbol))
    }
}

/// The filter store for one MATCH clause.
#[derive(Debug, Default)]
pub struct Filters {
    filters: Vec<FilterInfo>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Registers the inline constraints of every atom in `pattern`: a labels
    /// test per labeled node and an equality per property map entry. Edge
    /// types are not collected; expansion operators carry them directly.
    pub fn add_pattern_filters(&mut self, pattern: &Pattern, symbol_table: &SymbolTable) {
        for atom in &pattern.atoms {
            let identifier = atom.identifier().clone();
            let symbol = symbol_table.at(identifier.id).clone();
            let (labels, properties) = match atom {
                PatternAtom::Node(node) => (&node.labels, &node.properties),
                PatternAtom::Edge(edge) => (&edge.edge_types, &edge.properties),
            };
            if let PatternAtom::Node(_) = atom {
                if !labels.is_empty() {
                    let expression = Expression::LabelsTest(LabelsTest {
                        expression: Box::new(Expression::Identifier(identifier.clone())),
                        labels: labels.clone(),
                    });
                    self.filters.push(FilterInfo {
                        expression,
                        used_symbols: HashSet::from([symbol.clone()]),
                        kind: FilterKind::Label {
                            symbol: symbol.clone(),
                            labels: labels.clone(),
                        },
                    });
                }
            }
            for (property, value) in properties {
                let lookup = Expression::PropertyLookup(PropertyLookup {
                    expression: Box::new(Expression::Identifier(identifier.clone())),
                    property: property.clone(),
                });
                let expression = Expression::Operator(OperatorApplication {
                    operator: Operator::Equal,
                    operands: vec![lookup, value.clone()],
                });
                let value_symbols = UsedSymbolsCollector::collect(value, symbol_table);
                // A value referring back to the same symbol cannot feed an
                // index lookup.
                let kind = if value_symbols.contains(&symbol) {
                    FilterKind::Generic
                } else {
                    FilterKind::Property {
                        symbol: symbol.clone(),
                        property: property.clone(),
                        comparison: PropertyComparison::Equal,
                        value: value.clone(),
                    }
                };
                let mut used_symbols = value_symbols;
                used_symbols.insert(symbol.clone());
                self.filters.push(FilterInfo {
                    expression,
                    used_symbols,
                    kind,
                });
            }
        }
    }

    /// Splits a WHERE expression on top-level ANDs and stores each conjunct.
    pub fn add_where(&mut self, expression: &Expression, symbol_table: &SymbolTable) {
        match expression {
            Expression::Operator(application) if application.operator == Operator::And => {
                for operand in &application.operands {
                    self.add_where(operand, symbol_table);
                }
            }
            _ => {
                let used_symbols = UsedSymbolsCollector::collect(expression, symbol_table);
                let kind = analyze_conjunct(expression, symbol_table);
                self.filters.push(FilterInfo {
                    expression: expression.clone(),
                    used_symbols,
                    kind,
                });
            }
        }
    }

    /// Removes every filter whose free symbols are bound and AND-joins them
    /// into a single predicate, in source order.
    pub fn extract(&mut self, bound: &HashSet<Symbol>) -> Option<Expression> {
        let mut joined: Option<Expression> = None;
        self.filters.retain(|filter| {
            if filter.is_covered_by(bound) {
                let expression = filter.expression.clone();
                joined = Some(match joined.take() {
                    None => expression,
                    Some(accumulated) => Expression::and(accumulated, expression),
                });
                false
            } else {
                true
            }
        });
        joined
    }

    /// Claims the label filter of `symbol` for an indexed scan, so it is not
    /// re-emitted as a Filter. When the atom carries several labels, one is
    /// returned for the scan and the rest stay behind as a residual filter.
    pub fn take_scan_label(&mut self, symbol: &Symbol) -> Option<String> {
        let index = self.filters.iter().position(|filter| {
            matches!(&filter.kind, FilterKind::Label { symbol: s, .. } if s == symbol)
        })?;
        let FilterKind::Label { labels, .. } = self.filters[index].kind.clone() else {
            unreachable!();
        };
        let scan_label = labels[0].clone();
        if labels.len() == 1 {
            self.filters.remove(index);
        } else {
            let remaining: Vec<String> = labels[1..].to_vec();
            let filter = &mut self.filters[index];
            if let Expression::LabelsTest(test) = &mut filter.expression {
                test.labels = remaining.clone();
            }
            filter.kind = FilterKind::Label {
                symbol: symbol.clone(),
                labels: remaining,
            };
        }
        Some(scan_label)
    }

    /// A peek at the label available for scanning `symbol`, without claiming
    /// it.
    pub fn scan_label(&self, symbol: &Symbol) -> Option<&str> {
        self.filters.iter().find_map(|filter| match &filter.kind {
            FilterKind::Label { symbol: s, labels } if s == symbol => {
                labels.first().map(|label| label.as_str())
            }
            _ => None,
        })
    }

    /// Claims an equality filter `symbol.property = value` whose value only
    /// refers to symbols in `bound`.
    pub fn take_property_value(
        &mut self,
        symbol: &Symbol,
        bound: &HashSet<Symbol>,
    ) -> Option<(String, Expression)> {
        let index = self.filters.iter().position(|filter| {
            matches!(
                &filter.kind,
                FilterKind::Property { symbol: s, comparison: PropertyComparison::Equal, .. }
                    if s == symbol
            ) && filter
                .used_symbols
                .iter()
                .all(|used| used == symbol || bound.contains(used))
        })?;
        let filter = self.filters.remove(index);
        match filter.kind {
            FilterKind::Property { property, value, .. } => Some((property, value)),
            _ => unreachable!(),
        }
    }

    /// A peek at whether [`Filters::take_property_value`] would succeed.
    pub fn has_property_value(&self, symbol: &Symbol, bound: &HashSet<Symbol>) -> Option<&str> {
        self.filters.iter().find_map(|filter| match &filter.kind {
            FilterKind::Property {
                symbol: s,
                property,
                comparison: PropertyComparison::Equal,
                ..
            } if s == symbol
                && filter
                    .used_symbols
                    .iter()
                    .all(|used| used == symbol || bound.contains(used)) =>
            {
                Some(property.as_str())
            }
            _ => None,
        })
    }

    /// A peek at whether a range lookup on `symbol` is possible; returns the
    /// property of the first qualifying comparison.
    pub fn has_property_range(&self, symbol: &Symbol, bound: &HashSet<Symbol>) -> Option<&str> {
        self.filters.iter().find_map(|filter| match &filter.kind {
            FilterKind::Property {
                symbol: s,
                property,
                comparison,
                ..
            } if s == symbol
                && *comparison != PropertyComparison::Equal
                && filter
                    .used_symbols
                    .iter()
                    .all(|used| used == symbol || bound.contains(used)) =>
            {
                Some(property.as_str())
            }
            _ => None,
        })
    }

    /// Claims up to one lower and one upper comparison on `property` of
    /// `symbol`, in source order. Further comparisons on the same property
    /// stay behind and are emitted as regular filters.
    pub fn take_property_range(
        &mut self,
        symbol: &Symbol,
        property: &str,
        bound: &HashSet<Symbol>,
    ) -> (
        Option<(PropertyComparison, Expression)>,
        Option<(PropertyComparison, Expression)>,
    ) {
        let mut lower: Option<(PropertyComparison, Expression)> = None;
        let mut upper: Option<(PropertyComparison, Expression)> = None;
        self.filters.retain(|filter| match &filter.kind {
            FilterKind::Property {
                symbol: s,
                property: p,
                comparison,
                value,
            } if s == symbol
                && p == property
                && *comparison != PropertyComparison::Equal
                && filter
                    .used_symbols
                    .iter()
                    .all(|used| used == symbol || bound.contains(used)) =>
            {
                let slot = match comparison {
                    PropertyComparison::GreaterThan | PropertyComparison::GreaterThanEqual => {
                        &mut lower
                    }
                    _ => &mut upper,
                };
                if slot.is_none() {
                    *slot = Some((*comparison, value.clone()));
                    false
                } else {
                    true
                }
            }
            _ => true,
        });
        (lower, upper)
    }
}

/// Classifies one WHERE conjunct. Anything that is not a recognizable label
/// test or single-symbol property comparison stays generic.
fn analyze_conjunct(expression: &Expression, symbol_table: &SymbolTable) -> FilterKind {
    if let Expression::LabelsTest(test) = expression {
        if let Expression::Identifier(identifier) = test.expression.as_ref() {
            return FilterKind::Label {
                symbol: symbol_table.at(identifier.id).clone(),
                labels: test.labels.clone(),
            };
        }
    }
    if let Expression::Operator(application) = expression {
        if application.operands.len() == 2 {
            let comparison = match application.operator {
                Operator::Equal => Some(PropertyComparison::Equal),
                Operator::LessThan => Some(PropertyComparison::LessThan),
                Operator::LessThanEqual => Some(PropertyComparison::LessThanEqual),
                Operator::GreaterThan => Some(PropertyComparison::GreaterThan),
                Operator::GreaterThanEqual => Some(PropertyComparison::GreaterThanEqual),
                _ => None,
            };
            if let Some(comparison) = comparison {
                if let Some(kind) = property_comparison(
                    &application.operands[0],
                    &application.operands[1],
                    comparison,
                    symbol_table,
                ) {
                    return kind;
                }
                if let Some(kind) = property_comparison(
                    &application.operands[1],
                    &application.operands[0],
                    flip(comparison),
                    symbol_table,
                ) {
                    return kind;
                }
            }
        }
    }
    FilterKind::Generic
}

fn property_comparison(
    lhs: &Expression,
    rhs: &Expression,
    comparison: PropertyComparison,
    symbol_table: &SymbolTable,
) -> Option<FilterKind> {
    let Expression::PropertyLookup(lookup) = lhs else {
        return None;
    };
    let Expression::Identifier(identifier) = lookup.expression.as_ref() else {
        return None;
    };
    let symbol = symbol_table.at(identifier.id).clone();
    // A value referring back to the same symbol cannot feed an index lookup.
    if UsedSymbolsCollector::collect(rhs, symbol_table).contains(&symbol) {
        return None;
    }
    Some(FilterKind::Property {
        symbol,
        property: lookup.property.clone(),
        comparison,
        value: rhs.clone(),
    })
}

fn flip(comparison: PropertyComparison) -> PropertyComparison {
    match comparison {
        PropertyComparison::Equal => PropertyComparison::Equal,
        PropertyComparison::LessThan => PropertyComparison::GreaterThan,
        PropertyComparison::LessThanEqual => PropertyComparison::GreaterThanEqual,
        PropertyComparison::GreaterThan => PropertyComparison::LessThan,
        PropertyComparison::GreaterThanEqual => PropertyComparison::LessThanEqual,
    }
}
