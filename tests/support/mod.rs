//! Shared helpers for planner integration tests.
//!
//! Tests receive what the planner expects from semantic analysis: an AST
//! whose identifier nodes are associated with symbols. [`QueryBuilder`]
//! plays that role, resolving names against a scope the way the analyzer
//! would, including the scope reset a WITH clause performs.

use std::collections::{HashMap, HashSet};

use cypher_planner::config::PlannerConfig;
use cypher_planner::cypher_ast::ast::*;
use cypher_planner::cypher_ast::visitor::UsedSymbolsCollector;
use cypher_planner::cypher_ast::{Symbol, SymbolKind, SymbolTable};
use cypher_planner::query_planner::{
    plan_query, DatabaseIndexes, LogicalOperator, NoIndexes, PlanError, PlanningContext,
};

pub struct QueryBuilder {
    pub storage: AstStorage,
    pub table: SymbolTable,
    scope: HashMap<String, Symbol>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self {
            storage: AstStorage::new(),
            table: SymbolTable::new(),
            scope: HashMap::new(),
        }
    }

    fn declare(&mut self, name: &str, kind: SymbolKind) -> Symbol {
        if let Some(symbol) = self.scope.get(name) {
            return symbol.clone();
        }
        let symbol = self.table.create_symbol(name, true, kind, 0);
        self.scope.insert(name.to_string(), symbol.clone());
        symbol
    }

    pub fn symbol(&self, name: &str) -> Symbol {
        self.scope
            .get(name)
            .unwrap_or_else(|| panic!("`{}` is not in scope", name))
            .clone()
    }

    // -- pattern atoms ------------------------------------------------------

    pub fn node_atom(&mut self, name: &str, labels: &[&str]) -> NodeAtom {
        self.node_atom_with_props(name, labels, vec![])
    }

    pub fn node_atom_with_props(
        &mut self,
        name: &str,
        labels: &[&str],
        properties: Vec<(&str, Expression)>,
    ) -> NodeAtom {
        let identifier = self.storage.create_identifier(name, true);
        let symbol = self.declare(name, SymbolKind::Node);
        self.table.associate(identifier.id, symbol);
        NodeAtom {
            identifier,
            labels: labels.iter().map(|label| label.to_string()).collect(),
            properties: properties
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        }
    }

    pub fn edge_atom(&mut self, name: &str, edge_types: &[&str]) -> EdgeAtom {
        let identifier = self.storage.create_identifier(name, true);
        let symbol = self.declare(name, SymbolKind::Edge);
        self.table.associate(identifier.id, symbol);
        EdgeAtom {
            identifier,
            direction: EdgeDirection::Out,
            edge_types: edge_types.iter().map(|t| t.to_string()).collect(),
            properties: vec![],
            variable_length: None,
        }
    }

    pub fn pattern(&mut self, atoms: Vec<PatternAtom>) -> Pattern {
        let identifier = self.storage.create_identifier("anon", false);
        let symbol = self
            .table
            .create_symbol("anon", false, SymbolKind::Path, 0);
        self.table.associate(identifier.id, symbol);
        Pattern { identifier, atoms }
    }

    pub fn named_pattern(&mut self, name: &str, atoms: Vec<PatternAtom>) -> Pattern {
        let identifier = self.storage.create_identifier(name, true);
        let symbol = self.declare(name, SymbolKind::Path);
        self.table.associate(identifier.id, symbol);
        Pattern { identifier, atoms }
    }

    // -- expressions --------------------------------------------------------

    /// A reference to a name already in scope.
    pub fn ident(&mut self, name: &str) -> Expression {
        let symbol = self.symbol(name);
        let identifier = self.storage.create_identifier(name, true);
        self.table.associate(identifier.id, symbol);
        Expression::Identifier(identifier)
    }

    /// A reference to a specific symbol, regardless of scope. ORDER BY and
    /// WHERE in a return body may refer to columns the body itself names.
    pub fn ident_for(&mut self, symbol: Symbol, name: &str) -> Expression {
        let identifier = self.storage.create_identifier(name, true);
        self.table.associate(identifier.id, symbol);
        Expression::Identifier(identifier)
    }

    pub fn prop(&mut self, name: &str, property: &str) -> Expression {
        Expression::PropertyLookup(self.prop_lookup(name, property))
    }

    pub fn prop_lookup(&mut self, name: &str, property: &str) -> PropertyLookup {
        let base = self.ident(name);
        PropertyLookup {
            expression: Box::new(base),
            property: property.to_string(),
        }
    }

    /// An aggregation with its own anonymous result symbol, the way the
    /// analyzer assigns one.
    pub fn aggregation(
        &mut self,
        op: AggregationOp,
        first: Option<Expression>,
        second: Option<Expression>,
    ) -> Expression {
        let id = self.storage.next_id();
        let symbol = self.table.create_symbol("aggregate", false, SymbolKind::Expression, 0);
        self.table.associate(id, symbol);
        Expression::Aggregation(Aggregation {
            id,
            op,
            first: first.map(Box::new),
            second: second.map(Box::new),
        })
    }

    /// `expression AS alias` with a fresh output symbol. The scope is not
    /// touched; WITH does that through [`QueryBuilder::with_clause`].
    pub fn named(&mut self, alias: &str, expression: Expression) -> NamedExpression {
        let named = self.storage.create_named_expression(alias, expression);
        let symbol = self
            .table
            .create_symbol(alias, true, SymbolKind::Expression, 0);
        self.table.associate(named.id, symbol);
        named
    }

    // -- clauses ------------------------------------------------------------

    pub fn match_clause(&mut self, patterns: Vec<Pattern>, where_clause: Option<Where>) -> Clause {
        Clause::Match(Match {
            optional: false,
            patterns,
            where_clause,
        })
    }

    pub fn return_clause(&mut self, named_expressions: Vec<NamedExpression>) -> Clause {
        Clause::Return(Return {
            body: ReturnBody {
                named_expressions,
                ..Default::default()
            },
        })
    }

    /// `UNWIND expression AS alias`; adds the alias to the scope.
    pub fn unwind_clause(&mut self, alias: &str, expression: Expression) -> Clause {
        let named = self.storage.create_named_expression(alias, expression);
        let symbol = self
            .table
            .create_symbol(alias, true, SymbolKind::Expression, 0);
        self.table.associate(named.id, symbol.clone());
        self.scope.insert(alias.to_string(), symbol);
        Clause::Unwind(Unwind {
            named_expression: named,
        })
    }

    /// A WITH clause; resets the scope to exactly its outputs, as the
    /// analyzer does.
    pub fn with_clause(
        &mut self,
        named_expressions: Vec<NamedExpression>,
        where_clause: Option<Where>,
    ) -> Clause {
        self.scope.clear();
        for named in &named_expressions {
            let symbol = self.table.at(named.id).clone();
            self.scope.insert(named.name.clone(), symbol);
        }
        Clause::With(With {
            body: ReturnBody {
                named_expressions,
                ..Default::default()
            },
            where_clause,
        })
    }

    // -- planning -----------------------------------------------------------

    pub fn plan(&mut self, clauses: Vec<Clause>) -> Result<LogicalOperator, PlanError> {
        self.plan_with(clauses, &NoIndexes, &PlannerConfig::default())
    }

    pub fn plan_with(
        &mut self,
        clauses: Vec<Clause>,
        indexes: &dyn DatabaseIndexes,
        config: &PlannerConfig,
    ) -> Result<LogicalOperator, PlanError> {
        let query = CypherQuery { clauses };
        let mut context =
            PlanningContext::new(&mut self.table, &mut self.storage, indexes, config);
        plan_query(&query, &mut context)
    }
}

// -- expression shorthands --------------------------------------------------

pub fn int(value: i64) -> Expression {
    Expression::Literal(Literal::Integer(value))
}

pub fn gt(lhs: Expression, rhs: Expression) -> Expression {
    Expression::Operator(OperatorApplication {
        operator: Operator::GreaterThan,
        operands: vec![lhs, rhs],
    })
}

// -- assertions -------------------------------------------------------------

/// Operator names from the root down to the leaf, following `input` edges.
pub fn op_names(plan: &LogicalOperator) -> Vec<&'static str> {
    let mut names = Vec::new();
    let mut cursor = Some(plan);
    while let Some(operator) = cursor {
        names.push(operator.name());
        cursor = operator.input();
    }
    names
}

/// The nth operator from the root, following `input` edges.
pub fn nth_op(plan: &LogicalOperator, n: usize) -> &LogicalOperator {
    let mut cursor = plan;
    for _ in 0..n {
        cursor = cursor.input().expect("plan shorter than expected");
    }
    cursor
}

/// Every operator's expressions may only use symbols some operator at or
/// below it (or an enclosing subtree) binds.
pub fn assert_symbols_bound(plan: &LogicalOperator, table: &SymbolTable) {
    fn check(
        operator: &LogicalOperator,
        inherited: &HashSet<Symbol>,
        table: &SymbolTable,
    ) -> HashSet<Symbol> {
        let mut available = match operator.input() {
            Some(input) => check(input, inherited, table),
            None => inherited.clone(),
        };
        match operator {
            LogicalOperator::Optional(optional) => {
                let branch = check(&optional.optional, &available, table);
                available.extend(branch);
            }
            LogicalOperator::Merge(merge) => {
                let match_branch = check(&merge.merge_match, &available, table);
                let create_branch = check(&merge.merge_create, &available, table);
                available.extend(match_branch);
                available.extend(create_branch);
            }
            _ => {}
        }
        available.extend(operator.introduced_symbols(table));
        for expression in operator.expressions() {
            for symbol in UsedSymbolsCollector::collect(expression, table) {
                assert!(
                    available.contains(&symbol),
                    "operator {} references `{}` before it is bound",
                    operator.name(),
                    symbol.name
                );
            }
        }
        available
    }
    check(plan, &HashSet::new(), table);
}

/// No symbol is introduced twice on any root-to-leaf path.
pub fn assert_single_introduction(plan: &LogicalOperator, table: &SymbolTable) {
    fn walk(operator: &LogicalOperator, seen: &HashSet<Symbol>, table: &SymbolTable) {
        // Optional and Merge report their subtree's bindings, and `*`
        // expansion maps Produce outputs onto symbols bound below; in all
        // three cases the actual introduction happens elsewhere.
        let own = match operator {
            LogicalOperator::Optional(_)
            | LogicalOperator::Merge(_)
            | LogicalOperator::Produce(_) => vec![],
            _ => operator.introduced_symbols(table),
        };
        for symbol in &own {
            assert!(
                !seen.contains(symbol),
                "`{}` introduced twice on one path",
                symbol.name
            );
        }
        let mut seen = seen.clone();
        seen.extend(own);
        if let Some(input) = operator.input() {
            walk(input, &seen, table);
        }
        match operator {
            LogicalOperator::Optional(optional) => walk(&optional.optional, &seen, table),
            LogicalOperator::Merge(merge) => {
                walk(&merge.merge_match, &seen, table);
                walk(&merge.merge_create, &seen, table);
            }
            _ => {}
        }
    }
    walk(plan, &HashSet::new(), table);
}
