use thiserror::Error;

/// Errors the planner reports to the surrounding query engine.
///
/// These are expected, user-facing conditions; each variant maps onto a
/// distinct Cypher error. Contract violations (malformed pattern shape,
/// missing symbol-table entries, aggregations where semantic analysis must
/// have rejected them) panic instead, because the plan would be wrong.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlanError {
    #[error("Symbols used for created edges cannot be redeclared: `{0}`.")]
    EdgeRedeclaration(String),

    #[error("RETURN must be the last clause in a query.")]
    ReturnMustBeLast,

    #[error("CREATE INDEX cannot be combined with other clauses.")]
    IndexInCompoundQuery,

    #[error("Query planning was aborted.")]
    Aborted,
}
