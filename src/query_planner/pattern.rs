//! Pattern chain parsing and reduction.
//!
//! Patterns arrive as an alternating `NodeAtom (EdgeAtom NodeAtom)*` list.
//! [`reduce_pattern`] folds over that shape, and [`PatternChain`] gives the
//! MATCH planner a parsed view it can walk from either end.

use crate::cypher_ast::ast::{EdgeAtom, EdgeDirection, NodeAtom, Pattern, PatternAtom};
use crate::query_planner::errors::PlanError;

/// One `-[edge]-(node)` step of a chain. `direction` is relative to the
/// walking order, so a reversed chain flips it.
#[derive(Debug)]
pub struct ChainStep<'a> {
    pub edge: &'a EdgeAtom,
    pub node: &'a NodeAtom,
    pub direction: EdgeDirection,
}

/// A pattern parsed into its first node and subsequent steps.
#[derive(Debug)]
pub struct PatternChain<'a> {
    pub first: &'a NodeAtom,
    pub steps: Vec<ChainStep<'a>>,
}

impl<'a> PatternChain<'a> {
    /// Parses the atom alternation. A pattern that does not follow the
    /// `node (edge node)*` shape is a bug in an earlier pass and aborts.
    pub fn parse(pattern: &'a Pattern) -> Self {
        let mut atoms = pattern.atoms.iter();
        let first = match atoms.next() {
            Some(PatternAtom::Node(node)) => node,
            Some(PatternAtom::Edge(_)) => panic!("first pattern atom is not a node"),
            None => panic!("missing atoms in pattern"),
        };
        let mut steps = Vec::new();
        loop {
            let edge = match atoms.next() {
                None => break,
                Some(PatternAtom::Edge(edge)) => edge,
                Some(PatternAtom::Node(_)) => panic!("expected an edge atom in pattern"),
            };
            let node = match atoms.next() {
                Some(PatternAtom::Node(node)) => node,
                _ => panic!("edge atom must not end the pattern"),
            };
            steps.push(ChainStep {
                edge,
                node,
                direction: edge.direction,
            });
        }
        Self { first, steps }
    }

    /// The walk in the opposite direction: last node first, edge directions
    /// flipped.
    pub fn reversed(self) -> Self {
        if self.steps.is_empty() {
            return self;
        }
        let mut nodes = vec![self.first];
        for step in &self.steps {
            nodes.push(step.node);
        }
        let first = nodes.pop().expect("chain has at least one node");
        let mut steps = Vec::with_capacity(self.steps.len());
        for (step, node) in self.steps.into_iter().rev().zip(nodes.into_iter().rev()) {
            steps.push(ChainStep {
                edge: step.edge,
                node,
                direction: step.direction.reversed(),
            });
        }
        Self { first, steps }
    }
}

/// Folds over a pattern: `base` on the first node, then `collect` once per
/// `(previous node, edge, node)` triple, threading the accumulator through.
/// Both callbacks receive `state`, so a caller can mutate its planning
/// context from either one.
///
/// Counting edges, for example:
///
/// ```ignore
/// let edges = reduce_pattern(
///     &pattern,
///     &mut (),
///     |_, _| Ok(0),
///     |_, count, _prev, _edge, _node| Ok(count + 1),
/// )?;
/// ```
pub fn reduce_pattern<T, S>(
    pattern: &Pattern,
    state: &mut S,
    base: impl FnOnce(&mut S, &NodeAtom) -> Result<T, PlanError>,
    mut collect: impl FnMut(&mut S, T, &NodeAtom, &EdgeAtom, &NodeAtom) -> Result<T, PlanError>,
) -> Result<T, PlanError> {
    let chain = PatternChain::parse(pattern);
    let mut accumulator = base(state, chain.first)?;
    let mut previous = chain.first;
    for step in &chain.steps {
        accumulator = collect(state, accumulator, previous, step.edge, step.node)?;
        previous = step.node;
    }
    Ok(accumulator)
}
