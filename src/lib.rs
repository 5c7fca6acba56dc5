//! Pointer analysis over a pointer subgraph: a directed graph of
//! memory-relevant operations linked by control flow. A worklist fixpoint
//! solver computes, for every node, the set of abstract memory locations and
//! byte offsets the node may point to.
//!
//! The graph lives in an index-addressed arena ([`subgraph::PointerSubgraph`]);
//! analyses plug into the solver through the [`solver::PointerAnalysis`]
//! capability trait, which supplies the memory-object model and the optional
//! hooks. [`flow_insensitive`] provides the stock flow-insensitive variant.

pub mod flow_insensitive;
pub mod node;
pub mod object;
pub mod pointer;
pub mod points_to;
pub mod solver;
pub mod subgraph;

pub use crate::{
    node::{NodeId, NodeKind, PSNode},
    object::{MemoryObject, ObjectId, ObjectStore},
    pointer::{Offset, Pointer},
    points_to::PointsToSet,
    solver::{PointerAnalysis, Solver},
    subgraph::PointerSubgraph,
};
