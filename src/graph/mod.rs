//! Conjugate de Bruijn graph: store, sequences, traversal, predicates.

pub mod conditions;
pub mod iterators;
pub mod sequence;
pub mod stats;
pub mod store;
