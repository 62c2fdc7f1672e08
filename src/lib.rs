//! # GraphForge - De Bruijn Graph Simplification Core
//!
//! The graph-cleanup stage of a short-read genome assembler. Takes a
//! freshly constructed de Bruijn graph (conjugate vertices and edges,
//! coverage-annotated sequences) and iteratively removes sequencing-error
//! artifacts: tips, bulges, and erroneous connections, compressing
//! unbranched chains as it goes, until the long edges approximate genuine
//! genomic segments.

pub mod graph;
pub mod simplify;
pub mod utils;

// Re-export commonly used types at crate level
pub use crate::graph::conditions::Condition;
pub use crate::graph::iterators::{SmartEdgeIterator, SmartVertexIterator};
pub use crate::graph::sequence::Sequence;
pub use crate::graph::store::{EdgeId, Graph, GraphListener, VertexId};
pub use crate::simplify::driver::{simplify_graph, Checkpoint, SimplifyCallbacks};
pub use crate::simplify::remover::{EdgeRemover, RemovalHandler};
pub use crate::utils::configuration::{DatasetInfo, SimplificationConfig, SimplificationMode};

/// Result type used throughout the crate
pub type Result<T> = anyhow::Result<T>;

/// Error type used throughout the crate
pub type Error = anyhow::Error;
