//! Cost-balancing assignment of blocks to processes.
//!
//! Blocks are ranked by estimated cost and packed into (node,
//! process-group) buckets so that per-process cost is approximately equal.
//! The output drives both the block ownership map and the communication
//! group layout in [`BlockInfo`](crate::blockinfo::BlockInfo).

mod block_cost;
mod grid;

pub use block_cost::{BlockCost, BlockMap};
pub use grid::compute_block_grid_mapping;

use thiserror::Error;

/// Fatal configuration errors detected before any solve work begins.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Empty process grid: procs_per_node={procs_per_node}, num_nodes={num_nodes}")]
    EmptyGrid {
        procs_per_node: usize,
        num_nodes: usize,
    },
    #[error("No blocks to allocate")]
    NoBlocks,
    #[error(
        "More nodes ({num_nodes}) than blocks ({num_blocks}); \
         every node must own at least one block"
    )]
    MoreNodesThanBlocks { num_nodes: usize, num_blocks: usize },
    #[error(
        "Incompatible process counts: {num_procs} processes cannot be split into \
         nodes of {procs_per_node}.  Each node must have the same number of processes."
    )]
    IncompatibleProcessCount {
        num_procs: usize,
        procs_per_node: usize,
    },
    #[error(
        "Incompatible process granularity: proc_granularity ({proc_granularity}) \
         must evenly divide procsPerNode ({procs_per_node})"
    )]
    IncompatibleGranularity {
        procs_per_node: usize,
        proc_granularity: usize,
    },
    #[error(
        "Block assignment left process uncovered: node={node_index}, \
         node_rank={node_rank}, covered ranks end at {rank_end}"
    )]
    UncoveredProcess {
        node_index: usize,
        node_rank: usize,
        rank_end: usize,
    },
    #[error("Block timing file {path}: {problem}")]
    BadTimingFile { path: String, problem: String },
    #[error(
        "Block timing file {path} lists {found} costs but the problem has {expected} blocks"
    )]
    TimingCountMismatch {
        path: String,
        expected: usize,
        found: usize,
    },
}
