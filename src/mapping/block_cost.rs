/// Estimated computational cost of one block, from a timing run or an
/// external heuristic.  Ordered by cost, ties broken by index so that
/// sorting is deterministic across processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlockCost {
    pub cost: u64,
    pub index: usize,
}

impl BlockCost {
    pub fn new(cost: u64, index: usize) -> Self {
        Self { cost, index }
    }
}

/// Assignment of a set of blocks to a process count within one node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockMap {
    pub num_procs: usize,
    pub cost: u64,
    pub block_indices: Vec<usize>,
}

impl BlockMap {
    pub fn new(num_procs: usize) -> Self {
        Self {
            num_procs,
            cost: 0,
            block_indices: Vec::new(),
        }
    }

    /// Cost carried by each process of this map.
    pub fn cost_per_proc(&self) -> f64 {
        self.cost as f64 / self.num_procs as f64
    }
}
