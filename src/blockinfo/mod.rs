//! Ownership of the block partition.
//!
//! A [`BlockInfo`] is computed once per partition: it records every block's
//! shape, which block indices this process owns, and the communication
//! group scoped to the processes sharing those blocks.  The group handle is
//! released when the `BlockInfo` is dropped, so no partition state outlives
//! the partition itself.

use crate::comm::Collective;
use crate::io::Verbosity;
use crate::mapping::{compute_block_grid_mapping, BlockCost, BlockMap, ConfigError};
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Debug)]
pub struct BlockInfo<C> {
    /// matrix dimension of every block, indexed by global block index
    pub dimensions: Vec<usize>,
    /// number of sample points of every block
    pub num_points: Vec<usize>,
    /// global indices of the blocks owned by this process's group
    pub block_indices: Vec<usize>,
    /// which node this process sits on
    pub node_index: usize,
    /// communication group over the processes sharing `block_indices`
    pub group: C,
}

impl<C: Collective> BlockInfo<C> {
    /// Build the partition from per-block cost estimates.
    ///
    /// `procs_per_node` must divide the world size evenly and
    /// `proc_granularity` must divide `procs_per_node`; violations are
    /// fatal configuration errors.
    pub fn with_costs(
        world: &C,
        dimensions: Vec<usize>,
        num_points: Vec<usize>,
        block_costs: &[BlockCost],
        procs_per_node: usize,
        proc_granularity: usize,
        verbosity: Verbosity,
    ) -> Result<Self, ConfigError> {
        assert_eq!(dimensions.len(), num_points.len());
        let mut info = Self {
            dimensions,
            num_points,
            block_indices: Vec::new(),
            node_index: 0,
            group: world.split(0, world.rank()),
        };
        info.allocate_blocks(
            world,
            block_costs,
            procs_per_node,
            proc_granularity,
            verbosity,
        )?;
        Ok(info)
    }

    /// Build the partition with the size-based cost heuristic, used before
    /// any timing data exists.
    pub fn new(
        world: &C,
        dimensions: Vec<usize>,
        num_points: Vec<usize>,
        procs_per_node: usize,
        proc_granularity: usize,
        verbosity: Verbosity,
    ) -> Result<Self, ConfigError> {
        let costs = heuristic_costs(&dimensions, &num_points);
        Self::with_costs(
            world,
            dimensions,
            num_points,
            &costs,
            procs_per_node,
            proc_granularity,
            verbosity,
        )
    }

    /// Single-process partition owning every block, for tests and serial
    /// solves.
    pub fn serial(world: &C, dimensions: Vec<usize>, num_points: Vec<usize>) -> Self {
        assert_eq!(dimensions.len(), num_points.len());
        let block_indices = (0..dimensions.len()).collect();
        Self {
            block_indices,
            node_index: 0,
            group: world.split(0, world.rank()),
            dimensions,
            num_points,
        }
    }

    fn allocate_blocks(
        &mut self,
        world: &C,
        block_costs: &[BlockCost],
        procs_per_node: usize,
        proc_granularity: usize,
        verbosity: Verbosity,
    ) -> Result<(), ConfigError> {
        let num_procs = world.size();
        if procs_per_node == 0 || num_procs % procs_per_node != 0 {
            return Err(ConfigError::IncompatibleProcessCount {
                num_procs,
                procs_per_node,
            });
        }
        let num_nodes = num_procs / procs_per_node;
        if proc_granularity == 0 || procs_per_node % proc_granularity != 0 {
            return Err(ConfigError::IncompatibleGranularity {
                procs_per_node,
                proc_granularity,
            });
        }

        // Reverse sort, with largest first
        let mut sorted_costs = block_costs.to_vec();
        sorted_costs.sort();
        sorted_costs.reverse();

        let mut mapping = compute_block_grid_mapping(
            procs_per_node / proc_granularity,
            num_nodes,
            &sorted_costs,
        )?;
        for block_vector in &mut mapping {
            for block_map in block_vector {
                block_map.num_procs *= proc_granularity;
            }
        }

        if verbosity >= Verbosity::Debug && world.rank() == 0 {
            print_mapping(&mapping, &self.dimensions, &self.num_points);
        }

        let node_index = world.rank() / procs_per_node;
        let node_rank = world.rank() % procs_per_node;

        // Locate the bucket of node ranks [rank_begin, rank_end) that
        // contains this process.
        let mut rank_begin = 0;
        let mut rank_end = 0;
        let mut found: Option<&BlockMap> = None;
        for block_map in &mapping[node_index] {
            rank_begin = rank_end;
            rank_end += block_map.num_procs;
            if rank_end > node_rank {
                found = Some(block_map);
                break;
            }
        }
        // Sanity check: compute_block_grid_mapping covers every process,
        // so a miss here means the mapping itself is broken.
        let block_map = found.ok_or(ConfigError::UncoveredProcess {
            node_index,
            node_rank,
            rank_end,
        })?;

        self.block_indices = block_map.block_indices.clone();
        // checkpoint files list owned blocks in ascending index order
        self.block_indices.sort_unstable();
        self.node_index = node_index;
        self.group = world.split(
            node_index * procs_per_node + rank_begin,
            node_rank - rank_begin,
        );
        Ok(())
    }

    pub fn num_blocks(&self) -> usize {
        self.dimensions.len()
    }

    pub fn schur_block_size(&self, index: usize) -> usize {
        self.num_points[index] * self.dimensions[index] * (self.dimensions[index] + 1) / 2
    }

    pub fn schur_block_sizes(&self) -> Vec<usize> {
        (0..self.num_blocks())
            .map(|i| self.schur_block_size(i))
            .collect()
    }

    pub fn bilinear_pairing_block_size(&self, index: usize) -> usize {
        self.num_points[index] * self.dimensions[index]
    }

    pub fn psd_matrix_block_size(&self, index: usize, parity: usize) -> usize {
        // Need to round down (num_points+1)/2 before multiplying by
        // dim, since dim could be 2.
        let even = self.dimensions[index] * ((self.num_points[index] + 1) / 2);
        match parity {
            0 => even,
            1 => self.dimensions[index] * self.num_points[index] - even,
            _ => panic!("parity should be 0 or 1"),
        }
    }

    /// Sizes of the psd blocks of the locally owned part of `X`/`Y`, two
    /// per owned block.
    pub fn psd_matrix_local_sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(2 * self.block_indices.len());
        for &b in &self.block_indices {
            sizes.push(self.psd_matrix_block_size(b, 0));
            sizes.push(self.psd_matrix_block_size(b, 1));
        }
        sizes
    }

    /// Sizes of the locally owned Schur complement blocks.
    pub fn schur_local_sizes(&self) -> Vec<usize> {
        self.block_indices
            .iter()
            .map(|&b| self.schur_block_size(b))
            .collect()
    }

    /// Total dimension of `X` over all blocks, identical on every process.
    pub fn psd_total_dim(&self) -> usize {
        (0..self.num_blocks())
            .map(|i| self.psd_matrix_block_size(i, 0) + self.psd_matrix_block_size(i, 1))
            .sum()
    }

    /// True on exactly one process per owned block set; used so that
    /// globally reduced quantities count each block once even though block
    /// data is replicated within its owning group.
    pub fn is_group_root(&self) -> bool {
        self.group.rank() == 0
    }
}

fn heuristic_costs(dimensions: &[usize], num_points: &[usize]) -> Vec<BlockCost> {
    dimensions
        .iter()
        .zip(num_points.iter())
        .enumerate()
        .map(|(i, (&dim, &pts))| {
            let schur = (pts * dim * (dim + 1) / 2) as u64;
            BlockCost::new(schur * schur + 1, i)
        })
        .collect()
}

fn print_mapping(mapping: &[Vec<BlockMap>], dimensions: &[usize], num_points: &[usize]) {
    let mut out = String::new();
    out.push_str("Block Grid Mapping\n");
    out.push_str("Node\tNum Procs\tCost (Per Proc)\t\tBlock List\n");
    out.push_str("==========================================================\n");
    for (node, maps) in mapping.iter().enumerate() {
        for m in maps {
            out.push_str(&format!("{}\t{}\t\t{:.6}\t\t\t{{", node, m.num_procs, m.cost_per_proc()));
            for (ii, &b) in m.block_indices.iter().enumerate() {
                if ii != 0 {
                    out.push_str(", ");
                }
                out.push_str(&format!("{}({},{})", b, dimensions[b], num_points[b]));
            }
            out.push_str("}\n");
        }
        out.push('\n');
    }
    print!("{}", out);
}

/// Read per-block costs from a timing file: one integer per line, in
/// global block order.
pub fn read_block_timings(path: &Path, expected_blocks: usize) -> Result<Vec<BlockCost>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::BadTimingFile {
        path: path.display().to_string(),
        problem: e.to_string(),
    })?;
    let mut costs = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let cost: u64 = line.parse().map_err(|_| ConfigError::BadTimingFile {
            path: path.display().to_string(),
            problem: format!("unparseable cost on line {}", lineno + 1),
        })?;
        costs.push(BlockCost::new(cost, costs.len()));
    }
    if costs.len() != expected_blocks {
        return Err(ConfigError::TimingCountMismatch {
            path: path.display().to_string(),
            expected: expected_blocks,
            found: costs.len(),
        });
    }
    Ok(costs)
}

/// Write per-block costs measured by a timing run.
pub fn write_block_timings(path: &Path, costs: &[BlockCost]) -> std::io::Result<()> {
    let mut ordered = costs.to_vec();
    ordered.sort_by_key(|c| c.index);
    let mut file = fs::File::create(path)?;
    for c in &ordered {
        writeln!(file, "{}", c.cost)?;
    }
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SerialComm;

    #[test]
    fn test_block_sizes() {
        let world = SerialComm::world();
        let info = BlockInfo::serial(&world, vec![2, 1], vec![3, 5]);
        assert_eq!(info.schur_block_size(0), 3 * 2 * 3 / 2);
        assert_eq!(info.schur_block_size(1), 5);
        assert_eq!(info.psd_matrix_block_size(0, 0), 2 * 2);
        assert_eq!(info.psd_matrix_block_size(0, 1), 2 * 3 - 4);
        assert_eq!(info.bilinear_pairing_block_size(0), 6);
        assert_eq!(info.psd_total_dim(), 4 + 2 + 3 + 2);
    }

    #[test]
    fn test_serial_allocation_owns_everything() {
        let world = SerialComm::world();
        let info =
            BlockInfo::new(&world, vec![1, 1, 2], vec![1, 4, 2], 1, 1, Verbosity::None).unwrap();
        let mut owned = info.block_indices.clone();
        owned.sort();
        assert_eq!(owned, vec![0, 1, 2]);
    }

    #[test]
    fn test_incompatible_granularity() {
        let world = SerialComm::world();
        let err = BlockInfo::new(&world, vec![1], vec![1], 1, 3, Verbosity::None).unwrap_err();
        assert!(matches!(err, ConfigError::IncompatibleGranularity { .. }));
    }

    #[test]
    fn test_timing_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block_timings");
        let costs = vec![BlockCost::new(250, 0), BlockCost::new(17, 1)];
        write_block_timings(&path, &costs).unwrap();
        let back = read_block_timings(&path, 2).unwrap();
        assert_eq!(back, costs);

        assert!(matches!(
            read_block_timings(&path, 3),
            Err(ConfigError::TimingCountMismatch { .. })
        ));
    }
}
