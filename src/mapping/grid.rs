use super::{BlockCost, BlockMap, ConfigError};

/// Partition ranked blocks across `num_nodes` nodes of `procs_per_node`
/// processes each, grouping each node's processes into buckets whose
/// per-process cost is approximately equal.
///
/// `block_costs` must be sorted by descending cost (the callers sort with
/// largest first).  The result has one entry per node; the `num_procs` of
/// each node's maps sum to exactly `procs_per_node`, every map holds at
/// least one block, and every block index appears in exactly one map.
///
/// A node that receives no blocks cannot cover its processes; that is a
/// configuration error (more nodes than blocks), reported rather than
/// silently leaving processes idle.
pub fn compute_block_grid_mapping(
    procs_per_node: usize,
    num_nodes: usize,
    block_costs: &[BlockCost],
) -> Result<Vec<Vec<BlockMap>>, ConfigError> {
    if procs_per_node == 0 || num_nodes == 0 {
        return Err(ConfigError::EmptyGrid {
            procs_per_node,
            num_nodes,
        });
    }
    if block_costs.is_empty() {
        return Err(ConfigError::NoBlocks);
    }
    if block_costs.len() < num_nodes {
        return Err(ConfigError::MoreNodesThanBlocks {
            num_nodes,
            num_blocks: block_costs.len(),
        });
    }

    // Spread blocks over nodes: largest first onto the least-loaded node.
    let mut node_blocks: Vec<Vec<BlockCost>> = vec![Vec::new(); num_nodes];
    let mut node_cost = vec![0u64; num_nodes];
    for &bc in block_costs {
        let target = least_loaded(&node_cost, &node_blocks);
        node_blocks[target].push(bc);
        node_cost[target] += bc.cost;
    }

    let mut mapping = Vec::with_capacity(num_nodes);
    for blocks in node_blocks {
        mapping.push(map_node(procs_per_node, &blocks));
    }
    Ok(mapping)
}

// Least total cost among nodes; an empty node always wins so every node
// receives at least one block.
fn least_loaded(node_cost: &[u64], node_blocks: &[Vec<BlockCost>]) -> usize {
    let mut target = 0;
    for i in 1..node_cost.len() {
        if node_blocks[i].is_empty() && !node_blocks[target].is_empty() {
            target = i;
        } else if !node_blocks[target].is_empty() && node_cost[i] < node_cost[target] {
            target = i;
        }
    }
    target
}

// Group one node's blocks into at most `procs` buckets and distribute the
// node's processes over the buckets to approximately equalize per-process
// cost.
fn map_node(procs: usize, blocks: &[BlockCost]) -> Vec<BlockMap> {
    let num_buckets = procs.min(blocks.len());
    let mut maps: Vec<BlockMap> = (0..num_buckets).map(|_| BlockMap::new(1)).collect();

    // blocks arrive largest-first; each goes to the bucket with the least
    // total cost
    for &bc in blocks {
        let target = maps
            .iter()
            .enumerate()
            .min_by_key(|(i, m)| (m.cost, *i))
            .map(|(i, _)| i)
            .unwrap();
        maps[target].block_indices.push(bc.index);
        maps[target].cost += bc.cost;
    }

    // hand out the remaining processes one at a time to the bucket whose
    // per-process cost is currently largest
    for _ in num_buckets..procs {
        let target = maps
            .iter()
            .enumerate()
            .max_by(|(i, a), (j, b)| {
                a.cost_per_proc()
                    .partial_cmp(&b.cost_per_proc())
                    .unwrap()
                    .then(j.cmp(i))
            })
            .map(|(i, _)| i)
            .unwrap();
        maps[target].num_procs += 1;
    }

    maps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn costs(v: &[u64]) -> Vec<BlockCost> {
        let mut c: Vec<BlockCost> = v
            .iter()
            .enumerate()
            .map(|(i, &cost)| BlockCost::new(cost, i))
            .collect();
        c.sort();
        c.reverse();
        c
    }

    fn check_coverage(
        mapping: &[Vec<BlockMap>],
        procs_per_node: usize,
        num_blocks: usize,
    ) {
        let mut seen = vec![0usize; num_blocks];
        for node in mapping {
            let procs: usize = node.iter().map(|m| m.num_procs).sum();
            assert_eq!(procs, procs_per_node);
            for m in node {
                assert!(m.num_procs >= 1);
                assert!(!m.block_indices.is_empty());
                for &b in &m.block_indices {
                    seen[b] += 1;
                }
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
    }

    #[test]
    fn test_more_blocks_than_procs() {
        let c = costs(&[100, 90, 80, 10, 10, 10, 5, 5]);
        let mapping = compute_block_grid_mapping(2, 2, &c).unwrap();
        assert_eq!(mapping.len(), 2);
        check_coverage(&mapping, 2, 8);
    }

    #[test]
    fn test_fewer_blocks_than_procs() {
        let c = costs(&[1000, 10]);
        let mapping = compute_block_grid_mapping(4, 1, &c).unwrap();
        check_coverage(&mapping, 4, 2);
        // the expensive block should hold most of the processes
        let big = mapping[0]
            .iter()
            .find(|m| m.block_indices.contains(&0))
            .unwrap();
        assert!(big.num_procs >= 2);
    }

    #[test]
    fn test_single_block_single_proc() {
        let c = costs(&[7]);
        let mapping = compute_block_grid_mapping(1, 1, &c).unwrap();
        check_coverage(&mapping, 1, 1);
    }

    #[test]
    fn test_more_nodes_than_blocks_is_config_error() {
        let c = costs(&[5]);
        assert!(matches!(
            compute_block_grid_mapping(2, 2, &c),
            Err(ConfigError::MoreNodesThanBlocks { .. })
        ));
    }

    #[test]
    fn test_coverage_sweep() {
        // property: all valid small inputs cover every process and block
        // exactly once
        for num_nodes in 1..4 {
            for procs_per_node in 1..5 {
                for num_blocks in num_nodes..10 {
                    let v: Vec<u64> = (0..num_blocks).map(|i| ((i * 37) % 91 + 1) as u64).collect();
                    let c = costs(&v);
                    let mapping =
                        compute_block_grid_mapping(procs_per_node, num_nodes, &c).unwrap();
                    check_coverage(&mapping, procs_per_node, num_blocks);
                }
            }
        }
    }
}
