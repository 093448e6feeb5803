use blocksdp::mapping::{compute_block_grid_mapping, BlockCost, BlockMap, ConfigError};

fn ranked_costs(costs: &[u64]) -> Vec<BlockCost> {
    let mut list: Vec<BlockCost> = costs
        .iter()
        .enumerate()
        .map(|(index, &cost)| BlockCost::new(cost, index))
        .collect();
    list.sort();
    list.reverse();
    list
}

fn assert_exact_coverage(mapping: &[Vec<BlockMap>], procs_per_node: usize, num_blocks: usize) {
    let mut block_owners = vec![0usize; num_blocks];
    for node in mapping {
        let node_procs: usize = node.iter().map(|m| m.num_procs).sum();
        assert_eq!(node_procs, procs_per_node);
        for map in node {
            assert!(map.num_procs >= 1);
            assert!(!map.block_indices.is_empty());
            for &b in &map.block_indices {
                block_owners[b] += 1;
            }
        }
    }
    assert!(
        block_owners.iter().all(|&owners| owners == 1),
        "every block index must be owned exactly once: {block_owners:?}"
    );
}

#[test]
fn coverage_over_many_grid_shapes() {
    for num_nodes in 1..5usize {
        for procs_per_node in 1..7usize {
            for num_blocks in num_nodes..20usize {
                let costs: Vec<u64> = (0..num_blocks)
                    .map(|i| ((i as u64) * 7919 + 13) % 1000 + 1)
                    .collect();
                let mapping =
                    compute_block_grid_mapping(procs_per_node, num_nodes, &ranked_costs(&costs))
                        .unwrap();
                assert_eq!(mapping.len(), num_nodes);
                assert_exact_coverage(&mapping, procs_per_node, num_blocks);
            }
        }
    }
}

#[test]
fn block_set_is_invariant_across_grid_shapes() {
    // the same problem split over different grids always covers the same
    // block set, exactly once each
    let costs = ranked_costs(&[900, 450, 450, 120, 80, 80, 40, 10, 10, 5]);
    for (procs_per_node, num_nodes) in [(1, 1), (2, 1), (4, 1), (2, 2), (3, 2), (5, 2)] {
        let mapping = compute_block_grid_mapping(procs_per_node, num_nodes, &costs).unwrap();
        assert_exact_coverage(&mapping, procs_per_node, 10);
    }
}

#[test]
fn heavy_block_attracts_processes() {
    // one block dominates: it should end up with most of a node's
    // processes to itself
    let costs = ranked_costs(&[100_000, 10, 10, 10]);
    let mapping = compute_block_grid_mapping(8, 1, &costs).unwrap();
    let heavy = mapping[0]
        .iter()
        .find(|m| m.block_indices.contains(&0))
        .unwrap();
    assert!(heavy.num_procs >= 4, "heavy block got {}", heavy.num_procs);
}

#[test]
fn bad_grids_are_rejected_before_any_work() {
    let costs = ranked_costs(&[1, 2]);
    assert!(matches!(
        compute_block_grid_mapping(0, 1, &costs),
        Err(ConfigError::EmptyGrid { .. })
    ));
    assert!(matches!(
        compute_block_grid_mapping(1, 3, &costs),
        Err(ConfigError::MoreNodesThanBlocks { .. })
    ));
    assert!(matches!(
        compute_block_grid_mapping(1, 1, &[]),
        Err(ConfigError::NoBlocks)
    ));
}
