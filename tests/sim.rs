use heroine_graph::sim::quadtree::{hilbert_d, TreeLevels};
use heroine_graph::SimulationParams;

// ── Tree shape ────────────────────────────────────────────────────────────────

#[test]
fn single_node_tree_is_just_the_root() {
    let levels = TreeLevels::for_node_count(1);
    assert_eq!(levels.counts, vec![1]);
    assert_eq!(levels.offsets, vec![0]);
    assert_eq!(levels.total, 1);
    assert_eq!(levels.root_index(), 0);
    assert_eq!(levels.merge_steps().count(), 0);
}

#[test]
fn five_nodes_need_two_merge_levels() {
    let levels = TreeLevels::for_node_count(5);
    assert_eq!(levels.counts, vec![5, 2, 1]);
    assert_eq!(levels.offsets, vec![0, 5, 7]);
    assert_eq!(levels.total, 8);
    assert_eq!(levels.root_index(), 7);

    let steps: Vec<_> = levels.merge_steps().collect();
    assert_eq!(steps.len(), 2);
    assert_eq!((steps[0].src_offset, steps[0].src_count), (0, 5));
    assert_eq!((steps[0].dst_offset, steps[0].dst_count), (5, 2));
    assert_eq!((steps[1].src_offset, steps[1].src_count), (5, 2));
    assert_eq!((steps[1].dst_offset, steps[1].dst_count), (7, 1));
}

#[test]
fn level_count_is_ceil_log4() {
    for (n, expected_merges) in [(1u32, 0usize), (4, 1), (5, 2), (16, 2), (17, 3), (1024, 5)] {
        let levels = TreeLevels::for_node_count(n);
        assert_eq!(
            levels.merge_steps().count(),
            expected_merges,
            "wrong merge count for n = {n}"
        );
    }
}

#[test]
fn total_cells_stay_near_four_thirds_n() {
    for n in [2u32, 100, 4096, 1_000_000] {
        let levels = TreeLevels::for_node_count(n);
        let bound = n as u64 * 4 / 3 + levels.counts.len() as u64 + 1;
        assert!(levels.total as u64 <= bound, "n = {n}: total = {}", levels.total);
    }
}

#[test]
fn last_level_always_has_one_cell() {
    for n in [1u32, 2, 3, 7, 63, 64, 65, 100_000] {
        let levels = TreeLevels::for_node_count(n);
        assert_eq!(*levels.counts.last().unwrap(), 1);
    }
}

// ── Hilbert reference ─────────────────────────────────────────────────────────

#[test]
fn hilbert_origin_is_zero() {
    assert_eq!(hilbert_d(0, 0), 0);
}

#[test]
fn hilbert_top_level_quadrants_follow_the_curve() {
    // The first-order curve visits (lo,lo) → (lo,hi) → (hi,hi) → (hi,lo);
    // the top two bits of d are the quadrant digit in that order.
    let digit = |x: u16, y: u16| hilbert_d(x, y) >> 30;
    assert_eq!(digit(0, 0), 0);
    assert_eq!(digit(0, u16::MAX), 1);
    assert_eq!(digit(u16::MAX, u16::MAX), 2);
    assert_eq!(digit(u16::MAX, 0), 3);
}

#[test]
fn hilbert_codes_are_distinct_on_a_grid_sample() {
    let mut seen = std::collections::HashSet::new();
    for gx in 0..32u32 {
        for gy in 0..32u32 {
            let x = (gx * 2048) as u16;
            let y = (gy * 2048) as u16;
            assert!(seen.insert(hilbert_d(x, y)), "duplicate code at ({x}, {y})");
        }
    }
}

#[test]
fn hilbert_preserves_quadrant_prefixes_recursively() {
    // Points in the same quarter (and sixteenth) of the grid share the top
    // 2 (and 4) code bits — the property the tree merge relies on.
    let half = 1u16 << 15;
    let quarter = 1u16 << 14;
    let inside: [(u16, u16); 3] = [(3, 5), (quarter - 1, 9), (11, quarter - 1)];
    let prefixes: Vec<u32> = inside
        .iter()
        .map(|&(x, y)| hilbert_d(x, y) >> 28)
        .collect();
    assert!(prefixes.windows(2).all(|w| w[0] == w[1]), "prefixes = {prefixes:?}");

    let far = hilbert_d(half + 5, half + 5) >> 30;
    assert_ne!(prefixes[0] >> 2, far);
}

// ── Simulation parameters ─────────────────────────────────────────────────────

#[test]
fn default_parameters_are_the_reference_values() {
    let p = SimulationParams::default();
    assert_eq!(p.theta, 2.0);
    assert_eq!(p.gamma, 2.0);
    assert_eq!(p.spring_k, 0.1);
    assert_eq!(p.t_attraction, 8.0);
    assert_eq!(p.tolerance, 1.0);
    assert_eq!(p.damping, 0.9);
    assert_eq!(p.bounds_margin, 0.01);
    assert_eq!(p.ticks_per_frame, 1);
}
