/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use dsi_progress_logger::prelude::*;
use pseudoflow::{parametric_cut, ParametricGraph};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Computes the minimum-cut source side at a single λ through the public
/// interface: with constant capacities over `[λ, λ + 1]` the partition never
/// changes, so a node is on the source side exactly if its entry value is the
/// lower bound.
fn min_cut_source_side(
    num_nodes: usize,
    source: usize,
    sink: usize,
    arcs: &[(usize, usize, f64)],
    lambda: f64,
) -> Result<Vec<bool>> {
    let graph = ParametricGraph::from_arcs(
        num_nodes,
        source,
        sink,
        arcs.iter().map(|&(from, to, capacity)| (from, to, capacity, 0.0)),
        [lambda, lambda + 1.0],
        false,
    );
    let cut = parametric_cut(&graph, no_logging![])?;
    assert_eq!(cut.breakpoints(), &[lambda + 1.0]);
    Ok((0..num_nodes)
        .map(|node| cut.node_breakpoints()[node] == lambda)
        .collect())
}

fn cut_capacity(arcs: &[(usize, usize, f64)], in_source: &[bool]) -> f64 {
    arcs.iter()
        .map(|&(from, to, capacity)| {
            if in_source[from] && !in_source[to] {
                capacity
            } else {
                0.0
            }
        })
        .sum()
}

/// The inclusion-minimal minimum-cut source side, by exhaustive enumeration:
/// the minimizers of a cut function are closed under intersection, so the
/// intersection of all of them is the minimal one.
fn brute_force_minimal_side(
    num_nodes: usize,
    source: usize,
    sink: usize,
    arcs: &[(usize, usize, f64)],
) -> (Vec<bool>, f64) {
    let interior: Vec<usize> = (0..num_nodes)
        .filter(|&node| node != source && node != sink)
        .collect();
    let mut best = f64::INFINITY;
    let mut minimal = vec![true; num_nodes];
    for mask in 0..1usize << interior.len() {
        let mut in_source = vec![false; num_nodes];
        in_source[source] = true;
        for (bit, &node) in interior.iter().enumerate() {
            in_source[node] = mask & (1 << bit) != 0;
        }
        let value = cut_capacity(arcs, &in_source);
        if value < best - 1E-9 {
            best = value;
            minimal = in_source;
        } else if value < best + 1E-9 {
            for node in 0..num_nodes {
                minimal[node] &= in_source[node];
            }
        }
    }
    minimal[source] = true;
    (minimal, best)
}

#[test]
fn test_path() -> Result<()> {
    // The bottleneck arc determines the side of the interior nodes.
    let arcs = [(0, 1, 5.0), (1, 2, 1.0), (2, 3, 3.0)];
    assert_eq!(
        min_cut_source_side(4, 0, 3, &arcs, 0.0)?,
        vec![true, true, false, false]
    );
    Ok(())
}

#[test]
fn test_diamond() -> Result<()> {
    let arcs = [(0, 1, 3.0), (1, 3, 1.0), (0, 2, 1.0), (2, 3, 3.0)];
    assert_eq!(
        min_cut_source_side(4, 0, 3, &arcs, 2.0)?,
        vec![true, true, false, false]
    );
    Ok(())
}

#[test]
fn test_isolated_interior_node_stays_with_sink() -> Result<()> {
    let arcs = [(0, 1, 2.0), (1, 3, 1.0)];
    assert_eq!(
        min_cut_source_side(4, 0, 3, &arcs, 0.0)?,
        vec![true, true, false, false]
    );
    Ok(())
}

#[test]
fn test_two_layer_network() -> Result<()> {
    let arcs = [
        (0, 1, 4.0),
        (0, 2, 3.0),
        (1, 3, 2.0),
        (2, 3, 1.0),
        (2, 4, 2.0),
        (3, 5, 5.0),
        (4, 5, 1.0),
    ];
    let side = min_cut_source_side(6, 0, 5, &arcs, 1.0)?;
    let (expected, best) = brute_force_minimal_side(6, 0, 5, &arcs);
    assert_eq!(side, expected);
    assert!((cut_capacity(&arcs, &side) - best).abs() < 1E-9);
    Ok(())
}

#[test]
fn test_source_and_sink_in_arbitrary_position() -> Result<()> {
    // The terminals need not be the extreme indices.
    let arcs = [(3, 0, 2.0), (0, 1, 1.0), (1, 3, 4.0), (3, 1, 1.0)];
    let side = min_cut_source_side(4, 3, 1, &arcs, 0.0)?;
    let (expected, best) = brute_force_minimal_side(4, 3, 1, &arcs);
    assert_eq!(side, expected);
    assert!((cut_capacity(&arcs, &side) - best).abs() < 1E-9);
    Ok(())
}

fn random_constant_graph(seed: u64) -> (usize, Vec<(usize, usize, f64)>) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let num_nodes = rng.random_range(4..9);
    let source = 0;
    let sink = num_nodes - 1;
    let mut arcs = Vec::new();
    for node in 1..num_nodes - 1 {
        if rng.random_bool(0.7) {
            arcs.push((source, node, rng.random_range(0.5..5.0)));
        }
        if rng.random_bool(0.7) {
            arcs.push((node, sink, rng.random_range(0.5..5.0)));
        }
    }
    for from in 1..num_nodes - 1 {
        for to in 1..num_nodes - 1 {
            if from != to && rng.random_bool(0.3) {
                arcs.push((from, to, rng.random_range(0.5..4.0)));
            }
        }
    }
    (num_nodes, arcs)
}

#[test]
fn test_random_graphs_against_brute_force() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    for seed in 0..50 {
        let (num_nodes, arcs) = random_constant_graph(seed);
        let sink = num_nodes - 1;
        let side = min_cut_source_side(num_nodes, 0, sink, &arcs, 1.0)?;
        let (expected, best) = brute_force_minimal_side(num_nodes, 0, sink, &arcs);
        assert_eq!(side, expected, "wrong partition for seed {}", seed);
        assert!(
            (cut_capacity(&arcs, &side) - best).abs() < 1E-9,
            "wrong cut value for seed {}",
            seed
        );
    }
    Ok(())
}

#[cfg(feature = "slow_tests")]
#[test]
fn test_many_random_graphs_against_brute_force() -> Result<()> {
    for seed in 50..1050 {
        let (num_nodes, arcs) = random_constant_graph(seed);
        let sink = num_nodes - 1;
        let side = min_cut_source_side(num_nodes, 0, sink, &arcs, 1.0)?;
        let (expected, best) = brute_force_minimal_side(num_nodes, 0, sink, &arcs);
        assert_eq!(side, expected, "wrong partition for seed {}", seed);
        assert!(
            (cut_capacity(&arcs, &side) - best).abs() < 1E-9,
            "wrong cut value for seed {}",
            seed
        );
    }
    Ok(())
}
