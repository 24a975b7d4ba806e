/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Contraction of the graph onto the nodes whose side is still unknown.
//!
//! Given the set of nodes known to be on the source side and the set known to
//! be on the sink side, the remaining nodes form a smaller cut instance in
//! which the known nodes are collapsed into an artificial source (index 0)
//! and an artificial sink (index 1), with capacities materialized at a fixed
//! λ. The parametric recursion keeps at most two such instances alive at any
//! time, so they are built into two reusable buffer slots.

use anyhow::{bail, Result};
use sux::prelude::BitVec;

use crate::graph::ParametricGraph;

/// Index of the artificial source in a contracted instance.
pub(crate) const SOURCE: usize = 0;
/// Index of the artificial sink in a contracted instance.
pub(crate) const SINK: usize = 1;

/// An arc of a contracted instance, with its capacity already materialized
/// at the instance's λ.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ContractedArc {
    pub(crate) from: usize,
    pub(crate) to: usize,
    pub(crate) capacity: f64,
}

/// A contracted cut instance. Nodes 0 and 1 are the artificial source and
/// sink; nodes 2 and above map back to the original indexing through
/// `originals`.
#[derive(Debug, Default)]
pub(crate) struct Contracted {
    pub(crate) lambda: f64,
    /// Number of nodes, the two artificial endpoints included.
    pub(crate) num_nodes: usize,
    /// `originals[k]` is the original index of contracted node `k + 2`.
    pub(crate) originals: Vec<usize>,
    pub(crate) arcs: Vec<ContractedArc>,
    /// Original indices collapsed into the artificial source.
    pub(crate) source_set: Vec<usize>,
    /// Original indices collapsed into the artificial sink.
    pub(crate) sink_set: Vec<usize>,
    /// Total capacity of arcs collapsed onto source → sink. These cross
    /// every cut of this instance, so they contribute a constant term to
    /// every cut value.
    pub(crate) base_capacity: f64,
}

/// The two-slot arena holding contracted instances and the scratch buffers
/// shared by both slots.
#[derive(Debug)]
pub(crate) struct Arena {
    /// Maps each original node to its contracted index.
    node_map: Vec<usize>,
    /// For each contracted node, the index of the first arc seen from the
    /// artificial source to it, so parallel arcs can be merged.
    source_adjacent: Vec<Option<usize>>,
    /// For each contracted node, the index of the first arc seen from it to
    /// the artificial sink.
    sink_adjacent: Vec<Option<usize>>,
    slots: [Contracted; 2],
}

impl Arena {
    pub(crate) fn new(num_nodes: usize) -> Self {
        Self {
            node_map: vec![0; num_nodes],
            source_adjacent: Vec::with_capacity(num_nodes),
            sink_adjacent: Vec::with_capacity(num_nodes),
            slots: [Contracted::default(), Contracted::default()],
        }
    }

    pub(crate) fn slot(&self, slot: usize) -> &Contracted {
        &self.slots[slot]
    }

    /// Builds into `slot` the instance obtained by collapsing every node of
    /// `known_source` (plus the source itself) and every node *not* in
    /// `known_high` (plus the sink itself), with capacities materialized at
    /// `lambda`.
    ///
    /// Building a slot invalidates whatever instance it previously held.
    pub(crate) fn build(
        &mut self,
        slot: usize,
        graph: &ParametricGraph,
        lambda: f64,
        known_source: &BitVec,
        known_high: &BitVec,
    ) -> Result<()> {
        let contracted = &mut self.slots[slot];
        contracted.lambda = lambda;
        contracted.originals.clear();
        contracted.arcs.clear();
        contracted.source_set.clear();
        contracted.sink_set.clear();
        contracted.base_capacity = 0.0;

        let mut next_index = 2;
        for i in 0..graph.num_nodes() {
            if i == graph.source() || known_source[i] {
                self.node_map[i] = SOURCE;
                contracted.source_set.push(i);
            } else if i == graph.sink() || !known_high[i] {
                self.node_map[i] = SINK;
                contracted.sink_set.push(i);
            } else {
                self.node_map[i] = next_index;
                contracted.originals.push(i);
                next_index += 1;
            }
        }
        contracted.num_nodes = next_index;

        self.source_adjacent.clear();
        self.source_adjacent.resize(next_index, None);
        self.sink_adjacent.clear();
        self.sink_adjacent.resize(next_index, None);

        for arc in &graph.arcs {
            let from = self.node_map[arc.from];
            let to = self.node_map[arc.to];
            if from == to || to == SOURCE || from == SINK {
                // Internal to one side, or pointing backwards into an
                // artificial endpoint: irrelevant to every cut.
                continue;
            }
            if from == SOURCE && to == SINK {
                contracted.base_capacity += materialize(graph, arc.capacity_at(lambda), lambda)?;
                continue;
            }
            let capacity = materialize(graph, arc.capacity_at(lambda), lambda)?;
            if from == SOURCE {
                match self.source_adjacent[to] {
                    Some(first) => contracted.arcs[first].capacity += capacity,
                    None => {
                        self.source_adjacent[to] = Some(contracted.arcs.len());
                        contracted.arcs.push(ContractedArc { from, to, capacity });
                    }
                }
            } else if to == SINK {
                match self.sink_adjacent[from] {
                    Some(first) => contracted.arcs[first].capacity += capacity,
                    None => {
                        self.sink_adjacent[from] = Some(contracted.arcs.len());
                        contracted.arcs.push(ContractedArc { from, to, capacity });
                    }
                }
            } else {
                contracted.arcs.push(ContractedArc { from, to, capacity });
            }
        }

        Ok(())
    }
}

/// Applies the negative-capacity policy to a materialized capacity.
fn materialize(graph: &ParametricGraph, capacity: f64, lambda: f64) -> Result<f64> {
    if capacity < 0.0 {
        if graph.round_negative_capacity() {
            return Ok(0.0);
        }
        bail!(
            "Negative capacity for lambda equal to {}; \
             enable round_negative_capacity to clamp negative capacities to zero",
            lambda
        );
    }
    Ok(capacity)
}

#[cfg(test)]
mod test {
    use super::*;

    fn all_unknown(n: usize) -> (BitVec, BitVec) {
        let none = BitVec::new(n);
        let mut all = BitVec::new(n);
        for i in 0..n {
            all.set(i, true);
        }
        (none, all)
    }

    #[test]
    fn test_parallel_source_arcs_merge() -> Result<()> {
        let graph = ParametricGraph::from_arcs(
            3,
            0,
            2,
            [(0, 1, 1.0, 1.0), (0, 1, 2.0, 0.0), (1, 2, 7.0, 0.0)],
            [0.0, 10.0],
            false,
        );
        let (none, all) = all_unknown(3);
        let mut arena = Arena::new(3);
        arena.build(0, &graph, 4.0, &none, &all)?;

        let contracted = arena.slot(0);
        assert_eq!(contracted.num_nodes, 3);
        assert_eq!(contracted.originals, vec![1]);
        assert_eq!(contracted.arcs.len(), 2);
        // 1·4 + 1 merged with 0·4 + 2.
        assert_eq!(contracted.arcs[0].capacity, 7.0);
        assert_eq!(contracted.arcs[1].capacity, 7.0);
        Ok(())
    }

    #[test]
    fn test_collapsed_arcs_dropped_and_base_kept() -> Result<()> {
        let graph = ParametricGraph::from_arcs(
            4,
            0,
            3,
            [
                (0, 3, 5.0, 0.0), // crosses every cut
                (1, 2, 3.0, 0.0), // collapses inside the source side
                (2, 1, 4.0, 0.0),
                (0, 2, 9.0, 0.0),
            ],
            [1.0, 1.0],
            false,
        );
        let mut known_source = BitVec::new(4);
        known_source.set(1, true);
        known_source.set(2, true);
        let mut known_high = BitVec::new(4);
        for i in 0..3 {
            known_high.set(i, true);
        }
        let mut arena = Arena::new(4);
        arena.build(1, &graph, 1.0, &known_source, &known_high)?;

        let contracted = arena.slot(1);
        assert_eq!(contracted.num_nodes, 2);
        assert_eq!(contracted.source_set, vec![0, 1, 2]);
        assert_eq!(contracted.sink_set, vec![3]);
        assert!(contracted.arcs.is_empty());
        assert_eq!(contracted.base_capacity, 5.0);
        Ok(())
    }

    #[test]
    fn test_negative_capacity_reported() {
        let graph = ParametricGraph::from_arcs(
            3,
            0,
            2,
            [(1, 2, 1.0, -1.0)],
            [0.0, 5.0],
            false,
        );
        let (none, all) = all_unknown(3);
        let mut arena = Arena::new(3);
        let err = arena.build(0, &graph, 5.0, &none, &all).unwrap_err();
        assert!(err.to_string().contains("lambda equal to 5"));
    }

    #[test]
    fn test_negative_capacity_clamped() -> Result<()> {
        let graph = ParametricGraph::from_arcs(
            3,
            0,
            2,
            [(1, 2, 1.0, -1.0)],
            [0.0, 5.0],
            true,
        );
        let (none, all) = all_unknown(3);
        let mut arena = Arena::new(3);
        arena.build(0, &graph, 5.0, &none, &all)?;
        assert_eq!(arena.slot(0).arcs[0].capacity, 0.0);
        Ok(())
    }
}
