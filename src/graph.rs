/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The immutable capacitated graph on which parametric cuts are computed.

use std::time::{Duration, Instant};

/// Default numerical tolerance used for sign tests and for probing
/// just below and above a computed breakpoint.
pub const DEFAULT_TOLERANCE: f64 = 1E-7;

/// Arcs are kept sorted by their endpoint indices right-shifted by this
/// amount, which blocks them by memory region rather than totally ordering
/// them; the exact order is irrelevant to the algorithm.
const ARC_SORT_SHIFT: u32 = 10;

/// A directed arc whose capacity at parameter value λ is
/// `constant + multiplier * λ`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ParametricArc {
    pub(crate) from: usize,
    pub(crate) to: usize,
    pub(crate) constant: f64,
    pub(crate) multiplier: f64,
}

impl ParametricArc {
    /// Returns the capacity of this arc at the given parameter value.
    pub(crate) fn capacity_at(&self, lambda: f64) -> f64 {
        self.multiplier * lambda + self.constant
    }
}

/// A directed graph with a distinguished source and sink whose arc
/// capacities vary affinely with a parameter λ over a fixed range.
///
/// Source-adjacent arcs must be non-decreasing in λ, sink-adjacent arcs
/// non-increasing, and all remaining arcs constant. Instances are built
/// once with [`from_arcs`](ParametricGraph::from_arcs) or
/// [`from_flat`](ParametricGraph::from_flat) and are immutable afterwards.
#[derive(Debug, Clone)]
pub struct ParametricGraph {
    num_nodes: usize,
    source: usize,
    sink: usize,
    lambda_low: f64,
    lambda_high: f64,
    round_negative_capacity: bool,
    tolerance: f64,
    pub(crate) arcs: Vec<ParametricArc>,
    read_time: Duration,
}

impl ParametricGraph {
    /// Creates a graph from an iterator of `(from, to, constant, multiplier)`
    /// tuples.
    ///
    /// If `round_negative_capacity` is true, capacities that become negative
    /// at some probed λ are clamped to zero; otherwise solving reports an
    /// error when that happens.
    ///
    /// # Panics
    ///
    /// This method will panic:
    /// - if `source == sink`, or either is not smaller than `num_nodes`;
    /// - if `lambda_range[0] > lambda_range[1]`;
    /// - if an arc endpoint is not smaller than `num_nodes`;
    /// - if an arc multiplier violates the sign contract (non-negative on
    ///   source-adjacent arcs, non-positive on sink-adjacent arcs, zero on
    ///   all other arcs).
    pub fn from_arcs(
        num_nodes: usize,
        source: usize,
        sink: usize,
        arcs: impl IntoIterator<Item = (usize, usize, f64, f64)>,
        lambda_range: [f64; 2],
        round_negative_capacity: bool,
    ) -> Self {
        let start = Instant::now();
        if source >= num_nodes || sink >= num_nodes || source == sink {
            panic!(
                "Invalid source/sink pair ({}, {}) for a graph with {} nodes",
                source, sink, num_nodes
            );
        }
        if lambda_range[0] > lambda_range[1] {
            panic!(
                "Invalid parameter range [{}, {}]",
                lambda_range[0], lambda_range[1]
            );
        }

        let mut graph = Self {
            num_nodes,
            source,
            sink,
            lambda_low: lambda_range[0],
            lambda_high: lambda_range[1],
            round_negative_capacity,
            tolerance: DEFAULT_TOLERANCE,
            arcs: Vec::new(),
            read_time: Duration::ZERO,
        };

        for (from, to, constant, multiplier) in arcs {
            graph.check_arc(from, to, multiplier);
            graph.arcs.push(ParametricArc {
                from,
                to,
                constant,
                multiplier,
            });
        }

        // Blocking sort for locality; stable, so deterministic across runs.
        graph
            .arcs
            .sort_by_key(|arc| (arc.from >> ARC_SORT_SHIFT, arc.to >> ARC_SORT_SHIFT));

        graph.read_time = start.elapsed();
        graph
    }

    /// Creates a graph from a flat arc table with four entries per arc, laid
    /// out as `[from, to, constant, multiplier]`, with the endpoints stored
    /// as real numbers and truncated to integers.
    ///
    /// # Panics
    ///
    /// This method will panic if the table length is not a multiple of four,
    /// and in all cases in which [`from_arcs`](ParametricGraph::from_arcs)
    /// panics.
    pub fn from_flat(
        num_nodes: usize,
        source: usize,
        sink: usize,
        arc_matrix: &[f64],
        lambda_range: [f64; 2],
        round_negative_capacity: bool,
    ) -> Self {
        if arc_matrix.len() % 4 != 0 {
            panic!(
                "The arc table has {} entries, which is not a multiple of four",
                arc_matrix.len()
            );
        }
        Self::from_arcs(
            num_nodes,
            source,
            sink,
            arc_matrix
                .chunks_exact(4)
                .map(|row| (row[0] as usize, row[1] as usize, row[2], row[3])),
            lambda_range,
            round_negative_capacity,
        )
    }

    fn check_arc(&self, from: usize, to: usize, multiplier: f64) {
        if from >= self.num_nodes || to >= self.num_nodes {
            panic!(
                "Arc ({}, {}) does not fit in a graph with {} nodes",
                from, to, self.num_nodes
            );
        }
        if from == self.source && multiplier < 0.0 {
            panic!(
                "Source-adjacent arc ({}, {}) has negative multiplier {}",
                from, to, multiplier
            );
        }
        if to == self.sink && multiplier > 0.0 {
            panic!(
                "Sink-adjacent arc ({}, {}) has positive multiplier {}",
                from, to, multiplier
            );
        }
        if from != self.source && to != self.sink && multiplier != 0.0 {
            panic!(
                "Interior arc ({}, {}) has nonzero multiplier {}",
                from, to, multiplier
            );
        }
    }

    /// Sets the numerical tolerance used for breakpoint probing and for the
    /// intersection denominator test. The default is
    /// [`DEFAULT_TOLERANCE`].
    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance;
    }

    /// Returns the number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Returns the number of arcs.
    pub fn num_arcs(&self) -> usize {
        self.arcs.len()
    }

    /// Returns the source node.
    pub fn source(&self) -> usize {
        self.source
    }

    /// Returns the sink node.
    pub fn sink(&self) -> usize {
        self.sink
    }

    /// Returns the parameter range as `[λ_lo, λ_hi]`.
    pub fn lambda_range(&self) -> [f64; 2] {
        [self.lambda_low, self.lambda_high]
    }

    /// Returns true if negative materialized capacities are clamped to zero
    /// rather than reported as errors.
    pub fn round_negative_capacity(&self) -> bool {
        self.round_negative_capacity
    }

    /// Returns the numerical tolerance.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Returns true if the parameter range is nondegenerate, that is, if
    /// solving will search for breakpoints rather than compute a single cut.
    pub fn is_parametric(&self) -> bool {
        self.lambda_low != self.lambda_high
    }

    /// Returns the time spent ingesting and sorting the arc table.
    pub fn read_time(&self) -> Duration {
        self.read_time
    }
}
