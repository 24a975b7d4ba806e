/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Breakpoint search over the parameter range.
//!
//! The driver solves the two instances bracketing the range, then works on
//! nested pairs of solutions: whenever the source sides of a pair differ, the
//! λ at which their cut-capacity lines cross is computed, the minimal and
//! maximal source sides just below and above the crossing are obtained from
//! contracted subproblems, and the pair is split into two smaller pairs. A
//! crossing at which minimal and maximal sides differ is a breakpoint.

use std::time::{Duration, Instant};

use anyhow::Result;
use dsi_progress_logger::prelude::*;
use log::{debug, info};
use sux::prelude::BitVec;

use crate::engine::Engine;
use crate::graph::ParametricGraph;
use crate::subproblem::{Arena, Contracted, SINK, SOURCE};

/// Operation counters accumulated over all subproblem solves of one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Out-of-tree arcs examined while looking for weak nodes.
    pub arc_scans: u64,
    /// Tree merge operations.
    pub mergers: u64,
    /// Excess pushes along tree arcs.
    pub pushes: u64,
    /// Node relabelings.
    pub relabels: u64,
    /// Strong roots lifted because of a label gap.
    pub gaps: u64,
}

/// Wall-clock durations of the three phases of a call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Times {
    /// Ingesting and sorting the arc table (recorded at graph construction).
    pub read: Duration,
    /// Setting up the solver and building the bracketing subproblems.
    pub init: Duration,
    /// Everything else: solves, breakpoint search, output assembly.
    pub solve: Duration,
}

/// The result of a parametric cut computation.
#[derive(Debug, Clone)]
pub struct ParametricCut {
    breakpoints: Vec<f64>,
    node_breakpoints: Vec<f64>,
    stats: Stats,
    times: Times,
}

impl ParametricCut {
    /// Returns the breakpoints in increasing order.
    ///
    /// The upper bound of the parameter range is always included as a final
    /// sentinel, so there is one entry more than there are λ values at which
    /// the optimal partition changes; with a degenerate range the single
    /// solved λ is the sole entry.
    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    /// Returns, for each node, the smallest λ at which it is on the source
    /// side of the minimum cut, or the upper bound of the range if it never
    /// is.
    pub fn node_breakpoints(&self) -> &[f64] {
        &self.node_breakpoints
    }

    /// Returns true if `node` is on the source side of the minimum cut at
    /// the given λ.
    ///
    /// With a degenerate parameter range every entry collapses to the single
    /// solved λ and this method is uninformative.
    pub fn in_source_side(&self, node: usize, lambda: f64) -> bool {
        self.node_breakpoints[node] <= lambda
    }

    /// Returns the operation counters.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Returns the phase timings.
    pub fn times(&self) -> Times {
        self.times
    }
}

/// A solved subproblem, reduced to what the breakpoint search needs: the λ it
/// was solved at, its source side over the original node indices, and its cut
/// value.
#[derive(Debug)]
struct SolvedCut {
    lambda: f64,
    source_set: BitVec,
    cut_value: f64,
}

/// Per-invocation state: the subproblem arena, the engine, the counters and
/// the accumulators. Nothing outlives the call, so concurrent calls on
/// different graphs are independent.
struct Solver<'a> {
    graph: &'a ParametricGraph,
    arena: Arena,
    engine: Engine,
    stats: Stats,
    breakpoints: Vec<f64>,
    node_breakpoints: Vec<f64>,
}

impl<'a> Solver<'a> {
    fn new(graph: &'a ParametricGraph) -> Self {
        let [lambda_low, lambda_high] = graph.lambda_range();
        let mut node_breakpoints = vec![lambda_high; graph.num_nodes()];
        node_breakpoints[graph.source()] = lambda_low;
        Self {
            graph,
            arena: Arena::new(graph.num_nodes()),
            engine: Engine::new(),
            stats: Stats::default(),
            breakpoints: Vec::new(),
            node_breakpoints,
        }
    }

    /// Solves the instance currently built into `slot` and extracts its
    /// source side over the original node indexing.
    fn solve_slot(&mut self, slot: usize, maximal: bool, pl: &mut impl ProgressLog) -> SolvedCut {
        let contracted = self.arena.slot(slot);
        let mut source_set = BitVec::new(self.graph.num_nodes());

        if contracted.num_nodes == 2 {
            // No unknown nodes: the partition is fixed and there is nothing
            // to solve.
            for &node in &contracted.source_set {
                source_set.set(node, true);
            }
        } else {
            self.engine.min_cut(contracted, maximal, &mut self.stats);
            for (index, &node) in contracted.originals.iter().enumerate() {
                source_set.set(node, self.engine.is_source_side(index + 2));
            }
            for &node in &contracted.source_set {
                source_set.set(node, true);
            }
            for &node in &contracted.sink_set {
                source_set.set(node, false);
            }
        }

        let cut_value = evaluate_cut(contracted, &source_set);
        debug!(
            "Solved subproblem at lambda = {}: cut value {}",
            contracted.lambda, cut_value
        );
        pl.update();
        SolvedCut {
            lambda: contracted.lambda,
            source_set,
            cut_value,
        }
    }

    /// Sum of the constant capacity coefficients of the arcs crossing the
    /// given cut, the source-adjacent ones excluded.
    fn internal_cut_capacity(&self, source_set: &BitVec) -> f64 {
        let source = self.graph.source();
        let mut capacity = 0.0;
        for arc in &self.graph.arcs {
            if arc.from != source && source_set[arc.from] && !source_set[arc.to] {
                capacity += arc.constant;
            }
        }
        capacity
    }

    /// The λ at which the cut-capacity lines of the two nested solutions
    /// cross.
    ///
    /// Writing `D` for the nodes separating the two source sides, the lines
    /// differ by `K12` plus the full affine capacity of the source-adjacent
    /// arcs into `D`, minus the λ term of the sink-adjacent arcs out of `D`
    /// (their constant coefficients are already inside `K12`). If the lines
    /// are numerically parallel the midpoint of the subinterval is used
    /// instead.
    fn intersection(&self, low: &SolvedCut, high: &SolvedCut, k12: f64) -> f64 {
        let source = self.graph.source();
        let sink = self.graph.sink();
        let in_difference = |node: usize| high.source_set[node] && !low.source_set[node];

        let mut constant = k12;
        let mut multiplier = 0.0;
        for arc in &self.graph.arcs {
            if arc.from == source && in_difference(arc.to) {
                constant += arc.constant;
                multiplier += arc.multiplier;
            } else if arc.to == sink && in_difference(arc.from) {
                multiplier -= arc.multiplier;
            }
        }

        if multiplier.abs() < self.graph.tolerance() {
            return (low.lambda + high.lambda) / 2.0;
        }
        constant / -multiplier
    }

    /// Splits the interval bracketed by two solved problems with nested,
    /// distinct source sides, recording every breakpoint in between in
    /// increasing λ order.
    fn recurse(
        &mut self,
        low: &SolvedCut,
        high: &SolvedCut,
        pl: &mut impl ProgressLog,
    ) -> Result<()> {
        let num_nodes = self.graph.num_nodes();
        let differing = (0..num_nodes)
            .filter(|&node| high.source_set[node] && !low.source_set[node])
            .count();
        if differing == 0 {
            return Ok(());
        }

        let k_low = self.internal_cut_capacity(&low.source_set);
        let k_high = self.internal_cut_capacity(&high.source_set);
        let tolerance = self.graph.tolerance();
        let [lambda_low, lambda_high] = self.graph.lambda_range();
        let lambda = self
            .intersection(low, high, k_low - k_high)
            .clamp(lambda_low, lambda_high);

        // Probe just below and just above the crossing; the offsets keep the
        // two solves clear of the degenerate ties at the crossing itself.
        self.arena.build(
            0,
            self.graph,
            (lambda - tolerance).max(lambda_low),
            &low.source_set,
            &high.source_set,
        )?;
        let minimal = self.solve_slot(0, false, pl);

        self.arena.build(
            1,
            self.graph,
            (lambda + tolerance).min(lambda_high),
            &minimal.source_set,
            &high.source_set,
        )?;
        let maximal = self.solve_slot(1, true, pl);

        // A probe that reproduces an endpoint of the interval makes no
        // progress; descending into it would re-derive this very interval.
        // This happens only when capacity clamping bends the cut lines.
        if !same_set(&minimal.source_set, &high.source_set, num_nodes) {
            self.recurse(low, &minimal, pl)?;
        } else {
            debug!("No progress below the crossing at lambda = {}", lambda);
        }
        if (0..num_nodes).any(|node| maximal.source_set[node] && !minimal.source_set[node]) {
            self.add_breakpoint(lambda, &maximal.source_set);
        }
        if !same_set(&maximal.source_set, &low.source_set, num_nodes) {
            self.recurse(&maximal, high, pl)?;
        } else {
            debug!("No progress above the crossing at lambda = {}", lambda);
        }
        Ok(())
    }

    /// Records a breakpoint and tightens the entry value of every node on
    /// the source side there.
    fn add_breakpoint(&mut self, lambda: f64, source_set: &BitVec) {
        self.breakpoints.push(lambda);
        info!(
            "Found breakpoint {} at lambda = {}",
            self.breakpoints.len(),
            lambda
        );
        self.tighten(lambda, source_set);
    }

    fn tighten(&mut self, lambda: f64, source_set: &BitVec) {
        for node in 0..self.graph.num_nodes() {
            if source_set[node] && self.node_breakpoints[node] > lambda {
                self.node_breakpoints[node] = lambda;
            }
        }
    }
}

/// Capacity of the given cut of a contracted instance, base term included.
fn evaluate_cut(contracted: &Contracted, source_set: &BitVec) -> f64 {
    let mut value = contracted.base_capacity;
    for arc in &contracted.arcs {
        let from_source = arc.from == SOURCE || source_set[contracted.originals[arc.from - 2]];
        let to_sink = arc.to == SINK || !source_set[contracted.originals[arc.to - 2]];
        if from_source && to_sink {
            value += arc.capacity;
        }
    }
    value
}

fn same_set(a: &BitVec, b: &BitVec, num_nodes: usize) -> bool {
    (0..num_nodes).all(|node| a[node] == b[node])
}

/// Computes all breakpoints of the parametric minimum cut of `graph`,
/// together with the per-node entry values.
///
/// With a degenerate parameter range (`λ_lo = λ_hi`) a single minimum cut is
/// computed and its λ is the sole breakpoint.
///
/// # Errors
///
/// Fails if an arc capacity materializes to a negative value at some probed
/// λ and the graph does not round negative capacities.
pub fn parametric_cut(
    graph: &ParametricGraph,
    pl: &mut impl ProgressLog,
) -> Result<ParametricCut> {
    let init_start = Instant::now();
    let num_nodes = graph.num_nodes();
    let [lambda_low, lambda_high] = graph.lambda_range();
    let mut solver = Solver::new(graph);

    // Bracketing instances: nothing is known yet, so only the source and the
    // sink themselves are collapsed.
    let nobody = BitVec::new(num_nodes);
    let mut everybody = BitVec::new(num_nodes);
    for node in 0..num_nodes {
        everybody.set(node, true);
    }

    pl.item_name("subproblem");
    pl.start("Searching for minimum-cut breakpoints...");

    solver.arena.build(0, graph, lambda_low, &nobody, &everybody)?;
    if graph.is_parametric() {
        solver.arena.build(1, graph, lambda_high, &nobody, &everybody)?;
    }
    let init = init_start.elapsed();

    let solve_start = Instant::now();
    if graph.is_parametric() {
        let low = solver.solve_slot(0, false, pl);
        let high = solver.solve_slot(1, false, pl);
        // Nodes on the source side from the start enter at the lower bound.
        solver.tighten(lambda_low, &low.source_set);
        solver.recurse(&low, &high, pl)?;
        // The upper bound closes the last interval, unless a breakpoint
        // already landed exactly on it.
        if solver.breakpoints.last() == Some(&lambda_high) {
            solver.tighten(lambda_high, &high.source_set);
        } else {
            solver.add_breakpoint(lambda_high, &high.source_set);
        }
    } else {
        let only = solver.solve_slot(0, false, pl);
        solver.add_breakpoint(only.lambda, &only.source_set);
    }
    let solve = solve_start.elapsed();

    pl.done();

    Ok(ParametricCut {
        breakpoints: solver.breakpoints,
        node_breakpoints: solver.node_breakpoints,
        stats: solver.stats,
        times: Times {
            read: graph.read_time(),
            init,
            solve,
        },
    })
}
