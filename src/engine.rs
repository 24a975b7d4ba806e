/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The pseudoflow minimum-cut engine.
//!
//! A single contracted instance is solved by maintaining a *pseudoflow*, a
//! flow that may violate conservation and leave excesses and deficits at
//! nodes, together with a normalized forest over the non-terminal nodes. Nodes
//! carry distance labels; roots with positive excess ("strong roots") are
//! repeatedly extracted in order of decreasing label and either merged into a
//! lower-labeled tree, pushing their excess along the new path, or relabeled.
//! An empty label level (a gap) proves every node above it is disconnected
//! from the sink, so those nodes are lifted out of the way in one sweep.
//!
//! On termination the nodes labeled at least `n` form the source side of a
//! minimum cut. The flow left on the arcs is a valid pseudoflow but not
//! necessarily a decomposable flow; it is not exposed.
//!
//! The forest is stored as parallel vectors indexed by node, with `Option`al
//! indices for the parent, first child, and next sibling, so the link
//! reversals performed by merging are plain index writes.

use crate::parametric::Stats;
use crate::subproblem::{Contracted, SINK, SOURCE};

/// Sign of an excess value: -1 for a deficit, 1 for an excess, 0 otherwise.
///
/// Flow arithmetic goes through this helper rather than bare comparisons so
/// that every sign test in the engine is against zero.
#[inline(always)]
fn excess_sign(excess: f64) -> i32 {
    if excess < 0.0 {
        -1
    } else if excess > 0.0 {
        1
    } else {
        0
    }
}

/// The tree link of a node: its parent and the arc connecting them.
///
/// One is meaningful exactly when the other is, so they share an `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ParentLink {
    node: usize,
    arc: usize,
}

#[derive(Debug, Clone, Default)]
struct FlowNode {
    label: usize,
    excess: f64,
    parent: Option<ParentLink>,
    /// First child in this node's child list.
    child_list: Option<usize>,
    /// Cursor into the child list used by tree scans.
    next_scan: Option<usize>,
    /// Next sibling in the parent's child list, or next node in a strong
    /// bucket; a node never needs both at once, since bucket members are
    /// parentless.
    next: Option<usize>,
    /// Cursor into this node's out-of-tree arc list.
    next_arc: usize,
}

#[derive(Debug, Clone, Copy)]
struct FlowArc {
    from: usize,
    to: usize,
    capacity: f64,
    flow: f64,
    /// True if residual capacity may be pushed from child to parent along
    /// this arc when it is a tree arc.
    direction: bool,
}

/// A FIFO bucket of strong roots at one label, chained through the nodes'
/// `next` fields.
#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    first: Option<usize>,
    last: Option<usize>,
}

/// Scratch state for solving one contracted instance at a time.
///
/// All buffers are reused across solves; [`min_cut`](Engine::min_cut) resets
/// whatever the previous solve left behind.
#[derive(Debug, Default)]
pub(crate) struct Engine {
    nodes: Vec<FlowNode>,
    /// Per-node list of candidate arcs not in the forest.
    out_of_tree: Vec<Vec<usize>>,
    arcs: Vec<FlowArc>,
    strong_roots: Vec<Bucket>,
    label_count: Vec<usize>,
    highest_strong_label: usize,
    num_nodes: usize,
    source: usize,
    sink: usize,
    reversed: bool,
}

impl Engine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Solves `problem` and leaves the resulting labeling in place for
    /// [`is_source_side`](Engine::is_source_side).
    ///
    /// With `maximal` set the instance is solved on the reversed graph, which
    /// yields the inclusion-maximal source side among the minimum cuts
    /// instead of the minimal one.
    pub(crate) fn min_cut(&mut self, problem: &Contracted, maximal: bool, stats: &mut Stats) {
        let n = problem.num_nodes;
        debug_assert!(n > 2, "the empty instance is handled by the caller");
        self.num_nodes = n;
        self.reversed = maximal;
        let (source, sink) = if maximal {
            (SINK, SOURCE)
        } else {
            (SOURCE, SINK)
        };
        self.source = source;
        self.sink = sink;

        // The contracted arcs stay untouched; the engine works on its own
        // flow-carrying copies, reversed when the maximal side is wanted.
        self.arcs.clear();
        self.arcs.extend(problem.arcs.iter().map(|arc| {
            let (from, to) = if maximal {
                (arc.to, arc.from)
            } else {
                (arc.from, arc.to)
            };
            FlowArc {
                from,
                to,
                capacity: arc.capacity,
                flow: 0.0,
                direction: true,
            }
        }));

        self.nodes.clear();
        self.nodes.resize(n, FlowNode::default());
        if self.out_of_tree.len() < n {
            self.out_of_tree.resize_with(n, Vec::new);
        }
        for list in &mut self.out_of_tree[..n] {
            list.clear();
        }
        // Extra levels so a relabel landing at or just above n stays in
        // bounds.
        self.strong_roots.clear();
        self.strong_roots.resize(n + 2, Bucket::default());
        self.label_count.clear();
        self.label_count.resize(n + 2, 0);
        self.highest_strong_label = 1;

        // Every arc lives in exactly one out-of-tree list: sink-adjacent
        // arcs in the sink's, all others in their tail's.
        for i in 0..self.arcs.len() {
            let (from, to) = (self.arcs[i].from, self.arcs[i].to);
            if to == source || from == sink || from == to {
                continue;
            }
            if from == source && to == sink {
                self.arcs[i].flow = self.arcs[i].capacity;
            } else if to == sink {
                self.out_of_tree[to].push(i);
            } else {
                self.out_of_tree[from].push(i);
            }
        }

        self.simple_initialization();

        while let Some(root) = self.highest_strong_root(stats) {
            self.process_root(root, stats);
        }
    }

    /// Returns true if, after a solve, `node` is on the source side of the
    /// minimum cut.
    pub(crate) fn is_source_side(&self, node: usize) -> bool {
        (self.nodes[node].label >= self.num_nodes) != self.reversed
    }

    /// Saturates source-adjacent arcs, pulls the capacity of sink-adjacent
    /// arcs out as deficits, and buckets every node left with excess at
    /// label 1.
    fn simple_initialization(&mut self) {
        for i in 0..self.out_of_tree[self.source].len() {
            let arc = self.out_of_tree[self.source][i];
            let capacity = self.arcs[arc].capacity;
            let to = self.arcs[arc].to;
            self.arcs[arc].flow = capacity;
            self.nodes[to].excess += capacity;
        }
        for i in 0..self.out_of_tree[self.sink].len() {
            let arc = self.out_of_tree[self.sink][i];
            let capacity = self.arcs[arc].capacity;
            let from = self.arcs[arc].from;
            self.arcs[arc].flow = capacity;
            self.nodes[from].excess -= capacity;
        }
        self.nodes[self.source].excess = 0.0;
        self.nodes[self.sink].excess = 0.0;

        for i in 0..self.num_nodes {
            if excess_sign(self.nodes[i].excess) > 0 {
                self.nodes[i].label = 1;
                self.label_count[1] += 1;
                self.add_to_bucket(i);
            }
        }
        self.nodes[self.source].label = self.num_nodes;
        self.nodes[self.sink].label = 0;
        self.label_count[0] = (self.num_nodes - 2) - self.label_count[1];
    }

    fn add_to_bucket(&mut self, node: usize) {
        let label = self.nodes[node].label;
        self.nodes[node].next = None;
        match self.strong_roots[label].last {
            Some(last) => self.nodes[last].next = Some(node),
            None => self.strong_roots[label].first = Some(node),
        }
        self.strong_roots[label].last = Some(node);
    }

    fn pop_bucket(&mut self, label: usize) -> Option<usize> {
        let first = self.strong_roots[label].first?;
        self.strong_roots[label].first = self.nodes[first].next;
        if self.strong_roots[label].first.is_none() {
            self.strong_roots[label].last = None;
        }
        self.nodes[first].next = None;
        Some(first)
    }

    /// Extracts the next strong root to process, scanning labels downward
    /// from the cursor.
    ///
    /// An empty level below a non-empty bucket is a gap: every root in that
    /// bucket is disconnected from the sink and its whole tree is lifted to
    /// label `n`. If only label-0 roots remain (deficit nodes that became
    /// roots again), they are promoted to label 1 and processing restarts
    /// there.
    fn highest_strong_root(&mut self, stats: &mut Stats) -> Option<usize> {
        let mut label = self.highest_strong_label;
        while label > 0 {
            if self.strong_roots[label].first.is_some() {
                self.highest_strong_label = label;
                if self.label_count[label - 1] > 0 {
                    return self.pop_bucket(label);
                }
                while let Some(root) = self.pop_bucket(label) {
                    stats.gaps += 1;
                    self.lift_all(root);
                }
            }
            label -= 1;
        }

        if self.strong_roots[0].first.is_none() {
            return None;
        }
        while let Some(root) = self.pop_bucket(0) {
            self.nodes[root].label = 1;
            self.label_count[0] -= 1;
            self.label_count[1] += 1;
            stats.relabels += 1;
            self.add_to_bucket(root);
        }
        self.highest_strong_label = 1;
        self.pop_bucket(1)
    }

    /// Relabels the whole tree rooted at `root` to `n`, removing it from the
    /// labeling for good.
    fn lift_all(&mut self, root: usize) {
        let n = self.num_nodes;
        let mut current = root;
        self.nodes[current].next_scan = self.nodes[current].child_list;
        self.label_count[self.nodes[current].label] -= 1;
        self.nodes[current].label = n;
        loop {
            while let Some(child) = self.nodes[current].next_scan {
                self.nodes[current].next_scan = self.nodes[child].next;
                current = child;
                self.nodes[current].next_scan = self.nodes[current].child_list;
                self.label_count[self.nodes[current].label] -= 1;
                self.nodes[current].label = n;
            }
            match self.nodes[current].parent {
                Some(link) => current = link.node,
                None => break,
            }
        }
    }

    /// Processes one strong root: looks for an out-of-tree arc reaching a
    /// weak node one label below anywhere in the root's tree, merging and
    /// pushing if one is found; otherwise the scanned nodes are relabeled
    /// and the root is re-bucketed one level up.
    fn process_root(&mut self, strong_root: usize, stats: &mut Stats) {
        self.nodes[strong_root].next_scan = self.nodes[strong_root].child_list;
        if let Some((arc, weak)) = self.find_weak_node(strong_root, stats) {
            self.merge(weak, strong_root, arc, stats);
            self.push_excess(strong_root, stats);
            return;
        }
        self.check_children(strong_root, stats);

        let mut strong_node = strong_root;
        loop {
            while let Some(child) = self.nodes[strong_node].next_scan {
                self.nodes[strong_node].next_scan = self.nodes[child].next;
                strong_node = child;
                self.nodes[strong_node].next_scan = self.nodes[strong_node].child_list;
                if let Some((arc, weak)) = self.find_weak_node(strong_node, stats) {
                    self.merge(weak, strong_node, arc, stats);
                    self.push_excess(strong_root, stats);
                    return;
                }
                self.check_children(strong_node, stats);
            }
            match self.nodes[strong_node].parent {
                Some(link) => {
                    strong_node = link.node;
                    self.check_children(strong_node, stats);
                }
                None => break,
            }
        }

        self.add_to_bucket(strong_root);
        self.highest_strong_label += 1;
    }

    /// Scans `node`'s out-of-tree arcs from its cursor for one whose other
    /// endpoint sits one label below the current strong label, swap-removing
    /// and returning it together with that weak endpoint.
    fn find_weak_node(&mut self, node: usize, stats: &mut Stats) -> Option<(usize, usize)> {
        let target = self.highest_strong_label - 1;
        let mut i = self.nodes[node].next_arc;
        while i < self.out_of_tree[node].len() {
            stats.arc_scans += 1;
            let arc = self.out_of_tree[node][i];
            let (from, to) = (self.arcs[arc].from, self.arcs[arc].to);
            let weak = if self.nodes[to].label == target {
                Some(to)
            } else if self.nodes[from].label == target {
                Some(from)
            } else {
                None
            };
            if let Some(weak) = weak {
                self.nodes[node].next_arc = i;
                self.out_of_tree[node].swap_remove(i);
                return Some((arc, weak));
            }
            i += 1;
        }
        self.nodes[node].next_arc = self.out_of_tree[node].len();
        None
    }

    /// Advances `node`'s scan cursor past children that cannot be at its own
    /// label; if none is left, relabels `node` one level up and resets its
    /// arc cursor.
    fn check_children(&mut self, node: usize, stats: &mut Stats) {
        while let Some(child) = self.nodes[node].next_scan {
            if self.nodes[child].label == self.nodes[node].label {
                return;
            }
            self.nodes[node].next_scan = self.nodes[child].next;
        }

        let label = self.nodes[node].label;
        self.label_count[label] -= 1;
        self.nodes[node].label = label + 1;
        self.label_count[label + 1] += 1;
        stats.relabels += 1;
        self.nodes[node].next_arc = 0;
    }

    /// Attaches `child` under `parent` through `arc`.
    fn attach(&mut self, parent: usize, child: usize, arc: usize) {
        self.nodes[child].parent = Some(ParentLink { node: parent, arc });
        self.nodes[child].next = self.nodes[parent].child_list;
        self.nodes[parent].child_list = Some(child);
    }

    /// Detaches `child` from `old_parent`, splicing it out of the child
    /// list.
    fn break_relationship(&mut self, old_parent: usize, child: usize) {
        self.nodes[child].parent = None;
        if self.nodes[old_parent].child_list == Some(child) {
            self.nodes[old_parent].child_list = self.nodes[child].next;
            self.nodes[child].next = None;
            return;
        }
        let mut current = self.nodes[old_parent].child_list;
        while let Some(sibling) = current {
            if self.nodes[sibling].next == Some(child) {
                self.nodes[sibling].next = self.nodes[child].next;
                break;
            }
            current = self.nodes[sibling].next;
        }
        self.nodes[child].next = None;
    }

    /// Grafts the tree containing `strong` onto `weak` through `out_arc`,
    /// reversing the parent links on the path from `strong` up to its old
    /// root and flipping the direction of each reversed tree arc.
    fn merge(&mut self, weak: usize, strong: usize, out_arc: usize, stats: &mut Stats) {
        stats.mergers += 1;

        let mut current = strong;
        let mut new_parent = weak;
        let mut new_arc = out_arc;
        while let Some(link) = self.nodes[current].parent {
            self.break_relationship(link.node, current);
            self.attach(new_parent, current, new_arc);
            new_parent = current;
            current = link.node;
            new_arc = link.arc;
            self.arcs[new_arc].direction = !self.arcs[new_arc].direction;
        }
        self.attach(new_parent, current, new_arc);
    }

    /// Pushes the excess of `strong_root` along tree arcs toward its new
    /// root. An arc that saturates detaches its child, which keeps the
    /// leftover excess and becomes a strong root again.
    fn push_excess(&mut self, strong_root: usize, stats: &mut Stats) {
        let mut current = strong_root;
        let mut parent_excess_before = 1.0;
        while excess_sign(self.nodes[current].excess) != 0 {
            let Some(link) = self.nodes[current].parent else {
                break;
            };
            parent_excess_before = self.nodes[link.node].excess;
            if self.arcs[link.arc].direction {
                let residual = self.arcs[link.arc].capacity - self.arcs[link.arc].flow;
                self.push_upward(link.arc, current, link.node, residual, stats);
            } else {
                let flow = self.arcs[link.arc].flow;
                self.push_downward(link.arc, current, link.node, flow, stats);
            }
            current = link.node;
        }

        // The push may stop at a root that now holds excess; bucket it
        // unless its excess was already positive before the last push, in
        // which case it is in a bucket already.
        if excess_sign(self.nodes[current].excess) > 0 && excess_sign(parent_excess_before) <= 0 {
            self.add_to_bucket(current);
        }
    }

    fn push_upward(
        &mut self,
        arc: usize,
        child: usize,
        parent: usize,
        residual: f64,
        stats: &mut Stats,
    ) {
        stats.pushes += 1;

        let excess = self.nodes[child].excess;
        if excess_sign(residual - excess) >= 0 {
            self.nodes[parent].excess += excess;
            self.arcs[arc].flow += excess;
            self.nodes[child].excess = 0.0;
            return;
        }

        self.arcs[arc].direction = false;
        self.nodes[parent].excess += residual;
        self.nodes[child].excess -= residual;
        self.arcs[arc].flow = self.arcs[arc].capacity;
        self.out_of_tree[parent].push(arc);
        self.break_relationship(parent, child);
        self.add_to_bucket(child);
    }

    fn push_downward(
        &mut self,
        arc: usize,
        child: usize,
        parent: usize,
        flow: f64,
        stats: &mut Stats,
    ) {
        stats.pushes += 1;

        let excess = self.nodes[child].excess;
        if excess_sign(flow - excess) >= 0 {
            self.nodes[parent].excess += excess;
            self.arcs[arc].flow -= excess;
            self.nodes[child].excess = 0.0;
            return;
        }

        self.arcs[arc].direction = true;
        self.nodes[child].excess -= flow;
        self.nodes[parent].excess += flow;
        self.arcs[arc].flow = 0.0;
        self.out_of_tree[parent].push(arc);
        self.break_relationship(parent, child);
        self.add_to_bucket(child);
    }
}
