/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]
#![deny(unstable_features)]
#![deny(trivial_casts)]
#![deny(unconditional_recursion)]
#![deny(unreachable_code)]
#![deny(unreachable_pub)]
#![deny(unreachable_patterns)]
#![deny(unused_macro_rules)]
#![deny(unused_doc_comments)]

pub mod graph;
pub use graph::ParametricGraph;

mod engine;
mod subproblem;

pub mod parametric;
pub use parametric::{parametric_cut, ParametricCut, Stats, Times};

/// Prelude module to import everything from this crate
pub mod prelude {
    pub use crate::graph::*;
    pub use crate::parametric::*;
}
