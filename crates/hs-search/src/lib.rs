//! # hs-search
//!
//! Search space definitions and sweep strategies for HyperSweep.
//!
//! Provides the ordered parameter space, a lazy deterministic grid-point
//! generator, and the strategy trait with grid and random implementations.

mod grid;
mod space;
mod strategy;

pub use grid::{GridPoints, GridSearch};
pub use space::{ParameterDef, ParameterKind, SearchSpace};
pub use strategy::{RandomSearch, SweepStrategy};
