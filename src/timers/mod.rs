//! Hierarchical solve timers.

mod timers;
pub use timers::Timers;
pub(crate) use timers::{notimeit, timeit};
