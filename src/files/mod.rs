//! File helpers shared by the history backends and the engine.

pub mod atomic;
pub mod lock;
