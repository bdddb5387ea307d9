// nautilus_sim/src/simulation/core/mod.rs

pub mod events;
pub mod prng;
pub mod runner;
