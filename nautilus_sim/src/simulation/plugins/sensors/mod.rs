// nautilus_sim/src/simulation/plugins/sensors/mod.rs

pub mod nav;
