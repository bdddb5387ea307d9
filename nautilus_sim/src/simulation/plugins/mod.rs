// nautilus_sim/src/simulation/plugins/mod.rs

//! The external collaborators of the executor: the vehicle and the leader,
//! the navigation sensors and the action servers.

pub mod sensors;
pub mod servers;
pub mod vehicles;
