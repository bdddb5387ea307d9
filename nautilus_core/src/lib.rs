// nautilus_core/src/lib.rs

// Supervisory mission control for an autonomous underwater vehicle: a
// behavior-tree executor ticked against a snapshot of the vehicle state.
pub mod blackboard;
pub mod bt;
pub mod config;
pub mod dvl;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod geo;
pub mod leader;
pub mod messages;
pub mod mission;
pub mod planning;
pub mod prelude;
pub mod safety;
pub mod types;
