// nautilus_core/src/bt/mod.rs

//! A small behavior-tree engine.
//!
//! The tree is an arena of nodes addressed by index, built once with
//! [`TreeBuilder`] and never restructured afterwards. Leaves are closed enums
//! chosen by the user (`C` for conditions, `A` for actions) and are evaluated
//! through a [`LeafHandler`], so the engine itself knows nothing about the
//! vehicle.

mod builder;
mod node;
mod tree;

pub use builder::TreeBuilder;
pub use node::{Decorator, Node, NodeId};
pub use tree::BehaviorTree;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    Success,
    Failure,
    Running,
}

impl From<bool> for Status {
    fn from(ok: bool) -> Self {
        if ok {
            Status::Success
        } else {
            Status::Failure
        }
    }
}

/// Whether an action leaf is being entered or was already ticked in the
/// current run of its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// First tick since the tree was built or the leaf was halted.
    Start,
    Continue,
}

/// Evaluates the leaves of a `BehaviorTree<C, A>`.
pub trait LeafHandler<C, A> {
    fn condition(&mut self, condition: &C) -> bool;

    fn action(&mut self, action: &A, phase: Phase) -> Status;

    /// Called when a running action is pre-empted or its parent finishes.
    fn halt(&mut self, _action: &A) {}
}
