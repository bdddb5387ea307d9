// nautilus_core/src/bt/node.rs

use super::Status;
use crate::types::Timestamp;

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decorator {
    /// Re-ticks a failed child up to `retries` more times. Once exhausted it
    /// keeps reporting Failure until halted.
    Retry { retries: u32 },
    /// Fails a child that has been Running for `seconds`.
    Timeout { seconds: f64 },
    /// Swaps Success and Failure.
    Invert,
}

/// The static structure of one node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node<C, A> {
    Sequence {
        name: String,
        children: Vec<NodeId>,
    },
    Fallback {
        name: String,
        children: Vec<NodeId>,
    },
    Parallel {
        name: String,
        children: Vec<NodeId>,
        success_threshold: usize,
        failure_threshold: usize,
    },
    Decorator {
        name: String,
        decorator: Decorator,
        child: NodeId,
    },
    Condition(C),
    Action(A),
}

impl<C, A> Node<C, A> {
    pub fn children(&self) -> &[NodeId] {
        match self {
            Node::Sequence { children, .. }
            | Node::Fallback { children, .. }
            | Node::Parallel { children, .. } => children,
            Node::Decorator { child, .. } => std::slice::from_ref(child),
            Node::Condition(_) | Node::Action(_) => &[],
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Sequence { name, .. }
            | Node::Fallback { name, .. }
            | Node::Parallel { name, .. }
            | Node::Decorator { name, .. } => Some(name),
            Node::Condition(_) | Node::Action(_) => None,
        }
    }
}

/// The runtime memory of one node. Reset to default when the node is halted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(super) struct NodeState {
    /// Status returned on the last tick; `None` while idle.
    pub status: Option<Status>,
    /// Retry: failures counted so far.
    pub failures: u32,
    /// Retry: budget spent, Failure until halted.
    pub exhausted: bool,
    /// Timeout: when the child was first seen Running.
    pub running_since: Option<Timestamp>,
}
