// nautilus_core/src/bt/tree.rs

use super::node::{Decorator, Node, NodeId, NodeState};
use super::{LeafHandler, Phase, Status};
use crate::types::Timestamp;
use tracing::trace;

/// An immutable tree of nodes plus the per-node runtime state.
///
/// Composites are reactive: every tick starts again from their first child.
/// Whenever a composite stops ticking a child (it finished, or an earlier
/// sibling decided the outcome) that child's subtree is halted, which resets
/// its runtime state and halts any running action inside it.
#[derive(Debug, Clone)]
pub struct BehaviorTree<C, A> {
    nodes: Vec<Node<C, A>>,
    state: Vec<NodeState>,
    root: NodeId,
}

impl<C, A> BehaviorTree<C, A> {
    /// Called by `TreeBuilder::build` after validation.
    pub(super) fn from_parts(nodes: Vec<Node<C, A>>, root: NodeId) -> Self {
        let state = vec![NodeState::default(); nodes.len()];
        Self { nodes, state, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node<C, A>> {
        self.nodes.get(id)
    }

    /// Status a node returned on its last tick; `None` while idle.
    pub fn status(&self, id: NodeId) -> Option<Status> {
        self.state.get(id).and_then(|s| s.status)
    }

    /// Ticks the whole tree once.
    pub fn tick<H: LeafHandler<C, A>>(&mut self, handler: &mut H, now: Timestamp) -> Status {
        let mut ctx = Ctx {
            nodes: &self.nodes,
            state: &mut self.state,
            handler,
            now,
        };
        let status = ctx.tick(self.root);
        if status != Status::Running {
            // A finished tree starts fresh on the next tick.
            ctx.halt(self.root);
        }
        status
    }

    /// Halts every node, calling `LeafHandler::halt` on running actions.
    pub fn halt<H: LeafHandler<C, A>>(&mut self, handler: &mut H) {
        self.halt_subtree(self.root, handler);
    }

    /// Halts the subtree under `id` and leaves the rest of the tree alone.
    /// Unknown ids are ignored.
    pub fn halt_subtree<H: LeafHandler<C, A>>(&mut self, id: NodeId, handler: &mut H) {
        if id >= self.nodes.len() {
            return;
        }
        let mut ctx = Ctx {
            nodes: &self.nodes,
            state: &mut self.state,
            handler,
            now: 0.0,
        };
        ctx.halt(id);
    }
}

struct Ctx<'a, C, A, H> {
    nodes: &'a [Node<C, A>],
    state: &'a mut [NodeState],
    handler: &'a mut H,
    now: Timestamp,
}

impl<C, A, H: LeafHandler<C, A>> Ctx<'_, C, A, H> {
    fn tick(&mut self, id: NodeId) -> Status {
        let nodes = self.nodes;
        let status = match &nodes[id] {
            Node::Sequence { children, .. } => self.tick_sequence(children),
            Node::Fallback { children, .. } => self.tick_fallback(children),
            Node::Parallel {
                children,
                success_threshold,
                failure_threshold,
                ..
            } => self.tick_parallel(children, *success_threshold, *failure_threshold),
            Node::Decorator {
                decorator, child, ..
            } => self.tick_decorator(id, decorator, *child),
            Node::Condition(c) => Status::from(self.handler.condition(c)),
            Node::Action(a) => {
                let phase = if self.state[id].status.is_none() {
                    Phase::Start
                } else {
                    Phase::Continue
                };
                self.handler.action(a, phase)
            }
        };
        if let Some(name) = nodes[id].name() {
            trace!(node = id, name, ?status, "ticked");
        }
        self.state[id].status = Some(status);
        status
    }

    fn tick_sequence(&mut self, children: &[NodeId]) -> Status {
        for (i, &child) in children.iter().enumerate() {
            match self.tick(child) {
                Status::Success => continue,
                Status::Running => {
                    self.halt_all(&children[i + 1..]);
                    return Status::Running;
                }
                Status::Failure => {
                    self.halt_all(children);
                    return Status::Failure;
                }
            }
        }
        self.halt_all(children);
        Status::Success
    }

    fn tick_fallback(&mut self, children: &[NodeId]) -> Status {
        for (i, &child) in children.iter().enumerate() {
            match self.tick(child) {
                Status::Failure => continue,
                Status::Running => {
                    self.halt_all(&children[i + 1..]);
                    return Status::Running;
                }
                Status::Success => {
                    self.halt_all(children);
                    return Status::Success;
                }
            }
        }
        self.halt_all(children);
        Status::Failure
    }

    /// Children that already finished in this run are not ticked again.
    fn tick_parallel(&mut self, children: &[NodeId], success: usize, failure: usize) -> Status {
        let (mut successes, mut failures) = (0, 0);
        for &child in children {
            let previous = self.state[child].status;
            let status = match previous {
                Some(done @ (Status::Success | Status::Failure)) => done,
                _ => self.tick(child),
            };
            match status {
                Status::Success => successes += 1,
                Status::Failure => failures += 1,
                Status::Running => {}
            }
        }
        let outcome = if successes >= success {
            Status::Success
        } else if failures >= failure {
            Status::Failure
        } else {
            return Status::Running;
        };
        self.halt_all(children);
        outcome
    }

    fn tick_decorator(&mut self, id: NodeId, decorator: &Decorator, child: NodeId) -> Status {
        match *decorator {
            Decorator::Invert => match self.tick(child) {
                Status::Running => Status::Running,
                done => {
                    self.halt(child);
                    if done == Status::Success {
                        Status::Failure
                    } else {
                        Status::Success
                    }
                }
            },
            Decorator::Retry { retries } => {
                if self.state[id].exhausted {
                    return Status::Failure;
                }
                match self.tick(child) {
                    Status::Running => Status::Running,
                    Status::Success => {
                        self.halt(child);
                        self.state[id].failures = 0;
                        Status::Success
                    }
                    Status::Failure => {
                        self.halt(child);
                        let s = &mut self.state[id];
                        s.failures += 1;
                        if s.failures > retries {
                            s.exhausted = true;
                            Status::Failure
                        } else {
                            trace!(node = id, attempt = s.failures, "retrying");
                            Status::Running
                        }
                    }
                }
            }
            Decorator::Timeout { seconds } => {
                if let Some(since) = self.state[id].running_since {
                    if self.now - since >= seconds {
                        self.halt(child);
                        self.state[id].running_since = None;
                        return Status::Failure;
                    }
                }
                match self.tick(child) {
                    Status::Running => {
                        self.state[id].running_since.get_or_insert(self.now);
                        Status::Running
                    }
                    done => {
                        self.halt(child);
                        self.state[id].running_since = None;
                        done
                    }
                }
            }
        }
    }

    fn halt_all(&mut self, ids: &[NodeId]) {
        for &id in ids {
            self.halt(id);
        }
    }

    /// Resets a subtree. Running actions inside it are halted first.
    fn halt(&mut self, id: NodeId) {
        let nodes = self.nodes;
        for &child in nodes[id].children() {
            self.halt(child);
        }
        if let Node::Action(a) = &nodes[id] {
            if self.state[id].status == Some(Status::Running) {
                self.handler.halt(a);
            }
        }
        self.state[id] = NodeState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::super::TreeBuilder;
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Cond {
        A,
        B,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Act {
        X,
        Y,
    }

    /// Scripted leaves: conditions read a map, actions pop their next
    /// status (repeating the last one) and every call is logged.
    #[derive(Default)]
    struct Script {
        conds: HashMap<Cond, bool>,
        acts: HashMap<Act, Vec<Status>>,
        calls: Vec<(Act, Phase)>,
        halted: Vec<Act>,
    }

    impl Script {
        fn act(&mut self, a: Act, statuses: &[Status]) {
            self.acts.insert(a, statuses.to_vec());
        }
    }

    impl LeafHandler<Cond, Act> for Script {
        fn condition(&mut self, c: &Cond) -> bool {
            self.conds.get(c).copied().unwrap_or(false)
        }

        fn action(&mut self, a: &Act, phase: Phase) -> Status {
            self.calls.push((*a, phase));
            let script = self.acts.entry(*a).or_default();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script.first().copied().unwrap_or(Status::Failure)
            }
        }

        fn halt(&mut self, a: &Act) {
            self.halted.push(*a);
        }
    }

    use Status::*;

    #[test]
    fn sequence_is_reactive() {
        let mut b = TreeBuilder::new();
        let a = b.condition(Cond::A);
        let x = b.action(Act::X);
        let root = b.sequence("seq", vec![a, x]);
        let mut tree = b.build(root).unwrap();

        let mut s = Script::default();
        s.conds.insert(Cond::A, true);
        s.act(Act::X, &[Running]);
        assert_eq!(tree.tick(&mut s, 0.0), Running);
        assert_eq!(tree.tick(&mut s, 0.1), Running);
        assert_eq!(s.calls, vec![(Act::X, Phase::Start), (Act::X, Phase::Continue)]);

        // The guard flips: the running action is halted and not ticked.
        s.conds.insert(Cond::A, false);
        assert_eq!(tree.tick(&mut s, 0.2), Failure);
        assert_eq!(s.halted, vec![Act::X]);
        assert_eq!(s.calls.len(), 2);
    }

    #[test]
    fn fallback_preempts_lower_priority() {
        let mut b = TreeBuilder::new();
        let a = b.condition(Cond::A);
        let x = b.action(Act::X);
        let high = b.sequence("high", vec![a, x]);
        let y = b.action(Act::Y);
        let root = b.fallback("root", vec![high, y]);
        let mut tree = b.build(root).unwrap();

        let mut s = Script::default();
        s.act(Act::X, &[Running]);
        s.act(Act::Y, &[Running]);
        assert_eq!(tree.tick(&mut s, 0.0), Running);
        assert_eq!(tree.status(y), Some(Running));

        s.conds.insert(Cond::A, true);
        assert_eq!(tree.tick(&mut s, 0.1), Running);
        assert_eq!(s.halted, vec![Act::Y]);
        assert_eq!(tree.status(y), None);
        assert_eq!(tree.status(x), Some(Running));
    }

    #[test]
    fn retry_reticks_then_latches_until_halted() {
        let mut b = TreeBuilder::new();
        let x = b.action(Act::X);
        let retry = b.retry("retry", 2, x);
        let a = b.condition(Cond::A);
        let root = b.sequence("root", vec![a, retry]);
        let mut tree = b.build(root).unwrap();

        let mut s = Script::default();
        s.conds.insert(Cond::A, true);
        s.act(Act::X, &[Failure]);
        // Two retries: the third failure exhausts the budget.
        assert_eq!(tree.tick(&mut s, 0.0), Running);
        assert_eq!(tree.tick(&mut s, 0.1), Running);
        assert_eq!(tree.tick(&mut s, 0.2), Failure);
        assert_eq!(s.calls.len(), 3);
        assert!(s.calls.iter().all(|(_, p)| *p == Phase::Start));
    }

    #[test]
    fn exhausted_retry_stays_failed_while_parent_runs() {
        let mut b = TreeBuilder::new();
        let x = b.action(Act::X);
        let retry = b.retry("retry", 0, x);
        let y = b.action(Act::Y);
        let root = b.fallback("root", vec![retry, y]);
        let mut tree = b.build(root).unwrap();

        let mut s = Script::default();
        s.act(Act::X, &[Failure]);
        s.act(Act::Y, &[Running]);
        assert_eq!(tree.tick(&mut s, 0.0), Running);
        assert_eq!(tree.tick(&mut s, 0.1), Running);
        assert_eq!(tree.tick(&mut s, 0.2), Running);
        // X was tried once; Y keeps the tree running.
        assert_eq!(s.calls.iter().filter(|(a, _)| *a == Act::X).count(), 1);
    }

    #[test]
    fn halting_a_subtree_leaves_siblings_running() {
        let mut b = TreeBuilder::new();
        let x = b.action(Act::X);
        let y = b.action(Act::Y);
        let left = b.invert("left", x);
        let root = b.parallel("par", vec![left, y], 2, 2);
        let mut tree = b.build(root).unwrap();

        let mut s = Script::default();
        s.act(Act::X, &[Running]);
        s.act(Act::Y, &[Running]);
        tree.tick(&mut s, 0.0);
        tree.halt_subtree(left, &mut s);
        assert_eq!(s.halted, vec![Act::X]);
        assert_eq!(tree.status(x), None);
        assert_eq!(tree.status(y), Some(Running));

        tree.tick(&mut s, 0.1);
        assert_eq!(
            s.calls,
            vec![
                (Act::X, Phase::Start),
                (Act::Y, Phase::Start),
                (Act::X, Phase::Start),
                (Act::Y, Phase::Continue)
            ]
        );
    }

    #[test]
    fn timeout_counts_from_first_running() {
        let mut b = TreeBuilder::new();
        let x = b.action(Act::X);
        let root = b.timeout("timeout", 1.0, x);
        let mut tree = b.build(root).unwrap();

        let mut s = Script::default();
        s.act(Act::X, &[Running]);
        assert_eq!(tree.tick(&mut s, 10.0), Running);
        assert_eq!(tree.tick(&mut s, 10.9), Running);
        assert_eq!(tree.tick(&mut s, 11.0), Failure);
        assert_eq!(s.halted, vec![Act::X]);
        // The deadline is not stale after firing.
        assert_eq!(tree.tick(&mut s, 11.1), Running);
    }

    #[test]
    fn invert_swaps_outcomes() {
        let mut b = TreeBuilder::new();
        let a = b.condition(Cond::A);
        let root = b.invert("not_a", a);
        let mut tree = b.build(root).unwrap();
        let mut s = Script::default();
        assert_eq!(tree.tick(&mut s, 0.0), Success);
        s.conds.insert(Cond::A, true);
        assert_eq!(tree.tick(&mut s, 0.0), Failure);
    }

    #[test]
    fn parallel_uses_thresholds() {
        let mut b = TreeBuilder::new();
        let x = b.action(Act::X);
        let y = b.action(Act::Y);
        let a = b.condition(Cond::A);
        let root = b.parallel("par", vec![x, y, a], 2, 2);
        let mut tree = b.build(root).unwrap();

        let mut s = Script::default();
        s.conds.insert(Cond::A, true);
        s.act(Act::X, &[Running, Success]);
        s.act(Act::Y, &[Running]);
        assert_eq!(tree.tick(&mut s, 0.0), Running);
        assert_eq!(tree.tick(&mut s, 0.1), Success);
        // Y was still running when the threshold was met.
        assert_eq!(s.halted, vec![Act::Y]);
    }

    #[test]
    fn finished_parallel_children_are_not_reticked() {
        let mut b = TreeBuilder::new();
        let x = b.action(Act::X);
        let y = b.action(Act::Y);
        let root = b.parallel("par", vec![x, y], 2, 1);
        let mut tree = b.build(root).unwrap();

        let mut s = Script::default();
        s.act(Act::X, &[Success]);
        s.act(Act::Y, &[Running, Running, Success]);
        assert_eq!(tree.tick(&mut s, 0.0), Running);
        assert_eq!(tree.tick(&mut s, 0.1), Running);
        assert_eq!(tree.tick(&mut s, 0.2), Success);
        assert_eq!(s.calls.iter().filter(|(a, _)| *a == Act::X).count(), 1);
    }
}
