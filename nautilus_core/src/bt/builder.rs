// nautilus_core/src/bt/builder.rs

use super::node::{Decorator, Node, NodeId};
use super::tree::BehaviorTree;
use crate::error::TreeError;

/// Builds a tree bottom-up: children are added first and their ids passed
/// to the parent. `build` checks the structure before handing out a tree.
#[derive(Debug)]
pub struct TreeBuilder<C, A> {
    nodes: Vec<Node<C, A>>,
}

impl<C, A> Default for TreeBuilder<C, A> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<C, A> TreeBuilder<C, A> {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: Node<C, A>) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn condition(&mut self, condition: C) -> NodeId {
        self.push(Node::Condition(condition))
    }

    pub fn action(&mut self, action: A) -> NodeId {
        self.push(Node::Action(action))
    }

    pub fn sequence(&mut self, name: &str, children: Vec<NodeId>) -> NodeId {
        self.push(Node::Sequence {
            name: name.to_string(),
            children,
        })
    }

    pub fn fallback(&mut self, name: &str, children: Vec<NodeId>) -> NodeId {
        self.push(Node::Fallback {
            name: name.to_string(),
            children,
        })
    }

    pub fn parallel(
        &mut self,
        name: &str,
        children: Vec<NodeId>,
        success_threshold: usize,
        failure_threshold: usize,
    ) -> NodeId {
        self.push(Node::Parallel {
            name: name.to_string(),
            children,
            success_threshold,
            failure_threshold,
        })
    }

    pub fn decorate(&mut self, name: &str, decorator: Decorator, child: NodeId) -> NodeId {
        self.push(Node::Decorator {
            name: name.to_string(),
            decorator,
            child,
        })
    }

    pub fn retry(&mut self, name: &str, retries: u32, child: NodeId) -> NodeId {
        self.decorate(name, Decorator::Retry { retries }, child)
    }

    pub fn timeout(&mut self, name: &str, seconds: f64, child: NodeId) -> NodeId {
        self.decorate(name, Decorator::Timeout { seconds }, child)
    }

    pub fn invert(&mut self, name: &str, child: NodeId) -> NodeId {
        self.decorate(name, Decorator::Invert, child)
    }

    /// Validates the structure and returns the tree rooted at `root`.
    ///
    /// Every child must have been added before its parent, which also rules
    /// out cycles. No node may have two parents and the root none.
    pub fn build(self, root: NodeId) -> Result<BehaviorTree<C, A>, TreeError> {
        if root >= self.nodes.len() {
            return Err(TreeError::NoRoot);
        }
        let mut parent: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        for (id, node) in self.nodes.iter().enumerate() {
            let children = node.children();
            if let Some(name) = node.name() {
                if children.is_empty() {
                    return Err(TreeError::EmptyComposite(name.to_string()));
                }
            }
            if let Node::Parallel {
                name,
                success_threshold,
                failure_threshold,
                ..
            } = node
            {
                let n = children.len();
                let bad = |t: usize| t == 0 || t > n;
                if bad(*success_threshold) || bad(*failure_threshold) {
                    return Err(TreeError::BadThreshold {
                        name: name.clone(),
                        success: *success_threshold,
                        failure: *failure_threshold,
                        children: n,
                    });
                }
            }
            for &child in children {
                if child >= id {
                    return Err(TreeError::DanglingChild(child));
                }
                if parent[child].replace(id).is_some() {
                    return Err(TreeError::SharedChild(child));
                }
            }
        }
        if parent[root].is_some() {
            return Err(TreeError::RootHasParent(root));
        }
        Ok(BehaviorTree::from_parts(self.nodes, root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Builder = TreeBuilder<u8, u8>;

    #[test]
    fn valid_tree_builds() {
        let mut b = Builder::new();
        let a = b.condition(1);
        let x = b.action(2);
        let r = b.retry("retry", 3, x);
        let root = b.sequence("root", vec![a, r]);
        let tree = b.build(root).unwrap();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.root(), root);
    }

    #[test]
    fn forward_reference_is_dangling() {
        let mut b = Builder::new();
        let root = b.sequence("root", vec![1]);
        b.action(0);
        assert_eq!(b.build(root).unwrap_err(), TreeError::DanglingChild(1));
    }

    #[test]
    fn shared_child_is_rejected() {
        let mut b = Builder::new();
        let x = b.action(0);
        let left = b.invert("left", x);
        let right = b.invert("right", x);
        let root = b.fallback("root", vec![left, right]);
        assert_eq!(b.build(root).unwrap_err(), TreeError::SharedChild(x));
    }

    #[test]
    fn empty_composite_is_rejected() {
        let mut b = Builder::new();
        let root = b.sequence("empty", vec![]);
        assert_eq!(
            b.build(root).unwrap_err(),
            TreeError::EmptyComposite("empty".into())
        );
    }

    #[test]
    fn parallel_thresholds_must_fit() {
        let mut b = Builder::new();
        let x = b.action(0);
        let y = b.action(1);
        let root = b.parallel("par", vec![x, y], 3, 1);
        assert!(matches!(
            b.build(root),
            Err(TreeError::BadThreshold { children: 2, .. })
        ));
    }

    #[test]
    fn root_must_be_top_level() {
        let mut b = Builder::new();
        let x = b.action(0);
        b.invert("inv", x);
        assert_eq!(b.build(x).unwrap_err(), TreeError::RootHasParent(x));
        assert_eq!(Builder::new().build(0).unwrap_err(), TreeError::NoRoot);
    }
}
