use crate::element::Element;
use crate::node::Node;
use std::collections::HashSet;

/// A leaves-first ordering of every node reachable from one root.
///
/// Each node appears exactly once, after all of its operands; the root is
/// last. The order stays valid across re-evaluations with new Parameter
/// values and only needs rebuilding when the graph itself changes.
#[derive(Clone, Debug)]
pub struct TopoOrder<T: Element> {
    nodes: Vec<Node<T>>,
}

impl<T: Element> TopoOrder<T> {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node<T>] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node<T>> {
        self.nodes.iter()
    }

    /// The node the order was built from.
    pub fn root(&self) -> Option<&Node<T>> {
        self.nodes.last()
    }

    /// Position of the node with identifier `id`, if it is part of the order.
    pub fn position(&self, id: u64) -> Option<usize> {
        self.nodes.iter().position(|n| n.id() == id)
    }
}

impl<'a, T: Element> IntoIterator for &'a TopoOrder<T> {
    type Item = &'a Node<T>;
    type IntoIter = std::slice::Iter<'a, Node<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Builds the topological order of the graph rooted at `root`.
///
/// Depth-first, post-order, with a visited set keyed on node identity so a
/// node shared by several parents is emitted once. Iterative, so deep chains
/// do not exhaust the stack.
pub fn build_topo<T: Element>(root: &Node<T>) -> TopoOrder<T> {
    let nodes = post_order(root, |_| true);
    log::debug!("topological sort from node {}: {} nodes", root.id(), nodes.len());
    TopoOrder { nodes }
}

/// Nodes below `root` (inclusive) that still lack a value, leaves first.
///
/// Traversal stops at nodes that already hold a value, so only the part of
/// the graph invalidated since the last evaluation is visited.
pub(crate) fn pending_order<T: Element>(root: &Node<T>) -> Vec<Node<T>> {
    post_order(root, |node| !node.has_value())
}

fn post_order<T: Element>(root: &Node<T>, descend: impl Fn(&Node<T>) -> bool) -> Vec<Node<T>> {
    let mut visited: HashSet<u64> = HashSet::new();
    let mut sorted = Vec::new();
    let mut stack: Vec<(Node<T>, bool)> = vec![(root.clone(), false)];

    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            sorted.push(node);
            continue;
        }
        if !visited.insert(node.id()) || !descend(&node) {
            continue;
        }
        let children = node.children();
        stack.push((node, true));
        for child in children.into_iter().rev() {
            if !visited.contains(&child.id()) {
                stack.push((child, false));
            }
        }
    }
    sorted
}

impl<T: Element> Node<T> {
    /// Topological order of the graph rooted at this node.
    pub fn topological_order(&self) -> TopoOrder<T> {
        build_topo(self)
    }
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;
