use smallvec::SmallVec;
use tracing::trace;

use super::TreeNode;

type Condition<'a, N> = Box<dyn Fn(&N) -> bool + 'a>;

/// Depth-first pre-order walk over a forest of [`TreeNode`]s.
///
/// The position is an explicit path of child indices, so the walk can be
/// paused, resumed and reset without recursion.
pub struct Traverser<'a, N: TreeNode> {
    roots: &'a [N],
    path: SmallVec<[usize; 8]>,
    nodes: SmallVec<[&'a N; 8]>,
    exhausted: bool,
    node_yield_condition: Condition<'a, N>,
    traverse_children_condition: Condition<'a, N>,
}

impl<N: TreeNode> std::fmt::Debug for Traverser<'_, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Traverser")
            .field("roots", &self.roots.len())
            .field("path", &self.path)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl<'a, N: TreeNode> Traverser<'a, N> {
    /// Visits and yields every node.
    #[must_use]
    pub fn new(roots: &'a [N]) -> Self {
        Self {
            roots,
            path: SmallVec::new(),
            nodes: SmallVec::new(),
            exhausted: false,
            node_yield_condition: Box::new(|_| true),
            traverse_children_condition: Box::new(|_| true),
        }
    }

    /// Only nodes matching `condition` are returned by [`Self::advance`].
    #[must_use]
    pub fn yield_if(mut self, condition: impl Fn(&N) -> bool + 'a) -> Self {
        self.node_yield_condition = Box::new(condition);
        self
    }

    /// Children are visited only for nodes matching `condition`.
    #[must_use]
    pub fn descend_if(mut self, condition: impl Fn(&N) -> bool + 'a) -> Self {
        self.traverse_children_condition = Box::new(condition);
        self
    }

    /// Moves to the next yielded node. Returns `false` once the walk is over.
    pub fn advance(&mut self) -> bool {
        while self.step() {
            let yielded = self
                .current()
                .is_some_and(|node| (self.node_yield_condition)(node));
            if yielded {
                trace!(depth = ?self.depth(), "traverser yield");
                return true;
            }
        }
        false
    }

    fn step(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        let roots = self.roots;
        match self.nodes.last().copied() {
            None => {
                if let Some(first) = roots.first() {
                    self.path.push(0);
                    self.nodes.push(first);
                    return true;
                }
            }
            Some(node) => {
                let first_child = if (self.traverse_children_condition)(node) {
                    node.child(0)
                } else {
                    None
                };
                if let Some(child) = first_child {
                    self.path.push(0);
                    self.nodes.push(child);
                    return true;
                }
                while let Some(index) = self.path.pop() {
                    self.nodes.pop();
                    let sibling = match self.nodes.last().copied() {
                        Some(parent) => parent.child(index + 1),
                        None => roots.get(index + 1),
                    };
                    if let Some(sibling) = sibling {
                        self.path.push(index + 1);
                        self.nodes.push(sibling);
                        return true;
                    }
                }
            }
        }
        self.exhausted = true;
        false
    }

    /// Current node, `None` before the first advance and after the last.
    #[must_use]
    pub fn current(&self) -> Option<&'a N> {
        if self.exhausted {
            return None;
        }
        self.nodes.last().copied()
    }

    /// Depth of the current node, roots being at depth 0.
    #[must_use]
    pub fn depth(&self) -> Option<usize> {
        self.current().map(|_| self.path.len() - 1)
    }

    /// Child indices leading to the current node.
    #[must_use]
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn reset(&mut self) {
        self.path.clear();
        self.nodes.clear();
        self.exhausted = false;
    }

    /// Collects every yielded node, leaving the traverser reset.
    pub fn to_vec(&mut self) -> Vec<&'a N> {
        self.reset();
        let mut nodes = Vec::new();
        while self.advance() {
            if let Some(node) = self.current() {
                nodes.push(node);
            }
        }
        self.reset();
        nodes
    }
}
