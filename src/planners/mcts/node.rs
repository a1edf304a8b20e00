use crate::infra::Action;
use crate::state::GridState;

/// Index of a node in its tree's arena.
pub type NodeId = usize;

/// Node of a factorized search tree.
///
/// A step is decided one live agent at a time: `slot` is the position of the
/// deciding agent in the tree's live-agent list. Nodes inside a step share
/// the step's `state`; the edge that completes a joint action carries the
/// step reward and leads to a node with the successor state and slot 0.
#[derive(Debug, Clone)]
pub struct SearchNode {
    pub state: GridState,
    pub slot: usize,
    /// Full steps between the tree root and `state`.
    pub depth: usize,
    /// Reward collected on the edge into this node.
    pub reward: f64,
    pub completes_step: bool,
    pub visits: u32,
    pub value_sum: f64,
    pub children: [Option<NodeId>; Action::COUNT],
}

impl SearchNode {
    pub fn root(state: GridState) -> Self {
        Self::new(state, 0, 0, 0.0, false)
    }

    pub fn new(state: GridState, slot: usize, depth: usize, reward: f64, completes_step: bool) -> Self {
        Self {
            state,
            slot,
            depth,
            reward,
            completes_step,
            visits: 0,
            value_sum: 0.0,
            children: [None; Action::COUNT],
        }
    }

    /// Running mean of the returns seen through this node.
    pub fn mean_value(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.value_sum / self.visits as f64
        }
    }

    pub fn child(&self, action: Action) -> Option<NodeId> {
        self.children[action.index()]
    }

    pub fn update(&mut self, value: f64) {
        self.visits += 1;
        self.value_sum += value;
    }
}

/// Contiguous node store. Parents reference children by id; nothing points
/// back up, so backpropagation walks an explicit path.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<SearchNode>,
}

impl NodeArena {
    pub fn push(&mut self, node: SearchNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn get(&self, id: NodeId) -> &SearchNode {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut SearchNode {
        &mut self.nodes[id]
    }

    pub(super) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Visits of each child of `id`, indexed by action.
    pub fn child_visits(&self, id: NodeId) -> [u32; Action::COUNT] {
        let mut visits = [0; Action::COUNT];
        for (slot, child) in self.nodes[id].children.iter().enumerate() {
            if let Some(child) = child {
                visits[slot] = self.nodes[*child].visits;
            }
        }
        visits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::Position;

    fn state() -> GridState {
        GridState::new(vec![Position::new(0, 0)], vec![false])
    }

    #[test]
    fn test_running_mean() {
        let mut node = SearchNode::root(state());
        assert_eq!(node.mean_value(), 0.0);
        node.update(1.0);
        node.update(0.0);
        node.update(2.0);
        assert_eq!(node.visits, 3);
        assert!((node.mean_value() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_arena_child_visits() {
        let mut arena = NodeArena::default();
        let root = arena.push(SearchNode::root(state()));
        let child = arena.push(SearchNode::new(state(), 0, 1, 0.0, true));
        arena.get_mut(root).children[Action::Down.index()] = Some(child);
        arena.get_mut(child).update(0.5);
        arena.get_mut(child).update(0.5);

        assert_eq!(arena.get(root).child(Action::Down), Some(child));
        assert_eq!(arena.child_visits(root), [0, 0, 2, 0, 0]);
        assert_eq!(arena.len(), 2);
    }
}
