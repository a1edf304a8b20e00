use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;

use super::SearchContext;
use super::node::{NodeArena, NodeId, SearchNode};
use crate::infra::error::{PlannerError, Result};
use crate::infra::{Action, Position};
use crate::state::GridState;

/// One Monte Carlo search tree over the live agents of a state.
///
/// The tree is searched for one agent at a time. After the ensemble has
/// settled on that agent's action, [`advance`](Self::advance) moves the
/// decision node one level down and the subtree below it is reused.
pub struct SearchTree<'a> {
    pub(super) ctx: SearchContext<'a>,
    pub(super) arena: NodeArena,
    pub(super) live: Vec<usize>,
    pub(super) root_state: GridState,
    pub(super) horizon: usize,
    pub(super) rng: StdRng,
    decision: NodeId,
    decision_path: Vec<NodeId>,
    /// Actions already fixed for the current step, one per slot.
    prefix: Vec<Action>,
    decided: usize,
    expansions: usize,
}

impl<'a> SearchTree<'a> {
    pub fn new(ctx: SearchContext<'a>, state: &GridState, horizon: usize, seed: u64) -> Self {
        let mut arena = NodeArena::default();
        let root = arena.push(SearchNode::root(state.clone()));
        Self {
            ctx,
            arena,
            live: state.live_agents(),
            root_state: state.clone(),
            horizon,
            rng: StdRng::seed_from_u64(seed),
            decision: root,
            decision_path: vec![root],
            prefix: Vec::new(),
            decided: 0,
            expansions: 0,
        }
    }

    pub fn live_agents(&self) -> &[usize] {
        &self.live
    }

    /// Agent whose action the next [`search`](Self::search) decides.
    pub fn deciding_agent(&self) -> Option<usize> {
        self.live.get(self.decided).copied()
    }

    /// Nodes created by search iterations so far.
    pub fn expansions(&self) -> usize {
        self.expansions
    }

    pub fn num_nodes(&self) -> usize {
        self.arena.len()
    }

    /// Runs up to `num_expansions` iterations below the decision node, or
    /// fewer when the time budget runs out. Returns the iterations run.
    pub fn search(&mut self) -> Result<usize> {
        let Some(agent) = self.deciding_agent() else {
            return Ok(0);
        };

        let node = self.arena.get(self.decision);
        if self.admissible(&node.state, node.slot, &self.prefix).is_empty() {
            return Err(PlannerError::NoLegalAction { agent });
        }

        let started = Instant::now();
        let mut iterations = 0;
        while iterations < self.ctx.config.num_expansions {
            if let Some(budget) = self.ctx.config.time_budget
                && started.elapsed() >= budget
            {
                tracing::debug!(agent, iterations, "Search stopped by time budget");
                break;
            }
            self.iterate();
            iterations += 1;
        }

        if self.child_visits().iter().all(|&visits| visits == 0) {
            return Err(PlannerError::NoLegalAction { agent });
        }
        Ok(iterations)
    }

    /// Visit counts of the decision node's children, indexed by action.
    pub fn child_visits(&self) -> [u32; Action::COUNT] {
        self.arena.child_visits(self.decision)
    }

    /// Most visited action at the decision node. Ties go to the higher mean
    /// value, then to the lower action index.
    pub fn best_action(&self) -> Option<Action> {
        let node = self.arena.get(self.decision);
        let mut best: Option<(Action, u32, f64)> = None;
        for action in Action::ALL {
            let Some(id) = node.child(action) else {
                continue;
            };
            let child = self.arena.get(id);
            if child.visits == 0 {
                continue;
            }
            let value = self.edge_value(child);
            let better = match best {
                None => true,
                Some((_, visits, best_value)) => {
                    child.visits > visits || (child.visits == visits && value > best_value)
                }
            };
            if better {
                best = Some((action, child.visits, value));
            }
        }
        best.map(|(action, _, _)| action)
    }

    /// Commits `action` for the deciding agent. The child is created if this
    /// tree never tried it.
    pub fn advance(&mut self, action: Action) {
        let child = match self.arena.get(self.decision).child(action) {
            Some(child) => child,
            None => {
                let prefix = self.prefix.clone();
                self.expand(self.decision, action, &prefix)
            }
        };
        if self.arena.get(child).completes_step {
            self.prefix.clear();
        } else {
            self.prefix.push(action);
        }
        self.decision = child;
        self.decision_path.push(child);
        self.decided += 1;
    }

    fn iterate(&mut self) {
        let mut path = self.decision_path.clone();
        let mut partial = self.prefix.clone();
        let mut node_id = self.decision;
        let mut terminal = false;

        loop {
            if self.is_terminal(node_id) {
                terminal = true;
                break;
            }

            let actions = {
                let node = self.arena.get(node_id);
                self.admissible(&node.state, node.slot, &partial)
            };
            let untried: Vec<Action> = actions
                .iter()
                .copied()
                .filter(|action| self.arena.get(node_id).child(*action).is_none())
                .collect();

            if let Some(&action) = untried.choose(&mut self.rng) {
                let child = self.expand(node_id, action, &partial);
                self.expansions += 1;
                Self::extend_partial(&mut partial, self.arena.get(child), action);
                path.push(child);
                node_id = child;
                break;
            }

            let Some((action, child)) = self.select(node_id, &actions) else {
                terminal = true;
                break;
            };
            Self::extend_partial(&mut partial, self.arena.get(child), action);
            path.push(child);
            node_id = child;
        }

        let value = if terminal {
            self.terminal_value(node_id)
        } else {
            self.rollout(node_id, &partial)
        };
        self.backpropagate(&path, value);
    }

    fn extend_partial(partial: &mut Vec<Action>, child: &SearchNode, action: Action) {
        if child.completes_step {
            partial.clear();
        } else {
            partial.push(action);
        }
    }

    /// UCB1 over the children of `node_id` reachable by `actions`.
    fn select(&self, node_id: NodeId, actions: &[Action]) -> Option<(Action, NodeId)> {
        let node = self.arena.get(node_id);
        let log_parent = (node.visits.max(1) as f64).ln();
        let mut best: Option<(Action, NodeId, f64)> = None;

        for &action in actions {
            let Some(id) = node.child(action) else {
                continue;
            };
            let child = self.arena.get(id);
            let score = if child.visits == 0 {
                f64::INFINITY
            } else {
                self.edge_value(child)
                    + self.ctx.config.uct_c * (log_parent / child.visits as f64).sqrt()
            };
            if best.is_none_or(|(_, _, best_score)| score > best_score) {
                best = Some((action, id, score));
            }
        }

        best.map(|(action, id, _)| (action, id))
    }

    /// Value of taking the edge into `child`, seen from its parent.
    fn edge_value(&self, child: &SearchNode) -> f64 {
        if child.completes_step {
            child.reward + self.ctx.config.gamma * child.mean_value()
        } else {
            child.mean_value()
        }
    }

    fn expand(&mut self, parent: NodeId, action: Action, partial: &[Action]) -> NodeId {
        let child = {
            let node = self.arena.get(parent);
            if node.slot + 1 < self.live.len() {
                SearchNode::new(node.state.clone(), node.slot + 1, node.depth, 0.0, false)
            } else {
                let mut slot_actions = partial.to_vec();
                slot_actions.push(action);
                let next = self
                    .ctx
                    .grid
                    .apply(&node.state, &self.joint(&slot_actions), self.ctx.resolver);
                let reward = self.step_reward(&node.state, &next);
                SearchNode::new(next, 0, node.depth + 1, reward, true)
            }
        };
        let id = self.arena.push(child);
        self.arena.get_mut(parent).children[action.index()] = Some(id);
        id
    }

    fn backpropagate(&mut self, path: &[NodeId], value: f64) {
        let gamma = self.ctx.config.gamma;
        let mut ret = value;
        for &id in path.iter().rev() {
            let node = self.arena.get_mut(id);
            node.update(ret);
            if node.completes_step {
                ret = node.reward + gamma * ret;
            }
        }
    }

    fn is_terminal(&self, node_id: NodeId) -> bool {
        let node = self.arena.get(node_id);
        self.all_live_done(&node.state) || (node.slot == 0 && node.depth >= self.horizon)
    }

    fn terminal_value(&self, node_id: NodeId) -> f64 {
        self.shaping(&self.arena.get(node_id).state)
    }

    pub(super) fn shaping(&self, state: &GridState) -> f64 {
        self.ctx.config.heuristic_coef
            * self
                .ctx
                .heuristic
                .total_progress(&self.live, &self.root_state, state)
    }

    pub(super) fn all_live_done(&self, state: &GridState) -> bool {
        self.live.iter().all(|&agent| state.is_done(agent))
    }

    /// Actions of the agent in `slot` that the move limits and the collision
    /// rules admit, given the actions in `partial` for the earlier slots.
    pub(super) fn admissible(&self, state: &GridState, slot: usize, partial: &[Action]) -> Vec<Action> {
        let agent = self.live[slot];
        if state.is_done(agent) {
            return vec![Action::Stay];
        }

        let from = state.positions();
        let mut decided: Vec<Option<Position>> = from
            .iter()
            .enumerate()
            .map(|(other, pos)| state.is_done(other).then_some(*pos))
            .collect();
        for (earlier, action) in partial.iter().enumerate() {
            let other = self.live[earlier];
            decided[other] = Some(self.target(state, other, *action));
        }

        self.ctx
            .config
            .actions()
            .iter()
            .copied()
            .filter(|&action| {
                let target = from[agent].offset(action);
                if !self.ctx.grid.is_free(&target) {
                    // Without move limits a blocked move is a stay.
                    return !self.ctx.config.use_move_limits
                        && self.ctx.resolver.admits(from, &decided, agent, from[agent]);
                }
                self.ctx.resolver.admits(from, &decided, agent, target)
            })
            .collect()
    }

    fn target(&self, state: &GridState, agent: usize, action: Action) -> Position {
        let pos = state.position(agent);
        let target = pos.offset(action);
        if state.is_done(agent) || !self.ctx.grid.is_free(&target) {
            pos
        } else {
            target
        }
    }

    /// Full joint action from per-slot actions. Agents without a slot stay.
    pub(super) fn joint(&self, slot_actions: &[Action]) -> Vec<Action> {
        let mut joint = vec![Action::Stay; self.root_state.num_agents()];
        for (slot, action) in slot_actions.iter().enumerate() {
            joint[self.live[slot]] = *action;
        }
        joint
    }

    /// One unit per live agent that reached its goal in this transition.
    pub(super) fn step_reward(&self, before: &GridState, after: &GridState) -> f64 {
        self.live
            .iter()
            .filter(|&&agent| !before.is_done(agent) && after.is_done(agent))
            .count() as f64
    }
}
