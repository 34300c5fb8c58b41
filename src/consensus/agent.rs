//! Per-agent CBBA state

use crate::consensus::bid::{AgentTimestamps, Bid, TaskBids, TaskWinners};
use crate::consensus::bundle::{Bundle, Path};
use crate::types::{AgentId, MIN_SCORE, NO_AGENT, Pose, Score, TaskId, Timestamp};

use std::collections::HashMap;

/// All mutable state the algorithm keeps for one agent.
///
/// The winners table is derived from the agent-id field of the winning bids
/// and is kept consistent through [`CBBAAgent::update_winning_bid`] and
/// [`CBBAAgent::reset_task`]; callers never write the two maps separately.
#[derive(Debug, Clone)]
pub struct CBBAAgent {
    pub id: AgentId,
    pub pose: Pose,
    pub velocity: f64,

    /// b: capacity-bounded claim list
    pub bundle: Bundle,
    /// p: execution order
    pub path: Path,
    /// y: best-known bid per task
    pub winning_bids: TaskBids,
    /// z: winner per task, derived from y
    pub winners: TaskWinners,
    /// c: this agent's own computed marginal gains
    pub local_bids: HashMap<TaskId, Score>,
    /// s: freshest known clock per agent
    pub timestamps: AgentTimestamps,

    pub converged: bool,
    previous_winners: TaskWinners,
}

impl CBBAAgent {
    /// Create agent state with an empty bundle and a zeroed own clock
    ///
    /// # Arguments
    ///
    /// * `id` - Unique identifier for this agent
    /// * `capacity` - Bundle capacity
    pub fn new(id: impl Into<AgentId>, capacity: usize) -> Self {
        let id = id.into();
        let mut timestamps = AgentTimestamps::new();
        timestamps.insert(id.clone(), 0.0);

        Self {
            id,
            pose: Pose::default(),
            velocity: 0.0,
            bundle: Bundle::new(capacity),
            path: Path::new(),
            winning_bids: TaskBids::new(),
            winners: TaskWinners::new(),
            local_bids: HashMap::new(),
            timestamps,
            converged: false,
            previous_winners: TaskWinners::new(),
        }
    }

    pub fn update_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    pub fn update_velocity(&mut self, velocity: f64) {
        self.velocity = velocity;
    }

    /// Claim a task: add it to the bundle, splice it into the path, and
    /// record the winning and local bids
    ///
    /// # Arguments
    ///
    /// * `task_id` - Task to claim
    /// * `score` - Marginal gain this agent computed for the task
    /// * `position` - Path position to insert at
    pub fn add_to_bundle(&mut self, task_id: &str, score: Score, position: usize) {
        self.bundle.add(task_id);
        self.path.insert(task_id, position);
        let own_ts = self.own_timestamp();
        self.update_winning_bid(task_id, Bid::new(self.id.clone(), score, own_ts));
        self.local_bids.insert(task_id.to_string(), score);
    }

    /// Drop a task from the bundle and path, leaving the bid and winner
    /// tables untouched (they track fleet-wide knowledge, not local claims).
    pub fn remove_from_bundle(&mut self, task_id: &str) {
        self.bundle.remove(task_id);
        self.path.remove(task_id);
    }

    /// Overwrite the winning bid for a task, keeping the winners table in
    /// sync.
    pub fn update_winning_bid(&mut self, task_id: &str, bid: Bid) {
        self.winners.insert(task_id.to_string(), bid.agent_id.clone());
        self.winning_bids.insert(task_id.to_string(), bid);
    }

    /// Mark a task unassigned and release any local claim on it.
    pub fn reset_task(&mut self, task_id: &str) {
        self.update_winning_bid(task_id, Bid::invalid());
        self.remove_from_bundle(task_id);
        self.local_bids.remove(task_id);
    }

    /// Get the winning bid for a task
    ///
    /// # Returns
    ///
    /// The best-known bid, or the invalid bid if none is recorded
    pub fn winning_bid(&self, task_id: &str) -> Bid {
        self.winning_bids.get(task_id).cloned().unwrap_or_default()
    }

    /// Get the winner for a task
    ///
    /// # Returns
    ///
    /// The winning agent id, or `NO_AGENT` if unassigned or unknown
    pub fn winner(&self, task_id: &str) -> AgentId {
        self.winners
            .get(task_id)
            .cloned()
            .unwrap_or_else(|| NO_AGENT.to_string())
    }

    pub fn local_bid(&self, task_id: &str) -> Score {
        self.local_bids.get(task_id).copied().unwrap_or(MIN_SCORE)
    }

    /// Get the freshest known clock value for an agent
    ///
    /// # Returns
    ///
    /// The recorded timestamp, or 0 if this agent was never heard from
    pub fn timestamp(&self, agent_id: &str) -> Timestamp {
        self.timestamps.get(agent_id).copied().unwrap_or(0.0)
    }

    pub fn update_timestamp(&mut self, agent_id: &str, ts: Timestamp) {
        self.timestamps.insert(agent_id.to_string(), ts);
    }

    pub fn set_own_timestamp(&mut self, ts: Timestamp) {
        self.timestamps.insert(self.id.clone(), ts);
    }

    pub fn own_timestamp(&self) -> Timestamp {
        self.timestamp(&self.id)
    }

    /// Compare the winners table against the last snapshot and latch the
    /// result into `converged`.
    pub fn check_convergence(&mut self) {
        self.converged = self.winners == self.previous_winners;
    }

    /// Capture the winners table for the next convergence check.
    pub fn snapshot_winners(&mut self) {
        self.previous_winners = self.winners.clone();
    }
}
