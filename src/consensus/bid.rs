//! Bid records and the auction ordering

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{AgentId, MIN_SCORE, NO_AGENT, Score, TaskId, Timestamp};

/// An agent's bid on a task.
///
/// The timestamp records when the bid was placed (in the bidder's algorithm
/// time); it is used for freshness during consensus but never participates in
/// the auction ordering itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub agent_id: AgentId,
    pub score: Score,
    pub timestamp: Timestamp,
}

impl Default for Bid {
    fn default() -> Self {
        Self::invalid()
    }
}

impl Bid {
    pub fn new(agent_id: impl Into<AgentId>, score: Score, timestamp: Timestamp) -> Self {
        Self {
            agent_id: agent_id.into(),
            score,
            timestamp,
        }
    }

    /// The unassigned bid: no agent, minimum score.
    pub fn invalid() -> Self {
        Self {
            agent_id: NO_AGENT.to_string(),
            score: MIN_SCORE,
            timestamp: 0.0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.agent_id != NO_AGENT && self.score > MIN_SCORE
    }

    /// Strict auction ordering: does this bid beat `other`?
    ///
    /// An assigned bid beats an unassigned one; otherwise higher score wins;
    /// on equal score the lexicographically smaller agent id wins.
    pub fn outbids(&self, other: &Bid) -> bool {
        if self.agent_id == NO_AGENT && other.agent_id != NO_AGENT {
            return false;
        }
        if self.agent_id != NO_AGENT && other.agent_id == NO_AGENT {
            return true;
        }
        if self.score > other.score {
            return true;
        }
        if self.score == other.score {
            return self.agent_id < other.agent_id;
        }
        false
    }
}

/// Winning bid per task (y vector).
pub type TaskBids = HashMap<TaskId, Bid>;

/// Winning agent per task (z vector).
pub type TaskWinners = HashMap<TaskId, AgentId>;

/// Per-agent clock knowledge (s vector), for multi-hop freshness.
pub type AgentTimestamps = HashMap<AgentId, Timestamp>;
