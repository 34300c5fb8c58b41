//! Conflict resolution: the UPDATE / RESET / LEAVE rules
//!
//! On receipt of a neighbor snapshot the resolver merges clock knowledge,
//! then walks the union of both parties' known tasks and applies the CBBA
//! decision table per task. The table is commutative across independent
//! task ids, so resolution order within a message does not matter.

use std::collections::HashSet;

use crate::cbba_debug;
use crate::consensus::agent::CBBAAgent;
use crate::consensus::messages::CBBAMessage;
use crate::types::{NO_AGENT, TaskId};

#[derive(Debug, Clone, Default)]
pub struct ConsensusResolver;

impl ConsensusResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve conflicts based on neighbor messages
    ///
    /// # Arguments
    ///
    /// * `agent` - Agent whose state to update
    /// * `messages` - Decoded neighbor snapshots, applied in list order;
    ///   messages whose sender is `agent` itself are skipped
    pub fn resolve_conflicts(&self, agent: &mut CBBAAgent, messages: &[CBBAMessage]) {
        for msg in messages {
            // Broadcast transports may loop our own snapshot back to us
            if msg.sender_id == agent.id {
                continue;
            }
            self.process_message(agent, msg);
        }
    }

    fn process_message(&self, agent: &mut CBBAAgent, msg: &CBBAMessage) {
        self.merge_timestamps(agent, msg);

        let task_ids: HashSet<TaskId> = agent
            .winning_bids
            .keys()
            .chain(msg.winning_bids.keys())
            .cloned()
            .collect();

        for task_id in task_ids {
            self.resolve_task(agent, msg, &task_id);
        }
    }

    /// Merge clock knowledge. The sender's own entry comes from the message
    /// header; third-party entries are only ever upgraded, and our own entry
    /// is never touched.
    fn merge_timestamps(&self, agent: &mut CBBAAgent, msg: &CBBAMessage) {
        agent.update_timestamp(&msg.sender_id, msg.timestamp);

        for (other_id, ts) in &msg.timestamps {
            if *other_id == agent.id {
                continue;
            }
            if *ts > agent.timestamp(other_id) {
                agent.update_timestamp(other_id, *ts);
            }
        }
    }

    fn resolve_task(&self, agent: &mut CBBAAgent, msg: &CBBAMessage, task_id: &str) {
        let mine = agent.winning_bid(task_id);
        let theirs = msg.winning_bid(task_id);
        let my_winner = mine.agent_id.clone();
        let their_winner = theirs.agent_id.clone();

        // Neither side knows a winner, or only we do: keep what we have
        if their_winner == NO_AGENT {
            return;
        }

        // Only the sender knows a winner: adopt it
        if my_winner == NO_AGENT {
            agent.update_winning_bid(task_id, theirs);
            return;
        }

        // Agreement on the winner: adopt only fresher information
        if my_winner == their_winner {
            if theirs.timestamp > mine.timestamp {
                agent.update_winning_bid(task_id, theirs);
            }
            return;
        }

        // Disagreement: freshness first, then the auction ordering
        let adopt = if theirs.timestamp > mine.timestamp {
            true
        } else if mine.timestamp > theirs.timestamp {
            false
        } else {
            theirs.outbids(&mine)
        };

        if adopt {
            agent.update_winning_bid(task_id, theirs);
            if my_winner == agent.id {
                self.release_from(agent, task_id);
            }
        }
    }

    /// The prefix rule: losing the task at path position p invalidates every
    /// later entry's marginal score, so the whole suffix leaves the bundle
    /// and path. Winning-bid records of the suffix are kept; knowledge
    /// adopted by UPDATE in this same pass must survive.
    fn release_from(&self, agent: &mut CBBAAgent, task_id: &str) {
        let Some(position) = agent.path.position(task_id) else {
            return;
        };

        let released: Vec<TaskId> = agent.path.as_slice()[position..].to_vec();
        for id in &released {
            agent.bundle.remove(id);
        }
        agent.path.truncate_from(position);

        cbba_debug!(
            "[{}] lost {}, released suffix [{}]",
            agent.id,
            task_id,
            released.join(", ")
        );
    }
}
