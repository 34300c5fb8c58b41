//! Bundle construction: spatial pre-filter plus greedy marginal-gain
//! selection

use std::collections::HashSet;

use crate::cbba_debug;
use crate::config::{BundleMode, Metric};
use crate::consensus::agent::CBBAAgent;
use crate::consensus::bid::Bid;
use crate::consensus::scorer::TaskScorer;
use crate::spatial::SpatialIndex;
use crate::types::{MIN_SCORE, Score, TaskId};

/// Grows an agent's bundle by one task ([`BundleMode::Add`]) or up to
/// capacity ([`BundleMode::Full`]) per invocation.
///
/// Candidates are the tasks within the query radius of the agent's position,
/// intersected with the caller-supplied availability list. Each candidate is
/// scored at its optimal insertion position; the best one is claimed only if
/// the resulting bid beats the currently known winning bid for that task.
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    scorer: TaskScorer,
    query_radius: f64,
    mode: BundleMode,
}

impl BundleBuilder {
    /// Create a bundle builder
    ///
    /// # Arguments
    ///
    /// * `metric` - Scoring metric for marginal gains
    /// * `lambda` - Discount factor for the TDR metric
    /// * `query_radius` - Radius in metres for the spatial candidate filter
    /// * `mode` - One task per call, or fill to capacity
    pub fn new(metric: Metric, lambda: f64, query_radius: f64, mode: BundleMode) -> Self {
        Self {
            scorer: TaskScorer::new(metric, lambda),
            query_radius,
            mode,
        }
    }

    pub fn scorer(&self) -> &TaskScorer {
        &self.scorer
    }

    /// Grow an agent's bundle
    ///
    /// # Arguments
    ///
    /// * `agent` - Agent whose bundle, path, and bid tables to update
    /// * `index` - Task store answering the spatial pre-filter
    /// * `available_tasks` - Tasks that are not completed and not already
    ///   claimed by this agent
    ///
    /// # Returns
    ///
    /// true if at least one task was added
    pub fn build_bundle(
        &self,
        agent: &mut CBBAAgent,
        index: &SpatialIndex,
        available_tasks: &[TaskId],
    ) -> bool {
        match self.mode {
            BundleMode::Add => self.add_one_task(agent, index, available_tasks),
            BundleMode::Full => self.fill_bundle(agent, index, available_tasks) > 0,
        }
    }

    fn candidates(
        &self,
        agent: &CBBAAgent,
        index: &SpatialIndex,
        available_tasks: &[TaskId],
    ) -> Vec<TaskId> {
        let available: HashSet<&TaskId> = available_tasks.iter().collect();
        index
            .query_radius(&agent.pose.position, self.query_radius)
            .into_iter()
            .filter(|id| available.contains(id))
            .collect()
    }

    /// Best (task, score, position) among the candidates, or None when no
    /// candidate can be scored.
    fn find_best_task(
        &self,
        agent: &CBBAAgent,
        index: &SpatialIndex,
        candidates: &[TaskId],
    ) -> Option<(TaskId, Score, usize)> {
        let mut best: Option<(TaskId, Score, usize)> = None;

        for task_id in candidates {
            if agent.bundle.contains(task_id) || !index.has(task_id) {
                continue;
            }

            let (score, position) =
                self.scorer
                    .find_optimal_insertion(agent, task_id, &agent.path, index);
            if score <= MIN_SCORE {
                continue;
            }

            match &best {
                Some((_, best_score, _)) if score <= *best_score => {}
                _ => best = Some((task_id.clone(), score, position)),
            }
        }

        best
    }

    fn should_bid(&self, agent: &CBBAAgent, task_id: &str, score: Score) -> bool {
        let current = agent.winning_bid(task_id);
        if !current.is_valid() {
            return true;
        }
        let tentative = Bid::new(agent.id.clone(), score, agent.own_timestamp());
        tentative.outbids(&current)
    }

    fn add_one_task(
        &self,
        agent: &mut CBBAAgent,
        index: &SpatialIndex,
        available_tasks: &[TaskId],
    ) -> bool {
        if agent.bundle.is_full() {
            return false;
        }

        let candidates = self.candidates(agent, index, available_tasks);
        if candidates.is_empty() {
            return false;
        }

        let Some((task_id, score, position)) = self.find_best_task(agent, index, &candidates)
        else {
            return false;
        };

        if !self.should_bid(agent, &task_id, score) {
            return false;
        }

        agent.add_to_bundle(&task_id, score, position);
        cbba_debug!(
            "[{}] claimed {} at path position {} with bid {:.3}",
            agent.id,
            task_id,
            position,
            score
        );
        true
    }

    fn fill_bundle(
        &self,
        agent: &mut CBBAAgent,
        index: &SpatialIndex,
        available_tasks: &[TaskId],
    ) -> usize {
        let mut added = 0;
        let mut remaining: Vec<TaskId> = available_tasks.to_vec();

        while !agent.bundle.is_full() {
            if !self.add_one_task(agent, index, &remaining) {
                break;
            }
            remaining.retain(|id| !agent.bundle.contains(id));
            added += 1;
        }

        added
    }
}
