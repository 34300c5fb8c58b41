//! Marginal-gain scoring for bundle construction

use crate::config::Metric;
use crate::consensus::agent::CBBAAgent;
use crate::consensus::bundle::Path;
use crate::spatial::SpatialIndex;
use crate::types::{MIN_SCORE, Point, Score};

/// Fallback speed in m/s when the agent reports a non-positive velocity.
const DEFAULT_VELOCITY: f64 = 2.0;

/// Computes path utilities under the configured metric.
///
/// Both metrics walk the path in execution order, accumulating travel time
/// (straight-line distance over velocity) plus task duration. Geometric
/// tasks are entered at their representative position and exited at their
/// tail. Stale path entries that are no longer in the spatial index are
/// skipped.
#[derive(Debug, Clone)]
pub struct TaskScorer {
    metric: Metric,
    lambda: f64,
}

impl TaskScorer {
    /// Create a scorer
    ///
    /// # Arguments
    ///
    /// * `metric` - Scoring metric to apply
    /// * `lambda` - Discount factor for the TDR metric, in (0, 1)
    pub fn new(metric: Metric, lambda: f64) -> Self {
        Self { metric, lambda }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Evaluate the score of an entire path
    ///
    /// # Arguments
    ///
    /// * `agent` - Agent whose pose and velocity anchor the first segment
    /// * `path` - Ordered task sequence to evaluate
    /// * `index` - Task store for resolving path entries
    ///
    /// # Returns
    ///
    /// The total path score under the configured metric; an empty path
    /// scores 0 under both metrics
    pub fn evaluate_path(&self, agent: &CBBAAgent, path: &Path, index: &SpatialIndex) -> Score {
        match self.metric {
            Metric::Rpt => self.rpt_score(agent, path, index),
            Metric::Tdr => self.tdr_score(agent, path, index),
        }
    }

    /// Compute the marginal gain of inserting a task into the path
    ///
    /// # Arguments
    ///
    /// * `agent` - Agent whose pose and velocity anchor the first segment
    /// * `task_id` - Task to insert
    /// * `path` - Current path
    /// * `position` - Insertion position in `[0, |path|]`
    /// * `index` - Task store for resolving path entries
    ///
    /// # Returns
    ///
    /// The score delta between the path with and without the task
    pub fn marginal_gain(
        &self,
        agent: &CBBAAgent,
        task_id: &str,
        path: &Path,
        position: usize,
        index: &SpatialIndex,
    ) -> Score {
        let mut candidate = path.clone();
        candidate.insert(task_id, position);
        self.evaluate_path(agent, &candidate, index) - self.evaluate_path(agent, path, index)
    }

    /// Find the insertion position maximizing marginal gain
    ///
    /// Tries every position in `[0, |path|]`; ties resolve to the smallest
    /// position index.
    ///
    /// # Arguments
    ///
    /// * `agent` - Agent whose pose and velocity anchor the first segment
    /// * `task_id` - Task to insert
    /// * `path` - Current path
    /// * `index` - Task store for resolving path entries
    ///
    /// # Returns
    ///
    /// Pair of (best marginal gain, best position)
    pub fn find_optimal_insertion(
        &self,
        agent: &CBBAAgent,
        task_id: &str,
        path: &Path,
        index: &SpatialIndex,
    ) -> (Score, usize) {
        let mut best_score = MIN_SCORE;
        let mut best_position = 0;

        for position in 0..=path.len() {
            let gain = self.marginal_gain(agent, task_id, path, position, index);
            if gain > best_score {
                best_score = gain;
                best_position = position;
            }
        }

        (best_score, best_position)
    }

    fn effective_velocity(agent: &CBBAAgent) -> f64 {
        if agent.velocity > 0.0 {
            agent.velocity
        } else {
            DEFAULT_VELOCITY
        }
    }

    fn travel_time(from: &Point, to: &Point, velocity: f64) -> f64 {
        from.distance_to(to) / velocity
    }

    fn rpt_score(&self, agent: &CBBAAgent, path: &Path, index: &SpatialIndex) -> Score {
        if path.is_empty() {
            return 0.0;
        }

        let velocity = Self::effective_velocity(agent);
        let mut total_time = 0.0;
        let mut current_pos = agent.pose.position;

        for task_id in path.iter() {
            let Some(task) = index.get(task_id) else {
                continue;
            };

            total_time += Self::travel_time(&current_pos, task.position(), velocity);
            total_time += task.duration();

            current_pos = if task.has_geometry() {
                *task.tail()
            } else {
                *task.position()
            };
        }

        -total_time
    }

    fn tdr_score(&self, agent: &CBBAAgent, path: &Path, index: &SpatialIndex) -> Score {
        if path.is_empty() {
            return 0.0;
        }

        let velocity = Self::effective_velocity(agent);
        let mut reward = 0.0;
        let mut elapsed = 0.0;
        let mut current_pos = agent.pose.position;

        for task_id in path.iter() {
            let Some(task) = index.get(task_id) else {
                continue;
            };

            elapsed += Self::travel_time(&current_pos, task.position(), velocity);
            elapsed += task.duration();
            reward += self.lambda.powf(elapsed);

            current_pos = if task.has_geometry() {
                *task.tail()
            } else {
                *task.position()
            };
        }

        reward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use approx::assert_relative_eq;

    fn setup(velocity: f64) -> (CBBAAgent, SpatialIndex) {
        let mut agent = CBBAAgent::new("r1", 10);
        agent.update_velocity(velocity);
        (agent, SpatialIndex::new())
    }

    fn path_of(ids: &[&str]) -> Path {
        let mut path = Path::new();
        for (i, id) in ids.iter().enumerate() {
            path.insert(*id, i);
        }
        path
    }

    #[test]
    fn empty_path_scores_zero() {
        let (agent, index) = setup(2.0);
        let path = Path::new();
        for metric in [Metric::Rpt, Metric::Tdr] {
            let scorer = TaskScorer::new(metric, 0.95);
            assert_relative_eq!(scorer.evaluate_path(&agent, &path, &index), 0.0);
        }
    }

    #[test]
    fn rpt_single_task() {
        // Agent at origin, 2 m/s; task 10 m away with 5 s duration:
        // 5 s travel + 5 s work = 10 s total.
        let (agent, mut index) = setup(2.0);
        index.insert(Task::point("t1", Point::new(10.0, 0.0), 5.0));
        let scorer = TaskScorer::new(Metric::Rpt, 0.95);
        assert_relative_eq!(
            scorer.evaluate_path(&agent, &path_of(&["t1"]), &index),
            -10.0
        );
    }

    #[test]
    fn rpt_linear_path() {
        let (agent, mut index) = setup(2.0);
        index.insert(Task::point("t1", Point::new(10.0, 0.0), 5.0));
        index.insert(Task::point("t2", Point::new(20.0, 0.0), 5.0));
        index.insert(Task::point("t3", Point::new(30.0, 0.0), 5.0));
        let scorer = TaskScorer::new(Metric::Rpt, 0.95);
        // Three 5 s hops and three 5 s tasks
        assert_relative_eq!(
            scorer.evaluate_path(&agent, &path_of(&["t1", "t2", "t3"]), &index),
            -30.0
        );
    }

    #[test]
    fn optimal_insertion_picks_middle() {
        let (agent, mut index) = setup(2.0);
        index.insert(Task::point("t1", Point::new(10.0, 0.0), 5.0));
        index.insert(Task::point("t3", Point::new(30.0, 0.0), 5.0));
        index.insert(Task::point("t2", Point::new(20.0, 0.0), 5.0));
        let scorer = TaskScorer::new(Metric::Rpt, 0.95);

        let path = path_of(&["t1", "t3"]);
        let (score, position) = scorer.find_optimal_insertion(&agent, "t2", &path, &index);
        assert_eq!(position, 1);
        // The detour costs nothing; only the 5 s duration is added.
        assert_relative_eq!(score, -5.0);
    }

    #[test]
    fn insertion_ties_resolve_to_smallest_position() {
        // All tasks at the same location: every insertion position yields the
        // same marginal gain, so position 0 must win.
        let (agent, mut index) = setup(2.0);
        index.insert(Task::point("t1", Point::new(0.0, 0.0), 5.0));
        index.insert(Task::point("t2", Point::new(0.0, 0.0), 5.0));
        index.insert(Task::point("new", Point::new(0.0, 0.0), 5.0));
        let scorer = TaskScorer::new(Metric::Rpt, 0.95);

        let (_, position) =
            scorer.find_optimal_insertion(&agent, "new", &path_of(&["t1", "t2"]), &index);
        assert_eq!(position, 0);
    }

    #[test]
    fn geometric_task_exits_at_tail() {
        let (agent, mut index) = setup(2.0);
        // Row from (10,0) to (20,0): entered at midpoint (15,0), exited at tail.
        index.insert(Task::geometric(
            "row",
            Point::new(10.0, 0.0),
            Point::new(20.0, 0.0),
            4.0,
        ));
        index.insert(Task::point("after", Point::new(30.0, 0.0), 0.0));
        let scorer = TaskScorer::new(Metric::Rpt, 0.95);

        // 15 m to the midpoint (7.5 s) + 4 s work + 10 m from tail (5 s)
        assert_relative_eq!(
            scorer.evaluate_path(&agent, &path_of(&["row", "after"]), &index),
            -16.5
        );
    }

    #[test]
    fn zero_velocity_falls_back_to_default() {
        let (agent, mut index) = setup(0.0);
        index.insert(Task::point("t1", Point::new(10.0, 0.0), 5.0));
        let scorer = TaskScorer::new(Metric::Rpt, 0.95);
        // 10 m at the 2 m/s fallback
        assert_relative_eq!(
            scorer.evaluate_path(&agent, &path_of(&["t1"]), &index),
            -10.0
        );
    }

    #[test]
    fn missing_task_is_skipped() {
        let (agent, mut index) = setup(2.0);
        index.insert(Task::point("t1", Point::new(10.0, 0.0), 5.0));
        let scorer = TaskScorer::new(Metric::Rpt, 0.95);
        // "ghost" is not in the index; the path scores as if it were absent
        assert_relative_eq!(
            scorer.evaluate_path(&agent, &path_of(&["ghost", "t1"]), &index),
            -10.0
        );
    }

    #[test]
    fn tdr_discounts_by_completion_time() {
        let (agent, mut index) = setup(2.0);
        index.insert(Task::point("t1", Point::new(10.0, 0.0), 5.0));
        index.insert(Task::point("t2", Point::new(20.0, 0.0), 5.0));
        let lambda: f64 = 0.95;
        let scorer = TaskScorer::new(Metric::Tdr, lambda);

        // Completion times are 10 s and 20 s
        let expected = lambda.powf(10.0) + lambda.powf(20.0);
        assert_relative_eq!(
            scorer.evaluate_path(&agent, &path_of(&["t1", "t2"]), &index),
            expected
        );

        // A more patient lambda scores higher
        let patient = TaskScorer::new(Metric::Tdr, 0.99);
        assert!(
            patient.evaluate_path(&agent, &path_of(&["t1", "t2"]), &index)
                > scorer.evaluate_path(&agent, &path_of(&["t1", "t2"]), &index)
        );
    }

    #[test]
    fn marginal_gain_matches_difference() {
        let (agent, mut index) = setup(2.0);
        index.insert(Task::point("t1", Point::new(10.0, 0.0), 5.0));
        index.insert(Task::point("t2", Point::new(20.0, 0.0), 5.0));
        let scorer = TaskScorer::new(Metric::Rpt, 0.95);

        let path = path_of(&["t1"]);
        let gain = scorer.marginal_gain(&agent, "t2", &path, 1, &index);
        // [t1] scores -10; [t1, t2] scores -20
        assert_relative_eq!(gain, -10.0);
    }
}
