//! Spatial index over tasks, backed by an R-tree
//!
//! The index is the authoritative owner of task records. All other
//! components reference tasks by id and look them up here on demand.

use std::collections::HashMap;

use rstar::{AABB, PointDistance, RStarInsertionStrategy, RTree, RTreeObject, RTreeParams};

use crate::task::Task;
use crate::types::{BoundingBox, Point, TaskId};

/// R-tree node parameters, fan-out 16.
struct NodeParams;

impl RTreeParams for NodeParams {
    const MIN_SIZE: usize = 4;
    const MAX_SIZE: usize = 16;
    const REINSERTION_COUNT: usize = 3;
    type DefaultInsertionStrategy = RStarInsertionStrategy;
}

/// Leaf entry: the task's cached bounding box plus the representative point
/// used for distance-ordered queries.
#[derive(Debug, Clone, PartialEq)]
struct IndexEntry {
    id: TaskId,
    position: Point,
    bbox: BoundingBox,
}

impl IndexEntry {
    fn from_task(task: &Task) -> Self {
        Self {
            id: task.id().clone(),
            position: *task.position(),
            bbox: *task.bbox(),
        }
    }
}

impl RTreeObject for IndexEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min_x, self.bbox.min_y],
            [self.bbox.max_x, self.bbox.max_y],
        )
    }
}

impl PointDistance for IndexEntry {
    // Distance is measured to the task's representative position, not to its
    // envelope. The envelope contains the position, so the envelope distance
    // remains a valid lower bound for tree pruning.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position.x - point[0];
        let dy = self.position.y - point[1];
        dx * dx + dy * dy
    }
}

/// Spatial index supporting k-NN, radius, and bounding-box queries over
/// point and line-segment tasks.
pub struct SpatialIndex {
    rtree: RTree<IndexEntry, NodeParams>,
    tasks: HashMap<TaskId, Task>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self {
            rtree: RTree::new_with_params(),
            tasks: HashMap::new(),
        }
    }

    /// Insert a task into the index
    ///
    /// Replaces any prior entry with the same id, including its R-tree
    /// envelope.
    ///
    /// # Arguments
    ///
    /// * `task` - Task to store; the index takes ownership of the record
    pub fn insert(&mut self, task: Task) {
        if let Some(old) = self.tasks.get(task.id()) {
            self.rtree.remove(&IndexEntry::from_task(old));
        }
        self.rtree.insert(IndexEntry::from_task(&task));
        self.tasks.insert(task.id().clone(), task);
    }

    /// Remove a task from the index
    ///
    /// # Arguments
    ///
    /// * `task_id` - Task to drop; a no-op if absent
    pub fn remove(&mut self, task_id: &str) {
        if let Some(task) = self.tasks.remove(task_id) {
            self.rtree.remove(&IndexEntry::from_task(&task));
        }
    }

    pub fn clear(&mut self) {
        self.rtree = RTree::new_with_params();
        self.tasks.clear();
    }

    /// Look up a task by id
    ///
    /// # Returns
    ///
    /// The task record if present, None otherwise
    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    pub fn get_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.get_mut(task_id)
    }

    pub fn has(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    /// Query the k nearest tasks to a point
    ///
    /// # Arguments
    ///
    /// * `position` - Query point
    /// * `k` - Maximum number of tasks to return
    ///
    /// # Returns
    ///
    /// Up to `k` task ids sorted by Euclidean distance from `position` to
    /// each task's representative position, closest first
    pub fn query_nearest(&self, position: &Point, k: usize) -> Vec<TaskId> {
        self.rtree
            .nearest_neighbor_iter(&[position.x, position.y])
            .take(k)
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Query all tasks within a radius of a point
    ///
    /// # Arguments
    ///
    /// * `position` - Center of the search circle
    /// * `radius` - Search radius in metres, boundary inclusive
    ///
    /// # Returns
    ///
    /// Ids of every task whose position lies within `radius` metres of
    /// `position`. Order unspecified.
    pub fn query_radius(&self, position: &Point, radius: f64) -> Vec<TaskId> {
        // Candidate pass over the envelope, then an exact distance filter:
        // a task's padded bbox can reach into the query box while its
        // position stays out of range.
        let envelope = AABB::from_corners(
            [position.x - radius, position.y - radius],
            [position.x + radius, position.y + radius],
        );
        self.rtree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|entry| position.distance_to(&entry.position) <= radius)
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Query all tasks whose bounding box intersects a box
    ///
    /// # Arguments
    ///
    /// * `bbox` - Axis-aligned query box
    ///
    /// # Returns
    ///
    /// Ids of every task whose cached bounding box intersects `bbox`
    pub fn query_box(&self, bbox: &BoundingBox) -> Vec<TaskId> {
        let envelope = AABB::from_corners([bbox.min_x, bbox.min_y], [bbox.max_x, bbox.max_y]);
        self.rtree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.id.clone())
            .collect()
    }

    pub fn all_ids(&self) -> Vec<TaskId> {
        self.tasks.keys().cloned().collect()
    }

    pub fn all_tasks(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn size(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn point_task(id: &str, x: f64, y: f64) -> Task {
        Task::point(id, Point::new(x, y), 1.0)
    }

    #[test]
    fn insert_get_remove() {
        let mut index = SpatialIndex::new();
        assert!(index.is_empty());

        index.insert(point_task("a", 0.0, 0.0));
        index.insert(point_task("b", 10.0, 10.0));
        assert_eq!(index.size(), 2);
        assert!(index.has("a"));
        assert!(index.get("b").is_some());
        assert!(index.get("c").is_none());

        index.remove("a");
        assert_eq!(index.size(), 1);
        assert!(!index.has("a"));

        // Removing an absent id is a no-op
        index.remove("a");
        assert_eq!(index.size(), 1);

        index.clear();
        assert!(index.is_empty());
        assert!(index.query_nearest(&Point::new(0.0, 0.0), 3).is_empty());
    }

    #[test]
    fn insert_replaces_prior_entry() {
        let mut index = SpatialIndex::new();
        index.insert(point_task("a", 0.0, 0.0));
        index.insert(point_task("a", 500.0, 500.0));
        assert_eq!(index.size(), 1);

        // The stale envelope must be gone: a query near the old location
        // finds nothing within range.
        assert!(index.query_radius(&Point::new(0.0, 0.0), 50.0).is_empty());
        let hits = index.query_radius(&Point::new(500.0, 500.0), 1.0);
        assert_eq!(hits, vec!["a".to_string()]);
    }

    #[test]
    fn nearest_orders_by_position_distance() {
        let mut index = SpatialIndex::new();
        index.insert(point_task("far", 100.0, 0.0));
        index.insert(point_task("near", 1.0, 0.0));
        index.insert(point_task("mid", 50.0, 0.0));

        let got = index.query_nearest(&Point::new(0.0, 0.0), 2);
        assert_eq!(got, vec!["near".to_string(), "mid".to_string()]);

        // k larger than the task count returns everything
        let all = index.query_nearest(&Point::new(0.0, 0.0), 10);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn nearest_agrees_with_brute_force() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut index = SpatialIndex::new();
        let mut positions = Vec::new();
        for i in 0..200 {
            let x = rng.gen_range(-500.0..500.0);
            let y = rng.gen_range(-500.0..500.0);
            positions.push((format!("t{}", i), Point::new(x, y)));
            index.insert(point_task(&format!("t{}", i), x, y));
        }

        for _ in 0..20 {
            let q = Point::new(rng.gen_range(-500.0..500.0), rng.gen_range(-500.0..500.0));
            let mut expected = positions.clone();
            expected.sort_by(|a, b| {
                q.distance_to(&a.1).partial_cmp(&q.distance_to(&b.1)).unwrap()
            });
            let expected: Vec<TaskId> = expected.into_iter().take(5).map(|(id, _)| id).collect();
            assert_eq!(index.query_nearest(&q, 5), expected);
        }
    }

    #[test]
    fn radius_is_exact_and_inclusive() {
        let mut index = SpatialIndex::new();
        index.insert(point_task("inside", 3.0, 4.0)); // distance 5
        index.insert(point_task("outside", 6.0, 8.0)); // distance 10
        // Its padded bbox overlaps the query box, but the position is too far
        index.insert(point_task("edge", 5.25, 0.0));

        let mut hits = index.query_radius(&Point::new(0.0, 0.0), 5.0);
        hits.sort();
        assert_eq!(hits, vec!["inside".to_string()]);

        // The boundary is inclusive
        let hits = index.query_radius(&Point::new(0.0, 0.0), 5.25);
        assert!(hits.contains(&"edge".to_string()));
    }

    #[test]
    fn box_query_uses_cached_bbox() {
        let mut index = SpatialIndex::new();
        index.insert(Task::geometric(
            "row",
            Point::new(0.0, 0.0),
            Point::new(40.0, 0.0),
            10.0,
        ));
        index.insert(point_task("p", 100.0, 100.0));

        // Query box touching only the padded envelope of the row
        let hits = index.query_box(&BoundingBox::new(40.5, 0.0, 60.0, 5.0));
        assert_eq!(hits, vec!["row".to_string()]);

        // Point task bbox has ±5 m padding
        let hits = index.query_box(&BoundingBox::new(104.0, 104.0, 110.0, 110.0));
        assert_eq!(hits, vec!["p".to_string()]);

        let hits = index.query_box(&BoundingBox::new(-50.0, -50.0, -40.0, -40.0));
        assert!(hits.is_empty());
    }

    #[test]
    fn geometric_tasks_query_by_midpoint() {
        let mut index = SpatialIndex::new();
        index.insert(Task::geometric(
            "row",
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            10.0,
        ));
        // Midpoint is (50, 0); a radius query around the head only reaches it
        // when the radius covers the midpoint.
        assert!(index.query_radius(&Point::new(0.0, 0.0), 10.0).is_empty());
        assert_eq!(index.query_radius(&Point::new(0.0, 0.0), 50.0).len(), 1);
    }
}
