//! Task representation: point tasks and geometric (row/swath) tasks

use serde::{Deserialize, Serialize};

use crate::types::{BoundingBox, Point, TaskId};

/// Padding applied to the bounding box of a point task, in metres.
const POINT_BBOX_PADDING: f64 = 5.0;

/// Padding applied to the head/tail envelope of a geometric task, in metres.
const SEGMENT_BBOX_PADDING: f64 = 1.0;

/// A unit of work at a location in the world.
///
/// A task is either a point task (single position) or a geometric task such
/// as a crop row or survey swath, described by a head and a tail point. For
/// geometric tasks the representative `position` is the segment midpoint.
/// Every task caches an axis-aligned bounding box for spatial indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    position: Point,
    head: Point,
    tail: Point,
    has_geometry: bool,
    duration: f64,
    completed: bool,
    bbox: BoundingBox,
}

impl Task {
    /// Create a point task at a single location.
    pub fn point(id: impl Into<TaskId>, position: Point, duration: f64) -> Self {
        Self {
            id: id.into(),
            position,
            head: position,
            tail: position,
            has_geometry: false,
            duration,
            completed: false,
            bbox: BoundingBox::from_point(&position, POINT_BBOX_PADDING),
        }
    }

    /// Create a geometric task spanning from `head` to `tail`.
    pub fn geometric(id: impl Into<TaskId>, head: Point, tail: Point, duration: f64) -> Self {
        Self {
            id: id.into(),
            position: Point::new((head.x + tail.x) / 2.0, (head.y + tail.y) / 2.0),
            head,
            tail,
            has_geometry: true,
            duration,
            completed: false,
            bbox: BoundingBox::from_points(&head, &tail, SEGMENT_BBOX_PADDING),
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Representative point: the location itself for point tasks, the
    /// midpoint for geometric tasks.
    pub fn position(&self) -> &Point {
        &self.position
    }

    pub fn head(&self) -> &Point {
        &self.head
    }

    pub fn tail(&self) -> &Point {
        &self.tail
    }

    pub fn has_geometry(&self) -> bool {
        self.has_geometry
    }

    /// Expected execution time in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = duration;
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn set_completed(&mut self, completed: bool) {
        self.completed = completed;
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Segment length: head-to-tail distance for geometric tasks, 0 for
    /// point tasks.
    pub fn length(&self) -> f64 {
        if self.has_geometry {
            self.head.distance_to(&self.tail)
        } else {
            0.0
        }
    }
}
