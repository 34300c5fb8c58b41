//! Core identifier and geometry types shared across the crate

use serde::{Deserialize, Serialize};

/// Unique identifier for an agent/robot.
///
/// Treated as an opaque byte sequence on the wire.
pub type AgentId = String;

/// Unique identifier for a task.
pub type TaskId = String;

/// Score/utility value for tasks. Higher is better.
pub type Score = f64;

/// Timestamp for the consensus protocol, in seconds of algorithm time.
pub type Timestamp = f64;

/// Sentinel agent id meaning "unassigned".
pub const NO_AGENT: &str = "";

/// Minimum score value, used for unassigned/invalid bids.
/// Any legitimate bid score is strictly greater than this.
pub const MIN_SCORE: Score = -1e20;

/// 2D point in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// 2D pose: position plus heading in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub heading: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            position: Point::new(x, y),
            heading,
        }
    }
}

/// Axis-aligned bounding box for spatial indexing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Bounding box around a single point, expanded by `padding` metres.
    pub fn from_point(p: &Point, padding: f64) -> Self {
        Self::new(p.x - padding, p.y - padding, p.x + padding, p.y + padding)
    }

    /// Bounding box covering two points (e.g. a line segment), expanded by
    /// `padding` metres.
    pub fn from_points(p1: &Point, p2: &Point, padding: f64) -> Self {
        Self::new(
            p1.x.min(p2.x) - padding,
            p1.y.min(p2.y) - padding,
            p1.x.max(p2.x) + padding,
            p1.y.max(p2.y) + padding,
        )
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(other.min_x > self.max_x
            || other.max_x < self.min_x
            || other.min_y > self.max_y
            || other.max_y < self.min_y)
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Callback for broadcasting a serialized message to all neighbors.
///
/// The host implements this on top of its own communication system; the core
/// invokes it once per tick, fire-and-forget.
pub type SendCallback = Box<dyn FnMut(Vec<u8>)>;

/// Callback draining messages received since the last call.
///
/// Returns zero or more opaque byte blobs; the core decodes them and drops
/// malformed ones silently.
pub type ReceiveCallback = Box<dyn FnMut() -> Vec<Vec<u8>>>;
