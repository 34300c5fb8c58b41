//! # fleetcbba - distributed multi-agent task allocation
//!
//! fleetcbba implements the Consensus-Based Bundle Algorithm (CBBA) for
//! fleets of mobile robots. Each agent keeps a local view of which tasks
//! exist and which agent currently wins each task; periodic message exchange
//! converges the fleet to a conflict-free allocation with near-optimal
//! global utility, without any central coordinator.
//!
//! ## Modules
//!
//! - [`algorithm`] - Per-tick driver: build, broadcast, resolve, converge
//! - [`consensus`] - Bids, bundle construction, message codec, conflict resolution
//! - [`spatial`] - R-tree index over point and line-segment tasks
//! - [`task`] - Task model (point and geometric tasks)
//! - [`types`] - Identifiers, geometry, transport callbacks
//! - [`config`] - Engine configuration
//! - [`error`] - Error types
//! - [`logger`] - Tracing setup helpers
//!
//! ## Quick Start
//!
//! ```rust
//! use fleetcbba::{CBBAAlgorithm, CBBAConfig, Point, Pose, Task};
//!
//! let config = CBBAConfig::default().with_max_bundle_size(4);
//! let mut cbba = CBBAAlgorithm::new("rover_1", config, None, None).unwrap();
//!
//! cbba.update_pose(Pose::new(0.0, 0.0, 0.0));
//! cbba.update_velocity(2.0);
//! cbba.add_task(Task::point("t1", Point::new(10.0, 0.0), 5.0));
//! cbba.add_task(Task::geometric(
//!     "row_1",
//!     Point::new(20.0, 0.0),
//!     Point::new(60.0, 0.0),
//!     30.0,
//! ));
//!
//! // One allocation round; wire `send`/`receive` callbacks to exchange
//! // snapshots with the rest of the fleet.
//! cbba.tick(0.1);
//!
//! assert!(!cbba.bundle().is_empty());
//! assert_eq!(cbba.next_task().unwrap(), "t1");
//! ```

pub mod algorithm;
pub mod config;
pub mod consensus;
pub mod error;
pub mod logger;
pub mod spatial;
pub mod task;
pub mod types;

pub use algorithm::{CBBAAlgorithm, CBBAStats};
pub use config::{BundleMode, CBBAConfig, Metric};
pub use consensus::{
    AgentTimestamps, Bid, Bundle, BundleBuilder, CBBAAgent, CBBAMessage, ConsensusResolver, Path,
    TaskBids, TaskScorer, TaskWinners,
};
pub use error::Error;
pub use spatial::SpatialIndex;
pub use task::Task;
pub use types::{
    AgentId, BoundingBox, MIN_SCORE, NO_AGENT, Point, Pose, ReceiveCallback, Score, SendCallback,
    TaskId, Timestamp,
};
