//! Per-tick orchestration of the CBBA phases

use serde::Serialize;

use crate::config::CBBAConfig;
use crate::consensus::agent::CBBAAgent;
use crate::consensus::builder::BundleBuilder;
use crate::consensus::logging::log_iteration_status;
use crate::consensus::messages::CBBAMessage;
use crate::consensus::resolver::ConsensusResolver;
use crate::error::Error;
use crate::spatial::SpatialIndex;
use crate::task::Task;
use crate::types::{AgentId, MIN_SCORE, Pose, ReceiveCallback, SendCallback, TaskId};

/// Snapshot of engine counters for the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CBBAStats {
    pub iteration_count: u64,
    pub bundle_size: usize,
    pub total_tasks: usize,
    pub total_path_score: f64,
    pub converged: bool,
    pub decode_failures: u64,
}

/// One agent's task-allocation engine.
///
/// Each tick runs the CBBA phases in order: grow the bundle, broadcast a
/// state snapshot, drain and resolve inbound messages, then check for a
/// local fixed point. The engine owns the task store (via the spatial
/// index) and the agent's consensus state; the host feeds it pose, velocity,
/// tasks, and transport callbacks.
pub struct CBBAAlgorithm {
    agent_id: AgentId,
    config: CBBAConfig,
    send: Option<SendCallback>,
    receive: Option<ReceiveCallback>,

    agent: CBBAAgent,
    spatial_index: SpatialIndex,
    builder: BundleBuilder,
    resolver: ConsensusResolver,

    iteration_count: u64,
    current_time: f64,
    decode_failures: u64,
}

impl CBBAAlgorithm {
    /// Create a new engine instance
    ///
    /// # Arguments
    ///
    /// * `agent_id` - Unique identifier for this agent
    /// * `config` - Engine configuration
    /// * `send` - Broadcast callback invoked once per tick, or None to run
    ///   without a transport
    /// * `receive` - Inbound-message drain invoked once per tick, or None
    ///
    /// # Returns
    ///
    /// A ready engine, or `Error::InvalidConfig` if the configuration is
    /// rejected
    pub fn new(
        agent_id: impl Into<AgentId>,
        config: CBBAConfig,
        send: Option<SendCallback>,
        receive: Option<ReceiveCallback>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let agent_id = agent_id.into();

        Ok(Self {
            agent: CBBAAgent::new(agent_id.clone(), config.max_bundle_size),
            builder: BundleBuilder::new(
                config.metric,
                config.lambda,
                config.spatial_query_radius,
                config.bundle_mode,
            ),
            resolver: ConsensusResolver::new(),
            spatial_index: SpatialIndex::new(),
            agent_id,
            config,
            send,
            receive,
            iteration_count: 0,
            current_time: 0.0,
            decode_failures: 0,
        })
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    pub fn config(&self) -> &CBBAConfig {
        &self.config
    }

    pub fn update_pose(&mut self, pose: Pose) {
        self.agent.update_pose(pose);
    }

    pub fn update_velocity(&mut self, velocity: f64) {
        self.agent.update_velocity(velocity);
    }

    /// Add a task to the world
    ///
    /// # Arguments
    ///
    /// * `task` - Task to insert; replaces any prior task with the same id
    pub fn add_task(&mut self, task: Task) {
        self.spatial_index.insert(task);
    }

    /// Drop a task from the world, the bundle, and the path
    ///
    /// Bid and winner records persist until consensus or a reset pushes
    /// them out.
    ///
    /// # Arguments
    ///
    /// * `task_id` - Task to remove
    pub fn remove_task(&mut self, task_id: &str) {
        self.spatial_index.remove(task_id);
        self.agent.remove_from_bundle(task_id);
    }

    /// Flag a task completed and stop executing it
    ///
    /// The bid and winner records stay so neighbors can learn the task is
    /// being wound down.
    ///
    /// # Arguments
    ///
    /// * `task_id` - Task to mark; a no-op if unknown
    pub fn mark_task_completed(&mut self, task_id: &str) {
        if let Some(task) = self.spatial_index.get_mut(task_id) {
            task.set_completed(true);
            self.agent.remove_from_bundle(task_id);
        }
    }

    /// Run one allocation round: build, broadcast, resolve, check
    ///
    /// # Arguments
    ///
    /// * `dt` - Seconds to advance the algorithm clock by; the clock feeds
    ///   bid timestamps, so it must only move forward
    pub fn tick(&mut self, dt: f64) {
        self.iteration_count += 1;
        self.current_time += dt;
        self.agent.set_own_timestamp(self.current_time);

        self.bundle_building_phase();
        self.communication_phase();
        self.consensus_phase();
        self.convergence_phase();

        log_iteration_status(&self.agent, self.iteration_count, self.total_score());
    }

    fn bundle_building_phase(&mut self) {
        let available = self.available_tasks();
        self.builder
            .build_bundle(&mut self.agent, &self.spatial_index, &available);
    }

    fn communication_phase(&mut self) {
        let msg = self.create_message();
        if let Some(send) = &mut self.send {
            send(msg.encode());
        }
    }

    fn consensus_phase(&mut self) {
        let Some(receive) = &mut self.receive else {
            return;
        };

        let mut messages = Vec::new();
        for blob in receive() {
            match CBBAMessage::decode(&blob) {
                Ok(msg) => messages.push(msg),
                Err(_) => self.decode_failures += 1,
            }
        }

        self.resolver.resolve_conflicts(&mut self.agent, &messages);
    }

    fn convergence_phase(&mut self) {
        if !self.config.enable_convergence_detection {
            return;
        }
        self.agent.check_convergence();
        self.agent.snapshot_winners();
    }

    /// Known tasks that are not completed and not already claimed locally.
    fn available_tasks(&self) -> Vec<TaskId> {
        self.spatial_index
            .iter()
            .filter(|task| !task.is_completed() && !self.agent.bundle.contains(task.id()))
            .map(|task| task.id().clone())
            .collect()
    }

    fn create_message(&self) -> CBBAMessage {
        let mut msg = CBBAMessage::new(self.agent_id.clone(), self.current_time);
        msg.bundle = self.agent.bundle.as_slice().to_vec();
        msg.path = self.agent.path.as_slice().to_vec();
        msg.winning_bids = self.agent.winning_bids.clone();
        msg.winners = self.agent.winners.clone();
        msg.timestamps = self.agent.timestamps.clone();
        msg
    }

    /// Get this agent's current claims
    ///
    /// # Returns
    ///
    /// Task ids in the order they were won
    pub fn bundle(&self) -> &[TaskId] {
        self.agent.bundle.as_slice()
    }

    /// Get the execution order over the claimed tasks
    ///
    /// # Returns
    ///
    /// Task ids in planned execution order
    pub fn path(&self) -> &[TaskId] {
        self.agent.path.as_slice()
    }

    /// Get the next task to execute
    ///
    /// # Returns
    ///
    /// The head of the path, or None when nothing is claimed
    pub fn next_task(&self) -> Option<&TaskId> {
        self.agent.path.first()
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.spatial_index.get(task_id)
    }

    pub fn all_tasks(&self) -> Vec<Task> {
        self.spatial_index.all_tasks()
    }

    pub fn all_task_ids(&self) -> Vec<TaskId> {
        self.spatial_index.all_ids()
    }

    pub fn has_converged(&self) -> bool {
        self.agent.converged
    }

    /// Get the utility of the current path
    ///
    /// # Returns
    ///
    /// The sum of this agent's own marginal gains along the path, skipping
    /// entries with no recorded local bid
    pub fn total_score(&self) -> f64 {
        self.agent
            .path
            .iter()
            .map(|task_id| self.agent.local_bid(task_id))
            .filter(|score| *score > MIN_SCORE)
            .sum()
    }

    /// Get a snapshot of the engine counters
    ///
    /// # Returns
    ///
    /// Iteration count, bundle and task-store sizes, path score,
    /// convergence flag, and the decode-failure counter
    pub fn stats(&self) -> CBBAStats {
        CBBAStats {
            iteration_count: self.iteration_count,
            bundle_size: self.agent.bundle.len(),
            total_tasks: self.spatial_index.size(),
            total_path_score: self.total_score(),
            converged: self.agent.converged,
            decode_failures: self.decode_failures,
        }
    }

    /// Wipe all consensus state and counters. The agent id, configuration,
    /// and task store survive.
    pub fn reset(&mut self) {
        self.agent = CBBAAgent::new(self.agent_id.clone(), self.config.max_bundle_size);
        self.iteration_count = 0;
        self.current_time = 0.0;
        self.decode_failures = 0;
    }

    /// Direct access to the agent state, for hosts that introspect it.
    pub fn agent(&self) -> &CBBAAgent {
        &self.agent
    }

    /// Direct access to the task store.
    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.spatial_index
    }
}
