//! Bundle and path containers
//!
//! The bundle (b vector) is the capacity-bounded set of tasks an agent
//! claims, in the order they were won. The path (p vector) is the execution
//! order over the same tasks. They are maintained independently and may
//! transiently diverge inside the resolver; the driver restores the
//! containment invariant by the end of each tick.

use serde::{Deserialize, Serialize};

use crate::types::TaskId;

/// Insertion-ordered task set with a fixed capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    tasks: Vec<TaskId>,
    capacity: usize,
}

impl Bundle {
    pub fn new(capacity: usize) -> Self {
        Self {
            tasks: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a task. Returns false without modifying the bundle when the task
    /// is already present or the bundle is full.
    pub fn add(&mut self, task_id: impl Into<TaskId>) -> bool {
        let task_id = task_id.into();
        if self.contains(&task_id) || self.is_full() {
            return false;
        }
        self.tasks.push(task_id);
        true
    }

    /// Remove a task. Returns false if it was not present.
    pub fn remove(&mut self, task_id: &str) -> bool {
        if let Some(pos) = self.tasks.iter().position(|t| t == task_id) {
            self.tasks.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.iter().any(|t| t == task_id)
    }

    pub fn is_full(&self) -> bool {
        self.tasks.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_slice(&self) -> &[TaskId] {
        &self.tasks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TaskId> {
        self.tasks.iter()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}

/// Ordered execution sequence. Unbounded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Path {
    tasks: Vec<TaskId>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task at `position`, clamping to the end when out of range.
    pub fn insert(&mut self, task_id: impl Into<TaskId>, position: usize) {
        let position = position.min(self.tasks.len());
        self.tasks.insert(position, task_id.into());
    }

    /// Remove a task. Returns false if it was not present.
    pub fn remove(&mut self, task_id: &str) -> bool {
        if let Some(pos) = self.tasks.iter().position(|t| t == task_id) {
            self.tasks.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.iter().any(|t| t == task_id)
    }

    /// Position of a task in the execution order.
    pub fn position(&self, task_id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t == task_id)
    }

    /// Drop every entry from `position` onwards.
    pub fn truncate_from(&mut self, position: usize) {
        self.tasks.truncate(position);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn first(&self) -> Option<&TaskId> {
        self.tasks.first()
    }

    pub fn get(&self, index: usize) -> Option<&TaskId> {
        self.tasks.get(index)
    }

    pub fn as_slice(&self) -> &[TaskId] {
        &self.tasks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TaskId> {
        self.tasks.iter()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}
