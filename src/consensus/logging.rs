//! Logging helpers for the consensus core
//!
//! Everything logs under the `cbba` tracing target so hosts can filter the
//! algorithm chatter independently of their own output (e.g. `cbba=debug`).

use crate::consensus::agent::CBBAAgent;

#[macro_export]
macro_rules! cbba_info {
    ($($arg:tt)+) => {
        tracing::info!(target: "cbba", $($arg)+)
    }
}

#[macro_export]
macro_rules! cbba_debug {
    ($($arg:tt)+) => {
        tracing::debug!(target: "cbba", $($arg)+)
    }
}

/// Log an agent's bundle, path, and path score at the end of an iteration.
pub fn log_iteration_status(agent: &CBBAAgent, iteration: u64, total_score: f64) {
    cbba_info!(
        "[{}] iteration {}: bundle [{}] path [{}] score {:.2} converged {}",
        agent.id,
        iteration,
        agent.bundle.as_slice().join(", "),
        agent.path.as_slice().join(", "),
        total_score,
        agent.converged,
    );
}

/// Dump the winner table as this agent currently sees it.
pub fn log_assignment_table(agent: &CBBAAgent) {
    let mut entries: Vec<_> = agent.winners.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    cbba_info!("[{}] assignment table:", agent.id);
    for (task_id, winner) in entries {
        if winner.is_empty() {
            cbba_info!("  {}: unassigned", task_id);
        } else {
            cbba_info!("  {}: {}", task_id, winner);
        }
    }
}
