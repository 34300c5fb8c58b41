//! End-to-end tests: a fleet of engines wired through an in-memory
//! broadcast transport, converging to conflict-free allocations.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use fleetcbba::{BundleMode, CBBAAlgorithm, CBBAConfig, Point, Pose, Task, TaskId};

type Mailbox = Rc<RefCell<Vec<Vec<u8>>>>;

/// Build a fully-connected fleet: every agent's send pushes to every other
/// agent's mailbox, and receive drains its own.
fn fleet(specs: &[(&str, Pose)], config: CBBAConfig) -> Vec<CBBAAlgorithm> {
    let mailboxes: Vec<Mailbox> = specs.iter().map(|_| Mailbox::default()).collect();

    specs
        .iter()
        .enumerate()
        .map(|(i, (id, pose))| {
            let peers: Vec<Mailbox> = mailboxes
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, mailbox)| mailbox.clone())
                .collect();
            let own = mailboxes[i].clone();

            let mut cbba = CBBAAlgorithm::new(
                *id,
                config.clone(),
                Some(Box::new(move |bytes: Vec<u8>| {
                    for peer in &peers {
                        peer.borrow_mut().push(bytes.clone());
                    }
                })),
                Some(Box::new(move || own.borrow_mut().drain(..).collect())),
            )
            .unwrap();

            cbba.update_pose(*pose);
            cbba.update_velocity(2.0);
            cbba
        })
        .collect()
}

fn run_rounds(agents: &mut [CBBAAlgorithm], rounds: usize) {
    for _ in 0..rounds {
        for agent in agents.iter_mut() {
            agent.tick(1.0);
        }
    }
}

/// Every claimed task is claimed by exactly one agent.
fn assert_conflict_free(agents: &[CBBAAlgorithm]) {
    let mut seen: HashSet<TaskId> = HashSet::new();
    for agent in agents {
        for task_id in agent.bundle() {
            assert!(
                seen.insert(task_id.clone()),
                "task {} claimed by more than one agent",
                task_id
            );
        }
    }
}

#[test]
fn contested_task_goes_to_the_better_placed_agent() {
    let mut agents = fleet(
        &[
            ("agent_a", Pose::new(0.0, 0.0, 0.0)),
            ("agent_b", Pose::new(10.0, 0.0, 0.0)),
        ],
        CBBAConfig::default(),
    );
    let task = Task::point("t1", Point::new(4.0, 0.0), 5.0);
    for agent in agents.iter_mut() {
        agent.add_task(task.clone());
    }

    run_rounds(&mut agents, 4);

    // agent_a is 4 m away, agent_b 6 m: agent_a's marginal gain wins
    assert_eq!(agents[0].bundle(), ["t1".to_string()]);
    assert!(agents[1].bundle().is_empty());
    for agent in &agents {
        assert_eq!(agent.agent().winner("t1"), "agent_a");
        assert!(agent.has_converged());
    }
}

#[test]
fn overlapping_agents_partition_the_field() {
    let config = CBBAConfig::default()
        .with_max_bundle_size(2)
        .with_bundle_mode(BundleMode::Full);
    let mut agents = fleet(
        &[
            ("agent_a", Pose::new(0.0, 0.0, 0.0)),
            ("agent_b", Pose::new(60.0, 0.0, 0.0)),
        ],
        config,
    );

    let tasks = [
        Task::point("t10", Point::new(10.0, 0.0), 5.0),
        Task::point("t20", Point::new(20.0, 0.0), 5.0),
        Task::point("t40", Point::new(40.0, 0.0), 5.0),
        Task::point("t50", Point::new(50.0, 0.0), 5.0),
    ];
    for agent in agents.iter_mut() {
        for task in &tasks {
            agent.add_task(task.clone());
        }
    }

    run_rounds(&mut agents, 8);

    assert_conflict_free(&agents);

    // All four tasks are claimed: two per agent
    let claimed: usize = agents.iter().map(|a| a.bundle().len()).sum();
    assert_eq!(claimed, 4);
    assert_eq!(agents[0].bundle().len(), 2);
    assert_eq!(agents[1].bundle().len(), 2);

    // Both replicas agree on every winner
    for task in &tasks {
        assert_eq!(
            agents[0].agent().winner(task.id()),
            agents[1].agent().winner(task.id()),
            "winner tables diverge for {}",
            task.id()
        );
    }

    for agent in &agents {
        assert!(agent.has_converged());
    }
}

#[test]
fn convergence_is_stable_under_quiescence() {
    let mut agents = fleet(
        &[
            ("agent_a", Pose::new(0.0, 0.0, 0.0)),
            ("agent_b", Pose::new(200.0, 0.0, 0.0)),
        ],
        CBBAConfig::default(),
    );
    for agent in agents.iter_mut() {
        agent.add_task(Task::point("t1", Point::new(5.0, 0.0), 2.0));
        agent.add_task(Task::point("t2", Point::new(205.0, 0.0), 2.0));
    }

    run_rounds(&mut agents, 6);
    assert!(agents.iter().all(|a| a.has_converged()));

    // No new external input: the fixed point must hold from here on
    for _ in 0..5 {
        run_rounds(&mut agents, 1);
        assert!(agents.iter().all(|a| a.has_converged()));
    }
    assert_conflict_free(&agents);
}

#[test]
fn losing_a_mid_path_task_releases_the_suffix() {
    // agent_a greedily chains three tasks; a later, closer rival takes the
    // middle one, which must strip the suffix off agent_a's path.
    let mut agents = fleet(
        &[
            ("agent_a", Pose::new(0.0, 0.0, 0.0)),
            ("agent_b", Pose::new(50.0, -39.0, 0.0)),
        ],
        CBBAConfig::default().with_max_bundle_size(3),
    );
    let tasks = [
        Task::point("t1", Point::new(10.0, 0.0), 5.0),
        Task::point("t2", Point::new(50.0, 0.0), 5.0),
        Task::point("t3", Point::new(90.0, 0.0), 5.0),
    ];

    // agent_a builds its full chain alone first
    for task in &tasks {
        agents[0].add_task(task.clone());
    }
    for _ in 0..3 {
        agents[0].tick(1.0);
    }
    assert_eq!(
        agents[0].path(),
        ["t1".to_string(), "t2".to_string(), "t3".to_string()]
    );

    // Now the rival learns about the world and joins the exchange
    for task in &tasks {
        agents[1].add_task(task.clone());
    }
    run_rounds(&mut agents, 6);

    // agent_b sits 39 m from t2 and outbids agent_a's chained marginal;
    // t3's slot died with t2.
    assert_eq!(agents[0].bundle(), ["t1".to_string()]);
    assert_eq!(agents[1].bundle(), ["t2".to_string()]);
    for agent in &agents {
        assert_eq!(agent.agent().winner("t1"), "agent_a");
        assert_eq!(agent.agent().winner("t2"), "agent_b");
    }
    assert_conflict_free(&agents);
}

#[test]
fn completed_tasks_are_not_reallocated() {
    let mut agents = fleet(
        &[
            ("agent_a", Pose::new(0.0, 0.0, 0.0)),
            ("agent_b", Pose::new(20.0, 0.0, 0.0)),
        ],
        CBBAConfig::default(),
    );
    for agent in agents.iter_mut() {
        agent.add_task(Task::point("t1", Point::new(4.0, 0.0), 5.0));
    }

    run_rounds(&mut agents, 3);
    assert_eq!(agents[0].bundle(), ["t1".to_string()]);

    // The winner finishes the task
    agents[0].mark_task_completed("t1");
    run_rounds(&mut agents, 4);

    assert!(agents[0].bundle().is_empty());
    assert!(agents[1].bundle().is_empty());
    // The winner record survives so the fleet can see the wind-down
    assert_eq!(agents[0].agent().winner("t1"), "agent_a");
}

#[test]
fn three_agent_clusters_with_disjoint_reach() {
    let config = CBBAConfig::default()
        .with_max_bundle_size(2)
        .with_bundle_mode(BundleMode::Full);
    let mut agents = fleet(
        &[
            ("agent_a", Pose::new(0.0, 0.0, 0.0)),
            ("agent_b", Pose::new(300.0, 0.0, 0.0)),
            ("agent_c", Pose::new(600.0, 0.0, 0.0)),
        ],
        config,
    );

    let tasks = [
        Task::point("a1", Point::new(10.0, 0.0), 1.0),
        Task::point("a2", Point::new(20.0, 0.0), 1.0),
        Task::point("b1", Point::new(310.0, 0.0), 1.0),
        Task::point("b2", Point::new(320.0, 0.0), 1.0),
        Task::point("c1", Point::new(610.0, 0.0), 1.0),
        Task::point("c2", Point::new(620.0, 0.0), 1.0),
    ];
    for agent in agents.iter_mut() {
        for task in &tasks {
            agent.add_task(task.clone());
        }
    }

    run_rounds(&mut agents, 6);

    assert_conflict_free(&agents);
    for agent in &agents {
        assert_eq!(agent.bundle().len(), 2);
        assert!(agent.has_converged());
        // Gossip spread every assignment to every replica
        for task in &tasks {
            assert_ne!(agent.agent().winner(task.id()), "");
        }
    }
    assert_eq!(agents[0].agent().winner("a1"), "agent_a");
    assert_eq!(agents[1].agent().winner("b1"), "agent_b");
    assert_eq!(agents[2].agent().winner("c2"), "agent_c");
}
