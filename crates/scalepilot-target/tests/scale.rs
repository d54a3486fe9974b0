//! End-to-end scale and status flows against the in-memory provider.

use std::sync::Arc;
use std::time::Duration;

use scalepilot_cluster::{ClusterNode, InMemoryCluster, NodeStatus, PassthroughCluster};
use scalepilot_core::{
    Blueprint, ConfigMap, InstanceStatus, ScaleDirection, ScalingAction, TargetStatus,
};
use scalepilot_provider::testing::{CallKind, FakeProvider};
use scalepilot_target::{PoolState, Target, TargetError, UnitOutcome};

fn config() -> ConfigMap {
    ConfigMap::from([
        ("zone".to_string(), "fr-par-1".to_string()),
        ("commercial_type".to_string(), "DEV1-S".to_string()),
        ("tags".to_string(), "web".to_string()),
    ])
}

fn blueprint() -> Blueprint {
    Blueprint::from_config(&config()).unwrap()
}

fn target(fake: &Arc<FakeProvider>) -> Target {
    Target::with_backends(fake.clone(), Arc::new(PassthroughCluster))
}

// ── Scale ──────────────────────────────────────────────────────────

#[tokio::test]
async fn scale_up_creates_the_difference() {
    let fake = Arc::new(FakeProvider::new());
    fake.seed_running(&blueprint(), 3);

    let report = target(&fake)
        .scale(ScalingAction::new(ScaleDirection::Up, 5), &config())
        .await
        .unwrap();

    assert_eq!(report.observed, 3);
    assert_eq!(report.delta, 2);
    assert_eq!(report.workers, 2);
    assert_eq!(report.failed(), 0);
    assert_eq!(fake.count(CallKind::Create), 2);
    assert_eq!(fake.servers().len(), 5);
    assert!(fake.servers().iter().all(|s| s.status == InstanceStatus::Running));
}

#[tokio::test]
async fn created_instances_carry_tags_and_user_data() {
    let fake = Arc::new(FakeProvider::new());
    let mut config = config();
    config.insert("user_data".to_string(), "role=worker".to_string());

    let report = target(&fake)
        .scale(ScalingAction::new(ScaleDirection::Up, 1), &config)
        .await
        .unwrap();

    let UnitOutcome::Created { instance_id } = &report.outcomes[0] else {
        panic!("expected a created instance, got {:?}", report.outcomes[0]);
    };
    let server = fake.servers().into_iter().find(|s| &s.id == instance_id).unwrap();
    for tag in ["nomad", "client", "autoscaler", "web"] {
        assert!(server.tags.iter().any(|t| t == tag), "missing tag {tag}");
    }
    assert_eq!(fake.user_data(instance_id).unwrap()["role"], "worker");
}

#[tokio::test]
async fn scale_up_caps_workers_at_five() {
    let fake = Arc::new(FakeProvider::new().with_delay(Duration::from_millis(5)));

    let report = target(&fake)
        .scale(ScalingAction::new(ScaleDirection::Up, 11), &config())
        .await
        .unwrap();

    assert_eq!(report.workers, 5);
    assert_eq!(fake.count(CallKind::Create), 11);
    assert!(fake.max_in_flight() <= 5);
}

#[tokio::test]
async fn scale_down_with_cluster_drains_oldest_nodes() {
    let fake = Arc::new(FakeProvider::new());
    let servers: Vec<_> = (0..4)
        .map(|_| fake.seed_running_with_volumes(&blueprint(), 2))
        .collect();
    let cluster = Arc::new(InMemoryCluster::with_nodes(
        servers
            .iter()
            .enumerate()
            .map(|(i, s)| ClusterNode::ready(format!("node-{i}"), s.name.clone(), 100 - i as u64))
            .collect(),
    ));
    let target = Target::with_backends(fake.clone(), cluster.clone());

    let report = target
        .scale(ScalingAction::new(ScaleDirection::Down, 1), &config())
        .await
        .unwrap();

    // Oldest nodes have the lowest create index: node-3, then node-2, then node-1.
    assert_eq!(report.delta, -3);
    assert_eq!(report.workers, 3);
    let remaining: Vec<_> = fake.servers().into_iter().map(|s| s.id).collect();
    assert_eq!(remaining, vec![servers[0].id.clone()]);
    assert_eq!(fake.volumes().len(), 2);
    let nodes: Vec<_> = cluster.nodes().await.into_iter().map(|n| n.id).collect();
    assert_eq!(nodes, vec!["node-0"]);
}

#[tokio::test]
async fn direction_none_makes_no_provider_calls() {
    let fake = Arc::new(FakeProvider::new());
    fake.seed_running(&blueprint(), 2);

    let report = target(&fake)
        .scale(ScalingAction::new(ScaleDirection::None, 9), &config())
        .await
        .unwrap();

    assert!(report.outcomes.is_empty());
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn dry_run_makes_no_provider_calls() {
    let fake = Arc::new(FakeProvider::new());
    let target = target(&fake);

    for direction in [ScaleDirection::Up, ScaleDirection::Down, ScaleDirection::None] {
        let report = target
            .scale(ScalingAction::dry_run(direction), &config())
            .await
            .unwrap();
        assert!(report.dry_run);
    }

    assert!(fake.calls().is_empty());
    assert_eq!(target.state().get(), PoolState::Idle);
}

#[tokio::test]
async fn config_errors_surface_before_provider_calls() {
    let fake = Arc::new(FakeProvider::new());
    let mut config = config();
    config.remove("zone");

    let err = target(&fake)
        .scale(ScalingAction::new(ScaleDirection::Up, 2), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, TargetError::Config(_)));
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn inconsistent_direction_is_rejected_without_mutations() {
    let fake = Arc::new(FakeProvider::new());
    fake.seed_running(&blueprint(), 4);

    let err = target(&fake)
        .scale(ScalingAction::new(ScaleDirection::Up, 2), &config())
        .await
        .unwrap_err();

    assert!(matches!(err, TargetError::NegativeCount(-2)));
    assert_eq!(fake.mutations(), 0);
}

#[tokio::test]
async fn listing_failure_aborts_scale() {
    let fake = Arc::new(FakeProvider::new());
    fake.fail_on_page(1);

    let err = target(&fake)
        .scale(ScalingAction::new(ScaleDirection::Up, 2), &config())
        .await
        .unwrap_err();

    assert!(matches!(err, TargetError::Provider(_)));
    assert_eq!(fake.mutations(), 0);
}

#[tokio::test]
async fn unit_failures_are_reported_not_raised() {
    let fake = Arc::new(FakeProvider::new());
    fake.fail_on(CallKind::Action, None);

    let report = target(&fake)
        .scale(ScalingAction::new(ScaleDirection::Up, 3), &config())
        .await
        .unwrap();

    assert_eq!(report.failed(), 3);
    assert_eq!(fake.count(CallKind::Create), 3);
    assert!(report.outcomes.iter().all(|o| matches!(
        o,
        UnitOutcome::Failed { instance_id: Some(_), .. }
    )));
}

#[tokio::test]
async fn overlapping_scale_is_rejected() {
    let fake = Arc::new(FakeProvider::new());
    let target = target(&fake);
    target.state().set_active();

    let err = target
        .scale(ScalingAction::new(ScaleDirection::Up, 1), &config())
        .await
        .unwrap_err();

    assert!(matches!(err, TargetError::ScaleInProgress));
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn dry_run_and_none_succeed_while_scale_in_progress() {
    let fake = Arc::new(FakeProvider::new());
    let target = target(&fake);
    target.state().set_active();

    let dry = target
        .scale(ScalingAction::dry_run(ScaleDirection::Up), &config())
        .await
        .unwrap();
    let none = target
        .scale(ScalingAction::new(ScaleDirection::None, 3), &config())
        .await
        .unwrap();

    assert!(dry.dry_run);
    assert!(none.outcomes.is_empty());
    assert!(fake.calls().is_empty());
    // The running scale still owns the pool.
    assert_eq!(target.state().get(), PoolState::Active);
}

#[tokio::test]
async fn status_recovers_after_failed_scale_down_deletion() {
    let fake = Arc::new(FakeProvider::new());
    let servers = fake.seed_running(&blueprint(), 2);
    let cluster = Arc::new(InMemoryCluster::with_nodes(vec![
        ClusterNode::ready("n0", servers[0].name.clone(), 0),
        ClusterNode::ready("n1", servers[1].name.clone(), 1),
    ]));
    fake.fail_on(CallKind::Action, Some(&servers[0].id));
    let target = Target::with_backends(fake.clone(), cluster.clone());

    let report = target
        .scale(ScalingAction::new(ScaleDirection::Down, 0), &config())
        .await
        .unwrap();
    assert_eq!(report.failed(), 1);

    let status = target.status(&config()).await.unwrap();

    assert!(cluster.nodes().await.is_empty());
    assert!(status.ready);
    assert_eq!(status.count, 1);
}

#[tokio::test]
async fn workers_keep_running_after_deadline() {
    let fake = Arc::new(FakeProvider::new().with_delay(Duration::from_millis(40)));
    let target = target(&fake).with_deadline(Duration::from_millis(60));

    let err = target
        .scale(ScalingAction::new(ScaleDirection::Up, 1), &config())
        .await
        .unwrap_err();
    assert!(matches!(err, TargetError::DeadlineExceeded(_)));
    assert_eq!(target.state().get(), PoolState::Idle);

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(fake.count(CallKind::Create), 1);
    assert_eq!(fake.count(CallKind::Action), 1);
    assert!(fake.servers().iter().all(|s| s.status == InstanceStatus::Running));
}

#[tokio::test]
async fn deadline_returns_error_and_restores_idle() {
    let fake = Arc::new(FakeProvider::new().with_delay(Duration::from_millis(200)));
    let target = target(&fake).with_deadline(Duration::from_millis(50));

    let err = target
        .scale(ScalingAction::new(ScaleDirection::Up, 1), &config())
        .await
        .unwrap_err();

    assert!(matches!(err, TargetError::DeadlineExceeded(_)));
    assert_eq!(target.state().get(), PoolState::Idle);
}

// ── Status ─────────────────────────────────────────────────────────

#[tokio::test]
async fn status_while_active_makes_no_calls() {
    let fake = Arc::new(FakeProvider::new());
    let cluster = Arc::new(InMemoryCluster::new());
    let target = Target::with_backends(fake.clone(), cluster.clone());
    target.state().set_active();

    let status = target.status(&config()).await.unwrap();

    assert_eq!(status, TargetStatus::not_ready());
    assert!(fake.calls().is_empty());
    assert_eq!(cluster.calls(), 0);
}

#[tokio::test]
async fn status_during_running_scale_is_not_ready() {
    let fake = Arc::new(FakeProvider::new().with_delay(Duration::from_millis(50)));
    let target = Arc::new(target(&fake));

    let scaling = {
        let target = Arc::clone(&target);
        tokio::spawn(async move {
            target
                .scale(ScalingAction::new(ScaleDirection::Up, 2), &config())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let calls_before = fake.calls().len();

    let status = target.status(&config()).await.unwrap();

    assert!(!status.ready);
    assert_eq!(fake.calls().len(), calls_before);
    scaling.await.unwrap().unwrap();
    assert_eq!(target.state().get(), PoolState::Idle);
}

#[tokio::test]
async fn status_reports_count_and_readiness() {
    let fake = Arc::new(FakeProvider::new());
    let mut servers = fake.seed_running(&blueprint(), 2);
    let target = target(&fake);

    let status = target.status(&config()).await.unwrap();
    assert!(status.ready);
    assert_eq!(status.count, 2);

    servers[0].status = InstanceStatus::Starting;
    servers[0].id = "srv-booting".to_string();
    fake.seed(servers[0].clone());

    let status = target.status(&config()).await.unwrap();
    assert!(!status.ready);
    assert_eq!(status.count, 3);
}

#[tokio::test]
async fn status_defers_to_cluster_readiness() {
    let fake = Arc::new(FakeProvider::new());
    let servers = fake.seed_running(&blueprint(), 1);
    let cluster = Arc::new(InMemoryCluster::with_nodes(vec![ClusterNode::ready(
        "node-0",
        servers[0].name.clone(),
        1,
    )]));
    cluster.set_status("node-0", NodeStatus::Initializing).await;
    let target = Target::with_backends(fake.clone(), cluster);

    let status = target.status(&config()).await.unwrap();

    assert!(!status.ready);
    assert!(fake.calls().is_empty());
}
