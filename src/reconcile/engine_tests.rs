//! Scenario tests for the reconciler, driven through the recording mocks.

use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::config::{LabelMapping, SyncConfig};
use crate::test_utils::{MockBoards, MockPipelines, board, entity, sample_config};
use crate::types::{IssueNumber, PipelineId, RepoRef};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

const WORKSPACE: &str = "ws-main";

type TestReconciler = Reconciler<MockBoards, MockPipelines>;

fn setup_with(
    config: SyncConfig,
    github: MockBoards,
) -> (Arc<MockBoards>, Arc<MockPipelines>, TestReconciler) {
    let github = Arc::new(github);
    let zenhub = Arc::new(MockPipelines::new());
    let reconciler = Reconciler::new(
        Arc::new(config),
        Arc::clone(&github),
        Arc::clone(&zenhub),
        WORKSPACE,
    );
    (github, zenhub, reconciler)
}

fn setup(labels: &[&str]) -> (Arc<MockBoards>, Arc<MockPipelines>, TestReconciler) {
    setup_with(
        sample_config(),
        MockBoards::new().with_entity(entity("I_12", "web", 12, labels)),
    )
}

fn entity_event(action: EntityAction) -> GitHubEvent {
    GitHubEvent::Entity(EntityEvent {
        repo: RepoRef {
            name: "web".into(),
            database_id: 1000,
        },
        number: IssueNumber(12),
        action,
    })
}

fn field_edit(board: &str, field_name: &str, value: FieldValue) -> GitHubEvent {
    GitHubEvent::ProjectField(ProjectFieldEvent {
        board: BoardId::new(board),
        content: EntityId::new("I_12"),
        repository: Some("web".into()),
        field_name: field_name.into(),
        value,
    })
}

fn zenhub_event(kind: ZenHubEventKind) -> ZenHubEvent {
    ZenHubEvent {
        organization: "apify".into(),
        repo: "web".into(),
        number: IssueNumber(12),
        kind,
    }
}

fn transfer(to: &str) -> ZenHubEvent {
    zenhub_event(ZenHubEventKind::IssueTransfer {
        workspace_id: WORKSPACE.into(),
        to_pipeline: to.into(),
    })
}

fn ids(boards: &[&str]) -> Vec<BoardId> {
    boards.iter().map(|b| BoardId::new(*b)).collect()
}

fn applied(outcome: Outcome) -> BoardReport {
    match outcome {
        Outcome::Applied(report) => report,
        other => panic!("expected applied, got {other:?}"),
    }
}

fn status_writes(github: &MockBoards) -> Vec<(BoardId, String)> {
    let mut writes: Vec<_> = github
        .effects()
        .into_iter()
        .filter_map(|e| match e {
            BoardEffect::SetStatus {
                board, option_id, ..
            } => Some((board, option_id)),
            _ => None,
        })
        .collect();
    writes.sort();
    writes
}

// ─────────────────────────────────────────────────────────────────────────────
// GitHub Entity Events
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn opened_places_on_global_and_matching_boards_as_new() {
    let (github, zenhub, reconciler) = setup(&["team-x"]);

    let report = applied(
        reconciler
            .handle_github(entity_event(EntityAction::Opened))
            .await
            .unwrap(),
    );

    assert_eq!(report.applied, ids(&["B", "G"]));
    assert_eq!(
        status_writes(&github),
        vec![
            (BoardId::new("B"), "B_new".to_string()),
            (BoardId::new("G"), "G_new".to_string()),
        ]
    );
    assert_eq!(
        zenhub.moves(),
        vec![(ZenHubIssueId::new("zh-12"), PipelineId::new("p-new"))]
    );
}

#[tokio::test]
async fn opened_writes_global_board_once_when_a_mapping_targets_it() {
    let mut config = sample_config();
    config.label_mappings.push(LabelMapping {
        labels: vec!["team-x".into()],
        board: board("G", &["New Issues", "Closed"]),
    });
    let github = MockBoards::new().with_entity(entity("I_12", "web", 12, &["team-x"]));
    let (github, _zenhub, reconciler) = setup_with(config, github);

    let report = applied(
        reconciler
            .handle_github(entity_event(EntityAction::Opened))
            .await
            .unwrap(),
    );

    assert_eq!(report.applied, ids(&["B", "G"]));
    assert_eq!(
        status_writes(&github),
        vec![
            (BoardId::new("B"), "B_new".to_string()),
            (BoardId::new("G"), "G_new".to_string()),
        ]
    );
}

#[tokio::test]
async fn opened_suppresses_the_zenhub_echo() {
    let (github, _zenhub, reconciler) = setup(&[]);

    reconciler
        .handle_github(entity_event(EntityAction::Reopened))
        .await
        .unwrap();
    let writes_before = github.mutations().len();

    let outcome = reconciler.handle_zenhub(transfer("New Issues")).await.unwrap();

    assert_eq!(outcome, Outcome::Suppressed);
    assert_eq!(github.mutations().len(), writes_before);
}

#[tokio::test]
async fn closed_marks_every_board_without_pushing() {
    let (github, zenhub, reconciler) = setup(&["team-y"]);

    reconciler
        .handle_github(entity_event(EntityAction::Closed))
        .await
        .unwrap();

    assert_eq!(
        status_writes(&github),
        vec![
            (BoardId::new("G"), "G_closed".to_string()),
            (BoardId::new("Y"), "Y_closed".to_string()),
        ]
    );
    assert_eq!(zenhub.writes(), 0);
}

#[tokio::test]
async fn labeled_copies_global_state_to_new_boards() {
    let github = MockBoards::new()
        .with_entity(entity("I_12", "web", 12, &["team-x", "team-y"]))
        .with_memberships(&["G"], "I_12")
        .with_item_state(ItemState {
            status: Some("In Progress".into()),
            estimate: Some(3.0),
        });
    let (github, zenhub, reconciler) = setup_with(sample_config(), github);

    let report = applied(
        reconciler
            .handle_github(entity_event(EntityAction::Labeled))
            .await
            .unwrap(),
    );

    assert_eq!(report.applied, ids(&["B", "P", "Y"]));
    // P has no "In Progress" option and only gets the estimate.
    assert_eq!(
        status_writes(&github),
        vec![
            (BoardId::new("B"), "B_progress".to_string()),
            (BoardId::new("Y"), "Y_progress".to_string()),
        ]
    );
    assert_eq!(
        github.count(|e| matches!(e, BoardEffect::SetEstimate { value, .. } if *value == 3.0)),
        3
    );
    assert_eq!(github.count(|e| matches!(e, BoardEffect::AddToBoard { board, .. } if board.as_str() == "G")), 0);
    assert!(zenhub.effects().is_empty());
}

#[tokio::test]
async fn labeled_without_global_item_defaults_to_new() {
    let github = MockBoards::new().with_entity(entity("I_12", "web", 12, &["team-x"]));
    let (github, _zenhub, reconciler) = setup_with(sample_config(), github);

    reconciler
        .handle_github(entity_event(EntityAction::Labeled))
        .await
        .unwrap();

    assert_eq!(github.count(|e| matches!(e, BoardEffect::GetItemState { .. })), 0);
    assert!(status_writes(&github).contains(&(BoardId::new("B"), "B_new".to_string())));
}

#[tokio::test]
async fn labeled_when_already_everywhere_writes_nothing() {
    let github = MockBoards::new()
        .with_entity(entity("I_12", "web", 12, &["team-x"]))
        .with_memberships(&["G", "B"], "I_12");
    let (github, _zenhub, reconciler) = setup_with(sample_config(), github);

    let report = applied(
        reconciler
            .handle_github(entity_event(EntityAction::Labeled))
            .await
            .unwrap(),
    );

    assert_eq!(report, BoardReport::default());
    assert!(github.mutations().is_empty());
}

#[tokio::test]
async fn labeled_copies_are_not_relayed_back() {
    let github = MockBoards::new()
        .with_entity(entity("I_12", "web", 12, &["team-x"]))
        .with_memberships(&["G"], "I_12")
        .with_item_state(ItemState {
            status: Some("In Progress".into()),
            estimate: Some(3.0),
        });
    let (github, zenhub, reconciler) = setup_with(sample_config(), github);

    reconciler
        .handle_github(entity_event(EntityAction::Labeled))
        .await
        .unwrap();
    let writes_after_copy = github.mutations().len();

    let status_echo = reconciler
        .handle_github(field_edit(
            "B",
            "Status",
            FieldValue::SingleSelect(Some("In Progress".into())),
        ))
        .await
        .unwrap();
    let estimate_echo = reconciler
        .handle_github(field_edit(
            "B",
            "Estimate",
            FieldValue::Number(Estimate::Set(3.0)),
        ))
        .await
        .unwrap();

    assert_eq!(status_echo, Outcome::Suppressed);
    assert_eq!(estimate_echo, Outcome::Suppressed);
    assert_eq!(github.mutations().len(), writes_after_copy);
    assert_eq!(zenhub.writes(), 0);
}

#[tokio::test]
async fn labeled_without_estimate_still_relays_estimate_edits() {
    let github = MockBoards::new()
        .with_entity(entity("I_12", "web", 12, &["team-x"]))
        .with_memberships(&["G"], "I_12")
        .with_item_state(ItemState {
            status: Some("In Progress".into()),
            estimate: None,
        });
    let (_github, zenhub, reconciler) = setup_with(sample_config(), github);

    reconciler
        .handle_github(entity_event(EntityAction::Labeled))
        .await
        .unwrap();
    let outcome = reconciler
        .handle_github(field_edit(
            "B",
            "Estimate",
            FieldValue::Number(Estimate::Set(2.0)),
        ))
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::Applied(_)));
    assert_eq!(zenhub.writes(), 1);
}

#[tokio::test]
async fn unlabeled_leaves_manual_boards_alone() {
    let github = MockBoards::new()
        .with_entity(entity("I_12", "web", 12, &[]))
        .with_memberships(&["G", "B", "MANUAL"], "I_12");
    let (github, _zenhub, reconciler) = setup_with(sample_config(), github);

    let report = applied(
        reconciler
            .handle_github(entity_event(EntityAction::Unlabeled))
            .await
            .unwrap(),
    );

    assert_eq!(report.applied, ids(&["B"]));
    assert_eq!(github.written_boards(), ids(&["B"]));
    assert_eq!(
        github.count(|e| matches!(e, BoardEffect::RemoveItem { .. })),
        1
    );
}

#[tokio::test]
async fn repository_outside_allow_list_is_ignored() {
    let config = SyncConfig {
        allowed_repositories: vec!["api".into()],
        ..sample_config()
    };
    let github = MockBoards::new().with_entity(entity("I_12", "web", 12, &[]));
    let (github, _zenhub, reconciler) = setup_with(config, github);

    let outcome = reconciler
        .handle_github(entity_event(EntityAction::Opened))
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::Ignored(_)));
    assert!(github.effects().is_empty());
}

#[tokio::test]
async fn missing_global_board_abandons_without_mutation() {
    let config = SyncConfig {
        global_board: None,
        ..sample_config()
    };
    let github = MockBoards::new().with_entity(entity("I_12", "web", 12, &["team-x"]));
    let (github, zenhub, reconciler) = setup_with(config, github);

    let err = reconciler
        .handle_github(entity_event(EntityAction::Opened))
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Config(_)));
    assert!(github.mutations().is_empty());
    assert_eq!(zenhub.writes(), 0);
}

#[tokio::test]
async fn failing_board_does_not_stop_siblings() {
    let github = MockBoards::new()
        .with_entity(entity("I_12", "web", 12, &["team-x"]))
        .failing_on("B");
    let (_github, _zenhub, reconciler) = setup_with(sample_config(), github);

    let report = applied(
        reconciler
            .handle_github(entity_event(EntityAction::Closed))
            .await
            .unwrap(),
    );

    assert_eq!(report.applied, ids(&["G"]));
    assert_eq!(report.failed, ids(&["B"]));
}

// ─────────────────────────────────────────────────────────────────────────────
// GitHub Project Field Edits
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn status_edit_skips_origin_board_and_moves_pipeline() {
    let (github, zenhub, reconciler) = setup(&["team-x"]);

    let report = applied(
        reconciler
            .handle_github(field_edit(
                "B",
                "Status",
                FieldValue::SingleSelect(Some("In Progress".into())),
            ))
            .await
            .unwrap(),
    );

    assert_eq!(report.applied, ids(&["G"]));
    assert_eq!(github.written_boards(), ids(&["G"]));
    assert_eq!(
        zenhub.moves(),
        vec![(ZenHubIssueId::new("zh-12"), PipelineId::new("p-progress"))]
    );
}

#[tokio::test]
async fn cleared_status_means_new() {
    let (github, _zenhub, reconciler) = setup(&[]);

    reconciler
        .handle_github(field_edit("X", "Status", FieldValue::SingleSelect(None)))
        .await
        .unwrap();

    assert_eq!(
        status_writes(&github),
        vec![(BoardId::new("G"), "G_new".to_string())]
    );
}

#[tokio::test]
async fn estimate_edit_pushes_estimate() {
    let (github, zenhub, reconciler) = setup(&[]);

    reconciler
        .handle_github(field_edit(
            "X",
            "Estimate",
            FieldValue::Number(Estimate::Cleared),
        ))
        .await
        .unwrap();

    assert_eq!(
        github.count(|e| matches!(e, BoardEffect::ClearField { .. })),
        1
    );
    assert!(zenhub.effects().contains(&PipelineEffect::SetEstimate {
        issue: ZenHubIssueId::new("zh-12"),
        estimate: Estimate::Cleared,
    }));
}

#[tokio::test]
async fn untracked_field_is_ignored() {
    let (github, _zenhub, reconciler) = setup(&[]);

    let outcome = reconciler
        .handle_github(field_edit("G", "Priority", FieldValue::SingleSelect(Some("P1".into()))))
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::Ignored(_)));
    assert!(github.effects().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// ZenHub Events and Echo Suppression
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn zenhub_estimate_mirrored_back_is_suppressed() {
    let (github, zenhub, reconciler) = setup(&[]);

    reconciler
        .handle_zenhub(zenhub_event(ZenHubEventKind::EstimateSet(5.0)))
        .await
        .unwrap();
    assert_eq!(
        github.count(|e| matches!(e, BoardEffect::SetEstimate { value, .. } if *value == 5.0)),
        1
    );

    let echo = reconciler
        .handle_github(field_edit(
            "G",
            "Estimate",
            FieldValue::Number(Estimate::Set(5.0)),
        ))
        .await
        .unwrap();

    assert_eq!(echo, Outcome::Suppressed);
    assert_eq!(zenhub.writes(), 0);
}

#[tokio::test]
async fn equivalent_transfers_mutate_once() {
    let (github, _zenhub, reconciler) = setup(&[]);

    reconciler.handle_zenhub(transfer("In Progress")).await.unwrap();
    let second = reconciler.handle_zenhub(transfer("In Progress")).await.unwrap();

    assert_eq!(second, Outcome::Suppressed);
    assert_eq!(status_writes(&github).len(), 1);
}

#[tokio::test]
async fn different_value_is_not_an_echo() {
    let (github, _zenhub, reconciler) = setup(&[]);

    reconciler.handle_zenhub(transfer("In Progress")).await.unwrap();
    reconciler.handle_zenhub(transfer("Closed")).await.unwrap();

    assert_eq!(status_writes(&github).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn echo_window_expires() {
    let (github, _zenhub, reconciler) = setup(&[]);

    reconciler
        .handle_zenhub(zenhub_event(ZenHubEventKind::EstimateCleared))
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(31)).await;
    let again = reconciler
        .handle_zenhub(zenhub_event(ZenHubEventKind::EstimateCleared))
        .await
        .unwrap();

    assert!(matches!(again, Outcome::Applied(_)));
    assert_eq!(
        github.count(|e| matches!(e, BoardEffect::ClearField { .. })),
        2
    );
}

#[tokio::test]
async fn concurrent_equivalent_events_apply_once() {
    let (github, _zenhub, reconciler) = setup(&["team-x"]);
    let reconciler = Arc::new(reconciler);

    let a = tokio::spawn({
        let r = Arc::clone(&reconciler);
        async move { r.handle_zenhub(transfer("Closed")).await.unwrap() }
    });
    let b = tokio::spawn({
        let r = Arc::clone(&reconciler);
        async move { r.handle_zenhub(transfer("Closed")).await.unwrap() }
    });

    let outcomes = [a.await.unwrap(), b.await.unwrap()];
    assert_eq!(
        outcomes.iter().filter(|o| **o == Outcome::Suppressed).count(),
        1
    );
    assert_eq!(status_writes(&github).len(), 2);
}

#[tokio::test]
async fn transfer_to_unknown_option_skips_that_board() {
    let (_github, _zenhub, reconciler) = setup(&["team-x", "team-y"]);

    let report = applied(reconciler.handle_zenhub(transfer("In Progress")).await.unwrap());

    assert_eq!(report.applied, ids(&["B", "G", "Y"]));
    assert_eq!(report.skipped, ids(&["P"]));
}

#[tokio::test]
async fn transfer_in_foreign_workspace_is_ignored() {
    let (github, _zenhub, reconciler) = setup(&[]);

    let outcome = reconciler
        .handle_zenhub(zenhub_event(ZenHubEventKind::IssueTransfer {
            workspace_id: "ws-other".into(),
            to_pipeline: "Closed".into(),
        }))
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::Ignored(_)));
    assert!(github.effects().is_empty());
}

#[tokio::test]
async fn reprioritization_is_ignored() {
    let (github, zenhub, reconciler) = setup(&[]);

    let outcome = reconciler
        .handle_zenhub(zenhub_event(ZenHubEventKind::IssueReprioritized))
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::Ignored(_)));
    assert!(github.effects().is_empty());
    assert!(zenhub.effects().is_empty());
}

#[tokio::test]
async fn zenhub_changes_are_not_pushed_back() {
    let (_github, zenhub, reconciler) = setup(&["team-x"]);

    reconciler
        .handle_zenhub(zenhub_event(ZenHubEventKind::EstimateSet(8.0)))
        .await
        .unwrap();
    reconciler.handle_zenhub(transfer("Closed")).await.unwrap();

    assert_eq!(zenhub.writes(), 0);
}
