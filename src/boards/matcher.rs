//! Label-driven board resolution.
//!
//! Every entity belongs on the global board. Each label mapping whose full
//! label set is present on the entity adds its board as well, in the order
//! the mappings are configured. A board reached more than once is listed
//! only at its first position.

use crate::config::{BoardConfig, ConfigError, StatusOption, SyncConfig};
use crate::types::{BoardId, FieldId};

/// A board an entity should be on, with the fields needed to write to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardTarget {
    pub board_id: BoardId,
    pub status_field_id: FieldId,
    pub status_options: Vec<StatusOption>,
    pub estimate_field_id: FieldId,
}

impl BoardTarget {
    /// Finds the status option with exactly this name.
    pub fn status_option(&self, name: &str) -> Option<&StatusOption> {
        self.status_options.iter().find(|o| o.name == name)
    }
}

impl From<&BoardConfig> for BoardTarget {
    fn from(board: &BoardConfig) -> Self {
        BoardTarget {
            board_id: board.github_board_id.clone(),
            status_field_id: board.status_field_id.clone(),
            status_options: board.status_field_options.clone(),
            estimate_field_id: board.estimate_field_id.clone(),
        }
    }
}

/// Resolves the boards an entity with `labels` should be on.
///
/// The global board is always first and every board appears once. A mapping
/// with an empty label set matches every entity.
///
/// # Errors
///
/// Returns [`ConfigError::NoGlobalBoard`] if no global board is configured.
pub fn resolve_boards<S: AsRef<str>>(
    config: &SyncConfig,
    labels: &[S],
) -> Result<Vec<BoardTarget>, ConfigError> {
    let global = config
        .global_board
        .as_ref()
        .ok_or(ConfigError::NoGlobalBoard)?;

    let mut targets = vec![BoardTarget::from(global)];
    let matching = config.label_mappings.iter().filter(|mapping| {
        mapping
            .labels
            .iter()
            .all(|required| labels.iter().any(|l| l.as_ref() == required))
    });
    for mapping in matching {
        if targets
            .iter()
            .any(|t| t.board_id == mapping.board.github_board_id)
        {
            continue;
        }
        targets.push(BoardTarget::from(&mapping.board));
    }

    Ok(targets)
}

/// Ids of every board this service manages: the global board and all
/// mapping boards, each once.
pub fn configured_board_ids(config: &SyncConfig) -> Vec<BoardId> {
    let mut ids: Vec<BoardId> = Vec::new();
    for board in config
        .global_board
        .iter()
        .chain(config.label_mappings.iter().map(|m| &m.board))
    {
        if !ids.contains(&board.github_board_id) {
            ids.push(board.github_board_id.clone());
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LabelMapping;
    use crate::test_utils::{arb_config, arb_labels, board, sample_config};
    use proptest::prelude::*;

    // ─── Unit Tests ───────────────────────────────────────────────────────────

    #[test]
    fn no_global_board_is_an_error() {
        let config = SyncConfig::default();
        let err = resolve_boards::<&str>(&config, &[]).unwrap_err();
        assert!(matches!(err, ConfigError::NoGlobalBoard));
    }

    #[test]
    fn unlabeled_entity_gets_only_global() {
        let config = sample_config();
        let boards = resolve_boards::<&str>(&config, &[]).unwrap();
        assert_eq!(boards.len(), 1);
        assert_eq!(boards[0].board_id.as_str(), "G");
    }

    #[test]
    fn matching_mapping_follows_global() {
        let config = sample_config();
        let boards = resolve_boards(&config, &["team-x", "bug"]).unwrap();
        let ids: Vec<_> = boards.iter().map(|b| b.board_id.as_str()).collect();
        assert_eq!(ids, vec!["G", "B"]);
    }

    #[test]
    fn partial_label_match_is_excluded() {
        let config = sample_config();
        // "pair" mapping requires both team-x and team-y
        let boards = resolve_boards(&config, &["team-y"]).unwrap();
        let ids: Vec<_> = boards.iter().map(|b| b.board_id.as_str()).collect();
        assert_eq!(ids, vec!["G", "Y"]);

        let boards = resolve_boards(&config, &["team-y", "team-x"]).unwrap();
        let ids: Vec<_> = boards.iter().map(|b| b.board_id.as_str()).collect();
        assert_eq!(ids, vec!["G", "B", "Y", "P"]);
    }

    #[test]
    fn status_option_lookup_is_exact() {
        let config = sample_config();
        let boards = resolve_boards::<&str>(&config, &[]).unwrap();
        assert!(boards[0].status_option("New Issues").is_some());
        assert!(boards[0].status_option("new issues").is_none());
    }

    #[test]
    fn configured_ids_cover_every_board() {
        let config = sample_config();
        let ids: Vec<_> = configured_board_ids(&config)
            .into_iter()
            .map(|b| b.0)
            .collect();
        assert_eq!(ids, vec!["G", "B", "Y", "P"]);
    }

    #[test]
    fn mapping_onto_global_board_does_not_repeat_it() {
        let mut config = sample_config();
        config.label_mappings.push(LabelMapping {
            labels: vec!["team-x".into()],
            board: board("G", &["New Issues"]),
        });

        let boards = resolve_boards(&config, &["team-x"]).unwrap();
        let ids: Vec<_> = boards.iter().map(|b| b.board_id.as_str()).collect();
        assert_eq!(ids, vec!["G", "B"]);
        // The global board's own field set wins.
        assert!(boards[0].status_option("In Progress").is_some());
    }

    #[test]
    fn board_shared_by_two_mappings_keeps_first_position() {
        let mut config = sample_config();
        config.label_mappings.insert(
            0,
            LabelMapping {
                labels: vec!["bug".into()],
                board: board("Y", &["New Issues"]),
            },
        );

        let boards = resolve_boards(&config, &["bug", "team-x", "team-y"]).unwrap();
        let ids: Vec<_> = boards.iter().map(|b| b.board_id.as_str()).collect();
        assert_eq!(ids, vec!["G", "Y", "B", "P"]);
        let configured = configured_board_ids(&config);
        assert_eq!(configured.iter().filter(|b| b.as_str() == "Y").count(), 1);
    }

    // ─── Property Tests ───────────────────────────────────────────────────────

    proptest! {
        #[test]
        fn global_board_first_and_once(labels in arb_labels()) {
            let config = sample_config();
            let boards = resolve_boards(&config, &labels).unwrap();

            prop_assert_eq!(boards[0].board_id.as_str(), "G");
            prop_assert_eq!(
                boards.iter().filter(|b| b.board_id.as_str() == "G").count(),
                1
            );
        }

        #[test]
        fn mapping_included_iff_subset(labels in arb_labels()) {
            let config = sample_config();
            let boards = resolve_boards(&config, &labels).unwrap();

            for mapping in &config.label_mappings {
                let subset = mapping.labels.iter().all(|l| labels.contains(l));
                let included = boards
                    .iter()
                    .any(|b| b.board_id == mapping.board.github_board_id);
                prop_assert_eq!(subset, included);
            }
        }

        #[test]
        fn any_config_lists_global_first_and_boards_once(
            config in arb_config(),
            labels in arb_labels(),
        ) {
            let boards = resolve_boards(&config, &labels).unwrap();

            prop_assert_eq!(boards[0].board_id.as_str(), "G");
            for target in &boards {
                prop_assert_eq!(
                    boards.iter().filter(|b| b.board_id == target.board_id).count(),
                    1
                );
            }
        }

        #[test]
        fn any_config_includes_board_iff_some_mapping_matches(
            config in arb_config(),
            labels in arb_labels(),
        ) {
            let boards = resolve_boards(&config, &labels).unwrap();

            for mapping in &config.label_mappings {
                let id = &mapping.board.github_board_id;
                let reachable = id.as_str() == "G"
                    || config.label_mappings.iter().any(|m| {
                        &m.board.github_board_id == id
                            && m.labels.iter().all(|l| labels.contains(l))
                    });
                let included = boards.iter().any(|b| &b.board_id == id);
                prop_assert_eq!(reachable, included);
            }
        }

        #[test]
        fn resolution_is_deterministic(labels in arb_labels()) {
            let config = sample_config();
            prop_assert_eq!(
                resolve_boards(&config, &labels).unwrap(),
                resolve_boards(&config, &labels).unwrap()
            );
        }
    }
}
