//! Board mutation executor.
//!
//! Applies changes to one board at a time. Linking an entity to a board
//! yields a per-board item id; those ids are cached for a minute so that a
//! burst of updates to the same entity doesn't re-add it to every board.
//! Field values are never cached.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use crate::boards::BoardTarget;
use crate::cache::TtlCache;
use crate::effects::{BoardEffect, BoardInterpreter, BoardResponse};
use crate::types::{BoardId, EntityId, Estimate, ItemId};

use super::error::ExecutorError;

pub const DEFAULT_ITEM_CAPACITY: usize = 10_000;
pub const DEFAULT_ITEM_TTL: Duration = Duration::from_secs(60);

/// A single field write.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Set the status field to the option with this name.
    Status(String),
    Estimate(Estimate),
}

pub struct BoardExecutor<G> {
    github: Arc<G>,
    items: Mutex<TtlCache<(BoardId, EntityId), ItemId>>,
}

impl<G: BoardInterpreter> BoardExecutor<G> {
    pub fn new(github: Arc<G>) -> Self {
        Self::with_cache(github, DEFAULT_ITEM_CAPACITY, DEFAULT_ITEM_TTL)
    }

    pub fn with_cache(github: Arc<G>, capacity: usize, ttl: Duration) -> Self {
        Self {
            github,
            items: Mutex::new(TtlCache::new(capacity, ttl)),
        }
    }

    /// Returns the entity's item id on `board`, adding it to the board if the
    /// id isn't cached. Adding is idempotent on GitHub's side.
    pub async fn ensure_membership(
        &self,
        entity: &EntityId,
        board: &BoardId,
    ) -> Result<ItemId, ExecutorError> {
        let key = (board.clone(), entity.clone());

        if let Some(item) = self.cached_item(&key) {
            debug!(%board, %entity, %item, "Item id cache hit");
            return Ok(item);
        }

        let response = self
            .github
            .interpret(BoardEffect::AddToBoard {
                board: board.clone(),
                content: entity.clone(),
            })
            .await
            .map_err(|e| ExecutorError::Remote(Box::new(e)))?;

        let BoardResponse::ItemAdded(item) = response else {
            return Err(ExecutorError::UnexpectedResponse {
                effect: "AddToBoard",
            });
        };

        debug!(%board, %entity, %item, "Item id cache miss, added to board");
        self.lock_items().insert(key, item.clone());
        Ok(item)
    }

    /// Issues exactly one mutation writing `update` to `item`.
    pub async fn apply_field_update(
        &self,
        item: &ItemId,
        board: &BoardTarget,
        update: &FieldUpdate,
    ) -> Result<(), ExecutorError> {
        let effect = match update {
            FieldUpdate::Status(name) => {
                let option = board.status_option(name).ok_or_else(|| {
                    ExecutorError::UnknownStatusOption {
                        board: board.board_id.clone(),
                        status: name.clone(),
                    }
                })?;
                BoardEffect::SetStatus {
                    board: board.board_id.clone(),
                    item: item.clone(),
                    field: board.status_field_id.clone(),
                    option_id: option.id.clone(),
                }
            }
            FieldUpdate::Estimate(Estimate::Set(value)) => BoardEffect::SetEstimate {
                board: board.board_id.clone(),
                item: item.clone(),
                field: board.estimate_field_id.clone(),
                value: *value,
            },
            FieldUpdate::Estimate(Estimate::Cleared) => BoardEffect::ClearField {
                board: board.board_id.clone(),
                item: item.clone(),
                field: board.estimate_field_id.clone(),
            },
        };

        match self
            .github
            .interpret(effect)
            .await
            .map_err(|e| ExecutorError::Remote(Box::new(e)))?
        {
            BoardResponse::FieldUpdated => Ok(()),
            _ => Err(ExecutorError::UnexpectedResponse {
                effect: "UpdateField",
            }),
        }
    }

    /// Evicts the cached item id and deletes the item from the board.
    pub async fn remove_membership(
        &self,
        entity: &EntityId,
        board: &BoardId,
        item: &ItemId,
    ) -> Result<(), ExecutorError> {
        self.lock_items().remove(&(board.clone(), entity.clone()));

        match self
            .github
            .interpret(BoardEffect::RemoveItem {
                board: board.clone(),
                item: item.clone(),
            })
            .await
            .map_err(|e| ExecutorError::Remote(Box::new(e)))?
        {
            BoardResponse::ItemRemoved => {
                info!(%board, %entity, %item, "Removed entity from board");
                Ok(())
            }
            _ => Err(ExecutorError::UnexpectedResponse {
                effect: "RemoveItem",
            }),
        }
    }

    /// Ensures membership, then applies each update in order.
    ///
    /// Status names are checked against the board before anything is written,
    /// so an unknown status leaves the board untouched.
    pub async fn place(
        &self,
        entity: &EntityId,
        board: &BoardTarget,
        updates: &[FieldUpdate],
    ) -> Result<ItemId, ExecutorError> {
        for update in updates {
            if let FieldUpdate::Status(name) = update
                && board.status_option(name).is_none()
            {
                return Err(ExecutorError::UnknownStatusOption {
                    board: board.board_id.clone(),
                    status: name.clone(),
                });
            }
        }

        let item = self.ensure_membership(entity, &board.board_id).await?;
        for update in updates {
            self.apply_field_update(&item, board, update).await?;
        }
        Ok(item)
    }

    fn cached_item(&self, key: &(BoardId, EntityId)) -> Option<ItemId> {
        self.lock_items().get(key).cloned()
    }

    fn lock_items(&self) -> std::sync::MutexGuard<'_, TtlCache<(BoardId, EntityId), ItemId>> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
