/// Event participation
///
/// Joining is a single conditional insert at the store; when it does not
/// land, the event is re-read only to explain why.
use crate::{
    content::{Approval, ContentItem, ContentKind, EventPhase, Moderatable},
    error::{ConflictReason, WorkflowError, WorkflowResult},
    metrics,
    store::EntityStore,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One user's seat at an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub joined_at: DateTime<Utc>,
}

/// Participation manager
#[derive(Clone)]
pub struct ParticipationManager {
    store: Arc<dyn EntityStore>,
    max_attempts: u32,
}

impl ParticipationManager {
    pub fn new(store: Arc<dyn EntityStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts,
        }
    }

    /// Join an approved, upcoming event with a free seat
    pub async fn join(&self, event_id: Uuid, user_id: Uuid) -> WorkflowResult<Participant> {
        for attempt in 1..=self.max_attempts.max(1) {
            let joined_at = Utc::now();
            if self
                .store
                .insert_participant_if_open(event_id, user_id, joined_at)
                .await?
            {
                if let Err(e) = self.store.add_joined_event(user_id, event_id).await {
                    warn!(
                        event_id = %event_id,
                        user_id = %user_id,
                        error = %e,
                        "joined-events reference not updated"
                    );
                }
                metrics::record_participant_joined();
                info!(event_id = %event_id, user_id = %user_id, "joined event");

                return Ok(Participant {
                    event_id,
                    user_id,
                    joined_at,
                });
            }

            if let Some(reason) = self.explain_refusal(event_id, user_id).await? {
                debug!(event_id = %event_id, user_id = %user_id, reason = %reason, "join refused");
                return Err(reason);
            }

            // A seat freed up between the insert and the diagnosis
            debug!(event_id = %event_id, attempt, "join raced a leave, retrying");
        }

        Err(WorkflowError::Conflict(ConflictReason::ConcurrentModification))
    }

    /// Leave an event. Allowed in any phase.
    pub async fn leave(&self, event_id: Uuid, user_id: Uuid) -> WorkflowResult<()> {
        if !self.store.delete_participant(event_id, user_id).await? {
            return Err(WorkflowError::NotFound(
                "Not a participant of this event".to_string(),
            ));
        }

        if let Err(e) = self.store.remove_joined_event(user_id, event_id).await {
            warn!(
                event_id = %event_id,
                user_id = %user_id,
                error = %e,
                "joined-events reference not updated"
            );
        }
        info!(event_id = %event_id, user_id = %user_id, "left event");

        Ok(())
    }

    /// Participants of an existing event, in join order
    pub async fn participants(&self, event_id: Uuid) -> WorkflowResult<Vec<Participant>> {
        self.load_event(event_id).await?;
        self.store.list_participants(event_id).await
    }

    /// Events a user has joined that still exist
    pub async fn joined_events(&self, user_id: Uuid) -> WorkflowResult<Vec<ContentItem>> {
        let mut events = Vec::new();
        for event_id in self.store.joined_events(user_id).await? {
            if let Some(item) = self.store.get_item(event_id).await? {
                events.push(item);
            }
        }
        Ok(events)
    }

    async fn load_event(&self, event_id: Uuid) -> WorkflowResult<ContentItem> {
        self.store
            .get_item(event_id)
            .await?
            .filter(|item| item.kind() == ContentKind::Event)
            .ok_or_else(|| WorkflowError::NotFound(format!("Event {} not found", event_id)))
    }

    /// First failing join precondition, in order: exists and approved,
    /// upcoming, not already joined, below capacity. None if all hold.
    async fn explain_refusal(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> WorkflowResult<Option<WorkflowError>> {
        let item = self.load_event(event_id).await?;
        let event = match item.as_event() {
            Some(event) if item.approval() == Approval::Approved => event,
            _ => {
                return Ok(Some(WorkflowError::NotFound(format!(
                    "Event {} not found",
                    event_id
                ))))
            }
        };

        if event.phase != EventPhase::Upcoming {
            return Ok(Some(WorkflowError::Conflict(ConflictReason::NotUpcoming)));
        }

        if self.store.get_participant(event_id, user_id).await?.is_some() {
            return Ok(Some(WorkflowError::Conflict(ConflictReason::AlreadyJoined)));
        }

        if self.store.count_participants(event_id).await? >= event.capacity {
            return Ok(Some(WorkflowError::Conflict(ConflictReason::Full)));
        }

        Ok(None)
    }
}
