/// Moderation engine
///
/// Every transition is a read-modify-write keyed by item id and guarded by
/// the item's version: the write only lands if nobody else wrote in between,
/// otherwise the item is re-read and the transition re-evaluated. A second
/// administrator racing a reject therefore sees either the purged item
/// (NotFound) or a non-pending one (Conflict), never a stale Pending.
use crate::{
    content::{ContentItem, ContentKind, Moderatable, ModerationAction, Transition},
    error::{ConflictReason, WorkflowError, WorkflowResult},
    store::EntityStore,
    workflow::scope::{ensure_authorized, AdminScope},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of a committed read-modify-write
#[derive(Debug, Clone)]
pub struct Committed {
    /// State read before the write
    pub before: ContentItem,
    /// State written, or the final snapshot of a purged item
    pub after: ContentItem,
    pub transition: Transition,
    /// Participants removed together with a purged event
    pub removed_participants: Vec<Uuid>,
}

/// Apply `mutate` to the current item and commit it atomically.
///
/// `mutate` receives the freshly read item and returns the next state plus
/// whether to keep or purge it. It may run more than once; it must not have
/// side effects.
pub async fn commit_with_retry<F>(
    store: &dyn EntityStore,
    item_id: Uuid,
    max_attempts: u32,
    mut mutate: F,
) -> WorkflowResult<Committed>
where
    F: FnMut(&ContentItem) -> WorkflowResult<(ContentItem, Transition)>,
{
    for attempt in 1..=max_attempts.max(1) {
        let current = store
            .get_item(item_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("Item {} not found", item_id)))?;

        let (mut next, transition) = mutate(&current)?;
        next.version = current.version + 1;
        next.updated_at = Utc::now();

        let landed = match transition {
            Transition::Retain => store
                .compare_and_swap(&next, current.version)
                .await?
                .then(Vec::new),
            Transition::Purge => store.delete_item(item_id, current.version).await?,
        };

        if let Some(removed_participants) = landed {
            return Ok(Committed {
                before: current,
                after: next,
                transition,
                removed_participants,
            });
        }

        debug!(item_id = %item_id, attempt, "version changed underneath, retrying");
    }

    warn!(item_id = %item_id, max_attempts, "giving up after repeated write conflicts");
    Err(WorkflowError::Conflict(ConflictReason::ConcurrentModification))
}

/// Applies moderation actions within an administrator's scope
#[derive(Clone)]
pub struct ModerationEngine {
    store: Arc<dyn EntityStore>,
    max_attempts: u32,
}

impl ModerationEngine {
    pub fn new(store: Arc<dyn EntityStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts,
        }
    }

    /// Authorize, transition and commit one action.
    ///
    /// When `expected_kind` is given, an item of another kind is reported as
    /// NotFound. For a reject the returned item is the purged snapshot.
    pub async fn apply(
        &self,
        scope: &AdminScope,
        actor: Uuid,
        item_id: Uuid,
        expected_kind: Option<ContentKind>,
        action: ModerationAction,
    ) -> WorkflowResult<ContentItem> {
        let store = self.store.as_ref();
        let committed = commit_with_retry(store, item_id, self.max_attempts, |current| {
            if let Some(kind) = expected_kind {
                if current.kind() != kind {
                    return Err(WorkflowError::NotFound(format!(
                        "{} {} not found",
                        kind.as_str(),
                        item_id
                    )));
                }
            }

            if let Err(e) = ensure_authorized(scope, current) {
                warn!(
                    item_id = %item_id,
                    actor = %actor,
                    action = action.as_str(),
                    "moderation outside scope"
                );
                return Err(e);
            }

            let mut next = current.clone();
            let transition = next
                .moderation_mut()
                .apply(action)
                .map_err(WorkflowError::Conflict)?;

            if action == ModerationAction::Approve {
                next.approved_by = Some(actor);
                next.approved_at = Some(Utc::now());
            }

            Ok((next, transition))
        })
        .await?;

        info!(
            item_id = %item_id,
            kind = committed.after.kind().as_str(),
            action = action.as_str(),
            actor = %actor,
            "moderation action applied"
        );

        Ok(committed.after)
    }

    pub async fn approve(
        &self,
        scope: &AdminScope,
        actor: Uuid,
        item_id: Uuid,
    ) -> WorkflowResult<ContentItem> {
        self.apply(scope, actor, item_id, None, ModerationAction::Approve)
            .await
    }

    pub async fn reject(
        &self,
        scope: &AdminScope,
        actor: Uuid,
        item_id: Uuid,
    ) -> WorkflowResult<ContentItem> {
        self.apply(scope, actor, item_id, None, ModerationAction::Reject)
            .await
    }

    pub async fn hide(
        &self,
        scope: &AdminScope,
        actor: Uuid,
        item_id: Uuid,
    ) -> WorkflowResult<ContentItem> {
        self.apply(scope, actor, item_id, None, ModerationAction::Hide)
            .await
    }

    pub async fn unhide(
        &self,
        scope: &AdminScope,
        actor: Uuid,
        item_id: Uuid,
    ) -> WorkflowResult<ContentItem> {
        self.apply(scope, actor, item_id, None, ModerationAction::Unhide)
            .await
    }

    pub async fn clear_reports(
        &self,
        scope: &AdminScope,
        actor: Uuid,
        item_id: Uuid,
    ) -> WorkflowResult<ContentItem> {
        self.apply(scope, actor, item_id, None, ModerationAction::ClearReports)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        content::{Approval, ContentBody, ResourceCategory, ResourceDetails, Visibility},
        db::{self, SqliteStore},
        store::ItemFilter,
        workflow::participation::Participant,
    };
    use async_trait::async_trait;
    use chrono::DateTime;

    async fn engine() -> (ModerationEngine, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::new(db::create_memory_pool().await.unwrap()));
        (ModerationEngine::new(store.clone(), 4), store)
    }

    async fn resource(store: &SqliteStore, department: &str) -> ContentItem {
        let item = ContentItem::new(
            Uuid::new_v4(),
            Some(department.to_string()),
            ContentBody::Resource(ResourceDetails {
                title: "Operating Systems notes".to_string(),
                description: "Week 1 to 6".to_string(),
                category: ResourceCategory::Notes,
                subject: "OS".to_string(),
                file_url: "https://files.campus.edu/os.pdf".to_string(),
                semester: Some(4),
            }),
            Approval::Pending,
        );
        store.insert_item(&item).await.unwrap();
        item
    }

    #[tokio::test]
    async fn test_approve_records_approver() {
        let (engine, store) = engine().await;
        let item = resource(&store, "CS").await;
        let admin = Uuid::new_v4();

        let approved = engine
            .approve(&AdminScope::Department("CS".into()), admin, item.id)
            .await
            .unwrap();
        assert_eq!(approved.moderation.approval, Approval::Approved);
        assert_eq!(approved.approved_by, Some(admin));
        assert_eq!(approved.version, 1);

        let err = engine
            .approve(&AdminScope::Global, admin, item.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(ConflictReason::NotPending)));
    }

    #[tokio::test]
    async fn test_reject_purges_and_second_reject_is_not_found() {
        let (engine, store) = engine().await;
        let item = resource(&store, "CS").await;

        let snapshot = engine
            .reject(&AdminScope::Global, Uuid::new_v4(), item.id)
            .await
            .unwrap();
        assert_eq!(snapshot.moderation.approval, Approval::Rejected);
        assert!(store.get_item(item.id).await.unwrap().is_none());

        let err = engine
            .reject(&AdminScope::Global, Uuid::new_v4(), item.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_out_of_scope_is_forbidden_and_unchanged() {
        let (engine, store) = engine().await;
        let item = resource(&store, "CS").await;

        let err = engine
            .hide(&AdminScope::Department("EE".into()), Uuid::new_v4(), item.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));

        let stored = store.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(stored.moderation.visibility, Visibility::Visible);
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn test_visibility_actions_are_idempotent() {
        let (engine, store) = engine().await;
        let item = resource(&store, "CS").await;
        store.increment_report_count(item.id).await.unwrap();
        let scope = AdminScope::Global;
        let actor = Uuid::new_v4();

        engine.hide(&scope, actor, item.id).await.unwrap();
        let hidden = engine.hide(&scope, actor, item.id).await.unwrap();
        assert_eq!(hidden.moderation.visibility, Visibility::Hidden);
        // Hidden pending items keep their approval state
        assert_eq!(hidden.moderation.approval, Approval::Pending);

        let cleared = engine.clear_reports(&scope, actor, item.id).await.unwrap();
        assert_eq!(cleared.moderation.report_count, 0);
        assert_eq!(cleared.moderation.visibility, Visibility::Hidden);

        let shown = engine.unhide(&scope, actor, item.id).await.unwrap();
        assert_eq!(shown.moderation.visibility, Visibility::Visible);
    }

    #[tokio::test]
    async fn test_kind_mismatch_is_not_found() {
        let (engine, store) = engine().await;
        let item = resource(&store, "CS").await;

        let err = engine
            .apply(
                &AdminScope::Global,
                Uuid::new_v4(),
                item.id,
                Some(ContentKind::ForumPost),
                ModerationAction::Hide,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }

    /// Store whose conditional writes always lose the race
    struct Contended(Arc<SqliteStore>);

    #[async_trait]
    impl EntityStore for Contended {
        async fn insert_item(&self, item: &ContentItem) -> WorkflowResult<()> {
            self.0.insert_item(item).await
        }
        async fn get_item(&self, id: Uuid) -> WorkflowResult<Option<ContentItem>> {
            self.0.get_item(id).await
        }
        async fn compare_and_swap(&self, _item: &ContentItem, _expected: i64) -> WorkflowResult<bool> {
            Ok(false)
        }
        async fn delete_item(&self, _id: Uuid, _expected: i64) -> WorkflowResult<Option<Vec<Uuid>>> {
            Ok(None)
        }
        async fn increment_report_count(&self, id: Uuid) -> WorkflowResult<Option<u32>> {
            self.0.increment_report_count(id).await
        }
        async fn list_items(&self, filter: &ItemFilter) -> WorkflowResult<Vec<ContentItem>> {
            self.0.list_items(filter).await
        }
        async fn insert_participant_if_open(
            &self,
            event_id: Uuid,
            user_id: Uuid,
            joined_at: DateTime<Utc>,
        ) -> WorkflowResult<bool> {
            self.0.insert_participant_if_open(event_id, user_id, joined_at).await
        }
        async fn delete_participant(&self, event_id: Uuid, user_id: Uuid) -> WorkflowResult<bool> {
            self.0.delete_participant(event_id, user_id).await
        }
        async fn get_participant(&self, event_id: Uuid, user_id: Uuid) -> WorkflowResult<Option<Participant>> {
            self.0.get_participant(event_id, user_id).await
        }
        async fn list_participants(&self, event_id: Uuid) -> WorkflowResult<Vec<Participant>> {
            self.0.list_participants(event_id).await
        }
        async fn count_participants(&self, event_id: Uuid) -> WorkflowResult<u32> {
            self.0.count_participants(event_id).await
        }
        async fn add_joined_event(&self, user_id: Uuid, event_id: Uuid) -> WorkflowResult<()> {
            self.0.add_joined_event(user_id, event_id).await
        }
        async fn remove_joined_event(&self, user_id: Uuid, event_id: Uuid) -> WorkflowResult<()> {
            self.0.remove_joined_event(user_id, event_id).await
        }
        async fn joined_events(&self, user_id: Uuid) -> WorkflowResult<Vec<Uuid>> {
            self.0.joined_events(user_id).await
        }
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion_is_conflict() {
        let (_, store) = engine().await;
        let item = resource(&store, "CS").await;
        let engine = ModerationEngine::new(Arc::new(Contended(store.clone())), 3);

        let err = engine
            .approve(&AdminScope::Global, Uuid::new_v4(), item.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Conflict(ConflictReason::ConcurrentModification)
        ));

        let stored = store.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(stored.moderation.approval, Approval::Pending);
    }
}
