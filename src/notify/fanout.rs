/// Notification fan-out service
use crate::{
    error::{WorkflowError, WorkflowResult},
    metrics,
    notify::{NotificationDraft, Recipients},
    store::{EntityStore, NotificationStore, UserDirectory},
};
use chrono::Utc;
use serde::Serialize;
use std::{collections::HashSet, sync::Arc, time::Duration};
use tracing::{debug, warn};
use uuid::Uuid;

/// Outcome of one fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    pub delivered: usize,
    /// Recipients whose record could not be stored
    pub failed: Vec<Uuid>,
}

/// Turns one logical notification into per-recipient records
#[derive(Clone)]
pub struct FanoutService {
    notifications: Arc<dyn NotificationStore>,
    users: Arc<dyn UserDirectory>,
    entities: Arc<dyn EntityStore>,
    timeout: Duration,
}

impl FanoutService {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        users: Arc<dyn UserDirectory>,
        entities: Arc<dyn EntityStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            notifications,
            users,
            entities,
            timeout,
        }
    }

    async fn resolve(&self, recipients: Recipients) -> WorkflowResult<Vec<Uuid>> {
        match recipients {
            Recipients::User(id) => Ok(vec![id]),
            Recipients::Users(ids) => Ok(ids),
            Recipients::EventParticipants(event_id) => Ok(self
                .entities
                .list_participants(event_id)
                .await?
                .into_iter()
                .map(|p| p.user_id)
                .collect()),
            Recipients::Administrators { department } => {
                self.users.admin_ids_for(department.as_deref()).await
            }
            Recipients::AllActiveUsers => self.users.active_user_ids().await,
        }
    }

    /// Resolve recipients and insert one notification each, as one batch.
    ///
    /// Rows that fail individually are reported in [`FanoutReport::failed`];
    /// the valid subset is stored regardless. Calling this twice for the same
    /// logical event stores two sets of records.
    pub async fn notify(
        &self,
        recipients: Recipients,
        draft: NotificationDraft,
    ) -> WorkflowResult<FanoutReport> {
        let recipient_ids = self.resolve(recipients).await?;
        if recipient_ids.is_empty() {
            debug!(kind = draft.notification_type.as_str(), "no recipients to notify");
            return Ok(FanoutReport::default());
        }

        let now = Utc::now();
        let batch: Vec<_> = recipient_ids
            .iter()
            .map(|recipient| draft.address_to(*recipient, now))
            .collect();

        let failed_ids: HashSet<Uuid> = self
            .notifications
            .insert_batch(&batch)
            .await?
            .into_iter()
            .collect();

        let failed: Vec<Uuid> = batch
            .iter()
            .filter(|n| failed_ids.contains(&n.id))
            .map(|n| n.recipient_id)
            .collect();
        let delivered = batch.len() - failed.len();

        let kind = draft.notification_type.as_str();
        metrics::record_notifications(kind, delivered, failed.len());

        if !failed.is_empty() {
            warn!(
                kind,
                delivered,
                failed = failed.len(),
                "some notification recipients could not be stored"
            );
        }

        Ok(FanoutReport { delivered, failed })
    }

    /// Best-effort fan-out used after a committed state change.
    ///
    /// Store failures and timeouts are logged and swallowed; they never
    /// propagate to the caller.
    pub async fn dispatch(
        &self,
        recipients: Recipients,
        draft: NotificationDraft,
    ) -> Option<FanoutReport> {
        let kind = draft.notification_type.as_str();
        match tokio::time::timeout(self.timeout, self.notify(recipients, draft)).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                warn!(kind, error = %e, "notification dispatch failed");
                metrics::record_dispatch_failure(kind);
                None
            }
            Err(_) => {
                let e = WorkflowError::DispatchUnavailable(format!(
                    "timed out after {}ms",
                    self.timeout.as_millis()
                ));
                warn!(kind, error = %e, "notification dispatch timed out");
                metrics::record_dispatch_failure(kind);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{Role, UserRecord},
        content::{AccountDetails, Approval, ContentBody, ContentItem},
        db::{self, SqliteStore},
        notify::{InboxQuery, Notification, NotificationStats, NotificationType},
    };
    use async_trait::async_trait;
    use chrono::DateTime;

    async fn store() -> Arc<SqliteStore> {
        let pool = db::create_memory_pool().await.unwrap();
        Arc::new(SqliteStore::new(pool))
    }

    async fn register(store: &SqliteStore, role: Role, department: Option<&str>) -> Uuid {
        let user = UserRecord {
            id: Uuid::new_v4(),
            name: "Test User".to_string(),
            email: format!("{}@campus.edu", Uuid::new_v4()),
            role,
            department: department.map(String::from),
            created_at: Utc::now(),
        };
        let account = ContentItem::with_id(
            user.id,
            user.id,
            user.department.clone(),
            ContentBody::UserAccount(AccountDetails {
                name: user.name.clone(),
                email: user.email.clone(),
            }),
            Approval::Approved,
        );
        store.register_user(&user, &account).await.unwrap();
        user.id
    }

    fn service(store: Arc<SqliteStore>) -> FanoutService {
        FanoutService::new(
            store.clone(),
            store.clone(),
            store,
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_valid_subset() {
        let store = store().await;
        let alice = register(&store, Role::Student, Some("CS")).await;
        let ghost = Uuid::new_v4();

        let fanout = service(store.clone());
        let report = fanout
            .notify(
                Recipients::Users(vec![alice, ghost]),
                NotificationDraft::new(NotificationType::SystemAnnouncement, "Hi", "Hello all"),
            )
            .await
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, vec![ghost]);
        assert_eq!(store.count_notifications(alice, false).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_no_dedup_across_calls() {
        let store = store().await;
        let alice = register(&store, Role::Student, None).await;
        let fanout = service(store.clone());

        for _ in 0..2 {
            fanout
                .notify(
                    Recipients::User(alice),
                    NotificationDraft::new(NotificationType::Like, "Liked", "Someone liked it"),
                )
                .await
                .unwrap();
        }

        assert_eq!(store.count_notifications(alice, true).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_administrators_are_scope_filtered() {
        let store = store().await;
        let global = register(&store, Role::Admin, None).await;
        let cs_admin = register(&store, Role::Admin, Some("CS")).await;
        let ee_admin = register(&store, Role::Admin, Some("EE")).await;
        register(&store, Role::Student, Some("CS")).await;

        let fanout = service(store.clone());
        let report = fanout
            .notify(
                Recipients::Administrators {
                    department: Some("CS".to_string()),
                },
                NotificationDraft::new(NotificationType::ItemCreated, "Pending", "Review me"),
            )
            .await
            .unwrap();

        assert_eq!(report.delivered, 2);
        assert_eq!(store.count_notifications(global, false).await.unwrap(), 1);
        assert_eq!(store.count_notifications(cs_admin, false).await.unwrap(), 1);
        assert_eq!(store.count_notifications(ee_admin, false).await.unwrap(), 0);
    }

    struct UnavailableNotifications;

    #[async_trait]
    impl NotificationStore for UnavailableNotifications {
        async fn insert_batch(&self, _batch: &[Notification]) -> WorkflowResult<Vec<Uuid>> {
            Err(WorkflowError::Unavailable(sqlx::Error::PoolTimedOut))
        }
        async fn get_notification(&self, _id: Uuid) -> WorkflowResult<Option<Notification>> {
            Ok(None)
        }
        async fn list_notifications(
            &self,
            _recipient: Uuid,
            _query: &InboxQuery,
        ) -> WorkflowResult<Vec<Notification>> {
            Ok(vec![])
        }
        async fn count_notifications(&self, _recipient: Uuid, _unread: bool) -> WorkflowResult<u64> {
            Ok(0)
        }
        async fn mark_read(&self, _id: Uuid, _at: DateTime<Utc>) -> WorkflowResult<bool> {
            Ok(false)
        }
        async fn mark_all_read(&self, _recipient: Uuid, _at: DateTime<Utc>) -> WorkflowResult<u64> {
            Ok(0)
        }
        async fn delete_notification(&self, _id: Uuid) -> WorkflowResult<bool> {
            Ok(false)
        }
        async fn delete_all_notifications(&self, _recipient: Uuid) -> WorkflowResult<u64> {
            Ok(0)
        }
        async fn notification_stats(&self) -> WorkflowResult<NotificationStats> {
            Err(WorkflowError::Unavailable(sqlx::Error::PoolTimedOut))
        }
    }

    #[tokio::test]
    async fn test_dispatch_swallows_store_failure() {
        let store = store().await;
        let alice = register(&store, Role::Student, None).await;
        let fanout = FanoutService::new(
            Arc::new(UnavailableNotifications),
            store.clone(),
            store,
            Duration::from_secs(1),
        );

        let draft = NotificationDraft::new(NotificationType::ItemApproved, "Approved", "Done");
        assert!(fanout
            .notify(Recipients::User(alice), draft.clone())
            .await
            .is_err());
        assert_eq!(fanout.dispatch(Recipients::User(alice), draft).await, None);
    }
}
