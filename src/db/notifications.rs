/// Notification persistence
use crate::{
    content::ContentKind,
    db::{parse_id, parse_optional_id, parse_optional_timestamp, parse_timestamp, SqliteStore},
    error::WorkflowResult,
    notify::{
        InboxQuery, Notification, NotificationStats, NotificationType, Priority, RelatedEntity,
        TypeStats,
    },
    store::NotificationStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;
use uuid::Uuid;

const NOTIFICATION_COLUMNS: &str = "id, recipient_id, sender_id, notification_type, title, \
     message, entity_kind, entity_id, priority, is_read, read_at, created_at";

fn notification_from_row(row: &SqliteRow) -> WorkflowResult<Notification> {
    let id: String = row.try_get("id")?;
    let recipient_id: String = row.try_get("recipient_id")?;
    let notification_type: String = row.try_get("notification_type")?;
    let entity_kind: Option<String> = row.try_get("entity_kind")?;
    let priority: String = row.try_get("priority")?;
    let is_read: i64 = row.try_get("is_read")?;
    let created_at: String = row.try_get("created_at")?;

    let related = match entity_kind {
        Some(kind) => Some(RelatedEntity {
            kind: ContentKind::from_str(&kind)?,
            id: parse_optional_id(row.try_get("entity_id")?)?,
        }),
        None => None,
    };

    Ok(Notification {
        id: parse_id(&id)?,
        recipient_id: parse_id(&recipient_id)?,
        sender_id: parse_optional_id(row.try_get("sender_id")?)?,
        notification_type: NotificationType::from_str(&notification_type)?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        related,
        priority: Priority::from_str(&priority)?,
        read: is_read != 0,
        read_at: parse_optional_timestamp(row.try_get("read_at")?)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait]
impl NotificationStore for SqliteStore {
    async fn insert_batch(&self, batch: &[Notification]) -> WorkflowResult<Vec<Uuid>> {
        let mut failed = Vec::new();
        let mut tx = self.pool().begin().await?;

        for n in batch {
            let result = sqlx::query(
                r#"
                INSERT INTO notifications
                (id, recipient_id, sender_id, notification_type, title, message,
                 entity_kind, entity_id, priority, is_read, read_at, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(n.id.to_string())
            .bind(n.recipient_id.to_string())
            .bind(n.sender_id.map(|id| id.to_string()))
            .bind(n.notification_type.as_str())
            .bind(&n.title)
            .bind(&n.message)
            .bind(n.related.map(|r| r.kind.as_str()))
            .bind(n.related.and_then(|r| r.id).map(|id| id.to_string()))
            .bind(n.priority.as_str())
            .bind(n.read)
            .bind(n.read_at.map(|dt| dt.to_rfc3339()))
            .bind(n.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => {}
                // Constraint failures only abort the statement, not the transaction.
                // Anything else (busy, locked, I/O) fails the whole batch.
                Err(sqlx::Error::Database(db_err))
                    if db_err.is_foreign_key_violation()
                        || db_err.is_unique_violation()
                        || db_err.is_check_violation() =>
                {
                    debug!(recipient = %n.recipient_id, error = %db_err, "notification row rejected");
                    failed.push(n.id);
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;
        Ok(failed)
    }

    async fn get_notification(&self, id: Uuid) -> WorkflowResult<Option<Notification>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE id = ?",
            NOTIFICATION_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(notification_from_row).transpose()
    }

    async fn list_notifications(
        &self,
        recipient: Uuid,
        query: &InboxQuery,
    ) -> WorkflowResult<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM notifications
            WHERE recipient_id = ? AND (? = 0 OR is_read = 0)
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(recipient.to_string())
        .bind(query.unread_only)
        .bind(query.limit())
        .bind(query.offset())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(notification_from_row).collect()
    }

    async fn count_notifications(&self, recipient: Uuid, unread_only: bool) -> WorkflowResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ? AND (? = 0 OR is_read = 0)",
        )
        .bind(recipient.to_string())
        .bind(unread_only)
        .fetch_one(self.pool())
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn mark_read(&self, id: Uuid, at: DateTime<Utc>) -> WorkflowResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1, read_at = COALESCE(read_at, ?) WHERE id = ?",
        )
        .bind(at.to_rfc3339())
        .bind(id.to_string())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_all_read(&self, recipient: Uuid, at: DateTime<Utc>) -> WorkflowResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1, read_at = ? WHERE recipient_id = ? AND is_read = 0",
        )
        .bind(at.to_rfc3339())
        .bind(recipient.to_string())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, id: Uuid) -> WorkflowResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_all_notifications(&self, recipient: Uuid) -> WorkflowResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE recipient_id = ?")
            .bind(recipient.to_string())
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }

    async fn notification_stats(&self) -> WorkflowResult<NotificationStats> {
        let rows = sqlx::query(
            r#"
            SELECT notification_type,
                   COUNT(*) AS total,
                   SUM(CASE WHEN is_read = 0 THEN 1 ELSE 0 END) AS unread
            FROM notifications
            GROUP BY notification_type
            ORDER BY total DESC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        let mut by_type = Vec::with_capacity(rows.len());
        for row in &rows {
            let notification_type: String = row.try_get("notification_type")?;
            let count: i64 = row.try_get("total")?;
            let unread: i64 = row.try_get("unread")?;
            by_type.push(TypeStats {
                notification_type: NotificationType::from_str(&notification_type)?,
                count: count.max(0) as u64,
                unread: unread.max(0) as u64,
            });
        }

        let total = by_type.iter().map(|t| t.count).sum();
        let unread = by_type.iter().map(|t| t.unread).sum();

        Ok(NotificationStats {
            by_type,
            total,
            unread,
            read: total - unread,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{Role, UserRecord},
        content::{AccountDetails, Approval, ContentBody, ContentItem},
        db,
        error::WorkflowError,
        notify::NotificationDraft,
        store::UserDirectory,
    };

    async fn setup() -> (SqliteStore, Uuid) {
        let store = SqliteStore::new(db::create_memory_pool().await.unwrap());
        let user = UserRecord {
            id: Uuid::new_v4(),
            name: "Riley".to_string(),
            email: "riley@campus.edu".to_string(),
            role: Role::Student,
            department: None,
            created_at: Utc::now(),
        };
        let account = ContentItem::with_id(
            user.id,
            user.id,
            None,
            ContentBody::UserAccount(AccountDetails {
                name: user.name.clone(),
                email: user.email.clone(),
            }),
            Approval::Approved,
        );
        store.register_user(&user, &account).await.unwrap();
        (store, user.id)
    }

    fn draft(kind: NotificationType) -> NotificationDraft {
        NotificationDraft::new(kind, "Title", "Message").related(ContentKind::Event, None)
    }

    #[tokio::test]
    async fn test_batch_commits_valid_rows() {
        let (store, riley) = setup().await;
        let now = Utc::now();
        let good = draft(NotificationType::ItemApproved).address_to(riley, now);
        let bad = draft(NotificationType::ItemApproved).address_to(Uuid::new_v4(), now);

        let failed = store.insert_batch(&[good.clone(), bad.clone()]).await.unwrap();
        assert_eq!(failed, vec![bad.id]);

        let stored = store.get_notification(good.id).await.unwrap().unwrap();
        assert_eq!(stored, good);
        assert!(store.get_notification(bad.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_batch_propagates_non_constraint_errors() {
        let (store, riley) = setup().await;
        sqlx::query("DROP TABLE notifications")
            .execute(store.pool())
            .await
            .unwrap();

        let batch = [draft(NotificationType::SystemAnnouncement).address_to(riley, Utc::now())];
        let err = store.insert_batch(&batch).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_inbox_read_flow() {
        let (store, riley) = setup().await;
        let now = Utc::now();
        let batch: Vec<_> = (0..3)
            .map(|_| draft(NotificationType::ItemUpdated).address_to(riley, now))
            .collect();
        store.insert_batch(&batch).await.unwrap();

        assert!(store.mark_read(batch[0].id, Utc::now()).await.unwrap());
        assert_eq!(store.count_notifications(riley, true).await.unwrap(), 2);
        assert_eq!(store.count_notifications(riley, false).await.unwrap(), 3);

        let unread = store
            .list_notifications(
                riley,
                &InboxQuery {
                    unread_only: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(unread.len(), 2);
        assert!(unread.iter().all(|n| !n.read));

        assert_eq!(store.mark_all_read(riley, Utc::now()).await.unwrap(), 2);
        assert_eq!(store.count_notifications(riley, true).await.unwrap(), 0);

        assert!(store.delete_notification(batch[1].id).await.unwrap());
        assert!(!store.delete_notification(batch[1].id).await.unwrap());
        assert_eq!(store.delete_all_notifications(riley).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_stats_grouped_by_type() {
        let (store, riley) = setup().await;
        let now = Utc::now();
        let batch = vec![
            draft(NotificationType::ItemApproved).address_to(riley, now),
            draft(NotificationType::ItemApproved).address_to(riley, now),
            draft(NotificationType::SystemAnnouncement).address_to(riley, now),
        ];
        store.insert_batch(&batch).await.unwrap();
        store.mark_read(batch[2].id, now).await.unwrap();

        let stats = store.notification_stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.unread, 2);
        assert_eq!(stats.read, 1);
        assert_eq!(stats.by_type[0].notification_type, NotificationType::ItemApproved);
        assert_eq!(stats.by_type[0].count, 2);
    }
}
