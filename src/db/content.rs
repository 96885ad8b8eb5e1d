/// Content item and participation persistence
use crate::{
    content::{Approval, ContentBody, ContentItem, ModerationState, Visibility},
    db::{parse_id, parse_optional_id, parse_optional_timestamp, parse_timestamp, SqliteStore},
    error::{WorkflowError, WorkflowResult},
    store::{EntityStore, ItemFilter},
    workflow::participation::Participant,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Executor, QueryBuilder, Row, Sqlite};
use uuid::Uuid;

const ITEM_COLUMNS: &str = "id, kind, owner_id, owner_department, approval, visibility, \
     report_count, details, approved_by, approved_at, version, created_at, updated_at";

const DEFAULT_LIST_LIMIT: i64 = 50;

/// Parse a content_items row
fn item_from_row(row: &SqliteRow) -> WorkflowResult<ContentItem> {
    let id: String = row.try_get("id")?;
    let owner_id: String = row.try_get("owner_id")?;
    let approval: String = row.try_get("approval")?;
    let visibility: String = row.try_get("visibility")?;
    let report_count: i64 = row.try_get("report_count")?;
    let details: String = row.try_get("details")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    let body: ContentBody = serde_json::from_str(&details)
        .map_err(|e| WorkflowError::Internal(format!("Invalid details for item {}: {}", id, e)))?;

    Ok(ContentItem {
        id: parse_id(&id)?,
        owner_id: parse_id(&owner_id)?,
        owner_department: row.try_get("owner_department")?,
        moderation: ModerationState {
            approval: Approval::from_str(&approval)?,
            visibility: Visibility::from_str(&visibility)?,
            report_count: u32::try_from(report_count).unwrap_or(0),
        },
        body,
        approved_by: parse_optional_id(row.try_get("approved_by")?)?,
        approved_at: parse_optional_timestamp(row.try_get("approved_at")?)?,
        version: row.try_get("version")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn participant_from_row(row: &SqliteRow) -> WorkflowResult<Participant> {
    let event_id: String = row.try_get("event_id")?;
    let user_id: String = row.try_get("user_id")?;
    let joined_at: String = row.try_get("joined_at")?;

    Ok(Participant {
        event_id: parse_id(&event_id)?,
        user_id: parse_id(&user_id)?,
        joined_at: parse_timestamp(&joined_at)?,
    })
}

fn serialize_body(item: &ContentItem) -> WorkflowResult<String> {
    serde_json::to_string(&item.body)
        .map_err(|e| WorkflowError::Internal(format!("Failed to encode item {}: {}", item.id, e)))
}

/// Capacity and phase columns mirrored from event details
fn event_columns(item: &ContentItem) -> (Option<i64>, Option<&'static str>) {
    match item.as_event() {
        Some(event) => (Some(i64::from(event.capacity)), Some(event.phase.as_str())),
        None => (None, None),
    }
}

/// Insert a content item on any executor (pool or open transaction)
pub(super) async fn insert_item_with<'e, E>(executor: E, item: &ContentItem) -> WorkflowResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let details = serialize_body(item)?;
    let (capacity, phase) = event_columns(item);

    sqlx::query(
        r#"
        INSERT INTO content_items
        (id, kind, owner_id, owner_department, approval, visibility, report_count,
         capacity, phase, details, approved_by, approved_at, version, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(item.id.to_string())
    .bind(item.body.kind().as_str())
    .bind(item.owner_id.to_string())
    .bind(&item.owner_department)
    .bind(item.moderation.approval.as_str())
    .bind(item.moderation.visibility.as_str())
    .bind(i64::from(item.moderation.report_count))
    .bind(capacity)
    .bind(phase)
    .bind(details)
    .bind(item.approved_by.map(|id| id.to_string()))
    .bind(item.approved_at.map(|dt| dt.to_rfc3339()))
    .bind(item.version)
    .bind(item.created_at.to_rfc3339())
    .bind(item.updated_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn insert_item(&self, item: &ContentItem) -> WorkflowResult<()> {
        insert_item_with(self.pool(), item).await
    }

    async fn get_item(&self, id: Uuid) -> WorkflowResult<Option<ContentItem>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM content_items WHERE id = ?",
            ITEM_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn compare_and_swap(
        &self,
        item: &ContentItem,
        expected_version: i64,
    ) -> WorkflowResult<bool> {
        let details = serialize_body(item)?;
        let (capacity, phase) = event_columns(item);

        let result = sqlx::query(
            r#"
            UPDATE content_items
            SET owner_department = ?,
                approval = ?,
                visibility = ?,
                report_count = ?,
                capacity = ?,
                phase = ?,
                details = ?,
                approved_by = ?,
                approved_at = ?,
                version = ?,
                updated_at = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(&item.owner_department)
        .bind(item.moderation.approval.as_str())
        .bind(item.moderation.visibility.as_str())
        .bind(i64::from(item.moderation.report_count))
        .bind(capacity)
        .bind(phase)
        .bind(details)
        .bind(item.approved_by.map(|id| id.to_string()))
        .bind(item.approved_at.map(|dt| dt.to_rfc3339()))
        .bind(item.version)
        .bind(item.updated_at.to_rfc3339())
        .bind(item.id.to_string())
        .bind(expected_version)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_item(
        &self,
        id: Uuid,
        expected_version: i64,
    ) -> WorkflowResult<Option<Vec<Uuid>>> {
        let mut tx = self.pool().begin().await?;

        // Opens with a write so no join can slip in between this and the delete
        let removed: Vec<String> = sqlx::query_scalar(
            r#"
            DELETE FROM participants
            WHERE event_id = ?
              AND EXISTS (SELECT 1 FROM content_items WHERE id = ? AND version = ?)
            RETURNING user_id
            "#,
        )
        .bind(id.to_string())
        .bind(id.to_string())
        .bind(expected_version)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM content_items WHERE id = ? AND version = ?")
            .bind(id.to_string())
            .bind(expected_version)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        removed.iter().map(|raw| parse_id(raw)).collect::<WorkflowResult<_>>().map(Some)
    }

    async fn increment_report_count(&self, id: Uuid) -> WorkflowResult<Option<u32>> {
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE content_items
            SET report_count = report_count + 1,
                version = version + 1,
                updated_at = ?
            WHERE id = ?
            RETURNING report_count
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await?;

        Ok(count.map(|c| u32::try_from(c).unwrap_or(u32::MAX)))
    }

    async fn list_items(&self, filter: &ItemFilter) -> WorkflowResult<Vec<ContentItem>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM content_items WHERE 1 = 1",
            ITEM_COLUMNS
        ));

        if let Some(kind) = filter.kind {
            qb.push(" AND kind = ").push_bind(kind.as_str());
        }
        if let Some(approval) = filter.approval {
            qb.push(" AND approval = ").push_bind(approval.as_str());
        }
        if let Some(department) = &filter.department {
            qb.push(" AND owner_department = ").push_bind(department.clone());
        }
        if filter.needs_review {
            qb.push(" AND (report_count > 0 OR visibility = 'hidden')");
            qb.push(" ORDER BY report_count DESC, created_at DESC");
        } else {
            qb.push(" ORDER BY created_at DESC");
        }

        let limit = if filter.limit > 0 {
            filter.limit
        } else {
            DEFAULT_LIST_LIMIT
        };
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(filter.offset.max(0));

        let rows = qb.build().fetch_all(self.pool()).await?;
        rows.iter().map(item_from_row).collect()
    }

    async fn insert_participant_if_open(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        joined_at: DateTime<Utc>,
    ) -> WorkflowResult<bool> {
        // One statement: SQLite takes the write lock before evaluating the
        // SELECT, so the count and the insert see the same snapshot.
        let result = sqlx::query(
            r#"
            INSERT INTO participants (event_id, user_id, joined_at)
            SELECT ?1, ?2, ?3
            WHERE EXISTS (
                SELECT 1 FROM content_items c
                WHERE c.id = ?1
                  AND c.kind = 'event'
                  AND c.approval = 'approved'
                  AND c.phase = 'upcoming'
                  AND c.capacity > (SELECT COUNT(*) FROM participants p WHERE p.event_id = ?1)
            )
            AND NOT EXISTS (
                SELECT 1 FROM participants p WHERE p.event_id = ?1 AND p.user_id = ?2
            )
            "#,
        )
        .bind(event_id.to_string())
        .bind(user_id.to_string())
        .bind(joined_at.to_rfc3339())
        .execute(self.pool())
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() == 1),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_participant(&self, event_id: Uuid, user_id: Uuid) -> WorkflowResult<bool> {
        let result = sqlx::query("DELETE FROM participants WHERE event_id = ? AND user_id = ?")
            .bind(event_id.to_string())
            .bind(user_id.to_string())
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_participant(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> WorkflowResult<Option<Participant>> {
        let row = sqlx::query(
            "SELECT event_id, user_id, joined_at FROM participants WHERE event_id = ? AND user_id = ?",
        )
        .bind(event_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(participant_from_row).transpose()
    }

    async fn list_participants(&self, event_id: Uuid) -> WorkflowResult<Vec<Participant>> {
        let rows = sqlx::query(
            "SELECT event_id, user_id, joined_at FROM participants WHERE event_id = ? ORDER BY joined_at ASC",
        )
        .bind(event_id.to_string())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(participant_from_row).collect()
    }

    async fn count_participants(&self, event_id: Uuid) -> WorkflowResult<u32> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM participants WHERE event_id = ?")
            .bind(event_id.to_string())
            .fetch_one(self.pool())
            .await?;

        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn add_joined_event(&self, user_id: Uuid, event_id: Uuid) -> WorkflowResult<()> {
        sqlx::query("INSERT OR IGNORE INTO user_joined_events (user_id, event_id) VALUES (?, ?)")
            .bind(user_id.to_string())
            .bind(event_id.to_string())
            .execute(self.pool())
            .await?;

        Ok(())
    }

    async fn remove_joined_event(&self, user_id: Uuid, event_id: Uuid) -> WorkflowResult<()> {
        sqlx::query("DELETE FROM user_joined_events WHERE user_id = ? AND event_id = ?")
            .bind(user_id.to_string())
            .bind(event_id.to_string())
            .execute(self.pool())
            .await?;

        Ok(())
    }

    async fn joined_events(&self, user_id: Uuid) -> WorkflowResult<Vec<Uuid>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT event_id FROM user_joined_events WHERE user_id = ?")
                .bind(user_id.to_string())
                .fetch_all(self.pool())
                .await?;

        ids.iter().map(|id| parse_id(id)).collect()
    }
}
