/// User directory persistence
use crate::{
    auth::{Role, UserRecord},
    content::ContentItem,
    db::{content::insert_item_with, parse_id, parse_timestamp, SqliteStore},
    error::{WorkflowError, WorkflowResult},
    store::UserDirectory,
};
use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};
use tracing::info;
use uuid::Uuid;

fn user_from_row(row: &SqliteRow) -> WorkflowResult<UserRecord> {
    let id: String = row.try_get("id")?;
    let role: String = row.try_get("role")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(UserRecord {
        id: parse_id(&id)?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: Role::from_str(&role)?,
        department: row.try_get("department")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait]
impl UserDirectory for SqliteStore {
    async fn register_user(&self, user: &UserRecord, account: &ContentItem) -> WorkflowResult<()> {
        let mut tx = self.pool().begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO users (id, name, email, role, department, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&user.department)
        .bind(user.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(WorkflowError::Validation(
                    "Email already registered".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        insert_item_with(&mut *tx, account).await?;
        tx.commit().await?;

        info!(user_id = %user.id, role = user.role.as_str(), "registered user");
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> WorkflowResult<Option<UserRecord>> {
        let row = sqlx::query(
            "SELECT id, name, email, role, department, created_at FROM users WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn active_user_ids(&self) -> WorkflowResult<Vec<Uuid>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT u.id FROM users u
            JOIN content_items c ON c.id = u.id AND c.kind = 'user_account'
            WHERE c.visibility = 'visible'
            ORDER BY u.created_at ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        ids.iter().map(|id| parse_id(id)).collect()
    }

    async fn admin_ids_for(&self, department: Option<&str>) -> WorkflowResult<Vec<Uuid>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM users
            WHERE role = 'admin' AND (department IS NULL OR department = ?)
            ORDER BY created_at ASC
            "#,
        )
        .bind(department)
        .fetch_all(self.pool())
        .await?;

        ids.iter().map(|id| parse_id(id)).collect()
    }
}
