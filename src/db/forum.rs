/// Forum reply and like persistence
use crate::{
    content::{ForumReply, LikeStatus},
    db::{parse_id, parse_timestamp, SqliteStore},
    error::WorkflowResult,
    store::ForumStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

fn reply_from_row(row: &SqliteRow) -> WorkflowResult<ForumReply> {
    let id: String = row.try_get("id")?;
    let post_id: String = row.try_get("post_id")?;
    let author_id: String = row.try_get("author_id")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(ForumReply {
        id: parse_id(&id)?,
        post_id: parse_id(&post_id)?,
        author_id: parse_id(&author_id)?,
        content: row.try_get("content")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait]
impl ForumStore for SqliteStore {
    async fn insert_reply_if_open(&self, reply: &ForumReply) -> WorkflowResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO forum_replies (id, post_id, author_id, content, created_at)
            SELECT ?1, ?2, ?3, ?4, ?5
            WHERE EXISTS (
                SELECT 1 FROM content_items c
                WHERE c.id = ?2
                  AND c.kind = 'forum_post'
                  AND c.approval = 'approved'
                  AND c.visibility = 'visible'
            )
            "#,
        )
        .bind(reply.id.to_string())
        .bind(reply.post_id.to_string())
        .bind(reply.author_id.to_string())
        .bind(&reply.content)
        .bind(reply.created_at.to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_replies(&self, post_id: Uuid) -> WorkflowResult<Vec<ForumReply>> {
        let rows = sqlx::query(
            "SELECT id, post_id, author_id, content, created_at FROM forum_replies \
             WHERE post_id = ? ORDER BY created_at ASC",
        )
        .bind(post_id.to_string())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(reply_from_row).collect()
    }

    async fn toggle_like(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> WorkflowResult<Option<LikeStatus>> {
        let mut tx = self.pool().begin().await?;

        let removed = sqlx::query("DELETE FROM post_likes WHERE post_id = ? AND user_id = ?")
            .bind(post_id.to_string())
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let liked = if removed == 1 {
            false
        } else {
            let inserted = sqlx::query(
                r#"
                INSERT INTO post_likes (post_id, user_id, liked_at)
                SELECT ?1, ?2, ?3
                WHERE EXISTS (
                    SELECT 1 FROM content_items c
                    WHERE c.id = ?1
                      AND c.kind = 'forum_post'
                      AND c.approval = 'approved'
                      AND c.visibility = 'visible'
                )
                "#,
            )
            .bind(post_id.to_string())
            .bind(user_id.to_string())
            .bind(at.to_rfc3339())
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if inserted != 1 {
                tx.rollback().await?;
                return Ok(None);
            }
            true
        };

        let likes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post_likes WHERE post_id = ?")
            .bind(post_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some(LikeStatus {
            liked,
            likes: u32::try_from(likes).unwrap_or(0),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{Role, UserRecord},
        content::{
            AccountDetails, Approval, ContentBody, ContentItem, ForumCategory, ForumPostDetails,
            Visibility,
        },
        db,
        store::{EntityStore, UserDirectory},
    };

    async fn store() -> SqliteStore {
        SqliteStore::new(db::create_memory_pool().await.unwrap())
    }

    async fn member(store: &SqliteStore, name: &str) -> Uuid {
        let user = UserRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@campus.edu", name.to_lowercase()),
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
        user.id
    }

    async fn post(store: &SqliteStore, owner: Uuid, approval: Approval) -> ContentItem {
        let item = ContentItem::new(
            owner,
            None,
            ContentBody::ForumPost(ForumPostDetails {
                title: "Best study spots".to_string(),
                content: "Share your favourite quiet corners".to_string(),
                category: ForumCategory::General,
                tags: vec![],
            }),
            approval,
        );
        store.insert_item(&item).await.unwrap();
        item
    }

    fn reply(post_id: Uuid, author_id: Uuid, content: &str) -> ForumReply {
        ForumReply {
            id: Uuid::new_v4(),
            post_id,
            author_id,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_reply_only_lands_on_open_posts() {
        let store = store().await;
        let author = member(&store, "Ada").await;
        let open = post(&store, author, Approval::Approved).await;
        let pending = post(&store, author, Approval::Pending).await;

        assert!(store
            .insert_reply_if_open(&reply(open.id, author, "The third floor"))
            .await
            .unwrap());
        assert!(!store
            .insert_reply_if_open(&reply(pending.id, author, "Nobody sees this"))
            .await
            .unwrap());
        assert!(!store
            .insert_reply_if_open(&reply(Uuid::new_v4(), author, "No such post"))
            .await
            .unwrap());

        let mut hidden = open.next_version();
        hidden.moderation.visibility = Visibility::Hidden;
        assert!(store.compare_and_swap(&hidden, open.version).await.unwrap());
        assert!(!store
            .insert_reply_if_open(&reply(open.id, author, "Too late"))
            .await
            .unwrap());

        let replies = store.list_replies(open.id).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].content, "The third floor");
        assert!(store.list_replies(pending.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replies_listed_oldest_first_and_removed_with_post() {
        let store = store().await;
        let author = member(&store, "Ada").await;
        let open = post(&store, author, Approval::Approved).await;

        let mut first = reply(open.id, author, "first");
        first.created_at = Utc::now() - chrono::Duration::minutes(5);
        let second = reply(open.id, author, "second");
        assert!(store.insert_reply_if_open(&second).await.unwrap());
        assert!(store.insert_reply_if_open(&first).await.unwrap());

        let contents: Vec<String> = store
            .list_replies(open.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.content)
            .collect();
        assert_eq!(contents, vec!["first", "second"]);

        assert!(store.delete_item(open.id, open.version).await.unwrap().is_some());
        assert!(store.list_replies(open.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_like_flips_and_counts() {
        let store = store().await;
        let author = member(&store, "Ada").await;
        let fan = member(&store, "Lin").await;
        let open = post(&store, author, Approval::Approved).await;
        let now = Utc::now();

        let status = store.toggle_like(open.id, fan, now).await.unwrap().unwrap();
        assert_eq!(status, LikeStatus { liked: true, likes: 1 });

        let status = store.toggle_like(open.id, author, now).await.unwrap().unwrap();
        assert_eq!(status, LikeStatus { liked: true, likes: 2 });

        let status = store.toggle_like(open.id, fan, now).await.unwrap().unwrap();
        assert_eq!(status, LikeStatus { liked: false, likes: 1 });
    }

    #[tokio::test]
    async fn test_like_refused_on_closed_post() {
        let store = store().await;
        let author = member(&store, "Ada").await;
        let pending = post(&store, author, Approval::Pending).await;

        assert!(store
            .toggle_like(pending.id, author, Utc::now())
            .await
            .unwrap()
            .is_none());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post_likes")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
