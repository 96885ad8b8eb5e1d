/// Entity Store contracts
///
/// The workflow components only see these traits. Every mutating method is a
/// single atomic step at the store boundary: conditional updates keyed by id
/// and version, conditional deletes, and a participant insert that checks
/// approval, phase, uniqueness and capacity in the same statement.
use crate::{
    auth::UserRecord,
    content::{Approval, ContentItem, ContentKind, ForumReply, LikeStatus},
    error::WorkflowResult,
    notify::{InboxQuery, Notification, NotificationStats},
    workflow::participation::Participant,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Listing filter for content items
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub kind: Option<ContentKind>,
    pub approval: Option<Approval>,
    /// Restrict to one owner department (department-scoped admins)
    pub department: Option<String>,
    /// Only items with reports or hidden visibility, most-reported first
    pub needs_review: bool,
    pub limit: i64,
    pub offset: i64,
}

/// Content items and participation
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn insert_item(&self, item: &ContentItem) -> WorkflowResult<()>;

    async fn get_item(&self, id: Uuid) -> WorkflowResult<Option<ContentItem>>;

    /// Write `item` only if the stored version still equals `expected_version`.
    /// Returns false when another writer got there first or the row is gone.
    async fn compare_and_swap(&self, item: &ContentItem, expected_version: i64)
        -> WorkflowResult<bool>;

    /// Delete only if the stored version still equals `expected_version`.
    /// Participant rows and joined-event references go with it. Returns the
    /// user ids of the removed participants, or None if the version moved.
    async fn delete_item(&self, id: Uuid, expected_version: i64)
        -> WorkflowResult<Option<Vec<Uuid>>>;

    /// Returns the new report count, or None if the item does not exist
    async fn increment_report_count(&self, id: Uuid) -> WorkflowResult<Option<u32>>;

    async fn list_items(&self, filter: &ItemFilter) -> WorkflowResult<Vec<ContentItem>>;

    /// Insert a participant row iff the event is approved, upcoming, not yet
    /// joined by this user and below capacity, all in one indivisible step.
    async fn insert_participant_if_open(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        joined_at: DateTime<Utc>,
    ) -> WorkflowResult<bool>;

    async fn delete_participant(&self, event_id: Uuid, user_id: Uuid) -> WorkflowResult<bool>;

    async fn get_participant(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> WorkflowResult<Option<Participant>>;

    async fn list_participants(&self, event_id: Uuid) -> WorkflowResult<Vec<Participant>>;

    async fn count_participants(&self, event_id: Uuid) -> WorkflowResult<u32>;

    /// Denormalized reference on the user side; secondary state
    async fn add_joined_event(&self, user_id: Uuid, event_id: Uuid) -> WorkflowResult<()>;

    async fn remove_joined_event(&self, user_id: Uuid, event_id: Uuid) -> WorkflowResult<()>;

    async fn joined_events(&self, user_id: Uuid) -> WorkflowResult<Vec<Uuid>>;
}

/// Principal records and recipient resolution
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert the user and its moderatable account item together
    async fn register_user(&self, user: &UserRecord, account: &ContentItem) -> WorkflowResult<()>;

    async fn get_user(&self, id: Uuid) -> WorkflowResult<Option<UserRecord>>;

    /// Users whose account item is visible
    async fn active_user_ids(&self) -> WorkflowResult<Vec<Uuid>>;

    /// Admins whose scope covers `department`: global admins plus, when a
    /// department is given, the admins of that department
    async fn admin_ids_for(&self, department: Option<&str>) -> WorkflowResult<Vec<Uuid>>;
}

/// Replies and likes on forum posts
#[async_trait]
pub trait ForumStore: Send + Sync {
    /// Insert only while the post exists, is approved and visible.
    /// Returns false when the post is not open.
    async fn insert_reply_if_open(&self, reply: &ForumReply) -> WorkflowResult<bool>;

    /// Oldest first
    async fn list_replies(&self, post_id: Uuid) -> WorkflowResult<Vec<ForumReply>>;

    /// Remove the user's like if present, otherwise add one if the post is
    /// open. None when a like was requested on a post that is not open.
    async fn toggle_like(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> WorkflowResult<Option<LikeStatus>>;
}

/// Notification records
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert every notification independently. Returns the ids of the rows
    /// that could not be stored; the rest are committed regardless.
    async fn insert_batch(&self, batch: &[Notification]) -> WorkflowResult<Vec<Uuid>>;

    async fn get_notification(&self, id: Uuid) -> WorkflowResult<Option<Notification>>;

    async fn list_notifications(
        &self,
        recipient: Uuid,
        query: &InboxQuery,
    ) -> WorkflowResult<Vec<Notification>>;

    async fn count_notifications(&self, recipient: Uuid, unread_only: bool) -> WorkflowResult<u64>;

    async fn mark_read(&self, id: Uuid, at: DateTime<Utc>) -> WorkflowResult<bool>;

    async fn mark_all_read(&self, recipient: Uuid, at: DateTime<Utc>) -> WorkflowResult<u64>;

    async fn delete_notification(&self, id: Uuid) -> WorkflowResult<bool>;

    async fn delete_all_notifications(&self, recipient: Uuid) -> WorkflowResult<u64>;

    async fn notification_stats(&self) -> WorkflowResult<NotificationStats>;
}
