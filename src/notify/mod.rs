/// Notification records and fan-out
///
/// Notifications are created only by the fan-out service, one record per
/// recipient. The only mutation afterwards is the recipient flipping `read`.

pub mod fanout;

pub use fanout::{FanoutReport, FanoutService};

use crate::{
    content::ContentKind,
    error::{WorkflowError, WorkflowResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Notification type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    ItemCreated,
    ItemApproved,
    ItemRejected,
    ItemUpdated,
    ItemCancelled,
    Like,
    Reply,
    SystemAnnouncement,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::ItemCreated => "item_created",
            NotificationType::ItemApproved => "item_approved",
            NotificationType::ItemRejected => "item_rejected",
            NotificationType::ItemUpdated => "item_updated",
            NotificationType::ItemCancelled => "item_cancelled",
            NotificationType::Like => "like",
            NotificationType::Reply => "reply",
            NotificationType::SystemAnnouncement => "system_announcement",
        }
    }

    pub fn from_str(s: &str) -> WorkflowResult<Self> {
        match s {
            "item_created" => Ok(NotificationType::ItemCreated),
            "item_approved" => Ok(NotificationType::ItemApproved),
            "item_rejected" => Ok(NotificationType::ItemRejected),
            "item_updated" => Ok(NotificationType::ItemUpdated),
            "item_cancelled" => Ok(NotificationType::ItemCancelled),
            "like" => Ok(NotificationType::Like),
            "reply" => Ok(NotificationType::Reply),
            "system_announcement" => Ok(NotificationType::SystemAnnouncement),
            _ => Err(WorkflowError::Internal(format!("Invalid notification type: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn from_str(s: &str) -> WorkflowResult<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(WorkflowError::Validation(format!("Invalid priority: {}", s))),
        }
    }
}

/// What a notification is about. `id` is None once the item was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub kind: ContentKind,
    pub id: Option<Uuid>,
}

/// Stored notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub related: Option<RelatedEntity>,
    pub priority: Priority,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One logical notification before it is addressed to recipients
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub related: Option<RelatedEntity>,
    pub sender_id: Option<Uuid>,
    pub priority: Priority,
}

impl NotificationDraft {
    pub fn new(
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            notification_type,
            title: title.into(),
            message: message.into(),
            related: None,
            sender_id: None,
            priority: Priority::default(),
        }
    }

    pub fn related(mut self, kind: ContentKind, id: Option<Uuid>) -> Self {
        self.related = Some(RelatedEntity { kind, id });
        self
    }

    pub fn sender(mut self, sender_id: Uuid) -> Self {
        self.sender_id = Some(sender_id);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Build the per-recipient record. Generated text is clipped to the
    /// stored limits so long item titles never fail an insert.
    pub fn address_to(&self, recipient_id: Uuid, now: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            recipient_id,
            sender_id: self.sender_id,
            notification_type: self.notification_type,
            title: clip(&self.title, MAX_TITLE_CHARS),
            message: clip(&self.message, MAX_MESSAGE_CHARS),
            related: self.related,
            priority: self.priority,
            read: false,
            read_at: None,
            created_at: now,
        }
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Who a fan-out is addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    User(Uuid),
    Users(Vec<Uuid>),
    EventParticipants(Uuid),
    /// Admins whose scope covers the given owner department
    Administrators { department: Option<String> },
    AllActiveUsers,
}

/// Inbox paging
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct InboxQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub unread_only: bool,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

impl Default for InboxQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            unread_only: false,
        }
    }
}

impl InboxQuery {
    pub fn limit(&self) -> i64 {
        i64::from(self.limit.clamp(1, 100))
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }
}

/// Inbox page with counters
#[derive(Debug, Clone, Serialize)]
pub struct InboxPage {
    pub notifications: Vec<Notification>,
    pub page: u32,
    pub pages: u64,
    pub total: u64,
    pub unread_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeStats {
    pub notification_type: NotificationType,
    pub count: u64,
    pub unread: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationStats {
    pub by_type: Vec<TypeStats>,
    pub total: u64,
    pub unread: u64,
    pub read: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_respects_char_boundaries() {
        let text = "é".repeat(600);
        let draft = NotificationDraft::new(NotificationType::Like, "t", text);
        let n = draft.address_to(Uuid::new_v4(), Utc::now());
        assert_eq!(n.message.chars().count(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_inbox_query_paging() {
        let query = InboxQuery {
            page: 3,
            limit: 20,
            unread_only: false,
        };
        assert_eq!(query.offset(), 40);

        let clamped = InboxQuery {
            page: 0,
            limit: 1000,
            unread_only: true,
        };
        assert_eq!(clamped.limit(), 100);
        assert_eq!(clamped.offset(), 0);
    }

    #[test]
    fn test_type_round_trip_names() {
        for t in [
            NotificationType::ItemCreated,
            NotificationType::ItemRejected,
            NotificationType::SystemAnnouncement,
        ] {
            assert_eq!(NotificationType::from_str(t.as_str()).unwrap(), t);
        }
        assert!(NotificationType::from_str("event_reminder").is_err());
    }
}
