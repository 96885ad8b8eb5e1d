/// Kind-specific content fields and creation inputs
use super::{ContentKind, EventPhase};
use crate::error::{WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Academic,
    Sports,
    Cultural,
    Technical,
    Social,
    Workshop,
    Seminar,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForumCategory {
    General,
    Academics,
    Tech,
    Sports,
    Cultural,
    Help,
    Announcements,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceCategory {
    Notes,
    Assignments,
    PastPapers,
    Books,
    Presentations,
    Videos,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    pub title: String,
    pub description: String,
    pub category: EventCategory,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub capacity: u32,
    pub phase: EventPhase,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumPostDetails {
    pub title: String,
    pub content: String,
    pub category: ForumCategory,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDetails {
    pub title: String,
    pub description: String,
    pub category: ResourceCategory,
    pub subject: String,
    pub file_url: String,
    pub semester: Option<u8>,
}

/// Moderatable projection of a user account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountDetails {
    pub name: String,
    /// Empty once redacted for a reader other than the owner or an admin
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
}

/// A reply on a forum post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumReply {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Input for a new reply
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewReply {
    #[validate(length(min = 1, max = 2000, message = "Reply content must be between 1 and 2000 characters"))]
    pub content: String,
}

impl NewReply {
    pub fn into_reply(
        self,
        post_id: Uuid,
        author_id: Uuid,
        now: DateTime<Utc>,
    ) -> WorkflowResult<ForumReply> {
        let trimmed = NewReply {
            content: self.content.trim().to_string(),
        };
        trimmed.validate()?;

        Ok(ForumReply {
            id: Uuid::new_v4(),
            post_id,
            author_id,
            content: trimmed.content,
            created_at: now,
        })
    }
}

/// Like state of a post after a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeStatus {
    pub liked: bool,
    pub likes: u32,
}

/// Kind-specific part of a content item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentBody {
    Event(EventDetails),
    ForumPost(ForumPostDetails),
    Resource(ResourceDetails),
    UserAccount(AccountDetails),
}

impl ContentBody {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentBody::Event(_) => ContentKind::Event,
            ContentBody::ForumPost(_) => ContentKind::ForumPost,
            ContentBody::Resource(_) => ContentKind::Resource,
            ContentBody::UserAccount(_) => ContentKind::UserAccount,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ContentBody::Event(e) => &e.title,
            ContentBody::ForumPost(p) => &p.title,
            ContentBody::Resource(r) => &r.title,
            ContentBody::UserAccount(a) => &a.name,
        }
    }
}

/// Input for a new event
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewEvent {
    #[validate(length(min = 5, max = 100, message = "Title must be between 5 and 100 characters"))]
    pub title: String,
    #[validate(length(min = 10, max = 1000, message = "Description must be between 10 and 1000 characters"))]
    pub description: String,
    pub category: EventCategory,
    #[validate(length(min = 1, message = "Location is required"))]
    pub location: String,
    pub starts_at: DateTime<Utc>,
    #[validate(range(min = 1, message = "Max participants must be at least 1"))]
    pub capacity: u32,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Input for a new forum post
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewForumPost {
    #[validate(length(min = 5, max = 200, message = "Title must be between 5 and 200 characters"))]
    pub title: String,
    #[validate(length(min = 10, max = 5000, message = "Content must be between 10 and 5000 characters"))]
    pub content: String,
    pub category: ForumCategory,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Input for a new shared resource
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewResource {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 1000, message = "Description must be between 1 and 1000 characters"))]
    pub description: String,
    pub category: ResourceCategory,
    #[validate(length(min = 1, message = "Subject is required"))]
    pub subject: String,
    #[validate(length(min = 1, message = "File URL is required"))]
    pub file_url: String,
    #[validate(range(min = 1, max = 8, message = "Semester must be between 1 and 8"))]
    pub semester: Option<u8>,
}

/// Creation input, one variant per creatable kind
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NewContent {
    Event(NewEvent),
    ForumPost(NewForumPost),
    Resource(NewResource),
}

fn trimmed_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

impl NewContent {
    /// Trim, validate and convert into a stored body.
    ///
    /// `now` is the reference instant for the future-date rule on events.
    pub fn into_body(self, now: DateTime<Utc>) -> WorkflowResult<ContentBody> {
        match self {
            NewContent::Event(mut e) => {
                e.title = e.title.trim().to_string();
                e.description = e.description.trim().to_string();
                e.location = e.location.trim().to_string();
                e.validate()?;
                if e.starts_at <= now {
                    return Err(WorkflowError::Validation(
                        "Event date must be in the future".to_string(),
                    ));
                }
                Ok(ContentBody::Event(EventDetails {
                    title: e.title,
                    description: e.description,
                    category: e.category,
                    location: e.location,
                    starts_at: e.starts_at,
                    capacity: e.capacity,
                    phase: EventPhase::Upcoming,
                    tags: trimmed_tags(e.tags),
                }))
            }
            NewContent::ForumPost(mut p) => {
                p.title = p.title.trim().to_string();
                p.content = p.content.trim().to_string();
                p.validate()?;
                Ok(ContentBody::ForumPost(ForumPostDetails {
                    title: p.title,
                    content: p.content,
                    category: p.category,
                    tags: trimmed_tags(p.tags),
                }))
            }
            NewContent::Resource(mut r) => {
                r.title = r.title.trim().to_string();
                r.description = r.description.trim().to_string();
                r.subject = r.subject.trim().to_string();
                r.file_url = r.file_url.trim().to_string();
                r.validate()?;
                Ok(ContentBody::Resource(ResourceDetails {
                    title: r.title,
                    description: r.description,
                    category: r.category,
                    subject: r.subject,
                    file_url: r.file_url,
                    semester: r.semester,
                }))
            }
        }
    }
}

/// Partial update of an event's descriptive fields. Capacity is fixed at creation.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EventUpdate {
    #[validate(length(min = 5, max = 100, message = "Title must be between 5 and 100 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 10, max = 1000, message = "Description must be between 10 and 1000 characters"))]
    pub description: Option<String>,
    #[validate(length(min = 1, message = "Location is required"))]
    pub location: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
}

impl EventUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.starts_at.is_none()
            && self.tags.is_none()
    }

    /// Validate and write the provided fields onto `event`
    pub fn apply_to(mut self, event: &mut EventDetails, now: DateTime<Utc>) -> WorkflowResult<()> {
        self.title = self.title.map(|t| t.trim().to_string());
        self.description = self.description.map(|d| d.trim().to_string());
        self.location = self.location.map(|l| l.trim().to_string());
        self.validate()?;

        if let Some(starts_at) = self.starts_at {
            if starts_at <= now {
                return Err(WorkflowError::Validation(
                    "Event date must be in the future".to_string(),
                ));
            }
            event.starts_at = starts_at;
        }
        if let Some(title) = self.title {
            event.title = title;
        }
        if let Some(description) = self.description {
            event.description = description;
        }
        if let Some(location) = self.location {
            event.location = location;
        }
        if let Some(tags) = self.tags {
            event.tags = trimmed_tags(tags);
        }
        Ok(())
    }
}
