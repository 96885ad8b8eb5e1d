/// Content items and their shared moderation state
///
/// Events, forum posts, resources and user accounts all carry the same
/// approval/visibility/report-count axes. The kind-specific fields live in
/// [`ContentBody`]; everything the moderation engine needs is reachable
/// through the [`Moderatable`] trait.

pub mod details;

pub use details::{
    AccountDetails, ContentBody, EventCategory, EventDetails, EventUpdate, ForumCategory,
    ForumPostDetails, ForumReply, LikeStatus, NewContent, NewEvent, NewForumPost, NewReply,
    NewResource, ResourceCategory, ResourceDetails,
};

use crate::error::{ConflictReason, WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content kinds sharing the moderation workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Event,
    ForumPost,
    Resource,
    UserAccount,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Event => "event",
            ContentKind::ForumPost => "forum_post",
            ContentKind::Resource => "resource",
            ContentKind::UserAccount => "user_account",
        }
    }

    /// Parses stored names and the short path forms (`post`, `user`)
    pub fn from_str(s: &str) -> WorkflowResult<Self> {
        match s.to_lowercase().as_str() {
            "event" => Ok(ContentKind::Event),
            "forum_post" | "post" => Ok(ContentKind::ForumPost),
            "resource" => Ok(ContentKind::Resource),
            "user_account" | "user" => Ok(ContentKind::UserAccount),
            _ => Err(WorkflowError::Validation(format!("Invalid content type: {}", s))),
        }
    }
}

/// Approval axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Approval {
    Pending,
    Approved,
    /// Only ever seen on the snapshot returned from a reject; rejected rows are purged.
    Rejected,
}

impl Approval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Approval::Pending => "pending",
            Approval::Approved => "approved",
            Approval::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> WorkflowResult<Self> {
        match s {
            "pending" => Ok(Approval::Pending),
            "approved" => Ok(Approval::Approved),
            "rejected" => Ok(Approval::Rejected),
            _ => Err(WorkflowError::Internal(format!("Invalid approval state: {}", s))),
        }
    }
}

/// Visibility axis, independent of approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Visible => "visible",
            Visibility::Hidden => "hidden",
        }
    }

    pub fn from_str(s: &str) -> WorkflowResult<Self> {
        match s {
            "visible" => Ok(Visibility::Visible),
            "hidden" => Ok(Visibility::Hidden),
            _ => Err(WorkflowError::Internal(format!("Invalid visibility: {}", s))),
        }
    }
}

/// Event lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventPhase {
    Upcoming,
    Ongoing,
    Completed,
    Cancelled,
}

impl EventPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventPhase::Upcoming => "upcoming",
            EventPhase::Ongoing => "ongoing",
            EventPhase::Completed => "completed",
            EventPhase::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> WorkflowResult<Self> {
        match s.to_lowercase().as_str() {
            "upcoming" => Ok(EventPhase::Upcoming),
            "ongoing" => Ok(EventPhase::Ongoing),
            "completed" => Ok(EventPhase::Completed),
            "cancelled" => Ok(EventPhase::Cancelled),
            _ => Err(WorkflowError::Validation(format!("Invalid event status: {}", s))),
        }
    }
}

/// Moderation actions understood by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModerationAction {
    Approve,
    Reject,
    Hide,
    Unhide,
    ClearReports,
}

impl ModerationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationAction::Approve => "approve",
            ModerationAction::Reject => "reject",
            ModerationAction::Hide => "hide",
            ModerationAction::Unhide => "unhide",
            ModerationAction::ClearReports => "clear-reports",
        }
    }

    /// Parses the post-publication actions accepted by `moderate`
    pub fn from_visibility_str(s: &str) -> WorkflowResult<Self> {
        match s.to_lowercase().as_str() {
            "hide" => Ok(ModerationAction::Hide),
            "unhide" => Ok(ModerationAction::Unhide),
            "clear-reports" | "clear_reports" => Ok(ModerationAction::ClearReports),
            _ => Err(WorkflowError::Validation(format!("Invalid moderation action: {}", s))),
        }
    }
}

/// What the store must do after a successful transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Write the updated state back
    Retain,
    /// Delete the item (rejection)
    Purge,
}

/// Shared moderation state of every content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationState {
    pub approval: Approval,
    pub visibility: Visibility,
    pub report_count: u32,
}

impl ModerationState {
    /// Fresh state for a new item
    pub fn new(approval: Approval) -> Self {
        Self {
            approval,
            visibility: Visibility::Visible,
            report_count: 0,
        }
    }

    /// Apply an action in place.
    ///
    /// Approve and reject are only valid from Pending; hide, unhide and
    /// clear-reports are valid in any approval state and idempotent.
    pub fn apply(&mut self, action: ModerationAction) -> Result<Transition, ConflictReason> {
        match action {
            ModerationAction::Approve => {
                if self.approval != Approval::Pending {
                    return Err(ConflictReason::NotPending);
                }
                self.approval = Approval::Approved;
                Ok(Transition::Retain)
            }
            ModerationAction::Reject => {
                if self.approval != Approval::Pending {
                    return Err(ConflictReason::NotPending);
                }
                self.approval = Approval::Rejected;
                Ok(Transition::Purge)
            }
            ModerationAction::Hide => {
                self.visibility = Visibility::Hidden;
                Ok(Transition::Retain)
            }
            ModerationAction::Unhide => {
                self.visibility = Visibility::Visible;
                Ok(Transition::Retain)
            }
            ModerationAction::ClearReports => {
                self.report_count = 0;
                Ok(Transition::Retain)
            }
        }
    }

    /// Whether the item belongs in the moderation queue
    pub fn needs_review(&self) -> bool {
        self.report_count > 0 || self.visibility == Visibility::Hidden
    }
}

/// Capability shared by every moderatable kind
pub trait Moderatable {
    fn item_id(&self) -> Uuid;
    fn kind(&self) -> ContentKind;
    fn owner_id(&self) -> Uuid;
    fn owner_department(&self) -> Option<&str>;
    fn moderation(&self) -> &ModerationState;
    fn moderation_mut(&mut self) -> &mut ModerationState;
    /// Human-readable name used in notification messages
    fn display_title(&self) -> &str;

    fn approval(&self) -> Approval {
        self.moderation().approval
    }

    fn visibility(&self) -> Visibility {
        self.moderation().visibility
    }

    fn report_count(&self) -> u32 {
        self.moderation().report_count
    }
}

/// A stored content item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_department: Option<String>,
    pub moderation: ModerationState,
    pub body: ContentBody,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token, bumped on every write
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn new(
        owner_id: Uuid,
        owner_department: Option<String>,
        body: ContentBody,
        approval: Approval,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), owner_id, owner_department, body, approval)
    }

    pub fn with_id(
        id: Uuid,
        owner_id: Uuid,
        owner_department: Option<String>,
        body: ContentBody,
        approval: Approval,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner_id,
            owner_department,
            moderation: ModerationState::new(approval),
            body,
            approved_by: None,
            approved_at: (approval == Approval::Approved).then_some(now),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn as_event(&self) -> Option<&EventDetails> {
        match &self.body {
            ContentBody::Event(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_event_mut(&mut self) -> Option<&mut EventDetails> {
        match &mut self.body {
            ContentBody::Event(event) => Some(event),
            _ => None,
        }
    }

    /// Strip owner-private fields for readers who cannot manage the item
    pub fn redacted(mut self) -> Self {
        if let ContentBody::UserAccount(account) = &mut self.body {
            account.email.clear();
        }
        self
    }

    /// Prepare the next version of this item for a compare-and-swap write
    pub fn next_version(&self) -> Self {
        let mut next = self.clone();
        next.version = self.version + 1;
        next.updated_at = Utc::now();
        next
    }
}

impl Moderatable for ContentItem {
    fn item_id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> ContentKind {
        self.body.kind()
    }

    fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    fn owner_department(&self) -> Option<&str> {
        self.owner_department.as_deref()
    }

    fn moderation(&self) -> &ModerationState {
        &self.moderation
    }

    fn moderation_mut(&mut self) -> &mut ModerationState {
        &mut self.moderation
    }

    fn display_title(&self) -> &str {
        self.body.title()
    }
}
