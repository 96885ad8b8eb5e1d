/// Workflow orchestration
///
/// Each operation runs resolve scope, authorize, mutate, notify. The mutation
/// is a single atomic step at the store; notification only happens after it
/// committed and its failure never undoes the mutation.

pub mod moderation;
pub mod participation;
pub mod scope;

pub use moderation::{commit_with_retry, Committed, ModerationEngine};
pub use participation::{Participant, ParticipationManager};
pub use scope::{authorize, ensure_authorized, resolve_scope, AdminScope};

use crate::{
    auth::{NewUser, Principal, UserRecord},
    config::{ModerationConfig, NotificationConfig},
    content::{
        AccountDetails, Approval, ContentBody, ContentItem, ContentKind, EventPhase, EventUpdate,
        ForumReply, LikeStatus, Moderatable, ModerationAction, NewContent, NewReply, Transition,
        Visibility,
    },
    error::{WorkflowError, WorkflowResult},
    metrics,
    notify::{
        FanoutReport, FanoutService, InboxPage, InboxQuery, Notification, NotificationDraft,
        NotificationStats, NotificationType, Priority, Recipients,
    },
    store::{EntityStore, ForumStore, ItemFilter, NotificationStore, UserDirectory},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

/// Admin broadcast to every active user
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Broadcast {
    #[validate(length(min = 1, max = 100, message = "Title must be between 1 and 100 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 500, message = "Message must be between 1 and 500 characters"))]
    pub message: String,
    #[serde(default)]
    pub priority: Priority,
}

/// Moderation settings reported to administrators
#[derive(Debug, Clone, Serialize)]
pub struct ModerationSettings {
    /// Reported only; report counts never change visibility on their own
    pub auto_hide_threshold: u32,
    pub max_attempts: u32,
}

/// Paging for admin queues
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct QueuePage {
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn kind_label(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Event => "event",
        ContentKind::ForumPost => "forum post",
        ContentKind::Resource => "resource",
        ContentKind::UserAccount => "account",
    }
}

fn capitalized(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Owner, or an administrator whose scope covers the item
fn ensure_can_manage(principal: &Principal, item: &ContentItem) -> WorkflowResult<()> {
    if item.owner_id() == principal.user_id {
        return Ok(());
    }
    if principal.is_admin() {
        return ensure_authorized(&resolve_scope(principal), item);
    }
    Err(WorkflowError::Forbidden(
        "Only the owner or an administrator can modify this item".to_string(),
    ))
}

/// Why an interaction on a forum post was refused
fn closed_post_error(post: &ContentItem) -> WorkflowError {
    if post.approval() != Approval::Approved && post.visibility() == Visibility::Visible {
        WorkflowError::Validation("Cannot interact with an unapproved post".to_string())
    } else {
        WorkflowError::NotFound(format!("Forum post {} not found", post.id))
    }
}

fn record<T>(operation: &str, result: WorkflowResult<T>) -> WorkflowResult<T> {
    metrics::record_operation(operation, &result);
    result
}

/// Composes scope, moderation, participation and fan-out
#[derive(Clone)]
pub struct WorkflowOrchestrator {
    entities: Arc<dyn EntityStore>,
    users: Arc<dyn UserDirectory>,
    notifications: Arc<dyn NotificationStore>,
    forum: Arc<dyn ForumStore>,
    moderation: ModerationEngine,
    participation: ParticipationManager,
    fanout: FanoutService,
    settings: ModerationConfig,
}

impl WorkflowOrchestrator {
    pub fn new<S>(
        store: Arc<S>,
        moderation: &ModerationConfig,
        notifications: &NotificationConfig,
    ) -> Self
    where
        S: EntityStore + UserDirectory + NotificationStore + ForumStore + 'static,
    {
        let forum: Arc<dyn ForumStore> = store.clone();
        let entities: Arc<dyn EntityStore> = store.clone();
        let users: Arc<dyn UserDirectory> = store.clone();
        let notification_store: Arc<dyn NotificationStore> = store;

        Self {
            moderation: ModerationEngine::new(entities.clone(), moderation.max_attempts),
            participation: ParticipationManager::new(entities.clone(), moderation.max_attempts),
            fanout: FanoutService::new(
                notification_store.clone(),
                users.clone(),
                entities.clone(),
                notifications.dispatch_timeout(),
            ),
            entities,
            users,
            notifications: notification_store,
            forum,
            settings: moderation.clone(),
        }
    }

    /// Load the principal for a user id. Unknown ids and deactivated
    /// (hidden) accounts are Forbidden.
    pub async fn principal(&self, user_id: Uuid) -> WorkflowResult<Principal> {
        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or_else(|| WorkflowError::Forbidden("Unknown principal".to_string()))?;

        let deactivated = self
            .entities
            .get_item(user_id)
            .await?
            .is_some_and(|account| {
                account.kind() == ContentKind::UserAccount
                    && account.visibility() == Visibility::Hidden
            });
        if deactivated {
            debug!(user_id = %user_id, "deactivated account refused");
            return Err(WorkflowError::Forbidden("Account deactivated".to_string()));
        }

        Ok(Principal::from(&user))
    }

    /// Create the user record and its moderatable account item
    pub async fn register_user(&self, input: NewUser) -> WorkflowResult<UserRecord> {
        let user = input.into_record()?;
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

        let result = self.users.register_user(&user, &account).await.map(|_| user);
        record("register_user", result)
    }

    /// Create an item. Admin items are approved at once; everything else
    /// waits in the pending queue and the covering administrators are told.
    pub async fn create_item(
        &self,
        principal: &Principal,
        input: NewContent,
    ) -> WorkflowResult<ContentItem> {
        let result = self.try_create_item(principal, input).await;
        record("create_item", result)
    }

    async fn try_create_item(
        &self,
        principal: &Principal,
        input: NewContent,
    ) -> WorkflowResult<ContentItem> {
        let body = input.into_body(Utc::now())?;
        let approval = if principal.is_admin() {
            Approval::Approved
        } else {
            Approval::Pending
        };

        let mut item = ContentItem::new(
            principal.user_id,
            principal.department.clone(),
            body,
            approval,
        );
        if approval == Approval::Approved {
            item.approved_by = Some(principal.user_id);
        }

        self.entities.insert_item(&item).await?;
        info!(
            item_id = %item.id,
            kind = item.kind().as_str(),
            approval = approval.as_str(),
            "item created"
        );

        if approval == Approval::Pending {
            let label = kind_label(item.kind());
            self.fanout
                .dispatch(
                    Recipients::Administrators {
                        department: item.owner_department.clone(),
                    },
                    NotificationDraft::new(
                        NotificationType::ItemCreated,
                        format!("New {} pending approval", label),
                        format!("\"{}\" is waiting for review", item.display_title()),
                    )
                    .related(item.kind(), Some(item.id))
                    .sender(principal.user_id),
                )
                .await;
        }

        Ok(item)
    }

    /// Read one item. Pending or hidden items are only shown to their owner
    /// and to administrators whose scope covers them; everyone else gets a
    /// redacted copy of public items.
    pub async fn get_item(&self, principal: &Principal, item_id: Uuid) -> WorkflowResult<ContentItem> {
        let item = self
            .entities
            .get_item(item_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("Item {} not found", item_id)))?;

        let public = item.approval() == Approval::Approved && item.visibility() == Visibility::Visible;
        if ensure_can_manage(principal, &item).is_ok() {
            Ok(item)
        } else if public {
            Ok(item.redacted())
        } else {
            Err(WorkflowError::NotFound(format!("Item {} not found", item_id)))
        }
    }

    pub async fn approve_item(
        &self,
        principal: &Principal,
        item_id: Uuid,
    ) -> WorkflowResult<ContentItem> {
        let result = self.try_approve_item(principal, item_id).await;
        record("approve_item", result)
    }

    async fn try_approve_item(
        &self,
        principal: &Principal,
        item_id: Uuid,
    ) -> WorkflowResult<ContentItem> {
        principal.require_admin()?;
        let scope = resolve_scope(principal);
        let item = self
            .moderation
            .approve(&scope, principal.user_id, item_id)
            .await?;

        let label = kind_label(item.kind());
        self.fanout
            .dispatch(
                Recipients::User(item.owner_id()),
                NotificationDraft::new(
                    NotificationType::ItemApproved,
                    format!("{} approved", capitalized(label)),
                    format!(
                        "Your {} \"{}\" has been approved",
                        label,
                        item.display_title()
                    ),
                )
                .related(item.kind(), Some(item.id))
                .sender(principal.user_id),
            )
            .await;

        Ok(item)
    }

    /// Reject a pending item. The item is deleted; the owner is told why.
    pub async fn reject_item(
        &self,
        principal: &Principal,
        item_id: Uuid,
        reason: Option<String>,
    ) -> WorkflowResult<()> {
        let result = self.try_reject_item(principal, item_id, reason).await;
        record("reject_item", result)
    }

    async fn try_reject_item(
        &self,
        principal: &Principal,
        item_id: Uuid,
        reason: Option<String>,
    ) -> WorkflowResult<()> {
        principal.require_admin()?;
        let scope = resolve_scope(principal);
        let snapshot = self
            .moderation
            .reject(&scope, principal.user_id, item_id)
            .await?;

        let label = kind_label(snapshot.kind());
        let mut message = format!(
            "Your {} \"{}\" has been rejected",
            label,
            snapshot.display_title()
        );
        if let Some(reason) = reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            message.push_str(". Reason: ");
            message.push_str(reason);
        }

        self.fanout
            .dispatch(
                Recipients::User(snapshot.owner_id()),
                NotificationDraft::new(
                    NotificationType::ItemRejected,
                    format!("{} rejected", capitalized(label)),
                    message,
                )
                .related(snapshot.kind(), None)
                .sender(principal.user_id),
            )
            .await;

        Ok(())
    }

    pub async fn join_event(
        &self,
        principal: &Principal,
        event_id: Uuid,
    ) -> WorkflowResult<Participant> {
        let result = self.participation.join(event_id, principal.user_id).await;
        record("join_event", result)
    }

    pub async fn leave_event(&self, principal: &Principal, event_id: Uuid) -> WorkflowResult<()> {
        let result = self.participation.leave(event_id, principal.user_id).await;
        record("leave_event", result)
    }

    /// Visibility moderation (`hide`, `unhide`, `clear-reports`) on an item
    /// of the given kind. Hiding a user account deactivates it.
    pub async fn moderate(
        &self,
        principal: &Principal,
        kind: &str,
        item_id: Uuid,
        action: &str,
        reason: Option<String>,
    ) -> WorkflowResult<ContentItem> {
        let result = self
            .try_moderate(principal, kind, item_id, action, reason)
            .await;
        record("moderate", result)
    }

    async fn try_moderate(
        &self,
        principal: &Principal,
        kind: &str,
        item_id: Uuid,
        action: &str,
        reason: Option<String>,
    ) -> WorkflowResult<ContentItem> {
        principal.require_admin()?;
        let kind = ContentKind::from_str(kind)?;
        let action = ModerationAction::from_visibility_str(action)?;
        let scope = resolve_scope(principal);

        let item = self
            .moderation
            .apply(&scope, principal.user_id, item_id, Some(kind), action)
            .await?;

        if let Some(reason) = reason.as_deref().filter(|r| !r.trim().is_empty()) {
            info!(item_id = %item_id, action = action.as_str(), reason, "moderation reason");
        }

        Ok(item)
    }

    /// Send an announcement to every active user
    pub async fn broadcast(
        &self,
        principal: &Principal,
        input: Broadcast,
    ) -> WorkflowResult<FanoutReport> {
        let result = self.try_broadcast(principal, input).await;
        record("broadcast", result)
    }

    async fn try_broadcast(
        &self,
        principal: &Principal,
        input: Broadcast,
    ) -> WorkflowResult<FanoutReport> {
        principal.require_admin()?;
        let input = Broadcast {
            title: input.title.trim().to_string(),
            message: input.message.trim().to_string(),
            priority: input.priority,
        };
        input.validate()?;

        let report = self
            .fanout
            .notify(
                Recipients::AllActiveUsers,
                NotificationDraft::new(
                    NotificationType::SystemAnnouncement,
                    input.title,
                    input.message,
                )
                .sender(principal.user_id)
                .priority(input.priority),
            )
            .await?;

        info!(
            admin = %principal.user_id,
            delivered = report.delivered,
            failed = report.failed.len(),
            "broadcast sent"
        );
        Ok(report)
    }

    /// Edit an event's descriptive fields and tell its participants
    pub async fn update_event(
        &self,
        principal: &Principal,
        event_id: Uuid,
        update: EventUpdate,
    ) -> WorkflowResult<ContentItem> {
        let result = self.try_update_event(principal, event_id, update).await;
        record("update_event", result)
    }

    async fn try_update_event(
        &self,
        principal: &Principal,
        event_id: Uuid,
        update: EventUpdate,
    ) -> WorkflowResult<ContentItem> {
        if update.is_empty() {
            return Err(WorkflowError::Validation("No fields to update".to_string()));
        }

        let committed = commit_with_retry(
            self.entities.as_ref(),
            event_id,
            self.settings.max_attempts,
            |current| {
                ensure_can_manage(principal, current)?;
                let mut next = current.clone();
                let event = next.as_event_mut().ok_or_else(|| {
                    WorkflowError::NotFound(format!("Event {} not found", event_id))
                })?;
                update.clone().apply_to(event, Utc::now())?;
                Ok((next, Transition::Retain))
            },
        )
        .await?;

        let item = committed.after;
        info!(event_id = %event_id, editor = %principal.user_id, "event updated");

        self.fanout
            .dispatch(
                Recipients::EventParticipants(event_id),
                NotificationDraft::new(
                    NotificationType::ItemUpdated,
                    "Event updated",
                    format!("\"{}\" has been updated", item.display_title()),
                )
                .related(ContentKind::Event, Some(event_id))
                .sender(principal.user_id),
            )
            .await;

        Ok(item)
    }

    /// Move an event through its lifecycle. Participants hear about every
    /// actual change; cancellation is sent as its own notification type.
    pub async fn set_event_phase(
        &self,
        principal: &Principal,
        event_id: Uuid,
        phase: EventPhase,
    ) -> WorkflowResult<ContentItem> {
        let result = self.try_set_event_phase(principal, event_id, phase).await;
        record("set_event_phase", result)
    }

    async fn try_set_event_phase(
        &self,
        principal: &Principal,
        event_id: Uuid,
        phase: EventPhase,
    ) -> WorkflowResult<ContentItem> {
        let committed = commit_with_retry(
            self.entities.as_ref(),
            event_id,
            self.settings.max_attempts,
            |current| {
                ensure_can_manage(principal, current)?;
                let mut next = current.clone();
                let event = next.as_event_mut().ok_or_else(|| {
                    WorkflowError::NotFound(format!("Event {} not found", event_id))
                })?;
                event.phase = phase;
                Ok((next, Transition::Retain))
            },
        )
        .await?;

        let previous = committed.before.as_event().map(|e| e.phase);
        let item = committed.after;
        if previous == Some(phase) {
            return Ok(item);
        }

        info!(event_id = %event_id, phase = phase.as_str(), "event phase changed");

        let title = item.display_title().to_string();
        let draft = if phase == EventPhase::Cancelled {
            NotificationDraft::new(
                NotificationType::ItemCancelled,
                "Event cancelled",
                format!("\"{}\" has been cancelled", title),
            )
        } else {
            NotificationDraft::new(
                NotificationType::ItemUpdated,
                "Event updated",
                format!("\"{}\" is now {}", title, phase.as_str()),
            )
        };

        self.fanout
            .dispatch(
                Recipients::EventParticipants(event_id),
                draft
                    .related(ContentKind::Event, Some(event_id))
                    .sender(principal.user_id),
            )
            .await;

        Ok(item)
    }

    /// Delete an item as its owner or an authorized administrator. Event
    /// participants are told the event is cancelled.
    pub async fn delete_item(&self, principal: &Principal, item_id: Uuid) -> WorkflowResult<()> {
        let result = self.try_delete_item(principal, item_id).await;
        record("delete_item", result)
    }

    async fn try_delete_item(&self, principal: &Principal, item_id: Uuid) -> WorkflowResult<()> {
        let committed = commit_with_retry(
            self.entities.as_ref(),
            item_id,
            self.settings.max_attempts,
            |current| {
                if current.kind() == ContentKind::UserAccount {
                    return Err(WorkflowError::Validation(
                        "Accounts are deactivated, not deleted".to_string(),
                    ));
                }
                ensure_can_manage(principal, current)?;
                Ok((current.clone(), Transition::Purge))
            },
        )
        .await?;

        let item = committed.after;
        let participants: Vec<Uuid> = committed
            .removed_participants
            .into_iter()
            .filter(|id| *id != principal.user_id)
            .collect();
        info!(
            item_id = %item_id,
            kind = item.kind().as_str(),
            by = %principal.user_id,
            participants = participants.len(),
            "item deleted"
        );

        if item.kind() == ContentKind::Event && !participants.is_empty() {
            self.fanout
                .dispatch(
                    Recipients::Users(participants),
                    NotificationDraft::new(
                        NotificationType::ItemCancelled,
                        "Event cancelled",
                        format!("\"{}\" has been cancelled", item.display_title()),
                    )
                    .related(ContentKind::Event, None)
                    .sender(principal.user_id),
                )
                .await;
        }

        Ok(())
    }

    /// Flag an item for review. Returns the new report count.
    pub async fn report_item(&self, principal: &Principal, item_id: Uuid) -> WorkflowResult<u32> {
        let result = match self.entities.increment_report_count(item_id).await {
            Ok(Some(count)) => {
                info!(item_id = %item_id, reporter = %principal.user_id, count, "item reported");
                Ok(count)
            }
            Ok(None) => Err(WorkflowError::NotFound(format!("Item {} not found", item_id))),
            Err(e) => Err(e),
        };
        record("report_item", result)
    }

    /// Reply to an approved, visible forum post. The post author is told
    /// unless they wrote the reply.
    pub async fn reply_to_post(
        &self,
        principal: &Principal,
        post_id: Uuid,
        input: NewReply,
    ) -> WorkflowResult<ForumReply> {
        let result = self.try_reply_to_post(principal, post_id, input).await;
        record("reply_to_post", result)
    }

    async fn try_reply_to_post(
        &self,
        principal: &Principal,
        post_id: Uuid,
        input: NewReply,
    ) -> WorkflowResult<ForumReply> {
        let reply = input.into_reply(post_id, principal.user_id, Utc::now())?;
        let post = self.forum_post(post_id).await?;

        if !self.forum.insert_reply_if_open(&reply).await? {
            return Err(closed_post_error(&post));
        }
        info!(post_id = %post_id, reply_id = %reply.id, by = %principal.user_id, "reply posted");

        if post.owner_id() != principal.user_id {
            let name = self.display_name(principal.user_id).await;
            self.fanout
                .dispatch(
                    Recipients::User(post.owner_id()),
                    NotificationDraft::new(
                        NotificationType::Reply,
                        "New reply",
                        format!("{} replied to your post: {}", name, post.display_title()),
                    )
                    .related(ContentKind::ForumPost, Some(post_id))
                    .sender(principal.user_id),
                )
                .await;
        }

        Ok(reply)
    }

    /// Like or unlike a forum post. Only a new like notifies the author, and
    /// never for their own post.
    pub async fn toggle_like(&self, principal: &Principal, post_id: Uuid) -> WorkflowResult<LikeStatus> {
        let result = self.try_toggle_like(principal, post_id).await;
        record("toggle_like", result)
    }

    async fn try_toggle_like(&self, principal: &Principal, post_id: Uuid) -> WorkflowResult<LikeStatus> {
        let post = self.forum_post(post_id).await?;
        let status = self
            .forum
            .toggle_like(post_id, principal.user_id, Utc::now())
            .await?
            .ok_or_else(|| closed_post_error(&post))?;
        debug!(post_id = %post_id, by = %principal.user_id, liked = status.liked, "like toggled");

        if status.liked && post.owner_id() != principal.user_id {
            let name = self.display_name(principal.user_id).await;
            self.fanout
                .dispatch(
                    Recipients::User(post.owner_id()),
                    NotificationDraft::new(
                        NotificationType::Like,
                        "New like",
                        format!("{} liked your post: {}", name, post.display_title()),
                    )
                    .related(ContentKind::ForumPost, Some(post_id))
                    .sender(principal.user_id),
                )
                .await;
        }

        Ok(status)
    }

    /// Replies on a post the principal can see, oldest first
    pub async fn replies(&self, principal: &Principal, post_id: Uuid) -> WorkflowResult<Vec<ForumReply>> {
        let post = self.get_item(principal, post_id).await?;
        if post.kind() != ContentKind::ForumPost {
            return Err(WorkflowError::NotFound(format!("Forum post {} not found", post_id)));
        }
        self.forum.list_replies(post_id).await
    }

    async fn forum_post(&self, post_id: Uuid) -> WorkflowResult<ContentItem> {
        self.entities
            .get_item(post_id)
            .await?
            .filter(|item| item.kind() == ContentKind::ForumPost)
            .ok_or_else(|| WorkflowError::NotFound(format!("Forum post {} not found", post_id)))
    }

    async fn display_name(&self, user_id: Uuid) -> String {
        match self.users.get_user(user_id).await {
            Ok(Some(user)) => user.name,
            _ => "Someone".to_string(),
        }
    }

    /// Pending items within the administrator's scope, newest first
    pub async fn pending_queue(
        &self,
        principal: &Principal,
        kind: Option<ContentKind>,
        page: QueuePage,
    ) -> WorkflowResult<Vec<ContentItem>> {
        principal.require_admin()?;
        let scope = resolve_scope(principal);
        self.entities
            .list_items(&ItemFilter {
                kind,
                approval: Some(Approval::Pending),
                department: scope.department_filter(),
                needs_review: false,
                limit: page.limit,
                offset: page.offset,
            })
            .await
    }

    /// Reported or hidden items within the administrator's scope, most
    /// reported first
    pub async fn moderation_queue(
        &self,
        principal: &Principal,
        page: QueuePage,
    ) -> WorkflowResult<Vec<ContentItem>> {
        principal.require_admin()?;
        let scope = resolve_scope(principal);
        self.entities
            .list_items(&ItemFilter {
                department: scope.department_filter(),
                needs_review: true,
                limit: page.limit,
                offset: page.offset,
                ..Default::default()
            })
            .await
    }

    pub async fn participants(&self, event_id: Uuid) -> WorkflowResult<Vec<Participant>> {
        self.participation.participants(event_id).await
    }

    pub async fn joined_events(&self, user_id: Uuid) -> WorkflowResult<Vec<ContentItem>> {
        self.participation.joined_events(user_id).await
    }

    pub fn settings(&self, principal: &Principal) -> WorkflowResult<ModerationSettings> {
        principal.require_admin()?;
        Ok(ModerationSettings {
            auto_hide_threshold: self.settings.auto_hide_threshold,
            max_attempts: self.settings.max_attempts,
        })
    }

    // ========== Notification inbox ==========

    pub async fn list_notifications(
        &self,
        principal: &Principal,
        query: InboxQuery,
    ) -> WorkflowResult<InboxPage> {
        let recipient = principal.user_id;
        let notifications = self.notifications.list_notifications(recipient, &query).await?;
        let total = self
            .notifications
            .count_notifications(recipient, query.unread_only)
            .await?;
        let unread_count = self.notifications.count_notifications(recipient, true).await?;
        let limit = query.limit() as u64;

        Ok(InboxPage {
            notifications,
            page: query.page.max(1),
            pages: total.div_ceil(limit),
            total,
            unread_count,
        })
    }

    /// Load a notification owned by the principal
    async fn owned_notification(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> WorkflowResult<Notification> {
        let notification = self
            .notifications
            .get_notification(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("Notification {} not found", id)))?;

        if notification.recipient_id != principal.user_id {
            warn!(notification_id = %id, user_id = %principal.user_id, "notification access denied");
            return Err(WorkflowError::Forbidden(
                "Not the recipient of this notification".to_string(),
            ));
        }
        Ok(notification)
    }

    pub async fn mark_read(&self, principal: &Principal, id: Uuid) -> WorkflowResult<Notification> {
        let mut notification = self.owned_notification(principal, id).await?;
        if !notification.read {
            let now = Utc::now();
            self.notifications.mark_read(id, now).await?;
            notification.read = true;
            notification.read_at = Some(now);
        }
        Ok(notification)
    }

    pub async fn mark_all_read(&self, principal: &Principal) -> WorkflowResult<u64> {
        self.notifications
            .mark_all_read(principal.user_id, Utc::now())
            .await
    }

    pub async fn delete_notification(&self, principal: &Principal, id: Uuid) -> WorkflowResult<()> {
        self.owned_notification(principal, id).await?;
        if !self.notifications.delete_notification(id).await? {
            return Err(WorkflowError::NotFound(format!("Notification {} not found", id)));
        }
        Ok(())
    }

    pub async fn clear_notifications(&self, principal: &Principal) -> WorkflowResult<u64> {
        self.notifications
            .delete_all_notifications(principal.user_id)
            .await
    }

    pub async fn notification_stats(&self, principal: &Principal) -> WorkflowResult<NotificationStats> {
        principal.require_admin()?;
        self.notifications.notification_stats().await
    }
}
