/// Administrative scope resolution
use crate::{
    auth::Principal,
    content::Moderatable,
    error::{WorkflowError, WorkflowResult},
};
use serde::Serialize;

/// Authorization boundary of an administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", content = "department", rename_all = "lowercase")]
pub enum AdminScope {
    /// Acts on every item
    Global,
    /// Acts only on items owned within this department
    Department(String),
}

impl AdminScope {
    /// Department to restrict listings to, if any
    pub fn department_filter(&self) -> Option<String> {
        match self {
            AdminScope::Global => None,
            AdminScope::Department(d) => Some(d.clone()),
        }
    }
}

/// Derive the scope from the principal's department. Never fails; an unset
/// or blank department is the global scope.
pub fn resolve_scope(principal: &Principal) -> AdminScope {
    match principal.department.as_deref().map(str::trim) {
        Some(d) if !d.is_empty() => AdminScope::Department(d.to_string()),
        _ => AdminScope::Global,
    }
}

pub fn authorize<M: Moderatable + ?Sized>(scope: &AdminScope, item: &M) -> bool {
    match scope {
        AdminScope::Global => true,
        AdminScope::Department(d) => item.owner_department() == Some(d.as_str()),
    }
}

/// [`authorize`], failing with Forbidden
pub fn ensure_authorized<M: Moderatable + ?Sized>(scope: &AdminScope, item: &M) -> WorkflowResult<()> {
    if authorize(scope, item) {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden(format!(
            "{} {} is outside your department",
            item.kind().as_str(),
            item.item_id()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::Role,
        content::{Approval, ContentBody, ContentItem, ForumCategory, ForumPostDetails},
    };
    use uuid::Uuid;

    fn admin(department: Option<&str>) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            role: Role::Admin,
            department: department.map(String::from),
        }
    }

    fn post(department: Option<&str>) -> ContentItem {
        ContentItem::new(
            Uuid::new_v4(),
            department.map(String::from),
            ContentBody::ForumPost(ForumPostDetails {
                title: "Study group".to_string(),
                content: "Anyone up for algorithms revision?".to_string(),
                category: ForumCategory::Academics,
                tags: vec![],
            }),
            Approval::Pending,
        )
    }

    #[test]
    fn test_resolve_scope() {
        assert_eq!(resolve_scope(&admin(None)), AdminScope::Global);
        assert_eq!(resolve_scope(&admin(Some("   "))), AdminScope::Global);
        assert_eq!(
            resolve_scope(&admin(Some("CS"))),
            AdminScope::Department("CS".to_string())
        );
    }

    #[test]
    fn test_global_authorizes_everything() {
        let scope = AdminScope::Global;
        assert!(authorize(&scope, &post(Some("EE"))));
        assert!(authorize(&scope, &post(None)));
    }

    #[test]
    fn test_department_requires_match() {
        let scope = AdminScope::Department("CS".to_string());
        assert!(authorize(&scope, &post(Some("CS"))));
        assert!(!authorize(&scope, &post(Some("EE"))));
        assert!(!authorize(&scope, &post(None)));

        let err = ensure_authorized(&scope, &post(Some("EE"))).unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));
    }
}
