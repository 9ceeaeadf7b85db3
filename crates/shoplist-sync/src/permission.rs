//! Capability checks
//!
//! Access is decided solely by the share the user holds on the list:
//! editing needs `rw` or `owner`, destructive operations need `owner`. A
//! user without a share, or a list that does not exist, is denied.

use std::fmt;

use shoplist_core::domain::{ListId, ShareAccess, Shoppinglist, User};

use crate::ReconcileError;

/// What a caller wants to do to a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Edit,
    Delete,
}

impl Capability {
    pub fn allows(self, access: ShareAccess) -> bool {
        match self {
            Capability::Edit => access.can_edit(),
            Capability::Delete => access.can_delete(),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Edit => write!(f, "edit"),
            Capability::Delete => write!(f, "delete"),
        }
    }
}

/// Check `capability` for `user` on `list`, which was looked up by `list_id`
pub fn check(
    list: Option<&Shoppinglist>,
    list_id: ListId,
    user: &User,
    capability: Capability,
) -> Result<(), ReconcileError> {
    let access = list
        .and_then(|l| l.share(&user.email))
        .map(|share| share.access());
    match access {
        Some(access) if capability.allows(access) => Ok(()),
        _ => {
            tracing::debug!(%list_id, email = %user.email, %capability, "Permission denied");
            Err(ReconcileError::PermissionDenied {
                list_id,
                email: user.email.clone(),
                capability,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use shoplist_core::domain::{Email, Share, UserId};

    use super::*;

    fn email(s: &str) -> Email {
        s.parse().unwrap()
    }

    fn user(s: &str) -> User {
        User::new(UserId::new(1), email(s))
    }

    fn list_with(guest: &str, access: ShareAccess) -> Shoppinglist {
        let mut list = Shoppinglist::new("Groceries", email("owner@example.com"));
        let id = list.id();
        list.put_share(Share::new(email(guest), access, id));
        list
    }

    #[test]
    fn test_capability_matrix() {
        assert!(Capability::Edit.allows(ShareAccess::Owner));
        assert!(Capability::Edit.allows(ShareAccess::ReadWrite));
        assert!(!Capability::Edit.allows(ShareAccess::ReadOnly));
        assert!(Capability::Delete.allows(ShareAccess::Owner));
        assert!(!Capability::Delete.allows(ShareAccess::ReadWrite));
        assert!(!Capability::Delete.allows(ShareAccess::ReadOnly));
    }

    #[test]
    fn test_check_by_share() {
        let list = list_with("guest@example.com", ShareAccess::ReadWrite);
        let guest = user("guest@example.com");
        let owner = user("owner@example.com");

        assert!(check(Some(&list), list.id(), &guest, Capability::Edit).is_ok());
        assert!(check(Some(&list), list.id(), &guest, Capability::Delete).is_err());
        assert!(check(Some(&list), list.id(), &owner, Capability::Delete).is_ok());
    }

    #[test]
    fn test_readonly_and_strangers_denied() {
        let list = list_with("reader@example.com", ShareAccess::ReadOnly);
        let err = check(Some(&list), list.id(), &user("reader@example.com"), Capability::Edit)
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::PermissionDenied { capability: Capability::Edit, .. }
        ));

        assert!(check(Some(&list), list.id(), &user("stranger@example.com"), Capability::Edit).is_err());
        assert!(check(None, ListId::new(), &user("owner@example.com"), Capability::Edit).is_err());
    }
}
