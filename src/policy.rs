//! Ownership-based authorization shared by works, materials and work details.

use crate::database::models::User;
use crate::error::{ApiError, ApiResult};

/// An actor may mutate a record they own, or any record when they hold the "edit any work"
/// permission.
pub fn can_mutate(actor: &User, owner_id: i64) -> bool {
    actor.can_edit_any_work || actor.id == owner_id
}

pub fn ensure_can_mutate(actor: &User, owner_id: i64) -> ApiResult<()> {
    if can_mutate(actor, owner_id) {
        Ok(())
    } else {
        tracing::info!(actor = actor.id, owner = owner_id, "mutation denied");
        Err(ApiError::PermissionDenied)
    }
}

/// Groups, budget items and reserves are reference data.
pub fn ensure_privileged(actor: &User) -> ApiResult<()> {
    if actor.can_edit_any_work {
        Ok(())
    } else {
        Err(ApiError::PermissionDenied)
    }
}

/// Who a new or updated work should belong to. Non-privileged actors can only name themselves.
pub fn resolve_responsible(actor: &User, requested: Option<i64>) -> ApiResult<i64> {
    match requested {
        None => Ok(actor.id),
        Some(id) => {
            ensure_can_mutate(actor, id)?;
            Ok(id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, privileged: bool) -> User {
        User {
            id,
            username: format!("user{id}"),
            first_name: String::new(),
            last_name: String::new(),
            can_edit_any_work: privileged,
            is_active: true,
        }
    }

    #[test]
    fn owner_may_mutate_own_record() {
        assert!(can_mutate(&user(1, false), 1));
    }

    #[test]
    fn non_owner_is_denied() {
        assert!(!can_mutate(&user(1, false), 2));
        assert!(matches!(
            ensure_can_mutate(&user(1, false), 2),
            Err(ApiError::PermissionDenied)
        ));
    }

    #[test]
    fn override_permission_allows_any_owner() {
        assert!(can_mutate(&user(1, true), 2));
        assert!(ensure_privileged(&user(1, true)).is_ok());
        assert!(ensure_privileged(&user(1, false)).is_err());
    }

    #[test]
    fn responsible_defaults_to_actor() {
        assert_eq!(resolve_responsible(&user(7, false), None).unwrap(), 7);
        assert!(resolve_responsible(&user(7, false), Some(8)).is_err());
        assert_eq!(resolve_responsible(&user(7, true), Some(8)).unwrap(), 8);
    }
}
