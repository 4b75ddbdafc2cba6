//! Role-escalation guard
//!
//! Pure decision functions over (actor, target, requested change). The
//! only non-local input is the super-user count: when a check returns
//! `true` the caller must count the remaining (active) super users and
//! reject the change if the target is the last one. That read stays with
//! the caller so these functions never touch I/O.
//!
//! Hierarchy: super_user > admin > everyone else. Admins may only act on
//! ordinary accounts (no role, or the plain `user` role) and may only
//! hand out the `admin` role or take a role away.

use doorman_db::{User, UserRole};

use crate::error::AuthError;

/// The authenticated principal performing an admin operation
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: i64,
    pub role: Option<UserRole>,
}

impl Actor {
    pub fn new(id: i64, role: Option<UserRole>) -> Self {
        Self { id, role }
    }

    fn is_super_user(&self) -> bool {
        self.role == Some(UserRole::SuperUser)
    }

    fn is_admin(&self) -> bool {
        self.role == Some(UserRole::Admin)
    }

    fn has_admin_access(&self) -> bool {
        self.role.is_some_and(|r| r.has_admin_access())
    }
}

fn forbidden(msg: &str) -> AuthError {
    AuthError::Forbidden(msg.to_string())
}

/// Admin actors may only touch ordinary accounts
fn admin_target_guard(target_role: Option<UserRole>, verb: &str) -> Result<(), AuthError> {
    match target_role {
        None | Some(UserRole::User) => Ok(()),
        Some(UserRole::SuperUser) => Err(AuthError::Forbidden(format!(
            "Admin users cannot {} super_user accounts",
            verb
        ))),
        Some(UserRole::Admin) => Err(AuthError::Forbidden(format!(
            "Admin users cannot {} other admin accounts",
            verb
        ))),
        Some(UserRole::Guest) | Some(UserRole::Service) => Err(AuthError::Forbidden(format!(
            "Admin users can only {} ordinary user accounts",
            verb
        ))),
    }
}

/// Authorize a role change on the target
///
/// Returns `true` when the change demotes a super user, in which case the
/// caller must verify that at least one other super user exists before
/// applying it.
pub fn check_role_change(
    actor: &Actor,
    target: &User,
    new_role: Option<UserRole>,
) -> Result<bool, AuthError> {
    if actor.id == target.id {
        return Err(forbidden("You cannot change your own role"));
    }

    if actor.is_super_user() {
        // No further restrictions
    } else if actor.is_admin() {
        if new_role == Some(UserRole::SuperUser) {
            return Err(forbidden("Admin users cannot assign super_user role"));
        }
        admin_target_guard(target.role, "modify")?;
        if !matches!(new_role, None | Some(UserRole::Admin)) {
            return Err(forbidden(
                "Admin users can only assign the admin role or remove roles from ordinary users",
            ));
        }
    } else {
        return Err(forbidden("Insufficient privileges to assign roles"));
    }

    Ok(target.role == Some(UserRole::SuperUser) && new_role != Some(UserRole::SuperUser))
}

/// Authorize enabling/disabling the target
///
/// Returns `true` when disabling a super user, in which case the caller
/// must verify that at least one other *active* super user remains.
pub fn check_status_change(
    actor: &Actor,
    target: &User,
    disabled: bool,
) -> Result<bool, AuthError> {
    if actor.id == target.id {
        return Err(forbidden("You cannot disable your own account"));
    }

    if actor.is_super_user() {
        // Fall through to the last-active-super-user guard
    } else if actor.is_admin() {
        admin_target_guard(target.role, "disable")?;
    } else {
        return Err(forbidden("Insufficient privileges to change user status"));
    }

    Ok(disabled && target.role == Some(UserRole::SuperUser))
}

/// Authorize creating a user with the given role
pub fn check_create(actor: &Actor, new_role: Option<UserRole>) -> Result<(), AuthError> {
    if !actor.has_admin_access() {
        return Err(forbidden("Insufficient privileges to create users"));
    }
    if actor.is_admin() && new_role == Some(UserRole::SuperUser) {
        return Err(forbidden("Admin users cannot create super_user accounts"));
    }
    Ok(())
}

/// Authorize a profile update on the target
///
/// Unlike the destructive operations, an admin may update their own
/// profile through this path.
pub fn check_update(actor: &Actor, target: &User) -> Result<(), AuthError> {
    if !actor.has_admin_access() {
        return Err(forbidden("Insufficient privileges to update users"));
    }
    if actor.is_admin() && actor.id != target.id {
        admin_target_guard(target.role, "modify")?;
    }
    Ok(())
}

/// Authorize deleting the target
///
/// Returns `true` when the target is a super user, in which case the
/// caller must verify that at least one other super user exists.
pub fn check_delete(actor: &Actor, target: &User) -> Result<bool, AuthError> {
    if actor.id == target.id {
        return Err(forbidden("You cannot delete your own account"));
    }
    if !actor.has_admin_access() {
        return Err(forbidden("Insufficient privileges to delete users"));
    }
    if actor.is_admin() {
        admin_target_guard(target.role, "delete")?;
    }
    Ok(target.role == Some(UserRole::SuperUser))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: i64, role: Option<UserRole>) -> User {
        let now = Utc::now();
        User {
            id,
            email: format!("user{}@example.com", id),
            username: format!("user{}", id),
            password_hash: Some("hash".to_string()),
            full_name: None,
            avatar: None,
            departments: None,
            role,
            disabled: false,
            is_verified: true,
            sso_mask: 0,
            pwd_reset_token: None,
            pwd_reset_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    const SUPER: Actor = Actor {
        id: 1,
        role: Some(UserRole::SuperUser),
    };
    const ADMIN: Actor = Actor {
        id: 2,
        role: Some(UserRole::Admin),
    };
    const PLAIN: Actor = Actor {
        id: 3,
        role: None,
    };

    #[test]
    fn test_admin_cannot_assign_super_user() {
        // Regardless of the target's current role
        for target_role in [None, Some(UserRole::User), Some(UserRole::Admin)] {
            let err = check_role_change(&ADMIN, &user(10, target_role), Some(UserRole::SuperUser))
                .unwrap_err();
            assert!(matches!(err, AuthError::Forbidden(_)));
        }
    }

    #[test]
    fn test_admin_cannot_touch_privileged_targets() {
        let su = user(10, Some(UserRole::SuperUser));
        let other_admin = user(11, Some(UserRole::Admin));

        assert!(check_role_change(&ADMIN, &su, None).is_err());
        assert!(check_role_change(&ADMIN, &other_admin, None).is_err());
        assert!(check_status_change(&ADMIN, &su, true).is_err());
        assert!(check_status_change(&ADMIN, &other_admin, true).is_err());
        assert!(check_delete(&ADMIN, &su).is_err());
        assert!(check_delete(&ADMIN, &other_admin).is_err());
        assert!(check_update(&ADMIN, &su).is_err());
        assert!(check_update(&ADMIN, &other_admin).is_err());
    }

    #[test]
    fn test_admin_may_promote_ordinary_user_to_admin() {
        let target = user(10, None);
        assert_eq!(
            check_role_change(&ADMIN, &target, Some(UserRole::Admin)).unwrap(),
            false
        );
        assert_eq!(check_role_change(&ADMIN, &target, None).unwrap(), false);
        // But never to anything else
        assert!(check_role_change(&ADMIN, &target, Some(UserRole::Service)).is_err());
    }

    #[test]
    fn test_self_actions_denied_even_for_super_user() {
        let me = user(SUPER.id, Some(UserRole::SuperUser));
        assert!(check_role_change(&SUPER, &me, None).is_err());
        assert!(check_status_change(&SUPER, &me, true).is_err());
        assert!(check_delete(&SUPER, &me).is_err());
        // Profile update on self is allowed
        assert!(check_update(&SUPER, &me).is_ok());
    }

    #[test]
    fn test_admin_self_update_allowed() {
        let me = user(ADMIN.id, Some(UserRole::Admin));
        assert!(check_update(&ADMIN, &me).is_ok());
    }

    #[test]
    fn test_unprivileged_actor_always_denied() {
        let target = user(10, None);
        assert!(check_role_change(&PLAIN, &target, None).is_err());
        assert!(check_status_change(&PLAIN, &target, true).is_err());
        assert!(check_create(&PLAIN, None).is_err());
        assert!(check_update(&PLAIN, &target).is_err());
        assert!(check_delete(&PLAIN, &target).is_err());

        let guest = Actor::new(4, Some(UserRole::Guest));
        assert!(check_role_change(&guest, &target, None).is_err());
    }

    #[test]
    fn test_super_user_demotion_flags_count_check() {
        let su = user(10, Some(UserRole::SuperUser));
        assert!(check_role_change(&SUPER, &su, Some(UserRole::Admin)).unwrap());
        assert!(check_role_change(&SUPER, &su, None).unwrap());
        // Keeping the role needs no count check
        assert!(!check_role_change(&SUPER, &su, Some(UserRole::SuperUser)).unwrap());
        // Demoting a non-super-user needs no count check
        assert!(!check_role_change(&SUPER, &user(11, Some(UserRole::Admin)), None).unwrap());
    }

    #[test]
    fn test_disable_super_user_flags_active_count_check() {
        let su = user(10, Some(UserRole::SuperUser));
        assert!(check_status_change(&SUPER, &su, true).unwrap());
        // Re-enabling never needs the check
        assert!(!check_status_change(&SUPER, &su, false).unwrap());
        assert!(!check_status_change(&SUPER, &user(11, None), true).unwrap());
    }

    #[test]
    fn test_delete_super_user_flags_count_check() {
        assert!(check_delete(&SUPER, &user(10, Some(UserRole::SuperUser))).unwrap());
        assert!(!check_delete(&SUPER, &user(10, Some(UserRole::Admin))).unwrap());
    }

    #[test]
    fn test_create_rules() {
        assert!(check_create(&SUPER, Some(UserRole::SuperUser)).is_ok());
        assert!(check_create(&ADMIN, Some(UserRole::Admin)).is_ok());
        assert!(check_create(&ADMIN, None).is_ok());
        assert!(check_create(&ADMIN, Some(UserRole::SuperUser)).is_err());
    }
}
