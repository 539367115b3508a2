//! Role gate.
//!
//! Access is literal membership in an allow-list. There is no hierarchy:
//! admin is not implicitly allowed anywhere it is not listed.

use crate::auth::models::{AuthenticatedUser, Role};
use crate::errors::{ClinicError, ClinicResult};

pub struct RoleGate;

impl RoleGate {
    /// True iff the caller's role is in `allowed`.
    pub fn check(user: &AuthenticatedUser, allowed: &[Role]) -> bool {
        allowed.contains(&user.role)
    }

    pub fn require(user: &AuthenticatedUser, allowed: &[Role]) -> ClinicResult<()> {
        if Self::check(user, allowed) {
            Ok(())
        } else {
            tracing::info!(username = %user.username, role = %user.role, "role not permitted");
            Err(ClinicError::Forbidden)
        }
    }
}

/// Allow-lists per operation.
pub mod policy {
    use super::Role::{self, Admin, Doctor, Nurse, Staff};

    pub const ANY_STAFF: &[Role] = &[Doctor, Nurse, Admin, Staff];

    pub const CREATE_PATIENT: &[Role] = &[Doctor, Nurse, Admin];
    pub const READ_PATIENT: &[Role] = ANY_STAFF;

    pub const CREATE_APPOINTMENT: &[Role] = ANY_STAFF;
    pub const RESCHEDULE_APPOINTMENT: &[Role] = &[Doctor, Admin];
    pub const CANCEL_APPOINTMENT: &[Role] = ANY_STAFF;
    pub const READ_APPOINTMENT: &[Role] = ANY_STAFF;

    pub const MANAGE_MEDICINE: &[Role] = &[Admin, Staff];
    pub const READ_MEDICINE: &[Role] = ANY_STAFF;

    pub const VIEW_REPORTS: &[Role] = &[Admin, Doctor];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            username: "u".to_string(),
            full_name: None,
            role,
        }
    }

    #[test]
    fn test_membership() {
        let allowed = [Role::Doctor, Role::Admin];
        assert!(RoleGate::check(&user(Role::Doctor), &allowed));
        assert!(RoleGate::check(&user(Role::Admin), &allowed));
        assert!(!RoleGate::check(&user(Role::Nurse), &allowed));
        assert!(!RoleGate::check(&user(Role::Staff), &allowed));
    }

    #[test]
    fn test_no_hierarchy() {
        // admin gets nothing that is not listed
        assert!(!RoleGate::check(&user(Role::Admin), &[Role::Doctor]));
        assert!(!RoleGate::check(&user(Role::Admin), &[]));
        assert!(matches!(
            RoleGate::require(&user(Role::Admin), &[Role::Nurse]),
            Err(ClinicError::Forbidden)
        ));
    }

    #[test]
    fn test_every_role_against_every_singleton() {
        for role in Role::ALL {
            for allowed in Role::ALL {
                assert_eq!(RoleGate::check(&user(role), &[allowed]), role == allowed);
            }
        }
    }

    #[test]
    fn test_policies() {
        assert!(RoleGate::require(&user(Role::Staff), policy::MANAGE_MEDICINE).is_ok());
        assert!(RoleGate::require(&user(Role::Doctor), policy::MANAGE_MEDICINE).is_err());
        assert!(RoleGate::require(&user(Role::Staff), policy::CREATE_PATIENT).is_err());
        assert!(RoleGate::require(&user(Role::Nurse), policy::RESCHEDULE_APPOINTMENT).is_err());
        assert!(RoleGate::require(&user(Role::Doctor), policy::VIEW_REPORTS).is_ok());
        assert!(RoleGate::require(&user(Role::Staff), policy::VIEW_REPORTS).is_err());
    }
}
