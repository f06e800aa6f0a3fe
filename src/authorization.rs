//! Role-based authorization.
//!
//! One policy function decides every role-gated action:
//! 1. Nurse worklists (own tasks, assigned patients, today's agenda) → nurses only
//! 2. Account administration (deleting users, creating admins) → admins only
//! 3. Clinical CRUD → any authenticated user
//!
//! Default-deny for anything not listed.

use crate::error::ServiceError;
use crate::models::Role;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Actions whose permission depends on the caller's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `nurse-tasks/tasks/my-tasks/`
    ViewOwnTasks,
    /// `patients/assigned-to-me/`
    ViewAssignedPatients,
    /// `appointments/nurse-today/`
    ViewNurseAgenda,
    DeleteUser,
    /// Registering an account with role `admin`.
    CreateAdmin,
    /// Reading and writing patients, records, appointments and tasks.
    ManageClinicalData,
}

/// Why access was granted or denied, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    NurseWorklist,
    Administrator,
    Authenticated,
    Denied,
}

/// Result of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: AccessReason,
}

impl AccessDecision {
    fn allow(reason: AccessReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny() -> Self {
        Self {
            allowed: false,
            reason: AccessReason::Denied,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Authorization check
// ═══════════════════════════════════════════════════════════

pub fn authorize(role: Role, action: Action) -> AccessDecision {
    match action {
        Action::ViewOwnTasks | Action::ViewAssignedPatients | Action::ViewNurseAgenda => {
            if role == Role::Nurse {
                AccessDecision::allow(AccessReason::NurseWorklist)
            } else {
                AccessDecision::deny()
            }
        }
        Action::DeleteUser | Action::CreateAdmin => {
            if role == Role::Admin {
                AccessDecision::allow(AccessReason::Administrator)
            } else {
                AccessDecision::deny()
            }
        }
        Action::ManageClinicalData => AccessDecision::allow(AccessReason::Authenticated),
    }
}

/// `Err(Forbidden)` with the action's refusal message when `role` is denied.
pub fn ensure_allowed(role: Role, action: Action) -> Result<AccessReason, ServiceError> {
    let decision = authorize(role, action);
    if decision.allowed {
        Ok(decision.reason)
    } else {
        tracing::warn!(role = %role, action = ?action, "access denied");
        Err(ServiceError::forbidden(action))
    }
}

/// Human-readable refusal for a denied action.
pub fn denial_message(action: Action) -> &'static str {
    match action {
        Action::ViewOwnTasks => "Only nurses can view their tasks.",
        Action::ViewAssignedPatients => "Only nurses can view their assigned patients.",
        Action::ViewNurseAgenda => "Only nurses can view their appointments for today.",
        Action::DeleteUser => "Only administrators can delete users.",
        Action::CreateAdmin => "Only administrators can create administrator accounts.",
        Action::ManageClinicalData => "You do not have permission to perform this action.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worklists_are_nurse_only() {
        for action in [Action::ViewOwnTasks, Action::ViewAssignedPatients, Action::ViewNurseAgenda] {
            assert!(authorize(Role::Nurse, action).allowed);
            for role in [Role::Doctor, Role::Patient, Role::Admin] {
                let decision = authorize(role, action);
                assert!(!decision.allowed, "{role} must not reach {action:?}");
                assert_eq!(decision.reason, AccessReason::Denied);
            }
        }
    }

    #[test]
    fn administration_is_admin_only() {
        assert!(authorize(Role::Admin, Action::DeleteUser).allowed);
        assert!(authorize(Role::Admin, Action::CreateAdmin).allowed);
        assert!(!authorize(Role::Doctor, Action::DeleteUser).allowed);
        assert!(!authorize(Role::Nurse, Action::CreateAdmin).allowed);
    }

    #[test]
    fn ensure_allowed_maps_denial_to_forbidden() {
        assert_eq!(ensure_allowed(Role::Nurse, Action::ViewOwnTasks).unwrap(), AccessReason::NurseWorklist);
        let err = ensure_allowed(Role::Doctor, Action::ViewOwnTasks).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden("Only nurses can view their tasks.")));
    }

    #[test]
    fn clinical_data_open_to_every_role() {
        for role in Role::ALL {
            let decision = authorize(*role, Action::ManageClinicalData);
            assert!(decision.allowed);
            assert_eq!(decision.reason, AccessReason::Authenticated);
        }
    }
}
