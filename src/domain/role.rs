use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// The single authorization axis: every actor has exactly one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Taxpayer (WAJIB_PAJAK): sees and mutates only records they own
    WajibPajak,
    TaxOfficer,
    /// Sees records they own or are assigned to
    Consultant,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::WajibPajak => "wajib_pajak",
            UserRole::TaxOfficer => "tax_officer",
            UserRole::Consultant => "consultant",
            UserRole::Admin => "admin",
        }
    }

    /// Roles that see every record and may act on behalf of any owner
    pub fn is_privileged(&self) -> bool {
        matches!(self, UserRole::TaxOfficer | UserRole::Admin)
    }

    /// Staff roles eligible as assignees
    pub fn is_staff(&self) -> bool {
        matches!(
            self,
            UserRole::TaxOfficer | UserRole::Consultant | UserRole::Admin
        )
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wajib_pajak" => Ok(UserRole::WajibPajak),
            "tax_officer" => Ok(UserRole::TaxOfficer),
            "consultant" => Ok(UserRole::Consultant),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record visibility derived from the caller's role.
///
/// Non-privileged callers are forced into their own scope regardless of any
/// owner filter supplied with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Tax officers and admins: no owner restriction
    All,
    /// Consultants: records they own or are assigned to
    OwnedOrAssigned(Uuid),
    /// Taxpayers: records they own
    Owned(Uuid),
}

impl Scope {
    pub fn for_user(user_id: Uuid, role: UserRole) -> Self {
        match role {
            UserRole::TaxOfficer | UserRole::Admin => Scope::All,
            UserRole::Consultant => Scope::OwnedOrAssigned(user_id),
            UserRole::WajibPajak => Scope::Owned(user_id),
        }
    }

    /// Scope for resources without an assignee column (notifications, users)
    pub fn owner_only(user_id: Uuid, role: UserRole) -> Self {
        match role {
            UserRole::TaxOfficer | UserRole::Admin => Scope::All,
            _ => Scope::Owned(user_id),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Scope::All)
    }

    /// Whether a record with the given owner/assignee is visible in this scope
    pub fn permits(&self, owner_id: Uuid, assigned_to: Option<Uuid>) -> bool {
        match self {
            Scope::All => true,
            Scope::OwnedOrAssigned(me) => owner_id == *me || assigned_to == Some(*me),
            Scope::Owned(me) => owner_id == *me,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxpayer_scope_is_owner_bound() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let scope = Scope::for_user(me, UserRole::WajibPajak);
        assert!(scope.permits(me, None));
        assert!(!scope.permits(other, Some(me)));
    }

    #[test]
    fn consultant_sees_assigned_records() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let scope = Scope::for_user(me, UserRole::Consultant);
        assert!(scope.permits(other, Some(me)));
        assert!(!scope.permits(other, None));
    }

    #[test]
    fn officer_scope_is_unrestricted() {
        let scope = Scope::for_user(Uuid::new_v4(), UserRole::TaxOfficer);
        assert!(scope.is_unrestricted());
        assert!(scope.permits(Uuid::new_v4(), None));
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [
            UserRole::WajibPajak,
            UserRole::TaxOfficer,
            UserRole::Consultant,
            UserRole::Admin,
        ] {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
    }
}
