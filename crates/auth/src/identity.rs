use std::collections::BTreeSet;

use notas_core::{EmailAddress, UserId};

use crate::Role;

/// Request-scoped authenticated identity.
///
/// Produced by the [`IdentityResolver`](crate::IdentityResolver) and passed
/// explicitly into service calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub user_id: UserId,
    pub email: EmailAddress,
    pub roles: BTreeSet<Role>,
}

impl AuthenticatedIdentity {
    pub fn new(user_id: UserId, email: EmailAddress, roles: BTreeSet<Role>) -> Self {
        Self { user_id, email, roles }
    }

    /// Authorities in `ROLE_<name>` form.
    pub fn authorities(&self) -> Vec<String> {
        self.roles.iter().map(Role::authority).collect()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.roles.contains(r))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// True when acting on `owner`'s data is allowed: self, or an admin.
    pub fn can_act_for(&self, owner: UserId) -> bool {
        self.user_id == owner || self.is_admin()
    }
}
