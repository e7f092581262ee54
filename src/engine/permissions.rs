use crate::storage::models::{Identity, Role};

use super::roles::RoleStore;

/// Answers "may X act on Y" from roles alone. Never mutates, never fails;
/// unknown identities count as plain users.
#[derive(Debug, Clone, Copy)]
pub struct PermissionEvaluator<'a> {
    roles: &'a RoleStore,
}

impl<'a> PermissionEvaluator<'a> {
    pub fn new(roles: &'a RoleStore) -> Self {
        Self { roles }
    }

    /// The creator manages everyone, itself included. Admins manage plain
    /// users only, so never each other and never themselves.
    pub fn can_manage(&self, actor: Identity, target: Identity) -> bool {
        match self.roles.role_of(actor) {
            Role::Creator => true,
            Role::Admin => self.roles.role_of(target) == Role::User,
            Role::User => false,
        }
    }

    /// Like `can_manage`, but the creator is never a valid target.
    pub fn can_ban(&self, actor: Identity, target: Identity) -> bool {
        target != self.roles.creator() && self.can_manage(actor, target)
    }

    /// Whoever may ban a class of identity may lift that ban.
    pub fn can_unban(&self, actor: Identity, target: Identity) -> bool {
        self.can_ban(actor, target)
    }
}
