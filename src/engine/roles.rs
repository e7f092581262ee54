use std::collections::{BTreeMap, HashMap};

use crate::storage::models::{Identity, Role};
use crate::utils::logging::log_corrupt_record;

use super::permissions::PermissionEvaluator;

/// Authoritative identity → role mapping. The creator is fixed at
/// construction and is not stored in the map, so nothing can overwrite it.
#[derive(Debug, Clone)]
pub struct RoleStore {
    creator: Identity,
    roles: HashMap<Identity, Role>,
}

impl RoleStore {
    pub fn new(creator: Identity) -> Self {
        Self {
            creator,
            roles: HashMap::new(),
        }
    }

    /// Rebuilds the store from a persisted role map. A stored `creator`
    /// role on any identity other than the configured creator is dropped.
    pub fn restore(creator: Identity, persisted: BTreeMap<Identity, Role>) -> Self {
        let mut store = Self::new(creator);
        for (id, role) in persisted {
            if id == creator {
                continue;
            }
            if role == Role::Creator {
                log_corrupt_record("roles", &id.to_string(), "second creator ignored");
                store.roles.insert(id, Role::User);
                continue;
            }
            store.roles.insert(id, role);
        }
        store
    }

    pub fn creator(&self) -> Identity {
        self.creator
    }

    pub fn role_of(&self, id: Identity) -> Role {
        if id == self.creator {
            return Role::Creator;
        }
        self.roles.get(&id).copied().unwrap_or(Role::User)
    }

    pub fn is_known(&self, id: Identity) -> bool {
        id == self.creator || self.roles.contains_key(&id)
    }

    /// Registers an identity with the default role. Returns true if it was new.
    pub fn ensure(&mut self, id: Identity) -> bool {
        if self.is_known(id) {
            return false;
        }
        self.roles.insert(id, Role::User);
        true
    }

    /// Grants admin. Ban status is the caller's precondition: the store
    /// does not know about bans.
    pub fn promote(&mut self, actor: Identity, target: Identity) -> bool {
        if target == self.creator || !PermissionEvaluator::new(self).can_manage(actor, target) {
            return false;
        }
        self.roles.insert(target, Role::Admin);
        true
    }

    /// Only the creator demotes, and only identities that are admins.
    pub fn demote(&mut self, actor: Identity, target: Identity) -> bool {
        if actor != self.creator || target == self.creator {
            return false;
        }
        match self.roles.get_mut(&target) {
            Some(role) if *role == Role::Admin => {
                *role = Role::User;
                true
            }
            _ => false,
        }
    }

    pub fn admins(&self) -> Vec<Identity> {
        let mut admins: Vec<Identity> = self
            .roles
            .iter()
            .filter(|(_, role)| **role == Role::Admin)
            .map(|(id, _)| *id)
            .collect();
        admins.sort_unstable();
        admins
    }

    /// Persisted form. The creator is written out for readability only.
    pub fn snapshot(&self) -> BTreeMap<Identity, Role> {
        let mut map: BTreeMap<Identity, Role> =
            self.roles.iter().map(|(id, role)| (*id, *role)).collect();
        map.insert(self.creator, Role::Creator);
        map
    }

    #[cfg(test)]
    pub(crate) fn set_role(&mut self, id: Identity, role: Role) {
        if id != self.creator && role != Role::Creator {
            self.roles.insert(id, role);
        }
    }
}
