//! Participant identity
//!
//! The host session owns the user registry. This module only defines the
//! lookup interface the dispatch core needs, plus an in-memory roster used by
//! the in-process session hub and by tests.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// Opaque participant identifier assigned by the host session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Participant details as reported by the host registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Avatar image path
    pub avatar: String,
    /// Elevated role (session moderator/owner)
    pub is_privileged: bool,
    /// Currently connected to the session
    pub is_active: bool,
}

impl UserInfo {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: String::new(),
            is_privileged: false,
            is_active: false,
        }
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = avatar.into();
        self
    }

    pub fn privileged(mut self) -> Self {
        self.is_privileged = true;
        self
    }
}

/// Host user registry lookups
pub trait IdentityRegistry: Send + Sync {
    /// Resolve a participant by id
    fn get_user(&self, id: &UserId) -> Option<UserInfo>;

    /// Ids of all currently connected privileged participants
    fn list_active_privileged_ids(&self) -> Vec<UserId>;
}

/// In-memory session roster
#[derive(Default)]
pub struct SessionRoster {
    users: RwLock<HashMap<UserId, UserInfo>>,
}

impl SessionRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a participant
    pub fn upsert(&self, user: UserInfo) {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users.insert(user.id.clone(), user);
    }

    /// Remove a participant from the roster entirely
    pub fn remove(&self, id: &UserId) -> Option<UserInfo> {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users.remove(id)
    }

    /// Flip the connected flag; returns false if the user is unknown
    pub fn set_active(&self, id: &UserId, active: bool) -> bool {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        match users.get_mut(id) {
            Some(user) => {
                user.is_active = active;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdentityRegistry for SessionRoster {
    fn get_user(&self, id: &UserId) -> Option<UserInfo> {
        self.users
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    fn list_active_privileged_ids(&self) -> Vec<UserId> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<UserId> = users
            .values()
            .filter(|u| u.is_privileged && u.is_active)
            .map(|u| u.id.clone())
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privileged_ids_only_include_active() {
        let roster = SessionRoster::new();
        roster.upsert(UserInfo::new("gm-1", "Game Master").privileged());
        roster.upsert(UserInfo::new("gm-2", "Co-GM").privileged());
        roster.upsert(UserInfo::new("p-1", "Player"));

        roster.set_active(&"gm-1".into(), true);
        roster.set_active(&"p-1".into(), true);

        assert_eq!(roster.list_active_privileged_ids(), vec![UserId::from("gm-1")]);
    }

    #[test]
    fn test_set_active_unknown_user() {
        let roster = SessionRoster::new();
        assert!(!roster.set_active(&"ghost".into(), true));
        assert!(roster.is_empty());
    }

    #[test]
    fn test_user_id_serializes_as_plain_string() {
        let id = UserId::new("abc123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
    }
}
