use std::collections::BTreeSet;

/// Collections that must stay cached for the session to remain navigable.
pub const DEFAULT_ESSENTIAL_COLLECTIONS: &[&str] = &[
    "rooms",
    "subscriptions",
    "permissions",
    "roles",
    "settings",
    "users",
];

/// Parts of the live session no cleanup step may remove or reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionResource {
    RoomList,
    Subscriptions,
    Permissions,
    OpenRoomInstance,
}

/// Allowlist/denylist handed to every cleanup step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGuard {
    protected: BTreeSet<SessionResource>,
    protected_room: Option<String>,
    essential_collections: BTreeSet<String>,
}

impl Default for SessionGuard {
    fn default() -> Self {
        Self::new(DEFAULT_ESSENTIAL_COLLECTIONS.iter().map(|c| c.to_string()))
    }
}

impl SessionGuard {
    pub fn new<I>(essential_collections: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            protected: [
                SessionResource::RoomList,
                SessionResource::Subscriptions,
                SessionResource::Permissions,
                SessionResource::OpenRoomInstance,
            ]
            .into_iter()
            .collect(),
            protected_room: None,
            essential_collections: essential_collections.into_iter().collect(),
        }
    }

    /// Same guard, additionally protecting `room_id`'s live instance.
    pub fn protecting_room(&self, room_id: Option<String>) -> Self {
        Self {
            protected_room: room_id,
            ..self.clone()
        }
    }

    pub fn protects(&self, resource: SessionResource) -> bool {
        self.protected.contains(&resource)
    }

    pub fn protected_room(&self) -> Option<&str> {
        self.protected_room.as_deref()
    }

    pub fn is_room_protected(&self, room_id: &str) -> bool {
        self.protects(SessionResource::OpenRoomInstance) && self.protected_room() == Some(room_id)
    }

    /// Collections eviction must leave alone, sorted.
    pub fn essential_collections(&self) -> Vec<String> {
        self.essential_collections.iter().cloned().collect()
    }

    pub fn allows_eviction_of(&self, collection: &str) -> bool {
        !self.essential_collections.contains(collection)
    }
}
