//! Room membership sets keyed by room id.
//!
//! Used for plan rooms, node rooms, and per-node typing sets. A room exists
//! only while it has members: the set is created on first insert and removed
//! as soon as it empties.

use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Default)]
pub struct RoomMap {
    rooms: HashMap<String, BTreeSet<String>>,
}

impl RoomMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `user_id` to `room_id`. Returns `false` if already a member.
    pub fn insert(&mut self, room_id: &str, user_id: &str) -> bool {
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(user_id.to_string())
    }

    /// Remove `user_id` from `room_id`, dropping the room if it empties.
    /// Returns `false` if the user was not a member.
    pub fn remove(&mut self, room_id: &str, user_id: &str) -> bool {
        let Some(members) = self.rooms.get_mut(room_id) else {
            return false;
        };
        let removed = members.remove(user_id);
        if members.is_empty() {
            self.rooms.remove(room_id);
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, room_id: &str, user_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|members| members.contains(user_id))
    }

    /// Members of a room in stable order. Unknown rooms are empty, not an error.
    #[must_use]
    pub fn members(&self, room_id: &str) -> Vec<String> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Members other than `exclude`.
    #[must_use]
    pub fn members_except(&self, room_id: &str, exclude: Option<&str>) -> Vec<String> {
        let Some(members) = self.rooms.get(room_id) else {
            return Vec::new();
        };
        members
            .iter()
            .filter(|m| Some(m.as_str()) != exclude)
            .cloned()
            .collect()
    }

    /// Remove `user_id` from every room it is in. Returns the affected rooms.
    pub fn remove_everywhere(&mut self, user_id: &str) -> Vec<String> {
        let affected: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, members)| members.contains(user_id))
            .map(|(room_id, _)| room_id.clone())
            .collect();
        for room_id in &affected {
            self.remove(room_id, user_id);
        }
        affected
    }

    #[must_use]
    pub fn has_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
