//! # Room Orchestrator (C7)
//!
//! Owns the set of [`Room`]s and [`Connection`]s for one environment, keyed
//! by id, and answers room-to-room reachability queries over the
//! connection graph. Coordinate-agnostic: absolute positions are the
//! Environment's responsibility.
//!
//! Grounded on the teacher's adjacency-list dungeon graph, but restructured
//! per §9's "orchestrator backward edges" note: edges are stored once by
//! id, and traversal follows `passable`/`bidirectional` rather than
//! duplicated per-node adjacency lists.

use crate::error::{ThatchError, ThatchResult};
use crate::room::Room;
use pathfinding::directed::bfs::bfs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a connection behaves physically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionKind {
    Door,
    Passage,
    Stairs,
    Portal,
    Secret,
}

/// A spatial link between two rooms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub from_room_id: String,
    pub to_room_id: String,
    pub kind: ConnectionKind,
    pub bidirectional: bool,
    pub passable: bool,
}

/// Owns rooms and connections for one environment.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RoomOrchestrator {
    rooms: HashMap<String, Room>,
    connections: HashMap<String, Connection>,
}

impl RoomOrchestrator {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
            connections: HashMap::new(),
        }
    }

    pub fn add_room(&mut self, room: Room) {
        self.rooms.insert(room.id.clone(), room);
    }

    pub fn add_connection(&mut self, connection: Connection) {
        self.connections.insert(connection.id.clone(), connection);
    }

    pub fn get_room(&self, room_id: &str) -> ThatchResult<&Room> {
        self.rooms
            .get(room_id)
            .ok_or_else(|| ThatchError::NotFound(format!("room '{room_id}'")))
    }

    pub fn get_room_mut(&mut self, room_id: &str) -> ThatchResult<&mut Room> {
        self.rooms
            .get_mut(room_id)
            .ok_or_else(|| ThatchError::NotFound(format!("room '{room_id}'")))
    }

    pub fn get_connection(&self, connection_id: &str) -> ThatchResult<&Connection> {
        self.connections
            .get(connection_id)
            .ok_or_else(|| ThatchError::NotFound(format!("connection '{connection_id}'")))
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn room_ids(&self) -> impl Iterator<Item = &String> {
        self.rooms.keys()
    }

    /// Finds a room-to-room path as a BFS over the connection graph,
    /// following a connection `from -> to` when `passable` and `filter`
    /// both accept it, and the reverse direction too when `bidirectional`.
    /// Returns `None` if no such path exists.
    pub fn find_path(
        &self,
        from_room: &str,
        to_room: &str,
        filter: &dyn Fn(&Connection) -> bool,
    ) -> Option<Vec<String>> {
        if !self.rooms.contains_key(from_room) || !self.rooms.contains_key(to_room) {
            return None;
        }
        let successors = |room_id: &String| -> Vec<String> {
            let mut next: Vec<String> = self
                .connections
                .values()
                .filter(|c| c.passable && filter(c))
                .filter_map(|c| {
                    if &c.from_room_id == room_id {
                        Some(c.to_room_id.clone())
                    } else if c.bidirectional && &c.to_room_id == room_id {
                        Some(c.from_room_id.clone())
                    } else {
                        None
                    }
                })
                .collect();
            next.sort();
            next.dedup();
            next
        };
        bfs(&from_room.to_string(), |r| successors(r), |r| r == to_room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::Grid;

    fn room(id: &str) -> Room {
        Room::new(id, "chamber", Grid::Square { width: 5, height: 5 })
    }

    fn connection(id: &str, from: &str, to: &str, bidirectional: bool) -> Connection {
        Connection {
            id: id.to_string(),
            from_room_id: from.to_string(),
            to_room_id: to.to_string(),
            kind: ConnectionKind::Door,
            bidirectional,
            passable: true,
        }
    }

    #[test]
    fn finds_path_across_multiple_hops() {
        let mut orch = RoomOrchestrator::new();
        orch.add_room(room("a"));
        orch.add_room(room("b"));
        orch.add_room(room("c"));
        orch.add_connection(connection("c1", "a", "b", false));
        orch.add_connection(connection("c2", "b", "c", false));
        let path = orch.find_path("a", "c", &|_| true).unwrap();
        assert_eq!(path, vec!["a", "b", "c"]);
    }

    #[test]
    fn one_way_connection_blocks_reverse_traversal() {
        let mut orch = RoomOrchestrator::new();
        orch.add_room(room("a"));
        orch.add_room(room("b"));
        orch.add_connection(connection("c1", "a", "b", false));
        assert!(orch.find_path("a", "b", &|_| true).is_some());
        assert!(orch.find_path("b", "a", &|_| true).is_none());
    }

    #[test]
    fn bidirectional_connection_allows_both_directions() {
        let mut orch = RoomOrchestrator::new();
        orch.add_room(room("a"));
        orch.add_room(room("b"));
        orch.add_connection(connection("c1", "a", "b", true));
        assert!(orch.find_path("a", "b", &|_| true).is_some());
        assert!(orch.find_path("b", "a", &|_| true).is_some());
    }

    #[test]
    fn impassable_connection_is_excluded() {
        let mut orch = RoomOrchestrator::new();
        orch.add_room(room("a"));
        orch.add_room(room("b"));
        let mut conn = connection("c1", "a", "b", false);
        conn.passable = false;
        orch.add_connection(conn);
        assert!(orch.find_path("a", "b", &|_| true).is_none());
    }

    #[test]
    fn unknown_room_lookup_errors() {
        let orch = RoomOrchestrator::new();
        assert!(matches!(orch.get_room("nope"), Err(ThatchError::NotFound(_))));
    }
}
