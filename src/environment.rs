//! # Environment & Query Aggregator (C9)
//!
//! Owns a [`RoomOrchestrator`], assigns each room an absolute origin, and
//! caches blocked hexes for fast global lookups. All three live behind one
//! `RwLock` per §5's shared-resource policy: readers (queries, pathfinding,
//! snapshot emission) take the read side; writers (theme/metadata changes,
//! wall damage propagating to the cache) take the write side and publish
//! their event before releasing it.
//!
//! Room-position packing is left implementation-defined by §9; this engine
//! lays rooms out left-to-right along the cube x-axis, sorted by room id,
//! with a fixed 2-hex margin between footprints — deterministic and
//! collision-free, never time- or hash-order-dependent.

use crate::capacity::{estimate_capacity, optimal_size, CapacityConstraints, CapacityEstimate, Profile};
use crate::coordinate::{
    cube_to_local, local_to_cube, CubeCoord, Dimensions, Grid, GridKind, HexOrientation, Position,
};
use crate::error::{ThatchError, ThatchResult};
use crate::events::{topics, EventBus};
use crate::orchestrator::{Connection, ConnectionKind, RoomOrchestrator};
use crate::pathfinder::{find_hex_path, NeverCancel, PathResult};
use crate::room::{EntityCommon, PlacedEntity, Room, RoomEntity, WallEntity};
use crate::walls::{WallKind, WallProperties};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

struct EnvironmentState {
    theme: String,
    metadata: HashMap<String, Value>,
    orchestrator: RoomOrchestrator,
    room_positions: HashMap<String, CubeCoord>,
    blocked_hexes: HashSet<CubeCoord>,
}

fn recompute_blocked_hexes(state: &mut EnvironmentState) {
    let room_ids: Vec<String> = state.orchestrator.room_ids().cloned().collect();
    let mut blocked = HashSet::new();
    for room_id in room_ids {
        let room = state
            .orchestrator
            .get_room(&room_id)
            .expect("room_ids() only yields ids present in the orchestrator");
        let origin = state
            .room_positions
            .get(&room_id)
            .copied()
            .unwrap_or_else(CubeCoord::origin);
        for pos in room.blocked_local_positions() {
            blocked.insert(origin + local_to_cube(&room.grid, pos));
        }
    }
    state.blocked_hexes = blocked;
}

/// A live environment: rooms, connections, and the absolute-coordinate
/// state derived from them.
pub struct Environment {
    id: String,
    env_type: String,
    state: RwLock<EnvironmentState>,
    event_bus: Arc<dyn EventBus>,
}

impl Environment {
    pub fn new(
        id: impl Into<String>,
        env_type: impl Into<String>,
        theme: impl Into<String>,
        orchestrator: RoomOrchestrator,
        room_positions: HashMap<String, CubeCoord>,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        let mut state = EnvironmentState {
            theme: theme.into(),
            metadata: HashMap::new(),
            orchestrator,
            room_positions,
            blocked_hexes: HashSet::new(),
        };
        recompute_blocked_hexes(&mut state);
        let id = id.into();
        event_bus.publish(
            topics::ENVIRONMENT_GENERATED,
            json!({ "environment_id": id }),
        );
        Self {
            id,
            env_type: env_type.into(),
            state: RwLock::new(state),
            event_bus,
        }
    }

    /// Lays rooms out left-to-right along the cube x-axis, sorted by room
    /// id, with a 2-hex margin — see the module-level note.
    pub fn pack_rooms(orchestrator: &RoomOrchestrator) -> HashMap<String, CubeCoord> {
        let mut ids: Vec<&String> = orchestrator.room_ids().collect();
        ids.sort();
        let mut positions = HashMap::new();
        let mut cursor = 0i32;
        for id in ids {
            positions.insert(id.clone(), CubeCoord::from_xz(cursor, 0));
            let room = orchestrator
                .get_room(id)
                .expect("listed id is present in the orchestrator");
            let (width, _) = room.grid.dimensions();
            cursor += width as i32 + 2;
        }
        positions
    }

    fn read_state(&self) -> RwLockReadGuard<'_, EnvironmentState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, EnvironmentState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn env_type(&self) -> &str {
        &self.env_type
    }

    pub fn theme(&self) -> String {
        self.read_state().theme.clone()
    }

    pub fn set_theme(&self, theme: impl Into<String>) {
        let theme = theme.into();
        {
            let mut state = self.write_state();
            state.theme = theme.clone();
        }
        self.event_bus.publish(
            topics::ENVIRONMENT_THEME_CHANGED,
            json!({ "environment_id": self.id, "theme": theme }),
        );
    }

    pub fn metadata(&self) -> HashMap<String, Value> {
        self.read_state().metadata.clone()
    }

    pub fn set_metadata(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        {
            let mut state = self.write_state();
            state.metadata.insert(key.clone(), value.clone());
        }
        self.event_bus.publish(
            topics::ENVIRONMENT_METADATA_CHANGED,
            json!({ "environment_id": self.id, "key": key, "value": value }),
        );
    }

    /// Finds the room containing `abs`, if any. Per §4.9: converts to each
    /// room's local cube coordinate and checks `0 ≤ x < width`,
    /// `0 ≤ z < height`. On overlap (which well-formed environments never
    /// produce) the lowest room id wins.
    pub fn get_room_at(&self, abs: CubeCoord) -> Option<String> {
        let state = self.read_state();
        let mut ids: Vec<&String> = state.room_positions.keys().collect();
        ids.sort();
        for room_id in ids {
            let origin = state.room_positions[room_id];
            let Ok(room) = state.orchestrator.get_room(room_id) else {
                continue;
            };
            let (width, height) = room.grid.dimensions();
            let relative = abs - origin;
            if relative.x >= 0
                && relative.x < width as i32
                && relative.z >= 0
                && relative.z < height as i32
            {
                return Some(room_id.clone());
            }
        }
        None
    }

    /// The absolute min and max corners of a room's footprint.
    pub fn get_room_bounds(&self, room_id: &str) -> ThatchResult<(CubeCoord, CubeCoord)> {
        let state = self.read_state();
        let room = state.orchestrator.get_room(room_id)?;
        let origin = *state
            .room_positions
            .get(room_id)
            .ok_or_else(|| ThatchError::NotFound(format!("position for room '{room_id}'")))?;
        let (width, height) = room.grid.dimensions();
        let far_corner = Position::new((width.max(1) - 1) as f64, (height.max(1) - 1) as f64);
        let max = origin + local_to_cube(&room.grid, far_corner);
        Ok((origin, max))
    }

    /// A defensive copy of the blocked-hex cache.
    pub fn get_blocked_hexes(&self) -> HashSet<CubeCoord> {
        self.read_state().blocked_hexes.clone()
    }

    /// Delegates to the hex-cube pathfinder using `blocked` directly, with
    /// no merge against the environment's own cache (callers that want both
    /// must union the sets themselves).
    pub fn find_path_cube(
        &self,
        from: CubeCoord,
        to: CubeCoord,
        blocked: &HashSet<CubeCoord>,
    ) -> ThatchResult<PathResult> {
        let is_blocked = |c: CubeCoord| blocked.contains(&c);
        find_hex_path(from, to, &is_blocked, &NeverCancel)
    }

    /// Damages a wall in place and refreshes the blocked-hex cache before
    /// publishing `room.modified` and releasing the write lock.
    pub fn damage_wall(&self, room_id: &str, wall_id: &str, amount: f64) -> ThatchResult<()> {
        {
            let mut state = self.write_state();
            state.orchestrator.get_room_mut(room_id)?.damage_wall(wall_id, amount)?;
            recompute_blocked_hexes(&mut state);
        }
        self.event_bus.publish(
            topics::ROOM_MODIFIED,
            json!({ "environment_id": self.id, "room_id": room_id, "wall_id": wall_id }),
        );
        Ok(())
    }

    /// Finds a room-to-room path over the connection graph, delegating to
    /// the orchestrator's BFS.
    pub fn query_path(
        &self,
        from_room: &str,
        to_room: &str,
        filter: &dyn Fn(&Connection) -> bool,
    ) -> Option<Vec<String>> {
        self.read_state().orchestrator.find_path(from_room, to_room, filter)
    }

    /// Pure pass-through to the capacity calculator; included here because
    /// it is one of the five query contracts in §6.
    pub fn query_capacity(
        &self,
        size: Dimensions,
        profile: &Profile,
        constraints: &CapacityConstraints,
    ) -> CapacityEstimate {
        estimate_capacity(size, profile, constraints)
    }

    /// Pure pass-through to the capacity calculator's sizing formula.
    pub fn query_sizing(&self, profile: &Profile, entity_count: i64) -> Dimensions {
        optimal_size(profile, entity_count)
    }

    pub fn query_entities(&self, filter: &EntityQuery) -> ThatchResult<Vec<EntitySummary>> {
        let result = self.query_entities_inner(filter);
        self.publish_query_outcome(&result);
        result
    }

    fn query_entities_inner(&self, filter: &EntityQuery) -> ThatchResult<Vec<EntitySummary>> {
        reject_unsupported_filters(filter.theme.as_deref(), filter.feature.as_deref())?;
        let state = self.read_state();
        let mut room_ids: Vec<&String> = state.orchestrator.room_ids().collect();
        room_ids.sort();

        let mut out = Vec::new();
        for room_id in room_ids {
            if let Some(wanted) = &filter.room_id {
                if wanted != room_id {
                    continue;
                }
            }
            let room = state.orchestrator.get_room(room_id)?;
            let origin = state
                .room_positions
                .get(room_id)
                .copied()
                .unwrap_or_else(CubeCoord::origin);
            let mut entity_ids: Vec<&String> = room.entities.keys().collect();
            entity_ids.sort();
            for entity_id in entity_ids {
                let entity = &room.entities[entity_id];
                if let Some(wanted_type) = &filter.entity_type {
                    if &entity.common().entity_type != wanted_type {
                        continue;
                    }
                }
                let local = room
                    .positions
                    .get(entity_id)
                    .copied()
                    .unwrap_or_else(|| Position::new(0.0, 0.0));
                out.push(EntitySummary {
                    id: entity_id.clone(),
                    entity_type: entity.common().entity_type.clone(),
                    room_id: room_id.clone(),
                    position: origin + local_to_cube(&room.grid, local),
                    blocks_movement: entity.blocks_movement(),
                });
            }
        }
        Ok(out)
    }

    pub fn query_rooms(&self, filter: &RoomQuery) -> ThatchResult<Vec<RoomSummary>> {
        let result = self.query_rooms_inner(filter);
        self.publish_query_outcome(&result);
        result
    }

    fn query_rooms_inner(&self, filter: &RoomQuery) -> ThatchResult<Vec<RoomSummary>> {
        reject_unsupported_filters(filter.theme.as_deref(), filter.feature.as_deref())?;
        let state = self.read_state();
        let mut room_ids: Vec<&String> = state.orchestrator.room_ids().collect();
        room_ids.sort();

        let mut out = Vec::new();
        for room_id in room_ids {
            let room = state.orchestrator.get_room(room_id)?;
            if let Some(wanted) = &filter.room_type {
                if &room.room_type != wanted {
                    continue;
                }
            }
            let origin = state
                .room_positions
                .get(room_id)
                .copied()
                .unwrap_or_else(CubeCoord::origin);
            let (width, height) = room.grid.dimensions();
            out.push(RoomSummary {
                id: room_id.clone(),
                room_type: room.room_type.clone(),
                origin,
                width,
                height,
            });
        }
        Ok(out)
    }

    fn publish_query_outcome<T>(&self, result: &ThatchResult<T>) {
        match result {
            Ok(_) => self
                .event_bus
                .publish(topics::QUERY_EXECUTED, json!({ "environment_id": self.id })),
            Err(e) => self.event_bus.publish(
                topics::QUERY_FAILED,
                json!({ "environment_id": self.id, "reason": e.to_string() }),
            ),
        }
    }

    /// Emits the portable snapshot record described in §6. Entities are
    /// walked in sorted-id order (never hashmap order) so the output is
    /// reproducible across runs with identical state.
    pub fn to_data(&self) -> EnvironmentData {
        let state = self.read_state();
        let mut room_ids: Vec<&String> = state.orchestrator.room_ids().collect();
        room_ids.sort();

        let mut zones = Vec::new();
        let mut entities = Vec::new();
        let mut walls = Vec::new();

        for room_id in room_ids {
            let room = state
                .orchestrator
                .get_room(room_id)
                .expect("listed id is present in the orchestrator");
            let origin = state
                .room_positions
                .get(room_id)
                .copied()
                .unwrap_or_else(CubeCoord::origin);
            let (width, height) = room.grid.dimensions();

            let mut entity_ids: Vec<String> = room.entities.keys().cloned().collect();
            entity_ids.sort();

            for entity_id in &entity_ids {
                let entity = &room.entities[entity_id];
                let local = room
                    .positions
                    .get(entity_id)
                    .copied()
                    .unwrap_or_else(|| Position::new(0.0, 0.0));
                let absolute = origin + local_to_cube(&room.grid, local);
                match entity {
                    RoomEntity::Wall(wall) => {
                        if wall.destroyed {
                            continue;
                        }
                        walls.push(WallSegmentData {
                            start: absolute,
                            end: absolute,
                            blocks_movement: wall.common.blocks_movement,
                            blocks_los: wall.common.blocks_los,
                        });
                    }
                    RoomEntity::Placed(placed) => {
                        entities.push(PlacedEntityData {
                            id: entity_id.clone(),
                            entity_type: placed.common.entity_type.clone(),
                            position: absolute,
                            size: placed.common.size.max(1),
                            blocks_movement: placed.common.blocks_movement,
                            blocks_los: placed.common.blocks_los,
                            zone_id: room_id.clone(),
                            subtype: placed.subtype.clone(),
                            properties: placed.properties.clone(),
                        });
                    }
                }
            }

            zones.push(ZoneData {
                id: room_id.clone(),
                room_type: room.room_type.clone(),
                origin,
                width,
                height,
                grid_shape: room.grid.kind(),
                orientation: room.grid.orientation(),
                entity_ids,
            });
        }

        walls.sort_by_key(|w| (w.start.x, w.start.y, w.start.z));

        let mut passages: Vec<PassageData> = state
            .orchestrator
            .connections()
            .map(|c| PassageData {
                id: c.id.clone(),
                from_zone_id: c.from_room_id.clone(),
                to_zone_id: c.to_room_id.clone(),
                controlling_entity_id: None,
                bidirectional: c.bidirectional,
            })
            .collect();
        passages.sort_by(|a, b| a.id.cmp(&b.id));

        EnvironmentData {
            id: self.id.clone(),
            env_type: self.env_type.clone(),
            theme: state.theme.clone(),
            metadata: state.metadata.clone(),
            zones,
            passages,
            entities,
            walls,
        }
    }

    /// Reconstructs an Environment from a snapshot. Placement conflicts are
    /// collected and returned alongside the environment rather than failing
    /// the whole load; an unknown zone reference or missing hex orientation
    /// is a fatal structural error.
    ///
    /// Wall segments carry no zone id in the portable record (§6), so each
    /// wall is attributed to the zone whose bounds contain its `start`
    /// coordinate, using the same containment rule as [`Environment::get_room_at`].
    pub fn from_data(
        data: EnvironmentData,
        event_bus: Arc<dyn EventBus>,
    ) -> ThatchResult<(Environment, Vec<String>)> {
        let mut orchestrator = RoomOrchestrator::new();
        let mut room_positions = HashMap::new();
        let mut non_fatal = Vec::new();

        for zone in &data.zones {
            let grid = match zone.grid_shape {
                GridKind::Hex => Grid::Hex {
                    orientation: zone.orientation.ok_or_else(|| {
                        ThatchError::InvalidConfig(format!(
                            "zone '{}' is a hex grid with no orientation",
                            zone.id
                        ))
                    })?,
                    width: zone.width,
                    height: zone.height,
                },
                GridKind::Square => Grid::Square {
                    width: zone.width,
                    height: zone.height,
                },
                GridKind::Gridless => Grid::Gridless {
                    width: zone.width,
                    height: zone.height,
                },
            };
            orchestrator.add_room(Room::new(zone.id.clone(), zone.room_type.clone(), grid));
            room_positions.insert(zone.id.clone(), zone.origin);
        }

        for entity in &data.entities {
            let origin = *room_positions.get(&entity.zone_id).ok_or_else(|| {
                ThatchError::InvalidConfig(format!(
                    "entity '{}' references unknown zone '{}'",
                    entity.id, entity.zone_id
                ))
            })?;
            let room = orchestrator.get_room_mut(&entity.zone_id).map_err(|_| {
                ThatchError::InvalidConfig(format!(
                    "entity '{}' references unknown zone '{}'",
                    entity.id, entity.zone_id
                ))
            })?;
            let local = cube_to_local(&room.grid, entity.position - origin);
            let placed = RoomEntity::Placed(PlacedEntity {
                common: EntityCommon {
                    id: entity.id.clone(),
                    entity_type: entity.entity_type.clone(),
                    size: entity.size.max(1),
                    blocks_movement: entity.blocks_movement,
                    blocks_los: entity.blocks_los,
                },
                subtype: entity.subtype.clone(),
                properties: entity.properties.clone(),
            });
            if let Err(e) = room.place_entity(placed, local) {
                non_fatal.push(format!("entity '{}': {e}", entity.id));
            }
        }

        for (idx, wall) in data.walls.iter().enumerate() {
            let owning_zone = data.zones.iter().find(|zone| {
                let relative = wall.start - zone.origin;
                relative.x >= 0
                    && relative.x < zone.width as i32
                    && relative.z >= 0
                    && relative.z < zone.height as i32
            });
            let Some(zone) = owning_zone else {
                non_fatal.push(format!(
                    "wall at ({}, {}, {}) does not fall within any zone",
                    wall.start.x, wall.start.y, wall.start.z
                ));
                continue;
            };
            let origin = zone.origin;
            let zone_id = zone.id.clone();
            let room = orchestrator
                .get_room_mut(&zone_id)
                .expect("zone id resolved from data.zones is present in the orchestrator");
            let local = cube_to_local(&room.grid, wall.start - origin);
            let wall_entity = RoomEntity::Wall(WallEntity {
                common: EntityCommon {
                    id: format!("wall_loaded_{idx}_{zone_id}"),
                    entity_type: "wall".to_string(),
                    size: 1,
                    blocks_movement: wall.blocks_movement,
                    blocks_los: wall.blocks_los,
                },
                segment_id: format!("loaded-{idx}"),
                kind: WallKind::Destructible,
                properties: WallProperties {
                    hp: None,
                    resistance: Vec::new(),
                    weakness: Vec::new(),
                    material: "unknown".to_string(),
                    thickness: 1.0,
                    height: 1.0,
                    blocks_los: wall.blocks_los,
                    blocks_movement: wall.blocks_movement,
                    provides_cover: wall.blocks_los,
                },
                destroyed: false,
            });
            if let Err(e) = room.place_entity(wall_entity, local) {
                non_fatal.push(format!(
                    "wall at ({}, {}, {}): {e}",
                    wall.start.x, wall.start.y, wall.start.z
                ));
            }
        }

        for passage in &data.passages {
            orchestrator.add_connection(Connection {
                id: passage.id.clone(),
                from_room_id: passage.from_zone_id.clone(),
                to_room_id: passage.to_zone_id.clone(),
                kind: ConnectionKind::Door,
                bidirectional: passage.bidirectional,
                passable: true,
            });
        }

        let mut state = EnvironmentState {
            theme: data.theme.clone(),
            metadata: data.metadata.clone(),
            orchestrator,
            room_positions,
            blocked_hexes: HashSet::new(),
        };
        recompute_blocked_hexes(&mut state);

        let env = Environment {
            id: data.id,
            env_type: data.env_type,
            state: RwLock::new(state),
            event_bus,
        };
        Ok((env, non_fatal))
    }

    pub fn mark_destroyed(&self) {
        self.event_bus.publish(
            topics::ENVIRONMENT_DESTROYED,
            json!({ "environment_id": self.id }),
        );
    }
}

fn reject_unsupported_filters(theme: Option<&str>, feature: Option<&str>) -> ThatchResult<()> {
    if theme.is_some() || feature.is_some() {
        return Err(ThatchError::InvalidConfig(
            "theme/feature filters are not supported until explicit room metadata exists"
                .to_string(),
        ));
    }
    Ok(())
}

/// Filter for [`Environment::query_entities`]. `theme`/`feature` are accepted
/// for interface symmetry but always rejected (§9 open question: unsupported
/// until explicit room metadata exists).
#[derive(Debug, Clone, Default)]
pub struct EntityQuery {
    pub room_id: Option<String>,
    pub entity_type: Option<String>,
    pub theme: Option<String>,
    pub feature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub id: String,
    pub entity_type: String,
    pub room_id: String,
    pub position: CubeCoord,
    pub blocks_movement: bool,
}

/// Filter for [`Environment::query_rooms`]; see [`EntityQuery`] for the
/// `theme`/`feature` caveat.
#[derive(Debug, Clone, Default)]
pub struct RoomQuery {
    pub room_type: Option<String>,
    pub theme: Option<String>,
    pub feature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: String,
    pub room_type: String,
    pub origin: CubeCoord,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneData {
    pub id: String,
    #[serde(rename = "type")]
    pub room_type: String,
    pub origin: CubeCoord,
    pub width: u32,
    pub height: u32,
    pub grid_shape: GridKind,
    pub orientation: Option<HexOrientation>,
    pub entity_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageData {
    pub id: String,
    pub from_zone_id: String,
    pub to_zone_id: String,
    pub controlling_entity_id: Option<String>,
    pub bidirectional: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedEntityData {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub position: CubeCoord,
    pub size: u32,
    pub blocks_movement: bool,
    pub blocks_los: bool,
    pub zone_id: String,
    pub subtype: Option<String>,
    pub properties: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallSegmentData {
    pub start: CubeCoord,
    pub end: CubeCoord,
    pub blocks_movement: bool,
    pub blocks_los: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentData {
    pub id: String,
    #[serde(rename = "type")]
    pub env_type: String,
    pub theme: String,
    pub metadata: HashMap<String, Value>,
    pub zones: Vec<ZoneData>,
    pub passages: Vec<PassageData>,
    pub entities: Vec<PlacedEntityData>,
    pub walls: Vec<WallSegmentData>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::{default_profile, Feeling};
    use crate::events::NoOpEventBus;

    fn room(id: &str, width: u32, height: u32) -> Room {
        Room::new(id, "chamber", Grid::Hex { orientation: HexOrientation::Pointy, width, height })
    }

    #[test]
    fn pack_rooms_assigns_non_overlapping_origins_in_id_order() {
        let mut orch = RoomOrchestrator::new();
        orch.add_room(room("a", 5, 5));
        orch.add_room(room("b", 5, 5));
        let positions = Environment::pack_rooms(&orch);
        assert_eq!(positions["a"], CubeCoord::from_xz(0, 0));
        assert_eq!(positions["b"], CubeCoord::from_xz(7, 0));
    }

    #[test]
    fn get_room_at_finds_containing_room() {
        let mut orch = RoomOrchestrator::new();
        orch.add_room(room("a", 5, 5));
        let positions = Environment::pack_rooms(&orch);
        let env = Environment::new(
            "env-1",
            "dungeon",
            "dungeon",
            orch,
            positions,
            Arc::new(NoOpEventBus),
        );
        assert_eq!(env.get_room_at(CubeCoord::from_xz(2, 0)), Some("a".to_string()));
        assert_eq!(env.get_room_at(CubeCoord::from_xz(50, 0)), None);
    }

    #[test]
    fn damage_wall_updates_blocked_hex_cache() {
        let mut room = room("a", 5, 5);
        let wall = RoomEntity::Wall(WallEntity {
            common: EntityCommon {
                id: "w".to_string(),
                entity_type: "wall".to_string(),
                size: 1,
                blocks_movement: true,
                blocks_los: true,
            },
            segment_id: "s".to_string(),
            kind: WallKind::Destructible,
            properties: WallProperties {
                hp: Some(5.0),
                ..WallProperties::default_random()
            },
            destroyed: false,
        });
        room.place_entity(wall, Position::new(1.0, 1.0)).unwrap();
        let mut orch = RoomOrchestrator::new();
        orch.add_room(room);
        let positions = Environment::pack_rooms(&orch);
        let env = Environment::new(
            "env-1",
            "dungeon",
            "dungeon",
            orch,
            positions,
            Arc::new(NoOpEventBus),
        );
        assert!(!env.get_blocked_hexes().is_empty());
        env.damage_wall("a", "w", 10.0).unwrap();
        assert!(env.get_blocked_hexes().is_empty());
    }

    #[test]
    fn query_entities_rejects_theme_filter() {
        let orch = RoomOrchestrator::new();
        let env = Environment::new(
            "env-1",
            "dungeon",
            "dungeon",
            orch,
            HashMap::new(),
            Arc::new(NoOpEventBus),
        );
        let filter = EntityQuery {
            theme: Some("dungeon".to_string()),
            ..EntityQuery::default()
        };
        assert!(matches!(
            env.query_entities(&filter),
            Err(ThatchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn snapshot_round_trip_preserves_zones_passages_and_entities() {
        let mut zone1 = room("zone-1", 10, 10);
        let monster = RoomEntity::Placed(PlacedEntity {
            common: EntityCommon {
                id: "monster-1".to_string(),
                entity_type: "monster".to_string(),
                size: 1,
                blocks_movement: true,
                blocks_los: false,
            },
            subtype: None,
            properties: HashMap::new(),
        });
        zone1.place_entity(monster, Position::new(3.0, 1.0)).unwrap();
        let zone2 = room("zone-2", 15, 15);

        let mut orch = RoomOrchestrator::new();
        orch.add_room(zone1);
        orch.add_room(zone2);
        orch.add_connection(Connection {
            id: "passage-1".to_string(),
            from_room_id: "zone-1".to_string(),
            to_room_id: "zone-2".to_string(),
            kind: ConnectionKind::Door,
            bidirectional: true,
            passable: true,
        });

        let mut positions = HashMap::new();
        positions.insert("zone-1".to_string(), CubeCoord::from_xz(0, 0));
        positions.insert("zone-2".to_string(), CubeCoord::from_xz(15, -7));

        let env = Environment::new(
            "env-1",
            "dungeon",
            "dungeon",
            orch,
            positions,
            Arc::new(NoOpEventBus),
        );

        let data = env.to_data();
        assert_eq!(data.zones.len(), 2);
        assert_eq!(data.passages.len(), 1);
        assert_eq!(data.entities.len(), 1);

        let (loaded, non_fatal) = Environment::from_data(data, Arc::new(NoOpEventBus)).unwrap();
        assert!(non_fatal.is_empty());
        assert!(loaded.query_rooms(&RoomQuery::default()).unwrap().len() == 2);
        let entities = loaded.query_entities(&EntityQuery::default()).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_type, "monster");
    }

    #[test]
    fn query_sizing_and_capacity_delegate_to_calculator() {
        let orch = RoomOrchestrator::new();
        let env = Environment::new(
            "env-1",
            "dungeon",
            "dungeon",
            orch,
            HashMap::new(),
            Arc::new(NoOpEventBus),
        );
        let profile = default_profile(Feeling::Normal);
        let size = env.query_sizing(&profile, 10);
        assert!(size.width >= 5.0);
        let constraints = CapacityConstraints::default();
        let estimate = env.query_capacity(size, &profile, &constraints);
        assert!(estimate.recommended_entities >= 0);
    }
}
