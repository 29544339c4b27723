//! # Room Builder (C5)
//!
//! Assembles a [`Room`] from a shape, size, wall pattern, and feature list.
//! Entities are modeled as a tagged variant (walls vs. everything else)
//! rather than trait objects, per the design note in §9: destruction APIs
//! operate on the `Wall` variant directly instead of downcasting.

use crate::coordinate::{cube_to_local, Dimensions, Grid, GridKind, Position};
use crate::error::{ThatchError, ThatchResult};
use crate::events::EventBus;
use crate::shapes::{scale, RoomShape, ShapeLibrary};
use crate::walls::{
    discretize, SafetyParams, WallKind, WallPatternParams, WallPatternRegistry, WallProperties,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Fields common to every entity placed in a room, independent of kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCommon {
    pub id: String,
    pub entity_type: String,
    pub size: u32,
    pub blocks_movement: bool,
    pub blocks_los: bool,
}

/// A single discretized wall unit; never relocated once placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallEntity {
    pub common: EntityCommon,
    pub segment_id: String,
    pub kind: WallKind,
    pub properties: WallProperties,
    pub destroyed: bool,
}

impl WallEntity {
    pub fn take_damage(&mut self, amount: f64) {
        if self.kind == WallKind::Indestructible {
            return;
        }
        if let Some(hp) = self.properties.hp.as_mut() {
            *hp = (*hp - amount).max(0.0);
            if *hp <= 0.0 {
                self.destroyed = true;
                self.common.blocks_movement = false;
                self.common.blocks_los = false;
            }
        }
    }

    pub fn repair(&mut self, amount: f64) {
        if self.kind == WallKind::Indestructible {
            return;
        }
        if let Some(hp) = self.properties.hp.as_mut() {
            *hp += amount;
            if *hp > 0.0 && self.destroyed {
                self.destroyed = false;
                self.common.blocks_movement = self.properties.blocks_movement;
                self.common.blocks_los = self.properties.blocks_los;
            }
        }
    }

    pub fn destroy(&mut self) {
        if self.kind == WallKind::Indestructible {
            return;
        }
        if let Some(hp) = self.properties.hp.as_mut() {
            *hp = 0.0;
        }
        self.destroyed = true;
        self.common.blocks_movement = false;
        self.common.blocks_los = false;
    }
}

/// Any non-wall placed entity: a feature (chest, throne, pressure plate) or
/// a generic occupant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedEntity {
    pub common: EntityCommon,
    pub subtype: Option<String>,
    pub properties: HashMap<String, Value>,
}

/// An entity occupying a room: a wall unit or a placed entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoomEntity {
    Wall(WallEntity),
    Placed(PlacedEntity),
}

impl RoomEntity {
    pub fn common(&self) -> &EntityCommon {
        match self {
            RoomEntity::Wall(w) => &w.common,
            RoomEntity::Placed(p) => &p.common,
        }
    }

    pub fn id(&self) -> &str {
        &self.common().id
    }

    pub fn blocks_movement(&self) -> bool {
        self.common().blocks_movement
    }

    pub fn blocks_line_of_sight(&self) -> bool {
        self.common().blocks_los
    }

    pub fn get_size(&self) -> u32 {
        self.common().size
    }
}

/// A fully assembled room: its grid, its entities, and where each entity
/// sits in room-local coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub room_type: String,
    pub grid: Grid,
    pub entities: HashMap<String, RoomEntity>,
    pub positions: HashMap<String, Position>,
}

impl Room {
    pub fn new(id: impl Into<String>, room_type: impl Into<String>, grid: Grid) -> Self {
        Self {
            id: id.into(),
            room_type: room_type.into(),
            grid,
            entities: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    /// Places an entity at a room-local position. Rejects positions outside
    /// the grid, and rejects movement-blocking entities stacked on another
    /// movement-blocking entity's position.
    pub fn place_entity(&mut self, entity: RoomEntity, position: Position) -> ThatchResult<()> {
        if !self.grid.is_valid_position(position) {
            return Err(ThatchError::InvalidCoordinate(format!(
                "position ({}, {}) is outside room '{}'",
                position.x, position.y, self.id
            )));
        }
        if entity.blocks_movement() && self.blocking_entity_at(position).is_some() {
            return Err(ThatchError::PlacementConflict(format!(
                "({}, {}) in room '{}'",
                position.x, position.y, self.id
            )));
        }
        let id = entity.id().to_string();
        self.positions.insert(id.clone(), position);
        self.entities.insert(id, entity);
        Ok(())
    }

    fn blocking_entity_at(&self, position: Position) -> Option<&str> {
        self.positions.iter().find_map(|(id, pos)| {
            if *pos == position {
                self.entities
                    .get(id)
                    .filter(|e| e.blocks_movement())
                    .map(|_| id.as_str())
            } else {
                None
            }
        })
    }

    /// Room-local positions of every movement-blocking entity.
    pub fn blocked_local_positions(&self) -> Vec<Position> {
        self.entities
            .values()
            .filter(|e| e.blocks_movement())
            .filter_map(|e| self.positions.get(e.id()).copied())
            .collect()
    }

    fn wall_mut(&mut self, wall_id: &str) -> ThatchResult<&mut WallEntity> {
        match self.entities.get_mut(wall_id) {
            Some(RoomEntity::Wall(wall)) => Ok(wall),
            Some(_) => Err(ThatchError::NotFound(format!(
                "entity '{wall_id}' in room '{}' is not a wall",
                self.id
            ))),
            None => Err(ThatchError::NotFound(format!(
                "wall '{wall_id}' in room '{}'",
                self.id
            ))),
        }
    }

    pub fn damage_wall(&mut self, wall_id: &str, amount: f64) -> ThatchResult<()> {
        self.wall_mut(wall_id)?.take_damage(amount);
        Ok(())
    }

    pub fn repair_wall(&mut self, wall_id: &str, amount: f64) -> ThatchResult<()> {
        self.wall_mut(wall_id)?.repair(amount);
        Ok(())
    }

    pub fn destroy_wall(&mut self, wall_id: &str) -> ThatchResult<()> {
        self.wall_mut(wall_id)?.destroy();
        Ok(())
    }
}

/// A feature or generic entity requested at build time.
#[derive(Debug, Clone)]
pub struct FeatureSpec {
    pub entity_type: String,
    pub subtype: Option<String>,
    pub position: Option<Position>,
    pub size: u32,
    pub blocks_movement: bool,
    pub blocks_los: bool,
    pub properties: HashMap<String, Value>,
}

impl FeatureSpec {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            subtype: None,
            position: None,
            size: 1,
            blocks_movement: false,
            blocks_los: false,
            properties: HashMap::new(),
        }
    }
}

/// How a built room's boundary should be rotated before scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Fixed(i32),
    Random,
}

const ROTATION_CHOICES: [i32; 4] = [0, 90, 180, 270];

/// Fluent, single-use builder for a [`Room`]. A second call to [`build`]
/// fails with [`ThatchError::BuilderAlreadyUsed`].
///
/// [`build`]: RoomBuilder::build
pub struct RoomBuilder<'a> {
    shape_library: &'a ShapeLibrary,
    wall_patterns: &'a WallPatternRegistry,
    event_bus: &'a dyn EventBus,

    size: Option<Dimensions>,
    theme: Option<String>,
    features: Vec<FeatureSpec>,
    wall_pattern: Option<String>,
    density: f64,
    destructible_ratio: f64,
    safety: SafetyParams,
    material: Option<String>,
    shape_name: Option<String>,
    rotation: Rotation,
    grid_kind: GridKind,
    seed: u64,
    id: Option<String>,
    used: bool,
}

impl<'a> RoomBuilder<'a> {
    pub fn new(
        shape_library: &'a ShapeLibrary,
        wall_patterns: &'a WallPatternRegistry,
        event_bus: &'a dyn EventBus,
    ) -> Self {
        Self {
            shape_library,
            wall_patterns,
            event_bus,
            size: None,
            theme: None,
            features: Vec::new(),
            wall_pattern: None,
            density: 0.4,
            destructible_ratio: 0.7,
            safety: SafetyParams::default(),
            material: None,
            shape_name: None,
            rotation: Rotation::None,
            grid_kind: GridKind::Square,
            seed: 0,
            id: None,
            used: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_size(mut self, size: Dimensions) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn with_feature(mut self, feature: FeatureSpec) -> Self {
        self.features.push(feature);
        self
    }

    pub fn with_wall_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.wall_pattern = Some(pattern.into());
        self
    }

    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density.clamp(0.0, 1.0);
        self
    }

    pub fn with_destructible_ratio(mut self, ratio: f64) -> Self {
        self.destructible_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_safety(mut self, safety: SafetyParams) -> Self {
        self.safety = safety;
        self
    }

    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }

    pub fn with_shape(mut self, shape_name: impl Into<String>) -> Self {
        self.shape_name = Some(shape_name.into());
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_grid_kind(mut self, grid_kind: GridKind) -> Self {
        self.grid_kind = grid_kind;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn resolve_shape(&self, rng: &mut StdRng) -> RoomShape {
        let shape = self
            .shape_library
            .resolve(self.shape_name.as_deref().unwrap_or("rectangle"));
        let degrees = match self.rotation {
            Rotation::None => return shape,
            Rotation::Fixed(d) => d,
            Rotation::Random => ROTATION_CHOICES[rng.gen_range(0..ROTATION_CHOICES.len())],
        };
        crate::shapes::rotate(&shape, degrees)
    }

    fn build_grid(&self, dims: Dimensions) -> Grid {
        let width = dims.width.ceil().max(1.0) as u32;
        let height = dims.height.ceil().max(1.0) as u32;
        match self.grid_kind {
            GridKind::Hex => Grid::Hex {
                orientation: crate::coordinate::HexOrientation::Pointy,
                width,
                height,
            },
            GridKind::Square => Grid::Square { width, height },
            GridKind::Gridless => Grid::Gridless { width, height },
        }
    }

    /// Runs the build pipeline: validate, load shape, rotate, scale, invoke
    /// the wall pattern, construct the room, and place wall and feature
    /// entities. Fails with [`ThatchError::BuilderAlreadyUsed`] if called a
    /// second time.
    pub fn build(&mut self) -> ThatchResult<Room> {
        if self.used {
            return Err(ThatchError::BuilderAlreadyUsed);
        }
        self.used = true;

        let dims = self
            .size
            .ok_or_else(|| ThatchError::InvalidConfig("room size is required".to_string()))?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let rotated = self.resolve_shape(&mut rng);
        let scaled = scale(&rotated, dims);

        if scaled.connections.len() >= 2 {
            tracing::info!(
                room_shape = %scaled.name,
                from = ?scaled.connections[0].normalized_position,
                to = ?scaled.connections[1].normalized_position,
                min_path_width = self.safety.min_path_width,
                "derived required corridor path"
            );
        }

        let grid = self.build_grid(dims);
        let params = WallPatternParams {
            density: self.density,
            destructible_ratio: self.destructible_ratio,
            safety: self.safety,
            emergency_fallback: true,
        };
        let pattern_name = self.wall_pattern.as_deref().unwrap_or("empty");
        let walls = self.wall_patterns.generate(
            pattern_name,
            &scaled,
            dims,
            &grid,
            &params,
            self.seed,
            self.event_bus,
        )?;

        let room_id = self
            .id
            .clone()
            .unwrap_or_else(|| format!("room-{}", self.seed));
        let mut room = Room::new(room_id, scaled.shape_type.clone(), grid);

        for (segment_idx, wall) in walls.iter().enumerate() {
            let segment_id = format!("segment-{segment_idx}");
            for cube in discretize(wall, &room.grid) {
                let local = cube_to_local(&room.grid, cube);
                let wall_id = format!("wall_{segment_id}_{}_{}", cube.x, cube.z);
                let entity = RoomEntity::Wall(WallEntity {
                    common: EntityCommon {
                        id: wall_id,
                        entity_type: "wall".to_string(),
                        size: 1,
                        blocks_movement: wall.properties.blocks_movement,
                        blocks_los: wall.properties.blocks_los,
                    },
                    segment_id: segment_id.clone(),
                    kind: wall.kind,
                    properties: wall.properties.clone(),
                    destroyed: false,
                });
                room.place_entity(entity, local)
                    .map_err(|e| ThatchError::in_stage("room assembly", e))?;
            }
        }

        for (idx, feature) in self.features.iter().enumerate() {
            let position = feature.position.unwrap_or_else(|| {
                Position::new((dims.width / 2.0).floor(), (dims.height / 2.0).floor())
            });
            let entity = RoomEntity::Placed(PlacedEntity {
                common: EntityCommon {
                    id: format!("feature-{idx}"),
                    entity_type: feature.entity_type.clone(),
                    size: feature.size,
                    blocks_movement: feature.blocks_movement,
                    blocks_los: feature.blocks_los,
                },
                subtype: feature.subtype.clone(),
                properties: feature.properties.clone(),
            });
            room.place_entity(entity, position)
                .map_err(|e| ThatchError::in_stage("room assembly", e))?;
        }

        Ok(room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoOpEventBus;

    fn builder<'a>(
        lib: &'a ShapeLibrary,
        registry: &'a WallPatternRegistry,
        bus: &'a NoOpEventBus,
    ) -> RoomBuilder<'a> {
        RoomBuilder::new(lib, registry, bus)
    }

    #[test]
    fn build_without_size_fails() {
        let lib = ShapeLibrary::new();
        let registry = WallPatternRegistry::new();
        let bus = NoOpEventBus;
        let mut b = builder(&lib, &registry, &bus);
        assert!(matches!(b.build(), Err(ThatchError::InvalidConfig(_))));
    }

    #[test]
    fn second_build_call_fails() {
        let lib = ShapeLibrary::new();
        let registry = WallPatternRegistry::new();
        let bus = NoOpEventBus;
        let mut b = builder(&lib, &registry, &bus).with_size(Dimensions::new(10.0, 8.0));
        assert!(b.build().is_ok());
        assert!(matches!(b.build(), Err(ThatchError::BuilderAlreadyUsed)));
    }

    #[test]
    fn empty_pattern_room_has_no_wall_entities() {
        let lib = ShapeLibrary::new();
        let registry = WallPatternRegistry::new();
        let bus = NoOpEventBus;
        let mut b = builder(&lib, &registry, &bus)
            .with_size(Dimensions::new(10.0, 8.0))
            .with_wall_pattern("empty");
        let room = b.build().unwrap();
        assert!(room
            .entities
            .values()
            .all(|e| !matches!(e, RoomEntity::Wall(_))));
    }

    #[test]
    fn feature_defaults_to_room_center() {
        let lib = ShapeLibrary::new();
        let registry = WallPatternRegistry::new();
        let bus = NoOpEventBus;
        let mut b = builder(&lib, &registry, &bus)
            .with_size(Dimensions::new(10.0, 8.0))
            .with_wall_pattern("empty")
            .with_feature(FeatureSpec::new("chest"));
        let room = b.build().unwrap();
        let feature = room
            .entities
            .values()
            .find(|e| matches!(e, RoomEntity::Placed(_)))
            .unwrap();
        assert_eq!(room.positions[feature.id()], Position::new(5.0, 4.0));
    }

    #[test]
    fn wall_take_damage_eventually_destroys_and_unblocks() {
        let properties = WallProperties {
            hp: Some(5.0),
            ..WallProperties::default_random()
        };
        let mut wall = WallEntity {
            common: EntityCommon {
                id: "w".to_string(),
                entity_type: "wall".to_string(),
                size: 1,
                blocks_movement: true,
                blocks_los: true,
            },
            segment_id: "segment-0".to_string(),
            kind: WallKind::Destructible,
            properties,
            destroyed: false,
        };
        wall.take_damage(5.0);
        assert!(wall.destroyed);
        assert!(!wall.common.blocks_movement);
    }

    #[test]
    fn indestructible_wall_ignores_damage() {
        let mut wall = WallEntity {
            common: EntityCommon {
                id: "w".to_string(),
                entity_type: "wall".to_string(),
                size: 1,
                blocks_movement: true,
                blocks_los: true,
            },
            segment_id: "segment-0".to_string(),
            kind: WallKind::Indestructible,
            properties: WallProperties {
                hp: None,
                ..WallProperties::default_random()
            },
            destroyed: false,
        };
        wall.take_damage(1000.0);
        assert!(!wall.destroyed);
        assert!(wall.common.blocks_movement);
    }
}
