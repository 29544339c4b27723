//! # Wall Pattern Engine (C3)
//!
//! A registry of named wall-pattern generators (`empty`, `random`, plus
//! whatever a generator registers), the discretization of continuous wall
//! segments into blocked hex positions, and the navigability repair loop
//! with emergency fallback described in §4.3.
//!
//! Determinism is structural here: every randomness draw for a given
//! `(seed, shape, size, params)` happens in the same fixed order (wall
//! acceptance sampling, then destructible labeling and HP), grounded on the
//! teacher's own seeded-`StdRng` generation style in
//! `generation/dungeon.rs`.

use crate::coordinate::{cube_to_local, local_to_cube, CubeCoord, Dimensions, Grid, Position};
use crate::error::{ThatchError, ThatchResult};
use crate::events::{topics, EventBus};
use crate::pathfinder::{find_hex_path, NeverCancel};
use crate::shapes::RoomShape;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

/// How a wall segment reacts to damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WallKind {
    Indestructible,
    Destructible,
    Temporary,
    Conditional,
}

/// Physical properties of a wall segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallProperties {
    /// Hit points; `None` for walls that cannot be damaged down
    /// (`Indestructible`).
    pub hp: Option<f64>,
    pub resistance: Vec<String>,
    pub weakness: Vec<String>,
    pub material: String,
    pub thickness: f64,
    pub height: f64,
    pub blocks_los: bool,
    pub blocks_movement: bool,
    pub provides_cover: bool,
}

impl WallProperties {
    /// The default properties the `random` pattern gives a freshly accepted
    /// wall, before `apply_destructible_ratio` relabels it.
    pub fn default_random() -> Self {
        Self {
            hp: None,
            resistance: Vec::new(),
            weakness: Vec::new(),
            material: "stone".to_string(),
            thickness: 0.5,
            height: 1.0,
            blocks_los: true,
            blocks_movement: true,
            provides_cover: true,
        }
    }
}

/// A continuous wall segment before discretization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallSegment {
    pub start: Position,
    pub end: Position,
    pub kind: WallKind,
    pub properties: WallProperties,
}

impl WallSegment {
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    /// Wall area: `length * max(thickness, 0.5)`.
    pub fn area(&self) -> f64 {
        self.length() * self.properties.thickness.max(0.5)
    }
}

/// Safety requirements a wall pattern must satisfy (the `P` in §4.3's
/// invariant definitions).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyParams {
    pub min_open_space: f64,
    pub min_path_width: f64,
}

impl Default for SafetyParams {
    fn default() -> Self {
        Self {
            min_open_space: 0.5,
            min_path_width: 1.0,
        }
    }
}

/// Parameters fed to a wall pattern function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallPatternParams {
    pub density: f64,
    pub destructible_ratio: f64,
    pub safety: SafetyParams,
    pub emergency_fallback: bool,
}

impl Default for WallPatternParams {
    fn default() -> Self {
        Self {
            density: 0.4,
            destructible_ratio: 0.7,
            safety: SafetyParams::default(),
            emergency_fallback: true,
        }
    }
}

/// Discretizes a wall segment into the set of local cube positions it
/// occupies. Samples `max(1, ceil(length))` positions uniformly on
/// `[start, end]` with both endpoints inclusive (a zero-length wall yields
/// exactly its start position), then adds lateral copies along the
/// segment's perpendicular unit vector for `thickness > 1`.
pub fn discretize(wall: &WallSegment, grid: &Grid) -> Vec<CubeCoord> {
    let length = wall.length();
    let count = (length.ceil() as i64).max(1) as usize;

    let mut base_positions = Vec::with_capacity(count);
    if count == 1 {
        base_positions.push(wall.start);
    } else {
        for i in 0..count {
            let t = i as f64 / (count - 1) as f64;
            base_positions.push(Position::new(
                wall.start.x + t * (wall.end.x - wall.start.x),
                wall.start.y + t * (wall.end.y - wall.start.y),
            ));
        }
    }

    let dx = wall.end.x - wall.start.x;
    let dy = wall.end.y - wall.start.y;
    let len = (dx * dx + dy * dy).sqrt();
    let (perp_x, perp_y) = if len > 0.0 {
        (-dy / len, dx / len)
    } else {
        (1.0, 0.0)
    };

    let lateral = (wall.properties.thickness / 2.0).floor() as i64;

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for pos in &base_positions {
        for k in -lateral..=lateral {
            let offset_pos = Position::new(pos.x + perp_x * k as f64, pos.y + perp_y * k as f64);
            let cube = local_to_cube(grid, offset_pos);
            if seen.insert(cube) {
                out.push(cube);
            }
        }
    }
    out
}

fn distance_point_to_line(p: Position, a: Position, b: Position) -> f64 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len = (abx * abx + aby * aby).sqrt();
    if len == 0.0 {
        return p.distance(a);
    }
    ((p.x - a.x) * aby - (p.y - a.y) * abx).abs() / len
}

fn blocks_corridor(wall: &WallSegment, c_i: Position, c_j: Position, min_path_width: f64) -> bool {
    distance_point_to_line(wall.start, c_i, c_j) <= min_path_width
        || distance_point_to_line(wall.end, c_i, c_j) <= min_path_width
}

#[derive(Debug, Clone, Copy)]
enum Violation {
    OpenSpace,
    Connectivity(usize, usize),
}

fn open_space_ratio(dims: Dimensions, walls: &[WallSegment]) -> f64 {
    let wall_area: f64 = walls.iter().map(WallSegment::area).sum();
    (dims.area() - wall_area) / dims.area()
}

/// Nudges a scaled connection point onto the nearest in-footprint cell.
/// Connection points sit on the boundary (e.g. a south connection scales to
/// `y == height`), which the half-open grid footprint never contains; the
/// connectivity check needs the reachable door cell just inside the edge.
fn clamp_to_footprint(grid: &Grid, pos: Position) -> Position {
    let (width, height) = grid.dimensions();
    Position::new(
        pos.x.clamp(0.0, width as f64 - 1.0),
        pos.y.clamp(0.0, height as f64 - 1.0),
    )
}

fn validate(
    shape: &RoomShape,
    dims: Dimensions,
    grid: &Grid,
    walls: &[WallSegment],
    safety: &SafetyParams,
) -> Option<Violation> {
    let blocked: HashSet<CubeCoord> = walls.iter().flat_map(|w| discretize(w, grid)).collect();
    let is_blocked = |c: CubeCoord| blocked.contains(&c) || !grid.is_valid_position(cube_to_local(grid, c));
    let connections = &shape.connections;
    for i in 0..connections.len() {
        for j in (i + 1)..connections.len() {
            let from = local_to_cube(grid, clamp_to_footprint(grid, connections[i].normalized_position));
            let to = local_to_cube(grid, clamp_to_footprint(grid, connections[j].normalized_position));
            if from == to {
                continue;
            }
            let result = find_hex_path(from, to, &is_blocked, &NeverCancel)
                .expect("NeverCancel never triggers cancellation");
            if !result.found {
                return Some(Violation::Connectivity(i, j));
            }
        }
    }
    if open_space_ratio(dims, walls) < safety.min_open_space {
        return Some(Violation::OpenSpace);
    }
    None
}

/// Runs the §4.3 repair loop: while validation fails, first tries to
/// restore A* connectivity by removing walls that block the first failing
/// connection-point pair, then (if open space is still short) removes
/// destructible walls in registration order. Falls back to an empty wall
/// set (publishing `environment.emergency_fallback.triggered`) or fails
/// with `UnsatisfiableSafety`, depending on `emergency_fallback`.
pub fn validate_and_fix(
    shape: &RoomShape,
    dims: Dimensions,
    grid: &Grid,
    mut walls: Vec<WallSegment>,
    safety: &SafetyParams,
    emergency_fallback: bool,
    event_bus: &dyn EventBus,
) -> ThatchResult<Vec<WallSegment>> {
    let max_iterations = walls.len() + 1;
    let mut iterations = 0;

    while iterations <= max_iterations {
        match validate(shape, dims, grid, &walls, safety) {
            None => return Ok(walls),
            Some(Violation::Connectivity(i, j)) => {
                let c_i = shape.connections[i].normalized_position;
                let c_j = shape.connections[j].normalized_position;
                walls.retain(|w| !blocks_corridor(w, c_i, c_j, safety.min_path_width));
            }
            Some(Violation::OpenSpace) => {
                let mut idx = 0;
                while idx < walls.len() {
                    if walls[idx].kind == WallKind::Destructible {
                        walls.remove(idx);
                        if open_space_ratio(dims, &walls) >= safety.min_open_space {
                            break;
                        }
                    } else {
                        idx += 1;
                    }
                }
                if validate(shape, dims, grid, &walls, safety).is_none() {
                    return Ok(walls);
                }
                break;
            }
        }
        iterations += 1;
    }

    match validate(shape, dims, grid, &walls, safety) {
        None => Ok(walls),
        Some(violation) => {
            if emergency_fallback {
                let reason = match violation {
                    Violation::OpenSpace => "open-space ratio below minimum after repair",
                    Violation::Connectivity(..) => {
                        "connection points unreachable after repair"
                    }
                };
                event_bus.publish(
                    topics::EMERGENCY_FALLBACK_TRIGGERED,
                    json!({ "shape": shape.name, "reason": reason }),
                );
                Ok(Vec::new())
            } else {
                Err(ThatchError::UnsatisfiableSafety(format!(
                    "shape '{}' could not satisfy navigability after repair",
                    shape.name
                )))
            }
        }
    }
}

fn safe_range(rng: &mut StdRng, lo: f64, hi: f64) -> f64 {
    if lo >= hi {
        lo
    } else {
        rng.gen_range(lo..=hi)
    }
}

/// The `empty` pattern: emits no walls, but still runs safety validation so
/// the empty configuration is confirmed to meet the invariants.
pub fn empty_pattern(
    shape: &RoomShape,
    dims: Dimensions,
    grid: &Grid,
    params: &WallPatternParams,
    _seed: u64,
    event_bus: &dyn EventBus,
) -> ThatchResult<Vec<WallSegment>> {
    validate_and_fix(
        shape,
        dims,
        grid,
        Vec::new(),
        &params.safety,
        params.emergency_fallback,
        event_bus,
    )
}

/// The `random` pattern: deterministically produces walls from
/// `(shape, size, params, seed)` per §4.3's algorithm.
pub fn random_pattern(
    shape: &RoomShape,
    dims: Dimensions,
    grid: &Grid,
    params: &WallPatternParams,
    seed: u64,
    event_bus: &dyn EventBus,
) -> ThatchResult<Vec<WallSegment>> {
    let mut rng = StdRng::seed_from_u64(seed);

    let max_walls = ((dims.area() * params.density / 10.0).floor() as i64).clamp(1, 12) as usize;
    let margin = params.safety.min_path_width.max(2.0);

    let mut accepted = Vec::new();
    for _ in 0..max_walls {
        let cx = safe_range(&mut rng, margin, (dims.width - margin).max(margin));
        let cy = safe_range(&mut rng, margin, (dims.height - margin).max(margin));
        let horizontal = rng.gen_bool(0.5);
        let length = rng.gen_range(2.0..=8.0);

        let (start, end) = if horizontal {
            (
                Position::new(cx - length / 2.0, cy),
                Position::new(cx + length / 2.0, cy),
            )
        } else {
            (
                Position::new(cx, cy - length / 2.0),
                Position::new(cx, cy + length / 2.0),
            )
        };

        let in_inset = |p: Position| {
            p.x >= margin && p.x <= dims.width - margin && p.y >= margin && p.y <= dims.height - margin
        };
        if !in_inset(start) || !in_inset(end) {
            continue;
        }

        accepted.push(WallSegment {
            start,
            end,
            kind: WallKind::Destructible,
            properties: WallProperties::default_random(),
        });
    }

    let mut walls = Vec::with_capacity(accepted.len());
    for mut wall in accepted {
        if rng.gen_bool(params.destructible_ratio.clamp(0.0, 1.0)) {
            wall.kind = WallKind::Destructible;
            wall.properties.hp = Some(rng.gen_range(10.0..=30.0));
        } else {
            wall.kind = WallKind::Indestructible;
            wall.properties.hp = None;
        }
        walls.push(wall);
    }

    validate_and_fix(
        shape,
        dims,
        grid,
        walls,
        &params.safety,
        params.emergency_fallback,
        event_bus,
    )
}

/// A wall pattern function: `(shape, size, grid, params, seed, event_bus) ->
/// walls`.
pub type PatternFn = dyn Fn(
        &RoomShape,
        Dimensions,
        &Grid,
        &WallPatternParams,
        u64,
        &dyn EventBus,
    ) -> ThatchResult<Vec<WallSegment>>
    + Send
    + Sync;

/// A per-generator registry of named wall patterns (§9: "a per-generator
/// registry passed in via configuration, with `empty` and `random` as
/// built-ins; custom patterns register explicitly through the generator
/// API" — replacing the source's mutable global map).
pub struct WallPatternRegistry {
    patterns: std::collections::HashMap<String, Arc<PatternFn>>,
}

impl WallPatternRegistry {
    pub fn new() -> Self {
        let mut patterns: std::collections::HashMap<String, Arc<PatternFn>> =
            std::collections::HashMap::new();
        patterns.insert("empty".to_string(), Arc::new(empty_pattern));
        patterns.insert("random".to_string(), Arc::new(random_pattern));
        Self { patterns }
    }

    pub fn register(&mut self, name: impl Into<String>, pattern: Arc<PatternFn>) {
        self.patterns.insert(name.into(), pattern);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn generate(
        &self,
        name: &str,
        shape: &RoomShape,
        dims: Dimensions,
        grid: &Grid,
        params: &WallPatternParams,
        seed: u64,
        event_bus: &dyn EventBus,
    ) -> ThatchResult<Vec<WallSegment>> {
        let pattern = self.patterns.get(name).ok_or_else(|| {
            ThatchError::InvalidConfig(format!("no wall pattern registered as '{name}'"))
        })?;
        pattern(shape, dims, grid, params, seed, event_bus)
    }
}

impl Default for WallPatternRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoOpEventBus;
    use crate::shapes::rectangle_shape;

    fn square_grid(dims: Dimensions) -> Grid {
        Grid::Square {
            width: dims.width.ceil() as u32,
            height: dims.height.ceil() as u32,
        }
    }

    #[test]
    fn discretize_zero_length_wall_yields_start() {
        let wall = WallSegment {
            start: Position::new(2.0, 2.0),
            end: Position::new(2.0, 2.0),
            kind: WallKind::Indestructible,
            properties: WallProperties::default_random(),
        };
        let grid = Grid::Square {
            width: 10,
            height: 10,
        };
        let positions = discretize(&wall, &grid);
        assert_eq!(positions.len(), 1);
    }

    #[test]
    fn discretize_yields_at_least_one_position() {
        let wall = WallSegment {
            start: Position::new(0.0, 0.0),
            end: Position::new(5.0, 0.0),
            kind: WallKind::Indestructible,
            properties: WallProperties::default_random(),
        };
        let grid = Grid::Square {
            width: 10,
            height: 10,
        };
        assert!(!discretize(&wall, &grid).is_empty());
    }

    #[test]
    fn empty_pattern_has_no_walls_and_full_open_space() {
        let dims = Dimensions::new(10.0, 8.0);
        let shape = crate::shapes::scale(&rectangle_shape(), dims);
        let grid = square_grid(dims);
        let params = WallPatternParams {
            safety: SafetyParams {
                min_open_space: 1.0,
                min_path_width: 1.0,
            },
            ..WallPatternParams::default()
        };
        let walls = empty_pattern(&shape, dims, &grid, &params, 1, &NoOpEventBus).unwrap();
        assert!(walls.is_empty());
        assert_eq!(open_space_ratio(dims, &walls), 1.0);
    }

    #[test]
    fn random_pattern_is_deterministic_for_a_seed() {
        let dims = Dimensions::new(20.0, 16.0);
        let shape = crate::shapes::scale(&rectangle_shape(), dims);
        let grid = square_grid(dims);
        let params = WallPatternParams::default();
        let a = random_pattern(&shape, dims, &grid, &params, 42, &NoOpEventBus).unwrap();
        let b = random_pattern(&shape, dims, &grid, &params, 42, &NoOpEventBus).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn random_pattern_satisfies_navigability() {
        let dims = Dimensions::new(20.0, 16.0);
        let shape = crate::shapes::scale(&rectangle_shape(), dims);
        let grid = square_grid(dims);
        let params = WallPatternParams::default();
        let walls = random_pattern(&shape, dims, &grid, &params, 7, &NoOpEventBus).unwrap();
        assert!(validate(&shape, dims, &grid, &walls, &params.safety).is_none());
    }

    #[test]
    fn emergency_fallback_returns_empty_walls_and_publishes_event() {
        let dims = Dimensions::new(10.0, 8.0);
        let shape = crate::shapes::scale(&rectangle_shape(), dims);
        let grid = square_grid(dims);
        let params = WallPatternParams {
            density: 0.5,
            safety: SafetyParams {
                min_open_space: 0.99,
                min_path_width: 1.0,
            },
            emergency_fallback: true,
            ..WallPatternParams::default()
        };
        let walls = random_pattern(&shape, dims, &grid, &params, 42, &NoOpEventBus).unwrap();
        assert!(walls.is_empty());
    }

    #[test]
    fn unsatisfiable_safety_without_fallback_errors() {
        let dims = Dimensions::new(10.0, 8.0);
        let shape = crate::shapes::scale(&rectangle_shape(), dims);
        let grid = square_grid(dims);
        let params = WallPatternParams {
            density: 0.5,
            safety: SafetyParams {
                min_open_space: 0.99,
                min_path_width: 1.0,
            },
            emergency_fallback: false,
            ..WallPatternParams::default()
        };
        let result = random_pattern(&shape, dims, &grid, &params, 42, &NoOpEventBus);
        assert!(matches!(result, Err(ThatchError::UnsatisfiableSafety(_))));
    }

    #[test]
    fn registry_resolves_builtin_patterns() {
        let registry = WallPatternRegistry::new();
        let dims = Dimensions::new(10.0, 8.0);
        let shape = crate::shapes::scale(&rectangle_shape(), dims);
        let grid = square_grid(dims);
        let params = WallPatternParams::default();
        assert!(registry
            .generate("empty", &shape, dims, &grid, &params, 1, &NoOpEventBus)
            .is_ok());
        assert!(registry
            .generate("unknown", &shape, dims, &grid, &params, 1, &NoOpEventBus)
            .is_err());
    }
}
