//! # Shape Library (C2)
//!
//! Normalized room outlines with connection points, plus the transforms
//! (`scale`, `rotate`) and compatibility check the wall-pattern engine and
//! room builder need. Shapes are immutable templates — every transform
//! returns a new value.

use crate::coordinate::{Dimensions, GridKind, Position};
use crate::error::{ThatchError, ThatchResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The 8-way compass direction of a connection point, in the rotation order
/// used by [`rotate`]: `N, NW, W, SW, S, SE, E, NE` — rotating by +90°
/// advances two steps in this list (`N -> W -> S -> E -> N`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction8 {
    N,
    NW,
    W,
    SW,
    S,
    SE,
    E,
    NE,
    Unknown,
}

const ROTATION_ORDER: [Direction8; 8] = [
    Direction8::N,
    Direction8::NW,
    Direction8::W,
    Direction8::SW,
    Direction8::S,
    Direction8::SE,
    Direction8::E,
    Direction8::NE,
];

impl Direction8 {
    fn rotated(self, steps_of_90: u32) -> Direction8 {
        if self == Direction8::Unknown {
            return Direction8::Unknown;
        }
        let idx = ROTATION_ORDER
            .iter()
            .position(|d| *d == self)
            .expect("all non-Unknown directions are in ROTATION_ORDER");
        let shift = (steps_of_90 * 2) as usize % 8;
        ROTATION_ORDER[(idx + shift) % 8]
    }
}

/// A point on a room shape's boundary where an inter-room connection may
/// attach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPoint {
    pub name: String,
    pub normalized_position: Position,
    pub direction: Direction8,
    pub kind: String,
    pub required: bool,
}

impl ConnectionPoint {
    pub fn new(
        name: impl Into<String>,
        position: Position,
        direction: Direction8,
        kind: impl Into<String>,
        required: bool,
    ) -> Self {
        Self {
            name: name.into(),
            normalized_position: position,
            direction,
            kind: kind.into(),
            required,
        }
    }
}

/// Hints about which grid kinds a shape is designed for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridHints {
    pub preferred_grid_types: Vec<GridKind>,
    pub organic: bool,
}

/// Tolerance (in normalized units) within which a connection point must lie
/// on the boundary polygon.
pub const CONNECTION_POINT_TOLERANCE: f64 = 0.05;

/// A normalized room outline: an ordered polygon in `[0, 1]^2` plus its
/// connection points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomShape {
    pub name: String,
    pub shape_type: String,
    pub boundary: Vec<Position>,
    pub connections: Vec<ConnectionPoint>,
    pub grid_hints: GridHints,
}

impl RoomShape {
    pub fn new(
        name: impl Into<String>,
        shape_type: impl Into<String>,
        boundary: Vec<Position>,
        connections: Vec<ConnectionPoint>,
        grid_hints: GridHints,
    ) -> ThatchResult<Self> {
        let shape = Self {
            name: name.into(),
            shape_type: shape_type.into(),
            boundary,
            connections,
            grid_hints,
        };
        shape.validate()?;
        Ok(shape)
    }

    /// Validates the boundary/connection invariants: at least 3 boundary
    /// points, all normalized to `[0, 1]`, and every connection point within
    /// [`CONNECTION_POINT_TOLERANCE`] of the boundary polygon.
    pub fn validate(&self) -> ThatchResult<()> {
        if self.boundary.len() < 3 {
            return Err(ThatchError::ShapeValidation(format!(
                "shape '{}' has {} boundary points, need at least 3",
                self.name,
                self.boundary.len()
            )));
        }
        for p in &self.boundary {
            if !(0.0..=1.0).contains(&p.x) || !(0.0..=1.0).contains(&p.y) {
                return Err(ThatchError::ShapeValidation(format!(
                    "shape '{}' has a boundary point ({}, {}) outside [0, 1]^2",
                    self.name, p.x, p.y
                )));
            }
        }
        for c in &self.connections {
            let d = distance_to_polygon(c.normalized_position, &self.boundary);
            if d > CONNECTION_POINT_TOLERANCE {
                return Err(ThatchError::ShapeValidation(format!(
                    "shape '{}' connection '{}' is {d:.3} from the boundary, exceeds tolerance {CONNECTION_POINT_TOLERANCE}",
                    self.name, c.name
                )));
            }
        }
        Ok(())
    }
}

/// Distance from a point to the closest edge of a (closed) polygon.
fn distance_to_polygon(point: Position, boundary: &[Position]) -> f64 {
    let n = boundary.len();
    (0..n)
        .map(|i| {
            let a = boundary[i];
            let b = boundary[(i + 1) % n];
            distance_to_segment(point, a, b)
        })
        .fold(f64::INFINITY, f64::min)
}

fn distance_to_segment(p: Position, a: Position, b: Position) -> f64 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
    let proj = Position::new(a.x + t * abx, a.y + t * aby);
    p.distance(proj)
}

/// Scales a shape's boundary and connection points by `dims`. Connection
/// metadata (name, direction, kind, required) is unchanged.
pub fn scale(shape: &RoomShape, dims: Dimensions) -> RoomShape {
    let scale_pos = |p: Position| Position::new(p.x * dims.width, p.y * dims.height);
    RoomShape {
        name: shape.name.clone(),
        shape_type: shape.shape_type.clone(),
        boundary: shape.boundary.iter().map(|p| scale_pos(*p)).collect(),
        connections: shape
            .connections
            .iter()
            .map(|c| ConnectionPoint {
                normalized_position: scale_pos(c.normalized_position),
                ..c.clone()
            })
            .collect(),
        grid_hints: shape.grid_hints.clone(),
    }
}

/// Rotates a shape clockwise about the center of the normalized unit square
/// `(0.5, 0.5)`. `degrees` is normalized modulo 360 and snapped to the
/// nearest multiple of 90; only multiples of 90 are supported (non-multiples
/// are snapped, never interpolated).
pub fn rotate(shape: &RoomShape, degrees: i32) -> RoomShape {
    let normalized = ((degrees % 360) + 360) % 360;
    let snapped_steps = ((normalized as f64 / 90.0).round() as u32) % 4;

    let rotate_pos = |p: Position| -> Position {
        let mut cur = p;
        for _ in 0..snapped_steps {
            cur = Position::new(cur.y, 1.0 - cur.x);
        }
        cur
    };

    RoomShape {
        name: shape.name.clone(),
        shape_type: shape.shape_type.clone(),
        boundary: shape.boundary.iter().map(|p| rotate_pos(*p)).collect(),
        connections: shape
            .connections
            .iter()
            .map(|c| ConnectionPoint {
                normalized_position: rotate_pos(c.normalized_position),
                direction: c.direction.rotated(snapped_steps),
                ..c.clone()
            })
            .collect(),
        grid_hints: shape.grid_hints.clone(),
    }
}

/// Whether a shape is compatible with a given grid kind: true if the kind is
/// in `preferred_grid_types`; otherwise true for square/gridless by default,
/// and for hex only when the shape has exactly 6 boundary points or is
/// tagged organic.
pub fn is_compatible_with_grid(shape: &RoomShape, grid_kind: GridKind) -> bool {
    if shape.grid_hints.preferred_grid_types.contains(&grid_kind) {
        return true;
    }
    match grid_kind {
        GridKind::Square | GridKind::Gridless => true,
        GridKind::Hex => shape.boundary.len() == 6 || shape.grid_hints.organic,
    }
}

fn point(x: f64, y: f64) -> Position {
    Position::new(x, y)
}

/// Builds the `rectangle` default shape: a full-bleed rectangle with doors
/// at the midpoint of each side.
pub fn rectangle_shape() -> RoomShape {
    RoomShape::new(
        "rectangle",
        "rectangle",
        vec![
            point(0.0, 0.0),
            point(1.0, 0.0),
            point(1.0, 1.0),
            point(0.0, 1.0),
        ],
        vec![
            ConnectionPoint::new("north", point(0.5, 0.0), Direction8::N, "door", false),
            ConnectionPoint::new("south", point(0.5, 1.0), Direction8::S, "door", false),
            ConnectionPoint::new("east", point(1.0, 0.5), Direction8::E, "door", false),
            ConnectionPoint::new("west", point(0.0, 0.5), Direction8::W, "door", false),
        ],
        GridHints::default(),
    )
    .expect("built-in rectangle shape is always valid")
}

/// Builds the `square` default shape: identical topology to `rectangle`,
/// distinguished only by name/type (the caller is expected to request a
/// square [`Dimensions`] when scaling it).
pub fn square_shape() -> RoomShape {
    let mut shape = rectangle_shape();
    shape.name = "square".to_string();
    shape.shape_type = "square".to_string();
    shape
}

/// Builds the `l_shape` default shape: an L-shaped hexagonal boundary with
/// four connection points.
pub fn l_shape_shape() -> RoomShape {
    RoomShape::new(
        "l_shape",
        "l_shape",
        vec![
            point(0.0, 0.0),
            point(0.6, 0.0),
            point(0.6, 0.6),
            point(1.0, 0.6),
            point(1.0, 1.0),
            point(0.0, 1.0),
        ],
        vec![
            ConnectionPoint::new("north", point(0.3, 0.0), Direction8::N, "door", false),
            ConnectionPoint::new("east", point(1.0, 0.8), Direction8::E, "door", false),
            ConnectionPoint::new("south", point(0.3, 1.0), Direction8::S, "door", false),
            ConnectionPoint::new("west", point(0.0, 0.5), Direction8::W, "door", false),
        ],
        GridHints::default(),
    )
    .expect("built-in l_shape shape is always valid")
}

/// Builds the `t_shape` default shape: a T-shaped octagonal boundary.
pub fn t_shape_shape() -> RoomShape {
    RoomShape::new(
        "t_shape",
        "t_shape",
        vec![
            point(0.3, 0.0),
            point(0.7, 0.0),
            point(0.7, 0.4),
            point(1.0, 0.4),
            point(1.0, 1.0),
            point(0.0, 1.0),
            point(0.0, 0.4),
            point(0.3, 0.4),
        ],
        vec![
            ConnectionPoint::new("north", point(0.5, 0.0), Direction8::N, "door", false),
            ConnectionPoint::new("east", point(1.0, 0.7), Direction8::E, "door", false),
            ConnectionPoint::new("south", point(0.5, 1.0), Direction8::S, "door", false),
            ConnectionPoint::new("west", point(0.0, 0.7), Direction8::W, "door", false),
        ],
        GridHints::default(),
    )
    .expect("built-in t_shape shape is always valid")
}

/// Builds the `cross` default shape: a plus-sign dodecagon with a
/// connection at each of the four arm tips. It has 12 boundary points, so
/// it relies on the `organic` tag (rather than the 6-point rule) to stay
/// hex-compatible.
pub fn cross_shape() -> RoomShape {
    let mut grid_hints = GridHints::default();
    grid_hints.organic = true;
    RoomShape::new(
        "cross",
        "cross",
        vec![
            point(0.35, 0.0),
            point(0.65, 0.0),
            point(0.65, 0.35),
            point(1.0, 0.35),
            point(1.0, 0.65),
            point(0.65, 0.65),
            point(0.65, 1.0),
            point(0.35, 1.0),
            point(0.35, 0.65),
            point(0.0, 0.65),
            point(0.0, 0.35),
            point(0.35, 0.35),
        ],
        vec![
            ConnectionPoint::new("north", point(0.5, 0.0), Direction8::N, "door", false),
            ConnectionPoint::new("east", point(1.0, 0.5), Direction8::E, "door", false),
            ConnectionPoint::new("south", point(0.5, 1.0), Direction8::S, "door", false),
            ConnectionPoint::new("west", point(0.0, 0.5), Direction8::W, "door", false),
        ],
        grid_hints,
    )
    .expect("built-in cross shape is always valid")
}

/// Builds the `oval` default shape: a 12-sided polygon approximating an
/// ellipse, tagged `organic` so it remains hex-compatible despite not
/// having exactly 6 boundary points.
pub fn oval_shape() -> RoomShape {
    let sides = 12;
    let mut boundary = Vec::with_capacity(sides);
    for i in 0..sides {
        let theta = 2.0 * std::f64::consts::PI * (i as f64) / (sides as f64);
        let x = 0.5 + 0.5 * theta.cos();
        let y = 0.5 + 0.5 * theta.sin();
        boundary.push(point(x.clamp(0.0, 1.0), y.clamp(0.0, 1.0)));
    }
    let mut grid_hints = GridHints::default();
    grid_hints.organic = true;
    RoomShape::new(
        "oval",
        "oval",
        boundary,
        vec![
            ConnectionPoint::new("north", point(0.5, 0.0), Direction8::N, "door", false),
            ConnectionPoint::new("east", point(1.0, 0.5), Direction8::E, "door", false),
            ConnectionPoint::new("south", point(0.5, 1.0), Direction8::S, "door", false),
            ConnectionPoint::new("west", point(0.0, 0.5), Direction8::W, "door", false),
        ],
        grid_hints,
    )
    .expect("built-in oval shape is always valid")
}

/// Looks up a [`RoomShape`] by name, first consulting an optional external
/// loader, then the built-in default map, falling back to `rectangle` if
/// neither has it.
pub trait ShapeLoader: Send + Sync {
    fn load(&self, name: &str) -> Option<RoomShape>;
}

/// A [`ShapeLoader`] that never finds anything; used when no external
/// loader is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoShapeLoader;

impl ShapeLoader for NoShapeLoader {
    fn load(&self, _name: &str) -> Option<RoomShape> {
        None
    }
}

/// Holds the default shape set and an optional external loader, and
/// resolves shape names deterministically.
pub struct ShapeLibrary {
    loader: Box<dyn ShapeLoader>,
    defaults: HashMap<String, RoomShape>,
}

impl ShapeLibrary {
    pub fn new() -> Self {
        Self::with_loader(Box::new(NoShapeLoader))
    }

    pub fn with_loader(loader: Box<dyn ShapeLoader>) -> Self {
        let mut defaults = HashMap::new();
        for shape in [
            rectangle_shape(),
            square_shape(),
            l_shape_shape(),
            t_shape_shape(),
            cross_shape(),
            oval_shape(),
        ] {
            defaults.insert(shape.name.clone(), shape);
        }
        Self { loader, defaults }
    }

    /// Resolves a shape name: loader first, then defaults, falling back to
    /// `rectangle` if neither has it.
    pub fn resolve(&self, name: &str) -> RoomShape {
        if let Some(shape) = self.loader.load(name) {
            return shape;
        }
        if let Some(shape) = self.defaults.get(name) {
            return shape.clone();
        }
        self.defaults
            .get("rectangle")
            .cloned()
            .expect("rectangle is always registered")
    }
}

impl Default for ShapeLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_shapes_are_valid() {
        for shape in [
            rectangle_shape(),
            square_shape(),
            l_shape_shape(),
            t_shape_shape(),
            cross_shape(),
            oval_shape(),
        ] {
            shape.validate().unwrap();
        }
    }

    #[test]
    fn scale_multiplies_boundary_and_connections() {
        let shape = rectangle_shape();
        let dims = Dimensions::new(10.0, 8.0);
        let scaled = scale(&shape, dims);
        assert_eq!(scaled.boundary[2], Position::new(10.0, 8.0));
        let north = scaled.connections.iter().find(|c| c.name == "north").unwrap();
        assert_eq!(north.normalized_position, Position::new(5.0, 0.0));
        assert_eq!(north.direction, Direction8::N);
    }

    #[test]
    fn rotate_90_maps_n_to_w() {
        let shape = rectangle_shape();
        let rotated = rotate(&shape, 90);
        let west = rotated.connections.iter().find(|c| c.name == "north").unwrap();
        assert_eq!(west.direction, Direction8::W);
    }

    #[test]
    fn rotate_four_times_is_identity() {
        let shape = l_shape_shape();
        let mut rotated = shape.clone();
        for _ in 0..4 {
            rotated = rotate(&rotated, 90);
        }
        for (a, b) in shape.boundary.iter().zip(rotated.boundary.iter()) {
            assert!((a.x - b.x).abs() < 1e-9);
            assert!((a.y - b.y).abs() < 1e-9);
        }
    }

    #[test]
    fn rotate_normalizes_non_multiples() {
        let shape = rectangle_shape();
        let a = rotate(&shape, 100);
        let b = rotate(&shape, 90);
        assert_eq!(a.boundary, b.boundary);
    }

    #[test]
    fn hex_compatibility_requires_six_points_or_organic() {
        assert!(is_compatible_with_grid(&l_shape_shape(), GridKind::Hex));
        assert!(is_compatible_with_grid(&cross_shape(), GridKind::Hex));
        assert!(is_compatible_with_grid(&rectangle_shape(), GridKind::Square));
        assert!(!is_compatible_with_grid(&t_shape_shape(), GridKind::Hex));
    }

    #[test]
    fn shape_library_falls_back_to_rectangle() {
        let lib = ShapeLibrary::new();
        let resolved = lib.resolve("no-such-shape");
        assert_eq!(resolved.name, "rectangle");
    }

    #[test]
    fn shape_library_resolves_defaults() {
        let lib = ShapeLibrary::new();
        assert_eq!(lib.resolve("oval").name, "oval");
    }

    struct FixedLoader(RoomShape);
    impl ShapeLoader for FixedLoader {
        fn load(&self, _name: &str) -> Option<RoomShape> {
            Some(self.0.clone())
        }
    }

    #[test]
    fn external_loader_is_consulted_first() {
        let custom = rectangle_shape();
        let lib = ShapeLibrary::with_loader(Box::new(FixedLoader(custom)));
        assert_eq!(lib.resolve("anything").name, "rectangle");
    }

    #[test]
    fn invalid_boundary_rejected() {
        let result = RoomShape::new(
            "bad",
            "bad",
            vec![point(0.0, 0.0), point(1.0, 0.0)],
            vec![],
            GridHints::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn connection_point_off_boundary_rejected() {
        let result = RoomShape::new(
            "bad",
            "bad",
            vec![point(0.0, 0.0), point(1.0, 0.0), point(1.0, 1.0), point(0.0, 1.0)],
            vec![ConnectionPoint::new(
                "mid",
                point(0.5, 0.5),
                Direction8::N,
                "door",
                false,
            )],
            GridHints::default(),
        );
        assert!(result.is_err());
    }
}
