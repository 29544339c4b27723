//! # Coordinate & Grid Primitives (C1)
//!
//! Hex cube coordinates, the 2D `Position` used by square/gridless rooms and
//! shape boundaries, room `Dimensions`, and the `Grid` variants that bound a
//! room's footprint.
//!
//! The offset↔cube conversion and its inverse are the single bridge between
//! room-local coordinates and the environment's absolute cube-coordinate
//! frame (see §9, "Absolute-coordinate bridge"): every other module that
//! needs to cross that boundary calls [`local_to_cube`] or [`cube_to_local`]
//! rather than re-deriving the arithmetic.

use crate::error::{ThatchError, ThatchResult};
use serde::{Deserialize, Serialize};

/// Hex cube coordinate with the invariant `x + y + z = 0`.
///
/// # Examples
///
/// ```
/// use hexwarren::CubeCoord;
///
/// let origin = CubeCoord::origin();
/// let coord = CubeCoord::new(1, -1, 0).unwrap();
/// assert_eq!(origin.distance(coord), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CubeCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// The six unit neighbor offsets in their canonical enumeration order.
///
/// This order is load-bearing: the C6 pathfinder relies on it for
/// deterministic tie-breaking between equal-cost paths.
pub const NEIGHBOR_OFFSETS: [(i32, i32, i32); 6] = [
    (1, -1, 0),
    (1, 0, -1),
    (0, 1, -1),
    (-1, 1, 0),
    (-1, 0, 1),
    (0, -1, 1),
];

impl CubeCoord {
    /// Constructs a cube coordinate, validating `x + y + z == 0`.
    pub fn new(x: i32, y: i32, z: i32) -> ThatchResult<Self> {
        let coord = Self { x, y, z };
        if !coord.is_valid() {
            return Err(ThatchError::InvalidCoordinate(format!(
                "({x}, {y}, {z}) does not satisfy x + y + z = 0"
            )));
        }
        Ok(coord)
    }

    /// Constructs a cube coordinate from `x` and `z`, deriving `y = -x - z`.
    /// Always valid by construction.
    pub fn from_xz(x: i32, z: i32) -> Self {
        Self { x, y: -x - z, z }
    }

    /// The origin coordinate `(0, 0, 0)`.
    pub fn origin() -> Self {
        Self { x: 0, y: 0, z: 0 }
    }

    /// Whether this coordinate satisfies the cube invariant.
    pub fn is_valid(&self) -> bool {
        self.x + self.y + self.z == 0
    }

    /// The six neighbors of this coordinate, in canonical enumeration order.
    pub fn neighbors(&self) -> [CubeCoord; 6] {
        let mut out = [CubeCoord::origin(); 6];
        for (i, (dx, dy, dz)) in NEIGHBOR_OFFSETS.iter().enumerate() {
            out[i] = CubeCoord {
                x: self.x + dx,
                y: self.y + dy,
                z: self.z + dz,
            };
        }
        out
    }

    /// Hex distance to another coordinate. Zero for equal coordinates,
    /// symmetric in its arguments.
    ///
    /// # Examples
    ///
    /// ```
    /// use hexwarren::CubeCoord;
    ///
    /// let a = CubeCoord::origin();
    /// let b = CubeCoord::new(2, -1, -1).unwrap();
    /// assert_eq!(a.distance(b), b.distance(a));
    /// assert_eq!(a.distance(a), 0);
    /// ```
    pub fn distance(&self, other: CubeCoord) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        let dz = (self.z - other.z).unsigned_abs();
        (dx + dy + dz) / 2
    }
}

impl std::ops::Add for CubeCoord {
    type Output = CubeCoord;

    fn add(self, rhs: CubeCoord) -> CubeCoord {
        CubeCoord {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl std::ops::Sub for CubeCoord {
    type Output = CubeCoord;

    fn sub(self, rhs: CubeCoord) -> CubeCoord {
        CubeCoord {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

/// A real-valued 2D position, used for square/gridless local coordinates and
/// for shape boundaries (which are normalized to `[0, 1]^2`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Real-valued room dimensions; `area = width * height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Hex grid orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HexOrientation {
    Pointy,
    Flat,
}

/// The shape of a grid, independent of its footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridKind {
    Hex,
    Square,
    Gridless,
}

/// A room's backing grid: hex, square, or gridless, each with a known
/// footprint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Grid {
    Hex {
        orientation: HexOrientation,
        width: u32,
        height: u32,
    },
    Square {
        width: u32,
        height: u32,
    },
    Gridless {
        width: u32,
        height: u32,
    },
}

impl Grid {
    pub fn dimensions(&self) -> (u32, u32) {
        match *self {
            Grid::Hex { width, height, .. } => (width, height),
            Grid::Square { width, height } => (width, height),
            Grid::Gridless { width, height } => (width, height),
        }
    }

    pub fn kind(&self) -> GridKind {
        match self {
            Grid::Hex { .. } => GridKind::Hex,
            Grid::Square { .. } => GridKind::Square,
            Grid::Gridless { .. } => GridKind::Gridless,
        }
    }

    pub fn orientation(&self) -> Option<HexOrientation> {
        match self {
            Grid::Hex { orientation, .. } => Some(*orientation),
            _ => None,
        }
    }

    /// Whether a room-local position falls inside this grid's footprint.
    pub fn is_valid_position(&self, pos: Position) -> bool {
        let (width, height) = self.dimensions();
        pos.x >= 0.0 && pos.y >= 0.0 && pos.x < width as f64 && pos.y < height as f64
    }
}

/// Converts pointy-top offset coordinates `(col, row)` to cube coordinates,
/// per §4.1's policy: `x = col - (row - (row & 1)) / 2`, `z = row`,
/// `y = -x - z`.
pub fn offset_to_cube(col: i32, row: i32) -> CubeCoord {
    let x = col - (row - (row & 1)) / 2;
    let z = row;
    CubeCoord::from_xz(x, z)
}

/// Inverse of [`offset_to_cube`]: recovers `(col, row)` from a cube
/// coordinate produced by a pointy-top hex grid.
pub fn cube_to_offset(cube: CubeCoord) -> (i32, i32) {
    let row = cube.z;
    let col = cube.x + (row - (row & 1)) / 2;
    (col, row)
}

/// Converts a room-local [`Position`] into the room's local cube
/// representation, given its backing [`Grid`]. This is the single
/// implementation of the absolute-coordinate bridge described in §9: hex
/// rooms go through the offset↔cube mapping, square/gridless rooms use
/// `(floor(x), -x - z, floor(y))` directly.
pub fn local_to_cube(grid: &Grid, pos: Position) -> CubeCoord {
    match grid {
        Grid::Hex { .. } => offset_to_cube(pos.x.floor() as i32, pos.y.floor() as i32),
        Grid::Square { .. } | Grid::Gridless { .. } => {
            CubeCoord::from_xz(pos.x.floor() as i32, pos.y.floor() as i32)
        }
    }
}

/// Inverse of [`local_to_cube`]: recovers a room-local [`Position`] from a
/// local cube coordinate, given the room's backing [`Grid`].
pub fn cube_to_local(grid: &Grid, cube: CubeCoord) -> Position {
    match grid {
        Grid::Hex { .. } => {
            let (col, row) = cube_to_offset(cube);
            Position::new(col as f64, row as f64)
        }
        Grid::Square { .. } | Grid::Gridless { .. } => Position::new(cube.x as f64, cube.z as f64),
    }
}
