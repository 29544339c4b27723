//! # Hexwarren
//!
//! A procedural environment generation engine for tactical maps: rooms,
//! walls, connections, and placed entities over a hex, square, or gridless
//! grid, plus the spatial query and pathfinding services an environment
//! needs once it exists.
//!
//! ## Architecture Overview
//!
//! - **Coordinates** ([`coordinate`]): cube coordinates, room-local
//!   positions, and the single bridge between the two.
//! - **Shapes** ([`shapes`]): room boundary polygons and their connection
//!   points.
//! - **Walls** ([`walls`]): the wall-pattern registry, discretization, and
//!   the navigability repair loop.
//! - **Capacity** ([`capacity`]): feeling-to-dimensions and
//!   dimensions-to-entity-count formulas.
//! - **Room** ([`room`]): the assembled `Room` and its fluent builder.
//! - **Pathfinder** ([`pathfinder`]): hex-cube A* with deterministic
//!   tie-breaking.
//! - **Orchestrator** ([`orchestrator`]): rooms and connections for one
//!   environment, and room-to-room BFS.
//! - **Graph** ([`graph`]): turns a generation request into a room graph and
//!   realized rooms, across four layout families.
//! - **Environment** ([`environment`]): the live, query-able environment,
//!   its shared-state lock, and snapshot persistence.
//! - **Events** ([`events`]): the event bus capability and topic taxonomy.

pub mod capacity;
pub mod coordinate;
pub mod environment;
pub mod error;
pub mod events;
pub mod graph;
pub mod orchestrator;
pub mod pathfinder;
pub mod room;
pub mod shapes;
pub mod walls;

pub use capacity::{
    default_profile, estimate_capacity, optimal_size, split_options, CapacityConstraints,
    CapacityEstimate, Feeling, Profile, SplitOption,
};
pub use coordinate::{
    cube_to_local, cube_to_offset, local_to_cube, offset_to_cube, CubeCoord, Dimensions, Grid,
    GridKind, HexOrientation, Position,
};
pub use environment::{
    Environment, EntityQuery, EntitySummary, EnvironmentData, PassageData, PlacedEntityData,
    RoomQuery, RoomSummary, WallSegmentData, ZoneData,
};
pub use error::{ThatchError, ThatchResult};
pub use events::{topics, EventBus, LoggingEventBus, NoOpEventBus};
pub use graph::{
    GenerationConfig, GenerationKind, GraphGenerator, LayoutKind, RoomGraph, SizeClass,
};
pub use orchestrator::{Connection, ConnectionKind, RoomOrchestrator};
pub use pathfinder::{find_hex_path, CancelSignal, NeverCancel, PathResult};
pub use room::{
    EntityCommon, FeatureSpec, PlacedEntity, Room, RoomBuilder, RoomEntity, Rotation, WallEntity,
};
pub use shapes::{rectangle_shape, scale, RoomShape, ShapeLibrary, ShapeLoader};
pub use walls::{
    discretize, SafetyParams, WallKind, WallPatternParams, WallPatternRegistry, WallProperties,
    WallSegment,
};

/// Crate version, as reported in generation metadata and the demonstration
/// CLI's `--version` output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Defaults and bounds used across the generation pipeline when a request
/// leaves a field at its zero-sentinel.
pub mod config {
    use crate::coordinate::Dimensions;

    /// Room size floor used when a request's `min_room_size` is unset.
    pub const DEFAULT_MIN_ROOM_SIZE: Dimensions = Dimensions {
        width: 8.0,
        height: 8.0,
    };

    /// Room size ceiling used when a request's `max_room_size` is unset.
    pub const DEFAULT_MAX_ROOM_SIZE: Dimensions = Dimensions {
        width: 20.0,
        height: 20.0,
    };

    /// Hard upper bound on `room_count`; requests above this are rejected.
    pub const MAX_ROOM_COUNT: i64 = 200;

    /// Theme used when a request leaves `theme` empty.
    pub const DEFAULT_THEME: &str = "dungeon";
}
