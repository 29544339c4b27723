//! End-to-end scenarios exercising only the public `hexwarren` API: one
//! generation run, one wall-pattern safety case, one pathfinding case, and
//! one snapshot round-trip, each built from the literal inputs they're
//! scenarios for.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use hexwarren::{
    Connection, ConnectionKind, CubeCoord, Dimensions, EntityQuery, Environment,
    EnvironmentData, GenerationConfig, GenerationKind, Grid, GraphGenerator, HexOrientation,
    LayoutKind, NoOpEventBus, PassageData, PlacedEntityData, RoomQuery, SafetyParams,
    ShapeLibrary, WallPatternParams, WallPatternRegistry, ZoneData,
};

fn shape_library() -> ShapeLibrary {
    ShapeLibrary::new()
}

fn wall_patterns() -> WallPatternRegistry {
    WallPatternRegistry::new()
}

#[test]
fn s1_deterministic_linear_dungeon() {
    let lib = shape_library();
    let patterns = wall_patterns();
    let bus = NoOpEventBus;
    let generator = GraphGenerator::new(&lib, &patterns, &bus);

    let request = GenerationConfig {
        kind: GenerationKind::Graph,
        seed: 12345,
        theme: "dungeon".to_string(),
        layout: LayoutKind::Linear,
        room_count: 5,
        min_room_size: Dimensions::new(8.0, 8.0),
        max_room_size: Dimensions::new(20.0, 20.0),
        ..GenerationConfig::default()
    };

    let (graph, orchestrator) = generator.generate(&request).unwrap();
    assert_eq!(graph.nodes.len(), 5);
    assert_eq!(graph.edges.len(), 4);
    assert_eq!(graph.nodes["room-0"].room_type, "entrance");
    assert_eq!(graph.nodes["room-4"].room_type, "boss");

    let entrance = orchestrator.get_room("room-0").unwrap();
    assert!(entrance
        .entities
        .values()
        .all(|e| !matches!(e, hexwarren::RoomEntity::Wall(_))));

    let (graph_again, _) = generator.generate(&request).unwrap();
    assert_eq!(
        serde_json::to_string(&graph).unwrap(),
        serde_json::to_string(&graph_again).unwrap()
    );
}

#[test]
fn s2_empty_pattern_safety() {
    let dims = Dimensions::new(10.0, 8.0);
    let shape = hexwarren::scale(&hexwarren::rectangle_shape(), dims);
    let grid = Grid::Square {
        width: 10,
        height: 8,
    };
    let registry = wall_patterns();
    let params = WallPatternParams {
        safety: SafetyParams {
            min_open_space: 1.0,
            min_path_width: 1.0,
        },
        ..WallPatternParams::default()
    };
    let walls = registry
        .generate("empty", &shape, dims, &grid, &params, 1, &NoOpEventBus)
        .unwrap();
    assert!(walls.is_empty());
}

#[test]
fn s3_emergency_fallback() {
    let dims = Dimensions::new(10.0, 8.0);
    let shape = hexwarren::scale(&hexwarren::rectangle_shape(), dims);
    let grid = Grid::Square {
        width: 10,
        height: 8,
    };
    let registry = wall_patterns();
    let params = WallPatternParams {
        density: 0.5,
        safety: SafetyParams {
            min_open_space: 0.99,
            min_path_width: 1.0,
        },
        emergency_fallback: true,
        ..WallPatternParams::default()
    };
    let walls = registry
        .generate("random", &shape, dims, &grid, &params, 42, &NoOpEventBus)
        .unwrap();
    assert!(walls.is_empty());
}

#[test]
fn s4_pathfinding_around_obstacles() {
    let start = CubeCoord::origin();
    let goal = CubeCoord::new(3, 0, -3).unwrap();
    let blocked: HashSet<CubeCoord> = [
        CubeCoord::new(1, -1, 0).unwrap(),
        CubeCoord::new(1, 0, -1).unwrap(),
        CubeCoord::new(2, 0, -2).unwrap(),
    ]
    .into_iter()
    .collect();

    let orch = hexwarren::RoomOrchestrator::new();
    let env = Environment::new(
        "env-s4",
        "dungeon",
        "dungeon",
        orch,
        HashMap::new(),
        Arc::new(NoOpEventBus),
    );
    let result = env.find_path_cube(start, goal, &blocked).unwrap();
    assert!(result.found);
    assert_eq!(result.path.last(), Some(&goal));
    assert!(result.path.len() > 3);
    for step in &result.path {
        assert!(!blocked.contains(step));
    }
}

#[test]
fn s5_surrounded_start() {
    let start = CubeCoord::origin();
    let goal = CubeCoord::from_xz(5, -5);
    let blocked: HashSet<CubeCoord> = start.neighbors().into_iter().collect();

    let orch = hexwarren::RoomOrchestrator::new();
    let env = Environment::new(
        "env-s5",
        "dungeon",
        "dungeon",
        orch,
        HashMap::new(),
        Arc::new(NoOpEventBus),
    );
    let result = env.find_path_cube(start, goal, &blocked).unwrap();
    assert!(!result.found);
    assert!(result.path.is_empty());
    assert_eq!(result.cost, 0);
}

#[test]
fn s6_snapshot_round_trip() {
    let zone1 = ZoneData {
        id: "zone-1".to_string(),
        room_type: "chamber".to_string(),
        origin: CubeCoord::origin(),
        width: 10,
        height: 10,
        grid_shape: hexwarren::GridKind::Hex,
        orientation: Some(HexOrientation::Pointy),
        entity_ids: vec!["monster-1".to_string()],
    };
    let zone2 = ZoneData {
        id: "zone-2".to_string(),
        room_type: "chamber".to_string(),
        origin: CubeCoord::new(15, -8, -7).unwrap(),
        width: 15,
        height: 15,
        grid_shape: hexwarren::GridKind::Hex,
        orientation: Some(HexOrientation::Pointy),
        entity_ids: vec![],
    };
    let passage = PassageData {
        id: "passage-1".to_string(),
        from_zone_id: "zone-1".to_string(),
        to_zone_id: "zone-2".to_string(),
        controlling_entity_id: None,
        bidirectional: true,
    };
    let monster = PlacedEntityData {
        id: "monster-1".to_string(),
        entity_type: "monster".to_string(),
        position: CubeCoord::new(3, -1, -2).unwrap(),
        size: 1,
        blocks_movement: true,
        blocks_los: false,
        zone_id: "zone-1".to_string(),
        subtype: None,
        properties: HashMap::new(),
    };

    let data = EnvironmentData {
        id: "env-s6".to_string(),
        env_type: "dungeon".to_string(),
        theme: "dungeon".to_string(),
        metadata: HashMap::new(),
        zones: vec![zone1, zone2],
        passages: vec![passage],
        entities: vec![monster],
        walls: vec![],
    };

    let (env, non_fatal) = Environment::from_data(data, Arc::new(NoOpEventBus)).unwrap();
    assert!(non_fatal.is_empty());

    let rooms = env.query_rooms(&RoomQuery::default()).unwrap();
    assert_eq!(rooms.len(), 2);

    let entities = env.query_entities(&EntityQuery::default()).unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].position, CubeCoord::new(3, -1, -2).unwrap());

    let blocked = env.get_blocked_hexes();
    assert!(blocked.contains(&CubeCoord::new(3, -1, -2).unwrap()));

    let round_tripped = env.to_data();
    assert_eq!(round_tripped.zones.len(), 2);
    assert_eq!(round_tripped.passages.len(), 1);
}

#[test]
fn connection_with_door_kind_roundtrips_through_orchestrator() {
    let mut orch = hexwarren::RoomOrchestrator::new();
    orch.add_room(hexwarren::Room::new(
        "a",
        "chamber",
        Grid::Square {
            width: 5,
            height: 5,
        },
    ));
    orch.add_room(hexwarren::Room::new(
        "b",
        "chamber",
        Grid::Square {
            width: 5,
            height: 5,
        },
    ));
    orch.add_connection(Connection {
        id: "c1".to_string(),
        from_room_id: "a".to_string(),
        to_room_id: "b".to_string(),
        kind: ConnectionKind::Door,
        bidirectional: true,
        passable: true,
    });
    let path = orch.find_path("a", "b", &|_| true).unwrap();
    assert_eq!(path, vec!["a", "b"]);
}
