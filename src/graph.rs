//! # Graph Generator (C8)
//!
//! Turns a [`GenerationConfig`] into a [`RoomGraph`] over one of four
//! layout families, instantiating each node through the room builder (C5)
//! and assembling the result into a [`RoomOrchestrator`] (C7).
//!
//! All randomness flows from a single `StdRng` seeded from the request,
//! in the fixed order: room-count derivation, layout structure, then
//! per-node type/size selection in construction order. Per-room wall
//! generation reseeds from a value derived from that same seed so two
//! identical requests always produce byte-identical rooms.

use crate::coordinate::Dimensions;
use crate::error::{ThatchError, ThatchResult};
use crate::events::{topics, EventBus};
use crate::orchestrator::{Connection, ConnectionKind, RoomOrchestrator};
use crate::room::{FeatureSpec, RoomBuilder};
use crate::shapes::ShapeLibrary;
use crate::walls::WallPatternRegistry;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// The generation strategy a [`GenerationConfig`] requests. This generator
/// only implements `Graph` and `Hybrid`; `Prefab` is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationKind {
    Graph,
    Prefab,
    Hybrid,
}

/// A coarse room-count class, used when `room_count` is left at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeClass {
    Small,
    Medium,
    Large,
    Custom,
}

/// Which layout family produces the room graph's connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutKind {
    Linear,
    Branching,
    Grid,
    Organic,
    Custom,
}

/// The input to graph generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub kind: GenerationKind,
    /// `0` means "implementation-chosen but recorded" (§6); the resolved
    /// seed is reported in the `generation.started`/`generation.completed`
    /// event payloads, never silently substituted with system entropy.
    pub seed: u64,
    pub theme: String,
    pub size: SizeClass,
    pub room_count: i64,
    pub room_types: Vec<String>,
    pub min_room_size: Dimensions,
    pub max_room_size: Dimensions,
    pub layout: LayoutKind,
    pub density: f64,
    pub connectivity: f64,
    pub constraints: Vec<Value>,
    pub metadata: HashMap<String, Value>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            kind: GenerationKind::Graph,
            seed: 0,
            theme: "dungeon".to_string(),
            size: SizeClass::Medium,
            room_count: 0,
            room_types: Vec::new(),
            min_room_size: Dimensions::new(0.0, 0.0),
            max_room_size: Dimensions::new(0.0, 0.0),
            layout: LayoutKind::Linear,
            density: 0.4,
            connectivity: 0.5,
            constraints: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}

/// One room slot in a [`RoomGraph`], before it has been realized into a
/// [`crate::room::Room`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomNode {
    pub id: String,
    pub room_type: String,
    pub theme: String,
    pub size: Dimensions,
    pub features: Vec<String>,
    pub properties: HashMap<String, Value>,
}

/// One edge in a [`RoomGraph`], before it has been realized into a
/// [`Connection`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEdge {
    pub id: String,
    pub from_id: String,
    pub to_id: String,
    pub edge_type: String,
    pub bidirectional: bool,
}

/// The abstract room graph a layout family produces, before room
/// assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomGraph {
    pub nodes: HashMap<String, RoomNode>,
    pub edges: HashMap<String, ConnectionEdge>,
    pub adjacency: HashMap<String, Vec<String>>,
}

/// A room placeholder produced by a layout function, before type/size
/// selection.
struct NodeDraft {
    id: String,
    fixed_type: Option<String>,
    properties: HashMap<String, Value>,
}

/// Used when `request.seed == 0`: a fixed, recorded, non-time-based seed,
/// satisfying "implementation-chosen but recorded" without violating the
/// no-system-entropy determinism rule.
const DEFAULT_SEED: u64 = 0x5EED_0000_0000_0001;

const DEFAULT_ROOM_TYPES: [&str; 4] = ["chamber", "corridor", "treasure", "trap"];
const MOVEMENT_CRITICAL_TYPES: [&str; 4] = ["entrance", "exit", "corridor", "junction"];

fn derive_seed(seed: u64, index: u64) -> u64 {
    seed ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn validate_config(config: &GenerationConfig) -> ThatchResult<()> {
    if !matches!(config.kind, GenerationKind::Graph | GenerationKind::Hybrid) {
        return Err(ThatchError::InvalidConfig(format!(
            "generation kind {:?} is not supported by this generator",
            config.kind
        )));
    }
    if config.room_count < 0 {
        return Err(ThatchError::InvalidConfig(
            "room_count must be >= 0".to_string(),
        ));
    }
    if config.room_count > 200 {
        return Err(ThatchError::InvalidConfig(
            "room_count must be <= 200".to_string(),
        ));
    }
    Ok(())
}

fn effective_bounds(config: &GenerationConfig) -> (Dimensions, Dimensions) {
    let min = if config.min_room_size.width <= 0.0 || config.min_room_size.height <= 0.0 {
        Dimensions::new(8.0, 8.0)
    } else {
        config.min_room_size
    };
    let max = if config.max_room_size.width <= 0.0 || config.max_room_size.height <= 0.0 {
        Dimensions::new(20.0, 20.0)
    } else {
        config.max_room_size
    };
    (min, max)
}

fn resolve_room_count(config: &GenerationConfig, rng: &mut StdRng) -> usize {
    if config.room_count > 0 {
        return config.room_count as usize;
    }
    let (lo, hi) = match config.size {
        SizeClass::Small => (5u32, 15u32),
        SizeClass::Medium | SizeClass::Custom => (15u32, 50u32),
        SizeClass::Large => (50u32, 150u32),
    };
    rng.gen_range(lo..=hi) as usize
}

fn node_size(room_type: &str, min: Dimensions, max: Dimensions, rng: &mut StdRng) -> Dimensions {
    let mut effective_min = min;
    let mut effective_max = max;
    if room_type == "boss" {
        effective_min = Dimensions::new(min.width * 1.5, min.height * 1.5);
    }
    if room_type == "corridor" {
        effective_max = Dimensions::new(max.width * 0.7, max.height * 0.7);
    }
    let width = if effective_min.width < effective_max.width {
        rng.gen_range(effective_min.width..=effective_max.width)
    } else {
        effective_min.width
    };
    let height = if effective_min.height < effective_max.height {
        rng.gen_range(effective_min.height..=effective_max.height)
    } else {
        effective_min.height
    };
    Dimensions::new(width, height)
}

fn room_type_for_index(
    is_first: bool,
    is_last: bool,
    room_types: &[String],
    rng: &mut StdRng,
) -> String {
    if !room_types.is_empty() {
        return room_types[rng.gen_range(0..room_types.len())].clone();
    }
    if is_first {
        "entrance".to_string()
    } else if is_last {
        "boss".to_string()
    } else {
        DEFAULT_ROOM_TYPES[rng.gen_range(0..DEFAULT_ROOM_TYPES.len())].to_string()
    }
}

fn features_for_type(room_type: &str) -> Vec<String> {
    match room_type {
        "treasure" => vec!["chest".to_string()],
        "trap" => vec!["pressure-plate".to_string()],
        "boss" => vec!["throne".to_string()],
        _ => Vec::new(),
    }
}

fn material_for_theme(theme: &str) -> String {
    let theme = theme.to_lowercase();
    if theme.contains("dungeon") || theme.contains("castle") {
        "stone".to_string()
    } else if theme.contains("cave") || theme.contains("natural") {
        "rock".to_string()
    } else if theme.contains("wooden") || theme.contains("tavern") {
        "wood".to_string()
    } else if theme.contains("metal") || theme.contains("facility") {
        "metal".to_string()
    } else {
        "stone".to_string()
    }
}

fn wall_pattern_and_density(room_type: &str) -> (&'static str, f64) {
    if MOVEMENT_CRITICAL_TYPES.contains(&room_type) {
        return ("empty", 0.0);
    }
    let density = match room_type {
        "chamber" => 0.4,
        "boss" => 0.6,
        "treasure" => 0.3,
        "trap" => 0.8,
        _ => 0.4,
    };
    ("random", density)
}

fn destructible_ratio_for(room_type: &str) -> f64 {
    match room_type {
        "boss" => 0.3,
        "treasure" => 0.5,
        "trap" => 0.8,
        _ => 0.7,
    }
}

fn connection_kind(edge_type: &str) -> ConnectionKind {
    match edge_type {
        "door" => ConnectionKind::Door,
        "passage" => ConnectionKind::Passage,
        "stairs" => ConnectionKind::Stairs,
        "portal" => ConnectionKind::Portal,
        "secret" => ConnectionKind::Secret,
        _ => ConnectionKind::Door,
    }
}

type EdgeDraft = (String, String, String);

fn layout_linear(n: usize) -> (Vec<NodeDraft>, Vec<EdgeDraft>) {
    let nodes = (0..n)
        .map(|i| NodeDraft {
            id: format!("room-{i}"),
            fixed_type: None,
            properties: HashMap::new(),
        })
        .collect();
    let edges = (0..n.saturating_sub(1))
        .map(|i| (format!("room-{i}"), format!("room-{}", i + 1), "door".to_string()))
        .collect();
    (nodes, edges)
}

fn layout_branching(n: usize, rng: &mut StdRng) -> (Vec<NodeDraft>, Vec<EdgeDraft>) {
    let mut nodes = Vec::with_capacity(n);
    let mut edges = Vec::new();
    if n == 0 {
        return (nodes, edges);
    }
    nodes.push(NodeDraft {
        id: "room-0".to_string(),
        fixed_type: Some("hub".to_string()),
        properties: HashMap::new(),
    });

    let remaining = n - 1;
    if remaining == 0 {
        return (nodes, edges);
    }
    let k = (3 + rng.gen_range(0..3)).min(remaining);
    let mut branch_lengths = vec![0usize; k];
    for i in 0..remaining {
        branch_lengths[i % k] += 1;
    }

    let mut next_index = 1;
    for (branch_idx, &len) in branch_lengths.iter().enumerate() {
        let mut prev_id = "room-0".to_string();
        for pos in 0..len {
            let id = format!("room-{next_index}");
            let mut properties = HashMap::new();
            properties.insert("branch_index".to_string(), json!(branch_idx));
            properties.insert("branch_position".to_string(), json!(pos));
            nodes.push(NodeDraft {
                id: id.clone(),
                fixed_type: None,
                properties,
            });
            edges.push((prev_id.clone(), id.clone(), "door".to_string()));
            prev_id = id;
            next_index += 1;
        }
    }
    (nodes, edges)
}

fn layout_grid(n: usize) -> (Vec<NodeDraft>, Vec<EdgeDraft>) {
    let columns = (((n as f64) * 0.7).sqrt().ceil() as usize + 1).max(1);
    let mut nodes = Vec::with_capacity(n);
    let mut edges = Vec::new();
    for i in 0..n {
        let id = format!("room-{i}");
        nodes.push(NodeDraft {
            id: id.clone(),
            fixed_type: None,
            properties: HashMap::new(),
        });
        let col = i % columns;
        let row = i / columns;
        if col > 0 {
            edges.push((format!("room-{}", i - 1), id.clone(), "door".to_string()));
        }
        if row > 0 {
            edges.push((format!("room-{}", i - columns), id.clone(), "door".to_string()));
        }
    }
    (nodes, edges)
}

fn layout_organic(n: usize, rng: &mut StdRng) -> (Vec<NodeDraft>, Vec<EdgeDraft>) {
    let mut nodes = Vec::with_capacity(n);
    let mut edges = Vec::new();
    if n == 0 {
        return (nodes, edges);
    }
    nodes.push(NodeDraft {
        id: "room-0".to_string(),
        fixed_type: None,
        properties: HashMap::new(),
    });
    let mut connectable: Vec<usize> = vec![0];

    for i in 1..n {
        let id = format!("room-{i}");
        nodes.push(NodeDraft {
            id: id.clone(),
            fixed_type: None,
            properties: HashMap::new(),
        });

        let c = 1 + rng.gen_range(0..3);
        let window_start = connectable.len().saturating_sub(8);
        let mut window: Vec<usize> = connectable[window_start..].to_vec();
        for idx in (1..window.len()).rev() {
            let j = rng.gen_range(0..=idx);
            window.swap(idx, j);
        }
        let take = c.min(window.len());
        for &neighbor in window.iter().take(take) {
            edges.push((format!("room-{neighbor}"), id.clone(), "door".to_string()));
        }
        connectable.push(i);
    }
    (nodes, edges)
}

/// Produces room graphs and assembles them into rooms and connections.
pub struct GraphGenerator<'a> {
    shape_library: &'a ShapeLibrary,
    wall_patterns: &'a WallPatternRegistry,
    event_bus: &'a dyn EventBus,
}

impl<'a> GraphGenerator<'a> {
    pub fn new(
        shape_library: &'a ShapeLibrary,
        wall_patterns: &'a WallPatternRegistry,
        event_bus: &'a dyn EventBus,
    ) -> Self {
        Self {
            shape_library,
            wall_patterns,
            event_bus,
        }
    }

    /// Generates a [`RoomGraph`] and realizes it into a [`RoomOrchestrator`]
    /// of assembled rooms and connections.
    pub fn generate(&self, request: &GenerationConfig) -> ThatchResult<(RoomGraph, RoomOrchestrator)> {
        validate_config(request)?;
        let effective_seed = if request.seed == 0 {
            DEFAULT_SEED
        } else {
            request.seed
        };
        self.event_bus
            .publish(topics::GENERATION_STARTED, json!({ "seed": effective_seed }));

        let result = self.generate_inner(request, effective_seed);
        match &result {
            Ok((graph, _)) => {
                self.event_bus.publish(
                    topics::GENERATION_COMPLETED,
                    json!({ "seed": effective_seed, "room_count": graph.nodes.len() }),
                );
            }
            Err(err) => {
                self.event_bus.publish(
                    topics::GENERATION_FAILED,
                    json!({ "seed": effective_seed, "reason": err.to_string() }),
                );
            }
        }
        result
    }

    fn generate_inner(
        &self,
        request: &GenerationConfig,
        effective_seed: u64,
    ) -> ThatchResult<(RoomGraph, RoomOrchestrator)> {
        let mut rng = StdRng::seed_from_u64(effective_seed);
        let room_count = resolve_room_count(request, &mut rng);

        let (node_drafts, edge_drafts) = match request.layout {
            LayoutKind::Linear => layout_linear(room_count),
            LayoutKind::Branching => layout_branching(room_count, &mut rng),
            LayoutKind::Grid => layout_grid(room_count),
            LayoutKind::Organic | LayoutKind::Custom => layout_organic(room_count, &mut rng),
        };

        let last = node_drafts.len().saturating_sub(1);
        let (min_size, max_size) = effective_bounds(request);

        let mut nodes: HashMap<String, RoomNode> = HashMap::new();
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        let mut orchestrator = RoomOrchestrator::new();

        for (idx, draft) in node_drafts.iter().enumerate() {
            let room_type = draft.fixed_type.clone().unwrap_or_else(|| {
                room_type_for_index(idx == 0, idx == last, &request.room_types, &mut rng)
            });
            let size = if room_type == "hub" {
                Dimensions::new(20.0, 20.0)
            } else {
                node_size(&room_type, min_size, max_size, &mut rng)
            };
            let features = features_for_type(&room_type);

            nodes.insert(
                draft.id.clone(),
                RoomNode {
                    id: draft.id.clone(),
                    room_type: room_type.clone(),
                    theme: request.theme.clone(),
                    size,
                    features: features.clone(),
                    properties: draft.properties.clone(),
                },
            );
            adjacency.entry(draft.id.clone()).or_default();

            let (pattern, density) = wall_pattern_and_density(&room_type);
            let destructible_ratio = destructible_ratio_for(&room_type);
            let material = material_for_theme(&request.theme);
            let room_seed = derive_seed(effective_seed, idx as u64);

            let mut builder = RoomBuilder::new(self.shape_library, self.wall_patterns, self.event_bus)
                .with_id(draft.id.clone())
                .with_size(size)
                .with_theme(request.theme.clone())
                .with_wall_pattern(pattern)
                .with_density(density)
                .with_destructible_ratio(destructible_ratio)
                .with_material(material)
                .with_seed(room_seed);
            for feature_type in &features {
                builder = builder.with_feature(FeatureSpec::new(feature_type.clone()));
            }
            let room = builder
                .build()
                .map_err(|e| ThatchError::in_stage("spatial placement", e))?;
            orchestrator.add_room(room);
        }

        let mut edges: HashMap<String, ConnectionEdge> = HashMap::new();
        for (edge_idx, (from, to, edge_type)) in edge_drafts.iter().enumerate() {
            let edge_id = format!("edge-{edge_idx}");
            adjacency.entry(from.clone()).or_default().push(to.clone());
            adjacency.entry(to.clone()).or_default().push(from.clone());
            edges.insert(
                edge_id.clone(),
                ConnectionEdge {
                    id: edge_id.clone(),
                    from_id: from.clone(),
                    to_id: to.clone(),
                    edge_type: edge_type.clone(),
                    bidirectional: true,
                },
            );
            orchestrator.add_connection(Connection {
                id: edge_id,
                from_room_id: from.clone(),
                to_room_id: to.clone(),
                kind: connection_kind(edge_type),
                bidirectional: true,
                passable: true,
            });
        }

        Ok((
            RoomGraph {
                nodes,
                edges,
                adjacency,
            },
            orchestrator,
        ))
    }
}
