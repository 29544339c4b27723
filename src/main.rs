//! # Hexwarren Demonstration CLI
//!
//! Generates one environment from command-line parameters and prints its
//! portable snapshot as JSON. A thin driver over the library crate; the
//! generation engine itself has no CLI or I/O dependency.

use clap::Parser;
use hexwarren::{
    Environment, GenerationConfig, GenerationKind, GraphGenerator, LayoutKind, LoggingEventBus,
    ShapeLibrary, SizeClass, WallPatternRegistry,
};
use tracing::{error, info};

/// Command-line arguments for the generation demonstration.
#[derive(Parser, Debug)]
#[command(name = "hexwarren")]
#[command(about = "Procedural tactical environment generation engine")]
#[command(version)]
struct Args {
    /// Random seed; 0 resolves to a fixed implementation-chosen seed.
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Theme name (affects material choice and default room types).
    #[arg(short, long, default_value = "dungeon")]
    theme: String,

    /// Layout family: linear, branching, grid, or organic.
    #[arg(short, long, default_value = "linear")]
    layout: String,

    /// Room count; 0 derives a count from `size`.
    #[arg(short = 'n', long, default_value_t = 0)]
    room_count: i64,

    /// Size class used when `room_count` is 0: small, medium, large.
    #[arg(long, default_value = "medium")]
    size: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_layout(name: &str) -> LayoutKind {
    match name.to_lowercase().as_str() {
        "branching" => LayoutKind::Branching,
        "grid" => LayoutKind::Grid,
        "organic" => LayoutKind::Organic,
        _ => LayoutKind::Linear,
    }
}

fn parse_size(name: &str) -> SizeClass {
    match name.to_lowercase().as_str() {
        "small" => SizeClass::Small,
        "large" => SizeClass::Large,
        _ => SizeClass::Medium,
    }
}

fn main() -> hexwarren::ThatchResult<()> {
    let args = Args::parse();
    initialize_logging(&args.log_level);

    info!("hexwarren v{} starting", hexwarren::VERSION);

    let request = GenerationConfig {
        kind: GenerationKind::Graph,
        seed: args.seed,
        theme: args.theme.clone(),
        size: parse_size(&args.size),
        room_count: args.room_count,
        layout: parse_layout(&args.layout),
        ..GenerationConfig::default()
    };

    let shape_library = ShapeLibrary::new();
    let wall_patterns = WallPatternRegistry::new();
    let event_bus = LoggingEventBus;
    let generator = GraphGenerator::new(&shape_library, &wall_patterns, &event_bus);

    let (graph, orchestrator) = generator.generate(&request).map_err(|e| {
        error!(error = %e, "generation failed");
        e
    })?;
    info!(
        rooms = graph.nodes.len(),
        connections = graph.edges.len(),
        "generated room graph"
    );

    let room_positions = Environment::pack_rooms(&orchestrator);
    let environment = Environment::new(
        format!("env-{}", args.seed),
        "dungeon",
        args.theme,
        orchestrator,
        room_positions,
        std::sync::Arc::new(event_bus),
    );

    let snapshot = environment.to_data();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}

fn initialize_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}
