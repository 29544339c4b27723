//! # Capacity Calculator (C4)
//!
//! Translates a qualitative design intent (`Feeling`) into concrete room
//! dimensions, estimates how many entities a given size can comfortably
//! hold, and proposes advisory room splits. All formulas are taken from the
//! calculator's specification directly; nothing here is approximated.

use crate::coordinate::Dimensions;
use serde::{Deserialize, Serialize};

/// A qualitative design intent for a room's crowding and openness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feeling {
    Tight,
    Normal,
    Vast,
}

/// The four spatial parameters a [`Feeling`] maps to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub feeling: Feeling,
    pub density_target: f64,
    pub movement_freedom: f64,
    pub visual_scope: f64,
    pub tactical_complexity: f64,
}

/// The fixed profile tuple for a feeling: `(density_target,
/// movement_freedom, visual_scope, tactical_complexity)`.
pub fn default_profile(feeling: Feeling) -> Profile {
    let (density_target, movement_freedom, visual_scope, tactical_complexity) = match feeling {
        Feeling::Tight => (0.8, 0.3, 0.4, 0.7),
        Feeling::Normal => (0.5, 0.6, 0.6, 0.6),
        Feeling::Vast => (0.2, 0.8, 0.9, 0.4),
    };
    Profile {
        feeling,
        density_target,
        movement_freedom,
        visual_scope,
        tactical_complexity,
    }
}

/// Derives dimensions that comfortably hold `entity_count` entities under
/// `profile`'s spatial parameters, with a fixed 1.2 width:height aspect
/// ratio and sides clamped to `[5, 100]`.
pub fn optimal_size(profile: &Profile, entity_count: i64) -> Dimensions {
    if entity_count <= 0 {
        return Dimensions::new(5.0, 5.0);
    }
    let count = entity_count as f64;
    let mut area = count / profile.density_target
        * (1.0 + 2.0 * profile.movement_freedom)
        * (1.0 + 0.5 * profile.visual_scope)
        * (1.0 + 0.3 * profile.tactical_complexity);

    area = match profile.feeling {
        Feeling::Tight => (area * 0.8).max(2.0 * count),
        Feeling::Vast => area * 2.0,
        Feeling::Normal => area,
    };

    let width = (area * 1.2).sqrt().ceil();
    let height = (area / width).ceil();
    Dimensions::new(width.clamp(5.0, 100.0), height.clamp(5.0, 100.0))
}

/// Constraints that shape how much of a room's area is actually usable by
/// entities, independent of the feeling profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityConstraints {
    pub min_movement_space: f64,
    pub wall_density_modifier: f64,
    pub required_pathway_multiplier: f64,
    pub min_entity_spacing: f64,
    pub max_entities_per_room: i64,
}

impl Default for CapacityConstraints {
    fn default() -> Self {
        Self {
            min_movement_space: 1.0,
            wall_density_modifier: 0.0,
            required_pathway_multiplier: 1.0,
            min_entity_spacing: 1.0,
            max_entities_per_room: 0,
        }
    }
}

/// Result of [`estimate_capacity`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityEstimate {
    pub recommended_entities: i64,
    pub max_entities: i64,
    pub actual_feeling: Feeling,
    pub movement_freedom: f64,
    pub quality_score: f64,
}

/// Estimates how many entities `size` can hold under `profile`'s target
/// density and `constraints`' physical limits.
pub fn estimate_capacity(
    size: Dimensions,
    profile: &Profile,
    constraints: &CapacityConstraints,
) -> CapacityEstimate {
    let area = size.area();
    let usable = area * constraints.min_movement_space * (1.0 - 0.3 * constraints.wall_density_modifier)
        / constraints.required_pathway_multiplier;

    let by_density = (usable * profile.density_target).floor();
    let by_spacing = (usable / constraints.min_entity_spacing.powi(2)).floor();
    let mut recommended = by_density.min(by_spacing).max(0.0) as i64;
    if constraints.max_entities_per_room > 0 {
        recommended = recommended.min(constraints.max_entities_per_room);
    }

    let mut max_entities = ((recommended as f64) * 1.5).floor() as i64;
    if constraints.max_entities_per_room > 0 {
        max_entities = max_entities.min(constraints.max_entities_per_room);
    }

    let actual_density = if usable > 0.0 {
        recommended as f64 / usable
    } else {
        0.0
    };
    let actual_feeling = if actual_density >= 0.7 {
        Feeling::Tight
    } else if actual_density <= 0.3 {
        Feeling::Vast
    } else {
        Feeling::Normal
    };

    let movement_freedom = if recommended > 0 {
        (usable / recommended as f64 / 4.0).min(1.0)
    } else {
        1.0
    };

    let mismatch_penalty = if actual_feeling != profile.feeling { 0.3 } else { 0.0 };
    let quality_score =
        (1.0 - mismatch_penalty - 0.5 * (profile.movement_freedom - movement_freedom).abs()).max(0.0);

    CapacityEstimate {
        recommended_entities: recommended,
        max_entities,
        actual_feeling,
        movement_freedom,
        quality_score,
    }
}

/// An advisory room-split suggestion; never applied automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitOption {
    pub description: String,
    pub rooms: Vec<Dimensions>,
    pub connections_needed: usize,
}

/// Proposes up to three ways to split `size` into smaller rooms: a
/// horizontal half, a vertical half, and a central hub with up to four
/// side rooms. `count` and `constraints` are accepted for symmetry with the
/// specification's signature but do not currently affect which splits are
/// viable.
pub fn split_options(
    size: Dimensions,
    _count: i64,
    _constraints: &CapacityConstraints,
) -> Vec<SplitOption> {
    let mut options = Vec::new();

    if size.height / 2.0 >= 3.0 {
        let half = Dimensions::new(size.width, (size.height / 2.0).floor().max(3.0));
        options.push(SplitOption {
            description: "horizontal half".to_string(),
            rooms: vec![half, half],
            connections_needed: 1,
        });
    }

    if size.width / 2.0 >= 3.0 {
        let half = Dimensions::new((size.width / 2.0).floor().max(3.0), size.height);
        options.push(SplitOption {
            description: "vertical half".to_string(),
            rooms: vec![half, half],
            connections_needed: 1,
        });
    }

    if size.width >= 15.0 && size.height >= 15.0 {
        let hub = Dimensions::new((size.width / 3.0).max(8.0), (size.height / 3.0).max(8.0));
        let side = Dimensions::new((size.width / 4.0).max(5.0), (size.height / 4.0).max(5.0));
        let rooms = vec![hub, side, side, side, side];
        options.push(SplitOption {
            description: "central hub with side rooms".to_string(),
            connections_needed: rooms.len() - 1,
            rooms,
        });
    }

    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_or_negative_count_yields_minimum_size() {
        let profile = default_profile(Feeling::Normal);
        assert_eq!(optimal_size(&profile, 0), Dimensions::new(5.0, 5.0));
        assert_eq!(optimal_size(&profile, -3), Dimensions::new(5.0, 5.0));
    }

    #[test]
    fn sizes_are_clamped_to_bounds() {
        let profile = default_profile(Feeling::Vast);
        let size = optimal_size(&profile, 1);
        assert!(size.width >= 5.0 && size.width <= 100.0);
        assert!(size.height >= 5.0 && size.height <= 100.0);

        let huge = optimal_size(&profile, 100_000);
        assert!(huge.width <= 100.0 && huge.height <= 100.0);
    }

    #[test]
    fn capacity_monotonicity_across_feelings() {
        for count in [1, 5, 20, 80] {
            let tight = optimal_size(&default_profile(Feeling::Tight), count);
            let normal = optimal_size(&default_profile(Feeling::Normal), count);
            let vast = optimal_size(&default_profile(Feeling::Vast), count);
            assert!(tight.area() <= normal.area() + 1e-9);
            assert!(normal.area() <= vast.area() + 1e-9);
        }
    }

    #[test]
    fn estimate_capacity_respects_max_entities_cap() {
        let profile = default_profile(Feeling::Normal);
        let constraints = CapacityConstraints {
            max_entities_per_room: 3,
            ..CapacityConstraints::default()
        };
        let size = Dimensions::new(50.0, 50.0);
        let estimate = estimate_capacity(size, &profile, &constraints);
        assert!(estimate.recommended_entities <= 3);
        assert!(estimate.max_entities <= 3);
    }

    #[test]
    fn quality_score_is_never_negative() {
        let profile = default_profile(Feeling::Tight);
        let constraints = CapacityConstraints::default();
        let size = Dimensions::new(5.0, 5.0);
        let estimate = estimate_capacity(size, &profile, &constraints);
        assert!(estimate.quality_score >= 0.0);
    }

    #[test]
    fn split_options_require_minimum_axis_size() {
        let constraints = CapacityConstraints::default();
        let tiny = split_options(Dimensions::new(4.0, 4.0), 2, &constraints);
        assert!(tiny.is_empty());

        let medium = split_options(Dimensions::new(10.0, 10.0), 2, &constraints);
        assert!(medium.iter().any(|o| o.description == "horizontal half"));
        assert!(medium.iter().any(|o| o.description == "vertical half"));
        assert!(!medium.iter().any(|o| o.description.contains("hub")));

        let large = split_options(Dimensions::new(20.0, 20.0), 2, &constraints);
        assert!(large.iter().any(|o| o.description.contains("hub")));
    }
}
