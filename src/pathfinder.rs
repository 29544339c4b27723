//! # Hex-Cube Pathfinder (C6)
//!
//! A* search over hex-cube coordinates with strict deterministic
//! tie-breaking: among open-set entries with equal `f_score`, the lower
//! `h_score` wins; among those, the entry pushed earlier wins. Since
//! neighbors are always pushed in [`crate::coordinate::NEIGHBOR_OFFSETS`]
//! order, this makes the winning path independent of hashmap iteration
//! order and reproducible across runs.
//!
//! Grounded on the teacher's hand-rolled `AStarNode`/`BinaryHeap` search in
//! `generation/dungeon.rs::has_path` rather than the `pathfinding` crate's
//! generic `astar`, because that crate does not expose this tie-break
//! policy.

use crate::coordinate::CubeCoord;
use crate::error::{ThatchError, ThatchResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Caps node expansion so a pathological "no path exists" search over an
/// effectively unbounded `is_blocked` predicate terminates instead of
/// hanging. Comfortably above any room this engine generates.
const MAX_EXPANSIONS: usize = 50_000;

/// The outcome of a pathfinding attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathResult {
    pub path: Vec<CubeCoord>,
    pub found: bool,
    pub cost: u32,
}

/// Cooperative cancellation, checked once per node expansion.
pub trait CancelSignal: Sync {
    fn is_cancelled(&self) -> bool;
}

/// A [`CancelSignal`] that never cancels; used for internal validation
/// passes that must always run to completion.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCancel;

impl CancelSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct OpenEntry {
    f_score: u32,
    h_score: u32,
    sequence: u64,
    coord: CubeCoord,
}

// `BinaryHeap` is a max-heap; every field comparison here is reversed so the
// heap pops the entry with the lowest `f_score`, then lowest `h_score`, then
// earliest push order.
impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.h_score.cmp(&self.h_score))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Finds a shortest path from `start` to `goal` over the hex-cube lattice,
/// where `is_blocked(coord)` returns true for any coordinate that cannot be
/// entered (out of bounds or occupied by a wall). The returned path runs
/// `start` (exclusive) to `goal` (inclusive); ties in the open set are
/// broken deterministically, see the module documentation.
pub fn find_hex_path(
    start: CubeCoord,
    goal: CubeCoord,
    is_blocked: &dyn Fn(CubeCoord) -> bool,
    cancel: &dyn CancelSignal,
) -> ThatchResult<PathResult> {
    if start == goal {
        return Ok(PathResult {
            path: Vec::new(),
            found: true,
            cost: 0,
        });
    }
    if is_blocked(start) || is_blocked(goal) {
        return Ok(PathResult {
            path: Vec::new(),
            found: false,
            cost: 0,
        });
    }

    let mut open = BinaryHeap::new();
    let mut sequence: u64 = 0;
    let mut g_score: HashMap<CubeCoord, u32> = HashMap::new();
    let mut came_from: HashMap<CubeCoord, CubeCoord> = HashMap::new();
    let mut closed: HashSet<CubeCoord> = HashSet::new();

    g_score.insert(start, 0);
    open.push(OpenEntry {
        f_score: start.distance(goal),
        h_score: start.distance(goal),
        sequence,
        coord: start,
    });
    sequence += 1;

    let mut expansions = 0usize;
    while let Some(entry) = open.pop() {
        if cancel.is_cancelled() {
            return Err(ThatchError::Cancelled);
        }
        let current = entry.coord;
        if !closed.insert(current) {
            continue;
        }

        if current == goal {
            let mut path = vec![current];
            let mut node = current;
            while let Some(&prev) = came_from.get(&node) {
                if prev != start {
                    path.push(prev);
                }
                node = prev;
            }
            path.reverse();
            return Ok(PathResult {
                path,
                found: true,
                cost: g_score[&goal],
            });
        }

        expansions += 1;
        if expansions > MAX_EXPANSIONS {
            break;
        }

        let current_g = g_score[&current];
        for neighbor in current.neighbors() {
            if closed.contains(&neighbor) || is_blocked(neighbor) {
                continue;
            }
            let tentative_g = current_g + 1;
            let improves = g_score
                .get(&neighbor)
                .map_or(true, |&existing| tentative_g < existing);
            if improves {
                g_score.insert(neighbor, tentative_g);
                came_from.insert(neighbor, current);
                let h = neighbor.distance(goal);
                open.push(OpenEntry {
                    f_score: tentative_g + h,
                    h_score: h,
                    sequence,
                    coord: neighbor,
                });
                sequence += 1;
            }
        }
    }

    Ok(PathResult {
        path: Vec::new(),
        found: false,
        cost: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never_blocked(_: CubeCoord) -> bool {
        false
    }

    #[test]
    fn path_to_self_is_trivial() {
        let origin = CubeCoord::origin();
        let result = find_hex_path(origin, origin, &never_blocked, &NeverCancel).unwrap();
        assert!(result.found);
        assert!(result.path.is_empty());
        assert_eq!(result.cost, 0);
    }

    #[test]
    fn open_field_path_has_cost_equal_to_hex_distance() {
        let start = CubeCoord::origin();
        let goal = CubeCoord::new(3, -1, -2).unwrap();
        let result = find_hex_path(start, goal, &never_blocked, &NeverCancel).unwrap();
        assert!(result.found);
        assert_eq!(result.cost, start.distance(goal));
        assert_eq!(result.cost as usize, result.path.len());
        assert!(!result.path.contains(&start));
        assert_eq!(result.path.last(), Some(&goal));
    }

    #[test]
    fn blocked_goal_is_unreachable() {
        let start = CubeCoord::origin();
        let goal = CubeCoord::new(1, 0, -1).unwrap();
        let result = find_hex_path(start, goal, &|c| c == goal, &NeverCancel).unwrap();
        assert!(!result.found);
        assert!(result.path.is_empty());
    }

    #[test]
    fn path_routes_around_a_wall() {
        let start = CubeCoord::origin();
        let goal = CubeCoord::new(0, -2, 2).unwrap();
        let wall: HashSet<CubeCoord> = [CubeCoord::new(0, -1, 1).unwrap()].into_iter().collect();
        let result = find_hex_path(start, goal, &|c| wall.contains(&c), &NeverCancel).unwrap();
        assert!(result.found);
        assert!(!result.path.contains(&CubeCoord::new(0, -1, 1).unwrap()));
    }

    #[test]
    fn fully_enclosed_goal_is_unreachable_and_terminates() {
        let start = CubeCoord::origin();
        let goal = CubeCoord::new(5, -5, 0).unwrap();
        let result = find_hex_path(start, goal, &|c| c.distance(goal) <= 3 && c != goal, &NeverCancel)
            .unwrap();
        assert!(!result.found);
    }

    struct AlwaysCancel;
    impl CancelSignal for AlwaysCancel {
        fn is_cancelled(&self) -> bool {
            true
        }
    }

    #[test]
    fn cancellation_is_observed_before_the_first_expansion() {
        let start = CubeCoord::origin();
        let goal = CubeCoord::new(2, -1, -1).unwrap();
        let result = find_hex_path(start, goal, &never_blocked, &AlwaysCancel);
        assert!(matches!(result, Err(ThatchError::Cancelled)));
    }
}
