//! Layout suggestion engine.
//!
//! Pure functions that propose new positions for a subset of nodes. Nothing
//! here mutates a map: results are fed into the store's ghost-preview buffer
//! and only take effect when the user accepts the preview.

use crate::store::GhostPositions;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Available arrangement modes for laying out nodes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ArrangeMode {
    /// Physics-based force-directed layout
    ForceDirected,
    /// Place nodes in a grid
    Grid,
    /// Place nodes in a single horizontal line
    Line,
}

/// Proposes positions for `targets` using the given mode.
///
/// # Arguments
///
/// * `mode` - The arrangement algorithm to apply
/// * `data` - The committed graph the proposal is computed against
/// * `targets` - The node ids to arrange; unknown ids are skipped
///
/// # Returns
///
/// Proposed positions keyed by node id; empty when there is nothing to do.
pub fn propose_layout(mode: ArrangeMode, data: &MapData, targets: &[NodeId]) -> GhostPositions {
    match mode {
        ArrangeMode::ForceDirected => force_directed_layout(data, targets),
        ArrangeMode::Grid => grid_layout(data, targets),
        ArrangeMode::Line => line_layout(data, targets),
    }
}

/// Known target ids in a stable order (by id string, for determinism).
fn known_sorted(data: &MapData, targets: &[NodeId]) -> Vec<NodeId> {
    let mut ids: Vec<NodeId> = targets
        .iter()
        .copied()
        .filter(|id| data.nodes.contains_key(id))
        .collect();
    ids.sort_by_key(|id| id.to_string());
    ids.dedup();
    ids
}

/// Arithmetic-mean centroid of the given nodes' current positions.
fn centroid(data: &MapData, ids: &[NodeId]) -> (f32, f32) {
    let mut cx = 0.0;
    let mut cy = 0.0;
    for id in ids {
        if let Some(n) = data.nodes.get(id) {
            cx += n.position.0;
            cy += n.position.1;
        }
    }
    let denom = ids.len().max(1) as f32;
    (cx / denom, cy / denom)
}

/// Orders nodes so that connected ones end up next to each other in linear
/// placements.
///
/// Works per connected component (undirected); within a component a Kahn
/// topological pass runs first and a BFS sweep picks up anything left in
/// cycles. Ties break on id string to keep the order stable across runs.
fn adjacency_aware_order(data: &MapData, ids: &[NodeId]) -> Vec<NodeId> {
    let id_set: HashSet<NodeId> = ids.iter().copied().collect();
    if id_set.is_empty() {
        return Vec::new();
    }

    let mut out: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut in_deg: HashMap<NodeId, usize> = HashMap::new();
    let mut undirected: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for id in &id_set {
        out.insert(*id, Vec::new());
        in_deg.insert(*id, 0);
        undirected.insert(*id, Vec::new());
    }
    for edge in data.edges.values() {
        if id_set.contains(&edge.source) && id_set.contains(&edge.target) {
            out.get_mut(&edge.source).unwrap().push(edge.target);
            *in_deg.get_mut(&edge.target).unwrap() += 1;
            undirected.get_mut(&edge.source).unwrap().push(edge.target);
            undirected.get_mut(&edge.target).unwrap().push(edge.source);
        }
    }

    // Connected components, discovered in stable id order
    let mut ids_sorted: Vec<NodeId> = id_set.iter().copied().collect();
    ids_sorted.sort_by_key(|id| id.to_string());
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut result = Vec::with_capacity(id_set.len());

    for start in ids_sorted {
        if seen.contains(&start) {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = VecDeque::new();
        seen.insert(start);
        queue.push_back(start);
        while let Some(n) = queue.pop_front() {
            component.push(n);
            let mut neighbors = undirected.get(&n).cloned().unwrap_or_default();
            neighbors.sort_by_key(|id| id.to_string());
            for m in neighbors {
                if !seen.contains(&m) {
                    seen.insert(m);
                    queue.push_back(m);
                }
            }
        }

        // Kahn pass over the component
        let comp_set: HashSet<NodeId> = component.iter().copied().collect();
        let mut local_in: HashMap<NodeId, isize> = component
            .iter()
            .map(|n| (*n, *in_deg.get(n).unwrap_or(&0) as isize))
            .collect();
        let mut placed: HashSet<NodeId> = HashSet::new();
        let mut ready: Vec<NodeId> = component
            .iter()
            .copied()
            .filter(|n| local_in[n] == 0)
            .collect();
        ready.sort_by_key(|id| id.to_string());

        while let Some(n) = ready.pop() {
            if !placed.insert(n) {
                continue;
            }
            result.push(n);
            for m in &out[&n] {
                if let Some(entry) = local_in.get_mut(m) {
                    *entry -= 1;
                    if *entry == 0 {
                        ready.push(*m);
                        ready.sort_by_key(|id| id.to_string());
                    }
                }
            }
        }

        // BFS sweep for anything stuck in a cycle
        let mut remaining: Vec<NodeId> = component
            .iter()
            .copied()
            .filter(|n| !placed.contains(n))
            .collect();
        remaining.sort_by_key(|id| id.to_string());
        for seed in remaining {
            if placed.contains(&seed) {
                continue;
            }
            let mut queue = VecDeque::new();
            queue.push_back(seed);
            while let Some(n) = queue.pop_front() {
                if !placed.insert(n) {
                    continue;
                }
                result.push(n);
                let mut neighbors: Vec<NodeId> = undirected[&n]
                    .iter()
                    .copied()
                    .filter(|m| comp_set.contains(m) && !placed.contains(m))
                    .collect();
                neighbors.sort_by_key(|id| id.to_string());
                for m in neighbors {
                    queue.push_back(m);
                }
            }
        }
    }

    result
}

/// Force-directed arrangement: repulsion between all targeted pairs,
/// attraction along edges, damping, then recentering on the pre-layout
/// centroid so unrelated parts of the map do not shift.
fn force_directed_layout(data: &MapData, targets: &[NodeId]) -> GhostPositions {
    let ids = known_sorted(data, targets);
    if ids.is_empty() {
        return GhostPositions::new();
    }

    const ITERATIONS: usize = 500;
    const REPULSION_STRENGTH: f32 = 50000.0;
    const ATTRACTION_STRENGTH: f32 = 0.08;
    const DAMPING: f32 = 0.85;
    const SPACING_BUFFER: f32 = 10.0;

    let min_distance = (crate::constants::NODE_WIDTH * crate::constants::NODE_WIDTH
        + crate::constants::NODE_HEIGHT * crate::constants::NODE_HEIGHT)
        .sqrt()
        + SPACING_BUFFER * 2.0;

    let (start_cx, start_cy) = centroid(data, &ids);

    let mut positions: HashMap<NodeId, (f32, f32)> = ids
        .iter()
        .map(|id| (*id, data.nodes[id].position))
        .collect();
    let mut velocities: HashMap<NodeId, (f32, f32)> =
        ids.iter().map(|id| (*id, (0.0, 0.0))).collect();

    for _ in 0..ITERATIONS {
        let mut forces: HashMap<NodeId, (f32, f32)> =
            ids.iter().map(|id| (*id, (0.0, 0.0))).collect();

        // Pairwise repulsion, stronger inside the minimum distance
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (id1, id2) = (ids[i], ids[j]);
                let (p1, p2) = (positions[&id1], positions[&id2]);
                let dx = p1.0 - p2.0;
                let dy = p1.1 - p2.1;
                let distance = (dx * dx + dy * dy).sqrt().max(1.0);

                let magnitude = if distance < min_distance {
                    REPULSION_STRENGTH / (distance * distance) * 2.0
                } else {
                    REPULSION_STRENGTH / (distance * distance)
                };
                let fx = (dx / distance) * magnitude;
                let fy = (dy / distance) * magnitude;

                let f1 = forces.get_mut(&id1).unwrap();
                f1.0 += fx;
                f1.1 += fy;
                let f2 = forces.get_mut(&id2).unwrap();
                f2.0 -= fx;
                f2.1 -= fy;
            }
        }

        // Spring attraction along edges inside the target set
        for edge in data.edges.values() {
            if !positions.contains_key(&edge.source) || !positions.contains_key(&edge.target) {
                continue;
            }
            let (ps, pt) = (positions[&edge.source], positions[&edge.target]);
            let dx = pt.0 - ps.0;
            let dy = pt.1 - ps.1;
            let distance = (dx * dx + dy * dy).sqrt().max(1.0);

            let ideal_distance = min_distance * 1.5;
            let displacement = distance - ideal_distance;
            let fx = (dx / distance) * displacement * ATTRACTION_STRENGTH;
            let fy = (dy / distance) * displacement * ATTRACTION_STRENGTH;

            let fs = forces.get_mut(&edge.source).unwrap();
            fs.0 += fx;
            fs.1 += fy;
            let ft = forces.get_mut(&edge.target).unwrap();
            ft.0 -= fx;
            ft.1 -= fy;
        }

        for id in &ids {
            let force = forces[id];
            let velocity = velocities.get_mut(id).unwrap();
            velocity.0 = (velocity.0 + force.0) * DAMPING;
            velocity.1 = (velocity.1 + force.1) * DAMPING;
            let position = positions.get_mut(id).unwrap();
            position.0 += velocity.0;
            position.1 += velocity.1;
        }
    }

    // Recenter on the pre-layout centroid
    let mut end_cx = 0.0;
    let mut end_cy = 0.0;
    for id in &ids {
        end_cx += positions[id].0;
        end_cy += positions[id].1;
    }
    end_cx /= ids.len() as f32;
    end_cy /= ids.len() as f32;
    for position in positions.values_mut() {
        position.0 += start_cx - end_cx;
        position.1 += start_cy - end_cy;
    }

    positions
}

/// Grid arrangement anchored on the pre-layout centroid of the targets.
///
/// Rows are filled in snake order so adjacency-ordered neighbors stay close
/// between rows. Anchoring and post-correction both use the centroid, which
/// makes repeated application idempotent.
fn grid_layout(data: &MapData, targets: &[NodeId]) -> GhostPositions {
    let base = known_sorted(data, targets);
    let ids = adjacency_aware_order(data, &base);
    if ids.is_empty() {
        return GhostPositions::new();
    }

    let (cx, cy) = centroid(data, &ids);

    let n = ids.len();
    let cols = ((n as f32).sqrt().ceil() as usize).max(1);
    let rows = n.div_ceil(cols).max(1);

    let cell_w = crate::constants::LAYOUT_COLUMN_SPACING;
    let cell_h = crate::constants::LAYOUT_ROW_SPACING;
    let total_w = (cols as f32 - 1.0) * cell_w;
    let total_h = (rows as f32 - 1.0) * cell_h;
    let origin_x = cx - total_w / 2.0;
    let origin_y = cy - total_h / 2.0;

    let mut positions = GhostPositions::new();
    for (idx, id) in ids.iter().enumerate() {
        let r = idx / cols;
        let c = idx % cols;
        let c = if r % 2 == 1 { cols - 1 - c } else { c };
        positions.insert(
            *id,
            (origin_x + c as f32 * cell_w, origin_y + r as f32 * cell_h),
        );
    }

    // Align the placed centroid exactly with the pre-layout one
    let mut post_cx = 0.0;
    let mut post_cy = 0.0;
    for p in positions.values() {
        post_cx += p.0;
        post_cy += p.1;
    }
    post_cx /= n as f32;
    post_cy /= n as f32;
    let dx = cx - post_cx;
    let dy = cy - post_cy;
    if dx.abs() > f32::EPSILON || dy.abs() > f32::EPSILON {
        for p in positions.values_mut() {
            p.0 += dx;
            p.1 += dy;
        }
    }

    positions
}

/// Horizontal-line arrangement centered on the pre-layout centroid.
fn line_layout(data: &MapData, targets: &[NodeId]) -> GhostPositions {
    let base = known_sorted(data, targets);
    let ids = adjacency_aware_order(data, &base);
    if ids.is_empty() {
        return GhostPositions::new();
    }

    let step = crate::constants::LAYOUT_COLUMN_SPACING;
    let (cx, cy) = centroid(data, &ids);
    let total_w = step * ids.len().saturating_sub(1) as f32;
    let start_x = cx - total_w / 2.0;

    ids.iter()
        .enumerate()
        .map(|(i, id)| (*id, (start_x + i as f32 * step, cy)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn map_with_nodes(positions: &[(f32, f32)]) -> (MapData, Vec<NodeId>) {
        let mut data = MapData::new();
        let mut ids = Vec::new();
        for (i, pos) in positions.iter().enumerate() {
            let node = ConceptNode::new(format!("n{i}"), *pos, "concept");
            ids.push(node.id);
            data.nodes.insert(node.id, node);
        }
        (data, ids)
    }

    #[test]
    fn test_empty_targets_propose_nothing() {
        let (data, _) = map_with_nodes(&[(0.0, 0.0)]);
        for mode in [ArrangeMode::ForceDirected, ArrangeMode::Grid, ArrangeMode::Line] {
            assert!(propose_layout(mode, &data, &[]).is_empty());
        }
    }

    #[test]
    fn test_unknown_targets_are_skipped() {
        let (data, ids) = map_with_nodes(&[(0.0, 0.0), (10.0, 0.0)]);
        let mut targets = ids.clone();
        targets.push(Uuid::new_v4());

        let proposed = propose_layout(ArrangeMode::Line, &data, &targets);

        assert_eq!(proposed.len(), 2);
        assert!(ids.iter().all(|id| proposed.contains_key(id)));
    }

    #[test]
    fn test_line_layout_aligns_and_spaces_evenly() {
        let (data, ids) = map_with_nodes(&[(0.0, 0.0), (5.0, 50.0), (10.0, 100.0)]);

        let proposed = propose_layout(ArrangeMode::Line, &data, &ids);

        let mut xs: Vec<f32> = proposed.values().map(|p| p.0).collect();
        xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let step = crate::constants::LAYOUT_COLUMN_SPACING;
        assert!((xs[1] - xs[0] - step).abs() < 0.001);
        assert!((xs[2] - xs[1] - step).abs() < 0.001);

        let ys: Vec<f32> = proposed.values().map(|p| p.1).collect();
        assert!(ys.iter().all(|y| (*y - ys[0]).abs() < 0.001));
    }

    #[test]
    fn test_grid_layout_preserves_centroid() {
        let (data, ids) = map_with_nodes(&[(0.0, 0.0), (300.0, 0.0), (0.0, 300.0), (300.0, 300.0)]);
        let before = centroid(&data, &ids);

        let proposed = propose_layout(ArrangeMode::Grid, &data, &ids);

        let mut cx = 0.0;
        let mut cy = 0.0;
        for p in proposed.values() {
            cx += p.0;
            cy += p.1;
        }
        cx /= proposed.len() as f32;
        cy /= proposed.len() as f32;
        assert!((cx - before.0).abs() < 0.01);
        assert!((cy - before.1).abs() < 0.01);
    }

    #[test]
    fn test_grid_layout_positions_are_distinct() {
        let (data, ids) = map_with_nodes(&[(0.0, 0.0); 7]);

        let proposed = propose_layout(ArrangeMode::Grid, &data, &ids);

        let mut positions: Vec<(i64, i64)> = proposed
            .values()
            .map(|p| (p.0.round() as i64, p.1.round() as i64))
            .collect();
        positions.sort();
        positions.dedup();
        assert_eq!(positions.len(), 7);
    }

    #[test]
    fn test_force_directed_separates_overlapping_nodes() {
        let (mut data, ids) = map_with_nodes(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
        let edge = ConceptEdge::new(ids[0], ids[1], "e");
        data.edges.insert(edge.id, edge);

        let proposed = propose_layout(ArrangeMode::ForceDirected, &data, &ids);

        assert_eq!(proposed.len(), 3);
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let a = proposed[&ids[i]];
                let b = proposed[&ids[j]];
                let dist = ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
                assert!(dist > crate::constants::NODE_WIDTH, "nodes still overlap");
                assert!(dist.is_finite());
            }
        }
    }

    #[test]
    fn test_layout_is_pure_and_leaves_map_untouched() {
        let (data, ids) = map_with_nodes(&[(0.0, 0.0), (1.0, 1.0)]);
        let before = data.clone();

        let _ = propose_layout(ArrangeMode::ForceDirected, &data, &ids);
        let _ = propose_layout(ArrangeMode::Grid, &data, &ids);
        let _ = propose_layout(ArrangeMode::Line, &data, &ids);

        assert_eq!(data, before);
    }

    #[test]
    fn test_adjacency_order_covers_all_targets_once() {
        let (mut data, ids) = map_with_nodes(&[(0.0, 0.0); 5]);
        // chain 0 -> 1 -> 2, cycle 3 <-> 4
        for (s, t) in [(0, 1), (1, 2), (3, 4), (4, 3)] {
            let edge = ConceptEdge::new(ids[s], ids[t], "e");
            data.edges.insert(edge.id, edge);
        }

        let order = adjacency_aware_order(&data, &ids);

        let mut sorted = order.clone();
        sorted.sort();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(sorted, expected);
    }
}
