use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use super::{LayoutError, LayoutOptions};
use crate::graph::model::{Edge, Node, NodeId, Position};

// Crossing-reduction sweeps; a handful is enough for hand-built diagrams.
const ORDERING_PASSES: usize = 4;

pub(super) fn solve(
    nodes: &[Node],
    edges: &[Edge],
    opts: &LayoutOptions,
) -> Result<HashMap<NodeId, Position>, LayoutError> {
    // Only standard nodes participate; original array order is the tie-break
    // key everywhere, which keeps the layout deterministic and idempotent.
    let standard: Vec<&Node> = nodes.iter().filter(|n| !n.is_label()).collect();
    if standard.is_empty() {
        return Ok(HashMap::new());
    }
    for node in &standard {
        let s = node.size_or_default();
        if !(s.width.is_finite()
            && s.height.is_finite()
            && node.position.x.is_finite()
            && node.position.y.is_finite())
        {
            return Err(LayoutError::BadGeometry(node.id.clone()));
        }
    }

    let index: HashMap<&str, usize> = standard
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    // Edges with both endpoints among the standard nodes, as index pairs.
    let links: Vec<(usize, usize)> = edges
        .iter()
        .filter_map(|e| Some((*index.get(e.source.as_str())?, *index.get(e.target.as_str())?)))
        .collect();

    let mut degree = vec![0usize; standard.len()];
    for &(from, to) in &links {
        degree[from] += 1;
        degree[to] += 1;
    }

    let connected: Vec<usize> = (0..standard.len()).filter(|&i| degree[i] > 0).collect();
    let isolated: Vec<usize> = (0..standard.len()).filter(|&i| degree[i] == 0).collect();

    let mut buckets = rank_connected(&connected, &links, standard.len())?;
    // A node with no edges at all sits in a rank of its own, in encounter order.
    for idx in isolated {
        buckets.push(vec![idx]);
    }

    order_ranks(&mut buckets, &links, standard.len());

    Ok(assign_coordinates(&standard, &buckets, opts))
}

/// Longest-path layering over the connected subgraph. Cycles are tolerated:
/// when no in-degree-zero node remains, the unprocessed node earliest in
/// array order is re-seeded as a source and its incoming edges become
/// back-edges, which are skipped during rank relaxation.
fn rank_connected(
    connected: &[usize],
    links: &[(usize, usize)],
    n: usize,
) -> Result<Vec<Vec<usize>>, LayoutError> {
    if connected.is_empty() {
        return Ok(Vec::new());
    }

    let mut outgoing: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut indeg: HashMap<usize, usize> = connected.iter().map(|&i| (i, 0)).collect();
    for &(from, to) in links {
        outgoing.entry(from).or_default().push(to);
        if let Some(d) = indeg.get_mut(&to) {
            *d += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = connected
        .iter()
        .filter(|&&i| indeg[&i] == 0)
        .map(|&i| Reverse(i))
        .collect();

    let mut order: Vec<usize> = Vec::with_capacity(connected.len());
    let mut processed = vec![false; n];
    let step_limit = connected.len() * (links.len() + 2);
    let mut steps = 0usize;
    loop {
        while let Some(Reverse(idx)) = ready.pop() {
            steps += 1;
            if steps > step_limit {
                return Err(LayoutError::Unsettled(steps));
            }
            if processed[idx] {
                continue;
            }
            processed[idx] = true;
            order.push(idx);
            if let Some(nexts) = outgoing.get(&idx) {
                for &next in nexts {
                    if processed[next] {
                        continue;
                    }
                    if let Some(d) = indeg.get_mut(&next) {
                        *d = d.saturating_sub(1);
                        if *d == 0 {
                            ready.push(Reverse(next));
                        }
                    }
                }
            }
        }

        if order.len() >= connected.len() {
            break;
        }
        // Cycle: elect the earliest remaining node as the next source.
        match connected.iter().find(|&&i| !processed[i]) {
            Some(&idx) => ready.push(Reverse(idx)),
            None => break,
        }
    }

    let position_in_order: HashMap<usize, usize> =
        order.iter().enumerate().map(|(pos, &idx)| (idx, pos)).collect();

    let mut rank: HashMap<usize, usize> = HashMap::new();
    for &idx in &order {
        let here = *rank.entry(idx).or_insert(0);
        if let Some(nexts) = outgoing.get(&idx) {
            let from_pos = position_in_order[&idx];
            for &next in nexts {
                let to_pos = *position_in_order.get(&next).unwrap_or(&from_pos);
                if to_pos <= from_pos {
                    // Back-edge: still drawn, never layout-affecting.
                    continue;
                }
                let entry = rank.entry(next).or_insert(0);
                *entry = (*entry).max(here + 1);
            }
        }
    }

    let max_rank = rank.values().copied().max().unwrap_or(0);
    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); max_rank + 1];
    for &idx in &order {
        buckets[rank[&idx]].push(idx);
    }
    // Array order within each rank before any crossing reduction runs.
    for bucket in &mut buckets {
        bucket.sort_unstable();
    }
    buckets.retain(|b| !b.is_empty());
    Ok(buckets)
}

/// Median-position crossing reduction, swept downward then upward a fixed
/// number of passes.
fn order_ranks(buckets: &mut [Vec<usize>], links: &[(usize, usize)], n: usize) {
    if buckets.len() <= 1 {
        return;
    }
    let mut incoming: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut outgoing: HashMap<usize, Vec<usize>> = HashMap::new();
    for &(from, to) in links {
        outgoing.entry(from).or_default().push(to);
        incoming.entry(to).or_default().push(from);
    }

    let mut positions = vec![0usize; n];
    let refresh = |buckets: &[Vec<usize>], positions: &mut Vec<usize>| {
        for bucket in buckets {
            for (pos, &idx) in bucket.iter().enumerate() {
                positions[idx] = pos;
            }
        }
    };
    refresh(buckets, &mut positions);

    for _ in 0..ORDERING_PASSES {
        for r in 1..buckets.len() {
            sort_bucket(&mut buckets[r], &incoming, &positions);
            refresh(buckets, &mut positions);
        }
        for r in (0..buckets.len().saturating_sub(1)).rev() {
            sort_bucket(&mut buckets[r], &outgoing, &positions);
            refresh(buckets, &mut positions);
        }
    }
}

fn sort_bucket(bucket: &mut [usize], neighbors: &HashMap<usize, Vec<usize>>, positions: &[usize]) {
    if bucket.len() <= 1 {
        return;
    }
    let mut keyed: Vec<(f32, usize, usize)> = bucket
        .iter()
        .enumerate()
        .map(|(pos, &idx)| (median_position(idx, pos, neighbors, positions), pos, idx))
        .collect();
    keyed.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
            // Stable last resort: original array order.
            .then(a.2.cmp(&b.2))
    });
    for (slot, (_, _, idx)) in keyed.into_iter().enumerate() {
        bucket[slot] = idx;
    }
}

fn median_position(
    idx: usize,
    current: usize,
    neighbors: &HashMap<usize, Vec<usize>>,
    positions: &[usize],
) -> f32 {
    let Some(list) = neighbors.get(&idx) else {
        return current as f32;
    };
    if list.is_empty() {
        return current as f32;
    }
    let mut values: Vec<f32> = list.iter().map(|&nb| positions[nb] as f32).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) * 0.5
    }
}

/// Convert rank/order to top-left coordinates. The grid point is where the
/// node's *center* should land; half the box is subtracted at the end.
fn assign_coordinates(
    standard: &[&Node],
    buckets: &[Vec<usize>],
    opts: &LayoutOptions,
) -> HashMap<NodeId, Position> {
    let horizontal = opts.direction.is_horizontal();
    let flow_extent = |idx: usize| {
        let s = standard[idx].size_or_default();
        if horizontal { s.width } else { s.height }
    };
    let cross_extent = |idx: usize| {
        let s = standard[idx].size_or_default();
        if horizontal { s.height } else { s.width }
    };

    // Flow-axis center of each rank, packed with rank_spacing gaps.
    let mut flow_centers: Vec<f32> = Vec::with_capacity(buckets.len());
    let mut cursor = 0.0f32;
    for bucket in buckets {
        let extent = bucket
            .iter()
            .map(|&idx| flow_extent(idx))
            .fold(0.0f32, f32::max);
        flow_centers.push(cursor + extent * 0.5);
        cursor += extent + opts.rank_spacing;
    }
    if opts.direction.is_reversed() && buckets.len() > 1 {
        let span = flow_centers[0] + flow_centers[flow_centers.len() - 1];
        for c in &mut flow_centers {
            *c = span - *c;
        }
    }

    let mut out = HashMap::with_capacity(standard.len());
    for (r, bucket) in buckets.iter().enumerate() {
        let total: f32 = bucket.iter().map(|&idx| cross_extent(idx)).sum::<f32>()
            + opts.node_spacing * (bucket.len().saturating_sub(1)) as f32;
        // Center each rank on the cross axis.
        let mut cross_cursor = -total * 0.5;
        for &idx in bucket {
            let ce = cross_extent(idx);
            let cross_center = cross_cursor + ce * 0.5;
            cross_cursor += ce + opts.node_spacing;

            let (cx, cy) = if horizontal {
                (flow_centers[r], cross_center)
            } else {
                (cross_center, flow_centers[r])
            };
            let s = standard[idx].size_or_default();
            out.insert(
                standard[idx].id.clone(),
                Position { x: cx - s.width * 0.5, y: cy - s.height * 0.5 },
            );
        }
    }
    out
}
