//! Shortest path route planning over the road network.

use crate::network::RoadNetwork;
use crate::{IntersectionId, RoadId};
use slotmap::SparseSecondaryMap;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

/// An ordered sequence of roads leading an agent from its source to its
/// target intersection. The next road to travel is popped from the front.
pub type Route = VecDeque<RoadId>;

/// Road lengths are quantized to this resolution to obtain integer edge
/// costs, in units per metre.
const COST_SCALE: f64 = 10.0;

/// Finds a shortest route between two intersections.
///
/// Classic Dijkstra with a binary heap frontier. Entries are keyed by
/// (tentative distance, intersection id), so ties settle on the lowest id
/// and repeated runs produce identical routes. The search stops as soon as
/// the target is popped; an unreachable target yields an empty route, which
/// callers treat as "no route" rather than an error.
pub(crate) fn shortest_path(
    net: &RoadNetwork,
    source: IntersectionId,
    target: IntersectionId,
) -> Route {
    let mut dist: SparseSecondaryMap<IntersectionId, u64> = SparseSecondaryMap::new();
    let mut prev: SparseSecondaryMap<IntersectionId, (IntersectionId, RoadId)> =
        SparseSecondaryMap::new();
    let mut frontier = BinaryHeap::new();

    dist.insert(source, 0);
    frontier.push(Reverse((0, source)));

    while let Some(Reverse((cost, node))) = frontier.pop() {
        if cost > dist.get(node).copied().unwrap_or(u64::MAX) {
            // A stale entry; the node was settled at a lower cost.
            continue;
        }
        if node == target {
            break;
        }
        for road_id in net.intersection(node).roads_out() {
            let road = net.road(*road_id);
            let next_cost = cost + (COST_SCALE * road.length()) as u64;
            if next_cost < dist.get(road.target()).copied().unwrap_or(u64::MAX) {
                dist.insert(road.target(), next_cost);
                prev.insert(road.target(), (node, *road_id));
                frontier.push(Reverse((next_cost, road.target())));
            }
        }
    }

    let mut route = Route::new();
    let mut node = target;
    while node != source {
        let Some((parent, road)) = prev.get(node).copied() else {
            return Route::new();
        };
        route.push_front(road);
        node = parent;
    }
    route
}
