//! A* router, on-demand only.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::time::Instant;

use parking_lot::Mutex;

use orbital_mechanics::constants::SPEED_OF_LIGHT_M_S;

use crate::links::NodeId;
use crate::routing::{RouteResult, Router};
use crate::topology::Topology;
use crate::{CoreError, CoreResult};

struct OpenEntry {
    f_score_ms: f64,
    g_score_ms: f64,
    node: NodeId,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_score_ms
            .partial_cmp(&self.f_score_ms)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Straight-line light travel time in milliseconds. Admissible: real links
/// run below c, so no path can beat the chord.
fn heuristic_ms(a: NodeId, b: NodeId, topo: &Topology) -> f64 {
    topo.node(a).position().distance_to(topo.node(b).position()) / SPEED_OF_LIGHT_M_S * 1_000.0
}

/// A* over established links, computed per query.
#[derive(Default)]
pub struct AStarRouter {
    node: Mutex<Option<NodeId>>,
}

impl AStarRouter {
    pub fn new() -> Self {
        Self::default()
    }
}

fn astar_latency_ms(source: NodeId, target: NodeId, topo: &Topology) -> Option<f64> {
    let mut g_score: HashMap<NodeId, f64> = HashMap::from([(source, 0.0)]);
    let mut open = BinaryHeap::new();
    open.push(OpenEntry {
        f_score_ms: heuristic_ms(source, target, topo),
        g_score_ms: 0.0,
        node: source,
    });

    while let Some(entry) = open.pop() {
        if entry.node == target {
            return Some(entry.g_score_ms);
        }
        if entry.g_score_ms > g_score.get(&entry.node).copied().unwrap_or(f64::INFINITY) {
            continue; // superseded by a cheaper path
        }
        for id in topo.established_links(entry.node) {
            let link = topo.pool().get(id);
            let Ok(neighbor) = link.other(entry.node) else {
                continue;
            };
            let tentative = entry.g_score_ms + link.latency_ms(topo);
            if tentative < g_score.get(&neighbor).copied().unwrap_or(f64::INFINITY) {
                g_score.insert(neighbor, tentative);
                open.push(OpenEntry {
                    f_score_ms: tentative + heuristic_ms(neighbor, target, topo),
                    g_score_ms: tentative,
                    node: neighbor,
                });
            }
        }
    }
    None
}

/// Every node reachable from `source` over established links, in BFS order.
fn neighbourhood(source: NodeId, topo: &Topology) -> Vec<NodeId> {
    let mut visited: HashSet<NodeId> = HashSet::from([source]);
    let mut queue = VecDeque::from([source]);
    let mut result = Vec::new();
    while let Some(node) = queue.pop_front() {
        result.push(node);
        for id in topo.established_links(node) {
            if let Ok(other) = topo.pool().get(id).other(node) {
                if visited.insert(other) {
                    queue.push_back(other);
                }
            }
        }
    }
    result
}

impl Router for AStarRouter {
    fn mount(&self, node: NodeId) -> CoreResult<()> {
        let mut slot = self.node.lock();
        if slot.is_some() {
            return Err(CoreError::AlreadyMounted);
        }
        *slot = Some(node);
        Ok(())
    }

    fn can_pre_route_calc(&self) -> bool {
        false
    }

    fn can_on_route_calc(&self) -> bool {
        true
    }

    fn calculate_routing_table(&self, _topo: &Topology) -> CoreResult<()> {
        // Nothing to precompute.
        Ok(())
    }

    fn route_to_node(&self, target: NodeId, topo: &Topology) -> CoreResult<RouteResult> {
        let source = self.node.lock().ok_or(CoreError::NotMounted)?;
        let start = Instant::now();
        let latency = astar_latency_ms(source, target, topo);
        let calc_ms = start.elapsed().as_secs_f64() * 1_000.0;
        Ok(latency
            .map(|ms| RouteResult::on_demand(ms, calc_ms))
            .unwrap_or(RouteResult::Unreachable))
    }

    fn route_to_service(&self, service: &str, topo: &Topology) -> CoreResult<RouteResult> {
        let source = self.node.lock().ok_or(CoreError::NotMounted)?;

        let source_pos = topo.node(source).position();
        let mut best: Option<(f64, NodeId)> = None;
        for candidate in neighbourhood(source, topo) {
            if !topo.node(candidate).computing().hosts_service(service) {
                continue;
            }
            let distance = topo.node(candidate).position().distance_to(source_pos);
            if best.map_or(true, |(current, _)| distance < current) {
                best = Some((distance, candidate));
            }
        }

        match best {
            Some((_, candidate)) => self.route_to_node(candidate, topo),
            None => Ok(RouteResult::Unreachable),
        }
    }
}
