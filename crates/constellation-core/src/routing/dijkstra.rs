//! Dijkstra router with optional table precomputation.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::Instant;

use parking_lot::Mutex;

use crate::links::{LinkId, NodeId};
use crate::routing::{RouteResult, Router};
use crate::topology::Topology;
use crate::{CoreError, CoreResult};

/// One row of the routing table: the first link on the mounted node's side
/// of the path, and the cumulative latency.
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub out_link: Option<LinkId>,
    pub latency_ms: f64,
}

#[derive(Default)]
struct DijkstraState {
    node: Option<NodeId>,
    computed: bool,
    routes: HashMap<NodeId, TableEntry>,
    services: HashMap<String, TableEntry>,
}

struct QueueEntry {
    latency_ms: f64,
    target: NodeId,
    via: LinkId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap on latency.
        other
            .latency_ms
            .partial_cmp(&self.latency_ms)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.target.cmp(&self.target))
    }
}

/// Single-source shortest paths on cumulative latency over established
/// links. With precomputation enabled the table is rebuilt once per step;
/// otherwise every query runs a fresh search.
#[derive(Default)]
pub struct DijkstraRouter {
    state: Mutex<DijkstraState>,
}

impl DijkstraRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The precomputed table row for a destination, if any.
    pub fn table_entry(&self, target: NodeId) -> Option<TableEntry> {
        self.state.lock().routes.get(&target).cloned()
    }
}

/// Full table computation from `source`. Services hosted on a destination
/// inherit the destination's route.
fn compute_tables(
    source: NodeId,
    topo: &Topology,
) -> (HashMap<NodeId, TableEntry>, HashMap<String, TableEntry>) {
    let mut routes = HashMap::new();
    let mut services = HashMap::new();
    routes.insert(
        source,
        TableEntry {
            out_link: None,
            latency_ms: 0.0,
        },
    );

    let mut heap = BinaryHeap::new();
    for id in topo.established_links(source) {
        let link = topo.pool().get(id);
        if let Ok(peer) = link.other(source) {
            heap.push(QueueEntry {
                latency_ms: link.latency_ms(topo),
                target: peer,
                via: id,
            });
        }
    }

    let mut visited: HashSet<NodeId> = HashSet::from([source]);
    while let Some(entry) = heap.pop() {
        if !visited.insert(entry.target) {
            continue;
        }
        routes.insert(
            entry.target,
            TableEntry {
                out_link: Some(entry.via),
                latency_ms: entry.latency_ms,
            },
        );
        for service in topo.node(entry.target).computing().services() {
            services.entry(service.name).or_insert(TableEntry {
                out_link: Some(entry.via),
                latency_ms: entry.latency_ms,
            });
        }
        for id in topo.established_links(entry.target) {
            let link = topo.pool().get(id);
            if let Ok(neighbor) = link.other(entry.target) {
                if !visited.contains(&neighbor) {
                    heap.push(QueueEntry {
                        latency_ms: entry.latency_ms + link.latency_ms(topo),
                        target: neighbor,
                        via: entry.via,
                    });
                }
            }
        }
    }

    (routes, services)
}

impl Router for DijkstraRouter {
    fn mount(&self, node: NodeId) -> CoreResult<()> {
        let mut state = self.state.lock();
        if state.node.is_some() {
            return Err(CoreError::AlreadyMounted);
        }
        state.node = Some(node);
        Ok(())
    }

    fn can_pre_route_calc(&self) -> bool {
        true
    }

    fn can_on_route_calc(&self) -> bool {
        true
    }

    fn calculate_routing_table(&self, topo: &Topology) -> CoreResult<()> {
        let source = self.state.lock().node.ok_or(CoreError::NotMounted)?;
        let (routes, services) = compute_tables(source, topo);
        let mut state = self.state.lock();
        state.routes = routes;
        state.services = services;
        state.computed = true;
        Ok(())
    }

    fn route_to_node(&self, target: NodeId, topo: &Topology) -> CoreResult<RouteResult> {
        let source = {
            let state = self.state.lock();
            let source = state.node.ok_or(CoreError::NotMounted)?;
            if target == source {
                return Ok(RouteResult::precomputed(0.0));
            }
            if state.computed {
                return Ok(state
                    .routes
                    .get(&target)
                    .map(|e| RouteResult::precomputed(e.latency_ms))
                    .unwrap_or(RouteResult::Unreachable));
            }
            source
        };

        let start = Instant::now();
        let (routes, _) = compute_tables(source, topo);
        let calc_ms = start.elapsed().as_secs_f64() * 1_000.0;
        Ok(routes
            .get(&target)
            .map(|e| RouteResult::on_demand(e.latency_ms, calc_ms))
            .unwrap_or(RouteResult::Unreachable))
    }

    fn route_to_service(&self, service: &str, topo: &Topology) -> CoreResult<RouteResult> {
        let source = {
            let state = self.state.lock();
            let source = state.node.ok_or(CoreError::NotMounted)?;
            if topo.node(source).computing().hosts_service(service) {
                return Ok(RouteResult::precomputed(0.0));
            }
            if state.computed {
                return Ok(state
                    .services
                    .get(service)
                    .map(|e| RouteResult::precomputed(e.latency_ms))
                    .unwrap_or(RouteResult::Unreachable));
            }
            source
        };

        let start = Instant::now();
        let (_, services) = compute_tables(source, topo);
        let calc_ms = start.elapsed().as_secs_f64() * 1_000.0;
        Ok(services
            .get(service)
            .map(|e| RouteResult::on_demand(e.latency_ms, calc_ms))
            .unwrap_or(RouteResult::Unreachable))
    }
}
