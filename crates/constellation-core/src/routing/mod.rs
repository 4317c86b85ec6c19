//! Shortest-path routers over the established link graph.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::links::NodeId;
use crate::topology::Topology;
use crate::CoreResult;

pub mod astar;
pub mod dijkstra;

pub use astar::AStarRouter;
pub use dijkstra::DijkstraRouter;

/// A per-node router. Queries issued between two steps observe the topology
/// produced by the last completed step.
pub trait Router: Send + Sync {
    fn mount(&self, node: NodeId) -> CoreResult<()>;

    /// Whether the router supports table precomputation during the step.
    fn can_pre_route_calc(&self) -> bool;

    /// Whether the router can answer queries on demand.
    fn can_on_route_calc(&self) -> bool;

    /// Rebuilds the routing table, if the router has one.
    fn calculate_routing_table(&self, topo: &Topology) -> CoreResult<()>;

    fn route_to_node(&self, target: NodeId, topo: &Topology) -> CoreResult<RouteResult>;

    /// Routes to the best node hosting the named service.
    fn route_to_service(&self, service: &str, topo: &Topology) -> CoreResult<RouteResult>;
}

#[derive(Debug)]
struct CalcWindow {
    calc_ms: f64,
    first_request: bool,
}

/// Result of an on-demand route computation. The calculation duration is
/// deducted from the first latency wait, so a caller does not pay for the
/// path search twice.
#[derive(Debug)]
pub struct OnDemandRoute {
    latency_ms: f64,
    calc: Mutex<CalcWindow>,
}

/// Outcome of a routing query.
#[derive(Debug, Clone)]
pub enum RouteResult {
    Unreachable,
    Precomputed { latency_ms: f64 },
    OnDemand(Arc<OnDemandRoute>),
}

impl RouteResult {
    pub fn precomputed(latency_ms: f64) -> Self {
        RouteResult::Precomputed { latency_ms }
    }

    pub fn on_demand(latency_ms: f64, calc_ms: f64) -> Self {
        RouteResult::OnDemand(Arc::new(OnDemandRoute {
            latency_ms,
            calc: Mutex::new(CalcWindow {
                calc_ms,
                first_request: true,
            }),
        }))
    }

    pub fn reachable(&self) -> bool {
        !matches!(self, RouteResult::Unreachable)
    }

    /// End-to-end latency in milliseconds; -1 for unreachable routes.
    pub fn latency_ms(&self) -> f64 {
        match self {
            RouteResult::Unreachable => -1.0,
            RouteResult::Precomputed { latency_ms } => *latency_ms,
            RouteResult::OnDemand(route) => route.latency_ms,
        }
    }

    /// Folds an additional calculation duration into the result. A
    /// precomputed route becomes an on-demand one; a spent on-demand route is
    /// re-armed with the new duration.
    pub fn add_calc_duration(self, calc_ms: f64) -> RouteResult {
        match self {
            RouteResult::Unreachable => RouteResult::Unreachable,
            RouteResult::Precomputed { latency_ms } => RouteResult::on_demand(latency_ms, calc_ms),
            RouteResult::OnDemand(route) => {
                {
                    let mut calc = route.calc.lock();
                    if calc.first_request {
                        calc.calc_ms += calc_ms;
                    } else {
                        calc.calc_ms = calc_ms;
                        calc.first_request = true;
                    }
                }
                RouteResult::OnDemand(route)
            }
        }
    }

    /// Sleeps for the route latency. The first wait of an on-demand route is
    /// shortened by the time already spent computing it.
    pub async fn wait_latency(&self) {
        let wait_ms = match self {
            RouteResult::Unreachable => return,
            RouteResult::Precomputed { latency_ms } => *latency_ms,
            RouteResult::OnDemand(route) => {
                let mut calc = route.calc.lock();
                let mut wait = route.latency_ms;
                if calc.first_request {
                    wait -= calc.calc_ms;
                    calc.first_request = false;
                }
                wait
            }
        };
        if wait_ms > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(wait_ms / 1_000.0)).await;
        }
    }
}
