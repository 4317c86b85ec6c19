//! Shared helpers for crate tests.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};

use orbital_mechanics::Vector;

use crate::computing::{Computing, ComputingType};
use crate::links::LinkProtocol;
use crate::node::Node;
use crate::routing::DijkstraRouter;
use crate::topology::Topology;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn t1() -> DateTime<Utc> {
    t0() + chrono::Duration::seconds(60)
}

pub fn computing() -> Computing {
    Computing::new(4.0, 1024.0, ComputingType::Edge)
}

/// A satellite pinned to explicit positions per timestamp.
pub fn pinned_satellite(
    name: &str,
    positions: &[(DateTime<Utc>, Vector)],
    protocol: Box<dyn LinkProtocol>,
) -> Node {
    let positions: HashMap<_, _> = positions.iter().copied().collect();
    Node::replay(name, positions, protocol, Box::new(DijkstraRouter::new()), computing())
}

/// A satellite sitting at one fixed position for `t0`.
pub fn satellite_at(name: &str, position: Vector, protocol: Box<dyn LinkProtocol>) -> Node {
    pinned_satellite(name, &[(t0(), position)], protocol)
}

pub fn place_all(topo: &Topology, time: DateTime<Utc>) {
    for node in topo.nodes() {
        node.update_position(time);
    }
}

pub fn update_all_links(topo: &Topology) {
    for node in topo.nodes() {
        node.protocol().link_protocol().update_links(topo).unwrap();
    }
}

/// Fully connects the satellites currently in the topology, one pool link
/// per pair.
pub fn wire_all_pairs(topo: &Topology) {
    let count = topo.nodes().len();
    for a in 0..count {
        for b in (a + 1)..count {
            if topo.node(a).is_satellite() && topo.node(b).is_satellite() {
                topo.add_isl_link(a, b);
            }
        }
    }
}

/// Hexagon of six satellites, radius `ring_radius` m, centered at
/// `(center_x, 0, 0)`, far enough from Earth that line-of-sight never
/// intersects it.
pub fn hexagon_positions(center_x: f64, ring_radius: f64) -> Vec<Vector> {
    (0..6)
        .map(|i| {
            let angle = i as f64 * std::f64::consts::PI / 3.0;
            Vector::new(
                center_x + ring_radius * angle.cos(),
                ring_radius * angle.sin(),
                0.0,
            )
        })
        .collect()
}
