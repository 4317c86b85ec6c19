use std::collections::HashSet;

use orbital_mechanics::constants::MAX_ISL_DISTANCE_M;
use orbital_mechanics::Vector;

use crate::config::InterSatelliteLinkConfig;
use crate::links::{
    GroundNearestProtocol, IslProtocolBuilder, NearestProtocol, ReplayProtocol,
};
use crate::node::Node;
use crate::routing::DijkstraRouter;
use crate::testutil::{
    computing, hexagon_positions, place_all, satellite_at, t0, t1, update_all_links,
    wire_all_pairs,
};
use crate::topology::Topology;
use crate::CoreError;

fn isl_config(neighbours: usize, protocol: &str) -> InterSatelliteLinkConfig {
    InterSatelliteLinkConfig {
        neighbours,
        protocol: protocol.to_owned(),
    }
}

/// Hexagon constellation using the given protocol chain per satellite.
fn hexagon_topology(neighbours: usize, protocol: &str) -> Topology {
    let builder = IslProtocolBuilder::new(isl_config(neighbours, protocol));
    let mut topo = Topology::new();
    for (i, pos) in hexagon_positions(2.0e7, 1.0e6).into_iter().enumerate() {
        topo.push_node(satellite_at(&format!("SAT-{i}"), pos, builder.build()))
            .unwrap();
    }
    wire_all_pairs(&topo);
    place_all(&topo, t0());
    topo
}

fn assert_endpoint_closure(topo: &Topology) {
    for (id, node) in topo.nodes().iter().enumerate() {
        for link in node.protocol().link_protocol().established() {
            assert!(
                topo.pool().get(link).involves(id),
                "node {} reports link {} it is not part of",
                node.name(),
                link
            );
        }
    }
}

fn assert_symmetric_visibility(topo: &Topology) {
    for link in topo.pool().snapshot() {
        if !link.is_established() {
            continue;
        }
        let (a, b) = link.nodes();
        for endpoint in [a, b] {
            assert!(
                topo.established_links(endpoint).contains(&link.id()),
                "established link {} missing from node {}",
                link.id(),
                topo.node(endpoint).name()
            );
        }
    }
}

fn assert_reachability_gate(topo: &Topology) {
    for link in topo.pool().snapshot() {
        if link.is_established() {
            assert!(link.reachable(topo));
            assert!(link.distance(topo) <= MAX_ISL_DISTANCE_M);
        }
    }
}

#[test]
fn coplanar_antipodal_satellites_are_occluded() {
    // Two satellites 180 degrees apart on a 7000 km orbit: the chord passes
    // through the Earth.
    let mut topo = Topology::new();
    topo.push_node(satellite_at(
        "A",
        Vector::new(7.0e6, 0.0, 0.0),
        Box::new(NearestProtocol::new(1)),
    ))
    .unwrap();
    topo.push_node(satellite_at(
        "B",
        Vector::new(-7.0e6, 0.0, 0.0),
        Box::new(NearestProtocol::new(1)),
    ))
    .unwrap();
    let link = topo.add_isl_link(0, 1);
    place_all(&topo, t0());

    let link = topo.pool().get(link);
    assert!((link.distance(&topo) - 1.4e7).abs() < 1.0);
    assert!(!link.reachable(&topo));
}

#[test]
fn ninety_degree_separation_exceeds_link_budget() {
    let mut topo = Topology::new();
    topo.push_node(satellite_at(
        "A",
        Vector::new(7.0e6, 0.0, 0.0),
        Box::new(NearestProtocol::new(1)),
    ))
    .unwrap();
    topo.push_node(satellite_at(
        "B",
        Vector::new(0.0, 7.0e6, 0.0),
        Box::new(NearestProtocol::new(1)),
    ))
    .unwrap();
    topo.add_isl_link(0, 1);
    place_all(&topo, t0());
    update_all_links(&topo);

    let link = topo.pool().get(0);
    assert!((link.distance(&topo) - 9.899e6).abs() < 1e4);
    assert!(!link.reachable(&topo));
    // Nearest(1) therefore establishes nothing.
    for node in topo.nodes() {
        assert!(node.protocol().link_protocol().established().is_empty());
    }
}

#[test]
fn link_attributes_follow_geometry() {
    let mut topo = Topology::new();
    topo.push_node(satellite_at(
        "A",
        Vector::new(2.0e7, 0.0, 0.0),
        Box::new(NearestProtocol::new(1)),
    ))
    .unwrap();
    topo.push_node(satellite_at(
        "B",
        Vector::new(2.0e7 + 1.0e6, 0.0, 0.0),
        Box::new(NearestProtocol::new(1)),
    ))
    .unwrap();
    let id = topo.add_isl_link(0, 1);
    place_all(&topo, t0());

    let link = topo.pool().get(id);
    assert_eq!(link.distance(&topo), 1.0e6);
    let expected_ms = 1.0e6 / (0.99 * 299_792_000.0) * 1_000.0;
    assert!((link.latency_ms(&topo) - expected_ms).abs() < 1e-9);
    assert_eq!(link.bandwidth_bps(), 200e9);

    assert_eq!(link.other(0).unwrap(), 1);
    assert_eq!(link.other(1).unwrap(), 0);
    assert!(matches!(link.other(7), Err(CoreError::NotAnEndpoint(_))));
}

#[test]
fn nearest_two_selects_ring_neighbors() {
    let topo = hexagon_topology(2, "nearest");
    update_all_links(&topo);

    for (id, node) in topo.nodes().iter().enumerate() {
        let established = node.protocol().link_protocol().established();
        assert_eq!(established.len(), 2, "node {}", node.name());
        for link in established {
            let link = topo.pool().get(link);
            let other = link.other(id).unwrap();
            // Adjacent hexagon slots are 1000 km apart; everything else is
            // farther.
            assert!((link.distance(&topo) - 1.0e6).abs() < 1.0);
            assert_ne!(other, id);
        }
    }
    assert_endpoint_closure(&topo);
    assert_symmetric_visibility(&topo);
    assert_reachability_gate(&topo);
}

#[test]
fn nearest_switches_target_when_geometry_changes() {
    let mut topo = Topology::new();
    topo.push_node(crate::testutil::pinned_satellite(
        "A",
        &[
            (t0(), Vector::new(2.0e7, 0.0, 0.0)),
            (t1(), Vector::new(2.0e7, 0.0, 0.0)),
        ],
        Box::new(NearestProtocol::new(1)),
    ))
    .unwrap();
    topo.push_node(crate::testutil::pinned_satellite(
        "X",
        &[
            (t0(), Vector::new(2.0e7 + 1.0e6, 0.0, 0.0)),
            (t1(), Vector::new(2.0e7 + 2.0e6, 0.0, 0.0)),
        ],
        Box::new(NearestProtocol::new(1)),
    ))
    .unwrap();
    topo.push_node(crate::testutil::pinned_satellite(
        "Y",
        &[
            (t0(), Vector::new(2.0e7, 1.5e6, 0.0)),
            (t1(), Vector::new(2.0e7, 1.5e6, 0.0)),
        ],
        Box::new(NearestProtocol::new(1)),
    ))
    .unwrap();
    let ax = topo.add_isl_link(0, 1);
    let ay = topo.add_isl_link(0, 2);
    place_all(&topo, t0());

    let a_protocol = topo.node(0).protocol().link_protocol();
    assert_eq!(a_protocol.update_links(&topo).unwrap(), vec![ax]);
    assert!(topo.pool().get(ax).is_established());
    assert!(topo.established_links(1).contains(&ax));

    place_all(&topo, t1());
    assert_eq!(a_protocol.update_links(&topo).unwrap(), vec![ay]);
    assert!(!topo.pool().get(ax).is_established());
    assert!(topo.pool().get(ay).is_established());
    assert!(topo.established_links(1).is_empty());
    assert!(topo.established_links(2).contains(&ay));
}

#[test]
fn global_mst_spans_the_ring_with_five_links() {
    let topo = hexagon_topology(2, "mst");
    update_all_links(&topo);

    let established: HashSet<_> = topo
        .pool()
        .snapshot()
        .into_iter()
        .filter(|l| l.is_established())
        .map(|l| l.id())
        .collect();
    assert_eq!(established.len(), 5);

    assert_endpoint_closure(&topo);
    assert_symmetric_visibility(&topo);
    assert_reachability_gate(&topo);
}

#[test]
fn global_mst_reuses_cache_until_positions_change() {
    let topo = hexagon_topology(2, "mst");
    update_all_links(&topo);
    let before: HashSet<_> = topo.established_links(0).into_iter().collect();

    // No movement between the calls.
    update_all_links(&topo);
    let after: HashSet<_> = topo.established_links(0).into_iter().collect();
    assert_eq!(before, after);
}

#[test]
fn pst_respects_degree_cap() {
    let topo = hexagon_topology(2, "pst");
    update_all_links(&topo);

    let established: Vec<_> = topo
        .pool()
        .snapshot()
        .into_iter()
        .filter(|l| l.is_established())
        .collect();
    assert!(established.len() <= 5);
    assert!(!established.is_empty());

    for (id, node) in topo.nodes().iter().enumerate() {
        let degree = established.iter().filter(|l| l.involves(id)).count();
        assert!(degree <= 4, "node {} has degree {}", node.name(), degree);
    }
    assert_endpoint_closure(&topo);
    assert_reachability_gate(&topo);
}

#[test]
fn satellite_centric_mst_spans_reachable_satellites() {
    let topo = hexagon_topology(2, "other_mst");
    update_all_links(&topo);

    let established: Vec<_> = topo
        .pool()
        .snapshot()
        .into_iter()
        .filter(|l| l.is_established())
        .collect();
    assert_eq!(established.len(), 5);

    // A spanning tree touches every satellite.
    let mut touched = HashSet::new();
    for link in &established {
        let (a, b) = link.nodes();
        touched.insert(a);
        touched.insert(b);
    }
    assert_eq!(touched.len(), 6);
    assert_reachability_gate(&topo);
}

#[test]
fn smart_loop_closes_tree_leaves() {
    let topo = hexagon_topology(3, "mst_smart_loop");
    update_all_links(&topo);

    // The MST of a hexagon ring is a path; its two leaves have one link each
    // and qualify for a loop addition.
    for (id, node) in topo.nodes().iter().enumerate() {
        let degree = topo.established_count(id);
        assert!(
            degree >= 2,
            "node {} left with degree {}",
            node.name(),
            degree
        );
        assert!(degree <= 3);
    }
    assert_endpoint_closure(&topo);
    assert_reachability_gate(&topo);
}

#[test]
fn add_loop_augments_sparse_nodes() {
    let topo = hexagon_topology(4, "mst_loop");
    update_all_links(&topo);

    let established: Vec<_> = topo
        .pool()
        .snapshot()
        .into_iter()
        .filter(|l| l.is_established())
        .collect();
    // The spanning path has 5 links; loop additions may add at most one per
    // satellite update.
    assert!(established.len() >= 5);
    assert_endpoint_closure(&topo);
    assert_reachability_gate(&topo);
}

#[test]
fn unknown_protocol_falls_back_to_nearest() {
    let builder = IslProtocolBuilder::new(isl_config(2, "definitely_not_a_protocol"));
    let mut topo = Topology::new();
    for (i, pos) in hexagon_positions(2.0e7, 1.0e6).into_iter().enumerate() {
        topo.push_node(satellite_at(&format!("SAT-{i}"), pos, builder.build()))
            .unwrap();
    }
    wire_all_pairs(&topo);
    place_all(&topo, t0());
    update_all_links(&topo);

    for node in topo.nodes() {
        assert_eq!(node.protocol().link_protocol().established().len(), 2);
    }
}

#[test]
fn filter_rejects_double_mount() {
    let builder = IslProtocolBuilder::new(isl_config(2, "mst"));
    let protocol = builder.build();
    protocol.mount(0).unwrap();
    assert!(matches!(protocol.mount(1), Err(CoreError::AlreadyMounted)));
}

#[test]
fn ground_station_switches_to_nearer_satellite() {
    let mut topo = Topology::new();
    let a = topo
        .push_node(crate::testutil::pinned_satellite(
            "SAT-A",
            &[
                (t0(), Vector::new(7.0e6, 0.0, 0.0)),
                (t1(), Vector::new(0.0, 7.0e6, 0.0)),
            ],
            Box::new(NearestProtocol::new(2)),
        ))
        .unwrap();
    let b = topo
        .push_node(crate::testutil::pinned_satellite(
            "SAT-B",
            &[
                (t0(), Vector::new(6.9e6, 1.0e6, 0.0)),
                (t1(), Vector::new(6.9e6, 1.0e6, 0.0)),
            ],
            Box::new(NearestProtocol::new(2)),
        ))
        .unwrap();
    let gs = topo
        .push_node(Node::ground_station(
            "GS",
            0.0,
            0.0,
            t0(),
            GroundNearestProtocol::new(vec![a, b]),
            Box::new(DijkstraRouter::new()),
            computing(),
        ))
        .unwrap();
    place_all(&topo, t0());

    let gs_protocol = topo.node(gs).protocol().link_protocol();
    let first = gs_protocol.update_links(&topo).unwrap();
    assert_eq!(first.len(), 1);
    let first_link = topo.pool().get(first[0]);
    assert_eq!(first_link.other(gs).unwrap(), a);
    assert!(first_link.is_established());
    assert!(topo.established_links(a).contains(&first[0]));

    // Satellite A drifts away; B becomes the nearest.
    place_all(&topo, t1());
    let second = gs_protocol.update_links(&topo).unwrap();
    assert_eq!(second.len(), 1);
    let second_link = topo.pool().get(second[0]);
    assert_eq!(second_link.other(gs).unwrap(), b);
    assert!(second_link.is_established());
    assert!(!first_link.is_established());
    assert!(topo.established_links(a).is_empty());
    assert!(topo.established_links(b).contains(&second[0]));

    // Unchanged geometry keeps the same link object.
    let third = gs_protocol.update_links(&topo).unwrap();
    assert_eq!(third, second);
}

#[test]
fn ground_protocol_requires_candidates() {
    let mut topo = Topology::new();
    let gs = topo
        .push_node(Node::ground_station(
            "GS",
            10.0,
            20.0,
            t0(),
            GroundNearestProtocol::new(Vec::new()),
            Box::new(DijkstraRouter::new()),
            computing(),
        ))
        .unwrap();
    place_all(&topo, t0());

    let result = topo.node(gs).protocol().link_protocol().update_links(&topo);
    assert!(matches!(result, Err(CoreError::NoCandidateSatellite)));
}

#[test]
fn ground_protocol_clears_link_of_removed_satellite() {
    let mut topo = Topology::new();
    let a = topo
        .push_node(satellite_at(
            "SAT-A",
            Vector::new(7.0e6, 0.0, 0.0),
            Box::new(NearestProtocol::new(2)),
        ))
        .unwrap();
    let gs = topo
        .push_node(Node::ground_station(
            "GS",
            0.0,
            0.0,
            t0(),
            GroundNearestProtocol::new(vec![a]),
            Box::new(DijkstraRouter::new()),
            computing(),
        ))
        .unwrap();
    place_all(&topo, t0());

    let ground = topo.node(gs).protocol().ground().unwrap();
    let links = topo.node(gs).protocol().link_protocol().update_links(&topo).unwrap();
    assert_eq!(links.len(), 1);

    ground.remove_satellite(a, &topo).unwrap();
    assert!(ground.link().is_none());
    assert!(!topo.pool().get(links[0]).is_established());
    assert!(topo.established_links(a).is_empty());
}

#[test]
fn replay_protocol_walks_its_schedule() {
    let mut topo = Topology::new();
    let a_protocol = ReplayProtocol::new();
    a_protocol.inject_schedule(vec![vec![], vec![0]]);
    topo.push_node(crate::testutil::pinned_satellite(
        "A",
        &[
            (t0(), Vector::new(2.0e7, 0.0, 0.0)),
            (t1(), Vector::new(2.0e7 + 1.0, 0.0, 0.0)),
        ],
        Box::new(a_protocol),
    ))
    .unwrap();
    let b_protocol = ReplayProtocol::new();
    b_protocol.inject_schedule(vec![vec![], vec![0]]);
    topo.push_node(crate::testutil::pinned_satellite(
        "B",
        &[
            (t0(), Vector::new(2.0e7, 1.0e6, 0.0)),
            (t1(), Vector::new(2.0e7 + 1.0, 1.0e6, 0.0)),
        ],
        Box::new(b_protocol),
    ))
    .unwrap();
    let ab = topo.add_isl_link(0, 1);

    place_all(&topo, t0());
    update_all_links(&topo);
    assert!(topo.established_links(0).is_empty());
    assert!(!topo.pool().get(ab).is_established());

    place_all(&topo, t1());
    update_all_links(&topo);
    assert_eq!(topo.established_links(0), vec![ab]);
    assert!(topo.pool().get(ab).is_established());
}
