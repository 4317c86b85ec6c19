//! End-to-end scenarios across the full step pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use constellation_core::computing::{Computing, ComputingType};
use constellation_core::links::NearestProtocol;
use constellation_core::routing::DijkstraRouter;
use constellation_core::Node;
use orbital_mechanics::{KeplerianElements, Vector};
use sim_runtime::config::Config;
use sim_runtime::{replay, state, NodeFactory, Simulation, SimulationController, StateRecorder};

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn config_json(protocol: &str, neighbours: usize, pre_route: bool) -> String {
    format!(
        r#"{{
        "SimulationConfiguration": {{
            "StepInterval": -1,
            "StepMultiplier": 10,
            "SatelliteDataSource": "unused",
            "SatelliteDataSourceType": "tle",
            "UsePreRouteCalc": {pre_route},
            "SimulationStartTime": "2024-01-01T00:00:00Z"
        }},
        "InterSatelliteLinkConfig": {{ "Neighbours": {neighbours}, "Protocol": "{protocol}" }},
        "RouterConfig": {{ "Protocol": "dijkstra" }},
        "ComputingConfiguration": [
            {{ "Cores": 4, "Memory": 4096, "Type": "Edge" }}
        ]
    }}"#
    )
}

fn test_config(protocol: &str, neighbours: usize, pre_route: bool) -> Config {
    serde_json::from_str(&config_json(protocol, neighbours, pre_route)).unwrap()
}

/// Three satellites on one circular orbit, two degrees of mean anomaly
/// apart, so adjacent spacing stays well inside the ISL budget.
fn close_formation(factory: &NodeFactory) -> Vec<Node> {
    (0..3)
        .map(|i| {
            let elements = KeplerianElements::new(
                53.0,
                0.0,
                0.0,
                0.0,
                i as f64 * 2.0,
                15.2,
                start_time(),
            );
            factory
                .satellite(&format!("SAT-{i}"), elements)
                .unwrap()
        })
        .collect()
}

#[test]
fn kepler_constellation_steps_and_routes() {
    let config = test_config("nearest", 2, true);
    let factory = NodeFactory::new(&config);
    let sim = Simulation::new(config.simulation.clone(), Vec::new(), None);

    sim.inject_satellites(close_formation(&factory)).unwrap();
    sim.step_by_seconds(10.0);

    assert_eq!(
        sim.sim_time(),
        start_time() + chrono::Duration::seconds(10)
    );

    let topo = sim.topology();
    for (id, node) in topo.nodes().iter().enumerate() {
        let established = topo.established_links(id);
        assert!(!established.is_empty(), "node {} isolated", node.name());
        // Endpoint closure.
        for link in established {
            assert!(topo.pool().get(link).involves(id));
        }
        let position = node.position();
        assert!(position.magnitude() > 6.0e6 && position.magnitude() < 7.5e6);
    }
    // Symmetric visibility of every established link.
    for link in topo.pool().snapshot() {
        if link.is_established() {
            let (a, b) = link.nodes();
            assert!(topo.established_links(a).contains(&link.id()));
            assert!(topo.established_links(b).contains(&link.id()));
        }
    }
    drop(topo);

    // Precomputed tables answer queries between steps.
    let route = sim.route_between("SAT-0", "SAT-2").unwrap();
    assert!(route.reachable());
    assert!(route.latency_ms() > 0.0);
}

#[test]
fn ground_station_uplinks_into_the_mesh() {
    let config = test_config("nearest", 2, true);
    let factory = NodeFactory::new(&config);
    let sim = Simulation::new(config.simulation.clone(), Vec::new(), None);

    let satellite_ids = sim.inject_satellites(close_formation(&factory)).unwrap();
    let raw = sim_runtime::loader::RawGroundStation {
        name: "GS-GRAZ".into(),
        lat: 47.07,
        lon: 15.44,
        protocol: String::new(),
        router: String::new(),
        computing_type: "Edge".into(),
    };
    let ground = factory.ground_station(&raw, satellite_ids).unwrap();
    sim.inject_ground_stations(vec![ground]).unwrap();

    sim.step_by_seconds(10.0);

    let topo = sim.topology();
    let gs = topo.node_id("GS-GRAZ").unwrap();
    let uplinks = topo.established_links(gs);
    assert_eq!(uplinks.len(), 1);
    let link = topo.pool().get(uplinks[0]);
    assert!(link.is_established());
    let satellite = link.other(gs).unwrap();
    assert!(topo.established_links(satellite).contains(&uplinks[0]));
    drop(topo);

    let route = sim.route_between("GS-GRAZ", "SAT-1").unwrap();
    assert!(route.reachable());
}

/// Two pinned satellites that drift apart between the first and second step.
fn drifting_pair() -> Vec<Node> {
    let t0 = start_time() + chrono::Duration::seconds(10);
    let t1 = start_time() + chrono::Duration::seconds(20);
    let base = 2.0e7;

    let positions_a: HashMap<_, _> = [
        (t0, Vector::new(base, 0.0, 0.0)),
        (t1, Vector::new(base, 0.0, 0.0)),
    ]
    .into();
    let positions_b: HashMap<_, _> = [
        (t0, Vector::new(base + 1.0e6, 0.0, 0.0)),
        (t1, Vector::new(base + 1.0e7, 0.0, 0.0)),
    ]
    .into();

    vec![
        Node::replay(
            "A",
            positions_a,
            Box::new(NearestProtocol::new(1)),
            Box::new(DijkstraRouter::new()),
            Computing::new(1.0, 64.0, ComputingType::Edge),
        ),
        Node::replay(
            "B",
            positions_b,
            Box::new(NearestProtocol::new(1)),
            Box::new(DijkstraRouter::new()),
            Computing::new(1.0, 64.0, ComputingType::Edge),
        ),
    ]
}

#[test]
fn queries_between_steps_observe_the_last_step() {
    let config = test_config("nearest", 1, false);
    let sim = Simulation::new(config.simulation.clone(), Vec::new(), None);
    sim.inject_satellites(drifting_pair()).unwrap();

    sim.step_by_seconds(10.0);
    let route = sim.route_between("A", "B").unwrap();
    assert!(route.reachable(), "close pair should route");

    // The pair separates beyond the ISL budget; the same query now reflects
    // the new topology, with no stale cache.
    sim.step_by_seconds(10.0);
    let route = sim.route_between("A", "B").unwrap();
    assert!(!route.reachable(), "separated pair must not route");
}

#[test]
fn captured_state_replays_identically() {
    let state_path =
        std::env::temp_dir().join(format!("constellation-state-{}", std::process::id()));

    // Record two steps of a live run.
    let config = test_config("nearest", 2, false);
    let factory = NodeFactory::new(&config);
    let recorder = StateRecorder::new(state_path.clone(), Vec::new());
    let sim = Simulation::new(config.simulation.clone(), Vec::new(), Some(recorder));
    sim.inject_satellites(close_formation(&factory)).unwrap();
    sim.step_by_seconds(10.0);
    sim.step_by_seconds(10.0);
    sim.save_state().unwrap();

    let recorded: Vec<(String, Vector, usize)> = {
        let topo = sim.topology();
        topo.nodes()
            .iter()
            .enumerate()
            .map(|(id, node)| {
                (
                    node.name().to_owned(),
                    node.position(),
                    topo.established_links(id).len(),
                )
            })
            .collect()
    };

    // Replay from disk and drive both recorded steps.
    let metadata = state::load_metadata(&state_path).unwrap();
    assert_eq!(metadata.states.len(), 2);
    let replayed = replay::build_replay(
        config.simulation.clone(),
        &metadata,
        &factory,
        Vec::new(),
    )
    .unwrap();
    let replayed = Arc::new(replayed);
    replayed.step_by_seconds(0.0);
    replayed.step_by_seconds(0.0);

    let topo = replayed.topology();
    for (name, position, established_count) in recorded {
        let id = topo.node_id(&name).unwrap();
        assert_eq!(topo.node(id).position(), position, "position of {name}");
        assert_eq!(
            topo.established_links(id).len(),
            established_count,
            "established set of {name}"
        );
    }
    drop(topo);

    let _ = std::fs::remove_file(&state_path);
    let mut json = state_path.clone().into_os_string();
    json.push(".json");
    let _ = std::fs::remove_file(json);
}
