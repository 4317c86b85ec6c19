//! The step driver and controller surface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use rayon::prelude::*;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use constellation_core::links::NodeId;
use constellation_core::routing::RouteResult;
use constellation_core::{Node, Topology};

use crate::config::SimulationConfig;
use crate::plugins::SimulationPlugin;
use crate::state::StateRecorder;
use crate::{Result, RuntimeError};

/// Step/auto-run, injection, and query surface of a running simulation.
pub trait SimulationController: Send + Sync {
    fn sim_time(&self) -> DateTime<Utc>;
    fn all_nodes(&self) -> Vec<Arc<Node>>;
    fn satellites(&self) -> Vec<Arc<Node>>;
    fn ground_stations(&self) -> Vec<Arc<Node>>;
    fn step_by_seconds(&self, seconds: f64);
    fn step_to_time(&self, time: DateTime<Utc>);
}

/// One simulation run: the topology, the clock, and the per-tick pipeline
/// `positions -> links -> routes -> plugins`.
pub struct Simulation {
    config: SimulationConfig,
    topology: RwLock<Topology>,
    satellites: Mutex<Vec<NodeId>>,
    grounds: Mutex<Vec<NodeId>>,
    sim_time: Mutex<DateTime<Utc>>,
    running: AtomicBool,
    autorun: AtomicBool,
    plugins: Mutex<Vec<Box<dyn SimulationPlugin>>>,
    recorder: Option<Mutex<StateRecorder>>,
    /// Recorded timeline when replaying a captured run.
    timeline: Option<Vec<DateTime<Utc>>>,
    timeline_ix: Mutex<usize>,
    workers: Option<rayon::ThreadPool>,
}

impl Simulation {
    pub fn new(
        config: SimulationConfig,
        plugins: Vec<Box<dyn SimulationPlugin>>,
        recorder: Option<StateRecorder>,
    ) -> Self {
        let start = config.simulation_start_time;
        let workers = build_workers(config.max_cpu_cores);
        Self {
            config,
            topology: RwLock::new(Topology::new()),
            satellites: Mutex::new(Vec::new()),
            grounds: Mutex::new(Vec::new()),
            sim_time: Mutex::new(start),
            running: AtomicBool::new(false),
            autorun: AtomicBool::new(false),
            plugins: Mutex::new(plugins),
            recorder: recorder.map(Mutex::new),
            timeline: None,
            timeline_ix: Mutex::new(0),
            workers,
        }
    }

    /// A simulation that replays a pre-assembled topology along a recorded
    /// timeline instead of advancing a free-running clock.
    pub fn replay(
        config: SimulationConfig,
        topology: Topology,
        satellites: Vec<NodeId>,
        grounds: Vec<NodeId>,
        timeline: Vec<DateTime<Utc>>,
        plugins: Vec<Box<dyn SimulationPlugin>>,
    ) -> Self {
        let start = config.simulation_start_time;
        let workers = build_workers(config.max_cpu_cores);
        Self {
            config,
            topology: RwLock::new(topology),
            satellites: Mutex::new(satellites),
            grounds: Mutex::new(grounds),
            sim_time: Mutex::new(start),
            running: AtomicBool::new(false),
            autorun: AtomicBool::new(false),
            plugins: Mutex::new(plugins),
            recorder: None,
            timeline: Some(timeline),
            timeline_ix: Mutex::new(0),
            workers,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Read access to the queryable topology graph of the last step.
    pub fn topology(&self) -> RwLockReadGuard<'_, Topology> {
        self.topology.read()
    }

    /// Adds loaded satellites to the simulation, fully meshing them with the
    /// existing constellation and announcing them to every ground protocol.
    pub fn inject_satellites(&self, nodes: Vec<Node>) -> Result<Vec<NodeId>> {
        let mut topo = self.topology.write();
        let time = *self.sim_time.lock();

        let mut new_ids = Vec::with_capacity(nodes.len());
        for node in nodes {
            if !node.is_satellite() {
                return Err(RuntimeError::Injection(format!(
                    "{} is not a satellite",
                    node.name()
                )));
            }
            new_ids.push(topo.push_node(node)?);
        }

        let mut satellites = self.satellites.lock();
        for (i, &id) in new_ids.iter().enumerate() {
            for &existing in satellites.iter() {
                topo.add_isl_link(existing, id);
            }
            for &later in &new_ids[i + 1..] {
                topo.add_isl_link(id, later);
            }
            topo.node(id).update_position(time);
        }
        satellites.extend(new_ids.iter().copied());
        drop(satellites);

        for &ground in self.grounds.lock().iter() {
            if let Some(protocol) = topo.node(ground).protocol().ground() {
                for &id in &new_ids {
                    protocol.add_satellite(id);
                }
            }
        }

        info!(count = new_ids.len(), "injected satellites");
        Ok(new_ids)
    }

    pub fn inject_ground_stations(&self, nodes: Vec<Node>) -> Result<Vec<NodeId>> {
        let mut topo = self.topology.write();
        let time = *self.sim_time.lock();

        let mut new_ids = Vec::with_capacity(nodes.len());
        for node in nodes {
            if !node.is_ground_station() {
                return Err(RuntimeError::Injection(format!(
                    "{} is not a ground station",
                    node.name()
                )));
            }
            let id = topo.push_node(node)?;
            topo.node(id).update_position(time);
            new_ids.push(id);
        }
        self.grounds.lock().extend(new_ids.iter().copied());

        info!(count = new_ids.len(), "injected ground stations");
        Ok(new_ids)
    }

    /// Route between two nodes by name, on the topology of the last step.
    pub fn route_between(&self, from: &str, to: &str) -> Result<RouteResult> {
        let topo = self.topology.read();
        let from_id = topo
            .node_id(from)
            .ok_or_else(|| RuntimeError::UnknownNode(from.to_owned()))?;
        let to_id = topo
            .node_id(to)
            .ok_or_else(|| RuntimeError::UnknownNode(to.to_owned()))?;
        Ok(topo.node(from_id).router().route_to_node(to_id, &topo)?)
    }

    /// Route from a node to the best host of a service.
    pub fn route_to_service(&self, from: &str, service: &str) -> Result<RouteResult> {
        let topo = self.topology.read();
        let from_id = topo
            .node_id(from)
            .ok_or_else(|| RuntimeError::UnknownNode(from.to_owned()))?;
        Ok(topo.node(from_id).router().route_to_service(service, &topo)?)
    }

    fn fan_out(&self, topo: &Topology, f: impl Fn(&Arc<Node>, &Topology) + Sync) {
        match &self.workers {
            Some(pool) => pool.install(|| topo.nodes().par_iter().for_each(|n| f(n, topo))),
            None => topo.nodes().par_iter().for_each(|n| f(n, topo)),
        }
    }

    fn next_step_time(&self, next_time: &dyn Fn(DateTime<Utc>) -> DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.timeline {
            Some(timeline) => {
                let mut ix = self.timeline_ix.lock();
                if *ix >= timeline.len() {
                    warn!("replay timeline exhausted");
                    self.autorun.store(false, Ordering::SeqCst);
                    return None;
                }
                let time = timeline[*ix];
                *ix += 1;
                *self.sim_time.lock() = time;
                Some(time)
            }
            None => {
                let mut sim_time = self.sim_time.lock();
                *sim_time = next_time(*sim_time);
                Some(*sim_time)
            }
        }
    }

    /// One tick. Re-entrant requests are dropped, not queued.
    fn run_step(&self, next_time: &dyn Fn(DateTime<Utc>) -> DateTime<Utc>) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("step already in progress, dropping request");
            return;
        }

        let Some(time) = self.next_step_time(next_time) else {
            self.running.store(false, Ordering::SeqCst);
            return;
        };
        info!(time = %time.to_rfc3339(), "simulation step");

        {
            let topo = self.topology.read();

            self.fan_out(&topo, |node, _| node.update_position(time));

            self.fan_out(&topo, |node, topo| {
                if let Err(e) = node.protocol().link_protocol().update_links(topo) {
                    warn!(node = node.name(), error = %e, "link update failed");
                }
            });

            if self.config.use_pre_route_calc {
                self.fan_out(&topo, |node, topo| {
                    if !node.router().can_pre_route_calc() {
                        return;
                    }
                    if let Err(e) = node.router().calculate_routing_table(topo) {
                        warn!(node = node.name(), error = %e, "route precompute failed");
                    }
                });
            }
        }

        for plugin in self.plugins.lock().iter() {
            if let Err(e) = plugin.post_step(self) {
                warn!(plugin = plugin.name(), error = %e, "plugin post-step failed");
            }
        }

        if let Some(recorder) = &self.recorder {
            recorder.lock().add_state(self);
        }

        self.running.store(false, Ordering::SeqCst);
    }

    /// Runs steps on a dedicated loop until `stop_autorun`. The returned
    /// channel fires once the loop has exited.
    pub fn start_autorun(self: &Arc<Self>) -> oneshot::Receiver<()> {
        let (done_tx, done_rx) = oneshot::channel();
        if self.autorun.swap(true, Ordering::SeqCst) {
            // Already in auto-run; signal completion immediately.
            let _ = done_tx.send(());
            return done_rx;
        }

        let sim = Arc::clone(self);
        tokio::spawn(async move {
            while sim.autorun.load(Ordering::SeqCst) {
                let stepper = Arc::clone(&sim);
                let step_s = stepper.config.step_multiplier as f64;
                let _ = tokio::task::spawn_blocking(move || stepper.step_by_seconds(step_s)).await;

                let interval_ms = sim.config.step_interval;
                if interval_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(interval_ms as u64)).await;
                } else {
                    tokio::task::yield_now().await;
                }
            }
            let _ = done_tx.send(());
        });
        done_rx
    }

    /// Cooperative stop; the loop exits at its next check.
    pub fn stop_autorun(&self) {
        self.autorun.store(false, Ordering::SeqCst);
    }

    /// Flushes recorded states to disk, if capture is configured.
    pub fn save_state(&self) -> Result<()> {
        if let Some(recorder) = &self.recorder {
            recorder.lock().save(self)?;
        }
        Ok(())
    }
}

fn build_workers(max_cpu_cores: usize) -> Option<rayon::ThreadPool> {
    if max_cpu_cores == 0 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(max_cpu_cores)
        .build()
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!(error = %e, "failed to build worker pool, using the global one");
            None
        }
    }
}

impl SimulationController for Simulation {
    fn sim_time(&self) -> DateTime<Utc> {
        *self.sim_time.lock()
    }

    fn all_nodes(&self) -> Vec<Arc<Node>> {
        self.topology.read().nodes().to_vec()
    }

    fn satellites(&self) -> Vec<Arc<Node>> {
        let topo = self.topology.read();
        self.satellites
            .lock()
            .iter()
            .map(|&id| Arc::clone(topo.node(id)))
            .collect()
    }

    fn ground_stations(&self) -> Vec<Arc<Node>> {
        let topo = self.topology.read();
        self.grounds
            .lock()
            .iter()
            .map(|&id| Arc::clone(topo.node(id)))
            .collect()
    }

    fn step_by_seconds(&self, seconds: f64) {
        self.run_step(&|previous| {
            previous + chrono::Duration::milliseconds((seconds * 1_000.0) as i64)
        });
    }

    fn step_to_time(&self, time: DateTime<Utc>) {
        self.run_step(&|_| time);
    }
}
