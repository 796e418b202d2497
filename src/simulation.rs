use crate::agent::routing::shortest_path;
use crate::network::{RoadNetwork, TrafficControl};
use crate::trajectory::{LaneTrajectory, Leader, Sensing, Trajectory};
use crate::{Agent, AgentAttributes, AgentId, AgentSet, IntersectionId, LaneId};
use itertools::Itertools;
use log::{debug, trace};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// A traffic simulation: the road network, the agents travelling on it,
/// and the seeded source of randomness behind every spawn and lane choice.
///
/// An external driver loop repeatedly calls [step](Self::step), then polls
/// [remove_dead_agents](Self::remove_dead_agents) to drop agents that have
/// reached the end of their road.
pub struct Simulation {
    /// The road network agents travel on.
    network: RoadNetwork,
    /// The agents being simulated.
    agents: AgentSet,
    /// The simulation's source of randomness.
    rng: SmallRng,
    /// The current frame of simulation.
    frame: usize,
}

/// One agent's presence on a lane, as seen by the sensor pass.
struct LanePresence {
    id: AgentId,
    pos: f64,
    half_len: f64,
    speed: f64,
    changing: bool,
}

impl Simulation {
    /// Creates a new simulation over a road network. All randomness is
    /// derived from `seed`, so equal seeds replay identical simulations.
    pub fn new(network: RoadNetwork, seed: u64) -> Self {
        Self {
            network,
            agents: AgentSet::with_key(),
            rng: SmallRng::seed_from_u64(seed),
            frame: 0,
        }
    }

    /// The road network agents travel on.
    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    /// Sets the control applied to vehicles arriving at an intersection.
    pub fn set_intersection_control(
        &mut self,
        intersection: IntersectionId,
        control: TrafficControl,
    ) {
        self.network.set_control(intersection, control);
    }

    /// Adds an agent travelling between two random distinct intersections.
    pub fn add_agent(&mut self, attributes: &AgentAttributes) -> AgentId {
        let nodes: Vec<IntersectionId> = self.network.intersection_ids().collect();
        assert!(
            nodes.len() >= 2,
            "a routed agent needs at least two intersections"
        );
        let source = nodes[self.rng.gen_range(0..nodes.len())];
        let mut target = source;
        while target == source {
            target = nodes[self.rng.gen_range(0..nodes.len())];
        }
        self.add_agent_between(attributes, source, target)
    }

    /// Adds an agent with sampled driver attributes travelling between two
    /// random distinct intersections.
    pub fn add_sampled_agent(&mut self) -> AgentId {
        let attributes = AgentAttributes::sampled(&mut self.rng);
        self.add_agent(&attributes)
    }

    /// Adds an agent routed from `source` to `target`, starting on a random
    /// lane of the first road of the route. When no route exists the agent
    /// free-roams from `source` instead; that is not an error.
    pub fn add_agent_between(
        &mut self,
        attributes: &AgentAttributes,
        source: IntersectionId,
        target: IntersectionId,
    ) -> AgentId {
        let mut route = shortest_path(&self.network, source, target);
        let first_road = route.pop_front().unwrap_or_else(|| {
            trace!("no route from {source:?} to {target:?}; agent will free-roam");
            let roads = self.network.intersection(source).roads_out();
            assert!(!roads.is_empty(), "no road leaves the spawn intersection");
            roads[self.rng.gen_range(0..roads.len())]
        });
        let lanes = self.network.road(first_road).lanes();
        let lane = lanes[self.rng.gen_range(0..lanes.len())];
        let id = self.insert_agent(attributes, lane, 0.0);
        self.agents[id].assign_route(source, target, route);
        debug!(
            "agent {id:?} spawned with {} route segments remaining",
            self.agents[id].route().len()
        );
        id
    }

    /// Adds an agent without a route at the given position along a lane.
    pub fn add_agent_at(
        &mut self,
        attributes: &AgentAttributes,
        lane: LaneId,
        position: f64,
    ) -> AgentId {
        self.insert_agent(attributes, lane, position)
    }

    /// Removes an agent from the simulation.
    pub fn remove_agent(&mut self, id: AgentId) {
        if let Some(mut agent) = self.agents.remove(id) {
            agent.kill();
        }
    }

    /// Advances the simulation by `dt` seconds. Sensors are refreshed for
    /// every agent before any agent moves, so all agents within a step see
    /// the environment left by the previous one.
    pub fn step(&mut self, dt: f64) {
        self.refresh_sensors();
        let network = &self.network;
        for (_, agent) in &mut self.agents {
            agent.step(network, dt);
        }
        self.frame += 1;
    }

    /// Removes agents that died during the last step and returns how many
    /// were removed. Drivers poll this after each step so dead agents drop
    /// out of further ticking and rendering.
    pub fn remove_dead_agents(&mut self) -> usize {
        let before = self.agents.len();
        self.agents.retain(|_, agent| agent.is_alive());
        let removed = before - self.agents.len();
        if removed > 0 {
            trace!("removed {} dead agents", removed);
        }
        removed
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Gets a reference to the agent with the given ID.
    pub fn get_agent(&self, id: AgentId) -> &Agent {
        &self.agents[id]
    }

    /// Gets a mutable reference to the agent with the given ID.
    pub fn get_agent_mut(&mut self, id: AgentId) -> &mut Agent {
        &mut self.agents[id]
    }

    /// Returns an iterator over all the agents in the simulation.
    pub fn iter_agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Captures each live agent's leader and stop line from the positions
    /// at the end of the previous step.
    fn refresh_sensors(&mut self) {
        let by_lane = self
            .agents
            .iter()
            .filter(|(_, agent)| agent.is_alive())
            .map(|(id, agent)| {
                let trajectory = agent.trajectory();
                let presence = LanePresence {
                    id,
                    pos: trajectory.pos(),
                    half_len: 0.5 * agent.length(),
                    speed: agent.speed(),
                    changing: trajectory.is_changing_lanes(),
                };
                (trajectory.current_lane(), presence)
            })
            .into_group_map();

        let mut sensed = Vec::with_capacity(self.agents.len());
        for (lane, mut entries) in by_lane {
            entries.sort_by(|a, b| a.pos.total_cmp(&b.pos));
            let road = self.network.lane_road(lane);
            let stop_controlled =
                self.network.intersection(road.target()).control() == TrafficControl::Stop;
            for (idx, follower) in entries.iter().enumerate() {
                let leader = entries.get(idx + 1).map(|leader| Leader {
                    distance: f64::max(
                        leader.pos - leader.half_len - follower.pos - follower.half_len,
                        0.0,
                    ),
                    speed: leader.speed,
                });
                let stop_line = if stop_controlled && !follower.changing {
                    f64::max(road.length() - follower.pos - follower.half_len, 0.0)
                } else {
                    0.0
                };
                sensed.push((follower.id, Sensing { leader, stop_line }));
            }
        }

        for (id, sensing) in sensed {
            self.agents[id].trajectory_mut().observe(sensing);
        }
    }

    fn insert_agent(
        &mut self,
        attributes: &AgentAttributes,
        lane: LaneId,
        position: f64,
    ) -> AgentId {
        let seed = self.rng.gen();
        let network = &self.network;
        self.agents.insert_with_key(|id| {
            let trajectory = LaneTrajectory::new(network, lane, position, 0.5 * attributes.length);
            Agent::new(id, attributes, trajectory, SmallRng::seed_from_u64(seed))
        })
    }
}
