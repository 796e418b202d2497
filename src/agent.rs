use crate::math::{Point2d, Vector2d};
use crate::network::{RoadNetwork, Turn};
use crate::trajectory::{LaneTrajectory, Trajectory};
use crate::{AgentId, IntersectionId, LaneId, RoadId};
use log::debug;
use rand::rngs::SmallRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use smallvec::SmallVec;

pub use self::following::CarFollowingModel;
pub use self::routing::Route;

mod following;
pub(crate) mod routing;

/// The attributes of a simulated agent.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AgentAttributes {
    /// The vehicle width in m.
    pub width: f64,
    /// The vehicle length in m.
    pub length: f64,
    /// The desired speed in m/s.
    pub max_speed: f64,
    /// The maximum acceleration in m/s^2.
    pub max_acceleration: f64,
    /// The maximum comfortable deceleration, a positive number in m/s^2.
    pub max_deceleration: f64,
    /// The desired time headway to the vehicle ahead in s.
    pub time_headway: f64,
    /// The minimum gap to the vehicle ahead in m.
    pub min_gap: f64,
}

impl Default for AgentAttributes {
    fn default() -> Self {
        Self {
            width: 1.5,
            length: 4.5,
            max_speed: 20.0,
            max_acceleration: 0.3,
            max_deceleration: 3.0,
            time_headway: 1.5,
            min_gap: 2.0,
        }
    }
}

impl AgentAttributes {
    /// Samples the attributes of a new driver: vehicle lengths vary between
    /// 3 and 6 m, and the desired speed is drawn from a clamped normal
    /// distribution around the default.
    pub fn sampled(rng: &mut impl Rng) -> Self {
        let defaults = Self::default();
        let distr = Normal::new(1.0_f64, 0.08).expect("Invalid standard deviation");
        let factor = distr.sample(rng).clamp(0.75, 1.25);
        Self {
            length: 3.0 + rng.gen_range(0..=3) as f64,
            max_speed: factor * defaults.max_speed,
            ..defaults
        }
    }
}

/// A simulated vehicle agent.
///
/// Each step the agent senses its surroundings through its [Trajectory],
/// computes an acceleration, resolves the lane it will take at the upcoming
/// intersection, and either advances or, when it runs out of road, dies.
#[derive(Clone, Debug)]
pub struct Agent<T = LaneTrajectory> {
    /// The agent's ID.
    id: AgentId,
    /// Half the vehicle's width in m.
    half_wid: f64,
    /// Half the vehicle's length in m.
    half_len: f64,
    /// The speed in m/s.
    speed: f64,
    /// The car following model.
    following: CarFollowingModel,
    /// The intersection the agent's route starts from.
    source: Option<IntersectionId>,
    /// The intersection the agent is routed towards.
    target: Option<IntersectionId>,
    /// The remaining roads to travel, nearest first.
    route: Route,
    /// The resolved lane on the next road, once a turn is pending.
    next_lane: Option<LaneId>,
    /// The lane on the current road the agent wants to be in.
    preferred_lane: Option<LaneId>,
    /// Whether the agent is alive.
    alive: bool,
    /// The agent's position on the network.
    trajectory: T,
    /// The agent's private source of randomness.
    rng: SmallRng,
}

impl<T: Trajectory> Agent<T> {
    /// Creates a new agent.
    pub(crate) fn new(id: AgentId, attributes: &AgentAttributes, trajectory: T, rng: SmallRng) -> Self {
        Self {
            id,
            half_wid: 0.5 * attributes.width,
            half_len: 0.5 * attributes.length,
            speed: 0.0,
            following: CarFollowingModel::new(attributes),
            source: None,
            target: None,
            route: Route::new(),
            next_lane: None,
            preferred_lane: None,
            alive: true,
            trajectory,
            rng,
        }
    }

    /// Assigns the agent a planned route between two intersections.
    pub(crate) fn assign_route(
        &mut self,
        source: IntersectionId,
        target: IntersectionId,
        route: Route,
    ) {
        self.source = Some(source);
        self.target = Some(target);
        self.route = route;
    }

    /// Gets the agent's ID.
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// The vehicle's width in m.
    pub fn width(&self) -> f64 {
        2.0 * self.half_wid
    }

    /// The vehicle's length in m.
    pub fn length(&self) -> f64 {
        2.0 * self.half_len
    }

    /// The agent's speed in m/s.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// The agent's desired speed in m/s.
    pub fn max_speed(&self) -> f64 {
        self.following.max_speed()
    }

    /// Sets the agent's speed, clamped to `[0, max_speed]`.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(0.0, self.following.max_speed());
    }

    /// Whether the agent is alive.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Marks the agent as dead and releases its position on the network.
    /// The release happens exactly once; killing a dead agent is a no-op.
    pub fn kill(&mut self) {
        if !self.alive {
            return;
        }
        self.alive = false;
        self.trajectory.release();
    }

    /// The world space coordinates of the centre of the vehicle.
    pub fn position(&self) -> Point2d {
        self.trajectory.coords()
    }

    /// A unit vector in world space aligned with the vehicle's heading.
    pub fn direction(&self) -> Vector2d {
        self.trajectory.direction()
    }

    /// The intersection the agent's route starts from.
    pub fn source(&self) -> Option<IntersectionId> {
        self.source
    }

    /// The intersection the agent is routed towards.
    pub fn target(&self) -> Option<IntersectionId> {
        self.target
    }

    /// The remaining roads on the agent's route.
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// The agent's position on the network.
    pub fn trajectory(&self) -> &T {
        &self.trajectory
    }

    pub(crate) fn trajectory_mut(&mut self) -> &mut T {
        &mut self.trajectory
    }

    /// Advances the agent by `dt` seconds: one tick of the
    /// sense, accelerate, change lane, move cycle.
    pub fn step(&mut self, net: &RoadNetwork, dt: f64) {
        if !self.alive {
            return;
        }

        let acceleration = self.following.acceleration(
            self.speed,
            self.trajectory.lead_vehicle(),
            self.trajectory.distance_to_stop_line(),
            self.next_lane.is_some(),
        );
        self.set_speed(self.speed + acceleration * dt);

        if !self.trajectory.is_changing_lanes() && self.select_next_lane(net).is_some() {
            self.apply_lane_preference(net);
        }

        // May be negative under hard braking; the vehicle creeps backwards
        // rather than being floored at a standstill.
        let step = self.speed * dt + 0.5 * acceleration * dt * dt;
        if self.trajectory.crosses_boundary(step) {
            let Some(lane) = self.take_next_lane() else {
                debug!("agent {:?} has nowhere to go and leaves the simulation", self.id);
                self.kill();
                return;
            };
            self.trajectory.advance(net, step, Some(lane));
        } else {
            self.trajectory.advance(net, step, None);
        }
    }

    /// Resolves the lane the agent will take at the upcoming intersection.
    ///
    /// Routed agents consume the next road off their route; agents without
    /// a remaining route roam onto a random outgoing road, never doubling
    /// straight back the way they came. A right turn lands on the next
    /// road's rightmost lane, a left turn on its leftmost, and a straight
    /// crossing on a lane picked at random.
    fn select_next_lane(&mut self, net: &RoadNetwork) -> Option<LaneId> {
        self.next_lane = None;
        let next_road = match self.route.pop_front() {
            Some(road) => road,
            None => self.pick_free_road(net)?,
        };
        let lanes = net.road(next_road).lanes();
        let lane = lanes[self.rng.gen_range(0..lanes.len())];
        let resolved = match net.classify_turn(self.trajectory.current_lane(), lane) {
            Turn::Right => net.road(next_road).rightmost_lane(),
            Turn::Straight => lane,
            Turn::Left => net.road(next_road).leftmost_lane(),
        };
        self.next_lane = Some(resolved);
        self.next_lane
    }

    /// Picks a random road out of the upcoming intersection, excluding the
    /// one that leads straight back onto the current road's source.
    fn pick_free_road(&mut self, net: &RoadNetwork) -> Option<RoadId> {
        let source = net.lane_road(self.trajectory.current_lane()).source();
        let candidates: SmallVec<[RoadId; 8]> = net
            .intersection(self.trajectory.next_intersection())
            .roads_out()
            .iter()
            .copied()
            .filter(|road| net.road(*road).target() != source)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[self.rng.gen_range(0..candidates.len())])
    }

    /// Steers towards the lane on the current road that lines up with the
    /// upcoming turn, starting a lane change when it differs from the lane
    /// the agent is on.
    fn apply_lane_preference(&mut self, net: &RoadNetwork) {
        let Some(next_lane) = self.next_lane else {
            return;
        };
        let current = self.trajectory.current_lane();
        let preferred = match net.classify_turn(current, next_lane) {
            Turn::Left => net.leftmost_adjacent(current),
            Turn::Right => net.rightmost_adjacent(current),
            Turn::Straight => current,
        };
        self.preferred_lane = Some(preferred);
        if preferred != current {
            self.trajectory.initiate_lane_change(net, preferred);
        }
    }

    /// Consumes the resolved next lane when the agent crosses into it.
    fn take_next_lane(&mut self) -> Option<LaneId> {
        self.preferred_lane = None;
        self.next_lane.take()
    }
}
