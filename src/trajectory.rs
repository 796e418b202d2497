use crate::math::{rot90, Point2d, Vector2d};
use crate::network::RoadNetwork;
use crate::{IntersectionId, LaneId};

/// The longitudinal distance over which a lane change completes, in m.
const LANE_CHANGE_DISTANCE: f64 = 30.0;

/// The vehicle directly ahead of an agent, as sensed in its current lane.
///
/// A `distance` of zero means the gap is unknown; the car following model
/// reads it as an unbounded gap. This inherits an ambiguity from the sensing
/// contract: a genuine zero-gap collision is indistinguishable from an
/// unknown gap.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Leader {
    /// The net gap to the vehicle ahead in m, never negative.
    pub distance: f64,
    /// The speed of the vehicle ahead in m/s.
    pub speed: f64,
}

/// A snapshot of an agent's sensed environment, captured once per step
/// before any agent moves.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sensing {
    /// The nearest vehicle ahead in the current lane, if any.
    pub leader: Option<Leader>,
    /// The distance to the next stop line in m; 0 when not approaching one.
    pub stop_line: f64,
}

/// An agent's position on the road network and its view of the surroundings.
///
/// The simulation core only touches a vehicle's geometric state through this
/// interface; everything it needs to decide an acceleration, a lane change
/// or a death is listed here.
pub trait Trajectory {
    /// The world space coordinates of the vehicle.
    fn coords(&self) -> Point2d;

    /// A unit vector in world space aligned with the vehicle's heading.
    fn direction(&self) -> Vector2d;

    /// The nearest vehicle ahead in the current lane, if any.
    fn lead_vehicle(&self) -> Option<Leader>;

    /// The distance to the next stop line in m; 0 when not approaching one.
    fn distance_to_stop_line(&self) -> f64;

    /// The intersection at the end of the current road.
    fn next_intersection(&self) -> IntersectionId;

    /// The lane the vehicle is currently on.
    fn current_lane(&self) -> LaneId;

    /// Whether a lane change is in progress.
    fn is_changing_lanes(&self) -> bool;

    /// Starts a lane change onto another lane of the current road.
    fn initiate_lane_change(&mut self, net: &RoadNetwork, lane: LaneId);

    /// Whether advancing by `step` would carry the vehicle over the stop
    /// line into the next intersection.
    fn crosses_boundary(&self, step: f64) -> bool;

    /// Moves the vehicle forward by `step` metres, rolling over onto
    /// `next_lane` at the end of the current lane.
    fn advance(&mut self, net: &RoadNetwork, step: f64, next_lane: Option<LaneId>);

    /// Releases the vehicle's position on the network. Called exactly once,
    /// when the owning agent dies.
    fn release(&mut self);
}

/// An in-progress lane change.
#[derive(Clone, Copy, Debug)]
struct LaneShift {
    /// The lateral offset the vehicle is leaving from.
    from_lat: f64,
    /// The longitudinal position at which the lane change began.
    start_pos: f64,
    /// The longitudinal position at which the lane change is complete.
    end_pos: f64,
}

/// The default [Trajectory]: a vehicle travelling along the centre line of
/// a lane, mapped to world space by linear interpolation between the lane's
/// end intersections plus the lane's lateral offset.
#[derive(Clone, Debug)]
pub struct LaneTrajectory {
    /// The lane the vehicle is on.
    lane: LaneId,
    /// The longitudinal position along the lane, in m.
    pos: f64,
    /// Distance from the vehicle's reference point to its front bumper.
    front_margin: f64,
    /// World coordinates of the start of the current road.
    origin: Point2d,
    /// A unit vector along the current road.
    dir: Vector2d,
    /// The length of the current road in m.
    length: f64,
    /// The lateral offset of the current lane from the road centre line.
    lat: f64,
    /// The intersection at the end of the current road.
    next_node: IntersectionId,
    /// The in-progress lane change, if there is one.
    shift: Option<LaneShift>,
    /// The sensed environment, refreshed by the simulation each step.
    sensed: Sensing,
    /// Whether the trajectory has been released.
    released: bool,
}

impl LaneTrajectory {
    /// Creates a trajectory at the given position along a lane.
    pub fn new(net: &RoadNetwork, lane: LaneId, pos: f64, front_margin: f64) -> Self {
        let mut trajectory = Self {
            lane,
            pos,
            front_margin,
            origin: Point2d::new(0.0, 0.0),
            dir: Vector2d::new(1.0, 0.0),
            length: 0.0,
            lat: 0.0,
            next_node: IntersectionId::default(),
            shift: None,
            sensed: Sensing::default(),
            released: false,
        };
        trajectory.enter(net, lane, pos);
        trajectory
    }

    /// The longitudinal position along the current lane, in m.
    pub fn pos(&self) -> f64 {
        self.pos
    }

    /// Whether the trajectory has been released.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Stores the sensed environment for the coming step.
    pub(crate) fn observe(&mut self, sensed: Sensing) {
        self.sensed = sensed;
    }

    /// Places the vehicle at `pos` on `lane`, dropping any lane change.
    fn enter(&mut self, net: &RoadNetwork, lane: LaneId, pos: f64) {
        let road = net.lane_road(lane);
        self.lane = lane;
        self.pos = pos;
        self.origin = net.intersection(road.source()).point();
        self.dir = road.direction();
        self.length = road.length();
        self.lat = net.lane_offset(lane);
        self.next_node = road.target();
        self.shift = None;
    }

    /// The vehicle's current lateral offset from the road centre line,
    /// easing between lanes during a lane change.
    fn lateral(&self) -> f64 {
        match self.shift {
            Some(shift) => {
                let span = shift.end_pos - shift.start_pos;
                let t = ((self.pos - shift.start_pos) / span).clamp(0.0, 1.0);
                let ease = t * t * (3.0 - 2.0 * t);
                shift.from_lat + ease * (self.lat - shift.from_lat)
            }
            None => self.lat,
        }
    }

    /// The remaining distance from the vehicle's front to the stop line
    /// at the end of the current lane.
    fn distance_to_boundary(&self) -> f64 {
        f64::max(self.length - self.pos - self.front_margin, 0.0)
    }
}

impl Trajectory for LaneTrajectory {
    fn coords(&self) -> Point2d {
        self.origin + self.pos * self.dir + self.lateral() * rot90(self.dir)
    }

    fn direction(&self) -> Vector2d {
        self.dir
    }

    fn lead_vehicle(&self) -> Option<Leader> {
        self.sensed.leader
    }

    fn distance_to_stop_line(&self) -> f64 {
        self.sensed.stop_line
    }

    fn next_intersection(&self) -> IntersectionId {
        self.next_node
    }

    fn current_lane(&self) -> LaneId {
        self.lane
    }

    fn is_changing_lanes(&self) -> bool {
        self.shift.is_some()
    }

    fn initiate_lane_change(&mut self, net: &RoadNetwork, lane: LaneId) {
        self.shift = Some(LaneShift {
            from_lat: self.lateral(),
            start_pos: self.pos,
            end_pos: self.pos + LANE_CHANGE_DISTANCE,
        });
        self.lane = lane;
        self.lat = net.lane_offset(lane);
    }

    fn crosses_boundary(&self, step: f64) -> bool {
        self.distance_to_boundary() <= step
    }

    fn advance(&mut self, net: &RoadNetwork, step: f64, next_lane: Option<LaneId>) {
        self.pos += step;
        if let Some(lane) = next_lane {
            let overflow = f64::max(self.pos - self.length, 0.0);
            self.enter(net, lane, overflow);
        } else if self.shift.is_some_and(|shift| self.pos >= shift.end_pos) {
            self.shift = None;
        }
    }

    fn release(&mut self) {
        self.sensed = Sensing::default();
        self.released = true;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::LANE_WIDTH;
    use assert_approx_eq::assert_approx_eq;

    fn two_road_network() -> (RoadNetwork, LaneId, LaneId) {
        let mut net = RoadNetwork::new();
        let a = net.add_intersection(Point2d::new(0.0, 0.0));
        let b = net.add_intersection(Point2d::new(100.0, 0.0));
        let c = net.add_intersection(Point2d::new(100.0, 50.0));
        let ab = net.add_road(a, b, 2);
        let bc = net.add_road(b, c, 1);
        let first = net.road(ab).rightmost_lane();
        let second = net.road(bc).leftmost_lane();
        (net, first, second)
    }

    #[test]
    fn advances_along_the_lane() {
        let (net, lane, _) = two_road_network();
        let mut trajectory = LaneTrajectory::new(&net, lane, 0.0, 2.0);
        trajectory.advance(&net, 40.0, None);
        assert_approx_eq!(trajectory.pos(), 40.0);
        assert_approx_eq!(trajectory.coords().x, 40.0);
        assert_approx_eq!(trajectory.coords().y, -0.5 * LANE_WIDTH);
    }

    #[test]
    fn boundary_check_accounts_for_the_front_bumper() {
        let (net, lane, _) = two_road_network();
        let mut trajectory = LaneTrajectory::new(&net, lane, 0.0, 2.0);
        trajectory.advance(&net, 90.0, None);
        assert!(!trajectory.crosses_boundary(7.9));
        assert!(trajectory.crosses_boundary(8.1));
    }

    #[test]
    fn rolls_over_onto_the_next_lane() {
        let (net, first, second) = two_road_network();
        let mut trajectory = LaneTrajectory::new(&net, first, 95.0, 2.0);
        assert!(trajectory.crosses_boundary(10.0));
        trajectory.advance(&net, 10.0, Some(second));
        assert_eq!(trajectory.current_lane(), second);
        assert_approx_eq!(trajectory.pos(), 5.0);
        // Now heading north along the second road.
        assert_approx_eq!(trajectory.direction().y, 1.0);
    }

    #[test]
    fn lane_change_eases_between_offsets() {
        let (net, lane, _) = two_road_network();
        let left = net.leftmost_adjacent(lane);
        let mut trajectory = LaneTrajectory::new(&net, lane, 0.0, 2.0);
        trajectory.initiate_lane_change(&net, left);
        assert!(trajectory.is_changing_lanes());
        assert_eq!(trajectory.current_lane(), left);
        assert_approx_eq!(trajectory.coords().y, -0.5 * LANE_WIDTH);

        trajectory.advance(&net, 15.0, None);
        assert!(trajectory.is_changing_lanes());
        assert_approx_eq!(trajectory.coords().y, 0.0);

        trajectory.advance(&net, 15.0, None);
        assert!(!trajectory.is_changing_lanes());
        assert_approx_eq!(trajectory.coords().y, 0.5 * LANE_WIDTH);
    }

    #[test]
    fn release_clears_the_sensed_environment() {
        let (net, lane, _) = two_road_network();
        let mut trajectory = LaneTrajectory::new(&net, lane, 0.0, 2.0);
        trajectory.observe(Sensing {
            leader: Some(Leader {
                distance: 10.0,
                speed: 5.0,
            }),
            stop_line: 20.0,
        });
        trajectory.release();
        assert!(trajectory.is_released());
        assert!(trajectory.lead_vehicle().is_none());
        assert_approx_eq!(trajectory.distance_to_stop_line(), 0.0);
    }
}
