use crate::math::{Point2d, Vector2d};
use crate::{IntersectionId, LaneId, RoadId};
use cgmath::prelude::*;
use slotmap::SlotMap;
use smallvec::SmallVec;
use std::f64::consts::FRAC_PI_4;

/// The width of a single traffic lane, in m.
pub const LANE_WIDTH: f64 = 3.5;

/// A node of the road network where roads begin and end.
#[derive(Clone, Debug)]
pub struct Intersection {
    /// The world space coordinates of the intersection.
    point: Point2d,
    /// The roads leaving this intersection.
    roads_out: Vec<RoadId>,
    /// The control applied to vehicles arriving at this intersection.
    control: TrafficControl,
}

/// A directed road connecting two intersections,
/// carrying one or more parallel lanes.
#[derive(Clone, Debug)]
pub struct Road {
    /// The intersection the road begins at.
    source: IntersectionId,
    /// The intersection the road ends at.
    target: IntersectionId,
    /// The length of the road in m.
    length: f64,
    /// A unit vector from `source` towards `target`.
    direction: Vector2d,
    /// The road's lanes, ordered leftmost first.
    lanes: SmallVec<[LaneId; 4]>,
}

/// A single lane of a road.
#[derive(Clone, Copy, Debug)]
pub struct Lane {
    /// The road the lane belongs to.
    road: RoadId,
    /// The lane's index on its road; 0 is the leftmost lane.
    index: usize,
}

/// The turn a vehicle makes when it crosses from one lane to another.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Turn {
    Left,
    Right,
    Straight,
}

/// The control applied to vehicles arriving at an intersection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrafficControl {
    /// Vehicles may enter the intersection freely.
    #[default]
    Open,
    /// Vehicles must stop at the stop line before the intersection.
    Stop,
}

/// The network of intersections, roads and lanes that vehicles travel on.
///
/// The network is built up front and is read-only while a simulation runs;
/// only the per-intersection [TrafficControl] may be toggled between steps.
#[derive(Clone, Debug, Default)]
pub struct RoadNetwork {
    intersections: SlotMap<IntersectionId, Intersection>,
    roads: SlotMap<RoadId, Road>,
    lanes: SlotMap<LaneId, Lane>,
}

impl Intersection {
    /// The world space coordinates of the intersection.
    pub fn point(&self) -> Point2d {
        self.point
    }

    /// The roads leaving this intersection.
    pub fn roads_out(&self) -> &[RoadId] {
        &self.roads_out
    }

    /// The control applied to vehicles arriving at this intersection.
    pub fn control(&self) -> TrafficControl {
        self.control
    }
}

impl Road {
    /// The intersection the road begins at.
    pub fn source(&self) -> IntersectionId {
        self.source
    }

    /// The intersection the road ends at.
    pub fn target(&self) -> IntersectionId {
        self.target
    }

    /// The length of the road in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// A unit vector pointing along the road.
    pub fn direction(&self) -> Vector2d {
        self.direction
    }

    /// The road's lanes, ordered leftmost first.
    pub fn lanes(&self) -> &[LaneId] {
        &self.lanes
    }

    /// The leftmost lane of the road.
    pub fn leftmost_lane(&self) -> LaneId {
        self.lanes[0]
    }

    /// The rightmost lane of the road.
    pub fn rightmost_lane(&self) -> LaneId {
        self.lanes[self.lanes.len() - 1]
    }
}

impl Lane {
    /// The road the lane belongs to.
    pub fn road(&self) -> RoadId {
        self.road
    }

    /// The lane's index on its road; 0 is the leftmost lane.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl RoadNetwork {
    /// Creates an empty road network.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds an intersection to the network.
    pub fn add_intersection(&mut self, point: Point2d) -> IntersectionId {
        self.intersections.insert(Intersection {
            point,
            roads_out: vec![],
            control: TrafficControl::Open,
        })
    }

    /// Adds a directed road with the given number of lanes between two
    /// intersections. The road's length is the distance between them.
    pub fn add_road(
        &mut self,
        source: IntersectionId,
        target: IntersectionId,
        lane_count: usize,
    ) -> RoadId {
        let from = self.intersections[source].point;
        let to = self.intersections[target].point;
        self.add_road_with_length(source, target, lane_count, from.distance(to))
    }

    /// Adds a directed road whose travel length differs from the straight
    /// line between its ends, as for a curved road.
    pub fn add_road_with_length(
        &mut self,
        source: IntersectionId,
        target: IntersectionId,
        lane_count: usize,
        length: f64,
    ) -> RoadId {
        assert!(lane_count > 0, "a road must have at least one lane");
        let from = self.intersections[source].point;
        let to = self.intersections[target].point;
        let road = self.roads.insert(Road {
            source,
            target,
            length,
            direction: (to - from).normalize(),
            lanes: SmallVec::new(),
        });
        for index in 0..lane_count {
            let lane = self.lanes.insert(Lane { road, index });
            self.roads[road].lanes.push(lane);
        }
        self.intersections[source].roads_out.push(road);
        road
    }

    /// Sets the control applied to vehicles arriving at an intersection.
    pub fn set_control(&mut self, intersection: IntersectionId, control: TrafficControl) {
        self.intersections[intersection].control = control;
    }

    /// Gets a reference to the intersection with the given ID.
    pub fn intersection(&self, id: IntersectionId) -> &Intersection {
        &self.intersections[id]
    }

    /// Gets a reference to the road with the given ID.
    pub fn road(&self, id: RoadId) -> &Road {
        &self.roads[id]
    }

    /// Gets a reference to the lane with the given ID.
    pub fn lane(&self, id: LaneId) -> &Lane {
        &self.lanes[id]
    }

    /// Returns an iterator over all the intersections in the network.
    pub fn intersection_ids(&self) -> impl Iterator<Item = IntersectionId> + '_ {
        self.intersections.keys()
    }

    /// Returns an iterator over all the roads in the network.
    pub fn road_ids(&self) -> impl Iterator<Item = RoadId> + '_ {
        self.roads.keys()
    }

    /// Gets the road a lane belongs to.
    pub fn lane_road(&self, lane: LaneId) -> &Road {
        &self.roads[self.lanes[lane].road]
    }

    /// Gets the leftmost lane on the same road as `lane`.
    pub fn leftmost_adjacent(&self, lane: LaneId) -> LaneId {
        self.lane_road(lane).leftmost_lane()
    }

    /// Gets the rightmost lane on the same road as `lane`.
    pub fn rightmost_adjacent(&self, lane: LaneId) -> LaneId {
        self.lane_road(lane).rightmost_lane()
    }

    /// Gets a lane's lateral offset from its road's centre line, in m.
    /// Positive offsets are to the left of the direction of travel.
    pub fn lane_offset(&self, lane: LaneId) -> f64 {
        let lane = self.lanes[lane];
        let count = self.roads[lane.road].lanes.len();
        (0.5 * (count - 1) as f64 - lane.index as f64) * LANE_WIDTH
    }

    /// Classifies the turn a vehicle makes when it crosses from one lane
    /// to another, by the signed angle between the two road directions.
    /// Transitions within 45 degrees of dead ahead are straight.
    pub fn classify_turn(&self, from: LaneId, to: LaneId) -> Turn {
        let from_dir = self.lane_road(from).direction;
        let to_dir = self.lane_road(to).direction;
        let angle = f64::atan2(from_dir.perp_dot(to_dir), from_dir.dot(to_dir));
        if angle.abs() <= FRAC_PI_4 {
            Turn::Straight
        } else if angle > 0.0 {
            Turn::Left
        } else {
            Turn::Right
        }
    }
}
