pub use agent::{Agent, AgentAttributes, CarFollowingModel, Route};
pub use cgmath;
pub use network::{Intersection, Lane, Road, RoadNetwork, TrafficControl, Turn, LANE_WIDTH};
pub use simulation::Simulation;
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use trajectory::{LaneTrajectory, Leader, Sensing, Trajectory};

mod agent;
pub mod math;
mod network;
mod simulation;
mod trajectory;

new_key_type! {
    /// Unique ID of an [Intersection].
    pub struct IntersectionId;
    /// Unique ID of a [Road].
    pub struct RoadId;
    /// Unique ID of a [Lane].
    pub struct LaneId;
    /// Unique ID of an [Agent].
    pub struct AgentId;
}

type AgentSet = SlotMap<AgentId, Agent>;
