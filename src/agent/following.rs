use super::AgentAttributes;
use crate::trajectory::Leader;

/// The car following model of an agent: a pure mapping from the agent's
/// kinematic state and its sensed environment to an acceleration.
///
/// The free-road term relaxes the vehicle towards its desired speed; the
/// busy-road term backs it off a leading vehicle; the intersection term
/// brakes it towards a stop line. The result is deliberately not floored at
/// `-max_deceleration`: a vehicle closing fast on a near obstacle computes a
/// braking demand well beyond its comfortable maximum.
#[derive(Clone, Copy, Debug)]
pub struct CarFollowingModel {
    /// The desired speed in m/s.
    max_speed: f64,
    /// The maximum acceleration in m/s^2.
    max_acc: f64,
    /// The maximum comfortable deceleration, a positive number in m/s^2.
    max_dec: f64,
    /// The desired time headway to the vehicle ahead in s.
    headway: f64,
    /// The minimum gap to the vehicle ahead in m.
    min_gap: f64,
}

impl CarFollowingModel {
    /// Creates a new car following model.
    pub fn new(attributes: &AgentAttributes) -> Self {
        Self {
            max_speed: attributes.max_speed,
            max_acc: attributes.max_acceleration,
            max_dec: attributes.max_deceleration,
            headway: attributes.time_headway,
            min_gap: attributes.min_gap,
        }
    }

    /// The desired speed in m/s.
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// The maximum acceleration in m/s^2.
    pub fn max_acceleration(&self) -> f64 {
        self.max_acc
    }

    /// The maximum comfortable deceleration, a positive number in m/s^2.
    pub fn max_deceleration(&self) -> f64 {
        self.max_dec
    }

    /// Computes the acceleration of a vehicle travelling at `vel` m/s.
    ///
    /// # Arguments
    /// * `vel` - The vehicle's speed (m/s).
    /// * `leader` - The vehicle ahead, if one was sensed. A leader at gap
    ///   zero reads as a leader at an unbounded gap.
    /// * `stop_line` - The distance to the next stop line (m); 0 when not
    ///   approaching one.
    /// * `pending_turn` - Whether a next lane has been resolved for an
    ///   upcoming turn.
    pub fn acceleration(
        &self,
        vel: f64,
        leader: Option<Leader>,
        stop_line: f64,
        pending_turn: bool,
    ) -> f64 {
        let free_road_coeff = (vel / self.max_speed).powi(4);

        let busy_road_coeff = match leader {
            Some(leader) if leader.distance > 0.0 => {
                let delta_vel = vel - leader.speed;
                let brake_gap = vel * delta_vel / (2.0 * (self.max_acc * self.max_dec).sqrt());
                let safe_distance = self.min_gap + vel * self.headway + brake_gap;
                (safe_distance / leader.distance).powi(2)
            }
            _ => 0.0,
        };

        let intersection_coeff = if stop_line != 0.0 {
            let safe_distance = 1.0 + vel * self.headway + vel.powi(2) / (2.0 * self.max_dec);
            (safe_distance / stop_line).powi(2)
        } else {
            0.0
        };

        let coeff = if leader.is_none() && !pending_turn {
            1.0 - free_road_coeff
        } else {
            1.0 - free_road_coeff - busy_road_coeff - intersection_coeff
        };
        self.max_acc * coeff
    }
}
