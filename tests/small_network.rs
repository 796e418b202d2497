//! Tests that drive agents across small road networks.

use assert_approx_eq::assert_approx_eq;
use microtraffic::math::Point2d;
use microtraffic::{AgentAttributes, RoadId, RoadNetwork, Simulation, TrafficControl, Trajectory};

/// Test that a vehicle's position increases monotonically.
#[test]
fn vehicle_drives_forward() {
    let mut net = RoadNetwork::new();
    let a = net.add_intersection(Point2d::new(0.0, 0.0));
    let b = net.add_intersection(Point2d::new(100.0, 0.0));
    let road = net.add_road(a, b, 1);
    let lane = net.road(road).leftmost_lane();

    let mut sim = Simulation::new(net, 1);
    let agent = sim.add_agent_at(&AgentAttributes::default(), lane, 0.0);

    let mut pos = sim.get_agent(agent).trajectory().pos();
    for _ in 0..100 {
        sim.step(0.1);
        let next_pos = sim.get_agent(agent).trajectory().pos();
        assert!(next_pos > pos);
        pos = next_pos;
    }
    assert!(sim.get_agent(agent).is_alive());
}

/// Test that a routed agent traverses its whole route and then dies at the
/// dead end behind its target.
#[test]
fn route_is_followed_to_the_target() {
    let mut net = RoadNetwork::new();
    let a = net.add_intersection(Point2d::new(0.0, 0.0));
    let b = net.add_intersection(Point2d::new(100.0, 0.0));
    let c = net.add_intersection(Point2d::new(200.0, 0.0));
    let ab = net.add_road(a, b, 1);
    let bc = net.add_road(b, c, 1);

    let mut sim = Simulation::new(net, 3);
    let agent = sim.add_agent_between(&AgentAttributes::default(), a, c);

    let mut visited: Vec<RoadId> = vec![];
    for _ in 0..5000 {
        let lane = sim.get_agent(agent).trajectory().current_lane();
        let road = sim.network().lane(lane).road();
        if visited.last() != Some(&road) {
            visited.push(road);
        }
        sim.step(0.1);
        if !sim.get_agent(agent).is_alive() {
            break;
        }
    }

    assert_eq!(visited, vec![ab, bc]);
    assert!(!sim.get_agent(agent).is_alive());
    assert_eq!(sim.remove_dead_agents(), 1);
    assert_eq!(sim.iter_agents().count(), 0);
}

/// A fast agent on a short route: the first step carries it over the end of
/// its spawn road onto the next route segment, the second runs it off the
/// end of the network.
#[test]
fn displacement_beyond_the_segment_end_switches_or_kills() {
    let mut net = RoadNetwork::new();
    let a = net.add_intersection(Point2d::new(0.0, 0.0));
    let b = net.add_intersection(Point2d::new(5.0, 0.0));
    let c = net.add_intersection(Point2d::new(10.0, 0.0));
    net.add_road(a, b, 2);
    let bc = net.add_road(b, c, 1);

    let mut sim = Simulation::new(net, 5);
    let agent = sim.add_agent_between(&AgentAttributes::default(), a, c);
    sim.get_agent_mut(agent).set_speed(10.0);

    sim.step(1.0);
    // No leader, no stop line: a * (1 - (v/vmax)^4) = 0.3 * (1 - 0.5^4).
    assert_approx_eq!(sim.get_agent(agent).speed(), 10.28125);
    assert!(sim.get_agent(agent).is_alive());
    let lane = sim.get_agent(agent).trajectory().current_lane();
    assert_eq!(sim.network().lane(lane).road(), bc);

    sim.step(1.0);
    assert!(!sim.get_agent(agent).is_alive());
    assert!(sim.get_agent(agent).trajectory().is_released());
    assert_eq!(sim.remove_dead_agents(), 1);
}

/// Test that the car following model keeps a follower behind a slow leader.
#[test]
fn follower_never_overtakes_a_slow_leader() {
    let mut net = RoadNetwork::new();
    let a = net.add_intersection(Point2d::new(0.0, 0.0));
    let b = net.add_intersection(Point2d::new(400.0, 0.0));
    let road = net.add_road(a, b, 1);
    let lane = net.road(road).leftmost_lane();

    let mut sim = Simulation::new(net, 9);
    let follower = sim.add_agent_at(&AgentAttributes::default(), lane, 0.0);
    let leader = sim.add_agent_at(
        &AgentAttributes {
            max_speed: 3.0,
            ..Default::default()
        },
        lane,
        30.0,
    );

    for _ in 0..600 {
        sim.step(0.1);
        let follower_pos = sim.get_agent(follower).trajectory().pos();
        let leader_pos = sim.get_agent(leader).trajectory().pos();
        assert!(follower_pos < leader_pos);
    }
    // The follower has settled into the leader's pace.
    assert!(sim.get_agent(follower).speed() < 5.0);
}

/// Test that a stop-controlled intersection holds traffic until reopened.
#[test]
fn stop_control_holds_traffic_at_the_line() {
    let mut net = RoadNetwork::new();
    let a = net.add_intersection(Point2d::new(0.0, 0.0));
    let b = net.add_intersection(Point2d::new(200.0, 0.0));
    let c = net.add_intersection(Point2d::new(400.0, 0.0));
    let ab = net.add_road(a, b, 1);
    let bc = net.add_road(b, c, 1);
    net.set_control(b, TrafficControl::Stop);
    let lane = net.road(ab).leftmost_lane();

    let mut sim = Simulation::new(net, 11);
    let agent = sim.add_agent_at(&AgentAttributes::default(), lane, 0.0);

    for _ in 0..2000 {
        sim.step(0.1);
    }
    let held = sim.get_agent(agent);
    assert!(held.is_alive());
    assert_eq!(sim.network().lane(held.trajectory().current_lane()).road(), ab);
    assert!(held.speed() < 2.0);

    sim.set_intersection_control(b, TrafficControl::Open);
    for _ in 0..500 {
        sim.step(0.1);
        if !sim.get_agent(agent).is_alive() {
            break;
        }
        let lane = sim.get_agent(agent).trajectory().current_lane();
        if sim.network().lane(lane).road() == bc {
            return;
        }
    }
    panic!("the agent never crossed the reopened intersection");
}

/// Test that an upcoming left turn pulls the agent into the leftmost lane
/// of its road, and that it lands on the leftmost lane of the exit.
#[test]
fn left_turn_steers_through_the_leftmost_lanes() {
    let mut net = RoadNetwork::new();
    let west = net.add_intersection(Point2d::new(-100.0, 0.0));
    let centre = net.add_intersection(Point2d::new(0.0, 0.0));
    let north = net.add_intersection(Point2d::new(0.0, 100.0));
    let approach = net.add_road(west, centre, 2);
    let exit = net.add_road(centre, north, 2);

    let mut sim = Simulation::new(net, 13);
    let agent = sim.add_agent_between(&AgentAttributes::default(), west, north);

    sim.step(0.1);
    let lane = sim.get_agent(agent).trajectory().current_lane();
    assert_eq!(lane, sim.network().road(approach).leftmost_lane());

    for _ in 0..5000 {
        sim.step(0.1);
        let agent_ref = sim.get_agent(agent);
        assert!(agent_ref.is_alive());
        let lane = agent_ref.trajectory().current_lane();
        if sim.network().lane(lane).road() == exit {
            assert_eq!(lane, sim.network().road(exit).leftmost_lane());
            return;
        }
    }
    panic!("the agent never reached the exit road");
}
