//! World-level behavior: movement, right-of-way, population and priority

use rand::rngs::StdRng;
use rand::SeedableRng;

use tile_traffic::simulation::{
    event_channel, AsciiMapLoader, Behavior, DrivingPolicy, FleetCounters, MapLoader,
    PopulationController, SimWorld, SimulationClock, SimulationConfig, SpawnDecision, TileCoord,
    TileGrid, VehicleKind, MAX_AMBULANCES, RECKLESS_YIELD_PROBABILITY, SEMI_SHARE,
};

/// Fast enough that every vehicle reaches a decision on every advance
const FAST: f32 = 1000.0;

fn load(layout: &str) -> TileGrid {
    AsciiMapLoader::new(layout).load().expect("valid layout")
}

fn straight_road() -> TileGrid {
    load(">>>>>>")
}

/// A north-south lane crossing an east-west lane in a single junction
fn junction() -> TileGrid {
    load(
        "
        .v....
        >+>>>>
        .v....
        ",
    )
}

#[test]
fn test_vehicle_drives_off_the_map_and_is_removed() {
    let mut world = SimWorld::new_with_seed(straight_road(), 1);
    let id = world
        .spawn_vehicle(VehicleKind::Car, Behavior::Cautious, FAST)
        .expect("entry lane is free");

    for expected_x in 1..6 {
        let removed = world.advance(FAST);
        assert!(removed.is_empty());
        assert_eq!(world.vehicle(id).unwrap().position, TileCoord::new(expected_x, 0));
    }

    let removed = world.advance(FAST);
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id(), id);
    assert!(!removed[0].alive);
    assert_eq!(world.vehicle_count(), 0);
    assert_eq!(*world.counters(), FleetCounters::default());
    assert!(!world.grid().lane_occupied(TileCoord::new(5, 0)));
}

#[test]
fn test_spawn_skipped_when_entry_taken() {
    let mut world = SimWorld::new_with_seed(straight_road(), 2);
    assert!(world
        .spawn_vehicle(VehicleKind::Truck, Behavior::Cautious, FAST)
        .is_some());
    assert!(world
        .spawn_vehicle(VehicleKind::Truck, Behavior::Cautious, FAST)
        .is_none());
    assert_eq!(world.vehicle_count(), 1);
    assert_eq!(world.counters().trucks(), 1);
}

#[test]
fn test_cautious_driver_keeps_a_gap() {
    let mut world = SimWorld::new_with_seed(straight_road(), 3);
    let leader = world
        .spawn_vehicle(VehicleKind::Car, Behavior::Reckless, FAST)
        .unwrap();
    world.advance(FAST);
    let follower = world
        .spawn_vehicle(VehicleKind::Car, Behavior::Cautious, FAST)
        .unwrap();

    world.advance(FAST);
    assert_eq!(world.vehicle(leader).unwrap().position, TileCoord::new(2, 0));
    assert_eq!(world.vehicle(follower).unwrap().position, TileCoord::new(0, 0));

    world.advance(FAST);
    assert_eq!(world.vehicle(leader).unwrap().position, TileCoord::new(3, 0));
    assert_eq!(world.vehicle(follower).unwrap().position, TileCoord::new(1, 0));
}

#[test]
fn test_reckless_driver_tailgates() {
    let mut world = SimWorld::new_with_seed(straight_road(), 4);
    let leader = world
        .spawn_vehicle(VehicleKind::Car, Behavior::Reckless, FAST)
        .unwrap();
    world.advance(FAST);
    let follower = world
        .spawn_vehicle(VehicleKind::Car, Behavior::Reckless, FAST)
        .unwrap();

    world.advance(FAST);
    assert_eq!(world.vehicle(leader).unwrap().position, TileCoord::new(2, 0));
    assert_eq!(world.vehicle(follower).unwrap().position, TileCoord::new(1, 0));
    world.check_invariants().unwrap();
}

#[test]
fn test_cautious_driver_waits_for_busy_junction() {
    let mut world = SimWorld::new_with_seed(junction(), 5);
    let southbound = world
        .spawn_vehicle_at(VehicleKind::Car, Behavior::Reckless, TileCoord::new(1, 0), FAST)
        .unwrap();
    let eastbound = world
        .spawn_vehicle_at(VehicleKind::Car, Behavior::Cautious, TileCoord::new(0, 1), FAST)
        .unwrap();

    world.advance(FAST);
    assert_eq!(world.vehicle(southbound).unwrap().position, TileCoord::new(1, 1));
    assert_eq!(world.vehicle(eastbound).unwrap().position, TileCoord::new(0, 1));

    // The reckless car clears the junction first, then the cautious one enters
    world.advance(FAST);
    assert_ne!(world.vehicle(southbound).unwrap().position, TileCoord::new(1, 1));
    assert_eq!(world.vehicle(eastbound).unwrap().position, TileCoord::new(1, 1));
    world.check_invariants().unwrap();
}

#[test]
fn test_reckless_driver_ignores_right_of_way() {
    let mut world = SimWorld::new_with_seed(junction(), 6);
    world
        .spawn_vehicle_at(VehicleKind::Car, Behavior::Reckless, TileCoord::new(1, 0), FAST)
        .unwrap();
    world
        .spawn_vehicle_at(VehicleKind::Car, Behavior::Reckless, TileCoord::new(0, 1), FAST)
        .unwrap();

    world.advance(FAST);
    let junction = world.grid().intersection(TileCoord::new(1, 1)).unwrap();
    assert_eq!(junction.occupants().len(), 2);
    world.check_invariants().unwrap();
}

#[test]
fn test_semi_policy_flips_per_decision() {
    let mut rng = StdRng::seed_from_u64(7);
    let policies: Vec<DrivingPolicy> = (0..200)
        .map(|_| DrivingPolicy::resolve(VehicleKind::Car, Behavior::Semi, &mut rng))
        .collect();
    assert!(policies.contains(&DrivingPolicy::Cautious));
    assert!(policies.contains(&DrivingPolicy::Reckless));
    assert!(!policies.contains(&DrivingPolicy::Emergency));
}

#[test]
fn test_fixed_policies() {
    let mut rng = StdRng::seed_from_u64(8);
    for _ in 0..50 {
        assert_eq!(
            DrivingPolicy::resolve(VehicleKind::Car, Behavior::Reckless, &mut rng),
            DrivingPolicy::Reckless
        );
        assert_eq!(
            DrivingPolicy::resolve(VehicleKind::Car, Behavior::Cautious, &mut rng),
            DrivingPolicy::Cautious
        );
        assert_eq!(
            DrivingPolicy::resolve(VehicleKind::Truck, Behavior::Reckless, &mut rng),
            DrivingPolicy::Cautious
        );
        assert_eq!(
            DrivingPolicy::resolve(VehicleKind::Ambulance, Behavior::Cautious, &mut rng),
            DrivingPolicy::Emergency
        );
    }
    assert!(DrivingPolicy::Cautious.yields_to_emergency(&mut rng));
    assert!(!DrivingPolicy::Emergency.yields_to_emergency(&mut rng));
}

#[test]
fn test_reckless_driver_sometimes_yields() {
    let mut rng = StdRng::seed_from_u64(25);
    let yields = (0..1000)
        .filter(|_| DrivingPolicy::Reckless.yields_to_emergency(&mut rng))
        .count();
    assert!(yields > 0 && yields < 1000);
    let share = yields as f64 / 1000.0;
    assert!(
        (share - RECKLESS_YIELD_PROBABILITY).abs() < 0.06,
        "reckless yield share {}",
        share
    );
}

#[test]
fn test_risky_spawns_split_between_semi_and_reckless() {
    // No truck deficit, always a behavior deficit
    let config = SimulationConfig {
        max_vehicles: 10,
        car_truck_ratio: 1.0,
        reckless_normal_ratio: 1.0,
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(26);
    let draws = 2000;
    let mut semi = 0;
    for _ in 0..draws {
        match PopulationController::decide(&FleetCounters::default(), 5, &config, &mut rng) {
            SpawnDecision::Car(Behavior::Semi) => semi += 1,
            SpawnDecision::Car(Behavior::Reckless) => {}
            other => panic!("unexpected decision {:?}", other),
        }
    }
    let share = semi as f64 / draws as f64;
    assert!((share - SEMI_SHARE).abs() < 0.05, "semi share {}", share);
}

#[test]
fn test_first_spawn_at_empty_world_is_cautious_car() {
    let config = SimulationConfig {
        max_vehicles: 10,
        car_truck_ratio: 0.7,
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(9);
    // 0 < 0.3 * 0 is false for both checks
    let decision = PopulationController::decide(&FleetCounters::default(), 0, &config, &mut rng);
    assert_eq!(decision, SpawnDecision::Car(Behavior::Cautious));
}

#[test]
fn test_truck_deficit_checked_before_behavior_deficit() {
    let config = SimulationConfig {
        max_vehicles: 10,
        car_truck_ratio: 0.7,
        reckless_normal_ratio: 0.3,
        ..Default::default()
    };
    let mut world = SimWorld::new_with_seed(TileGrid::crossroads(), 10);
    let controller = PopulationController;

    let first = controller.evaluate(&mut world, &config).unwrap();
    assert_eq!(world.vehicle(first).unwrap().kind(), VehicleKind::Car);
    assert_eq!(world.vehicle(first).unwrap().behavior(), Behavior::Cautious);

    // One car, no trucks: both deficits exist, the truck wins
    let second = controller.evaluate(&mut world, &config).unwrap();
    assert_eq!(world.vehicle(second).unwrap().kind(), VehicleKind::Truck);

    let third = controller.evaluate(&mut world, &config).unwrap();
    let third = world.vehicle(third).unwrap();
    assert_eq!(third.kind(), VehicleKind::Car);
    assert!(matches!(third.behavior(), Behavior::Semi | Behavior::Reckless));

    let fourth = controller.evaluate(&mut world, &config).unwrap();
    assert_eq!(world.vehicle(fourth).unwrap().behavior(), Behavior::Cautious);
}

#[test]
fn test_population_holds_at_cap() {
    let config = SimulationConfig {
        max_vehicles: 2,
        ..Default::default()
    };
    let mut world = SimWorld::new_with_seed(TileGrid::crossroads(), 11);
    let controller = PopulationController;
    assert!(controller.evaluate(&mut world, &config).is_some());
    assert!(controller.evaluate(&mut world, &config).is_some());
    assert!(controller.evaluate(&mut world, &config).is_none());
    assert_eq!(world.vehicle_count(), 2);
}

#[test]
fn test_ambulance_cap() {
    let config = SimulationConfig::default();
    let mut world = SimWorld::new_with_seed(TileGrid::crossroads(), 12);
    let controller = PopulationController;

    let spawned: Vec<_> = (0..6)
        .map(|_| controller.spawn_ambulance(&mut world, &config))
        .collect();
    assert!(spawned[..5].iter().all(Option::is_some));
    assert!(spawned[5].is_none());
    assert_eq!(world.counters().ambulances(), MAX_AMBULANCES);
    assert_eq!(world.vehicle_count(), MAX_AMBULANCES);
    assert_eq!(world.priority().len(), MAX_AMBULANCES);
}

#[test]
fn test_traffic_yields_to_nearby_ambulance() {
    let mut world = SimWorld::new_with_seed(junction(), 13);
    let car = world
        .spawn_vehicle_at(VehicleKind::Car, Behavior::Cautious, TileCoord::new(0, 1), FAST)
        .unwrap();
    let ambulance = world
        .spawn_vehicle_at(
            VehicleKind::Ambulance,
            Behavior::Reckless,
            TileCoord::new(1, 0),
            FAST,
        )
        .unwrap();
    assert!(world.is_yield_required(TileCoord::new(0, 1)));

    world.advance(FAST);
    let car_state = world.vehicle(car).unwrap();
    assert!(car_state.yielding);
    assert_eq!(car_state.position, TileCoord::new(0, 1));
    assert_eq!(world.vehicle(ambulance).unwrap().position, TileCoord::new(1, 1));

    // The area follows the ambulance
    let areas = world.priority().areas();
    assert_eq!(areas.len(), 1);
    assert_eq!(areas[0].center, TileCoord::new(1, 1));
}

#[test]
fn test_removing_ambulance_retracts_priority() {
    let mut world = SimWorld::new_with_seed(junction(), 14);
    let car = world
        .spawn_vehicle_at(VehicleKind::Car, Behavior::Cautious, TileCoord::new(0, 1), FAST)
        .unwrap();
    let ambulance = world
        .spawn_vehicle_at(
            VehicleKind::Ambulance,
            Behavior::Reckless,
            TileCoord::new(1, 0),
            FAST,
        )
        .unwrap();
    world.advance(FAST);
    assert!(world.vehicle(car).unwrap().yielding);

    world.remove_vehicle(ambulance).unwrap();
    assert!(world.priority().is_empty());
    assert!(!world.is_yield_required(TileCoord::new(0, 1)));
    assert_eq!(world.counters().ambulances(), 0);

    world.advance(FAST);
    let car_state = world.vehicle(car).unwrap();
    assert!(!car_state.yielding);
    assert_eq!(car_state.position, TileCoord::new(1, 1));
    assert_eq!(world.statistics(0).yielding, 0);
}

#[test]
fn test_yield_flag_does_not_outlive_ambulance() {
    const SPEED: f32 = 60.0;
    let mut world = SimWorld::new_with_seed(junction(), 23);
    let car = world
        .spawn_vehicle_at(VehicleKind::Car, Behavior::Cautious, TileCoord::new(0, 1), SPEED)
        .unwrap();
    let ambulance = world
        .spawn_vehicle_at(
            VehicleKind::Ambulance,
            Behavior::Reckless,
            TileCoord::new(1, 0),
            SPEED,
        )
        .unwrap();

    let mut advances = 0;
    while !world.vehicle(car).unwrap().yielding {
        world.advance(SPEED);
        advances += 1;
        assert!(advances < 10, "car never had to give way");
    }

    world.remove_vehicle(ambulance).unwrap();
    world.advance(SPEED);
    assert!(world.vehicles().all(|v| !v.yielding));
    assert_eq!(world.statistics(0).yielding, 0);
}

#[test]
fn test_lane_moves_near_ambulance_are_not_yields() {
    const SPEED: f32 = 60.0;
    let mut world = SimWorld::new_with_seed(load(">>>>>>>>>"), 24);
    world
        .spawn_vehicle_at(
            VehicleKind::Ambulance,
            Behavior::Reckless,
            TileCoord::new(0, 0),
            SPEED,
        )
        .unwrap();
    let car = world
        .spawn_vehicle_at(VehicleKind::Car, Behavior::Cautious, TileCoord::new(2, 0), SPEED)
        .unwrap();

    let mut moved = false;
    for _ in 0..6 {
        world.advance(SPEED);
        let car = world.vehicle(car).unwrap();
        moved |= car.position != TileCoord::new(2, 0);
        assert!(!car.yielding);
    }
    assert!(moved);
    assert_eq!(world.statistics(0).yielding, 0);
}

#[test]
fn test_removing_unknown_vehicle_fails_without_side_effects() {
    let mut world = SimWorld::new_with_seed(straight_road(), 15);
    let id = world
        .spawn_vehicle(VehicleKind::Truck, Behavior::Cautious, FAST)
        .unwrap();
    world.remove_vehicle(id).unwrap();

    assert!(world.remove_vehicle(id).is_err());
    assert_eq!(*world.counters(), FleetCounters::default());
    world.check_invariants().unwrap();
}

#[test]
fn test_counters_match_live_vehicles() {
    let config = SimulationConfig {
        spawn_delay: 1,
        max_vehicles: 20,
        ..Default::default()
    };
    let mut world = SimWorld::new_with_seed(TileGrid::crossroads(), 16);
    let mut clock = SimulationClock::new();
    let (events, _rx) = event_channel();
    let controller = PopulationController;

    for round in 0..400 {
        clock.run_tick(&mut world, &config, &events);
        if round % 37 == 0 {
            controller.spawn_ambulance(&mut world, &config);
        }
        if round % 23 == 0 {
            let first = world.vehicles().next().map(|v| v.id());
            if let Some(id) = first {
                world.remove_vehicle(id).unwrap();
            }
        }

        world.check_invariants().unwrap();
        assert_eq!(*world.counters(), FleetCounters::tally(world.vehicles()));
    }
}

#[test]
fn test_behavior_never_changes() {
    let config = SimulationConfig {
        spawn_delay: 2,
        reckless_normal_ratio: 0.8,
        ..Default::default()
    };
    let mut world = SimWorld::new_with_seed(TileGrid::crossroads(), 17);
    let mut clock = SimulationClock::new();
    let (events, _rx) = event_channel();
    let mut seen = std::collections::HashMap::new();

    for _ in 0..300 {
        clock.run_tick(&mut world, &config, &events);
        for vehicle in world.vehicles() {
            let first = *seen.entry(vehicle.id()).or_insert(vehicle.behavior());
            assert_eq!(first, vehicle.behavior());
        }
    }
    assert!(seen.values().any(|b| *b == Behavior::Reckless));
}

#[test]
fn test_debug_visibility_does_not_change_results() {
    let config = SimulationConfig {
        spawn_delay: 3,
        ..Default::default()
    };
    let mut plain = SimWorld::new_with_seed(TileGrid::crossroads(), 18);
    let mut shown = SimWorld::new_with_seed(TileGrid::crossroads(), 18);
    shown.set_areas_visible(true);

    let (events, _rx) = event_channel();
    let mut plain_clock = SimulationClock::new();
    let mut shown_clock = SimulationClock::new();
    let controller = PopulationController;

    for round in 0..250 {
        if round % 40 == 0 {
            controller.spawn_ambulance(&mut plain, &config);
            controller.spawn_ambulance(&mut shown, &config);
        }
        plain_clock.run_tick(&mut plain, &config, &events);
        shown_clock.run_tick(&mut shown, &config, &events);

        assert_eq!(plain.snapshot(0).vehicles, shown.snapshot(0).vehicles);
        assert_eq!(plain.counters(), shown.counters());
    }
    assert!(shown.priority().areas().iter().all(|a| a.opacity > 0.0));
    assert!(plain.priority().areas().iter().all(|a| a.opacity == 0.0));
}

#[test]
fn test_same_seed_replays_identically() {
    let config = SimulationConfig {
        spawn_delay: 2,
        ..Default::default()
    };
    let run = |seed: u64| {
        let mut world = SimWorld::new_with_seed(TileGrid::crossroads(), seed);
        let mut clock = SimulationClock::new();
        let (events, _rx) = event_channel();
        let mut spawned = Vec::new();
        for _ in 0..200 {
            let report = clock.run_tick(&mut world, &config, &events);
            spawned.push(report.spawned);
        }
        (spawned, world.snapshot(clock.tick_count()))
    };

    assert_eq!(run(21), run(21));
}

#[test]
fn test_crossroads_layout() {
    let world = SimWorld::new_with_seed(TileGrid::crossroads(), 19);
    assert_eq!(world.lane_network().entry_points().len(), 8);
    assert!(world.lane_network().is_exit(TileCoord::new(0, 4)));
    assert!(world.lane_network().is_exit(TileCoord::new(15, 5)));
    assert!(world.grid().intersection(TileCoord::new(4, 4)).is_some());
}

#[test]
fn test_ascii_loader_rejects_bad_layouts() {
    assert!(AsciiMapLoader::new("").load().is_err());
    assert!(AsciiMapLoader::new(">>\n>").load().is_err());
    assert!(AsciiMapLoader::new(">x>").load().is_err());
}
