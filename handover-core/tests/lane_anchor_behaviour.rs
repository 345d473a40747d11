//! Behavioural tests for `LaneAnchorResolver` using rstest-bdd.

use std::cell::RefCell;

use geo::Coord;
use handover_core::{AnchorSource, City, LaneAnchor, LaneAnchorResolver, haversine_km};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

/// Shared state for lane anchor scenarios.
#[derive(Debug, Default)]
struct AnchorWorld {
    resolver: RefCell<Option<LaneAnchorResolver>>,
    rider: RefCell<Option<Coord<f64>>>,
    anchors: RefCell<Vec<LaneAnchor>>,
}

impl AnchorWorld {
    fn resolve(&self, lane: &str) {
        let resolver = self
            .resolver
            .borrow()
            .expect("resolver should be initialised");
        let anchor = resolver.resolve(lane.trim_matches('"'), *self.rider.borrow());
        self.anchors.borrow_mut().push(anchor);
    }

    fn last_anchor(&self) -> LaneAnchor {
        self.anchors
            .borrow()
            .last()
            .cloned()
            .expect("an anchor should be resolved")
    }
}

#[fixture]
fn world() -> AnchorWorld {
    AnchorWorld::default()
}

#[given("a lane anchor resolver")]
fn given_resolver(world: &AnchorWorld) {
    world.resolver.replace(Some(LaneAnchorResolver::default()));
}

#[given("a rider standing at the Delhi centroid")]
fn given_rider(world: &AnchorWorld) {
    world.rider.replace(Some(City::Delhi.centroid()));
}

#[when("I resolve the lane {lane} twice")]
fn when_resolve_twice(world: &AnchorWorld, lane: String) {
    world.resolve(&lane);
    world.resolve(&lane);
}

#[when("I resolve the lane {lane} for the rider")]
fn when_resolve_for_rider(world: &AnchorWorld, lane: String) {
    world.resolve(&lane);
}

#[then("both anchors are identical")]
fn then_identical(world: &AnchorWorld) {
    let anchors = world.anchors.borrow();
    assert_eq!(anchors.len(), 2);
    assert_eq!(anchors.first(), anchors.last());
}

#[then("the anchor lies within eight kilometres of the Pune centroid")]
fn then_near_pune(world: &AnchorWorld) {
    let anchor = world.last_anchor();
    let offset = haversine_km(anchor.position, City::Pune.centroid());
    assert!(offset <= 8.2, "anchor {offset} km from Pune");
    assert_eq!(anchor.source, AnchorSource::StableOffset);
}

#[then("the anchor lies within eight kilometres of the rider")]
fn then_near_rider(world: &AnchorWorld) {
    let anchor = world.last_anchor();
    let rider = world.rider.borrow().expect("rider should be set");
    assert!(haversine_km(anchor.position, rider) <= 8.2);
}

#[then("the anchor is the rider position")]
fn then_rider_position(world: &AnchorWorld) {
    let anchor = world.last_anchor();
    assert_eq!(Some(anchor.position), *world.rider.borrow());
}

#[then("the anchor is tagged as a fallback")]
fn then_fallback(world: &AnchorWorld) {
    assert_eq!(world.last_anchor().source.tag(), "fallback:rider_or_city");
}

#[scenario(path = "tests/features/lane_anchor.feature", index = 0)]
fn known_lane_is_stable(world: AnchorWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/lane_anchor.feature", index = 1)]
fn distant_rider_anchors_locally(world: AnchorWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/lane_anchor.feature", index = 2)]
fn unknown_lane_falls_back(world: AnchorWorld) {
    let _ = world;
}
