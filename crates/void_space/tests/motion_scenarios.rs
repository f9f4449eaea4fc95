//! Body motion tests against small hand-built worlds

use approx::{assert_abs_diff_eq, assert_relative_eq};
use void_space::prelude::*;

fn unit_box() -> ColliderShape {
    ColliderShape::cuboid(0.5, 0.5, 0.5)
}

fn world_with_mover() -> (Space, Rid) {
    let mut space = Space::default();
    let mover = space
        .add_object(CollisionObjectDesc::body().with_shape(unit_box()))
        .unwrap();
    (space, mover)
}

fn add_obstacle(space: &mut Space, x: f32) -> Rid {
    space
        .add_object(
            CollisionObjectDesc::static_body()
                .with_position(x, 0.0, 0.0)
                .with_shape(unit_box()),
        )
        .unwrap()
}

fn run(space: &Space, mover: Rid, from: Isometry<Real>, motion: Vector<Real>) -> (bool, MotionResult) {
    let mut result = MotionResult::default();
    let collided = space
        .test_body_motion(mover, &MotionParameters::new(from, motion), &mut result)
        .unwrap();
    (collided, result)
}

fn push_x(space: &Space, mover: Rid) -> (bool, MotionResult) {
    run(space, mover, Isometry::identity(), Vector::new(2.0, 0.0, 0.0))
}

#[test]
fn test_free_space_applies_full_motion() {
    let (space, mover) = world_with_mover();
    let motion = Vector::new(1.0, 2.0, -3.0);
    let (collided, result) = run(&space, mover, Isometry::identity(), motion);

    assert!(!collided);
    assert_eq!(result.motion, motion);
    assert_eq!(result.remainder, Vector::zeros());
    assert_eq!(result.collider, None);
}

#[test]
fn test_motion_ending_in_contact_is_unobstructed() {
    // Box ends its motion spanning 1.5..2.5, flush against the obstacle
    let (mut space, mover) = world_with_mover();
    add_obstacle(&mut space, 3.0);

    let (collided, result) = push_x(&space, mover);
    assert!(!collided);
    assert_relative_eq!(result.safe_fraction, 1.0);
    assert_relative_eq!(result.motion.x, 2.0, epsilon = 1e-6);
    assert_relative_eq!(result.motion.y, 0.0);
    assert_relative_eq!(result.motion.z, 0.0);
    assert_eq!(result.remainder, Vector::zeros());
    assert_eq!(result.collider, None);
}

#[test]
fn test_gap_beyond_reach_is_unobstructed() {
    // Box ends its motion spanning 1.5..2.5, a full unit short of the obstacle
    let (mut space, mover) = world_with_mover();
    add_obstacle(&mut space, 4.0);

    let (collided, result) = push_x(&space, mover);
    assert!(!collided);
    assert_relative_eq!(result.safe_fraction, 1.0);
    assert_relative_eq!(result.motion.x, 2.0, epsilon = 1e-6);
    assert_relative_eq!(result.motion.y, 0.0);
    assert_eq!(result.remainder, Vector::zeros());
}

#[test]
fn test_obstacle_in_path_blocks_motion() {
    let (mut space, mover) = world_with_mover();
    let wall = add_obstacle(&mut space, 1.5);

    let (collided, result) = push_x(&space, mover);
    assert!(collided);
    assert!(result.motion.norm() < 2.0);
    // Impact at a quarter of the motion, bisected over 8 steps
    assert!(result.motion.x > 0.45 && result.motion.x <= 0.5 + 1e-4);
    assert_abs_diff_eq!(result.remainder.x, 2.0 - result.motion.x, epsilon = 1e-5);

    assert_abs_diff_eq!(result.collision_normal.x, -1.0, epsilon = 1e-3);
    assert_abs_diff_eq!(result.collision_normal.y, 0.0, epsilon = 1e-3);
    assert_abs_diff_eq!(result.collision_point.x, 1.0, epsilon = 1e-2);
    assert_eq!(result.collider, Some(wall));
    assert_eq!(result.collider_shape, 0);
    assert_eq!(result.collision_local_shape, 0);
    assert!(result.safe_fraction < result.unsafe_fraction);
}

#[test]
fn test_blocked_motion_suggests_push_away_from_collider() {
    let (mut space, mover) = world_with_mover();
    add_obstacle(&mut space, 1.5);

    let (collided, result) = push_x(&space, mover);
    assert!(collided);
    assert!(result.recovery_hint.x < 0.0);
    assert!(result.recovery_hint.norm() > 0.0);
    assert_abs_diff_eq!(result.recovery_hint.y, 0.0, epsilon = 1e-5);
    assert_abs_diff_eq!(result.recovery_hint.z, 0.0, epsilon = 1e-5);
    // The hint is reported, never applied
    assert!(result.motion.x > 0.0);
}

#[test]
fn test_penetrating_body_recovers_without_motion() {
    let (mut space, mover) = world_with_mover();
    add_obstacle(&mut space, 0.8);

    let (collided, result) = run(&space, mover, Isometry::identity(), Vector::zeros());
    assert!(!collided);
    assert!(result.motion.x < 0.0);
    assert!(result.motion.norm() > 0.01);
    assert_abs_diff_eq!(result.motion.y, 0.0, epsilon = 1e-5);
    assert_abs_diff_eq!(result.motion.z, 0.0, epsilon = 1e-5);
}

#[test]
fn test_shallow_overlap_is_stuck() {
    // Within the allowed penetration: no recovery, and the sweep starts inside
    let (mut space, mover) = world_with_mover();
    let wall = add_obstacle(&mut space, 0.995);

    let (collided, result) = push_x(&space, mover);
    assert!(collided);
    assert_eq!(result.safe_fraction, 0.0);
    assert_eq!(result.unsafe_fraction, 0.0);
    assert_abs_diff_eq!(result.motion.norm(), 0.0, epsilon = 1e-6);
    assert_eq!(result.collider, Some(wall));
}

#[test]
fn test_shallow_overlap_blocks_every_direction() {
    let (mut space, mover) = world_with_mover();
    add_obstacle(&mut space, 0.995);

    for motion in [Vector::new(-2.0, 0.0, 0.0), Vector::new(0.0, 2.0, 0.0)] {
        let (collided, result) = run(&space, mover, Isometry::identity(), motion);
        assert!(collided, "motion {motion:?}");
        assert_eq!(result.safe_fraction, 0.0);
        assert_abs_diff_eq!(result.motion.norm(), 0.0, epsilon = 1e-6);
        assert_eq!(result.remainder, motion);
    }
}

#[test]
fn test_fractions_stay_ordered() {
    for x in [1.2, 1.5, 2.0, 2.4, 2.9, 4.0] {
        let (mut space, mover) = world_with_mover();
        add_obstacle(&mut space, x);
        let (_, result) = push_x(&space, mover);
        assert!(0.0 <= result.safe_fraction, "obstacle at {x}");
        assert!(result.safe_fraction <= result.unsafe_fraction, "obstacle at {x}");
        assert!(result.unsafe_fraction <= 1.0, "obstacle at {x}");
    }
}

#[test]
fn test_identical_inputs_give_identical_results() {
    let (mut space, mover) = world_with_mover();
    add_obstacle(&mut space, 1.5);
    add_obstacle(&mut space, -3.0);
    add_obstacle(&mut space, 1.6);

    let first = push_x(&space, mover);
    let second = push_x(&space, mover);
    assert_eq!(first, second);
}

#[test]
fn test_repeated_motion_does_not_push_further() {
    let (mut space, mover) = world_with_mover();
    add_obstacle(&mut space, 1.5);
    let motion = Vector::new(2.0, 0.0, 0.0);

    let (_, first) = run(&space, mover, Isometry::identity(), motion);
    let from = Isometry::translation(first.motion.x, first.motion.y, first.motion.z);
    let (_, second) = run(&space, mover, from, motion);

    // Faces meet at x = 0.5; two calls together never get past it
    assert!(second.motion.x >= 0.0);
    assert!(second.motion.x < 0.01);
    assert!(first.motion.x + second.motion.x <= 0.5 + 1e-3);

    // The remainder is measured against the motion requested by that call,
    // so asking for the full motion again from the contact leaves nearly all of it
    assert!(second.remainder.x > first.remainder.x);
    assert_abs_diff_eq!(second.motion.x + second.remainder.x, motion.x, epsilon = 1e-5);
}

#[test]
fn test_continuing_with_remainder_never_grows_it() {
    let (mut space, mover) = world_with_mover();
    add_obstacle(&mut space, 1.5);

    let (_, first) = run(&space, mover, Isometry::identity(), Vector::new(2.0, 0.0, 0.0));
    let from = Isometry::translation(first.motion.x, first.motion.y, first.motion.z);
    let (_, second) = run(&space, mover, from, first.remainder);

    assert!(second.remainder.norm() <= first.remainder.norm());
    assert!(first.motion.x + second.motion.x <= 0.5 + 1e-3);
}

#[test]
fn test_body_without_enabled_shapes_moves_freely() {
    let (mut space, mover) = world_with_mover();
    add_obstacle(&mut space, 1.5);
    space.set_shape_disabled(mover, 0, true).unwrap();

    let (collided, result) = push_x(&space, mover);
    assert!(!collided);
    assert_eq!(result.motion, Vector::new(2.0, 0.0, 0.0));
    assert_eq!(result.remainder, Vector::zeros());
}

#[test]
fn test_disabled_obstacle_shape_is_ignored() {
    let (mut space, mover) = world_with_mover();
    let wall = add_obstacle(&mut space, 1.5);
    space.set_shape_disabled(wall, 0, true).unwrap();

    let (collided, _) = push_x(&space, mover);
    assert!(!collided);
}

#[test]
fn test_areas_never_block() {
    let (mut space, mover) = world_with_mover();
    space
        .add_object(
            CollisionObjectDesc::area()
                .with_position(1.5, 0.0, 0.0)
                .with_shape(unit_box()),
        )
        .unwrap();

    let (collided, result) = push_x(&space, mover);
    assert!(!collided);
    assert_relative_eq!(result.motion.x, 2.0);
}

#[test]
fn test_collision_exception_lets_body_pass() {
    let (mut space, mover) = world_with_mover();
    let wall = add_obstacle(&mut space, 1.5);
    space.add_collision_exception(wall, mover).unwrap();

    let (collided, _) = push_x(&space, mover);
    assert!(!collided);

    space.remove_collision_exception(wall, mover).unwrap();
    let (collided, _) = push_x(&space, mover);
    assert!(collided);
}

#[test]
fn test_non_interacting_layers_pass_through() {
    let (mut space, mover) = world_with_mover();
    let wall = add_obstacle(&mut space, 1.5);
    let ghost = CollisionGroups::from_layer(CollisionLayer::TRIGGERS, &[CollisionLayer::TRIGGERS]);
    space.set_collision_groups(wall, ghost).unwrap();

    let (collided, _) = push_x(&space, mover);
    assert!(!collided);

    // One side scanning the other is enough
    let scans_default = ghost.add_mask(CollisionLayer::DEFAULT);
    space.set_collision_groups(wall, scans_default).unwrap();
    let (collided, _) = push_x(&space, mover);
    assert!(collided);
}

#[test]
fn test_most_restrictive_shape_is_reported() {
    let mut space = Space::default();
    let mover = space
        .add_object(
            CollisionObjectDesc::body()
                .with_shape(unit_box())
                .with_shape_at(unit_box(), Isometry::translation(0.0, 2.0, 0.0)),
        )
        .unwrap();
    space
        .add_object(
            CollisionObjectDesc::static_body()
                .with_position(1.5, 2.0, 0.0)
                .with_shape(unit_box()),
        )
        .unwrap();

    let (collided, result) = push_x(&space, mover);
    assert!(collided);
    assert_eq!(result.collision_local_shape, 1);
    assert_abs_diff_eq!(result.collision_point.y, 2.0, epsilon = 0.5);
}

#[test]
fn test_collider_velocity_at_contact() {
    let (mut space, mover) = world_with_mover();
    let platform = space
        .add_object(
            CollisionObjectDesc::body()
                .with_position(1.5, 0.0, 0.0)
                .with_shape(unit_box()),
        )
        .unwrap();
    space
        .set_body_velocity(platform, Vector::new(0.0, 1.0, 0.0), Vector::zeros())
        .unwrap();

    let (collided, result) = push_x(&space, mover);
    assert!(collided);
    assert_eq!(result.collider, Some(platform));
    assert_relative_eq!(result.collider_velocity.y, 1.0);
    assert_relative_eq!(result.collider_velocity.x, 0.0);
}

#[test]
fn test_locked_space_refuses_motion_but_allows_queries() {
    let (mut space, mover) = world_with_mover();
    space.lock();

    let mut result = MotionResult::default();
    let params = MotionParameters::new(Isometry::identity(), Vector::x());
    assert_eq!(
        space.test_body_motion(mover, &params, &mut result),
        Err(SpaceError::SpaceLocked)
    );

    let mut hits = [ShapeResult::default(); 4];
    let count = space
        .direct_state()
        .intersect_point(&Point::origin(), &QueryFilter::new(), &mut hits);
    assert_eq!(count, 1);
    assert_eq!(hits[0].id, mover);
}

#[test]
fn test_invalid_bodies_are_errors() {
    let (mut space, _) = world_with_mover();
    let area = space.add_object(CollisionObjectDesc::area().with_shape(unit_box())).unwrap();
    let params = MotionParameters::new(Isometry::identity(), Vector::x());
    let mut result = MotionResult::default();

    assert_eq!(
        space.test_body_motion(area, &params, &mut result),
        Err(SpaceError::NotABody(area))
    );
    let missing = Rid::from_raw(999);
    assert_eq!(
        space.test_body_motion(missing, &params, &mut result),
        Err(SpaceError::ObjectNotFound(missing))
    );
}
