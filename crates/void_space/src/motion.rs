//! Kinematic motion resolution for bodies
//!
//! A motion test runs in four passes over the moving body:
//!
//! 1. recovery: push the body out of anything it already penetrates
//! 2. sweep: bisect the time of impact of every enabled convex shape
//! 3. contact: take the deepest contact at the first colliding fraction
//! 4. assembly: fill the [`MotionResult`]

use crate::config::SpaceConfig;
use crate::error::{Result, SpaceError};
use crate::narrow_phase::ContactPoint;
use crate::object::{CollisionObject, InstanceId, Rid, ShapeSlot};
use crate::query::{
    resolve_candidate, swept_aabb, ContactSet, DeepestContact, DirectSpaceState, ShapeSweep,
    SweepOutcome,
};
use rapier3d::parry::bounding_volume::{Aabb, BoundingVolume};
use rapier3d::parry::math::{Isometry, Point, Real, Vector};
use std::ops::ControlFlow;

/// Default shape margin for motion tests
pub const DEFAULT_MOTION_MARGIN: Real = 0.001;

/// Input of a motion test
#[derive(Debug, Clone, PartialEq)]
pub struct MotionParameters {
    /// Body transform at the start of the motion
    pub from: Isometry<Real>,
    /// Requested motion
    pub motion: Vector<Real>,
    /// Shape margin
    pub margin: Real,
    /// Skip non-convex body shapes in every pass
    pub exclude_non_convex_shapes: bool,
}

impl MotionParameters {
    /// Move from `from` by `motion` with the default margin
    pub fn new(from: Isometry<Real>, motion: Vector<Real>) -> Self {
        Self {
            from,
            motion,
            margin: DEFAULT_MOTION_MARGIN,
            exclude_non_convex_shapes: true,
        }
    }

    /// Set the shape margin
    pub fn with_margin(mut self, margin: Real) -> Self {
        self.margin = margin;
        self
    }

    /// Set whether non-convex body shapes are skipped
    pub fn with_exclude_non_convex_shapes(mut self, exclude: bool) -> Self {
        self.exclude_non_convex_shapes = exclude;
        self
    }

    fn uses_shape(&self, slot: &ShapeSlot) -> bool {
        !self.exclude_non_convex_shapes || slot.shape.is_convex()
    }
}

/// Output of a motion test
#[derive(Debug, Clone, PartialEq)]
pub struct MotionResult {
    /// Motion actually applied, including any recovery offset
    pub motion: Vector<Real>,
    /// Part of the requested motion that was not applied
    pub remainder: Vector<Real>,
    /// Contact point on the collider
    pub collision_point: Point<Real>,
    /// Contact normal, pointing out of the collider
    pub collision_normal: Vector<Real>,
    /// Collider identity
    pub collider: Option<Rid>,
    /// Collider's engine instance
    pub collider_id: Option<InstanceId>,
    /// Collider shape index
    pub collider_shape: usize,
    /// Body shape that restricted the motion
    pub collision_local_shape: usize,
    /// Collider velocity at the contact point
    pub collider_velocity: Vector<Real>,
    /// Largest collision-free fraction of the requested motion
    pub safe_fraction: Real,
    /// Smallest colliding fraction of the requested motion
    pub unsafe_fraction: Real,
    /// Push-out summed over every contact at the colliding fraction; not applied
    pub recovery_hint: Vector<Real>,
}

impl Default for MotionResult {
    fn default() -> Self {
        Self {
            motion: Vector::zeros(),
            remainder: Vector::zeros(),
            collision_point: Point::origin(),
            collision_normal: Vector::zeros(),
            collider: None,
            collider_id: None,
            collider_shape: 0,
            collision_local_shape: 0,
            collider_velocity: Vector::zeros(),
            safe_fraction: 1.0,
            unsafe_fraction: 1.0,
            recovery_hint: Vector::zeros(),
        }
    }
}

impl MotionResult {
    fn unobstructed(motion: Vector<Real>) -> Self {
        Self {
            motion,
            ..Default::default()
        }
    }
}

/// Sum of the push-outs of contacts deeper than the allowed penetration.
///
/// `None` when no contact qualifies.
fn recovery_vector(contacts: &[ContactPoint], config: &SpaceConfig) -> Option<Vector<Real>> {
    let allowed = config.max_allowed_penetration;
    contacts
        .iter()
        .filter(|c| c.depth < -allowed)
        .fold(None, |acc, c| {
            let push = c.normal * (c.depth + allowed) * config.depenetration_speed;
            Some(acc.unwrap_or_else(Vector::zeros) + push)
        })
}

fn translated(aabb: &Aabb, offset: &Vector<Real>) -> Aabb {
    Aabb::new(aabb.mins + *offset, aabb.maxs + *offset)
}

impl DirectSpaceState<'_> {
    /// Cull candidates that can block `body`
    pub(crate) fn cull_aabb_for_body(&mut self, body: &CollisionObject, aabb: &Aabb) {
        let space = self.space;
        self.cull_aabb(aabb);
        self.candidates.retain(|key| {
            if key.object == body.self_id() {
                return false;
            }
            let Some(other) = space.registry.get(key.object) else {
                return false;
            };
            other.kind().is_body()
                && body.test_collision_mask(other)
                && !body.has_exception_with(other)
                && !other.is_shape_disabled(key.shape)
        });
    }

    pub(crate) fn test_body_motion(
        &mut self,
        body_rid: Rid,
        params: &MotionParameters,
        result: &mut MotionResult,
    ) -> Result<bool> {
        let space = self.space;
        let config = &space.config;
        let body = space.registry.try_get(body_rid).inspect_err(|err| {
            log::error!("body motion test: {err}");
        })?;
        if !body.kind().is_body() {
            log::error!("body motion test on {body_rid}, which is not a body");
            return Err(SpaceError::NotABody(body_rid));
        }

        let motion = params.motion;
        let margin = params.margin.max(0.0);

        let body_aabb = body
            .enabled_shapes()
            .map(|(_, slot)| slot.shape.compute_aabb(&(params.from * slot.transform)))
            .reduce(|acc, aabb| acc.merged(&aabb));
        let Some(body_aabb) = body_aabb else {
            log::debug!("motion of {body_rid}: no enabled shapes");
            *result = MotionResult::unobstructed(motion);
            return Ok(false);
        };
        let mut body_aabb = body_aabb.loosened(margin);
        let mut body_transform = params.from;

        // Free the body if stuck
        let mut contacts = ContactSet::new(config.max_recovery_contacts);
        for iteration in 0..config.recovery_iterations {
            self.cull_aabb_for_body(body, &body_aabb);
            contacts.clear();
            for (_, slot) in body.enabled_shapes() {
                if !params.uses_shape(slot) {
                    continue;
                }
                let xform = body_transform * slot.transform;
                for key in self.candidates.as_slice() {
                    let Some((_, other, other_xform)) = resolve_candidate(space, key) else {
                        continue;
                    };
                    space.narrow_phase.solve_static(
                        &*slot.shape,
                        &xform,
                        &*other.shape,
                        &other_xform,
                        margin,
                        &mut |c| {
                            contacts.push(*c);
                            ControlFlow::Continue(())
                        },
                    );
                }
            }

            let Some(recovery) = recovery_vector(contacts.as_slice(), config) else {
                break;
            };
            if recovery == Vector::zeros() {
                break;
            }
            log::trace!("recovery {iteration} of {body_rid}: {recovery:?}");
            body_transform.translation.vector += recovery;
            body_aabb = translated(&body_aabb, &recovery);
        }
        let recovered = body_transform.translation.vector - params.from.translation.vector;

        // Sweep each convex shape
        let mut safe: Real = 1.0;
        let mut unsafe_: Real = 1.0;
        let mut best_shape = None;

        if motion.norm_squared() > 0.0 {
            let motion_aabb = swept_aabb(&body_aabb, &motion);
            self.cull_aabb_for_body(body, &motion_aabb);

            for (j, slot) in body.enabled_shapes() {
                if !slot.shape.is_convex() {
                    continue;
                }
                let sweep = ShapeSweep {
                    shape: &*slot.shape,
                    xform: body_transform * slot.transform,
                    motion,
                    bounds: motion_aabb,
                    steps: config.toi_bisection_steps,
                };

                let mut stuck = false;
                let mut best_safe: Real = 1.0;
                let mut best_unsafe: Real = 1.0;
                for key in self.candidates.as_slice() {
                    let Some((_, other, other_xform)) = resolve_candidate(space, key) else {
                        continue;
                    };
                    match sweep.against(&*space.narrow_phase, &*other.shape, &other_xform) {
                        SweepOutcome::Clear => {}
                        SweepOutcome::Stuck => {
                            stuck = true;
                            break;
                        }
                        SweepOutcome::Restricted {
                            safe_fraction,
                            unsafe_fraction,
                            ..
                        } => {
                            if safe_fraction < best_safe {
                                best_safe = safe_fraction;
                                best_unsafe = unsafe_fraction;
                            }
                        }
                    }
                }

                if stuck {
                    log::trace!("shape {j} of {body_rid} is stuck");
                    safe = 0.0;
                    unsafe_ = 0.0;
                    best_shape = Some(j);
                    break;
                }
                if best_safe >= 1.0 {
                    continue;
                }
                if best_safe < safe {
                    safe = best_safe;
                    unsafe_ = best_unsafe;
                    best_shape = Some(j);
                }
            }
        }
        debug_assert!(safe <= unsafe_);

        if safe >= 1.0 {
            log::debug!("motion of {body_rid}: unobstructed");
            *result = MotionResult::unobstructed(motion + recovered);
            return Ok(false);
        }

        // Deepest contact at the first colliding fraction
        let advance = motion * unsafe_;
        let mut unsafe_transform = body_transform;
        unsafe_transform.translation.vector += advance;
        self.cull_aabb_for_body(body, &translated(&body_aabb, &advance));

        let mut deepest = DeepestContact::new(config.min_contact_depth);
        let mut recovery_hint = Vector::zeros();
        for (j, slot) in body.enabled_shapes() {
            if !params.uses_shape(slot) {
                continue;
            }
            let xform = unsafe_transform * slot.transform;
            for key in self.candidates.as_slice() {
                let Some((_, other, other_xform)) = resolve_candidate(space, key) else {
                    continue;
                };
                space.narrow_phase.solve_static(
                    &*slot.shape,
                    &xform,
                    &*other.shape,
                    &other_xform,
                    margin,
                    &mut |c| {
                        deepest = deepest.fold(*key, j, c);
                        recovery_hint += c.normal * c.depth * config.depenetration_speed;
                        ControlFlow::Continue(())
                    },
                );
            }
        }

        let hit = deepest
            .best()
            .and_then(|best| space.registry.get(best.collider.object).map(|o| (best, o)));
        let Some((best, collider)) = hit else {
            log::debug!("motion of {body_rid}: restricted at {safe} but no contact found");
            *result = MotionResult::unobstructed(motion + recovered);
            result.safe_fraction = safe;
            result.unsafe_fraction = unsafe_;
            result.recovery_hint = recovery_hint;
            return Ok(false);
        };

        *result = MotionResult {
            motion: motion * safe + recovered,
            remainder: motion - motion * safe,
            collision_point: best.point,
            collision_normal: best.normal,
            collider: Some(collider.self_id()),
            collider_id: collider.instance_id(),
            collider_shape: best.collider.shape,
            collision_local_shape: best_shape.unwrap_or(best.local_shape),
            collider_velocity: collider.velocity_at_point(&best.point),
            safe_fraction: safe,
            unsafe_fraction: unsafe_,
            recovery_hint,
        };
        log::debug!(
            "motion of {body_rid}: blocked by {} at {safe} (shape {})",
            collider.self_id(),
            result.collision_local_shape
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn contact(normal: Vector<Real>, depth: Real) -> ContactPoint {
        ContactPoint {
            point_a: Point::origin(),
            point_b: Point::from(normal * depth),
            normal,
            depth,
        }
    }

    #[test]
    fn test_recovery_ignores_allowed_penetration() {
        let config = SpaceConfig::default();
        assert!(recovery_vector(&[contact(Vector::x(), -0.005)], &config).is_none());
        assert!(recovery_vector(&[], &config).is_none());
    }

    #[test]
    fn test_recovery_pushes_against_normal() {
        let config = SpaceConfig::default();
        let contacts = [contact(Vector::x(), -0.11), contact(Vector::y(), -0.21)];
        let recovery = recovery_vector(&contacts, &config).unwrap();
        assert_relative_eq!(recovery.x, -0.04, epsilon = 1e-6);
        assert_relative_eq!(recovery.y, -0.08, epsilon = 1e-6);
    }

    #[test]
    fn test_parameters_defaults() {
        let params = MotionParameters::new(Isometry::identity(), Vector::x());
        assert_relative_eq!(params.margin, DEFAULT_MOTION_MARGIN);
        assert!(params.exclude_non_convex_shapes);
        let result = MotionResult::default();
        assert!(result.safe_fraction <= result.unsafe_fraction);
    }
}
