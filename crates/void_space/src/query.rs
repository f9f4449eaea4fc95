//! Direct space state: point, ray and shape queries against a space

use crate::error::{Result, SpaceError};
use crate::narrow_phase::{ContactPoint, Distance, NarrowPhase};
use crate::object::{CollisionObject, InstanceId, ObjectKind, Rid, ShapeSlot};
use crate::scratch::{ScratchGuard, ShapeKey};
use crate::space::Space;
use rapier3d::parry::bounding_volume::{Aabb, BoundingVolume};
use rapier3d::parry::math::{Isometry, Point, Real, Vector};
use rapier3d::parry::query::Ray;
use rapier3d::parry::shape::Shape;
use std::collections::BTreeSet;
use std::ops::ControlFlow;

/// Which objects a query may report
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    /// Objects to skip
    pub exclude: BTreeSet<Rid>,
    /// Only objects on one of these layers are reported
    pub collision_mask: u32,
    /// Report bodies
    pub collide_with_bodies: bool,
    /// Report areas
    pub collide_with_areas: bool,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            exclude: BTreeSet::new(),
            collision_mask: u32::MAX,
            collide_with_bodies: true,
            collide_with_areas: true,
        }
    }
}

impl QueryFilter {
    /// Filter accepting everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object to exclude
    pub fn exclude(mut self, rid: Rid) -> Self {
        self.exclude.insert(rid);
        self
    }

    /// Set the layer mask
    pub fn with_mask(mut self, mask: u32) -> Self {
        self.collision_mask = mask;
        self
    }

    /// Set whether bodies are reported
    pub fn with_bodies(mut self, collide: bool) -> Self {
        self.collide_with_bodies = collide;
        self
    }

    /// Set whether areas are reported
    pub fn with_areas(mut self, collide: bool) -> Self {
        self.collide_with_areas = collide;
        self
    }

    /// Whether `object` passes exclusion, mask and kind checks
    pub fn can_collide_with(&self, object: &CollisionObject) -> bool {
        if self.exclude.contains(&object.self_id()) {
            return false;
        }
        if !object.groups().visible_to(self.collision_mask) {
            return false;
        }
        match object.kind() {
            ObjectKind::Body(_) => self.collide_with_bodies,
            ObjectKind::Area => self.collide_with_areas,
        }
    }
}

/// One shape of one object reported by a query
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShapeResult {
    /// Object identity
    pub id: Rid,
    /// Owning engine instance
    pub collider_id: Option<InstanceId>,
    /// Object user data
    pub collider: u128,
    /// Index of the shape on the object
    pub shape_index: usize,
}

impl ShapeResult {
    fn new(object: &CollisionObject, shape_index: usize) -> Self {
        Self {
            id: object.self_id(),
            collider_id: object.instance_id(),
            collider: object.user_data(),
            shape_index,
        }
    }
}

/// Closest ray hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayResult {
    /// Hit point in world space
    pub position: Point<Real>,
    /// Surface normal at the hit point
    pub normal: Vector<Real>,
    /// Object identity
    pub id: Rid,
    /// Owning engine instance
    pub collider_id: Option<InstanceId>,
    /// Object user data
    pub collider: u128,
    /// Index of the shape on the object
    pub shape_index: usize,
}

/// Contact summary against the nearest or deepest collider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeRestInfo {
    /// Contact point on the collider
    pub point: Point<Real>,
    /// Contact normal
    pub normal: Vector<Real>,
    /// Collider identity
    pub rid: Rid,
    /// Collider's engine instance
    pub collider_id: Option<InstanceId>,
    /// Collider shape index
    pub shape: usize,
    /// Collider velocity at `point`
    pub linear_velocity: Vector<Real>,
}

impl ShapeRestInfo {
    fn new(object: &CollisionObject, shape: usize, point: Point<Real>, normal: Vector<Real>) -> Self {
        Self {
            point,
            normal,
            rid: object.self_id(),
            collider_id: object.instance_id(),
            shape,
            linear_velocity: object.velocity_at_point(&point),
        }
    }
}

/// Result of sweeping a shape through the space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionCast {
    /// Largest fraction of the motion known to be collision-free
    pub safe_fraction: Real,
    /// Smallest fraction of the motion known to collide
    pub unsafe_fraction: Real,
    /// Closest approach to the restricting collider
    pub rest_info: Option<ShapeRestInfo>,
}

impl MotionCast {
    fn unobstructed() -> Self {
        Self {
            safe_fraction: 1.0,
            unsafe_fraction: 1.0,
            rest_info: None,
        }
    }

    fn stuck() -> Self {
        Self {
            safe_fraction: 0.0,
            unsafe_fraction: 0.0,
            rest_info: None,
        }
    }

    /// Whether the whole motion is free
    pub fn is_unobstructed(&self) -> bool {
        self.safe_fraction >= 1.0
    }
}

/// Deepest-contact reduction shared by rest info and motion contact extraction.
///
/// Keeps the contact with the longest separation vector; contacts shorter
/// than `min_depth` are ignored and the first of equal lengths wins.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DeepestContact {
    min_depth: Real,
    best: Option<BestContact>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BestContact {
    pub(crate) collider: ShapeKey,
    pub(crate) local_shape: usize,
    pub(crate) point: Point<Real>,
    pub(crate) normal: Vector<Real>,
    pub(crate) length: Real,
}

impl DeepestContact {
    pub(crate) fn new(min_depth: Real) -> Self {
        Self { min_depth, best: None }
    }

    pub(crate) fn fold(self, collider: ShapeKey, local_shape: usize, contact: &ContactPoint) -> Self {
        let rel = contact.separation();
        let length = rel.norm();
        let best_len = self.best.map_or(0.0, |b| b.length);
        if length < self.min_depth || length <= best_len {
            return self;
        }
        Self {
            best: Some(BestContact {
                collider,
                local_shape,
                point: contact.point_b,
                normal: rel / length,
                length,
            }),
            ..self
        }
    }

    pub(crate) fn best(&self) -> Option<BestContact> {
        self.best
    }
}

/// Bounded contact list; once full, a deeper contact evicts the shallowest
#[derive(Debug, Clone)]
pub(crate) struct ContactSet {
    contacts: Vec<ContactPoint>,
    max: usize,
}

impl ContactSet {
    pub(crate) fn new(max: usize) -> Self {
        Self {
            contacts: Vec::with_capacity(max),
            max,
        }
    }

    pub(crate) fn push(&mut self, contact: ContactPoint) {
        if self.contacts.len() < self.max {
            self.contacts.push(contact);
            return;
        }
        let depth = contact.separation().norm_squared();
        let shallowest = self
            .contacts
            .iter()
            .enumerate()
            .map(|(i, c)| (i, c.separation().norm_squared()))
            .fold(None, |acc: Option<(usize, Real)>, (i, d)| match acc {
                Some((_, best)) if best <= d => acc,
                _ => Some((i, d)),
            });
        if let Some((index, min_depth)) = shallowest {
            if depth >= min_depth {
                self.contacts[index] = contact;
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.contacts.clear();
    }

    pub(crate) fn as_slice(&self) -> &[ContactPoint] {
        &self.contacts
    }
}

/// How a shape sweep relates to one obstacle
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum SweepOutcome {
    /// The full motion never touches the obstacle
    Clear,
    /// Already overlapping at the start of the motion
    Stuck,
    /// Bisection bounds with the closest points at the safe fraction
    Restricted {
        safe_fraction: Real,
        unsafe_fraction: Real,
        closest_a: Point<Real>,
        closest_b: Point<Real>,
    },
}

/// One convex shape moving along `motion` from `xform`
pub(crate) struct ShapeSweep<'s> {
    pub(crate) shape: &'s dyn Shape,
    pub(crate) xform: Isometry<Real>,
    pub(crate) motion: Vector<Real>,
    pub(crate) bounds: Aabb,
    pub(crate) steps: u32,
}

impl ShapeSweep<'_> {
    pub(crate) fn against(
        &self,
        narrow_phase: &dyn NarrowPhase,
        other: &dyn Shape,
        other_xform: &Isometry<Real>,
    ) -> SweepOutcome {
        let mnormal = self.motion.try_normalize(0.0).unwrap_or_else(Vector::zeros);

        let mut sep = mnormal;
        let full = narrow_phase.solve_distance(
            self.shape,
            &self.xform,
            &self.motion,
            other,
            other_xform,
            &self.bounds,
            &mut sep,
        );
        if !full.is_overlapping() {
            return SweepOutcome::Clear;
        }

        sep = mnormal;
        let start = narrow_phase.solve_distance(
            self.shape,
            &self.xform,
            &Vector::zeros(),
            other,
            other_xform,
            &self.bounds,
            &mut sep,
        );
        let (mut closest_a, mut closest_b) = match start {
            Distance::Separated { point_a, point_b } => (point_a, point_b),
            Distance::Overlapping => return SweepOutcome::Stuck,
        };

        let mut low: Real = 0.0;
        let mut hi: Real = 1.0;
        for _ in 0..self.steps {
            let ofs = (low + hi) * 0.5;
            let mut sep = mnormal;
            match narrow_phase.solve_distance(
                self.shape,
                &self.xform,
                &(self.motion * ofs),
                other,
                other_xform,
                &self.bounds,
                &mut sep,
            ) {
                Distance::Overlapping => hi = ofs,
                Distance::Separated { point_a, point_b } => {
                    closest_a = point_a;
                    closest_b = point_b;
                    low = ofs;
                }
            }
        }
        log::trace!("toi bisection: safe {low} unsafe {hi}");

        SweepOutcome::Restricted {
            safe_fraction: low,
            unsafe_fraction: hi,
            closest_a,
            closest_b,
        }
    }
}

/// `aabb` unioned with itself translated by `motion`
pub(crate) fn swept_aabb(aabb: &Aabb, motion: &Vector<Real>) -> Aabb {
    aabb.merged(&Aabb::new(aabb.mins + *motion, aabb.maxs + *motion))
}

/// Object, enabled shape slot and shape world transform behind a candidate
pub(crate) fn resolve_candidate<'s>(
    space: &'s Space,
    key: &ShapeKey,
) -> Option<(&'s CollisionObject, &'s ShapeSlot, Isometry<Real>)> {
    let object = space.registry.get(key.object)?;
    let slot = object.shape_slot(key.shape).filter(|s| !s.disabled)?;
    Some((object, slot, object.transform() * slot.transform))
}

/// Read-only query access to a space.
///
/// Holds one candidate buffer from the space's pool for its whole lifetime,
/// so each thread querying the same space needs its own state.
pub struct DirectSpaceState<'a> {
    pub(crate) space: &'a Space,
    pub(crate) candidates: ScratchGuard<'a>,
}

impl<'a> DirectSpaceState<'a> {
    pub(crate) fn new(space: &'a Space) -> Self {
        Self {
            space,
            candidates: space.scratch.acquire(),
        }
    }

    /// The queried space
    pub fn space(&self) -> &'a Space {
        self.space
    }

    pub(crate) fn cull_aabb(&mut self, aabb: &Aabb) {
        self.candidates.clear();
        self.space.broadphase.cull_aabb(aabb, &mut self.candidates);
    }

    /// Shapes containing `point`; fills `results` and returns how many were written
    pub fn intersect_point(
        &mut self,
        point: &Point<Real>,
        filter: &QueryFilter,
        results: &mut [ShapeResult],
    ) -> usize {
        if results.is_empty() {
            return 0;
        }
        let space = self.space;
        self.candidates.clear();
        space.broadphase.cull_point(point, &mut self.candidates);

        let mut count = 0;
        for key in self.candidates.as_slice() {
            let Some((object, slot, xform)) = resolve_candidate(space, key) else {
                continue;
            };
            if !filter.can_collide_with(object) {
                continue;
            }
            let local = xform.inverse_transform_point(point);
            if !slot.shape.contains_local_point(&local) {
                continue;
            }
            results[count] = ShapeResult::new(object, key.shape);
            count += 1;
            if count == results.len() {
                break;
            }
        }
        count
    }

    /// Closest hit along the segment `from..to`.
    ///
    /// With `pick_ray` set, objects that are not ray-pickable are skipped.
    pub fn intersect_ray(
        &mut self,
        from: &Point<Real>,
        to: &Point<Real>,
        filter: &QueryFilter,
        pick_ray: bool,
    ) -> Option<RayResult> {
        let motion = to - from;
        let dir = motion.try_normalize(0.0)?;
        let space = self.space;
        self.candidates.clear();
        space.broadphase.cull_segment(from, to, &mut self.candidates);

        let mut closest: Option<(Real, RayResult)> = None;
        for key in self.candidates.as_slice() {
            let Some((object, slot, xform)) = resolve_candidate(space, key) else {
                continue;
            };
            if !filter.can_collide_with(object) {
                continue;
            }
            if pick_ray && !object.is_ray_pickable() {
                continue;
            }

            let local_ray = Ray::new(
                xform.inverse_transform_point(from),
                xform.inverse_transform_vector(&motion),
            );
            let Some(hit) = slot.shape.cast_local_ray_and_get_normal(&local_ray, 1.0, true) else {
                continue;
            };
            let position = xform * local_ray.point_at(hit.time_of_impact);
            let depth = dir.dot(&position.coords);
            if closest.as_ref().map_or(true, |(best, _)| depth < *best) {
                closest = Some((
                    depth,
                    RayResult {
                        position,
                        normal: xform * hit.normal,
                        id: object.self_id(),
                        collider_id: object.instance_id(),
                        collider: object.user_data(),
                        shape_index: key.shape,
                    },
                ));
            }
        }
        closest.map(|(_, result)| result)
    }

    /// Shapes overlapping the convex `shape` at `xform`
    pub fn intersect_shape(
        &mut self,
        shape: &dyn Shape,
        xform: &Isometry<Real>,
        margin: Real,
        filter: &QueryFilter,
        results: &mut [ShapeResult],
    ) -> Result<usize> {
        if !shape.is_convex() {
            return Err(SpaceError::NonConvexShape);
        }
        if results.is_empty() {
            return Ok(0);
        }
        let space = self.space;
        self.cull_aabb(&shape.compute_aabb(xform).loosened(margin.max(0.0)));

        let mut count = 0;
        for key in self.candidates.as_slice() {
            let Some((object, slot, col_xform)) = resolve_candidate(space, key) else {
                continue;
            };
            if !filter.can_collide_with(object) {
                continue;
            }
            let overlaps = space.narrow_phase.solve_static(
                shape,
                xform,
                &*slot.shape,
                &col_xform,
                margin,
                &mut |_| ControlFlow::Break(()),
            );
            if !overlaps {
                continue;
            }
            results[count] = ShapeResult::new(object, key.shape);
            count += 1;
            if count == results.len() {
                break;
            }
        }
        Ok(count)
    }

    /// Sweep the convex `shape` along `motion` and bound the time of impact
    pub fn cast_motion(
        &mut self,
        shape: &dyn Shape,
        xform: &Isometry<Real>,
        motion: &Vector<Real>,
        margin: Real,
        filter: &QueryFilter,
    ) -> Result<MotionCast> {
        if !shape.is_convex() {
            return Err(SpaceError::NonConvexShape);
        }
        let space = self.space;
        let bounds = swept_aabb(&shape.compute_aabb(xform), motion).loosened(margin.max(0.0));
        self.cull_aabb(&bounds);

        let sweep = ShapeSweep {
            shape,
            xform: *xform,
            motion: *motion,
            bounds,
            steps: space.config.toi_bisection_steps,
        };

        let mut cast = MotionCast::unobstructed();
        let mut best_first = true;
        let mut closest_dist = Real::MAX;
        for key in self.candidates.as_slice() {
            let Some((object, slot, col_xform)) = resolve_candidate(space, key) else {
                continue;
            };
            if !filter.can_collide_with(object) {
                continue;
            }

            let (safe, unsafe_, closest_a, closest_b) =
                match sweep.against(&*space.narrow_phase, &*slot.shape, &col_xform) {
                    SweepOutcome::Clear => continue,
                    SweepOutcome::Stuck => {
                        log::trace!("cast_motion starts inside {}", key.object);
                        return Ok(MotionCast::stuck());
                    }
                    SweepOutcome::Restricted {
                        safe_fraction,
                        unsafe_fraction,
                        closest_a,
                        closest_b,
                    } => (safe_fraction, unsafe_fraction, closest_a, closest_b),
                };

            if safe < cast.safe_fraction {
                best_first = true;
                cast.safe_fraction = safe;
                cast.unsafe_fraction = unsafe_;
            }

            let dist = (closest_a - closest_b).norm_squared();
            if best_first || (dist < closest_dist && safe <= cast.safe_fraction) {
                let Some(normal) = (closest_a - closest_b).try_normalize(0.0) else {
                    continue;
                };
                closest_dist = dist;
                cast.rest_info = Some(ShapeRestInfo::new(object, key.shape, closest_b, normal));
                best_first = false;
            }
        }
        Ok(cast)
    }

    /// Contacts of `shape` at `xform` against everything it overlaps.
    ///
    /// Fills `results` with at most `results.len()` contacts; when more are
    /// found, the deepest ones are kept. Returns how many were written.
    pub fn collide_shape(
        &mut self,
        shape: &dyn Shape,
        xform: &Isometry<Real>,
        margin: Real,
        filter: &QueryFilter,
        results: &mut [ContactPoint],
    ) -> usize {
        if results.is_empty() {
            return 0;
        }
        let space = self.space;
        self.cull_aabb(&shape.compute_aabb(xform).loosened(margin.max(0.0)));

        let mut contacts = ContactSet::new(results.len());
        for key in self.candidates.as_slice() {
            let Some((object, slot, col_xform)) = resolve_candidate(space, key) else {
                continue;
            };
            if !filter.can_collide_with(object) {
                continue;
            }
            space.narrow_phase.solve_static(
                shape,
                xform,
                &*slot.shape,
                &col_xform,
                margin,
                &mut |c| {
                    contacts.push(*c);
                    ControlFlow::Continue(())
                },
            );
        }

        let found = contacts.as_slice();
        results[..found.len()].copy_from_slice(found);
        found.len()
    }

    /// Deepest single contact of `shape` at `xform`
    pub fn rest_info(
        &mut self,
        shape: &dyn Shape,
        xform: &Isometry<Real>,
        margin: Real,
        filter: &QueryFilter,
    ) -> Option<ShapeRestInfo> {
        let space = self.space;
        self.cull_aabb(&shape.compute_aabb(xform).loosened(margin.max(0.0)));

        let mut deepest = DeepestContact::new(space.config.min_contact_depth);
        for key in self.candidates.as_slice() {
            let Some((object, slot, col_xform)) = resolve_candidate(space, key) else {
                continue;
            };
            if !filter.can_collide_with(object) {
                continue;
            }
            space.narrow_phase.solve_static(
                shape,
                xform,
                &*slot.shape,
                &col_xform,
                margin,
                &mut |c| {
                    deepest = deepest.fold(*key, 0, c);
                    ControlFlow::Continue(())
                },
            );
        }

        let best = deepest.best()?;
        let object = space.registry.get(best.collider.object)?;
        Some(ShapeRestInfo::new(object, best.collider.shape, best.point, best.normal))
    }

    /// Nearest point to `point` on any enabled shape of `object`.
    ///
    /// An object without enabled shapes yields its origin.
    pub fn closest_point_to_object_volume(&self, object: Rid, point: &Point<Real>) -> Option<Point<Real>> {
        let Some(obj) = self.space.registry.get(object) else {
            log::error!("closest point query on unknown object {object}");
            return None;
        };

        let closest = obj
            .enabled_shapes()
            .map(|(_, slot)| {
                let xform = obj.transform() * slot.transform;
                slot.shape.project_point(&xform, point, true).point
            })
            .fold(None, |acc: Option<(Real, Point<Real>)>, p| {
                let dist = (p - point).norm();
                match acc {
                    Some((best, _)) if best <= dist => acc,
                    _ => Some((dist, p)),
                }
            });

        Some(closest.map_or(Point::from(obj.transform().translation.vector), |(_, p)| p))
    }
}
